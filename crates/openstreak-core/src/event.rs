//! Open events and their dedup fingerprints.
//!
//! An [`OpenEvent`] is what a webhook delivery carries once parsed: who
//! opened which newsletter, when, and the optional UTM attribution. The
//! [`Fingerprint`] of an event covers everything *except* the timestamp, so a
//! retried delivery of the same ping maps to the same key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TrackerError;

/// UTM attribution carried on an open event.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmFields {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub channel: Option<String>,
}

impl UtmFields {
    /// Drop empty and whitespace-only values.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            source: non_empty(self.source),
            medium: non_empty(self.medium),
            campaign: non_empty(self.campaign),
            channel: non_empty(self.channel),
        }
    }
}

/// A single newsletter open, as handed to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// Reader identity (email address).
    pub email: String,
    /// External newsletter identifier (the post/resource id).
    pub newsletter_id: String,
    pub opened_at: DateTime<Utc>,
    pub utm: UtmFields,
}

impl OpenEvent {
    pub fn new(
        email: impl Into<String>,
        newsletter_id: impl Into<String>,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into().trim().to_string(),
            newsletter_id: newsletter_id.into().trim().to_string(),
            opened_at,
            utm: UtmFields::default(),
        }
    }

    #[must_use]
    pub fn with_utm(mut self, utm: UtmFields) -> Self {
        self.utm = utm.normalized();
        self
    }

    /// Check the fields the tracker cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MissingField`] naming the first empty field.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.email.trim().is_empty() {
            return Err(TrackerError::MissingField { field: "email" });
        }
        if self.newsletter_id.trim().is_empty() {
            return Err(TrackerError::MissingField { field: "id" });
        }
        Ok(())
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

/// Webhook body (or query string) for an open ping.
///
/// Field names follow the public webhook contract: `id` is the newsletter
/// resource id and UTM fields are flat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_channel: Option<String>,
    /// Delivery time. Absent on live pings, where receipt time is used.
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
}

impl WebhookPayload {
    /// Convert into a validated [`OpenEvent`], stamping `received_at` when
    /// the payload carries no timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MissingField`] when `email` or `id` is absent
    /// or blank.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<OpenEvent, TrackerError> {
        let event = OpenEvent::new(
            self.email.unwrap_or_default(),
            self.id.unwrap_or_default(),
            self.opened_at.unwrap_or(received_at),
        )
        .with_utm(UtmFields {
            source: self.utm_source,
            medium: self.utm_medium,
            campaign: self.utm_campaign,
            channel: self.utm_channel,
        });
        event.validate()?;
        Ok(event)
    }
}

/// Deterministic dedup key for an open event, excluding its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    canonical: String,
    digest: blake3::Hash,
}

impl Fingerprint {
    #[must_use]
    pub fn of(event: &OpenEvent) -> Self {
        // Object keys serialize in sorted order, so the encoding is stable.
        let canonical = serde_json::json!({
            "email": event.email,
            "id": event.newsletter_id,
            "utm_source": event.utm.source,
            "utm_medium": event.utm.medium,
            "utm_campaign": event.utm.campaign,
            "utm_channel": event.utm.channel,
        })
        .to_string();
        let digest = blake3::hash(canonical.as_bytes());
        Self { canonical, digest }
    }

    /// The serialized field set the digest was computed from.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    #[must_use]
    pub const fn digest(&self) -> &blake3::Hash {
        &self.digest
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake3:{}", self.digest.to_hex())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
