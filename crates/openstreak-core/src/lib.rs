//! openstreak-core library.
//!
//! Daily reading streaks for newsletter readers: a pure streak engine, a
//! short-lived dedup guard for webhook retries, and the SQLite store the
//! tracker persists into.
//!
//! # Conventions
//!
//! - **Errors**: [`TrackerError`] at the tracker boundary; `anyhow::Result`
//!   with context for store setup and reporting queries.
//! - **Logging**: `tracing` macros with structured fields (`reader`,
//!   `outcome`, streak values).

pub mod calendar;
pub mod config;
pub mod db;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod tracker;

pub use dedup::{DedupStore, InMemoryDedup};
pub use engine::{StreakOutcome, Transition, apply_open};
pub use error::{ErrorCode, TrackerError};
pub use event::{OpenEvent, UtmFields, WebhookPayload};
pub use ledger::{LedgerSnapshot, StreakLedger};
pub use tracker::{ProcessOutcome, Tracker, get_ledger};
