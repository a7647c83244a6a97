//! Postbox - contact-message intake, storage and email reporting.
//!
//! # Overview
//!
//! Postbox backs a personal portfolio site: it accepts contact-form
//! submissions, persists them to a single JSON file, serves admin views
//! over the stored messages and periodically emails an HTML report with a
//! CSV export attached.
//!
//! The persistence layer is intentionally simple: one `messages.json` file
//! read-modify-written whole on every change, a write-once daily backup
//! snapshot and a dated CSV export. There is no locking; concurrent writes
//! race and the last writer wins, which is accepted for this traffic level.
//!
//! # Modules
//!
//! - [`model`]: message, stats and API payload types
//! - [`error`]: error taxonomy and HTTP status mapping
//! - [`storage`]: JSON-file message store
//! - [`rate_limit`]: fixed-window submission throttle
//! - [`mailer`]: email capability boundary (transactional API or SMTP relay)
//! - [`intake`]: contact submission pipeline
//! - [`report`]: report building, HTML rendering and delivery
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod error;
pub mod intake;
pub mod mailer;
pub mod model;
pub mod rate_limit;
pub mod report;
pub mod storage;
