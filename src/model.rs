//! Data models for Postbox.
//!
//! The persisted wire format uses camelCase field names so existing
//! `messages.json` files and their daily backups stay readable by both the
//! dashboard and the report generator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag stamped on every stored message.
pub const SOURCE_TAG: &str = "portfolio";

/// Processing status of a stored message.
///
/// The dashboard advances messages `new -> read -> replied`, but the store
/// itself accepts any status at any time; these are labels, not an enforced
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Received and not yet looked at.
    New,
    /// Opened in the dashboard.
    Read,
    /// Answered by the owner.
    Replied,
}

impl MessageStatus {
    /// Lowercase wire name, as used in the persisted JSON and CSV export.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::New => "new",
            MessageStatus::Read => "read",
            MessageStatus::Replied => "replied",
        }
    }

    /// Human-readable label for report rendering.
    pub fn label(self) -> &'static str {
        match self {
            MessageStatus::New => "New",
            MessageStatus::Read => "Read",
            MessageStatus::Replied => "Replied",
        }
    }
}

/// One persisted contact-form submission.
///
/// `id`, `timestamp` and `status` are assigned by the store on creation;
/// only `status` is ever mutated afterwards. Messages are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique id, assigned at creation and never reused.
    pub id: String,

    /// Sender name (sanitized).
    pub name: String,

    /// Sender email, lowercased.
    pub email: String,

    /// Subject line.
    pub subject: String,

    /// Body text.
    pub message: String,

    /// Server-side creation timestamp (UTC), immutable once set.
    pub timestamp: DateTime<Utc>,

    /// Origin IP as seen at intake, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// User agent captured at intake, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Processing status.
    pub status: MessageStatus,

    /// Constant source tag (see [`SOURCE_TAG`]).
    pub source: String,
}

/// Input for [`crate::storage::MessageStore::add`]: a message before the
/// store assigns id, timestamp, status and source.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One email domain and how many messages came from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

/// Aggregate view over the full message list, recomputed on demand.
///
/// Never persisted; always derived from the current state of the store, so
/// it is consistent with the latest persisted list at computation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    /// Total number of stored messages.
    pub total: usize,

    /// Messages received since the start of the current UTC day.
    pub today: usize,

    /// Messages received in the last rolling 7 days.
    pub this_week: usize,

    /// Messages received since the first of the current month.
    pub this_month: usize,

    /// Message count per status. Only statuses that occur are present;
    /// the values always sum to `total`.
    pub by_status: BTreeMap<MessageStatus, usize>,

    /// Top 5 sender email domains by frequency. Ties keep the order in
    /// which the domain was first encountered.
    pub top_domains: Vec<DomainCount>,

    /// The 10 most recent messages, newest first.
    pub recent_messages: Vec<Message>,
}

/// Request body for POST /api/contact.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Standard `{success, message}` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Request body for PATCH /api/admin/messages.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub id: String,
    pub status: MessageStatus,
}

/// Query parameters for GET /api/admin/messages.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Maximum number of messages to return (all if unset).
    pub limit: Option<usize>,
}
