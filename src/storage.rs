//! JSON-file storage layer for contact messages.
//!
//! The canonical message list lives in a single `messages.json` file under
//! the data directory, newest first. Every mutation does a full
//! read-modify-write of that file without locking: concurrent writers can
//! lose updates (last writer wins on the full-file overwrite). That race is
//! an accepted limitation for this low-traffic service and is deliberately
//! not papered over here.
//!
//! Failure semantics are asymmetric: read failures (missing file, corrupt
//! JSON, i/o errors) are logged and degrade to an empty store, while write
//! failures propagate as [`StorageError`] so data is never silently lost.
//!
//! Side files, both under the same data directory:
//!
//! - `backups/messages-YYYY-MM-DD.json` - full snapshot, written at most
//!   once per calendar day and never overwritten afterwards
//! - `messages-YYYY-MM-DD.csv` - regenerated on every CSV export

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{DomainCount, Message, MessageStats, MessageStatus, NewMessage, SOURCE_TAG};

/// How many messages [`MessageStats::recent_messages`] carries.
const RECENT_MESSAGES: usize = 10;

/// How many domains [`MessageStats::top_domains`] carries.
const TOP_DOMAINS: usize = 5;

/// File-backed message store rooted at a data directory.
#[derive(Clone)]
pub struct MessageStore {
    data_dir: PathBuf,
}

impl MessageStore {
    /// Create a store rooted at `data_dir`. Directories are created lazily
    /// on the first write, so construction never touches the filesystem.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn messages_file(&self) -> PathBuf {
        self.data_dir.join("messages.json")
    }

    fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    async fn ensure_dirs(&self) -> io::Result<()> {
        // Creates the data directory as a side effect.
        fs::create_dir_all(self.backups_dir()).await
    }

    /// Load the full message list. Any failure degrades to an empty list.
    async fn load(&self) -> Vec<Message> {
        let path = self.messages_file();
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "message file unreadable, treating store as empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read message file, treating store as empty");
                Vec::new()
            }
        }
    }

    /// Persist the full message list. Write failures propagate.
    async fn save(&self, messages: &[Message]) -> Result<(), StorageError> {
        self.ensure_dirs().await?;
        let json = serde_json::to_string_pretty(messages)?;
        fs::write(self.messages_file(), json).await?;
        Ok(())
    }

    /// Store a new message: assign a unique id and the current timestamp,
    /// set status to `new`, prepend, persist and trigger the daily backup.
    ///
    /// Returns the assigned id.
    pub async fn add(&self, new: NewMessage) -> Result<String, StorageError> {
        self.add_at(new, Utc::now()).await
    }

    /// Like [`MessageStore::add`] with an explicit creation timestamp.
    pub async fn add_at(
        &self,
        new: NewMessage,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let mut messages = self.load().await;

        let message = Message {
            // UUIDv7: millisecond time component plus random bits, so ids
            // are unique across the store's lifetime and never reused.
            id: Uuid::now_v7().to_string(),
            name: new.name,
            email: new.email,
            subject: new.subject,
            message: new.message,
            timestamp: now,
            ip: new.ip,
            user_agent: new.user_agent,
            status: MessageStatus::New,
            source: SOURCE_TAG.to_string(),
        };
        let id = message.id.clone();

        messages.insert(0, message);
        self.save(&messages).await?;
        self.daily_backup(&messages, now.date_naive()).await;

        Ok(id)
    }

    /// Return up to `limit` most-recent messages, newest first.
    pub async fn list(&self, limit: Option<usize>) -> Vec<Message> {
        let messages = self.load().await;
        match limit {
            Some(n) => messages.into_iter().take(n).collect(),
            None => messages,
        }
    }

    /// Look up a single message by id.
    pub async fn get_by_id(&self, id: &str) -> Option<Message> {
        self.load().await.into_iter().find(|m| m.id == id)
    }

    /// Overwrite the status of a message in place and persist.
    ///
    /// Returns `false` without touching the file when the id is unknown.
    /// Any status value is accepted at any time; transitions are not
    /// enforced.
    pub async fn update_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> Result<bool, StorageError> {
        let mut messages = self.load().await;

        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        message.status = status;

        self.save(&messages).await?;
        Ok(true)
    }

    /// Compute aggregate statistics over the full current list.
    pub async fn stats(&self) -> MessageStats {
        self.stats_at(Utc::now()).await
    }

    /// Like [`MessageStore::stats`] with a pinned reference time.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> MessageStats {
        let messages = self.load().await;
        compute_stats(&messages, now)
    }

    /// Render all messages as CSV, persist a dated copy under the data
    /// directory and return the CSV text.
    pub async fn export_csv(&self) -> Result<String, StorageError> {
        self.export_csv_at(Utc::now()).await
    }

    /// Like [`MessageStore::export_csv`] with a pinned reference time.
    pub async fn export_csv_at(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let messages = self.load().await;
        let csv = render_csv(&messages);

        self.ensure_dirs().await?;
        let path = self
            .data_dir
            .join(format!("messages-{}.csv", now.date_naive()));
        fs::write(&path, &csv).await?;

        Ok(csv)
    }

    /// Write the daily snapshot if today's backup file does not exist yet.
    ///
    /// Idempotent per calendar day, never overwritten after the first write.
    /// Backup failures are logged and swallowed so the triggering add still
    /// succeeds.
    async fn daily_backup(&self, messages: &[Message], date: NaiveDate) {
        let path = self.backups_dir().join(format!("messages-{date}.json"));

        match fs::try_exists(&path).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "daily backup check failed");
                return;
            }
        }

        let json = match serde_json::to_string_pretty(messages) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "daily backup encoding failed");
                return;
            }
        };

        if let Err(e) = fs::write(&path, json).await {
            warn!(path = %path.display(), error = %e, "daily backup write failed");
        }
    }
}

/// Aggregate the full message list into [`MessageStats`].
fn compute_stats(messages: &[Message], now: DateTime<Utc>) -> MessageStats {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let week_start = now - chrono::Duration::days(7);
    let month_start = now
        .date_naive()
        .with_day(1)
        .unwrap_or_else(|| now.date_naive())
        .and_time(NaiveTime::MIN)
        .and_utc();

    let today = messages.iter().filter(|m| m.timestamp >= day_start).count();
    let this_week = messages
        .iter()
        .filter(|m| m.timestamp >= week_start)
        .count();
    let this_month = messages
        .iter()
        .filter(|m| m.timestamp >= month_start)
        .count();

    let mut by_status = std::collections::BTreeMap::new();
    for message in messages {
        *by_status.entry(message.status).or_insert(0) += 1;
    }

    MessageStats {
        total: messages.len(),
        today,
        this_week,
        this_month,
        by_status,
        top_domains: top_domains(messages),
        recent_messages: messages.iter().take(RECENT_MESSAGES).cloned().collect(),
    }
}

/// Top sender domains by frequency. The sort is stable, so domains with
/// equal counts keep the order in which they were first encountered.
fn top_domains(messages: &[Message]) -> Vec<DomainCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for message in messages {
        let Some(domain) = message.email.split('@').nth(1) else {
            continue;
        };
        let domain = domain.to_lowercase();
        if domain.is_empty() {
            continue;
        }
        if !counts.contains_key(&domain) {
            order.push(domain.clone());
        }
        *counts.entry(domain).or_insert(0) += 1;
    }

    let mut domains: Vec<DomainCount> = order
        .into_iter()
        .map(|domain| {
            let count = counts[&domain];
            DomainCount { domain, count }
        })
        .collect();
    domains.sort_by(|a, b| b.count.cmp(&a.count));
    domains.truncate(TOP_DOMAINS);
    domains
}

/// Render the full list as CSV: header row plus one row per message.
///
/// Free-text fields are wrapped in quotes with inner quotes doubled.
fn render_csv(messages: &[Message]) -> String {
    let mut lines = Vec::with_capacity(messages.len() + 1);
    lines.push("ID,Name,Email,Subject,Message,Date,Status,IP".to_string());

    for m in messages {
        lines.push(format!(
            "{},{},{},{},{},{},{},{}",
            m.id,
            csv_quote(&m.name),
            m.email,
            csv_quote(&m.subject),
            csv_quote(&m.message),
            m.timestamp.format("%Y-%m-%d %H:%M:%S"),
            m.status.as_str(),
            m.ip.as_deref().unwrap_or("")
        ));
    }

    lines.join("\n")
}

fn csv_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (MessageStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (MessageStore::new(dir.path()), dir)
    }

    fn sample_message(name: &str, email: &str) -> NewMessage {
        NewMessage {
            name: name.to_string(),
            email: email.to_string(),
            subject: "Hello?".to_string(),
            message: "1234567890".to_string(),
            ip: Some("203.0.113.7".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_add_then_get_by_id() {
        let (store, _dir) = test_store();
        let before = Utc::now();

        let id = store.add(sample_message("Jo", "jo@x.com")).await.unwrap();
        let message = store.get_by_id(&id).await.unwrap();

        assert_eq!(message.status, MessageStatus::New);
        assert_eq!(message.source, SOURCE_TAG);
        assert!(message.timestamp >= before);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (store, _dir) = test_store();

        let first = store.add(sample_message("A", "a@x.com")).await.unwrap();
        let second = store.add(sample_message("B", "b@x.com")).await.unwrap();
        let third = store.add(sample_message("C", "c@x.com")).await.unwrap();

        let messages = store.list(None).await;
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![third.as_str(), second.as_str(), first.as_str()]);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let (store, _dir) = test_store();
        for i in 0..4 {
            store
                .add(sample_message(&format!("N{i}"), "n@x.com"))
                .await
                .unwrap();
        }

        assert_eq!(store.list(Some(2)).await.len(), 2);
        assert_eq!(store.list(None).await.len(), 4);
    }

    #[tokio::test]
    async fn test_update_status_unknown_id_is_a_noop() {
        let (store, _dir) = test_store();
        store.add(sample_message("Jo", "jo@x.com")).await.unwrap();
        let before = store.list(None).await;

        let updated = store
            .update_status("no-such-id", MessageStatus::Read)
            .await
            .unwrap();

        assert!(!updated);
        let after = store.list(None).await;
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].id, after[0].id);
        assert_eq!(before[0].status, after[0].status);
    }

    #[tokio::test]
    async fn test_update_status_overwrites_in_place() {
        let (store, _dir) = test_store();
        let id = store.add(sample_message("Jo", "jo@x.com")).await.unwrap();

        assert!(store.update_status(&id, MessageStatus::Read).await.unwrap());
        assert_eq!(
            store.get_by_id(&id).await.unwrap().status,
            MessageStatus::Read
        );

        // Any value is accepted at any time, including going "backwards".
        assert!(store.update_status(&id, MessageStatus::New).await.unwrap());
        assert_eq!(
            store.get_by_id(&id).await.unwrap().status,
            MessageStatus::New
        );
    }

    #[tokio::test]
    async fn test_stats_totals_are_consistent() {
        let (store, _dir) = test_store();
        for i in 0..3 {
            store
                .add(sample_message(&format!("N{i}"), "n@example.com"))
                .await
                .unwrap();
        }
        let id = store.add(sample_message("R", "r@other.org")).await.unwrap();
        store
            .update_status(&id, MessageStatus::Replied)
            .await
            .unwrap();

        let stats = store.stats().await;

        assert_eq!(stats.total, store.list(None).await.len());
        assert_eq!(stats.by_status.values().sum::<usize>(), stats.total);
        assert_eq!(stats.by_status[&MessageStatus::New], 3);
        assert_eq!(stats.by_status[&MessageStatus::Replied], 1);
        assert_eq!(stats.today, 4);
        assert_eq!(stats.this_week, 4);
        assert_eq!(stats.recent_messages.len(), 4);
    }

    #[tokio::test]
    async fn test_stats_period_counts_exclude_old_messages() {
        let (store, _dir) = test_store();
        let now = Utc::now();

        store
            .add_at(sample_message("Old", "old@x.com"), now - chrono::Duration::days(40))
            .await
            .unwrap();
        store
            .add_at(sample_message("LastWeek", "w@x.com"), now - chrono::Duration::days(3))
            .await
            .unwrap();
        store.add_at(sample_message("Now", "n@x.com"), now).await.unwrap();

        let stats = store.stats_at(now).await;

        assert_eq!(stats.total, 3);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.this_week, 2);
    }

    #[tokio::test]
    async fn test_top_domains_ranked_with_stable_ties() {
        let (store, _dir) = test_store();

        // first.org appears before tied.net, both with one message;
        // big.com wins with two.
        store.add(sample_message("A", "a@first.org")).await.unwrap();
        store.add(sample_message("B", "b@BIG.com")).await.unwrap();
        store.add(sample_message("C", "c@tied.net")).await.unwrap();
        store.add(sample_message("D", "d@big.com")).await.unwrap();

        let stats = store.stats().await;
        let domains: Vec<&str> = stats
            .top_domains
            .iter()
            .map(|d| d.domain.as_str())
            .collect();

        assert_eq!(stats.top_domains[0].count, 2);
        assert_eq!(domains[0], "big.com");
        // Newest-first list order means tied.net is encountered before
        // first.org when scanning the stored list.
        assert_eq!(domains[1], "tied.net");
        assert_eq!(domains[2], "first.org");
    }

    #[tokio::test]
    async fn test_csv_doubles_embedded_quotes() {
        let (store, _dir) = test_store();
        let mut message = sample_message("Jo", "jo@x.com");
        message.subject = "He said \"hi\"".to_string();
        store.add(message).await.unwrap();

        let csv = store.export_csv().await.unwrap();

        assert!(csv.starts_with("ID,Name,Email,Subject,Message,Date,Status,IP"));
        assert!(csv.contains("\"He said \"\"hi\"\"\""));
    }

    #[tokio::test]
    async fn test_csv_is_persisted_to_a_dated_file() {
        let (store, dir) = test_store();
        store.add(sample_message("Jo", "jo@x.com")).await.unwrap();

        let now = Utc::now();
        let csv = store.export_csv_at(now).await.unwrap();

        let path = dir
            .path()
            .join(format!("messages-{}.csv", now.date_naive()));
        let on_disk = std::fs::read_to_string(path).unwrap();
        assert_eq!(csv, on_disk);
    }

    #[tokio::test]
    async fn test_daily_backup_is_write_once() {
        let (store, dir) = test_store();

        store.add(sample_message("A", "a@x.com")).await.unwrap();
        store.add(sample_message("B", "b@x.com")).await.unwrap();

        let date = Utc::now().date_naive();
        let backup = dir
            .path()
            .join("backups")
            .join(format!("messages-{date}.json"));
        let snapshot: Vec<Message> =
            serde_json::from_str(&std::fs::read_to_string(backup).unwrap()).unwrap();

        // The snapshot was taken on the first add and never overwritten.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "A");
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let (store, _dir) = test_store();

        assert!(store.list(None).await.is_empty());
        assert!(store.get_by_id("anything").await.is_none());
        assert_eq!(store.stats().await.total, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let (store, dir) = test_store();
        std::fs::write(dir.path().join("messages.json"), "not json at all").unwrap();

        assert!(store.list(None).await.is_empty());

        // A subsequent add starts over from the empty state.
        store.add(sample_message("Jo", "jo@x.com")).await.unwrap();
        assert_eq!(store.list(None).await.len(), 1);
    }
}
