//! Report generation: trends over the message store, HTML rendering and
//! email delivery with a CSV attachment.
//!
//! [`render_html`] is a pure function of the report value, so a report
//! built from an unchanged message list with a pinned reference time
//! renders to byte-identical output every time.
//!
//! The sending entry points resolve to a plain `bool` and never raise past
//! this module, so API routes and the scheduled trigger can branch without
//! error handling of their own.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::mailer::{EmailAttachment, Mailer, OutgoingEmail};
use crate::model::{Message, MessageStats, MessageStatus};
use crate::storage::MessageStore;

/// Days covered by the daily trend, including today.
const TREND_DAYS: i64 = 7;

/// Maximum rows in the recent-messages table.
const TABLE_ROWS: usize = 10;

/// Subjects longer than this are truncated with an ellipsis in the table.
const SUBJECT_CHARS: usize = 40;

/// Bar height (percent) used when the whole trend window is zero.
const EMPTY_BAR_HEIGHT: f64 = 20.0;

/// Messages received on one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    /// Day label, `DD/MM`.
    pub date: String,
    pub count: usize,
}

/// One status slice of the distribution breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSlice {
    pub status: MessageStatus,
    pub count: usize,
    /// Share of all messages, rounded to the nearest integer percent.
    /// Zero total yields zero for every slice.
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    /// Per-day counts for the last 7 calendar days, oldest first.
    pub daily_count: Vec<DailyCount>,
    /// Fixed-order (new, read, replied) status breakdown.
    pub status_distribution: Vec<StatusSlice>,
}

/// A derived report document: a stats snapshot plus trend data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Period label, e.g. "Message report for 2026-08-23".
    pub period: String,
    /// Reference time the report was built against.
    pub generated_at: DateTime<Utc>,
    pub stats: MessageStats,
    /// The 10 most recent messages, newest first.
    pub recent_messages: Vec<Message>,
    pub trends: Trends,
}

/// Build a report from the current store contents.
pub async fn build_report(store: &MessageStore) -> Report {
    build_report_at(store, Utc::now()).await
}

/// Like [`build_report`] with a pinned reference time.
pub async fn build_report_at(store: &MessageStore, now: DateTime<Utc>) -> Report {
    let stats = store.stats_at(now).await;
    let messages = store.list(None).await;

    let daily_count = (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let day = now.date_naive() - Duration::days(offset);
            let count = messages
                .iter()
                .filter(|m| m.timestamp.date_naive() == day)
                .count();
            DailyCount {
                date: day.format("%d/%m").to_string(),
                count,
            }
        })
        .collect();

    let total = stats.total;
    let status_distribution = [
        MessageStatus::New,
        MessageStatus::Read,
        MessageStatus::Replied,
    ]
    .into_iter()
    .map(|status| {
        let count = stats.by_status.get(&status).copied().unwrap_or(0);
        let percentage = if total > 0 {
            (count as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        StatusSlice {
            status,
            count,
            percentage,
        }
    })
    .collect();

    Report {
        period: format!("Message report for {}", now.date_naive()),
        generated_at: now,
        recent_messages: stats.recent_messages.clone(),
        stats,
        trends: Trends {
            daily_count,
            status_distribution,
        },
    }
}

/// Render the report as a standalone HTML document.
pub fn render_html(report: &Report) -> String {
    let stats = &report.stats;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{period}</title>
  <style>
    body {{ font-family: 'Segoe UI', Tahoma, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 20px; background: #f8fafc; }}
    .header {{ background: linear-gradient(135deg, #7c3aed 0%, #a855f7 100%); color: white; padding: 30px; border-radius: 12px; text-align: center; margin-bottom: 30px; }}
    .stats-grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 16px; margin-bottom: 30px; }}
    .stat-card {{ background: white; padding: 20px; border-radius: 12px; text-align: center; border-left: 4px solid #7c3aed; }}
    .stat-number {{ font-size: 32px; font-weight: bold; color: #7c3aed; }}
    .stat-label {{ color: #6b7280; font-size: 13px; text-transform: uppercase; }}
    .section {{ background: white; padding: 24px; border-radius: 12px; margin-bottom: 24px; }}
    .daily-chart {{ display: flex; align-items: flex-end; height: 150px; gap: 8px; margin-top: 16px; }}
    .daily-bar {{ background: linear-gradient(to top, #7c3aed, #a855f7); border-radius: 4px 4px 0 0; flex: 1; color: white; font-size: 12px; text-align: center; }}
    .day-labels {{ display: flex; justify-content: space-between; margin-top: 8px; font-size: 12px; color: #6b7280; }}
    .status-item {{ display: flex; justify-content: space-between; align-items: center; padding: 10px 0; border-bottom: 1px solid #e5e7eb; }}
    .status-bar {{ height: 8px; background: #e5e7eb; border-radius: 4px; flex: 1; margin: 0 12px; }}
    .status-fill {{ height: 100%; background: #7c3aed; border-radius: 4px; }}
    table {{ width: 100%; border-collapse: collapse; }}
    th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid #e5e7eb; }}
    th {{ background: #f9fafb; color: #374151; }}
    .footer {{ text-align: center; color: #6b7280; font-size: 13px; margin-top: 32px; }}
  </style>
</head>
<body>
  <div class="header">
    <h1>{period}</h1>
    <p>Contact message report</p>
  </div>
  <div class="stats-grid">
    <div class="stat-card"><div class="stat-number">{total}</div><div class="stat-label">Total messages</div></div>
    <div class="stat-card"><div class="stat-number">{today}</div><div class="stat-label">Today</div></div>
    <div class="stat-card"><div class="stat-number">{week}</div><div class="stat-label">This week</div></div>
    <div class="stat-card"><div class="stat-number">{month}</div><div class="stat-label">This month</div></div>
  </div>
  <div class="section">
    <h2>Messages per day (last 7 days)</h2>
    <div class="daily-chart">{bars}</div>
    <div class="day-labels">{day_labels}</div>
  </div>
  <div class="section">
    <h2>Status distribution</h2>
    {status_list}
  </div>
{domains_section}{messages_section}  <div class="footer">
    <p>Report generated at {generated_at} UTC</p>
  </div>
</body>
</html>"#,
        period = report.period,
        total = stats.total,
        today = stats.today,
        week = stats.this_week,
        month = stats.this_month,
        bars = daily_bars(&report.trends.daily_count),
        day_labels = day_labels(&report.trends.daily_count),
        status_list = status_list(&report.trends.status_distribution),
        domains_section = domains_section(stats),
        messages_section = messages_section(&report.recent_messages),
        generated_at = report.generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Bar-chart bars, height proportional to the window maximum.
fn daily_bars(days: &[DailyCount]) -> String {
    let max = days.iter().map(|d| d.count).max().unwrap_or(0);

    days.iter()
        .map(|day| {
            let height = if max > 0 {
                day.count as f64 / max as f64 * 100.0
            } else {
                EMPTY_BAR_HEIGHT
            };
            let label = if day.count > 0 {
                day.count.to_string()
            } else {
                String::new()
            };
            format!(
                r#"<div class="daily-bar" style="height: {height:.0}%" title="{date}: {count} messages">{label}</div>"#,
                date = day.date,
                count = day.count,
            )
        })
        .collect()
}

fn day_labels(days: &[DailyCount]) -> String {
    days.iter()
        .map(|day| format!("<span>{}</span>", day.date))
        .collect()
}

fn status_list(slices: &[StatusSlice]) -> String {
    slices
        .iter()
        .map(|slice| {
            format!(
                r#"<div class="status-item"><span>{label}</span><div class="status-bar"><div class="status-fill" style="width: {pct}%"></div></div><span><strong>{count}</strong> ({pct}%)</span></div>"#,
                label = slice.status.label(),
                pct = slice.percentage,
                count = slice.count,
            )
        })
        .collect()
}

/// Top-domain list; omitted entirely when no domains are known.
fn domains_section(stats: &MessageStats) -> String {
    if stats.top_domains.is_empty() {
        return String::new();
    }

    let items: String = stats
        .top_domains
        .iter()
        .map(|d| {
            format!(
                r#"<div class="status-item"><span><strong>@{}</strong></span><span>{} message{}</span></div>"#,
                d.domain,
                d.count,
                if d.count == 1 { "" } else { "s" }
            )
        })
        .collect();

    format!(
        r#"  <div class="section">
    <h2>Top email domains</h2>
    {items}
  </div>
"#
    )
}

/// Recent-messages table; omitted entirely when the store is empty.
fn messages_section(messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let rows: String = messages
        .iter()
        .take(TABLE_ROWS)
        .map(|m| {
            format!(
                "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                m.name,
                m.email,
                truncate_subject(&m.subject),
                m.timestamp.format("%Y-%m-%d"),
                m.status.label(),
            )
        })
        .collect();

    format!(
        r#"  <div class="section">
    <h2>Recent messages</h2>
    <table>
      <thead><tr><th>Name</th><th>Email</th><th>Subject</th><th>Date</th><th>Status</th></tr></thead>
      <tbody>{rows}</tbody>
    </table>
  </div>
"#
    )
}

fn truncate_subject(subject: &str) -> String {
    if subject.chars().count() > SUBJECT_CHARS {
        let truncated: String = subject.chars().take(SUBJECT_CHARS).collect();
        format!("{truncated}...")
    } else {
        subject.to_string()
    }
}

/// Render and email a prebuilt report with the CSV export attached.
///
/// Returns `true` only when the mail provider confirms delivery; any
/// failure (export, configuration, send) is logged and yields `false`.
pub async fn send_report(store: &MessageStore, mailer: &dyn Mailer, report: &Report) -> bool {
    let html = render_html(report);

    let csv = match store.export_csv_at(report.generated_at).await {
        Ok(csv) => csv,
        Err(e) => {
            warn!(error = %e, "csv export failed, report not sent");
            return false;
        }
    };

    let email = OutgoingEmail {
        subject: report.period.clone(),
        html,
        text: None,
        attachment: Some(EmailAttachment {
            filename: format!("messages-{}.csv", report.generated_at.date_naive()),
            content: csv,
        }),
    };

    match mailer.send(&email).await {
        Ok(()) => {
            info!(period = %report.period, "report emailed");
            true
        }
        Err(e) => {
            warn!(error = %e, "report delivery failed");
            false
        }
    }
}

/// Build, render and send in one step. Never raises; the caller branches on
/// the returned bool.
pub async fn generate_and_send(store: &MessageStore, mailer: &dyn Mailer) -> bool {
    let report = build_report(store).await;
    send_report(store, mailer, &report).await
}
