//! Externally-scheduled report trigger.
//!
//! Intended to run from cron, e.g. `0 9 * * 1` for Monday mornings. By
//! default it only proceeds when the UTC weekday is Monday; pass `--force`
//! to send regardless. Exits nonzero when the send fails so the scheduler
//! can alert.

use std::env;

use chrono::{Datelike, Utc, Weekday};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use postbox::mailer;
use postbox::report;
use postbox::storage::MessageStore;

const DEFAULT_DATA_DIR: &str = "data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("postbox=info".parse()?))
        .init();

    let force = env::args().any(|arg| arg == "--force");
    if !force && Utc::now().weekday() != Weekday::Mon {
        info!("weekly report only runs on Mondays; pass --force to send now");
        return Ok(());
    }

    let data_dir = env::var("POSTBOX_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    let store = MessageStore::new(data_dir);
    let mailer = mailer::from_env();

    if report::generate_and_send(&store, mailer.as_ref()).await {
        info!("weekly report sent");
        Ok(())
    } else {
        error!("weekly report failed");
        std::process::exit(1);
    }
}
