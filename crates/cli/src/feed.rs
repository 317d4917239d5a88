//! `sgrid feed`: follow the backend's audit feed for a month.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shiftgrid_backend_client::HttpBackend;
use shiftgrid_config::Settings;
use shiftgrid_engine::audit::AuditPoller;
use shiftgrid_engine::MonthKey;

use crate::CliError;

/// Print audit records as JSON lines. Runs until `polls` intervals have
/// elapsed, or forever when `polls` is `None`.
pub fn cmd_feed(
    year: i32,
    month: u32,
    interval: Option<u64>,
    polls: Option<u32>,
    settings: &Settings,
) -> Result<(), CliError> {
    let key = MonthKey::new(year, month).map_err(CliError::engine)?;
    let interval = interval.map(Duration::from_secs).unwrap_or_else(|| settings.poll_interval());
    if interval.is_zero() {
        return Err(CliError::args("--interval must be at least 1 second"));
    }

    let backend = HttpBackend::from_settings(settings).map_err(CliError::backend)?;
    let mut poller = AuditPoller::start(Arc::new(backend), key, interval);

    let deadline = polls.map(|n| Instant::now() + interval * n);
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                left.min(interval)
            }
            None => interval,
        };
        if let Some(records) = poller.recv_timeout(wait) {
            for record in records {
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("Cannot serialize audit record: {}", e),
                }
            }
        }
    }

    poller.stop();
    Ok(())
}
