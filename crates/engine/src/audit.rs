//! Background polling of the backend's shift-change audit feed.
//!
//! The poller owns one thread. Records arrive over a channel in batches, in
//! the order the feed returned them; the cursor only moves forward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use shiftgrid_protocol::AuditRecord;

use crate::backend::{AuditFeed, BackendError};
use crate::calendar::MonthKey;

/// Shutdown is checked at least this often while waiting between polls.
const SLICE: Duration = Duration::from_millis(50);

/// Fetch once and advance `cursor` past the newest record seen.
pub fn poll_once(
    feed: &dyn AuditFeed,
    month: MonthKey,
    cursor: &mut Option<DateTime<Utc>>,
) -> Result<Vec<AuditRecord>, BackendError> {
    let records = feed.fetch(month, *cursor)?;
    if let Some(newest) = records.iter().map(|r| r.changed_at).max() {
        if cursor.map_or(true, |c| newest > c) {
            *cursor = Some(newest);
        }
    }
    Ok(records)
}

pub struct AuditPoller {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    records: Receiver<Vec<AuditRecord>>,
}

impl AuditPoller {
    /// Start polling `feed` for `month` every `interval`. The first poll
    /// happens immediately.
    pub fn start(feed: Arc<dyn AuditFeed>, month: MonthKey, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let flag = shutdown.clone();
        let handle = thread::spawn(move || run_poller(feed, month, interval, flag, tx));
        log::info!("Audit poller started for {} every {:?}", month, interval);

        Self { shutdown, handle: Some(handle), records: rx }
    }

    /// Batches received so far, without blocking.
    pub fn try_recv(&self) -> Option<Vec<AuditRecord>> {
        self.records.try_recv().ok()
    }

    /// Wait up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<AuditRecord>> {
        self.records.recv_timeout(timeout).ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::info!("Audit poller stopped");
        }
    }
}

impl Drop for AuditPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_poller(
    feed: Arc<dyn AuditFeed>,
    month: MonthKey,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    tx: Sender<Vec<AuditRecord>>,
) {
    let mut cursor = None;

    while !shutdown.load(Ordering::SeqCst) {
        match poll_once(feed.as_ref(), month, &mut cursor) {
            Ok(records) if records.is_empty() => {}
            Ok(records) => {
                log::debug!("Audit feed delivered {} record(s)", records.len());
                if tx.send(records).is_err() {
                    // Receiver gone
                    return;
                }
            }
            Err(e) => log::error!("Audit feed poll for {} failed: {}", month, e),
        }

        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(SLICE.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}
