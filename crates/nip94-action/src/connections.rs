use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::transport::{RelayError, RelayHandle};

/// Result of tearing down a [`ConnectionSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub closed: Vec<String>,
    pub failed: Vec<(String, RelayError)>,
}

/// Relay handles opened during one run, keyed by their position in the relay
/// list so teardown order does not depend on connect timing.
#[derive(Default)]
pub struct ConnectionSet {
    handles: Mutex<Vec<(usize, Arc<dyn RelayHandle>)>>,
    closed: AtomicBool,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, index: usize, handle: Arc<dyn RelayHandle>) {
        self.handles.lock().await.push((index, handle));
    }

    /// Close every registered handle once. Later calls return an empty
    /// report. A failure on one handle does not stop the others.
    pub async fn close_all(&self) -> CloseReport {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Connections already closed");
            return CloseReport::default();
        }

        let mut handles = std::mem::take(&mut *self.handles.lock().await);
        handles.sort_by_key(|(index, _)| *index);

        let mut report = CloseReport::default();
        for (_, handle) in handles {
            let url = handle.url().to_string();
            match handle.close().await {
                Ok(()) => {
                    debug!(relay = %url, "Closed relay connection");
                    report.closed.push(url);
                }
                Err(err) => {
                    warn!(relay = %url, error = %err, "Failed to close relay connection");
                    report.failed.push((url, err));
                }
            }
        }
        report
    }
}
