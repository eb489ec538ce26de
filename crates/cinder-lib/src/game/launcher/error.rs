/// Launch failure taxonomy and the per-attempt error sink
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a launch attempt failed. One of these (at most) is surfaced per
/// attempt; concurrent sub-task failures past the first are logged only.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("error downloading {url}")]
    Downloading {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("SHA-1 mismatch for {path}: expected {expected}, got {actual}")]
    ShaMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("could not create {path}")]
    CreatingFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not fetch access token")]
    AccessTokenFetch {
        #[source]
        source: anyhow::Error,
    },

    #[error("launch cancelled")]
    Cancelled,

    #[error("instance {instance_id} is already running")]
    AlreadyRunning { instance_id: String },

    #[error("launch failed")]
    Unknown {
        #[source]
        source: anyhow::Error,
    },
}

impl LaunchError {
    /// Cancellation is a user action, not a fault worth surfacing loudly
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LaunchError::Cancelled)
    }
}

/// Collects the first error of a launch attempt. Concurrent download tasks
/// can all fail around the same time; only the first failure is delivered
/// to the listener, the rest are demoted to log lines.
#[derive(Clone)]
pub struct ErrorSink {
    tripped: Arc<AtomicBool>,
    sender: tokio::sync::mpsc::UnboundedSender<LaunchError>,
}

impl ErrorSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<LaunchError>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                tripped: Arc::new(AtomicBool::new(false)),
                sender,
            },
            receiver,
        )
    }

    /// Report an error. Returns true if this was the surfaced one.
    pub fn report(&self, error: LaunchError) -> bool {
        if self.tripped.swap(true, Ordering::SeqCst) {
            log::debug!("Suppressing follow-up launch error: {}", error);
            return false;
        }

        if error.is_cancellation() {
            log::info!("Launch cancelled");
        } else {
            log::error!("Launch failed: {}", error);
        }

        // The receiver may already be gone if the caller abandoned the attempt
        let _ = self.sender.send(error);
        true
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}
