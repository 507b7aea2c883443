use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Upload progress of one submission, as a percentage that never decreases.
///
/// 100 means every body byte has been handed to the connection. Server-side
/// processing happens after that and is not reflected here.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    total: AtomicU64,
    sent: AtomicU64,
    percent: watch::Sender<u8>,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgress {
    pub fn new() -> Self {
        let (percent, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                total: AtomicU64::new(0),
                sent: AtomicU64::new(0),
                percent,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.inner.percent.subscribe()
    }

    /// Number of bytes the upload will carry
    pub fn set_total(&self, total: u64) {
        self.inner.total.store(total, Ordering::SeqCst);
        self.inner.sent.store(0, Ordering::SeqCst);
    }

    /// Record bytes handed to the connection
    pub fn advance(&self, bytes: u64) {
        let sent = self.inner.sent.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let total = self.inner.total.load(Ordering::SeqCst);
        if total == 0 {
            return;
        }
        let percent = if sent >= total {
            100
        } else {
            // Stays below 100 until the last byte is out
            ((sent * 100 / total) as u8).min(99)
        };
        self.raise(percent);
    }

    /// Mark the upload finished, including bodies with no file content
    pub fn complete(&self) {
        self.raise(100);
    }

    pub fn percent(&self) -> u8 {
        *self.inner.percent.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.percent() == 100
    }

    fn raise(&self, percent: u8) {
        self.inner.percent.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }
}
