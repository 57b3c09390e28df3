//! Caller-owned cancellation for gateway requests.

use tokio::sync::watch;

/// Owner side: call `abort()` to cancel every request holding one of its signals.
pub struct AbortController {
    tx: watch::Sender<bool>,
}

/// Observer side, handed to `RequestOptions::signal`.
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal { AbortSignal { rx: self.tx.subscribe() } }

    pub fn abort(&self) { self.tx.send_replace(true); }

    pub fn is_aborted(&self) -> bool { *self.tx.borrow() }
}

impl Default for AbortController {
    fn default() -> Self { Self::new() }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool { *self.rx.borrow() }

    /// Resolves once the controller aborts. Never resolves if the controller is
    /// dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|v| *v).await.map(|_| ()).is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
