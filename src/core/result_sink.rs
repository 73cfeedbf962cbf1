use crate::utils::error::{GatewayError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Single-assignment delivery slot for one request's result.
///
/// The first `resolve`/`resolve_error` wins. Later calls change nothing and
/// return [`GatewayError::AlreadyResolved`].
pub struct ResultSink<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>,
}

impl<T> Clone for ResultSink<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> ResultSink<T> {
    pub fn channel() -> (Self, SinkReceiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            SinkReceiver { receiver },
        )
    }

    pub fn resolve(&self, value: T) -> Result<()> {
        self.complete(Ok(value))
    }

    pub fn resolve_error(&self, err: GatewayError) -> Result<()> {
        self.complete(Err(err))
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }

    fn complete(&self, result: Result<T>) -> Result<()> {
        let sender = self.sender.lock().take();
        let Some(sender) = sender else {
            tracing::warn!("result sink already resolved, ignoring late completion");
            return Err(GatewayError::AlreadyResolved);
        };

        if sender.send(result).is_err() {
            tracing::debug!("caller stopped waiting before the result was delivered");
        }
        Ok(())
    }
}

pub struct SinkReceiver<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> SinkReceiver<T> {
    /// Waits for the sink to be resolved.
    pub async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(GatewayError::SinkDropped))
    }
}
