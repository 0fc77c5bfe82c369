use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct WorkerRunner;

impl WorkerRunner {
    /// Returns a token that is cancelled on Ctrl+C (and SIGTERM on unix).
    ///
    /// Long-running loops select on `token.cancelled()` at their suspension
    /// points and finish the work in hand before returning.
    pub fn shutdown_token() -> CancellationToken {
        let token = CancellationToken::new();
        Self::cancel_on_signal(token.clone());
        token
    }

    /// Spawns a listener that cancels `token` on the first shutdown signal.
    pub fn cancel_on_signal(token: CancellationToken) {
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => info!("🛑 Received Ctrl+C. Finishing current tick..."),
                    Err(err) => {
                        error!("Unable to listen for shutdown signal: {}", err);
                        return;
                    }
                },
                _ = terminate() => info!("🛑 Received SIGTERM. Finishing current tick..."),
                _ = token.cancelled() => return,
            }
            token.cancel();
        });
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            error!("Unable to listen for SIGTERM: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_exits_when_token_cancelled_elsewhere() {
        let token = WorkerRunner::shutdown_token();
        assert!(!token.is_cancelled());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
    }
}
