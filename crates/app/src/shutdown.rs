use std::{io, thread};

use crossbeam_channel::Sender;
use tokio::sync::mpsc;

/// Watches for SIGINT/SIGTERM on a background thread and sends one message on
/// `tx` when the first arrives. Later signals are swallowed so a second
/// Ctrl+C cannot cut the shutdown routine short.
pub fn watch_signals(tx: Sender<()>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signal-watch".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let (signal_tx, signals) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    loop {
                        shutdown_signal().await;
                        if signal_tx.send(()).is_err() {
                            break;
                        }
                    }
                });
                forward_first(signals, &tx).await;
            })
        })?;
    Ok(())
}

/// Turns the first signal into a shutdown request and absorbs the rest.
/// Returns the number of signals seen once the source closes.
async fn forward_first(mut signals: mpsc::UnboundedReceiver<()>, tx: &Sender<()>) -> usize {
    let mut received = 0;
    while signals.recv().await.is_some() {
        received += 1;
        if received == 1 {
            let _ = tx.try_send(());
        } else {
            tracing::debug!("shutdown already in progress");
        }
    }
    received
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_signals_request_shutdown_once() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        for _ in 0..3 {
            signal_tx.send(()).unwrap();
        }
        drop(signal_tx);

        assert_eq!(forward_first(signals, &tx).await, 3);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[tokio::test]
    async fn no_signal_means_no_shutdown() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (signal_tx, signals) = mpsc::unbounded_channel::<()>();
        drop(signal_tx);

        assert_eq!(forward_first(signals, &tx).await, 0);
        assert!(rx.try_recv().is_err());
    }
}
