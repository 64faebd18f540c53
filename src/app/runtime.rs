use super::{KioskOrchestrator, ShutdownReason};
use crate::error::{Result, RollcallError};
use crate::events::{EventFilter, KioskEvent};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

async fn send_once(sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

impl KioskOrchestrator {
    /// Run until a signal or a `ShutdownRequested` event, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Kiosk is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| RollcallError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| RollcallError::system("Shutdown receiver already taken"))?;

        self.setup_shutdown_triggers(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| RollcallError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Kiosk shutdown complete");
        Ok(exit_code)
    }

    /// SIGTERM, SIGINT and `ShutdownRequested` all end [`run`](Self::run)
    fn setup_shutdown_triggers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender: SharedSender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // systemd stop
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_once(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
        }

        let sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_once(&sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });

        let sender = Arc::clone(&shutdown_sender);
        let mut events = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown",
        );
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(KioskEvent::ShutdownRequested { reason, .. }) => {
                            send_once(&sender, ShutdownReason::UserRequest(reason)).await;
                            break;
                        }
                        Ok(_) => {}
                        Err(crate::error::EventBusError::ChannelClosed) => break,
                        Err(_) => {}
                    },
                }
            }
        });
    }
}
