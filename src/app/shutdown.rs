use super::{ComponentState, KioskOrchestrator};
use crate::error::{Result, RollcallError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

impl KioskOrchestrator {
    /// Stop every component, most dependent first
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard_handler) = self.keyboard_handler.take() {
            let stopped = self
                .stop_component("keyboard", Duration::from_secs(2), async move {
                    keyboard_handler.stop().await
                })
                .await;
            if let Err(e) = stopped {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        // Unmounts the current screen on its way out
        if let Some(navigator) = self.tasks.remove("navigator") {
            if let Err(e) = self
                .stop_component("navigator", Duration::from_secs(5), join(navigator))
                .await
            {
                error!("Error stopping navigator: {}", e);
                exit_code = 1;
            }
        }

        if let Some(probe) = self.reachability_probe.take() {
            let stopped = self
                .stop_component("reachability", Duration::from_secs(2), async move {
                    probe.stop().await;
                    Ok(())
                })
                .await;
            if let Err(e) = stopped {
                error!("Error stopping reachability probe: {}", e);
                exit_code = 1;
            }
        }

        if let Some(server) = self.tasks.remove("status_server") {
            if let Err(e) = self
                .stop_component("status_server", Duration::from_secs(5), join(server))
                .await
            {
                error!("Error stopping status server: {}", e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Run one component's stop future under a deadline and record the outcome
    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(RollcallError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

async fn join(handle: tokio::task::JoinHandle<()>) -> Result<()> {
    handle
        .await
        .map_err(|e| RollcallError::system(format!("task failed: {}", e)))
}
