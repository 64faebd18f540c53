use super::{ComponentState, KioskOrchestrator};
use crate::error::{Result, RollcallError};
use crate::events::EventFilter;
use crate::screens::Screen;
use tracing::{error, info};

impl KioskOrchestrator {
    /// Register every component this kiosk will run
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing kiosk components");

        let mut states = self.component_states.lock().await;
        states.insert("reachability".to_string(), ComponentState::Stopped);
        states.insert("navigator".to_string(), ComponentState::Stopped);

        #[cfg(feature = "status_server")]
        if self.status_server.is_some() {
            states.insert("status_server".to_string(), ComponentState::Stopped);
        }

        if self.keyboard_handler.is_some() {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all components and mount the first screen
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting kiosk against {}", self.config.backend.base_url);

        // The renderer should be able to connect before the first screen exists
        #[cfg(feature = "status_server")]
        if let Some(server) = &self.status_server {
            self.set_component_state("status_server", ComponentState::Starting)
                .await;

            let server = std::sync::Arc::clone(server);
            let token = self.cancellation_token.child_token();
            let address = server.address();
            let handle = tokio::spawn(async move {
                if let Err(e) = server.start(token).await {
                    error!("Status server error: {}", e);
                }
            });
            self.tasks.insert("status_server", handle);

            self.set_component_state("status_server", ComponentState::Running)
                .await;
            info!("Status server started on {}", address);
        }

        self.set_component_state("reachability", ComponentState::Starting)
            .await;
        self.reachability_probe = Some(self.reachability.start(&self.cancellation_token));
        self.set_component_state("reachability", ComponentState::Running)
            .await;

        self.set_component_state("navigator", ComponentState::Starting)
            .await;
        let mut navigator = self.navigator.take().ok_or_else(|| {
            RollcallError::component("navigator", "navigator already started")
        })?;
        // Subscribe before mounting so no navigation is lost
        let events = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["navigate", "operator"]),
            "navigator",
        );
        navigator.navigate(Screen::Screensaver).await;
        let token = self.cancellation_token.child_token();
        self.tasks
            .insert("navigator", tokio::spawn(navigator.run(events, token)));
        self.set_component_state("navigator", ComponentState::Running)
            .await;

        if let Some(keyboard_handler) = &self.keyboard_handler {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;

            keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start operator console: {}", e);
                e
            })?;

            self.set_component_state("keyboard", ComponentState::Running)
                .await;
        }

        info!("Kiosk started successfully");
        Ok(())
    }
}
