use crate::error::EventBusError;
use crate::events::{EventReceiver, KioskEvent, OperatorCommand};
use crate::screens::{self, MountedScreen, Screen, ScreenContext};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Keeps exactly one screen mounted.
///
/// Switching screens tears the old one down, timers and in-flight calls
/// included, before the next one is mounted.
pub struct Navigator {
    ctx: ScreenContext,
    mounted: Option<MountedScreen>,
}

impl Navigator {
    pub fn new(ctx: ScreenContext) -> Self {
        Self { ctx, mounted: None }
    }

    pub fn current(&self) -> Option<Screen> {
        self.mounted.as_ref().map(MountedScreen::screen)
    }

    pub fn mounted(&self) -> Option<&MountedScreen> {
        self.mounted.as_ref()
    }

    /// Show `screen`. Navigating to the screen already shown is a no-op.
    pub async fn navigate(&mut self, screen: Screen) {
        if self.current() == Some(screen) {
            debug!("Already on {} screen", screen);
            return;
        }

        self.unmount().await;
        self.mounted = Some(screens::mount(screen, &self.ctx));
        info!("Navigated to {} screen", screen);
    }

    /// Hand an operator command to the mounted screen
    pub fn forward(&self, command: OperatorCommand) -> bool {
        match &self.mounted {
            Some(mounted) => mounted.send_command(command),
            None => {
                debug!("No screen mounted, dropping {:?}", command);
                false
            }
        }
    }

    pub async fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.unmount().await;
        }
    }

    /// Follow `Navigate` and `Operator` events until `token` is cancelled,
    /// then unmount whatever is shown.
    pub async fn run(mut self, mut events: EventReceiver, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(KioskEvent::Navigate(screen)) => self.navigate(screen).await,
                    Ok(KioskEvent::Operator(command)) => {
                        self.forward(command);
                    }
                    Ok(_) => {}
                    Err(EventBusError::ChannelClosed) => break,
                    Err(e) => warn!("Navigator missed events: {}", e),
                },
            }
        }

        self.unmount().await;
        debug!("Navigator stopped");
    }
}
