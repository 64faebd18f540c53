use crate::error::Result;
use crate::events::{EventBus, KioskEvent, OperatorCommand};
use crate::screens::{Screen, ScreenView, ViewPublisher};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Translate one key press into a kiosk event.
///
/// Digits pick the n-th class from the open chooser, so they need the
/// currently published view.
pub fn key_action(code: KeyCode, view: &ScreenView) -> Option<KioskEvent> {
    let operator = |command| Some(KioskEvent::Operator(command));
    let navigate = |screen| Some(KioskEvent::Navigate(screen));

    match code {
        KeyCode::Char('s') => operator(OperatorCommand::OpenClassChooser),
        KeyCode::Char('x') => operator(OperatorCommand::RequestStop),
        KeyCode::Char('c') => operator(OperatorCommand::CancelStop),
        KeyCode::Char(digit @ '1'..='9') => {
            let ScreenView::Service(service) = view else {
                return None;
            };
            let chooser = service.class_chooser.as_ref()?;
            let index = digit.to_digit(10)? as usize - 1;
            let class = chooser.classes.get(index)?;
            operator(OperatorCommand::ConfirmStart {
                class_id: Some(class.id.clone()),
            })
        }
        KeyCode::Char('h') => navigate(Screen::History),
        KeyCode::Char('n') => navigate(Screen::Notifications),
        KeyCode::Char('v') => navigate(Screen::Service),
        KeyCode::Char('g') => navigate(Screen::Settings),
        KeyCode::Char('r') => navigate(Screen::Screensaver),
        KeyCode::Char('q') | KeyCode::Esc => Some(KioskEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "User requested via keyboard".to_string(),
        }),
        _ => None,
    }
}

/// Operator console on the attached terminal
pub struct KeyboardInputHandler {
    event_bus: Arc<EventBus>,
    views: ViewPublisher,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: Arc<EventBus>, views: ViewPublisher) -> Self {
        Self {
            event_bus,
            views,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting operator console: s=start x=stop c=cancel 1-9=class h/n/v/g/r=screens q=quit");

        let event_bus = Arc::clone(&self.event_bus);
        let views = self.views.clone();
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - operator console active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Operator console stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Press only, not release
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(action) = key_action(key_event.code, &views.current()) else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        let quit = matches!(action, KioskEvent::ShutdownRequested { .. });
                        info!("Operator console: {}", action.description());

                        let event_bus = Arc::clone(&event_bus);
                        runtime_handle.spawn(async move {
                            if let Err(e) = event_bus.publish(action).await {
                                warn!("Failed to publish operator event: {}", e);
                            }
                        });

                        if quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the operator console
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping operator console");
        self.cancellation_token.cancel();

        // Let the blocking loop notice and restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ClassChoice, ClassChooserView, SessionView};

    fn chooser_view() -> ScreenView {
        let mut view = SessionView::initial();
        view.class_chooser = Some(ClassChooserView {
            teacher_name: "Ms. X".to_string(),
            loading: false,
            classes: vec![
                ClassChoice {
                    id: "C1".to_string(),
                    label: "Algebra".to_string(),
                },
                ClassChoice {
                    id: "C7".to_string(),
                    label: "Biology".to_string(),
                },
            ],
            selected: None,
        });
        ScreenView::Service(Box::new(view))
    }

    #[test]
    fn test_digit_picks_class_from_chooser() {
        assert_eq!(
            key_action(KeyCode::Char('2'), &chooser_view()),
            Some(KioskEvent::Operator(OperatorCommand::ConfirmStart {
                class_id: Some("C7".to_string())
            }))
        );
        assert_eq!(key_action(KeyCode::Char('3'), &chooser_view()), None);
        assert_eq!(key_action(KeyCode::Char('1'), &ScreenView::Blank), None);
    }

    #[test]
    fn test_command_and_navigation_keys() {
        let view = ScreenView::Blank;
        assert_eq!(
            key_action(KeyCode::Char('x'), &view),
            Some(KioskEvent::Operator(OperatorCommand::RequestStop))
        );
        assert_eq!(
            key_action(KeyCode::Char('g'), &view),
            Some(KioskEvent::Navigate(Screen::Settings))
        );
        assert!(matches!(
            key_action(KeyCode::Esc, &view),
            Some(KioskEvent::ShutdownRequested { .. })
        ));
        assert_eq!(key_action(KeyCode::Char('z'), &view), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let event_bus = Arc::new(EventBus::new(100));
        let handler = KeyboardInputHandler::new(event_bus, ViewPublisher::new());

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
