// Host and join flows
// Opening a server and waiting for a player, or connecting to a host, then handing the
// connection to the session start-up

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::game::session::Sessions;
use crate::menu::{ItemAction, MenuPage, PageItem};
use crate::network::{GameConnection, Role, ServerCancel, TcpConnection, TcpServer};
use crate::ui::strings;
use crate::ui::text_input::{StringInputHandler, TextInput};
use crate::ui::{PopupListener, PopupRequest};

/// Item property holding a `host:port` address to join.
pub const ADDRESS: i32 = 1;

/// Seconds an error popup stays up
const ERROR_POPUP_SECS: u32 = 60;

/// Runs its closure when the user picks Cancel. A popup replaced by another
/// one times out instead and leaves the operation running.
struct CancelOnChoice<F: Fn() + Send + Sync>(F);

impl<F: Fn() + Send + Sync> PopupListener for CancelOnChoice<F> {
    fn selected_choice(&self, _choice: usize, timed_out: bool) {
        if !timed_out {
            (self.0)()
        }
    }
}

struct Waiting {
    cancel: ServerCancel,
    text: String,
}

/// "Host game": opens a server and waits for one player in the background.
pub struct ServerWorkflow {
    sessions: Arc<Sessions>,
    port: u16,
    poll_interval: Duration,
    waiting: Arc<Mutex<Option<Waiting>>>,
}

impl ServerWorkflow {
    pub fn new(sessions: Arc<Sessions>, port: u16, poll_interval: Duration) -> Self {
        Self {
            sessions,
            port,
            poll_interval,
            waiting: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Waiting>> {
        self.waiting.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn waiting_popup(text: String, cancel: ServerCancel) -> PopupRequest {
        PopupRequest::new(text)
            .with_alternatives(strings::alt_cancel())
            .with_listener(Arc::new(CancelOnChoice(move || {
                info!("Hosting cancelled");
                cancel.cancel();
            })))
    }

    /// True while a server is open and waiting for a player.
    pub fn is_waiting(&self) -> bool {
        self.lock().is_some()
    }

    /// Opens the server. Calling again while waiting only shows the popup again.
    pub fn host(&self) -> anyhow::Result<()> {
        let presenter = self.sessions.mediator().presenter().clone();
        let mut waiting = self.lock();
        if let Some(w) = waiting.as_ref() {
            presenter.show_popup(Self::waiting_popup(w.text.clone(), w.cancel.clone()));
            return Ok(());
        }

        let server = match TcpServer::bind(self.port, self.poll_interval) {
            Ok(server) => server,
            Err(e) => {
                presenter.show_popup(
                    PopupRequest::ok(format!("{}\n{}", strings::SERVER_FAILURE, e))
                        .with_timeout(ERROR_POPUP_SECS),
                );
                return Err(e).context("failed to open server");
            }
        };
        let address = server.local_addr()?;
        let text = format!("{} {}", strings::SERVER_OPENED, address);
        let cancel = server.cancel_handle();
        *waiting = Some(Waiting {
            cancel: cancel.clone(),
            text: text.clone(),
        });
        drop(waiting);

        info!("Waiting for a player on {}", address);
        presenter.show_popup(Self::waiting_popup(text, cancel));

        let sessions = self.sessions.clone();
        let state = self.waiting.clone();
        let spawned = thread::Builder::new()
            .name("host-accept".to_string())
            .spawn(move || {
                let outcome = server.wait_for_client();
                state.lock().unwrap_or_else(|e| e.into_inner()).take();
                let presenter = sessions.mediator().presenter().clone();
                match outcome {
                    Ok(Some(connection)) => {
                        presenter.dismiss_popup();
                        if let Err(e) = sessions.start_remote(Role::Server, Arc::new(connection)) {
                            warn!("Hosted game did not start: {}", e);
                        }
                    }
                    Ok(None) => info!("Server on {} closed", address),
                    Err(e) => {
                        warn!("Server on {} failed: {}", address, e);
                        presenter.show_popup(
                            PopupRequest::ok(format!("{}\n{}", strings::SERVER_FAILURE, e))
                                .with_timeout(ERROR_POPUP_SECS),
                        );
                    }
                }
            });
        if let Err(e) = spawned {
            self.lock().take();
            return Err(e).context("failed to start accept thread");
        }
        Ok(())
    }
}

impl ItemAction for ServerWorkflow {
    fn item_action(&self, _page: &Arc<MenuPage>, _item: &PageItem) -> anyhow::Result<()> {
        self.host()
    }
}

/// "Join game": connects to a known host or to an address typed by the user.
pub struct ClientWorkflow {
    me: Weak<ClientWorkflow>,
    sessions: Arc<Sessions>,
    text_input: Arc<TextInput>,
    timeout: Duration,
}

impl ClientWorkflow {
    pub fn new(sessions: Arc<Sessions>, text_input: Arc<TextInput>, timeout: Duration) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            sessions,
            text_input,
            timeout,
        })
    }

    /// Connects in the background and starts the game on success.
    pub fn join(&self, address: &str) -> anyhow::Result<()> {
        let address = address.trim().to_string();
        let presenter = self.sessions.mediator().presenter().clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        presenter.show_popup(
            PopupRequest::new(format!("{} {}...", strings::CONNECTING, address))
                .with_alternatives(strings::alt_cancel())
                .with_listener(Arc::new(CancelOnChoice(move || {
                    flag.store(true, Ordering::SeqCst)
                }))),
        );

        let sessions = self.sessions.clone();
        let timeout = self.timeout;
        thread::Builder::new()
            .name("join".to_string())
            .spawn(move || {
                let presenter = sessions.mediator().presenter().clone();
                match TcpConnection::connect(&address, timeout) {
                    Ok(connection) => {
                        if cancelled.load(Ordering::SeqCst) {
                            info!("Join of {} cancelled", address);
                            let _ = connection.close();
                            return;
                        }
                        presenter.dismiss_popup();
                        if let Err(e) = sessions.start_remote(Role::Client, Arc::new(connection)) {
                            warn!("Joined game did not start: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Connecting to {} failed: {}", address, e);
                        if !cancelled.load(Ordering::SeqCst) {
                            presenter.show_popup(
                                PopupRequest::ok(format!("{}\n{}", strings::CONN_FAIL, e))
                                    .with_timeout(ERROR_POPUP_SECS),
                            );
                        }
                    }
                }
            })
            .context("failed to start join thread")?;
        Ok(())
    }
}

impl ItemAction for ClientWorkflow {
    fn item_action(&self, _page: &Arc<MenuPage>, item: &PageItem) -> anyhow::Result<()> {
        if let Some(address) = item.property(ADDRESS) {
            return self.join(address);
        }
        let handler: Arc<dyn StringInputHandler> = self
            .me
            .upgrade()
            .context("join workflow dropped")?;
        self.text_input.open(strings::ENTER_ADDRESS, "", handler);
        Ok(())
    }
}

impl StringInputHandler for ClientWorkflow {
    fn handle_string_input(&self, text: String) -> anyhow::Result<()> {
        self.join(&text)
    }
}
