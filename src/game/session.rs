// Session start-up
// Runs the handshake on a fresh connection and wires the local player, listener proxy and
// remote player to the mediator

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::local::LocalPlayer;
use super::mediator::{BoardMediator, GameSetup, GameType, Opponent};
use super::proxy::PlayerListenerProxy;
use super::remote::RemotePlayer;
use crate::network::handshake::current_millis;
use crate::network::{handshake, DeviceIdentity, GameConnection, HandshakeError, Role};
use crate::ui::strings;
use crate::ui::PopupRequest;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection setup failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// Players and threads of the game in progress.
pub struct ActiveGame {
    local: Arc<LocalPlayer>,
    remote: Option<RemotePlayer>,
    receiver: Option<JoinHandle<()>>,
    connection: Option<Arc<dyn GameConnection>>,
}

impl ActiveGame {
    /// Stops the receive loop quietly and waits for it.
    fn shutdown(self) {
        if let Some(remote) = &self.remote {
            remote.stop();
        }
        if let Some(connection) = &self.connection {
            if let Err(e) = connection.close() {
                warn!("Failed to close {}: {}", connection.peer(), e);
            }
        }
        if let Some(handle) = self.receiver {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("Receive loop panicked");
            }
        }
    }
}

/// Holds at most one active game. Installing a game shuts the previous one down.
#[derive(Default)]
pub struct GameSlot(Mutex<Option<ActiveGame>>);

impl GameSlot {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveGame>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn local_player(&self) -> Option<Arc<LocalPlayer>> {
        self.lock().as_ref().map(|g| g.local.clone())
    }

    pub fn shutdown(&self) {
        let previous = self.lock().take();
        if let Some(game) = previous {
            game.shutdown();
        }
    }

    fn install(&self, game: ActiveGame) {
        let previous = self.lock().replace(game);
        if let Some(game) = previous {
            game.shutdown();
        }
    }
}

/// Everything needed to start games: the mediator, who we are and the active game.
pub struct Sessions {
    mediator: Arc<BoardMediator>,
    identity: Mutex<DeviceIdentity>,
    slot: GameSlot,
}

impl Sessions {
    pub fn new(mediator: Arc<BoardMediator>, identity: DeviceIdentity) -> Self {
        Self {
            mediator,
            identity: Mutex::new(identity),
            slot: GameSlot::default(),
        }
    }

    pub fn mediator(&self) -> &Arc<BoardMediator> {
        &self.mediator
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Renames the local player. Applies from the next game on.
    pub fn set_name(&self, name: &str) {
        self.identity.lock().unwrap_or_else(|e| e.into_inner()).name = name.to_string();
    }

    /// Local player of the game on screen, if any.
    pub fn local_player(&self) -> Option<Arc<LocalPlayer>> {
        self.slot.local_player()
    }

    pub fn start_local(&self) -> Arc<LocalPlayer> {
        start_local(&self.mediator, &self.identity(), &self.slot)
    }

    pub fn start_remote(
        &self,
        role: Role,
        connection: Arc<dyn GameConnection>,
    ) -> Result<Arc<LocalPlayer>, SessionError> {
        start_remote(role, connection, &self.mediator, &self.identity(), &self.slot)
    }

    /// Ends whatever game is running without telling the other side.
    pub fn shutdown(&self) {
        self.slot.shutdown();
    }
}

/// Starts a single player game.
pub fn start_local(
    mediator: &Arc<BoardMediator>,
    identity: &DeviceIdentity,
    slot: &GameSlot,
) -> Arc<LocalPlayer> {
    slot.shutdown();
    mediator.begin(GameSetup {
        game_type: GameType::Local,
        seed: current_millis(),
        local_id: identity.id,
        opponent: None,
        connection: None,
    });
    let local = LocalPlayer::new(identity.id, identity.name.clone(), mediator.clone());
    slot.install(ActiveGame {
        local: local.clone(),
        remote: None,
        receiver: None,
        connection: None,
    });
    mediator.presenter().show_board();
    local
}

/// Starts a two-device game on an established connection.
///
/// On handshake failure the user is told, the connection is closed and no
/// game is started.
pub fn start_remote(
    role: Role,
    connection: Arc<dyn GameConnection>,
    mediator: &Arc<BoardMediator>,
    identity: &DeviceIdentity,
    slot: &GameSlot,
) -> Result<Arc<LocalPlayer>, SessionError> {
    let presenter = mediator.presenter().clone();
    presenter.show_popup(PopupRequest::new(strings::STARTING_GAME));

    let streams = connection.input().and_then(|i| Ok((i, connection.output()?)));
    let (mut input, mut output) = match streams {
        Ok(streams) => streams,
        Err(e) => {
            let _ = connection.close();
            presenter.show_popup(PopupRequest::ok(format!("{}\n{}", strings::CONN_FAIL, e)));
            return Err(e.into());
        }
    };

    let result = match handshake(role, &mut *input, &mut *output, identity.as_local()) {
        Ok(result) => result,
        Err(e) => {
            warn!("{}", e);
            if let Err(close_err) = connection.close() {
                warn!("Failed to close {}: {}", connection.peer(), close_err);
            }
            presenter.show_popup(PopupRequest::ok(strings::HANDSHAKE_FAIL));
            return Err(e.into());
        }
    };

    slot.shutdown();
    let game_type = match role {
        Role::Server => GameType::RemoteServer,
        Role::Client => GameType::RemoteClient,
    };
    mediator.begin(GameSetup {
        game_type,
        seed: result.seed,
        local_id: identity.id,
        opponent: Some(Opponent {
            id: result.remote_id,
            name: result.remote_name.clone(),
        }),
        connection: Some(connection.clone()),
    });
    let link = mediator.link();

    let local = LocalPlayer::new(identity.id, identity.name.clone(), mediator.clone());
    local
        .player()
        .add_listener(Arc::new(PlayerListenerProxy::new(output, link.clone())));

    let remote = RemotePlayer::new(result.remote_id, result.remote_name);
    remote.player().add_listener(link.clone());
    let receiver = remote.spawn(input, link)?;

    info!("Session with {} running as {:?}", connection.peer(), role);
    slot.install(ActiveGame {
        local: local.clone(),
        remote: Some(remote),
        receiver: Some(receiver),
        connection: Some(connection),
    });
    presenter.dismiss_popup();
    presenter.show_board();
    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mediator::tests::{mediator, MockPresenter, Shown};
    use crate::game::mediator::Phase;
    use crate::network::memory_pair;
    use crate::ui::Key;
    use std::time::{Duration, Instant};

    fn identity(id: i32, name: &str) -> DeviceIdentity {
        DeviceIdentity {
            id,
            name: name.to_string(),
        }
    }

    fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(10));
        }
    }

    struct Side {
        mediator: Arc<BoardMediator>,
        presenter: Arc<MockPresenter>,
        slot: GameSlot,
    }

    fn connected_pair() -> (Side, Side, Arc<LocalPlayer>, Arc<LocalPlayer>) {
        let (a, b) = memory_pair();
        let (host_m, host_p) = mediator(Duration::from_secs(60));
        let (guest_m, guest_p) = mediator(Duration::from_secs(60));
        let host = Side {
            mediator: host_m,
            presenter: host_p,
            slot: GameSlot::default(),
        };
        let guest = Side {
            mediator: guest_m,
            presenter: guest_p,
            slot: GameSlot::default(),
        };

        let host_thread = {
            let m = host.mediator.clone();
            thread::spawn(move || {
                let slot = GameSlot::default();
                let local = start_remote(Role::Server, Arc::new(a), &m, &identity(1, "host"), &slot)
                    .unwrap();
                (local, slot)
            })
        };
        let guest_local =
            start_remote(Role::Client, Arc::new(b), &guest.mediator, &identity(2, "guest"), &guest.slot)
                .unwrap();
        let (host_local, host_slot) = host_thread.join().unwrap();
        let host = Side {
            slot: host_slot,
            ..host
        };
        (host, guest, host_local, guest_local)
    }

    #[test]
    fn test_both_sides_share_the_board_and_see_moves() {
        let (host, guest, host_local, _guest_local) = connected_pair();
        let host_view = host.mediator.snapshot().unwrap();
        let guest_view = guest.mediator.snapshot().unwrap();
        assert_eq!(host_view.letters, guest_view.letters);
        assert_eq!(host_view.opponent.unwrap().0.name, "guest");
        assert_eq!(guest.mediator.phase(), Phase::Running(GameType::RemoteClient));

        host_local.key_pressed(Key::Fire);
        wait_for("guest to see host move", || {
            guest
                .mediator
                .snapshot()
                .and_then(|s| s.opponent)
                .map_or(false, |(_, p)| p.path.len() == 1)
        });
        assert!(host.presenter.calls().contains(&Shown::Board));
    }

    #[test]
    fn test_give_up_reaches_remote_and_ends_quietly() {
        let (host, guest, host_local, _guest_local) = connected_pair();
        host_local.request_exit();
        // Running remote game: the host is asked first
        assert!(host.presenter.popups().contains(&strings::QUIT_REMOTE.to_string()));
        let listener = host
            .presenter
            .requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.listener.clone())
            .unwrap();
        listener.selected_choice(0, false);

        wait_for("guest to finish", || guest.mediator.is_game_finished());
        wait_for("give up popup", || {
            guest.presenter.popups().contains(&strings::REMOTE_GAVE_UP.to_string())
        });
        assert_eq!(host.mediator.phase(), Phase::Idle);
        // The host closed the link after giving up; the guest must not report a loss
        thread::sleep(Duration::from_millis(100));
        assert!(!guest.presenter.popups().contains(&strings::CONN_LOST.to_string()));
        host.slot.shutdown();
        guest.slot.shutdown();
    }

    #[test]
    fn test_handshake_failure_closes_connection() {
        let (a, b) = memory_pair();
        b.close().unwrap();
        let (m, presenter) = mediator(Duration::from_secs(60));
        let slot = GameSlot::default();
        let connection: Arc<dyn GameConnection> = Arc::new(a);
        let err = start_remote(Role::Server, connection.clone(), &m, &identity(1, "host"), &slot)
            .unwrap_err();
        assert!(matches!(err, SessionError::Handshake(_)));
        assert!(connection.is_closed());
        assert!(presenter.popups().contains(&strings::HANDSHAKE_FAIL.to_string()));
        assert_eq!(m.phase(), Phase::Idle);
        assert!(slot.local_player().is_none());
    }

    #[test]
    fn test_local_game_starts_without_connection() {
        let (m, presenter) = mediator(Duration::from_secs(60));
        let slot = GameSlot::default();
        start_local(&m, &identity(1, "solo"), &slot);
        assert_eq!(m.phase(), Phase::Running(GameType::Local));
        assert!(slot.local_player().is_some());
        assert_eq!(presenter.calls(), vec![Shown::Board]);
    }
}
