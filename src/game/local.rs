// Local player
// Turns board keys into player events, applied to the board before they are fired

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::board::Direction;
use super::mediator::{BoardMediator, GameType, Phase};
use super::player::Player;
use crate::network::{ExitReason, PlayerEvent};
use crate::ui::strings;
use crate::ui::text_input::StringInputHandler;
use crate::ui::{Key, PopupListener, PopupRequest};

pub struct LocalPlayer {
    player: Arc<Player>,
    mediator: Arc<BoardMediator>,
}

impl fmt::Debug for LocalPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPlayer")
            .field("id", &self.player.id())
            .field("name", &self.player.name())
            .finish()
    }
}

impl LocalPlayer {
    pub fn new(id: i32, name: impl Into<String>, mediator: Arc<BoardMediator>) -> Arc<Self> {
        Arc::new(Self {
            player: Arc::new(Player::new(id, name)),
            mediator,
        })
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    /// Board key handling. Returns false once the game is over.
    pub fn key_pressed(self: &Arc<Self>, key: Key) -> bool {
        if self.mediator.is_game_finished() {
            return false;
        }
        match key {
            Key::Up => self.mediator.move_cursor(Direction::Up),
            Key::Down => self.mediator.move_cursor(Direction::Down),
            Key::Left => self.mediator.move_cursor(Direction::Left),
            Key::Right => self.mediator.move_cursor(Direction::Right),
            Key::Fire => {
                if let Some(tile) = self.mediator.cursor() {
                    self.select_tile(tile as i32);
                }
            }
            Key::Backspace => self.undo(),
            Key::Char(' ') => self.commit(),
            _ => return false,
        }
        true
    }

    pub fn select_tile(&self, tile: i32) {
        self.apply_and_fire(PlayerEvent::MoveMade {
            id: self.player.id(),
            move_index: tile,
        });
    }

    pub fn undo(&self) {
        self.apply_and_fire(PlayerEvent::UndoPerformed {
            id: self.player.id(),
        });
    }

    pub fn commit(&self) {
        self.apply_and_fire(PlayerEvent::TurnCommit {
            id: self.player.id(),
        });
    }

    fn apply_and_fire(&self, event: PlayerEvent) {
        if self.mediator.apply_local(&event) {
            self.player.fire(&event);
        } else {
            debug!("Local {} not applied", event);
        }
    }

    /// Exit command. A remote game that is still running asks first whether to give up.
    pub fn request_exit(self: &Arc<Self>) {
        let remote_running = !self.mediator.is_game_finished()
            && self.mediator.game_type() != Some(GameType::Local);
        if remote_running {
            let request = PopupRequest::new(strings::QUIT_REMOTE)
                .with_alternatives(vec![strings::GIVE_UP.to_string(), strings::CANCEL.to_string()])
                .with_choices(1, 1)
                .with_listener(self.clone());
            self.mediator.presenter().show_popup(request);
        } else {
            self.quit(ExitReason::LocalQuit);
        }
    }

    fn quit(&self, reason: ExitReason) {
        info!("Leaving game: {:?}", reason);
        self.player.fire_game_exited(reason);
        self.mediator.exit_game(reason);
    }
}

impl PopupListener for LocalPlayer {
    fn selected_choice(&self, choice: usize, timed_out: bool) {
        if choice == 0 && !timed_out {
            self.quit(ExitReason::LocalGiveUp);
        }
    }
}

impl StringInputHandler for LocalPlayer {
    fn handle_string_input(&self, text: String) -> anyhow::Result<()> {
        if self.mediator.phase() == Phase::Idle {
            anyhow::bail!("no game to send a message to");
        }
        self.player.fire_message_sent(&text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mediator::tests::{mediator, Shown};
    use crate::game::mediator::{GameSetup, Opponent};
    use crate::game::player::tests::EventLog;
    use std::time::Duration;

    fn start(m: &BoardMediator, game_type: GameType) {
        m.begin(GameSetup {
            game_type,
            seed: 5,
            local_id: 1,
            opponent: (game_type != GameType::Local).then(|| Opponent {
                id: 2,
                name: "bob".to_string(),
            }),
            connection: None,
        });
    }

    #[test]
    fn test_debug_shows_id_and_name() {
        let (m, _presenter) = mediator(Duration::from_secs(60));
        let local = LocalPlayer::new(7, "me", m);
        assert_eq!(format!("{local:?}"), r#"LocalPlayer { id: 7, name: "me" }"#);
    }

    #[test]
    fn test_keys_build_and_commit_a_word() {
        let (m, _presenter) = mediator(Duration::from_secs(60));
        start(&m, GameType::RemoteClient);
        let local = LocalPlayer::new(1, "me", m.clone());
        let log = Arc::new(EventLog::default());
        local.player().add_listener(log.clone());

        local.key_pressed(Key::Fire);
        // Same tile twice is rejected and not fired
        local.key_pressed(Key::Fire);
        local.key_pressed(Key::Right);
        local.key_pressed(Key::Fire);
        local.key_pressed(Key::Down);
        local.key_pressed(Key::Fire);
        local.key_pressed(Key::Char(' '));

        let events = log.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], PlayerEvent::TurnCommit { id: 1 });
        assert_eq!(m.snapshot().unwrap().local.words.len(), 1);
    }

    #[test]
    fn test_exit_in_local_game_leaves_directly() {
        let (m, presenter) = mediator(Duration::from_secs(60));
        start(&m, GameType::Local);
        let local = LocalPlayer::new(1, "me", m.clone());
        local.request_exit();
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(presenter.calls(), vec![Shown::Dismiss, Shown::Menu]);
    }

    #[test]
    fn test_give_up_in_remote_game() {
        let (m, presenter) = mediator(Duration::from_secs(60));
        start(&m, GameType::RemoteServer);
        let local = LocalPlayer::new(1, "me", m.clone());
        let log = Arc::new(EventLog::default());
        local.player().add_listener(log.clone());

        local.request_exit();
        assert_eq!(presenter.popups(), vec![strings::QUIT_REMOTE.to_string()]);
        let listener = presenter.requests.lock().unwrap()[0].listener.clone().unwrap();

        // Cancel keeps playing
        listener.selected_choice(1, false);
        assert!(!m.is_game_finished());

        listener.selected_choice(0, false);
        assert_eq!(
            log.events(),
            vec![PlayerEvent::GameExited {
                id: 1,
                reason: ExitReason::LocalGiveUp
            }]
        );
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn test_keys_ignored_after_game_finished() {
        let (m, _presenter) = mediator(Duration::ZERO);
        start(&m, GameType::Local);
        m.poll_clock();
        let local = LocalPlayer::new(1, "me", m.clone());
        assert!(!local.key_pressed(Key::Fire));
    }

    #[test]
    fn test_message_is_fired() {
        let (m, _presenter) = mediator(Duration::from_secs(60));
        start(&m, GameType::RemoteServer);
        let local = LocalPlayer::new(1, "me", m.clone());
        let log = Arc::new(EventLog::default());
        local.player().add_listener(log.clone());
        local.handle_string_input("good luck".to_string()).unwrap();
        assert_eq!(
            log.events(),
            vec![PlayerEvent::MessageSent {
                id: 1,
                text: "good luck".to_string()
            }]
        );
    }
}
