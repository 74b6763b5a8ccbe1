// Board mediator
// Owns the running game: its phase, board, clock and connection, and decides how exits and
// lost connections are presented. Every check-and-act runs under one lock; presentation happens
// after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::board::{Board, Direction, Progress, RoundClock, Seat};
use super::player::{LinkObserver, PlayerListener};
use crate::network::{ExitReason, GameConnection, PlayerEvent, ProtocolError};
use crate::ui::strings;
use crate::ui::PopupRequest;

/// The mediator's only view of the user interface.
pub trait Presenter: Send + Sync {
    fn show_popup(&self, request: PopupRequest);
    fn dismiss_popup(&self);
    fn show_board(&self);
    /// Returns to the root of the menu
    fn show_menu(&self);
    fn repaint(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameType {
    Local,
    RemoteServer,
    RemoteClient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running(GameType),
    Finished(GameType),
}

/// Opponent as learned from the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opponent {
    pub id: i32,
    pub name: String,
}

/// Everything the board screen draws.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub game_type: GameType,
    pub finished: bool,
    pub size: usize,
    pub letters: Vec<char>,
    pub cursor: usize,
    pub local: Progress,
    pub local_word: String,
    pub opponent: Option<(Opponent, Progress)>,
    pub time_left: Duration,
}

struct MediatorState {
    phase: Phase,
    session: u64,
    connection: Option<Arc<dyn GameConnection>>,
    board: Option<Board>,
    clock: Option<RoundClock>,
    opponent: Option<Opponent>,
}

impl MediatorState {
    fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    fn finish(&mut self) {
        if let Phase::Running(kind) = self.phase {
            self.phase = Phase::Finished(kind);
        }
    }

    fn tear_down(&mut self) -> Option<Arc<dyn GameConnection>> {
        self.phase = Phase::Idle;
        self.board = None;
        self.clock = None;
        self.opponent = None;
        self.connection.take()
    }
}

/// What to show once the lock is released.
enum Outcome {
    Nothing,
    Popup(PopupRequest),
    TearDown {
        connection: Option<Arc<dyn GameConnection>>,
        dismiss: bool,
        popup: Option<PopupRequest>,
    },
}

/// Parameters of a new game.
pub struct GameSetup {
    pub game_type: GameType,
    pub seed: i64,
    pub local_id: i32,
    pub opponent: Option<Opponent>,
    pub connection: Option<Arc<dyn GameConnection>>,
}

pub struct BoardMediator {
    state: Mutex<MediatorState>,
    presenter: Arc<dyn Presenter>,
    board_size: usize,
    round: Duration,
}

impl BoardMediator {
    pub fn new(presenter: Arc<dyn Presenter>, board_size: usize, round: Duration) -> Self {
        Self {
            state: Mutex::new(MediatorState {
                phase: Phase::Idle,
                session: 0,
                connection: None,
                board: None,
                clock: None,
                opponent: None,
            }),
            presenter,
            board_size,
            round,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MediatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    /// Starts a game and returns its session number. A previous game is torn
    /// down silently. The connection, if any, is owned by the mediator from here on.
    pub fn begin(&self, setup: GameSetup) -> u64 {
        let (session, previous) = {
            let mut state = self.lock();
            let previous = state.tear_down();
            state.session += 1;
            state.phase = Phase::Running(setup.game_type);
            state.board = Some(Board::new(self.board_size, setup.seed));
            state.clock = Some(RoundClock::start(self.round));
            state.opponent = setup.opponent;
            state.connection = setup.connection;
            (state.session, previous)
        };
        close(previous);
        info!(
            "Game {} started as {:?} for player {}",
            session, setup.game_type, setup.local_id
        );
        session
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn session(&self) -> u64 {
        self.lock().session
    }

    pub fn game_type(&self) -> Option<GameType> {
        match self.lock().phase {
            Phase::Idle => None,
            Phase::Running(kind) | Phase::Finished(kind) => Some(kind),
        }
    }

    /// True unless a game is running. An idle mediator counts as finished.
    pub fn is_game_finished(&self) -> bool {
        !self.lock().is_running()
    }

    /// Applies a local player's board event. Returns false if it was rejected,
    /// in which case it must not be sent.
    pub fn apply_local(&self, event: &PlayerEvent) -> bool {
        let applied = {
            let mut state = self.lock();
            state.is_running() && apply_board_event(&mut state, Seat::Local, event)
        };
        if applied {
            self.presenter.repaint();
        }
        applied
    }

    pub fn move_cursor(&self, direction: Direction) {
        if let Some(board) = self.lock().board.as_mut() {
            board.move_cursor(direction);
        }
        self.presenter.repaint();
    }

    pub fn cursor(&self) -> Option<usize> {
        self.lock().board.as_ref().map(Board::cursor)
    }

    pub fn snapshot(&self) -> Option<BoardSnapshot> {
        let state = self.lock();
        let board = state.board.as_ref()?;
        let clock = state.clock?;
        let game_type = match state.phase {
            Phase::Idle => return None,
            Phase::Running(kind) | Phase::Finished(kind) => kind,
        };
        let opponent = state.opponent.clone().map(|o| {
            let progress = board.progress(Seat::Opponent).clone();
            (o, progress)
        });
        Some(BoardSnapshot {
            game_type,
            finished: !state.is_running(),
            size: board.size(),
            letters: board.letters().to_vec(),
            cursor: board.cursor(),
            local: board.progress(Seat::Local).clone(),
            local_word: board.current_word(Seat::Local),
            opponent,
            time_left: if state.is_running() {
                clock.remaining()
            } else {
                Duration::ZERO
            },
        })
    }

    /// Ends or leaves the current game for `reason`.
    pub fn exit_game(&self, reason: ExitReason) {
        let outcome = {
            let mut state = self.lock();
            exit_outcome(&mut state, reason)
        };
        self.present(outcome);
    }

    /// The link to the other device broke. Ignored once the game is over.
    pub fn lost_remote_connection(&self, error: &ProtocolError) {
        self.lost_for(None, error);
    }

    /// Finishes the game when the round clock has run out. Returns true if it did.
    pub fn poll_clock(&self) -> bool {
        let outcome = {
            let mut state = self.lock();
            let expired = state.is_running() && state.clock.map_or(false, |c| c.is_expired());
            if !expired {
                return false;
            }
            state.finish();
            Outcome::Popup(PopupRequest::ok(score_text(&state)))
        };
        info!("Round clock ran out");
        self.present(outcome);
        true
    }

    /// Listener and link observer bound to the current session.
    pub fn link(self: &Arc<Self>) -> Arc<SessionLink> {
        Arc::new(SessionLink {
            mediator: self.clone(),
            session: self.session(),
        })
    }

    fn lost_for(&self, session: Option<u64>, error: &ProtocolError) {
        let outcome = {
            let mut state = self.lock();
            if session.map_or(false, |s| s != state.session) || !state.is_running() {
                debug!("Ignoring lost connection: {}", error);
                return;
            }
            warn!("Connection lost during game: {}", error);
            state.finish();
            Outcome::TearDown {
                connection: state.tear_down(),
                dismiss: false,
                popup: Some(PopupRequest::ok(strings::CONN_LOST)),
            }
        };
        self.present(outcome);
    }

    fn remote_event(&self, session: u64, event: &PlayerEvent) {
        let outcome = {
            let mut state = self.lock();
            if state.session != session || state.phase == Phase::Idle {
                debug!("Dropping {} from an old session", event);
                return;
            }
            match event {
                PlayerEvent::GameExited { reason, .. } => exit_outcome(&mut state, *reason),
                PlayerEvent::MessageSent { text, .. } => {
                    let from = state
                        .opponent
                        .as_ref()
                        .map_or_else(|| "?".to_string(), |o| o.name.clone());
                    Outcome::Popup(PopupRequest::ok(format!("{from}:\n\n{text}")).with_timeout(60))
                }
                _ => {
                    if state.is_running() && !apply_board_event(&mut state, Seat::Opponent, event) {
                        warn!("Remote sent an invalid move: {}", event);
                    }
                    drop(state);
                    self.presenter.repaint();
                    return;
                }
            }
        };
        self.present(outcome);
    }

    fn present(&self, outcome: Outcome) {
        match outcome {
            Outcome::Nothing => {}
            Outcome::Popup(request) => self.presenter.show_popup(request),
            Outcome::TearDown {
                connection,
                dismiss,
                popup,
            } => {
                close(connection);
                if dismiss {
                    self.presenter.dismiss_popup();
                }
                if let Some(request) = popup {
                    self.presenter.show_popup(request);
                }
                self.presenter.show_menu();
            }
        }
    }
}

fn exit_outcome(state: &mut MediatorState, reason: ExitReason) -> Outcome {
    info!("Exit game: {:?} in {:?}", reason, state.phase);
    match reason {
        ExitReason::LocalGiveUp => {
            state.finish();
            Outcome::TearDown {
                connection: state.tear_down(),
                dismiss: false,
                popup: None,
            }
        }
        ExitReason::RemoteGiveUp => {
            if state.phase == Phase::Idle {
                return Outcome::Nothing;
            }
            state.finish();
            Outcome::Popup(PopupRequest::ok(strings::REMOTE_GAVE_UP).with_timeout(10))
        }
        ExitReason::RemoteQuit => {
            if !state.is_running() {
                return Outcome::Nothing;
            }
            state.finish();
            Outcome::TearDown {
                connection: state.tear_down(),
                dismiss: false,
                popup: Some(PopupRequest::ok(strings::REMOTE_QUIT)),
            }
        }
        ExitReason::LocalQuit => Outcome::TearDown {
            connection: state.tear_down(),
            dismiss: true,
            popup: None,
        },
    }
}

/// Board events are credited by where they came from, not by the id they carry.
fn apply_board_event(state: &mut MediatorState, seat: Seat, event: &PlayerEvent) -> bool {
    let Some(board) = state.board.as_mut() else {
        return false;
    };
    match event {
        PlayerEvent::MoveMade { move_index, .. } => match board.select(seat, *move_index) {
            Ok(()) => true,
            Err(e) => {
                debug!("Move rejected: {}", e);
                false
            }
        },
        PlayerEvent::UndoPerformed { .. } => board.undo(seat).is_some(),
        PlayerEvent::TurnCommit { id } => {
            if let Some(word) = board.commit(seat) {
                debug!("Player {} ({:?}) found {}", id, seat, word);
            }
            true
        }
        PlayerEvent::MessageSent { .. } | PlayerEvent::GameExited { .. } => false,
    }
}

fn score_text(state: &MediatorState) -> String {
    let Some(board) = state.board.as_ref() else {
        return strings::TIME_UP.to_string();
    };
    let mine = board.progress(Seat::Local);
    let mut text = format!(
        "{}\nYou: {} points, {} words",
        strings::TIME_UP,
        mine.score,
        mine.words.len()
    );
    if let Some(opponent) = &state.opponent {
        let theirs = board.progress(Seat::Opponent);
        text.push_str(&format!(
            "\n{}: {} points, {} words",
            opponent.name,
            theirs.score,
            theirs.words.len()
        ));
    }
    text
}

fn close(connection: Option<Arc<dyn GameConnection>>) {
    if let Some(connection) = connection {
        if let Err(e) = connection.close() {
            warn!("Failed to close connection to {}: {}", connection.peer(), e);
        }
    }
}

/// Routes remote events and link failures to the mediator, but only while its
/// session is still the current one.
pub struct SessionLink {
    mediator: Arc<BoardMediator>,
    session: u64,
}

impl PlayerListener for SessionLink {
    fn on_event(&self, event: &PlayerEvent) {
        self.mediator.remote_event(self.session, event);
    }
}

impl LinkObserver for SessionLink {
    fn lost_remote_connection(&self, error: &ProtocolError) {
        self.mediator.lost_for(Some(self.session), error);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::memory_pair;
    use std::io;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Shown {
        Popup(String),
        Dismiss,
        Board,
        Menu,
    }

    /// Records presenter calls instead of drawing.
    #[derive(Default)]
    pub(crate) struct MockPresenter {
        pub calls: Mutex<Vec<Shown>>,
        pub requests: Mutex<Vec<PopupRequest>>,
    }

    impl MockPresenter {
        pub(crate) fn calls(&self) -> Vec<Shown> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn popups(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Shown::Popup(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    impl Presenter for MockPresenter {
        fn show_popup(&self, request: PopupRequest) {
            self.calls.lock().unwrap().push(Shown::Popup(request.text.clone()));
            self.requests.lock().unwrap().push(request);
        }
        fn dismiss_popup(&self) {
            self.calls.lock().unwrap().push(Shown::Dismiss);
        }
        fn show_board(&self) {
            self.calls.lock().unwrap().push(Shown::Board);
        }
        fn show_menu(&self) {
            self.calls.lock().unwrap().push(Shown::Menu);
        }
        fn repaint(&self) {}
    }

    pub(crate) fn mediator(round: Duration) -> (Arc<BoardMediator>, Arc<MockPresenter>) {
        let presenter = Arc::new(MockPresenter::default());
        let mediator = Arc::new(BoardMediator::new(presenter.clone(), 4, round));
        (mediator, presenter)
    }

    fn remote_game(mediator: &BoardMediator) -> Arc<dyn GameConnection> {
        let (a, _b) = memory_pair();
        let connection: Arc<dyn GameConnection> = Arc::new(a);
        mediator.begin(GameSetup {
            game_type: GameType::RemoteServer,
            seed: 99,
            local_id: 1,
            opponent: Some(Opponent {
                id: 2,
                name: "bob".to_string(),
            }),
            connection: Some(connection.clone()),
        });
        connection
    }

    fn eof() -> ProtocolError {
        ProtocolError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))
    }

    #[test]
    fn test_remote_quit_twice_shows_one_popup() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        let connection = remote_game(&mediator);
        mediator.exit_game(ExitReason::RemoteQuit);
        mediator.exit_game(ExitReason::RemoteQuit);
        assert_eq!(
            presenter.calls(),
            vec![Shown::Popup(strings::REMOTE_QUIT.to_string()), Shown::Menu]
        );
        assert!(connection.is_closed());
        assert_eq!(mediator.phase(), Phase::Idle);
    }

    #[test]
    fn test_lost_connection_after_finish_is_ignored() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        remote_game(&mediator);
        mediator.exit_game(ExitReason::RemoteGiveUp);
        assert!(mediator.is_game_finished());
        mediator.lost_remote_connection(&eof());
        assert_eq!(presenter.popups(), vec![strings::REMOTE_GAVE_UP.to_string()]);
        // Remote give up keeps the finished board on screen
        assert_eq!(mediator.phase(), Phase::Finished(GameType::RemoteServer));
    }

    #[test]
    fn test_lost_connection_tears_down_once() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        let connection = remote_game(&mediator);
        mediator.lost_remote_connection(&eof());
        mediator.lost_remote_connection(&eof());
        assert_eq!(
            presenter.calls(),
            vec![Shown::Popup(strings::CONN_LOST.to_string()), Shown::Menu]
        );
        assert!(connection.is_closed());
    }

    #[test]
    fn test_local_quit_dismisses_popup_and_tears_down() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        let connection = remote_game(&mediator);
        mediator.exit_game(ExitReason::LocalQuit);
        assert_eq!(presenter.calls(), vec![Shown::Dismiss, Shown::Menu]);
        assert!(connection.is_closed());
    }

    #[test]
    fn test_local_give_up_tears_down_without_popup() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        remote_game(&mediator);
        mediator.exit_game(ExitReason::LocalGiveUp);
        assert_eq!(presenter.calls(), vec![Shown::Menu]);
        assert_eq!(mediator.phase(), Phase::Idle);
    }

    #[test]
    fn test_concurrent_quit_and_loss_show_one_popup() {
        for _ in 0..20 {
            let (mediator, presenter) = mediator(Duration::from_secs(60));
            remote_game(&mediator);
            let a = {
                let m = mediator.clone();
                thread::spawn(move || m.exit_game(ExitReason::RemoteQuit))
            };
            let b = {
                let m = mediator.clone();
                thread::spawn(move || m.lost_remote_connection(&eof()))
            };
            a.join().unwrap();
            b.join().unwrap();
            assert_eq!(presenter.popups().len(), 1);
        }
    }

    #[test]
    fn test_stale_session_link_is_ignored() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        remote_game(&mediator);
        let old = mediator.link();
        remote_game(&mediator);
        old.lost_remote_connection(&eof());
        old.on_event(&PlayerEvent::GameExited {
            id: 2,
            reason: ExitReason::RemoteQuit,
        });
        assert!(presenter.calls().is_empty());
        assert!(!mediator.is_game_finished());
    }

    #[test]
    fn test_remote_moves_update_opponent_progress() {
        let (mediator, _presenter) = mediator(Duration::from_secs(60));
        remote_game(&mediator);
        let link = mediator.link();
        for i in 0..3 {
            link.on_event(&PlayerEvent::MoveMade { id: 2, move_index: i });
        }
        link.on_event(&PlayerEvent::TurnCommit { id: 2 });
        let snapshot = mediator.snapshot().unwrap();
        let (opponent, progress) = snapshot.opponent.unwrap();
        assert_eq!(opponent.name, "bob");
        assert_eq!(progress.words.len(), 1);
        assert!(snapshot.local.words.is_empty());
    }

    #[test]
    fn test_shared_device_id_keeps_players_apart() {
        let (mediator, _presenter) = mediator(Duration::from_secs(60));
        mediator.begin(GameSetup {
            game_type: GameType::RemoteServer,
            seed: 7,
            local_id: 42,
            opponent: Some(Opponent {
                id: 42,
                name: "twin".to_string(),
            }),
            connection: None,
        });
        let link = mediator.link();
        link.on_event(&PlayerEvent::MoveMade { id: 42, move_index: 0 });
        assert!(mediator.apply_local(&PlayerEvent::MoveMade { id: 42, move_index: 0 }));
        link.on_event(&PlayerEvent::MoveMade { id: 42, move_index: 1 });

        let snapshot = mediator.snapshot().unwrap();
        assert_eq!(snapshot.local.path, vec![0]);
        assert_eq!(snapshot.opponent.unwrap().1.path, vec![0, 1]);

        assert!(mediator.apply_local(&PlayerEvent::UndoPerformed { id: 42 }));
        let snapshot = mediator.snapshot().unwrap();
        assert!(snapshot.local.path.is_empty());
        assert_eq!(snapshot.opponent.unwrap().1.path, vec![0, 1]);
    }

    #[test]
    fn test_message_shows_popup_with_sender() {
        let (mediator, presenter) = mediator(Duration::from_secs(60));
        remote_game(&mediator);
        mediator.link().on_event(&PlayerEvent::MessageSent {
            id: 2,
            text: "hello".to_string(),
        });
        assert_eq!(presenter.popups(), vec!["bob:\n\nhello".to_string()]);
    }

    #[test]
    fn test_clock_finishes_game_once() {
        let (mediator, presenter) = mediator(Duration::ZERO);
        mediator.begin(GameSetup {
            game_type: GameType::Local,
            seed: 1,
            local_id: 1,
            opponent: None,
            connection: None,
        });
        assert!(mediator.poll_clock());
        assert!(!mediator.poll_clock());
        assert_eq!(mediator.phase(), Phase::Finished(GameType::Local));
        assert_eq!(presenter.popups().len(), 1);
        assert!(!mediator.apply_local(&PlayerEvent::MoveMade { id: 1, move_index: 0 }));
    }
}
