// Game module for MoBoggle
// Players, the shared board, the mediator between players and screen, and session start-up

pub mod board;
pub mod local;
pub mod mediator;
pub mod player;
pub mod proxy;
pub mod remote;
pub mod session;

pub use board::{Board, Direction, Progress, Seat};
pub use local::LocalPlayer;
pub use mediator::{BoardMediator, BoardSnapshot, GameType, Phase, Presenter};
pub use player::{Player, PlayerListener};
pub use session::{SessionError, Sessions};
