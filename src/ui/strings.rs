// User-visible texts shown by popups, pages and soft buttons

pub const OK: &str = "Ok";
pub const CANCEL: &str = "Cancel";
pub const EXIT: &str = "Exit";
pub const MESSAGE: &str = "Message";

pub const TITLE: &str = "MoBoggle";
pub const PLAY_LOCAL: &str = "Play alone";
pub const HOST_GAME: &str = "Host game";
pub const JOIN_GAME: &str = "Join game";
pub const ENTER_ADDRESS: &str = "Enter address";
pub const SETTINGS: &str = "Settings";
pub const CHANGE_NAME: &str = "Change name";
pub const HELP: &str = "Help";
pub const ABOUT: &str = "About";
pub const QUIT: &str = "Quit";

pub const ABOUT_TEXT: &str = "MoBoggle is a word game for one or two players. \
Find as many words as you can before the clock runs out. Long texts like this one \
are wrapped automatically and can be scrolled with the arrow keys.";
pub const HELP_TEXT: &str = "Arrows move the cursor. Enter picks a letter, \
Backspace takes the last one back and Space submits the word.\n\
F1 and F2 are the soft buttons. Esc goes back.";

pub const STARTING_GAME: &str = "Starting a MoBoggle game";
pub const HANDSHAKE_FAIL: &str = "Handshake failed";
pub const QUIT_REMOTE: &str = "Quit remote game? Giving up ends the game for both players.";
pub const GIVE_UP: &str = "Give up";
pub const REMOTE_GAVE_UP: &str = "Remote gave up";
pub const REMOTE_QUIT: &str = "Remote quit";
pub const CONN_LOST: &str = "Lost connection";
pub const SERVER_OPENED: &str = "Server opened, waiting for a player on";
pub const SERVER_FAILURE: &str = "Server failure";
pub const CONNECTING: &str = "Connecting to";
pub const CONN_FAIL: &str = "Connection failed";
pub const TIME_UP: &str = "Time is up!";
pub const ENTER_MESSAGE: &str = "Message to opponent";
pub const ENTER_NAME: &str = "Your name";

/// Standard single "Ok" alternative.
pub fn alt_ok() -> Vec<String> {
    vec![OK.to_string()]
}

pub fn alt_cancel() -> Vec<String> {
    vec![CANCEL.to_string()]
}
