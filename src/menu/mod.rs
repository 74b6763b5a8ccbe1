// Menu for MoBoggle
// Pages of items, navigation with animated transitions, and rendering

pub mod page;
pub mod render;
pub mod state;

pub use page::{ItemAction, MenuPage, PageItem};
pub use render::render_menu;
pub use state::{Menu, MenuListener, MenuView, TransitionSettings};
