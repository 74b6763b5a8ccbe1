// Terminal user interface
// Popups, soft buttons, key input and screen rendering

pub mod input;
pub mod overlay;
pub mod popup;
pub mod popup_host;
pub mod render;
pub mod soft_buttons;
pub mod strings;
pub mod text_input;

pub use input::Key;
pub use popup::{PopupListener, PopupRequest};
pub use popup_host::PopupHost;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Set from any thread when something on screen changed.
#[derive(Debug, Clone, Default)]
pub struct RepaintFlag(Arc<AtomicBool>);

impl RepaintFlag {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once per batch of requests.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Top level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Board,
}

/// Which screen receives keys and gets painted.
pub struct ScreenSwitch {
    current: Mutex<Screen>,
    repaint: RepaintFlag,
}

impl ScreenSwitch {
    pub fn new(repaint: RepaintFlag) -> Self {
        Self {
            current: Mutex::new(Screen::Menu),
            repaint,
        }
    }

    pub fn show(&self, screen: Screen) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = screen;
        self.repaint.request();
    }

    pub fn current(&self) -> Screen {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
