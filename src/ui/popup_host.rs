// Popup host
// Owns the single cached popup shown over whatever screen is active

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use super::input::Key;
use super::popup::{MonospaceMetrics, Popup, PopupArea, PopupRequest, PopupView, TextMetrics};
use super::RepaintFlag;

pub struct PopupHost {
    popup: Popup,
    area: Mutex<PopupArea>,
    // Serialises show/dismiss against each other
    showing: Mutex<()>,
    metrics: Box<dyn TextMetrics>,
    repaint: RepaintFlag,
}

impl PopupHost {
    pub fn new(poll_interval: Duration, repaint: RepaintFlag) -> Self {
        Self {
            popup: Popup::new(poll_interval),
            area: Mutex::new(PopupArea {
                width: 40,
                visible_lines: 6,
            }),
            showing: Mutex::new(()),
            metrics: Box::new(MonospaceMetrics),
            repaint,
        }
    }

    fn serialise(&self) -> MutexGuard<'_, ()> {
        self.showing.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Updates the text area used for the next popup, normally on terminal resize.
    pub fn set_area(&self, area: PopupArea) {
        *self.area.lock().unwrap_or_else(|e| e.into_inner()) = area;
    }

    /// Shows a popup. An active popup is resolved first with its timeout
    /// alternative and `timed_out = true`.
    pub fn show(&self, request: PopupRequest) {
        let preempted = {
            let _guard = self.serialise();
            self.popup.preempt()
        };
        if let Some(notification) = preempted {
            debug!("Popup preempted, reporting choice {}", notification.choice);
            notification.deliver();
        }
        {
            let _guard = self.serialise();
            let area = *self.area.lock().unwrap_or_else(|e| e.into_inner());
            self.popup.init(request, area, self.metrics.as_ref());
        }
        self.repaint.request();
    }

    /// Closes the current popup without notifying its listener.
    pub fn dismiss(&self) {
        let _guard = self.serialise();
        self.popup.dispose();
        self.repaint.request();
    }

    pub fn is_showing(&self) -> bool {
        self.popup.is_active()
    }

    /// Routes a key to the popup. Returns false if no popup is showing.
    pub fn key_pressed(&self, key: Key) -> bool {
        let consumed = self.popup.key_pressed(key);
        if consumed {
            self.repaint.request();
        }
        consumed
    }

    pub fn view(&self) -> Option<PopupView> {
        self.popup.view()
    }
}
