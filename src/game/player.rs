// Players and their listeners
// A player fires events to every registered listener; local and remote players share this core

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{error, warn};

use crate::network::{ExitReason, PlayerEvent, ProtocolError};

/// Receives player events. Called synchronously on the firing thread.
pub trait PlayerListener: Send + Sync {
    fn on_event(&self, event: &PlayerEvent);
}

/// Told when the link to the other device breaks.
pub trait LinkObserver: Send + Sync {
    fn lost_remote_connection(&self, error: &ProtocolError);
}

pub struct Player {
    id: i32,
    name: String,
    listeners: Mutex<Vec<Arc<dyn PlayerListener>>>,
}

impl Player {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_listener(&self, listener: Arc<dyn PlayerListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn PlayerListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Delivers `event` to every listener, newest first. A panicking listener
    /// is logged and does not stop the others.
    pub fn fire(&self, event: &PlayerEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners.iter().rev() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if result.is_err() {
                error!("Player listener panicked on {}", event);
            }
        }
    }

    pub fn fire_move_made(&self, move_index: i32) {
        self.fire(&PlayerEvent::MoveMade {
            id: self.id,
            move_index,
        });
    }

    pub fn fire_undo_performed(&self) {
        self.fire(&PlayerEvent::UndoPerformed { id: self.id });
    }

    pub fn fire_turn_commit(&self) {
        self.fire(&PlayerEvent::TurnCommit { id: self.id });
    }

    pub fn fire_message_sent(&self, text: &str) {
        if text.is_empty() {
            warn!("Ignoring empty message");
            return;
        }
        self.fire(&PlayerEvent::MessageSent {
            id: self.id,
            text: text.to_string(),
        });
    }

    pub fn fire_game_exited(&self, reason: ExitReason) {
        self.fire(&PlayerEvent::GameExited { id: self.id, reason });
    }
}
