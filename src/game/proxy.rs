// Listener proxy
// Forwards local player events onto the wire, seen from the remote side

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::player::{LinkObserver, PlayerListener};
use crate::network::{write_event, PlayerEvent};

/// Registered on the local player. Every event is written and flushed as one frame.
pub struct PlayerListenerProxy<W: Write + Send> {
    output: Mutex<W>,
    observer: Arc<dyn LinkObserver>,
    failed: AtomicBool,
}

impl<W: Write + Send> PlayerListenerProxy<W> {
    pub fn new(output: W, observer: Arc<dyn LinkObserver>) -> Self {
        Self {
            output: Mutex::new(output),
            observer,
            failed: AtomicBool::new(false),
        }
    }
}

impl<W: Write + Send> PlayerListener for PlayerListenerProxy<W> {
    fn on_event(&self, event: &PlayerEvent) {
        let wire = event.clone().for_remote();
        let result = {
            let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
            write_event(&mut *output, &wire)
        };
        match result {
            Ok(()) => debug!("Sent {}", wire),
            Err(e) => {
                warn!("Failed to send {}: {}", wire, e);
                if !self.failed.swap(true, Ordering::SeqCst) {
                    self.observer.lost_remote_connection(&e);
                }
            }
        }
    }
}
