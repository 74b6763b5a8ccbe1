// Remote player
// Reads events from the other device on a dedicated thread and replays them to local listeners

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::player::{LinkObserver, Player};
use crate::network::{read_event, PlayerEvent};

pub struct RemotePlayer {
    player: Arc<Player>,
    running: Arc<AtomicBool>,
}

impl RemotePlayer {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            player: Arc::new(Player::new(id, name)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the receive loop on its own thread.
    pub fn spawn<R>(&self, input: R, observer: Arc<dyn LinkObserver>) -> io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        self.running.store(true, Ordering::SeqCst);
        let player = self.player.clone();
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name("remote-player".to_string())
            .spawn(move || receive_loop(&player, &running, input, observer.as_ref()));
        if spawned.is_err() {
            self.running.store(false, Ordering::SeqCst);
        }
        spawned
    }

    /// Marks the loop as stopped so a later read error is not reported.
    /// The read itself only ends when the stream is closed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Reads and fires events until an exit event, end of stream or an error.
///
/// A failure is reported to `observer` exactly once, and only while the loop
/// is still considered running.
pub fn receive_loop<R: Read>(
    player: &Player,
    running: &AtomicBool,
    mut input: R,
    observer: &dyn LinkObserver,
) {
    info!("Receive loop started for {}", player.name());
    loop {
        match read_event(&mut input) {
            Ok(event) => {
                debug!("Received {}", event);
                let exit = matches!(event, PlayerEvent::GameExited { .. });
                player.fire(&event);
                if exit {
                    running.store(false, Ordering::SeqCst);
                    info!("Receive loop finished after exit event");
                    return;
                }
            }
            Err(e) => {
                if running.swap(false, Ordering::SeqCst) {
                    warn!("Lost connection to {}: {}", player.name(), e);
                    observer.lost_remote_connection(&e);
                } else {
                    debug!("Receive loop ended after stop: {}", e);
                }
                return;
            }
        }
    }
}
