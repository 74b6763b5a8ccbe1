// Text input dialog
// One line editor for messages, names and addresses; submitted text is handled on the task queue

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::input::Key;
use super::RepaintFlag;
use crate::tasks::TaskQueue;

/// Longest text the dialog accepts
pub const MAX_INPUT_CHARS: usize = 200;

/// Receives text the user submitted. Runs on a task worker, never the UI thread.
pub trait StringInputHandler: Send + Sync {
    fn handle_string_input(&self, text: String) -> anyhow::Result<()>;
}

struct Dialog {
    title: String,
    buffer: String,
    handler: Arc<dyn StringInputHandler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInputView {
    pub title: String,
    pub text: String,
}

pub struct TextInput {
    dialog: Mutex<Option<Dialog>>,
    tasks: Arc<TaskQueue>,
    repaint: RepaintFlag,
}

impl TextInput {
    pub fn new(tasks: Arc<TaskQueue>, repaint: RepaintFlag) -> Self {
        Self {
            dialog: Mutex::new(None),
            tasks,
            repaint,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Dialog>> {
        self.dialog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens the dialog, replacing any dialog already open.
    pub fn open(&self, title: &str, initial: &str, handler: Arc<dyn StringInputHandler>) {
        *self.lock() = Some(Dialog {
            title: title.to_string(),
            buffer: initial.chars().take(MAX_INPUT_CHARS).collect(),
            handler,
        });
        self.repaint.request();
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub fn close(&self) {
        if self.lock().take().is_some() {
            self.repaint.request();
        }
    }

    /// Handles a key while the dialog is open. Returns false if it is closed.
    pub fn key_pressed(&self, key: Key) -> bool {
        if key == Key::Paste {
            if !self.is_open() {
                return false;
            }
            if let Some(text) = read_clipboard() {
                self.insert(&text);
            }
            return true;
        }

        let mut guard = self.lock();
        let Some(dialog) = guard.as_mut() else {
            return false;
        };
        match key {
            Key::Char(c) => push_limited(&mut dialog.buffer, std::iter::once(c)),
            Key::Backspace => {
                dialog.buffer.pop();
            }
            Key::Back | Key::SoftLeft => {
                guard.take();
            }
            Key::Fire | Key::SoftRight => {
                if let Some(dialog) = guard.take() {
                    drop(guard);
                    self.submit(dialog);
                }
            }
            _ => {}
        }
        self.repaint.request();
        true
    }

    /// Inserts text at the end of the buffer, dropping line breaks.
    pub fn insert(&self, text: &str) {
        if let Some(dialog) = self.lock().as_mut() {
            push_limited(
                &mut dialog.buffer,
                text.chars().filter(|c| !c.is_control()),
            );
            self.repaint.request();
        }
    }

    pub fn view(&self) -> Option<TextInputView> {
        self.lock().as_ref().map(|d| TextInputView {
            title: d.title.clone(),
            text: d.buffer.clone(),
        })
    }

    fn submit(&self, dialog: Dialog) {
        let text = dialog.buffer.trim().to_string();
        if text.is_empty() {
            debug!("Empty input for {} dropped", dialog.title);
            return;
        }
        let handler = dialog.handler;
        if let Err(e) = self
            .tasks
            .submit("text-input", move || handler.handle_string_input(text))
        {
            warn!("Could not deliver input for {}: {}", dialog.title, e);
        }
    }
}

fn push_limited(buffer: &mut String, chars: impl Iterator<Item = char>) {
    let room = MAX_INPUT_CHARS.saturating_sub(buffer.chars().count());
    buffer.extend(chars.take(room));
}

fn read_clipboard() -> Option<String> {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Clipboard unavailable: {}", e);
            None
        }
    }
}
