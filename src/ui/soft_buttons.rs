// Soft buttons
// Two labelled commands in the bottom corners, bound to F1/F2 and optionally the back key

use std::sync::Arc;

use super::input::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Screen,
    /// Also triggered by the back key
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub label: String,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(label: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }
}

pub trait CommandListener: Send + Sync {
    fn command_action(&self, command: &Command);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

struct Slot {
    command: Command,
    enabled: bool,
}

/// Label and enabled state of one button, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub label: String,
    pub enabled: bool,
}

#[derive(Default)]
pub struct SoftButtons {
    left: Option<Slot>,
    right: Option<Slot>,
    back: Option<Side>,
    listener: Option<Arc<dyn CommandListener>>,
}

impl SoftButtons {
    pub fn new(left: Option<Command>, right: Option<Command>) -> Self {
        let mut buttons = Self::default();
        buttons.set_right(right);
        buttons.set_left(left);
        buttons
    }

    pub fn set_listener(&mut self, listener: Arc<dyn CommandListener>) {
        self.listener = Some(listener);
    }

    pub fn set_left(&mut self, command: Option<Command>) {
        self.set(Side::Left, command);
    }

    pub fn set_right(&mut self, command: Option<Command>) {
        self.set(Side::Right, command);
    }

    fn set(&mut self, side: Side, command: Option<Command>) {
        if self.back == Some(side) {
            self.back = None;
        }
        let slot = command.map(|command| {
            if command.kind == CommandKind::Back {
                self.back = Some(side);
            }
            Slot {
                command,
                enabled: true,
            }
        });
        match side {
            Side::Left => self.left = slot,
            Side::Right => self.right = slot,
        }
    }

    /// Enables or disables whichever button carries `command`.
    pub fn enable(&mut self, command: &Command, enabled: bool) {
        for slot in [&mut self.left, &mut self.right].into_iter().flatten() {
            if &slot.command == command {
                slot.enabled = enabled;
            }
        }
    }

    fn slot(&self, side: Side) -> Option<&Slot> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    /// Dispatches the command bound to `key`. Returns true if one fired.
    pub fn key_pressed(&self, key: Key) -> bool {
        let side = match key {
            Key::SoftLeft => Some(Side::Left),
            Key::SoftRight => Some(Side::Right),
            Key::Back => self.back,
            _ => None,
        };
        let command = side
            .and_then(|side| self.slot(side))
            .filter(|slot| slot.enabled)
            .map(|slot| &slot.command);
        match (command, &self.listener) {
            (Some(command), Some(listener)) => {
                listener.command_action(command);
                true
            }
            _ => false,
        }
    }

    pub fn left_view(&self) -> Option<ButtonView> {
        self.view(Side::Left)
    }

    pub fn right_view(&self) -> Option<ButtonView> {
        self.view(Side::Right)
    }

    fn view(&self, side: Side) -> Option<ButtonView> {
        self.slot(side).map(|slot| ButtonView {
            label: slot.command.label.clone(),
            enabled: slot.enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl CommandListener for Log {
        fn command_action(&self, command: &Command) {
            self.0.lock().unwrap().push(command.label.clone());
        }
    }

    fn setup() -> (SoftButtons, Arc<Log>, Command, Command) {
        let exit = Command::new("Exit", CommandKind::Back);
        let message = Command::new("Message", CommandKind::Screen);
        let mut buttons = SoftButtons::new(Some(exit.clone()), Some(message.clone()));
        let log = Arc::new(Log::default());
        buttons.set_listener(log.clone());
        (buttons, log, exit, message)
    }

    #[test]
    fn test_soft_keys_dispatch() {
        let (buttons, log, _, _) = setup();
        assert!(buttons.key_pressed(Key::SoftLeft));
        assert!(buttons.key_pressed(Key::SoftRight));
        assert!(!buttons.key_pressed(Key::Fire));
        assert_eq!(*log.0.lock().unwrap(), vec!["Exit", "Message"]);
    }

    #[test]
    fn test_back_key_follows_back_command() {
        let (mut buttons, log, exit, _) = setup();
        assert!(buttons.key_pressed(Key::Back));

        buttons.enable(&exit, false);
        assert!(!buttons.key_pressed(Key::Back));
        assert!(!buttons.key_pressed(Key::SoftLeft));
        assert!(!buttons.left_view().unwrap().enabled);

        buttons.set_left(Some(Command::new("Menu", CommandKind::Screen)));
        assert!(!buttons.key_pressed(Key::Back));
        assert_eq!(*log.0.lock().unwrap(), vec!["Exit"]);
    }
}
