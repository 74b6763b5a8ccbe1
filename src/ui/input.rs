// Keyboard input translated into the handful of keys the game understands

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::time::Duration;

/// Device-neutral key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    /// Accept / select
    Fire,
    /// Platform back key
    Back,
    SoftLeft,
    SoftRight,
    Backspace,
    /// Clipboard paste request
    Paste,
    Char(char),
}

/// Map a terminal key event to a game key
pub fn translate(key: KeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Enter => Some(Key::Fire),
        KeyCode::Esc => Some(Key::Back),
        KeyCode::F(1) => Some(Key::SoftLeft),
        KeyCode::F(2) => Some(Key::SoftRight),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Char('v') | KeyCode::Char('V') if ctrl => Some(Key::Paste),
        KeyCode::Char(c) if !ctrl => Some(Key::Char(c)),
        _ => None,
    }
}

/// Poll for a key, waiting at most `timeout`
pub fn poll_key(timeout: Duration) -> Result<Option<Key>, io::Error> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(translate(key));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_translate_navigation_keys() {
        assert_eq!(translate(press(KeyCode::Enter, KeyModifiers::NONE)), Some(Key::Fire));
        assert_eq!(translate(press(KeyCode::Esc, KeyModifiers::NONE)), Some(Key::Back));
        assert_eq!(translate(press(KeyCode::F(2), KeyModifiers::NONE)), Some(Key::SoftRight));
        assert_eq!(translate(press(KeyCode::Char('x'), KeyModifiers::NONE)), Some(Key::Char('x')));
    }

    #[test]
    fn test_ctrl_v_is_paste() {
        assert_eq!(translate(press(KeyCode::Char('v'), KeyModifiers::CONTROL)), Some(Key::Paste));
        assert_eq!(translate(press(KeyCode::Char('c'), KeyModifiers::CONTROL)), None);
    }
}
