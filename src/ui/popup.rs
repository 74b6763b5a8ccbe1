// Popup state machine
// A modal text box with optional alternatives, a timeout and its own poll thread

use std::fmt;
use std::ops::Range;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use super::input::Key;

/// Characters after which a line may be wrapped
pub const TEXT_BREAKS: [char; 13] = [' ', '?', ';', ',', '.', '!', ':', '-', '=', '(', ')', '[', ']'];

/// Receives the outcome of a popup. Called at most once per shown popup.
pub trait PopupListener: Send + Sync {
    fn selected_choice(&self, choice: usize, timed_out: bool);
}

/// Width of rendered characters, in the same unit as the popup width.
pub trait TextMetrics: Send + Sync {
    fn char_width(&self, c: char) -> usize;
}

/// Terminal columns per character. Wide glyphs take two, control and
/// combining characters none.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMetrics;

impl TextMetrics for MonospaceMetrics {
    fn char_width(&self, c: char) -> usize {
        UnicodeWidthChar::width(c).unwrap_or(0)
    }
}

/// Everything needed to show a popup.
#[derive(Clone)]
pub struct PopupRequest {
    pub text: String,
    pub alternatives: Vec<String>,
    /// Zero means no timeout
    pub timeout_secs: u32,
    pub default_alt: usize,
    /// Reported on timeout, on the back key and when another popup takes over
    pub timeout_alt: usize,
    pub listener: Option<Arc<dyn PopupListener>>,
}

impl PopupRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alternatives: Vec::new(),
            timeout_secs: 0,
            default_alt: 0,
            timeout_alt: 0,
            listener: None,
        }
    }

    /// A message with a single "Ok"
    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(text).with_alternatives(super::strings::alt_ok())
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn with_timeout(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_choices(mut self, default_alt: usize, timeout_alt: usize) -> Self {
        self.default_alt = default_alt;
        self.timeout_alt = timeout_alt;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PopupListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl fmt::Debug for PopupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupRequest")
            .field("text", &self.text)
            .field("alternatives", &self.alternatives)
            .field("timeout_secs", &self.timeout_secs)
            .field("default_alt", &self.default_alt)
            .field("timeout_alt", &self.timeout_alt)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Text area available to a popup, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupArea {
    pub width: usize,
    pub visible_lines: usize,
}

/// A pending listener callback, delivered after the popup lock is released.
pub struct Notification {
    listener: Arc<dyn PopupListener>,
    pub choice: usize,
    pub timed_out: bool,
}

impl Notification {
    pub fn deliver(self) {
        self.listener.selected_choice(self.choice, self.timed_out);
    }
}

/// What the renderer needs from an active popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub lines: Vec<String>,
    pub alternatives: Vec<String>,
    pub current_alt: usize,
    pub first_line: usize,
    pub total_lines: usize,
}

#[derive(Default)]
struct PopupState {
    active: bool,
    generation: u64,
    text: Vec<char>,
    lines: Vec<Range<usize>>,
    alternatives: Vec<String>,
    timeout_alt: usize,
    current_alt: usize,
    current_line: usize,
    max_line: usize,
    visible_lines: usize,
    end_time: Option<Instant>,
    listener: Option<Arc<dyn PopupListener>>,
    // Dropping this wakes the poll thread
    stop: Option<mpsc::Sender<()>>,
}

impl PopupState {
    /// Deactivates and returns the notification to deliver, if anyone listens.
    fn resolve(&mut self, choice: usize, timed_out: bool) -> Option<Notification> {
        self.active = false;
        self.end_time = None;
        self.stop = None;
        self.listener.take().map(|listener| Notification {
            listener,
            choice,
            timed_out,
        })
    }
}

/// A reusable popup. `init` fully resets it, so one instance can be cached.
pub struct Popup {
    state: Arc<Mutex<PopupState>>,
    poll_interval: Duration,
}

impl Popup {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(PopupState::default())),
            poll_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PopupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resets all content and timer state, lays out the text and starts the poll thread.
    pub fn init(&self, request: PopupRequest, area: PopupArea, metrics: &dyn TextMetrics) {
        let generation;
        let (stop_tx, stop_rx) = mpsc::channel();
        {
            let mut state = self.lock();
            let text: Vec<char> = request.text.chars().collect();
            let lines = break_lines(&text, area.width.max(1), metrics);
            let visible_lines = area.visible_lines.max(1);
            let alt_count = request.alternatives.len();

            state.generation = state.generation.wrapping_add(1);
            generation = state.generation;
            state.end_time = if request.timeout_secs > 0 {
                Some(Instant::now() + Duration::from_secs(u64::from(request.timeout_secs)))
            } else if alt_count > 0 {
                None
            } else {
                // Nothing to choose and no timeout: expires on the first poll
                Some(Instant::now())
            };
            state.max_line = (lines.len() + 1).saturating_sub(visible_lines).max(1);
            state.visible_lines = visible_lines;
            state.current_line = 0;
            state.current_alt = request.default_alt.min(alt_count.saturating_sub(1));
            state.timeout_alt = request.timeout_alt;
            state.alternatives = request.alternatives;
            state.listener = request.listener;
            state.text = text;
            state.lines = lines;
            state.active = true;
            state.stop = Some(stop_tx);
        }

        let state = self.state.clone();
        let interval = self.poll_interval;
        let spawned = thread::Builder::new()
            .name("popup-poll".to_string())
            .spawn(move || poll_loop(state, generation, stop_rx, interval));
        if let Err(e) = spawned {
            warn!("Failed to start popup poll thread: {}", e);
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn timeout_choice(&self) -> usize {
        self.lock().timeout_alt
    }

    /// Handles a key while active. Returns true if the key was consumed.
    pub fn key_pressed(&self, key: Key) -> bool {
        let notification = {
            let mut state = self.lock();
            if !state.active {
                return false;
            }
            if state.alternatives.is_empty() {
                let choice = state.current_alt;
                state.resolve(choice, false)
            } else {
                let alt_count = state.alternatives.len();
                match key {
                    Key::Down => {
                        state.current_line += 1;
                        if state.current_line >= state.max_line {
                            state.current_line = 0;
                        }
                        None
                    }
                    Key::Up => {
                        state.current_line = match state.current_line {
                            0 => state.max_line - 1,
                            n => n - 1,
                        };
                        None
                    }
                    Key::Right => {
                        state.current_alt = (state.current_alt + 1) % alt_count;
                        None
                    }
                    Key::Left => {
                        state.current_alt = (state.current_alt + alt_count - 1) % alt_count;
                        None
                    }
                    Key::Fire => {
                        let choice = state.current_alt;
                        state.resolve(choice, false)
                    }
                    Key::Back => {
                        let choice = state.timeout_alt;
                        state.resolve(choice, false)
                    }
                    _ => None,
                }
            }
        };
        if let Some(n) = notification {
            n.deliver();
        }
        true
    }

    /// Ends an active popup because another one replaces it. The caller delivers
    /// the returned notification, which carries the timeout alternative.
    pub fn preempt(&self) -> Option<Notification> {
        let mut state = self.lock();
        if !state.active {
            return None;
        }
        let choice = state.timeout_alt;
        state.resolve(choice, true)
    }

    /// Deactivates without notifying and drops all held content. Safe to repeat.
    pub fn dispose(&self) {
        let mut state = self.lock();
        state.active = false;
        state.end_time = None;
        state.stop = None;
        state.listener = None;
        state.text.clear();
        state.lines.clear();
        state.alternatives.clear();
    }

    pub fn view(&self) -> Option<PopupView> {
        let state = self.lock();
        if !state.active {
            return None;
        }
        let end = (state.current_line + state.visible_lines).min(state.lines.len());
        let lines = state.lines[state.current_line.min(end)..end]
            .iter()
            .map(|range| state.text[range.clone()].iter().collect())
            .collect();
        Some(PopupView {
            lines,
            alternatives: state.alternatives.clone(),
            current_alt: state.current_alt,
            first_line: state.current_line,
            total_lines: state.lines.len(),
        })
    }
}

impl Drop for Popup {
    fn drop(&mut self) {
        self.lock().stop = None;
    }
}

fn poll_loop(
    state: Arc<Mutex<PopupState>>,
    generation: u64,
    stop: mpsc::Receiver<()>,
    interval: Duration,
) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Disposed, resolved or re-initialised
            _ => break,
        }
        let notification = {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            if guard.generation != generation || !guard.active {
                break;
            }
            match guard.end_time {
                Some(end) if Instant::now() >= end => {
                    let choice = guard.timeout_alt;
                    guard.resolve(choice, true)
                }
                _ => continue,
            }
        };
        debug!("Popup timed out");
        if let Some(n) = notification {
            n.deliver();
        }
        break;
    }
}

/// Splits `text` into line ranges no wider than `width`.
///
/// Prefers breaking after a break character, hard-breaks a word that fills a
/// whole line, and always breaks at a newline. Spaces at a wrap point are
/// dropped. Leading spaces after an explicit newline are kept.
pub fn break_lines(text: &[char], width: usize, metrics: &dyn TextMetrics) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut wrapped = false;

    while start < text.len() {
        if wrapped {
            while start < text.len() && text[start] == ' ' {
                start += 1;
            }
            if start == text.len() {
                break;
            }
        }

        let mut line_width = 0;
        let mut last_break: Option<usize> = None;
        let mut i = start;
        let (end, next, soft) = loop {
            if i == text.len() {
                break (i, i, false);
            }
            let c = text[i];
            if c == '\n' {
                break (i, i + 1, false);
            }
            let w = metrics.char_width(c);
            if line_width + w > width && i > start {
                if c == ' ' {
                    break (i, i + 1, true);
                }
                match last_break {
                    Some(b) if b > start => {
                        let end = if text[b] == ' ' { b } else { b + 1 };
                        break (end, b + 1, true);
                    }
                    _ => break (i, i, true),
                }
            }
            if TEXT_BREAKS.contains(&c) {
                last_break = Some(i);
            }
            line_width += w;
            i += 1;
        };

        let mut end = end;
        if soft {
            while end > start && text[end - 1] == ' ' {
                end -= 1;
            }
        }
        lines.push(start..end);
        start = next;
        wrapped = soft;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;

    struct Recorder(Mutex<mpsc::Sender<(usize, bool)>>);

    impl PopupListener for Recorder {
        fn selected_choice(&self, choice: usize, timed_out: bool) {
            let _ = self.0.lock().unwrap().send((choice, timed_out));
        }
    }

    fn recorder() -> (Arc<Recorder>, Receiver<(usize, bool)>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Recorder(Mutex::new(tx))), rx)
    }

    fn area() -> PopupArea {
        PopupArea {
            width: 20,
            visible_lines: 2,
        }
    }

    fn lines_of(text: &str, width: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        break_lines(&chars, width, &MonospaceMetrics)
            .into_iter()
            .map(|r| chars[r].iter().collect())
            .collect()
    }

    #[test]
    fn test_break_does_not_split_words_or_leave_spaces() {
        assert_eq!(lines_of("abc def ghi", 7), vec!["abc def", "ghi"]);
        assert_eq!(lines_of("abc def ghi", 6), vec!["abc", "def", "ghi"]);
    }

    #[test]
    fn test_break_after_punctuation() {
        assert_eq!(lines_of("well,done", 6), vec!["well,", "done"]);
    }

    #[test]
    fn test_hard_break_long_word() {
        assert_eq!(lines_of("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_break_drops_every_space_at_wrap() {
        assert_eq!(lines_of("abc  def", 4), vec!["abc", "def"]);
        assert_eq!(lines_of("ab,  cd", 4), vec!["ab,", "cd"]);
    }

    #[test]
    fn test_wide_glyphs_take_two_columns() {
        assert_eq!(MonospaceMetrics.char_width('a'), 1);
        assert_eq!(MonospaceMetrics.char_width('語'), 2);
        assert_eq!(MonospaceMetrics.char_width('\u{301}'), 0);
        assert_eq!(lines_of("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn test_newline_forces_break_and_keeps_indent() {
        assert_eq!(lines_of("ab\n  cd", 10), vec!["ab", "  cd"]);
        assert_eq!(lines_of("ab\n\ncd", 10), vec!["ab", "", "cd"]);
    }

    #[test]
    fn test_timeout_fires_once() {
        let popup = Popup::new(Duration::from_millis(50));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("wait")
                .with_alternatives(vec!["a".into(), "b".into()])
                .with_timeout(1)
                .with_choices(0, 1)
                .with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        assert!(rx.recv_timeout(Duration::from_millis(700)).is_err());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), (1, true));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(!popup.is_active());
    }

    #[test]
    fn test_dispose_before_timeout_gives_no_callback() {
        let popup = Popup::new(Duration::from_millis(20));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::ok("bye").with_timeout(1).with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        popup.dispose();
        popup.dispose();
        assert!(rx.recv_timeout(Duration::from_millis(1300)).is_err());
        assert!(popup.view().is_none());
    }

    #[test]
    fn test_no_alternatives_and_no_timeout_expires_immediately() {
        let popup = Popup::new(Duration::from_millis(20));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("flash").with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), (0, true));
    }

    #[test]
    fn test_keys_cycle_and_select() {
        let popup = Popup::new(Duration::from_secs(60));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("pick")
                .with_alternatives(vec!["x".into(), "y".into(), "z".into()])
                .with_choices(0, 2)
                .with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        popup.key_pressed(Key::Left);
        assert_eq!(popup.view().unwrap().current_alt, 2);
        popup.key_pressed(Key::Right);
        popup.key_pressed(Key::Right);
        assert_eq!(popup.view().unwrap().current_alt, 1);
        assert!(popup.key_pressed(Key::Fire));
        assert_eq!(rx.try_recv().unwrap(), (1, false));

        // Inactive popups ignore keys
        assert!(!popup.key_pressed(Key::Fire));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_back_reports_timeout_alternative() {
        let popup = Popup::new(Duration::from_secs(60));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("sure?")
                .with_alternatives(vec!["yes".into(), "no".into()])
                .with_choices(0, 1)
                .with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        popup.key_pressed(Key::Back);
        assert_eq!(rx.try_recv().unwrap(), (1, false));
    }

    #[test]
    fn test_any_key_resolves_without_alternatives() {
        let popup = Popup::new(Duration::from_secs(60));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("note").with_timeout(30).with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        popup.key_pressed(Key::Char('q'));
        assert_eq!(rx.try_recv().unwrap(), (0, false));
    }

    #[test]
    fn test_scroll_wraps() {
        let popup = Popup::new(Duration::from_secs(60));
        popup.init(
            PopupRequest::ok("one two three four"),
            PopupArea {
                width: 5,
                visible_lines: 2,
            },
            &MonospaceMetrics,
        );
        // four lines, two visible: first line may be 0, 1 or 2
        assert_eq!(popup.view().unwrap().total_lines, 4);
        popup.key_pressed(Key::Up);
        assert_eq!(popup.view().unwrap().first_line, 2);
        assert_eq!(popup.view().unwrap().lines, vec!["three", "four"]);
        popup.key_pressed(Key::Down);
        assert_eq!(popup.view().unwrap().first_line, 0);
    }

    #[test]
    fn test_preempt_reports_timeout_choice() {
        let popup = Popup::new(Duration::from_secs(60));
        let (listener, rx) = recorder();
        popup.init(
            PopupRequest::new("old")
                .with_alternatives(vec!["a".into(), "b".into()])
                .with_choices(0, 1)
                .with_listener(listener),
            area(),
            &MonospaceMetrics,
        );
        popup.preempt().unwrap().deliver();
        assert_eq!(rx.try_recv().unwrap(), (1, true));
        assert!(popup.preempt().is_none());
    }
}
