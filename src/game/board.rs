// Letter board and round clock
// Both devices build the same grid from the handshake seed; each player keeps its own path and words

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Letter pool weighted roughly by English frequency
const LETTER_POOL: &str = "AAAAAAAABBCCCDDDDEEEEEEEEEEEEFFGGHHHHHIIIIIIIJKLLLLMMMNNNNNNNOOOOOOOPPQRRRRRRSSSSSSTTTTTTTTTUUUVWWXYYZ";

/// Shortest word that counts
pub const MIN_WORD_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("tile {0} is outside the board")]
    OutOfRange(i32),
    #[error("tile {0} is already in the word")]
    AlreadySelected(usize),
}

/// Which player an event belongs to, decided by where the event came from.
/// Player ids are not used for this since two devices may share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Local,
    Opponent,
}

/// One player's state on the shared grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub path: Vec<usize>,
    pub words: Vec<String>,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    letters: Vec<char>,
    cursor: usize,
    local: Progress,
    opponent: Progress,
}

impl Board {
    pub fn new(size: usize, seed: i64) -> Self {
        let size = size.max(2);
        let pool: Vec<char> = LETTER_POOL.chars().collect();
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let letters = (0..size * size)
            .map(|_| pool[rng.gen_range(0..pool.len())])
            .collect();
        Self {
            size,
            letters,
            cursor: (size / 2) * size + size / 2,
            local: Progress::default(),
            opponent: Progress::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }

    pub fn letter(&self, index: usize) -> Option<char> {
        self.letters.get(index).copied()
    }

    /// Tile under the local cursor
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        let (row, col) = (self.cursor / self.size, self.cursor % self.size);
        let (row, col) = match direction {
            Direction::Up => (row.saturating_sub(1), col),
            Direction::Down => ((row + 1).min(self.size - 1), col),
            Direction::Left => (row, col.saturating_sub(1)),
            Direction::Right => (row, (col + 1).min(self.size - 1)),
        };
        self.cursor = row * self.size + col;
    }

    pub fn progress(&self, seat: Seat) -> &Progress {
        match seat {
            Seat::Local => &self.local,
            Seat::Opponent => &self.opponent,
        }
    }

    fn progress_mut(&mut self, seat: Seat) -> &mut Progress {
        match seat {
            Seat::Local => &mut self.local,
            Seat::Opponent => &mut self.opponent,
        }
    }

    pub fn score(&self, seat: Seat) -> u32 {
        self.progress(seat).score
    }

    /// Adds a tile to the player's current word
    pub fn select(&mut self, seat: Seat, index: i32) -> Result<(), MoveError> {
        let tile = usize::try_from(index)
            .ok()
            .filter(|&i| i < self.letters.len())
            .ok_or(MoveError::OutOfRange(index))?;
        let progress = self.progress_mut(seat);
        if progress.path.contains(&tile) {
            return Err(MoveError::AlreadySelected(tile));
        }
        progress.path.push(tile);
        Ok(())
    }

    /// Removes the last selected tile
    pub fn undo(&mut self, seat: Seat) -> Option<usize> {
        self.progress_mut(seat).path.pop()
    }

    pub fn current_word(&self, seat: Seat) -> String {
        self.progress(seat)
            .path
            .iter()
            .filter_map(|&i| self.letter(i))
            .collect()
    }

    /// Submits the current word. The path is cleared either way; the word is
    /// returned if it was long enough and new for this player.
    pub fn commit(&mut self, seat: Seat) -> Option<String> {
        let word = self.current_word(seat);
        let progress = self.progress_mut(seat);
        progress.path.clear();
        if word.chars().count() < MIN_WORD_LEN || progress.words.contains(&word) {
            return None;
        }
        progress.score += word_score(word.chars().count());
        progress.words.push(word.clone());
        Some(word)
    }
}

/// Classic points by word length
pub fn word_score(len: usize) -> u32 {
    match len {
        0..=2 => 0,
        3 | 4 => 1,
        5 => 2,
        6 => 3,
        7 => 5,
        _ => 11,
    }
}

/// Counts a round down from when it was created
#[derive(Debug, Clone, Copy)]
pub struct RoundClock {
    started: Instant,
    length: Duration,
}

impl RoundClock {
    pub fn start(length: Duration) -> Self {
        Self {
            started: Instant::now(),
            length,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.length.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.length
    }
}

/// Formats a duration as m:ss
pub fn format_time(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_board() {
        let a = Board::new(4, 1_700_000_000_000);
        let b = Board::new(4, 1_700_000_000_000);
        assert_eq!(a.letters(), b.letters());
        assert_eq!(a.letters().len(), 16);
        assert!(a.letters().iter().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_select_undo_commit() {
        let mut board = Board::new(4, 3);
        let expected: String = [0, 1, 2].iter().map(|&i| board.letter(i).unwrap()).collect();

        board.select(Seat::Local, 0).unwrap();
        board.select(Seat::Local, 1).unwrap();
        assert_eq!(board.select(Seat::Local, 1), Err(MoveError::AlreadySelected(1)));
        assert_eq!(board.select(Seat::Local, 16), Err(MoveError::OutOfRange(16)));
        assert_eq!(board.select(Seat::Local, -1), Err(MoveError::OutOfRange(-1)));
        board.select(Seat::Local, 5).unwrap();
        assert_eq!(board.undo(Seat::Local), Some(5));
        board.select(Seat::Local, 2).unwrap();

        assert_eq!(board.commit(Seat::Local), Some(expected.clone()));
        assert_eq!(board.score(Seat::Local), 1);
        assert!(board.progress(Seat::Local).path.is_empty());

        // Same word again does not count
        for i in 0..3 {
            board.select(Seat::Local, i).unwrap();
        }
        assert_eq!(board.commit(Seat::Local), None);
        assert_eq!(board.progress(Seat::Local).words, vec![expected]);
    }

    #[test]
    fn test_short_words_are_dropped() {
        let mut board = Board::new(4, 3);
        board.select(Seat::Opponent, 0).unwrap();
        board.select(Seat::Opponent, 1).unwrap();
        assert_eq!(board.commit(Seat::Opponent), None);
        assert_eq!(board.score(Seat::Opponent), 0);
        assert!(board.progress(Seat::Opponent).path.is_empty());
    }

    #[test]
    fn test_players_do_not_share_paths() {
        let mut board = Board::new(4, 3);
        board.select(Seat::Local, 0).unwrap();
        board.select(Seat::Opponent, 0).unwrap();
        assert_eq!(board.current_word(Seat::Local).len(), 1);
        assert_eq!(board.current_word(Seat::Opponent).len(), 1);
        board.commit(Seat::Local);
        assert_eq!(board.current_word(Seat::Local), "");
        assert_eq!(board.progress(Seat::Opponent).path, vec![0]);
    }

    #[test]
    fn test_cursor_stays_on_board() {
        let mut board = Board::new(4, 0);
        for _ in 0..10 {
            board.move_cursor(Direction::Up);
            board.move_cursor(Direction::Left);
        }
        assert_eq!(board.cursor(), 0);
        for _ in 0..10 {
            board.move_cursor(Direction::Down);
            board.move_cursor(Direction::Right);
        }
        assert_eq!(board.cursor(), 15);
    }

    #[test]
    fn test_word_scores() {
        assert_eq!(word_score(3), 1);
        assert_eq!(word_score(5), 2);
        assert_eq!(word_score(7), 5);
        assert_eq!(word_score(12), 11);
        assert_eq!(format_time(Duration::from_secs(125)), "2:05");
    }
}
