//! Core board addressing.
//!
//! Boards are addressed either by zero-based index or by letter (`A` is
//! board 0). A [`BoardTable`] fixes the number of boards for a session and
//! validates references against it.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum number of core boards a DBBC3 can carry.
pub const MAX_BOARDS: usize = 8;

/// Number of samplers per core board.
pub const SAMPLERS_PER_BOARD: usize = 4;

/// A reference to a core board, by index or by letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardRef {
    Index(usize),
    Letter(char),
}

impl From<usize> for BoardRef {
    fn from(index: usize) -> Self {
        BoardRef::Index(index)
    }
}

impl From<char> for BoardRef {
    fn from(letter: char) -> Self {
        BoardRef::Letter(letter)
    }
}

impl FromStr for BoardRef {
    type Err = Error;

    /// Accepts `"0"`..`"7"` or a single letter, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Ok(BoardRef::Index(index));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(BoardRef::Letter(c)),
            _ => Err(Error::InvalidParameter(format!("invalid board reference {s:?}"))),
        }
    }
}

impl fmt::Display for BoardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardRef::Index(i) => write!(f, "{i}"),
            BoardRef::Letter(c) => write!(f, "{}", c.to_ascii_uppercase()),
        }
    }
}

/// Dense board-letter table for a fixed board count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardTable {
    count: usize,
}

impl BoardTable {
    /// Create a table for `count` boards (1 to [`MAX_BOARDS`]).
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 || count > MAX_BOARDS {
            return Err(Error::InvalidParameter(format!(
                "board count must be in 1-{MAX_BOARDS}, got {count}"
            )));
        }
        Ok(Self { count })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The letter of board `index`.
    pub fn letter(&self, index: usize) -> Result<char> {
        self.check_index(index)?;
        Ok((b'A' + index as u8) as char)
    }

    /// The index of board `letter` (case-insensitive).
    pub fn index(&self, letter: char) -> Result<usize> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return Err(self.out_of_range(&letter.to_string()));
        }
        let index = (upper as u8 - b'A') as usize;
        if index >= self.count {
            return Err(self.out_of_range(&letter.to_string()));
        }
        Ok(index)
    }

    /// Resolve any board reference to a validated index.
    pub fn resolve(&self, board: impl Into<BoardRef>) -> Result<usize> {
        match board.into() {
            BoardRef::Index(i) => {
                self.check_index(i)?;
                Ok(i)
            }
            BoardRef::Letter(c) => self.index(c),
        }
    }

    /// All board indices in order.
    pub fn indices(&self) -> std::ops::Range<usize> {
        0..self.count
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.count {
            return Err(self.out_of_range(&index.to_string()));
        }
        Ok(())
    }

    fn out_of_range(&self, given: &str) -> Error {
        let last = (b'A' + (self.count - 1) as u8) as char;
        Error::InvalidParameter(format!(
            "core board {given} out of range (0-{} / A-{last})",
            self.count - 1
        ))
    }
}

impl Default for BoardTable {
    fn default() -> Self {
        Self { count: MAX_BOARDS }
    }
}
