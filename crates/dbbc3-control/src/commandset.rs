//! Command sets: named commands with an encoder and a response decoder.
//!
//! A [`CommandSet`] is the grammar of one firmware floor. Each entry maps a
//! logical command name (e.g. `"dbbcif"`) to a [`CommandSpec`]: a pure
//! encoder turning a [`Call`] into one or more wire commands, and a pure
//! decoder turning the collected replies into a [`Response`]. Neither side
//! performs I/O; the [`Session`](crate::Session) drives the exchanges.

use std::collections::HashMap;

use dbbc3_core::error::{Error, Result};
use dbbc3_core::{BoardRef, BoardTable, Family, ModeVersion};

use crate::response::Response;

/// One positional command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

/// Arguments of a named command, before board resolution.
///
/// ```
/// use dbbc3_control::Args;
///
/// let args = Args::for_board('A').int(2).text("agc").int(32000);
/// assert_eq!(args.params().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    board: Option<BoardRef>,
    params: Vec<Param>,
}

impl Args {
    /// No board, no parameters.
    pub fn none() -> Self {
        Self::default()
    }

    /// Target a core board by index or letter.
    pub fn for_board(board: impl Into<BoardRef>) -> Self {
        Self {
            board: Some(board.into()),
            params: Vec::new(),
        }
    }

    pub fn int(mut self, value: i64) -> Self {
        self.params.push(Param::Int(value));
        self
    }

    pub fn float(mut self, value: f64) -> Self {
        self.params.push(Param::Float(value));
        self
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.params.push(Param::Text(value.into()));
        self
    }

    pub fn flag(mut self, value: bool) -> Self {
        self.params.push(Param::Flag(value));
        self
    }

    pub fn board(&self) -> Option<BoardRef> {
        self.board
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// A command invocation with its board resolved against the session's
/// board table.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    board: Option<usize>,
    params: Vec<Param>,
    boards: BoardTable,
}

impl Call {
    pub fn new(args: Args, boards: BoardTable) -> Result<Self> {
        let board = args.board.map(|b| boards.resolve(b)).transpose()?;
        Ok(Self {
            board,
            params: args.params,
            boards,
        })
    }

    /// Zero-based board index; fails if the command was called without one.
    pub fn board(&self) -> Result<usize> {
        self.board
            .ok_or_else(|| Error::InvalidParameter("command requires a core board".into()))
    }

    pub fn has_board(&self) -> bool {
        self.board.is_some()
    }

    /// Lowercase board letter as used by `dbbcif{b}`.
    pub fn letter(&self) -> Result<char> {
        Ok(self.boards.letter(self.board()?)?.to_ascii_lowercase())
    }

    /// One-based board number as used by `core3h=N,...`.
    pub fn number(&self) -> Result<usize> {
        Ok(self.board()? + 1)
    }

    /// Synthesizer number and source serving the board.
    ///
    /// Each synthesizer has two outputs: board A is synth 1 source 1,
    /// board B synth 1 source 2, board C synth 2 source 1, and so on.
    pub fn synth(&self) -> Result<(usize, usize)> {
        let board = self.board()?;
        Ok((board / 2 + 1, board % 2 + 1))
    }

    pub fn boards(&self) -> BoardTable {
        self.boards
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn opt_int(&self, index: usize) -> Result<Option<i64>> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_type(index, "an integer", other)),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        self.opt_int(index)?.ok_or_else(|| missing(index))
    }

    /// Integers are accepted where a float is expected.
    pub fn opt_float(&self, index: usize) -> Result<Option<f64>> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Float(v)) => Ok(Some(*v)),
            Some(Param::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(wrong_type(index, "a number", other)),
        }
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        self.opt_float(index)?.ok_or_else(|| missing(index))
    }

    pub fn opt_text(&self, index: usize) -> Result<Option<&str>> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Text(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(wrong_type(index, "text", other)),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str> {
        self.opt_text(index)?.ok_or_else(|| missing(index))
    }

    pub fn opt_flag(&self, index: usize) -> Result<Option<bool>> {
        match self.params.get(index) {
            None => Ok(None),
            Some(Param::Flag(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_type(index, "a flag", other)),
        }
    }

    pub fn flag(&self, index: usize) -> Result<bool> {
        self.opt_flag(index)?.ok_or_else(|| missing(index))
    }
}

fn missing(index: usize) -> Error {
    Error::InvalidParameter(format!("missing argument {index}"))
}

fn wrong_type(index: usize, expected: &str, got: &Param) -> Error {
    Error::InvalidParameter(format!("argument {index} must be {expected}, got {got:?}"))
}

/// Builds the wire commands of one invocation, in exchange order.
pub type Encoder = fn(&Call) -> Result<Vec<String>>;

/// Decodes the replies of one invocation, one per encoded command.
pub type Decoder = fn(&Call, &[String]) -> Result<Response>;

/// Encoder/decoder pair of a named command.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub encode: Encoder,
    pub decode: Decoder,
}

impl CommandSpec {
    pub const fn new(name: &'static str, encode: Encoder, decode: Decoder) -> Self {
        Self {
            name,
            encode,
            decode,
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec").field("name", &self.name).finish()
    }
}

/// The grammar of one firmware floor.
#[derive(Debug, Clone)]
pub struct CommandSet {
    floor: ModeVersion,
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandSet {
    /// Build a command set from its specs. A later spec with the same name
    /// overrides an earlier one, so a floor can start from its parent's
    /// grammar and replace individual commands.
    pub fn new(floor: ModeVersion, specs: impl IntoIterator<Item = CommandSpec>) -> Self {
        let commands = specs.into_iter().map(|spec| (spec.name, spec)).collect();
        Self { floor, commands }
    }

    pub fn floor(&self) -> ModeVersion {
        self.floor
    }

    pub fn family(&self) -> Family {
        self.floor.mode.family()
    }

    pub fn get(&self, name: &str) -> Result<&CommandSpec> {
        self.commands.get(name).ok_or_else(|| {
            Error::Unsupported(format!("command {name} is not available in {}", self.floor))
        })
    }

    pub fn supports(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Command names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
