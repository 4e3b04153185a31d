use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A point in the template source.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Location {
	/// 1-based line number.
	pub line: usize,
	/// 1-based column number, counted in characters.
	pub column: usize,
	/// 0-based byte offset.
	pub offset: usize,
}

impl Location {
	pub fn new(line: usize, column: usize, offset: usize) -> Self {
		Self { line, column, offset }
	}

	/// Advances past `text`, tracking line breaks.
	pub(crate) fn advance(&mut self, text: &str) {
		for ch in text.chars() {
			self.offset += ch.len_utf8();

			if ch == '\n' {
				self.line += 1;
				self.column = 1;
			} else {
				self.column += 1;
			}
		}
	}
}

impl Default for Location {
	fn default() -> Self {
		Self { line: 1, column: 1, offset: 0 }
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// The span a token or node covers in the template source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub start: Location,
	pub end: Location,
}

impl Position {
	pub fn new(
		start_line: usize,
		start_column: usize,
		start_offset: usize,
		end_line: usize,
		end_column: usize,
		end_offset: usize,
	) -> Self {
		Self {
			start: Location::new(start_line, start_column, start_offset),
			end: Location::new(end_line, end_column, end_offset),
		}
	}

	pub fn span(start: Location, end: Location) -> Self {
		Self { start, end }
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.start)
	}
}
