use std::fmt;

use derive_more::Deref;
use derive_more::DerefMut;

use crate::Position;

/// Which flavor of block a tag opens or closes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockKind {
	Condition,
	Section,
}

impl fmt::Display for BlockKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Condition => write!(f, "condition"),
			Self::Section => write!(f, "section"),
		}
	}
}

/// A lexical unit shared by both dialects. The tokenizer captures raw
/// lexemes only; operator and value semantics belong to the builder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
	/// Literal text passed through to the output untouched.
	Text(String),
	/// A variable placeholder resolved at render time.
	Variable { name: String },
	/// Opens a condition block. `operator` and `value` are uninterpreted.
	OpenCondition {
		subject: String,
		operator: String,
		value: String,
	},
	/// Opens a named section block.
	OpenSection { name: String },
	/// Closes the innermost open block.
	Close(BlockKind),
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Text(content) => write!(f, "text {content:?}"),
			Self::Variable { name } => write!(f, "variable `{name}`"),
			Self::OpenCondition { subject, operator, value } => {
				write!(f, "condition `{subject} {operator} {value}`")
			}
			Self::OpenSection { name } => write!(f, "section `{name}`"),
			Self::Close(kind) => write!(f, "close {kind}"),
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
	pub kind: TokenKind,
	pub position: Position,
}

impl Token {
	pub fn new(kind: TokenKind, position: Position) -> Self {
		Self { kind, position }
	}
}

/// The finite, restartable token sequence for one template source.
#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, PartialEq)]
pub struct TokenList(Vec<Token>);
