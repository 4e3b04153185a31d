use std::ops::Range;

use logos::Logos;
use snailquote::unescape;

use crate::ArborError;
use crate::ArborResult;
use crate::BlockKind;
use crate::Dialect;
use crate::Location;
use crate::Position;
use crate::Token;
use crate::TokenKind;
use crate::TokenList;

/// Raw lexical atoms of the classic dialect.
///
/// Anything logos cannot match surfaces as an error span, which the walker
/// treats as literal text outside of tags.
#[derive(Logos, Debug, PartialEq)]
enum ClassicToken {
	#[regex(r"\[if[ \t\r\n]")]
	IfOpen,
	#[regex(r"\[section[ \t\r\n]")]
	SectionOpen,
	#[token("[/if]")]
	IfClose,
	#[token("[/section]")]
	SectionClose,
	#[regex(r"\{[A-Za-z_][A-Za-z0-9_]*\}")]
	Variable,
	#[token("]")]
	TagEnd,
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Ident,
	#[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
	Number,
	#[regex(r#""([^"\\]|\\.)*""#)]
	#[regex(r"'([^'\\]|\\.)*'")]
	Str,
	#[regex(r"==|!=|<=|>=|<|>")]
	OpSymbol,
	#[token("!in")]
	NotIn,
	#[token(",")]
	Comma,
	#[regex(r"[ \t\r\f]+")]
	Whitespace,
	#[token("\n")]
	Newline,
}

/// Raw lexical atoms of the handlebars dialect.
#[derive(Logos, Debug, PartialEq)]
enum HandlebarsToken {
	#[regex(r"\{\{#if[ \t\r\n]")]
	IfOpen,
	#[regex(r"\{\{#section[ \t\r\n]")]
	SectionOpen,
	#[token("{{/if}}")]
	IfClose,
	#[token("{{/section}}")]
	SectionClose,
	#[regex(r"\{\{[A-Za-z_][A-Za-z0-9_]*\}\}")]
	Variable,
	#[token("}}")]
	TagEnd,
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Ident,
	#[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
	Number,
	#[regex(r#""([^"\\]|\\.)*""#)]
	#[regex(r"'([^'\\]|\\.)*'")]
	Str,
	#[regex(r"==|!=|<=|>=|<|>")]
	OpSymbol,
	#[token("!in")]
	NotIn,
	#[token(",")]
	Comma,
	#[regex(r"[ \t\r\f]+")]
	Whitespace,
	#[token("\n")]
	Newline,
}

/// Dialect-independent view of a raw span. Both raw enums map into this so
/// one walker serves every dialect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Lexeme {
	IfOpen,
	SectionOpen,
	CloseCondition,
	CloseSection,
	Variable,
	TagEnd,
	Ident,
	Number,
	Str,
	OpSymbol,
	NotIn,
	Comma,
	Whitespace,
	Newline,
	Text,
}

impl Lexeme {
	/// Everything that does not open or close template structure is
	/// literal text when it appears outside a tag.
	fn is_literal(self) -> bool {
		!matches!(
			self,
			Self::IfOpen
				| Self::SectionOpen
				| Self::CloseCondition
				| Self::CloseSection
				| Self::Variable
		)
	}
}

fn raw_lexemes(source: &str, dialect: Dialect) -> Vec<(Lexeme, Range<usize>)> {
	match dialect {
		Dialect::Classic => ClassicToken::lexer(source)
			.spanned()
			.map(|(token, span)| {
				let lexeme = match token {
					Ok(ClassicToken::IfOpen) => Lexeme::IfOpen,
					Ok(ClassicToken::SectionOpen) => Lexeme::SectionOpen,
					Ok(ClassicToken::IfClose) => Lexeme::CloseCondition,
					Ok(ClassicToken::SectionClose) => Lexeme::CloseSection,
					Ok(ClassicToken::Variable) => Lexeme::Variable,
					Ok(ClassicToken::TagEnd) => Lexeme::TagEnd,
					Ok(ClassicToken::Ident) => Lexeme::Ident,
					Ok(ClassicToken::Number) => Lexeme::Number,
					Ok(ClassicToken::Str) => Lexeme::Str,
					Ok(ClassicToken::OpSymbol) => Lexeme::OpSymbol,
					Ok(ClassicToken::NotIn) => Lexeme::NotIn,
					Ok(ClassicToken::Comma) => Lexeme::Comma,
					Ok(ClassicToken::Whitespace) => Lexeme::Whitespace,
					Ok(ClassicToken::Newline) => Lexeme::Newline,
					Err(()) => Lexeme::Text,
				};
				(lexeme, span)
			})
			.collect(),
		Dialect::Handlebars => HandlebarsToken::lexer(source)
			.spanned()
			.map(|(token, span)| {
				let lexeme = match token {
					Ok(HandlebarsToken::IfOpen) => Lexeme::IfOpen,
					Ok(HandlebarsToken::SectionOpen) => Lexeme::SectionOpen,
					Ok(HandlebarsToken::IfClose) => Lexeme::CloseCondition,
					Ok(HandlebarsToken::SectionClose) => Lexeme::CloseSection,
					Ok(HandlebarsToken::Variable) => Lexeme::Variable,
					Ok(HandlebarsToken::TagEnd) => Lexeme::TagEnd,
					Ok(HandlebarsToken::Ident) => Lexeme::Ident,
					Ok(HandlebarsToken::Number) => Lexeme::Number,
					Ok(HandlebarsToken::Str) => Lexeme::Str,
					Ok(HandlebarsToken::OpSymbol) => Lexeme::OpSymbol,
					Ok(HandlebarsToken::NotIn) => Lexeme::NotIn,
					Ok(HandlebarsToken::Comma) => Lexeme::Comma,
					Ok(HandlebarsToken::Whitespace) => Lexeme::Whitespace,
					Ok(HandlebarsToken::Newline) => Lexeme::Newline,
					Err(()) => Lexeme::Text,
				};
				(lexeme, span)
			})
			.collect(),
	}
}

/// Streams shared [`Token`]s out of a dialect's raw spans.
///
/// Tracks the open-block stack so a stray closing tag or an unclosed block
/// fails here with a position; kind matching between open and close tags is
/// the builder's job.
pub(crate) struct TokenWalker<'a> {
	source: &'a str,
	lexemes: Vec<(Lexeme, Range<usize>)>,
	cursor: usize,
	location: Location,
	open_blocks: Vec<(BlockKind, Position)>,
	done: bool,
}

impl<'a> TokenWalker<'a> {
	pub(crate) fn new(source: &'a str, dialect: Dialect) -> Self {
		Self {
			source,
			lexemes: raw_lexemes(source, dialect),
			cursor: 0,
			location: Location::default(),
			open_blocks: Vec::new(),
			done: false,
		}
	}

	fn peek(&self) -> Option<Lexeme> {
		self.lexemes.get(self.cursor).map(|(lexeme, _)| *lexeme)
	}

	/// Consumes the current raw span, advancing the running location.
	fn bump(&mut self) -> Option<(Lexeme, &'a str, Position)> {
		let (lexeme, range) = self.lexemes.get(self.cursor)?;
		let lexeme = *lexeme;
		let slice = &self.source[range.clone()];
		let start = self.location;
		self.location.advance(slice);
		self.cursor += 1;
		Some((lexeme, slice, Position::span(start, self.location)))
	}

	fn skip_layout(&mut self) {
		while matches!(self.peek(), Some(Lexeme::Whitespace | Lexeme::Newline)) {
			self.bump();
		}
	}

	fn error_here(&self, reason: impl Into<String>) -> ArborError {
		ArborError::MalformedTag {
			position: Position::span(self.location, self.location),
			reason: reason.into(),
		}
	}

	fn peek_in_tag(&self) -> ArborResult<Lexeme> {
		self.peek().ok_or_else(|| self.error_here("unterminated tag"))
	}

	fn expect_ident(&mut self, reason: &str) -> ArborResult<String> {
		match self.peek_in_tag()? {
			Lexeme::Ident => {
				let (_, slice, _) = self.bump().ok_or_else(|| self.error_here(reason))?;
				Ok(slice.to_string())
			}
			_ => Err(self.error_here(reason)),
		}
	}

	/// The operator is captured raw. `in` arrives as an identifier, as does
	/// any misspelled word; the builder decides what is a real operator.
	fn expect_operator(&mut self) -> ArborResult<String> {
		match self.peek_in_tag()? {
			Lexeme::OpSymbol | Lexeme::NotIn | Lexeme::Ident => {
				let (_, slice, _) = self
					.bump()
					.ok_or_else(|| self.error_here("expected a comparison operator"))?;
				Ok(slice.to_string())
			}
			_ => Err(self.error_here("expected a comparison operator")),
		}
	}

	/// A value is a quoted string or an unbroken run of atoms and commas.
	fn expect_value(&mut self) -> ArborResult<String> {
		match self.peek_in_tag()? {
			Lexeme::Str => {
				let (_, slice, _) = self
					.bump()
					.ok_or_else(|| self.error_here("expected a comparison value"))?;
				unescape(slice)
					.map_err(|error| self.error_here(format!("invalid string literal: {error}")))
			}
			Lexeme::Ident | Lexeme::Number | Lexeme::Comma => {
				let start = self.location.offset;
				let mut end = start;

				while matches!(
					self.peek(),
					Some(Lexeme::Ident | Lexeme::Number | Lexeme::Comma)
				) {
					if let Some((_, _, position)) = self.bump() {
						end = position.end.offset;
					}
				}

				Ok(self.source[start..end].to_string())
			}
			_ => Err(self.error_here("expected a comparison value")),
		}
	}

	fn expect_tag_end(&mut self) -> ArborResult<()> {
		match self.peek_in_tag()? {
			Lexeme::TagEnd => {
				self.bump();
				Ok(())
			}
			_ => Err(self.error_here("expected the end of the tag")),
		}
	}

	fn finish_condition(&mut self, start: Location) -> ArborResult<Token> {
		self.skip_layout();
		let subject = self.expect_ident("expected a variable name")?;
		self.skip_layout();
		let operator = self.expect_operator()?;
		self.skip_layout();
		let value = self.expect_value()?;
		self.skip_layout();
		self.expect_tag_end()?;

		Ok(Token::new(
			TokenKind::OpenCondition { subject, operator, value },
			Position::span(start, self.location),
		))
	}

	fn finish_section(&mut self, start: Location) -> ArborResult<Token> {
		self.skip_layout();
		let name = self.expect_ident("expected a section name")?;
		self.skip_layout();
		self.expect_tag_end()?;

		Ok(Token::new(
			TokenKind::OpenSection { name },
			Position::span(start, self.location),
		))
	}

	fn close_block(&mut self, kind: BlockKind) -> ArborResult<Token> {
		let (_, _, position) = self
			.bump()
			.ok_or_else(|| self.error_here("unterminated tag"))?;

		if self.open_blocks.pop().is_none() {
			return Err(ArborError::UnexpectedClosingTag { position });
		}

		Ok(Token::new(TokenKind::Close(kind), position))
	}

	/// Merges every adjacent literal span into a single text token.
	fn take_literal(&mut self) -> Token {
		let start = self.location;
		let first = self.location.offset;
		let mut last = first;

		while self.peek().is_some_and(Lexeme::is_literal) {
			if let Some((_, _, position)) = self.bump() {
				last = position.end.offset;
			}
		}

		Token::new(
			TokenKind::Text(self.source[first..last].to_string()),
			Position::span(start, self.location),
		)
	}
}

impl Iterator for TokenWalker<'_> {
	type Item = ArborResult<Token>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}

		let Some(lexeme) = self.peek() else {
			self.done = true;

			if let Some((kind, position)) = self.open_blocks.pop() {
				return Some(Err(ArborError::UnclosedBlock { kind, position }));
			}

			return None;
		};

		let result = match lexeme {
			Lexeme::IfOpen => {
				let start = self.location;
				self.bump();
				self.finish_condition(start).inspect(|token| {
					self.open_blocks.push((BlockKind::Condition, token.position));
				})
			}
			Lexeme::SectionOpen => {
				let start = self.location;
				self.bump();
				self.finish_section(start).inspect(|token| {
					self.open_blocks.push((BlockKind::Section, token.position));
				})
			}
			Lexeme::CloseCondition => self.close_block(BlockKind::Condition),
			Lexeme::CloseSection => self.close_block(BlockKind::Section),
			Lexeme::Variable => match self.bump() {
				Some((_, slice, position)) => {
					let name = slice.trim_start_matches('{').trim_end_matches('}');
					Ok(Token::new(
						TokenKind::Variable { name: name.to_string() },
						position,
					))
				}
				None => Err(self.error_here("unterminated tag")),
			},
			_ => Ok(self.take_literal()),
		};

		if result.is_err() {
			self.done = true;
		}

		Some(result)
	}
}

/// Tokenizes a whole template source into the shared token sequence.
pub(crate) fn tokenize(source: &str, dialect: Dialect) -> ArborResult<TokenList> {
	let mut tokens = TokenList::default();

	for token in TokenWalker::new(source, dialect) {
		tokens.push(token?);
	}

	Ok(tokens)
}
