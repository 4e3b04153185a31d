use miette::Diagnostic;
use thiserror::Error;

use crate::BlockKind;
use crate::Position;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ArborError {
	#[error(transparent)]
	#[diagnostic(code(arbor::io_error))]
	Io(#[from] std::io::Error),

	#[error("closing tag without an open block at {position}")]
	#[diagnostic(
		code(arbor::unexpected_closing_tag),
		help("remove the closing tag or open a block before it")
	)]
	UnexpectedClosingTag { position: Position },

	#[error("unclosed {kind} block opened at {position}")]
	#[diagnostic(
		code(arbor::unclosed_block),
		help("every block must be closed before the end of the template")
	)]
	UnclosedBlock { kind: BlockKind, position: Position },

	#[error("malformed tag at {position}: {reason}")]
	#[diagnostic(code(arbor::malformed_tag))]
	MalformedTag { position: Position, reason: String },

	#[error("closing tag for a {found} block at {position}, but a {expected} block is open")]
	#[diagnostic(
		code(arbor::mismatched_closing_tag),
		help("condition blocks and section blocks must be closed with their own tag kind")
	)]
	MismatchedClosingTag {
		expected: BlockKind,
		found: BlockKind,
		position: Position,
	},

	#[error("duplicate section name `{name}` at {position}")]
	#[diagnostic(
		code(arbor::duplicate_section_name),
		help("section names must be unique within their parent block")
	)]
	DuplicateSectionName { name: String, position: Position },

	#[error("unknown comparison operator: `{0}`")]
	#[diagnostic(
		code(arbor::unknown_operator),
		help("available operators: ==, !=, <, <=, >, >=, in, !in")
	)]
	UnknownOperator(String),

	#[error("invalid comparison: {reason}")]
	#[diagnostic(code(arbor::invalid_comparison))]
	InvalidComparison { reason: String },

	#[error("invalid condition subject: `{0}`")]
	#[diagnostic(
		code(arbor::invalid_subject),
		help("subjects must match [A-Za-z_][A-Za-z0-9_]*")
	)]
	InvalidSubject(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(arbor::config_parse),
		help("check that arbor.toml is valid TOML with optional cache, strict, and [variables] entries")
	)]
	ConfigParse(String),

	#[error("variable `{name}` is not bound in template `{template}`")]
	#[diagnostic(
		code(arbor::unbound_variable),
		help("bind the variable with set_value or create the template without strict mode")
	)]
	UnboundVariable { name: String, template: String },

	#[error("template cache unavailable: {reason}")]
	#[diagnostic(code(arbor::cache_miss))]
	CacheMiss { reason: String },

	#[error("cache store rejected write for key `{key}`")]
	#[diagnostic(code(arbor::cache_write_rejected))]
	CacheWriteRejected { key: String },

	#[error("corrupt template cache at `{path}`: {reason}")]
	#[diagnostic(
		code(arbor::cache_corrupt),
		help("the corrupt cache entry has been removed; retrying will reparse the template source")
	)]
	CacheCorrupt { path: String, reason: String },

	#[error("template cannot be cached: {reason}")]
	#[diagnostic(code(arbor::invalid_template))]
	InvalidTemplate { reason: String },

	#[error("cannot create template for `{path}`")]
	#[diagnostic(code(arbor::create_template))]
	CreateTemplate {
		path: String,
		#[source]
		source: Box<ArborError>,
	},

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(arbor::data_file))]
	DataFile { path: String, reason: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(
		code(arbor::unsupported_format),
		help("supported formats: json, toml, yaml, yml")
	)]
	UnsupportedDataFormat(String),

	#[error("invalid binding `{0}`")]
	#[diagnostic(
		code(arbor::invalid_binding),
		help("bindings use the form NAME=VALUE")
	)]
	InvalidBinding(String),
}

impl ArborError {
	/// Whether this is a cache error the factory recovers from by reparsing.
	pub fn is_recoverable_cache(&self) -> bool {
		matches!(
			self,
			Self::CacheMiss { .. } | Self::CacheWriteRejected { .. }
		)
	}
}

pub type ArborResult<T> = Result<T, ArborError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
