use std::path::PathBuf;

use arbor_core::Dialect;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Render and inspect text templates with conditions and named sections.",
	long_about = "arbor is a small text template engine. Templates mix literal text with \
	              variables, condition blocks, and named sections, in one of two surface \
	              dialects: classic ({name}, [if ...], [section ...]) or handlebars \
	              ({{name}}, {{#if ...}}, {{#section ...}}).\n\nParsed templates are cached \
	              next to their sources so repeated renders skip the parse step.\n\nQuick \
	              start:\n  arbor render page.tpl --set name=Ada   Render with a binding\n  \
	              arbor inspect page.tpl                 Show the parsed tree"
)]
pub struct ArborCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory where `arbor.toml` is resolved.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Template dialect used to parse template files.
	#[arg(long, value_enum, global = true, default_value_t = DialectArg::Classic)]
	pub dialect: DialectArg,

	/// Skip the template cache for this invocation.
	#[arg(long, global = true, default_value_t = false)]
	pub no_cache: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Render a template to stdout or a file.
	///
	/// Parses the template (consulting the snapshot cache unless `--no-cache`
	/// is given) and renders it with bindings layered in precedence order:
	/// `[variables]` from `arbor.toml`, then `--data` file entries, then
	/// `--set` flags. Later layers win.
	Render {
		/// The template file to render.
		template: PathBuf,

		/// Fail when a template variable has no binding.
		///
		/// Without this flag unbound variables render as empty strings.
		/// Variables inside failed condition blocks are never checked.
		#[arg(long, default_value_t = false)]
		strict: bool,

		/// Bind a variable for this render. May be repeated; the last
		/// binding for a name wins.
		#[arg(long, short, value_name = "NAME=VALUE")]
		set: Vec<String>,

		/// Load bindings from a data file. The format is chosen by file
		/// extension (`.json`, `.toml`, `.yaml`/`.yml`) and the file must
		/// contain a flat table of scalar values.
		#[arg(long, value_name = "FILE")]
		data: Option<PathBuf>,

		/// Write the rendered output to FILE instead of stdout.
		#[arg(long, short, value_name = "FILE")]
		output: Option<PathBuf>,

		/// Compare the rendered output against the `--output` file without
		/// writing it. Prints a diff and exits with a non-zero status when
		/// the file is out of date. Suited for CI pipelines.
		#[arg(long, default_value_t = false, requires = "output")]
		check: bool,
	},
	/// Show the parsed structure of a template.
	///
	/// Prints the node tree with source positions: text runs, variables,
	/// condition gates, and named sections. Use `--format json` for a
	/// machine-readable report including the full node arena.
	Inspect {
		/// The template file to inspect.
		template: PathBuf,

		/// Output format for the template structure. Use `text` for an
		/// indented tree or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DialectArg {
	/// `{name}`, `[if subject == "value"]`, `[section name]`
	Classic,
	/// `{{name}}`, `{{#if subject == "value"}}`, `{{#section name}}`
	Handlebars,
}

impl From<DialectArg> for Dialect {
	fn from(dialect: DialectArg) -> Self {
		match dialect {
			DialectArg::Classic => Self::Classic,
			DialectArg::Handlebars => Self::Handlebars,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable indented tree with source positions.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
