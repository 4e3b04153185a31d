use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::ArborConfig;
use crate::ArborError;
use crate::ArborResult;
use crate::Dialect;
use crate::Template;
use crate::cache;
use crate::cache::CacheStore;
use crate::lexer;
use crate::parser;

/// Immutable configuration threaded through template creation.
///
/// This replaces any notion of process-wide state: two factories with
/// different options never observe each other.
#[derive(Debug)]
pub struct TemplateOptions {
	/// Whether to consult and refresh the template cache.
	pub cache_enabled: bool,
	/// Optional cache backend consulted before the filesystem snapshot.
	pub cache_store: Option<Box<dyn CacheStore>>,
	/// Bindings attached to the root scope of every created template.
	pub default_variables: BTreeMap<String, String>,
}

impl Default for TemplateOptions {
	fn default() -> Self {
		Self {
			cache_enabled: true,
			cache_store: None,
			default_variables: BTreeMap::new(),
		}
	}
}

impl TemplateOptions {
	/// Builds options from an optionally loaded config file.
	pub fn from_config(config: Option<&ArborConfig>) -> Self {
		let Some(config) = config else {
			return Self::default();
		};

		Self {
			cache_enabled: config.cache,
			cache_store: None,
			default_variables: config.variables.clone(),
		}
	}
}

/// Creates a classic-dialect template with lenient binding.
pub fn create(path: impl AsRef<Path>, options: &TemplateOptions) -> ArborResult<Template> {
	create_with_dialect(path, Dialect::Classic, false, options)
}

/// Creates a classic-dialect template that fails on unbound variables.
pub fn create_strict(path: impl AsRef<Path>, options: &TemplateOptions) -> ArborResult<Template> {
	create_with_dialect(path, Dialect::Classic, true, options)
}

/// Creates a handlebars-dialect template with lenient binding.
pub fn create_handlebars(
	path: impl AsRef<Path>,
	options: &TemplateOptions,
) -> ArborResult<Template> {
	create_with_dialect(path, Dialect::Handlebars, false, options)
}

/// Creates a handlebars-dialect template that fails on unbound variables.
pub fn create_handlebars_strict(
	path: impl AsRef<Path>,
	options: &TemplateOptions,
) -> ArborResult<Template> {
	create_with_dialect(path, Dialect::Handlebars, true, options)
}

/// The general factory entry: cache-or-parse, then default variables and
/// the requested strictness. Every failure is wrapped with the template
/// path so callers see which file could not be created.
pub fn create_with_dialect(
	path: impl AsRef<Path>,
	dialect: Dialect,
	strict: bool,
	options: &TemplateOptions,
) -> ArborResult<Template> {
	let path = path.as_ref();
	let mut template =
		build_template(path, dialect, options).map_err(|error| ArborError::CreateTemplate {
			path: path.display().to_string(),
			source: Box::new(error),
		})?;
	template.set_strict(strict);
	Ok(template)
}

fn build_template(
	path: &Path,
	dialect: Dialect,
	options: &TemplateOptions,
) -> ArborResult<Template> {
	if options.cache_enabled {
		match cache::load(path, dialect, options) {
			Ok(mut template) => {
				attach_default_variables(&mut template, options);
				return Ok(template);
			}
			Err(error) if error.is_recoverable_cache() => {
				debug!(%error, "template cache unavailable, parsing source");
			}
			// Corruption and IO failures are fatal; the corrupt entry has
			// already been purged, so the next creation reparses cleanly.
			Err(error) => return Err(error),
		}
	}

	let source = std::fs::read_to_string(path)?;
	let tokens = lexer::tokenize(&source, dialect)?;
	let mut template = parser::build(&tokens, sanitize_name(path), path, dialect)?;

	if options.cache_enabled {
		match cache::store(&template, options) {
			Ok(()) => {}
			Err(error) if error.is_recoverable_cache() => {
				debug!(%error, "template cache write rejected");
			}
			Err(error) => return Err(error),
		}
	}

	attach_default_variables(&mut template, options);
	Ok(template)
}

fn attach_default_variables(template: &mut Template, options: &TemplateOptions) {
	for (name, value) in &options.default_variables {
		template.set_value(name, value);
	}
}

/// Template names keep only the alphanumeric characters of the file stem.
fn sanitize_name(path: &Path) -> String {
	path.file_stem()
		.map(|stem| {
			stem.to_string_lossy()
				.chars()
				.filter(char::is_ascii_alphanumeric)
				.collect()
		})
		.unwrap_or_default()
}
