use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::ArborError;
use crate::ArborResult;

/// Candidate config file names, checked in order.
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["arbor.toml", ".arbor.toml"];

/// Project configuration loaded from `arbor.toml`.
///
/// ```toml
/// cache = true
/// strict = false
///
/// [variables]
/// site = "example.org"
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ArborConfig {
	/// Whether parsed templates are cached next to their sources.
	pub cache: bool,
	/// Fail rendering on unbound variables.
	pub strict: bool,
	/// Bindings attached to every template created under this config.
	pub variables: BTreeMap<String, String>,
}

impl Default for ArborConfig {
	fn default() -> Self {
		Self { cache: true, strict: false, variables: BTreeMap::new() }
	}
}

impl ArborConfig {
	/// The first existing candidate file under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|name| root.join(name))
			.find(|path| path.is_file())
	}

	/// Loads the config under `root`; `None` when no candidate exists.
	pub fn load(root: &Path) -> ArborResult<Option<Self>> {
		let Some(path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let raw = std::fs::read_to_string(&path)?;
		let config =
			toml::from_str(&raw).map_err(|error| ArborError::ConfigParse(error.to_string()))?;
		Ok(Some(config))
	}
}
