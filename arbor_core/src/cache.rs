use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::ArborError;
use crate::ArborResult;
use crate::Dialect;
use crate::Template;
use crate::TemplateOptions;

/// Bump this whenever the snapshot layout changes. Older snapshots are
/// discarded as a recoverable miss and rebuilt from source.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Pluggable cache backend, consulted before the filesystem snapshot.
///
/// Implementations must be safe to share across threads; the engine only
/// ever hands a store immutable references.
pub trait CacheStore: Debug + Send + Sync {
	/// Returns the payload stored under `key`, if any.
	fn get(&self, key: &str) -> Option<Vec<u8>>;
	/// Stores `payload` under `key`, returning whether the write succeeded.
	fn set(&self, key: &str, payload: &[u8]) -> bool;
	/// Removes `key`, returning whether an entry existed.
	fn delete(&self, key: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct Snapshot {
	#[allow(dead_code)]
	schema_version: u32,
	template: Template,
}

/// Parsed ahead of the full snapshot so a layout change in a newer schema
/// reads as an incompatibility, not as corruption.
#[derive(Debug, Deserialize)]
struct SnapshotHeader {
	schema_version: u32,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	schema_version: u32,
	template: &'a Template,
}

enum SnapshotIssue {
	/// Undecodable payload or broken arena links.
	Corrupt,
	/// Valid payload from another schema version or dialect.
	Incompatible,
}

/// Cache file path for a template source, by dialect naming convention.
///
/// Classic templates cache to `{stem}-cache` next to the source; handlebars
/// templates keep the source extension in the name so both dialects can
/// coexist for one file.
pub fn cache_file_path(source_path: &Path, dialect: Dialect) -> PathBuf {
	let stem = source_path
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_default();
	let file_name = match dialect {
		Dialect::Classic => format!("{stem}-cache"),
		Dialect::Handlebars => match source_path.extension() {
			Some(extension) => {
				format!("{stem}-handlebars.{}-cache", extension.to_string_lossy())
			}
			None => format!("{stem}-handlebars-cache"),
		},
	};

	source_path.with_file_name(file_name)
}

/// Store key for a snapshot: digest of the source mtime and cache path.
pub fn store_key(mtime: SystemTime, cache_path: &Path) -> String {
	let mut hasher = DefaultHasher::new();
	mtime_unix_ms(mtime).hash(&mut hasher);
	cache_path.hash(&mut hasher);
	format!("{:016x}", hasher.finish())
}

fn mtime_unix_ms(mtime: SystemTime) -> u128 {
	mtime
		.duration_since(UNIX_EPOCH)
		.map(|duration| duration.as_millis())
		.unwrap_or_default()
}

fn source_mtime(source_path: &Path) -> Option<SystemTime> {
	std::fs::metadata(source_path)
		.and_then(|metadata| metadata.modified())
		.ok()
}

/// Loads a previously cached template for `source_path`.
///
/// When a store is configured and the source mtime is known, only the store
/// is consulted; a store miss purges the key and reports a recoverable
/// miss without falling through to the filesystem.
pub(crate) fn load(
	source_path: &Path,
	dialect: Dialect,
	options: &TemplateOptions,
) -> ArborResult<Template> {
	let cache_path = cache_file_path(source_path, dialect);
	let mtime = source_mtime(source_path);

	if let (Some(mtime), Some(store)) = (mtime, options.cache_store.as_deref()) {
		return load_from_store(store, mtime, &cache_path, dialect);
	}

	load_from_file(&cache_path, mtime, dialect)
}

fn load_from_store(
	store: &dyn CacheStore,
	mtime: SystemTime,
	cache_path: &Path,
	dialect: Dialect,
) -> ArborResult<Template> {
	let key = store_key(mtime, cache_path);

	match store.get(&key) {
		Some(payload) => match decode_snapshot(&payload, dialect) {
			Ok(template) => {
				debug!(%key, "template cache store hit");
				Ok(template)
			}
			Err((_, reason)) => {
				// Bad store entries are purged and treated as a plain miss.
				store.delete(&key);
				debug!(%key, %reason, "purged unusable template cache store entry");
				Err(ArborError::CacheMiss { reason })
			}
		},
		None => {
			store.delete(&key);
			debug!(%key, "template cache store miss");
			Err(ArborError::CacheMiss {
				reason: format!("no cache store entry for key `{key}`"),
			})
		}
	}
}

fn load_from_file(
	cache_path: &Path,
	mtime: Option<SystemTime>,
	dialect: Dialect,
) -> ArborResult<Template> {
	let Ok(metadata) = std::fs::metadata(cache_path) else {
		return Err(ArborError::CacheMiss {
			reason: format!(
				"cache file `{}` was not found or is unreadable",
				cache_path.display()
			),
		});
	};

	// A missing source leaves the cache authoritative; otherwise the cache
	// must be at least as new as the source.
	let fresh = match (mtime, metadata.modified()) {
		(None, _) => true,
		(Some(source), Ok(cache)) => cache >= source,
		(Some(_), Err(_)) => false,
	};

	if !fresh {
		debug!(path = %cache_path.display(), "template cache file is stale");
		return Err(ArborError::CacheMiss {
			reason: format!(
				"cache file `{}` is older than the template source",
				cache_path.display()
			),
		});
	}

	let Ok(payload) = std::fs::read(cache_path) else {
		return Err(ArborError::CacheMiss {
			reason: format!("cache file `{}` is unreadable", cache_path.display()),
		});
	};

	match decode_snapshot(&payload, dialect) {
		Ok(template) => {
			debug!(path = %cache_path.display(), "loaded template from cache file");
			Ok(template)
		}
		Err((issue, reason)) => {
			warn!(path = %cache_path.display(), %reason, "deleting unusable template cache file");

			if let Err(error) = std::fs::remove_file(cache_path) {
				warn!(%error, path = %cache_path.display(), "failed to delete template cache file");
			}

			match issue {
				SnapshotIssue::Corrupt => Err(ArborError::CacheCorrupt {
					path: cache_path.display().to_string(),
					reason,
				}),
				SnapshotIssue::Incompatible => Err(ArborError::CacheMiss { reason }),
			}
		}
	}
}

fn decode_snapshot(payload: &[u8], dialect: Dialect) -> Result<Template, (SnapshotIssue, String)> {
	let header: SnapshotHeader = serde_json::from_slice(payload)
		.map_err(|error| (SnapshotIssue::Corrupt, format!("undecodable snapshot: {error}")))?;

	if header.schema_version != SNAPSHOT_SCHEMA_VERSION {
		return Err((
			SnapshotIssue::Incompatible,
			format!(
				"snapshot schema v{} does not match current v{SNAPSHOT_SCHEMA_VERSION}",
				header.schema_version
			),
		));
	}

	let snapshot: Snapshot = serde_json::from_slice(payload)
		.map_err(|error| (SnapshotIssue::Corrupt, format!("undecodable snapshot: {error}")))?;

	if snapshot.template.dialect != dialect {
		return Err((
			SnapshotIssue::Incompatible,
			format!(
				"snapshot dialect `{}` does not match requested `{dialect}`",
				snapshot.template.dialect
			),
		));
	}

	snapshot
		.template
		.validate_structure()
		.map_err(|reason| (SnapshotIssue::Corrupt, reason))?;

	Ok(snapshot.template)
}

/// Persists a parsed template.
///
/// Sanity violations are fatal and refuse the write. A configured store
/// takes the snapshot when the source mtime is known; a rejected store
/// write surfaces as a distinct recoverable error. The filesystem fallback
/// is best-effort and never fails the caller.
pub(crate) fn store(template: &Template, options: &TemplateOptions) -> ArborResult<()> {
	template.validate_for_store()?;

	let cache_path = cache_file_path(&template.source_path, template.dialect);
	let snapshot = SnapshotRef { schema_version: SNAPSHOT_SCHEMA_VERSION, template };
	let payload = serde_json::to_vec_pretty(&snapshot)
		.map_err(|error| ArborError::InvalidTemplate { reason: error.to_string() })?;
	let mtime = source_mtime(&template.source_path);

	if let (Some(mtime), Some(store)) = (mtime, options.cache_store.as_deref()) {
		let key = store_key(mtime, &cache_path);

		if store.set(&key, &payload) {
			debug!(%key, "stored template snapshot in cache store");
			return Ok(());
		}

		return Err(ArborError::CacheWriteRejected { key });
	}

	write_cache_file(&cache_path, &payload);
	Ok(())
}

/// Writes through a sibling temp file and renames into place. A failed
/// write leaves any previous cache file untouched.
fn write_cache_file(cache_path: &Path, payload: &[u8]) {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|duration| duration.subsec_nanos())
		.unwrap_or_default();
	let tmp_path = cache_path.with_extension(format!("tmp-{}-{nanos}", std::process::id()));

	if let Err(error) = std::fs::write(&tmp_path, payload) {
		warn!(%error, path = %tmp_path.display(), "failed to write template cache");
		return;
	}

	if let Err(error) = std::fs::rename(&tmp_path, cache_path) {
		warn!(%error, path = %cache_path.display(), "failed to publish template cache");
		let _ = std::fs::remove_file(&tmp_path);
	}
}
