use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::ArborResult;
use crate::CacheStore;
use crate::Dialect;
use crate::NodeId;
use crate::NodeKind;
use crate::Template;
use crate::lexer;
use crate::parser;

/// A page exercising every classic construct: variables, a condition, and a
/// named section.
pub(crate) const CLASSIC_PAGE: &str = "Hello {name}!\n[if status == \"active\"]\nWelcome back, {name}.\n[/if]\n[section footer]\n-- {site}\n[/section]\n";

/// The same page written in the handlebars dialect.
pub(crate) const HANDLEBARS_PAGE: &str = "Hello {{name}}!\n{{#if status == \"active\"}}\nWelcome back, {{name}}.\n{{/if}}\n{{#section footer}}\n-- {{site}}\n{{/section}}\n";

/// Tokenize and build `source` without touching the cache layer.
pub(crate) fn build_template(
	source: &str,
	dialect: Dialect,
) -> ArborResult<Template> {
	let tokens = lexer::tokenize(source, dialect)?;
	parser::build(&tokens, "page", Path::new("page.tpl"), dialect)
}

pub(crate) fn build_classic(source: &str) -> ArborResult<Template> {
	build_template(source, Dialect::Classic)
}

/// Flatten a template into one indented line per node so structures can be
/// compared across dialects, where positions differ but shape must not.
pub(crate) fn outline(template: &Template) -> Vec<String> {
	fn walk(template: &Template, id: NodeId, depth: usize, lines: &mut Vec<String>) {
		let Some(node) = template.node(id) else {
			panic!("outline reached a dangling node id {}", id.index());
		};

		let label = match &node.kind {
			NodeKind::Text { content } => format!("text {content:?}"),
			NodeKind::Variable { name } => format!("variable {name}"),
			NodeKind::Block { name: Some(name), .. } => format!("section {name}"),
			NodeKind::Block { name: None, .. } => "block".into(),
			NodeKind::Condition { test, .. } => format!("condition {test}"),
		};

		lines.push(format!("{}{label}", "  ".repeat(depth)));

		for &child in template.children(id) {
			walk(template, child, depth + 1, lines);
		}
	}

	let mut lines = vec![];
	walk(template, template.root(), 0, &mut lines);
	lines
}

/// An in-memory cache store. Clones share the same entries so a test can keep
/// a handle for inspection while the factory owns the boxed copy.
#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryStore {
	entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
	pub(crate) fn len(&self) -> usize {
		self.lock().len()
	}

	pub(crate) fn keys(&self) -> Vec<String> {
		self.lock().keys().cloned().collect()
	}

	pub(crate) fn payload(&self, key: &str) -> Option<Vec<u8>> {
		self.lock().get(key).cloned()
	}

	pub(crate) fn insert_raw(&self, key: &str, payload: &[u8]) {
		self.lock().insert(key.into(), payload.to_vec());
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
		self.entries.lock().unwrap_or_else(|e| panic!("store lock: {e}"))
	}
}

impl CacheStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Vec<u8>> {
		self.lock().get(key).cloned()
	}

	fn set(&self, key: &str, payload: &[u8]) -> bool {
		self.lock().insert(key.into(), payload.to_vec());
		true
	}

	fn delete(&self, key: &str) -> bool {
		self.lock().remove(key).is_some()
	}
}

/// A store that refuses every write, for exercising rejection handling.
#[derive(Clone, Debug, Default)]
pub(crate) struct RejectingStore;

impl CacheStore for RejectingStore {
	fn get(&self, _key: &str) -> Option<Vec<u8>> {
		None
	}

	fn set(&self, _key: &str, _payload: &[u8]) -> bool {
		false
	}

	fn delete(&self, _key: &str) -> bool {
		false
	}
}
