use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::ArborError;
use crate::ArborResult;
use crate::Position;

/// Which surface syntax a template file is written in.
///
/// Both dialects feed the same token stream, builder, tree, and engine;
/// the dialect only selects the raw lexer and the cache file naming.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
	/// `{name}`, `[if subject == "value"]…[/if]`, `[section name]…[/section]`
	#[default]
	Classic,
	/// `{{name}}`, `{{#if subject == "value"}}…{{/if}}`, `{{#section name}}…{{/section}}`
	Handlebars,
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Classic => write!(f, "classic"),
			Self::Handlebars => write!(f, "handlebars"),
		}
	}
}

/// Stable handle for a node in a template's arena.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
	pub(crate) fn new(index: usize) -> Self {
		Self(index as u32)
	}

	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// The closed set of comparison operators available to condition blocks.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Operator {
	#[serde(rename = "==")]
	Eq,
	#[serde(rename = "!=")]
	Ne,
	#[serde(rename = "<")]
	Lt,
	#[serde(rename = "<=")]
	Le,
	#[serde(rename = ">")]
	Gt,
	#[serde(rename = ">=")]
	Ge,
	#[serde(rename = "in")]
	In,
	#[serde(rename = "!in")]
	NotIn,
}

impl Operator {
	pub fn from_symbol(symbol: &str) -> Option<Self> {
		match symbol {
			"==" => Some(Self::Eq),
			"!=" => Some(Self::Ne),
			"<" => Some(Self::Lt),
			"<=" => Some(Self::Le),
			">" => Some(Self::Gt),
			">=" => Some(Self::Ge),
			"in" => Some(Self::In),
			"!in" => Some(Self::NotIn),
			_ => None,
		}
	}

	pub fn symbol(self) -> &'static str {
		match self {
			Self::Eq => "==",
			Self::Ne => "!=",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
			Self::In => "in",
			Self::NotIn => "!in",
		}
	}

	/// Membership operators compare against a value set, the rest against a scalar.
	pub fn takes_set(self) -> bool {
		matches!(self, Self::In | Self::NotIn)
	}
}

impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.symbol())
	}
}

/// The right-hand side of a comparison.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
	Scalar(String),
	Set(Vec<String>),
}

impl fmt::Display for Operand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Scalar(value) => write!(f, "{value:?}"),
			Self::Set(values) => write!(f, "{:?}", values.join(",")),
		}
	}
}

/// A condition block's gate: `subject operator operand`.
///
/// Validated at construction: the subject must be an identifier and the
/// operand arity must match the operator. Invalid combinations never reach
/// the render path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
	pub subject: String,
	pub operator: Operator,
	pub operand: Operand,
}

impl Comparison {
	pub fn new(
		subject: impl Into<String>,
		operator: Operator,
		operand: Operand,
	) -> ArborResult<Self> {
		let subject = subject.into();

		if !is_identifier(&subject) {
			return Err(ArborError::InvalidSubject(subject));
		}

		match (operator.takes_set(), &operand) {
			(true, Operand::Scalar(_)) => Err(ArborError::InvalidComparison {
				reason: format!("`{operator}` requires a value set"),
			}),
			(false, Operand::Set(_)) => Err(ArborError::InvalidComparison {
				reason: format!("`{operator}` requires a scalar value"),
			}),
			_ => Ok(Self { subject, operator, operand }),
		}
	}
}

impl fmt::Display for Comparison {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.subject, self.operator, self.operand)
	}
}

pub(crate) fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	(first.is_ascii_alphabetic() || first == '_')
		&& chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Per-block state: ordered children, the named-child index, and local
/// variable bindings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Scope {
	pub children: Vec<NodeId>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub named: BTreeMap<String, NodeId>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub values: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	/// Literal text emitted verbatim.
	Text { content: String },
	/// A placeholder resolved against the enclosing scope chain.
	Variable { name: String },
	/// An interior node; named blocks are sections addressable via [`Template::block`].
	Block { name: Option<String>, scope: Scope },
	/// A block whose children render only when the comparison passes.
	Condition { test: Comparison, scope: Scope },
}

impl NodeKind {
	pub fn scope(&self) -> Option<&Scope> {
		match self {
			Self::Block { scope, .. } | Self::Condition { scope, .. } => Some(scope),
			_ => None,
		}
	}

	pub fn scope_mut(&mut self) -> Option<&mut Scope> {
		match self {
			Self::Block { scope, .. } | Self::Condition { scope, .. } => Some(scope),
			_ => None,
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			Self::Text { .. } => "text",
			Self::Variable { .. } => "variable",
			Self::Block { .. } => "block",
			Self::Condition { .. } => "condition",
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Node {
	pub parent: Option<NodeId>,
	pub position: Position,
	pub kind: NodeKind,
}

/// A parsed template: an arena of nodes rooted at an unnamed block.
///
/// Bindings are injected with [`Template::set_value`] (root scope) or
/// [`Template::set_value_at`] (any block scope) before rendering. Lookups
/// walk the parent chain upward, so inner bindings shadow outer ones.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Template {
	pub(crate) name: String,
	pub(crate) source_path: PathBuf,
	pub(crate) dialect: Dialect,
	#[serde(skip)]
	pub(crate) strict: bool,
	pub(crate) nodes: Vec<Node>,
}

impl Template {
	pub(crate) fn new(
		name: impl Into<String>,
		source_path: impl Into<PathBuf>,
		dialect: Dialect,
	) -> Self {
		let root = Node {
			parent: None,
			position: Position::default(),
			kind: NodeKind::Block { name: None, scope: Scope::default() },
		};

		Self {
			name: name.into(),
			source_path: source_path.into(),
			dialect,
			strict: false,
			nodes: vec![root],
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn source_path(&self) -> &Path {
		&self.source_path
	}

	pub fn dialect(&self) -> Dialect {
		self.dialect
	}

	/// Whether rendering fails on unbound variables.
	pub fn strict(&self) -> bool {
		self.strict
	}

	pub(crate) fn set_strict(&mut self, strict: bool) {
		self.strict = strict;
	}

	pub fn root(&self) -> NodeId {
		NodeId::new(0)
	}

	pub fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id.index())
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Ordered children of a block node; empty for leaves.
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes
			.get(id.index())
			.and_then(|node| node.kind.scope())
			.map_or(&[], |scope| scope.children.as_slice())
	}

	/// Appends a node under `parent`, registering named blocks in the
	/// parent's named-child index.
	pub(crate) fn append(
		&mut self,
		parent: NodeId,
		position: Position,
		kind: NodeKind,
	) -> ArborResult<NodeId> {
		let id = NodeId::new(self.nodes.len());
		let name = match &kind {
			NodeKind::Block { name, .. } => name.clone(),
			_ => None,
		};

		let Some(scope) = self
			.nodes
			.get_mut(parent.index())
			.and_then(|node| node.kind.scope_mut())
		else {
			return Err(ArborError::InvalidTemplate {
				reason: "nodes can only be appended to block nodes".into(),
			});
		};

		if let Some(name) = name {
			if scope.named.contains_key(&name) {
				return Err(ArborError::DuplicateSectionName { name, position });
			}

			scope.named.insert(name, id);
		}

		scope.children.push(id);
		self.nodes.push(Node { parent: Some(parent), position, kind });
		Ok(id)
	}

	/// Binds `name` in the root scope.
	pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
		if let Some(scope) = self
			.nodes
			.get_mut(0)
			.and_then(|node| node.kind.scope_mut())
		{
			scope.values.insert(name.into(), value.into());
		}
	}

	/// The root scope's local binding for `name`.
	pub fn value(&self, name: &str) -> Option<&str> {
		self.nodes
			.first()
			.and_then(|node| node.kind.scope())
			.and_then(|scope| scope.values.get(name))
			.map(String::as_str)
	}

	/// Binds `name` in the scope of `id`. Returns `false` when the node
	/// has no scope of its own.
	pub fn set_value_at(
		&mut self,
		id: NodeId,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> bool {
		match self
			.nodes
			.get_mut(id.index())
			.and_then(|node| node.kind.scope_mut())
		{
			Some(scope) => {
				scope.values.insert(name.into(), value.into());
				true
			}
			None => false,
		}
	}

	/// Resolves `name` against the scope chain starting at `id`.
	pub fn value_at(&self, id: NodeId, name: &str) -> Option<&str> {
		self.resolve_upward(Some(id), name)
	}

	/// Walks the parent chain from `from`, returning the nearest binding.
	pub(crate) fn resolve_upward(&self, from: Option<NodeId>, name: &str) -> Option<&str> {
		let mut current = from;

		while let Some(id) = current {
			let node = self.nodes.get(id.index())?;

			if let Some(value) = node.kind.scope().and_then(|scope| scope.values.get(name)) {
				return Some(value);
			}

			current = node.parent;
		}

		None
	}

	/// The first section registered under `name`, in document order.
	pub fn block(&self, name: &str) -> Option<NodeId> {
		let mut stack = vec![self.root()];

		while let Some(id) = stack.pop() {
			let node = self.nodes.get(id.index())?;

			if let NodeKind::Block { name: Some(block_name), .. } = &node.kind {
				if block_name == name {
					return Some(id);
				}
			}

			if let Some(scope) = node.kind.scope() {
				for &child in scope.children.iter().rev() {
					stack.push(child);
				}
			}
		}

		None
	}

	/// Checks arena consistency: the root is an unnamed parentless block,
	/// every other node is linked exactly once with a matching parent
	/// pointer, and named entries point at section children of their scope.
	pub(crate) fn validate_structure(&self) -> Result<(), String> {
		let Some(root) = self.nodes.first() else {
			return Err("template has no nodes".into());
		};

		if root.parent.is_some() {
			return Err("root node has a parent".into());
		}

		if !matches!(root.kind, NodeKind::Block { name: None, .. }) {
			return Err("root node is not an unnamed block".into());
		}

		let mut visited = vec![false; self.nodes.len()];
		visited[0] = true;
		let mut seen = 1_usize;
		let mut stack = vec![NodeId::new(0)];

		while let Some(id) = stack.pop() {
			let Some(scope) = self.nodes[id.index()].kind.scope() else {
				continue;
			};

			for &child in &scope.children {
				let Some(node) = self.nodes.get(child.index()) else {
					return Err(format!("child id {} is out of bounds", child.index()));
				};

				if child.index() == 0 {
					return Err("root node appears as a child".into());
				}

				if visited[child.index()] {
					return Err(format!("node {} is linked more than once", child.index()));
				}

				if node.parent != Some(id) {
					return Err(format!(
						"node {} has an inconsistent parent link",
						child.index()
					));
				}

				visited[child.index()] = true;
				seen += 1;
				stack.push(child);
			}

			for (name, &child) in &scope.named {
				let Some(node) = self.nodes.get(child.index()) else {
					return Err(format!("named child `{name}` is out of bounds"));
				};

				if !scope.children.contains(&child) {
					return Err(format!("named child `{name}` is not a child of its scope"));
				}

				match &node.kind {
					NodeKind::Block { name: Some(block_name), .. } if block_name == name => {}
					_ => return Err(format!("named child `{name}` is not a section block")),
				}
			}
		}

		if seen != self.nodes.len() {
			return Err(format!("{} unreachable node(s)", self.nodes.len() - seen));
		}

		Ok(())
	}

	/// Sanity checks applied before a template may be cached.
	pub(crate) fn validate_for_store(&self) -> ArborResult<()> {
		if self.nodes.first().is_none_or(|root| root.parent.is_some()) {
			return Err(ArborError::InvalidTemplate {
				reason: "template root is not its own root".into(),
			});
		}

		let children = self
			.nodes
			.first()
			.and_then(|root| root.kind.scope())
			.map_or(0, |scope| scope.children.len());

		if children == 0 {
			return Err(ArborError::InvalidTemplate { reason: "template has no children".into() });
		}

		self.validate_structure()
			.map_err(|reason| ArborError::InvalidTemplate { reason })
	}
}
