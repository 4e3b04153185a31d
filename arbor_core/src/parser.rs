use std::path::PathBuf;

use crate::ArborError;
use crate::ArborResult;
use crate::BlockKind;
use crate::Comparison;
use crate::Dialect;
use crate::NodeKind;
use crate::Operand;
use crate::Operator;
use crate::Scope;
use crate::Template;
use crate::TokenKind;
use crate::TokenList;

/// Builds the node tree from a token sequence in a single pass.
///
/// Operators and operands are interpreted here, eagerly: an unknown
/// operator symbol or an arity mismatch fails the build, never the render.
pub(crate) fn build(
	tokens: &TokenList,
	name: impl Into<String>,
	source_path: impl Into<PathBuf>,
	dialect: Dialect,
) -> ArborResult<Template> {
	let mut template = Template::new(name, source_path, dialect);
	let mut stack = vec![template.root()];

	for token in tokens.iter() {
		let parent = stack
			.last()
			.copied()
			.ok_or(ArborError::UnexpectedClosingTag { position: token.position })?;

		match &token.kind {
			TokenKind::Text(content) => {
				template.append(
					parent,
					token.position,
					NodeKind::Text { content: content.clone() },
				)?;
			}
			TokenKind::Variable { name } => {
				template.append(
					parent,
					token.position,
					NodeKind::Variable { name: name.clone() },
				)?;
			}
			TokenKind::OpenSection { name } => {
				let id = template.append(
					parent,
					token.position,
					NodeKind::Block { name: Some(name.clone()), scope: Scope::default() },
				)?;
				stack.push(id);
			}
			TokenKind::OpenCondition { subject, operator, value } => {
				let operator = Operator::from_symbol(operator)
					.ok_or_else(|| ArborError::UnknownOperator(operator.clone()))?;
				let operand = if operator.takes_set() {
					Operand::Set(split_set(value))
				} else {
					Operand::Scalar(value.clone())
				};
				let test = Comparison::new(subject.clone(), operator, operand)?;
				let id = template.append(
					parent,
					token.position,
					NodeKind::Condition { test, scope: Scope::default() },
				)?;
				stack.push(id);
			}
			TokenKind::Close(kind) => {
				if stack.len() <= 1 {
					return Err(ArborError::UnexpectedClosingTag { position: token.position });
				}

				let Some(open) = stack.pop() else {
					return Err(ArborError::UnexpectedClosingTag { position: token.position });
				};

				let open_kind = match template.node(open).map(|node| &node.kind) {
					Some(NodeKind::Condition { .. }) => BlockKind::Condition,
					_ => BlockKind::Section,
				};

				if open_kind != *kind {
					return Err(ArborError::MismatchedClosingTag {
						expected: open_kind,
						found: *kind,
						position: token.position,
					});
				}
			}
		}
	}

	if stack.len() > 1 {
		if let Some(open) = stack.pop() {
			if let Some(node) = template.node(open) {
				let kind = match node.kind {
					NodeKind::Condition { .. } => BlockKind::Condition,
					_ => BlockKind::Section,
				};

				return Err(ArborError::UnclosedBlock { kind, position: node.position });
			}
		}
	}

	Ok(template)
}

/// Splits a membership literal into its value set. Elements are trimmed of
/// surrounding whitespace; empty elements are kept, matching the way the
/// scalar side of a comparison treats empty strings.
pub(crate) fn split_set(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(|element| element.trim().to_string())
		.collect()
}
