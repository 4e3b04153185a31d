use std::cmp::Ordering;

use float_cmp::approx_eq;

use crate::ArborError;
use crate::ArborResult;
use crate::Comparison;
use crate::NodeId;
use crate::NodeKind;
use crate::Operand;
use crate::Operator;
use crate::Template;

impl Template {
	/// Renders the tree to its output string.
	///
	/// Children are concatenated in order with no implicit separators.
	/// Under strict mode the first unbound variable observation fails the
	/// whole render; short-circuited branches are never observed.
	pub fn render(&self) -> ArborResult<String> {
		let mut output = String::new();
		self.render_node(self.root(), &mut output)?;
		Ok(output)
	}

	fn render_node(&self, id: NodeId, output: &mut String) -> ArborResult<()> {
		let node = &self.nodes[id.index()];

		match &node.kind {
			NodeKind::Text { content } => output.push_str(content),
			NodeKind::Variable { name } => {
				match self.resolve_upward(node.parent, name) {
					Some(value) => output.push_str(value),
					None if self.strict => {
						return Err(ArborError::UnboundVariable {
							name: name.clone(),
							template: self.name.clone(),
						});
					}
					None => {}
				}
			}
			NodeKind::Block { scope, .. } => {
				for &child in &scope.children {
					self.render_node(child, output)?;
				}
			}
			NodeKind::Condition { test, scope } => {
				// The gate resolves from the parent scope on purpose: a
				// binding inside the condition cannot satisfy its own gate.
				let gate = self.resolve_upward(node.parent, &test.subject);

				if gate.is_none() && self.strict {
					return Err(ArborError::UnboundVariable {
						name: test.subject.clone(),
						template: self.name.clone(),
					});
				}

				if test.matches(gate.unwrap_or("")) {
					for &child in &scope.children {
						self.render_node(child, output)?;
					}
				}
			}
		}

		Ok(())
	}
}

impl Comparison {
	/// Applies the comparison against a resolved gate value.
	pub fn matches(&self, value: &str) -> bool {
		match (self.operator, &self.operand) {
			(Operator::In, Operand::Set(set)) => {
				set.iter().any(|element| loose_eq(value, element))
			}
			(Operator::NotIn, Operand::Set(set)) => {
				!set.iter().any(|element| loose_eq(value, element))
			}
			(operator, Operand::Scalar(operand)) => match operator {
				Operator::Eq => loose_eq(value, operand),
				Operator::Ne => !loose_eq(value, operand),
				Operator::Lt => loose_cmp(value, operand) == Ordering::Less,
				Operator::Le => loose_cmp(value, operand) != Ordering::Greater,
				Operator::Gt => loose_cmp(value, operand) == Ordering::Greater,
				Operator::Ge => loose_cmp(value, operand) != Ordering::Less,
				// Arity is enforced by `Comparison::new`.
				Operator::In | Operator::NotIn => false,
			},
			(_, Operand::Set(_)) => false,
		}
	}
}

/// Numeric when both sides parse as numbers, lexical otherwise.
fn loose_eq(left: &str, right: &str) -> bool {
	match (left.parse::<f64>(), right.parse::<f64>()) {
		(Ok(left), Ok(right)) => approx_eq!(f64, left, right, ulps = 2),
		_ => left == right,
	}
}

fn loose_cmp(left: &str, right: &str) -> Ordering {
	match (left.parse::<f64>(), right.parse::<f64>()) {
		(Ok(left), Ok(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
		_ => left.cmp(right),
	}
}
