//! Field cost, as exposed to admission policies.

use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::json_ext::Object;
use crate::spec::SelectionNode;
use crate::spec::SelectionTree;

/// Cost of resolving one field, given the cost of its sub-selection.
#[derive(Clone)]
pub enum Cost {
    /// Added to the cost of the sub-selection.
    Constant(f64),
    Function(Arc<dyn Fn(&ExecutionContext, &Object, f64) -> f64 + Send + Sync>),
}

impl Default for Cost {
    fn default() -> Self {
        Cost::Constant(1.0)
    }
}

impl Cost {
    pub fn function<F>(function: F) -> Self
    where
        F: Fn(&ExecutionContext, &Object, f64) -> f64 + Send + Sync + 'static,
    {
        Cost::Function(Arc::new(function))
    }

    pub fn evaluate(&self, context: &ExecutionContext, arguments: &Object, child_cost: f64) -> f64 {
        match self {
            Cost::Constant(cost) => cost + child_cost,
            Cost::Function(function) => function(context, arguments, child_cost),
        }
    }
}

impl fmt::Debug for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Constant(cost) => f.debug_tuple("Constant").field(cost).finish(),
            Cost::Function(_) => f.write_str("Function"),
        }
    }
}

/// Aggregate cost of the parts of `tree` included in the execution `context`.
///
/// Enforces nothing.
pub fn estimate_cost(tree: &SelectionTree, context: &ExecutionContext) -> f64 {
    let cost = score_children(tree.root(), context);
    tracing::debug!("estimated cost of {:?} operation: {cost}", tree.operation_type());
    cost
}

// The bucket that ends up applying is only known at runtime, so the most expensive one counts.
fn score_children(node: &SelectionNode, context: &ExecutionContext) -> f64 {
    node.typed_children()
        .values()
        .map(|children| {
            children
                .values()
                .map(|child| score_node(child, context))
                .sum::<f64>()
        })
        .fold(0.0, f64::max)
}

fn score_node(node: &SelectionNode, context: &ExecutionContext) -> f64 {
    if node.is_typename() || !node.included(context) {
        return 0.0;
    }
    let child_cost = score_children(node, context);
    let Some(descriptor) = node.descriptor() else {
        return child_cost;
    };
    let arguments = descriptor.coerce_arguments(node.arguments(), context.variables());
    let cost = descriptor.cost().evaluate(context, &arguments, child_cost);
    tracing::debug!(
        "Field {} cost breakdown: (children) {} => {}",
        node.response_key(),
        child_cost,
        cost
    );
    cost
}
