//! # Tree Resolver
//!
//! Turns children and slot values into render nodes.
//!
//! | value | result |
//! |-------|--------|
//! | render node | passed through |
//! | text | text node |
//! | descriptor | composed |
//! | list | fragment of composed siblings, keyed by `key`, `name` or index |
//! | function | called with a [`RenderContext`], its result resolved again |
//! | anything else | diagnostic, omitted |

use crate::composer::Composer;
use crate::context::{RenderContext, ResolveCtx};
use crate::descriptor::{Children, Descriptor, Slots};
use crate::error::{Diagnostic, EvalError, EvalResult};
use crate::vdom::RenderNode;
use indexmap::IndexMap;
use tracing::trace;

pub const DEFAULT_SLOT: &str = "default";

/// Stable key of a list item
pub fn sibling_key(descriptor: &Descriptor, index: usize) -> String {
    descriptor
        .key
        .clone()
        .or_else(|| descriptor.name.clone())
        .unwrap_or_else(|| index.to_string())
}

pub(crate) fn resolve_children(
    composer: &Composer,
    children: &Children,
    ctx: &ResolveCtx,
) -> EvalResult<Vec<RenderNode>> {
    match children {
        Children::Text(text) => Ok(vec![RenderNode::text(text.clone())]),
        Children::Node(node) => Ok(vec![node.clone()]),
        Children::One(descriptor) => Ok(vec![composer.compose_node(descriptor, ctx, None)?]),
        Children::Many(list) => {
            let mut nodes = Vec::with_capacity(list.len());
            for (index, descriptor) in list.iter().enumerate() {
                let key = sibling_key(descriptor, index);
                nodes.push(composer.compose_node(descriptor, ctx, Some(key))?);
            }
            Ok(vec![RenderNode::fragment(None, nodes)])
        }
        Children::Function(f) => {
            let max = composer.config().max_resolve_depth;
            if ctx.depth >= max {
                return Err(EvalError::Depth {
                    name: "children function".to_string(),
                    max,
                });
            }
            let produced = f.call(&RenderContext { composer, ctx });
            trace!(depth = ctx.depth, "Resolving function children");
            let inner = ctx.child(ctx.scope.clone(), None);
            resolve_children(composer, &produced, &inner)
        }
        Children::Invalid(value) => {
            composer.report(
                Diagnostic::error(format!("Unsupported children value {value} omitted"))
                    .with_uid(ctx.parent.as_ref()),
            );
            Ok(Vec::new())
        }
    }
}

pub(crate) fn resolve_slots(
    composer: &Composer,
    slots: &Slots,
    ctx: &ResolveCtx,
) -> EvalResult<IndexMap<String, Vec<RenderNode>>> {
    let mut resolved = IndexMap::new();
    match slots {
        Slots::Default(children) => {
            resolved.insert(DEFAULT_SLOT.to_string(), resolve_children(composer, children, ctx)?);
        }
        Slots::Named(named) => {
            for (name, children) in named {
                resolved.insert(name.clone(), resolve_children(composer, children, ctx)?);
            }
        }
    }
    Ok(resolved)
}
