//! Resolves a descriptor's `type` into something renderable.
//!
//! Names are tried against the native tag set, then the host, then the
//! global component registry. Functions and inline descriptors pass through.

use crate::descriptor::TypeSpec;
use crate::error::{EvalError, EvalResult, ValidationError};
use crate::host::Host;
use crate::registry;
use crate::vdom::ResolvedType;
use tracing::debug;

/// Check if a tag name is a native HTML element
pub fn is_native_tag(name: &str) -> bool {
    matches!(
        name,
        "a" | "abbr" | "address" | "area" | "article" | "aside" | "audio" |
        "b" | "base" | "bdi" | "bdo" | "blockquote" | "body" | "br" | "button" |
        "canvas" | "caption" | "cite" | "code" | "col" | "colgroup" |
        "data" | "datalist" | "dd" | "del" | "details" | "dfn" | "dialog" | "div" | "dl" | "dt" |
        "em" | "embed" |
        "fieldset" | "figcaption" | "figure" | "footer" | "form" |
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "header" | "hgroup" | "hr" | "html" |
        "i" | "iframe" | "img" | "input" | "ins" |
        "kbd" |
        "label" | "legend" | "li" | "link" |
        "main" | "map" | "mark" | "menu" | "meta" | "meter" |
        "nav" | "noscript" |
        "object" | "ol" | "optgroup" | "option" | "output" |
        "p" | "picture" | "pre" | "progress" |
        "q" |
        "rp" | "rt" | "ruby" |
        "s" | "samp" | "script" | "search" | "section" | "select" | "slot" | "small" | "source" | "span" | "strong" | "style" | "sub" | "summary" | "sup" | "svg" |
        "table" | "tbody" | "td" | "template" | "textarea" | "tfoot" | "th" | "thead" | "time" | "title" | "tr" | "track" |
        "u" | "ul" |
        "var" | "video" |
        "wbr"
    )
}

pub fn resolve_type(ty: &TypeSpec, host: &dyn Host) -> EvalResult<ResolvedType> {
    let name = match ty {
        TypeSpec::Function(component) => return Ok(ResolvedType::Function(component.clone())),
        TypeSpec::Inline(descriptor) => return Ok(ResolvedType::Inline(descriptor.clone())),
        TypeSpec::Name(name) => name,
    };

    if name.is_empty() {
        return Err(ValidationError::MissingType.into());
    }
    if is_native_tag(name) {
        return Ok(ResolvedType::Native(name.clone()));
    }
    if let Some(component) = host.resolve_component(name) {
        debug!(name = %name, "Component resolved by host");
        return Ok(ResolvedType::Component(component));
    }
    if let Some(component) = registry::lookup_component(name) {
        debug!(name = %name, "Component resolved from registry");
        return Ok(ResolvedType::Component(component));
    }

    Err(EvalError::UnresolvedType { name: name.clone() })
}
