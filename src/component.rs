//! Component admissibility (§4.6).
//!
//! The component protocol has two shapes — a constructor-style callable and a value
//! implementing the render protocol — and both must reduce to the same predicate so
//! downstream code can treat them uniformly.

use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::source::Span;
use crate::ty::{MethodSig, Type};

/// Whether `ty` is admissible as a component under `config`'s canonical names.
pub fn is_admissible(ty: &Type, config: &ResolverConfig) -> bool {
    is_admissible_depth(ty, config, true)
}

/// `allow_deref` is spent at most once: admissibility tolerates one level of
/// reference-type indirection on a named type, never two (§9 open question).
fn is_admissible_depth(ty: &Type, config: &ResolverConfig, allow_deref: bool) -> bool {
    match ty {
        // Recursion is symmetric: a callable is admissible exactly when its sole
        // result is admissible as a direct value, same predicate either way.
        Type::Callable(c) => c.results.len() == 1 && is_admissible_depth(&c.results[0], config, allow_deref),
        Type::Named(n) => {
            if n.name == config.component_marker {
                return true;
            }
            if let Type::Named(underlying) = n.underlying.as_ref() {
                if underlying.name == config.component_marker {
                    return true;
                }
            }
            has_render_method(&n.methods, config)
        }
        Type::Interface(i) => has_render_method(&i.methods, config),
        Type::Reference(inner) if allow_deref => is_admissible_depth(inner, config, false),
        _ => false,
    }
}

fn has_render_method(methods: &[MethodSig], config: &ResolverConfig) -> bool {
    methods.iter().any(|m| {
        m.name == config.render_method_name
            && m.params.len() == 2
            && m.params[0].display_name() == config.render_context_type
            && m.params[1].display_name() == config.writer_type
            && m.result.display_name() == config.render_result_type
    })
}

/// Validate `ty` as a component, producing a structured error carrying `span` on
/// rejection.
pub fn validate(ty: Type, config: &ResolverConfig, span: Option<Span>) -> ResolveResult<Type> {
    if is_admissible(&ty, config) {
        Ok(ty)
    } else {
        Err(ResolveError::NotAComponent {
            type_name: ty.display_name(),
            span,
        })
    }
}
