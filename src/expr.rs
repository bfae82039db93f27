//! Host-expression type resolution (§4.5's `resolve_expression` algorithm).
//!
//! Shared by the public resolver API and the scope binder's tag-probing step, so both
//! speak the same recursive-descent rules over the same small expression grammar:
//! identifiers, selectors, calls, indexing, and basic literals.

use crate::error::{ResolveError, ResolveResult};
use crate::package_cache::PackageCache;
use crate::scope::Scope;
use crate::ty::{parse_type_annotation, BasicType, CallableType, Type};

/// Resolve a raw host-expression fragment to a [`Type`] under `scope`. `cache` backs
/// package-qualified selectors (`ui.Button`), which need to look a loaded package's
/// exports up by the name under which its import bound it.
pub fn resolve_expression(expr: &str, scope: &Scope, cache: &PackageCache) -> ResolveResult<Type> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ResolveError::UnsupportedExpression {
            expr: expr.to_string(),
            span: None,
        });
    }
    if let Some(ty) = literal_type(expr) {
        return Ok(ty);
    }
    if let Some(call) = as_call(expr) {
        return resolve_call(call, scope, cache);
    }
    if let Some((base, index)) = as_index(expr) {
        return resolve_index(base, index, scope, cache);
    }
    if is_identifier_path(expr) && expr.contains('.') {
        return resolve_selector(expr, scope, cache);
    }
    if is_identifier(expr) {
        return scope.lookup(expr).ok_or_else(|| ResolveError::IdentifierNotFound {
            name: expr.to_string(),
            span: None,
        });
    }
    Err(ResolveError::UnsupportedExpression {
        expr: expr.to_string(),
        span: None,
    })
}

fn literal_type(expr: &str) -> Option<Type> {
    if expr == "true" || expr == "false" {
        return Some(Type::Basic(BasicType::Boolean));
    }
    if expr == "null" {
        return Some(Type::Basic(BasicType::Null));
    }
    if expr == "undefined" {
        return Some(Type::Basic(BasicType::Undefined));
    }
    if expr.parse::<f64>().is_ok() {
        return Some(Type::Basic(BasicType::Number));
    }
    if (expr.starts_with('"') && expr.ends_with('"') && expr.len() >= 2)
        || (expr.starts_with('\'') && expr.ends_with('\'') && expr.len() >= 2)
    {
        return Some(Type::Basic(BasicType::String));
    }
    None
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(expr: &str) -> bool {
    let mut chars = expr.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => chars.all(is_identifier_char),
        _ => false,
    }
}

fn is_identifier_path(expr: &str) -> bool {
    expr.split('.').all(is_identifier)
}

/// Split `callee(args)` at the outermost call parens, if `expr` is shaped that way.
fn as_call(expr: &str) -> Option<&str> {
    if !expr.ends_with(')') {
        return None;
    }
    let open = matching_open_paren(expr)?;
    if open == 0 {
        return None;
    }
    Some(&expr[..open])
}

/// Split `base[index]` at the outermost index brackets, if `expr` is shaped that way.
fn as_index(expr: &str) -> Option<(&str, &str)> {
    if !expr.ends_with(']') {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in expr.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    if i == 0 {
                        return None;
                    }
                    return Some((&expr[..i], &expr[i + 1..expr.len() - 1]));
                }
            }
            _ => {}
        }
    }
    None
}

fn matching_open_paren(expr: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    if bytes.last() != Some(&b')') {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in expr.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn resolve_call(callee: &str, scope: &Scope, cache: &PackageCache) -> ResolveResult<Type> {
    let callee_ty = resolve_expression(callee, scope, cache)?;
    match callee_ty {
        Type::Callable(CallableType { results, .. }) => results.into_iter().next().ok_or_else(|| ResolveError::UnsupportedExpression {
            expr: format!("{callee}(...)"),
            span: None,
        }),
        other => Err(ResolveError::UnsupportedExpression {
            expr: format!("{} is not callable", other.display_name()),
            span: None,
        }),
    }
}

fn resolve_index(base: &str, _index: &str, scope: &Scope, cache: &PackageCache) -> ResolveResult<Type> {
    let base_ty = resolve_expression(base, scope, cache)?;
    match base_ty {
        Type::Array(elem) => Ok(*elem),
        Type::Map(_, value) => Ok(*value),
        other => Err(ResolveError::UnsupportedExpression {
            expr: format!("cannot index into {}", other.display_name()),
            span: None,
        }),
    }
}

/// Resolve a dotted selector: the base resolves first, then the final segment is
/// looked up either as a package export (when the base is an imported package) or as
/// a method on the base's type, unwrapping at most one level of reference indirection.
fn resolve_selector(expr: &str, scope: &Scope, cache: &PackageCache) -> ResolveResult<Type> {
    let (base, field) = expr.rsplit_once('.').expect("selector contains a '.'");
    let base_ty = resolve_expression(base, scope, cache)?;
    match base_ty {
        Type::Package(import_path) => resolve_package_member(&import_path, field, cache),
        Type::Reference(inner) => resolve_member(*inner, field),
        other => resolve_member(other, field),
    }
}

fn resolve_member(base_ty: Type, field: &str) -> ResolveResult<Type> {
    match base_ty.find_method(field) {
        Some(method) => Ok(Type::Callable(CallableType {
            params: method.params.iter().map(|p| (String::new(), p.clone())).collect(),
            results: vec![method.result.clone()],
        })),
        None => Err(ResolveError::IdentifierNotFound {
            name: field.to_string(),
            span: None,
        }),
    }
}

/// Resolve `field` as a top-level export of the package bound to `import_path`,
/// looking the package up by the exact key an importer's `import "..."` names (§4.5).
fn resolve_package_member(import_path: &str, field: &str, cache: &PackageCache) -> ResolveResult<Type> {
    let package = cache
        .get_by_canonical_path(import_path)
        .or_else(|| cache.get_by_id(import_path))
        .ok_or_else(|| ResolveError::PackageNotLoaded {
            key: import_path.to_string(),
        })?;
    package.package_scope.lookup_local(field).ok_or_else(|| ResolveError::IdentifierNotFound {
        name: field.to_string(),
        span: None,
    })
}

/// Parse a TS type-annotation fragment; exposed here so callers resolving a
/// declared-but-unbound identifier (fallback synthesis) can reuse the same mapping
/// the checker boundary uses.
pub fn type_from_annotation(text: &str) -> Type {
    parse_type_annotation(text)
}
