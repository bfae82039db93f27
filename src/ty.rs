//! The type values the resolver hands back to callers.
//!
//! These are deliberately coarser than `oxc`'s own type representation (oxc does not
//! perform full TypeScript type inference). [`Type`] captures exactly the shapes the
//! resolver needs to answer expression, component, and range queries: it is built from
//! declared type annotations and literal forms in the overlay, not from a full checker.

use std::fmt;

/// One of the host language's built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Number,
    String,
    Boolean,
    Void,
    Null,
    Undefined,
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BasicType::Number => "number",
            BasicType::String => "string",
            BasicType::Boolean => "boolean",
            BasicType::Void => "void",
            BasicType::Null => "null",
            BasicType::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

/// Signature of a method carried by a named type or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Type>,
    pub result: Type,
}

/// Signature of a callable (function declaration, arrow function, method reference).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallableType {
    pub params: Vec<(String, Type)>,
    pub results: Vec<Type>,
}

/// A named type: a `class`, `interface`, or `type` alias declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub name: String,
    pub underlying: Box<Type>,
    pub methods: Vec<MethodSig>,
}

/// A bare interface type (used for type-narrowing results that have no declared name).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceType {
    pub methods: Vec<MethodSig>,
}

/// A resolved host-language type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicType),
    Named(NamedType),
    Interface(InterfaceType),
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// An async-iterable / stream — the host-language analog of a Go channel.
    AsyncIterable(Box<Type>),
    Callable(CallableType),
    /// One level of reference-type indirection (the host-language analog of a pointer).
    Reference(Box<Type>),
    /// An imported package, identified by the import specifier text (e.g. `"ui"`).
    /// Bound onto a file's scope for each import declaration; selector resolution
    /// looks members up through the package cache rather than `find_method`.
    Package(String),
    /// A type exists but the resolver could not narrow it further (fallback synthesis only).
    Unknown,
    /// A type was requested but could not be computed at all.
    Invalid,
}

impl Type {
    pub fn named(name: impl Into<String>, underlying: Type, methods: Vec<MethodSig>) -> Self {
        Type::Named(NamedType {
            name: name.into(),
            underlying: Box::new(underlying),
            methods,
        })
    }

    pub fn callable(params: Vec<(String, Type)>, results: Vec<Type>) -> Self {
        Type::Callable(CallableType { params, results })
    }

    /// Human-readable name, used in error messages and tests.
    pub fn display_name(&self) -> String {
        match self {
            Type::Basic(b) => b.to_string(),
            Type::Named(n) => n.name.clone(),
            Type::Interface(_) => "interface".to_string(),
            Type::Array(elem) => format!("{}[]", elem.display_name()),
            Type::Map(k, v) => format!("Map<{}, {}>", k.display_name(), v.display_name()),
            Type::AsyncIterable(v) => format!("AsyncIterable<{}>", v.display_name()),
            Type::Callable(c) => format!(
                "({}) => {}",
                c.params
                    .iter()
                    .map(|(n, t)| format!("{n}: {}", t.display_name()))
                    .collect::<Vec<_>>()
                    .join(", "),
                c.results
                    .first()
                    .map(Type::display_name)
                    .unwrap_or_else(|| "void".to_string())
            ),
            Type::Reference(inner) => inner.display_name(),
            Type::Package(path) => format!("package \"{path}\""),
            Type::Unknown => "unknown".to_string(),
            Type::Invalid => "invalid".to_string(),
        }
    }

    /// Find a method by name, looking through named types and interfaces only
    /// (methods do not exist on basic types, arrays, maps, etc).
    pub fn find_method(&self, name: &str) -> Option<&MethodSig> {
        match self {
            Type::Named(n) => n.methods.iter().find(|m| m.name == name),
            Type::Interface(i) => i.methods.iter().find(|m| m.name == name),
            _ => None,
        }
    }
}

/// Parse a declared TypeScript type-annotation text fragment into a [`Type`].
///
/// This is shallow, text-based recognition of the shapes the resolver cares about — it
/// is not a type-checker. Unrecognized shapes become a `Named` type carrying the raw
/// text, so display and equality still work even though nothing is known about them.
pub fn parse_type_annotation(text: &str) -> Type {
    let text = text.trim();
    match text {
        "number" => return Type::Basic(BasicType::Number),
        "string" => return Type::Basic(BasicType::String),
        "boolean" => return Type::Basic(BasicType::Boolean),
        "void" => return Type::Basic(BasicType::Void),
        "null" => return Type::Basic(BasicType::Null),
        "undefined" | "any" | "unknown" | "" => return Type::Unknown,
        _ => {}
    }
    if let Some(elem) = text.strip_suffix("[]") {
        return Type::Array(Box::new(parse_type_annotation(elem)));
    }
    if let Some(inner) = strip_generic(text, "Array") {
        return Type::Array(Box::new(parse_type_annotation(inner)));
    }
    if let Some(inner) = strip_generic(text, "Map") {
        if let Some((k, v)) = split_one_top_level_comma(inner) {
            return Type::Map(Box::new(parse_type_annotation(k)), Box::new(parse_type_annotation(v)));
        }
    }
    if let Some(inner) = strip_generic(text, "AsyncIterable") {
        return Type::AsyncIterable(Box::new(parse_type_annotation(inner)));
    }
    // The reference-indirection analog of a Go pointer: a single-argument `Ref<T>`
    // wrapper, as used by the framework runtime for one level of indirection.
    if let Some(inner) = strip_generic(text, "Ref") {
        return Type::Reference(Box::new(parse_type_annotation(inner)));
    }
    Type::named(text, Type::Unknown, Vec::new())
}

fn strip_generic<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?.strip_prefix('<')?;
    rest.strip_suffix('>')
}

fn split_one_top_level_comma(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => return Some((text[..i].trim(), text[i + 1..].trim())),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_for_array_of_strings() {
        let ty = Type::Array(Box::new(Type::Basic(BasicType::String)));
        assert_eq!(ty.display_name(), "string[]");
    }

    #[test]
    fn find_method_looks_through_named_type() {
        let ty = Type::named(
            "Greeter",
            Type::Interface(InterfaceType::default()),
            vec![MethodSig {
                name: "render".into(),
                params: vec![],
                result: Type::Basic(BasicType::Void),
            }],
        );
        assert!(ty.find_method("render").is_some());
        assert!(ty.find_method("missing").is_none());
    }

    #[test]
    fn basic_types_have_no_methods() {
        assert!(Type::Basic(BasicType::Number).find_method("anything").is_none());
    }

    #[test]
    fn parses_map_generic_into_map_type() {
        let ty = parse_type_annotation("Map<string, number>");
        assert_eq!(ty, Type::Map(Box::new(Type::Basic(BasicType::String)), Box::new(Type::Basic(BasicType::Number))));
    }

    #[test]
    fn parses_async_iterable_and_ref() {
        assert_eq!(
            parse_type_annotation("AsyncIterable<string>"),
            Type::AsyncIterable(Box::new(Type::Basic(BasicType::String)))
        );
        assert_eq!(
            parse_type_annotation("Ref<User>"),
            Type::Reference(Box::new(Type::named("User", Type::Unknown, vec![])))
        );
    }

    #[test]
    fn unknown_annotation_becomes_unknown() {
        assert_eq!(parse_type_annotation(""), Type::Unknown);
        assert_eq!(parse_type_annotation("any"), Type::Unknown);
    }
}
