//! Error taxonomy surfaced to callers of the resolver.

use std::path::PathBuf;

use thiserror::Error;

use crate::source::Span;

/// A structured error produced anywhere in the resolution pipeline.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Template file unparseable or missing a package declaration.
    #[error("malformed template `{path}`: {reason}")]
    MalformedTemplate { path: PathBuf, reason: String },

    /// No overlay exists for the requested template path.
    #[error("no overlay available for `{path}`")]
    OverlayUnavailable { path: PathBuf },

    /// The package cache has no record for the requested key.
    #[error("package not loaded for key `{key}`")]
    PackageNotLoaded { key: String },

    /// A package was loaded but the checker returned no type information for it.
    #[error("package `{package}` has no type information")]
    NoTypeInfo { package: String },

    /// The overlay's file scope could not be found; the binder fell back to synthesis.
    #[error("scope unavailable for `{path}`")]
    ScopeUnavailable { path: PathBuf },

    /// A symbol was not found in the scope chain.
    #[error("identifier `{name}` not found")]
    IdentifierNotFound { name: String, span: Option<Span> },

    /// An expression shape is not one the resolver knows how to type.
    #[error("unsupported expression: {expr}")]
    UnsupportedExpression { expr: String, span: Option<Span> },

    /// A resolved type failed the component admissibility predicate.
    #[error("type `{type_name}` is not a component")]
    NotAComponent {
        type_name: String,
        span: Option<Span>,
    },

    /// The external type-checker service reported a fatal error (zero packages).
    #[error("type checker reported a fatal error: {message}")]
    CheckerError { message: String },
}

impl ResolveError {
    /// The span this error is anchored to, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            ResolveError::IdentifierNotFound { span, .. }
            | ResolveError::UnsupportedExpression { span, .. }
            | ResolveError::NotAComponent { span, .. } => *span,
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ResolveResult<T> = Result<T, ResolveError>;
