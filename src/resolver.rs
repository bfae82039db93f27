//! Public resolver API (§6).
//!
//! A [`Resolver`] owns the package cache and a checker handle; it is the only type
//! most callers construct directly. Everything it does is a thin orchestration of
//! [`crate::parser`], [`crate::loader`], [`crate::binder`], [`crate::expr`], and
//! [`crate::component`] — this module adds no resolution logic of its own.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::ast::TemplateFile;
use crate::binder;
use crate::checker::{OxcTypeChecker, TypeCheckerService};
use crate::component;
use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::expr;
use crate::loader;
use crate::overlay::{self, Overlay};
use crate::package_cache::PackageCache;
use crate::parser::TemplateParser;
use crate::scope::Scope;
use crate::ty::Type;

/// Entry point: parses template files, preprocesses them through the host checker, and
/// answers expression/component/scope queries against the result.
pub struct Resolver {
    config: ResolverConfig,
    checker: Box<dyn TypeCheckerService>,
    cache: PackageCache,
    overlays: std::collections::BTreeMap<PathBuf, Overlay>,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            checker: Box::new(OxcTypeChecker::new()),
            cache: PackageCache::new(),
            overlays: std::collections::BTreeMap::new(),
        }
    }

    /// Construct a resolver against a caller-supplied checker, e.g. a test double.
    pub fn with_checker(config: ResolverConfig, checker: Box<dyn TypeCheckerService>) -> Self {
        Self {
            config,
            checker,
            cache: PackageCache::new(),
            overlays: std::collections::BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Parse every path's contents, load them through the checker grouped by module,
    /// and bind scopes onto each resulting AST. Returns the parsed files in the same
    /// order as `sources`, ready for `resolve_component`/`resolve_expression` queries.
    #[instrument(skip(self, sources))]
    pub fn preprocess(&mut self, sources: &[(PathBuf, String)]) -> ResolveResult<Vec<TemplateFile>> {
        let mut files = Vec::with_capacity(sources.len());
        for (path, content) in sources {
            files.push(TemplateParser::parse_file(path, content)?);
        }

        loader::preprocess(&files, &self.config, self.checker.as_ref(), &mut self.cache)
            .map_err(|e| ResolveError::CheckerError { message: e.to_string() })?;

        for file in &files {
            let overlay = overlay::synthesize(file, &self.config)?;
            self.overlays.insert(file.path.clone(), overlay);
        }

        for file in &files {
            binder::assign_scopes(file, &self.cache, &self.config);
        }

        Ok(files)
    }

    /// The synthesized overlay for `path`, recomputed on demand — useful for
    /// introspection and debugging, not part of the load pipeline itself.
    pub fn overlay_content(&self, file: &TemplateFile) -> ResolveResult<Overlay> {
        Ok(overlay::synthesize(file, &self.config)?)
    }

    /// The overlay `preprocess` synthesized for `path`, cached from the last load.
    pub fn overlay_for(&self, path: &Path) -> ResolveResult<&Overlay> {
        self.overlays.get(path).ok_or_else(|| ResolveError::OverlayUnavailable { path: path.to_path_buf() })
    }

    /// The file-level scope bound to `path`'s directory's loaded package, if any.
    pub fn file_scope(&self, directory: &Path) -> ResolveResult<Scope> {
        let package = self
            .cache
            .get_by_directory(directory)
            .ok_or_else(|| ResolveError::PackageNotLoaded {
                key: directory.display().to_string(),
            })?;
        package
            .shapes
            .values()
            .next()
            .map(|shape| shape.file_scope.clone())
            .ok_or_else(|| ResolveError::NoTypeInfo {
                package: package.name.clone(),
            })
    }

    /// The scope bound to `path`'s own overlay, as opposed to [`Resolver::file_scope`]'s
    /// directory-wide lookup. Fails with `ScopeUnavailable` when the file's package
    /// loaded but the checker recorded no shape for this specific overlay path.
    pub fn file_scope_for(&self, path: &Path) -> ResolveResult<Scope> {
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let package = self.cache.get_by_directory(directory).ok_or_else(|| ResolveError::PackageNotLoaded {
            key: directory.display().to_string(),
        })?;
        if package.shapes.is_empty() {
            return Err(ResolveError::NoTypeInfo { package: package.name.clone() });
        }
        let overlay_path = overlay::overlay_path(path);
        package
            .shapes
            .get(&overlay_path)
            .map(|shape| shape.file_scope.clone())
            .ok_or_else(|| ResolveError::ScopeUnavailable { path: path.to_path_buf() })
    }

    /// Resolve a raw host-expression fragment under `scope` (§4.5).
    pub fn resolve_expression(&self, raw: &str, scope: &Scope) -> ResolveResult<Type> {
        expr::resolve_expression(raw, scope, &self.cache)
    }

    /// Resolve `raw` and validate it as an admissible component (§4.6).
    pub fn resolve_component(&self, raw: &str, scope: &Scope) -> ResolveResult<Type> {
        let ty = expr::resolve_expression(raw, scope, &self.cache)?;
        component::validate(ty, &self.config, None)
    }

    pub fn package_count(&self) -> usize {
        self.cache.len()
    }
}
