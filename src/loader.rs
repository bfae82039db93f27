//! Module grouper & loader (§4.2).
//!
//! Groups a batch of template paths by module root, synthesizes every file's overlay
//! up front, then invokes the [`TypeCheckerService`] once per module — each call is
//! handed the *entire* overlay map, not just that module's files, since overlay
//! resolution for imports crossing module boundaries still needs to see them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{instrument, warn};

use crate::ast::TemplateFile;
use crate::checker::{LoadMode, LoadRequest, LoadedPackage, TypeCheckerService};
use crate::config::ResolverConfig;
use crate::overlay::{self, OverlayError};
use crate::package_cache::PackageCache;
use crate::utils::module_root;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

/// Parse a batch of template files, synthesize their overlays, group them by module,
/// and load every module through `checker`, populating `cache` as packages resolve.
///
/// Per-module failures are isolated (logged at `warn`, §4.2's "Failure" clause); the
/// batch proceeds with whatever other modules succeed.
#[instrument(skip(files, checker, cache))]
pub fn preprocess(
    files: &[TemplateFile],
    config: &ResolverConfig,
    checker: &dyn TypeCheckerService,
    cache: &mut PackageCache,
) -> Result<(), LoaderError> {
    let mut overlays: BTreeMap<PathBuf, String> = BTreeMap::new();
    for file in files {
        let overlay = overlay::synthesize(file, config)?;
        overlays.insert(overlay.path, overlay.content);
    }

    let mut groups: BTreeMap<PathBuf, Vec<&TemplateFile>> = BTreeMap::new();
    for file in files {
        let root = module_root(&file.path, config);
        groups.entry(root).or_default().push(file);
    }

    for (root, group_files) in &groups {
        let request = LoadRequest {
            mode: LoadMode::full(),
            working_dir: root.clone(),
            overlays: overlays.clone(),
        };
        let packages = checker.load(&request);
        if packages.is_empty() {
            warn!(module_root = %root.display(), files = group_files.len(), "module load returned no packages");
            continue;
        }
        for package in packages {
            visit_package(package, group_files, cache);
        }
    }

    Ok(())
}

/// Record `package` in the cache, then alias it under every local package name a file
/// in `group_files` declares for it (§4.2 step 4). A file's own `package_name` is the
/// name its declaration gives the package it belongs to, not an importer's name for it,
/// but every file loaded in the same module load shares one directory. Aliasing the
/// package under each file's declared name here is what lets `import "ui"` resolve
/// through the cache by that exact string later, in [`crate::expr::resolve_selector`].
fn visit_package(package: LoadedPackage, group_files: &[&TemplateFile], cache: &mut PackageCache) {
    let names: Vec<(String, PathBuf)> = group_files
        .iter()
        .map(|file| (file.package_name.clone(), file.directory().to_path_buf()))
        .collect();
    cache.insert(package);
    for (name, dir) in names {
        cache.alias(&name, &dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{FileShape, LoadedPackage};
    use crate::scope::{HostScopeTable, Scope};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;

    struct StubChecker {
        calls: Mutex<usize>,
    }

    impl TypeCheckerService for StubChecker {
        fn load(&self, request: &LoadRequest) -> Vec<LoadedPackage> {
            *self.calls.lock().unwrap() += 1;
            let mut table = HostScopeTable::new();
            let root = table.root();
            let scope = Scope::new(Rc::new(RefCell::new(table)), root);
            vec![LoadedPackage {
                canonical_path: request.working_dir.display().to_string(),
                id: request.working_dir.display().to_string(),
                name: "ui".to_string(),
                source_files: request.overlays.keys().cloned().collect(),
                compiled_files: request.overlays.keys().cloned().collect(),
                shapes: BTreeMap::from_iter(request.overlays.keys().map(|p| {
                    (
                        p.clone(),
                        FileShape {
                            file_scope: scope.child(),
                            functions: BTreeMap::new(),
                        },
                    )
                })),
                package_scope: scope.clone(),
                errors: vec![],
            }]
        }
    }

    fn file_in(dir: &str, name: &str) -> TemplateFile {
        TemplateFile::new(PathBuf::from(dir).join(name), "ui", vec![])
    }

    #[test]
    fn one_checker_call_per_module_root() {
        let files = vec![file_in("/m/a", "x.templ.ts"), file_in("/m/a", "y.templ.ts"), file_in("/m/b", "z.templ.ts")];
        let checker = StubChecker { calls: Mutex::new(0) };
        let mut cache = PackageCache::new();
        preprocess(&files, &ResolverConfig::default(), &checker, &mut cache).unwrap();
        assert_eq!(*checker.calls.lock().unwrap(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_package_declaration_short_circuits_with_loader_error() {
        let bad = TemplateFile::new(PathBuf::from("/m/bad.templ.ts"), "", vec![]);
        let checker = StubChecker { calls: Mutex::new(0) };
        let mut cache = PackageCache::new();
        let err = preprocess(&[bad], &ResolverConfig::default(), &checker, &mut cache).unwrap_err();
        assert!(matches!(err, LoaderError::Overlay(_)));
    }
}
