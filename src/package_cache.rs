//! Multi-keyed, idempotent cache of loaded packages (§4.3).
//!
//! Callers identify packages three different ways — canonical import path,
//! loader-reported id, or the absolute directory of a source/overlay file. All three
//! keys for the same package resolve to the same stored record; inserting a package
//! under keys that already point elsewhere overwrites them to point at the new record
//! rather than leaving a stale alternate copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::checker::LoadedPackage;

#[derive(Default)]
pub struct PackageCache {
    records: Vec<Rc<LoadedPackage>>,
    by_canonical_path: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
    by_directory: HashMap<PathBuf, usize>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `package`, indexing it under every key §4.3 names.
    pub fn insert(&mut self, package: LoadedPackage) {
        let record = Rc::new(package);
        let index = self.records.len();

        if !record.canonical_path.is_empty() {
            self.by_canonical_path.insert(record.canonical_path.clone(), index);
        }
        if !record.id.is_empty() && record.id != record.canonical_path {
            self.by_id.insert(record.id.clone(), index);
        }
        for file in record.source_files.iter().chain(record.compiled_files.iter()) {
            if let Some(dir) = file.parent() {
                self.by_directory.insert(dir.to_path_buf(), index);
            }
        }

        self.records.push(record);
    }

    /// Index the package already stored under `dir` under the additional key `name`
    /// too (§4.2 step 4) — used to make an importer's bare package name (`import
    /// "ui"`) resolve to the same record `insert` filed under that directory. A no-op
    /// if `dir` isn't indexed yet.
    pub fn alias(&mut self, name: &str, dir: &Path) {
        if let Some(&index) = self.by_directory.get(dir) {
            self.by_canonical_path.insert(name.to_string(), index);
        }
    }

    pub fn get_by_canonical_path(&self, path: &str) -> Option<Rc<LoadedPackage>> {
        self.by_canonical_path.get(path).map(|&i| Rc::clone(&self.records[i]))
    }

    pub fn get_by_id(&self, id: &str) -> Option<Rc<LoadedPackage>> {
        self.by_id
            .get(id)
            .or_else(|| self.by_canonical_path.get(id))
            .map(|&i| Rc::clone(&self.records[i]))
    }

    pub fn get_by_directory(&self, dir: &Path) -> Option<Rc<LoadedPackage>> {
        self.by_directory.get(dir).map(|&i| Rc::clone(&self.records[i]))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{HostScopeTable, Scope};
    use std::cell::RefCell;

    fn fake_package(canonical: &str, id: &str, dir: &str) -> LoadedPackage {
        let mut table = HostScopeTable::new();
        let root = table.root();
        let scope = Scope::new(Rc::new(RefCell::new(table)), root);
        LoadedPackage {
            canonical_path: canonical.to_string(),
            id: id.to_string(),
            name: "ui".to_string(),
            source_files: vec![PathBuf::from(dir).join("button.templ.ts")],
            compiled_files: vec![PathBuf::from(dir).join("button.overlay.ts")],
            shapes: Default::default(),
            package_scope: scope,
            errors: vec![],
        }
    }

    #[test]
    fn all_keys_resolve_to_the_same_record() {
        let mut cache = PackageCache::new();
        cache.insert(fake_package("m/ui", "./ui", "/m/ui"));

        let by_path = cache.get_by_canonical_path("m/ui").unwrap();
        let by_id = cache.get_by_id("./ui").unwrap();
        let by_dir = cache.get_by_directory(Path::new("/m/ui")).unwrap();

        assert!(Rc::ptr_eq(&by_path, &by_id));
        assert!(Rc::ptr_eq(&by_path, &by_dir));
    }

    #[test]
    fn id_lookup_falls_back_to_canonical_path_when_equal() {
        let mut cache = PackageCache::new();
        cache.insert(fake_package("m/ui", "m/ui", "/m/ui"));
        assert!(cache.get_by_id("m/ui").is_some());
    }

    #[test]
    fn unknown_key_returns_none() {
        let cache = PackageCache::new();
        assert!(cache.get_by_canonical_path("missing").is_none());
    }

    #[test]
    fn alias_resolves_to_the_same_record_as_its_directory() {
        let mut cache = PackageCache::new();
        cache.insert(fake_package("m/ui", "m/ui", "/m/ui"));
        cache.alias("ui", Path::new("/m/ui"));
        let by_alias = cache.get_by_canonical_path("ui").unwrap();
        let by_dir = cache.get_by_directory(Path::new("/m/ui")).unwrap();
        assert!(Rc::ptr_eq(&by_alias, &by_dir));
    }

    #[test]
    fn alias_for_unknown_directory_is_a_no_op() {
        let mut cache = PackageCache::new();
        cache.alias("ui", Path::new("/nowhere"));
        assert!(cache.get_by_canonical_path("ui").is_none());
    }

    #[test]
    fn len_tracks_insertions() {
        let mut cache = PackageCache::new();
        assert!(cache.is_empty());
        cache.insert(fake_package("a", "a", "/a"));
        cache.insert(fake_package("b", "b", "/b"));
        assert_eq!(cache.len(), 2);
    }
}
