//! The external type-checker boundary.
//!
//! [`TypeCheckerService`] is the seam between this crate and a real host-language
//! checker. [`OxcTypeChecker`] is the only production implementation, built on
//! `oxc_parser` + `oxc_semantic`. Every other module talks to the trait, never to
//! `oxc` directly — keeping all uncertainty about the underlying toolchain's exact
//! surface confined to this file.
//!
//! `oxc` binds and scopes a program but does not run full TypeScript type inference,
//! so the types extracted here come only from declared annotations (see
//! [`crate::ty::parse_type_annotation`]); anything a fragment doesn't resolve falls
//! back to [`crate::binder`]'s synthesized scopes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use oxc_allocator::Allocator;
use oxc_ast::ast::{ForStatementLeft, Function, Statement, SwitchCase, VariableDeclaration};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType};
use tracing::{debug, warn};

use crate::scope::{HostScopeTable, Scope};
use crate::ty::{parse_type_annotation, Type};

/// Which facets of a module load the checker was asked to compute. Mirrors the
/// external checker's mode bitmask: requesting type-info without types is invalid,
/// since the checker then has nowhere to hang scope data.
#[derive(Debug, Clone, Copy)]
pub struct LoadMode {
    pub name: bool,
    pub files: bool,
    pub compiled_files: bool,
    pub imports: bool,
    pub types: bool,
    pub type_sizes: bool,
    pub syntax: bool,
    pub type_info: bool,
}

impl LoadMode {
    /// The mode the loader always requests (§4.2): everything the binder needs.
    pub fn full() -> Self {
        Self {
            name: true,
            files: true,
            compiled_files: true,
            imports: true,
            types: true,
            type_sizes: true,
            syntax: true,
            type_info: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.type_info || self.types
    }
}

/// One module load request: a working directory, the requested mode, and the overlay
/// map (absolute path → synthesized content) visible to every package in this module.
pub struct LoadRequest {
    pub mode: LoadMode,
    pub working_dir: PathBuf,
    pub overlays: BTreeMap<PathBuf, String>,
}

/// A statement shape paralleling a template control construct, carrying the scope(s)
/// the checker (or the fallback synthesizer) assigned to it. The binder zips this tree
/// against the template AST left-to-right, depth-first.
#[derive(Debug, Clone)]
pub enum StmtShape {
    If {
        then_scope: Scope,
        then: Vec<StmtShape>,
        else_ifs: Vec<BranchShape>,
        else_scope: Option<Scope>,
        else_body: Vec<StmtShape>,
    },
    For {
        scope: Scope,
        body: Vec<StmtShape>,
    },
    Switch {
        scope: Scope,
        cases: Vec<BranchShape>,
    },
    /// A statement that introduces no scope the binder cares about (kept so sibling
    /// indices still line up with the template AST's child ordering).
    Other,
}

#[derive(Debug, Clone)]
pub struct BranchShape {
    pub scope: Scope,
    pub body: Vec<StmtShape>,
}

/// The shape tree for one synthesized function (one template/CSS/script stub).
#[derive(Debug, Clone)]
pub struct FunctionShape {
    pub scope: Scope,
    pub body: Vec<StmtShape>,
}

/// Per-overlay-file checker output.
#[derive(Debug, Clone)]
pub struct FileShape {
    pub file_scope: Scope,
    pub functions: BTreeMap<String, FunctionShape>,
}

/// One loaded package: the unit the loader groups files into and the cache indexes.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub canonical_path: String,
    pub id: String,
    pub name: String,
    pub source_files: Vec<PathBuf>,
    pub compiled_files: Vec<PathBuf>,
    pub shapes: BTreeMap<PathBuf, FileShape>,
    pub package_scope: Scope,
    pub errors: Vec<String>,
}

/// The seam to an external host-language type checker (§6).
pub trait TypeCheckerService {
    fn load(&self, request: &LoadRequest) -> Vec<LoadedPackage>;
}

/// Production implementation over `oxc_parser` + `oxc_semantic`.
#[derive(Debug, Default)]
pub struct OxcTypeChecker;

impl OxcTypeChecker {
    pub fn new() -> Self {
        Self
    }

    fn load_one(&self, content: &str, package_scope: &Scope) -> (FileShape, Vec<String>) {
        let allocator = Allocator::default();
        let source_type = SourceType::ts();
        let ret = Parser::new(&allocator, content, source_type).parse();

        let mut errors: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();

        let semantic_ret = SemanticBuilder::new().build(&ret.program);
        errors.extend(semantic_ret.errors.iter().map(|e| e.to_string()));

        let file_scope = package_scope.child();

        let mut functions = BTreeMap::new();
        for stmt in &ret.program.body {
            if let Statement::FunctionDeclaration(func) = stmt {
                if let Some(name) = func.id.as_ref().map(|id| id.name.to_string()) {
                    let shape = build_function_shape(func, &file_scope, content);
                    bind_function_signature(&name, func, package_scope, content);
                    functions.insert(name, shape);
                }
            }
        }

        (FileShape { file_scope, functions }, errors)
    }
}

fn span_text<'a>(span: oxc_span::Span, src: &'a str) -> &'a str {
    src.get(span.start as usize..span.end as usize).unwrap_or("")
}

fn build_function_shape(func: &Function, file_scope: &Scope, src: &str) -> FunctionShape {
    let fn_scope = file_scope.child();
    for param in func.params.items.iter() {
        if let Some(name) = param.pattern.get_identifier_name() {
            let ty = param
                .pattern
                .type_annotation
                .as_ref()
                .map(|ann| parse_type_annotation(span_text(ann.type_annotation.span(), src)))
                .unwrap_or(Type::Unknown);
            fn_scope.bind(name.to_string(), ty);
        }
    }
    let body = func
        .body
        .as_ref()
        .map(|b| build_stmt_shapes(&b.statements, &fn_scope, src))
        .unwrap_or_default();
    FunctionShape { scope: fn_scope, body }
}

/// Bind a top-level function declaration's own callable signature onto `package_scope`,
/// keyed by its name — visible from every file in the package, not just the one that
/// declares it, mirroring how the host language scopes a package's own declarations.
/// This is what lets a same-package or cross-package call (`Card(...)`, `ui.Card(...)`)
/// resolve to a real [`Type::Callable`] instead of only the function's inner body scope.
fn bind_function_signature(name: &str, func: &Function, package_scope: &Scope, src: &str) {
    let params = func
        .params
        .items
        .iter()
        .filter_map(|param| {
            let param_name = param.pattern.get_identifier_name()?.to_string();
            let ty = param
                .pattern
                .type_annotation
                .as_ref()
                .map(|ann| parse_type_annotation(span_text(ann.type_annotation.span(), src)))
                .unwrap_or(Type::Unknown);
            Some((param_name, ty))
        })
        .collect();
    let result = func
        .return_type
        .as_ref()
        .map(|ann| parse_type_annotation(span_text(ann.type_annotation.span(), src)))
        .unwrap_or(Type::Unknown);
    package_scope.bind(name.to_string(), Type::callable(params, vec![result]));
}

fn build_stmt_shapes(stmts: &oxc_allocator::Vec<Statement>, parent: &Scope, src: &str) -> Vec<StmtShape> {
    stmts.iter().map(|stmt| build_stmt_shape(stmt, parent, src)).collect()
}

fn build_stmt_shape(stmt: &Statement, parent: &Scope, src: &str) -> StmtShape {
    match stmt {
        Statement::IfStatement(if_stmt) => {
            let then_scope = parent.child();
            let then = block_or_single(&if_stmt.consequent, &then_scope, src);
            let (else_ifs, else_scope, else_body) = match &if_stmt.alternate {
                Some(Statement::IfStatement(nested)) => {
                    let nested_scope = parent.child();
                    let nested_body = block_or_single(&nested.consequent, &nested_scope, src);
                    (
                        vec![BranchShape {
                            scope: nested_scope,
                            body: nested_body,
                        }],
                        None,
                        Vec::new(),
                    )
                }
                Some(other) => {
                    let scope = parent.child();
                    let body = block_or_single(other, &scope, src);
                    (Vec::new(), Some(scope), body)
                }
                None => (Vec::new(), None, Vec::new()),
            };
            StmtShape::If {
                then_scope,
                then,
                else_ifs,
                else_scope,
                else_body,
            }
        }
        Statement::ForStatement(for_stmt) => {
            let scope = parent.child();
            if let Some(ForStatementInitDecl(decl)) = as_for_init_decl(for_stmt) {
                bind_variable_declaration(decl, &scope, src);
            }
            let body = block_or_single(&for_stmt.body, &scope, src);
            StmtShape::For { scope, body }
        }
        Statement::ForInStatement(for_stmt) => {
            let scope = parent.child();
            if let ForStatementLeft::VariableDeclaration(decl) = &for_stmt.left {
                bind_variable_declaration(decl, &scope, src);
            }
            let body = block_or_single(&for_stmt.body, &scope, src);
            StmtShape::For { scope, body }
        }
        Statement::ForOfStatement(for_stmt) => {
            let scope = parent.child();
            if let ForStatementLeft::VariableDeclaration(decl) = &for_stmt.left {
                bind_variable_declaration(decl, &scope, src);
            }
            let body = block_or_single(&for_stmt.body, &scope, src);
            StmtShape::For { scope, body }
        }
        Statement::SwitchStatement(switch_stmt) => {
            let scope = parent.child();
            let cases = switch_stmt
                .cases
                .iter()
                .map(|case| build_case_shape(case, &scope, src))
                .collect();
            StmtShape::Switch { scope, cases }
        }
        Statement::BlockStatement(_) => StmtShape::Other,
        _ => StmtShape::Other,
    }
}

/// `oxc_ast`'s classic `for (init; test; update)` carries its init clause as an
/// `Option<ForStatementInit>`; only the variable-declaration form introduces bindings.
struct ForStatementInitDecl<'a>(&'a VariableDeclaration<'a>);

fn as_for_init_decl<'a>(for_stmt: &'a oxc_ast::ast::ForStatement<'a>) -> Option<ForStatementInitDecl<'a>> {
    use oxc_ast::ast::ForStatementInit;
    match for_stmt.init.as_ref()? {
        ForStatementInit::VariableDeclaration(decl) => Some(ForStatementInitDecl(decl)),
        _ => None,
    }
}

fn build_case_shape(case: &SwitchCase, parent: &Scope, src: &str) -> BranchShape {
    let scope = parent.child();
    let body = build_stmt_shapes(&case.consequent, &scope, src);
    BranchShape { scope, body }
}

fn block_or_single(stmt: &Statement, scope: &Scope, src: &str) -> Vec<StmtShape> {
    match stmt {
        Statement::BlockStatement(block) => build_stmt_shapes(&block.body, scope, src),
        other => vec![build_stmt_shape(other, scope, src)],
    }
}

fn bind_variable_declaration(decl: &VariableDeclaration, scope: &Scope, src: &str) {
    for declarator in &decl.declarations {
        if let Some(name) = declarator.id.get_identifier_name() {
            let ty = declarator
                .id
                .type_annotation
                .as_ref()
                .map(|ann| parse_type_annotation(span_text(ann.type_annotation.span(), src)))
                .unwrap_or(Type::Unknown);
            scope.bind(name.to_string(), ty);
        }
    }
}

impl TypeCheckerService for OxcTypeChecker {
    fn load(&self, request: &LoadRequest) -> Vec<LoadedPackage> {
        if !request.mode.is_valid() {
            warn!(working_dir = %request.working_dir.display(), "requested type-info without types; ignoring request");
            return Vec::new();
        }

        let mut table = HostScopeTable::new();
        let root = table.root();
        let package_scope = Scope::new(Rc::new(std::cell::RefCell::new(table)), root);

        let mut shapes = BTreeMap::new();
        let mut all_errors = Vec::new();
        let mut compiled_files = Vec::new();

        for (path, content) in &request.overlays {
            if !path_starts_with(path, &request.working_dir) {
                continue;
            }
            debug!(path = %path.display(), "loading overlay");
            let (shape, errors) = self.load_one(content, &package_scope);
            compiled_files.push(path.clone());
            if !errors.is_empty() {
                warn!(path = %path.display(), count = errors.len(), "overlay reported diagnostics");
            }
            all_errors.extend(errors);
            shapes.insert(path.clone(), shape);
        }

        if compiled_files.is_empty() {
            return Vec::new();
        }

        let canonical_path = request.working_dir.to_string_lossy().to_string();
        vec![LoadedPackage {
            canonical_path: canonical_path.clone(),
            id: canonical_path,
            name: request
                .working_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            source_files: compiled_files.clone(),
            compiled_files,
            shapes,
            package_scope,
            errors: all_errors,
        }]
    }
}

fn path_starts_with(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(overlays: BTreeMap<PathBuf, String>, dir: &str) -> LoadRequest {
        LoadRequest {
            mode: LoadMode::full(),
            working_dir: PathBuf::from(dir),
            overlays,
        }
    }

    #[test]
    fn load_mode_rejects_type_info_without_types() {
        let mut mode = LoadMode::full();
        mode.types = false;
        assert!(!mode.is_valid());
    }

    #[test]
    fn loads_a_simple_function_and_finds_its_shape() {
        let mut overlays = BTreeMap::new();
        overlays.insert(
            PathBuf::from("/m/button.overlay.ts"),
            "function Button(disabled) {\n if (disabled) {\n doSomething();\n }\n}\n".to_string(),
        );
        let checker = OxcTypeChecker::new();
        let packages = checker.load(&request(overlays, "/m"));
        assert_eq!(packages.len(), 1);
        let shape = packages[0].shapes.get(&PathBuf::from("/m/button.overlay.ts")).unwrap();
        assert!(shape.functions.contains_key("Button"));
        let func = &shape.functions["Button"];
        assert_eq!(func.body.len(), 1);
        assert!(matches!(func.body[0], StmtShape::If { .. }));
    }

    #[test]
    fn function_declaration_is_bound_into_package_scope_by_name() {
        let mut overlays = BTreeMap::new();
        overlays.insert(
            PathBuf::from("/m/button.overlay.ts"),
            "function Button(label: string): Component {\n return undefined as unknown as Component;\n}\n".to_string(),
        );
        let checker = OxcTypeChecker::new();
        let packages = checker.load(&request(overlays, "/m"));
        let package = &packages[0];
        let ty = package.package_scope.lookup_local("Button").unwrap();
        assert_eq!(ty.display_name(), "(label: string) => Component");
    }

    #[test]
    fn overlays_outside_working_dir_are_skipped() {
        let mut overlays = BTreeMap::new();
        overlays.insert(PathBuf::from("/other/button.overlay.ts"), "function F() {}".to_string());
        let checker = OxcTypeChecker::new();
        let packages = checker.load(&request(overlays, "/m"));
        assert!(packages.is_empty());
    }

    #[test]
    fn path_starts_with_helper_matches_ancestor() {
        assert!(path_starts_with(Path::new("/m/a/b.ts"), Path::new("/m")));
        assert!(!path_starts_with(Path::new("/other/b.ts"), Path::new("/m")));
    }
}
