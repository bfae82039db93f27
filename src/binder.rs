//! Scope binder (§4.4): attaches authoritative scopes from the checker's output onto
//! the template AST, walking both trees in lockstep, left-to-right and depth-first.
//!
//! When the authoritative shape is unavailable or its shape doesn't line up with the
//! template AST at a given node, binding falls back to locally synthesizing a scope
//! chain from the raw header/condition text. Fallback is intentionally lossy (some
//! types degrade to `Unknown`) and never masks the difference — callers can tell by
//! whether a package/file shape was found at all (`tracing::debug!` records which).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::ast::*;
use crate::checker::{FileShape, StmtShape};
use crate::component;
use crate::config::ResolverConfig;
use crate::expr::resolve_expression;
use crate::overlay::overlay_path;
use crate::package_cache::PackageCache;
use crate::scope::{HostScopeTable, Scope};
use crate::ty::{parse_type_annotation, BasicType, Type};

/// Bind scopes (and, on elements, the `is_component` flag) onto every node in `file`.
/// Safe to call more than once: `ScopeSlot`/`Cell` writes are idempotent no-ops when
/// the value doesn't change, consistent with every other slot in this crate.
#[instrument(skip(file, cache, config), fields(path = %file.path.display()))]
pub fn assign_scopes(file: &TemplateFile, cache: &PackageCache, config: &ResolverConfig) {
    let package = cache.get_by_directory(file.directory());
    let overlay = overlay_path(&file.path);
    let file_shape: Option<FileShape> = package.as_ref().and_then(|p| p.shapes.get(&overlay).cloned());

    let file_scope = match &file_shape {
        Some(shape) => shape.file_scope.clone(),
        None => {
            debug!("no overlay scope available; synthesizing a fallback file scope");
            fresh_root_scope()
        }
    };
    file.scope.set(file_scope.clone());
    bind_imports(file, &file_scope);

    for node in &file.nodes {
        if let TopLevelNode::Template(t) = node {
            bind_template(t, &file_scope, file_shape.as_ref(), cache, config);
        }
    }
}

/// Bind each `import` host declaration's local name to a [`Type::Package`] marker
/// carrying the import specifier, so selector resolution can look the package up in
/// the cache by that same specifier (§4.5).
fn bind_imports(file: &TemplateFile, file_scope: &Scope) {
    for node in &file.nodes {
        if let TopLevelNode::HostDecl(decl) = node {
            if decl.kind == HostDeclKind::Import {
                if let Some((local, import_path)) = crate::utils::parse_import_decl(&decl.source) {
                    file_scope.bind(local, Type::Package(import_path));
                }
            }
        }
    }
}

fn fresh_root_scope() -> Scope {
    let mut table = HostScopeTable::new();
    let root = table.root();
    Scope::new(Rc::new(RefCell::new(table)), root)
}

fn bind_template(t: &Template, file_scope: &Scope, file_shape: Option<&FileShape>, cache: &PackageCache, config: &ResolverConfig) {
    let shape = file_shape.and_then(|fs| fs.functions.get(&t.name));
    let template_scope = match shape {
        Some(fs) => fs.scope.clone(),
        None => {
            let scope = file_scope.child();
            for p in &t.params {
                scope.bind(p.name.clone(), parse_type_annotation(&p.type_text));
            }
            scope
        }
    };
    t.scope.set(template_scope.clone());

    let body_shapes: &[StmtShape] = shape.map(|fs| fs.body.as_slice()).unwrap_or(&[]);
    let mut cursor = ShapeCursor::new(body_shapes);
    bind_nodes(&t.body, &template_scope, &mut cursor, cache, config);
}

/// Walks a shape list in step with a node list. Only `InlineCode`/`If`/`For`/`Switch`
/// nodes consume an entry — every other node kind contributes nothing to the overlay
/// (§4.1), so the cursor must not advance for them.
struct ShapeCursor<'a> {
    shapes: &'a [StmtShape],
    idx: usize,
}

impl<'a> ShapeCursor<'a> {
    fn new(shapes: &'a [StmtShape]) -> Self {
        Self { shapes, idx: 0 }
    }

    fn next(&mut self) -> Option<&'a StmtShape> {
        let s = self.shapes.get(self.idx);
        self.idx += 1;
        s
    }
}

fn bind_nodes(nodes: &[Node], scope: &Scope, cursor: &mut ShapeCursor, cache: &PackageCache, config: &ResolverConfig) {
    for node in nodes {
        match node {
            Node::InlineCode(_) => {
                cursor.next();
            }
            Node::If(if_node) => bind_if(if_node, scope, cursor.next(), cache, config),
            Node::For(for_node) => bind_for(for_node, scope, cursor.next(), cache, config),
            Node::Switch(switch_node) => bind_switch(switch_node, scope, cursor.next(), cache, config),
            Node::Element(el) => {
                bind_element(el, scope, cache, config);
                bind_nodes(&el.children, scope, cursor, cache, config);
            }
            Node::Text(_) | Node::Whitespace | Node::Interpolation(_) | Node::TemplateCall(_) => {}
        }
    }
}

fn bind_element(el: &Element, scope: &Scope, cache: &PackageCache, config: &ResolverConfig) {
    el.scope.set(scope.clone());
    if let Some(tag_expr) = &el.tag_expr {
        if let Ok(ty) = resolve_expression(tag_expr, scope, cache) {
            el.is_component.set(component::is_admissible(&ty, config));
        }
    }
}

fn bind_if(if_node: &If, parent_scope: &Scope, shape: Option<&StmtShape>, cache: &PackageCache, config: &ResolverConfig) {
    match shape {
        Some(StmtShape::If {
            then_scope,
            then,
            else_ifs,
            else_scope,
            else_body,
        }) => {
            if_node.then_scope.set(then_scope.clone());
            let mut then_cursor = ShapeCursor::new(then);
            bind_nodes(&if_node.then_children, then_scope, &mut then_cursor, cache, config);

            for (else_if, branch) in if_node.else_ifs.iter().zip(else_ifs.iter()) {
                else_if.scope.set(branch.scope.clone());
                let mut c = ShapeCursor::new(&branch.body);
                bind_nodes(&else_if.children, &branch.scope, &mut c, cache, config);
            }
            for else_if in if_node.else_ifs.iter().skip(else_ifs.len()) {
                let scope = parent_scope.child();
                try_bind_inline_decl(&else_if.cond, &scope, cache);
                else_if.scope.set(scope.clone());
                bind_nodes_fallback(&else_if.children, &scope, cache, config);
            }

            if !if_node.else_children.is_empty() {
                match else_scope {
                    Some(scope) => {
                        if_node.else_scope.set(scope.clone());
                        let mut c = ShapeCursor::new(else_body);
                        bind_nodes(&if_node.else_children, scope, &mut c, cache, config);
                    }
                    None => {
                        let scope = parent_scope.child();
                        if_node.else_scope.set(scope.clone());
                        bind_nodes_fallback(&if_node.else_children, &scope, cache, config);
                    }
                }
            }
        }
        _ => fallback_bind_if(if_node, parent_scope, cache, config),
    }
}

fn bind_for(for_node: &For, parent_scope: &Scope, shape: Option<&StmtShape>, cache: &PackageCache, config: &ResolverConfig) {
    match shape {
        Some(StmtShape::For { scope, body }) => {
            for_node.scope.set(scope.clone());
            let mut c = ShapeCursor::new(body);
            bind_nodes(&for_node.children, scope, &mut c, cache, config);
        }
        _ => fallback_bind_for(for_node, parent_scope, cache, config),
    }
}

fn bind_switch(switch_node: &Switch, parent_scope: &Scope, shape: Option<&StmtShape>, cache: &PackageCache, config: &ResolverConfig) {
    match shape {
        Some(StmtShape::Switch { scope, cases }) => {
            switch_node.scope.set(scope.clone());
            for (case, branch) in switch_node.cases.iter().zip(cases.iter()) {
                case.scope.set(branch.scope.clone());
                let mut c = ShapeCursor::new(&branch.body);
                bind_nodes(&case.children, &branch.scope, &mut c, cache, config);
            }
            for case in switch_node.cases.iter().skip(cases.len()) {
                let case_scope = scope.child();
                case.scope.set(case_scope.clone());
                bind_nodes_fallback(&case.children, &case_scope, cache, config);
            }
        }
        _ => fallback_bind_switch(switch_node, parent_scope, cache, config),
    }
}

// ---- fallback synthesis (§4.4 step 5) --------------------------------------------

fn bind_nodes_fallback(nodes: &[Node], scope: &Scope, cache: &PackageCache, config: &ResolverConfig) {
    for node in nodes {
        match node {
            Node::Element(el) => {
                bind_element(el, scope, cache, config);
                bind_nodes_fallback(&el.children, scope, cache, config);
            }
            Node::If(i) => fallback_bind_if(i, scope, cache, config),
            Node::For(f) => fallback_bind_for(f, scope, cache, config),
            Node::Switch(s) => fallback_bind_switch(s, scope, cache, config),
            Node::Text(_) | Node::Whitespace | Node::Interpolation(_) | Node::TemplateCall(_) | Node::InlineCode(_) => {}
        }
    }
}

fn fallback_bind_if(if_node: &If, parent_scope: &Scope, cache: &PackageCache, config: &ResolverConfig) {
    let then_scope = parent_scope.child();
    try_bind_inline_decl(&if_node.cond, &then_scope, cache);
    if_node.then_scope.set(then_scope.clone());
    bind_nodes_fallback(&if_node.then_children, &then_scope, cache, config);

    for else_if in &if_node.else_ifs {
        let scope = parent_scope.child();
        try_bind_inline_decl(&else_if.cond, &scope, cache);
        else_if.scope.set(scope.clone());
        bind_nodes_fallback(&else_if.children, &scope, cache, config);
    }

    if !if_node.else_children.is_empty() {
        let scope = parent_scope.child();
        if_node.else_scope.set(scope.clone());
        bind_nodes_fallback(&if_node.else_children, &scope, cache, config);
    }
}

/// Best-effort recognition of an inline declaration guarding a branch (`x := f()`);
/// introduces the declared name with whatever type its RHS resolves to, else `Unknown`.
fn try_bind_inline_decl(cond: &str, scope: &Scope, cache: &PackageCache) {
    if let Some((name, rhs)) = cond.split_once(":=") {
        let name = name.trim();
        if !name.is_empty() && !name.contains(' ') {
            let ty = resolve_expression(rhs.trim(), scope, cache).unwrap_or(Type::Unknown);
            scope.bind(name.to_string(), ty);
        }
    }
}

fn fallback_bind_for(for_node: &For, parent_scope: &Scope, cache: &PackageCache, config: &ResolverConfig) {
    let scope = parent_scope.child();
    if let Some((vars, ranged_expr)) = parse_range_header(&for_node.header) {
        let ranged_ty = resolve_expression(&ranged_expr, parent_scope, cache).unwrap_or(Type::Unknown);
        bind_range_vars(&vars, &ranged_ty, &scope);
    }
    for_node.scope.set(scope.clone());
    bind_nodes_fallback(&for_node.children, &scope, cache, config);
}

/// Recognizes `i, t := range expr` (Go-flavored) and `t of expr` / `t in expr`
/// (JS-flavored) for-headers, extracting the declared loop variable names and the
/// ranged expression text.
fn parse_range_header(header: &str) -> Option<(Vec<String>, String)> {
    if let Some(idx) = header.find(" range ") {
        let lhs = header[..idx].trim_end_matches(":=").trim_end_matches('=').trim();
        let vars: Vec<String> = lhs.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if vars.is_empty() {
            return None;
        }
        return Some((vars, header[idx + " range ".len()..].trim().to_string()));
    }
    if let Some(idx) = header.find(" of ") {
        let name = strip_decl_keyword(header[..idx].trim());
        return Some((vec![name.to_string()], header[idx + " of ".len()..].trim().to_string()));
    }
    if let Some(idx) = header.find(" in ") {
        let name = strip_decl_keyword(header[..idx].trim());
        return Some((vec![name.to_string()], header[idx + " in ".len()..].trim().to_string()));
    }
    None
}

fn strip_decl_keyword(s: &str) -> &str {
    s.strip_prefix("let ")
        .or_else(|| s.strip_prefix("const "))
        .or_else(|| s.strip_prefix("var "))
        .unwrap_or(s)
        .trim()
}

/// Introduce the range's loop variables per §4.4 step 5's per-shape rules.
fn bind_range_vars(vars: &[String], ranged_ty: &Type, scope: &Scope) {
    match ranged_ty {
        Type::Map(k, v) => {
            if let Some(key) = vars.first() {
                scope.bind(key.clone(), (**k).clone());
            }
            if let Some(value) = vars.get(1) {
                scope.bind(value.clone(), (**v).clone());
            }
        }
        Type::AsyncIterable(v) => {
            if let Some(value) = vars.first() {
                scope.bind(value.clone(), (**v).clone());
            }
        }
        Type::Array(elem) => match vars {
            [index, value] => {
                scope.bind(index.clone(), Type::Basic(BasicType::Number));
                scope.bind(value.clone(), (**elem).clone());
            }
            [value] => scope.bind(value.clone(), (**elem).clone()),
            _ => {}
        },
        Type::Basic(BasicType::String) => match vars {
            [index, value] => {
                scope.bind(index.clone(), Type::Basic(BasicType::Number));
                scope.bind(value.clone(), Type::Basic(BasicType::String));
            }
            [index] => scope.bind(index.clone(), Type::Basic(BasicType::Number)),
            _ => {}
        },
        _ => {
            for name in vars {
                scope.bind(name.clone(), Type::Unknown);
            }
        }
    }
}

fn fallback_bind_switch(switch_node: &Switch, parent_scope: &Scope, cache: &PackageCache, config: &ResolverConfig) {
    let scope = parent_scope.child();
    let decl_name = switch_node.subject.split_once(":=").map(|(name, _)| name.trim().to_string());
    switch_node.scope.set(scope.clone());
    for case in &switch_node.cases {
        let case_scope = scope.child();
        if let Some(name) = &decl_name {
            let ty = match &case.expr {
                CaseExpr::Expr(e) => resolve_expression(e, &scope, cache).unwrap_or(Type::Unknown),
                CaseExpr::Default => Type::Unknown,
            };
            case_scope.bind(name.clone(), ty);
        }
        case.scope.set(case_scope.clone());
        bind_nodes_fallback(&case.children, &case_scope, cache, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;
    use std::path::PathBuf;

    fn file_with_template(template: Template) -> TemplateFile {
        TemplateFile::new(PathBuf::from("/m/button.templ.ts"), "ui", vec![TopLevelNode::Template(template)])
    }

    #[test]
    fn fallback_binds_file_and_template_scopes_when_no_package_loaded() {
        let cache = PackageCache::new();
        let template = Template::new(
            "Button",
            vec![Param { name: "label".into(), type_text: "string".into() }],
            vec![],
            Span::default(),
        );
        let file = file_with_template(template);
        assign_scopes(&file, &cache, &ResolverConfig::default());

        assert!(file.scope.is_set());
        let t = file.templates().next().unwrap();
        assert!(t.scope.is_set());
        assert_eq!(t.scope.get().unwrap().lookup("label"), Some(Type::Basic(BasicType::String)));
    }

    #[test]
    fn import_declaration_binds_a_package_marker_into_file_scope() {
        let decl = HostDecl {
            kind: HostDeclKind::Import,
            source: "import \"ui\"".to_string(),
            span: Span::default(),
        };
        let template = Template::new("Page", vec![], vec![], Span::default());
        let file = TemplateFile::new(
            PathBuf::from("/m/page.templ.ts"),
            "app",
            vec![TopLevelNode::HostDecl(decl), TopLevelNode::Template(template)],
        );
        let cache = PackageCache::new();
        assign_scopes(&file, &cache, &ResolverConfig::default());
        assert_eq!(file.scope.get().unwrap().lookup("ui"), Some(Type::Package("ui".to_string())));
    }

    #[test]
    fn assign_scopes_is_idempotent() {
        let cache = PackageCache::new();
        let template = Template::new("Empty", vec![], vec![], Span::default());
        let file = file_with_template(template);
        let config = ResolverConfig::default();
        assign_scopes(&file, &cache, &config);
        assign_scopes(&file, &cache, &config);
        assert!(file.scope.is_set());
    }

    #[test]
    fn for_over_array_binds_index_and_value_in_fallback() {
        let for_node = For {
            header: "i, v := range items".to_string(),
            children: vec![],
            scope: crate::scope::ScopeSlot::empty(),
            span: Span::default(),
        };
        let mut template = Template::new("List", vec![Param { name: "items".into(), type_text: "string[]".into() }], vec![], Span::default());
        template.body.push(Node::For(for_node));
        let file = file_with_template(template);
        let cache = PackageCache::new();
        assign_scopes(&file, &cache, &ResolverConfig::default());

        let t = file.templates().next().unwrap();
        let for_node = t.body.iter().find_map(|n| match n {
            Node::For(f) => Some(f),
            _ => None,
        }).unwrap();
        let scope = for_node.scope.get().unwrap();
        assert_eq!(scope.lookup("i"), Some(Type::Basic(BasicType::Number)));
        assert_eq!(scope.lookup("v"), Some(Type::Basic(BasicType::String)));
    }

    #[test]
    fn lowercase_element_without_admissible_tag_defaults_non_component() {
        let el = Element::new("div", vec![], vec![], Span::default());
        let mut template = Template::new("Page", vec![], vec![], Span::default());
        template.body.push(Node::Element(el));
        let file = file_with_template(template);
        let cache = PackageCache::new();
        assign_scopes(&file, &cache, &ResolverConfig::default());

        let t = file.templates().next().unwrap();
        let el = t.body.iter().find_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        }).unwrap();
        assert!(el.scope.is_set());
        assert!(!el.is_component.get());
    }

    #[test]
    fn blank_identifier_in_range_header_never_enters_scope() {
        let for_node = For {
            header: "_, v := range items".to_string(),
            children: vec![],
            scope: crate::scope::ScopeSlot::empty(),
            span: Span::default(),
        };
        let mut template = Template::new("List", vec![Param { name: "items".into(), type_text: "string[]".into() }], vec![], Span::default());
        template.body.push(Node::For(for_node));
        let file = file_with_template(template);
        let cache = PackageCache::new();
        assign_scopes(&file, &cache, &ResolverConfig::default());

        let t = file.templates().next().unwrap();
        let for_node = t.body.iter().find_map(|n| match n {
            Node::For(f) => Some(f),
            _ => None,
        }).unwrap();
        let scope = for_node.scope.get().unwrap();
        assert_eq!(scope.names().len(), 1);
        assert_eq!(scope.lookup_local("v"), Some(Type::Basic(BasicType::String)));
    }
}
