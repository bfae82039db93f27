//! Template AST model.
//!
//! Node and top-level variants are tagged unions, not open polymorphism: behavior per
//! kind is dispatched with a `match`, which keeps traversal code closed and
//! exhaustiveness-checked (see DESIGN.md). Composite nodes expose a single `children()`
//! accessor rather than per-variant traversal helpers.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use crate::scope::ScopeSlot;
use crate::source::Span;

/// One parsed template source file.
pub struct TemplateFile {
    pub path: PathBuf,
    pub package_name: String,
    pub nodes: Vec<TopLevelNode>,
    pub scope: ScopeSlot,
}

impl TemplateFile {
    pub fn new(path: impl Into<PathBuf>, package_name: impl Into<String>, nodes: Vec<TopLevelNode>) -> Self {
        Self {
            path: path.into(),
            package_name: package_name.into(),
            nodes,
            scope: ScopeSlot::empty(),
        }
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.nodes.iter().filter_map(|n| match n {
            TopLevelNode::Template(t) => Some(t),
            _ => None,
        })
    }
}

/// A declaration at file scope, outside of any template.
pub enum TopLevelNode {
    HostDecl(HostDecl),
    Template(Template),
    CssTemplate(CssTemplate),
    ScriptTemplate(ScriptTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDeclKind {
    Import,
    Const,
    Var,
    Type,
    Func,
    Comment,
}

/// A host-language declaration, carried verbatim so the overlay can reproduce it.
pub struct HostDecl {
    pub kind: HostDeclKind,
    pub source: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_text: String,
}

/// A named, parameterized template producing markup.
pub struct Template {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Node>,
    pub scope: ScopeSlot,
    pub span: Span,
}

impl Template {
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Vec<Node>, span: Span) -> Self {
        Self {
            name: name.into(),
            params,
            body,
            scope: ScopeSlot::empty(),
            span,
        }
    }
}

/// A CSS template: produces the framework's `CSSClass` marker.
pub struct CssTemplate {
    pub name: String,
    pub params: Vec<Param>,
    pub body: String,
    pub scope: ScopeSlot,
    pub span: Span,
}

/// A script template: produces the framework's `ComponentScript` marker.
pub struct ScriptTemplate {
    pub name: String,
    pub params: Vec<Param>,
    pub body: String,
    pub scope: ScopeSlot,
    pub span: Span,
}

/// One statement inside a template body.
pub enum Node {
    Text(String),
    Whitespace,
    Element(Element),
    /// A `{ expr }` interpolation: a host expression embedded directly in markup.
    /// Per §1, this is one of the expression forms the resolver must type — it
    /// contributes no code to the overlay (§4.1) and is resolved later via
    /// `resolve_expression` against the enclosing scope.
    Interpolation(Interpolation),
    InlineCode(InlineCode),
    If(If),
    For(For),
    Switch(Switch),
    TemplateCall(TemplateCall),
}

pub struct Interpolation {
    pub expr: String,
    pub span: Span,
}

impl Node {
    /// Child nodes of this node, or an empty slice for leaves. Markup itself (Element)
    /// and the control constructs all expose their bodies through this one accessor.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(e) => &e.children,
            // If/For/Switch have more than one child sequence; callers that need all of
            // them use the dedicated fields. `children()` exposes the primary (first/then)
            // sequence, which is sufficient for plain depth-first walks that don't care
            // about branch identity.
            Node::If(i) => &i.then_children,
            Node::For(f) => &f.children,
            Node::Switch(s) => s.cases.first().map(|c| c.children.as_slice()).unwrap_or(&[]),
            Node::Text(_)
            | Node::Whitespace
            | Node::Interpolation(_)
            | Node::InlineCode(_)
            | Node::TemplateCall(_) => &[],
        }
    }

    /// Whether this node kind emits code into an overlay body (§4.1).
    pub fn contributes_to_overlay(&self) -> bool {
        matches!(self, Node::InlineCode(_) | Node::If(_) | Node::For(_) | Node::Switch(_))
    }
}

pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub scope: ScopeSlot,
    /// Whether this element resolved as a component (§4.6). Set once by the binder,
    /// through a shared reference — the same idempotent-write contract as `ScopeSlot`.
    pub is_component: Cell<bool>,
    /// The tag re-parsed as a host expression, when it parses as one (e.g. `ui.Button`).
    pub tag_expr: Option<String>,
    pub span: Span,
}

impl Element {
    pub fn new(tag: impl Into<String>, attributes: Vec<Attribute>, children: Vec<Node>, span: Span) -> Self {
        let tag = tag.into();
        let tag_expr = parse_as_host_expr(&tag);
        Self {
            tag,
            attributes,
            children,
            scope: ScopeSlot::empty(),
            is_component: Cell::new(false),
            tag_expr,
            span,
        }
    }
}

/// A tag parses as a host expression when it is a dotted identifier path
/// (`Button`, `ui.Button`) — exactly the shapes `resolve_component` can evaluate.
fn parse_as_host_expr(tag: &str) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    let is_ident_path = tag
        .split('.')
        .all(|seg| !seg.is_empty() && seg.chars().next().unwrap().is_alphabetic() || seg.starts_with('_'));
    if is_ident_path {
        Some(tag.to_string())
    } else {
        None
    }
}

pub struct ElseIf {
    pub cond: String,
    pub children: Vec<Node>,
    pub scope: ScopeSlot,
    pub span: Span,
}

pub struct If {
    pub cond: String,
    pub then_children: Vec<Node>,
    pub else_ifs: Vec<ElseIf>,
    pub else_children: Vec<Node>,
    pub then_scope: ScopeSlot,
    pub else_scope: ScopeSlot,
    pub span: Span,
}

pub struct For {
    pub header: String,
    pub children: Vec<Node>,
    pub scope: ScopeSlot,
    pub span: Span,
}

pub enum CaseExpr {
    Expr(String),
    Default,
}

pub struct Case {
    pub expr: CaseExpr,
    pub children: Vec<Node>,
    pub scope: ScopeSlot,
    pub span: Span,
}

pub struct Switch {
    pub subject: String,
    pub cases: Vec<Case>,
    pub scope: ScopeSlot,
    pub span: Span,
}

/// A fragment of host code embedded directly in a template body. Declares no scope of
/// its own: any locals it introduces enter the enclosing construct's scope.
pub struct InlineCode {
    pub source: String,
    pub span: Span,
}

pub struct TemplateCall {
    pub callee: String,
    pub args: Vec<String>,
    pub span: Span,
}

pub enum Attribute {
    Constant { name: String, value: String },
    Expression { name: String, expr: String },
    Spread { expr: String },
    BoolToggle { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_tag_parses_as_host_expr() {
        let el = Element::new("ui.Button", vec![], vec![], Span::default());
        assert_eq!(el.tag_expr.as_deref(), Some("ui.Button"));
    }

    #[test]
    fn lowercase_tag_still_parses_as_expr_but_defaults_non_component() {
        // Resolution decides is_component, not parsing; a plain `div` still parses as
        // an identifier path, it just won't resolve to anything admissible later.
        let el = Element::new("div", vec![], vec![], Span::default());
        assert_eq!(el.tag_expr.as_deref(), Some("div"));
        assert!(!el.is_component.get());
    }

    #[test]
    fn node_children_for_leaf_is_empty() {
        let n = Node::Text("hi".into());
        assert!(n.children().is_empty());
    }

    #[test]
    fn inline_code_does_not_contribute_own_scope() {
        let code = InlineCode {
            source: "let x = 1".into(),
            span: Span::default(),
        };
        assert!(Node::InlineCode(code).contributes_to_overlay());
    }
}
