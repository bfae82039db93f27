//! Overlay synthesis: turning a parsed template file into one compilable host-language
//! source unit that a real type checker can parse and bind.
//!
//! The synthesized unit is not meant to run; it exists so the checker assigns real
//! types to every local the template body introduces. Markup itself — elements, text,
//! interpolations, template calls — contributes nothing to the overlay body; only
//! control constructs and inline code do (see [`lower_nodes`]).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ast::{CaseExpr, CssTemplate, HostDeclKind, Node, ScriptTemplate, Template, TemplateFile, TopLevelNode};
use crate::config::ResolverConfig;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("malformed template `{path}`: {reason}")]
    MissingPackageDeclaration { path: PathBuf, reason: String },
}

impl From<OverlayError> for crate::error::ResolveError {
    fn from(err: OverlayError) -> Self {
        match err {
            OverlayError::MissingPackageDeclaration { path, reason } => {
                crate::error::ResolveError::MalformedTemplate { path, reason }
            }
        }
    }
}

/// A synthesized host-language source unit, 1:1 with one [`TemplateFile`].
#[derive(Debug, Clone)]
pub struct Overlay {
    pub path: PathBuf,
    pub content: String,
}

/// The overlay path for a template file: same directory and stem, host extension.
pub fn overlay_path(template_path: &Path) -> PathBuf {
    let file_name = template_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("overlay");
    let stem = file_name
        .strip_suffix(".templ.ts")
        .or_else(|| file_name.strip_suffix(".templ"))
        .unwrap_or(file_name.trim_end_matches(".ts"));
    template_path.with_file_name(format!("{stem}.overlay.ts"))
}

/// Synthesize the overlay for one parsed template file. Deterministic: the same
/// `TemplateFile` content always produces byte-identical output.
pub fn synthesize(file: &TemplateFile, config: &ResolverConfig) -> Result<Overlay, OverlayError> {
    if file.package_name.is_empty() {
        return Err(OverlayError::MissingPackageDeclaration {
            path: file.path.clone(),
            reason: "missing package declaration".to_string(),
        });
    }

    let mut out = String::new();
    let _ = writeln!(out, "// synthesized overlay for package `{}`", file.package_name);

    let has_framework_import = file.nodes.iter().any(|n| match n {
        TopLevelNode::HostDecl(d) => d.kind == HostDeclKind::Import && d.source.contains(&config.framework_module),
        _ => false,
    });
    if !has_framework_import {
        let _ = writeln!(
            out,
            "import type {{ {}, {}, {}, {}, {}, {} }} from \"{}\";",
            config.component_marker,
            config.css_class_marker,
            config.component_script_marker,
            config.render_context_type,
            config.writer_type,
            config.render_result_type,
            config.framework_module,
        );
    }

    for node in &file.nodes {
        match node {
            TopLevelNode::HostDecl(decl) => {
                out.push_str(decl.source.trim_end());
                out.push('\n');
            }
            TopLevelNode::Template(t) => emit_template(&mut out, t, config),
            TopLevelNode::CssTemplate(c) => emit_css_template(&mut out, c, config),
            TopLevelNode::ScriptTemplate(s) => emit_script_template(&mut out, s, config),
        }
    }

    Ok(Overlay {
        path: overlay_path(&file.path),
        content: out,
    })
}

fn format_params(params: &[crate::ast::Param]) -> String {
    params
        .iter()
        .map(|p| {
            let ty = if p.type_text.is_empty() { "any" } else { p.type_text.as_str() };
            format!("{}: {}", p.name, ty)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit_template(out: &mut String, t: &Template, config: &ResolverConfig) {
    let _ = writeln!(out, "function {}({}): {} {{", t.name, format_params(&t.params), config.component_marker);
    lower_nodes(&t.body, out);
    out.push_str("}\n");
}

fn emit_css_template(out: &mut String, c: &CssTemplate, config: &ResolverConfig) {
    // CSS body is style text, not host code; the stub only needs the right shape and
    // return type for the checker to bind the function's scope and signature.
    let _ = writeln!(out, "function {}({}): {} {{", c.name, format_params(&c.params), config.css_class_marker);
    let _ = writeln!(out, "return undefined as unknown as {};", config.css_class_marker);
    out.push_str("}\n");
}

fn emit_script_template(out: &mut String, s: &ScriptTemplate, config: &ResolverConfig) {
    let _ = writeln!(out, "function {}({}): {} {{", s.name, format_params(&s.params), config.component_script_marker);
    out.push_str(s.body.trim_end());
    out.push('\n');
    let _ = writeln!(out, "return undefined as unknown as {};", config.component_script_marker);
    out.push_str("}\n");
}

/// Lower a template body into overlay statements per the body-lowering rules: only
/// `InlineCode`, `If`, `For`, and `Switch` contribute; everything else recurses into
/// its children (if any) without emitting anything of its own.
fn lower_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::InlineCode(code) => {
                out.push_str(code.source.trim_end());
                out.push('\n');
            }
            Node::If(i) => {
                let _ = writeln!(out, "if ({}) {{", i.cond);
                lower_nodes(&i.then_children, out);
                out.push_str("}\n");
                for else_if in &i.else_ifs {
                    let _ = writeln!(out, "else if ({}) {{", else_if.cond);
                    lower_nodes(&else_if.children, out);
                    out.push_str("}\n");
                }
                if !i.else_children.is_empty() {
                    out.push_str("else {\n");
                    lower_nodes(&i.else_children, out);
                    out.push_str("}\n");
                }
            }
            Node::For(f) => {
                let _ = writeln!(out, "for ({}) {{", f.header);
                lower_nodes(&f.children, out);
                out.push_str("}\n");
            }
            Node::Switch(s) => {
                let _ = writeln!(out, "switch ({}) {{", s.subject);
                for case in &s.cases {
                    match &case.expr {
                        CaseExpr::Expr(e) => {
                            let _ = writeln!(out, "case {}:", e);
                        }
                        CaseExpr::Default => out.push_str("default:\n"),
                    }
                    lower_nodes(&case.children, out);
                }
                out.push_str("}\n");
            }
            Node::Element(e) => lower_nodes(&e.children, out),
            Node::Text(_) | Node::Whitespace | Node::Interpolation(_) | Node::TemplateCall(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Element, For, HostDecl, If, InlineCode, Param};
    use crate::source::Span;
    use std::path::PathBuf;

    fn file_with(nodes: Vec<TopLevelNode>) -> TemplateFile {
        TemplateFile::new(PathBuf::from("/m/button.templ.ts"), "ui", nodes)
    }

    #[test]
    fn missing_package_name_is_an_error() {
        let file = TemplateFile::new(PathBuf::from("/m/x.templ.ts"), "", vec![]);
        let err = synthesize(&file, &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, OverlayError::MissingPackageDeclaration { .. }));
    }

    #[test]
    fn inserts_framework_import_when_absent() {
        let file = file_with(vec![]);
        let overlay = synthesize(&file, &ResolverConfig::default()).unwrap();
        assert!(overlay.content.contains("@templ/runtime"));
    }

    #[test]
    fn does_not_duplicate_existing_framework_import() {
        let decl = HostDecl {
            kind: HostDeclKind::Import,
            source: "import { Component } from \"@templ/runtime\";".to_string(),
            span: Span::default(),
        };
        let file = file_with(vec![TopLevelNode::HostDecl(decl)]);
        let overlay = synthesize(&file, &ResolverConfig::default()).unwrap();
        assert_eq!(overlay.content.matches("@templ/runtime").count(), 1);
    }

    #[test]
    fn host_decls_are_preserved_verbatim() {
        let decl = HostDecl {
            kind: HostDeclKind::Const,
            source: "const greeting = \"hi\";".to_string(),
            span: Span::default(),
        };
        let file = file_with(vec![TopLevelNode::HostDecl(decl)]);
        let overlay = synthesize(&file, &ResolverConfig::default()).unwrap();
        assert!(overlay.content.contains("const greeting = \"hi\";"));
    }

    #[test]
    fn template_lowers_control_constructs_but_not_markup() {
        let if_node = Node::If(If {
            cond: "disabled".to_string(),
            then_children: vec![Node::InlineCode(InlineCode {
                source: "markDisabled()".to_string(),
                span: Span::default(),
            })],
            else_ifs: vec![],
            else_children: vec![],
            then_scope: crate::scope::ScopeSlot::empty(),
            else_scope: crate::scope::ScopeSlot::empty(),
            span: Span::default(),
        });
        let element = Node::Element(Element::new("button", vec![], vec![Node::Text("click".into())], Span::default()));
        let template = Template::new(
            "Button",
            vec![Param { name: "disabled".into(), type_text: "boolean".into() }],
            vec![if_node, element],
            Span::default(),
        );
        let file = file_with(vec![TopLevelNode::Template(template)]);
        let overlay = synthesize(&file, &ResolverConfig::default()).unwrap();
        assert!(overlay.content.contains("function Button(disabled: boolean): Component {"));
        assert!(overlay.content.contains("if (disabled) {"));
        assert!(overlay.content.contains("markDisabled()"));
        assert!(!overlay.content.contains("click"));
    }

    #[test]
    fn for_loop_header_is_embedded_verbatim() {
        let for_node = Node::For(For {
            header: "i, t := range user.Tags".to_string(),
            children: vec![],
            scope: crate::scope::ScopeSlot::empty(),
            span: Span::default(),
        });
        let template = Template::new("ShowUser", vec![], vec![for_node], Span::default());
        let file = file_with(vec![TopLevelNode::Template(template)]);
        let overlay = synthesize(&file, &ResolverConfig::default()).unwrap();
        assert!(overlay.content.contains("for (i, t := range user.Tags) {"));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let template = Template::new("Empty", vec![], vec![], Span::default());
        let file = file_with(vec![TopLevelNode::Template(template)]);
        let config = ResolverConfig::default();
        let a = synthesize(&file, &config).unwrap();
        let b = synthesize(&file, &config).unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn overlay_path_swaps_template_extension() {
        let p = overlay_path(Path::new("/x/button.templ.ts"));
        assert_eq!(p, PathBuf::from("/x/button.overlay.ts"));
    }
}
