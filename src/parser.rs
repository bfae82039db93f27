//! A hand-written recursive-descent reader for the hybrid template format.
//!
//! No external crate parses this hybrid markup/host-language format, so — unlike the
//! checker, which delegates to `oxc` — this module owns lexing and parsing outright. It
//! produces the [`crate::ast`] entities directly; host-language fragments embedded in
//! the result (conditions, headers, inline code, attribute expressions) are kept as raw
//! text, to be lowered into an overlay and handed to `oxc` for real parsing later.

use crate::ast::*;
use crate::error::{ResolveError, ResolveResult};
use crate::source::Span;
use std::path::Path;

pub struct TemplateParser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> TemplateParser<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    /// Parse one template file. Fails with [`ResolveError::MalformedTemplate`] only
    /// when the package declaration itself is missing; every other oddity in an
    /// embedded fragment is preserved verbatim and left for the host checker to judge.
    pub fn parse_file(path: &Path, src: &'s str) -> ResolveResult<TemplateFile> {
        let mut p = TemplateParser::new(src);
        p.skip_trivia();
        if !p.eat_word("package") {
            return Err(ResolveError::MalformedTemplate {
                path: path.to_path_buf(),
                reason: "missing package declaration".to_string(),
            });
        }
        p.skip_ws_no_newline();
        let package_name = p.take_while(|c| !c.is_whitespace()).to_string();
        if package_name.is_empty() {
            return Err(ResolveError::MalformedTemplate {
                path: path.to_path_buf(),
                reason: "package declaration has no name".to_string(),
            });
        }

        let mut nodes = Vec::new();
        loop {
            p.skip_trivia();
            if p.is_eof() {
                break;
            }
            nodes.push(p.parse_top_level_item());
        }

        Ok(TemplateFile::new(path.to_path_buf(), package_name, nodes))
    }

    // ---- low-level scanning -------------------------------------------------

    fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Consume an exact keyword only if it is followed by a non-identifier
    /// character (so `iffy` is not mistaken for `if`).
    fn eat_word(&mut self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }
        let after = &self.rest()[word.len()..];
        let boundary = after.chars().next().map(|c| !is_ident_char(c)).unwrap_or(true);
        if boundary {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn skip_ws_no_newline(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.bump();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Skip whitespace and `//` line comments between top-level items.
    fn skip_trivia(&mut self) {
        loop {
            let before = self.pos;
            self.skip_ws();
            if self.starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.bump();
                }
            }
            if self.pos == before {
                break;
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'s str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// Capture the rest of the current line (not including the newline).
    fn capture_to_eol(&mut self) -> (String, Span) {
        let start = self.pos;
        while !matches!(self.peek(), None | Some('\n')) {
            self.bump();
        }
        (self.src[start..self.pos].trim_end().to_string(), self.span_from(start))
    }

    /// Expects `self.peek() == Some(open)`. Captures the balanced-delimiter region,
    /// including both delimiters.
    fn capture_balanced(&mut self, open: char, close: char) -> (String, Span) {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some(c) if c == open => depth += 1,
                Some(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some('"') | Some('\'') | Some('`') => {
                    // skip over string/template literals so braces inside them don't
                    // confuse the balance count.
                    self.skip_string_literal_body();
                }
                Some(_) => {}
                None => break,
            }
        }
        (self.src[start..self.pos].to_string(), self.span_from(start))
    }

    fn skip_string_literal_body(&mut self) {
        // Called right after the opening quote has been consumed by `bump` in the
        // caller's match arm; `self.pos` now points just past it.
        let quote = self.src[..self.pos].chars().last().unwrap();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
                None => break,
            }
        }
    }

    /// Capture text up to (not including) the first top-level `{`, i.e. a `{` not
    /// nested inside `(`/`[`/a string literal. Used for `if`/`for`/`switch` headers.
    fn capture_header_until_brace(&mut self) -> (String, Span) {
        let start = self.pos;
        let mut paren_depth = 0i32;
        loop {
            match self.peek() {
                Some('(') | Some('[') => {
                    paren_depth += 1;
                    self.bump();
                }
                Some(')') | Some(']') => {
                    paren_depth -= 1;
                    self.bump();
                }
                Some('{') if paren_depth <= 0 => break,
                Some('"') | Some('\'') | Some('`') => {
                    self.bump();
                    self.skip_string_literal_body();
                }
                Some(_) => {
                    self.bump();
                }
                None => break,
            }
        }
        (self.src[start..self.pos].trim().to_string(), self.span_from(start))
    }

    // ---- top-level items -----------------------------------------------------

    fn parse_top_level_item(&mut self) -> TopLevelNode {
        if self.starts_with("//") {
            return TopLevelNode::HostDecl(self.parse_line_comment());
        }
        if self.starts_with("templ ") || self.starts_with("templ\t") {
            return TopLevelNode::Template(self.parse_templ());
        }
        if self.starts_with("css ") || self.starts_with("css\t") {
            return TopLevelNode::CssTemplate(self.parse_css());
        }
        if self.starts_with("script ") || self.starts_with("script\t") {
            return TopLevelNode::ScriptTemplate(self.parse_script());
        }
        if self.starts_with("import") {
            return TopLevelNode::HostDecl(self.parse_grouped_or_single(HostDeclKind::Import, "import"));
        }
        if self.starts_with("const") {
            return TopLevelNode::HostDecl(self.parse_grouped_or_single(HostDeclKind::Const, "const"));
        }
        if self.starts_with("var") {
            return TopLevelNode::HostDecl(self.parse_grouped_or_single(HostDeclKind::Var, "var"));
        }
        if self.starts_with("type") {
            return TopLevelNode::HostDecl(self.parse_type_decl());
        }
        if self.starts_with("func") || self.starts_with("export function") || self.starts_with("function") {
            return TopLevelNode::HostDecl(self.parse_func_decl());
        }
        // Defensive fallback: consume one line so malformed input can't loop forever.
        let (source, span) = self.capture_to_eol();
        TopLevelNode::HostDecl(HostDecl {
            kind: HostDeclKind::Comment,
            source,
            span,
        })
    }

    fn parse_line_comment(&mut self) -> HostDecl {
        let (source, span) = self.capture_to_eol();
        HostDecl {
            kind: HostDeclKind::Comment,
            source,
            span,
        }
    }

    /// `import "x"` / `const x = 1` or the grouped forms `import (\n ... \n)`.
    fn parse_grouped_or_single(&mut self, kind: HostDeclKind, keyword: &str) -> HostDecl {
        let start = self.pos;
        self.pos += keyword.len();
        self.skip_ws_no_newline();
        if self.peek() == Some('(') {
            let (_, _) = self.capture_balanced('(', ')');
        } else {
            let (_, _) = self.capture_to_eol();
        }
        let span = self.span_from(start);
        HostDecl {
            kind,
            source: self.src[start..self.pos].to_string(),
            span,
        }
    }

    fn parse_type_decl(&mut self) -> HostDecl {
        let start = self.pos;
        self.pos += "type".len();
        let (header, _) = self.capture_header_until_brace_or_eol();
        let _ = header;
        if self.peek() == Some('{') {
            self.capture_balanced('{', '}');
        }
        let span = self.span_from(start);
        HostDecl {
            kind: HostDeclKind::Type,
            source: self.src[start..self.pos].to_string(),
            span,
        }
    }

    fn parse_func_decl(&mut self) -> HostDecl {
        let start = self.pos;
        let (header, _) = self.capture_header_until_brace_or_eol();
        let _ = header;
        if self.peek() == Some('{') {
            self.capture_balanced('{', '}');
        }
        let span = self.span_from(start);
        HostDecl {
            kind: HostDeclKind::Func,
            source: self.src[start..self.pos].to_string(),
            span,
        }
    }

    /// Like [`Self::capture_header_until_brace`] but also stops at end-of-line when no
    /// `{` follows on the same logical declaration (e.g. `type Alias = string`).
    fn capture_header_until_brace_or_eol(&mut self) -> (String, Span) {
        let start = self.pos;
        loop {
            match self.peek() {
                Some('{') => break,
                Some('\n') => break,
                Some('"') | Some('\'') | Some('`') => {
                    self.bump();
                    self.skip_string_literal_body();
                }
                Some(_) => {
                    self.bump();
                }
                None => break,
            }
        }
        (self.src[start..self.pos].to_string(), self.span_from(start))
    }

    // ---- templ / css / script -------------------------------------------------

    fn parse_signature(&mut self) -> (String, Vec<Param>) {
        self.skip_ws_no_newline();
        let name = self.take_while(is_ident_char).to_string();
        self.skip_ws_no_newline();
        let params = if self.peek() == Some('(') {
            let (raw, _) = self.capture_balanced('(', ')');
            parse_param_list(&raw)
        } else {
            Vec::new()
        };
        (name, params)
    }

    fn parse_templ(&mut self) -> Template {
        let start = self.pos;
        self.pos += "templ".len();
        let (name, params) = self.parse_signature();
        self.skip_ws();
        let body = if self.peek() == Some('{') {
            self.bump();
            let nodes = self.parse_node_sequence(NodeSequenceEnd::CloseBrace);
            nodes
        } else {
            Vec::new()
        };
        Template::new(name, params, body, self.span_from(start))
    }

    fn parse_css(&mut self) -> CssTemplate {
        let start = self.pos;
        self.pos += "css".len();
        let (name, params) = self.parse_signature();
        self.skip_ws();
        let body = if self.peek() == Some('{') {
            let (raw, _) = self.capture_balanced('{', '}');
            raw[1..raw.len() - 1].to_string()
        } else {
            String::new()
        };
        CssTemplate {
            name,
            params,
            body,
            scope: crate::scope::ScopeSlot::empty(),
            span: self.span_from(start),
        }
    }

    fn parse_script(&mut self) -> ScriptTemplate {
        let start = self.pos;
        self.pos += "script".len();
        let (name, params) = self.parse_signature();
        self.skip_ws();
        let body = if self.peek() == Some('{') {
            let (raw, _) = self.capture_balanced('{', '}');
            raw[1..raw.len() - 1].to_string()
        } else {
            String::new()
        };
        ScriptTemplate {
            name,
            params,
            body,
            scope: crate::scope::ScopeSlot::empty(),
            span: self.span_from(start),
        }
    }

    // ---- template body ---------------------------------------------------------

    fn parse_node_sequence(&mut self, end: NodeSequenceEnd) -> Vec<Node> {
        let mut nodes = Vec::new();
        loop {
            if self.is_eof() {
                break;
            }
            if end.matches(self) {
                end.consume(self);
                break;
            }
            nodes.push(self.parse_one_node());
        }
        nodes
    }

    fn parse_one_node(&mut self) -> Node {
        if self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            let start = self.pos;
            self.skip_ws();
            // Collapse pure inter-element formatting whitespace into one node; if it
            // was the start of the file this still behaves sensibly (an empty node).
            let _ = start;
            return Node::Whitespace;
        }
        if self.starts_with("</") {
            // A stray/unbalanced closing tag: stop here by emitting an empty text node
            // rather than consuming it — the enclosing `parse_element` is responsible
            // for consuming its own closing tag.
            return Node::Text(String::new());
        }
        if self.peek() == Some('<') {
            return Node::Element(self.parse_element());
        }
        if self.peek() == Some('{') {
            return self.parse_brace_node();
        }
        if self.peek() == Some('@') {
            return Node::TemplateCall(self.parse_template_call());
        }
        if self.eat_word_peek("if") {
            return Node::If(self.parse_if());
        }
        if self.eat_word_peek("for") {
            return Node::For(self.parse_for());
        }
        if self.eat_word_peek("switch") {
            return Node::Switch(self.parse_switch());
        }
        Node::Text(self.parse_text_run())
    }

    fn eat_word_peek(&self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }
        self.src[self.pos + word.len()..]
            .chars()
            .next()
            .map(|c| !is_ident_char(c))
            .unwrap_or(true)
    }

    fn parse_text_run(&mut self) -> String {
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some('<') | Some('{') | Some('@') => break,
                Some(_) => {
                    self.bump();
                }
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_brace_node(&mut self) -> Node {
        let start = self.pos;
        let (raw, span) = self.capture_balanced('{', '}');
        let inner = raw[1..raw.len() - 1].trim().to_string();
        let _ = start;
        if looks_like_statement(&inner) {
            Node::InlineCode(InlineCode { source: inner, span })
        } else {
            Node::Interpolation(Interpolation { expr: inner, span })
        }
    }

    fn parse_element(&mut self) -> Element {
        let start = self.pos;
        self.bump(); // '<'
        let tag = self.take_while(|c| is_ident_char(c) || c == '.' || c == ':' || c == '-').to_string();
        let mut attributes = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                    }
                    return Element::new(tag, attributes, Vec::new(), self.span_from(start));
                }
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('{') => {
                    let (raw, _) = self.capture_balanced('{', '}');
                    let mut inner = raw[1..raw.len() - 1].trim().to_string();
                    if let Some(stripped) = inner.strip_prefix("...") {
                        inner = stripped.trim().to_string();
                    }
                    attributes.push(Attribute::Spread { expr: inner });
                }
                Some(_) => {
                    attributes.push(self.parse_attribute());
                }
                None => break,
            }
        }
        let closing_tag = format!("</{tag}>");
        let children = self.parse_node_sequence(NodeSequenceEnd::Tag(closing_tag));
        Element::new(tag, attributes, children, self.span_from(start))
    }

    fn parse_attribute(&mut self) -> Attribute {
        let name = self.take_while(|c| is_ident_char(c) || c == '-').to_string();
        self.skip_ws_no_newline();
        if self.peek() == Some('=') {
            self.bump();
            self.skip_ws_no_newline();
            match self.peek() {
                Some('"') | Some('\'') => {
                    let quote = self.peek().unwrap();
                    self.bump();
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c != quote) {
                        self.bump();
                    }
                    let value = self.src[start..self.pos].to_string();
                    self.bump(); // closing quote
                    Attribute::Constant { name, value }
                }
                Some('{') => {
                    let (raw, _) = self.capture_balanced('{', '}');
                    let expr = raw[1..raw.len() - 1].trim().to_string();
                    Attribute::Expression { name, expr }
                }
                _ => Attribute::BoolToggle { name },
            }
        } else {
            Attribute::BoolToggle { name }
        }
    }

    fn parse_template_call(&mut self) -> TemplateCall {
        let start = self.pos;
        self.bump(); // '@'
        let callee = self.take_while(|c| is_ident_char(c) || c == '.').to_string();
        let args = if self.peek() == Some('(') {
            let (raw, _) = self.capture_balanced('(', ')');
            split_top_level_commas(&raw[1..raw.len() - 1])
        } else {
            Vec::new()
        };
        TemplateCall {
            callee,
            args,
            span: self.span_from(start),
        }
    }

    fn parse_if(&mut self) -> If {
        let start = self.pos;
        self.pos += "if".len();
        self.skip_ws_no_newline();
        let (cond, _) = self.capture_header_until_brace();
        self.bump(); // '{'
        let then_children = self.parse_node_sequence(NodeSequenceEnd::CloseBrace);

        let mut else_ifs = Vec::new();
        let mut else_children = Vec::new();
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if self.eat_word("else") {
                self.skip_ws_no_newline();
                if self.eat_word("if") {
                    let branch_start = self.pos;
                    self.skip_ws_no_newline();
                    let (cond, _) = self.capture_header_until_brace();
                    self.bump();
                    let children = self.parse_node_sequence(NodeSequenceEnd::CloseBrace);
                    else_ifs.push(ElseIf {
                        cond,
                        children,
                        scope: crate::scope::ScopeSlot::empty(),
                        span: self.span_from(branch_start),
                    });
                    continue;
                }
                self.skip_ws();
                if self.peek() == Some('{') {
                    self.bump();
                    else_children = self.parse_node_sequence(NodeSequenceEnd::CloseBrace);
                }
                break;
            } else {
                self.pos = checkpoint;
                break;
            }
        }

        If {
            cond,
            then_children,
            else_ifs,
            else_children,
            then_scope: crate::scope::ScopeSlot::empty(),
            else_scope: crate::scope::ScopeSlot::empty(),
            span: self.span_from(start),
        }
    }

    fn parse_for(&mut self) -> For {
        let start = self.pos;
        self.pos += "for".len();
        self.skip_ws_no_newline();
        let (header, _) = self.capture_header_until_brace();
        self.bump(); // '{'
        let children = self.parse_node_sequence(NodeSequenceEnd::CloseBrace);
        For {
            header,
            children,
            scope: crate::scope::ScopeSlot::empty(),
            span: self.span_from(start),
        }
    }

    fn parse_switch(&mut self) -> Switch {
        let start = self.pos;
        self.pos += "switch".len();
        self.skip_ws_no_newline();
        let (subject, _) = self.capture_header_until_brace();
        self.bump(); // '{'
        let mut cases = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            if self.is_eof() {
                break;
            }
            let case_start = self.pos;
            let case_expr = if self.eat_word("default") {
                CaseExpr::Default
            } else if self.eat_word("case") {
                self.skip_ws_no_newline();
                let start = self.pos;
                while !matches!(self.peek(), None | Some(':')) {
                    self.bump();
                }
                let expr = self.src[start..self.pos].trim().to_string();
                CaseExpr::Expr(expr)
            } else {
                // Unrecognized content before the next case/default/closing brace:
                // skip one character to guarantee forward progress.
                self.bump();
                continue;
            };
            if self.peek() == Some(':') {
                self.bump();
            }
            let children = self.parse_node_sequence(NodeSequenceEnd::CaseBoundary);
            cases.push(Case {
                expr: case_expr,
                children,
                scope: crate::scope::ScopeSlot::empty(),
                span: self.span_from(case_start),
            });
        }
        Switch {
            subject,
            cases,
            scope: crate::scope::ScopeSlot::empty(),
            span: self.span_from(start),
        }
    }
}

/// Where a node sequence ends, and how to consume the terminator.
enum NodeSequenceEnd {
    CloseBrace,
    Tag(String),
    CaseBoundary,
}

impl NodeSequenceEnd {
    fn matches(&self, p: &TemplateParser) -> bool {
        match self {
            NodeSequenceEnd::CloseBrace => p.peek() == Some('}'),
            NodeSequenceEnd::Tag(tag) => p.starts_with(tag),
            NodeSequenceEnd::CaseBoundary => {
                p.peek() == Some('}') || p.eat_word_peek("case") || p.eat_word_peek("default")
            }
        }
    }

    fn consume(&self, p: &mut TemplateParser) {
        match self {
            NodeSequenceEnd::CloseBrace => {
                p.bump();
            }
            NodeSequenceEnd::Tag(tag) => {
                p.pos += tag.len();
            }
            NodeSequenceEnd::CaseBoundary => {
                // Don't consume: either a new `case`/`default` starts (handled by the
                // switch loop) or the closing `}` is consumed by the switch loop.
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn parse_param_list(raw: &str) -> Vec<Param> {
    let inner = raw.trim_start_matches('(').trim_end_matches(')');
    split_top_level_commas(inner)
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .map(|entry| {
            let entry = entry.trim();
            match entry.split_once(' ') {
                Some((name, ty)) => Param {
                    name: name.trim().to_string(),
                    type_text: ty.trim().to_string(),
                },
                None => match entry.split_once(':') {
                    Some((name, ty)) => Param {
                        name: name.trim().to_string(),
                        type_text: ty.trim().to_string(),
                    },
                    None => Param {
                        name: entry.to_string(),
                        type_text: String::new(),
                    },
                },
            }
        })
        .collect()
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// Heuristic distinguishing a `{ statement }` (InlineCode) from a `{ expression }`
/// (Interpolation): statements declare or assign, expressions merely compute a value.
fn looks_like_statement(inner: &str) -> bool {
    let trimmed = inner.trim_start();
    trimmed.contains(":=")
        || trimmed.starts_with("let ")
        || trimmed.starts_with("const ")
        || trimmed.starts_with("var ")
        || trimmed.ends_with(';')
}
