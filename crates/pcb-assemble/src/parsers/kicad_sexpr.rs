//! S-expression reader and writer for KiCad files.
//!
//! Grammar:
//!   sexpr  = '(' atom_or_sexpr* ')'
//!   atom   = string | number | symbol
//!   string = '"' [^"]* '"'  (with escape handling)
//!   number = [-]?[0-9]+[.[0-9]*]?
//!   symbol = [^ \t\n\r()"]+
//!
//! Quoted strings are kept apart from bare symbols so that a parsed tree can
//! be written back without changing its quoting.
use std::fmt::Write;

use crate::types::fmt_mm;

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    List(Vec<SExpr>),
    /// Bare symbol or number.
    Atom(String),
    /// Quoted string.
    Str(String),
}

impl SExpr {
    /// Start a list with the given tag.
    pub fn list(tag: &str) -> Self {
        SExpr::List(vec![SExpr::Atom(tag.to_string())])
    }

    pub fn sym(s: impl Into<String>) -> Self {
        SExpr::Atom(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExpr::Str(s.into())
    }

    pub fn num(v: f64) -> Self {
        SExpr::Atom(fmt_mm(v))
    }

    /// Append a child (builder style).
    pub fn with(mut self, child: SExpr) -> Self {
        if let SExpr::List(items) = &mut self {
            items.push(child);
        }
        self
    }

    /// Append a child in place.
    pub fn push(&mut self, child: SExpr) {
        if let SExpr::List(items) = self {
            items.push(child);
        }
    }

    /// `(tag v1 v2 ...)` with numeric values.
    pub fn nums(tag: &str, values: &[f64]) -> Self {
        values
            .iter()
            .fold(SExpr::list(tag), |node, v| node.with(SExpr::num(*v)))
    }

    /// `(tag "value")`.
    pub fn tagged_str(tag: &str, value: &str) -> Self {
        SExpr::list(tag).with(SExpr::string(value))
    }

    /// `(tag symbol)`.
    pub fn tagged_sym(tag: &str, value: &str) -> Self {
        SExpr::list(tag).with(SExpr::sym(value))
    }

    /// Get the first atom in a list (the "tag" or "name").
    pub fn tag(&self) -> Option<&str> {
        match self {
            SExpr::List(items) => items.first().and_then(|item| match item {
                SExpr::Atom(s) => Some(s.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Get list children (everything after the tag).
    pub fn children(&self) -> &[SExpr] {
        match self {
            SExpr::List(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// Find a child list with the given tag.
    pub fn find(&self, tag: &str) -> Option<&SExpr> {
        self.children().iter().find(|c| c.tag() == Some(tag))
    }

    /// Find all child lists with the given tag.
    pub fn find_all(&self, tag: &str) -> Vec<&SExpr> {
        self.children()
            .iter()
            .filter(|c| c.tag() == Some(tag))
            .collect()
    }

    /// Get the value of a simple (tag value) node.
    pub fn value(&self, tag: &str) -> Option<&str> {
        self.find(tag)
            .and_then(|node| node.children().first().and_then(|v| v.as_atom()))
    }

    /// Get the atom value, quoted or bare.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(s) | SExpr::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Parse a float from a simple (tag value) node.
    pub fn value_f64(&self, tag: &str) -> Option<f64> {
        self.value(tag).and_then(|v| v.parse().ok())
    }

    /// Get the nth atom child (0-indexed from children, i.e., after the tag).
    pub fn atom_at(&self, index: usize) -> Option<&str> {
        self.children().get(index).and_then(|v| v.as_atom())
    }

    /// Get the nth child as f64.
    pub fn f64_at(&self, index: usize) -> Option<f64> {
        self.atom_at(index).and_then(|v| v.parse().ok())
    }

    /// True if a bare symbol with this name is among the children, e.g. `hide`.
    pub fn has_symbol(&self, name: &str) -> bool {
        self.children()
            .iter()
            .any(|c| matches!(c, SExpr::Atom(s) if s == name))
    }

    /// Render in KiCad's layout: a list holding only atoms stays on one line,
    /// otherwise every child from the first nested list onwards gets its own
    /// indented line.
    pub fn to_pretty(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self, 0);
        out.push('\n');
        out
    }
}

fn write_atom(out: &mut String, node: &SExpr) {
    match node {
        SExpr::Atom(s) => out.push_str(s),
        SExpr::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
        SExpr::List(_) => {}
    }
}

fn write_node(out: &mut String, node: &SExpr, depth: usize) {
    let items = match node {
        SExpr::List(items) => items,
        atom => return write_atom(out, atom),
    };
    out.push('(');
    let nested = items.iter().any(|i| matches!(i, SExpr::List(_)));
    // Once the first nested list is written, every later child gets its own line.
    let mut broken = false;
    for (i, item) in items.iter().enumerate() {
        if nested && (broken || matches!(item, SExpr::List(_))) {
            broken = true;
            newline(out, depth + 1);
        } else if i > 0 {
            out.push(' ');
        }
        write_node(out, item, depth + 1);
    }
    if nested {
        newline(out, depth);
    }
    out.push(')');
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    let _ = write!(out, "{:width$}", "", width = depth * 2);
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn parse_string(&mut self) -> String {
        // Skip opening quote
        self.pos += 1;
        let mut bytes = Vec::new();
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    if let Some(&escaped) = self.input.get(self.pos) {
                        bytes.push(match escaped {
                            b'n' => b'\n',
                            b't' => b'\t',
                            other => other,
                        });
                        self.pos += 1;
                    }
                }
                b => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn parse_symbol(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' | b'(' | b')' | b'"' => break,
                _ => self.pos += 1,
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn parse_sexpr(&mut self) -> Option<SExpr> {
        self.skip_whitespace();
        match self.peek()? {
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    match self.peek() {
                        Some(b')') => {
                            self.pos += 1;
                            break;
                        }
                        None => break,
                        _ => {
                            if let Some(expr) = self.parse_sexpr() {
                                items.push(expr);
                            }
                        }
                    }
                }
                Some(SExpr::List(items))
            }
            b'"' => Some(SExpr::Str(self.parse_string())),
            b')' => None,
            _ => Some(SExpr::Atom(self.parse_symbol())),
        }
    }
}

/// Parse an S-expression from bytes.
pub fn parse(input: &[u8]) -> Result<SExpr, String> {
    let mut parser = Parser::new(input);
    parser
        .parse_sexpr()
        .ok_or_else(|| "empty input".to_string())
}
