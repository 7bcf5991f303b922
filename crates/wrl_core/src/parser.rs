//! Scene text parser.
//!
//! A hand-written recursive-descent parser over a byte range. It produces a
//! [`Document`] arena and nothing else: no header validation, no `USE`
//! resolution. Each rule decides between its alternatives from the next
//! token (saving and restoring the position where it needs to look ahead),
//! so there is never backtracking across more than one rule.
//!
//! # Supported Syntax
//!
//! - optional `#VRML V2.0 utf8` first line (any `#` starts a comment)
//! - `[DEF name] Header { field value ... }`
//! - `TRUE` / `FALSE`
//! - `1`, `-0x1F`, `0.5`, `1e-3` and runs of 2-4 numbers (`1 0 0 1.57`)
//! - `"quoted \"strings\""`
//! - `[1 2 3, 4 5 6]`, `[0, 1, 2, -1]`, `[]` numeric arrays
//! - `[Shape { } USE Wheel]` node arrays
//! - `USE name` in any node position

use std::time::Instant;

use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::model::{Document, Field, FieldValue, Node, NodeId, NodeRef};

/// Nesting depth accepted by [`VrmlParser`] unless overridden.
pub const DEFAULT_MAX_NESTING: usize = 256;

const RESERVED_WORDS: &[&str] = &["DEF", "USE", "TRUE", "FALSE"];
const IDENT_EXCLUDED: &[u8] = b"\"'#+,-.[]\\{}";

/// Errors that can occur while parsing scene text.
///
/// Every offset is absolute within the buffer handed to [`BufferView`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Parse error at line {line}, column {column} (offset {offset}): expected {expected}, found {found}")]
    Grammar {
        offset: usize,
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input at offset {offset}: expected {expected}")]
    UnexpectedEof { offset: usize, expected: String },

    #[error("Invalid number format at offset {offset}: {text}")]
    InvalidNumber { offset: usize, text: String },

    #[error("Invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Invalid buffer range {start}..{end} for a buffer of {len} bytes")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Nesting deeper than {limit} levels at offset {offset}")]
    NestingTooDeep { offset: usize, limit: usize },
}

impl ParseError {
    /// Source offset the error points at, if it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Grammar { offset, .. }
            | ParseError::UnexpectedEof { offset, .. }
            | ParseError::InvalidNumber { offset, .. }
            | ParseError::InvalidUtf8 { offset }
            | ParseError::NestingTooDeep { offset, .. } => Some(*offset),
            ParseError::InvalidRange { .. } => None,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A byte buffer plus the `start..end` range to parse.
///
/// The caller owns the bytes (file read, memory map, ...); the parser only
/// borrows them.
#[derive(Clone, Copy, Debug)]
pub struct BufferView<'a> {
    bytes: &'a [u8],
    start: usize,
    end: usize,
}

impl<'a> BufferView<'a> {
    pub fn new(bytes: &'a [u8], start: usize, end: usize) -> ParseResult<Self> {
        if start > end || end > bytes.len() {
            return Err(ParseError::InvalidRange {
                start,
                end,
                len: bytes.len(),
            });
        }
        Ok(Self { bytes, start, end })
    }

    /// View covering the whole buffer.
    pub fn whole(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            start: 0,
            end: bytes.len(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        &self.bytes[self.start..self.end]
    }
}

impl<'a> From<&'a str> for BufferView<'a> {
    fn from(text: &'a str) -> Self {
        Self::whole(text.as_bytes())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i32),
    Float(f32),
}

impl Number {
    fn as_f32(self) -> f32 {
        match self {
            Number::Int(i) => i as f32,
            Number::Float(f) => f,
        }
    }

    fn is_int(self) -> bool {
        matches!(self, Number::Int(_))
    }
}

fn is_ident_start(b: u8) -> bool {
    b > b' ' && !b.is_ascii_digit() && !IDENT_EXCLUDED.contains(&b)
}

fn is_ident_part(b: u8) -> bool {
    b > b' ' && !IDENT_EXCLUDED.contains(&b)
}

fn is_number_start(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.')
}

fn ends_number(b: u8) -> bool {
    b <= b' ' || b",]}[{#".contains(&b)
}

/// Recursive-descent parser over one [`BufferView`].
pub struct VrmlParser<'a> {
    src: &'a [u8],
    start: usize,
    end: usize,
    pos: usize,
    depth: usize,
    max_depth: usize,
    nodes: Vec<Node>,
}

impl<'a> VrmlParser<'a> {
    pub fn new(view: BufferView<'a>) -> Self {
        Self {
            src: view.bytes,
            start: view.start,
            end: view.end,
            pos: view.start,
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING,
            nodes: Vec::new(),
        }
    }

    pub fn with_max_nesting(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Parse the whole range into a document.
    pub fn parse(mut self) -> ParseResult<Document> {
        let mut roots = Vec::new();
        loop {
            self.skip_ws();
            if self.pos >= self.end {
                break;
            }
            roots.push(self.parse_node()?);
        }
        Ok(Document::new(self.nodes, roots))
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.end {
            Some(self.src[self.pos])
        } else {
            None
        }
    }

    /// Skip whitespace and `#` comments.
    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b <= b' ' {
                self.pos += 1;
            } else if b == b'#' {
                while matches!(self.peek(), Some(c) if c != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn location(&self, offset: usize) -> (usize, usize) {
        let consumed = &self.src[self.start..offset];
        let line = consumed.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        (line, consumed.len() - line_start + 1)
    }

    fn found_token(&self) -> String {
        let rest = &self.src[self.pos..self.end];
        let len = rest
            .iter()
            .take(24)
            .position(|&b| b <= b' ')
            .unwrap_or_else(|| rest.len().min(24))
            .max(1);
        format!("'{}'", String::from_utf8_lossy(&rest[..len]))
    }

    fn expected(&self, what: &str) -> ParseError {
        if self.pos >= self.end {
            return ParseError::UnexpectedEof {
                offset: self.pos,
                expected: what.to_string(),
            };
        }
        let (line, column) = self.location(self.pos);
        ParseError::Grammar {
            offset: self.pos,
            line,
            column,
            expected: what.to_string(),
            found: self.found_token(),
        }
    }

    fn expect_byte(&mut self, byte: u8, what: &str) -> ParseResult<()> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.expected(what))
        }
    }

    /// Consume `keyword` if it is the next whole token.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let kw = keyword.as_bytes();
        let rest = &self.src[self.pos..self.end];
        if !rest.starts_with(kw) {
            return false;
        }
        if rest.get(kw.len()).is_some_and(|&b| is_ident_part(b)) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    fn parse_identifier(&mut self, what: &str) -> ParseResult<String> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(b) if is_ident_start(b) => {}
            _ => return Err(self.expected(what)),
        }
        while matches!(self.peek(), Some(b) if is_ident_part(b)) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ParseError::InvalidUtf8 { offset: start })?;
        if RESERVED_WORDS.contains(&text) {
            self.pos = start;
            return Err(self.expected(what));
        }
        Ok(text.to_string())
    }

    /// `[DEF name] Header { field* }`
    fn parse_node(&mut self) -> ParseResult<NodeId> {
        self.skip_ws();
        let offset = self.pos;
        if self.depth >= self.max_depth {
            return Err(ParseError::NestingTooDeep {
                offset,
                limit: self.max_depth,
            });
        }
        self.depth += 1;

        let binding = if self.eat_keyword("DEF") {
            Some(self.parse_identifier("binding name after DEF")?)
        } else {
            None
        };
        let header = self.parse_identifier("node header")?;
        self.expect_byte(b'{', "'{' after node header")?;

        // Reserve the slot first so ids follow document order.
        let id = self.nodes.len();
        self.nodes.push(Node {
            header,
            binding,
            fields: Vec::new(),
            offset,
        });

        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.expected("'}' closing node")),
                Some(_) => fields.push(self.parse_field()?),
            }
        }
        self.nodes[id].fields = fields;
        self.depth -= 1;
        Ok(id)
    }

    fn parse_field(&mut self) -> ParseResult<Field> {
        let name = self.parse_identifier("field name or '}'")?;
        let value = self.parse_value()?;
        Ok(Field { name, value })
    }

    fn parse_value(&mut self) -> ParseResult<FieldValue> {
        self.skip_ws();
        let Some(b) = self.peek() else {
            return Err(self.expected("field value"));
        };
        match b {
            b'"' => self.parse_string().map(FieldValue::String),
            b'[' => self.parse_array(),
            b if is_number_start(b) => self.parse_scalar(),
            _ if self.eat_keyword("TRUE") => Ok(FieldValue::Bool(true)),
            _ if self.eat_keyword("FALSE") => Ok(FieldValue::Bool(false)),
            _ if self.eat_keyword("USE") => {
                let name = self.parse_identifier("binding name after USE")?;
                Ok(FieldValue::Use(name))
            }
            b if is_ident_start(b) => self.parse_node().map(FieldValue::Node),
            _ => Err(self.expected("field value")),
        }
    }

    fn parse_string(&mut self) -> ParseResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.expected("closing '\"'")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            bytes.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.expected("escaped character")),
                    }
                }
                Some(c) => {
                    bytes.push(c);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8 { offset: start })
    }

    fn parse_number(&mut self) -> ParseResult<Number> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }

        let rest = &self.src[self.pos..self.end];
        if rest.starts_with(b"0x") || rest.starts_with(b"0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = String::from_utf8_lossy(&self.src[digits_start..self.pos]).into_owned();
            self.check_number_end(start)?;
            let value = u32::from_str_radix(&digits, 16).map_err(|_| self.invalid_number(start))?;
            // Hex literals are bit patterns (packed pixels), so wrap into i32.
            let value = value as i32;
            return Ok(Number::Int(if negative { value.wrapping_neg() } else { value }));
        }

        let mut digits = 0;
        let mut is_float = false;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
            digits += 1;
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
                digits += 1;
            }
        }
        if digits > 0 && matches!(self.peek(), Some(b'e' | b'E')) {
            let mut lookahead = self.pos + 1;
            if lookahead < self.end && matches!(self.src[lookahead], b'-' | b'+') {
                lookahead += 1;
            }
            if lookahead < self.end && self.src[lookahead].is_ascii_digit() {
                is_float = true;
                self.pos = lookahead;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        if digits == 0 {
            return Err(self.invalid_number(start));
        }
        self.check_number_end(start)?;

        let text = String::from_utf8_lossy(&self.src[start..self.pos]);
        if is_float {
            text.parse::<f32>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Number::Float)
                .ok_or_else(|| self.invalid_number(start))
        } else {
            text.parse::<i32>()
                .map(Number::Int)
                .map_err(|_| self.invalid_number(start))
        }
    }

    fn check_number_end(&mut self, start: usize) -> ParseResult<()> {
        match self.peek() {
            Some(b) if !ends_number(b) => {
                while matches!(self.peek(), Some(b) if !ends_number(b)) {
                    self.pos += 1;
                }
                Err(self.invalid_number(start))
            }
            _ => Ok(()),
        }
    }

    fn invalid_number(&self, start: usize) -> ParseError {
        let end = self.pos.max(start + 1).min(self.end);
        ParseError::InvalidNumber {
            offset: start,
            text: String::from_utf8_lossy(&self.src[start..end]).into_owned(),
        }
    }

    /// One to four numbers: a scalar or a 2D/3D/4D vector.
    fn parse_scalar(&mut self) -> ParseResult<FieldValue> {
        let mut values = vec![self.parse_number()?];
        while values.len() < 4 {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some(b) if is_number_start(b) => values.push(self.parse_number()?),
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }

        let v: Vec<f32> = values.iter().map(|n| n.as_f32()).collect();
        Ok(match values.len() {
            1 => match values[0] {
                Number::Int(i) => FieldValue::Int32(i),
                Number::Float(f) => FieldValue::Float(f),
            },
            2 => FieldValue::Vec2(Vec2::new(v[0], v[1])),
            3 => FieldValue::Vec3(Vec3::new(v[0], v[1], v[2])),
            _ => FieldValue::Vec4(Vec4::new(v[0], v[1], v[2], v[3])),
        })
    }

    fn parse_array(&mut self) -> ParseResult<FieldValue> {
        let open = self.pos;
        self.pos += 1;
        self.skip_ws();
        match self.peek() {
            Some(b']') => {
                self.pos += 1;
                Ok(FieldValue::Vec3Array(Vec::new()))
            }
            Some(b) if is_number_start(b) => self.parse_numeric_array(open),
            _ => self.parse_node_array(open),
        }
    }

    fn parse_numeric_array(&mut self, open: usize) -> ParseResult<FieldValue> {
        let mut groups: Vec<Vec<Number>> = Vec::new();
        let mut current = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    if !current.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                }
                Some(b) if is_number_start(b) => current.push(self.parse_number()?),
                _ => {
                    return Err(
                        self.expected(&format!("number, ',' or ']' in array opened at offset {}", open))
                    )
                }
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }
        Ok(classify_numeric(groups))
    }

    fn parse_node_array(&mut self, open: usize) -> ParseResult<FieldValue> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => self.pos += 1,
                None => {
                    return Err(self.expected(&format!("']' closing array opened at offset {}", open)))
                }
                Some(_) => {
                    if self.eat_keyword("USE") {
                        let name = self.parse_identifier("binding name after USE")?;
                        items.push(NodeRef::Use(name));
                    } else {
                        items.push(NodeRef::Node(self.parse_node()?));
                    }
                }
            }
        }
        Ok(FieldValue::NodeArray(items))
    }
}

/// Pick an array shape from comma-separated groups of numbers.
///
/// All-integer arrays stay integer arrays whatever their grouping, so large
/// indices keep their exact value. Otherwise uniform groups of three or two
/// become vector arrays and anything else a flat float array. The validator
/// re-chunks numeric arrays when the schema wants a different shape.
fn classify_numeric(groups: Vec<Vec<Number>>) -> FieldValue {
    if groups.is_empty() {
        return FieldValue::Vec3Array(Vec::new());
    }
    if groups.iter().flatten().all(|n| n.is_int()) {
        return FieldValue::Int32Array(
            groups
                .iter()
                .flatten()
                .filter_map(|n| match n {
                    Number::Int(i) => Some(*i),
                    Number::Float(_) => None,
                })
                .collect(),
        );
    }
    if groups.iter().all(|g| g.len() == 3) {
        return FieldValue::Vec3Array(
            groups
                .iter()
                .map(|g| Vec3::new(g[0].as_f32(), g[1].as_f32(), g[2].as_f32()))
                .collect(),
        );
    }
    if groups.iter().all(|g| g.len() == 2) {
        return FieldValue::Vec2Array(
            groups
                .iter()
                .map(|g| Vec2::new(g[0].as_f32(), g[1].as_f32()))
                .collect(),
        );
    }

    FieldValue::FloatArray(groups.iter().flatten().map(|n| n.as_f32()).collect())
}

/// Parse a buffer range into a document.
pub fn parse_buffer(view: BufferView<'_>) -> ParseResult<Document> {
    let started = Instant::now();
    let document = VrmlParser::new(view).parse()?;
    log::info!(
        "Parsed {} bytes into {} nodes ({} roots, {} bindings) in {:.2?}",
        view.len(),
        document.node_count(),
        document.roots().len(),
        document.bindings().len(),
        started.elapsed()
    );
    Ok(document)
}

/// Convenience function to parse scene text.
pub fn parse_str(text: &str) -> ParseResult<Document> {
    parse_buffer(BufferView::from(text))
}
