//! Markup Lexer
//!
//! Turns HTML or XML view markup into a flat token stream: element start/end/empty
//! tokens carrying raw binding payloads, plus the directive comments that steer
//! type checking (`ko-import`, `ko-viewmodel`, `ko-context`, `ko-lint-*`) and
//! Knockout virtual elements (`<!-- ko … -->` / `<!-- /ko -->`).
//!
//! The dialect is XML iff the document opens with an XML declaration. In HTML
//! mode the void elements (`<img>`, `<br>`, ...) are normalized to empty tokens.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::location::{LineIndex, Location};

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("area");
        s.insert("base");
        s.insert("br");
        s.insert("col");
        s.insert("embed");
        s.insert("hr");
        s.insert("iframe");
        s.insert("img");
        s.insert("input");
        s.insert("link");
        s.insert("meta");
        s.insert("param");
        s.insert("source");
        s.insert("track");
        s.insert("wbr");
        s.insert("command");
        s.insert("keygen");
        s.insert("menuitem");
        s
    };

    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*").unwrap();
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_:.\-]*").unwrap();
    static ref XML_DECLARATION_RE: Regex = Regex::new(r"^\s*<\?xml[\s?]").unwrap();
}

pub const DEFAULT_BINDING_ATTRIBUTE: &str = "data-bind";
pub const VIRTUAL_ELEMENT_TAG: &str = "ko";

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeType {
    Start,
    End,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dialect {
    Html,
    Xml,
}

/// Raw, unparsed text of one binding attribute (or virtual element comment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingData {
    pub location: Location,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identifier {
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementToken {
    pub tag: String,
    pub node_type: NodeType,
    pub location: Location,
    pub bindings: Vec<BindingData>,
    /// `<!-- ko … -->` / `<!-- /ko -->`
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSymbol {
    pub name: Identifier,
    pub alias: Identifier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDirective {
    pub location: Location,
    pub symbols: Vec<ImportSymbol>,
    pub module_path: Identifier,
}

impl ImportDirective {
    pub fn is_namespace(&self) -> bool {
        self.symbols.len() == 1 && self.symbols[0].name.value == "*"
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|symbol| symbol.alias.value.as_str())
    }
}

/// `typeof vm` (a value whose type is taken) or `ViewModel` (a type name).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeReference {
    pub name: Identifier,
    pub is_type: bool,
}

impl TypeReference {
    /// First path segment, e.g. `vm` for `typeof vm.child`.
    pub fn root_name(&self) -> &str {
        let value = self.name.value.as_str();
        let end = value.find(['.', '<']).unwrap_or(value.len());
        &value[..end]
    }

    pub fn type_text(&self) -> String {
        if self.is_type {
            self.name.value.clone()
        } else {
            format!("typeof {}", self.name.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Directive {
    Import(ImportDirective),
    ViewModel {
        location: Location,
        type_ref: TypeReference,
    },
    Context {
        location: Location,
        type_ref: TypeReference,
    },
    Diagnostics {
        location: Location,
        keys: Vec<String>,
        enable: bool,
    },
}

impl Directive {
    pub fn location(&self) -> &Location {
        match self {
            Directive::Import(import) => &import.location,
            Directive::ViewModel { location, .. }
            | Directive::Context { location, .. }
            | Directive::Diagnostics { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Token {
    Element(ElementToken),
    Directive(Directive),
}

impl Token {
    pub fn location(&self) -> &Location {
        match self {
            Token::Element(element) => &element.location,
            Token::Directive(directive) => directive.location(),
        }
    }

    pub fn as_element(&self) -> Option<&ElementToken> {
        match self {
            Token::Element(element) => Some(element),
            Token::Directive(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LexerOptions {
    /// Attribute names whose values are binding payloads.
    pub binding_attributes: Vec<String>,
    pub force_xml: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            binding_attributes: vec![DEFAULT_BINDING_ATTRIBUTE.to_string()],
            force_xml: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    pub dialect: Dialect,
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

pub fn detect_dialect(text: &str, force_xml: bool) -> Dialect {
    if force_xml || XML_DECLARATION_RE.is_match(text) {
        Dialect::Xml
    } else {
        Dialect::Html
    }
}

/// Tokenizes one view. A malformed construct aborts with a `parser-error`
/// diagnostic that names what was expected and what was found.
pub fn tokenize(
    file_path: &str,
    text: &str,
    options: &LexerOptions,
) -> Result<Tokenized, Diagnostic> {
    let text = strip_bom(text);
    let dialect = detect_dialect(text, options.force_xml);
    let mut lexer = Lexer {
        file_path,
        text,
        bytes: text.as_bytes(),
        pos: 0,
        index: LineIndex::new(text),
        dialect,
        binding_attributes: &options.binding_attributes,
        tokens: Vec::new(),
    };
    lexer.run()?;

    let mut tokens = lexer.tokens;
    if dialect == Dialect::Html {
        normalize_void_elements(&mut tokens);
    }
    tracing::trace!(file = file_path, count = tokens.len(), ?dialect, "tokenized view");
    Ok(Tokenized { tokens, dialect })
}

/// Turns HTML void elements into empty tokens and removes their optional end
/// tags. Running it twice is the same as running it once.
pub fn normalize_void_elements(tokens: &mut Vec<Token>) {
    for pos in (0..tokens.len()).rev() {
        let Token::Element(element) = &mut tokens[pos] else {
            continue;
        };
        if element.is_virtual || !VOID_ELEMENTS.contains(element.tag.as_str()) {
            continue;
        }
        match element.node_type {
            NodeType::Start => element.node_type = NodeType::Empty,
            NodeType::End => {
                tokens.remove(pos);
            }
            NodeType::Empty => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

struct Lexer<'a> {
    file_path: &'a str,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    index: LineIndex,
    dialect: Dialect,
    binding_attributes: &'a [String],
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<(), Diagnostic> {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] != b'<' {
                self.pos = self.text[self.pos..]
                    .find('<')
                    .map(|found| self.pos + found)
                    .unwrap_or(self.bytes.len());
                continue;
            }
            let rest = &self.text[self.pos..];
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("<![CDATA[") {
                self.skip_past("]]>", "\"]]>\"", "unterminated CDATA section")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">", "\">\"", "unterminated declaration")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "\"?>\"", "unterminated processing instruction")?;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                self.start_tag()?;
            } else {
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn error(&self, at: usize, expected: &str, kind: &str) -> Diagnostic {
        let found = self.text[at.min(self.text.len())..]
            .chars()
            .next()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "end of input".to_string());
        let end = (at + found.len()).min(self.text.len());
        let location = self.index.location(at as u32, end as u32);
        Diagnostic::new(
            DiagnosticKind::ParserError,
            self.file_path,
            Some(location),
            &[expected, &found, kind],
        )
    }

    fn skip_past(&mut self, terminator: &str, expected: &str, kind: &str) -> Result<(), Diagnostic> {
        match self.text[self.pos..].find(terminator) {
            Some(found) => {
                self.pos += found + terminator.len();
                Ok(())
            }
            None => Err(self.error(self.text.len(), expected, kind)),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn tag_name(&mut self) -> Option<String> {
        let found = TAG_NAME_RE.find(&self.text[self.pos..])?;
        self.pos += found.end();
        let name = found.as_str();
        Some(match self.dialect {
            Dialect::Html => name.to_ascii_lowercase(),
            Dialect::Xml => name.to_string(),
        })
    }

    fn is_binding_attribute(&self, name: &str) -> bool {
        self.binding_attributes.iter().any(|attr| match self.dialect {
            Dialect::Html => attr.eq_ignore_ascii_case(name),
            Dialect::Xml => attr == name,
        })
    }

    fn end_tag(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        self.pos += 2;
        let Some(tag) = self.tag_name() else {
            return Err(self.error(self.pos, "tag name", "end tag"));
        };
        self.skip_whitespace();
        if self.bytes.get(self.pos) != Some(&b'>') {
            return Err(self.error(self.pos, "\">\"", "end tag"));
        }
        self.pos += 1;
        self.push_element(tag, NodeType::End, start, Vec::new(), false);
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        self.pos += 1;
        let Some(tag) = self.tag_name() else {
            return Err(self.error(self.pos, "tag name", "start tag"));
        };
        let mut bindings = Vec::new();

        let node_type = loop {
            self.skip_whitespace();
            let rest = &self.text[self.pos..];
            if rest.is_empty() {
                return Err(self.error(self.pos, "\">\"", "unterminated start tag"));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break NodeType::Empty;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break NodeType::Start;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            if rest.starts_with(['"', '\'', '=']) {
                return Err(self.error(self.pos, "attribute name", "start tag"));
            }

            let name_start = self.pos;
            while self.pos < self.bytes.len()
                && !matches!(self.bytes[self.pos], b'=' | b'>' | b'/' | b'"' | b'\'')
                && !self.bytes[self.pos].is_ascii_whitespace()
            {
                self.pos += 1;
            }
            let name = &self.text[name_start..self.pos];

            self.skip_whitespace();
            if self.bytes.get(self.pos) != Some(&b'=') {
                continue;
            }
            self.pos += 1;
            self.skip_whitespace();

            let (value_start, value_end) = match self.bytes.get(self.pos) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = self.pos + 1;
                    let Some(len) = self.text[value_start..].find(quote as char) else {
                        return Err(self.error(
                            self.text.len(),
                            &format!("{}", quote as char),
                            "unterminated attribute value",
                        ));
                    };
                    self.pos = value_start + len + 1;
                    (value_start, value_start + len)
                }
                Some(_) => {
                    let value_start = self.pos;
                    while self.pos < self.bytes.len()
                        && self.bytes[self.pos] != b'>'
                        && !self.bytes[self.pos].is_ascii_whitespace()
                    {
                        self.pos += 1;
                    }
                    (value_start, self.pos)
                }
                None => return Err(self.error(self.pos, "attribute value", "start tag")),
            };

            if self.is_binding_attribute(name) {
                bindings.push(BindingData {
                    location: self.index.location(value_start as u32, value_end as u32),
                    text: self.text[value_start..value_end].to_string(),
                });
            }
        };

        let raw_text = self.dialect == Dialect::Html
            && node_type == NodeType::Start
            && (tag == "script" || tag == "style");
        self.push_element(tag.clone(), node_type, start, bindings, false);

        if raw_text {
            let closing = format!("</{}", tag);
            let lowered = self.text[self.pos..].to_ascii_lowercase();
            self.pos = lowered
                .find(&closing)
                .map(|found| self.pos + found)
                .unwrap_or(self.bytes.len());
        }
        Ok(())
    }

    fn push_element(
        &mut self,
        tag: String,
        node_type: NodeType,
        start: usize,
        bindings: Vec<BindingData>,
        is_virtual: bool,
    ) {
        self.tokens.push(Token::Element(ElementToken {
            tag,
            node_type,
            location: self.index.location(start as u32, self.pos as u32),
            bindings,
            is_virtual,
        }));
    }

    fn comment(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        let content_start = start + 4;
        let Some(len) = self.text[content_start..].find("-->") else {
            return Err(self.error(self.text.len(), "\"-->\"", "unterminated comment"));
        };
        let content_end = content_start + len;
        self.pos = content_end + 3;

        let content = &self.text[content_start..content_end];
        let trimmed = content.trim_start();
        let lead = content_start + (content.len() - trimmed.len());
        let trimmed = trimmed.trim_end();
        let directive_end = lead + trimmed.len();

        if let Some(rest) = keyword_rest(trimmed, "/ko") {
            if rest.trim().is_empty() {
                self.push_element(
                    VIRTUAL_ELEMENT_TAG.to_string(),
                    NodeType::End,
                    start,
                    Vec::new(),
                    true,
                );
            }
            return Ok(());
        }

        let word_end = trimmed
            .find(|c: char| c.is_whitespace())
            .unwrap_or(trimmed.len());
        let word = &trimmed[..word_end];
        let mut cursor = Cursor {
            lexer: self,
            pos: lead + word_end,
            end: directive_end,
        };

        let token = match word {
            VIRTUAL_ELEMENT_TAG => Some(cursor.virtual_element(start)?),
            "ko-import" => Some(Token::Directive(Directive::Import(cursor.import(lead)?))),
            "ko-viewmodel" => {
                let type_ref = cursor.type_reference()?;
                Some(Token::Directive(Directive::ViewModel {
                    location: cursor.location(lead, directive_end),
                    type_ref,
                }))
            }
            "ko-context" => {
                let type_ref = cursor.type_reference()?;
                Some(Token::Directive(Directive::Context {
                    location: cursor.location(lead, directive_end),
                    type_ref,
                }))
            }
            "ko-lint-disable" | "ko-lint-enable" => {
                let keys = cursor.remaining_keys();
                Some(Token::Directive(Directive::Diagnostics {
                    location: cursor.location(lead, directive_end),
                    keys,
                    enable: word == "ko-lint-enable",
                }))
            }
            _ => None,
        };
        if let Some(token) = token {
            self.tokens.push(token);
        }
        Ok(())
    }
}

fn keyword_rest<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE GRAMMAR
// ═══════════════════════════════════════════════════════════════════════════════

/// Cursor over the body of one directive comment, bounded by `end`.
struct Cursor<'l, 'a> {
    lexer: &'l Lexer<'a>,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'_, 'a> {
    /// Unread directive text. Borrows the source, not the cursor.
    fn rest(&self) -> &'a str {
        let text: &'a str = self.lexer.text;
        &text[self.pos..self.end]
    }

    fn location(&self, start: usize, end: usize) -> Location {
        self.lexer.index.location(start as u32, end as u32)
    }

    fn error(&self, expected: &str) -> Diagnostic {
        if self.pos >= self.end {
            let location = self.location(self.end, self.end);
            return Diagnostic::new(
                DiagnosticKind::ParserError,
                self.lexer.file_path,
                Some(location),
                &[expected, "end of directive", "directive"],
            );
        }
        self.lexer.error(self.pos, expected, "directive")
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.end
    }

    fn eat(&mut self, punct: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(punct) {
            self.pos += punct.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), Diagnostic> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(&format!("\"{}\"", punct)))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        match IDENT_RE.find(self.rest()) {
            Some(found) if found.as_str() == keyword => {
                self.pos += found.end();
                true
            }
            _ => false,
        }
    }

    fn identifier(&mut self) -> Result<Identifier, Diagnostic> {
        self.skip_whitespace();
        let Some(found) = IDENT_RE.find(self.rest()) else {
            return Err(self.error("identifier"));
        };
        let start = self.pos;
        self.pos += found.end();
        Ok(Identifier {
            value: found.as_str().to_string(),
            location: self.location(start, self.pos),
        })
    }

    /// Quoted module path; the location covers the text between the quotes.
    fn string_literal(&mut self) -> Result<Identifier, Diagnostic> {
        self.skip_whitespace();
        let quote = match self.rest().chars().next() {
            Some(c @ ('"' | '\'')) => c,
            _ => return Err(self.error("string")),
        };
        let value_start = self.pos + 1;
        let Some(len) = self.lexer.text[value_start..self.end].find(quote) else {
            self.pos = self.end;
            return Err(self.error(&quote.to_string()));
        };
        self.pos = value_start + len + 1;
        Ok(Identifier {
            value: self.lexer.text[value_start..value_start + len].to_string(),
            location: self.location(value_start, value_start + len),
        })
    }

    fn import(&mut self, lead: usize) -> Result<ImportDirective, Diagnostic> {
        let mut symbols = Vec::new();
        self.skip_whitespace();
        if self.rest().starts_with('*') {
            let star = Identifier {
                value: "*".to_string(),
                location: self.location(self.pos, self.pos + 1),
            };
            self.pos += 1;
            if !self.eat_keyword("as") {
                return Err(self.error("\"as\""));
            }
            let alias = self.identifier()?;
            symbols.push(ImportSymbol { name: star, alias });
        } else if self.rest().starts_with('{') {
            self.named_imports(&mut symbols)?;
        } else {
            let alias = self.identifier()?;
            let name = Identifier {
                value: "default".to_string(),
                location: alias.location,
            };
            symbols.push(ImportSymbol { name, alias });
            if self.eat(",") {
                self.named_imports(&mut symbols)?;
            }
        }

        if !self.eat_keyword("from") {
            return Err(self.error("\"from\""));
        }
        let module_path = self.string_literal()?;
        if !self.at_end() {
            return Err(self.error("end of directive"));
        }
        Ok(ImportDirective {
            location: self.location(lead, self.end),
            symbols,
            module_path,
        })
    }

    fn named_imports(&mut self, symbols: &mut Vec<ImportSymbol>) -> Result<(), Diagnostic> {
        self.expect("{")?;
        loop {
            if self.eat("}") {
                return Ok(());
            }
            let name = self.identifier()?;
            let alias = if self.eat_keyword("as") {
                self.identifier()?
            } else {
                name.clone()
            };
            symbols.push(ImportSymbol { name, alias });
            if !self.eat(",") {
                return self.expect("}");
            }
        }
    }

    /// `typeof a.b.c` or `Type.Path<Args>`.
    fn type_reference(&mut self) -> Result<TypeReference, Diagnostic> {
        let is_type = !self.eat_keyword("typeof");
        self.skip_whitespace();
        let start = self.pos;
        self.identifier()?;
        while self.rest().starts_with('.') {
            self.pos += 1;
            self.identifier()?;
        }
        if is_type && self.rest().starts_with('<') {
            let mut depth = 0usize;
            let rest_len = self.rest().len();
            let mut consumed = None;
            for (index, c) in self.rest().char_indices() {
                match c {
                    '<' => depth += 1,
                    '>' => {
                        depth -= 1;
                        if depth == 0 {
                            consumed = Some(index + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            match consumed {
                Some(len) => self.pos += len,
                None => {
                    self.pos += rest_len;
                    return Err(self.error("\">\""));
                }
            }
        }
        let end = self.pos;
        if !self.at_end() {
            return Err(self.error("end of directive"));
        }
        Ok(TypeReference {
            name: Identifier {
                value: self.lexer.text[start..end].to_string(),
                location: self.location(start, end),
            },
            is_type,
        })
    }

    fn remaining_keys(&mut self) -> Vec<String> {
        let keys = self
            .rest()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        self.pos = self.end;
        keys
    }

    /// `<!-- ko handler: value -->`
    fn virtual_element(&mut self, comment_start: usize) -> Result<Token, Diagnostic> {
        self.skip_whitespace();
        if self.pos >= self.end {
            return Err(self.error("binding"));
        }
        let binding = BindingData {
            location: self.location(self.pos, self.end),
            text: self.rest().to_string(),
        };
        Ok(Token::Element(ElementToken {
            tag: VIRTUAL_ELEMENT_TAG.to_string(),
            node_type: NodeType::Start,
            location: self.location(comment_start, self.lexer.pos),
            bindings: vec![binding],
            is_virtual: true,
        }))
    }
}
