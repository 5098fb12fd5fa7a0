//! Source locations for markup and probe code.
//!
//! Every location carries a half-open byte range plus a line/column pair for
//! each end. Lines are 1-based, columns are 0-based and counted in characters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
    pub range: (u32, u32),
}

impl Location {
    pub fn start(&self) -> u32 {
        self.range.0
    }

    pub fn end(&self) -> u32 {
        self.range.1
    }

    pub fn len(&self) -> u32 {
        self.range.1.saturating_sub(self.range.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Location of `text[start..end]`, where `text` begins at `self`.
    ///
    /// Lines and columns are counted inside `text` only, so callers never need
    /// the surrounding document.
    pub fn relative(&self, text: &str, start: usize, end: usize) -> Location {
        let (start_line, start_column) = self.advance(text, start);
        let (end_line, end_column) = self.advance(text, end);
        Location {
            first_line: start_line,
            first_column: start_column,
            last_line: end_line,
            last_column: end_column,
            range: (self.range.0 + start as u32, self.range.0 + end as u32),
        }
    }

    fn advance(&self, text: &str, offset: usize) -> (u32, u32) {
        let offset = clamp_to_char_boundary(text, offset);
        let prefix = &text[..offset];
        match prefix.rfind('\n') {
            Some(last_newline) => {
                let lines = prefix.matches('\n').count() as u32;
                let column = prefix[last_newline + 1..].chars().count() as u32;
                (self.first_line + lines, column)
            }
            None => (
                self.first_line,
                self.first_column + prefix.chars().count() as u32,
            ),
        }
    }
}

fn clamp_to_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Byte offset to line/column lookup for one text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    text: String,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (index, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(index as u32 + 1);
            }
        }
        Self {
            line_starts,
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// (1-based line, 0-based character column) of a byte offset.
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let offset = clamp_to_char_boundary(&self.text, offset as usize);
        let line = match self.line_starts.binary_search(&(offset as u32)) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line] as usize;
        let column = self.text[line_start..offset].chars().count() as u32;
        (line as u32 + 1, column)
    }

    pub fn location(&self, start: u32, end: u32) -> Location {
        let (first_line, first_column) = self.line_column(start);
        let (last_line, last_column) = self.line_column(end);
        Location {
            first_line,
            first_column,
            last_line,
            last_column,
            range: (start, end),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
