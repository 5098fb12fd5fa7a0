//! Source-Position Mapper
//!
//! A [`SourceMap`] is an ordered list of segments, each sending a byte range of
//! generated text to an equally long range of one source text. Probe code is
//! rebuilt in revisions; every revision's map points its unchanged prefix at
//! the previous revision and its new text at the markup. [`SourceMap::merge_with`]
//! composes two maps, so a position in the last revision can be traced back to
//! the markup in one lookup.

use serde::Serialize;

use crate::location::LineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mapping {
    /// Half-open byte range in the generated text.
    pub generated: (u32, u32),
    pub source: usize,
    /// Byte offset in the source that `generated.0` corresponds to.
    pub original: u32,
    pub name: Option<usize>,
}

impl Mapping {
    fn len(&self) -> u32 {
        self.generated.1 - self.generated.0
    }
}

/// Result of translating one generated offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    pub source: usize,
    pub offset: u32,
    /// False when the offset fell between segments and the start of the
    /// preceding segment was used instead.
    pub exact: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceMap {
    pub file: String,
    sources: Vec<String>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMap {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Self::default()
        }
    }

    pub fn add_source(&mut self, name: &str) -> usize {
        if let Some(index) = self.sources.iter().position(|source| source == name) {
            return index;
        }
        self.sources.push(name.to_string());
        self.sources.len() - 1
    }

    fn add_name(&mut self, name: &str) -> usize {
        if let Some(index) = self.names.iter().position(|existing| existing == name) {
            return index;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    /// Maps `generated` onto the source range starting at `original`.
    /// Mappings must be added in generated order without overlap; empty
    /// ranges are ignored.
    pub fn add_mapping(
        &mut self,
        generated: (u32, u32),
        source: usize,
        original: u32,
        name: Option<&str>,
    ) {
        if generated.1 <= generated.0 {
            return;
        }
        debug_assert!(self
            .mappings
            .last()
            .map_or(true, |last| last.generated.1 <= generated.0));
        let name = name.map(|name| self.add_name(name));
        self.mappings.push(Mapping {
            generated,
            source,
            original,
            name,
        });
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|source| source == name)
    }

    /// Translates a generated offset. Offsets between segments fall back to
    /// the start of the preceding segment; offsets before the first segment
    /// have no mapping.
    pub fn translate(&self, offset: u32) -> Option<Mapped> {
        let index = self
            .mappings
            .partition_point(|mapping| mapping.generated.0 <= offset);
        let mapping = self.mappings.get(index.checked_sub(1)?)?;
        if offset < mapping.generated.1 {
            Some(Mapped {
                source: mapping.source,
                offset: mapping.original + (offset - mapping.generated.0),
                exact: true,
            })
        } else {
            Some(Mapped {
                source: mapping.source,
                offset: mapping.original,
                exact: false,
            })
        }
    }

    /// Composes `self` with the map of the text it was generated from.
    ///
    /// Segments of `self` whose source is `previous.file` are rewritten to
    /// point where `previous` points; parts of them that `previous` leaves
    /// unmapped are dropped. Other segments are kept as they are.
    pub fn merge_with(&self, previous: &SourceMap) -> SourceMap {
        let mut merged = SourceMap::new(&self.file);
        let through = self.source_index(&previous.file);

        for mapping in &self.mappings {
            if Some(mapping.source) != through {
                let source = merged.add_source(&self.sources[mapping.source]);
                let name = mapping.name.map(|name| self.names[name].as_str());
                merged.add_mapping(mapping.generated, source, mapping.original, name);
                continue;
            }

            let start = mapping.original;
            let end = mapping.original + mapping.len();
            let first = previous
                .mappings
                .partition_point(|segment| segment.generated.1 <= start);
            for segment in &previous.mappings[first..] {
                if segment.generated.0 >= end {
                    break;
                }
                let overlap_start = start.max(segment.generated.0);
                let overlap_end = end.min(segment.generated.1);
                let source = merged.add_source(&previous.sources[segment.source]);
                let name = segment.name.map(|name| previous.names[name].as_str());
                merged.add_mapping(
                    (
                        mapping.generated.0 + (overlap_start - start),
                        mapping.generated.0 + (overlap_end - start),
                    ),
                    source,
                    segment.original + (overlap_start - segment.generated.0),
                    name,
                );
            }
        }
        merged
    }

    /// Source Map v3 rendering. `generated` is the text this map describes;
    /// `sources` holds the text of each source, in source-index order.
    pub fn to_v3(&self, generated: &str, sources: &[&str]) -> SourceMapV3 {
        let generated_index = LineIndex::new(generated);
        let source_indices: Vec<LineIndex> =
            sources.iter().map(|text| LineIndex::new(text)).collect();

        let mut encoder = MappingsEncoder::default();
        for mapping in &self.mappings {
            let Some(source_index) = source_indices.get(mapping.source) else {
                continue;
            };
            let range = mapping.generated.0 as usize..mapping.generated.1 as usize;
            let Some(body) = generated.get(range) else {
                continue;
            };
            let mut points = vec![mapping.generated.0];
            points.extend(
                body.match_indices('\n')
                    .map(|(index, _)| mapping.generated.0 + index as u32 + 1)
                    .filter(|point| *point < mapping.generated.1),
            );
            for (nth, point) in points.into_iter().enumerate() {
                let (line, column) = generated_index.line_column(point);
                let original = mapping.original + (point - mapping.generated.0);
                let (original_line, original_column) = source_index.line_column(original);
                encoder.segment(
                    line - 1,
                    column,
                    Some((mapping.source, original_line - 1, original_column)),
                    if nth == 0 { mapping.name } else { None },
                );
            }
            let (line, column) = generated_index.line_column(mapping.generated.1);
            encoder.segment(line - 1, column, None, None);
        }

        SourceMapV3 {
            version: 3,
            file: self.file.clone(),
            sources: self.sources.clone(),
            names: self.names.clone(),
            mappings: encoder.finish(),
        }
    }
}

/// Applies a list of revision maps one after another, newest first.
///
/// Equivalent to translating through the maps merged with
/// [`SourceMap::merge_with`]; kept for checking merged maps against.
#[derive(Debug, Clone, Default)]
pub struct PositionChain {
    maps: Vec<SourceMap>,
}

impl PositionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the map of the next revision.
    pub fn push(&mut self, map: SourceMap) {
        self.maps.push(map);
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Translates an offset in the newest revision. Returns the final source
    /// name with the offset, or `None` if some step has no mapping.
    pub fn translate(&self, offset: u32) -> Option<(String, Mapped)> {
        let mut maps = self.maps.iter().rev().peekable();
        let mut map = maps.next()?;
        let mut mapped = map.translate(offset)?;
        let mut exact = mapped.exact;
        while let Some(previous) = maps.peek() {
            if map.sources[mapped.source] != previous.file {
                break;
            }
            map = maps.next()?;
            mapped = map.translate(mapped.offset)?;
            exact &= mapped.exact;
        }
        Some((
            map.sources[mapped.source].clone(),
            Mapped { exact, ..mapped },
        ))
    }

    /// The whole chain as one map.
    pub fn merged(&self) -> Option<SourceMap> {
        let mut maps = self.maps.iter();
        let first = maps.next()?.clone();
        Some(maps.fold(first, |merged, next| next.merge_with(&merged)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE MAP V3
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMapV3 {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMapV3 {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Default)]
struct MappingsEncoder {
    out: String,
    line: u32,
    column: i64,
    source: i64,
    original_line: i64,
    original_column: i64,
    name: i64,
    line_has_segment: bool,
}

impl MappingsEncoder {
    fn segment(
        &mut self,
        line: u32,
        column: u32,
        original: Option<(usize, u32, u32)>,
        name: Option<usize>,
    ) {
        while self.line < line {
            self.out.push(';');
            self.line += 1;
            self.column = 0;
            self.line_has_segment = false;
        }
        if self.line_has_segment {
            self.out.push(',');
        }
        self.line_has_segment = true;

        encode_vlq(&mut self.out, column as i64 - self.column);
        self.column = column as i64;
        if let Some((source, original_line, original_column)) = original {
            encode_vlq(&mut self.out, source as i64 - self.source);
            encode_vlq(&mut self.out, original_line as i64 - self.original_line);
            encode_vlq(&mut self.out, original_column as i64 - self.original_column);
            self.source = source as i64;
            self.original_line = original_line as i64;
            self.original_column = original_column as i64;
            if let Some(name) = name {
                encode_vlq(&mut self.out, name as i64 - self.name);
                self.name = name as i64;
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_vlq(out: &mut String, value: i64) {
    let signed = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    let mut vlq = signed as u64;
    loop {
        let mut digit = (vlq & 0b11111) as u8;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
