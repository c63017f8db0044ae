//! Reader and writer for saved mapping files.
//!
//! The reader accepts one known shape and nothing more:
//!
//! ```text
//! document := ws object ws
//! object   := '{' ws ( member ( ws ',' ws member )* )? ws '}'
//! member   := string ws ':' ws value
//! value    := string | array | object | scalar
//! array    := '[' ws ( value ( ws ',' ws value )* )? ws ']'
//! scalar   := [A-Za-z0-9.+-]+
//! ```
//!
//! Only `unity_path`, `source_path` (strings) and `mappings` (array of
//! `[incorrect, correct]` string pairs) are interpreted. A broken `mappings` element is dropped by
//! skipping to its closing `]`; the rest of the file still loads.

use crate::MappingPlan;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Raw content of a mapping file before path sanitization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredMappings {
    pub unity_path: Option<String>,
    /// Tree searched when a mapped correct folder lacks a descriptor
    pub source_path: Option<String>,
    pub pairs: Vec<(String, String)>,
    /// `mappings` elements that were not two strings
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = std::result::Result<T, ParseError>;

pub fn parse_mapping_document(text: &str) -> ParseResult<StructuredMappings> {
    let mut reader = Reader::new(text);
    match reader.document() {
        Ok(()) => Ok(reader.out),
        Err(err) if reader.mappings_complete => {
            log::warn!("Ignoring trailing garbage in mapping file: {err}");
            Ok(reader.out)
        }
        Err(err) => Err(err),
    }
}

enum Value {
    Str(String),
    Other,
}

struct Reader<'a> {
    src: &'a [u8],
    pos: usize,
    out: StructuredMappings,
    mappings_complete: bool,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        let src = text.as_bytes();
        let pos = if src.starts_with(b"\xEF\xBB\xBF") { 3 } else { 0 };
        Self {
            src,
            pos,
            out: StructuredMappings::default(),
            mappings_complete: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: u8) -> ParseResult<()> {
        match self.peek() {
            Some(byte) if byte == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(byte) => Err(self.error(format!(
                "expected '{}', found '{}'",
                wanted as char, byte as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", wanted as char))),
        }
    }

    fn document(&mut self) -> ParseResult<()> {
        self.skip_ws();
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }

        loop {
            self.skip_ws();
            let key = self.string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();

            match key.as_str() {
                "unity_path" => match self.value()? {
                    Value::Str(path) => self.out.unity_path = Some(path),
                    Value::Other => log::debug!("unity_path is not a string, ignoring"),
                },
                "source_path" => match self.value()? {
                    Value::Str(path) => self.out.source_path = Some(path),
                    Value::Other => log::debug!("source_path is not a string, ignoring"),
                },
                "mappings" if self.peek() == Some(b'[') => {
                    self.mappings()?;
                    self.mappings_complete = true;
                }
                _ => {
                    self.value()?;
                }
            }

            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(()),
                Some(byte) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", byte as char)));
                }
                None => return Err(self.error("unterminated object")),
            }
        }
    }

    fn mappings(&mut self) -> ParseResult<()> {
        self.expect(b'[')?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                None => return Err(self.error("unterminated mappings array")),
                _ => {}
            }

            let start = self.pos;
            match self.pair() {
                Ok(Some(pair)) => self.out.pairs.push(pair),
                Ok(None) => self.out.rejected += 1,
                Err(err) => {
                    log::debug!("Dropping malformed mapping: {err}");
                    self.out.rejected += 1;
                    self.recover_element(start)?;
                }
            }

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                // missing comma between two pairs
                Some(b'[') => {}
                Some(byte) => {
                    return Err(self.error(format!("expected ',' or ']', found '{}'", byte as char)))
                }
                None => return Err(self.error("unterminated mappings array")),
            }
        }
    }

    /// `Ok(None)` for a well-formed element that is not two strings
    fn pair(&mut self) -> ParseResult<Option<(String, String)>> {
        if self.peek() != Some(b'[') {
            self.value()?;
            return Ok(None);
        }
        self.pos += 1;

        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(None);
        }
        loop {
            self.skip_ws();
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => break,
                Some(byte) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or ']', found '{}'", byte as char)));
                }
                None => return Err(self.error("unterminated mapping pair")),
            }
        }

        let mut items = items.into_iter();
        match (items.next(), items.next(), items.next()) {
            (Some(Value::Str(incorrect)), Some(Value::Str(correct)), None) => {
                Ok(Some((incorrect, correct)))
            }
            _ => Ok(None),
        }
    }

    /// Rewind to `start` and skip the broken element: through its own closing
    /// bracket when it is an array or object, otherwise up to the next `,` or
    /// `]` of the enclosing array. Strings and nesting are honoured.
    fn recover_element(&mut self, start: usize) -> ParseResult<()> {
        self.pos = start;
        let mut depth = 0usize;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => {
                    self.skip_raw_string()?;
                    continue;
                }
                b'[' | b'{' => depth += 1,
                b']' | b'}' if depth == 0 => return Ok(()),
                b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                b',' if depth == 0 => return Ok(()),
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unterminated mapping pair"))
    }

    /// Step over a string without decoding it
    fn skip_raw_string(&mut self) -> ParseResult<()> {
        self.expect(b'"')?;
        while let Some(byte) = self.bump() {
            match byte {
                b'"' => return Ok(()),
                b'\\' => {
                    self.bump();
                }
                _ => {}
            }
        }
        Err(self.error("unterminated string"))
    }

    fn value(&mut self) -> ParseResult<Value> {
        match self.peek() {
            Some(b'"') => Ok(Value::Str(self.string()?)),
            Some(b'[') => {
                self.skip_array()?;
                Ok(Value::Other)
            }
            Some(b'{') => {
                self.skip_object()?;
                Ok(Value::Other)
            }
            Some(byte) if is_scalar_byte(byte) => {
                while self.peek().is_some_and(is_scalar_byte) {
                    self.pos += 1;
                }
                Ok(Value::Other)
            }
            Some(byte) => Err(self.error(format!("unexpected '{}'", byte as char))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn skip_array(&mut self) -> ParseResult<()> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_ws();
            self.value()?;
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(()),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("malformed array"));
                }
            }
        }
    }

    fn skip_object(&mut self) -> ParseResult<()> {
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_ws();
            self.string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            self.value()?;
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(()),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("malformed object"));
                }
            }
        }
    }

    fn string(&mut self) -> ParseResult<String> {
        self.expect(b'"')?;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let Some(byte) = self.bump() else {
                return Err(self.error("unterminated string"));
            };
            match byte {
                b'"' => break,
                b'\\' => {
                    let Some(escape) = self.bump() else {
                        return Err(self.error("unterminated escape"));
                    };
                    match escape {
                        b'"' => buf.push(b'"'),
                        b'\\' => buf.push(b'\\'),
                        b'/' => buf.push(b'/'),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'u' => {
                            let ch = self.unicode_escape()?;
                            let mut tmp = [0u8; 4];
                            buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
                        }
                        // hand-written Windows paths: keep unknown escapes verbatim
                        other => {
                            buf.push(b'\\');
                            buf.push(other);
                        }
                    }
                }
                other => buf.push(other),
            }
        }

        String::from_utf8(buf).map_err(|_| self.error("string is not valid UTF-8"))
    }

    fn hex4(&mut self) -> ParseResult<u32> {
        let end = self.pos + 4;
        let digits = self
            .src
            .get(self.pos..end)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .ok_or_else(|| self.error("truncated \\u escape"))?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid \\u escape"))?;
        self.pos = end;
        Ok(code)
    }

    fn unicode_escape(&mut self) -> ParseResult<char> {
        let high = self.hex4()?;
        let code = if (0xD800..0xDC00).contains(&high) {
            if self.src.get(self.pos..self.pos + 2) != Some(b"\\u".as_slice()) {
                return Err(self.error("unpaired surrogate"));
            }
            self.pos += 2;
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error("invalid low surrogate"));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }
}

fn is_scalar_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'+' | b'-')
}

#[derive(Serialize)]
struct MappingDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    unity_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_path: Option<String>,
    mappings: Vec<[String; 2]>,
}

/// Save a plan in the shape [`parse_mapping_document`] reads back.
pub fn write_mapping_file(path: &Path, plan: &MappingPlan) -> Result<()> {
    let document = MappingDocument {
        unity_path: plan
            .target
            .as_ref()
            .map(|target| target.to_string_lossy().into_owned()),
        source_path: plan
            .source
            .as_ref()
            .map(|source| source.to_string_lossy().into_owned()),
        mappings: plan
            .pairs
            .iter()
            .map(|pair| {
                [
                    pair.incorrect.to_string_lossy().into_owned(),
                    pair.correct.to_string_lossy().into_owned(),
                ]
            })
            .collect(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create mapping dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&document).context("serialize mappings")?;
    std::fs::write(path, json).with_context(|| format!("write mappings {}", path.display()))?;
    log::info!("Mappings saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidfix_core::TreePair;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn reads_saved_document() {
        let text = r#"{
    "unity_path": "C:\\Game\\Assets",
    "source_path": "C:\\Game\\Library\\PackageCache",
    "old_path": "",
    "mappings": [
        ["C:\\Game\\Assets\\Scripts\\Cinemachine", "C:\\Game\\Library\\PackageCache\\com.unity.cinemachine@2.10.3"],
        ["Assets/Old/TextMesh Pro", "Packages/TextMesh Pro"]
    ]
}"#;

        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.unity_path.as_deref(), Some("C:\\Game\\Assets"));
        assert_eq!(
            parsed.source_path.as_deref(),
            Some("C:\\Game\\Library\\PackageCache")
        );
        assert_eq!(
            parsed.pairs,
            vec![
                pair(
                    "C:\\Game\\Assets\\Scripts\\Cinemachine",
                    "C:\\Game\\Library\\PackageCache\\com.unity.cinemachine@2.10.3"
                ),
                pair("Assets/Old/TextMesh Pro", "Packages/TextMesh Pro"),
            ]
        );
        assert_eq!(parsed.rejected, 0);
    }

    #[test]
    fn skips_malformed_pairs_and_keeps_the_rest() {
        let text = r#"{"mappings": [
            ["only-one"],
            ["a", "b"],
            ["x", 42],
            "not-a-pair",
            ["broken" "pair"],
            ["c", "d", "e"],
            ["e", "f"]
        ]}"#;

        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("a", "b"), pair("e", "f")]);
        assert_eq!(parsed.rejected, 5);
        assert_eq!(parsed.unity_path, None);
    }

    #[test]
    fn bracket_inside_broken_pair_string_is_not_its_end() {
        let text = r#"{"mappings": [["Assets/A" "Assets/Old [v1]"], ["c", "d"]]}"#;
        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("c", "d")]);
        assert_eq!(parsed.rejected, 1);
    }

    #[test]
    fn broken_pair_with_nested_array_is_skipped_whole() {
        let text = r#"{"mappings": [[["a" "b"], "x"], ["c", "d"]], "unity_path": "Assets"}"#;
        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("c", "d")]);
        assert_eq!(parsed.rejected, 1);
        assert_eq!(parsed.unity_path.as_deref(), Some("Assets"));
    }

    #[test]
    fn escaped_quote_in_broken_pair_does_not_end_recovery() {
        let text = r#"{"mappings": [["a\"]" 1 "b"], ["c", "d"]]}"#;
        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("c", "d")]);
        assert_eq!(parsed.rejected, 1);
    }

    #[test]
    fn skips_unknown_members_of_any_shape() {
        let text = r#"{
            "version": 2,
            "flags": {"dry": true, "nested": [1, [2, 3], {"k": null}]},
            "mappings": [["a", "b"]],
            "unity_path": ["not", "a", "string"]
        }"#;

        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("a", "b")]);
        assert_eq!(parsed.unity_path, None);
    }

    #[test]
    fn decodes_escapes() {
        let text = r#"{"mappings": [["caf\u00e9 \ud83d\ude00", "tab\there"], ["C:\Users\dev", "ok"]]}"#;
        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(
            parsed.pairs,
            vec![
                pair("café 😀", "tab\there"),
                pair("C:\\Users\\dev", "ok"),
            ]
        );
    }

    #[test]
    fn trailing_garbage_after_complete_mappings_is_tolerated() {
        let text = r#"{"mappings": [["a", "b"]] oops"#;
        let parsed = parse_mapping_document(text).unwrap();
        assert_eq!(parsed.pairs, vec![pair("a", "b")]);
    }

    #[test]
    fn structural_errors_report_position() {
        let err = parse_mapping_document("[\"a\", \"b\"]").unwrap_err();
        assert_eq!(err.offset, 0);

        let err = parse_mapping_document(r#"{"mappings": [["a", "b"]"#).unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn empty_object_has_no_pairs() {
        let parsed = parse_mapping_document(" {} ").unwrap();
        assert!(parsed.pairs.is_empty());
    }

    #[test]
    fn written_file_reads_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out/mappings.json");
        let plan = MappingPlan {
            pairs: vec![TreePair::new("Assets/Scripts/Foo", "Library/PackageCache/com.foo")],
            target: Some(PathBuf::from("Assets")),
            source: Some(PathBuf::from("Library/PackageCache")),
            rejected: 0,
        };

        write_mapping_file(&path, &plan).unwrap();
        let parsed = parse_mapping_document(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed.unity_path.as_deref(), Some("Assets"));
        assert_eq!(parsed.source_path.as_deref(), Some("Library/PackageCache"));
        assert_eq!(
            parsed.pairs,
            vec![pair("Assets/Scripts/Foo", "Library/PackageCache/com.foo")]
        );
    }
}
