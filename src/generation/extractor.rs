// Streaming extractor - pulls completed file records out of a growing response buffer

use crate::generation::parser::ReasoningFilter;
use crate::models::GeneratedFile;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

static RECORD_HEADER: OnceLock<Regex> = OnceLock::new();

/// Matches exactly `{"path": "<literal>", "content": "` up to the opening quote of the content
fn record_header_pattern() -> &'static Regex {
    RECORD_HEADER.get_or_init(|| {
        Regex::new(r#"^\{\s*"path"\s*:\s*"((?:[^"\\]|\\.)*)"\s*,\s*"content"\s*:\s*"$"#).unwrap()
    })
}

/// Record being read
#[derive(Debug)]
enum Pending {
    None,
    /// Inside the content literal, which starts at `content_start`
    Content { path_raw: String, content_start: usize },
    /// Content literal closed; waiting for the closing brace
    Brace { path_raw: String, content: Range<usize> },
}

/// Lexer state carried between chunks.
///
/// Each visible char is stepped exactly once; the header pattern only runs
/// when a string opens inside an object.
#[derive(Debug)]
struct RecordLexer {
    in_string: bool,
    escaped: bool,
    /// Offset of the innermost `{` seen outside strings
    object_start: Option<usize>,
    pending: Pending,
}

impl Default for RecordLexer {
    fn default() -> Self {
        Self {
            in_string: false,
            escaped: false,
            object_start: None,
            pending: Pending::None,
        }
    }
}

impl RecordLexer {
    /// Step over `ch` at byte offset `at` of `text`; returns a finished record's raw path and content
    fn step(&mut self, text: &str, at: usize, ch: char) -> Option<(String, Range<usize>)> {
        if !self.in_string {
            if let Pending::Brace { .. } = self.pending {
                if ch.is_whitespace() {
                    return None;
                }
                let pending = std::mem::replace(&mut self.pending, Pending::None);
                if ch == '}' {
                    self.object_start = None;
                    if let Pending::Brace { path_raw, content } = pending {
                        return Some((path_raw, content));
                    }
                    return None;
                }
                // Extra keys after content: not a file record
            }
        }

        if self.in_string {
            if self.escaped {
                self.escaped = false;
                return None;
            }
            match ch {
                '\\' => self.escaped = true,
                '"' => {
                    self.in_string = false;
                    let pending = std::mem::replace(&mut self.pending, Pending::None);
                    if let Pending::Content { path_raw, content_start } = pending {
                        self.pending = Pending::Brace {
                            path_raw,
                            content: content_start..at,
                        };
                    }
                }
                // JSON strings never hold a raw newline
                '\n' => {
                    self.in_string = false;
                    self.pending = Pending::None;
                }
                _ => {}
            }
            return None;
        }

        match ch {
            '{' => self.object_start = Some(at),
            '}' => self.object_start = None,
            '"' => {
                self.in_string = true;
                if let Some(start) = self.object_start {
                    if let Some(caps) = record_header_pattern().captures(&text[start..at + 1]) {
                        let path_raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                        self.pending = Pending::Content {
                            path_raw: path_raw.to_string(),
                            content_start: at + 1,
                        };
                        self.object_start = None;
                    }
                }
            }
            _ => {}
        }
        None
    }
}

/// Incremental extractor for `{path, content}` records.
///
/// Feed it the model output as it arrives; each call returns only records
/// completed by that chunk and never returned before. Work per call is
/// proportional to the chunk, not to the buffer.
#[derive(Debug, Default)]
pub struct StreamingExtractor {
    buffer: String,
    reasoning: ReasoningFilter,
    /// Buffer with reasoning blocks removed
    visible: String,
    /// Byte offset into `visible` of the next char to lex
    cursor: usize,
    lexer: RecordLexer,
    seen: HashSet<String>,
}

impl StreamingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return newly completed records in discovery order
    pub fn add_chunk(&mut self, chunk: &str) -> Vec<GeneratedFile> {
        self.buffer.push_str(chunk);
        self.reasoning.push(chunk, &mut self.visible);

        let mut found = Vec::new();
        let start = self.cursor;
        for (offset, ch) in self.visible[start..].char_indices() {
            let at = start + offset;
            let (path_raw, content) = match self.lexer.step(&self.visible, at, ch) {
                Some(record) => record,
                None => continue,
            };

            let (path, content) = match (decode_literal(&path_raw), decode_literal(&self.visible[content])) {
                (Some(path), Some(content)) => (path, content),
                _ => {
                    log::debug!("Skipping record with malformed escapes");
                    continue;
                }
            };
            let file = GeneratedFile::new(&path, content);
            if file.path.is_empty() {
                continue;
            }
            if self.seen.insert(file.path.clone()) {
                log::debug!("Extracted {} ({} bytes)", file.path, file.content.len());
                found.push(file);
            }
        }
        self.cursor = self.visible.len();

        found
    }

    /// Paths returned so far
    pub fn seen_paths(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    /// Full text received so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Discard all partial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Decode the inside of a JSON string literal
fn decode_literal(raw: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{"files": [{"path": "src/App.tsx", "content": "import Home from \"./pages/Home\";\n\texport default Home;"}, {"path": "./src/pages/Home.tsx", "content": "export default function Home() { return <h1>{'\\'}</h1>; }"}]}"#;

    #[test]
    fn test_whole_response_at_once() {
        let mut extractor = StreamingExtractor::new();
        let files = extractor.add_chunk(RESPONSE);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/App.tsx");
        assert_eq!(
            files[0].content,
            "import Home from \"./pages/Home\";\n\texport default Home;"
        );
        assert_eq!(files[1].path, "src/pages/Home.tsx");
        assert!(files[1].content.contains("{'\\'}"));
    }

    #[test]
    fn test_records_only_returned_once() {
        let mut extractor = StreamingExtractor::new();
        assert_eq!(extractor.add_chunk(RESPONSE).len(), 2);
        assert!(extractor.add_chunk("").is_empty());
        assert!(extractor.add_chunk("\n").is_empty());
    }

    #[test]
    fn test_incomplete_record_waits() {
        let mut extractor = StreamingExtractor::new();
        assert!(extractor
            .add_chunk(r#"{"files":[{"path":"a.ts","content":"hello"#)
            .is_empty());
        // Closing quote but no brace yet
        assert!(extractor.add_chunk(r#"""#).is_empty());
        let files = extractor.add_chunk("}]}");
        assert_eq!(files, vec![GeneratedFile::new("a.ts", "hello")]);
    }

    #[test]
    fn test_escaped_quote_split_across_chunks() {
        let mut extractor = StreamingExtractor::new();
        assert!(extractor
            .add_chunk(r#"{"path":"a.ts","content":"say \"#)
            .is_empty());
        assert!(extractor.add_chunk(r#""hi\""#).is_empty());
        let files = extractor.add_chunk(r#""}"#);
        assert_eq!(files[0].content, "say \"hi\"");
    }

    #[test]
    fn test_extended_escapes_decoded() {
        let mut extractor = StreamingExtractor::new();
        let files = extractor.add_chunk(r#"{"path":"a.ts","content":"a\/b\u00e9\r"}"#);
        assert_eq!(files[0].content, "a/bé\r");
    }

    #[test]
    fn test_malformed_escape_skipped() {
        let mut extractor = StreamingExtractor::new();
        let files = extractor
            .add_chunk(r#"{"path":"bad.ts","content":"\q"} {"path":"good.ts","content":"ok"}"#);
        assert_eq!(files, vec![GeneratedFile::new("good.ts", "ok")]);
    }

    #[test]
    fn test_no_records_while_thinking() {
        let mut extractor = StreamingExtractor::new();
        assert!(extractor
            .add_chunk(r#"<think>draft {"path":"draft.ts","content":"x"}"#)
            .is_empty());
        assert!(extractor.add_chunk("</think>").is_empty());
        let files = extractor.add_chunk(r#"{"path":"real.ts","content":"y"}"#);
        assert_eq!(files, vec![GeneratedFile::new("real.ts", "y")]);
    }

    #[test]
    fn test_think_tag_inside_content() {
        let mut extractor = StreamingExtractor::new();
        let text = r#"{"files":[{"path":"src/parse.ts","content":"export const OPEN = '<think>';"},{"path":"src/App.tsx","content":"<think>x</think>"}]}"#;
        let mut files = Vec::new();
        for ch in text.chars() {
            files.extend(extractor.add_chunk(&ch.to_string()));
        }
        assert_eq!(
            files,
            vec![
                GeneratedFile::new("src/parse.ts", "export const OPEN = '<think>';"),
                GeneratedFile::new("src/App.tsx", "<think>x</think>"),
            ]
        );
    }

    #[test]
    fn test_record_before_open_reasoning() {
        let mut extractor = StreamingExtractor::new();
        let files = extractor.add_chunk(r#"{"path":"a.ts","content":"x"} <think>{"path":"b.ts","content":"y"}"#);
        assert_eq!(files, vec![GeneratedFile::new("a.ts", "x")]);
    }

    #[test]
    fn test_record_header_inside_content_ignored() {
        let mut extractor = StreamingExtractor::new();
        let files = extractor.add_chunk(
            r#"{"path":"doc.md","content":"use {\"path\":\"x.ts\",\"content\":\"y\"}"}"#,
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "doc.md");
    }

    #[test]
    fn test_large_response_in_small_chunks() {
        let body = "const line = \\\"value\\\";\\n".repeat(20_000);
        let text = format!(r#"{{"files":[{{"path":"src/big.ts","content":"{}"}}]}}"#, body);
        let mut extractor = StreamingExtractor::new();
        let started = std::time::Instant::now();
        let mut files = Vec::new();
        for piece in text.as_bytes().chunks(4) {
            files.extend(extractor.add_chunk(std::str::from_utf8(piece).unwrap()));
        }
        assert_eq!(files.len(), 1);
        assert!(files[0].content.starts_with("const line = \"value\";\n"));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_reset_discards_state() {
        let mut extractor = StreamingExtractor::new();
        extractor.add_chunk(r#"{"path":"a.ts","content":"x"}"#);
        extractor.reset();
        assert!(extractor.buffer().is_empty());
        assert_eq!(extractor.add_chunk(r#"{"path":"a.ts","content":"x"}"#).len(), 1);
    }
}
