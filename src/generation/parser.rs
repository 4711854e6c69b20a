// Full-response parser - recovers the file list from a complete model response

use crate::models::{normalize_path, GeneratedFile};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();
static FILES_OBJECT: OnceLock<Regex> = OnceLock::new();

fn fenced_block_pattern() -> &'static Regex {
    FENCED_BLOCK.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").unwrap())
}

fn files_object_pattern() -> &'static Regex {
    FILES_OBJECT.get_or_init(|| Regex::new(r#"(?s)\{.*"files".*\}"#).unwrap())
}

/// Everything recovered from a complete response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub files: Vec<GeneratedFile>,
    /// Paths the model asked to delete
    pub deleted: Vec<String>,
    pub summary: Option<String>,
}

/// Incremental `<think>` block remover.
///
/// Tags only count outside JSON string literals, so generated code that
/// mentions `<think>` survives. JSON strings never hold a raw newline, so a
/// newline always ends string tracking; a stray quote in prose cannot
/// invert the state for the rest of the response.
#[derive(Debug, Default)]
pub struct ReasoningFilter {
    thinking: bool,
    in_string: bool,
    escaped: bool,
    /// Chars that may still turn out to be a tag
    held: String,
}

impl ReasoningFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `<think>` block is open
    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// Append the visible part of `chunk` to `out`
    pub fn push(&mut self, chunk: &str, out: &mut String) {
        for ch in chunk.chars() {
            self.feed(ch, out);
        }
    }

    /// Release held chars once the text has ended
    pub fn finish(&mut self, out: &mut String) {
        let held = std::mem::take(&mut self.held);
        if !self.thinking {
            out.push_str(&held);
        }
    }

    fn feed(&mut self, ch: char, out: &mut String) {
        if !self.thinking && self.in_string {
            if self.escaped {
                self.escaped = false;
            } else {
                match ch {
                    '\\' => self.escaped = true,
                    '"' | '\n' => self.in_string = false,
                    _ => {}
                }
            }
            out.push(ch);
            return;
        }

        if self.held.is_empty() && ch != '<' {
            if !self.thinking {
                if ch == '"' {
                    self.in_string = true;
                }
                out.push(ch);
            }
            return;
        }

        self.held.push(ch);
        let tag = if self.thinking { THINK_CLOSE } else { THINK_OPEN };
        if self.held == tag {
            self.held.clear();
            self.thinking = !self.thinking;
            self.in_string = false;
            self.escaped = false;
        } else if !tag.starts_with(self.held.as_str()) {
            // Not a tag: release the first char and replay the rest
            let held = std::mem::take(&mut self.held);
            let mut chars = held.chars();
            if let Some(first) = chars.next() {
                if !self.thinking {
                    out.push(first);
                }
            }
            for next in chars {
                self.feed(next, out);
            }
        }
    }
}

/// Remove closed reasoning blocks.
///
/// Returns the visible text and whether an unclosed `<think>` remains; when
/// it does, the returned text stops at that tag.
pub fn split_reasoning(text: &str) -> (String, bool) {
    let mut filter = ReasoningFilter::new();
    let mut visible = String::with_capacity(text.len());
    filter.push(text, &mut visible);
    filter.finish(&mut visible);
    (visible, filter.is_thinking())
}

/// Strip reasoning blocks, including a dangling unclosed one
pub fn strip_reasoning(text: &str) -> String {
    split_reasoning(text).0
}

/// Parse a complete response into files
pub fn parse(text: &str) -> Option<Vec<GeneratedFile>> {
    parse_response(text).map(|parsed| parsed.files)
}

/// Parse a complete response, trying each strategy in order:
/// the whole text as JSON, each fenced block, then a broad `{ ... "files" ... }` match.
pub fn parse_response(text: &str) -> Option<ParsedResponse> {
    let visible = strip_reasoning(text);
    let trimmed = visible.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_json(trimmed) {
        return Some(parsed);
    }

    for caps in fenced_block_pattern().captures_iter(trimmed) {
        if let Some(block) = caps.get(1) {
            if let Some(parsed) = parse_json(block.as_str().trim()) {
                log::debug!("Parsed response from fenced block");
                return Some(parsed);
            }
        }
    }

    if let Some(found) = files_object_pattern().find(trimmed) {
        if let Some(parsed) = parse_json(found.as_str()) {
            log::debug!("Parsed response from embedded files object");
            return Some(parsed);
        }
    }

    log::warn!("Could not recover a file list from response ({} chars)", text.len());
    None
}

/// Parse a JSON document shaped as `{"files": [...]}` or a bare array of file objects
fn parse_json(candidate: &str) -> Option<ParsedResponse> {
    let value: Value = serde_json::from_str(candidate).ok()?;

    match value {
        Value::Object(map) => {
            let entries = map.get("files")?.as_array()?;
            let deleted = map
                .get("deleted")
                .or_else(|| map.get("deletedFiles"))
                .and_then(Value::as_array)
                .map(|paths| {
                    paths
                        .iter()
                        .filter_map(Value::as_str)
                        .map(normalize_path)
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let summary = map
                .get("summary")
                .or_else(|| map.get("explanation"))
                .and_then(Value::as_str)
                .map(str::to_string);

            Some(ParsedResponse {
                files: collect_files(entries),
                deleted,
                summary,
            })
        }
        Value::Array(entries) => {
            let files = collect_files(&entries);
            // A bare array only counts when it actually holds file objects
            if files.is_empty() {
                None
            } else {
                Some(ParsedResponse {
                    files,
                    ..Default::default()
                })
            }
        }
        _ => None,
    }
}

fn collect_files(entries: &[Value]) -> Vec<GeneratedFile> {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let path = entry.get("path").and_then(Value::as_str);
        let content = entry.get("content").and_then(Value::as_str);
        let (path, content) = match (path, content) {
            (Some(path), Some(content)) => (path, content),
            _ => {
                log::warn!("Skipping file entry {} without string path and content", index);
                continue;
            }
        };

        let file = GeneratedFile::new(path, content);
        if file.path.is_empty() {
            log::warn!("Skipping file entry {} with empty path", index);
            continue;
        }
        if !seen.insert(file.path.clone()) {
            log::warn!("Duplicate file entry for {}, keeping the first", file.path);
            continue;
        }
        files.push(file);
    }

    files
}
