// Server-sent event decoding for streamed chat completions

use serde_json::Value;

/// One decoded stream item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// Text delta from `choices[0].delta.content`
    Delta(String),
    /// `data: [DONE]`
    Done,
    /// Provider error frame, `data: {"error": ...}`
    Error(String),
}

/// Incremental decoder over raw response bytes.
///
/// Buffers bytes until a full line is available so multi-byte characters
/// split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every item completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = decode_line(line.trim()) {
                items.push(item);
            }
        }

        items
    }

    /// Decode whatever remains once the body has ended
    pub fn finish(&mut self) -> Vec<SseItem> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        decode_line(line.trim()).into_iter().collect()
    }
}

fn decode_line(line: &str) -> Option<SseItem> {
    // Comments, blank separators and other fields carry no text
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseItem::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Ignoring undecodable stream frame: {}", e);
            return None;
        }
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Some(SseItem::Error(error_message(error)));
    }

    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| SseItem::Delta(text.to_string()))
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        _ => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    }
}

/// Extract the reply text from a non-streaming completion body
pub fn completion_text(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::new();
        let items = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n: keepalive\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
        );
        assert_eq!(
            items,
            vec![
                SseItem::Delta("Hel".to_string()),
                SseItem::Delta("lo".to_string()),
                SseItem::Done
            ]
        );
    }

    #[test]
    fn test_split_multibyte_character() {
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"é\"}}]}\n".as_bytes();
        let split = frame.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&frame[..split]).is_empty());
        assert_eq!(decoder.push(&frame[split..]), vec![SseItem::Delta("é".to_string())]);
    }

    #[test]
    fn test_role_only_frames_skipped() {
        let mut decoder = SseDecoder::new();
        let items = decoder.push(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n");
        assert!(items.is_empty());
    }

    #[test]
    fn test_error_frames_surface() {
        let mut decoder = SseDecoder::new();
        let items = decoder.push(
            b"data: {\"error\":{\"message\":\"Rate limit exceeded\",\"code\":429}}\n\ndata: {\"error\":\"bad gateway\"}\n\ndata: {\"error\":{\"code\":500}}\n",
        );
        assert_eq!(
            items,
            vec![
                SseItem::Error("Rate limit exceeded".to_string()),
                SseItem::Error("bad gateway".to_string()),
                SseItem::Error(r#"{"code":500}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![SseItem::Done]);
    }

    #[test]
    fn test_completion_text() {
        let body: Value =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#).unwrap();
        assert_eq!(completion_text(&body).as_deref(), Some("hi"));
    }
}
