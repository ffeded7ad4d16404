//! Decoder for `streamGenerateContent?alt=sse`.
//!
//! Gemini sends one `data: <json>` line per partial response, each carrying a
//! fragment of the reply text. Bytes arrive in arbitrary network chunks, so
//! lines are buffered until a newline is seen.

use serde_json::Value;

use super::{SERVICE, types::GenerateContentResponse};
use crate::error::{MedsafeError, Result};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the text fragments completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(text) = decode_line(&line)? {
                fragments.push(text);
            }
        }
        Ok(fragments)
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Vec<String>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.buffer);
        Ok(decode_line(&line)?.into_iter().collect())
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| MedsafeError::transport(SERVICE, format!("invalid UTF-8 in stream: {e}")))?
        .trim_end();

    let Some(data) = line.strip_prefix("data:") else {
        // comments, blank separators, `event:`/`id:` fields
        return Ok(None);
    };
    let data = data.trim_start();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(data).map_err(|e| {
        MedsafeError::transport(SERVICE, format!("invalid JSON in stream event: {e}"))
    })?;

    if let Some(error) = value.get("error") {
        let status = error["code"]
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(500);
        return Err(MedsafeError::Provider {
            service: SERVICE.to_string(),
            status,
            body: error.to_string(),
        });
    }

    let response: GenerateContentResponse = serde_json::from_value(value).map_err(|e| {
        MedsafeError::transport(SERVICE, format!("unexpected stream event shape: {e}"))
    })?;
    let text = response.text();
    if text.is_empty() {
        tracing::debug!(
            finish_reason = response.finish_reason().unwrap_or("none"),
            "stream event without text"
        );
        return Ok(None);
    }
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\r\n\r\n"
        )
    }

    #[test]
    fn decodes_events_in_order() {
        let mut decoder = SseDecoder::new();
        let payload = format!("{}{}{}", event("Hi"), event(" there"), event("!"));
        let fragments = decoder.feed(payload.as_bytes()).unwrap();
        assert_eq!(fragments, vec!["Hi", " there", "!"]);
        assert!(decoder.finish().unwrap().is_empty());
    }

    #[test]
    fn reassembles_lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let payload = event("Warfarin");
        let (head, tail) = payload.as_bytes().split_at(17);

        assert!(decoder.feed(head).unwrap().is_empty());
        assert_eq!(decoder.feed(tail).unwrap(), vec!["Warfarin"]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let payload = event("µg");
        let bytes = payload.as_bytes();
        let split = payload.find('µ').unwrap() + 1;

        assert!(decoder.feed(&bytes[..split]).unwrap().is_empty());
        assert_eq!(decoder.feed(&bytes[split..]).unwrap(), vec!["µg"]);
    }

    #[test]
    fn unterminated_final_line_is_flushed() {
        let mut decoder = SseDecoder::new();
        let payload = event("done");
        let trimmed = payload.trim_end();
        assert!(decoder.feed(trimmed.as_bytes()).unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), vec!["done"]);
    }

    #[test]
    fn error_event_becomes_provider_error() {
        let mut decoder = SseDecoder::new();
        let err = decoder
            .feed(b"data: {\"error\":{\"code\":429,\"message\":\"quota\"}}\n")
            .unwrap_err();
        assert!(matches!(err, MedsafeError::Provider { status: 429, .. }));
    }

    #[test]
    fn out_of_range_error_code_falls_back_to_500() {
        let mut decoder = SseDecoder::new();
        let err = decoder
            .feed(b"data: {\"error\":{\"code\":70000,\"message\":\"?\"}}\n")
            .unwrap_err();
        assert!(matches!(err, MedsafeError::Provider { status: 500, .. }));
    }

    #[test]
    fn finish_event_without_text_yields_nothing() {
        let mut decoder = SseDecoder::new();
        let fragments = decoder
            .feed(b"data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n")
            .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut decoder = SseDecoder::new();
        let fragments = decoder.feed(b": keep-alive\nevent: message\n\n").unwrap();
        assert!(fragments.is_empty());
    }
}
