use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Attempt a strict UTF-8 decode of an L7 payload.
///
/// Control characters are preserved verbatim; display policy belongs to the
/// caller. `None` marks the payload as undecodable. The raw bytes are never
/// modified.
pub fn classify(payload: &[u8]) -> Option<String> {
    std::str::from_utf8(payload).ok().map(str::to_owned)
}

/// Requested rendering of a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Text,
    Hex,
    Base64,
}

/// Render a payload in the requested view.
///
/// Views are computed from the raw bytes on every call; nothing besides the
/// payload itself is ever stored.
pub fn render(payload: &[u8], mode: ViewMode) -> String {
    match mode {
        ViewMode::Text => String::from_utf8_lossy(payload).into_owned(),
        ViewMode::Hex => hex::encode(payload),
        ViewMode::Base64 => STANDARD.encode(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_payload_round_trips() {
        let payload = "GET / HTTP/1.1\r\nHost: example\r\n\r\n".as_bytes();
        let decoded = classify(payload).unwrap();
        assert_eq!(decoded.as_bytes(), payload);
    }

    #[test]
    fn binary_payload_is_undecodable() {
        assert_eq!(classify(&[0xff, 0xfe]), None);
    }

    #[test]
    fn empty_payload_decodes_to_empty_string() {
        assert_eq!(classify(b""), Some(String::new()));
    }

    #[test]
    fn hex_view_of_binary_payload() {
        assert_eq!(render(&[0xff, 0xfe], ViewMode::Hex), "fffe");
    }

    #[test]
    fn base64_view() {
        assert_eq!(render(b"hello", ViewMode::Base64), "aGVsbG8=");
    }

    #[test]
    fn text_view_replaces_invalid_sequences() {
        let rendered = render(&[b'h', b'i', 0xff], ViewMode::Text);
        assert_eq!(rendered, "hi\u{fffd}");
    }

    #[test]
    fn view_mode_parses_lowercase() {
        let mode: ViewMode = serde_json::from_str("\"base64\"").unwrap();
        assert_eq!(mode, ViewMode::Base64);
    }
}
