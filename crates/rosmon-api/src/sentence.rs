//! Word and sentence framing.
//!
//! Every word is prefixed with its length in a variable-width encoding (one
//! to five bytes); a sentence ends with a zero-length word.

use crate::error::{ApiError, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Encode a word length prefix.
///
/// # Examples
///
/// ```
/// use rosmon_api::sentence::encode_length;
///
/// assert_eq!(encode_length(0x7f), vec![0x7f]);
/// assert_eq!(encode_length(0x80), vec![0x80, 0x80]);
/// assert_eq!(encode_length(0x4000), vec![0xc0, 0x40, 0x00]);
/// ```
pub fn encode_length(len: usize) -> Vec<u8> {
    let n = len as u32;
    if len < 0x80 {
        vec![n as u8]
    } else if len < 0x4000 {
        ((n | 0x8000) as u16).to_be_bytes().to_vec()
    } else if len < 0x20_0000 {
        (n | 0xC0_0000).to_be_bytes()[1..].to_vec()
    } else if len < 0x1000_0000 {
        (n | 0xE000_0000).to_be_bytes().to_vec()
    } else {
        let mut out = vec![0xF0];
        out.extend_from_slice(&n.to_be_bytes());
        out
    }
}

/// Encode a full sentence, including the terminating empty word.
pub fn encode_sentence(words: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for word in words {
        out.extend(encode_length(word.len()));
        out.extend_from_slice(word.as_bytes());
    }
    out.push(0);
    out
}

/// Largest word accepted from a device. Health and print replies are a few
/// hundred bytes; anything near this is a corrupt or hostile stream.
pub const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    let first = reader.read_u8().await?;
    let len = if first & 0x80 == 0 {
        u32::from(first)
    } else if first & 0xC0 == 0x80 {
        let mut rest = [0u8; 1];
        reader.read_exact(&mut rest).await?;
        u32::from_be_bytes([0, 0, first & 0x3F, rest[0]])
    } else if first & 0xE0 == 0xC0 {
        let mut rest = [0u8; 2];
        reader.read_exact(&mut rest).await?;
        u32::from_be_bytes([0, first & 0x1F, rest[0], rest[1]])
    } else if first & 0xF0 == 0xE0 {
        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest).await?;
        u32::from_be_bytes([first & 0x0F, rest[0], rest[1], rest[2]])
    } else if first == 0xF0 {
        reader.read_u32().await?
    } else {
        return Err(ApiError::Protocol(format!(
            "unexpected control byte 0x{first:02x} in length prefix"
        )));
    };
    Ok(len as usize)
}

/// Read one length-prefixed word. An empty string marks the end of a sentence.
pub async fn read_word<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let len = read_length(reader).await?;
    if len > MAX_WORD_LEN {
        return Err(ApiError::Protocol(format!(
            "word length {len} exceeds limit of {MAX_WORD_LEN} bytes"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(String::from_utf8(buf)?)
}

/// Read words up to (not including) the terminating empty word.
pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let word = read_word(reader).await?;
        if word.is_empty() {
            return Ok(words);
        }
        words.push(word);
    }
}

/// A parsed reply sentence: the reply word (`!re`, `!done`, `!trap`) plus its
/// `=key=value` attributes in the order the device sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub word: String,
    pub tag: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl Sentence {
    pub fn new(word: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            word: word.to_string(),
            tag: None,
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Parse raw words as read off the wire.
    pub fn parse(words: Vec<String>) -> Result<Self> {
        let mut iter = words.into_iter();
        let word = iter
            .next()
            .ok_or_else(|| ApiError::Protocol("empty reply sentence".to_string()))?;
        let mut sentence = Sentence {
            word,
            ..Default::default()
        };

        for w in iter {
            if let Some(attr) = w.strip_prefix('=') {
                // Values may themselves contain '='; only the first one separates.
                let (key, value) = attr.split_once('=').unwrap_or((attr, ""));
                sentence
                    .attributes
                    .push((key.to_string(), value.to_string()));
            } else if let Some(tag) = w.strip_prefix(".tag=") {
                sentence.tag = Some(tag.to_string());
            } else {
                tracing::debug!(reply = %sentence.word, word = %w, "Ignoring unexpected API word");
            }
        }

        Ok(sentence)
    }

    /// Value of the first attribute named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode_length(bytes: &[u8]) -> Result<usize> {
        let mut reader = bytes;
        read_length(&mut reader).await
    }

    #[tokio::test]
    async fn length_prefix_boundaries_decode_to_original_value() {
        for len in [
            0usize,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
            0x1000_0000,
        ] {
            let encoded = encode_length(len);
            assert_eq!(decode_length(&encoded).await.unwrap(), len, "len {len:#x}");
        }
    }

    #[test]
    fn length_prefix_width_grows_at_each_boundary() {
        assert_eq!(encode_length(0x3FFF).len(), 2);
        assert_eq!(encode_length(0x1F_FFFF).len(), 3);
        assert_eq!(encode_length(0x0FFF_FFFF).len(), 4);
        assert_eq!(encode_length(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn control_byte_in_length_is_rejected() {
        let err = decode_length(&[0xF8]).await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol(_)));
    }

    #[tokio::test]
    async fn oversized_word_is_rejected_before_reading_it() {
        let mut reader: &[u8] = &[0xF0, 0xFF, 0xFF, 0xFF, 0xFF];
        let err = read_word(&mut reader).await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol(ref m) if m.contains("exceeds limit")));
    }

    #[tokio::test]
    async fn word_at_size_limit_prefix_is_accepted() {
        let encoded = encode_length(MAX_WORD_LEN);
        let mut reader = encoded.as_slice();
        let err = read_word(&mut reader).await.unwrap_err();
        // Prefix passes the limit check; the body is simply missing.
        assert!(matches!(err, ApiError::Io(_)));
    }

    #[tokio::test]
    async fn reads_sentence_until_empty_word() {
        let bytes = encode_sentence(&["!re", "=name=voltage", "=value=24.1"]);
        let mut reader = bytes.as_slice();
        let words = read_sentence(&mut reader).await.unwrap();
        assert_eq!(words, vec!["!re", "=name=voltage", "=value=24.1"]);
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn truncated_word_is_an_io_error() {
        let mut bytes = encode_sentence(&["!re", "=name=voltage"]);
        bytes.truncate(6);
        let mut reader = bytes.as_slice();
        let err = read_sentence(&mut reader).await.unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }

    #[test]
    fn parse_splits_attributes_on_first_equals_only() {
        let sentence = Sentence::parse(vec![
            "!re".to_string(),
            "=comment=a=b".to_string(),
            "=value=".to_string(),
            ".tag=7".to_string(),
        ])
        .unwrap();
        assert_eq!(sentence.word, "!re");
        assert_eq!(sentence.get("comment"), Some("a=b"));
        assert_eq!(sentence.get("value"), Some(""));
        assert_eq!(sentence.get("missing"), None);
        assert_eq!(sentence.tag.as_deref(), Some("7"));
    }

    #[test]
    fn parse_rejects_empty_sentence() {
        assert!(matches!(
            Sentence::parse(Vec::new()),
            Err(ApiError::Protocol(_))
        ));
    }
}
