//! Binary codec for protocol fields crossing the JSON boundary.
//!
//! Every binary field on the wire (challenges, credential identifiers,
//! signatures, user handles) is carried as URL-safe, unpadded base64 text.
//! The platform credential API rejects padded or non-URL-safe text, so the
//! alphabet and padding choices here are part of the wire contract.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{AgentError, Result};

/// Encode raw bytes as unpadded base64url text.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url text back into raw bytes.
///
/// Fails with [`AgentError::MalformedEncoding`] on any input that is not
/// valid unpadded base64url, including padded or standard-alphabet text.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| AgentError::MalformedEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        let samples: [&[u8]; 5] = [
            b"",
            b"f",
            b"admin@example.com",
            &[0xFF, 0xFE, 0xFD],
            &[0x00, 0x3E, 0x3F, 0x7F, 0x80, 0xFF],
        ];
        for bytes in samples {
            let text = encode(bytes);
            assert_eq!(decode(&text).unwrap(), bytes);
        }
    }

    #[test]
    fn test_round_trip_first_32_byte_values() {
        let bytes: Vec<u8> = (0x00..=0x1F).collect();
        assert_eq!(bytes.len(), 32);
        let decoded = decode(&encode(&bytes)).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_encode_of_decode_is_identity() {
        for text in ["", "AQID", "_-8", "YWRtaW5AZXhhbXBsZS5jb20"] {
            let bytes = decode(text).unwrap();
            assert_eq!(encode(&bytes), text);
        }
    }

    #[test]
    fn test_url_safe_alphabet_no_padding() {
        // 0xFB 0xEF encodes to "++8=" in standard base64
        let text = encode(&[0xFB, 0xEF]);
        assert!(!text.contains('+'));
        assert!(!text.contains('/'));
        assert!(!text.contains('='));
        assert_eq!(text, "--8");
    }

    #[test]
    fn test_decode_rejects_padded_input() {
        assert!(matches!(
            decode("AQ=="),
            Err(AgentError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(matches!(
            decode("++8"),
            Err(AgentError::MalformedEncoding(_))
        ));
    }
}
