//! Transport decoding for uploaded reports.
//!
//! Clients may gzip the report and either announce it with
//! `Content-Encoding: gzip` or just send gzip-framed bytes. Decoding never
//! fails: a payload that does not decompress is handed to the parser as-is.

use std::io::Read;

use flate2::read::GzDecoder;

/// Gzip magic bytes: `1f 8b`
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Framing applied to an uploaded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Plain text
    Identity,
    /// Gzip-compressed text
    Gzip,
}

impl PayloadEncoding {
    /// Detect the payload framing from the `Content-Encoding` header value and
    /// the payload's leading bytes.
    ///
    /// A declared `gzip` wins; otherwise gzip magic bytes are enough.
    pub fn detect(content_encoding: Option<&str>, payload: &[u8]) -> Self {
        let declared = content_encoding
            .map(|value| {
                value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("gzip"))
            })
            .unwrap_or(false);

        if declared || has_gzip_magic(payload) {
            Self::Gzip
        } else {
            Self::Identity
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
        }
    }
}

/// Returns true when `payload` starts with the gzip magic bytes.
pub fn has_gzip_magic(payload: &[u8]) -> bool {
    payload.len() >= GZIP_MAGIC.len() && payload[..GZIP_MAGIC.len()] == GZIP_MAGIC
}

/// Decode an uploaded payload.
///
/// With [`PayloadEncoding::Gzip`] the payload is decompressed; if that fails
/// the original bytes are returned unchanged. At most `limit + 1` bytes are
/// produced so callers can detect oversize reports without inflating a
/// compression bomb.
pub fn decode_payload(payload: &[u8], encoding: PayloadEncoding, limit: usize) -> Vec<u8> {
    match encoding {
        PayloadEncoding::Identity => payload.to_vec(),
        PayloadEncoding::Gzip => match gunzip(payload, limit) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    payload_bytes = payload.len(),
                    "Gzip decoding failed; treating payload as plain text"
                );
                payload.to_vec()
            }
        },
    }
}

fn gunzip(payload: &[u8], limit: usize) -> std::io::Result<Vec<u8>> {
    let ceiling = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoded = Vec::new();
    GzDecoder::new(payload)
        .take(ceiling)
        .read_to_end(&mut decoded)?;
    Ok(decoded)
}
