//! Zeilen-Codec fuer ServerQuery-Verbindungen
//!
//! Der Server terminiert Zeilen mit `\n\r`, manche Proxies mit `\r\n`.
//! Der Codec trennt deshalb am `\n` und entfernt `\r` an beiden Enden.
//! Leere Zeilen werden uebersprungen. Ausgehende Zeilen enden mit `\n`.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Zeilenlaenge (4 MB, `channellist` grosser Server)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

// ---------------------------------------------------------------------------
// QueryCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer das zeilenbasierte ServerQuery-Protokoll
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use tsquery_protocol::codec::QueryCodec;
///
/// // let stream = TcpStream::connect(("127.0.0.1", 10011)).await?;
/// // let framed = Framed::new(stream, QueryCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct QueryCodec {
    max_line_length: usize,
    /// Bereits durchsuchter Teil des Puffers
    next_index: usize,
}

impl QueryCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for QueryCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn zeile_aus_bytes(roh: &[u8]) -> Result<String, QueryError> {
    let text = std::str::from_utf8(roh)
        .map_err(|e| QueryError::protokoll(format!("Zeile ist kein gueltiges UTF-8: {e}")))?;
    Ok(text.trim_matches('\r').to_string())
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for QueryCodec {
    type Item = String;
    type Error = QueryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_line_length {
                    return Err(QueryError::protokoll(format!(
                        "Zeile zu lang: {} Bytes (Maximum: {} Bytes)",
                        src.len(),
                        self.max_line_length
                    )));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let ende = self.next_index + offset;
            self.next_index = 0;
            if ende > self.max_line_length {
                return Err(QueryError::protokoll(format!(
                    "Zeile zu lang: {ende} Bytes (Maximum: {} Bytes)",
                    self.max_line_length
                )));
            }
            let roh = src.split_to(ende + 1);
            let zeile = zeile_aus_bytes(&roh[..ende])?;
            if !zeile.is_empty() {
                return Ok(Some(zeile));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(zeile) = self.decode(src)? {
            return Ok(Some(zeile));
        }
        // Letzte Zeile ohne Terminator
        self.next_index = 0;
        let rest = src.split();
        let zeile = zeile_aus_bytes(&rest)?;
        if zeile.is_empty() {
            Ok(None)
        } else {
            Ok(Some(zeile))
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<String> for QueryCodec {
    type Error = QueryError;

    fn encode(&mut self, zeile: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if zeile.contains('\n') {
            return Err(QueryError::protokoll(
                "Ausgehende Zeile enthaelt einen unescapeten Zeilenumbruch",
            ));
        }
        if zeile.len() > self.max_line_length {
            return Err(QueryError::protokoll(format!(
                "Befehl zu lang: {} Bytes (Maximum: {} Bytes)",
                zeile.len(),
                self.max_line_length
            )));
        }

        dst.reserve(zeile.len() + 1);
        dst.put_slice(zeile.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
