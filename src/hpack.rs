//! Thin wrapper over the delegated HPACK implementation.
//!
//! The connection engine never touches HPACK state machinery directly; it
//! only ever calls `encode`/`decode` here, matching SPEC_FULL.md §1's
//! "delegated to a standard HPACK/framing library" requirement.

use crate::error::CodecError;
use crate::frame::Pseudo;

/// One HPACK encoder/decoder pair per connection (HPACK state is
/// connection-scoped, not stream-scoped).
pub struct HpackCodec {
    encoder: fluke_hpack::Encoder<'static>,
    decoder: fluke_hpack::Decoder<'static>,
}

impl HpackCodec {
    pub fn new() -> Self {
        HpackCodec {
            encoder: fluke_hpack::Encoder::new(),
            decoder: fluke_hpack::Decoder::new(),
        }
    }

    /// Encodes pseudo-headers followed by regular fields into a header block
    /// fragment, pseudo-headers first as RFC 7540 §8.1.2.1 requires.
    pub fn encode(&mut self, pseudo: Pseudo, fields: &[(String, String)]) -> Vec<u8> {
        let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = pseudo
            .into_pairs()
            .into_iter()
            .map(|(n, v)| (n.into_bytes(), v.into_bytes()))
            .collect();
        pairs.extend(
            fields
                .iter()
                .map(|(n, v)| (n.clone().into_bytes(), v.clone().into_bytes())),
        );
        self.encoder.encode(pairs.iter().map(|(n, v)| (&n[..], &v[..])))
    }

    /// Decodes a header block fragment into a pseudo-header set plus the
    /// remaining regular fields, in HPACK's emission order.
    pub fn decode(&mut self, block: &[u8]) -> Result<(Pseudo, Vec<(String, String)>), CodecError> {
        let decoded = self
            .decoder
            .decode(block)
            .map_err(CodecError::HpackDecode)?;

        let mut pseudo = Pseudo::default();
        let mut fields = Vec::with_capacity(decoded.len());

        for (name, value) in decoded {
            let name = String::from_utf8_lossy(&name).into_owned();
            let value = String::from_utf8_lossy(&value).into_owned();
            if name.starts_with(':') {
                pseudo.set(&name, &value);
            } else {
                fields.push((name, value));
            }
        }

        Ok((pseudo, fields))
    }
}

impl Default for HpackCodec {
    fn default() -> Self {
        Self::new()
    }
}
