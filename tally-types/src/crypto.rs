//! Wire-format wrappers around `tally-core`'s cryptographic values.
//!
//! Per spec §6: ciphertexts and related big integers travel over the wire as
//! base-64 of a fixed-width big-endian byte string, `⌈log2(n²)/8⌉` bytes
//! wide. Fixing the width (rather than using the shortest big-endian
//! encoding) keeps the encoding free of length side-channels and makes
//! concatenation for the verification hash unambiguous.

use base64ct::{Base64, Encoding};
use num_bigint::BigUint;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use tally_core::paillier::Ciphertext;
use tally_core::threshold::{ChaumPedersenProof, PartialDecryption};

/// A fixed-width big-endian integer, base64-encoded on the wire.
///
/// Used both for ciphertexts (width = `⌈log2(n²)/8⌉`) and for the smaller
/// values inside a [`WirePartialDecryption`]/proof, which share the same
/// modulus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedWidthInteger {
    width_bytes: usize,
    bytes: Vec<u8>,
}

impl FixedWidthInteger {
    /// Encodes `value` into exactly `width_bytes`, zero-padded on the left.
    ///
    /// Panics if `value` does not fit in `width_bytes` — this would indicate
    /// a caller passing the wrong modulus width, a programming error rather
    /// than untrusted input (untrusted wire values go through `decode`,
    /// which never panics).
    pub fn encode(value: &BigUint, width_bytes: usize) -> Self {
        let raw = value.to_bytes_be();
        assert!(
            raw.len() <= width_bytes,
            "value does not fit in {width_bytes} bytes"
        );
        let mut bytes = vec![0u8; width_bytes - raw.len()];
        bytes.extend_from_slice(&raw);
        Self { width_bytes, bytes }
    }

    /// Decodes back to a [`BigUint`].
    pub fn decode(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    /// The fixed-width big-endian byte representation, used directly when
    /// building the verification hash's canonical input.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Serialize for FixedWidthInteger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(&self.bytes))
    }
}

impl<'de> Deserialize<'de> for FixedWidthInteger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = Base64::decode_vec(&encoded).map_err(DeError::custom)?;
        Ok(Self {
            width_bytes: bytes.len(),
            bytes,
        })
    }
}

/// Computes the fixed ciphertext width (in bytes) for a Paillier modulus of
/// `n_bits` bits: `⌈log2(n²)/8⌉ = ⌈(2*n_bits)/8⌉`.
pub fn ciphertext_width_bytes(n_bits: u64) -> usize {
    ((2 * n_bits) as usize).div_ceil(8)
}

/// A ciphertext as it travels over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireCiphertext(FixedWidthInteger);

impl WireCiphertext {
    /// Encodes a [`Ciphertext`] at the given fixed width.
    pub fn encode(ciphertext: &Ciphertext, width_bytes: usize) -> Self {
        Self(FixedWidthInteger::encode(ciphertext.value(), width_bytes))
    }

    /// Decodes back to a [`Ciphertext`].
    pub fn decode(&self) -> Ciphertext {
        Ciphertext::from_raw(self.0.decode())
    }

    /// Fixed-width big-endian bytes, for hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// A trustee's partial decryption of one candidate's aggregated ciphertext,
/// as it travels over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePartialDecryption {
    /// Which candidate this partial decryption is for, 0-based position in
    /// the election's candidate order.
    pub candidate_position: u16,
    value: FixedWidthInteger,
    trustee_index: u16,
}

impl WirePartialDecryption {
    /// Encodes a [`PartialDecryption`] for wire transmission.
    pub fn encode(candidate_position: u16, partial: &PartialDecryption, width_bytes: usize) -> Self {
        Self {
            candidate_position,
            value: FixedWidthInteger::encode(partial.value(), width_bytes),
            trustee_index: partial.trustee_index,
        }
    }

    /// Reconstructs the [`PartialDecryption`] carried by this message.
    pub fn decode(&self) -> PartialDecryption {
        PartialDecryption::from_parts(self.trustee_index, self.value.decode())
    }
}

/// A Chaum–Pedersen proof of correct partial decryption, as it travels over
/// the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChaumPedersenProof {
    t1: FixedWidthInteger,
    t2: FixedWidthInteger,
    response: FixedWidthInteger,
}

impl WireChaumPedersenProof {
    /// Encodes a [`ChaumPedersenProof`] for wire transmission.
    pub fn encode(proof: &ChaumPedersenProof, width_bytes: usize) -> Self {
        let (t1, t2, response) = proof.as_parts();
        Self {
            t1: FixedWidthInteger::encode(t1, width_bytes),
            t2: FixedWidthInteger::encode(t2, width_bytes),
            response: FixedWidthInteger::encode(response, width_bytes),
        }
    }

    /// Reconstructs the [`ChaumPedersenProof`] carried by this message.
    pub fn decode(&self) -> ChaumPedersenProof {
        ChaumPedersenProof::from_parts(self.t1.decode(), self.t2.decode(), self.response.decode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_integer_round_trips() {
        let value = BigUint::from(12345u32);
        let encoded = FixedWidthInteger::encode(&value, 32);
        assert_eq!(encoded.as_bytes().len(), 32);
        assert_eq!(encoded.decode(), value);
    }

    #[test]
    fn ciphertext_width_matches_spec_formula() {
        assert_eq!(ciphertext_width_bytes(2048), 512);
        assert_eq!(ciphertext_width_bytes(256), 64);
    }
}
