//! Tillich-Zémor homomorphic hashing.
//!
//! The digest of a message is a product of 2x2 matrices over GF(2^127), one
//! matrix per message bit. Since matrix multiplication is associative, the
//! digest of a concatenation equals the product of the digests of its parts:
//! a parent object's checksum can be checked against its chunks' checksums
//! without re-reading payload bytes.
//!
//! Field: GF(2)\[x\] / (x^127 + x^63 + 1). Bit 0 maps to `A = [[x, 1], [1, 0]]`,
//! bit 1 to `B = [[x, x+1], [1, 1]]`, bits taken most-significant first. The
//! 64-byte digest is the four matrix entries in row-major order, each encoded
//! as a 16-byte big-endian integer.

use chunkline_types::TZ_SIZE;

const ELEMENT_SIZE: usize = 16;
const FIELD_MASK: u128 = (1 << 127) - 1;
const REDUCTION: u128 = (1 << 63) | 1;

/// Errors from decoding or combining Tillich-Zémor digests.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TzError {
    #[error("invalid Tillich-Zémor digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("digest element {index} is not a member of GF(2^127)")]
    InvalidElement { index: usize },
}

/// Multiply a field element by `x`.
fn mul_x(a: u128) -> u128 {
    let overflow = (a >> 126) & 1 == 1;
    let shifted = (a << 1) & FIELD_MASK;
    if overflow {
        shifted ^ REDUCTION
    } else {
        shifted
    }
}

fn mul(a: u128, b: u128) -> u128 {
    let mut acc = 0u128;
    for i in (0..127).rev() {
        acc = mul_x(acc);
        if (b >> i) & 1 == 1 {
            acc ^= a;
        }
    }
    acc
}

/// An element of SL2(GF(2^127)) in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Sl2([u128; 4]);

impl Sl2 {
    const IDENTITY: Self = Self([1, 0, 0, 1]);

    fn mul_bit(&mut self, bit: bool) {
        let [a, b, c, d] = self.0;
        let ax = mul_x(a);
        let cx = mul_x(c);
        self.0 = if bit {
            [ax ^ b, ax ^ a ^ b, cx ^ d, cx ^ c ^ d]
        } else {
            [ax ^ b, a, cx ^ d, c]
        };
    }

    fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.0;
        let [e, f, g, h] = other.0;
        Self([
            mul(a, e) ^ mul(b, g),
            mul(a, f) ^ mul(b, h),
            mul(c, e) ^ mul(d, g),
            mul(c, f) ^ mul(d, h),
        ])
    }

    fn to_bytes(self) -> [u8; TZ_SIZE] {
        let mut out = [0u8; TZ_SIZE];
        for (i, element) in self.0.iter().enumerate() {
            out[i * ELEMENT_SIZE..(i + 1) * ELEMENT_SIZE].copy_from_slice(&element.to_be_bytes());
        }
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, TzError> {
        if bytes.len() != TZ_SIZE {
            return Err(TzError::InvalidLength {
                expected: TZ_SIZE,
                actual: bytes.len(),
            });
        }
        let mut elements = [0u128; 4];
        for (index, chunk) in bytes.chunks_exact(ELEMENT_SIZE).enumerate() {
            let mut raw = [0u8; ELEMENT_SIZE];
            raw.copy_from_slice(chunk);
            let element = u128::from_be_bytes(raw);
            if element & !FIELD_MASK != 0 {
                return Err(TzError::InvalidElement { index });
            }
            elements[index] = element;
        }
        Ok(Self(elements))
    }
}

/// Incremental Tillich-Zémor hasher.
#[derive(Clone, Debug)]
pub struct TzHasher {
    state: Sl2,
}

impl TzHasher {
    pub fn new() -> Self {
        Self {
            state: Sl2::IDENTITY,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            for shift in (0..8).rev() {
                self.state.mul_bit((byte >> shift) & 1 == 1);
            }
        }
    }

    pub fn digest(&self) -> [u8; TZ_SIZE] {
        self.state.to_bytes()
    }
}

impl Default for TzHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot Tillich-Zémor digest of a buffer.
pub fn tz_hash(data: &[u8]) -> [u8; TZ_SIZE] {
    let mut hasher = TzHasher::new();
    hasher.update(data);
    hasher.digest()
}

/// Combine digests of consecutive parts into the digest of their
/// concatenation.
pub fn concat<D: AsRef<[u8]>>(parts: &[D]) -> Result<[u8; TZ_SIZE], TzError> {
    let mut acc = Sl2::IDENTITY;
    for part in parts {
        acc = acc.mul(&Sl2::from_bytes(part.as_ref())?);
    }
    Ok(acc.to_bytes())
}

/// Check that `expected` is the digest of the concatenation of `parts`.
pub fn validate<D: AsRef<[u8]>>(expected: &[u8], parts: &[D]) -> Result<bool, TzError> {
    let expected = Sl2::from_bytes(expected)?;
    Ok(Sl2::from_bytes(&concat(parts)?)? == expected)
}
