//! Fixed-key AES-128 used as a batched random permutation.
//!
//! This is *not* encrypting a plaintext stream: every input block is a
//! fresh, near-random seed, so ECB mode's usual weaknesses (identical
//! plaintext blocks producing identical ciphertext blocks) don't apply
//! here. This is the standard "fixed-key AES as random permutation"
//! construction used by correlation-robust hash functions.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use once_cell::sync::Lazy;

use crate::block::{Block, require_equal_len};
use crate::{Error, Result};

/// Two arbitrary, compile-time-fixed AES-128 keys: one for the "left
/// child" PRG, one for "right child". Being public and constant is the
/// point - the security of this construction does not depend on these
/// keys being secret.
const FIXED_KEY_LEFT: [u8; 16] = [
    0x5A, 0x1F, 0x3C, 0x9E, 0x27, 0xB4, 0x88, 0x0D, 0xE1, 0x6A, 0xF0, 0x33, 0x7C, 0x52, 0x9B, 0xC8,
];
const FIXED_KEY_RIGHT: [u8; 16] = [
    0xD3, 0x44, 0x19, 0xA7, 0x6F, 0x02, 0xE8, 0x5B, 0x91, 0x3D, 0xC6, 0x2A, 0x78, 0xF1, 0x0E, 0x4C,
];

static LEFT_HASH: Lazy<FixedKeyAes> = Lazy::new(|| FixedKeyAes::new(FIXED_KEY_LEFT));
static RIGHT_HASH: Lazy<FixedKeyAes> = Lazy::new(|| FixedKeyAes::new(FIXED_KEY_RIGHT));

pub(crate) fn left_hash() -> &'static FixedKeyAes {
    &LEFT_HASH
}

pub(crate) fn right_hash() -> &'static FixedKeyAes {
    &RIGHT_HASH
}

/// Reports whether the active `aes` backend is hardware-accelerated on
/// this platform. Informational only - used in docs/tests to explain why
/// timings vary across machines, never on a hot path.
pub fn active_backend() -> &'static str {
    if cfg!(all(
        target_arch = "x86_64",
        target_feature = "aes",
        target_feature = "sse2"
    )) {
        "aes-ni"
    } else if cfg!(all(target_arch = "aarch64", target_feature = "aes")) {
        "armv8-aes"
    } else {
        "portable-fallback"
    }
}

/// AES-128-ECB keyed once at construction, callable many times with
/// batched 128-bit inputs.
pub struct FixedKeyAes {
    cipher: Aes128,
}

impl FixedKeyAes {
    pub fn new(key: [u8; 16]) -> Self {
        FixedKeyAes {
            cipher: Aes128::new(GenericArray::from_slice(&key)),
        }
    }

    /// `out[i] = AES-128-Encrypt(key, in[i])` for all `i`.
    pub fn hash(&self, input: &[Block], output: &mut [Block]) -> Result<()> {
        require_equal_len(input.len(), output.len(), "FixedKeyAes::hash")?;
        if input.is_empty() {
            return Ok(());
        }

        let mut buffers: Vec<_> = input
            .iter()
            .map(|b| *GenericArray::from_slice(&b.to_bytes()))
            .collect();

        self.cipher.encrypt_blocks(&mut buffers);

        if buffers.len() != output.len() {
            return Err(Error::internal(
                "aes backend returned a different number of blocks than requested",
            ));
        }
        for (out, buf) in output.iter_mut().zip(buffers.iter()) {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(buf.as_slice());
            *out = Block::from_bytes(bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let aes = FixedKeyAes::new(FIXED_KEY_LEFT);
        let input = vec![Block::new(1, 2), Block::new(3, 4)];
        let mut out1 = vec![Block::ZERO; 2];
        let mut out2 = vec![Block::ZERO; 2];
        aes.hash(&input, &mut out1).unwrap();
        aes.hash(&input, &mut out2).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn distinct_inputs_produce_distinct_outputs() {
        let aes = FixedKeyAes::new(FIXED_KEY_LEFT);
        let input = vec![Block::new(1, 2), Block::new(1, 3)];
        let mut out = vec![Block::ZERO; 2];
        aes.hash(&input, &mut out).unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let aes = FixedKeyAes::new(FIXED_KEY_LEFT);
        let mut out: Vec<Block> = Vec::new();
        assert!(aes.hash(&[], &mut out).is_ok());
    }

    #[test]
    fn length_mismatch_is_invalid_argument() {
        let aes = FixedKeyAes::new(FIXED_KEY_LEFT);
        let input = vec![Block::new(1, 2)];
        let mut out = vec![Block::ZERO; 2];
        let err = aes.hash(&input, &mut out).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn left_and_right_keys_are_distinct() {
        let input = vec![Block::new(42, 7)];
        let mut l = vec![Block::ZERO; 1];
        let mut r = vec![Block::ZERO; 1];
        left_hash().hash(&input, &mut l).unwrap();
        right_hash().hash(&input, &mut r).unwrap();
        assert_ne!(l, r);
    }
}
