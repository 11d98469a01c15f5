//! The correlation-robust pseudorandom generator.
//!
//! `F_k(x) = pi_k(sigma(x)) ^ sigma(x)`, where `pi_k` is fixed-key AES-128
//! (see [`aes`]) and `sigma` is the linear orthomorphism
//! `(h, l) -> (h ^ l, h)` defined on [`Block`]. The feed-forward XOR is the
//! Matyas-Meyer-Oseas construction; `sigma` is what keeps the two PRGs used
//! at each DPF tree level from being linearly correlated (eprint 2019/074).

pub mod aes;

pub use self::aes::{FixedKeyAes, active_backend};

use crate::Block;
use crate::Result;

/// One correlation-robust PRG, keyed by one fixed-key AES instance.
pub struct CorrelationRobustPrg<'a> {
    hash: &'a FixedKeyAes,
}

impl<'a> CorrelationRobustPrg<'a> {
    pub fn new(hash: &'a FixedKeyAes) -> Self {
        CorrelationRobustPrg { hash }
    }

    /// The PRG keyed for "left child" expansion at every DPF tree level.
    pub fn left() -> CorrelationRobustPrg<'static> {
        CorrelationRobustPrg::new(aes::left_hash())
    }

    /// The PRG keyed for "right child" expansion at every DPF tree level.
    pub fn right() -> CorrelationRobustPrg<'static> {
        CorrelationRobustPrg::new(aes::right_hash())
    }

    /// `out[i] = F(in[i])` for all `i`. Empty input is a valid no-op.
    pub fn evaluate(&self, input: &[Block], output: &mut [Block]) -> Result<()> {
        if input.is_empty() {
            return Ok(());
        }
        let sigma_in: Vec<Block> = input.iter().map(|b| b.sigma()).collect();
        self.hash.hash(&sigma_in, output)?;
        for (out, sigma) in output.iter_mut().zip(sigma_in.iter()) {
            *out ^= *sigma;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_input_is_a_no_op() {
        let prg = CorrelationRobustPrg::left();
        let mut out: Vec<Block> = Vec::new();
        prg.evaluate(&[], &mut out).unwrap();
        assert!(out.is_empty());
    }

    proptest! {
        #[test]
        fn batch_evaluation_matches_single_element_evaluation(h in any::<u64>(), l in any::<u64>()) {
            let x = Block::new(h, l);
            let prg = CorrelationRobustPrg::left();

            let mut batched = vec![Block::ZERO; 3];
            prg.evaluate(&[x, x, x], &mut batched).unwrap();

            let mut single = vec![Block::ZERO; 1];
            prg.evaluate(&[x], &mut single).unwrap();

            prop_assert_eq!(batched[0], single[0]);
            prop_assert_eq!(batched[1], single[0]);
            prop_assert_eq!(batched[2], single[0]);
        }

        #[test]
        fn left_and_right_prgs_disagree(h in any::<u64>(), l in any::<u64>()) {
            let x = Block::new(h, l);
            let mut l_out = vec![Block::ZERO; 1];
            let mut r_out = vec![Block::ZERO; 1];
            CorrelationRobustPrg::left().evaluate(&[x], &mut l_out).unwrap();
            CorrelationRobustPrg::right().evaluate(&[x], &mut r_out).unwrap();
            prop_assert_ne!(l_out[0], r_out[0]);
        }
    }
}
