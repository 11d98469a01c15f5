//! Distributed point functions.
//!
//! A DPF key pair `(k0, k1)` for `(alpha, beta, domain_bits)` lets each of
//! two parties evaluate a share of `f(x) = beta * [x == alpha]` at any point
//! `x` in `0..2^domain_bits`, such that `Eval(k0, x) XOR Eval(k1, x)` equals
//! `f(x)` for every `x`, while neither key alone reveals `alpha` or `beta`.
//! Construction follows the standard two-party point-function scheme (Boyle,
//! Gilboa, Ishai): one binary seed tree per key, corrected level-by-level so
//! the two parties' seeds collide everywhere except along the path to
//! `alpha`, plus one trailing output correction word.

mod tree;

pub use tree::{expand_level, expand_level_scalar, expand_level_wide, CorrectionWord};

use std::io::Cursor;

use rand::Rng;

use crate::block::{conditional_xor, Block};
use crate::prg::CorrelationRobustPrg;
use crate::utils::{le_u32, u8 as read_u8, write_le_u32, write_u8};
use crate::{Error, Result};

/// One party's half of a DPF key pair.
///
/// `correction_words` holds `domain_bits + 1` entries: one per tree level,
/// plus a trailing entry whose `cs` field carries the final output
/// correction word `W` (its `t_l`/`t_r` fields are unused and always zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    party: u8,
    domain_bits: u32,
    root_seed: Block,
    root_t: u8,
    correction_words: Vec<CorrectionWord>,
}

impl Key {
    /// Which party this key belongs to: `0` or `1`.
    pub fn party(&self) -> u8 {
        self.party
    }

    /// The domain size this key was generated for, in bits.
    pub fn domain_bits(&self) -> u32 {
        self.domain_bits
    }

    fn check_domain(&self, x: u64) -> Result<()> {
        if self.domain_bits < 64 && x >= (1u64 << self.domain_bits) {
            return Err(Error::invalid_argument(format!(
                "x = {x} is outside the domain of 2^{} points",
                self.domain_bits
            )));
        }
        Ok(())
    }

    /// Generate a DPF key pair for `f(x) = beta * [x == alpha]` over a
    /// domain of `2^domain_bits` points.
    pub fn r#gen(alpha: u64, beta: Block, domain_bits: u32) -> Result<(Key, Key)> {
        if domain_bits == 0 || domain_bits > 64 {
            return Err(Error::invalid_argument("domain_bits must be in 1..=64"));
        }
        if domain_bits < 64 && alpha >= (1u64 << domain_bits) {
            return Err(Error::invalid_argument("alpha is outside the requested domain"));
        }

        tracing::debug!(domain_bits, "generating dpf key pair");

        let mut rng = rand::thread_rng();
        let root_s0 = Block::new(rng.r#gen(), rng.r#gen());
        let root_s1 = Block::new(rng.r#gen(), rng.r#gen());

        let left = CorrelationRobustPrg::left();
        let right = CorrelationRobustPrg::right();

        let mut s0 = root_s0;
        let mut s1 = root_s1;
        let mut t0 = 0u8;
        let mut t1 = 1u8;

        let mut correction_words = Vec::with_capacity(domain_bits as usize + 1);

        for i in 0..domain_bits {
            let alpha_bit = ((alpha >> (domain_bits - 1 - i)) & 1) as u8;

            let mut s0l = [Block::ZERO; 1];
            let mut s0r = [Block::ZERO; 1];
            let mut s1l = [Block::ZERO; 1];
            let mut s1r = [Block::ZERO; 1];
            left.evaluate(&[s0], &mut s0l)?;
            right.evaluate(&[s0], &mut s0r)?;
            left.evaluate(&[s1], &mut s1l)?;
            right.evaluate(&[s1], &mut s1r)?;

            let (s0l, s0r, s1l, s1r) = (s0l[0], s0r[0], s1l[0], s1r[0]);
            let (t0l, t0r, t1l, t1r) = (s0l.lsb(), s0r.lsb(), s1l.lsb(), s1r.lsb());

            let cs = if alpha_bit == 0 { s0r ^ s1r } else { s0l ^ s1l };
            let cw = CorrectionWord {
                cs,
                t_l: t0l ^ t1l ^ alpha_bit ^ 1,
                t_r: t0r ^ t1r ^ alpha_bit,
            };

            let mut seeds_out = [Block::ZERO; 2];
            let mut t_out = [0u8; 2];
            tree::expand_level_scalar(
                &[s0, s1],
                &[t0, t1],
                &[alpha_bit, alpha_bit],
                &cw,
                &mut seeds_out,
                &mut t_out,
            )?;
            s0 = seeds_out[0];
            t0 = t_out[0];
            s1 = seeds_out[1];
            t1 = t_out[1];

            correction_words.push(cw);
        }

        let w = beta ^ s0 ^ s1;
        correction_words.push(CorrectionWord {
            cs: w,
            t_l: 0,
            t_r: 0,
        });

        let key0 = Key {
            party: 0,
            domain_bits,
            root_seed: root_s0,
            root_t: 0,
            correction_words: correction_words.clone(),
        };
        let key1 = Key {
            party: 1,
            domain_bits,
            root_seed: root_s1,
            root_t: 1,
            correction_words,
        };
        Ok((key0, key1))
    }

    /// Evaluate this key's share of `f(x)` at a single point.
    pub fn eval(&self, x: u64) -> Result<Block> {
        self.check_domain(x)?;
        let mut seed = self.root_seed;
        let mut t = self.root_t;
        for i in 0..self.domain_bits {
            let bit = ((x >> (self.domain_bits - 1 - i)) & 1) as u8;
            let cw = &self.correction_words[i as usize];
            let mut seed_out = [Block::ZERO; 1];
            let mut t_out = [0u8; 1];
            tree::expand_level(&[seed], &[t], &[bit], cw, &mut seed_out, &mut t_out)?;
            seed = seed_out[0];
            t = t_out[0];
        }
        let w = self.correction_words[self.domain_bits as usize].cs;
        Ok(conditional_xor(seed, t, w))
    }

    /// Evaluate this key's share of `f(x)` at every point in `xs`, sharing
    /// one batched PRG call per tree level across the whole request.
    pub fn eval_batch(&self, xs: &[u64]) -> Result<Vec<Block>> {
        for &x in xs {
            self.check_domain(x)?;
        }
        let n = xs.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        tracing::trace!(party = self.party, count = n, domain_bits = self.domain_bits, "evaluating dpf key batch");

        let mut seeds = vec![self.root_seed; n];
        let mut ts = vec![self.root_t; n];

        for i in 0..self.domain_bits {
            let cw = &self.correction_words[i as usize];
            let path_bits: Vec<u8> = xs
                .iter()
                .map(|&x| ((x >> (self.domain_bits - 1 - i)) & 1) as u8)
                .collect();
            let mut seeds_out = vec![Block::ZERO; n];
            let mut t_out = vec![0u8; n];
            tree::expand_level(&seeds, &ts, &path_bits, cw, &mut seeds_out, &mut t_out)?;
            seeds = seeds_out;
            ts = t_out;
        }

        let w = self.correction_words[self.domain_bits as usize].cs;
        Ok(seeds
            .iter()
            .zip(ts.iter())
            .map(|(&s, &t)| conditional_xor(s, t, w))
            .collect())
    }

    /// Serialize this key to its wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_u8(&mut buf, self.party)?;
        write_le_u32(&mut buf, self.domain_bits)?;
        self.root_seed.write(&mut buf)?;
        write_u8(&mut buf, self.root_t)?;
        write_le_u32(&mut buf, self.correction_words.len() as u32)?;
        for cw in &self.correction_words {
            cw.write(&mut buf)?;
        }
        Ok(buf)
    }

    /// Deserialize a key previously produced by [`Key::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let party = read_u8(&mut cur)?;
        let domain_bits = le_u32(&mut cur)?;
        let root_seed = Block::read(&mut cur)?;
        let root_t = read_u8(&mut cur)?;
        let count = le_u32(&mut cur)? as usize;
        let mut correction_words = Vec::with_capacity(count);
        for _ in 0..count {
            correction_words.push(CorrectionWord::read(&mut cur)?);
        }
        if correction_words.len() != domain_bits as usize + 1 {
            return Err(Error::invalid_argument(
                "correction word count does not match domain_bits",
            ));
        }
        Ok(Key {
            party,
            domain_bits,
            root_seed,
            root_t,
            correction_words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_and_eval_batch_emit_tracing_spans_without_panicking() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (k0, _k1) = Key::r#gen(3, Block::new(1, 1), 4).unwrap();
        k0.eval_batch(&[0, 1, 2, 3]).unwrap();
    }

    #[test]
    fn shares_recombine_to_beta_at_alpha_and_zero_elsewhere() {
        let domain_bits = 6;
        let alpha = 23u64;
        let beta = Block::new(0, 0xC0FFEE);
        let (k0, k1) = Key::r#gen(alpha, beta, domain_bits).unwrap();

        for x in 0..(1u64 << domain_bits) {
            let y0 = k0.eval(x).unwrap();
            let y1 = k1.eval(x).unwrap();
            let combined = y0 ^ y1;
            if x == alpha {
                assert_eq!(combined, beta);
            } else {
                assert_eq!(combined, Block::ZERO);
            }
        }
    }

    #[test]
    fn eval_batch_matches_eval() {
        let domain_bits = 5;
        let (k0, _k1) = Key::r#gen(7, Block::new(1, 2), domain_bits).unwrap();
        let xs: Vec<u64> = (0..(1u64 << domain_bits)).collect();
        let batched = k0.eval_batch(&xs).unwrap();
        for (i, &x) in xs.iter().enumerate() {
            assert_eq!(batched[i], k0.eval(x).unwrap());
        }
    }

    #[test]
    fn eval_batch_on_empty_input_is_empty() {
        let (k0, _) = Key::r#gen(0, Block::ZERO, 4).unwrap();
        assert!(k0.eval_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn point_outside_domain_is_invalid_argument() {
        let (k0, _) = Key::r#gen(1, Block::ZERO, 3).unwrap();
        let err = k0.eval(8).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn alpha_outside_domain_is_rejected_at_gen() {
        let err = Key::r#gen(16, Block::ZERO, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn zero_domain_bits_is_rejected() {
        let err = Key::r#gen(0, Block::ZERO, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn wire_round_trip_preserves_evaluation() {
        let domain_bits = 8;
        let (k0, _k1) = Key::r#gen(200, Block::new(9, 9), domain_bits).unwrap();
        let bytes = k0.to_bytes().unwrap();
        let restored = Key::from_bytes(&bytes).unwrap();
        assert_eq!(restored.party(), k0.party());
        assert_eq!(restored.domain_bits(), k0.domain_bits());
        for x in [0u64, 1, 199, 200, 201, 255] {
            assert_eq!(restored.eval(x).unwrap(), k0.eval(x).unwrap());
        }
    }

    #[test]
    fn truncated_wire_bytes_are_rejected() {
        let (k0, _) = Key::r#gen(1, Block::ZERO, 4).unwrap();
        let mut bytes = k0.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(Key::from_bytes(&bytes).is_err());
    }
}
