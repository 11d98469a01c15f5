//! The batched tree expander: the single kernel both DPF key generation and
//! DPF key evaluation drive, one tree level at a time.
//!
//! Given `N` parent `(seed, control bit)` pairs, a per-node path bit (which
//! child to descend into), and the level's single public correction word,
//! this produces `N` child `(seed, control bit)` pairs. Two independent
//! implementations are kept: [`expand_level_scalar`], a one-node-at-a-time
//! reference, and [`expand_level_wide`], which calls the PRG once per side
//! across the whole batch (the shape spec'd for SIMD-style throughput).
//! They must agree bit-for-bit on every input - that agreement is the
//! parity property this module's tests check directly.

use std::io::{Read, Write};

use crate::block::{require_equal_len, Block};
use crate::prg::CorrelationRobustPrg;
use crate::utils::{u8 as read_u8, write_u8};
use crate::{Error, Result};

/// Below this batch size, [`expand_level_wide`] just runs in the calling
/// thread; above it, the `parallel` feature shards the per-node
/// correction/select step across `rayon`'s thread pool. The PRG calls
/// themselves are always made once per side regardless.
const PARALLEL_THRESHOLD: usize = 4096;

/// The public per-level correction material: one `cs` applied to both
/// children's seeds, and one control-bit correction per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionWord {
    pub cs: Block,
    pub t_l: u8,
    pub t_r: u8,
}

impl CorrectionWord {
    pub(crate) fn read<R: Read>(r: &mut R) -> Result<Self> {
        let cs = Block::read(r)?;
        let t_l = read_u8(r)?;
        let t_r = read_u8(r)?;
        Ok(CorrectionWord { cs, t_l, t_r })
    }

    pub(crate) fn write<W: Write>(self, w: &mut W) -> Result<()> {
        self.cs.write(w)?;
        write_u8(w, self.t_l)?;
        write_u8(w, self.t_r)?;
        Ok(())
    }
}

fn validate_control_bits(t_in: &[u8]) -> Result<()> {
    if t_in.iter().any(|&t| t > 1) {
        return Err(Error::invalid_argument("control bits must be 0 or 1"));
    }
    Ok(())
}

fn validate_path_bits(path_bits: &[u8]) -> Result<()> {
    if path_bits.iter().any(|&b| b > 1) {
        return Err(Error::invalid_argument("path bits must be 0 or 1"));
    }
    Ok(())
}

fn validate_lengths(n: usize, t_in: &[u8], path_bits: &[u8], seeds_out: &[Block], t_out: &[u8]) -> Result<()> {
    require_equal_len(n, t_in.len(), "expand_level: t_in")?;
    require_equal_len(n, path_bits.len(), "expand_level: path_bits")?;
    require_equal_len(n, seeds_out.len(), "expand_level: seeds_out")?;
    require_equal_len(n, t_out.len(), "expand_level: t_out")?;
    Ok(())
}

/// Apply the level's correction (gated on `t_in`) to one node's raw PRG
/// outputs, then select the chosen child by `path_bit`. Shared by both the
/// scalar and wide implementations so their semantics never diverge.
#[inline]
fn correct_and_select(
    raw_l: Block,
    raw_r: Block,
    t_in: u8,
    path_bit: u8,
    cw: &CorrectionWord,
) -> (Block, u8) {
    let t_l_raw = raw_l.lsb();
    let t_r_raw = raw_r.lsb();

    let (l, t_l) = if t_in == 1 {
        (raw_l ^ cw.cs, t_l_raw ^ cw.t_l)
    } else {
        (raw_l, t_l_raw)
    };
    let (r, t_r) = if t_in == 1 {
        (raw_r ^ cw.cs, t_r_raw ^ cw.t_r)
    } else {
        (raw_r, t_r_raw)
    };

    if path_bit == 0 { (l, t_l) } else { (r, t_r) }
}

/// Reference, non-batched tree expander: evaluates the PRG once per node,
/// per side. Always correct, never the fast path. This is the oracle
/// [`expand_level_wide`] is tested against.
pub fn expand_level_scalar(
    seeds_in: &[Block],
    t_in: &[u8],
    path_bits: &[u8],
    cw: &CorrectionWord,
    seeds_out: &mut [Block],
    t_out: &mut [u8],
) -> Result<()> {
    let n = seeds_in.len();
    validate_lengths(n, t_in, path_bits, seeds_out, t_out)?;
    validate_control_bits(t_in)?;
    validate_path_bits(path_bits)?;

    let left = CorrelationRobustPrg::left();
    let right = CorrelationRobustPrg::right();

    for i in 0..n {
        let mut raw_l = [Block::ZERO; 1];
        let mut raw_r = [Block::ZERO; 1];
        left.evaluate(&seeds_in[i..=i], &mut raw_l)?;
        right.evaluate(&seeds_in[i..=i], &mut raw_r)?;
        let (s, t) = correct_and_select(raw_l[0], raw_r[0], t_in[i], path_bits[i], cw);
        seeds_out[i] = s;
        t_out[i] = t;
    }
    Ok(())
}

/// Batched tree expander: evaluates each PRG once across the whole batch,
/// then applies the per-node correction/select step (optionally sharded
/// across threads via the `parallel` feature once `N` is large).
pub fn expand_level_wide(
    seeds_in: &[Block],
    t_in: &[u8],
    path_bits: &[u8],
    cw: &CorrectionWord,
    seeds_out: &mut [Block],
    t_out: &mut [u8],
) -> Result<()> {
    let n = seeds_in.len();
    validate_lengths(n, t_in, path_bits, seeds_out, t_out)?;
    validate_control_bits(t_in)?;
    validate_path_bits(path_bits)?;

    if n == 0 {
        return Ok(());
    }

    let left = CorrelationRobustPrg::left();
    let right = CorrelationRobustPrg::right();

    let mut raw_l = vec![Block::ZERO; n];
    let mut raw_r = vec![Block::ZERO; n];
    left.evaluate(seeds_in, &mut raw_l)?;
    right.evaluate(seeds_in, &mut raw_r)?;

    #[cfg(feature = "parallel")]
    {
        if n >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;
            seeds_out
                .par_iter_mut()
                .zip(t_out.par_iter_mut())
                .enumerate()
                .for_each(|(i, (s_out, t_out))| {
                    let (s, t) = correct_and_select(raw_l[i], raw_r[i], t_in[i], path_bits[i], cw);
                    *s_out = s;
                    *t_out = t;
                });
            return Ok(());
        }
    }

    for i in 0..n {
        let (s, t) = correct_and_select(raw_l[i], raw_r[i], t_in[i], path_bits[i], cw);
        seeds_out[i] = s;
        t_out[i] = t;
    }
    Ok(())
}

/// The implementation used everywhere else in this crate: currently an
/// alias for [`expand_level_wide`]. Kept as a separate name so call sites
/// (DPF `gen`/`eval`) read as "the fast path" rather than naming one
/// implementation directly.
#[inline]
pub fn expand_level(
    seeds_in: &[Block],
    t_in: &[u8],
    path_bits: &[u8],
    cw: &CorrectionWord,
    seeds_out: &mut [Block],
    t_out: &mut [u8],
) -> Result<()> {
    expand_level_wide(seeds_in, t_in, path_bits, cw, seeds_out, t_out)
}
