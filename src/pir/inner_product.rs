//! The inner-product engine: the arithmetic at the heart of a PIR server's
//! answer.
//!
//! `InnerProduct(values, selectionVectors, maxLen)` XORs every value whose
//! selection bit is set into that selection vector's accumulator, for each
//! of `S` independently-selected accumulators at once. Each selection
//! vector is a sequence of [`Block`]s packing at least `values.len()` bits
//! (bit `128*idx + j` is bit `j` of block `idx`, counting from the
//! low-order bit) - the same packed-bitmask shape a DPF `eval_batch` output
//! would be repacked into before being handed to this engine.
//!
//! Two implementations are kept in lockstep: [`inner_product_scalar`] XORs
//! one byte at a time and exists purely as the correctness oracle;
//! [`inner_product_wide`] XORs in 16-byte (block-aligned values) or 8-byte
//! (everything else) chunks, finishing any remainder by halving the chunk
//! size down to a single byte rather than falling back to a byte loop for
//! the whole tail.
//!
//! **Skip-on-zero is deliberate, not an oversight.** [`run`] skips every
//! value whose selection bit is zero rather than XOR-ing it in unmasked -
//! a constant-time variant would XOR every value regardless of its bit, at
//! roughly twice the cost. In the two-party PIR deployment this engine
//! serves, the selection vector is a secret share the server never
//! reconstructs, so which values get skipped leaks nothing the server
//! didn't already not-know; this relaxation does not hold if this engine
//! is ever reused somewhere the selection vector itself is attacker-visible.

use super::database::Database;
use crate::block::Block;
use crate::error::ErrorPayload;
use crate::{Error, Result};

#[inline]
fn bit_at(selection: &[Block], i: usize) -> u8 {
    let block = selection[i / 128];
    let j = i % 128;
    (if j < 64 {
        (block.low >> j) & 1
    } else {
        (block.high >> (j - 64)) & 1
    }) as u8
}

/// Finish a chunked XOR pass's remainder by halving the chunk width,
/// gating each width by the corresponding bit of `r = n - i` - so a
/// 16-byte main loop's tail takes at most the widths `8, 4, 2, 1`, a
/// fixed `ceil(log2(start_chunk))` steps regardless of `r`'s value,
/// rather than looping a single width until it stops fitting.
fn xor_tail(acc: &mut [u8], value: &[u8], i_start: usize, n: usize, start_chunk: usize) {
    let r = n - i_start;
    let mut i = i_start;
    let mut chunk = start_chunk / 2;
    while chunk >= 1 {
        if r & chunk != 0 {
            for j in 0..chunk {
                acc[i + j] ^= value[i + j];
            }
            i += chunk;
        }
        chunk /= 2;
    }
}

fn xor_into_scalar(acc: &mut [u8], value: &[u8]) {
    let n = value.len().min(acc.len());
    for i in 0..n {
        acc[i] ^= value[i];
    }
}

fn xor_into_words(acc: &mut [u8], value: &[u8]) {
    let n = value.len().min(acc.len());
    let mut i = 0;
    while i + 8 <= n {
        for j in 0..8 {
            acc[i + j] ^= value[i + j];
        }
        i += 8;
    }
    xor_tail(acc, value, i, n, 8);
}

fn xor_into_blocks(acc: &mut [u8], value: &[u8]) {
    let n = value.len().min(acc.len());
    let mut i = 0;
    while i + 16 <= n {
        for j in 0..16 {
            acc[i + j] ^= value[i + j];
        }
        i += 16;
    }
    xor_tail(acc, value, i, n, 16);
}

fn validate(values: &[&[u8]], selection_vectors: &[&[Block]], max_len: usize) -> Result<()> {
    if max_len == 0 {
        return Err(Error::invalid_argument_with_payload(
            "max_len must be greater than zero",
            ErrorPayload::MaxValueSizeIsZero,
        ));
    }
    for (i, value) in values.iter().enumerate() {
        if value.len() > max_len {
            return Err(Error::invalid_argument(format!(
                "values[{i}] has length {} which exceeds max_len {max_len}",
                value.len()
            )));
        }
    }
    let expected_blocks = selection_vectors.first().map(|sv| sv.len());
    for (k, sv) in selection_vectors.iter().enumerate() {
        if Some(sv.len()) != expected_blocks {
            return Err(Error::invalid_argument(
                "all selection vectors must have identical length",
            ));
        }
        if sv.len() * 128 < values.len() {
            return Err(Error::invalid_argument(format!(
                "selection_vectors[{k}] has insufficient number of bits for {} values",
                values.len()
            )));
        }
    }
    Ok(())
}

/// Drives both [`inner_product_scalar`] and [`inner_product_wide`]. See the
/// module header for why a zero selection bit means the value is skipped
/// outright rather than XOR-ed in under a mask.
fn run(values: &[&[u8]], selection_vectors: &[&[Block]], max_len: usize, xor_into: impl Fn(&mut [u8], &[u8])) -> Result<Vec<Vec<u8>>> {
    if selection_vectors.is_empty() {
        return Ok(Vec::new());
    }
    validate(values, selection_vectors, max_len)?;

    tracing::trace!(
        values = values.len(),
        vectors = selection_vectors.len(),
        max_len,
        "running pir inner product"
    );

    let mut responses = Vec::with_capacity(selection_vectors.len());
    for selection in selection_vectors {
        let mut accumulator = vec![0u8; max_len];
        for (i, &value) in values.iter().enumerate() {
            if bit_at(selection, i) == 1 {
                xor_into(&mut accumulator, value);
            }
        }
        responses.push(accumulator);
    }
    Ok(responses)
}

/// Reference implementation: one byte at a time. Never the fast path; only
/// used to check [`inner_product_wide`] for parity.
pub fn inner_product_scalar(values: &[&[u8]], selection_vectors: &[&[Block]], max_len: usize) -> Result<Vec<Vec<u8>>> {
    run(values, selection_vectors, max_len, xor_into_scalar)
}

/// Word- or block-batched implementation: 16-byte chunks when every value
/// is exactly `max_len` bytes and `max_len` is block-aligned, 8-byte chunks
/// otherwise, with any remainder finished by halving the chunk size.
pub fn inner_product_wide(values: &[&[u8]], selection_vectors: &[&[Block]], max_len: usize) -> Result<Vec<Vec<u8>>> {
    if max_len % 16 == 0 {
        run(values, selection_vectors, max_len, xor_into_blocks)
    } else {
        run(values, selection_vectors, max_len, xor_into_words)
    }
}

/// The implementation used by [`Database::inner_product_with`].
pub fn inner_product(values: &[&[u8]], selection_vectors: &[&[Block]], max_len: usize) -> Result<Vec<Vec<u8>>> {
    inner_product_wide(values, selection_vectors, max_len)
}

/// Gather every row of `database` and run [`inner_product`] against it.
/// The entry point `Database::inner_product_with` forwards to this.
pub(super) fn inner_product_over_database(database: &Database, selection_vectors: &[&[Block]]) -> Result<Vec<Vec<u8>>> {
    if selection_vectors.is_empty() {
        return Ok(Vec::new());
    }
    let max_len = database.max_value_len();
    if max_len == 0 {
        return Err(Error::invalid_argument_with_payload(
            "database has no non-empty values to aggregate",
            ErrorPayload::MaxValueSizeIsZero,
        ));
    }
    let owned_values: Vec<Vec<u8>> = (0..database.len()).map(|i| database.value(i)).collect::<Result<_>>()?;
    let values: Vec<&[u8]> = owned_values.iter().map(|v| v.as_slice()).collect();
    inner_product(&values, selection_vectors, max_len)
}

/// Pack a sequence of 0/1 bytes, one per value, into the `&[Block]`
/// selection-vector form this engine's `Gen`-facing callers rarely produce
/// directly by hand; used by tests and by callers translating a DPF
/// `eval_batch` bit share into wire form.
pub fn pack_selection_bits(bits: &[u8]) -> Vec<Block> {
    let num_blocks = bits.len().div_ceil(128);
    let mut blocks = vec![Block::ZERO; num_blocks];
    for (i, &bit) in bits.iter().enumerate() {
        if bit == 0 {
            continue;
        }
        let block = &mut blocks[i / 128];
        let j = i % 128;
        if j < 64 {
            block.low |= 1u64 << j;
        } else {
            block.high |= 1u64 << (j - 64);
        }
    }
    blocks
}
