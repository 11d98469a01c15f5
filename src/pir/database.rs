//! The dense, block-aligned database that backs a PIR server's answer
//! computation.
//!
//! Values are appended once into a single flat `Vec<Block>`, padded up to
//! the next 16-byte boundary; a parallel `(start_block, byte_len)` table
//! remembers each value's true extent so it can be reconstructed without
//! the trailing zero padding. The builder/database split mirrors the usual
//! accumulate-then-freeze shape: a builder tracks whether it has already
//! been built and refuses a second `build`, so [`Database::inner_product_with`]
//! never has to worry about the data moving under it mid-query.

use crate::block::Block;
use crate::{Error, Result};

/// Accumulates values into a [`Database`]. `build` may only be called once;
/// a second call fails with [`Error::FailedPrecondition`] rather than
/// silently returning an empty database.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    buffer: Vec<Block>,
    offsets: Vec<(usize, usize)>,
    max_len: usize,
    built: bool,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Append a value, returning the index it was assigned (`0`-based, in
    /// insertion order).
    pub fn insert(&mut self, value: &[u8]) -> Result<usize> {
        if self.built {
            return Err(Error::failed_precondition(
                "Builder::insert called after build",
            ));
        }
        let start_block = self.buffer.len();
        let num_blocks = value.len().div_ceil(16);
        let mut padded = vec![0u8; num_blocks * 16];
        padded[..value.len()].copy_from_slice(value);
        for chunk in padded.chunks_exact(16) {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(chunk);
            self.buffer.push(Block::from_bytes(bytes));
        }
        self.offsets.push((start_block, value.len()));
        self.max_len = self.max_len.max(value.len());
        Ok(self.offsets.len() - 1)
    }

    /// Freeze the accumulated values into an immutable [`Database`].
    ///
    /// A database of zero rows, or one whose values are all empty, builds
    /// successfully - it's only rejected once something tries to run an
    /// inner product against it (see [`Database::inner_product_with`]),
    /// since "no values yet" and "no meaningful output size" are different
    /// failures for a caller to handle. Calling `build` a second time on
    /// the same builder fails with `FailedPrecondition` instead.
    pub fn build(&mut self) -> Result<Database> {
        if self.built {
            return Err(Error::failed_precondition(
                "Builder::build called a second time",
            ));
        }
        self.built = true;
        tracing::debug!(
            rows = self.offsets.len(),
            max_len = self.max_len,
            "building pir database"
        );
        Ok(Database {
            buffer: std::mem::take(&mut self.buffer),
            offsets: std::mem::take(&mut self.offsets),
            max_len: self.max_len,
        })
    }
}

/// An immutable, block-aligned database of byte-string values.
#[derive(Debug, Clone)]
pub struct Database {
    buffer: Vec<Block>,
    offsets: Vec<(usize, usize)>,
    max_len: usize,
}

impl Database {
    /// The number of rows (values) in this database.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The length in bytes of the longest value in this database. `0` if
    /// the database is empty or holds only empty values.
    pub fn max_value_len(&self) -> usize {
        self.max_len
    }

    /// Reconstruct the original bytes of the value at `index`.
    pub fn value(&self, index: usize) -> Result<Vec<u8>> {
        let &(start_block, byte_len) = self
            .offsets
            .get(index)
            .ok_or_else(|| Error::invalid_argument(format!("index {index} is out of range (len = {})", self.len())))?;
        let num_blocks = byte_len.div_ceil(16);
        let mut bytes = Vec::with_capacity(num_blocks * 16);
        for block in &self.buffer[start_block..start_block + num_blocks] {
            bytes.extend_from_slice(&block.to_bytes());
        }
        bytes.truncate(byte_len);
        Ok(bytes)
    }

    /// Compute, for each selection vector, the XOR of every row whose
    /// corresponding bit is set. Each selection vector must pack at least
    /// [`Database::len`] bits. See [`crate::pir::inner_product`] for the
    /// full contract (preconditions, padding behavior).
    pub fn inner_product_with(&self, selection_vectors: &[&[Block]]) -> Result<Vec<Vec<u8>>> {
        super::inner_product::inner_product_over_database(self, selection_vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_through_varied_lengths() {
        let mut builder = Builder::new();
        let i0 = builder.insert(b"").unwrap();
        let i1 = builder.insert(b"hello").unwrap();
        let i2 = builder.insert(&[0xAAu8; 33]).unwrap();
        let db = builder.build().unwrap();

        assert_eq!(db.len(), 3);
        assert_eq!(db.max_value_len(), 33);
        assert_eq!(db.value(i0).unwrap(), b"".to_vec());
        assert_eq!(db.value(i1).unwrap(), b"hello".to_vec());
        assert_eq!(db.value(i2).unwrap(), vec![0xAAu8; 33]);
    }

    #[test]
    fn out_of_range_index_is_invalid_argument() {
        let db = Builder::new().build().unwrap();
        let err = db.value(0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn empty_database_has_zero_max_len() {
        let db = Builder::new().build().unwrap();
        assert!(db.is_empty());
        assert_eq!(db.max_value_len(), 0);
    }

    #[test]
    fn building_twice_is_a_failed_precondition() {
        let mut builder = Builder::new();
        builder.insert(b"row").unwrap();
        builder.build().unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition(_)));
    }

    #[test]
    fn inserting_after_build_is_a_failed_precondition() {
        let mut builder = Builder::new();
        builder.build().unwrap();
        let err = builder.insert(b"too late").unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition(_)));
    }
}
