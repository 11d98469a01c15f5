//! Private information retrieval, built on top of the DPF keys in
//! [`crate::dpf`].
//!
//! A client builds a DPF key pair with `beta = 1` at the index it wants;
//! each server evaluates its key share over every row of its local
//! [`Database`] to get a selection vector, and feeds that vector to
//! [`Database::inner_product_with`] to get its share of the answer. XORing
//! the two servers' answers recovers the requested row, without either
//! server learning which index was requested.

pub mod database;
pub mod inner_product;

pub use database::{Builder, Database};
pub use inner_product::{inner_product, inner_product_scalar, inner_product_wide};
