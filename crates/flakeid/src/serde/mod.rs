//! Field adapters for `#[serde(with = "...")]`.
//!
//! [`Snowflake`](crate::Snowflake) itself serializes as its native integer.
//! These modules let a field pick its wire form explicitly, which matters
//! for consumers such as JavaScript that cannot hold a 64-bit integer
//! without losing precision.

mod snowflake;

pub use snowflake::*;
