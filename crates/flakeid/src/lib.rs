#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
#[cfg(feature = "futures")]
mod futures;
mod generator;
mod id;
mod layout;
#[cfg(feature = "serde")]
pub mod serde;
mod time;

pub use crate::error::*;
#[cfg_attr(docsrs, doc(cfg(feature = "futures")))]
#[cfg(feature = "futures")]
pub use crate::futures::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::layout::*;
pub use crate::time::*;
