#[cfg(any(feature = "async-tokio", feature = "async-smol"))]
mod runtime;
mod sleep_provider;
mod snowflake;
mod stream;

#[cfg_attr(docsrs, doc(cfg(any(feature = "async-tokio", feature = "async-smol"))))]
#[cfg(any(feature = "async-tokio", feature = "async-smol"))]
pub use runtime::*;
pub use sleep_provider::*;
pub use snowflake::*;
pub use stream::*;
