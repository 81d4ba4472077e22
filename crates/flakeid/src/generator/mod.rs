mod interface;
mod lock;
mod mutex;
mod status;
#[cfg(test)]
mod tests;

pub use interface::*;
pub use lock::*;
pub(crate) use mutex::*;
pub use status::*;
