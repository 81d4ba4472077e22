use core::{fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    layout::{Field, Layout},
};

/// A 64-bit Snowflake identifier.
///
/// The value is opaque on its own: fields can only be read back through the
/// [`Layout`] that produced it. Equality and ordering are those of the
/// underlying signed integer, which is also the canonical wire form, so IDs
/// produced under one layout sort by time.
///
/// # Example
///
/// ```
/// use flakeid::{Layout, Snowflake};
///
/// let id: Snowflake = "175928847299117063".parse().unwrap();
/// let parts = id.decompose(&Layout::DISCORD);
/// assert_eq!(parts.timestamp, 1_462_015_105_796);
/// assert_eq!(parts.worker_id, 1);
/// assert_eq!(parts.process_id, 0);
/// assert_eq!(parts.increment, 7);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake {
    id: i64,
}

/// The four decoded fields of a [`Snowflake`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parts {
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub worker_id: u64,
    pub process_id: u64,
    pub increment: u64,
}

impl Snowflake {
    /// Wraps a raw signed value.
    pub const fn from_raw(raw: i64) -> Self {
        Self { id: raw }
    }

    /// Returns the raw signed value.
    pub const fn to_raw(&self) -> i64 {
        self.id
    }

    /// Wraps a raw bit pattern.
    pub const fn from_bits(bits: u64) -> Self {
        Self { id: bits as i64 }
    }

    /// Returns the raw bit pattern.
    pub const fn to_bits(&self) -> u64 {
        self.id as u64
    }

    /// Reads a single field under `layout`. See [`Layout::field`].
    pub const fn get(&self, layout: &Layout, field: Field) -> i64 {
        layout.field(*self, field)
    }

    /// Decodes all four fields under `layout`.
    ///
    /// Never fails: every bit pattern decodes to some value per field, even
    /// one no generator would have produced.
    pub const fn decompose(&self, layout: &Layout) -> Parts {
        Parts {
            timestamp: layout.timestamp(*self),
            worker_id: layout.worker_id(*self),
            process_id: layout.process_id(*self),
            increment: layout.increment(*self),
        }
    }

    /// Re-encodes an ID produced under `from` into its bit pattern under `to`.
    ///
    /// Fields are decoded under `from` and packed again under `to`. When a
    /// decoded value is wider than the destination field it keeps only its
    /// low-order bits; callers that need strict conversion should check the
    /// [`Parts`] against the destination layout's limits first.
    #[must_use]
    pub fn convert(self, from: &Layout, to: &Layout) -> Self {
        if from == to {
            return self;
        }
        let parts = self.decompose(from);
        to.encode(
            parts.timestamp,
            parts.worker_id,
            parts.process_id,
            parts.increment,
        )
    }

    /// Returns the ID as a zero-padded 20-digit string.
    ///
    /// For non-negative IDs the padded strings order the same way the IDs
    /// do. A negative ID keeps its leading `-` and does not.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snowflake")
            .field(&format_args!("{} / {:#018x}", self.id, self.to_bits()))
            .finish()
    }
}

impl FromStr for Snowflake {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>()
            .map(Self::from_raw)
            .map_err(|_| Error::MalformedIdentifier {
                input: s.to_owned(),
            })
    }
}

impl From<i64> for Snowflake {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Snowflake> for i64 {
    fn from(id: Snowflake) -> Self {
        id.to_raw()
    }
}
