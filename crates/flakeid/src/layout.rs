use core::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

use crate::{
    error::{Error, Result},
    id::Snowflake,
    time::{DISCORD_EPOCH, TWITTER_EPOCH},
};

const DEFAULT_TIMESTAMP_BITS: u8 = 42;
const DEFAULT_WORKER_BITS: u8 = 5;
const DEFAULT_PROCESS_BITS: u8 = 5;
const DEFAULT_INCREMENT_BITS: u8 = 12;

/// One of the four bit fields packed into a [`Snowflake`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Milliseconds since the layout epoch.
    Timestamp,
    /// Worker identifier, unique per process.
    WorkerId,
    /// Process identifier, unique per deployment.
    ProcessId,
    /// Per-millisecond sequence counter.
    Increment,
}

impl Field {
    /// All fields, most significant first.
    pub const ALL: [Self; 4] = [
        Self::Timestamp,
        Self::WorkerId,
        Self::ProcessId,
        Self::Increment,
    ];
}

/// Describes how the 64 bits of a [`Snowflake`] are split into fields.
///
/// The widths are validated once at construction and every shift and mask is
/// derived eagerly, so field extraction is a pure shift-and-mask.
///
/// ```text
///  Bit Index:  63                                                            0
///              +-----------+-------------+--------------+---------------+
///  Field:      | timestamp |  worker id  |  process id  |   increment   |
///              +-----------+-------------+--------------+---------------+
///              |<-- MSB ------------- 64 bits ---------------- LSB -->|
/// ```
///
/// # Example
///
/// ```
/// use flakeid::{Field, Layout};
///
/// let layout = Layout::DISCORD;
/// let id = layout.encode(layout.epoch() + 1000, 12, 7, 3);
/// assert_eq!(layout.field(id, Field::Timestamp), layout.epoch() + 1000);
/// assert_eq!(layout.worker_id(id), 12);
/// assert_eq!(layout.process_id(id), 7);
/// assert_eq!(layout.increment(id), 3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    epoch: i64,
    timestamp_bits: u8,
    worker_bits: u8,
    process_bits: u8,
    increment_bits: u8,
    timestamp_shift: u8,
    worker_shift: u8,
    process_shift: u8,
    timestamp_mask: u64,
    worker_mask: u64,
    process_mask: u64,
    increment_mask: u64,
}

impl Layout {
    /// Twitter layout: 42/5/5/12 bits counted from [`TWITTER_EPOCH`].
    pub const TWITTER: Self = Self::from_widths(
        TWITTER_EPOCH,
        DEFAULT_TIMESTAMP_BITS,
        DEFAULT_WORKER_BITS,
        DEFAULT_PROCESS_BITS,
        DEFAULT_INCREMENT_BITS,
    );

    /// Discord layout: 42/5/5/12 bits counted from [`DISCORD_EPOCH`].
    pub const DISCORD: Self = Self::from_widths(
        DISCORD_EPOCH,
        DEFAULT_TIMESTAMP_BITS,
        DEFAULT_WORKER_BITS,
        DEFAULT_PROCESS_BITS,
        DEFAULT_INCREMENT_BITS,
    );

    /// Creates a layout from an epoch (milliseconds since the UNIX epoch) and
    /// four field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if any width is zero or the widths do
    /// not add up to exactly 64.
    pub fn new(
        epoch: i64,
        timestamp_bits: u8,
        worker_bits: u8,
        process_bits: u8,
        increment_bits: u8,
    ) -> Result<Self> {
        let total = u32::from(timestamp_bits)
            + u32::from(worker_bits)
            + u32::from(process_bits)
            + u32::from(increment_bits);
        let any_empty = timestamp_bits == 0 || worker_bits == 0 || process_bits == 0 || increment_bits == 0;
        if any_empty || total != 64 {
            return Err(Error::InvalidLayout {
                timestamp_bits,
                worker_bits,
                process_bits,
                increment_bits,
            });
        }
        Ok(Self::from_widths(
            epoch,
            timestamp_bits,
            worker_bits,
            process_bits,
            increment_bits,
        ))
    }

    /// Creates a layout with the default 42/5/5/12 split counted from `epoch`.
    pub const fn from_epoch(epoch: i64) -> Self {
        Self::from_widths(
            epoch,
            DEFAULT_TIMESTAMP_BITS,
            DEFAULT_WORKER_BITS,
            DEFAULT_PROCESS_BITS,
            DEFAULT_INCREMENT_BITS,
        )
    }

    /// Returns a builder preloaded with the default 42/5/5/12 split.
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::default()
    }

    // Widths must already be validated.
    const fn from_widths(
        epoch: i64,
        timestamp_bits: u8,
        worker_bits: u8,
        process_bits: u8,
        increment_bits: u8,
    ) -> Self {
        let timestamp_shift = increment_bits + worker_bits + process_bits;
        let worker_shift = increment_bits + process_bits;
        let process_shift = increment_bits;
        Self {
            epoch,
            timestamp_bits,
            worker_bits,
            process_bits,
            increment_bits,
            timestamp_shift,
            worker_shift,
            process_shift,
            timestamp_mask: low_bits(timestamp_bits) << timestamp_shift,
            worker_mask: low_bits(worker_bits) << worker_shift,
            process_mask: low_bits(process_bits) << process_shift,
            increment_mask: low_bits(increment_bits),
        }
    }

    /// Milliseconds since the UNIX epoch that a zero timestamp field maps to.
    pub const fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Width in bits of `field`.
    pub const fn bits(&self, field: Field) -> u8 {
        match field {
            Field::Timestamp => self.timestamp_bits,
            Field::WorkerId => self.worker_bits,
            Field::ProcessId => self.process_bits,
            Field::Increment => self.increment_bits,
        }
    }

    /// Position of the least significant bit of `field`.
    pub const fn shift(&self, field: Field) -> u8 {
        match field {
            Field::Timestamp => self.timestamp_shift,
            Field::WorkerId => self.worker_shift,
            Field::ProcessId => self.process_shift,
            Field::Increment => 0,
        }
    }

    /// Bits occupied by `field`, already shifted into place.
    pub const fn mask(&self, field: Field) -> u64 {
        match field {
            Field::Timestamp => self.timestamp_mask,
            Field::WorkerId => self.worker_mask,
            Field::ProcessId => self.process_mask,
            Field::Increment => self.increment_mask,
        }
    }

    /// Number of distinct worker IDs per process (`2^worker_bits`).
    pub const fn max_workers(&self) -> u64 {
        1 << self.worker_bits
    }

    /// Number of distinct process IDs (`2^process_bits`).
    pub const fn max_processes(&self) -> u64 {
        1 << self.process_bits
    }

    /// Number of distinct (worker, process) pairs.
    pub const fn max_generators(&self) -> u64 {
        1 << (self.worker_bits + self.process_bits)
    }

    /// IDs a generator can hand out within one millisecond before it has to
    /// wait for the clock (`2^increment_bits`).
    pub const fn max_increments(&self) -> u64 {
        1 << self.increment_bits
    }

    /// Milliseconds representable by the timestamp field.
    pub const fn max_timestamps(&self) -> u64 {
        1 << self.timestamp_bits
    }

    /// How long after the epoch the timestamp field overflows.
    pub const fn time_overflow_duration(&self) -> Duration {
        Duration::from_millis(self.max_timestamps())
    }

    /// Milliseconds since the UNIX epoch at which the timestamp field
    /// overflows.
    pub const fn time_overflow_millis(&self) -> i64 {
        self.epoch.saturating_add_unsigned(self.max_timestamps())
    }

    /// The wall-clock instant at which the timestamp field overflows, or
    /// `None` if it is beyond what [`SystemTime`] can represent.
    pub fn time_overflow_instant(&self) -> Option<SystemTime> {
        let epoch = if self.epoch >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_millis(self.epoch.unsigned_abs()))?
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_millis(self.epoch.unsigned_abs()))?
        };
        epoch.checked_add(self.time_overflow_duration())
    }

    /// Extracts the raw bits of `field` without applying the epoch.
    pub const fn raw_field(&self, id: Snowflake, field: Field) -> u64 {
        (id.to_bits() & self.mask(field)) >> self.shift(field)
    }

    /// Extracts `field` from `id`.
    ///
    /// The timestamp is returned as milliseconds since the UNIX epoch (the
    /// layout epoch plus the raw field); the other fields are returned as is.
    /// Extraction is total: any bit pattern decodes to some value.
    pub const fn field(&self, id: Snowflake, field: Field) -> i64 {
        let raw = self.raw_field(id, field);
        match field {
            Field::Timestamp => self.epoch.wrapping_add_unsigned(raw),
            // Non-timestamp fields are at most 62 bits wide.
            _ => raw as i64,
        }
    }

    /// Timestamp of `id` in milliseconds since the UNIX epoch.
    pub const fn timestamp(&self, id: Snowflake) -> i64 {
        self.field(id, Field::Timestamp)
    }

    /// Worker ID of `id`.
    pub const fn worker_id(&self, id: Snowflake) -> u64 {
        self.raw_field(id, Field::WorkerId)
    }

    /// Process ID of `id`.
    pub const fn process_id(&self, id: Snowflake) -> u64 {
        self.raw_field(id, Field::ProcessId)
    }

    /// Sequence counter of `id`.
    pub const fn increment(&self, id: Snowflake) -> u64 {
        self.raw_field(id, Field::Increment)
    }

    /// Packs four field values into a [`Snowflake`].
    ///
    /// `timestamp` is in milliseconds since the UNIX epoch. Values are not
    /// range-checked: anything wider than its field keeps only its low-order
    /// bits.
    pub const fn encode(
        &self,
        timestamp: i64,
        worker_id: u64,
        process_id: u64,
        increment: u64,
    ) -> Snowflake {
        let timestamp = (timestamp.wrapping_sub(self.epoch) as u64) << self.timestamp_shift;
        let worker_id = (worker_id << self.worker_shift) & self.worker_mask;
        let process_id = (process_id << self.process_shift) & self.process_mask;
        let increment = increment & self.increment_mask;
        Snowflake::from_bits((timestamp & self.timestamp_mask) | worker_id | process_id | increment)
    }
}

const fn low_bits(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Incrementally configures a [`Layout`].
///
/// Only the widths that differ from the default 42/5/5/12 split need to be
/// set; the epoch has no default.
///
/// ```
/// use flakeid::{Error, Layout};
///
/// let layout = Layout::builder()
///     .epoch(1_609_462_860_000)
///     .worker_bits(4)
///     .process_bits(6)
///     .build()
///     .unwrap();
/// assert_eq!(layout.max_workers(), 16);
///
/// assert_eq!(Layout::builder().build(), Err(Error::MissingEpoch));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutBuilder {
    epoch: Option<i64>,
    timestamp_bits: u8,
    worker_bits: u8,
    process_bits: u8,
    increment_bits: u8,
}

impl Default for LayoutBuilder {
    fn default() -> Self {
        Self {
            epoch: None,
            timestamp_bits: DEFAULT_TIMESTAMP_BITS,
            worker_bits: DEFAULT_WORKER_BITS,
            process_bits: DEFAULT_PROCESS_BITS,
            increment_bits: DEFAULT_INCREMENT_BITS,
        }
    }
}

impl LayoutBuilder {
    /// Sets the epoch, in milliseconds since the UNIX epoch. Required.
    #[must_use]
    pub const fn epoch(mut self, epoch: i64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Sets the timestamp width. Defaults to 42.
    #[must_use]
    pub const fn timestamp_bits(mut self, bits: u8) -> Self {
        self.timestamp_bits = bits;
        self
    }

    /// Sets the worker ID width. Defaults to 5.
    #[must_use]
    pub const fn worker_bits(mut self, bits: u8) -> Self {
        self.worker_bits = bits;
        self
    }

    /// Sets the process ID width. Defaults to 5.
    #[must_use]
    pub const fn process_bits(mut self, bits: u8) -> Self {
        self.process_bits = bits;
        self
    }

    /// Sets the sequence width. Defaults to 12.
    #[must_use]
    pub const fn increment_bits(mut self, bits: u8) -> Self {
        self.increment_bits = bits;
        self
    }

    /// Number of distinct worker IDs the configured width allows.
    pub fn max_workers(&self) -> u64 {
        count_of(self.worker_bits)
    }

    /// Number of distinct process IDs the configured width allows.
    pub fn max_processes(&self) -> u64 {
        count_of(self.process_bits)
    }

    /// IDs per millisecond per generator.
    pub fn max_increments(&self) -> u64 {
        count_of(self.increment_bits)
    }

    /// Number of distinct millisecond timestamps.
    pub fn max_timestamps(&self) -> u64 {
        count_of(self.timestamp_bits)
    }

    /// Overflow point of the configured timestamp field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEpoch`] if no epoch was set yet.
    pub fn time_overflow_millis(&self) -> Result<i64> {
        let epoch = self.epoch.ok_or(Error::MissingEpoch)?;
        Ok(epoch.saturating_add_unsigned(self.max_timestamps()))
    }

    /// Validates the configuration and produces the [`Layout`].
    ///
    /// # Errors
    ///
    /// - [`Error::MissingEpoch`] if [`LayoutBuilder::epoch`] was never called
    /// - [`Error::InvalidLayout`] if the widths are invalid
    pub fn build(self) -> Result<Layout> {
        let epoch = self.epoch.ok_or(Error::MissingEpoch)?;
        Layout::new(
            epoch,
            self.timestamp_bits,
            self.worker_bits,
            self.process_bits,
            self.increment_bits,
        )
    }
}

// Saturates for widths that could never pass validation anyway.
fn count_of(bits: u8) -> u64 {
    1u64.checked_shl(u32::from(bits)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_use_the_canonical_split() {
        for (layout, epoch) in [
            (Layout::TWITTER, 1_288_834_974_657),
            (Layout::DISCORD, 1_420_070_400_000),
        ] {
            assert_eq!(layout.epoch(), epoch);
            assert_eq!(layout.bits(Field::Timestamp), 42);
            assert_eq!(layout.bits(Field::WorkerId), 5);
            assert_eq!(layout.bits(Field::ProcessId), 5);
            assert_eq!(layout.bits(Field::Increment), 12);
            assert_eq!(Layout::new(epoch, 42, 5, 5, 12), Ok(layout));
        }
    }

    #[test]
    fn shifts_and_masks_for_canonical_split() {
        let layout = Layout::DISCORD;
        assert_eq!(layout.shift(Field::Timestamp), 22);
        assert_eq!(layout.shift(Field::WorkerId), 17);
        assert_eq!(layout.shift(Field::ProcessId), 12);
        assert_eq!(layout.shift(Field::Increment), 0);

        assert_eq!(layout.mask(Field::Timestamp), 0xFFFF_FFFF_FFC0_0000);
        assert_eq!(layout.mask(Field::WorkerId), 0x0000_0000_003E_0000);
        assert_eq!(layout.mask(Field::ProcessId), 0x0000_0000_0001_F000);
        assert_eq!(layout.mask(Field::Increment), 0x0000_0000_0000_0FFF);

        let union = Field::ALL
            .iter()
            .fold(0u64, |acc, &field| acc | layout.mask(field));
        assert_eq!(union, u64::MAX);
    }

    #[test]
    fn rejects_widths_not_summing_to_64() {
        assert!(matches!(
            Layout::new(0, 41, 5, 5, 12),
            Err(Error::InvalidLayout { .. })
        ));
        assert!(matches!(
            Layout::new(0, 43, 5, 5, 12),
            Err(Error::InvalidLayout { .. })
        ));
        assert!(Layout::new(0, 42, 5, 5, 12).is_ok());
        assert!(Layout::new(0, 61, 1, 1, 1).is_ok());
    }

    #[test]
    fn rejects_zero_widths() {
        assert_eq!(
            Layout::new(0, 52, 0, 0, 12),
            Err(Error::InvalidLayout {
                timestamp_bits: 52,
                worker_bits: 0,
                process_bits: 0,
                increment_bits: 12,
            })
        );
        assert!(Layout::new(0, 0, 20, 20, 24).is_err());
        assert!(Layout::new(0, 64, 0, 0, 0).is_err());
    }

    #[test]
    fn large_widths_do_not_overflow_validation() {
        assert!(Layout::new(0, 255, 255, 255, 255).is_err());
    }

    #[test]
    fn derived_metrics() {
        let layout = Layout::DISCORD;
        assert_eq!(layout.max_workers(), 32);
        assert_eq!(layout.max_processes(), 32);
        assert_eq!(layout.max_generators(), 1024);
        assert_eq!(layout.max_increments(), 4096);
        assert_eq!(layout.max_timestamps(), 1 << 42);
        assert_eq!(
            layout.time_overflow_duration(),
            Duration::from_millis(1 << 42)
        );
        assert_eq!(
            layout.time_overflow_millis(),
            DISCORD_EPOCH + (1_i64 << 42)
        );

        let instant = layout.time_overflow_instant().expect("representable");
        let millis = instant
            .duration_since(UNIX_EPOCH)
            .expect("after 1970")
            .as_millis();
        assert_eq!(millis, (DISCORD_EPOCH + (1_i64 << 42)) as u128);
    }

    #[test]
    fn field_round_trip_across_layouts() {
        let layouts = [
            Layout::TWITTER,
            Layout::new(1_000, 41, 8, 3, 12).unwrap(),
            Layout::new(-5_000, 32, 10, 10, 12).unwrap(),
            Layout::new(0, 61, 1, 1, 1).unwrap(),
        ];
        for layout in layouts {
            let max_ts = layout.epoch() + (layout.max_timestamps() - 1) as i64;
            let cases = [
                (layout.epoch(), 0, 0, 0),
                (
                    max_ts,
                    layout.max_workers() - 1,
                    layout.max_processes() - 1,
                    layout.max_increments() - 1,
                ),
                (layout.epoch() + 1_234, 1, 0, layout.max_increments() / 2),
            ];
            for (ts, worker, process, inc) in cases {
                let id = layout.encode(ts, worker, process, inc);
                assert_eq!(layout.timestamp(id), ts, "{layout:?}");
                assert_eq!(layout.worker_id(id), worker, "{layout:?}");
                assert_eq!(layout.process_id(id), process, "{layout:?}");
                assert_eq!(layout.increment(id), inc, "{layout:?}");
            }
        }
    }

    #[test]
    fn encode_truncates_oversized_values() {
        let layout = Layout::DISCORD;
        let id = layout.encode(layout.epoch(), 32 + 3, 64 + 1, 4096 + 7);
        assert_eq!(layout.worker_id(id), 3);
        assert_eq!(layout.process_id(id), 1);
        assert_eq!(layout.increment(id), 7);
        assert_eq!(layout.timestamp(id), layout.epoch());
    }

    #[test]
    fn extraction_is_total() {
        let layout = Layout::TWITTER;
        let id = Snowflake::from_bits(u64::MAX);
        assert_eq!(
            layout.timestamp(id),
            layout.epoch() + ((1_i64 << 42) - 1)
        );
        assert_eq!(layout.worker_id(id), 31);
        assert_eq!(layout.process_id(id), 31);
        assert_eq!(layout.increment(id), 4095);
    }

    #[test]
    fn builder_defaults_and_overrides() {
        let builder = Layout::builder().epoch(7);
        assert_eq!(builder.build(), Ok(Layout::from_epoch(7)));
        assert_eq!(builder.max_workers(), 32);
        assert_eq!(builder.time_overflow_millis(), Ok(7 + (1 << 42)));

        let layout = Layout::builder()
            .epoch(DISCORD_EPOCH)
            .timestamp_bits(41)
            .increment_bits(13)
            .build()
            .unwrap();
        assert_eq!(layout.max_increments(), 8192);
        assert_eq!(layout.shift(Field::Timestamp), 23);
    }

    #[test]
    fn builder_requires_epoch() {
        let builder = Layout::builder().worker_bits(6).process_bits(4);
        assert_eq!(builder.build(), Err(Error::MissingEpoch));
        assert_eq!(builder.time_overflow_millis(), Err(Error::MissingEpoch));
    }

    #[test]
    fn builder_validates_widths() {
        let result = Layout::builder().epoch(0).worker_bits(6).build();
        assert!(matches!(result, Err(Error::InvalidLayout { .. })));
    }
}
