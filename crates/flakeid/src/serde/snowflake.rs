use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod as_native {
    use super::{Deserialize, Deserializer, Serialize, Serializer};
    use crate::Snowflake;

    /// Serialize a snowflake as its native signed integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &Snowflake, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        id.to_raw().serialize(s)
    }

    /// Deserialize a snowflake from its native signed integer.
    ///
    /// Every `i64` is a valid identifier, so this only fails when the input
    /// is not an integer in range.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying deserializer fails.
    pub fn deserialize<'de, D>(d: D) -> Result<Snowflake, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(d).map(Snowflake::from_raw)
    }
}

pub mod as_string {
    use super::{Deserializer, Serializer};
    use crate::Snowflake;

    /// Serialize a snowflake as its base-10 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &Snowflake, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(id)
    }

    /// Deserialize a snowflake from its base-10 string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The string is not a base-10 signed 64-bit integer
    pub fn deserialize<'de, D>(d: D) -> Result<Snowflake, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DecimalVisitor;

        impl serde::de::Visitor<'_> for DecimalVisitor {
            type Value = Snowflake;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a base-10 encoded 64-bit integer string")
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(serde::de::Error::custom)
            }
        }

        d.deserialize_str(DecimalVisitor)
    }
}
