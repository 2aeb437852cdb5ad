use chrono::Utc;
use derive_more::{Add, AddAssign, Display, Sub, SubAssign};
use serde::{Deserialize, Serialize};

///
/// Timestamp
/// (in milliseconds since the UNIX epoch)
///
/// Millisecond precision matches what relational TIMESTAMP columns carry and
/// is what the optimistic-lock stamp field stores.
///

#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Sub,
    SubAssign,
)]
#[repr(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    /// Construct from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Construct from whole seconds.
    #[must_use]
    pub const fn from_seconds(secs: i64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Current wall-clock timestamp in milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_seconds_scales_to_millis() {
        assert_eq!(Timestamp::from_seconds(2).get(), 2_000);
    }

    #[test]
    fn now_is_after_epoch() {
        assert!(Timestamp::now() > Timestamp::EPOCH);
    }

    #[test]
    fn arithmetic_derives() {
        let a = Timestamp::from_millis(10);
        let b = Timestamp::from_millis(3);
        assert_eq!((a + b).get(), 13);
        assert_eq!((a - b).get(), 7);
    }
}
