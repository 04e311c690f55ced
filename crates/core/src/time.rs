use chrono::{DateTime, TimeDelta, Utc};

/// Where session timestamps come from.
///
/// Sessions stamp their start and submission times through this, so tests can
/// pin both to a known instant.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Time since `earlier`, clamped at zero when the clock reads before it.
    #[must_use]
    pub fn elapsed_since(&self, earlier: DateTime<Utc>) -> TimeDelta {
        (self.now() - earlier).max(TimeDelta::zero())
    }
}

/// Seconds after the Unix epoch used by [`fixed_now`] (2024-03-01T08:00:00Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_709_280_000;

/// The instant every fixed test clock reads.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(FIXED_TEST_TIMESTAMP)
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
