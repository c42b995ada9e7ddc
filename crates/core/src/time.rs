use chrono::{Local, NaiveDate};

/// A simple clock abstraction so "today" can be injected in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(NaiveDate),
}

impl Clock {
    /// Returns a clock that follows the local calendar date.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock pinned to the given day.
    #[must_use]
    pub fn fixed(day: NaiveDate) -> Self {
        Self::Fixed(day)
    }

    /// Returns today's date according to the clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::Default => Local::now().date_naive(),
            Clock::Fixed(day) => *day,
        }
    }
}

/// Deterministic day for tests and examples (2024-05-10).
pub const FIXED_TEST_DAY: (i32, u32, u32) = (2024, 5, 10);

/// Returns a deterministic `NaiveDate` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed day cannot be represented.
#[must_use]
pub fn fixed_today() -> NaiveDate {
    let (y, m, d) = FIXED_TEST_DAY;
    NaiveDate::from_ymd_opt(y, m, d).expect("fixed test day should be valid")
}

/// Returns a `Clock` fixed at the deterministic test day.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_today())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_day() {
        assert_eq!(fixed_clock().today(), fixed_today());
    }
}
