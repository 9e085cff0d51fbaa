//! Build time used by the `fun.AutoVersion` function.

#[cfg(feature = "time")]
use chrono::prelude::*;

/// Time at which a preprocessing run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTime {
    days_since_2000: i64,
    seconds_since_midnight: u32,
}

impl BuildTime {
    /// Create a new build time from the local clock.
    #[cfg(feature = "time")]
    pub fn now() -> BuildTime {
        let dt: DateTime<Local> = Local::now();
        let days_since_2000 = NaiveDate::from_ymd_opt(2000, 1, 1)
            .map(|epoch| (dt.date_naive() - epoch).num_days())
            .unwrap_or(0);
        BuildTime {
            days_since_2000,
            seconds_since_midnight: dt.time().num_seconds_from_midnight(),
        }
    }

    #[cfg(not(feature = "time"))]
    pub fn now() -> BuildTime {
        BuildTime {
            days_since_2000: 0,
            seconds_since_midnight: 0,
        }
    }

    /// Create a build time with the provided values.
    ///
    /// This is useful for reproducible output and in tests.
    pub fn new_with_values(days_since_2000: i64, seconds_since_midnight: u32) -> BuildTime {
        BuildTime {
            days_since_2000,
            seconds_since_midnight,
        }
    }

    /// Returns `base.<build>.<revision>` where the build is the number of days since
    ///     1 January 2000 and the revision is half the number of seconds since midnight.
    pub fn auto_version(&self, base: &str) -> String {
        format!(
            "{}.{}.{}",
            base,
            self.days_since_2000,
            self.seconds_since_midnight / 2
        )
    }
}

impl Default for BuildTime {
    fn default() -> Self {
        Self::now()
    }
}
