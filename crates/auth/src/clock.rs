//! Clock and timezone resolution for token timestamps.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid timezone: {0}")]
    UnknownTimezone(String),
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant (tests, replays).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock bound to an IANA timezone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    /// Resolve a timezone identifier such as `"America/Sao_Paulo"` or `"UTC"`.
    pub fn resolve(timezone: &str) -> Result<Self, ClockError> {
        let tz = timezone
            .parse::<Tz>()
            .map_err(|_| ClockError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// `instant` expressed in this clock's zone.
    pub fn at(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.tz)
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolves_known_zones() {
        assert!(ZonedClock::resolve("UTC").is_ok());
        assert!(ZonedClock::resolve("America/Sao_Paulo").is_ok());
        assert!(ZonedClock::resolve("Europe/Berlin").is_ok());
    }

    #[test]
    fn rejects_unknown_zone() {
        let err = ZonedClock::resolve("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(err, ClockError::UnknownTimezone("Mars/Olympus_Mons".to_string()));
        assert!(ZonedClock::resolve("").is_err());
    }

    #[test]
    fn zoning_preserves_the_instant() {
        let clock = ZonedClock::resolve("Asia/Tokyo").unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let zoned = clock.at(instant);
        assert_eq!(zoned.timestamp(), instant.timestamp());
        assert_eq!(zoned.format("%H").to_string(), "09");
    }
}
