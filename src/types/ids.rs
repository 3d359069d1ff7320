//! Newtype wrappers for sighting identifiers.
//!
//! These types prevent accidental mixing of the different string and numeric
//! fields a sighting carries (e.g., using a spawnpoint where an encounter is
//! expected).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifies one real-world occurrence. This is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(pub String);

impl EncounterId {
    pub fn new(s: impl Into<String>) -> Self {
        EncounterId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EncounterId {
    fn from(s: String) -> Self {
        EncounterId(s)
    }
}

impl From<&str> for EncounterId {
    fn from(s: &str) -> Self {
        EncounterId(s.to_string())
    }
}

/// A spawn location identifier. Passed through to notifiers untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnpointId(pub String);

impl SpawnpointId {
    pub fn new(s: impl Into<String>) -> Self {
        SpawnpointId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpawnpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical species number (1..=151).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub u16);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:03}", self.0)
    }
}

/// The `disappear_time` of a sighting: seconds since the Unix epoch.
///
/// Kept as the raw float from the wire. Conversion to a calendar instant can
/// fail for values chrono cannot represent; callers decide what that means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpiresAt(pub f64);

/// An expiry that cannot be mapped onto a calendar instant.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("timestamp {0} is not representable")]
pub struct InvalidTimestamp(pub f64);

impl ExpiresAt {
    /// Converts to a UTC instant, or `None` if the value is non-finite or out of range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.0.is_finite() {
            return None;
        }
        let secs = self.0.floor();
        if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
            return None;
        }
        let nanos = (((self.0 - secs) * 1e9).round() as u32).min(999_999_999);
        DateTime::from_timestamp(secs as i64, nanos)
    }

    /// Returns true if this expiry is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool, InvalidTimestamp> {
        self.to_datetime()
            .map(|dt| dt <= now)
            .ok_or(InvalidTimestamp(self.0))
    }

    /// Bitwise identity. Two expiries are the same instant only if they came
    /// from the same admission (or an identical wire value).
    pub fn same_instant(&self, other: &ExpiresAt) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl fmt::Display for ExpiresAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    mod encounter_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_is_transparent(s in "[A-Za-z0-9+/=]{1,40}") {
                let id = EncounterId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                prop_assert_eq!(json, serde_json::to_string(&s).unwrap());
            }

            #[test]
            fn comparison_matches_underlying(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
                prop_assert_eq!(EncounterId::new(&a) == EncounterId::new(&b), a == b);
            }
        }
    }

    #[test]
    fn species_id_display_is_zero_padded() {
        assert_eq!(SpeciesId(25).to_string(), "#025");
        assert_eq!(SpeciesId(151).to_string(), "#151");
    }

    mod expires_at {
        use super::*;

        #[test]
        fn converts_whole_seconds() {
            let expiry = ExpiresAt(1_700_000_000.0);
            let expected = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            assert_eq!(expiry.to_datetime(), Some(expected));
        }

        #[test]
        fn keeps_fractional_seconds() {
            let expiry = ExpiresAt(1_700_000_000.5);
            let dt = expiry.to_datetime().unwrap();
            assert_eq!(dt.timestamp(), 1_700_000_000);
            assert_eq!(dt.timestamp_subsec_millis(), 500);
        }

        #[test]
        fn non_finite_is_not_representable() {
            assert_eq!(ExpiresAt(f64::NAN).to_datetime(), None);
            assert_eq!(ExpiresAt(f64::INFINITY).to_datetime(), None);
            assert_eq!(ExpiresAt(f64::NEG_INFINITY).to_datetime(), None);
        }

        #[test]
        fn out_of_range_is_not_representable() {
            assert_eq!(ExpiresAt(1e300).to_datetime(), None);
            assert!(ExpiresAt(1e300).is_expired_at(Utc::now()).is_err());
        }

        #[test]
        fn expiry_is_inclusive_of_now() {
            let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            assert!(ExpiresAt(1_700_000_000.0).is_expired_at(now).unwrap());
            assert!(ExpiresAt(1_699_999_999.0).is_expired_at(now).unwrap());
            assert!(!ExpiresAt(1_700_000_000.25).is_expired_at(now).unwrap());
        }

        #[test]
        fn same_instant_is_bitwise() {
            let a = ExpiresAt(1_700_000_000.0);
            assert!(a.same_instant(&ExpiresAt(1_700_000_000.0)));
            assert!(!a.same_instant(&ExpiresAt(1_700_000_000.000_001)));
        }
    }
}
