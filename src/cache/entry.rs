//! Cache Entry Module
//!
//! Defines stored entries and the ways a caller can express their lifetime.

use chrono::{DateTime, TimeDelta, Utc};

// == Expiry ==
/// How long an inserted entry should live.
///
/// Every variant is normalized to an absolute deadline at insertion time.
/// Zero or negative durations, and deadlines in the past, are accepted and
/// produce an entry that is already expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use the store's default TTL
    #[default]
    Default,
    /// Live for this long after insertion
    After(TimeDelta),
    /// Live for this many whole seconds after insertion
    Seconds(i64),
    /// Live until this absolute instant
    At(DateTime<Utc>),
}

impl Expiry {
    // == Resolve ==
    /// Computes the absolute deadline for an entry inserted at `now`.
    ///
    /// Arithmetic saturates at the representable range instead of panicking.
    pub fn deadline(self, now: DateTime<Utc>, default_ttl: TimeDelta) -> DateTime<Utc> {
        match self {
            Expiry::Default => deadline_after(now, default_ttl),
            Expiry::After(ttl) => deadline_after(now, ttl),
            Expiry::Seconds(secs) => {
                let ttl = TimeDelta::try_seconds(secs).unwrap_or(if secs < 0 {
                    TimeDelta::MIN
                } else {
                    TimeDelta::MAX
                });
                deadline_after(now, ttl)
            }
            Expiry::At(deadline) => deadline,
        }
    }
}

impl From<TimeDelta> for Expiry {
    fn from(ttl: TimeDelta) -> Self {
        Expiry::After(ttl)
    }
}

impl From<std::time::Duration> for Expiry {
    fn from(ttl: std::time::Duration) -> Self {
        Expiry::After(TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX))
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(deadline: DateTime<Utc>) -> Self {
        Expiry::At(deadline)
    }
}

impl From<Option<TimeDelta>> for Expiry {
    fn from(ttl: Option<TimeDelta>) -> Self {
        ttl.map_or(Expiry::Default, Expiry::After)
    }
}

/// `now + ttl`, clamped to the representable range.
pub(crate) fn deadline_after(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

// == Entry ==
/// A single stored record.
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    /// Identity of the entry, unique within a store
    pub key: K,
    /// The stored payload
    pub value: V,
    /// When the entry was inserted or last overwritten
    pub created_at: DateTime<Utc>,
    /// Instant at which the entry becomes absent
    pub deadline: DateTime<Utc>,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    pub fn new(key: K, value: V, created_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            created_at,
            deadline,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry whose deadline equals `now` is expired,
    /// so a zero TTL is never observable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline <= now
    }

    // == Time To Live ==
    /// Returns the time left before the deadline; negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.deadline.signed_duration_since(now)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_default_uses_store_ttl() {
        let deadline = Expiry::Default.deadline(epoch(), TimeDelta::seconds(30));
        assert_eq!(deadline, epoch() + TimeDelta::seconds(30));
    }

    #[test]
    fn test_expiry_after_and_seconds_agree() {
        let default_ttl = TimeDelta::seconds(1);
        let after = Expiry::After(TimeDelta::seconds(15)).deadline(epoch(), default_ttl);
        let seconds = Expiry::Seconds(15).deadline(epoch(), default_ttl);
        assert_eq!(after, seconds);
        assert_eq!(after, epoch() + TimeDelta::seconds(15));
    }

    #[test]
    fn test_expiry_at_is_verbatim() {
        let at = epoch() - TimeDelta::hours(1);
        assert_eq!(Expiry::At(at).deadline(epoch(), TimeDelta::seconds(10)), at);
    }

    #[test]
    fn test_expiry_from_conversions() {
        assert_eq!(
            Expiry::from(std::time::Duration::from_secs(60)),
            Expiry::After(TimeDelta::seconds(60))
        );
        assert_eq!(Expiry::from(None::<TimeDelta>), Expiry::Default);
        assert_eq!(Expiry::from(epoch()), Expiry::At(epoch()));
    }

    #[test]
    fn test_expiry_saturates() {
        let far = Expiry::Seconds(i64::MAX).deadline(epoch(), TimeDelta::zero());
        assert_eq!(far, DateTime::<Utc>::MAX_UTC);

        let past = Expiry::Seconds(i64::MIN).deadline(epoch(), TimeDelta::zero());
        assert_eq!(past, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_entry_expiration_boundary_condition() {
        let entry = Entry::new("k", 1, epoch(), epoch() + TimeDelta::seconds(5));

        assert!(!entry.is_expired(epoch()));
        assert!(!entry.is_expired(epoch() + TimeDelta::milliseconds(4999)));
        // Entry should be expired when now >= deadline
        assert!(entry.is_expired(epoch() + TimeDelta::seconds(5)));
        assert!(entry.is_expired(epoch() + TimeDelta::seconds(6)));
    }

    #[test]
    fn test_entry_zero_ttl_is_expired_immediately() {
        let entry = Entry::new("k", 1, epoch(), epoch());
        assert!(entry.is_expired(epoch()));
    }

    #[test]
    fn test_entry_remaining() {
        let entry = Entry::new("k", 1, epoch(), epoch() + TimeDelta::seconds(10));

        assert_eq!(entry.remaining(epoch()), TimeDelta::seconds(10));
        assert_eq!(
            entry.remaining(epoch() + TimeDelta::seconds(12)),
            TimeDelta::seconds(-2)
        );
    }
}
