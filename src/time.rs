use chrono::{DateTime, Utc};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Converts a UTC instant to the 64-bit NTP timestamp format.
///
/// The upper 32 bits carry whole seconds since 1900-01-01T00:00:00Z, the lower
/// 32 bits the binary fraction of a second, truncated toward zero. Instants
/// outside the 32-bit seconds range (after 2036-02-07) wrap, as in classic NTP.
///
/// ```
/// use chrono::{DateTime, Utc};
/// use stamp_sender::time::to_ntp;
/// let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
/// assert_eq!(to_ntp(epoch), 2_208_988_800u64 << 32);
/// ```
pub fn to_ntp(date: DateTime<Utc>) -> u64 {
    let secs = (date.timestamp() + NTP_UNIX_OFFSET) as u32;
    // chrono reports leap seconds as nanos >= 1e9
    let nanos = u64::from(date.timestamp_subsec_nanos()).min(NANOS_PER_SEC - 1);
    let fraction = (nanos << 32) / NANOS_PER_SEC;

    (u64::from(secs) << 32) | fraction
}

/// Converts a 64-bit NTP timestamp back to a UTC instant.
///
/// Both directions truncate. One fraction unit is ~0.233 ns, so after the
/// second truncation `from_ntp(to_ntp(t))` can land one nanosecond below `t`.
/// Callers must not expect an exact round trip.
pub fn from_ntp(ntp: u64) -> DateTime<Utc> {
    let secs = (ntp >> 32) as i64 - NTP_UNIX_OFFSET;
    let fraction = ntp & 0xFFFF_FFFF;
    let nanos = ((fraction * NANOS_PER_SEC) >> 32) as u32;

    // Every 32-bit seconds value maps inside chrono's range.
    DateTime::<Utc>::from_timestamp(secs, nanos).unwrap_or_default()
}
