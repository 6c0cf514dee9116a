use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Formats used by rows written without an offset.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a stored feeding timestamp into the storage zone.
///
/// Current rows are RFC 3339. Older rows were written without zone
/// information; those are read as wall-clock time in `storage_tz`.
pub fn parse_stored_timestamp(raw: &str, storage_tz: Tz) -> Result<DateTime<Tz>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&storage_tz));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return localize(naive, storage_tz);
        }
    }

    Err(anyhow!("Unrecognized timestamp '{}'", raw))
}

/// Attaches `tz` to a naive wall-clock time.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times in a
/// DST gap are shifted forward by an hour.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Ok(dt);
    }

    tz.from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .ok_or_else(|| anyhow!("Cannot place {} in {}", naive, tz))
}

pub fn format_stored_timestamp(dt: &DateTime<Tz>) -> String {
    dt.to_rfc3339()
}

/// Fixed-width UTC rendering whose lexicographic order matches time order.
pub fn format_sortable_utc<T: TimeZone>(dt: &DateTime<T>) -> String {
    dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
