//! Conversion between ISO-8601 strings and the backend wire timestamp.
//!
//! Only millisecond resolution survives the trip: `encode` truncates to whole
//! milliseconds and `decode` drops any sub-millisecond nanos.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use proto::Timestamp;

use crate::error::{GatewayError, Result};

const NANOS_PER_MILLI: i64 = 1_000_000;

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"];

/// Parse an ISO-8601 date or date-time into a UTC instant.
///
/// Accepts extended-format date-times down to minute precision, with a `Z`
/// designator, an offset (`+02:00`, `+0200`, `+02`) or none at all (read as
/// UTC). The decimal mark may be `.` or `,`. Reduced dates (`2023-11-14`,
/// `2023-11`, `2023`) mean midnight UTC at the start of that period.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().replacen(',', ".", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(local) = s.strip_suffix('Z') {
        return parse_local(local).map(|naive| naive.and_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    parse_local(&s)
        .or_else(|| parse_reduced_date(&s))
        .map(|naive| naive.and_utc())
}

fn parse_local(s: &str) -> Option<NaiveDateTime> {
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_reduced_date(s: &str) -> Option<NaiveDateTime> {
    let date = match s.len() {
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?,
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()?,
        4 if s.bytes().all(|b| b.is_ascii_digit()) => {
            NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1)?
        }
        _ => return None,
    };
    date.and_hms_opt(0, 0, 0)
}

/// Encode an ISO-8601 string as a wire timestamp.
pub fn encode(iso: &str) -> Result<Timestamp> {
    let instant = parse_iso8601(iso).ok_or_else(|| {
        GatewayError::InvalidTimestamp(format!("'{iso}' is not a valid ISO-8601 date-time"))
    })?;
    Ok(from_millis(instant.timestamp_millis()))
}

/// Decode a wire timestamp into an ISO-8601 UTC string with millisecond precision.
///
/// Fails only when the instant is outside the representable calendar range,
/// which can happen solely with a corrupt backend value.
pub fn decode(ts: &Timestamp) -> Result<String> {
    let millis = ts
        .seconds
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(i64::from(ts.nanos).div_euclid(NANOS_PER_MILLI)))
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| {
            GatewayError::Internal(format!(
                "backend timestamp out of range (seconds={}, nanos={})",
                ts.seconds, ts.nanos
            ))
        })?;
    Ok(millis.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn from_millis(millis: i64) -> Timestamp {
    Timestamp {
        seconds: millis.div_euclid(1000),
        nanos: (millis.rem_euclid(1000) * NANOS_PER_MILLI) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64, nanos: i32) -> Timestamp {
        Timestamp { seconds, nanos }
    }

    #[test]
    fn encode_whole_second() {
        assert_eq!(encode("2023-11-14T22:13:20.000Z").unwrap(), ts(1_700_000_000, 0));
    }

    #[test]
    fn encode_keeps_milliseconds() {
        assert_eq!(encode("2023-11-14T22:13:20.123Z").unwrap(), ts(1_700_000_000, 123_000_000));
    }

    #[test]
    fn encode_truncates_sub_millisecond_digits() {
        assert_eq!(
            encode("2023-11-14T22:13:20.123999Z").unwrap(),
            ts(1_700_000_000, 123_000_000)
        );
    }

    #[test]
    fn encode_normalises_offsets_to_utc() {
        assert_eq!(encode("2023-11-15T00:13:20.000+02:00").unwrap(), ts(1_700_000_000, 0));
    }

    #[test]
    fn encode_before_epoch_floors_seconds() {
        // 1969-12-31T23:59:59.500Z is -500 ms.
        assert_eq!(encode("1969-12-31T23:59:59.500Z").unwrap(), ts(-1, 500_000_000));
    }

    #[test]
    fn encode_date_only_is_midnight_utc() {
        assert_eq!(encode("2023-11-14").unwrap(), ts(1_699_920_000, 0));
    }

    #[test]
    fn encode_accepts_other_iso_forms() {
        let cases = [
            ("2023-11-14T22:13Z", ts(1_699_999_980, 0)),
            ("2023-11-15T00:13:20+0200", ts(1_700_000_000, 0)),
            ("2023-11-15T00:13:20.000+02", ts(1_700_000_000, 0)),
            ("2023-11-15T00:13+02:00", ts(1_699_999_980, 0)),
            ("2023-11-14T22:13:20,5Z", ts(1_700_000_000, 500_000_000)),
            ("2023-11", ts(1_698_796_800, 0)),
            ("2023", ts(1_672_531_200, 0)),
        ];
        for (input, expected) in cases {
            assert_eq!(encode(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn encode_rejects_garbage() {
        let bad_inputs = [
            "",
            "yesterday",
            "2023-13-01T00:00:00Z",
            "2023-02-30",
            "1700000000",
            "2023-13",
            "2023-11-14T22Z",
            "2023-11-14T22:13:20+2",
        ];
        for bad in bad_inputs {
            assert!(
                matches!(encode(bad), Err(GatewayError::InvalidTimestamp(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_formats_with_millis_and_z() {
        assert_eq!(decode(&ts(1_700_000_000, 0)).unwrap(), "2023-11-14T22:13:20.000Z");
        assert_eq!(decode(&ts(1_700_000_000, 5_999_999)).unwrap(), "2023-11-14T22:13:20.005Z");
    }

    #[test]
    fn decode_out_of_range_is_internal() {
        assert!(matches!(decode(&ts(i64::MAX, 0)), Err(GatewayError::Internal(_))));
    }

    #[test]
    fn round_trip_iso_strings() {
        let cases = [
            ("2023-11-14T22:13:20.000Z", "2023-11-14T22:13:20.000Z"),
            ("2023-11-14T22:13:20.042Z", "2023-11-14T22:13:20.042Z"),
            ("2023-11-14T22:13:20Z", "2023-11-14T22:13:20.000Z"),
            ("2023-11-14T23:13:20.250+01:00", "2023-11-14T22:13:20.250Z"),
            ("2024-02-29T00:00:00.999-05:30", "2024-02-29T05:30:00.999Z"),
            ("1970-01-01T00:00:00.000Z", "1970-01-01T00:00:00.000Z"),
            ("1969-07-20T20:17:40.001Z", "1969-07-20T20:17:40.001Z"),
        ];
        for (input, normalised) in cases {
            assert_eq!(decode(&encode(input).unwrap()).unwrap(), normalised, "input {input}");
        }
    }

    #[test]
    fn round_trip_wire_pairs() {
        let cases = [
            (0, 0),
            (1_700_000_000, 0),
            (1_700_000_000, 123_456_789),
            (1_700_000_000, 999_999_999),
            (-1, 1),
            (-86_400, 500_000_000),
            (253_402_300_799, 999_000_000),
        ];
        for (seconds, nanos) in cases {
            let iso = decode(&ts(seconds, nanos)).unwrap();
            let back = encode(&iso).unwrap();
            assert_eq!(back, ts(seconds, nanos - nanos % 1_000_000), "pair ({seconds}, {nanos})");
        }
    }
}
