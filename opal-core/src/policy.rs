//! Duration policy: requested end times are capped against a
//! status-dependent maximum lifetime.

use chrono::{DateTime, Duration, Utc};

use crate::error::Error;

/// Cap `requested` against `now + max`.
///
/// A missing or already-passed request is replaced by `now + max`; anything
/// beyond `now + max` is refused. Called on every extension.
pub fn cap_end_time(
    now: DateTime<Utc>,
    requested: Option<DateTime<Utc>>,
    max: Duration,
    res_name: &str,
) -> Result<DateTime<Utc>, Error> {
    let max_end_time = now + max;
    let end_time = match requested {
        Some(end) if end >= now => end,
        _ => max_end_time,
    };
    if end_time > max_end_time {
        return Err(Error::DurationExceeded(res_name.to_owned()));
    }
    Ok(end_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_request_gets_the_maximum() {
        let now = Utc::now();
        let max = Duration::hours(2);
        let end = cap_end_time(now, None, max, "r1").expect("cap");
        assert_eq!(end, now + max);
    }

    #[test]
    fn past_request_gets_the_maximum() {
        let now = Utc::now();
        let max = Duration::hours(2);
        let end = cap_end_time(now, Some(now - Duration::minutes(5)), max, "r1").expect("cap");
        assert_eq!(end, now + max);
    }

    #[test]
    fn request_within_the_maximum_is_kept() {
        let now = Utc::now();
        let wanted = now + Duration::minutes(30);
        let end = cap_end_time(now, Some(wanted), Duration::hours(2), "r1").expect("cap");
        assert_eq!(end, wanted);
    }

    #[test]
    fn request_at_exactly_the_maximum_is_kept() {
        let now = Utc::now();
        let max = Duration::hours(2);
        let end = cap_end_time(now, Some(now + max), max, "r1").expect("cap");
        assert_eq!(end, now + max);
    }

    #[test]
    fn request_beyond_the_maximum_is_refused() {
        let now = Utc::now();
        let err = cap_end_time(
            now,
            Some(now + Duration::hours(10)),
            Duration::hours(5),
            "r1",
        )
        .expect_err("beyond max");
        assert!(matches!(err, Error::DurationExceeded(name) if name == "r1"));
    }
}
