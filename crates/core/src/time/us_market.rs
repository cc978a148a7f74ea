use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

const EST_OFFSET_SECS: i32 = -5 * 3600;

// NYSE close is 16:00 Eastern. A fixed EST offset plus a late cutoff keeps
// the resolution conservative through daylight saving.
const CLOSE_CUTOFF_HOUR_EST: u32 = 17;
const CLOSE_CUTOFF_MINUTE_EST: u32 = 0;

pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?);
    }

    let est = chrono::FixedOffset::east_opt(EST_OFFSET_SECS).context("invalid EST offset")?;
    let now_est = now_utc.with_timezone(&est);

    let cutoff_reached =
        (now_est.hour(), now_est.minute()) >= (CLOSE_CUTOFF_HOUR_EST, CLOSE_CUTOFF_MINUTE_EST);
    let mut date = now_est.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    // Roll back to the previous business day.
    let holidays = configured_holidays();
    while is_weekend(date) || holidays.contains(&date) {
        date = date - Duration::days(1);
    }

    Ok(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    use chrono::Datelike;
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn configured_holidays() -> HashSet<NaiveDate> {
    // Minimal set of fixed-date NYSE closures.
    // Extend via US_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out = HashSet::new();
    let years = [2024, 2025, 2026, 2027, 2028, 2029, 2030];
    for y in years {
        if let Some(d) = NaiveDate::from_ymd_opt(y, 1, 1) {
            out.insert(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(y, 7, 4) {
            out.insert(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(y, 12, 25) {
            out.insert(d);
        }
    }

    if let Ok(s) = std::env::var("US_MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.insert(d);
            }
        }
    }

    out
}
