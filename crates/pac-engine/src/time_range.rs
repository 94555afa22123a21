//! `weekdayRange`, `dateRange` and `timeRange`.
//!
//! Arguments are already converted to [`TimeArg`]s; a trailing `"GMT"`
//! switches the comparison from local time to UTC. Weekday and date ranges
//! whose start is after their end wrap around (e.g. `FRI`..`MON`). Time
//! ranges never wrap and exclude their end.

use chrono::{Datelike, Local, NaiveDateTime, Timelike, Utc};

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const MONTHS: [&str; 12] =
    ["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimeArg {
    Number(i64),
    Text(String),
}

/// Snapshot of the current time in both zones.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    pub(crate) local: NaiveDateTime,
    pub(crate) utc: NaiveDateTime,
}

impl Clock {
    pub(crate) fn now() -> Self {
        Self { local: Local::now().naive_local(), utc: Utc::now().naive_utc() }
    }

    fn pick(&self, gmt: bool) -> NaiveDateTime {
        if gmt {
            self.utc
        } else {
            self.local
        }
    }
}

fn split_gmt(args: &[TimeArg]) -> (&[TimeArg], bool) {
    match args.split_last() {
        Some((TimeArg::Text(last), rest)) if last == "GMT" => (rest, true),
        _ => (args, false),
    }
}

fn in_range(start: i64, end: i64, now: i64) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

fn weekday_index(arg: &TimeArg) -> Option<i64> {
    match arg {
        TimeArg::Text(name) => WEEKDAYS.iter().position(|d| d == name).map(|i| i as i64),
        TimeArg::Number(_) => None,
    }
}

fn month_number(name: &str) -> Option<i64> {
    MONTHS.iter().position(|m| *m == name).map(|i| i as i64 + 1)
}

pub(crate) fn weekday_range(args: &[TimeArg], clock: &Clock) -> bool {
    let (args, gmt) = split_gmt(args);
    let today = i64::from(clock.pick(gmt).weekday().num_days_from_sunday());
    let (first, last) = match args {
        [only] => match weekday_index(only) {
            Some(day) => (day, day),
            None => return false,
        },
        [from, to] => match (weekday_index(from), weekday_index(to)) {
            (Some(from), Some(to)) => (from, to),
            _ => return false,
        },
        _ => return false,
    };
    in_range(first, last, today)
}

/// `None` when the argument count is not one the PAC contract defines.
pub(crate) fn time_range(args: &[TimeArg], clock: &Clock) -> Option<bool> {
    let (args, gmt) = split_gmt(args);
    let now = clock.pick(gmt);
    let mut numbers = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            TimeArg::Number(n) => numbers.push(*n),
            TimeArg::Text(_) if matches!(args.len(), 1 | 2 | 4 | 6) => return Some(false),
            TimeArg::Text(_) => return None,
        }
    }
    let hour = i64::from(now.hour());
    let seconds = i64::from(now.num_seconds_from_midnight());
    let at = |h: i64, m: i64, s: i64| h * 3600 + m * 60 + s;
    match numbers.as_slice() {
        [] => Some(false),
        [h] => Some(hour == *h),
        [h1, h2] => Some(*h1 <= hour && hour < *h2),
        [h1, m1, h2, m2] => Some(at(*h1, *m1, 0) <= seconds && seconds < at(*h2, *m2, 59)),
        [h1, m1, s1, h2, m2, s2] => {
            Some(at(*h1, *m1, *s1) <= seconds && seconds < at(*h2, *m2, *s2))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DateSpec {
    day: Option<i64>,
    month: Option<i64>,
    year: Option<i64>,
}

impl DateSpec {
    fn parse(args: &[TimeArg]) -> Option<Self> {
        let mut spec = DateSpec::default();
        for arg in args {
            let (slot, value) = match arg {
                TimeArg::Number(n) if (1..32).contains(n) => (&mut spec.day, *n),
                TimeArg::Number(n) if *n >= 32 => (&mut spec.year, *n),
                TimeArg::Number(_) => return None,
                TimeArg::Text(name) => (&mut spec.month, month_number(name)?),
            };
            if slot.replace(value).is_some() {
                return None;
            }
        }
        Some(spec)
    }

    fn same_fields(&self, other: &DateSpec) -> bool {
        self.day.is_some() == other.day.is_some()
            && self.month.is_some() == other.month.is_some()
            && self.year.is_some() == other.year.is_some()
    }

    /// Comparable key over the fields that are set.
    fn key(&self) -> i64 {
        let mut key = self.year.unwrap_or(0);
        if self.month.is_some() || self.day.is_some() {
            key = key * 100 + self.month.unwrap_or(0);
        }
        key * 100 + self.day.unwrap_or(0)
    }

    /// Project `now` onto the fields of `self`.
    fn project(&self, now: NaiveDateTime) -> DateSpec {
        DateSpec {
            day: self.day.map(|_| i64::from(now.day())),
            month: self.month.map(|_| i64::from(now.month())),
            year: self.year.map(|_| i64::from(now.year())),
        }
    }
}

pub(crate) fn date_range(args: &[TimeArg], clock: &Clock) -> bool {
    let (args, gmt) = split_gmt(args);
    let now = clock.pick(gmt);
    if args.is_empty() || (args.len() % 2 == 1 && args.len() != 1) {
        return false;
    }
    if let [only] = args {
        return DateSpec::parse(std::slice::from_ref(only))
            .is_some_and(|spec| spec.project(now) == spec);
    }
    let half = args.len() / 2;
    let (Some(start), Some(end)) = (DateSpec::parse(&args[..half]), DateSpec::parse(&args[half..]))
    else {
        return false;
    };
    if !start.same_fields(&end) {
        return false;
    }
    in_range(start.key(), end.key(), start.project(now).key())
}
