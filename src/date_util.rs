use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// Offset of 23:59:59.999 from midnight, in milliseconds.
const LAST_MILLI_OF_DAY: i64 = 86_400_000 - 1;

/// Day and month boundary math in a fixed time zone.
///
/// All timestamps are milliseconds since the Unix epoch. "Local" below means
/// local to the captured zone, which is the system zone for
/// [`DateRangeCalculator::local`].
#[derive(Debug, Clone)]
pub struct DateRangeCalculator<Tz: TimeZone = Local> {
    tz: Tz,
}

impl DateRangeCalculator<Local> {
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl Default for DateRangeCalculator<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> DateRangeCalculator<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// The local calendar date a timestamp falls on.
    pub fn date_of(&self, timestamp: i64) -> NaiveDate {
        let utc = DateTime::<Utc>::from_timestamp_millis(timestamp).unwrap_or(if timestamp < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        utc.with_timezone(&self.tz).date_naive()
    }

    /// Local midnight of `date`.
    pub fn start_of_date(&self, date: NaiveDate) -> i64 {
        self.resolve(date.and_time(NaiveTime::MIN))
    }

    /// 23:59:59.999 local on `date`.
    pub fn end_of_date(&self, date: NaiveDate) -> i64 {
        self.resolve(date.and_time(NaiveTime::MIN) + Duration::milliseconds(LAST_MILLI_OF_DAY))
    }

    /// Inclusive `[start, end]` bounds of the local day containing `timestamp`.
    pub fn day_range(&self, timestamp: i64) -> (i64, i64) {
        let date = self.date_of(timestamp);
        (self.start_of_date(date), self.end_of_date(date))
    }

    /// Inclusive bounds of a month. `month0` is 0-based (January = 0) and
    /// rolls over into later years past 11.
    pub fn month_range(&self, year: i32, month0: u32) -> (i64, i64) {
        let month = MonthCursor::new(year, month0);
        (
            self.start_of_date(month.first_day()),
            self.end_of_date(month.last_day()),
        )
    }

    pub fn today_timestamp(&self) -> i64 {
        self.start_of_date(self.today())
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    pub fn is_same_day(&self, t1: i64, t2: i64) -> bool {
        let (a, b) = (self.date_of(t1), self.date_of(t2));
        a.year() == b.year() && a.ordinal() == b.ordinal()
    }

    /// Local midnight of the given date, or `None` when the day does not
    /// exist in that month.
    pub fn timestamp_for_date(&self, year: i32, month0: u32, day: u32) -> Option<i64> {
        let month = MonthCursor::new(year, month0);
        NaiveDate::from_ymd_opt(month.year, month.month0 + 1, day).map(|d| self.start_of_date(d))
    }

    /// `YYYY-MM-DD` of the local day containing `timestamp`.
    pub fn format_date(&self, timestamp: i64) -> String {
        self.date_of(timestamp).format("%Y-%m-%d").to_string()
    }

    /// Map a wall-clock time to an instant. Ambiguous times take the earlier
    /// instant; times skipped by a forward transition move past the gap.
    fn resolve(&self, naive: NaiveDateTime) -> i64 {
        if let Some(dt) = self.tz.from_local_datetime(&naive).earliest() {
            return dt.timestamp_millis();
        }
        let mut shifted = naive;
        for _ in 0..4 {
            shifted += Duration::minutes(30);
            if let Some(dt) = self.tz.from_local_datetime(&shifted).earliest() {
                return dt.timestamp_millis();
            }
        }
        self.tz.from_utc_datetime(&naive).timestamp_millis()
    }
}

/// A calendar month, used for paging the month view back and forth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MonthCursor {
    pub year: i32,
    /// 0-based month (January = 0).
    pub month0: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month0: u32) -> Self {
        Self {
            year: year.saturating_add((month0 / 12) as i32),
            month0: month0 % 12,
        }
    }

    /// The month containing `timestamp` in the calculator's zone.
    pub fn containing<Tz: TimeZone>(calc: &DateRangeCalculator<Tz>, timestamp: i64) -> Self {
        let date = calc.date_of(timestamp);
        Self::new(date.year(), date.month0())
    }

    pub fn current<Tz: TimeZone>(calc: &DateRangeCalculator<Tz>) -> Self {
        let today = calc.today();
        Self::new(today.year(), today.month0())
    }

    pub fn next(self) -> Self {
        Self::new(self.year, self.month0 + 1)
    }

    pub fn previous(self) -> Self {
        if self.month0 == 0 {
            Self::new(self.year.saturating_sub(1), 11)
        } else {
            Self::new(self.year, self.month0 - 1)
        }
    }

    pub fn first_day(self) -> NaiveDate {
        ymd(self.year, self.month0 + 1, 1)
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month0 + 1)
    }

    pub fn days_in_month(self) -> u32 {
        self.last_day().day()
    }

    pub fn range<Tz: TimeZone>(self, calc: &DateRangeCalculator<Tz>) -> (i64, i64) {
        calc.month_range(self.year, self.month0)
    }

    /// Heading for the month view, e.g. `2024-03`.
    pub fn label(self) -> String {
        format_month_year(self.year, self.month0)
    }
}

/// Get the last day of a given month (1-based).
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month >= 12 {
        ymd(year + 1, 1, 1)
    } else {
        ymd(year, month + 1, 1)
    };
    first_of_next.pred_opt().unwrap_or(first_of_next)
}

pub fn days_in_month(year: i32, month0: u32) -> u32 {
    MonthCursor::new(year, month0).days_in_month()
}

pub fn format_month_year(year: i32, month0: u32) -> String {
    let month = MonthCursor::new(year, month0);
    format!("{}-{:02}", month.year, month.month0 + 1)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(if year < 0 {
        NaiveDate::MIN
    } else {
        NaiveDate::MAX
    })
}
