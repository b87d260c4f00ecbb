//! Month-grid generation for the calendar view.
//!
//! A grid is a flat, chronological list of cells read left to right in rows of
//! seven starting on Sunday. It always holds 35 or 42 cells: the trailing days
//! of the previous month, every day of the target month, then days of the
//! following month to fill the last row.

use chrono::{Datelike, Days, Months, NaiveDate, TimeZone};
use serde::Serialize;

use crate::date_util::{DateRangeCalculator, MonthCursor};
use crate::task::Task;

pub const DAYS_PER_WEEK: usize = 7;
const FIVE_WEEKS: usize = 35;
const SIX_WEEKS: usize = 42;

/// One day slot in the month grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub day_of_month: u32,
    /// Local midnight of this day.
    pub timestamp: i64,
    pub is_current_month: bool,
    pub is_today: bool,
    pub tasks: Vec<Task>,
}

impl CalendarDay {
    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Title shown as the cell preview.
    pub fn first_task_title(&self) -> Option<&str> {
        self.tasks.first().map(|t| t.title.as_str())
    }

    /// Tasks beyond the previewed one (the "+N" badge).
    pub fn additional_task_count(&self) -> usize {
        self.tasks.len().saturating_sub(1)
    }
}

/// Build the grid for `month0` (0-based) of `year`, flagging today's cell.
pub fn build_month_grid<Tz: TimeZone>(
    calc: &DateRangeCalculator<Tz>,
    year: i32,
    month0: u32,
    tasks: &[Task],
) -> Vec<CalendarDay> {
    build_month_grid_at(calc, year, month0, tasks, calc.today_timestamp())
}

/// Like [`build_month_grid`] with an explicit "today". Returns an empty grid
/// when the month or its padding falls outside the supported date range.
pub fn build_month_grid_at<Tz: TimeZone>(
    calc: &DateRangeCalculator<Tz>,
    year: i32,
    month0: u32,
    tasks: &[Task],
    today: i64,
) -> Vec<CalendarDay> {
    let Some(span) = GridSpan::new(year, month0) else {
        log::debug!("No grid for {year}-{month0}: outside the supported date range");
        return Vec::new();
    };

    let mut cells = Vec::with_capacity(span.total);
    for date in span.start.iter_days().take(span.total) {
        let (day_start, day_end) = (calc.start_of_date(date), calc.end_of_date(date));
        cells.push(CalendarDay {
            day_of_month: date.day(),
            timestamp: day_start,
            is_current_month: date.year() == span.month.year && date.month0() == span.month.month0,
            is_today: calc.is_same_day(day_start, today),
            tasks: tasks
                .iter()
                .filter(|t| (day_start..=day_end).contains(&t.date))
                .cloned()
                .collect(),
        });
    }
    cells
}

/// Five weeks when the leading padding plus the month fit, otherwise six.
pub fn grid_len(leading: usize, days_in_month: usize) -> usize {
    if leading + days_in_month <= FIVE_WEEKS {
        FIVE_WEEKS
    } else {
        SIX_WEEKS
    }
}

/// First and last instant covered by the grid for `month0` of `year`,
/// including the padding days of the neighbouring months. `None` when the
/// grid cannot be represented.
pub fn grid_range<Tz: TimeZone>(
    calc: &DateRangeCalculator<Tz>,
    year: i32,
    month0: u32,
) -> Option<(i64, i64)> {
    let span = GridSpan::new(year, month0)?;
    Some((calc.start_of_date(span.start), calc.end_of_date(span.end)))
}

/// Dates covered by one month's grid.
struct GridSpan {
    month: MonthCursor,
    start: NaiveDate,
    end: NaiveDate,
    total: usize,
}

impl GridSpan {
    fn new(year: i32, month0: u32) -> Option<Self> {
        let month = MonthCursor::new(year, month0);
        let first = NaiveDate::from_ymd_opt(month.year, month.month0 + 1, 1)?;
        let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
        let leading = first.weekday().num_days_from_sunday() as usize;
        let total = grid_len(leading, last.day() as usize);
        let start = first.checked_sub_days(Days::new(leading as u64))?;
        let end = start.checked_add_days(Days::new(total as u64 - 1))?;
        Some(Self {
            month,
            start,
            end,
            total,
        })
    }
}

/// Split a grid into its weekly rows.
pub fn weeks(cells: &[CalendarDay]) -> impl Iterator<Item = &[CalendarDay]> {
    cells.chunks(DAYS_PER_WEEK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn utc() -> DateRangeCalculator<Utc> {
        DateRangeCalculator::new(Utc)
    }

    fn task_at(calc: &DateRangeCalculator<Utc>, y: i32, m0: u32, d: u32, hour: i64, title: &str) -> Task {
        let midnight = calc.timestamp_for_date(y, m0, d).unwrap();
        Task::new(title, "", midnight + hour * 3_600_000)
    }

    #[test]
    fn test_march_2024_needs_six_weeks() {
        // 2024-03-01 is a Friday: five leading days, 5 + 31 = 36 > 35.
        let calc = utc();
        let grid = build_month_grid_at(&calc, 2024, 2, &[], 0);
        assert_eq!(grid.len(), 42);
        assert!(grid[..5].iter().all(|c| !c.is_current_month));
        assert_eq!(
            grid[..5].iter().map(|c| c.day_of_month).collect::<Vec<_>>(),
            vec![25, 26, 27, 28, 29]
        );
        assert_eq!(grid[5].day_of_month, 1);
        assert!(grid[5].is_current_month);
        assert_eq!(grid[35].day_of_month, 31);
        assert_eq!(grid[36].day_of_month, 1);
        assert!(!grid[36].is_current_month);
    }

    #[test]
    fn test_february_2026_starts_sunday() {
        // 2026-02-01 is a Sunday and the month has 28 days.
        let calc = utc();
        let grid = build_month_grid_at(&calc, 2026, 1, &[], 0);
        assert_eq!(grid.len(), 35);
        assert_eq!(grid[0].day_of_month, 1);
        assert!(grid[0].is_current_month);
        assert!(grid[28..].iter().all(|c| !c.is_current_month));
    }

    #[test]
    fn test_grid_shape_for_every_month() {
        let calc = utc();
        for year in 1990..=2040 {
            for month0 in 0..12 {
                let grid = build_month_grid_at(&calc, year, month0, &[], 0);
                let cursor = MonthCursor::new(year, month0);
                let days = cursor.days_in_month() as usize;
                let leading = cursor.first_day().weekday().num_days_from_sunday() as usize;

                assert!(grid.len() == 35 || grid.len() == 42, "{year}-{month0}");
                let smallest = if leading + days <= 35 { 35 } else { 42 };
                assert_eq!(grid.len(), smallest, "{year}-{month0}");
                assert_eq!(grid.len() % DAYS_PER_WEEK, 0);

                let current: Vec<u32> = grid
                    .iter()
                    .filter(|c| c.is_current_month)
                    .map(|c| c.day_of_month)
                    .collect();
                assert_eq!(current, (1..=days as u32).collect::<Vec<_>>());

                // Leading cells are exactly the padding before day 1
                assert!(grid[..leading].iter().all(|c| !c.is_current_month));
                assert!(grid[leading].is_current_month);

                // Strictly consecutive days, first column always Sunday
                for pair in grid.windows(2) {
                    assert_eq!(pair[1].timestamp - pair[0].timestamp, 86_400_000);
                }
                for week in weeks(&grid) {
                    let sunday = calc.date_of(week[0].timestamp);
                    assert_eq!(sunday.weekday(), chrono::Weekday::Sun);
                }
            }
        }
    }

    #[test]
    fn test_every_weekday_and_length_combination_fills_rows() {
        for leading in 0..7 {
            for days in 28..=31 {
                let len = grid_len(leading, days);
                assert!(len >= leading + days);
                assert_eq!(len % DAYS_PER_WEEK, 0);
                assert!(len - (leading + days) < 14);
            }
        }
    }

    #[test]
    fn test_tasks_land_in_exactly_one_cell() {
        let calc = utc();
        let tasks = vec![
            task_at(&calc, 2024, 2, 1, 0, "first instant"),
            task_at(&calc, 2024, 2, 15, 12, "midday"),
            task_at(&calc, 2024, 2, 31, 23, "late"),
            task_at(&calc, 2024, 1, 28, 8, "leading padding"),
            task_at(&calc, 2024, 3, 2, 8, "trailing padding"),
            task_at(&calc, 2024, 5, 1, 8, "off grid"),
        ];
        let grid = build_month_grid_at(&calc, 2024, 2, &tasks, 0);

        for task in &tasks[..5] {
            let holders: Vec<&CalendarDay> = grid.iter().filter(|c| c.tasks.contains(task)).collect();
            assert_eq!(holders.len(), 1, "{}", task.title);
            let (start, end) = calc.day_range(holders[0].timestamp);
            assert!(start <= task.date && task.date <= end);
        }
        assert!(grid.iter().all(|c| !c.tasks.contains(&tasks[5])));

        let fifteenth = grid.iter().find(|c| c.is_current_month && c.day_of_month == 15).unwrap();
        assert_eq!(fifteenth.first_task_title(), Some("midday"));
        assert_eq!(fifteenth.additional_task_count(), 0);
    }

    #[test]
    fn test_last_millisecond_of_day_stays_in_day() {
        let calc = utc();
        let midnight = calc.timestamp_for_date(2024, 2, 10).unwrap();
        let edge = Task::new("edge", "", midnight + 86_400_000 - 1);
        let grid = build_month_grid_at(&calc, 2024, 2, &[edge.clone()], 0);
        let tenth = grid.iter().find(|c| c.is_current_month && c.day_of_month == 10).unwrap();
        assert!(tenth.tasks.contains(&edge));
    }

    #[test]
    fn test_today_flag() {
        let calc = utc();
        let today = task_at(&calc, 2024, 2, 20, 15, "now").date;
        let grid = build_month_grid_at(&calc, 2024, 2, &[], today);
        let flagged: Vec<&CalendarDay> = grid.iter().filter(|c| c.is_today).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].day_of_month, 20);

        let other_month = build_month_grid_at(&calc, 2024, 6, &[], today);
        assert!(other_month.iter().all(|c| !c.is_today));
    }

    #[test]
    fn test_multiple_tasks_keep_input_order() {
        let calc = utc();
        let tasks = vec![
            task_at(&calc, 2024, 2, 5, 9, "a"),
            task_at(&calc, 2024, 2, 5, 10, "b"),
            task_at(&calc, 2024, 2, 5, 11, "c"),
        ];
        let grid = build_month_grid_at(&calc, 2024, 2, &tasks, 0);
        let fifth = grid.iter().find(|c| c.is_current_month && c.day_of_month == 5).unwrap();
        assert!(fifth.has_tasks());
        assert_eq!(fifth.first_task_title(), Some("a"));
        assert_eq!(fifth.additional_task_count(), 2);
    }

    #[test]
    fn test_grid_uses_local_midnights() {
        let calc = DateRangeCalculator::new(FixedOffset::east_opt(9 * 3600).unwrap());
        let grid = build_month_grid_at(&calc, 2024, 2, &[], 0);
        for cell in &grid {
            assert_eq!(calc.day_range(cell.timestamp).0, cell.timestamp);
        }
    }

    #[test]
    fn test_grid_range_matches_cells() {
        let calc = utc();
        let grid = build_month_grid_at(&calc, 2024, 2, &[], 0);
        let (start, end) = grid_range(&calc, 2024, 2).unwrap();
        assert_eq!(start, grid[0].timestamp);
        assert_eq!(end, calc.end_of_date(calc.date_of(grid[41].timestamp)));
    }

    #[test]
    fn test_unrepresentable_months_yield_no_grid() {
        let calc = utc();
        for (year, month0) in [(300_000, 0), (-300_000, 5), (i32::MAX, 0), (i32::MAX, 40), (i32::MIN, 0)] {
            assert!(build_month_grid_at(&calc, year, month0, &[], 0).is_empty(), "{year}-{month0}");
            assert_eq!(grid_range(&calc, year, month0), None, "{year}-{month0}");
        }
    }

    #[test]
    fn test_deterministic() {
        let calc = utc();
        let tasks = vec![task_at(&calc, 2024, 2, 3, 1, "x")];
        assert_eq!(
            build_month_grid_at(&calc, 2024, 2, &tasks, 5),
            build_month_grid_at(&calc, 2024, 2, &tasks, 5)
        );
    }
}
