use chrono::{Datelike, Duration, Months, NaiveDate};

/// Number of cells in a month view (six weeks)
pub const GRID_DAYS: i64 = 42;

pub const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One cell of the month grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Day {
    pub date: NaiveDate,
    pub in_month: bool,
    pub clickable: bool,
    pub is_today: bool,
}

/// A month laid out as a Sunday-first 6x7 grid
#[derive(Debug, Clone)]
pub struct MonthView {
    /// First day of the displayed month
    pub first: NaiveDate,
    pub days: Vec<Day>,
    /// Previous month, unless that would go before the minimum date
    pub prev: Option<NaiveDate>,
    pub next: NaiveDate,
}

impl MonthView {
    /// Build the view for `requested` (or the month of `today`), clamped so it
    /// never shows a month before `min_date`.
    pub fn new(requested: Option<NaiveDate>, today: NaiveDate, min_date: NaiveDate) -> Self {
        let min_month = month_start(min_date);
        let first = month_start(requested.unwrap_or(today)).max(min_month);

        let offset = first.weekday().num_days_from_sunday() as i64;
        let grid_start = first - Duration::days(offset);

        let days = (0..GRID_DAYS)
            .map(|i| {
                let date = grid_start + Duration::days(i);
                let in_month = date.year() == first.year() && date.month() == first.month();
                Day {
                    date,
                    in_month,
                    clickable: in_month && date >= min_date,
                    is_today: date == today,
                }
            })
            .collect();

        let prev = if first > min_month {
            first.checked_sub_months(Months::new(1))
        } else {
            None
        };
        let next = first.checked_add_months(Months::new(1)).unwrap_or(first);

        Self {
            first,
            days,
            prev,
            next,
        }
    }

    /// e.g. "June 2024"
    pub fn title(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

/// Parse a `YYYY-MM` month parameter into the first day of that month
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d").ok()
}

/// `YYYY-MM` form used in page links
pub fn month_param(first: NaiveDate) -> String {
    first.format("%Y-%m").to_string()
}

/// e.g. "Monday, June 24, 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}
