use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::models::Booking;
use crate::services::views;

/// Length of a booked call in calendar exports.
pub const CALL_MINUTES: i64 = 30;

pub const WEEKDAY_LABELS: [&str; 7] = ["Mån", "Tis", "Ons", "Tor", "Fre", "Lör", "Sön"];

const MONTH_NAMES: [&str; 12] = [
    "januari", "februari", "mars", "april", "maj", "juni", "juli", "augusti", "september",
    "oktober", "november", "december",
];

/// First day of a displayed month. Navigation always steps from day 1, so
/// paging back and forth never drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthAnchor(NaiveDate);

impl MonthAnchor {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Duration::days(i64::from(date.day0())))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn next(&self) -> Self {
        self.0
            .checked_add_months(Months::new(1))
            .map(Self)
            .unwrap_or(*self)
    }

    pub fn prev(&self) -> Self {
        self.0
            .checked_sub_months(Months::new(1))
            .map(Self)
            .unwrap_or(*self)
    }

    pub fn days_in_month(&self) -> u32 {
        match self.0.checked_add_months(Months::new(1)) {
            Some(next) => (next - self.0).num_days() as u32,
            None => 31,
        }
    }

    /// Blank cells before day 1 in a Monday-first week.
    pub fn leading_blank_cells(&self) -> u32 {
        let sunday_origin = self.0.weekday().num_days_from_sunday();
        (sunday_origin + 6) % 7
    }

    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        self.0.with_day(day)
    }

    pub fn title(&self) -> String {
        format!("{} {}", MONTH_NAMES[self.0.month0() as usize], self.year())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarGrid<'a> {
    pub year: i32,
    pub month: u32,
    pub title: String,
    pub weekdays: [&'static str; 7],
    pub leading_blank_cells: u32,
    pub days: Vec<DayCell<'a>>,
}

#[derive(Debug, Serialize)]
pub struct DayCell<'a> {
    pub day: u32,
    pub date: String,
    pub bookings: Vec<&'a Booking>,
}

pub fn build_grid(anchor: MonthAnchor, bookings: &[Booking]) -> CalendarGrid<'_> {
    let days = (1..=anchor.days_in_month())
        .filter_map(|day| anchor.day(day).map(|date| (day, date)))
        .map(|(day, date)| {
            let date = date.format("%Y-%m-%d").to_string();
            DayCell {
                day,
                bookings: views::bookings_on(bookings, &date),
                date,
            }
        })
        .collect();

    CalendarGrid {
        year: anchor.year(),
        month: anchor.month(),
        title: anchor.title(),
        weekdays: WEEKDAY_LABELS,
        leading_blank_cells: anchor.leading_blank_cells(),
        days,
    }
}

/// Single-event iCalendar document for a booked call, or `None` when the
/// booking's date or time can't be read.
pub fn generate_ics(booking: &Booking) -> Option<String> {
    let start = booking.starts_at()?;
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::minutes(CALL_MINUTES))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@bokasmidigt", booking.id);

    let summary = escape_text(&format!(
        "Samtal med {} ({})",
        booking.customer_name,
        booking.representative.as_str()
    ));
    let mut description = format!("Telefon: {}", booking.phone);
    if !booking.notes.is_empty() {
        description.push_str(&format!("\n{}", booking.notes));
    }
    if let Some(summary) = &booking.ai_summary {
        description.push_str(&format!("\nAnalys: {summary}"));
    }
    let description = escape_text(&description);

    Some(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//BokaSmidigt//Booking Dashboard//SV\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Representative};

    fn booking(id: &str, date: &str) -> Booking {
        Booking {
            id: id.to_string(),
            customer_name: "Anna".to_string(),
            phone: "0701234567".to_string(),
            email: String::new(),
            date: date.to_string(),
            time: "14:00".to_string(),
            representative: Representative::Niclas,
            notes: String::new(),
            status: BookingStatus::Pending,
            lead_quality: None,
            ai_summary: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_february_leap_year() {
        let anchor = MonthAnchor::new(2024, 2).unwrap();
        assert_eq!(anchor.days_in_month(), 29);
        // 2024-02-01 is a Thursday
        assert_eq!(anchor.leading_blank_cells(), 3);

        let grid = build_grid(anchor, &[]);
        assert_eq!(grid.days.len(), 29);
        assert_eq!(grid.days[28].date, "2024-02-29");
        assert_eq!(grid.title, "februari 2024");
    }

    #[test]
    fn test_february_common_year() {
        assert_eq!(MonthAnchor::new(2025, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthAnchor::new(1900, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthAnchor::new(2000, 2).unwrap().days_in_month(), 29);
    }

    #[test]
    fn test_leading_blanks_monday_and_sunday() {
        // 2025-09-01 is a Monday, 2025-06-01 a Sunday
        assert_eq!(MonthAnchor::new(2025, 9).unwrap().leading_blank_cells(), 0);
        assert_eq!(MonthAnchor::new(2025, 6).unwrap().leading_blank_cells(), 6);
    }

    #[test]
    fn test_month_lengths() {
        let lengths: Vec<u32> = (1..=12)
            .map(|m| MonthAnchor::new(2025, m).unwrap().days_in_month())
            .collect();
        assert_eq!(lengths, vec![31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]);
    }

    #[test]
    fn test_navigation_does_not_drift() {
        let start = MonthAnchor::containing(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(start.first_day(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        let feb = start.next();
        assert_eq!((feb.year(), feb.month()), (2025, 2));

        let mut anchor = start;
        for _ in 0..14 {
            anchor = anchor.next();
        }
        for _ in 0..14 {
            anchor = anchor.prev();
        }
        assert_eq!(anchor, start);

        let dec = start.prev();
        assert_eq!((dec.year(), dec.month()), (2024, 12));
    }

    #[test]
    fn test_grid_buckets_bookings_by_exact_date() {
        let bookings = vec![
            booking("a", "2024-02-01"),
            booking("b", "2024-02-29"),
            booking("c", "2024-02-29"),
            booking("d", "2024-03-01"),
        ];
        let grid = build_grid(MonthAnchor::new(2024, 2).unwrap(), &bookings);

        assert_eq!(grid.days[0].bookings.len(), 1);
        assert_eq!(grid.days[0].bookings[0].id, "a");
        assert_eq!(grid.days[28].bookings.len(), 2);
        let total: usize = grid.days.iter().map(|d| d.bookings.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_generate_ics() {
        let mut b = booking("abc", "2025-03-10");
        b.notes = "Intresserad av premium-paket, ring efter lunch".to_string();
        let ics = generate_ics(&b).unwrap();

        assert!(ics.contains("UID:abc@bokasmidigt"));
        assert!(ics.contains("DTSTART:20250310T140000"));
        assert!(ics.contains("DTEND:20250310T143000"));
        assert!(ics.contains("SUMMARY:Samtal med Anna (Niclas)"));
        assert!(ics.contains("premium-paket\\, ring efter lunch"));
    }

    #[test]
    fn test_generate_ics_unreadable_time() {
        let mut b = booking("abc", "2025-03-10");
        b.time = "förmiddag".to_string();
        assert!(generate_ics(&b).is_none());
    }
}
