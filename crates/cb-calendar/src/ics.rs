//! iCalendar document reading
//!
//! Only what reminders need is read from each VEVENT: start, end and
//! summary. Recurrence rules are not expanded and time zone identifiers are
//! not resolved; `TZID`-qualified and floating times are read as UTC.

use chrono::{DateTime, Duration, Utc};
use icalendar::parser::{Component, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::debug;

use crate::error::{CalendarError, Result};
use crate::models::CalendarEvent;

/// Parse every VEVENT of an iCalendar document
pub fn parse_events(ics: &str) -> Result<Vec<CalendarEvent>> {
    let unfolded = unfold(ics);

    if !unfolded
        .lines()
        .any(|l| l.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(CalendarError::ParseError("missing BEGIN:VCALENDAR".to_string()));
    }

    let calendar = read_calendar(&unfolded).map_err(|e| CalendarError::ParseError(e.to_string()))?;

    let mut events = Vec::new();
    collect_events(&calendar.components, &mut events)?;
    Ok(events)
}

/// Walk the component tree; components nested in a VEVENT (VALARM) are not events
fn collect_events(components: &[Component<'_>], events: &mut Vec<CalendarEvent>) -> Result<()> {
    for component in components {
        if component.name == "VEVENT" {
            match event_from_component(component)? {
                Some(event) => events.push(event),
                None => debug!("Skipping VEVENT without DTSTART"),
            }
        } else {
            collect_events(&component.components, events)?;
        }
    }
    Ok(())
}

fn event_from_component(vevent: &Component<'_>) -> Result<Option<CalendarEvent>> {
    let Some(dtstart) = vevent.find_prop("DTSTART") else {
        return Ok(None);
    };
    let start = DatePerhapsTime::try_from(dtstart)
        .map_err(|_| invalid_date_time(dtstart.val.as_ref()))?;
    let all_day = matches!(start, DatePerhapsTime::Date(_));
    let start = to_utc(start, dtstart.val.as_ref())?;

    let end = match (vevent.find_prop("DTEND"), vevent.find_prop("DURATION")) {
        (Some(dtend), _) => {
            let end = DatePerhapsTime::try_from(dtend)
                .map_err(|_| invalid_date_time(dtend.val.as_ref()))?;
            to_utc(end, dtend.val.as_ref())?
        }
        (None, Some(duration)) => add_duration(start, parse_duration(duration.val.as_ref())?)?,
        (None, None) if all_day => add_duration(start, Duration::days(1))?,
        (None, None) => start,
    };

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();

    Ok(Some(CalendarEvent::new(start, end, summary)))
}

fn to_utc(value: DatePerhapsTime, raw: &str) -> Result<DateTime<Utc>> {
    match value {
        DatePerhapsTime::Date(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| invalid_date_time(raw)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Ok(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Ok(naive.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            Ok(date_time.and_utc())
        }
    }
}

fn add_duration(start: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    start
        .checked_add_signed(duration)
        .ok_or_else(|| CalendarError::ParseError(format!("event end out of range: {} + {}", start, duration)))
}

fn invalid_date_time(value: &str) -> CalendarError {
    CalendarError::ParseError(format!("invalid date-time: {}", value))
}

/// Parse an RFC 5545 duration such as `PT1H30M`, `P1D` or `-P1W`
///
/// Values that do not fit a `Duration` are rejected rather than wrapped.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || CalendarError::ParseError(format!("invalid duration: {}", value));

    let mut rest = value.trim();
    let negative = if let Some(r) = rest.strip_prefix('-') {
        rest = r;
        true
    } else {
        rest = rest.strip_prefix('+').unwrap_or(rest);
        false
    };
    rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    let mut total = Duration::zero();
    let mut number = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' => in_time = true,
            unit => {
                let n: i64 = number.parse().map_err(|_| invalid())?;
                number.clear();
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => None,
                };
                total = part
                    .and_then(|part| total.checked_add(&part))
                    .ok_or_else(invalid)?;
            }
        }
    }

    if !number.is_empty() {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:1\r\n\
DTSTART:20240501T090000Z\r\n\
DTEND:20240501T100000Z\r\n\
SUMMARY:Stand-up\\, daily\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
DESCRIPTION:alarm text\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:2\r\n\
DTSTART;VALUE=DATE:20240502\r\n\
SUMMARY:Holiday\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:3\r\n\
DTSTART;TZID=Europe/Amsterdam:20240503T140000\r\n\
DURATION:PT1H30M\r\n\
SUMMARY:Dentist appointment with a very long\r\n  title\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn single_event(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:x\r\n{}END:VEVENT\r\nEND:VCALENDAR\r\n", body)
    }

    #[test]
    fn test_parse_events() {
        let events = parse_events(SAMPLE).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].text, "Stand-up, daily");
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        assert_eq!(events[1].text, "Holiday");
        assert_eq!(events[1].end - events[1].start, Duration::days(1));

        assert_eq!(events[2].text, "Dentist appointment with a very long title");
        assert_eq!(events[2].start, Utc.with_ymd_and_hms(2024, 5, 3, 14, 0, 0).unwrap());
        assert_eq!(events[2].end - events[2].start, Duration::minutes(90));
    }

    #[test]
    fn test_missing_calendar() {
        assert!(parse_events("hello").is_err());
    }

    #[test]
    fn test_invalid_date_is_an_error() {
        let ics = single_event("DTSTART:yesterday\r\n");
        assert!(matches!(parse_events(&ics), Err(CalendarError::ParseError(_))));
    }

    #[test]
    fn test_event_without_start_is_skipped() {
        let ics = single_event("SUMMARY:floating\r\n");
        assert!(parse_events(&ics).unwrap().is_empty());
    }

    #[test]
    fn test_huge_duration_is_an_error() {
        let ics = single_event("DTSTART:20240501T090000Z\r\nDURATION:P99999999999999W\r\nSUMMARY:Forever\r\n");
        assert!(matches!(parse_events(&ics), Err(CalendarError::ParseError(_))));
    }

    #[test]
    fn test_duration_past_end_of_time_is_an_error() {
        // Fits in a Duration but not after the start date
        let ics = single_event("DTSTART:20240501T090000Z\r\nDURATION:P100000000D\r\nSUMMARY:Long\r\n");
        assert!(matches!(parse_events(&ics), Err(CalendarError::ParseError(_))));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT15M").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("P1W").unwrap(), Duration::weeks(1));
        assert_eq!(parse_duration("P1DT2H").unwrap(), Duration::hours(26));
        assert_eq!(parse_duration("-PT5M").unwrap(), Duration::minutes(-5));
        assert!(parse_duration("1H").is_err());
        assert!(parse_duration("PT5").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("P99999999999999W").is_err());
        assert!(parse_duration("PT9223372036854775807S").is_err());
        assert!(parse_duration("P10000000000000D").is_err());
    }
}
