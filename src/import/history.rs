use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tracing::error;

use crate::db::{DbReadingEvent, ReadingEventType};

/// Date format used by tracker exports, e.g. `2021/06/01`
pub const READ_DATE_FORMAT: &str = "%Y/%m/%d";

/// Plan the FINISHED events to create for one imported record, given the
/// association's current history. Purely additive: events are planned for
/// explicit read dates that don't already exist on the same calendar day,
/// then synthetic past-dated events cover any read-count surplus.
///
/// A record shelved as read with no dates and no count still yields one
/// finished event. Unparseable dates are logged and do not count towards
/// the read total.
pub fn plan_finished_events(
    read_dates: Option<&str>,
    read_count: Option<i32>,
    status: Option<ReadingEventType>,
    existing: &[DbReadingEvent],
) -> Vec<DateTime<Utc>> {
    let existing_finished_days: Vec<NaiveDate> = existing
        .iter()
        .filter(|event| event.event_type == ReadingEventType::Finished)
        .map(|event| event.event_date.date_naive())
        .collect();

    let mut planned = Vec::new();
    let mut dates_processed = 0i32;
    if let Some(raw) = read_dates.filter(|raw| !raw.trim().is_empty()) {
        for date in raw.split(';') {
            match NaiveDate::parse_from_str(date.trim(), READ_DATE_FORMAT) {
                Ok(parsed) => {
                    if !existing_finished_days.contains(&parsed) {
                        planned.push(day_start(parsed));
                    }
                    // duplicates still count towards the read total
                    dates_processed += 1;
                }
                Err(_) => error!("failed to parse read date from export: {}", date),
            }
        }
    }

    let mut remaining = match read_count {
        Some(count) if count > dates_processed => count - dates_processed,
        _ => 0,
    };
    if status == Some(ReadingEventType::Finished) && remaining == 0 && dates_processed == 0 {
        remaining += 1;
    }
    remaining -= existing_finished_days.len() as i32;

    // undated re-reads become synthetic events starting at the epoch, one
    // day apart, so they sort before any real date
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    for idx in 0..remaining.max(0) {
        planned.push(day_start(epoch + Days::new(idx as u64)));
    }
    planned
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_on(year: i32, month: u32, day: u32) -> DbReadingEvent {
        DbReadingEvent::new(
            "ub1",
            ReadingEventType::Finished,
            day_start(NaiveDate::from_ymd_opt(year, month, day).unwrap()),
        )
    }

    fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        day_start(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn one_event_per_explicit_date() {
        let planned = plan_finished_events(Some("2021/06/01;2022/01/15"), Some(2), None, &[]);
        assert_eq!(planned, vec![day(2021, 6, 1), day(2022, 1, 15)]);
    }

    #[test]
    fn same_day_duplicates_are_skipped_but_still_counted() {
        let existing = vec![finished_on(2021, 6, 1)];
        let planned = plan_finished_events(Some("2021/06/01"), Some(1), None, &existing);
        assert!(planned.is_empty());
    }

    #[test]
    fn read_count_surplus_becomes_synthetic_past_events() {
        let planned = plan_finished_events(Some("2021/06/01"), Some(3), None, &[]);
        assert_eq!(
            planned,
            vec![day(2021, 6, 1), day(1970, 1, 1), day(1970, 1, 2)]
        );
    }

    #[test]
    fn finished_status_alone_yields_one_event() {
        let planned =
            plan_finished_events(None, None, Some(ReadingEventType::Finished), &[]);
        assert_eq!(planned, vec![day(1970, 1, 1)]);
    }

    #[test]
    fn finished_status_with_existing_history_adds_nothing() {
        let existing = vec![finished_on(2020, 3, 3)];
        let planned =
            plan_finished_events(None, None, Some(ReadingEventType::Finished), &existing);
        assert!(planned.is_empty());
    }

    #[test]
    fn unparseable_dates_do_not_count_towards_the_total() {
        // the bad token neither plans an event nor eats into the count
        let planned = plan_finished_events(Some("junk;2021/06/01"), Some(2), None, &[]);
        assert_eq!(planned, vec![day(2021, 6, 1), day(1970, 1, 1)]);
    }

    #[test]
    fn existing_events_reduce_the_synthetic_surplus() {
        let existing = vec![finished_on(2019, 1, 1), finished_on(2020, 1, 1)];
        let planned = plan_finished_events(None, Some(3), None, &existing);
        assert_eq!(planned, vec![day(1970, 1, 1)]);
    }

    #[test]
    fn currently_reading_status_plans_nothing() {
        let planned =
            plan_finished_events(None, None, Some(ReadingEventType::CurrentlyReading), &[]);
        assert!(planned.is_empty());
    }
}
