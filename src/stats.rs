//! Completion statistics derived from a task snapshot.
//!
//! Nothing is cached: each figure is computed from the tasks passed in and an
//! explicit evaluation instant.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Task;

/// Completed vs. total tasks for some window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Whole-number percentage, 0 when there are no tasks.
    pub fn percentage(&self) -> u32 {
        rounded_percentage(self.completed, self.total)
    }
}

/// The three dashboard figures computed at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub todays_progress: Progress,
    pub weekly_completion_rate: u32,
    pub overdue_count: usize,
}

/// `round(100 * part / total)` with halves rounded up; 0 for an empty total.
pub fn rounded_percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let part = part as u64;
    let total = total as u64;
    ((200 * part + total) / (2 * total)) as u32
}

/// Tasks created during the calendar day of `now`, in `now`'s time zone.
pub fn todays_progress<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Progress {
    let (start, end) = local_day_bounds(now);
    progress_where(tasks, |task| task.created_at >= start && task.created_at < end)
}

/// Completion rate of tasks created in the seven days (7 x 24h) up to `now`.
pub fn weekly_completion_rate(tasks: &[Task], now: DateTime<Utc>) -> u32 {
    let start = now - Duration::days(7);
    progress_where(tasks, |task| task.created_at >= start && task.created_at <= now).percentage()
}

/// Open tasks whose due date has passed.
pub fn overdue_tasks(tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.is_overdue(now))
        .cloned()
        .collect()
}

pub fn dashboard<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> DashboardStats {
    let now_utc = now.with_timezone(&Utc);
    DashboardStats {
        todays_progress: todays_progress(tasks, now),
        weekly_completion_rate: weekly_completion_rate(tasks, now_utc),
        overdue_count: tasks.iter().filter(|task| task.is_overdue(now_utc)).count(),
    }
}

/// `[midnight, next midnight)` of the day containing `now`, as UTC instants.
pub fn local_day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let start = midnight_in(&tz, today);
    let end = today
        .succ_opt()
        .map(|tomorrow| midnight_in(&tz, tomorrow))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

fn midnight_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // DST gap swallowed midnight; the day starts at the end of the gap
        LocalResult::None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

fn progress_where(tasks: &[Task], in_window: impl Fn(&Task) -> bool) -> Progress {
    tasks
        .iter()
        .filter(|task| in_window(task))
        .fold(Progress::default(), |mut progress, task| {
            progress.total += 1;
            if task.completed {
                progress.completed += 1;
            }
            progress
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::FixedOffset;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn task(id: i64, created_at: DateTime<Utc>, completed: bool) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: String::new(),
            priority: Priority::Medium,
            category_id: 1,
            due_date: None,
            completed,
            created_at,
            completed_at: completed.then_some(created_at),
            tags: None,
        }
    }

    #[test]
    fn empty_snapshot_yields_zeroes() {
        let now = at(2026, 4, 10, 12, 0);
        assert_eq!(todays_progress(&[], &now), Progress { completed: 0, total: 0 });
        assert_eq!(todays_progress(&[], &now).percentage(), 0);
        assert_eq!(weekly_completion_rate(&[], now), 0);
        assert!(overdue_tasks(&[], now).is_empty());
        assert_eq!(dashboard(&[], &now), DashboardStats::default());
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(rounded_percentage(1, 8), 13); // 12.5
        assert_eq!(rounded_percentage(1, 3), 33);
        assert_eq!(rounded_percentage(2, 3), 67);
        assert_eq!(rounded_percentage(1, 200), 1); // 0.5
        assert_eq!(rounded_percentage(3, 3), 100);
    }

    #[test]
    fn todays_progress_uses_midnight_boundaries() {
        let now = at(2026, 4, 10, 12, 0);
        let tasks = vec![
            task(1, at(2026, 4, 10, 0, 0), true),
            task(2, at(2026, 4, 10, 23, 59), false),
            task(3, at(2026, 4, 9, 23, 59), true),
            task(4, at(2026, 4, 11, 0, 0), true),
        ];
        let progress = todays_progress(&tasks, &now);
        assert_eq!(progress, Progress { completed: 1, total: 2 });
        assert_eq!(progress.percentage(), 50);
    }

    #[test]
    fn todays_progress_follows_the_given_time_zone() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(2026, 4, 10, 8, 0).with_timezone(&plus_two);
        let tasks = vec![
            task(1, at(2026, 4, 9, 23, 30), true),
            task(2, at(2026, 4, 9, 21, 30), true),
        ];
        assert_eq!(todays_progress(&tasks, &now), Progress { completed: 1, total: 1 });
    }

    #[test]
    fn weekly_rate_covers_trailing_seven_days() {
        let now = at(2026, 4, 10, 12, 0);
        let tasks = vec![
            task(1, now, true),
            task(2, now - Duration::days(7), true),
            task(3, now - Duration::days(3), false),
            task(4, now - Duration::days(7) - Duration::seconds(1), true),
            task(5, now + Duration::hours(1), true),
        ];
        // tasks 1, 2 and 3 are in the window
        assert_eq!(weekly_completion_rate(&tasks, now), 67);
    }

    #[test]
    fn overdue_needs_open_task_with_past_due_date() {
        let now = at(2026, 4, 10, 12, 0);
        let mut past_open = task(1, now - Duration::days(2), false);
        past_open.due_date = Some(now - Duration::days(1));
        let mut past_done = task(2, now - Duration::days(2), true);
        past_done.due_date = Some(now - Duration::days(1));
        let mut future_open = task(3, now, false);
        future_open.due_date = Some(now + Duration::days(1));
        let no_due = task(4, now - Duration::days(2), false);
        let mut due_now = task(5, now, false);
        due_now.due_date = Some(now);

        let tasks = vec![past_open, past_done, future_open, no_due, due_now];
        let overdue = overdue_tasks(&tasks, now);
        assert_eq!(overdue.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(dashboard(&tasks, &now).overdue_count, 1);
    }

    #[test]
    fn day_bounds_span_one_day() {
        let now = at(2026, 4, 10, 12, 0);
        let (start, end) = local_day_bounds(&now);
        assert_eq!(start, at(2026, 4, 10, 0, 0));
        assert_eq!(end, at(2026, 4, 11, 0, 0));
    }
}
