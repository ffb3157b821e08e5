//! Date and time-of-day bucketing for the history list.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike};

use crate::models::{CapturedNotification, ListItem, TimeOfDay};

/// Long-form date for headers older than yesterday, e.g. "March 5, 2025"
const DATE_HEADER_FORMAT: &str = "%B %-d, %Y";

/// Interleave date and time-of-day headers into a newest-first list.
///
/// A date header is emitted whenever the local calendar day changes. A time
/// header follows whenever the band changes inside the current day, and
/// always right after a new date header. `now` fixes both the time zone and
/// what counts as "Today"/"Yesterday".
pub fn group_notifications<Tz: TimeZone>(
    notifications: &[CapturedNotification],
    now: &DateTime<Tz>,
) -> Vec<ListItem> {
    let tz = now.timezone();
    let today = now.date_naive();
    let yesterday = today.pred_opt();

    let mut items = Vec::with_capacity(notifications.len() * 2);
    let mut last_date: Option<NaiveDate> = None;
    let mut last_band: Option<TimeOfDay> = None;

    for notification in notifications {
        // Out-of-range timestamps stay in the list under the current headers
        if let Some(posted) = tz.timestamp_millis_opt(notification.post_time_millis).earliest() {
            let date = posted.date_naive();
            let band = TimeOfDay::from_hour(posted.hour());

            if last_date != Some(date) {
                items.push(ListItem::DateHeader {
                    label: date_label(date, today, yesterday),
                });
                last_date = Some(date);
                last_band = None;
            }

            if last_band != Some(band) {
                items.push(ListItem::TimeHeader {
                    time_of_day: band,
                    id: format!("{}-{}-{}", date.year(), date.ordinal(), band.code()),
                });
                last_band = Some(band);
            }
        }

        items.push(ListItem::Notification(notification.clone()));
    }

    items
}

fn date_label(date: NaiveDate, today: NaiveDate, yesterday: Option<NaiveDate>) -> String {
    if date == today {
        "Today".to_string()
    } else if Some(date) == yesterday {
        "Yesterday".to_string()
    } else {
        date.format(DATE_HEADER_FORMAT).to_string()
    }
}

/// Distinct app names in `notifications`, sorted case-insensitively.
pub fn app_names(notifications: &[CapturedNotification]) -> Vec<String> {
    let mut names: Vec<String> = notifications.iter().map(|n| n.app_name.clone()).collect();
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names.dedup();
    names
}
