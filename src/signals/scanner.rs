//! Derives inbound pipeline signals from family domain rows.
//!
//! The calendar and member tables are owned elsewhere; the scanner only
//! reads the columns it needs (`events`: id, family_id, title, date;
//! `members`: id, family_id, name, birthday) and turns them into
//! `event.tomorrow` / `birthday.approaching` signals.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;

use crate::signals::bus::{Signal, SignalBus, SignalPayload};
use crate::store::{Store, EVENTS_TABLE, MEMBERS_TABLE};

/// Days ahead a birthday counts as "approaching".
const BIRTHDAY_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Deserialize)]
struct EventRow {
    id: String,
    #[serde(default)]
    title: String,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    birthday: Option<NaiveDate>,
}

/// Scan one family's rows and emit the derived signals. Returns the number
/// of signals emitted. A failed read degrades to an empty scan for that
/// table.
pub async fn scan_family(
    store: &Arc<dyn Store>,
    bus: &SignalBus,
    family_id: &str,
    today: NaiveDate,
) -> usize {
    let mut emitted = 0usize;
    let tomorrow = today + Duration::days(1);

    for event in select_rows::<EventRow>(store, EVENTS_TABLE, family_id).await {
        if event.date != tomorrow {
            continue;
        }
        bus.emit(Signal::new(
            family_id,
            None,
            SignalPayload::EventTomorrow {
                event_id: event.id,
                title: event.title,
            },
        ))
        .await;
        emitted += 1;
    }

    for member in select_rows::<MemberRow>(store, MEMBERS_TABLE, family_id).await {
        let birthday = match member.birthday {
            Some(birthday) => birthday,
            None => continue,
        };
        let next = next_occurrence(birthday, today);
        if (next - today).num_days() > BIRTHDAY_WINDOW_DAYS {
            continue;
        }
        bus.emit(Signal::new(
            family_id,
            Some(member.id.clone()),
            SignalPayload::BirthdayApproaching {
                person_id: member.id,
                name: member.name,
                date: next,
            },
        ))
        .await;
        emitted += 1;
    }

    emitted
}

/// Periodic scan loop for hosts that want signals derived on a schedule.
pub async fn run_scan_loop(
    store: Arc<dyn Store>,
    bus: SignalBus,
    family_id: String,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let today = chrono::Local::now().date_naive();
        let emitted = scan_family(&store, &bus, &family_id, today).await;
        if emitted > 0 {
            log::info!("Scan emitted {} signal(s) for family {}", emitted, family_id);
        }
    }
}

/// Next occurrence of a birthday's month/day on or after `today`,
/// year-agnostic. Feb 29 birthdays fall back to Mar 1 in common years.
fn next_occurrence(birthday: NaiveDate, today: NaiveDate) -> NaiveDate {
    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
            .unwrap_or(today)
    };
    let this_year = in_year(today.year());
    if this_year >= today {
        this_year
    } else {
        in_year(today.year() + 1)
    }
}

async fn select_rows<T: serde::de::DeserializeOwned>(
    store: &Arc<dyn Store>,
    table: &str,
    family_id: &str,
) -> Vec<T> {
    let rows = match store
        .select(table, &[("family_id", family_id.to_string())])
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("Scan read from '{}' failed: {}", table, e);
            return Vec::new();
        }
    };
    rows.into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
