//! Declarative nudge rules.
//!
//! A rule pairs a match condition with a pure producer. The set is a
//! code-level constant evaluated in order; nothing registers rules at
//! runtime.

use chrono::NaiveDate;
use serde_json::Value;

use crate::signals::bus::{Signal, SignalPayload};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Condition a signal must satisfy for a rule to fire.
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    /// Required signal kind, if any.
    pub signal_type: Option<&'static str>,
    /// Payload date must fall within `0..=within_days` days of today. A
    /// payload with no date never matches a windowed condition.
    pub within_days: Option<i64>,
}

impl Condition {
    pub fn matches(&self, signal: &Signal, today: NaiveDate) -> bool {
        if let Some(required) = self.signal_type {
            if signal.payload.kind() != required {
                return false;
            }
        }
        if let Some(window) = self.within_days {
            let date = match signal.payload.date() {
                Some(date) => date,
                None => return false,
            };
            let days = (date - today).num_days();
            if days < 0 || days > window {
                return false;
            }
        }
        true
    }
}

/// What a rule wants persisted when it fires.
#[derive(Debug, Clone)]
pub struct NudgeDraft {
    pub nudge_type: &'static str,
    pub payload: Value,
}

/// Producer from a matching signal to a nudge draft. Pure.
pub type ProduceFn = fn(&Signal) -> NudgeDraft;

/// A declarative (condition, producer) pair.
pub struct Rule {
    pub id: &'static str,
    pub when: Condition,
    pub produce: ProduceFn,
}

// ---------------------------------------------------------------------------
// Default rule set
// ---------------------------------------------------------------------------

/// The fixed rule set every nudge engine evaluates, in order.
pub fn default_rules() -> &'static [Rule] {
    &DEFAULT_RULES
}

static DEFAULT_RULES: [Rule; 3] = [
    Rule {
        id: "event-prep",
        when: Condition {
            signal_type: Some("event.tomorrow"),
            within_days: None,
        },
        produce: produce_event_prep,
    },
    Rule {
        id: "birthday-gift",
        when: Condition {
            signal_type: Some("birthday.approaching"),
            within_days: Some(3),
        },
        produce: produce_birthday_gift,
    },
    Rule {
        id: "goal-checkin",
        when: Condition {
            signal_type: Some("goal.stalled"),
            within_days: None,
        },
        produce: produce_goal_checkin,
    },
];

/// Tomorrow's event: surface a short prep checklist.
fn produce_event_prep(signal: &Signal) -> NudgeDraft {
    let (event_id, title) = match &signal.payload {
        SignalPayload::EventTomorrow { event_id, title } => {
            (event_id.as_str(), title.as_str())
        }
        _ => ("", ""),
    };
    NudgeDraft {
        nudge_type: "prep.event",
        payload: serde_json::json!({
            "event_id": event_id,
            "title": title,
            "checklist": [
                "Confirm who is going",
                "Check what needs packing",
                "Plan departure time",
            ],
        }),
    }
}

/// Approaching birthday: prompt gift planning.
fn produce_birthday_gift(signal: &Signal) -> NudgeDraft {
    let payload = match &signal.payload {
        SignalPayload::BirthdayApproaching {
            person_id,
            name,
            date,
        } => serde_json::json!({
            "person_id": person_id,
            "name": name,
            "date": date,
        }),
        _ => Value::Null,
    };
    NudgeDraft {
        nudge_type: "gift.birthday",
        payload,
    }
}

/// Stalled goal: prompt a family check-in.
fn produce_goal_checkin(signal: &Signal) -> NudgeDraft {
    let payload = match &signal.payload {
        SignalPayload::GoalStalled { goal_id, title } => serde_json::json!({
            "goal_id": goal_id,
            "title": title,
        }),
        _ => Value::Null,
    };
    NudgeDraft {
        nudge_type: "goal.checkin",
        payload,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date")
    }

    fn event_signal() -> Signal {
        Signal::new(
            "f1",
            None,
            SignalPayload::EventTomorrow {
                event_id: "e1".to_string(),
                title: "Recital".to_string(),
            },
        )
    }

    fn birthday_signal(date: NaiveDate) -> Signal {
        Signal::new(
            "f1",
            Some("p1".to_string()),
            SignalPayload::BirthdayApproaching {
                person_id: "p1".to_string(),
                name: "Maya".to_string(),
                date,
            },
        )
    }

    #[test]
    fn test_type_condition_matches_exact_kind_only() {
        let condition = Condition {
            signal_type: Some("event.tomorrow"),
            within_days: None,
        };
        assert!(condition.matches(&event_signal(), today()));
        assert!(!condition.matches(&birthday_signal(today()), today()));
    }

    #[test]
    fn test_window_condition_bounds() {
        let condition = Condition {
            signal_type: None,
            within_days: Some(3),
        };

        assert!(condition.matches(&birthday_signal(today()), today()));
        assert!(condition.matches(&birthday_signal(today() + Duration::days(3)), today()));
        assert!(!condition.matches(&birthday_signal(today() + Duration::days(4)), today()));
        assert!(!condition.matches(&birthday_signal(today() - Duration::days(1)), today()));
    }

    #[test]
    fn test_window_condition_requires_a_date() {
        let condition = Condition {
            signal_type: None,
            within_days: Some(3),
        };
        assert!(!condition.matches(&event_signal(), today()));
    }

    #[test]
    fn test_default_rules_order_and_ids() {
        let ids: Vec<&str> = default_rules().iter().map(|rule| rule.id).collect();
        assert_eq!(ids, vec!["event-prep", "birthday-gift", "goal-checkin"]);
    }

    #[test]
    fn test_event_prep_draft() {
        let draft = produce_event_prep(&event_signal());
        assert_eq!(draft.nudge_type, "prep.event");
        assert_eq!(
            draft.payload.get("event_id").and_then(|v| v.as_str()),
            Some("e1")
        );
        let checklist = draft
            .payload
            .get("checklist")
            .and_then(|v| v.as_array())
            .expect("checklist");
        assert_eq!(checklist.len(), 3);
    }

    #[test]
    fn test_birthday_gift_draft() {
        let draft = produce_birthday_gift(&birthday_signal(today()));
        assert_eq!(draft.nudge_type, "gift.birthday");
        assert_eq!(
            draft.payload.get("person_id").and_then(|v| v.as_str()),
            Some("p1")
        );
        assert_eq!(draft.payload.get("name").and_then(|v| v.as_str()), Some("Maya"));
    }
}
