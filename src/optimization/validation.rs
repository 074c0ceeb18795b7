use std::collections::BTreeMap;

use thiserror::Error;

use super::Schedule;
use crate::{config::SolverConfig, model::Model};

/// a rule a finished schedule breaks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("session {0} has no slot")]
    Unplaced(String),

    #[error("session {session} does not fit slot {slot} (category or duration)")]
    SlotMismatch { session: String, slot: String },

    #[error("sessions {a} ({slot_a}) and {b} ({slot_b}) conflict in overlapping slots")]
    Conflict {
        a: String,
        b: String,
        slot_a: String,
        slot_b: String,
    },

    #[error("sessions {a} and {b} share subject on {day}")]
    SameSubjectSameDay { a: String, b: String, day: String },

    #[error("professor {professor} teaches {hours}h on {day}")]
    DailyCapExceeded {
        professor: String,
        day: String,
        hours: u32,
    },
}

/// checks a schedule from scratch against the model, independent of how it was built
pub fn validate(model: &Model, schedule: &Schedule, config: &SolverConfig) -> Vec<Violation> {
    let slots = model.timeline.slots();
    let mut violations = Vec::new();

    for session_index in model.session_indices() {
        if schedule.slot_of(session_index).is_none() {
            violations.push(Violation::Unplaced(model.session(session_index).id.clone()));
        }
    }

    let placed: Vec<_> = schedule.iter().collect();

    for &(session_index, slot_index) in placed.iter() {
        let session = model.session(session_index);
        if !slots[slot_index].fits(session) {
            violations.push(Violation::SlotMismatch {
                session: session.id.clone(),
                slot: slots[slot_index].full_label(),
            });
        }
    }

    for (i, &(a, slot_a)) in placed.iter().enumerate() {
        for &(b, slot_b) in placed[(i + 1)..].iter() {
            let (slot_a, slot_b) = (&slots[slot_a], &slots[slot_b]);

            if slot_a.overlaps(slot_b) && !model.conflicts.compatible(a, b) {
                violations.push(Violation::Conflict {
                    a: model.session(a).id.clone(),
                    b: model.session(b).id.clone(),
                    slot_a: slot_a.full_label(),
                    slot_b: slot_b.full_label(),
                });
            }

            if slot_a.day_index == slot_b.day_index && model.conflicts.same_subject(a, b) {
                violations.push(Violation::SameSubjectSameDay {
                    a: model.session(a).id.clone(),
                    b: model.session(b).id.clone(),
                    day: slot_a.day.clone(),
                });
            }
        }
    }

    let mut load: BTreeMap<(&str, usize), u32> = BTreeMap::new();
    for &(session_index, slot_index) in placed.iter() {
        let session = model.session(session_index);
        *load
            .entry((session.professor.as_str(), slots[slot_index].day_index))
            .or_insert(0) += session.duration;
    }
    for ((professor, day_index), hours) in load {
        if hours > config.daily_hour_cap {
            violations.push(Violation::DailyCapExceeded {
                professor: professor.to_string(),
                day: config
                    .weekdays
                    .get(day_index)
                    .cloned()
                    .unwrap_or_else(|| day_index.to_string()),
                hours,
            });
        }
    }

    violations
}
