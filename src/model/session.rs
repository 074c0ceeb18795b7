use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    config::SolverConfig,
    csv_reader::{self, Record},
    error::TimetableError,
};

/// stable arena index of a session inside `Model::sessions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionIndex(pub usize);

/// broad program category, sessions of different categories never compete for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Day,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Mandatory,
    Elective,
}

/// a single lecture that has to be placed into exactly one time slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub course: String,
    pub period: u32,
    pub subject: String,
    pub professor: String,
    pub duration: u32, // hours
    pub resource: Option<String>, // required lab/room, if any
    pub kind: SessionKind,
    pub track: Option<u8>, // only set for electives of advanced cohorts
    pub category: Category,
}

impl Session {
    pub fn from_maps_to_vec(
        session_maps: &[Record],
        config: &SolverConfig,
    ) -> Result<Vec<Self>, TimetableError> {
        tracing::info!("parsing {} session(s)", session_maps.len());

        let mut sessions = Vec::with_capacity(session_maps.len());
        let mut seen_ids = HashSet::with_capacity(session_maps.len());

        for (row_index, session_map) in session_maps.iter().enumerate() {
            let row = row_index + 1;
            let session = Self::from_map(session_map, row, config)?;

            if !seen_ids.insert(session.id.clone()) {
                return Err(TimetableError::DuplicateSession(session.id));
            }

            sessions.push(session);
        }

        assign_tracks(&mut sessions, config.track_min_period);

        Ok(sessions)
    }

    fn from_map(
        session_map: &Record,
        row: usize,
        config: &SolverConfig,
    ) -> Result<Self, TimetableError> {
        let name = csv_reader::required(session_map, row, "name")?.to_string();
        let course = csv_reader::required(session_map, row, "course")?.to_string();

        let duration: u32 = csv_reader::parse_required(session_map, row, "duration")?;
        if duration == 0 {
            return Err(TimetableError::InvalidValue {
                row,
                column: "duration",
                value: "0".to_string(),
            });
        }

        let kind = match csv_reader::optional(session_map, "kind") {
            Some(value) => match value.to_lowercase().as_str() {
                "mandatory" => SessionKind::Mandatory,
                "elective" => SessionKind::Elective,
                _ => {
                    return Err(TimetableError::InvalidValue {
                        row,
                        column: "kind",
                        value: value.to_string(),
                    })
                }
            },
            None if name.contains(&config.elective_marker) => SessionKind::Elective,
            None => SessionKind::Mandatory,
        };

        let category = if course.contains(&config.night_course_marker) {
            Category::Night
        } else {
            Category::Day
        };

        Ok(Self {
            id: csv_reader::required(session_map, row, "id")?.to_string(),
            period: csv_reader::parse_required(session_map, row, "period")?,
            subject: csv_reader::required(session_map, row, "subject")?.to_string(),
            professor: csv_reader::required(session_map, row, "professor")?.to_string(),
            resource: csv_reader::optional(session_map, "resource").map(String::from),
            duration,
            kind,
            track: None,
            category,
            name,
            course,
        })
    }

    #[inline]
    pub fn is_elective(&self) -> bool {
        self.kind == SessionKind::Elective
    }

    #[inline]
    pub fn same_cohort(&self, other: &Self) -> bool {
        self.course == other.course && self.period == other.period
    }

    /// both are electives on different (known) tracks and therefore may run in parallel
    #[inline]
    pub fn on_parallel_tracks(&self, other: &Self) -> bool {
        match (self.track, other.track) {
            (Some(a), Some(b)) => self.is_elective() && other.is_elective() && a != b,
            _ => false,
        }
    }

    /// same cohort and not excused by the track rule
    #[inline]
    pub fn cohort_conflict(&self, other: &Self) -> bool {
        self.same_cohort(other) && !self.on_parallel_tracks(other)
    }
}

/// splits the electives of every advanced cohort into two parallel tracks
///
/// distinct subjects are sorted before the round-robin so the result does not depend on row order
pub fn assign_tracks(sessions: &mut [Session], min_period: u32) {
    let mut cohort_subjects: BTreeMap<(String, u32), BTreeSet<String>> = BTreeMap::new();

    for session in sessions.iter() {
        if session.is_elective() && session.period >= min_period {
            cohort_subjects
                .entry((session.course.clone(), session.period))
                .or_insert_with(BTreeSet::new)
                .insert(session.subject.clone());
        }
    }

    for session in sessions.iter_mut() {
        session.track = None;

        if !session.is_elective() || session.period < min_period {
            continue;
        }

        if let Some(subjects) = cohort_subjects.get(&(session.course.clone(), session.period)) {
            let position = subjects
                .iter()
                .position(|subject| *subject == session.subject)
                .unwrap_or(0);
            session.track = Some((position % 2) as u8 + 1);
        }
    }

    tracing::debug!(
        "assigned tracks for {} advanced elective cohort(s)",
        cohort_subjects.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::elective;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn row(id: &str, name: &str, course: &str, kind: &str) -> Record {
        record(&[
            ("id", id),
            ("name", name),
            ("course", course),
            ("period", "6"),
            ("subject", &format!("SUBJ_{}", id)),
            ("professor", "PROF_A"),
            ("duration", "2"),
            ("resource", ""),
            ("kind", kind),
        ])
    }

    #[test]
    fn infers_kind_category_and_resource() {
        let config = SolverConfig::default();
        let sessions = Session::from_maps_to_vec(
            &[
                row("1", "CCO_OB_Calculus", "CCO", ""),
                row("2", "SIN_OP_Databases", "SIN", ""),
                row("3", "CCO_Graphs", "CCO", "elective"),
            ],
            &config,
        )
        .unwrap();

        assert_eq!(sessions[0].kind, SessionKind::Mandatory);
        assert_eq!(sessions[0].category, Category::Day);
        assert_eq!(sessions[0].resource, None);

        assert_eq!(sessions[1].kind, SessionKind::Elective);
        assert_eq!(sessions[1].category, Category::Night);

        assert_eq!(sessions[2].kind, SessionKind::Elective);
    }

    #[test]
    fn rejects_duplicates_and_zero_duration() {
        let config = SolverConfig::default();

        let duplicate = Session::from_maps_to_vec(
            &[row("1", "a", "CCO", ""), row("1", "b", "CCO", "")],
            &config,
        );
        assert!(matches!(duplicate, Err(TimetableError::DuplicateSession(id)) if id == "1"));

        let mut zero = row("1", "a", "CCO", "");
        zero.insert("duration".to_string(), "0".to_string());
        assert!(matches!(
            Session::from_maps_to_vec(&[zero], &config),
            Err(TimetableError::InvalidValue { column: "duration", .. })
        ));

        let mut bad_kind = row("1", "a", "CCO", "optional");
        bad_kind.insert("kind".to_string(), "optional".to_string());
        assert!(matches!(
            Session::from_maps_to_vec(&[bad_kind], &config),
            Err(TimetableError::InvalidValue { column: "kind", .. })
        ));
    }

    #[test]
    fn tracks_alternate_over_sorted_subjects() {
        let mut sessions = vec![
            elective("e1", "CCO", 6, "SUBJ_C", "P1"),
            elective("e2", "CCO", 6, "SUBJ_A", "P2"),
            elective("e3", "CCO", 6, "SUBJ_B", "P3"),
            elective("e4", "CCO", 6, "SUBJ_A", "P4"),
            elective("e5", "CCO", 4, "SUBJ_A", "P5"),
        ];

        assign_tracks(&mut sessions, 5);

        // sorted subjects: A -> 1, B -> 2, C -> 1
        assert_eq!(sessions[0].track, Some(1));
        assert_eq!(sessions[1].track, Some(1));
        assert_eq!(sessions[2].track, Some(2));
        assert_eq!(sessions[3].track, Some(1));
        // below the period threshold
        assert_eq!(sessions[4].track, None);
    }

    #[test]
    fn parallel_tracks_require_two_electives() {
        let mut a = elective("a", "CCO", 6, "SUBJ_A", "P1");
        let mut b = elective("b", "CCO", 6, "SUBJ_B", "P2");
        a.track = Some(1);
        b.track = Some(2);
        assert!(a.on_parallel_tracks(&b));
        assert!(!a.cohort_conflict(&b));

        b.track = Some(1);
        assert!(a.cohort_conflict(&b));

        b.track = None;
        assert!(a.cohort_conflict(&b));
    }
}
