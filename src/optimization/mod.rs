use std::{
    collections::HashMap,
    fs::File,
    io::BufWriter,
    time::Duration,
};

use fixedbitset::FixedBitSet;
use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;

use crate::{
    config::SolverConfig,
    error::TimetableError,
    model::{session::SessionIndex, Model},
};

pub mod clique;
pub mod randomized_best;
pub mod validation;

/// session -> index of its slot in the model's time line
///
/// partial while an attempt runs, complete only when the attempt succeeded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    assignments: IndexMap<SessionIndex, usize>,
}

impl Schedule {
    pub fn assign(&mut self, session: SessionIndex, slot_index: usize) {
        self.assignments.insert(session, slot_index);
    }

    #[inline]
    pub fn slot_of(&self, session: SessionIndex) -> Option<usize> {
        self.assignments.get(&session).copied()
    }

    /// (session, slot index) in placement order
    pub fn iter(&self) -> impl Iterator<Item = (SessionIndex, usize)> + '_ {
        self.assignments.iter().map(|(session, slot)| (*session, *slot))
    }

    pub fn is_complete(&self, model: &Model) -> bool {
        model
            .session_indices()
            .all(|session| self.assignments.contains_key(&session))
    }

    /// +10 for every session in a preferred slot of its professor, -10 for every avoided one
    pub fn score(&self, model: &Model) -> i64 {
        self.iter()
            .map(|(session, slot_index)| {
                let professor = &model.session(session).professor;
                let label = model.timeline.slots()[slot_index].full_label();
                model.preferences.affinity(professor, &label).score()
            })
            .sum()
    }

    /// session id -> `<day>_<period-codes>`
    pub fn to_labels(&self, model: &Model) -> IndexMap<String, String> {
        self.iter()
            .map(|(session, slot_index)| {
                (
                    model.session(session).id.clone(),
                    model.timeline.slots()[slot_index].full_label(),
                )
            })
            .collect()
    }

    /// flat two-column table `session,slot`
    pub fn save_to_csv(&self, model: &Model, filepath: &str) -> Result<(), TimetableError> {
        let writer =
            BufWriter::new(File::create(filepath).map_err(|e| TimetableError::io(filepath, e))?);
        let mut writer = csv::Writer::from_writer(writer);

        writer
            .write_record(&["session", "slot"])
            .map_err(|e| TimetableError::csv(filepath, e))?;
        for (session_id, label) in self.to_labels(model) {
            writer
                .write_record(&[session_id, label])
                .map_err(|e| TimetableError::csv(filepath, e))?;
        }

        writer
            .flush()
            .map_err(|e| TimetableError::io(filepath, e))
    }
}

/// private mutable state of a single attempt
pub struct SearchState<'a> {
    model: &'a Model,
    schedule: Schedule,
    // hours per (professor, day index)
    professor_load: HashMap<(&'a str, usize), u32>,
    // (session, slot index) already placed, per day index
    placed_by_day: Vec<Vec<(SessionIndex, usize)>>,
}

impl<'a> SearchState<'a> {
    pub fn new(model: &'a Model) -> Self {
        let n_days = model
            .timeline
            .slots()
            .iter()
            .map(|slot| slot.day_index + 1)
            .max()
            .unwrap_or(0);

        Self {
            model,
            schedule: Schedule::default(),
            professor_load: HashMap::new(),
            placed_by_day: vec![Vec::new(); n_days],
        }
    }

    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }

    #[inline]
    pub fn professor_load(&self, professor: &str, day_index: usize) -> u32 {
        self.professor_load
            .get(&(professor, day_index))
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn placed_on_day(&self, day_index: usize) -> &[(SessionIndex, usize)] {
        &self.placed_by_day[day_index]
    }

    /// applies a clique returned by `clique::select_clique` to schedule and professor load
    pub fn commit(&mut self, clique: &[SessionIndex], slot_index: usize) {
        let day_index = self.model.timeline.slots()[slot_index].day_index;

        for &session_index in clique {
            let session = self.model.session(session_index);

            self.schedule.assign(session_index, slot_index);
            *self
                .professor_load
                .entry((session.professor.as_str(), day_index))
                .or_insert(0) += session.duration;
            self.placed_by_day[day_index].push((session_index, slot_index));
        }
    }
}

/// one randomized greedy pass over the time line
///
/// returns `None` if sessions are left over once every slot was visited,
/// nothing is undone or retried within a pass
pub fn attempt<R: Rng + ?Sized>(
    model: &Model,
    config: &SolverConfig,
    rng: &mut R,
) -> Option<Schedule> {
    let mut state = SearchState::new(model);
    let mut pool: Vec<SessionIndex> = model.session_indices().collect();
    let mut taken = FixedBitSet::with_capacity(model.len());

    for (slot_index, slot) in model.timeline.slots().iter().enumerate() {
        if pool.is_empty() {
            break;
        }

        let eligible: Vec<SessionIndex> = pool
            .iter()
            .copied()
            .filter(|&session| slot.fits(model.session(session)))
            .collect();
        if eligible.is_empty() {
            continue;
        }

        let clique = clique::select_clique(model, config, &state, slot_index, &eligible, rng);
        if clique.is_empty() {
            continue;
        }

        state.commit(&clique, slot_index);
        for session in clique.iter() {
            taken.insert(session.0);
        }
        pool.retain(|session| !taken.contains(session.0));
    }

    if pool.is_empty() {
        let schedule = state.into_schedule();
        debug_assert!(schedule.is_complete(model));
        Some(schedule)
    } else {
        tracing::debug!("attempt failed with {} unplaced session(s)", pool.len());
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredSchedule {
    pub schedule: Schedule,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchStatus {
    /// at least one attempt produced a complete schedule
    Solved,
    /// attempts ran, none of them placed every session
    NoSuccess,
    /// the budget ran out before a single attempt completed in time,
    /// attempts discarded for finishing after the grace period do not count
    NoAttempt,
}

/// what the driver reports once the budget is spent
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Option<ScoredSchedule>,
    pub attempts: u64,     // attempts finished within budget + grace
    pub successes: u64,
    pub late_results: u64, // attempts that finished after budget + grace, discarded
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn status(&self) -> SearchStatus {
        if self.best.is_some() {
            SearchStatus::Solved
        } else if self.attempts == 0 {
            SearchStatus::NoAttempt
        } else {
            SearchStatus::NoSuccess
        }
    }

    pub fn summary(&self) -> SearchSummary {
        SearchSummary {
            status: self.status(),
            score: self.best.as_ref().map(|best| best.score),
            attempts: self.attempts,
            successes: self.successes,
            late_results: self.late_results,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// serializable counterpart of `SearchOutcome` without the schedule itself
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub status: SearchStatus,
    pub score: Option<i64>,
    pub attempts: u64,
    pub successes: u64,
    pub late_results: u64,
    pub elapsed_ms: u64,
}

impl SearchSummary {
    pub fn save_to_json(&self, filepath: &str) -> Result<(), TimetableError> {
        let writer =
            BufWriter::new(File::create(filepath).map_err(|e| TimetableError::io(filepath, e))?);
        serde_json::to_writer_pretty(writer, self).map_err(|e| TimetableError::json(filepath, e))
    }
}
