use std::{collections::HashSet, fs::File, io::BufReader};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    session::{Category, Session},
    timeline::SlotLabel,
};
use crate::{config::SolverConfig, error::TimetableError};

/// points a placed session contributes to the schedule score
pub const PREFERRED_SCORE: i64 = 10;
pub const AVOIDED_SCORE: i64 = -10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Preferred,
    Avoided,
    Neutral,
}

impl Affinity {
    #[inline]
    pub fn score(self) -> i64 {
        match self {
            Self::Preferred => PREFERRED_SCORE,
            Self::Avoided => AVOIDED_SCORE,
            Self::Neutral => 0,
        }
    }
}

/// full slot labels (`<day>_<period-codes>`) a professor likes or dislikes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfessorPreferences {
    pub preferred: HashSet<String>,
    pub avoided: HashSet<String>,
}

impl ProfessorPreferences {
    pub fn new(preferred: Vec<String>, avoided: Vec<String>) -> Self {
        Self {
            preferred: preferred.into_iter().collect(),
            avoided: avoided.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceMap {
    professors: IndexMap<String, ProfessorPreferences>,
}

impl PreferenceMap {
    /// expects `{ "<professor>": { "preferred": [...], "avoided": [...] } }`
    pub fn load_from_file(filepath: &str) -> Result<Self, TimetableError> {
        let reader =
            BufReader::new(File::open(filepath).map_err(|e| TimetableError::io(filepath, e))?);
        let preferences: Self =
            serde_json::from_reader(reader).map_err(|e| TimetableError::json(filepath, e))?;

        tracing::info!(
            "loaded preferences of {} professor(s) from {}",
            preferences.len(),
            filepath
        );

        Ok(preferences)
    }

    /// deterministic stand-in when no real preferences exist
    ///
    /// day professors either like the first day label and dislike the last one, or like the
    /// last one and dislike the block starting earliest in the day,
    /// night professors like the first night label and dislike late blocks on the last weekday
    pub fn synthetic(sessions: &[Session], config: &SolverConfig) -> Self {
        let mut professors: IndexMap<String, Category> = IndexMap::new();
        for session in sessions {
            let category = professors
                .entry(session.professor.clone())
                .or_insert(session.category);
            if session.category == Category::Day {
                *category = Category::Day;
            }
        }

        let every_day = |label: &str| -> Vec<String> {
            config
                .weekdays
                .iter()
                .map(|day| format!("{}_{}", day, label))
                .collect()
        };

        let mut preferences = Self::default();
        for (professor, category) in professors {
            let entry = match category {
                Category::Day => {
                    let (first, last) = match (config.day_slots.first(), config.day_slots.last()) {
                        (Some(first), Some(last)) => (first, last),
                        _ => continue,
                    };
                    // block that starts earliest in the day, not necessarily the first listed
                    let earliest = config
                        .day_slots
                        .iter()
                        .min_by_key(|label| {
                            SlotLabel::parse(label)
                                .map(|label| label.start_order())
                                .unwrap_or((u8::MAX, u32::MAX))
                        })
                        .unwrap_or(first);

                    if stable_hash(&professor) % 2 == 0 {
                        ProfessorPreferences::new(every_day(first.as_str()), every_day(last.as_str()))
                    } else {
                        ProfessorPreferences::new(every_day(last.as_str()), every_day(earliest.as_str()))
                    }
                }
                Category::Night => {
                    let first = match config.night_slots.first() {
                        Some(first) => first,
                        None => continue,
                    };
                    let avoided = match config.weekdays.last() {
                        Some(last_day) => config
                            .night_slots
                            .iter()
                            .skip(1)
                            .map(|label| format!("{}_{}", last_day, label))
                            .collect(),
                        None => Vec::new(),
                    };
                    ProfessorPreferences::new(every_day(first.as_str()), avoided)
                }
            };
            preferences.professors.insert(professor, entry);
        }

        tracing::info!(
            "generated synthetic preferences for {} professor(s)",
            preferences.len()
        );

        preferences
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.professors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.professors.is_empty()
    }

    /// a label listed in both sets counts as preferred
    pub fn affinity(&self, professor: &str, full_label: &str) -> Affinity {
        match self.professors.get(professor) {
            Some(p) if p.preferred.contains(full_label) => Affinity::Preferred,
            Some(p) if p.avoided.contains(full_label) => Affinity::Avoided,
            _ => Affinity::Neutral,
        }
    }

    /// number of professors preferring the label minus number of professors avoiding it
    pub fn popularity(&self, full_label: &str) -> i64 {
        self.professors
            .values()
            .map(|p| {
                p.preferred.contains(full_label) as i64 - p.avoided.contains(full_label) as i64
            })
            .sum()
    }
}

#[cfg(test)]
impl PreferenceMap {
    pub fn insert(&mut self, professor: &str, preferences: ProfessorPreferences) {
        self.professors.insert(professor.to_string(), preferences);
    }

    pub fn get(&self, professor: &str) -> Option<&ProfessorPreferences> {
        self.professors.get(professor)
    }
}

/// FNV-1a, stable across runs and platforms (unlike `DefaultHasher`)
fn stable_hash(value: &str) -> u64 {
    value.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
