use std::{fs::File, io::BufReader, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::TimetableError, model::timeline::SlotLabel};

/// all tunables of a solving run
///
/// every field has a default, so a JSON config file only needs to contain the values it changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// slot taxonomy of the day program, in time line order
    pub day_slots: Vec<String>,
    /// slot taxonomy of the night program, in time line order
    pub night_slots: Vec<String>,
    pub weekdays: Vec<String>,

    /// maximum hours a professor may teach on a single day
    pub daily_hour_cap: u32,

    /// wall-clock budget for the whole search (seconds)
    pub budget_secs: u64,
    /// attempts finishing later than budget + grace are discarded
    pub grace_secs: u64,

    pub n_search_threads: usize,
    pub seed: Option<u64>,
    pub max_attempts: Option<u64>,

    /// move slots popular among professors to the front of the time line
    pub order_by_popularity: bool,

    /// a course whose name contains this marker belongs to the night program
    pub night_course_marker: String,
    /// a session without explicit kind is elective if its name contains this marker
    pub elective_marker: String,
    /// electives of cohorts with at least this period are split into tracks
    pub track_min_period: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            day_slots: vec!["M3_M4", "M1_M2", "T1_T2", "T3_T4"]
                .into_iter()
                .map(String::from)
                .collect(),
            night_slots: vec!["N1_N2", "N3_N4", "N3_N4_N5"]
                .into_iter()
                .map(String::from)
                .collect(),
            weekdays: vec!["SEG", "TER", "QUA", "QUI", "SEX"]
                .into_iter()
                .map(String::from)
                .collect(),
            daily_hour_cap: 8,
            budget_secs: 15,
            grace_secs: 5,
            n_search_threads: 1,
            seed: None,
            max_attempts: None,
            order_by_popularity: false,
            night_course_marker: "SIN".to_string(),
            elective_marker: "_OP_".to_string(),
            track_min_period: 5,
        }
    }
}

impl SolverConfig {
    pub fn load_from_file(filepath: &str) -> Result<Self, TimetableError> {
        let reader =
            BufReader::new(File::open(filepath).map_err(|e| TimetableError::io(filepath, e))?);
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| TimetableError::json(filepath, e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// rejects configurations the search cannot run with
    pub fn validate(&self) -> Result<(), TimetableError> {
        if self.day_slots.is_empty() && self.night_slots.is_empty() {
            return Err(TimetableError::InvalidConfig(
                "at least one slot taxonomy must be non-empty".to_string(),
            ));
        }
        if self.weekdays.is_empty() {
            return Err(TimetableError::InvalidConfig(
                "weekday set is empty".to_string(),
            ));
        }
        if self.daily_hour_cap == 0 {
            return Err(TimetableError::InvalidConfig(
                "daily_hour_cap must be positive".to_string(),
            ));
        }
        if self.n_search_threads == 0 {
            return Err(TimetableError::InvalidConfig(
                "n_search_threads must be positive".to_string(),
            ));
        }

        for label in self.day_slots.iter().chain(self.night_slots.iter()) {
            SlotLabel::parse(label)?;
        }
        for label in self.day_slots.iter() {
            if SlotLabel::parse(label)?.is_night() {
                return Err(TimetableError::InvalidConfig(format!(
                    "night label '{}' listed as day slot",
                    label
                )));
            }
        }
        for label in self.night_slots.iter() {
            if !SlotLabel::parse(label)?.is_night() {
                return Err(TimetableError::InvalidConfig(format!(
                    "day label '{}' listed as night slot",
                    label
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{ "daily_hour_cap": 6, "seed": 42 }"#).unwrap();

        assert_eq!(config.daily_hour_cap, 6);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.budget_secs, 15);
        assert_eq!(config.weekdays.len(), 5);
    }

    #[test]
    fn rejects_swapped_taxonomies() {
        let mut config = SolverConfig::default();
        config.day_slots.push("N1_N2".to_string());

        assert!(matches!(
            config.validate(),
            Err(TimetableError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_cap_and_threads() {
        let mut config = SolverConfig::default();
        config.daily_hour_cap = 0;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::default();
        config.n_search_threads = 0;
        assert!(config.validate().is_err());
    }
}
