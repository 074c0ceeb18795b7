use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    time::Instant,
};

use serde::{Deserialize, Serialize};

pub mod conflict;
pub mod preference;
pub mod session;
pub mod timeline;

use conflict::ConflictGraph;
use preference::PreferenceMap;
use session::{Session, SessionIndex};
use timeline::TimeLine;

use crate::{config::SolverConfig, csv_reader, error::TimetableError};

const SNAPSHOT_FILENAME: &str = "instance.bincode";

/// what gets persisted between runs, the graph is cheap enough to rebuild
#[derive(Serialize, Deserialize)]
struct Snapshot {
    sessions: Vec<Session>,
    preferences: PreferenceMap,
}

/// one problem instance: immutable, shared read-only by all search attempts
#[derive(Debug, Clone)]
pub struct Model {
    pub sessions: Vec<Session>,
    pub conflicts: ConflictGraph,
    pub preferences: PreferenceMap,
    pub timeline: TimeLine,

    // how many sessions each professor teaches (harder-to-place professors go first)
    professor_session_counts: HashMap<String, usize>,
}

impl Model {
    pub fn new(
        sessions: Vec<Session>,
        preferences: PreferenceMap,
        config: &SolverConfig,
    ) -> Result<Self, TimetableError> {
        let start = Instant::now();

        let mut timeline = TimeLine::build(config)?;
        if timeline.is_empty() {
            return Err(TimetableError::InvalidConfig(
                "time line has no slots".to_string(),
            ));
        }
        if config.order_by_popularity {
            timeline.order_by_popularity(&preferences);
        }

        let conflicts = ConflictGraph::build(&sessions);

        let mut professor_session_counts = HashMap::new();
        for session in sessions.iter() {
            *professor_session_counts
                .entry(session.professor.clone())
                .or_insert(0) += 1;
        }

        tracing::info!(
            "model ready ({}ms): {} session(s), {} professor(s), {} slot(s)",
            start.elapsed().as_millis(),
            sessions.len(),
            professor_session_counts.len(),
            timeline.len()
        );
        tracing::debug!(
            "grid holds {}h day and {}h night per cohort",
            timeline.capacity_hours(session::Category::Day),
            timeline.capacity_hours(session::Category::Night)
        );

        let model = Self {
            sessions,
            conflicts,
            preferences,
            timeline,
            professor_session_counts,
        };

        for index in model.unplaceable_sessions() {
            let session = model.session(index);
            tracing::warn!(
                "session {} ({:?}, {}h) fits no slot of the time line, every attempt will fail",
                session.id,
                session.category,
                session.duration
            );
        }

        Ok(model)
    }

    /// Build a model from a folder that contains the following files:
    ///
    /// `sessions.csv` and optionally `preferences.json` (synthetic preferences otherwise)
    pub fn with_sessions_and_preferences(
        input_folder_path: &str,
        config: &SolverConfig,
    ) -> Result<Self, TimetableError> {
        let session_maps = csv_reader::read_to_maps(&format!("{}/sessions.csv", input_folder_path))?;
        let sessions = Session::from_maps_to_vec(&session_maps, config)?;

        let preferences_path = format!("{}/preferences.json", input_folder_path);
        let preferences = if Path::new(&preferences_path).is_file() {
            PreferenceMap::load_from_file(&preferences_path)?
        } else {
            tracing::info!("no preferences.json in {}", input_folder_path);
            PreferenceMap::synthetic(&sessions, config)
        };

        Self::new(sessions, preferences, config)
    }

    /// save normalized sessions and preferences (for later runs)
    pub fn save_to_file(&self, snapshot_folder_path: &str) -> Result<(), TimetableError> {
        let filepath = format!("{}/{}", snapshot_folder_path, SNAPSHOT_FILENAME);
        let start = Instant::now();

        let writer =
            BufWriter::new(File::create(&filepath).map_err(|e| TimetableError::io(&filepath, e))?);

        let snapshot = Snapshot {
            sessions: self.sessions.clone(),
            preferences: self.preferences.clone(),
        };
        bincode::serialize_into(writer, &snapshot).map_err(|source| TimetableError::Snapshot {
            path: filepath.clone(),
            source,
        })?;

        tracing::info!(
            "saved snapshot to {} ({}ms)",
            filepath,
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// load an instance from a previous run's snapshot
    pub fn load_from_file(
        snapshot_folder_path: &str,
        config: &SolverConfig,
    ) -> Result<Self, TimetableError> {
        let filepath = format!("{}/{}", snapshot_folder_path, SNAPSHOT_FILENAME);
        let start = Instant::now();

        let reader =
            BufReader::new(File::open(&filepath).map_err(|e| TimetableError::io(&filepath, e))?);
        let snapshot: Snapshot =
            bincode::deserialize_from(reader).map_err(|source| TimetableError::Snapshot {
                path: filepath.clone(),
                source,
            })?;

        tracing::info!(
            "loaded snapshot from {} ({}ms)",
            filepath,
            start.elapsed().as_millis()
        );

        Self::new(snapshot.sessions, snapshot.preferences, config)
    }

    #[inline]
    pub fn session(&self, index: SessionIndex) -> &Session {
        &self.sessions[index.0]
    }

    #[inline]
    pub fn session_indices(&self) -> impl Iterator<Item = SessionIndex> {
        (0..self.sessions.len()).map(SessionIndex)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// sessions whose category and duration match no slot at all
    pub fn unplaceable_sessions(&self) -> Vec<SessionIndex> {
        self.session_indices()
            .filter(|&index| {
                let session = self.session(index);
                !self.timeline.slots().iter().any(|slot| slot.fits(session))
            })
            .collect()
    }

    #[inline]
    pub fn professor_session_count(&self, professor: &str) -> usize {
        self.professor_session_counts
            .get(professor)
            .copied()
            .unwrap_or(0)
    }
}
