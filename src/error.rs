use thiserror::Error;

/// every failure that can happen outside of the actual search
///
/// infeasibility during search is not an error, see `optimization::SearchStatus`
#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read CSV '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("could not parse JSON '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot '{path}' is unusable: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: bincode::Error,
    },

    #[error("row {row}: missing column '{column}'")]
    MissingColumn { row: usize, column: &'static str },

    #[error("row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("session id '{0}' appears more than once")]
    DuplicateSession(String),

    #[error("invalid slot label '{0}'")]
    InvalidSlotLabel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TimetableError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn csv(path: &str, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_string(),
            source,
        }
    }

    pub fn json(path: &str, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_string(),
            source,
        }
    }
}
