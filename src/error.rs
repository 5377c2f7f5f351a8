use thiserror::Error;

/// Failure taxonomy for a migration run.
///
/// Only `Connection` is fatal; `Record` failures are caught per record,
/// counted, and reported in the final summary.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("{store} store unreachable: {source}")]
    Connection {
        store: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("record {email}: {source}")]
    Record {
        email: String,
        #[source]
        source: sqlx::Error,
    },
}

impl MigrateError {
    pub fn connection(store: &'static str, source: sqlx::Error) -> Self {
        Self::Connection { store, source }
    }

    pub fn record(email: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Record {
            email: email.into(),
            source,
        }
    }
}
