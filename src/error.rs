use std::io;

/// Errors raised while planning or executing a request.
///
/// Everything here is "fatal" for the request that triggered it: the
/// transport layer catches the error and answers with a 5xx. Per-field
/// authorization failures are *not* errors; they travel in-band inside each
/// row's `_error` envelope.
#[derive(Debug, thiserror::Error)]
pub enum TrellisError {
    #[error("`{name}` table does not exist.")]
    UnknownTable { name: String },
    #[error("`{column}` column does not exist in `{table}` table.")]
    UnknownColumn { table: String, column: String },
    #[error("`{table}` is a nonexistent table or does not have a primary key.")]
    MissingPrimaryKey { table: String },
    #[error("`{name}` is not a supported model type.")]
    UnknownModel { name: String },
    #[error("`{origin}` model does not have a join onto `{target}`.")]
    MissingJoin { origin: String, target: String },
    #[error("`{expression}` is not a supported validator expression.")]
    InvalidValidator { expression: String },
    #[error("invalid authority document: {message}")]
    InvalidAuthority { message: String },
    #[error("`{operation}` is an operation that can not be performed.")]
    UnknownOperation { operation: String },
    #[error("the `{env}` environment is not configured.")]
    UnknownEnvironment { env: String },
    #[error("{message}")]
    Internal { message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl TrellisError {
    pub fn internal(message: impl Into<String>) -> Self {
        TrellisError::Internal {
            message: message.into(),
        }
    }
}
