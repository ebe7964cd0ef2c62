use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Grading error: {0}")]
    Grading(#[from] GradingError),

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Session store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session {session_id} does not belong to the requesting user")]
    Unauthorized { session_id: String },

    #[error("Stale write for session {session_id}: expected version {expected}")]
    VersionConflict { session_id: String, expected: u64 },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Question module gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Grading and answer submission errors
#[derive(Debug, Error)]
pub enum GradingError {
    #[error("Cannot answer example question {question_id}")]
    ExampleQuestion { question_id: String },

    #[error("Question not found: {question_id}")]
    UnknownQuestion { question_id: String },

    #[error("Marking failed for question {question_id}: {message}")]
    Marker { question_id: String, message: String },

    #[error("Session has no questions to grade")]
    NoQuestions,
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for grading operations
pub type GradingResult<T> = Result<T, GradingError>;
