/// Primary keys are PostgreSQL BIGSERIAL throughout.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
