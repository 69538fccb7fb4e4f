//! Metric names and label values

pub const CONNECT_ATTEMPTS_TOTAL: &str = "conduit_connect_attempts_total";
pub const CONNECT_FAILURES_TOTAL: &str = "conduit_connect_failures_total";
pub const RETRIES_EXHAUSTED_TOTAL: &str = "conduit_retries_exhausted_total";
pub const ACQUIRES_TOTAL: &str = "conduit_acquires_total";
pub const ACQUIRES_CANCELLED_TOTAL: &str = "conduit_acquires_cancelled_total";
pub const RELEASES_TOTAL: &str = "conduit_releases_total";
pub const CONNECT_DURATION_MS: &str = "conduit_connect_duration_ms";
pub const DRAIN_DURATION_MS: &str = "conduit_drain_duration_ms";
pub const READY_CONNECTIONS: &str = "conduit_ready_connections";
pub const STARTUP_FAILURES_TOTAL: &str = "conduit_startup_failures_total";

pub const LABEL_NAME: &str = "connection";
pub const LABEL_OUTCOME: &str = "outcome";
pub const LABEL_SOURCE: &str = "source";
pub const LABEL_CATEGORY: &str = "category";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_ALREADY_CLOSED: &str = "already_closed";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_ABANDONED: &str = "abandoned";

/// Acquire served from a Ready entry
pub const SOURCE_CACHED: &str = "cached";
/// Acquire that joined an in-flight initialization
pub const SOURCE_JOINED: &str = "joined";
/// Acquire that started a new initialization
pub const SOURCE_INITIATED: &str = "initiated";
