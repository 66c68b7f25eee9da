use crate::error::GameError;
use std::time::Duration;

/// Configuration for the session core.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Default roster capacity when a session is created without one. Default: 4.
    pub default_capacity: usize,
    /// Hard upper bound on roster capacity. Default: 8.
    pub max_capacity: usize,
    /// Minimum ready players required to start a competition. Default: 3.
    pub min_players_to_start: usize,
    /// Maximum connections editing one drawing at a time. Default: 4.
    pub max_editors_per_drawing: usize,
    /// Default drawing-phase duration for new sessions. Default: 60s.
    pub default_draw_duration: Duration,
    /// Default rating-phase duration for new sessions. Default: 30s.
    pub default_rate_duration: Duration,
    /// Mailbox capacity per session worker. Commands beyond this are
    /// rejected rather than queued. Default: 256.
    pub session_mailbox_capacity: usize,
    /// How long `shutdown` waits for session workers to drain. Default: 5s.
    pub worker_drain_timeout: Duration,
}

impl GameConfig {
    /// Validate configuration values. Returns an error if any value is invalid.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.default_capacity == 0 {
            return Err(GameError::InvalidConfig {
                reason: "default_capacity must be >= 1".to_string(),
            });
        }
        if self.max_capacity < self.default_capacity {
            return Err(GameError::InvalidConfig {
                reason: format!(
                    "max_capacity must be >= default_capacity ({} < {})",
                    self.max_capacity, self.default_capacity
                ),
            });
        }
        if self.min_players_to_start < 2 {
            return Err(GameError::InvalidConfig {
                reason: format!(
                    "min_players_to_start must be >= 2, got {}",
                    self.min_players_to_start
                ),
            });
        }
        if self.max_editors_per_drawing == 0 {
            return Err(GameError::InvalidConfig {
                reason: "max_editors_per_drawing must be >= 1".to_string(),
            });
        }
        if self.session_mailbox_capacity == 0 {
            return Err(GameError::InvalidConfig {
                reason: "session_mailbox_capacity must be >= 1".to_string(),
            });
        }
        if self.default_draw_duration.is_zero() {
            return Err(GameError::InvalidConfig {
                reason: "default_draw_duration must be > 0".to_string(),
            });
        }
        if self.default_rate_duration.is_zero() {
            return Err(GameError::InvalidConfig {
                reason: "default_rate_duration must be > 0".to_string(),
            });
        }
        if self.worker_drain_timeout.is_zero() {
            return Err(GameError::InvalidConfig {
                reason: "worker_drain_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_capacity: 4,
            max_capacity: 8,
            min_players_to_start: 3,
            max_editors_per_drawing: 4,
            default_draw_duration: Duration::from_secs(60),
            default_rate_duration: Duration::from_secs(30),
            session_mailbox_capacity: 256,
            worker_drain_timeout: Duration::from_secs(5),
        }
    }
}
