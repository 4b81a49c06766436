//! Engine configuration.

use std::time::Duration;

/// Operational knobs for the engine. Business constants (point economy,
/// caps, shipping cycle) live with the code that owns them; this carries
/// only the values a deployment or a test actually varies.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tasks generated per child per day.
    pub daily_task_count: usize,
    /// Attempts for a background user-data refresh before giving up.
    pub refresh_max_attempts: u32,
    /// First retry delay for the background refresh; doubles per attempt.
    pub refresh_base_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            daily_task_count: 5,
            refresh_max_attempts: 3,
            refresh_base_delay: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    /// Config for tests: same behavior, no real waiting between retries.
    pub fn fast() -> Self {
        EngineConfig { refresh_base_delay: Duration::from_millis(1), ..Default::default() }
    }
}
