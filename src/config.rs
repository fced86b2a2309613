use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("update interval must be positive")]
    ZeroUpdateInterval,
    #[error("request spacing of {spacing} ms does not fit three requests into {interval} ms")]
    SpacingTooWide { spacing: u32, interval: u32 },
    #[error("max_non_response must be at least 1")]
    ZeroNonResponse,
    #[error("max_deferred_requests must be at least 1")]
    ZeroDeferred,
    #[error("temperature range {min}..={max} is empty or outside 10..=41")]
    TemperatureRange { min: f32, max: f32 },
}

/// Timing and limits of a heat pump session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Time between scheduler ticks.
    pub update_interval_ms: u32,
    /// Minimum gap between two requests written to the unit.
    pub request_spacing_ms: u32,
    /// Ticks without a status frame before the unit counts as disconnected.
    pub max_non_response: u8,
    /// Ticks an unacknowledged change waits before it is written again.
    pub max_deferred_requests: u8,
    pub min_temperature: f32,
    pub max_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            update_interval_ms: 2000,
            request_spacing_ms: 300,
            max_non_response: 5,
            max_deferred_requests: 10,
            min_temperature: 16.0,
            max_temperature: 31.0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        // each tick queues three info requests
        if self.request_spacing_ms.saturating_mul(3) > self.update_interval_ms {
            return Err(ConfigError::SpacingTooWide {
                spacing: self.request_spacing_ms,
                interval: self.update_interval_ms,
            });
        }
        if self.max_non_response == 0 {
            return Err(ConfigError::ZeroNonResponse);
        }
        if self.max_deferred_requests == 0 {
            return Err(ConfigError::ZeroDeferred);
        }
        let (min, max) = (self.min_temperature, self.max_temperature);
        if !(min <= max && min >= 10.0 && max <= 41.0) {
            return Err(ConfigError::TemperatureRange { min, max });
        }
        Ok(())
    }

    pub(crate) fn clamp_temperature(&self, celsius: f32) -> f32 {
        celsius.clamp(self.min_temperature, self.max_temperature)
    }
}
