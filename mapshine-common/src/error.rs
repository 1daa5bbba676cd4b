//! Error taxonomy shared by every pass.
//!
//! All of these are recovered locally: a pass substitutes a fallback,
//! clamps, or skips a uniform push. Nothing propagates past a pass's
//! `update`/`render`.

use std::time::{Duration, Instant};

/// Recoverable effect pipeline errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    /// A declared mask is missing or failed to load.
    #[error("missing asset: {id}")]
    MissingAsset { id: String },

    /// NaN/Inf in a camera, light or environment parameter.
    #[error("invalid uniform value for {name}")]
    InvalidUniform { name: &'static str },

    /// Out-of-range user parameter (clamped by the caller).
    #[error("invalid config value for {name}: {value}")]
    InvalidConfig { name: String, value: f64 },

    /// Scene, canvas or environment not available yet.
    #[error("host not ready: {0}")]
    HostNotReady(&'static str),

    /// Pixel buffer does not match its declared dimensions.
    #[error("invalid image {id}: expected {expected} bytes, got {actual}")]
    InvalidImage {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// Host-persisted document could not be read.
    #[error("invalid document {what}: {reason}")]
    InvalidDocument { what: &'static str, reason: String },

    /// GPU resource creation failed.
    #[error("gpu error: {0}")]
    Gpu(String),
}

/// Convenience alias used across the crate.
pub type EffectResult<T> = Result<T, EffectError>;

/// Rejects NaN/Inf for a named uniform.
pub fn ensure_finite(name: &'static str, value: f32) -> EffectResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EffectError::InvalidUniform { name })
    }
}

/// Rate limiter for recurring warnings.
///
/// Each pass owns one; `should_emit` returns true at most once per interval.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    interval: Duration,
    last_emitted: Option<Instant>,
    suppressed: u32,
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
            suppressed: 0,
        }
    }

    /// Returns true when a message may be emitted now.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    /// Same as [`Self::should_emit`] with an explicit clock (for tests).
    pub fn should_emit_at(&mut self, now: Instant) -> bool {
        match self.last_emitted {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.suppressed = self.suppressed.saturating_add(1);
                false
            }
            _ => {
                self.last_emitted = Some(now);
                true
            }
        }
    }

    /// Number of messages swallowed since the last emitted one, then resets.
    pub fn take_suppressed(&mut self) -> u32 {
        std::mem::take(&mut self.suppressed)
    }

    /// Emits a throttled warning for a recovered error.
    pub fn warn(&mut self, pass: &str, error: &EffectError) {
        if self.should_emit() {
            let suppressed = self.take_suppressed();
            tracing::warn!(pass, suppressed, "{error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_once_per_interval() {
        let mut throttle = LogThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(throttle.should_emit_at(t0));
        assert!(!throttle.should_emit_at(t0 + Duration::from_millis(200)));
        assert!(!throttle.should_emit_at(t0 + Duration::from_millis(999)));
        assert_eq!(throttle.take_suppressed(), 2);
        assert!(throttle.should_emit_at(t0 + Duration::from_millis(1001)));
        assert_eq!(throttle.take_suppressed(), 0);
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite("x", 1.5), Ok(1.5));
        assert_eq!(
            ensure_finite("camera.z", f32::NAN),
            Err(EffectError::InvalidUniform { name: "camera.z" })
        );
        assert!(ensure_finite("x", f32::INFINITY).is_err());
    }
}
