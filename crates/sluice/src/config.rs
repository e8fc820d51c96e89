//! Pool configuration.
//!
//! A [`PoolConfig`] fixes everything about a pool that cannot change after
//! construction: how many workers run, how deep the job queue and result sink
//! are, and whether outcomes are delivered in completion or submission order.
//!
//! ## Key Concepts
//! - **Backpressure**: `queue_capacity` bounds pending jobs and
//!   `result_capacity` bounds undelivered outcomes. Producers block rather
//!   than drop data when either is full.
//! - **Ordering**: [`DeliveryMode::Ordered`] trades up to `reorder_window`
//!   buffered outcomes for deterministic delivery order.

use crate::{Error, Result};

/// Default capacity of both the job queue and the result sink.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default number of outcomes the sequencer may hold in ordered mode.
pub const DEFAULT_REORDER_WINDOW: usize = 1024;

/// How outcomes are delivered to the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeliveryMode {
    /// Outcomes appear in completion order.
    #[default]
    Unordered,
    /// Outcomes appear in submission order.
    Ordered,
}

/// Construction parameters shared by every pool flavour.
///
/// ```
/// use sluice::{DeliveryMode, PoolConfig};
///
/// let config = PoolConfig::default()
///     .with_workers(3)
///     .with_queue_capacity(5)
///     .with_result_capacity(5)
///     .with_delivery(DeliveryMode::Ordered);
///
/// assert!(config.validate().is_ok());
/// assert!(config.with_workers(0).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Number of workers. Must be at least 1.
    pub workers: usize,
    /// Maximum number of queued jobs before `submit` blocks. 0 gives a
    /// rendezvous queue on `ThreadPool`; `TaskPool` raises it to 1, so one
    /// more job than requested can be accepted without suspending.
    pub queue_capacity: usize,
    /// Maximum number of undelivered outcomes before workers block. Raised
    /// from 0 to 1 by `TaskPool`, like `queue_capacity`.
    pub result_capacity: usize,
    /// Completion or submission order.
    pub delivery: DeliveryMode,
    /// Outcomes the sequencer may buffer in ordered mode. Must be at least 1
    /// when `delivery` is [`DeliveryMode::Ordered`]; ignored otherwise.
    pub reorder_window: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_capacity: DEFAULT_CAPACITY,
            result_capacity: DEFAULT_CAPACITY,
            delivery: DeliveryMode::Unordered,
            reorder_window: DEFAULT_REORDER_WINDOW,
        }
    }
}

impl PoolConfig {
    /// Creates a config with every field given explicitly.
    pub const fn new(
        workers: usize,
        queue_capacity: usize,
        result_capacity: usize,
        delivery: DeliveryMode,
    ) -> Self {
        Self {
            workers,
            queue_capacity,
            result_capacity,
            delivery,
            reorder_window: DEFAULT_REORDER_WINDOW,
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use]
    pub const fn with_reorder_window(mut self, window: usize) -> Self {
        self.reorder_window = window;
        self
    }

    pub const fn is_ordered(&self) -> bool {
        matches!(self.delivery, DeliveryMode::Ordered)
    }

    /// Checks the config before any worker is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `workers` is 0.
    /// - `delivery` is ordered and `reorder_window` is 0.
    ///
    /// Capacities are unsigned, so the `>= 0` bound always holds. A capacity
    /// of 0 requests a rendezvous channel where the runtime supports one.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid_config("workers must be greater than 0"));
        }

        if self.is_ordered() && self.reorder_window == 0 {
            return Err(Error::invalid_config(
                "reorder_window must be greater than 0 in ordered mode",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PoolConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.delivery, DeliveryMode::Unordered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = PoolConfig::default().with_workers(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn zero_capacities_are_accepted() {
        let config = PoolConfig::new(1, 0, 0, DeliveryMode::Unordered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ordered_mode_needs_a_window() {
        let config = PoolConfig::new(2, 4, 4, DeliveryMode::Ordered).with_reorder_window(0);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));

        // The window is irrelevant when unordered.
        let config = config.with_delivery(DeliveryMode::Unordered);
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_defaults() {
        let config: PoolConfig =
            serde_json::from_str(r#"{"workers": 3, "delivery": "ordered"}"#).unwrap();
        assert_eq!(config.workers, 3);
        assert!(config.is_ordered());
        assert_eq!(config.queue_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.reorder_window, DEFAULT_REORDER_WINDOW);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""delivery":"ordered""#));
    }
}
