//! Hub configuration

/// Default number of events a subscriber may have queued before new ones are dropped
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 10;

/// Configuration for a broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each subscription queue (never below 1)
    pub subscription_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscription_capacity: DEFAULT_SUBSCRIPTION_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the subscription queue capacity
    ///
    /// Zero is raised to 1: a subscription must always be able to hold one event.
    pub fn subscription_capacity(mut self, capacity: usize) -> Self {
        self.subscription_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.subscription_capacity, DEFAULT_SUBSCRIPTION_CAPACITY);
    }

    #[test]
    fn test_capacity_floor() {
        let config = HubConfig::default().subscription_capacity(0);
        assert_eq!(config.subscription_capacity, 1);

        let config = HubConfig::default().subscription_capacity(64);
        assert_eq!(config.subscription_capacity, 64);
    }
}
