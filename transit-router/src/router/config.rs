//! Search configuration.

use chrono::Duration;

use crate::graph::Direction;

/// Error for a configuration rejected before any search work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid search configuration: {reason}")]
pub struct InvalidConfig {
    reason: &'static str,
}

impl InvalidConfig {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Configuration parameters for one search.
///
/// The open set is ordered by direction-adjusted time, then transfer
/// count, then walk distance — the secondary orderings are a deliberate
/// choice of this engine, pinned by tests, not an emergent property.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Depart-after (forward) or arrive-by (backward) search.
    pub direction: Direction,

    /// Maximum elapsed time from the reference instant, in seconds.
    /// Labels beyond the horizon are discarded. `None` = unbounded.
    pub max_horizon_secs: Option<i64>,

    /// Upper bound on cumulative walking distance in metres. Labels
    /// exceeding it are impossible and dropped.
    pub max_walk_distance_m: f64,

    /// When true, the search never stops early on reaching its targets
    /// and instead builds the full reachability frontier per node.
    pub profile_search: bool,

    /// Hard cap on the number of distinct nodes settled, guarding
    /// against runaway searches on pathological inputs.
    pub max_visited_nodes: usize,

    /// Walking speed in metres per second.
    pub walk_speed_ms: f64,

    /// Per-edge time epsilon in milliseconds, used only to break time
    /// ties deterministically. Zero disables it.
    pub tie_break_epsilon_ms: i64,
}

impl SearchConfig {
    /// A depart-after configuration with default limits.
    pub fn depart_after() -> Self {
        Self::default()
    }

    /// An arrive-by configuration with default limits.
    pub fn arrive_by() -> Self {
        Self {
            direction: Direction::Backward,
            ..Self::default()
        }
    }

    /// Returns the search horizon as a `Duration`, if bounded.
    pub fn max_horizon(&self) -> Option<Duration> {
        self.max_horizon_secs.map(Duration::seconds)
    }

    /// Returns the tie-break epsilon as a `Duration`.
    pub fn tie_break_epsilon(&self) -> Duration {
        Duration::milliseconds(self.tie_break_epsilon_ms)
    }

    /// Rejects configurations no search should ever start with.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !self.walk_speed_ms.is_finite() || self.walk_speed_ms <= 0.0 {
            return Err(InvalidConfig::new("walk speed must be positive"));
        }
        if self.max_walk_distance_m.is_nan() || self.max_walk_distance_m < 0.0 {
            return Err(InvalidConfig::new("max walk distance must be non-negative"));
        }
        if self.max_horizon_secs.is_some_and(|secs| secs < 0) {
            return Err(InvalidConfig::new("search horizon must be non-negative"));
        }
        if self.max_visited_nodes == 0 {
            return Err(InvalidConfig::new("node budget must allow at least one node"));
        }
        if self.tie_break_epsilon_ms < 0 {
            return Err(InvalidConfig::new("tie-break epsilon must be non-negative"));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            max_horizon_secs: None,
            max_walk_distance_m: f64::INFINITY,
            profile_search: false,
            max_visited_nodes: usize::MAX,
            walk_speed_ms: 1.4,
            tie_break_epsilon_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_unbounded() {
        let config = SearchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.direction, Direction::Forward);
        assert_eq!(config.max_horizon(), None);
        assert_eq!(config.max_walk_distance_m, f64::INFINITY);
        assert!(!config.profile_search);
        assert_eq!(config.max_visited_nodes, usize::MAX);
        assert_eq!(config.tie_break_epsilon(), Duration::zero());
    }

    #[test]
    fn arrive_by_flips_direction_only() {
        let config = SearchConfig::arrive_by();

        assert_eq!(config.direction, Direction::Backward);
        assert_eq!(config.max_horizon(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_negative_walk_distance() {
        let config = SearchConfig {
            max_walk_distance_m: -1.0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_walk_speed() {
        for speed in [0.0, -1.4, f64::NAN, f64::INFINITY] {
            let config = SearchConfig {
                walk_speed_ms: speed,
                ..SearchConfig::default()
            };
            assert!(config.validate().is_err(), "speed {speed} accepted");
        }
    }

    #[test]
    fn rejects_negative_horizon_and_epsilon() {
        let config = SearchConfig {
            max_horizon_secs: Some(-60),
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SearchConfig {
            tie_break_epsilon_ms: -1,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_node_budget() {
        let config = SearchConfig {
            max_visited_nodes: 0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duration_accessors() {
        let config = SearchConfig {
            max_horizon_secs: Some(3600),
            tie_break_epsilon_ms: 2,
            ..SearchConfig::default()
        };

        assert_eq!(config.max_horizon(), Some(Duration::hours(1)));
        assert_eq!(config.tie_break_epsilon(), Duration::milliseconds(2));
    }
}
