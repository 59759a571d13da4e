//! Criterion deltas for traversed edges.
//!
//! The explorer decides *when* an edge lands; the weighting decides what
//! it costs in the non-time criteria: how many transfers it adds and how
//! much walking it contributes. Keeping this a pure per-edge function
//! keeps the Pareto semantics auditable independently of the search loop.

use chrono::{Duration, NaiveDateTime};

use crate::graph::{Direction, EdgeKind};

/// Non-time cost of traversing one edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeCost {
    /// Transfers added: 1 for a fresh boarding on an already-boarded
    /// path, 0 otherwise.
    pub transfer_delta: u32,
    /// Walking distance added, in metres.
    pub walk_delta_m: f64,
    /// Set when this edge is the path's very first boarding; the
    /// instant recorded becomes the label's first departure time.
    pub boarded_at: Option<NaiveDateTime>,
}

/// Converts edges into criterion deltas for one search.
#[derive(Debug, Clone)]
pub struct Weighting {
    direction: Direction,
    tie_break_epsilon: Duration,
}

impl Weighting {
    /// Creates a weighting for `direction`.
    ///
    /// `tie_break_epsilon` is added per relaxed edge purely to resolve
    /// time ties deterministically; it must stay small enough never to
    /// reorder paths whose true elapsed times differ. Zero disables it.
    pub fn new(direction: Direction, tie_break_epsilon: Duration) -> Self {
        Self {
            direction,
            tie_break_epsilon,
        }
    }

    /// The deltas contributed by traversing `kind`, landing at
    /// `time_after`.
    ///
    /// `already_boarded` is whether the path has boarded any vehicle
    /// before this edge. A boarding edge — `Board` going forward,
    /// `Alight` going backward, where the chronologically last boarding
    /// is met first — counts one transfer unless it is the path's first;
    /// riding consecutive stops of the same trip costs nothing.
    pub fn deltas(
        &self,
        kind: &EdgeKind,
        already_boarded: bool,
        time_after: NaiveDateTime,
    ) -> EdgeCost {
        match kind {
            EdgeKind::Walk { distance_m, .. } | EdgeKind::Transfer { distance_m } => EdgeCost {
                walk_delta_m: *distance_m,
                ..EdgeCost::default()
            },
            EdgeKind::Board { .. } if self.direction.is_forward() => {
                boarding(already_boarded, time_after)
            }
            EdgeKind::Alight { .. } if !self.direction.is_forward() => {
                boarding(already_boarded, time_after)
            }
            EdgeKind::Board { .. }
            | EdgeKind::Alight { .. }
            | EdgeKind::Hop { .. }
            | EdgeKind::Dwell { .. }
            | EdgeKind::Wait { .. } => EdgeCost::default(),
        }
    }

    /// Applies the tie-break epsilon to a traversal result, moving it
    /// away from the reference time.
    pub fn tie_broken(&self, time: NaiveDateTime) -> NaiveDateTime {
        match self.direction {
            Direction::Forward => time + self.tie_break_epsilon,
            Direction::Backward => time - self.tie_break_epsilon,
        }
    }
}

fn boarding(already_boarded: bool, time_after: NaiveDateTime) -> EdgeCost {
    if already_boarded {
        EdgeCost {
            transfer_delta: 1,
            ..EdgeCost::default()
        }
    } else {
        EdgeCost {
            boarded_at: Some(time_after),
            ..EdgeCost::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StationId, StopRef, TripRef};
    use chrono::NaiveDate;
    use geo_types::{LineString, Point};

    fn time(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn trip_ref() -> TripRef {
        TripRef {
            feed_id: "gtfs_0".to_string(),
            trip_id: "t1".to_string(),
            route_id: "r1".to_string(),
            headsign: "Z".to_string(),
        }
    }

    fn stop_ref() -> StopRef {
        StopRef {
            id: StationId::new("Y"),
            name: "Y".to_string(),
            location: Point::new(8.54, 47.38),
        }
    }

    fn board() -> EdgeKind {
        EdgeKind::Board {
            trip: trip_ref(),
            stop: stop_ref(),
            stop_sequence: 0,
            departure: time(10, 0),
        }
    }

    fn alight() -> EdgeKind {
        EdgeKind::Alight {
            trip: trip_ref(),
            stop: stop_ref(),
            stop_sequence: 1,
            arrival: time(10, 20),
        }
    }

    #[test]
    fn first_boarding_is_free_and_recorded() {
        let weighting = Weighting::new(Direction::Forward, Duration::zero());
        let cost = weighting.deltas(&board(), false, time(10, 0));

        assert_eq!(cost.transfer_delta, 0);
        assert_eq!(cost.boarded_at, Some(time(10, 0)));
    }

    #[test]
    fn subsequent_boarding_counts_a_transfer() {
        let weighting = Weighting::new(Direction::Forward, Duration::zero());
        let cost = weighting.deltas(&board(), true, time(10, 0));

        assert_eq!(cost.transfer_delta, 1);
        assert_eq!(cost.boarded_at, None);
    }

    #[test]
    fn riding_the_same_trip_costs_nothing() {
        let weighting = Weighting::new(Direction::Forward, Duration::zero());
        let hop = EdgeKind::Hop {
            trip: trip_ref(),
            stop: stop_ref(),
            stop_sequence: 1,
            departure: time(10, 0),
            arrival: time(10, 20),
            distance_m: 5000.0,
        };
        let dwell = EdgeKind::Dwell {
            trip: trip_ref(),
            stop: stop_ref(),
            stop_sequence: 1,
            arrival: time(10, 20),
            departure: time(10, 22),
        };

        for kind in [hop, dwell, alight()] {
            let cost = weighting.deltas(&kind, true, time(10, 20));
            assert_eq!(cost.transfer_delta, 0, "{kind:?}");
            assert_eq!(cost.walk_delta_m, 0.0, "{kind:?}");
        }
    }

    #[test]
    fn backward_boards_on_alight_edges() {
        let weighting = Weighting::new(Direction::Backward, Duration::zero());

        let first = weighting.deltas(&alight(), false, time(10, 20));
        assert_eq!(first.transfer_delta, 0);
        assert_eq!(first.boarded_at, Some(time(10, 20)));

        let later = weighting.deltas(&alight(), true, time(10, 20));
        assert_eq!(later.transfer_delta, 1);

        // Board edges are the no-op side going backward.
        let board = weighting.deltas(&board(), true, time(10, 0));
        assert_eq!(board.transfer_delta, 0);
    }

    #[test]
    fn foot_edges_add_distance() {
        let weighting = Weighting::new(Direction::Forward, Duration::zero());

        let walk = EdgeKind::Walk {
            distance_m: 420.0,
            geometry: LineString::new(vec![]),
        };
        assert_eq!(weighting.deltas(&walk, false, time(9, 55)).walk_delta_m, 420.0);

        let transfer = EdgeKind::Transfer { distance_m: 60.0 };
        assert_eq!(
            weighting.deltas(&transfer, true, time(9, 55)).walk_delta_m,
            60.0
        );
    }

    #[test]
    fn epsilon_moves_time_away_from_reference() {
        let eps = Duration::milliseconds(1);

        let forward = Weighting::new(Direction::Forward, eps);
        assert_eq!(forward.tie_broken(time(10, 0)), time(10, 0) + eps);

        let backward = Weighting::new(Direction::Backward, eps);
        assert_eq!(backward.tie_broken(time(10, 0)), time(10, 0) - eps);

        let zero = Weighting::new(Direction::Forward, Duration::zero());
        assert_eq!(zero.tie_broken(time(10, 0)), time(10, 0));
    }
}
