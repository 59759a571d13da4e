//! Usable-edge enumeration.
//!
//! Given a node and the current label time, the explorer yields every
//! edge that can actually be traversed, together with the time reached
//! after traversing it. Scheduled edges whose departure already passed
//! (or, searching backward, whose arrival lies in the future) are
//! filtered out; realtime delays shift scheduled instants before the
//! comparison. The sequence is produced on demand — the time-expanded
//! graph is never materialized per node.

use chrono::{Duration, NaiveDateTime};

use crate::realtime::DelayLookup;

use super::{Direction, Edge, EdgeId, EdgeKind, NodeId, TransitGraph};

/// Edge-level anomaly encountered while exploring.
///
/// These are not recoverable locally: continuing could silently produce
/// a wrong itinerary, so the search aborts on the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplorerError {
    /// A scheduled edge carries inconsistent attributes.
    #[error("edge {edge} is malformed: {reason}")]
    MalformedEdge { edge: EdgeId, reason: &'static str },

    /// The graph returned an edge id it cannot resolve.
    #[error("edge {0} is not part of this graph")]
    UnknownEdge(EdgeId),
}

/// An edge usable from the current label, with the time after traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExploredEdge {
    pub edge: EdgeId,
    /// Label time after traversing the edge: later than `now` going
    /// forward, earlier going backward.
    pub time: NaiveDateTime,
}

/// Enumerates usable edges for one search.
///
/// Borrows the graph and the delay lookup for the lifetime of the
/// search; holds no mutable state of its own.
#[derive(Debug)]
pub struct GraphExplorer<'a, G, D> {
    graph: &'a G,
    delays: &'a D,
    direction: Direction,
    walk_speed_ms: f64,
}

impl<'a, G: TransitGraph, D: DelayLookup> GraphExplorer<'a, G, D> {
    /// Creates an explorer for one search.
    ///
    /// `walk_speed_ms` is the walking speed in metres per second used to
    /// turn foot distances into elapsed time.
    pub fn new(graph: &'a G, delays: &'a D, direction: Direction, walk_speed_ms: f64) -> Self {
        Self {
            graph,
            delays,
            direction,
            walk_speed_ms,
        }
    }

    /// The search direction this explorer serves.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Yields every edge usable from `node` at time `now`.
    ///
    /// The iterator borrows only the graph and delay lookup — not the
    /// explorer itself — so callers may mutate their own state while
    /// consuming it.
    pub fn explore(
        &self,
        node: NodeId,
        now: NaiveDateTime,
    ) -> impl Iterator<Item = Result<ExploredEdge, ExplorerError>> + use<'a, G, D> {
        let graph = self.graph;
        let delays = self.delays;
        let direction = self.direction;
        let walk_speed_ms = self.walk_speed_ms;

        graph.adjacent(node, direction).filter_map(move |edge_id| {
            let Some(edge) = graph.edge(edge_id) else {
                return Some(Err(ExplorerError::UnknownEdge(edge_id)));
            };
            match traverse(edge, edge_id, now, direction, walk_speed_ms, delays) {
                Ok(Some(time)) => Some(Ok(ExploredEdge { edge: edge_id, time })),
                Ok(None) => None,
                Err(error) => Some(Err(error)),
            }
        })
    }
}

/// Computes the time after traversing `edge` at `now`, or `None` when
/// the edge is not usable in this direction at this time.
fn traverse<D: DelayLookup>(
    edge: &Edge,
    edge_id: EdgeId,
    now: NaiveDateTime,
    direction: Direction,
    walk_speed_ms: f64,
    delays: &D,
) -> Result<Option<NaiveDateTime>, ExplorerError> {
    let forward = direction.is_forward();

    let time = match &edge.kind {
        EdgeKind::Walk { distance_m, .. } | EdgeKind::Transfer { distance_m } => {
            if !distance_m.is_finite() || *distance_m < 0.0 {
                return Err(ExplorerError::MalformedEdge {
                    edge: edge_id,
                    reason: "negative or non-finite foot distance",
                });
            }
            let elapsed = walk_duration(*distance_m, walk_speed_ms);
            Some(if forward { now + elapsed } else { now - elapsed })
        }
        EdgeKind::Wait { until } => {
            let usable = if forward { *until >= now } else { *until <= now };
            usable.then_some(*until)
        }
        EdgeKind::Board {
            trip,
            stop_sequence,
            departure,
            ..
        } => {
            let departure = adjusted(*departure, &trip.trip_id, *stop_sequence, delays);
            let usable = if forward {
                departure >= now
            } else {
                departure <= now
            };
            usable.then_some(departure)
        }
        EdgeKind::Hop {
            trip,
            stop_sequence,
            departure,
            arrival,
            ..
        } => {
            if arrival < departure {
                return Err(ExplorerError::MalformedEdge {
                    edge: edge_id,
                    reason: "hop arrives before it departs",
                });
            }
            let departure = adjusted(*departure, &trip.trip_id, *stop_sequence, delays);
            let arrival = adjusted(*arrival, &trip.trip_id, *stop_sequence, delays);
            if forward {
                (departure >= now).then_some(arrival)
            } else {
                (arrival <= now).then_some(departure)
            }
        }
        EdgeKind::Dwell {
            trip,
            stop_sequence,
            arrival,
            departure,
            ..
        } => {
            if departure < arrival {
                return Err(ExplorerError::MalformedEdge {
                    edge: edge_id,
                    reason: "dwell departs before it arrives",
                });
            }
            let departure = adjusted(*departure, &trip.trip_id, *stop_sequence, delays);
            let arrival = adjusted(*arrival, &trip.trip_id, *stop_sequence, delays);
            if forward {
                (departure >= now).then_some(departure)
            } else {
                (departure <= now).then_some(arrival)
            }
        }
        EdgeKind::Alight {
            trip,
            stop_sequence,
            arrival,
            ..
        } => {
            let arrival = adjusted(*arrival, &trip.trip_id, *stop_sequence, delays);
            if forward {
                // Leaving the vehicle takes no time.
                Some(now)
            } else {
                (arrival <= now).then_some(arrival)
            }
        }
    };

    Ok(time)
}

fn adjusted<D: DelayLookup>(
    scheduled: NaiveDateTime,
    trip_id: &str,
    stop_sequence: u32,
    delays: &D,
) -> NaiveDateTime {
    match delays.delay(trip_id, stop_sequence) {
        Some(delay) => scheduled + delay,
        None => scheduled,
    }
}

/// Elapsed time for walking `distance_m` at `walk_speed_ms`.
pub(crate) fn walk_duration(distance_m: f64, walk_speed_ms: f64) -> Duration {
    Duration::milliseconds((distance_m / walk_speed_ms * 1000.0).round() as i64)
}
