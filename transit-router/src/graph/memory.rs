//! In-memory reference implementation of [`TransitGraph`].
//!
//! The production storage engine lives outside this crate; this
//! implementation exists so the engine can be exercised against small
//! hand-built networks. [`GraphBuilder`] offers station/walk/trip
//! conveniences that expand into the underlying time-expanded structure
//! (board, hop, dwell and alight edges between stop-time event nodes).

use std::collections::HashMap;

use chrono::NaiveDateTime;
use geo::{Distance, Haversine};
use geo_types::{LineString, Point};

use super::{Edge, EdgeId, EdgeKind, NodeId, StationId, StopRef, TransitGraph, TripRef};

/// Error building a fixture graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphBuildError {
    /// A trip stop referenced a node that is not a station.
    #[error("node {0} is not a station")]
    NotAStation(NodeId),

    /// A trip needs a departure at every stop but the last and an
    /// arrival at every stop but the first.
    #[error("trip {trip_id} is missing a {what} at stop {stop_sequence}")]
    MissingStopTime {
        trip_id: String,
        stop_sequence: u32,
        what: &'static str,
    },

    /// Stop times must not run backwards along a trip.
    #[error("trip {trip_id} has non-chronological times at stop {stop_sequence}")]
    NonChronological { trip_id: String, stop_sequence: u32 },

    /// A trip needs at least two stops.
    #[error("trip {0} has fewer than two stops")]
    TooFewStops(String),
}

/// One scheduled call of a trip being added to the builder.
#[derive(Debug, Clone, Copy)]
pub struct TripStop {
    /// Station node of the call (must come from [`GraphBuilder::station`]).
    pub station: NodeId,
    /// Scheduled arrival, absent for the first stop.
    pub arrival: Option<NaiveDateTime>,
    /// Scheduled departure, absent for the last stop.
    pub departure: Option<NaiveDateTime>,
}

impl TripStop {
    /// An intermediate or terminal call with both times as given.
    pub fn new(
        station: NodeId,
        arrival: Option<NaiveDateTime>,
        departure: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            station,
            arrival,
            departure,
        }
    }

    /// The first call of a trip: departure only.
    pub fn origin(station: NodeId, departure: NaiveDateTime) -> Self {
        Self::new(station, None, Some(departure))
    }

    /// The last call of a trip: arrival only.
    pub fn terminus(station: NodeId, arrival: NaiveDateTime) -> Self {
        Self::new(station, Some(arrival), None)
    }
}

#[derive(Debug, Default)]
struct NodeData {
    station: Option<StationId>,
    stop: Option<StopRef>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

/// Builder for [`MemoryGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    stations: HashMap<StationId, NodeId>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a station node with an external id, display name and
    /// location (x = longitude, y = latitude).
    pub fn station(&mut self, id: &str, name: &str, lon: f64, lat: f64) -> NodeId {
        let node = self.push_node();
        let station = StationId::new(id);
        self.nodes[node.index()].station = Some(station.clone());
        self.nodes[node.index()].stop = Some(StopRef {
            id: station.clone(),
            name: name.to_string(),
            location: Point::new(lon, lat),
        });
        self.stations.insert(station, node);
        node
    }

    /// Adds walking edges in both directions between two nodes.
    ///
    /// The geometry is the straight line between the node locations when
    /// both are stations, otherwise empty.
    pub fn walk(&mut self, a: NodeId, b: NodeId, distance_m: f64) {
        let geometry = self.straight_line(a, b);
        self.push_edge(Edge {
            from: a,
            to: b,
            kind: EdgeKind::Walk {
                distance_m,
                geometry: geometry.clone(),
            },
        });
        let reversed = LineString::new(geometry.0.into_iter().rev().collect());
        self.push_edge(Edge {
            from: b,
            to: a,
            kind: EdgeKind::Walk {
                distance_m,
                geometry: reversed,
            },
        });
    }

    /// Adds station-internal transfer edges in both directions.
    pub fn transfer(&mut self, a: NodeId, b: NodeId, distance_m: f64) {
        self.push_edge(Edge {
            from: a,
            to: b,
            kind: EdgeKind::Transfer { distance_m },
        });
        self.push_edge(Edge {
            from: b,
            to: a,
            kind: EdgeKind::Transfer { distance_m },
        });
    }

    /// Adds a wait edge from `from` to `to` ending at `until`.
    pub fn wait(&mut self, from: NodeId, to: NodeId, until: NaiveDateTime) {
        self.push_edge(Edge {
            from,
            to,
            kind: EdgeKind::Wait { until },
        });
    }

    /// Adds a scheduled trip calling at `stops` in order.
    ///
    /// Expands into the time-expanded structure: a board edge into each
    /// departure event, a hop edge per ridden section, a dwell edge
    /// through each intermediate stop and an alight edge out of each
    /// arrival event. Hop distances are the haversine distance between
    /// the stop locations.
    pub fn trip(&mut self, trip: TripRef, stops: &[TripStop]) -> Result<(), GraphBuildError> {
        if stops.len() < 2 {
            return Err(GraphBuildError::TooFewStops(trip.trip_id.clone()));
        }

        let refs: Vec<StopRef> = stops
            .iter()
            .map(|s| {
                self.nodes
                    .get(s.station.index())
                    .and_then(|n| n.stop.clone())
                    .ok_or(GraphBuildError::NotAStation(s.station))
            })
            .collect::<Result<_, _>>()?;

        let mut previous: Option<(NodeId, NaiveDateTime)> = None; // departure event of stop i-1
        for (seq, (stop, stop_ref)) in stops.iter().zip(&refs).enumerate() {
            let seq = seq as u32;
            let is_last = seq as usize == stops.len() - 1;

            let arrival_event = match previous {
                None => None,
                Some((prev_event, prev_departure)) => {
                    let arrival =
                        stop.arrival
                            .ok_or_else(|| GraphBuildError::MissingStopTime {
                                trip_id: trip.trip_id.clone(),
                                stop_sequence: seq,
                                what: "arrival",
                            })?;
                    if arrival < prev_departure {
                        return Err(GraphBuildError::NonChronological {
                            trip_id: trip.trip_id.clone(),
                            stop_sequence: seq,
                        });
                    }
                    let event = self.push_node();
                    self.push_edge(Edge {
                        from: prev_event,
                        to: event,
                        kind: EdgeKind::Hop {
                            trip: trip.clone(),
                            stop: stop_ref.clone(),
                            stop_sequence: seq,
                            departure: prev_departure,
                            arrival,
                            distance_m: Haversine
                                .distance(refs[seq as usize - 1].location, stop_ref.location),
                        },
                    });
                    self.push_edge(Edge {
                        from: event,
                        to: stop.station,
                        kind: EdgeKind::Alight {
                            trip: trip.clone(),
                            stop: stop_ref.clone(),
                            stop_sequence: seq,
                            arrival,
                        },
                    });
                    Some((event, arrival))
                }
            };

            if is_last {
                break;
            }

            let departure = stop
                .departure
                .ok_or_else(|| GraphBuildError::MissingStopTime {
                    trip_id: trip.trip_id.clone(),
                    stop_sequence: seq,
                    what: "departure",
                })?;

            let departure_event = self.push_node();
            self.push_edge(Edge {
                from: stop.station,
                to: departure_event,
                kind: EdgeKind::Board {
                    trip: trip.clone(),
                    stop: stop_ref.clone(),
                    stop_sequence: seq,
                    departure,
                },
            });

            if let Some((arrival_event, arrival)) = arrival_event {
                if departure < arrival {
                    return Err(GraphBuildError::NonChronological {
                        trip_id: trip.trip_id.clone(),
                        stop_sequence: seq,
                    });
                }
                self.push_edge(Edge {
                    from: arrival_event,
                    to: departure_event,
                    kind: EdgeKind::Dwell {
                        trip: trip.clone(),
                        stop: stop_ref.clone(),
                        stop_sequence: seq,
                        arrival,
                        departure,
                    },
                });
            }

            previous = Some((departure_event, departure));
        }

        Ok(())
    }

    /// Finishes the build.
    pub fn build(self) -> MemoryGraph {
        MemoryGraph {
            nodes: self.nodes,
            edges: self.edges,
            stations: self.stations,
        }
    }

    fn push_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::default());
        id
    }

    fn push_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.nodes[edge.from.index()].outgoing.push(id);
        self.nodes[edge.to.index()].incoming.push(id);
        self.edges.push(edge);
        id
    }

    fn straight_line(&self, a: NodeId, b: NodeId) -> LineString<f64> {
        match (
            &self.nodes[a.index()].stop,
            &self.nodes[b.index()].stop,
        ) {
            (Some(from), Some(to)) => LineString::new(vec![from.location.0, to.location.0]),
            _ => LineString::new(vec![]),
        }
    }
}

/// A fully materialized in-memory time-expanded graph.
#[derive(Debug)]
pub struct MemoryGraph {
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    stations: HashMap<StationId, NodeId>,
}

impl MemoryGraph {
    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl TransitGraph for MemoryGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn outgoing(&self, node: NodeId) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        match self.nodes.get(node.index()) {
            Some(data) => Box::new(data.outgoing.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn incoming(&self, node: NodeId) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        match self.nodes.get(node.index()) {
            Some(data) => Box::new(data.incoming.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }

    fn edge(&self, edge: EdgeId) -> Option<&Edge> {
        self.edges.get(edge.index())
    }

    fn station_node(&self, station: &StationId) -> Option<NodeId> {
        self.stations.get(station).copied()
    }

    fn station_of(&self, node: NodeId) -> Option<&StationId> {
        self.nodes.get(node.index())?.station.as_ref()
    }
}
