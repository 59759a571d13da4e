//! The time-expanded graph boundary.
//!
//! The engine does not build or persist the graph itself: a storage
//! collaborator implements [`TransitGraph`] and the engine only reads
//! from it. Stations and platforms are nodes; every scheduled vehicle
//! stop is a node-time event; edges carry their kind and, for scheduled
//! kinds, fixed departure/arrival instants.
//!
//! [`memory::MemoryGraph`] is a small reference implementation used by
//! the test suite and for fixtures.

mod explorer;
pub mod memory;

pub use explorer::{ExploredEdge, ExplorerError, GraphExplorer};

use std::fmt;

use chrono::NaiveDateTime;
use geo_types::{LineString, Point};

/// Index of a node in the time-expanded graph.
///
/// Nodes are dense indices assigned by the storage collaborator. A
/// `NodeId` is only meaningful together with the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the index as a usize, for slice access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an edge in the time-expanded graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Returns the index as a usize, for slice access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External station identifier, as published by the schedule feed.
///
/// This is the stable id callers use in search requests; the graph
/// collaborator maintains the mapping to station nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StationId(String);

impl StationId {
    /// Creates a station id from a feed identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Stop identity carried on scheduled edges.
///
/// Repeats the station id plus the display data legs need, so that
/// itinerary reconstruction does not have to consult the feed again.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRef {
    /// Station id of the stop.
    pub id: StationId,
    /// Display name of the stop.
    pub name: String,
    /// Stop location (x = longitude, y = latitude).
    pub location: Point<f64>,
}

/// Scheduled trip identity carried on scheduled edges.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRef {
    /// Feed the trip was imported from.
    pub feed_id: String,
    /// Trip id within the feed.
    pub trip_id: String,
    /// Route the trip belongs to.
    pub route_id: String,
    /// Destination shown on the vehicle.
    pub headsign: String,
}

impl TripRef {
    /// Returns true if `other` is the same vehicle run.
    ///
    /// Identity is `(feed_id, trip_id)`; route and headsign are display
    /// data and may differ between feed versions.
    pub fn is_same_vehicle(&self, other: &TripRef) -> bool {
        self.feed_id == other.feed_id && self.trip_id == other.trip_id
    }
}

/// What an edge represents, as a closed set of variants.
///
/// The kind set is fixed, so the explorer and the weighting match on it
/// exhaustively and the compiler checks coverage when a kind is added.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    /// Street-network walking between two locations.
    Walk {
        distance_m: f64,
        geometry: LineString<f64>,
    },
    /// Station-internal foot movement (e.g. between platforms).
    Transfer { distance_m: f64 },
    /// Waiting at a node until a fixed instant.
    Wait { until: NaiveDateTime },
    /// Boarding a vehicle: station node to its departure event.
    Board {
        trip: TripRef,
        stop: StopRef,
        stop_sequence: u32,
        departure: NaiveDateTime,
    },
    /// Riding one scheduled stop: departure event to arrival event.
    Hop {
        trip: TripRef,
        /// The stop arrived at.
        stop: StopRef,
        stop_sequence: u32,
        departure: NaiveDateTime,
        arrival: NaiveDateTime,
        distance_m: f64,
    },
    /// Staying aboard through a stop: arrival event to departure event.
    Dwell {
        trip: TripRef,
        stop: StopRef,
        stop_sequence: u32,
        arrival: NaiveDateTime,
        departure: NaiveDateTime,
    },
    /// Leaving a vehicle: arrival event back to the station node.
    Alight {
        trip: TripRef,
        stop: StopRef,
        stop_sequence: u32,
        arrival: NaiveDateTime,
    },
}

impl EdgeKind {
    /// Returns the scheduled trip this edge belongs to, if any.
    pub fn trip(&self) -> Option<&TripRef> {
        match self {
            EdgeKind::Board { trip, .. }
            | EdgeKind::Hop { trip, .. }
            | EdgeKind::Dwell { trip, .. }
            | EdgeKind::Alight { trip, .. } => Some(trip),
            EdgeKind::Walk { .. } | EdgeKind::Transfer { .. } | EdgeKind::Wait { .. } => None,
        }
    }

    /// Returns true for foot edges (walking and in-station transfers).
    pub fn is_foot(&self) -> bool {
        matches!(self, EdgeKind::Walk { .. } | EdgeKind::Transfer { .. })
    }

    /// Returns the foot distance contributed by this edge, in metres.
    pub fn foot_distance_m(&self) -> f64 {
        match self {
            EdgeKind::Walk { distance_m, .. } | EdgeKind::Transfer { distance_m } => *distance_m,
            _ => 0.0,
        }
    }
}

/// A directed edge of the time-expanded graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    /// The endpoint reached when traversing in `direction`.
    pub fn head(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.to,
            Direction::Backward => self.from,
        }
    }

    /// The endpoint traversal starts from in `direction`.
    pub fn tail(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.from,
            Direction::Backward => self.to,
        }
    }
}

/// Search direction.
///
/// `Forward` answers depart-after queries; `Backward` answers arrive-by
/// queries by walking the reverse adjacency with time retreating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Returns true for depart-after searches.
    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

/// Read access to a time-expanded graph.
///
/// This is the storage collaborator boundary: the engine only ever
/// enumerates adjacency and reads edge attributes. Adjacency is handed
/// out as iterators so implementations can generate edges on demand —
/// the graph is conceptually infinite in the time dimension and callers
/// must not be forced to materialize it.
pub trait TransitGraph {
    /// Number of nodes currently addressable.
    fn node_count(&self) -> usize;

    /// Edges leaving `node`.
    fn outgoing(&self, node: NodeId) -> Box<dyn Iterator<Item = EdgeId> + '_>;

    /// Edges entering `node`.
    fn incoming(&self, node: NodeId) -> Box<dyn Iterator<Item = EdgeId> + '_>;

    /// Attributes of `edge`, or `None` for an id this graph never issued.
    fn edge(&self, edge: EdgeId) -> Option<&Edge>;

    /// Resolves an external station id to its station node.
    fn station_node(&self, station: &StationId) -> Option<NodeId>;

    /// Reverse mapping: the station id of a station node, if `node` is one.
    fn station_of(&self, node: NodeId) -> Option<&StationId>;

    /// Edges usable from `node` when searching in `direction`.
    fn adjacent(&self, node: NodeId, direction: Direction) -> Box<dyn Iterator<Item = EdgeId> + '_> {
        match direction {
            Direction::Forward => self.outgoing(node),
            Direction::Backward => self.incoming(node),
        }
    }
}
