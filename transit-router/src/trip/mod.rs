//! The externally visible itinerary model.
//!
//! A [`Trip`] is an ordered sequence of legs, each either a walk with
//! geometry and turn instructions or a transit ride with its stop
//! sequence and vehicle identity. Trips are built fresh per query by
//! the [`Reconstructor`] and owned solely by the caller.

pub mod instructions;
mod reconstruct;

pub use reconstruct::{ReconstructError, Reconstructor};

use chrono::{Duration, NaiveDateTime};
use geo_types::{LineString, Point};
use serde::{Deserialize, Serialize};

use crate::graph::StationId;

use self::instructions::Instruction;

/// One stop of a transit leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// External station id of the stop.
    pub id: StationId,
    /// Display name.
    pub name: String,
    /// Stop location (x = longitude, y = latitude).
    pub location: Point<f64>,
    /// Arrival instant, absent at the boarding stop.
    pub arrival: Option<NaiveDateTime>,
    /// Departure instant, absent at the alighting stop.
    pub departure: Option<NaiveDateTime>,
}

/// A walking section of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkLeg {
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    /// Walking distance in metres.
    pub distance_m: f64,
    /// Concatenated shape of the walked edges.
    pub geometry: LineString<f64>,
    /// Turn instructions, as supplied by the instruction collaborator.
    pub instructions: Vec<Instruction>,
}

/// A transit ride on one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitLeg {
    pub feed_id: String,
    pub trip_id: String,
    pub route_id: String,
    /// Destination shown on the vehicle.
    pub headsign: String,
    /// Ordered stops from boarding to alighting.
    pub stops: Vec<Stop>,
    /// Ridden distance in metres.
    pub distance_m: f64,
    /// In-vehicle time in seconds, excluding the wait before boarding.
    pub travel_time_secs: i64,
    /// True when the rider stayed aboard the same vehicle as on the
    /// previous leg (a block continuation rather than a transfer).
    pub in_same_vehicle_as_previous: bool,
}

impl TransitLeg {
    /// Departure from the first stop.
    pub fn departure_time(&self) -> Option<NaiveDateTime> {
        let first = self.stops.first()?;
        first.departure.or(first.arrival)
    }

    /// Arrival at the last stop.
    pub fn arrival_time(&self) -> Option<NaiveDateTime> {
        let last = self.stops.last()?;
        last.arrival.or(last.departure)
    }

    /// In-vehicle time as a `Duration`.
    pub fn travel_time(&self) -> Duration {
        Duration::seconds(self.travel_time_secs)
    }
}

/// One leg of a trip: a walk or a transit ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Leg {
    Walk(WalkLeg),
    Transit(TransitLeg),
}

impl Leg {
    /// Returns true for a walk leg.
    pub fn is_walk(&self) -> bool {
        matches!(self, Leg::Walk(_))
    }

    /// Returns true for a transit leg.
    pub fn is_transit(&self) -> bool {
        matches!(self, Leg::Transit(_))
    }

    /// The walk leg, if this is one.
    pub fn as_walk(&self) -> Option<&WalkLeg> {
        match self {
            Leg::Walk(walk) => Some(walk),
            Leg::Transit(_) => None,
        }
    }

    /// The transit leg, if this is one.
    pub fn as_transit(&self) -> Option<&TransitLeg> {
        match self {
            Leg::Walk(_) => None,
            Leg::Transit(transit) => Some(transit),
        }
    }

    /// When this leg starts.
    pub fn departure_time(&self) -> Option<NaiveDateTime> {
        match self {
            Leg::Walk(walk) => Some(walk.departure_time),
            Leg::Transit(transit) => transit.departure_time(),
        }
    }

    /// When this leg ends.
    pub fn arrival_time(&self) -> Option<NaiveDateTime> {
        match self {
            Leg::Walk(walk) => Some(walk.arrival_time),
            Leg::Transit(transit) => transit.arrival_time(),
        }
    }
}

/// A reconstructed itinerary.
///
/// The leg list is empty for a trip reconstructed from a search's
/// initial label (the traveller is already there).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    legs: Vec<Leg>,
}

impl Trip {
    /// Builds a trip from legs in travel order.
    pub fn new(legs: Vec<Leg>) -> Self {
        Self { legs }
    }

    /// All legs in travel order.
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Number of legs.
    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Returns true for the zero-leg trip.
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// All walk legs in order.
    pub fn walk_legs(&self) -> impl Iterator<Item = &WalkLeg> {
        self.legs.iter().filter_map(Leg::as_walk)
    }

    /// All transit legs in order.
    pub fn transit_legs(&self) -> impl Iterator<Item = &TransitLeg> {
        self.legs.iter().filter_map(Leg::as_transit)
    }

    /// When the trip starts.
    pub fn departure_time(&self) -> Option<NaiveDateTime> {
        self.legs.first()?.departure_time()
    }

    /// When the trip ends.
    pub fn arrival_time(&self) -> Option<NaiveDateTime> {
        self.legs.last()?.arrival_time()
    }

    /// Total trip duration.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.arrival_time()? - self.departure_time()?)
    }

    /// Vehicle-to-vehicle transfers: boardings minus one. Staying on
    /// the same vehicle across legs does not count as a boarding.
    pub fn transfer_count(&self) -> usize {
        let boardings = self
            .transit_legs()
            .filter(|leg| !leg.in_same_vehicle_as_previous)
            .count();
        boardings.saturating_sub(1)
    }

    /// Total walking distance in metres.
    pub fn total_walk_distance_m(&self) -> f64 {
        self.walk_legs().map(|walk| walk.distance_m).sum()
    }
}
