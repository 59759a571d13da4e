//! Itinerary reconstruction.
//!
//! Turns a settled label back into a [`Trip`]: walk the parent chain to
//! the initial label, restore chronological order, cut the edge
//! sequence into maximal same-mode runs (and, within transit, same
//! vehicle runs), then emit a walk or transit leg per run. Reconstruction
//! is a pure traversal over immutable labels — rebuilding the same
//! label twice yields identical trips.

use chrono::NaiveDateTime;
use geo_types::{Coord, LineString};
use tracing::debug;

use crate::graph::{Direction, Edge, EdgeKind, TransitGraph, TripRef};
use crate::router::{LabelId, LabelSource};

use super::instructions::InstructionGenerator;
use super::{Leg, Stop, TransitLeg, Trip, WalkLeg};

/// Error reconstructing a trip from a label.
///
/// Reconstruction assumes a label produced by this engine over this
/// graph; anything else fails fast rather than producing a malformed
/// trip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconstructError {
    /// The label id does not exist in the given label source.
    #[error("label {0} is not part of this search")]
    UnknownLabel(LabelId),

    /// The parent chain is inconsistent with this graph.
    #[error("invalid label chain: {0}")]
    InvalidLabelChain(&'static str),
}

/// One chronological step of the reconstructed path.
#[derive(Debug, Clone, Copy)]
struct Transition<'g> {
    edge: &'g Edge,
    depart: NaiveDateTime,
    arrive: NaiveDateTime,
}

/// Rebuilds trips from settled labels.
pub struct Reconstructor<'a, G, I> {
    graph: &'a G,
    instructions: &'a I,
}

impl<'a, G: TransitGraph, I: InstructionGenerator> Reconstructor<'a, G, I> {
    /// Creates a reconstructor over the graph the labels were produced
    /// on and an instruction collaborator for walk legs.
    pub fn new(graph: &'a G, instructions: &'a I) -> Self {
        Self {
            graph,
            instructions,
        }
    }

    /// Rebuilds the trip ending (going forward) or starting (going
    /// backward) at `terminal`.
    ///
    /// A terminal with no incoming edge — the search's initial label —
    /// yields the empty trip.
    pub fn trip_for<S: LabelSource>(
        &self,
        labels: &S,
        terminal: LabelId,
    ) -> Result<Trip, ReconstructError> {
        let transitions = self.transitions(labels, terminal)?;
        let legs = self.partition(&transitions);
        debug!(
            transitions = transitions.len(),
            legs = legs.len(),
            "reconstructed trip"
        );
        Ok(Trip::new(legs))
    }

    /// Walks the parent chain and restores chronological order.
    ///
    /// Forward chains run terminal→source and are reversed; backward
    /// chains already read source→target chronologically.
    fn transitions<S: LabelSource>(
        &self,
        labels: &S,
        terminal: LabelId,
    ) -> Result<Vec<Transition<'a>>, ReconstructError> {
        let direction = labels.direction();
        let mut transitions = Vec::new();

        let mut current = *labels
            .label(terminal)
            .ok_or(ReconstructError::UnknownLabel(terminal))?;
        let mut steps = 0usize;

        while let Some(edge_id) = current.incoming_edge {
            steps += 1;
            if steps > labels.label_count() {
                return Err(ReconstructError::InvalidLabelChain(
                    "parent chain longer than the label arena",
                ));
            }

            let parent_id = current.parent.ok_or(ReconstructError::InvalidLabelChain(
                "incoming edge without a parent label",
            ))?;
            let parent = *labels
                .label(parent_id)
                .ok_or(ReconstructError::UnknownLabel(parent_id))?;
            let edge = self
                .graph
                .edge(edge_id)
                .ok_or(ReconstructError::InvalidLabelChain(
                    "edge is not part of this graph",
                ))?;

            if edge.tail(direction) != parent.node || edge.head(direction) != current.node {
                return Err(ReconstructError::InvalidLabelChain(
                    "edge does not connect its labels",
                ));
            }

            let (depart, arrive) = match direction {
                Direction::Forward => (parent.time, current.time),
                Direction::Backward => (current.time, parent.time),
            };
            transitions.push(Transition {
                edge,
                depart,
                arrive,
            });
            current = parent;
        }

        if direction.is_forward() {
            transitions.reverse();
        }
        Ok(transitions)
    }

    /// Cuts the chronological edge sequence into legs.
    ///
    /// Foot edges accumulate into walk runs; scheduled edges accumulate
    /// into transit runs that break whenever the vehicle changes; wait
    /// edges close both kinds of run and surface as a gap between legs.
    fn partition(&self, transitions: &[Transition<'a>]) -> Vec<Leg> {
        let mut legs: Vec<Leg> = Vec::new();
        for run in split_runs(transitions) {
            let leg = match run {
                Run::Foot(run) => Leg::Walk(self.walk_leg(&run)),
                Run::Transit(trip, run) => {
                    Leg::Transit(transit_leg(&trip, &run, legs.last()))
                }
            };
            legs.push(leg);
        }
        legs
    }

    fn walk_leg(&self, run: &[Transition<'a>]) -> WalkLeg {
        let mut distance_m = 0.0;
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for transition in run {
            distance_m += transition.edge.kind.foot_distance_m();
            if let EdgeKind::Walk { geometry, .. } = &transition.edge.kind {
                for coord in geometry.coords() {
                    if coords.last() != Some(coord) {
                        coords.push(*coord);
                    }
                }
            }
        }

        let edges: Vec<&Edge> = run.iter().map(|t| t.edge).collect();
        WalkLeg {
            departure_time: run[0].depart,
            arrival_time: run[run.len() - 1].arrive,
            distance_m,
            geometry: LineString::new(coords),
            instructions: self.instructions.instructions_for(&edges),
        }
    }
}

/// One maximal same-mode (and, for transit, same-vehicle) run.
enum Run<'g> {
    Foot(Vec<Transition<'g>>),
    Transit(TripRef, Vec<Transition<'g>>),
}

fn flush_foot<'g>(runs: &mut Vec<Run<'g>>, foot: &mut Vec<Transition<'g>>) {
    if !foot.is_empty() {
        runs.push(Run::Foot(std::mem::take(foot)));
    }
}

fn flush_transit<'g>(
    runs: &mut Vec<Run<'g>>,
    current: &mut Option<TripRef>,
    transit: &mut Vec<Transition<'g>>,
) {
    if let Some(trip) = current.take() {
        if !transit.is_empty() {
            runs.push(Run::Transit(trip, std::mem::take(transit)));
        }
    }
}

fn split_runs<'g>(transitions: &[Transition<'g>]) -> Vec<Run<'g>> {
    let mut runs: Vec<Run<'g>> = Vec::new();
    let mut foot: Vec<Transition<'g>> = Vec::new();
    let mut transit: Vec<Transition<'g>> = Vec::new();
    let mut current: Option<TripRef> = None;

    for transition in transitions {
        match &transition.edge.kind {
            EdgeKind::Walk { .. } | EdgeKind::Transfer { .. } => {
                flush_transit(&mut runs, &mut current, &mut transit);
                foot.push(*transition);
            }
            EdgeKind::Wait { .. } => {
                flush_foot(&mut runs, &mut foot);
                flush_transit(&mut runs, &mut current, &mut transit);
            }
            EdgeKind::Board { trip, .. } => {
                flush_foot(&mut runs, &mut foot);
                flush_transit(&mut runs, &mut current, &mut transit);
                current = Some(trip.clone());
                transit.push(*transition);
            }
            EdgeKind::Hop { trip, .. }
            | EdgeKind::Dwell { trip, .. }
            | EdgeKind::Alight { trip, .. } => {
                flush_foot(&mut runs, &mut foot);
                let same = current
                    .as_ref()
                    .is_some_and(|c| c.is_same_vehicle(trip));
                if !same {
                    flush_transit(&mut runs, &mut current, &mut transit);
                    current = Some(trip.clone());
                }
                transit.push(*transition);
            }
        }
    }
    flush_foot(&mut runs, &mut foot);
    flush_transit(&mut runs, &mut current, &mut transit);

    runs
}

/// Emits a transit leg from one same-vehicle run.
fn transit_leg(trip: &TripRef, run: &[Transition<'_>], previous: Option<&Leg>) -> TransitLeg {
    let mut stops: Vec<Stop> = Vec::new();
    let mut distance_m = 0.0;

    for transition in run {
        match &transition.edge.kind {
            EdgeKind::Board { stop, .. } => stops.push(Stop {
                id: stop.id.clone(),
                name: stop.name.clone(),
                location: stop.location,
                arrival: None,
                departure: Some(transition.arrive),
            }),
            EdgeKind::Hop {
                stop,
                distance_m: hop_distance,
                ..
            } => {
                distance_m += hop_distance;
                stops.push(Stop {
                    id: stop.id.clone(),
                    name: stop.name.clone(),
                    location: stop.location,
                    arrival: Some(transition.arrive),
                    departure: None,
                });
            }
            EdgeKind::Dwell { .. } => {
                if let Some(last) = stops.last_mut() {
                    last.departure = Some(transition.arrive);
                }
            }
            // Alight repeats the stop the last hop already recorded;
            // foot and wait edges never reach a transit run.
            EdgeKind::Alight { .. }
            | EdgeKind::Walk { .. }
            | EdgeKind::Transfer { .. }
            | EdgeKind::Wait { .. } => {}
        }
    }

    let departure = stops.first().and_then(|s| s.departure.or(s.arrival));
    let arrival = stops.last().and_then(|s| s.arrival.or(s.departure));
    let travel_time_secs = match (departure, arrival) {
        (Some(dep), Some(arr)) => (arr - dep).num_seconds(),
        _ => 0,
    };

    let in_same_vehicle_as_previous = matches!(
        previous,
        Some(Leg::Transit(prev))
            if prev.feed_id == trip.feed_id && prev.trip_id == trip.trip_id
    );

    TransitLeg {
        feed_id: trip.feed_id.clone(),
        trip_id: trip.trip_id.clone(),
        route_id: trip.route_id.clone(),
        headsign: trip.headsign.clone(),
        stops,
        distance_m,
        travel_time_secs,
        in_same_vehicle_as_previous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::{GraphBuilder, MemoryGraph, TripStop};
    use crate::graph::{EdgeId, NodeId, StationId};
    use crate::realtime::NoDelays;
    use crate::router::{Label, Router, SearchConfig, SearchRequest, SearchResult};
    use crate::trip::instructions::{Instruction, NoInstructions};
    use chrono::NaiveDate;

    fn time(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn trip_ref(id: &str, headsign: &str) -> TripRef {
        TripRef {
            feed_id: "gtfs_0".to_string(),
            trip_id: id.to_string(),
            route_id: format!("route-{id}"),
            headsign: headsign.to_string(),
        }
    }

    /// X --420 m walk-- Y, one trip Y 10:00 -> Z 10:20.
    fn walk_and_ride() -> (MemoryGraph, NodeId, NodeId, NodeId) {
        let mut builder = GraphBuilder::new();
        let x = builder.station("X", "X Station", 8.50, 47.38);
        let y = builder.station("Y", "Y Station", 8.54, 47.38);
        let z = builder.station("Z", "Z Station", 8.58, 47.42);
        builder.walk(x, y, 420.0);
        builder
            .trip(
                trip_ref("t1", "Z Station"),
                &[
                    TripStop::origin(y, time(10, 0)),
                    TripStop::terminus(z, time(10, 20)),
                ],
            )
            .unwrap();
        (builder.build(), x, y, z)
    }

    fn search_from(graph: &MemoryGraph, station: &str, at: NaiveDateTime) -> SearchResult {
        Router::new(graph, &NoDelays, SearchConfig::default())
            .search(&SearchRequest::new(station, at))
            .unwrap()
    }

    fn only_label_at(result: &SearchResult, node: NodeId) -> Label {
        let labels: Vec<_> = result.labels_at(node).collect();
        assert_eq!(labels.len(), 1);
        *labels[0]
    }

    #[test]
    fn walk_then_ride_becomes_two_legs() {
        let (graph, _, _, z) = walk_and_ride();
        let result = search_from(&graph, "X", time(9, 50));
        let label = only_label_at(&result, z);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(trip.leg_count(), 2);

        let walk = trip.legs()[0].as_walk().expect("first leg is a walk");
        assert_eq!(walk.departure_time, time(9, 50));
        assert_eq!(walk.arrival_time, time(9, 55));
        assert_eq!(walk.distance_m, 420.0);
        assert_eq!(walk.geometry.coords().count(), 2);

        let transit = trip.legs()[1].as_transit().expect("second leg is transit");
        assert_eq!(transit.trip_id, "t1");
        assert_eq!(transit.route_id, "route-t1");
        assert_eq!(transit.feed_id, "gtfs_0");
        assert_eq!(transit.headsign, "Z Station");
        assert!(!transit.in_same_vehicle_as_previous);
        assert_eq!(transit.stops.len(), 2);
        assert_eq!(transit.stops[0].id, StationId::new("Y"));
        assert_eq!(transit.stops[0].departure, Some(time(10, 0)));
        assert_eq!(transit.stops[0].arrival, None);
        assert_eq!(transit.stops[1].id, StationId::new("Z"));
        assert_eq!(transit.stops[1].arrival, Some(time(10, 20)));
        assert_eq!(transit.travel_time(), chrono::Duration::minutes(20));
        assert!(transit.distance_m > 0.0);

        assert_eq!(trip.transfer_count(), 0);
        assert_eq!(trip.departure_time(), Some(time(9, 50)));
        assert_eq!(trip.arrival_time(), Some(time(10, 20)));
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let (graph, _, _, z) = walk_and_ride();
        let result = search_from(&graph, "X", time(9, 50));
        let label = only_label_at(&result, z);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let first = reconstructor.trip_for(&result, label.id).unwrap();
        let second = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn source_label_yields_the_empty_trip() {
        let (graph, x, _, _) = walk_and_ride();
        let result = search_from(&graph, "X", time(9, 50));
        let label = only_label_at(&result, x);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert!(trip.is_empty());
    }

    #[test]
    fn intermediate_stops_are_listed_with_both_times() {
        let mut builder = GraphBuilder::new();
        let y = builder.station("Y", "Y", 8.54, 47.38);
        let w = builder.station("W", "W", 8.56, 47.40);
        let z = builder.station("Z", "Z", 8.58, 47.42);
        builder
            .trip(
                trip_ref("t1", "Z"),
                &[
                    TripStop::origin(y, time(10, 0)),
                    TripStop::new(w, Some(time(10, 8)), Some(time(10, 10))),
                    TripStop::terminus(z, time(10, 20)),
                ],
            )
            .unwrap();
        let graph = builder.build();

        let result = search_from(&graph, "Y", time(9, 55));
        let label = only_label_at(&result, z);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(trip.leg_count(), 1);
        let transit = trip.legs()[0].as_transit().unwrap();
        assert_eq!(transit.stops.len(), 3);
        assert_eq!(transit.stops[0].departure, Some(time(10, 0)));
        assert_eq!(transit.stops[1].arrival, Some(time(10, 8)));
        assert_eq!(transit.stops[1].departure, Some(time(10, 10)));
        assert_eq!(transit.stops[2].arrival, Some(time(10, 20)));
        assert_eq!(trip.transfer_count(), 0);
    }

    #[test]
    fn same_vehicle_continuation_is_flagged() {
        // The same vehicle run split over two schedule entries: riders
        // must alight and re-board, but never leave the vehicle's trip.
        let mut builder = GraphBuilder::new();
        let y = builder.station("Y", "Y", 8.54, 47.38);
        let w = builder.station("W", "W", 8.56, 47.40);
        let z = builder.station("Z", "Z", 8.58, 47.42);
        builder
            .trip(
                trip_ref("t1", "W"),
                &[
                    TripStop::origin(y, time(10, 0)),
                    TripStop::terminus(w, time(10, 8)),
                ],
            )
            .unwrap();
        builder
            .trip(
                trip_ref("t1", "Z"),
                &[
                    TripStop::origin(w, time(10, 10)),
                    TripStop::terminus(z, time(10, 20)),
                ],
            )
            .unwrap();
        let graph = builder.build();

        let result = search_from(&graph, "Y", time(9, 55));
        let label = only_label_at(&result, z);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(trip.leg_count(), 2);
        let first = trip.legs()[0].as_transit().unwrap();
        let second = trip.legs()[1].as_transit().unwrap();
        assert!(!first.in_same_vehicle_as_previous);
        assert!(second.in_same_vehicle_as_previous);
        assert_eq!(trip.transfer_count(), 0);
    }

    #[test]
    fn backward_labels_reconstruct_chronologically() {
        let (graph, x, _, _) = walk_and_ride();
        let result = Router::new(&graph, &NoDelays, SearchConfig::arrive_by())
            .search(&SearchRequest::new("Z", time(10, 20)))
            .unwrap();
        let label = only_label_at(&result, x);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(trip.leg_count(), 2);
        assert!(trip.legs()[0].is_walk());
        let transit = trip.legs()[1].as_transit().unwrap();
        assert_eq!(transit.stops[0].departure, Some(time(10, 0)));
        assert_eq!(transit.stops[1].arrival, Some(time(10, 20)));
    }

    #[test]
    fn custom_instruction_generator_feeds_walk_legs() {
        struct PerEdge;
        impl InstructionGenerator for PerEdge {
            fn instructions_for(&self, edges: &[&Edge]) -> Vec<Instruction> {
                edges
                    .iter()
                    .map(|edge| Instruction {
                        text: "continue".to_string(),
                        distance_m: edge.kind.foot_distance_m(),
                    })
                    .collect()
            }
        }

        let (graph, _, _, z) = walk_and_ride();
        let result = search_from(&graph, "X", time(9, 50));
        let label = only_label_at(&result, z);

        let reconstructor = Reconstructor::new(&graph, &PerEdge);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        let walk = trip.legs()[0].as_walk().unwrap();
        assert_eq!(walk.instructions.len(), 1);
        assert_eq!(walk.instructions[0].distance_m, 420.0);
    }

    struct FakeLabels {
        labels: Vec<Label>,
        direction: Direction,
    }

    impl LabelSource for FakeLabels {
        fn label(&self, id: LabelId) -> Option<&Label> {
            self.labels.get(id.index())
        }

        fn label_count(&self) -> usize {
            self.labels.len()
        }

        fn direction(&self) -> Direction {
            self.direction
        }
    }

    fn fake_label(
        id: u32,
        node: NodeId,
        at: NaiveDateTime,
        incoming_edge: Option<EdgeId>,
        parent: Option<LabelId>,
    ) -> Label {
        Label {
            id: LabelId(id),
            node,
            time: at,
            incoming_edge,
            parent,
            transfers: 0,
            walk_distance_m: 0.0,
            first_departure_time: None,
            impossible: false,
        }
    }

    #[test]
    fn unknown_label_fails_fast() {
        let (graph, ..) = walk_and_ride();
        let labels = FakeLabels {
            labels: vec![],
            direction: Direction::Forward,
        };

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let result = reconstructor.trip_for(&labels, LabelId(7));
        assert_eq!(result, Err(ReconstructError::UnknownLabel(LabelId(7))));
    }

    #[test]
    fn disconnected_chain_fails_fast() {
        let (graph, x, _, z) = walk_and_ride();
        // Edge 0 is the X->Y walk, but the chain claims it reaches Z.
        let labels = FakeLabels {
            labels: vec![
                fake_label(0, x, time(9, 50), None, None),
                fake_label(1, z, time(9, 55), Some(EdgeId(0)), Some(LabelId(0))),
            ],
            direction: Direction::Forward,
        };

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let result = reconstructor.trip_for(&labels, LabelId(1));
        assert_eq!(
            result,
            Err(ReconstructError::InvalidLabelChain(
                "edge does not connect its labels"
            ))
        );
    }

    #[test]
    fn cyclic_chain_fails_fast() {
        let (graph, x, y, _) = walk_and_ride();
        // Walk edges 0 (X->Y) and 1 (Y->X) chained into a loop.
        let labels = FakeLabels {
            labels: vec![
                fake_label(0, x, time(9, 50), Some(EdgeId(1)), Some(LabelId(1))),
                fake_label(1, y, time(9, 45), Some(EdgeId(0)), Some(LabelId(0))),
            ],
            direction: Direction::Forward,
        };

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let result = reconstructor.trip_for(&labels, LabelId(0));
        assert_eq!(
            result,
            Err(ReconstructError::InvalidLabelChain(
                "parent chain longer than the label arena"
            ))
        );
    }

    #[test]
    fn missing_parent_fails_fast() {
        let (graph, _, y, _) = walk_and_ride();
        let labels = FakeLabels {
            labels: vec![fake_label(0, y, time(9, 55), Some(EdgeId(0)), None)],
            direction: Direction::Forward,
        };

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let result = reconstructor.trip_for(&labels, LabelId(0));
        assert_eq!(
            result,
            Err(ReconstructError::InvalidLabelChain(
                "incoming edge without a parent label"
            ))
        );
    }

    #[test]
    fn wait_edges_split_runs_without_emitting_legs() {
        let mut builder = GraphBuilder::new();
        let a = builder.station("A", "A", 8.50, 47.38);
        let b = builder.station("B", "B", 8.51, 47.38);
        let c = builder.station("C", "C", 8.52, 47.38);
        let d = builder.station("D", "D", 8.53, 47.38);
        builder.walk(a, b, 140.0);
        builder.wait(b, c, time(10, 0));
        builder.walk(c, d, 140.0);
        let graph = builder.build();

        let result = search_from(&graph, "A", time(9, 50));
        let label = only_label_at(&result, d);

        let reconstructor = Reconstructor::new(&graph, &NoInstructions);
        let trip = reconstructor.trip_for(&result, label.id).unwrap();

        assert_eq!(trip.leg_count(), 2);
        assert!(trip.legs().iter().all(Leg::is_walk));
        // The wait shows up as the gap between the legs.
        let first = trip.legs()[0].as_walk().unwrap();
        let second = trip.legs()[1].as_walk().unwrap();
        assert!(first.arrival_time < second.departure_time);
        assert_eq!(second.departure_time, time(10, 0));
    }
}
