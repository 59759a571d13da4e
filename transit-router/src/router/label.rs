//! Labels, the label arena and per-node Pareto frontiers.
//!
//! A label summarizes one partial path. The search owns every label it
//! creates in a [`LabelArena`]; ancestry is recorded as an arena index,
//! never as an owning reference, so reconstruction is a pure traversal
//! and cycles are impossible — time strictly advances (or retreats, in
//! backward mode) along any parent chain.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::graph::{Direction, EdgeId, NodeId};

/// Index of a label in its search's arena.
///
/// Only meaningful together with the search (or search result) that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl LabelId {
    /// Returns the index as a usize, for slice access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three Pareto criteria of a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criteria {
    pub time: NaiveDateTime,
    pub transfers: u32,
    pub walk_distance_m: f64,
}

impl Criteria {
    /// Returns true if `self` dominates `other`.
    ///
    /// Dominating means not worse in any criterion; "better" for the
    /// time criterion is earlier going forward and later going backward.
    /// Equal criteria count as dominating, so of two identical labels
    /// only one survives in a frontier.
    pub fn dominates(&self, other: &Criteria, direction: Direction) -> bool {
        let time_not_worse = match direction {
            Direction::Forward => self.time <= other.time,
            Direction::Backward => self.time >= other.time,
        };
        time_not_worse
            && self.transfers <= other.transfers
            && self.walk_distance_m <= other.walk_distance_m
    }
}

/// A partial-path summary reaching one node at one point in the search.
///
/// Immutable once settled; `parent` and `incoming_edge` carry enough to
/// reconstruct the full path afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label {
    /// Arena index of this label.
    pub id: LabelId,
    /// Node this label reaches.
    pub node: NodeId,
    /// Instant at which the node is reached (forward), or the latest
    /// instant one may still be at the node (backward).
    pub time: NaiveDateTime,
    /// Edge used to reach `node` from the parent; `None` on the initial
    /// label.
    pub incoming_edge: Option<EdgeId>,
    /// Label this one was derived from; `None` on the initial label.
    pub parent: Option<LabelId>,
    /// Vehicle-to-vehicle transfers accumulated so far.
    pub transfers: u32,
    /// Cumulative walking distance in metres.
    pub walk_distance_m: f64,
    /// Instant of the very first transit boarding, set once and then
    /// propagated unchanged. `None` while the path has only walked.
    pub first_departure_time: Option<NaiveDateTime>,
    /// True for a label violating a hard constraint. Such labels are
    /// dropped before admission, so this is never true once settled.
    pub impossible: bool,
}

impl Label {
    /// The Pareto criteria of this label.
    pub fn criteria(&self) -> Criteria {
        Criteria {
            time: self.time,
            transfers: self.transfers,
            walk_distance_m: self.walk_distance_m,
        }
    }

    /// Time spent travelling since the first boarding, excluding the
    /// initial wait. Zero for a path that never boarded a vehicle.
    pub fn travel_time(&self, direction: Direction) -> Duration {
        match self.first_departure_time {
            Some(first) => match direction {
                Direction::Forward => self.time - first,
                Direction::Backward => first - self.time,
            },
            None => Duration::zero(),
        }
    }
}

/// A label that has been generated but not yet admitted to a frontier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub node: NodeId,
    pub time: NaiveDateTime,
    pub incoming_edge: Option<EdgeId>,
    pub parent: Option<LabelId>,
    pub transfers: u32,
    pub walk_distance_m: f64,
    pub first_departure_time: Option<NaiveDateTime>,
    pub impossible: bool,
}

impl Candidate {
    pub(crate) fn criteria(&self) -> Criteria {
        Criteria {
            time: self.time,
            transfers: self.transfers,
            walk_distance_m: self.walk_distance_m,
        }
    }
}

/// Owner of every label a search settles.
#[derive(Debug, Default)]
pub struct LabelArena {
    labels: Vec<Label>,
}

impl LabelArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Admits a candidate, assigning it the next id.
    pub(crate) fn push(&mut self, candidate: Candidate) -> Label {
        let label = Label {
            id: LabelId(self.labels.len() as u32),
            node: candidate.node,
            time: candidate.time,
            incoming_edge: candidate.incoming_edge,
            parent: candidate.parent,
            transfers: candidate.transfers,
            walk_distance_m: candidate.walk_distance_m,
            first_departure_time: candidate.first_departure_time,
            impossible: candidate.impossible,
        };
        self.labels.push(label);
        label
    }

    /// Looks a label up by id.
    pub fn get(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id.index())
    }

    /// Number of settled labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if nothing has been settled yet.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All settled labels in settlement order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

/// Uniform access to settled labels, for itinerary reconstruction.
///
/// Implemented by the live search object and by the completed search
/// result, so trips can be rebuilt from either.
pub trait LabelSource {
    /// Looks a label up by id.
    fn label(&self, id: LabelId) -> Option<&Label>;

    /// Number of labels in the arena; bounds any valid parent chain.
    fn label_count(&self) -> usize;

    /// The direction the labels were produced in.
    fn direction(&self) -> Direction;
}

/// The non-dominated labels known for one node.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    ids: Vec<LabelId>,
}

impl Frontier {
    /// Ids of the labels currently on the frontier.
    pub fn ids(&self) -> &[LabelId] {
        &self.ids
    }

    fn is_dominated(&self, criteria: &Criteria, arena: &LabelArena, direction: Direction) -> bool {
        self.ids.iter().any(|id| {
            arena
                .get(*id)
                .is_some_and(|label| label.criteria().dominates(criteria, direction))
        })
    }

    fn insert(&mut self, label: Label, arena: &LabelArena, direction: Direction) {
        debug_assert!(!self.is_dominated(&label.criteria(), arena, direction));
        self.ids.retain(|id| {
            arena
                .get(*id)
                .is_none_or(|other| !label.criteria().dominates(&other.criteria(), direction))
        });
        self.ids.push(label.id);
    }
}

/// Map from node to its Pareto frontier.
///
/// Read-only once the search that built it reached a terminal state.
#[derive(Debug)]
pub struct FrontierStore {
    frontiers: HashMap<NodeId, Frontier>,
    direction: Direction,
}

impl FrontierStore {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            frontiers: HashMap::new(),
            direction,
        }
    }

    /// The direction the frontiers were built for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of distinct nodes with at least one settled label.
    pub fn node_count(&self) -> usize {
        self.frontiers.len()
    }

    /// Returns true if `node` has at least one settled label.
    pub fn contains(&self, node: NodeId) -> bool {
        self.frontiers.contains_key(&node)
    }

    /// Ids of the non-dominated labels settled at `node`.
    pub fn labels_at(&self, node: NodeId) -> &[LabelId] {
        self.frontiers
            .get(&node)
            .map(|frontier| frontier.ids())
            .unwrap_or(&[])
    }

    /// All nodes with a non-empty frontier, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.frontiers.keys().copied()
    }

    pub(crate) fn is_dominated(
        &self,
        node: NodeId,
        criteria: &Criteria,
        arena: &LabelArena,
    ) -> bool {
        self.frontiers
            .get(&node)
            .is_some_and(|frontier| frontier.is_dominated(criteria, arena, self.direction))
    }

    pub(crate) fn insert(&mut self, label: Label, arena: &LabelArena) {
        self.frontiers
            .entry(label.node)
            .or_default()
            .insert(label, arena, self.direction);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    prop_compose! {
        fn arb_criteria()(
            minutes in 0i64..600,
            transfers in 0u32..5,
            walk in 0u64..5000,
        ) -> Criteria {
            Criteria {
                time: base_time() + Duration::minutes(minutes),
                transfers,
                walk_distance_m: walk as f64,
            }
        }
    }

    proptest! {
        /// After any insertion sequence, no two frontier labels dominate
        /// each other.
        #[test]
        fn frontier_is_pareto(criteria in prop::collection::vec(arb_criteria(), 1..40)) {
            let mut arena = LabelArena::new();
            let mut store = FrontierStore::new(Direction::Forward);
            let node = NodeId(0);

            for c in criteria {
                if store.is_dominated(node, &c, &arena) {
                    continue;
                }
                let label = arena.push(Candidate {
                    node,
                    time: c.time,
                    incoming_edge: None,
                    parent: None,
                    transfers: c.transfers,
                    walk_distance_m: c.walk_distance_m,
                    first_departure_time: None,
                    impossible: false,
                });
                store.insert(label, &arena);
            }

            let ids = store.labels_at(node);
            for (i, a) in ids.iter().enumerate() {
                for (j, b) in ids.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let a = arena.get(*a).unwrap().criteria();
                    let b = arena.get(*b).unwrap().criteria();
                    prop_assert!(
                        !a.dominates(&b, Direction::Forward),
                        "label {i} dominates label {j} in the frontier"
                    );
                }
            }
        }

        /// Dominance is antisymmetric unless the criteria are equal.
        #[test]
        fn dominance_antisymmetric(a in arb_criteria(), b in arb_criteria()) {
            if a.dominates(&b, Direction::Forward) && b.dominates(&a, Direction::Forward) {
                prop_assert_eq!(a.time, b.time);
                prop_assert_eq!(a.transfers, b.transfers);
                prop_assert_eq!(a.walk_distance_m, b.walk_distance_m);
            }
        }

        /// Flipping the direction flips which of two time-ordered labels
        /// dominates, all else equal.
        #[test]
        fn direction_flip(a in arb_criteria(), b in arb_criteria()) {
            let a2 = Criteria { transfers: b.transfers, walk_distance_m: b.walk_distance_m, ..a };
            if a2.time != b.time {
                prop_assert_ne!(
                    a2.dominates(&b, Direction::Forward),
                    a2.dominates(&b, Direction::Backward)
                );
            }
        }
    }
}
