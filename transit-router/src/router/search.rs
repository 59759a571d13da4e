//! Multi-criteria label-setting search.
//!
//! A classic label-setting loop generalized to a Pareto frontier per
//! node: pop the globally best open label, discard it if something
//! settled at its node already dominates it, otherwise settle it,
//! expand its usable edges and queue the non-dominated successors.
//! Settlement order is non-decreasing time going forward and
//! non-increasing time going backward, which is what makes early
//! termination sound.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use chrono::NaiveDateTime;
use tracing::{debug, trace};

use crate::graph::{
    Direction, EdgeId, ExplorerError, GraphExplorer, NodeId, StationId, TransitGraph,
};
use crate::realtime::DelayLookup;

use super::config::{InvalidConfig, SearchConfig};
use super::label::{Candidate, FrontierStore, Label, LabelArena, LabelId, LabelSource};
use super::weighting::Weighting;

/// Error starting or running a search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// A requested source or target station id has no graph node.
    /// Surfaced before any search work happens.
    #[error("unknown station reference: {0}")]
    UnknownNodeReference(StationId),

    /// The configuration was rejected before the search started.
    #[error(transparent)]
    InvalidConfiguration(#[from] InvalidConfig),

    /// The graph handed out an edge the engine cannot trust. Continuing
    /// could silently produce a wrong itinerary, so the search aborts.
    #[error("malformed edge {edge}: {reason}")]
    MalformedEdge { edge: EdgeId, reason: &'static str },
}

impl From<ExplorerError> for SearchError {
    fn from(error: ExplorerError) -> Self {
        match error {
            ExplorerError::MalformedEdge { edge, reason } => {
                SearchError::MalformedEdge { edge, reason }
            }
            ExplorerError::UnknownEdge(edge) => SearchError::MalformedEdge {
                edge,
                reason: "edge id not resolvable in this graph",
            },
        }
    }
}

/// How a search reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The open set ran dry: every reachable label was settled.
    Exhausted,
    /// The continue predicate said stop, or every requested target was
    /// satisfied before exhaustion.
    TerminatedByCaller,
    /// The distinct-node budget was hit; frontiers are partial.
    BudgetExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Finished(SearchOutcome),
    Failed,
}

/// Open-set entry: a candidate keyed for the priority queue.
///
/// `BinaryHeap` is a max-heap, so comparisons are reversed to pop the
/// best (earliest forward, latest backward) candidate first. Ties are
/// broken by transfer count, then walk distance, both ascending.
struct OpenEntry {
    key_ms: i64,
    candidate: Candidate,
}

impl OpenEntry {
    fn new(candidate: Candidate, direction: Direction) -> Self {
        let millis = candidate.time.and_utc().timestamp_millis();
        let key_ms = match direction {
            Direction::Forward => millis,
            Direction::Backward => -millis,
        };
        Self { key_ms, candidate }
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key_ms
            .cmp(&self.key_ms)
            .then_with(|| other.candidate.transfers.cmp(&self.candidate.transfers))
            .then_with(|| {
                other
                    .candidate
                    .walk_distance_m
                    .total_cmp(&self.candidate.walk_distance_m)
            })
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

/// One query's search state: arena, frontiers and open set.
///
/// Single-threaded and owned exclusively by the query that constructed
/// it. Labels are immutable once settled, so ceasing to drive the
/// search leaves everything settled so far valid and queryable.
pub struct MultiCriteriaSearch<'a, G, D> {
    graph: &'a G,
    explorer: GraphExplorer<'a, G, D>,
    weighting: Weighting,
    config: SearchConfig,
    reference_time: NaiveDateTime,
    arena: LabelArena,
    frontiers: FrontierStore,
    open: BinaryHeap<OpenEntry>,
    phase: Phase,
    visitor: Option<Box<dyn FnMut(&Label, EdgeId) + 'a>>,
    continue_predicate: Option<Box<dyn FnMut(&Label) -> bool + 'a>>,
}

impl<'a, G: TransitGraph, D: DelayLookup> MultiCriteriaSearch<'a, G, D> {
    /// Creates a search seeded with a zero-cost label at `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidConfiguration`] without touching
    /// the graph when the configuration is unusable.
    pub fn new(
        graph: &'a G,
        delays: &'a D,
        config: SearchConfig,
        source: NodeId,
        reference_time: NaiveDateTime,
    ) -> Result<Self, SearchError> {
        config.validate()?;

        let explorer = GraphExplorer::new(graph, delays, config.direction, config.walk_speed_ms);
        let weighting = Weighting::new(config.direction, config.tie_break_epsilon());

        let mut open = BinaryHeap::new();
        open.push(OpenEntry::new(
            Candidate {
                node: source,
                time: reference_time,
                incoming_edge: None,
                parent: None,
                transfers: 0,
                walk_distance_m: 0.0,
                first_departure_time: None,
                impossible: false,
            },
            config.direction,
        ));

        Ok(Self {
            graph,
            explorer,
            weighting,
            frontiers: FrontierStore::new(config.direction),
            config,
            reference_time,
            arena: LabelArena::new(),
            open,
            phase: Phase::NotStarted,
            visitor: None,
            continue_predicate: None,
        })
    }

    /// Installs an observer invoked once per edge relaxation.
    ///
    /// The visitor must not try to influence the search; it has no
    /// return value and sees only the settled label being expanded and
    /// the edge being relaxed.
    pub fn with_visitor(mut self, visitor: impl FnMut(&Label, EdgeId) + 'a) -> Self {
        self.visitor = Some(Box::new(visitor));
        self
    }

    /// Installs a predicate re-evaluated after each settled label; the
    /// search stops as soon as it returns false.
    pub fn with_continue_predicate(
        mut self,
        predicate: impl FnMut(&Label) -> bool + 'a,
    ) -> Self {
        self.continue_predicate = Some(Box::new(predicate));
        self
    }

    /// The direction this search runs in.
    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    /// The reference instant the search started from.
    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// How the search ended, once it has.
    pub fn outcome(&self) -> Option<SearchOutcome> {
        match self.phase {
            Phase::Finished(outcome) => Some(outcome),
            Phase::NotStarted | Phase::Running | Phase::Failed => None,
        }
    }

    /// The frontier store built so far.
    pub fn frontiers(&self) -> &FrontierStore {
        &self.frontiers
    }

    /// The labels settled so far.
    pub fn arena(&self) -> &LabelArena {
        &self.arena
    }

    /// Non-dominated labels settled at `node` so far.
    pub fn labels_at(&self, node: NodeId) -> impl Iterator<Item = &Label> {
        self.frontiers
            .labels_at(node)
            .iter()
            .filter_map(|id| self.arena.get(*id))
    }

    /// The lazy settled-label sequence.
    ///
    /// Production and consumption interleave: each `next()` runs the
    /// loop until one more label settles. The sequence is forward-only;
    /// dropping it mid-way leaves all settled labels queryable through
    /// [`Self::frontiers`].
    pub fn labels(&mut self) -> LabelStream<'_, 'a, G, D> {
        LabelStream { search: self }
    }

    /// Drives the search to a terminal state.
    ///
    /// With a non-empty `targets` set and `profile_search` off, the
    /// search stops as soon as every target has a settled label.
    pub fn run(&mut self, targets: &[NodeId]) -> Result<SearchOutcome, SearchError> {
        let mut remaining: HashSet<NodeId> = if self.config.profile_search {
            HashSet::new()
        } else {
            targets.iter().copied().collect()
        };

        loop {
            match self.settle_next()? {
                Some(label) => {
                    if !remaining.is_empty() {
                        remaining.remove(&label.node);
                        if remaining.is_empty() {
                            self.phase = Phase::Finished(SearchOutcome::TerminatedByCaller);
                            return Ok(SearchOutcome::TerminatedByCaller);
                        }
                    }
                }
                None => {
                    return match self.phase {
                        Phase::Finished(outcome) => Ok(outcome),
                        // settle_next only returns None once finished.
                        Phase::NotStarted | Phase::Running | Phase::Failed => {
                            Ok(SearchOutcome::Exhausted)
                        }
                    };
                }
            }
        }
    }

    /// Settles the next label, or returns `None` once the search is in
    /// a terminal state.
    pub fn settle_next(&mut self) -> Result<Option<Label>, SearchError> {
        if let Phase::Finished(_) | Phase::Failed = self.phase {
            return Ok(None);
        }
        self.phase = Phase::Running;

        loop {
            let Some(entry) = self.open.pop() else {
                self.phase = Phase::Finished(SearchOutcome::Exhausted);
                return Ok(None);
            };
            let candidate = entry.candidate;

            if self
                .frontiers
                .is_dominated(candidate.node, &candidate.criteria(), &self.arena)
            {
                continue;
            }

            if !self.frontiers.contains(candidate.node)
                && self.frontiers.node_count() >= self.config.max_visited_nodes
            {
                self.phase = Phase::Finished(SearchOutcome::BudgetExceeded);
                return Ok(None);
            }

            let label = self.arena.push(candidate);
            self.frontiers.insert(label, &self.arena);
            trace!(node = %label.node, time = %label.time, transfers = label.transfers, "settled");

            if let Some(predicate) = self.continue_predicate.as_mut() {
                if !predicate(&label) {
                    self.phase = Phase::Finished(SearchOutcome::TerminatedByCaller);
                    return Ok(Some(label));
                }
            }

            if let Err(error) = self.expand(&label) {
                self.phase = Phase::Failed;
                return Err(error);
            }

            return Ok(Some(label));
        }
    }

    fn expand(&mut self, label: &Label) -> Result<(), SearchError> {
        let graph = self.graph;
        let direction = self.config.direction;
        let horizon = self.config.max_horizon();

        for item in self.explorer.explore(label.node, label.time) {
            let explored = item?;

            if let Some(visitor) = self.visitor.as_mut() {
                visitor(label, explored.edge);
            }

            if let Some(horizon) = horizon {
                let elapsed = match direction {
                    Direction::Forward => explored.time - self.reference_time,
                    Direction::Backward => self.reference_time - explored.time,
                };
                if elapsed > horizon {
                    continue;
                }
            }

            let Some(edge) = graph.edge(explored.edge) else {
                return Err(SearchError::MalformedEdge {
                    edge: explored.edge,
                    reason: "edge id not resolvable in this graph",
                });
            };

            let cost = self.weighting.deltas(
                &edge.kind,
                label.first_departure_time.is_some(),
                explored.time,
            );

            let walk_distance_m = label.walk_distance_m + cost.walk_delta_m;
            if walk_distance_m > self.config.max_walk_distance_m {
                // Impossible label: violates a hard constraint, dropped.
                continue;
            }

            let candidate = Candidate {
                node: edge.head(direction),
                time: self.weighting.tie_broken(explored.time),
                incoming_edge: Some(explored.edge),
                parent: Some(label.id),
                transfers: label.transfers + cost.transfer_delta,
                walk_distance_m,
                first_departure_time: label.first_departure_time.or(cost.boarded_at),
                impossible: false,
            };

            if self
                .frontiers
                .is_dominated(candidate.node, &candidate.criteria(), &self.arena)
            {
                continue;
            }

            self.open.push(OpenEntry::new(candidate, direction));
        }

        Ok(())
    }

    fn into_result(self, outcome: SearchOutcome, targets: Vec<NodeId>) -> SearchResult {
        SearchResult {
            outcome,
            direction: self.config.direction,
            arena: self.arena,
            frontiers: self.frontiers,
            targets,
        }
    }
}

impl<G: TransitGraph, D: DelayLookup> LabelSource for MultiCriteriaSearch<'_, G, D> {
    fn label(&self, id: LabelId) -> Option<&Label> {
        self.arena.get(id)
    }

    fn label_count(&self) -> usize {
        self.arena.len()
    }

    fn direction(&self) -> Direction {
        self.config.direction
    }
}

/// Iterator over settled labels, in settlement order.
///
/// See [`MultiCriteriaSearch::labels`].
pub struct LabelStream<'s, 'a, G, D> {
    search: &'s mut MultiCriteriaSearch<'a, G, D>,
}

impl<G: TransitGraph, D: DelayLookup> Iterator for LabelStream<'_, '_, G, D> {
    type Item = Result<Label, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.search.settle_next() {
            Ok(Some(label)) => Some(Ok(label)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

/// A search request in external station ids.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Station to start from (or to arrive at, searching backward).
    pub source: StationId,
    /// Stations of interest. Empty means "search everything reachable".
    pub targets: Vec<StationId>,
    /// Reference instant: departure time going forward, arrival
    /// deadline going backward.
    pub reference_time: NaiveDateTime,
}

impl SearchRequest {
    /// Creates a request with no targets.
    pub fn new(source: impl Into<StationId>, reference_time: NaiveDateTime) -> Self {
        Self {
            source: source.into(),
            targets: Vec::new(),
            reference_time,
        }
    }

    /// Restricts the request to the given target stations.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StationId>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
}

/// The terminal state of a completed search.
///
/// Owns every label the search settled; read-only from here on.
#[derive(Debug)]
pub struct SearchResult {
    outcome: SearchOutcome,
    direction: Direction,
    arena: LabelArena,
    frontiers: FrontierStore,
    targets: Vec<NodeId>,
}

impl SearchResult {
    /// How the search ended.
    pub fn outcome(&self) -> SearchOutcome {
        self.outcome
    }

    /// True when the whole reachable space was explored: frontiers are
    /// complete, and an absent label means genuinely unreachable.
    pub fn is_exhaustive(&self) -> bool {
        self.outcome == SearchOutcome::Exhausted
    }

    /// The direction the search ran in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of distinct nodes settled.
    pub fn visited_nodes(&self) -> usize {
        self.frontiers.node_count()
    }

    /// The resolved target nodes, in request order.
    pub fn target_nodes(&self) -> &[NodeId] {
        &self.targets
    }

    /// The full frontier store, for reachability and ranking queries.
    pub fn frontiers(&self) -> &FrontierStore {
        &self.frontiers
    }

    /// All settled labels.
    pub fn arena(&self) -> &LabelArena {
        &self.arena
    }

    /// Non-dominated labels settled at `node`; empty if unreachable
    /// within the explored space.
    pub fn labels_at(&self, node: NodeId) -> impl Iterator<Item = &Label> {
        self.frontiers
            .labels_at(node)
            .iter()
            .filter_map(|id| self.arena.get(*id))
    }
}

impl LabelSource for SearchResult {
    fn label(&self, id: LabelId) -> Option<&Label> {
        self.arena.get(id)
    }

    fn label_count(&self) -> usize {
        self.arena.len()
    }

    fn direction(&self) -> Direction {
        self.direction
    }
}

/// Entry point for station-id based queries.
///
/// Borrows the graph and delay collaborators plus a configuration, and
/// spins up one [`MultiCriteriaSearch`] per query.
pub struct Router<'a, G, D> {
    graph: &'a G,
    delays: &'a D,
    config: SearchConfig,
}

impl<'a, G: TransitGraph, D: DelayLookup> Router<'a, G, D> {
    /// Creates a router over the given collaborators.
    pub fn new(graph: &'a G, delays: &'a D, config: SearchConfig) -> Self {
        Self {
            graph,
            delays,
            config,
        }
    }

    /// Runs a search to a terminal state.
    ///
    /// Unknown station ids fail before any search work. An unreachable
    /// target is an empty label set in the result, not an error.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let source = self.resolve(&request.source)?;
        let targets: Vec<NodeId> = request
            .targets
            .iter()
            .map(|station| self.resolve(station))
            .collect::<Result<_, _>>()?;

        debug!(
            source = %request.source,
            targets = request.targets.len(),
            reference = %request.reference_time,
            "starting search"
        );

        let mut search = MultiCriteriaSearch::new(
            self.graph,
            self.delays,
            self.config.clone(),
            source,
            request.reference_time,
        )?;
        let outcome = search.run(&targets)?;

        debug!(?outcome, visited = search.frontiers().node_count(), "search finished");
        Ok(search.into_result(outcome, targets))
    }

    /// Starts a search for lazy consumption via
    /// [`MultiCriteriaSearch::labels`].
    pub fn lazy_labels(
        &self,
        source: &StationId,
        reference_time: NaiveDateTime,
    ) -> Result<MultiCriteriaSearch<'a, G, D>, SearchError> {
        let source = self.resolve(source)?;
        MultiCriteriaSearch::new(
            self.graph,
            self.delays,
            self.config.clone(),
            source,
            reference_time,
        )
    }

    fn resolve(&self, station: &StationId) -> Result<NodeId, SearchError> {
        self.graph
            .station_node(station)
            .ok_or_else(|| SearchError::UnknownNodeReference(station.clone()))
    }
}
