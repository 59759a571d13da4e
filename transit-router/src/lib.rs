//! Multi-criteria public-transit journey engine.
//!
//! Answers "how do I get from A to B — or to every reachable station —
//! departing after (or arriving by) time T" over a time-expanded
//! transit+walk graph. Arrival time, transfer count and walking distance
//! are tracked as separate Pareto criteria instead of being collapsed
//! into a single scalar cost, so a later-but-direct connection survives
//! alongside an earlier one with a change.
//!
//! The engine is an in-process library: the schedule graph, realtime
//! delays and turn-by-turn walking instructions are supplied by
//! collaborators behind the traits in [`graph`], [`realtime`] and
//! [`trip::instructions`].

pub mod graph;
pub mod realtime;
pub mod router;
pub mod trip;
