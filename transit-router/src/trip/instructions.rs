//! Turn-by-turn instruction boundary.
//!
//! Generating walking instructions from road geometry is a collaborator
//! concern; the reconstructor hands it the ordered walk edges of a leg
//! and copies whatever comes back into the leg verbatim.

use crate::graph::Edge;

/// One turn instruction of a walk leg.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    /// Human-readable instruction text.
    pub text: String,
    /// Distance covered by this instruction, in metres.
    pub distance_m: f64,
}

/// Produces turn-by-turn instructions for an ordered walk edge run.
pub trait InstructionGenerator {
    /// Instructions covering `edges`, in walking order.
    fn instructions_for(&self, edges: &[&Edge]) -> Vec<Instruction>;
}

/// A generator that produces no instructions; walk legs keep their
/// geometry but carry an empty instruction list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInstructions;

impl InstructionGenerator for NoInstructions {
    fn instructions_for(&self, _edges: &[&Edge]) -> Vec<Instruction> {
        Vec::new()
    }
}
