//! Whether the path taken to a set of instructions may depend on the
//! environment.

use crate::analysis::environment::ValueMayDependOnEnvironmentAnalysis;
use crate::instruction::{InstrId, InstructionKind};
use crate::program::WholeProgramView;
use crate::value::ValueId;
use dexshrink_support::BitSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowDependence {
    pub may_depend_on_environment: bool,
    /// Conditions of the branches that decide whether a guarded instruction
    /// runs. They must all be environment independent.
    pub required_values: Vec<ValueId>,
}

/// Checks every `if` and `switch` that can steer execution towards one of
/// the `guarded` instructions.
///
/// Exceptional control flow is not modelled: any catch handler in the
/// method makes the answer conservative.
pub fn control_flow_may_depend_on_environment<V>(
    analysis: &ValueMayDependOnEnvironmentAnalysis<'_, V>,
    guarded: &[InstrId],
) -> ControlFlowDependence
where
    V: WholeProgramView + ?Sized,
{
    let code = analysis.code();
    if guarded.is_empty() {
        return ControlFlowDependence::default();
    }
    if code.blocks().any(|(_, block)| block.has_catch_handlers()) {
        log::trace!("{}: catch handlers make control flow opaque", code.context());
        return ControlFlowDependence {
            may_depend_on_environment: true,
            required_values: Vec::new(),
        };
    }

    // Blocks from which some guarded instruction is reachable.
    let mut reaches = BitSet::new_empty(code.num_blocks());
    let mut worklist = Vec::new();
    for &instruction in guarded {
        let block = code.instruction(instruction).block;
        if reaches.insert(block.index()) {
            worklist.push(block);
        }
    }
    while let Some(block) = worklist.pop() {
        for &predecessor in &code.block(block).predecessors {
            if reaches.insert(predecessor.index()) {
                worklist.push(predecessor);
            }
        }
    }

    let mut required_values = Vec::new();
    let mut seen = BitSet::new_empty(code.num_values());
    for (id, block) in code.blocks() {
        let Some(exit) = block.exit() else {
            continue;
        };
        let exit = code.instruction(exit);
        if !exit.is_conditional_branch()
            || !code
                .successors(id)
                .iter()
                .any(|successor| reaches.get(successor.index()))
        {
            continue;
        }
        let conditions = match &exit.kind {
            InstructionKind::If { left, right, .. } => {
                std::iter::once(*left).chain(*right).collect::<Vec<_>>()
            }
            InstructionKind::Switch { value, .. } => vec![*value],
            _ => Vec::new(),
        };
        for condition in conditions {
            if seen.insert(condition.index()) {
                required_values.push(condition);
            }
        }
    }

    let may_depend_on_environment =
        analysis.any_value_may_depend_on_environment(required_values.iter().copied());
    ControlFlowDependence {
        may_depend_on_environment,
        required_values,
    }
}
