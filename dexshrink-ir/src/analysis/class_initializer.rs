//! Classifies what running a class initializer does, so that optimizations
//! know whether its triggers may be removed or moved.

use crate::analysis::control_flow::control_flow_may_depend_on_environment;
use crate::analysis::environment::ValueMayDependOnEnvironmentAnalysis;
use crate::code::IrCode;
use crate::effects::SideEffectAssumption;
use crate::instruction::{Instruction, InstructionKind};
use crate::program::WholeProgramView;
use std::fmt;

/// Ordered from least to most conservative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClassInitializerSideEffect {
    /// Running the initializer is not observable.
    None,
    /// The only effects are environment independent writes to the static
    /// fields of the class itself, so the first trigger may be delayed.
    SideEffectsThatCanBePostponed,
    SideEffectsThatCannotBePostponed,
}

impl ClassInitializerSideEffect {
    pub fn is_none(self) -> bool {
        self == ClassInitializerSideEffect::None
    }

    /// True for `None` as well.
    pub fn can_be_postponed(self) -> bool {
        self != ClassInitializerSideEffect::SideEffectsThatCannotBePostponed
    }

    pub fn cannot_be_postponed(self) -> bool {
        !self.can_be_postponed()
    }

    /// The more conservative of the two.
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassInitializerSideEffect::None => "NONE",
            ClassInitializerSideEffect::SideEffectsThatCanBePostponed => {
                "SIDE_EFFECTS_THAT_CAN_BE_POSTPONED"
            }
            ClassInitializerSideEffect::SideEffectsThatCannotBePostponed => {
                "SIDE_EFFECTS_THAT_CANNOT_BE_POSTPONED"
            }
        }
    }
}

impl fmt::Display for ClassInitializerSideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ClassInitializerSideEffectAnalysis;

impl ClassInitializerSideEffectAnalysis {
    /// Classifies the class initializer `code`.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not the code of a `<clinit>` method; a wrong
    /// answer here would silently miscompile, so callers must not guess.
    pub fn class_initializer_can_be_postponed<V>(
        view: &V,
        code: &IrCode,
    ) -> ClassInitializerSideEffect
    where
        V: WholeProgramView + ?Sized,
    {
        let factory = view.dex_item_factory();
        assert!(
            code.is_class_initializer(factory),
            "internal error: {} is not a class initializer",
            code.context()
        );
        let context = code.holder();
        let cannot = |instruction: &Instruction, reason: &str| {
            log::trace!(
                "{}: {} at {:?} {}",
                code.context(),
                instruction.mnemonic(),
                instruction.id,
                reason
            );
            ClassInitializerSideEffect::SideEffectsThatCannotBePostponed
        };

        let mut environment_values = Vec::new();
        let mut guarded = Vec::new();
        let mut control_flow_must_be_independent = false;
        for instruction in code.instructions() {
            match &instruction.kind {
                InstructionKind::ArrayPut { array, .. } => {
                    if !code.is_defined_by_instruction_satisfying(*array, Instruction::is_creating_array)
                    {
                        return cannot(instruction, "writes an array not created here");
                    }
                    if view.instruction_instance_can_throw(code, instruction, SideEffectAssumption::None) {
                        return cannot(instruction, "may throw");
                    }
                    guarded.push(instruction.id);
                }
                InstructionKind::NewArrayEmpty { .. }
                | InstructionKind::NewArrayFilled { .. }
                | InstructionKind::NewArrayFilledData { .. } => {
                    if view.instruction_instance_can_throw(code, instruction, SideEffectAssumption::None) {
                        return cannot(instruction, "may throw");
                    }
                }
                InstructionKind::StaticPut { field, value } => {
                    let Some(resolved) = view.resolve_field(field) else {
                        return cannot(instruction, "writes an unresolved field");
                    };
                    if resolved.holder != context {
                        return cannot(instruction, "writes a field of another class");
                    }
                    if view.instruction_instance_can_throw(code, instruction, SideEffectAssumption::None) {
                        return cannot(instruction, "may throw");
                    }
                    control_flow_must_be_independent = true;
                    environment_values.push(*value);
                    guarded.push(instruction.id);
                }
                _ if instruction.is_invoke_constructor(factory) => {
                    if view.instruction_may_have_side_effects(
                        code,
                        instruction,
                        SideEffectAssumption::IgnoreReceiverFieldAssignments,
                    ) {
                        return cannot(instruction, "calls a constructor with side effects");
                    }
                    guarded.push(instruction.id);
                }
                _ => {
                    if view.instruction_may_have_side_effects(code, instruction, SideEffectAssumption::None) {
                        return cannot(instruction, "has side effects");
                    }
                }
            }
        }

        if !control_flow_must_be_independent && environment_values.is_empty() {
            return ClassInitializerSideEffect::None;
        }

        let analysis = ValueMayDependOnEnvironmentAnalysis::new(view, code);
        if control_flow_must_be_independent {
            let control_flow = control_flow_may_depend_on_environment(&analysis, &guarded);
            environment_values.extend(control_flow.required_values);
            if control_flow.may_depend_on_environment {
                log::trace!("{}: control flow may depend on the environment", code.context());
                return ClassInitializerSideEffect::SideEffectsThatCannotBePostponed;
            }
        }
        if analysis.any_value_may_depend_on_environment(environment_values) {
            log::trace!("{}: stores environment dependent values", code.context());
            return ClassInitializerSideEffect::SideEffectsThatCannotBePostponed;
        }
        ClassInitializerSideEffect::SideEffectsThatCanBePostponed
    }
}
