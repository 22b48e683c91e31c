use crate::code::IrCode;
use crate::instruction::{BlockId, InstructionKind};
use crate::program::AppView;
use crate::value::{ValueDefinition, ValueId};
use dexshrink_support::BitSet;

/// Structural checks on SSA code.
///
/// The analyses assume well-formed code (every block terminated, phis with
/// one input per predecessor, acyclic alias chains); this is where that is
/// enforced.
pub struct Validator<'c> {
    code: &'c IrCode,
    valid: bool,
    errors: Vec<String>,
}

impl<'c> Validator<'c> {
    pub fn new(code: &'c IrCode) -> Self {
        Self {
            code,
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn validate(mut self) -> (bool, Vec<String>) {
        self.validate_blocks();
        self.validate_instructions();
        self.validate_phis();
        if self.valid {
            // Only meaningful once operands are known to be in range.
            self.validate_alias_chains();
        }
        (self.valid, self.errors)
    }

    fn fail(&mut self, msg: String) {
        self.valid = false;
        self.errors.push(format!("{}: {}", self.code.method, msg));
    }

    fn check_block(&mut self, what: &str, target: BlockId) {
        if target.index() >= self.code.num_blocks() {
            self.fail(format!("{} targets missing {:?}", what, target));
        }
    }

    fn check_value(&mut self, what: &str, value: ValueId) {
        if value.index() >= self.code.num_values() {
            self.fail(format!("{} uses missing value {}", what, value));
        }
    }

    fn validate_blocks(&mut self) {
        let code = self.code;
        if code.num_blocks() == 0 {
            self.fail("code has no blocks".to_string());
            return;
        }
        if !code.block(code.entry_block()).predecessors.is_empty() {
            self.fail("entry block has predecessors".to_string());
        }

        let mut placed = BitSet::new_empty(code.num_instructions());
        for (id, block) in code.blocks() {
            match block.exit() {
                None => self.fail(format!("{:?} is empty", id)),
                Some(exit) if !code.instruction(exit).is_terminator() => {
                    self.fail(format!("{:?} does not end in a terminator", id))
                }
                Some(_) => {}
            }
            let body_len = block.instructions.len().saturating_sub(1);
            for &instr in &block.instructions[..body_len] {
                if code.instruction(instr).is_terminator() {
                    self.fail(format!("{:?} has a terminator before its end", id));
                }
            }
            for &instr in &block.instructions {
                if code.instruction(instr).block != id {
                    self.fail(format!("{:?} is listed in {:?} but claims another block", instr, id));
                }
                if !placed.insert(instr.index()) {
                    self.fail(format!("{:?} appears in more than one place", instr));
                }
            }
            for handler in &block.catch_handlers {
                self.check_block("catch handler", handler.target);
            }
        }
        if placed.count() != code.num_instructions() {
            self.fail("some instructions are not placed in any block".to_string());
        }
    }

    fn validate_instructions(&mut self) {
        let code = self.code;
        for instruction in code.instructions() {
            let what = format!("{:?} ({})", instruction.id, instruction.mnemonic());
            for operand in instruction.in_values() {
                self.check_value(&what, operand);
            }
            for target in instruction.successors() {
                self.check_block(&what, target);
            }
            if let Some(out) = instruction.out_value {
                if out.index() >= code.num_values()
                    || code.value(out).definition != ValueDefinition::Instruction(instruction.id)
                {
                    self.fail(format!("{} has an inconsistent out value {}", what, out));
                }
            }
            match &instruction.kind {
                InstructionKind::Argument { .. } if instruction.block != code.entry_block() => {
                    self.fail(format!("{} outside the entry block", what));
                }
                InstructionKind::Switch { keys, targets, .. } if keys.len() != targets.len() => {
                    self.fail(format!("{} has {} keys but {} targets", what, keys.len(), targets.len()));
                }
                _ => {}
            }
        }
    }

    fn validate_phis(&mut self) {
        let code = self.code;
        for (id, block) in code.blocks() {
            for &phi in &block.phis {
                if phi.index() >= code.num_values() {
                    self.fail(format!("{:?} lists missing phi {}", id, phi));
                    continue;
                }
                let ValueDefinition::Phi { block: owner, inputs } = &code.value(phi).definition else {
                    self.fail(format!("{} is listed as a phi of {:?} but is not a phi", phi, id));
                    continue;
                };
                if *owner != id {
                    self.fail(format!("phi {} is listed in {:?} but belongs to {:?}", phi, id, owner));
                }
                if inputs.len() < 2 {
                    self.fail(format!("phi {} has fewer than two inputs", phi));
                }
                if inputs.len() != block.predecessors.len() {
                    self.fail(format!(
                        "phi {} has {} inputs but {:?} has {} predecessors",
                        phi,
                        inputs.len(),
                        id,
                        block.predecessors.len()
                    ));
                }
                for &input in inputs {
                    self.check_value(&format!("phi {}", phi), input);
                }
            }
        }
    }

    fn validate_alias_chains(&mut self) {
        let code = self.code;
        for value in code.values() {
            let mut seen = BitSet::new_empty(code.num_values());
            let mut current = value.id;
            while let Some(src) = code.definition(current).and_then(|i| i.alias_source()) {
                if !seen.insert(current.index()) {
                    self.fail(format!("alias chain of {} is cyclic", value.id));
                    break;
                }
                current = src;
            }
        }
    }
}

/// Validates the code of every method in `app`.
pub fn validate_app(app: &AppView) -> (bool, Vec<String>) {
    let mut errors = Vec::new();
    for class in app.classes() {
        for method in &class.methods {
            if let Some(code) = &method.code {
                let (_, method_errors) = Validator::new(code).validate();
                errors.extend(method_errors);
            }
        }
    }
    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IrBuilder;
    use crate::error::IrError;
    use crate::ops::IfKind;
    use dexshrink_core::{DexItemFactory, DexType, MethodRef};

    fn clinit() -> MethodRef {
        DexItemFactory::shared().create_class_initializer(DexType::new("LFoo;"))
    }

    #[test]
    fn test_missing_terminator() {
        let mut builder = IrBuilder::new(clinit(), true);
        let entry = builder.add_block();
        builder.const_int(entry, 1);
        let err = builder.finish().unwrap_err();
        match err {
            IrError::Invalid { errors, .. } => {
                assert!(errors.iter().any(|e| e.contains("does not end in a terminator")));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_branch_to_missing_block() {
        let mut builder = IrBuilder::new(clinit(), true);
        let entry = builder.add_block();
        let zero = builder.const_int(entry, 0);
        builder.if_zero(entry, IfKind::Eq, zero, BlockId(5), BlockId(6));
        assert!(matches!(builder.finish(), Err(IrError::Invalid { .. })));
    }

    #[test]
    fn test_phi_input_count_must_match_predecessors() {
        let mut builder = IrBuilder::new(clinit(), true);
        let entry = builder.add_block();
        let join = builder.add_block();
        let a = builder.const_int(entry, 1);
        let b = builder.const_int(entry, 2);
        builder.goto(entry, join);
        builder.add_phi(join, vec![a, b]);
        builder.return_void(join);
        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("predecessors"));
    }

    #[test]
    fn test_terminator_in_middle() {
        let mut builder = IrBuilder::new(clinit(), true);
        let entry = builder.add_block();
        builder.return_void(entry);
        builder.return_void(entry);
        assert!(builder.finish().is_err());
    }
}
