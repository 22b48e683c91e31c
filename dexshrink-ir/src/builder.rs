//! Incremental construction of `IrCode`.

use crate::code::{BasicBlock, CatchHandler, IrCode};
use crate::error::IrError;
use crate::instruction::{BlockId, InstrId, Instruction, InstructionKind};
use crate::ops::{IfKind, InvokeKind};
use crate::validation::Validator;
use crate::value::{Value, ValueDefinition, ValueId};
use dexshrink_core::{DexType, FieldRef, Literal, MethodRef};

pub struct IrBuilder {
    method: MethodRef,
    is_static: bool,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    definitions: Vec<Option<ValueDefinition>>,
}

impl IrBuilder {
    pub fn new(method: MethodRef, is_static: bool) -> Self {
        Self {
            method,
            is_static,
            blocks: Vec::new(),
            instructions: Vec::new(),
            definitions: Vec::new(),
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock::default());
        BlockId(self.blocks.len() as u32 - 1)
    }

    pub fn add_catch_handler(&mut self, block: BlockId, guard: DexType, target: BlockId) {
        self.blocks[block.index()]
            .catch_handlers
            .push(CatchHandler { guard, target });
    }

    /// Allocates a value id whose definition is supplied later, which is how
    /// phis can refer to values defined further down a loop.
    pub fn reserve_value(&mut self) -> ValueId {
        self.definitions.push(None);
        ValueId(self.definitions.len() as u32 - 1)
    }

    pub fn append(&mut self, block: BlockId, kind: InstructionKind) -> InstrId {
        self.push_instruction(block, kind, None)
    }

    pub fn append_value(&mut self, block: BlockId, kind: InstructionKind) -> ValueId {
        let value = self.reserve_value();
        let id = self.push_instruction(block, kind, Some(value));
        self.definitions[value.index()] = Some(ValueDefinition::Instruction(id));
        value
    }

    /// Appends an instruction defining a previously reserved value.
    pub fn append_with_out(
        &mut self,
        block: BlockId,
        kind: InstructionKind,
        out: ValueId,
    ) -> Result<InstrId, IrError> {
        self.check_undefined(out)?;
        let id = self.push_instruction(block, kind, Some(out));
        self.definitions[out.index()] = Some(ValueDefinition::Instruction(id));
        Ok(id)
    }

    pub fn add_phi(&mut self, block: BlockId, inputs: Vec<ValueId>) -> ValueId {
        let value = self.reserve_value();
        self.definitions[value.index()] = Some(ValueDefinition::Phi { block, inputs });
        self.blocks[block.index()].phis.push(value);
        value
    }

    pub fn define_phi(
        &mut self,
        value: ValueId,
        block: BlockId,
        inputs: Vec<ValueId>,
    ) -> Result<(), IrError> {
        self.check_undefined(value)?;
        self.definitions[value.index()] = Some(ValueDefinition::Phi { block, inputs });
        self.blocks[block.index()].phis.push(value);
        Ok(())
    }

    fn check_undefined(&self, value: ValueId) -> Result<(), IrError> {
        match self.definitions.get(value.index()) {
            Some(None) => Ok(()),
            Some(Some(_)) => Err(IrError::RedefinedValue(value)),
            None => Err(IrError::UndefinedValue(value)),
        }
    }

    fn push_instruction(
        &mut self,
        block: BlockId,
        kind: InstructionKind,
        out_value: Option<ValueId>,
    ) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        self.instructions.push(Instruction {
            id,
            block,
            out_value,
            kind,
        });
        self.blocks[block.index()].instructions.push(id);
        id
    }

    // Shorthands used by tests and by code synthesized in passes.

    pub fn argument(&mut self, block: BlockId, index: u32) -> ValueId {
        self.append_value(block, InstructionKind::Argument { index })
    }

    pub fn const_int(&mut self, block: BlockId, value: i32) -> ValueId {
        self.append_value(block, InstructionKind::ConstNumber(Literal::Int(value)))
    }

    pub fn const_null(&mut self, block: BlockId) -> ValueId {
        self.append_value(block, InstructionKind::ConstNumber(Literal::Null))
    }

    pub fn const_string(&mut self, block: BlockId, value: &str) -> ValueId {
        self.append_value(block, InstructionKind::ConstString(value.to_string()))
    }

    pub fn static_get(&mut self, block: BlockId, field: FieldRef) -> ValueId {
        self.append_value(block, InstructionKind::StaticGet { field })
    }

    pub fn static_put(&mut self, block: BlockId, field: FieldRef, value: ValueId) -> InstrId {
        self.append(block, InstructionKind::StaticPut { field, value })
    }

    pub fn new_array_empty(&mut self, block: BlockId, ty: DexType, size: ValueId) -> ValueId {
        self.append_value(block, InstructionKind::NewArrayEmpty { ty, size })
    }

    pub fn array_put(
        &mut self,
        block: BlockId,
        array: ValueId,
        index: ValueId,
        value: ValueId,
    ) -> InstrId {
        self.append(
            block,
            InstructionKind::ArrayPut {
                array,
                index,
                value,
            },
        )
    }

    pub fn new_instance(&mut self, block: BlockId, ty: DexType) -> ValueId {
        self.append_value(block, InstructionKind::NewInstance { ty })
    }

    pub fn invoke(
        &mut self,
        block: BlockId,
        kind: InvokeKind,
        method: MethodRef,
        arguments: Vec<ValueId>,
    ) -> InstrId {
        self.append(
            block,
            InstructionKind::Invoke {
                kind,
                method,
                arguments,
            },
        )
    }

    pub fn invoke_value(
        &mut self,
        block: BlockId,
        kind: InvokeKind,
        method: MethodRef,
        arguments: Vec<ValueId>,
    ) -> ValueId {
        self.append_value(
            block,
            InstructionKind::Invoke {
                kind,
                method,
                arguments,
            },
        )
    }

    pub fn if_zero(
        &mut self,
        block: BlockId,
        kind: IfKind,
        value: ValueId,
        true_target: BlockId,
        false_target: BlockId,
    ) -> InstrId {
        self.append(
            block,
            InstructionKind::If {
                kind,
                left: value,
                right: None,
                true_target,
                false_target,
            },
        )
    }

    pub fn goto(&mut self, block: BlockId, target: BlockId) -> InstrId {
        self.append(block, InstructionKind::Goto { target })
    }

    pub fn return_void(&mut self, block: BlockId) -> InstrId {
        self.append(block, InstructionKind::Return { value: None })
    }

    /// Computes use lists and predecessors, then validates the result.
    pub fn finish(self) -> Result<IrCode, IrError> {
        let mut values = Vec::with_capacity(self.definitions.len());
        for (i, definition) in self.definitions.into_iter().enumerate() {
            let id = ValueId(i as u32);
            let definition = definition.ok_or(IrError::UndefinedValue(id))?;
            values.push(Value {
                id,
                definition,
                users: Vec::new(),
                phi_users: Vec::new(),
            });
        }

        // Out-of-range ids are left for the validator to report.
        for instruction in &self.instructions {
            for operand in instruction.in_values() {
                if let Some(value) = values.get_mut(operand.index()) {
                    if !value.users.contains(&instruction.id) {
                        value.users.push(instruction.id);
                    }
                }
            }
        }
        for phi in 0..values.len() {
            let inputs = values[phi].phi_inputs().map(<[ValueId]>::to_vec).unwrap_or_default();
            let phi_id = ValueId(phi as u32);
            for input in inputs {
                if let Some(value) = values.get_mut(input.index()) {
                    if !value.phi_users.contains(&phi_id) {
                        value.phi_users.push(phi_id);
                    }
                }
            }
        }

        let mut code = IrCode {
            method: self.method,
            is_static: self.is_static,
            blocks: self.blocks,
            instructions: self.instructions,
            values,
        };

        let num_blocks = code.blocks.len();
        for block in 0..num_blocks {
            for successor in code.successors(BlockId(block as u32)) {
                if successor.index() < num_blocks {
                    code.blocks[successor.index()]
                        .predecessors
                        .push(BlockId(block as u32));
                }
            }
        }

        let (valid, errors) = Validator::new(&code).validate();
        if !valid {
            return Err(IrError::Invalid {
                method: code.method,
                errors,
            });
        }
        Ok(code)
    }
}
