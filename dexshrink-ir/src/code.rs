//! SSA code of a single method.

use crate::instruction::{BlockId, InstrId, Instruction, InstructionKind};
use crate::value::{Value, ValueId};
use dexshrink_core::{DexItemFactory, DexType, Literal, MethodRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchHandler {
    pub guard: DexType,
    pub target: BlockId,
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub phis: Vec<ValueId>,
    pub instructions: Vec<InstrId>,
    /// One entry per incoming edge, so a block may appear twice.
    pub predecessors: Vec<BlockId>,
    pub catch_handlers: Vec<CatchHandler>,
}

impl BasicBlock {
    pub fn exit(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }

    pub fn has_catch_handlers(&self) -> bool {
        !self.catch_handlers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IrCode {
    pub method: MethodRef,
    pub is_static: bool,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) values: Vec<Value>,
}

impl IrCode {
    /// The method this code belongs to.
    pub fn context(&self) -> &MethodRef {
        &self.method
    }

    pub fn holder(&self) -> DexType {
        self.method.holder
    }

    pub fn is_class_initializer(&self, factory: &DexItemFactory) -> bool {
        self.is_static && factory.is_class_constructor(&self.method)
    }

    pub fn is_instance_initializer(&self, factory: &DexItemFactory) -> bool {
        !self.is_static && factory.is_constructor(&self.method)
    }

    pub fn entry_block(&self) -> BlockId {
        BlockId(0)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockId(i as u32), block))
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.index()]
    }

    pub fn num_instructions(&self) -> usize {
        self.instructions.len()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.iter()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// All instructions in program order: blocks in layout order, then
    /// instructions in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.blocks
            .iter()
            .flat_map(move |block| block.instructions.iter().map(move |&id| self.instruction(id)))
    }

    /// Successors of `block`, normal edges first, then exceptional edges.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let bb = self.block(block);
        let mut successors = bb
            .exit()
            .map(|exit| self.instruction(exit).successors())
            .unwrap_or_default();
        successors.extend(bb.catch_handlers.iter().map(|handler| handler.target));
        successors
    }

    pub fn definition(&self, value: ValueId) -> Option<&Instruction> {
        self.value(value)
            .defining_instruction()
            .map(|id| self.instruction(id))
    }

    /// Follows `Move`/`Assume`/`CheckCast` chains back to the value that
    /// actually carries the object. Stops at phis.
    pub fn aliased_value(&self, value: ValueId) -> ValueId {
        let mut current = value;
        // The validator rejects alias cycles; the bound keeps malformed code from hanging.
        for _ in 0..=self.values.len() {
            match self.definition(current).and_then(Instruction::alias_source) {
                Some(src) => current = src,
                None => return current,
            }
        }
        current
    }

    /// True if the aliased value is defined by an instruction matching `predicate`.
    pub fn is_defined_by_instruction_satisfying<F>(&self, value: ValueId, predicate: F) -> bool
    where
        F: FnOnce(&Instruction) -> bool,
    {
        self.definition(self.aliased_value(value))
            .is_some_and(predicate)
    }

    pub fn constant_literal(&self, value: ValueId) -> Option<Literal> {
        match self.definition(self.aliased_value(value))?.kind {
            InstructionKind::ConstNumber(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn constant_int(&self, value: ValueId) -> Option<i64> {
        self.constant_literal(value).and_then(|literal| literal.as_i64())
    }

    /// The receiver (`this`) argument, for instance methods.
    pub fn is_receiver(&self, value: ValueId) -> bool {
        !self.is_static
            && matches!(
                self.definition(self.aliased_value(value)).map(|i| &i.kind),
                Some(InstructionKind::Argument { index: 0 })
            )
    }
}
