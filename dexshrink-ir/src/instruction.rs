//! The instruction set of the SSA IR.
//!
//! Instructions form a closed sum type; every analysis matches on
//! `InstructionKind` exhaustively so a new kind has to be classified
//! everywhere it matters.

use crate::ops::{BinaryOp, IfKind, InvokeKind, UnaryOp};
use crate::value::ValueId;
use dexshrink_core::{DexItemFactory, DexType, FieldRef, Literal, MethodRef};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstrId(pub u32);

impl InstrId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Argument {
        index: u32,
    },
    ConstNumber(Literal),
    ConstString(String),
    ConstClass(DexType),
    Move {
        src: ValueId,
    },
    Assume {
        src: ValueId,
    },
    CheckCast {
        src: ValueId,
        ty: DexType,
    },
    Binop {
        op: BinaryOp,
        ty: DexType,
        left: ValueId,
        right: ValueId,
    },
    Unop {
        op: UnaryOp,
        ty: DexType,
        operand: ValueId,
    },
    Cmp {
        left: ValueId,
        right: ValueId,
    },
    NewArrayEmpty {
        ty: DexType,
        size: ValueId,
    },
    NewArrayFilled {
        ty: DexType,
        elements: Vec<ValueId>,
    },
    NewArrayFilledData {
        ty: DexType,
        element_width: u32,
        data: Vec<i64>,
    },
    ArrayGet {
        array: ValueId,
        index: ValueId,
    },
    ArrayPut {
        array: ValueId,
        index: ValueId,
        value: ValueId,
    },
    ArrayLength {
        array: ValueId,
    },
    StaticGet {
        field: FieldRef,
    },
    StaticPut {
        field: FieldRef,
        value: ValueId,
    },
    InstanceGet {
        object: ValueId,
        field: FieldRef,
    },
    InstancePut {
        object: ValueId,
        field: FieldRef,
        value: ValueId,
    },
    NewInstance {
        ty: DexType,
    },
    Invoke {
        kind: InvokeKind,
        method: MethodRef,
        arguments: Vec<ValueId>,
    },
    If {
        kind: IfKind,
        left: ValueId,
        /// `None` compares `left` against zero/null.
        right: Option<ValueId>,
        true_target: BlockId,
        false_target: BlockId,
    },
    Switch {
        value: ValueId,
        keys: Vec<i32>,
        targets: Vec<BlockId>,
        fallthrough: BlockId,
    },
    Goto {
        target: BlockId,
    },
    Return {
        value: Option<ValueId>,
    },
    Throw {
        exception: ValueId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub id: InstrId,
    pub block: BlockId,
    pub out_value: Option<ValueId>,
    pub kind: InstructionKind,
}

impl Instruction {
    /// Operands in evaluation order.
    pub fn in_values(&self) -> Vec<ValueId> {
        use InstructionKind::*;
        match &self.kind {
            Argument { .. }
            | ConstNumber(_)
            | ConstString(_)
            | ConstClass(_)
            | NewArrayFilledData { .. }
            | StaticGet { .. }
            | NewInstance { .. }
            | Goto { .. } => Vec::new(),
            Move { src } | Assume { src } | CheckCast { src, .. } => vec![*src],
            Binop { left, right, .. } | Cmp { left, right } => vec![*left, *right],
            Unop { operand, .. } => vec![*operand],
            NewArrayEmpty { size, .. } => vec![*size],
            NewArrayFilled { elements, .. } => elements.clone(),
            ArrayGet { array, index } => vec![*array, *index],
            ArrayPut {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            ArrayLength { array } => vec![*array],
            StaticPut { value, .. } => vec![*value],
            InstanceGet { object, .. } => vec![*object],
            InstancePut { object, value, .. } => vec![*object, *value],
            Invoke { arguments, .. } => arguments.clone(),
            If { left, right, .. } => {
                let mut values = vec![*left];
                values.extend(right.iter().copied());
                values
            }
            Switch { value, .. } => vec![*value],
            Return { value } => value.iter().copied().collect(),
            Throw { exception } => vec![*exception],
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::If { .. }
                | InstructionKind::Switch { .. }
                | InstructionKind::Goto { .. }
                | InstructionKind::Return { .. }
                | InstructionKind::Throw { .. }
        )
    }

    /// Normal (non-exceptional) successors of a terminator.
    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            InstructionKind::If {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            InstructionKind::Switch {
                targets,
                fallthrough,
                ..
            } => {
                let mut successors = targets.clone();
                successors.push(*fallthrough);
                successors
            }
            InstructionKind::Goto { target } => vec![*target],
            _ => Vec::new(),
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::If { .. } | InstructionKind::Switch { .. }
        )
    }

    pub fn is_creating_array(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::NewArrayEmpty { .. }
                | InstructionKind::NewArrayFilled { .. }
                | InstructionKind::NewArrayFilledData { .. }
        )
    }

    /// `Move`, `Assume` and `CheckCast` produce the same object as their input.
    pub fn is_introducing_an_alias(&self) -> bool {
        self.alias_source().is_some()
    }

    pub fn alias_source(&self) -> Option<ValueId> {
        match self.kind {
            InstructionKind::Move { src }
            | InstructionKind::Assume { src }
            | InstructionKind::CheckCast { src, .. } => Some(src),
            _ => None,
        }
    }

    pub fn is_array_put(&self) -> bool {
        matches!(self.kind, InstructionKind::ArrayPut { .. })
    }

    pub fn is_static_put(&self) -> bool {
        matches!(self.kind, InstructionKind::StaticPut { .. })
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::ConstNumber(_)
                | InstructionKind::ConstString(_)
                | InstructionKind::ConstClass(_)
        )
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self.kind, InstructionKind::Invoke { .. })
    }

    /// An `invoke-direct` of an instance initializer (`<init>`).
    pub fn is_invoke_constructor(&self, factory: &DexItemFactory) -> bool {
        match &self.kind {
            InstructionKind::Invoke {
                kind: InvokeKind::Direct,
                method,
                ..
            } => factory.is_constructor(method),
            _ => false,
        }
    }

    pub fn invoked_method(&self) -> Option<&MethodRef> {
        match &self.kind {
            InstructionKind::Invoke { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        use InstructionKind::*;
        match &self.kind {
            Argument { .. } => "arg",
            ConstNumber(Literal::Long(_)) => "const-wide",
            ConstNumber(Literal::Float(_)) => "const-float",
            ConstNumber(Literal::Double(_)) => "const-double",
            ConstNumber(Literal::Null) => "const-null",
            ConstNumber(Literal::Int(_)) => "const",
            ConstString(_) => "const-string",
            ConstClass(_) => "const-class",
            Move { .. } => "move",
            Assume { .. } => "assume",
            CheckCast { .. } => "check-cast",
            Binop { op, .. } => op.name(),
            Unop { op, .. } => op.name(),
            Cmp { .. } => "cmp",
            NewArrayEmpty { .. } => "new-array",
            NewArrayFilled { .. } => "filled-new-array",
            NewArrayFilledData { .. } => "new-array-data",
            ArrayGet { .. } => "aget",
            ArrayPut { .. } => "aput",
            ArrayLength { .. } => "array-length",
            StaticGet { .. } => "sget",
            StaticPut { .. } => "sput",
            InstanceGet { .. } => "iget",
            InstancePut { .. } => "iput",
            NewInstance { .. } => "new-instance",
            Invoke { kind, .. } => kind.name(),
            If { .. } => "if",
            Switch { .. } => "switch",
            Goto { .. } => "goto",
            Return { .. } => "return",
            Throw { .. } => "throw",
        }
    }
}
