use crate::instruction::{BlockId, InstrId};
use std::fmt;

/// Dense index of an SSA value within one method's code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueDefinition {
    Instruction(InstrId),
    /// One input per predecessor edge of `block`, in predecessor order.
    Phi { block: BlockId, inputs: Vec<ValueId> },
}

#[derive(Debug, Clone)]
pub struct Value {
    pub id: ValueId,
    pub definition: ValueDefinition,
    /// Instructions using this value, without duplicates.
    pub users: Vec<InstrId>,
    /// Phis using this value, without duplicates.
    pub phi_users: Vec<ValueId>,
}

impl Value {
    pub fn is_phi(&self) -> bool {
        matches!(self.definition, ValueDefinition::Phi { .. })
    }

    pub fn phi_inputs(&self) -> Option<&[ValueId]> {
        match &self.definition {
            ValueDefinition::Phi { inputs, .. } => Some(inputs),
            ValueDefinition::Instruction(_) => None,
        }
    }

    pub fn defining_instruction(&self) -> Option<InstrId> {
        match self.definition {
            ValueDefinition::Instruction(id) => Some(id),
            ValueDefinition::Phi { .. } => None,
        }
    }

    pub fn has_phi_users(&self) -> bool {
        !self.phi_users.is_empty()
    }
}
