//! Effect analysis for individual instructions.
//!
//! Effects are bitflags so that callers can ask narrow questions ("can this
//! throw?") or the broad one ("may removing or moving this be observed?").
//! Anything the analyzer does not recognize as safe gets the conservative
//! answer.

use crate::code::IrCode;
use crate::instruction::{Instruction, InstructionKind};
use crate::ops::InvokeKind;
use crate::optimization_info::OptimizationFlags;
use crate::program::{AccessFlags, AppView};
use crate::value::ValueId;
use bitflags::bitflags;
use dexshrink_core::{DexType, FieldRef, Literal, MethodRef};

bitflags! {
    /// The effects an instruction may have.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Effect: u32 {
        const NONE = 0;

        /// May throw an exception.
        const THROWS = 1 << 0;

        /// May write a static field.
        const STATIC_WRITE = 1 << 1;

        /// May write a field of an object that is not local to the method.
        const INSTANCE_WRITE = 1 << 2;

        /// May write an array that is not local to the method.
        const ARRAY_WRITE = 1 << 3;

        /// Calls a method with unknown effects.
        const CALLS = 1 << 4;

        /// May run a class initializer that has side effects.
        const CLASS_INIT = 1 << 5;

        const WRITES = Self::STATIC_WRITE.bits() | Self::INSTANCE_WRITE.bits() | Self::ARRAY_WRITE.bits();

        const SIDE_EFFECTS = Self::THROWS.bits() | Self::WRITES.bits() | Self::CALLS.bits()
            | Self::CLASS_INIT.bits();
    }
}

impl Effect {
    #[inline]
    pub fn is_pure(self) -> bool {
        self == Effect::NONE
    }

    #[inline]
    pub fn may_throw(self) -> bool {
        self.intersects(Effect::THROWS | Effect::CALLS | Effect::CLASS_INIT)
    }

    #[inline]
    pub fn writes_state(self) -> bool {
        self.intersects(Effect::WRITES)
    }

    #[inline]
    pub fn has_side_effects(self) -> bool {
        self.intersects(Effect::SIDE_EFFECTS)
    }
}

impl Default for Effect {
    fn default() -> Self {
        Effect::NONE
    }
}

/// Named relaxations of the conservative default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SideEffectAssumption {
    #[default]
    None,
    /// The classes referenced by the instruction are already initialized.
    ClassAlreadyInitialized,
    /// Writes to the fields of the receiver of an instance initializer, or of
    /// the fresh object a constructor is invoked on, are not observable.
    IgnoreReceiverFieldAssignments,
    /// The receiver of the instruction is known to be non-null.
    ReceiverNotNull,
}

/// Computes the effects of instructions of one method against a program.
pub struct EffectAnalyzer<'a> {
    app: &'a AppView,
    code: &'a IrCode,
}

impl<'a> EffectAnalyzer<'a> {
    pub fn new(app: &'a AppView, code: &'a IrCode) -> Self {
        Self { app, code }
    }

    pub fn analyze(&self, instruction: &Instruction, assumption: SideEffectAssumption) -> Effect {
        use InstructionKind::*;
        match &instruction.kind {
            Argument { .. } | ConstNumber(_) | ConstString(_) => Effect::NONE,
            Move { .. } | Assume { .. } | Unop { .. } | Cmp { .. } => Effect::NONE,
            Goto { .. } | If { .. } | Switch { .. } | Return { .. } => Effect::NONE,

            ConstClass(ty) => self.throws_unless(self.is_defined_type(*ty)),

            CheckCast { src, ty } => self.throws_unless(self.is_safe_cast(*src, *ty)),

            Binop { op, ty, right, .. } => {
                let safe_divisor = self
                    .code
                    .constant_int(*right)
                    .is_some_and(|divisor| divisor != 0);
                self.throws_unless(!op.can_throw(*ty) || safe_divisor)
            }

            NewArrayEmpty { size, .. } => self.throws_unless(
                self.code
                    .constant_int(*size)
                    .is_some_and(|size| size >= 0),
            ),

            NewArrayFilled { .. } => Effect::NONE,

            NewArrayFilledData {
                ty, element_width, ..
            } => {
                let width = ty.array_element_type().and_then(DexType::primitive_width);
                self.throws_unless(width == Some(*element_width))
            }

            ArrayLength { array } => self.throws_unless(self.fresh_array_length(*array).is_some()),

            ArrayGet { array, index } => self.throws_unless(self.is_in_bounds(*array, *index)),

            ArrayPut {
                array,
                index,
                value,
            } => {
                if self.fresh_array_length(*array).is_none() {
                    return Effect::ARRAY_WRITE | Effect::THROWS;
                }
                self.throws_unless(
                    self.is_in_bounds(*array, *index) && self.is_safe_array_store(*array, *value),
                )
            }

            StaticGet { field } => self.static_field_access(field, assumption),

            StaticPut { field, .. } => {
                Effect::STATIC_WRITE | self.static_field_access(field, assumption)
            }

            InstanceGet { object, field } => self.throws_unless(
                self.resolves_instance_field(field) && self.is_non_null(*object, assumption),
            ),

            InstancePut { object, field, .. } => {
                let mut effect = self.throws_unless(
                    self.resolves_instance_field(field) && self.is_non_null(*object, assumption),
                );
                let receiver_write = assumption == SideEffectAssumption::IgnoreReceiverFieldAssignments
                    && self.code.is_instance_initializer(self.app.factory())
                    && self.code.is_receiver(*object);
                if !receiver_write {
                    effect |= Effect::INSTANCE_WRITE;
                }
                effect
            }

            NewInstance { ty } => {
                let mut effect = self.throws_unless(self.app.is_defined_as_instantiable(*ty));
                effect |= self.class_initialization(*ty, assumption);
                if self.app.overrides_finalize(*ty) {
                    effect |= Effect::CALLS;
                }
                effect
            }

            Invoke {
                kind,
                method,
                arguments,
            } => self.invoke(*kind, method, arguments, assumption),

            Throw { .. } => Effect::THROWS,
        }
    }

    fn throws_unless(&self, safe: bool) -> Effect {
        if safe {
            Effect::NONE
        } else {
            Effect::THROWS
        }
    }

    fn is_defined_type(&self, ty: DexType) -> bool {
        let mut base = ty;
        while let Some(element) = base.array_element_type() {
            base = element;
        }
        base.is_primitive() || self.app.definition_for(base).is_some()
    }

    fn is_safe_cast(&self, src: ValueId, ty: DexType) -> bool {
        let Some(definition) = self.code.definition(self.code.aliased_value(src)) else {
            return false;
        };
        match &definition.kind {
            InstructionKind::ConstNumber(Literal::Null) => true,
            InstructionKind::NewInstance { ty: created } => self.app.is_subtype(*created, ty),
            InstructionKind::NewArrayEmpty { ty: created, .. }
            | InstructionKind::NewArrayFilled { ty: created, .. }
            | InstructionKind::NewArrayFilledData { ty: created, .. } => {
                *created == ty || ty == self.app.factory().object_type
            }
            InstructionKind::ConstString(_) => {
                ty == self.app.factory().string_type || ty == self.app.factory().object_type
            }
            _ => false,
        }
    }

    /// Length of an array created in this method, when known.
    fn fresh_array_length(&self, array: ValueId) -> Option<i64> {
        let definition = self.code.definition(self.code.aliased_value(array))?;
        match &definition.kind {
            InstructionKind::NewArrayEmpty { size, .. } => {
                self.code.constant_int(*size).filter(|&size| size >= 0)
            }
            InstructionKind::NewArrayFilled { elements, .. } => Some(elements.len() as i64),
            InstructionKind::NewArrayFilledData { data, .. } => Some(data.len() as i64),
            _ => None,
        }
    }

    fn is_in_bounds(&self, array: ValueId, index: ValueId) -> bool {
        match (self.fresh_array_length(array), self.code.constant_int(index)) {
            (Some(length), Some(index)) => 0 <= index && index < length,
            _ => false,
        }
    }

    /// Whether storing `value` into the fresh `array` cannot fail the
    /// element type check.
    fn is_safe_array_store(&self, array: ValueId, value: ValueId) -> bool {
        let Some(array_type) = self
            .code
            .definition(self.code.aliased_value(array))
            .and_then(|definition| match &definition.kind {
                InstructionKind::NewArrayEmpty { ty, .. }
                | InstructionKind::NewArrayFilled { ty, .. }
                | InstructionKind::NewArrayFilledData { ty, .. } => Some(*ty),
                _ => None,
            })
        else {
            return false;
        };
        let Some(element) = array_type.array_element_type() else {
            return false;
        };
        if element.is_primitive() || element == self.app.factory().object_type {
            return true;
        }
        match self.code.definition(self.code.aliased_value(value)).map(|i| &i.kind) {
            Some(InstructionKind::ConstNumber(Literal::Null)) => true,
            Some(InstructionKind::NewInstance { ty }) => self.app.is_subtype(*ty, element),
            Some(InstructionKind::ConstString(_)) => element == self.app.factory().string_type,
            _ => false,
        }
    }

    fn is_non_null(&self, value: ValueId, assumption: SideEffectAssumption) -> bool {
        assumption == SideEffectAssumption::ReceiverNotNull
            || self.code.is_receiver(value)
            || self.code.is_defined_by_instruction_satisfying(value, |definition| {
                matches!(
                    definition.kind,
                    InstructionKind::NewInstance { .. } | InstructionKind::ConstString(_)
                ) || definition.is_creating_array()
            })
    }

    fn resolves_instance_field(&self, field: &FieldRef) -> bool {
        self.app
            .resolve_field(field)
            .is_some_and(|resolved| !resolved.definition.is_static())
    }

    fn class_initialization(&self, ty: DexType, assumption: SideEffectAssumption) -> Effect {
        if assumption == SideEffectAssumption::ClassAlreadyInitialized {
            return Effect::NONE;
        }
        if self
            .app
            .class_initialization_may_have_side_effects(ty, Some(self.code.holder()))
        {
            Effect::CLASS_INIT
        } else {
            Effect::NONE
        }
    }

    fn static_field_access(
        &self,
        field: &FieldRef,
        assumption: SideEffectAssumption,
    ) -> Effect {
        match self.app.resolve_field(field) {
            Some(resolved) if resolved.definition.is_static() => {
                self.class_initialization(resolved.holder, assumption)
            }
            _ => Effect::THROWS,
        }
    }

    fn invoke(
        &self,
        kind: InvokeKind,
        method: &MethodRef,
        arguments: &[ValueId],
        assumption: SideEffectAssumption,
    ) -> Effect {
        let unknown = Effect::CALLS | Effect::THROWS;
        if kind.is_dynamic() {
            return unknown;
        }
        let Some(target) = self.app.resolve_method(method) else {
            return unknown;
        };
        if target
            .flags
            .intersects(AccessFlags::NATIVE | AccessFlags::SYNCHRONIZED | AccessFlags::ABSTRACT)
            || target.is_static() != (kind == InvokeKind::Static)
        {
            return unknown;
        }

        let mut effect = Effect::NONE;
        match kind {
            InvokeKind::Static => {
                effect |= self.class_initialization(target.reference.holder, assumption);
            }
            _ => match arguments.first() {
                Some(&receiver) if self.is_non_null(receiver, assumption) => {}
                _ => effect |= Effect::THROWS,
            },
        }

        let flags = target.optimization_info.flags;
        if flags.contains(OptimizationFlags::NO_SIDE_EFFECTS) {
            return effect;
        }
        let constructs_fresh_receiver = kind == InvokeKind::Direct
            && self.app.factory().is_constructor(method)
            && arguments.first().is_some_and(|&receiver| {
                self.code.is_defined_by_instruction_satisfying(receiver, |definition| {
                    matches!(definition.kind, InstructionKind::NewInstance { .. })
                })
            });
        if constructs_fresh_receiver
            && assumption == SideEffectAssumption::IgnoreReceiverFieldAssignments
            && flags.contains(OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES)
        {
            return effect;
        }
        effect | unknown
    }
}
