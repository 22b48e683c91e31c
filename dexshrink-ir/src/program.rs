//! The whole-program view: class hierarchy, member definitions and the
//! optimization info attached to methods.

use crate::code::IrCode;
use crate::effects::{EffectAnalyzer, SideEffectAssumption};
use crate::instruction::Instruction;
use crate::optimization_info::MethodOptimizationInfo;
use bitflags::bitflags;
use dexshrink_core::{DexItemFactory, DexType, FieldRef, MethodRef};
use dexshrink_support::{FastHashMap, FastHashSet};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const STATIC = 1 << 3;
        const FINAL = 1 << 4;
        const SYNCHRONIZED = 1 << 5;
        const NATIVE = 1 << 8;
        const INTERFACE = 1 << 9;
        const ABSTRACT = 1 << 10;
    }
}

impl Default for AccessFlags {
    fn default() -> Self {
        AccessFlags::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassOrigin {
    #[default]
    Program,
    /// Provided by the platform; its code is not available.
    Library,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub reference: FieldRef,
    pub flags: AccessFlags,
}

impl FieldDef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub reference: MethodRef,
    pub flags: AccessFlags,
    pub code: Option<IrCode>,
    pub optimization_info: MethodOptimizationInfo,
}

impl MethodDef {
    pub fn new(reference: MethodRef, flags: AccessFlags) -> Self {
        Self {
            reference,
            flags,
            code: None,
            optimization_info: MethodOptimizationInfo::default(),
        }
    }

    pub fn with_code(mut self, code: IrCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub ty: DexType,
    pub super_type: Option<DexType>,
    pub interfaces: Vec<DexType>,
    pub origin: ClassOrigin,
    pub flags: AccessFlags,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// A program class extending `java.lang.Object`.
    pub fn new(ty: DexType) -> Self {
        Self {
            ty,
            super_type: (ty != DexType::OBJECT).then_some(DexType::OBJECT),
            interfaces: Vec::new(),
            origin: ClassOrigin::Program,
            flags: AccessFlags::PUBLIC,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn is_library(&self) -> bool {
        self.origin == ClassOrigin::Library
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(AccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.intersects(AccessFlags::ABSTRACT | AccessFlags::INTERFACE)
    }

    pub fn lookup_field(&self, field: &FieldRef) -> Option<&FieldDef> {
        self.fields.iter().find(|def| {
            def.reference.name == field.name && def.reference.ty == field.ty
        })
    }

    pub fn lookup_method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|def| def.reference.matches_signature(method))
    }

    pub fn class_initializer(&self, factory: &DexItemFactory) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|def| def.is_static() && factory.is_class_constructor(&def.reference))
    }

    /// Whether the first trigger of this class's initializer must stay where it is.
    pub fn has_class_initializer_that_cannot_be_postponed(&self, factory: &DexItemFactory) -> bool {
        if self.is_library() {
            return self.ty != factory.object_type;
        }
        match self.class_initializer(factory) {
            Some(clinit) if clinit.code.is_some() => {
                !clinit.optimization_info.class_initializer_may_be_postponed()
            }
            _ => false,
        }
    }

    /// Whether running this class's own initializer (ignoring supertypes)
    /// may have observable effects.
    pub fn has_class_initializer_with_side_effects(&self, factory: &DexItemFactory) -> bool {
        if self.is_library() {
            return self.ty != factory.object_type;
        }
        match self.class_initializer(factory) {
            Some(clinit) if clinit.code.is_some() => {
                clinit.optimization_info.may_have_side_effects()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedField {
    pub holder: DexType,
    pub definition: FieldDef,
}

/// The read-only queries the class initializer analysis needs from the
/// surrounding program.
pub trait WholeProgramView {
    fn dex_item_factory(&self) -> &DexItemFactory;

    /// `None` when the field cannot be found.
    fn resolve_field(&self, field: &FieldRef) -> Option<ResolvedField>;

    /// Conservative (empty) info for unknown methods.
    fn method_optimization_info(&self, method: &MethodRef) -> MethodOptimizationInfo;

    fn instruction_may_have_side_effects(
        &self,
        code: &IrCode,
        instruction: &Instruction,
        assumption: SideEffectAssumption,
    ) -> bool;

    fn instruction_instance_can_throw(
        &self,
        code: &IrCode,
        instruction: &Instruction,
        assumption: SideEffectAssumption,
    ) -> bool;
}

/// All classes of an application, program and library.
#[derive(Debug, Clone, Default)]
pub struct AppView {
    factory: DexItemFactory,
    classes: Vec<ClassDef>,
    index: FastHashMap<DexType, usize>,
}

impl AppView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `class`, replacing any previous definition of the same type.
    pub fn add_class(&mut self, class: ClassDef) {
        match self.index.get(&class.ty) {
            Some(&slot) => self.classes[slot] = class,
            None => {
                self.index.insert(class.ty, self.classes.len());
                self.classes.push(class);
            }
        }
    }

    pub fn factory(&self) -> &DexItemFactory {
        &self.factory
    }

    /// Classes in insertion order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> + '_ {
        self.classes.iter()
    }

    pub fn program_classes(&self) -> impl Iterator<Item = &ClassDef> + '_ {
        self.classes.iter().filter(|class| !class.is_library())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn definition_for(&self, ty: DexType) -> Option<&ClassDef> {
        self.index.get(&ty).map(|&slot| &self.classes[slot])
    }

    pub fn definition_for_mut(&mut self, ty: DexType) -> Option<&mut ClassDef> {
        match self.index.get(&ty) {
            Some(&slot) => Some(&mut self.classes[slot]),
            None => None,
        }
    }

    /// The method declared exactly as `method` (no hierarchy lookup).
    pub fn method_definition(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.definition_for(method.holder)?.lookup_method(method)
    }

    pub fn method_definition_mut(&mut self, method: &MethodRef) -> Option<&mut MethodDef> {
        self.definition_for_mut(method.holder)?
            .methods
            .iter_mut()
            .find(|def| def.reference.matches_signature(method))
    }

    /// `ty` followed by its transitive supertypes, superclasses before
    /// interfaces, each visited once.
    fn hierarchy(&self, ty: DexType) -> Vec<DexType> {
        let mut order = Vec::new();
        let mut seen = FastHashSet::default();
        let mut current = Some(ty);
        while let Some(class_ty) = current {
            if !seen.insert(class_ty) {
                break;
            }
            order.push(class_ty);
            current = self.definition_for(class_ty).and_then(|class| class.super_type);
        }
        let mut pending: Vec<DexType> = order
            .iter()
            .filter_map(|&ty| self.definition_for(ty))
            .flat_map(|class| class.interfaces.iter().copied())
            .collect();
        pending.reverse();
        while let Some(interface) = pending.pop() {
            if !seen.insert(interface) {
                continue;
            }
            order.push(interface);
            if let Some(class) = self.definition_for(interface) {
                pending.extend(class.interfaces.iter().rev().copied());
            }
        }
        order
    }

    /// Field resolution: the holder, then its superclasses, then interfaces.
    pub fn resolve_field(&self, field: &FieldRef) -> Option<ResolvedField> {
        self.hierarchy(field.holder).into_iter().find_map(|ty| {
            let class = self.definition_for(ty)?;
            class.lookup_field(field).map(|definition| ResolvedField {
                holder: ty,
                definition: *definition,
            })
        })
    }

    /// Method resolution: the holder, then its superclasses, then interfaces.
    pub fn resolve_method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.hierarchy(method.holder)
            .into_iter()
            .find_map(|ty| self.definition_for(ty)?.lookup_method(method))
    }

    pub fn is_subtype(&self, sub: DexType, sup: DexType) -> bool {
        if sub == sup || (sup == self.factory.object_type && sub.is_reference()) {
            return true;
        }
        if sub.is_array() || sup.is_array() {
            return false;
        }
        self.hierarchy(sub).contains(&sup)
    }

    /// Whether triggering initialization of `ty` from code in `context` may
    /// run an initializer with side effects. The context class and its
    /// supertypes are already initialized.
    pub fn class_initialization_may_have_side_effects(
        &self,
        ty: DexType,
        context: Option<DexType>,
    ) -> bool {
        if !ty.is_class() {
            return false;
        }
        if let Some(context) = context {
            if self.is_subtype(context, ty) {
                return false;
            }
        }
        self.hierarchy(ty).into_iter().any(|class_ty| {
            match self.definition_for(class_ty) {
                Some(class) => class.has_class_initializer_with_side_effects(&self.factory),
                None => class_ty != self.factory.object_type,
            }
        })
    }

    /// True if `ty` or a superclass other than `java.lang.Object` declares `finalize()`.
    pub fn overrides_finalize(&self, ty: DexType) -> bool {
        let mut seen = FastHashSet::default();
        let mut current = Some(ty);
        while let Some(class_ty) = current {
            if class_ty == self.factory.object_type || !seen.insert(class_ty) {
                return false;
            }
            let Some(class) = self.definition_for(class_ty) else {
                return true;
            };
            if class
                .methods
                .iter()
                .any(|method| !method.is_static() && self.factory.is_finalize(&method.reference))
            {
                return true;
            }
            current = class.super_type;
        }
        false
    }

    pub fn is_defined_as_instantiable(&self, ty: DexType) -> bool {
        self.definition_for(ty)
            .is_some_and(|class| !class.is_abstract())
    }
}

impl WholeProgramView for AppView {
    fn dex_item_factory(&self) -> &DexItemFactory {
        &self.factory
    }

    fn resolve_field(&self, field: &FieldRef) -> Option<ResolvedField> {
        AppView::resolve_field(self, field)
    }

    fn method_optimization_info(&self, method: &MethodRef) -> MethodOptimizationInfo {
        self.resolve_method(method)
            .map(|definition| definition.optimization_info)
            .unwrap_or_default()
    }

    fn instruction_may_have_side_effects(
        &self,
        code: &IrCode,
        instruction: &Instruction,
        assumption: SideEffectAssumption,
    ) -> bool {
        EffectAnalyzer::new(self, code)
            .analyze(instruction, assumption)
            .has_side_effects()
    }

    fn instruction_instance_can_throw(
        &self,
        code: &IrCode,
        instruction: &Instruction,
        assumption: SideEffectAssumption,
    ) -> bool {
        EffectAnalyzer::new(self, code)
            .analyze(instruction, assumption)
            .may_throw()
    }
}
