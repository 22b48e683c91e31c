//! Side effect facts for ordinary methods and instance initializers, the
//! inputs the class initializer classification relies on for calls and
//! allocations.

use crate::code::IrCode;
use crate::effects::SideEffectAssumption;
use crate::instruction::{Instruction, InstructionKind};
use crate::optimization_info::OptimizationFlags;
use crate::program::{AccessFlags, AppView, MethodDef, WholeProgramView};
use crate::value::ValueId;
use dexshrink_core::MethodRef;

/// True unless every instruction of `code` is free of side effects.
///
/// Synchronized methods take a lock, and constructors of classes that
/// override `finalize()` register the instance with the collector, so both
/// always count as having side effects.
pub fn method_may_have_side_effects(app: &AppView, method: &MethodDef, code: &IrCode) -> bool {
    if method.flags.contains(AccessFlags::SYNCHRONIZED) {
        return true;
    }
    if app.factory().is_constructor(&method.reference) && app.overrides_finalize(code.holder()) {
        return true;
    }
    code.instructions()
        .any(|instruction| app.instruction_may_have_side_effects(code, instruction, SideEffectAssumption::None))
}

/// What an instance initializer does besides assigning fields of its
/// receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceInitializerInfo {
    pub may_have_other_side_effects: bool,
    pub field_initialization_may_depend_on_environment: bool,
    pub receiver_may_escape: bool,
    /// The constructor of the superclass (or another constructor of the
    /// same class) this one delegates to.
    pub parent: Option<MethodRef>,
}

impl InstanceInitializerInfo {
    fn merge(&mut self, parent: &OptimizationFlags) {
        if !parent.contains(OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES) {
            self.may_have_other_side_effects = true;
            self.receiver_may_escape = true;
        }
        if !parent.contains(OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT)
        {
            self.field_initialization_may_depend_on_environment = true;
        }
    }

    fn everything(&mut self) {
        self.may_have_other_side_effects = true;
        self.field_initialization_may_depend_on_environment = true;
        self.receiver_may_escape = true;
    }

    /// The optimization flags this info licenses.
    pub fn flags(&self) -> OptimizationFlags {
        let mut flags = OptimizationFlags::empty();
        if !self.may_have_other_side_effects && !self.receiver_may_escape {
            flags |= OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES;
        }
        if !self.field_initialization_may_depend_on_environment {
            flags |= OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT;
        }
        flags
    }
}

/// Analyzes the instance initializer `code`. Returns `None` when nothing
/// can be said, e.g. when a field or the parent constructor does not
/// resolve.
pub fn analyze_instance_initializer(app: &AppView, code: &IrCode) -> Option<InstanceInitializerInfo> {
    let factory = app.factory();
    if !code.is_instance_initializer(factory) || app.overrides_finalize(code.holder()) {
        return None;
    }
    let receiver = code.instructions().find_map(|instruction| match instruction.kind {
        InstructionKind::Argument { index: 0 } => instruction.out_value,
        _ => None,
    })?;
    let could_be_receiver = |value: ValueId| {
        let value = code.aliased_value(value);
        value == receiver || (code.value(value).is_phi() && code.value(receiver).has_phi_users())
    };
    let escapes = |values: &[ValueId]| values.iter().any(|&value| could_be_receiver(value));
    let has_side_effects =
        |instruction: &Instruction| app.instruction_may_have_side_effects(code, instruction, SideEffectAssumption::None);

    let mut info = InstanceInitializerInfo::default();
    for instruction in code.instructions() {
        match &instruction.kind {
            InstructionKind::Argument { .. }
            | InstructionKind::Assume { .. }
            | InstructionKind::Move { .. }
            | InstructionKind::ConstNumber(_)
            | InstructionKind::Goto { .. }
            | InstructionKind::Return { .. } => {}

            InstructionKind::If { .. } | InstructionKind::Switch { .. } => {
                info.field_initialization_may_depend_on_environment = true;
            }

            InstructionKind::Binop { .. }
            | InstructionKind::Unop { .. }
            | InstructionKind::Cmp { .. }
            | InstructionKind::ArrayLength { .. }
            | InstructionKind::CheckCast { .. }
            | InstructionKind::ConstClass(_)
            | InstructionKind::ConstString(_)
            | InstructionKind::NewArrayEmpty { .. }
            | InstructionKind::NewArrayFilledData { .. }
            | InstructionKind::Throw { .. } => {
                if has_side_effects(instruction) {
                    info.may_have_other_side_effects = true;
                }
            }

            InstructionKind::NewArrayFilled { elements, .. } => {
                if has_side_effects(instruction) {
                    info.may_have_other_side_effects = true;
                }
                if escapes(elements.as_slice()) {
                    info.receiver_may_escape = true;
                }
            }

            InstructionKind::InstanceGet { field, .. } | InstructionKind::StaticGet { field } => {
                app.resolve_field(field)?;
                if has_side_effects(instruction) {
                    info.may_have_other_side_effects = true;
                }
            }

            InstructionKind::InstancePut { object, field, value } => {
                app.resolve_field(field)?;
                if code.aliased_value(*object) != receiver
                    || app.instruction_instance_can_throw(code, instruction, SideEffectAssumption::None)
                {
                    info.may_have_other_side_effects = true;
                }
                if !only_depends_on_arguments(code, *value) {
                    info.field_initialization_may_depend_on_environment = true;
                }
                if could_be_receiver(*value) {
                    info.receiver_may_escape = true;
                }
            }

            InstructionKind::Invoke { method, arguments, .. }
                if instruction.is_invoke_constructor(factory)
                    && arguments.first().map(|&arg| code.aliased_value(arg)) == Some(receiver) =>
            {
                if info.parent.replace(*method).is_some() {
                    return None;
                }
                if method.holder == factory.object_type && method.proto == factory.void_proto {
                    continue;
                }
                let target = app.resolve_method(method)?;
                info.merge(&target.optimization_info.flags);
                for &argument in &arguments[1..] {
                    if could_be_receiver(argument) {
                        info.receiver_may_escape = true;
                    }
                    if !only_depends_on_arguments(code, argument) {
                        info.field_initialization_may_depend_on_environment = true;
                    }
                }
            }

            InstructionKind::Invoke { arguments, .. } => {
                info.may_have_other_side_effects = true;
                if escapes(arguments.as_slice()) {
                    info.receiver_may_escape = true;
                }
            }

            InstructionKind::NewInstance { .. } => {
                if has_side_effects(instruction) {
                    info.may_have_other_side_effects = true;
                }
            }

            _ => info.everything(),
        }
    }

    // With exceptional control flow, which assignments run may depend on
    // which instructions threw.
    if info.may_have_other_side_effects && code.blocks().any(|(_, block)| block.has_catch_handlers()) {
        info.field_initialization_may_depend_on_environment = true;
    }
    Some(info)
}

/// Arguments and constants, seen through aliases.
fn only_depends_on_arguments(code: &IrCode, value: ValueId) -> bool {
    code.definition(code.aliased_value(value)).is_some_and(|definition| {
        matches!(
            definition.kind,
            InstructionKind::Argument { .. }
                | InstructionKind::ConstNumber(_)
                | InstructionKind::ConstString(_)
                | InstructionKind::ConstClass(_)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJECT: &str = "library class Ljava/lang/Object; {
           method <init>()V no-side-effects
         }
         ";

    fn app(source: &str) -> AppView {
        AppView::read_text(&format!("{OBJECT}{source}")).unwrap()
    }

    fn method<'a>(app: &'a AppView, reference: &str) -> &'a MethodDef {
        app.method_definition(&MethodRef::parse(reference).unwrap()).unwrap()
    }

    fn may_have_side_effects(app: &AppView, reference: &str) -> bool {
        let method = method(app, reference);
        method_may_have_side_effects(app, method, method.code.as_ref().unwrap())
    }

    fn initializer_info(app: &AppView, reference: &str) -> Option<InstanceInitializerInfo> {
        analyze_instance_initializer(app, method(app, reference).code.as_ref().unwrap())
    }

    #[test]
    fn test_pure_methods() {
        let app = app("class LA; {
               static field x I
               method static empty()V {
               block0:
                 return
               }
               method static sum(II)I {
               block0:
                 v0 = arg 0
                 v1 = arg 1
                 v2 = add v0 v1
                 return v2
               }
               method static write()V {
               block0:
                 v0 = const 1
                 sput LA;->x:I v0
                 return
               }
               method static synchronized locked()V {
               block0:
                 return
               }
             }");
        assert!(!may_have_side_effects(&app, "LA;->empty()V"));
        assert!(!may_have_side_effects(&app, "LA;->sum(II)I"));
        assert!(may_have_side_effects(&app, "LA;->write()V"));
        assert!(may_have_side_effects(&app, "LA;->locked()V"));
    }

    #[test]
    fn test_constructor_of_finalizable_class() {
        let app = app("class LF; {
               method <init>()V {
               block0:
                 v0 = arg 0
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 return
               }
               method finalize()V {
               block0:
                 return
               }
             }");
        assert!(may_have_side_effects(&app, "LF;-><init>()V"));
        assert_eq!(initializer_info(&app, "LF;-><init>()V"), None);
    }

    #[test]
    fn test_receiver_field_writes_from_arguments() {
        let app = app("class LP; {
               field v I
               field w I
               method <init>(I)V {
               block0:
                 v0 = arg 0
                 v1 = arg 1
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 iput v0 LP;->v:I v1
                 v2 = const 7
                 iput v0 LP;->w:I v2
                 return
               }
             }");
        let info = initializer_info(&app, "LP;-><init>(I)V").unwrap();
        assert_eq!(info.parent, MethodRef::parse("Ljava/lang/Object;-><init>()V"));
        assert_eq!(
            info.flags(),
            OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES
                | OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT
        );
        assert!(may_have_side_effects(&app, "LP;-><init>(I)V"));
    }

    #[test]
    fn test_environment_and_escape() {
        let app = app("class LEnv; {
               static field flag I
               static field last LQ;
             }
             class LQ; {
               field v I
               method <init>()V {
               block0:
                 v0 = arg 0
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 v1 = sget LEnv;->flag:I
                 iput v0 LQ;->v:I v1
                 return
               }
               method <init>(I)V {
               block0:
                 v0 = arg 0
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 sput LEnv;->last:LQ; v0
                 return
               }
               method <init>(J)V {
               block0:
                 v0 = arg 0
                 v1 = arg 1
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 if-eqz v1 block1 block2
               block1:
                 v2 = const 1
                 iput v0 LQ;->v:I v2
                 goto block2
               block2:
                 return
               }
             }");
        let reads_environment = initializer_info(&app, "LQ;-><init>()V").unwrap();
        assert_eq!(
            reads_environment.flags(),
            OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES
        );

        let publishes_receiver = initializer_info(&app, "LQ;-><init>(I)V").unwrap();
        assert!(publishes_receiver.may_have_other_side_effects);
        assert!(publishes_receiver.receiver_may_escape);
        assert!(publishes_receiver.flags().is_empty());

        let branches = initializer_info(&app, "LQ;-><init>(J)V").unwrap();
        assert!(branches.field_initialization_may_depend_on_environment);
        assert!(!branches.may_have_other_side_effects);
    }

    #[test]
    fn test_parent_constructor_flags_are_merged() {
        let app = app("class LBase; {
               field v I
               method <init>(I)V pure-constructor, environment-independent-fields
               method <init>()V
             }
             class LSub; extends LBase; {
               method <init>()V {
               block0:
                 v0 = arg 0
                 v1 = const 3
                 invoke-direct LBase;-><init>(I)V v0 v1
                 return
               }
               method <init>(Z)V {
               block0:
                 v0 = arg 0
                 invoke-direct LBase;-><init>()V v0
                 return
               }
             }");
        let info = initializer_info(&app, "LSub;-><init>()V").unwrap();
        assert_eq!(info.parent, MethodRef::parse("LBase;-><init>(I)V"));
        assert_eq!(
            info.flags(),
            OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES
                | OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT
        );
        assert!(initializer_info(&app, "LSub;-><init>(Z)V").unwrap().flags().is_empty());
    }

    #[test]
    fn test_unresolved_parent_constructor_gives_nothing() {
        let app = app("class LBase; {
             }
             class LOrphan; extends LBase; {
               method <init>()V {
               block0:
                 v0 = arg 0
                 v1 = const 1
                 invoke-direct LBase;-><init>(I)V v0 v1
                 return
               }
             }");
        assert_eq!(initializer_info(&app, "LOrphan;-><init>()V"), None);
    }

    #[test]
    fn test_object_constructor_needs_no_definition() {
        let app = AppView::read_text(
            "class LP; {
               field v I
               method <init>(I)V {
               block0:
                 v0 = arg 0
                 v1 = arg 1
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 iput v0 LP;->v:I v1
                 return
               }
             }",
        )
        .unwrap();
        let info = initializer_info(&app, "LP;-><init>(I)V").unwrap();
        assert!(!info.may_have_other_side_effects);
        assert!(!info.field_initialization_may_depend_on_environment);
    }

    #[test]
    fn test_two_parent_calls_give_nothing() {
        let app = app("class LT; {
               method <init>()V {
               block0:
                 v0 = arg 0
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 invoke-direct Ljava/lang/Object;-><init>()V v0
                 return
               }
             }");
        assert_eq!(initializer_info(&app, "LT;-><init>()V"), None);
    }
}
