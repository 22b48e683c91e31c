//! Whether values computed by a method may differ between runs of the
//! program, i.e. depend on anything besides constants.

use crate::code::IrCode;
use crate::instruction::{InstrId, InstructionKind};
use crate::program::WholeProgramView;
use crate::value::ValueId;
use dexshrink_support::BitSet;

enum Dependence {
    Independent,
    /// Independent if all of these are.
    DependsOn(Vec<ValueId>),
    MayDepend,
}

/// Answers environment-dependence queries for values of one method.
///
/// Sound in the conservative direction: a value reported independent is
/// computed only from constants along every execution.
pub struct ValueMayDependOnEnvironmentAnalysis<'a, V: WholeProgramView + ?Sized> {
    view: &'a V,
    code: &'a IrCode,
}

impl<'a, V: WholeProgramView + ?Sized> ValueMayDependOnEnvironmentAnalysis<'a, V> {
    pub fn new(view: &'a V, code: &'a IrCode) -> Self {
        Self { view, code }
    }

    pub fn code(&self) -> &'a IrCode {
        self.code
    }

    pub fn value_may_depend_on_environment(&self, value: ValueId) -> bool {
        self.any_value_may_depend_on_environment([value])
    }

    pub fn any_value_may_depend_on_environment<I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = ValueId>,
    {
        let mut seen = BitSet::new_empty(self.code.num_values());
        let mut worklist = Vec::new();
        let mut enqueue = |value: ValueId, worklist: &mut Vec<ValueId>| {
            let root = self.code.aliased_value(value);
            if seen.insert(root.index()) {
                worklist.push(root);
            }
        };

        for value in values {
            enqueue(value, &mut worklist);
        }
        while let Some(value) = worklist.pop() {
            match self.classify(value) {
                Dependence::Independent => {}
                Dependence::DependsOn(operands) => {
                    for operand in operands {
                        enqueue(operand, &mut worklist);
                    }
                }
                Dependence::MayDepend => {
                    log::trace!(
                        "{}: {:?} may depend on the environment",
                        self.code.context(),
                        value
                    );
                    return true;
                }
            }
        }
        false
    }

    fn classify(&self, value: ValueId) -> Dependence {
        if let Some(inputs) = self.code.value(value).phi_inputs() {
            return Dependence::DependsOn(inputs.to_vec());
        }
        let Some(definition) = self.code.definition(value) else {
            return Dependence::MayDepend;
        };
        use InstructionKind::*;
        match &definition.kind {
            ConstNumber(_) | ConstString(_) | ConstClass(_) => Dependence::Independent,
            Move { src } | Assume { src } | CheckCast { src, .. } => {
                Dependence::DependsOn(vec![*src])
            }
            Binop { left, right, .. } | Cmp { left, right } => {
                Dependence::DependsOn(vec![*left, *right])
            }
            Unop { operand, .. } => Dependence::DependsOn(vec![*operand]),
            ArrayLength { array } => Dependence::DependsOn(vec![*array]),
            ArrayGet { array, index } => Dependence::DependsOn(vec![*array, *index]),
            NewArrayEmpty { size, .. } => self.fresh_array(value, vec![*size]),
            NewArrayFilled { elements, .. } => self.fresh_array(value, elements.clone()),
            NewArrayFilledData { .. } => self.fresh_array(value, Vec::new()),
            NewInstance { .. } => self.fresh_instance(value),
            _ => Dependence::MayDepend,
        }
    }

    /// Users of `root` and of every alias of it, or `None` when some alias
    /// flows into a phi.
    fn users_through_aliases(&self, root: ValueId) -> Option<Vec<InstrId>> {
        let mut users = Vec::new();
        let mut pending = vec![root];
        while let Some(value) = pending.pop() {
            let value = self.code.value(value);
            if value.has_phi_users() {
                return None;
            }
            for &user in &value.users {
                let instruction = self.code.instruction(user);
                match (instruction.alias_source(), instruction.out_value) {
                    (Some(_), Some(alias)) => pending.push(alias),
                    _ => users.push(user),
                }
            }
        }
        Some(users)
    }

    /// A fresh array is independent when its contents come only from the
    /// values it is created and filled with, so every user must be a local
    /// read, a store into it, or a publication into a static field.
    fn fresh_array(&self, root: ValueId, mut operands: Vec<ValueId>) -> Dependence {
        let Some(users) = self.users_through_aliases(root) else {
            return Dependence::MayDepend;
        };
        for user in users {
            match &self.code.instruction(user).kind {
                InstructionKind::ArrayPut {
                    array,
                    index,
                    value,
                } if self.code.aliased_value(*array) == root
                    && self.code.aliased_value(*value) != root =>
                {
                    operands.push(*index);
                    operands.push(*value);
                }
                InstructionKind::ArrayGet { array, .. } | InstructionKind::ArrayLength { array }
                    if self.code.aliased_value(*array) == root => {}
                InstructionKind::StaticPut { .. } => {}
                _ => return Dependence::MayDepend,
            }
        }
        Dependence::DependsOn(operands)
    }

    /// A fresh instance is independent when it is initialized exactly once
    /// by a constructor whose field values only depend on its arguments,
    /// and is otherwise only published into static fields.
    fn fresh_instance(&self, root: ValueId) -> Dependence {
        let Some(users) = self.users_through_aliases(root) else {
            return Dependence::MayDepend;
        };
        let factory = self.view.dex_item_factory();
        let mut operands = None;
        for user in users {
            let instruction = self.code.instruction(user);
            match &instruction.kind {
                InstructionKind::StaticPut { .. } => {}
                InstructionKind::Invoke {
                    method, arguments, ..
                } if instruction.is_invoke_constructor(factory)
                    && arguments.first().map(|&receiver| self.code.aliased_value(receiver))
                        == Some(root) =>
                {
                    let independent_fields = !self
                        .view
                        .method_optimization_info(method)
                        .instance_field_initialization_may_depend_on_environment();
                    let other_uses = arguments[1..]
                        .iter()
                        .any(|&argument| self.code.aliased_value(argument) == root);
                    if operands.is_some() || !independent_fields || other_uses {
                        return Dependence::MayDepend;
                    }
                    operands = Some(arguments[1..].to_vec());
                }
                _ => return Dependence::MayDepend,
            }
        }
        match operands {
            Some(operands) => Dependence::DependsOn(operands),
            None => Dependence::MayDepend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::AppView;
    use dexshrink_core::{DexType, MethodRef};

    fn analyze<F>(source: &str, check: F)
    where
        F: FnOnce(&ValueMayDependOnEnvironmentAnalysis<'_, AppView>, &IrCode),
    {
        let app = AppView::read_text(source).unwrap();
        let clinit = app.factory().create_class_initializer(DexType::new("LA;"));
        let code = app.method_definition(&clinit).unwrap().code.as_ref().unwrap();
        let analysis = ValueMayDependOnEnvironmentAnalysis::new(&app, code);
        check(&analysis, code);
    }

    /// The value stored by the last `sput` of the method.
    fn stored_value(code: &IrCode) -> ValueId {
        code.instructions()
            .filter_map(|instruction| match instruction.kind {
                InstructionKind::StaticPut { value, .. } => Some(value),
                _ => None,
            })
            .last()
            .unwrap()
    }

    #[test]
    fn test_constants_are_independent() {
        analyze(
            "class LA; {
               static field x I
               method static <clinit>()V {
               block0:
                 v0 = const 2
                 v1 = const 3
                 v2 = mul v0 v1
                 v3 = neg v2
                 v4 = move v3
                 sput LA;->x:I v4
                 return
               }
             }",
            |analysis, code| {
                assert!(!analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_invoke_result_depends_on_environment() {
        analyze(
            "class LA; {
               static field x J
               method static <clinit>()V {
               block0:
                 v0 = invoke-static Ljava/lang/System;->currentTimeMillis()J
                 v1 = const-wide 1
                 v2 = add-long v0 v1
                 sput LA;->x:J v2
                 return
               }
             }",
            |analysis, code| {
                assert!(analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_loop_phis_terminate() {
        analyze(
            "class LA; {
               static field x I
               method static <clinit>()V {
               block0:
                 v0 = const 0
                 v1 = const 1
                 v9 = const 10
                 goto block1
               block1:
                 v2 = phi v0 v3
                 v3 = add v2 v1
                 if-lt v3 v9 block1 block2
               block2:
                 sput LA;->x:I v3
                 return
               }
             }",
            |analysis, code| {
                assert!(!analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_phi_with_dependent_input() {
        analyze(
            "class LA; {
               static field x I
               static field y I
               method static <clinit>()V {
               block0:
                 v0 = sget LA;->y:I
                 if-eqz v0 block1 block2
               block1:
                 v1 = const 1
                 goto block3
               block2:
                 v2 = const 2
                 goto block3
               block3:
                 v3 = phi v1 v2
                 v4 = phi v0 v2
                 sput LA;->x:I v3
                 sput LA;->x:I v4
                 return
               }
             }",
            |analysis, code| {
                let puts: Vec<ValueId> = code
                    .instructions()
                    .filter_map(|instruction| match instruction.kind {
                        InstructionKind::StaticPut { value, .. } => Some(value),
                        _ => None,
                    })
                    .collect();
                assert!(!analysis.value_may_depend_on_environment(puts[0]));
                assert!(analysis.value_may_depend_on_environment(puts[1]));
                assert!(analysis.any_value_may_depend_on_environment(puts.iter().copied()));
                assert!(!analysis.any_value_may_depend_on_environment(std::iter::empty()));
            },
        );
    }

    #[test]
    fn test_fresh_array_filled_with_constants() {
        analyze(
            "class LA; {
               static field x [I
               method static <clinit>()V {
               block0:
                 v0 = const 2
                 v1 = new-array [I v0
                 v2 = const 0
                 v3 = const 7
                 aput v1 v2 v3
                 v4 = check-cast v1 [I
                 sput LA;->x:[I v4
                 return
               }
             }",
            |analysis, code| {
                assert!(!analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_fresh_array_with_escaping_use() {
        analyze(
            "class LA; {
               static field x [I
               method static <clinit>()V {
               block0:
                 v0 = const 2
                 v1 = new-array [I v0
                 invoke-static LB;->fill([I)V v1
                 sput LA;->x:[I v1
                 return
               }
             }",
            |analysis, code| {
                assert!(analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_fresh_array_stored_element_depends() {
        analyze(
            "class LA; {
               static field x [I
               method static <clinit>()V {
               block0:
                 v0 = const 1
                 v1 = new-array [I v0
                 v2 = const 0
                 v3 = sget LB;->y:I
                 aput v1 v2 v3
                 sput LA;->x:[I v1
                 return
               }
             }",
            |analysis, code| {
                assert!(analysis.value_may_depend_on_environment(stored_value(code)));
            },
        );
    }

    #[test]
    fn test_fresh_instance() {
        let source = "
            class LP; {
              field v I
              method <init>(I)V pure-constructor, environment-independent-fields
            }
            class LQ; {
              method <init>(I)V pure-constructor
            }
            class LA; {
              static field p LP;
              static field q LQ;
              method static <clinit>()V {
              block0:
                v0 = const 1
                v1 = new-instance LP;
                invoke-direct LP;-><init>(I)V v1 v0
                sput LA;->p:LP; v1
                v2 = new-instance LQ;
                invoke-direct LQ;-><init>(I)V v2 v0
                sput LA;->q:LQ; v2
                return
              }
            }";
        analyze(source, |analysis, code| {
            let puts: Vec<ValueId> = code
                .instructions()
                .filter_map(|instruction| match instruction.kind {
                    InstructionKind::StaticPut { value, .. } => Some(value),
                    _ => None,
                })
                .collect();
            assert!(!analysis.value_may_depend_on_environment(puts[0]));
            assert!(analysis.value_may_depend_on_environment(puts[1]));
        });
    }

    #[test]
    fn test_arguments_depend_on_environment() {
        let app = AppView::read_text(
            "class LA; {
               method static f(I)I {
               block0:
                 v0 = arg 0
                 return v0
               }
             }",
        )
        .unwrap();
        let method = MethodRef::parse("LA;->f(I)I").unwrap();
        let code = app.method_definition(&method).unwrap().code.as_ref().unwrap();
        let analysis = ValueMayDependOnEnvironmentAnalysis::new(&app, code);
        assert!(analysis.value_may_depend_on_environment(ValueId(0)));
    }
}
