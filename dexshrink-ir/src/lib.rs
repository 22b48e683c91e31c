pub mod analysis;
pub mod builder;
pub mod code;
pub mod effects;
pub mod error;
pub mod instruction;
pub mod ops;
pub mod optimization_info;
pub mod pass;
pub mod passes;
pub mod print;
pub mod program;
pub mod text;
pub mod validation;
pub mod value;

pub use analysis::class_initializer::{ClassInitializerSideEffect, ClassInitializerSideEffectAnalysis};
pub use analysis::environment::ValueMayDependOnEnvironmentAnalysis;
pub use builder::IrBuilder;
pub use code::{BasicBlock, IrCode};
pub use effects::{Effect, EffectAnalyzer, SideEffectAssumption};
pub use error::IrError;
pub use instruction::{BlockId, InstrId, Instruction, InstructionKind};
pub use ops::{BinaryOp, IfKind, InvokeKind, UnaryOp};
pub use optimization_info::{MethodOptimizationInfo, OptimizationFeedback, OptimizationFlags};
pub use pass::{Pass, PassOptions, PassRunner};
pub use passes::class_initializer_side_effects::ClassInitializerSideEffects;
pub use print::{print_code, print_program};
pub use program::{
    AccessFlags, AppView, ClassDef, ClassOrigin, FieldDef, MethodDef, ResolvedField, WholeProgramView,
};
pub use text::{parse_program, ParseError};
pub use validation::Validator;
pub use value::{Value, ValueDefinition, ValueId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_from_text() {
        let mut app = AppView::read_text(
            "class LA; {
               method static <clinit>()V {
               block0:
                 return
               }
             }",
        )
        .unwrap();
        let mut pass = ClassInitializerSideEffects::new();
        pass.run(&mut app);
        assert_eq!(
            pass.result_for(dexshrink_core::DexType::new("LA;")),
            Some(ClassInitializerSideEffect::None)
        );
    }
}
