//! Computes, for every program class initializer, whether its triggers can
//! be removed or moved, and records the answer as optimization info. The
//! side effect facts of the methods and constructors those initializers
//! call are derived alongside.

use crate::analysis::class_initializer::{
    ClassInitializerSideEffect, ClassInitializerSideEffectAnalysis,
};
use crate::analysis::method_side_effects::{analyze_instance_initializer, method_may_have_side_effects};
use crate::optimization_info::{OptimizationFeedback, OptimizationFlags};
use crate::pass::Pass;
use crate::program::AppView;
use dexshrink_core::{DexType, MethodRef};
use dexshrink_support::FastHashMap;

/// Analyzes methods round by round until no new fact is learned: proving
/// a method or initializer side-effect free can make calls to it, or reads
/// of its class, side-effect free as well.
#[derive(Debug, Default)]
pub struct ClassInitializerSideEffects {
    max_rounds: Option<usize>,
    rounds: usize,
    results: FastHashMap<DexType, ClassInitializerSideEffect>,
}

impl ClassInitializerSideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rounds(max_rounds: Option<usize>) -> Self {
        Self {
            max_rounds,
            ..Self::default()
        }
    }

    /// Verdicts of the last round, by class.
    pub fn results(&self) -> &FastHashMap<DexType, ClassInitializerSideEffect> {
        &self.results
    }

    pub fn result_for(&self, ty: DexType) -> Option<ClassInitializerSideEffect> {
        self.results.get(&ty).copied()
    }

    /// Verdicts sorted by class descriptor.
    pub fn sorted_results(&self) -> Vec<(DexType, ClassInitializerSideEffect)> {
        let mut results: Vec<_> = self.results.iter().map(|(&ty, &verdict)| (ty, verdict)).collect();
        results.sort_by_key(|&(ty, _)| ty);
        results
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Every program method with code, sorted, with its holder.
    fn methods_with_code(app: &AppView) -> Vec<(DexType, MethodRef)> {
        let mut methods: Vec<_> = app
            .program_classes()
            .flat_map(|class| {
                class
                    .methods
                    .iter()
                    .filter(|method| method.code.is_some())
                    .map(move |method| (class.ty, method.reference))
            })
            .collect();
        methods.sort();
        methods
    }

    /// Analyzes every method against the current state of `app` without
    /// modifying it.
    fn run_round(
        &mut self,
        app: &AppView,
        methods: &[(DexType, MethodRef)],
        feedback: &OptimizationFeedback,
    ) {
        let factory = app.factory();
        for (ty, reference) in methods {
            let Some(method) = app.method_definition(reference) else {
                continue;
            };
            let Some(code) = method.code.as_ref() else {
                continue;
            };
            if code.is_class_initializer(factory) {
                let verdict =
                    ClassInitializerSideEffectAnalysis::class_initializer_can_be_postponed(app, code);
                log::debug!("{}: {}", ty, verdict);
                feedback.record_class_initializer_side_effect(reference, verdict);
                self.results.insert(*ty, verdict);
                continue;
            }
            if !method_may_have_side_effects(app, method, code) {
                log::trace!("{}: no side effects", reference);
                feedback.method_may_not_have_side_effects(reference);
            }
            if let Some(info) = analyze_instance_initializer(app, code) {
                log::trace!("{}: {:?}", reference, info);
                feedback.record_instance_initializer_info(reference, &info);
            }
        }
    }
}

impl Pass for ClassInitializerSideEffects {
    fn name(&self) -> &str {
        "class-initializer-side-effects"
    }

    fn run(&mut self, app: &mut AppView) {
        let methods = Self::methods_with_code(app);
        // Each productive round sets at least one new flag on one of the
        // methods, so this many rounds always reach the fixpoint.
        let flags_per_method = OptimizationFlags::all().iter().count();
        let limit = self
            .max_rounds
            .unwrap_or(usize::MAX)
            .min(flags_per_method * methods.len() + 1)
            .max(1);

        self.rounds = 0;
        self.results.clear();
        while self.rounds < limit {
            self.rounds += 1;
            let feedback = OptimizationFeedback::new();
            self.run_round(app, &methods, &feedback);
            let changed = feedback.apply(app);
            log::debug!("round {}: {} methods changed", self.rounds, changed);
            if changed == 0 {
                break;
            }
        }
        log::info!(
            "classified {} class initializers in {} rounds",
            self.results.len(),
            self.rounds
        );
    }
}
