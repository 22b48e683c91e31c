//! Per-method facts computed by analyses and consumed by later optimizations.

use crate::analysis::class_initializer::ClassInitializerSideEffect;
use crate::analysis::method_side_effects::InstanceInitializerInfo;
use crate::program::AppView;
use bitflags::bitflags;
use dexshrink_core::MethodRef;
use dexshrink_support::FastHashMap;
use std::sync::Mutex;

bitflags! {
    /// Facts known about a method. An absent flag is the conservative answer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OptimizationFlags: u32 {
        /// Invoking the method has no observable effect and cannot throw.
        const NO_SIDE_EFFECTS = 1 << 0;

        /// A constructor whose only effects are writes to its receiver's fields.
        const NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES = 1 << 1;

        /// A constructor whose receiver field values are computed only from
        /// its arguments and constants.
        const INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT = 1 << 2;

        /// A class initializer whose first trigger may be moved later.
        const CLASS_INITIALIZER_MAY_BE_POSTPONED = 1 << 3;
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        OptimizationFlags::empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodOptimizationInfo {
    pub flags: OptimizationFlags,
}

impl MethodOptimizationInfo {
    pub fn new(flags: OptimizationFlags) -> Self {
        Self { flags }
    }

    pub fn may_have_side_effects(&self) -> bool {
        !self.flags.contains(OptimizationFlags::NO_SIDE_EFFECTS)
    }

    pub fn only_writes_receiver_fields(&self) -> bool {
        self.flags.intersects(
            OptimizationFlags::NO_SIDE_EFFECTS
                | OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES,
        )
    }

    pub fn instance_field_initialization_may_depend_on_environment(&self) -> bool {
        !self
            .flags
            .contains(OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT)
    }

    pub fn class_initializer_may_be_postponed(&self) -> bool {
        self.flags
            .contains(OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED)
    }
}

/// Collects optimization facts while analyses run against a frozen
/// `AppView`, and merges them into the view afterwards.
///
/// Safe to share between threads analysing different methods.
#[derive(Debug, Default)]
pub struct OptimizationFeedback {
    updates: Mutex<FastHashMap<MethodRef, OptimizationFlags>>,
}

impl OptimizationFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&self, method: &MethodRef, flags: OptimizationFlags) {
        let mut updates = self.updates.lock().unwrap_or_else(|e| e.into_inner());
        *updates.entry(*method).or_default() |= flags;
    }

    pub fn method_may_not_have_side_effects(&self, method: &MethodRef) {
        self.mark(method, OptimizationFlags::NO_SIDE_EFFECTS);
    }

    pub fn class_initializer_may_be_postponed(&self, method: &MethodRef) {
        self.mark(method, OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED);
    }

    pub fn record_instance_initializer_info(&self, method: &MethodRef, info: &InstanceInitializerInfo) {
        let flags = info.flags();
        if !flags.is_empty() {
            self.mark(method, flags);
        }
    }

    /// Records what a class initializer verdict licenses.
    pub fn record_class_initializer_side_effect(
        &self,
        method: &MethodRef,
        side_effect: ClassInitializerSideEffect,
    ) {
        if side_effect.is_none() {
            self.method_may_not_have_side_effects(method);
            self.class_initializer_may_be_postponed(method);
        } else if side_effect.can_be_postponed() {
            self.class_initializer_may_be_postponed(method);
        }
    }

    pub fn pending(&self, method: &MethodRef) -> OptimizationFlags {
        let updates = self.updates.lock().unwrap_or_else(|e| e.into_inner());
        updates.get(method).copied().unwrap_or_default()
    }

    /// Merges all collected flags into `app`. Returns how many methods
    /// learned at least one new flag.
    pub fn apply(self, app: &mut AppView) -> usize {
        let updates = self.updates.into_inner().unwrap_or_else(|e| e.into_inner());
        let mut changed = 0;
        for (method, flags) in updates {
            if let Some(definition) = app.method_definition_mut(&method) {
                let before = definition.optimization_info.flags;
                definition.optimization_info.flags |= flags;
                if definition.optimization_info.flags != before {
                    changed += 1;
                }
            } else {
                log::warn!("dropping optimization info for unknown method {}", method);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_default_is_conservative() {
        let info = MethodOptimizationInfo::default();
        assert!(info.may_have_side_effects());
        assert!(!info.only_writes_receiver_fields());
        assert!(info.instance_field_initialization_may_depend_on_environment());
        assert!(!info.class_initializer_may_be_postponed());
    }

    #[test]
    fn test_record_verdicts() {
        let feedback = OptimizationFeedback::new();
        let a = MethodRef::parse("LA;-><clinit>()V").unwrap();
        let b = MethodRef::parse("LB;-><clinit>()V").unwrap();
        let c = MethodRef::parse("LC;-><clinit>()V").unwrap();

        feedback.record_class_initializer_side_effect(&a, ClassInitializerSideEffect::None);
        feedback.record_class_initializer_side_effect(
            &b,
            ClassInitializerSideEffect::SideEffectsThatCanBePostponed,
        );
        feedback.record_class_initializer_side_effect(
            &c,
            ClassInitializerSideEffect::SideEffectsThatCannotBePostponed,
        );

        assert_eq!(
            feedback.pending(&a),
            OptimizationFlags::NO_SIDE_EFFECTS | OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED
        );
        assert_eq!(
            feedback.pending(&b),
            OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED
        );
        assert!(feedback.pending(&c).is_empty());
    }

    #[test]
    fn test_concurrent_marks() {
        let feedback = Arc::new(OptimizationFeedback::new());
        let method = MethodRef::parse("LA;->m()V").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let feedback = feedback.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        feedback.method_may_not_have_side_effects(&method);
                    } else {
                        feedback.class_initializer_may_be_postponed(&method);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(feedback.pending(&method).bits().count_ones(), 2);
    }
}
