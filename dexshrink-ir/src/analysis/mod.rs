//! Analyses over the SSA code of a single method.

pub mod class_initializer;
pub mod control_flow;
pub mod environment;
pub mod method_side_effects;

pub use class_initializer::{ClassInitializerSideEffect, ClassInitializerSideEffectAnalysis};
pub use control_flow::{control_flow_may_depend_on_environment, ControlFlowDependence};
pub use environment::ValueMayDependOnEnvironmentAnalysis;
pub use method_side_effects::{
    analyze_instance_initializer, method_may_have_side_effects, InstanceInitializerInfo,
};
