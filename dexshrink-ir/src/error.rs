use crate::value::ValueId;
use dexshrink_core::MethodRef;
use thiserror::Error;

/// Errors raised while constructing method code.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("value {0} is used but never defined")]
    UndefinedValue(ValueId),

    #[error("value {0} is defined more than once")]
    RedefinedValue(ValueId),

    #[error("invalid code for {method}:\n{}", .errors.join("\n"))]
    Invalid {
        method: MethodRef,
        errors: Vec<String>,
    },
}
