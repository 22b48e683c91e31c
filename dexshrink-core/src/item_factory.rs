//! Well-known descriptors and the process-wide descriptor interner.
//!
//! Every `DexType`, `DexProto` and member name is canonicalized through a
//! single `StringInterner`, so descriptors can be passed around as `Copy`
//! handles. `DexItemFactory` names the descriptors the optimizer reasons
//! about specially (constructors, class initializers, `Object`, ...).

use crate::r#type::{DexProto, DexType, MethodRef};
use dexshrink_support::StringInterner;
use once_cell::sync::Lazy;

static DESCRIPTORS: Lazy<StringInterner> = Lazy::new(StringInterner::new);

static DEFAULT_FACTORY: Lazy<DexItemFactory> = Lazy::new(DexItemFactory::new);

pub(crate) fn intern(s: &str) -> &'static str {
    DESCRIPTORS.intern(s)
}

/// Number of distinct descriptors interned so far.
pub fn interned_descriptor_count() -> usize {
    DESCRIPTORS.len()
}

#[derive(Debug, Clone)]
pub struct DexItemFactory {
    pub constructor_method_name: &'static str,
    pub class_constructor_method_name: &'static str,
    pub object_type: DexType,
    pub string_type: DexType,
    pub class_type: DexType,
    pub throwable_type: DexType,
    pub void_proto: DexProto,
    pub finalize_method_name: &'static str,
}

impl Default for DexItemFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DexItemFactory {
    pub fn new() -> Self {
        Self {
            constructor_method_name: intern("<init>"),
            class_constructor_method_name: intern("<clinit>"),
            object_type: DexType::OBJECT,
            string_type: DexType::STRING,
            class_type: DexType::CLASS,
            throwable_type: DexType::THROWABLE,
            void_proto: DexProto(intern("()V")),
            finalize_method_name: intern("finalize"),
        }
    }

    /// The shared factory used when no view-specific one is configured.
    pub fn shared() -> &'static DexItemFactory {
        &DEFAULT_FACTORY
    }

    pub fn is_constructor(&self, method: &MethodRef) -> bool {
        method.name == self.constructor_method_name
    }

    pub fn is_class_constructor(&self, method: &MethodRef) -> bool {
        method.name == self.class_constructor_method_name && method.proto == self.void_proto
    }

    pub fn is_finalize(&self, method: &MethodRef) -> bool {
        method.name == self.finalize_method_name && method.proto == self.void_proto
    }

    pub fn create_class_initializer(&self, holder: DexType) -> MethodRef {
        MethodRef::new(holder, self.class_constructor_method_name, self.void_proto)
    }
}
