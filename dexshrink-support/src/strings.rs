use std::collections::HashMap;
use std::sync::RwLock;

/// A string interner used to canonicalize descriptors.
/// Interned strings are leaked and live for the rest of the process.
pub struct StringInterner {
    strings: RwLock<HashMap<String, &'static str>>,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            strings: RwLock::new(HashMap::new()),
        }
    }

    pub fn intern(&self, s: &str) -> &'static str {
        // A poisoned lock only means another thread panicked mid-insert; the
        // map itself is still consistent.
        {
            let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&interned) = strings.get(s) {
                return interned;
            }
        }

        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        strings.insert(s.to_string(), leaked);
        leaked
    }

    pub fn len(&self) -> usize {
        self.strings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
