#![no_main]
use dexshrink_support::StringInterner;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let interner = Arc::new(StringInterner::new());
        let first = interner.intern(s);
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let interner = interner.clone();
                let local = s.to_string();
                std::thread::spawn(move || interner.intern(&local))
            })
            .collect();
        for thread in threads {
            let interned = thread.join().expect("interning thread panicked");
            assert!(std::ptr::eq(first, interned));
        }
        assert_eq!(interner.len(), 1);
    }
});
