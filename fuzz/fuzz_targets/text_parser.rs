#![no_main]
use dexshrink_ir::{print_program, AppView};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Whatever parses must print to text that parses to the same program.
    if let Ok(app) = AppView::read_text(text) {
        let printed = print_program(&app);
        let reparsed = AppView::read_text(&printed).expect("printed program should parse");
        assert_eq!(printed, print_program(&reparsed));
    }
});
