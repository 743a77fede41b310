#![no_main]

use cordyceps_avl::{model::CursorEquivalenceInput, Avl, Unbalanced};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: CursorEquivalenceInput| {
    cordyceps_avl::model::run_cursor_equivalence::<Unbalanced>(input.values.clone(), input.ops.clone());
    cordyceps_avl::model::run_cursor_equivalence::<Avl>(input.values, input.ops);
});
