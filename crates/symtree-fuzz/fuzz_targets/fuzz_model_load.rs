#![no_main]

use libfuzzer_sys::fuzz_target;

use symtree::Model;

fuzz_target!(|data: &[u8]| {
    // Any input must either load into a validated model or fail cleanly.
    if let Ok(model) = Model::from_bytes(data) {
        assert!(model.n_trees() > 0);
    }
});
