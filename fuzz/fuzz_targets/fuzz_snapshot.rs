// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use catalogue_tagger::progress::ProgressSnapshot;
use libfuzzer_sys::fuzz_target;

// Arbitrary progress files must either parse or fail with an error, and
// anything that parses must survive being written back out.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(snapshot) = ProgressSnapshot::from_json(text) {
        let json = snapshot.to_json().expect("parsed snapshot serializes");
        let again = ProgressSnapshot::from_json(&json).expect("written snapshot parses");
        assert_eq!(snapshot, again);
    }
});
