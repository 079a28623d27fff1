#![no_main]

use convertdrv::token::{extract_token, parse_value, split_unit, MAX_RESULT_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Splitting and parsing must never panic, whatever the caller wrote
    let token = extract_token(data);
    assert!(token.len() <= MAX_RESULT_LEN);

    let (prefix, _unit) = split_unit(token);
    let _ = parse_value(prefix);
});
