#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Container parsing and fingerprinting must never panic on
    // arbitrary input
    let _ = encyphrix::vault::container::parse(data);
    let _ = encyphrix::vault::container::fingerprint(data);
});
