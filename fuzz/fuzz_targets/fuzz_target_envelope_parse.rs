#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Structural parsing performs no key derivation and must never
    // panic on arbitrary input
    let _ = encyphrix::message::envelope::Envelope::parse(data);
    let _ = encyphrix::message::envelope::parse_prefix(data);
});
