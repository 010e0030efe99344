//! Fuzz target for ClientEvent::from_json
//!
//! This fuzzer tests event decoding with arbitrary text to find:
//! - Parser crashes or panics
//! - Stack exhaustion on deeply nested payloads
//! - Event tags that decode into the wrong payload type
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use banter_proto::ClientEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary text as a client event
    // This should never panic, only return Err for invalid data
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = ClientEvent::from_json(text);
    }
});
