//! Fuzz harness for the member signature parser.
//!
//! The parser runs over flag files and exemption configuration, so it must
//! be total: no panics on malformed UTF-8 shapes, overlong components,
//! nested array descriptors, or truncated method shapes. Accepted inputs
//! must round-trip through the canonical display form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vistier_core::member::{ClassId, parse_signature};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // The parser must never panic, only return Ok or Err.
    if let Ok(parsed) = parse_signature(input) {
        // Canonical form reparses to the same signature.
        let display = parsed.to_string();
        let reparsed = parse_signature(&display).expect("canonical form must reparse");
        assert_eq!(parsed, reparsed);

        // The class descriptor the parser accepted is a valid class identity.
        ClassId::new(parsed.class_descriptor.clone(), "fuzz.jar")
            .expect("accepted class descriptor must form a ClassId");
    }

    // Class descriptor validation is total as well.
    let _ = ClassId::new(input, "fuzz.jar");
});
