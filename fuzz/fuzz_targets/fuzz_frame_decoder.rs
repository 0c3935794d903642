//! Fuzz target: `payload::decode`
//!
//! Drives arbitrary byte sequences into the listener-side frame decoder
//! and asserts that it never panics and never yields more objects than a
//! frame can hold.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use bthome_beacon::bthome::payload::{DecodedFrame, MAX_BUTTONS, MAX_CONTENT_LEN, decode, decode_objects};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match decode(data) {
        Ok(DecodedFrame::Plain { objects, .. }) => {
            assert!(objects.buttons.len() <= MAX_BUTTONS);
        }
        Ok(DecodedFrame::Encrypted { ciphertext, .. }) => {
            assert!(ciphertext.len() <= MAX_CONTENT_LEN);
        }
        Err(_) => {}
    }

    // The bare object region must be just as robust.
    let _ = decode_objects(data);
});
