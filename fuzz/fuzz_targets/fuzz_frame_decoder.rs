#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The decoder sees raw serial bytes: torn lines, binary noise,
    // arbitrary JSON. It must never panic, and anything it accepts
    // must carry finite readings.
    if let Ok(frame) = governor_core::frame::decode(data) {
        assert!(frame.pressure_bar.is_finite());
        assert!(frame.flow_rate.is_finite());
    }
});
