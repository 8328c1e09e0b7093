//! Fuzz target: `BoardLayout::from_json` → `RegistryBuilder::build`
//!
//! Arbitrary text must either be rejected with a typed error or yield a
//! registry that respects the channel invariants.
//!
//! cargo fuzz run fuzz_board_layout

#![no_main]

use libfuzzer_sys::fuzz_target;
use relayctl::protocol::MAX_CHANNELS;
use relayctl::{BoardLayout, RegistryBuilder};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(layout) = BoardLayout::from_json(text) else {
        return;
    };
    let Ok(registry) = RegistryBuilder::from_layout(&layout).build() else {
        return;
    };

    assert!(registry.len() <= MAX_CHANNELS);
    let channels = registry.channels();
    for (i, a) in channels.iter().enumerate() {
        assert!(!channels[i + 1..].contains(a), "channel bound twice");
    }
    for group in registry.groups() {
        assert!(group.locked_by().is_none());
    }
});
