#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = bz2fb::source::read_bugs(text);
        let _ = bz2fb::source::parse_timestamp(text);
    }
});
