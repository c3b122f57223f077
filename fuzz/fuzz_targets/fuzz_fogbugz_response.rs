#![no_main]

use bz2fb::target::{ReferenceCache, xml};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let _ = xml::parse_api_descriptor(body);
        let _ = xml::parse_search(1, body);
        let mut cache = ReferenceCache::new();
        let _ = xml::parse_statuses(body, &mut cache);
        let _ = xml::parse_people(body, &mut cache);
    }
});
