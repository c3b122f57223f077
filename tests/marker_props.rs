//! Property tests for the correlation marker.

use bz2fb::model::{marker_for, parse_marker};
use proptest::prelude::*;

proptest! {
    #[test]
    fn marker_round_trips(id in 1u64..) {
        prop_assert_eq!(parse_marker(&marker_for(id)), Some(id));
    }

    #[test]
    fn marker_of_one_id_never_parses_as_another(a in 1u64..1_000_000, b in 1u64..1_000_000) {
        prop_assume!(a != b);
        prop_assert_ne!(parse_marker(&marker_for(a)), Some(b));
    }

    #[test]
    fn suffixed_marker_is_rejected(id in 1u64..1_000_000, suffix in "[a-z ]{1,8}") {
        let value = format!("{}x{suffix}", marker_for(id));
        prop_assert_eq!(parse_marker(&value), None);
    }

    #[test]
    fn arbitrary_text_never_panics(value in ".*") {
        let _ = parse_marker(&value);
    }
}
