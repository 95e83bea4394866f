#![no_main]

use libfuzzer_sys::fuzz_target;
use kernlog_kernel_input::{PriSource, parse_pri, resolve_priority};

fuzz_target!(|data: &[u8]| {
    let mut cursor = data;
    match parse_pri(&mut cursor) {
        Ok(_) => assert!(cursor.len() < data.len()),
        Err(_) => assert_eq!(cursor.len(), data.len()),
    }

    let resolution = resolve_priority(data, 14);
    assert!(resolution.payload_offset <= data.len());
    match resolution.source {
        PriSource::Secondary => assert!((8..=192).contains(&resolution.priority)),
        PriSource::Default => {
            assert_eq!(resolution.priority, 14);
            assert_eq!(resolution.payload_offset, 0);
        }
        PriSource::Primary => assert!(resolution.payload_offset >= 3),
    }
});
