#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use kernlog_kernel_input::driver::KernelStamp;
use kernlog_kernel_input::driver::klog::{LineSplitter, MAX_LINE_LEN, find_stamp};

/// 여러 번에 나뉘어 도착하는 장치 읽기
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let mut splitter = LineSplitter::new();
    let mut out: VecDeque<Bytes> = VecDeque::new();
    for chunk in input.chunks.iter().take(64) {
        splitter.push(chunk, &mut out);
    }
    out.extend(splitter.flush());

    for line in &out {
        assert!(!line.is_empty());
        assert!(line.len() <= MAX_LINE_LEN);
        assert!(!line.contains(&b'\n'));

        if let Some((start, stamp)) = find_stamp(line) {
            assert!(start + stamp.len <= line.len());
        }
        let _ = KernelStamp::parse(line);
    }
});
