#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{FrameBuffer, Limits};

fuzz_target!(|data: &[u8]| {
    let mut frames = FrameBuffer::new(Limits::for_testing());
    let mut idx = 0usize;
    while idx < data.len() && idx < 4096 {
        let len = (data[idx] as usize % 64).saturating_add(1);
        idx += 1;
        let end = (idx + len).min(data.len());
        if frames.push(&data[idx..end]).is_ok() {
            for frame in frames.by_ref() {
                let header = wire::decode_header(&frame).expect("complete frame has a header");
                assert_eq!(usize::from(header.length), frame.len());
            }
        }
        idx = end;
    }
});
