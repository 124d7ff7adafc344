#![no_main]

use bytestream::Reader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = Reader::new(data);
    let mut idx = 0usize;

    // Use input bytes to drive a bounded sequence of operations.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 8;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_u8();
            }
            1 => {
                let _ = reader.read_u16();
            }
            2 => {
                let _ = reader.read_u64();
            }
            3 => {
                let _ = reader.read_vec3fa();
            }
            4 => {
                let _ = reader.read_skill_id();
            }
            5 => {
                let _ = reader.read_string();
            }
            6 => {
                let pos = usize::from(data[idx.saturating_sub(1)]);
                let _ = reader.seek(pos);
            }
            _ => {
                let n = usize::from(data[idx.saturating_sub(1)] % 32);
                let _ = reader.read_bytes(n);
            }
        }
    }
});
