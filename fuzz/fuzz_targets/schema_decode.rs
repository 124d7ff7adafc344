#![no_main]

use libfuzzer_sys::fuzz_target;
use schema::parse_def;

const DEF: &str = "\
uint32 id
string name
bytes blob
array items
- uint16 kind
- array<int32> values
- string label
array<uint64> [interleaved] left
array<uint64> [interleaved] right
";

fuzz_target!(|data: &[u8]| {
    let def = parse_def(DEF, "fuzz.def");
    if let Ok(message) = def.schema.decode(data) {
        let _ = def.schema.encode(0, &message);
    }
});
