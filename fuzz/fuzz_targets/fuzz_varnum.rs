#![no_main]

use libfuzzer_sys::fuzz_target;
use xmlidx::utils::{decode_varnum, delta_decode, encode_varnum};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail, never panic
    if let Ok((value, used)) = decode_varnum(data) {
        assert!(used <= data.len());
        let mut buf = Vec::new();
        encode_varnum(value, &mut buf);
        assert_eq!(decode_varnum(&buf).ok(), Some((value, buf.len())));
    }
    let mut offset = 0;
    let _ = delta_decode(data, &mut offset);
});
