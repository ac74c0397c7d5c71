#![no_main]

use libfuzzer_sys::fuzz_target;
use logsift_indexer::permalink::{decode, encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // 디코딩에 성공한 locator는 정규형이어야 함
        if let Ok(locator) = decode(input) {
            let again = encode(locator.received_time(), locator.record_finder())
                .expect("decoded locator should re-encode");
            assert_eq!(again, input);
        }
    }
});
