#![no_main]

use libfuzzer_sys::fuzz_target;
use logsift_query::{parse, render_terms};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let terms = parse(input);
        // 정규화된 렌더링은 같은 용어로 다시 파싱되어야 함
        let rendered = render_terms(&terms);
        assert_eq!(parse(&rendered), terms, "render/parse mismatch for {input:?}");
    }
});
