#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;

use logsift_core::config::SearchConfig;
use logsift_query::{ColumnRegistry, CompilerOptions, QueryCompiler, TimeWindow};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    query: String,
    /// 구간 시작 (epoch 밀리초)
    start_millis: i64,
    /// 구간 길이 (밀리초, 0이면 잘못된 구간)
    span_millis: u32,
    batch_lonely_terms: bool,
}

fuzz_target!(|input: FuzzInput| {
    let Some(start) = DateTime::<Utc>::from_timestamp_millis(input.start_millis) else {
        return;
    };
    let Some(end) = start.checked_add_signed(chrono::Duration::milliseconds(i64::from(
        input.span_millis,
    ))) else {
        return;
    };
    let Ok(window) = TimeWindow::new(start, end) else {
        return;
    };

    let search = SearchConfig {
        batch_lonely_terms: input.batch_lonely_terms,
        ..SearchConfig::default()
    };
    let compiler = QueryCompiler::new(CompilerOptions::from_core(&search));
    let query = compiler.compile_str(&input.query, &ColumnRegistry::common(), &window);
    let _ = query.to_json();
});
