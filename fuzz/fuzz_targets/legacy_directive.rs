#![no_main]

use libfuzzer_sys::fuzz_target;
use kernlog_core::directive::parse_directives;
use kernlog_kernel_input::ConfigStore;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(directives) = parse_directives(content) else {
        return;
    };

    // 개별 지시어 실패는 로드 사이클을 중단시키지 않아야 함
    let mut store = ConfigStore::new();
    store.begin_load().expect("fresh store accepts a load cycle");
    for directive in &directives {
        let _ = store.apply_legacy(&directive.name, &directive.argument);
    }
    let effective = store.end_load().expect("legacy-only cycle always resolves");
    assert!(effective.internal_msg_facility.code() <= 23);
});
