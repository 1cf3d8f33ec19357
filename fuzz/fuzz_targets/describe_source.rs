#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };

    let Ok(src) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(ast) = syn::parse_file(src) else {
        return;
    };

    let Ok(descr) = ngfuzz_core::plan::describe_files(&[ast], "") else {
        return;
    };
    let _ = ngfuzz_core::proto_emit::render_proto(&descr, "fuzz");
});
