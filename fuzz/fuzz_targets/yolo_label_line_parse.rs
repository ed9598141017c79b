//! Feeds arbitrary UTF-8 lines to the label-line parser, looking for panics
//! and for accepted lines that do not survive a format/parse cycle.

#![no_main]

use inspektline::geometry::line::fuzz_parse_label_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    fuzz_parse_label_line(line);
});
