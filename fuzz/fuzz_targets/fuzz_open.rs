#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let reader = match hdf4_reader::Reader::open(Cursor::new(data.to_vec())) {
        Ok(r) => r,
        Err(_) => return,
    };

    for tag in reader.header().tags() {
        let _ = tag.tag_name();
    }
    let _ = reader.file_type_id();
});
