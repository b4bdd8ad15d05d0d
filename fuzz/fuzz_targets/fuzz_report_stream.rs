//! Fuzz target: inbound report stream.
//!
//! Pushes arbitrary bytes through `FrameDecoder` and the report parser the
//! way a notification-driven session does. Neither may panic, and every
//! report that parses must carry the id it was parsed under.
//!
//! cargo fuzz run fuzz_report_stream

#![no_main]

use libfuzzer_sys::fuzz_target;
use telemetrix_esp32::protocol::codec::{self, FrameDecoder, MAX_BODY_LEN};
use telemetrix_esp32::protocol::opcodes::ReportId;
use telemetrix_esp32::protocol::report::Report;

fuzz_target!(|data: &[u8]| {
    // First byte picks the notification size so chunk boundaries vary too.
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut decoder = FrameDecoder::new();
    for piece in stream.chunks(chunk) {
        let _ = decoder.feed(piece, |body| {
            assert!(body.len() <= MAX_BODY_LEN);
            let Some((raw_id, payload)) = codec::decode(body) else {
                return Err(());
            };
            let id = ReportId::try_from(raw_id).map_err(|_| ())?;
            let report = Report::parse(id, payload).map_err(|_| ())?;
            assert_eq!(report.id(), id);
            Ok(())
        });
    }
});
