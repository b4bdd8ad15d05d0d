//! Telemetrix wire protocol: opcode and report tables, framing, report
//! decoding and the receive loop.
//!
//! ```text
//!   Command: [len][opcode][args..]      len = 1 + args
//!   Report:  [len][report_id][payload..]
//! ```

pub mod codec;
pub mod dispatcher;
pub mod opcodes;
pub mod report;
