//! Length-prefix frame codec.
//!
//! Wire format (commands and reports alike):
//! ```text
//! ┌────────────┬────────────┬──────────────────────┐
//! │ Length (1B)│ Opcode /   │ Arguments / payload  │
//! │ = 1 + N    │ report id  │ (N bytes)            │
//! └────────────┴────────────┴──────────────────────┘
//! ```
//!
//! The length byte counts every byte that follows it, so a single frame
//! carries at most 255 bytes after the prefix. [`FrameDecoder`] accepts
//! bytes in arbitrary chunks: a notification buffer may hold part of a
//! frame, exactly one frame, or several frames back to back.

use heapless::Vec;

use super::opcodes::Opcode;
use crate::error::ProtocolFault;

/// Largest body a one-byte length prefix can describe.
pub const MAX_BODY_LEN: usize = u8::MAX as usize;

/// An encoded command frame, length prefix included.
pub type Frame = Vec<u8, { MAX_BODY_LEN + 1 }>;

/// Encode `opcode` and its arguments into a length-prefixed frame.
pub fn encode(opcode: Opcode, args: &[u8]) -> Result<Frame, ProtocolFault> {
    let body_len = args.len() + 1;
    if body_len > MAX_BODY_LEN {
        return Err(ProtocolFault::FrameOverflow(body_len));
    }

    let mut frame = Frame::new();
    // Capacity is MAX_BODY_LEN + 1 and body_len <= MAX_BODY_LEN.
    let _ = frame.push(body_len as u8);
    let _ = frame.push(opcode.code());
    let _ = frame.extend_from_slice(args);
    Ok(frame)
}

/// Split a frame body (length byte already consumed) into the raw report
/// id and its payload. `None` for an empty body.
pub fn decode(body: &[u8]) -> Option<(u8, &[u8])> {
    body.split_first().map(|(id, payload)| (*id, payload))
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for the length byte.
    ReadingHeader,
    /// Length received, collecting the body.
    ReadingBody { expected: usize, collected: usize },
}

/// Streaming frame decoder for push-style transports.
pub struct FrameDecoder {
    state: DecoderState,
    body: [u8; MAX_BODY_LEN],
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader,
            body: [0; MAX_BODY_LEN],
        }
    }

    /// Feed bytes into the decoder, calling `on_frame` with each complete
    /// body in arrival order. A zero length prefix yields an empty body so
    /// the caller can reject it.
    ///
    /// Stops at the first error returned by `on_frame`; bytes after the
    /// failing frame are discarded along with any partial frame.
    pub fn feed<E, F>(&mut self, data: &[u8], mut on_frame: F) -> Result<(), E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader => {
                    let expected = data[offset] as usize;
                    offset += 1;
                    if expected == 0 {
                        if let Err(e) = on_frame(&[]) {
                            self.reset();
                            return Err(e);
                        }
                        continue;
                    }
                    self.state = DecoderState::ReadingBody {
                        expected,
                        collected: 0,
                    };
                }

                DecoderState::ReadingBody {
                    expected,
                    collected,
                } => {
                    let to_copy = (*expected - *collected).min(data.len() - offset);
                    self.body[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = *expected;
                        self.state = DecoderState::ReadingHeader;
                        if let Err(e) = on_frame(&self.body[..len]) {
                            self.reset();
                            return Err(e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::ReadingHeader
    }

    /// Drop any partial frame (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader;
    }
}
