//! Raw kernel input events.
//!
//! Events cross this process as opaque fixed-width `input_event` records;
//! only `type`, `code` and `value` are ever interpreted. Constants carry the
//! same numeric values as the kernel headers.

use std::mem;
use std::slice;

use libc::input_event;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;

/// `value` of a key event that reports a release.
pub const RELEASED: i32 = 0;

pub const EVENT_SIZE: usize = mem::size_of::<input_event>();

/// Byte view of a run of events, for handing a packet to the sink verbatim.
pub fn as_bytes(events: &[input_event]) -> &[u8] {
    // input_event is a plain #[repr(C)] kernel record.
    unsafe { slice::from_raw_parts(events.as_ptr().cast(), mem::size_of_val(events)) }
}

/// A zeroed event, usable as read-buffer filler.
pub fn zeroed() -> input_event {
    input_event {
        time: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        type_: 0,
        code: 0,
        value: 0,
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;

    pub fn key(code: u16, value: i32) -> input_event {
        input_event {
            type_: EV_KEY,
            code,
            value,
            ..zeroed()
        }
    }

    pub fn syn() -> input_event {
        zeroed()
    }

    /// Decodes a byte buffer produced by [`as_bytes`] back into
    /// `(type, code, value)` triples.
    pub fn decode(bytes: &[u8]) -> Vec<(u16, u16, i32)> {
        assert_eq!(bytes.len() % EVENT_SIZE, 0);
        bytes
            .chunks_exact(EVENT_SIZE)
            .map(|chunk| {
                let ev = unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const input_event) };
                (ev.type_, ev.code, ev.value)
            })
            .collect()
    }
}
