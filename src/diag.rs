//! Structured tracing (`log_info!`/`log_warn!`/`log_error!`), generalized
//! from the teaching kernel's `serial.rs` UART writer.
//!
//! The original backs these macros with a concrete 16550 `SerialPort`
//! behind a `lazy_static` `spin::Mutex`. There is no UART in this nucleus
//! — the serial line is the BIOS's concern, and the `Bios` trait (§6)
//! does not expose one — so the sink is a fixed-size in-memory ring
//! buffer instead: always available under `no_std` without a heap, and
//! directly inspectable from `#[cfg(test)]`/`tests/` assertions without
//! capturing stdout. Reintroduces the "log everything interesting at trap
//! entry" density `original_source/phase2/exceptions.c`'s `debug_print`/
//! `debug_hex` calls had, at the sparse one-line-per-branch rate the
//! teacher's `interrupts/idt.rs` handlers use.

use core::fmt::Write;
use lazy_static::lazy_static;
use spin::Mutex;

const CAPACITY: usize = 4096;

/// Ring buffer sink for diagnostic lines. Wraps silently once full —
/// this is a debugging aid, not an audit log.
pub struct RingSink {
    buf: [u8; CAPACITY],
    pos: usize,
}

impl RingSink {
    const fn new() -> Self {
        RingSink {
            buf: [0; CAPACITY],
            pos: 0,
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos = (self.pos + 1) % CAPACITY;
    }

    /// Whether `needle` appears anywhere in the buffer, ignoring wrap
    /// order. Used by tests to assert a log line was emitted.
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        if needle.is_empty() || needle.len() > CAPACITY {
            return false;
        }
        self.buf.windows(needle.len()).any(|w| w == needle)
    }
}

impl Write for RingSink {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.push_byte(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref DIAG: Mutex<RingSink> = Mutex::new(RingSink::new());
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    let _ = DIAG.lock().write_fmt(args);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::diag::_print(format_args!("[INFO] "));
        $crate::diag::_print(format_args!($($arg)*));
        $crate::diag::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::diag::_print(format_args!("[WARN] "));
        $crate::diag::_print(format_args!($($arg)*));
        $crate::diag::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::diag::_print(format_args!("[ERROR] "));
        $crate::diag::_print(format_args!($($arg)*));
        $crate::diag::_print(format_args!("\n"));
    };
}

pub use crate::{log_error, log_info, log_warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_land_in_the_ring_buffer() {
        DIAG.lock().pos = 0;
        for byte in DIAG.lock().buf.iter_mut() {
            *byte = 0;
        }
        log_info!("scheduler dispatch pid={}", 7);
        assert!(DIAG.lock().contains("[INFO] scheduler dispatch pid=7"));
    }
}
