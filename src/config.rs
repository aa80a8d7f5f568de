//! Fixed-pool sizes, timing constants, and device-register geometry.
//!
//! These are compile-time facts about the nucleus and the emulator it
//! targets, not runtime configuration — there is no filesystem at boot to
//! read a config file from, so (as in the teaching kernel this is built
//! from) they live here as plain `const`s.

/// Size of the PCB pool and the ASL descriptor pool.
pub const MAXPROC: usize = 20;

/// Per-processor timer ticks granted to a process each dispatch quantum.
pub const TIMESLICE: u32 = 5;

/// Interval timer reload value: one pseudo-clock tick every 100ms, in
/// whatever unit `Bios::load_interval_timer` consumes.
pub const PSECOND: u32 = 100_000;

/// Total number of device/pseudo-clock semaphores: 48 device slots
/// (lines 3..=7, 8 devices each, with line 7 split into TX/RX) plus one
/// pseudo-clock slot.
pub const TOT_SEMS: usize = 49;

/// First interrupt line carrying a device bitmap (disk).
pub const IL_DISK: u32 = 3;

/// Interrupt line for the per-processor local timer (time-slice expiry).
pub const IL_CPU_TIMER: u32 = 1;

/// Interrupt line for the interval timer (pseudo-clock tick).
pub const IL_TIMER: u32 = 2;

/// Last, lowest-priority interrupt line: terminals.
pub const IL_TERMINAL: u32 = 7;

/// Number of device slots per interrupt line.
pub const DEVICES_PER_LINE: u32 = 8;

/// Index into `devSems` of the pseudo-clock semaphore.
pub const PSEUDOCLOCK_SEM: usize = 48;

/// Default priority assigned to the bootstrap root process.
pub const ROOT_PRIORITY: i32 = 0;

/// Device register base address; `a1 - DEV_REG_START` is how DOIO derives
/// (line, device, sub-device) per spec.md §4.7.
pub const DEV_REG_START: u32 = 0x1000_0054;

/// Byte span of one interrupt line's device register block (8 devices * 16 bytes).
const LINE_SPAN: u32 = DEVICES_PER_LINE * 0x10;

/// Device semaphore index for a non-terminal line, or the TX-half base
/// index for the terminal line. `index = (line - 3) * 8 + dev`.
pub const fn dev_sem_base(line: u32, dev: u32) -> usize {
    ((line - IL_DISK) * DEVICES_PER_LINE + dev) as usize
}

/// Device semaphore index for a terminal's receive half: the TX base index
/// for that device, offset by one full line's worth of slots (8).
pub const fn term_rx_sem(dev: u32) -> usize {
    dev_sem_base(IL_TERMINAL, dev) + DEVICES_PER_LINE as usize
}

/// Device semaphore index for a terminal's transmit half.
pub const fn term_tx_sem(dev: u32) -> usize {
    dev_sem_base(IL_TERMINAL, dev)
}

/// The (line, device, sub-device-is-transmit) a DOIO command address maps to.
///
/// `offset` is `a1 - DEV_REG_START`. Sub-device arbitration matches
/// `original_source/phase2/interrupts.c`'s terminal layout: word offset
/// 0x0 is RECV_STATUS, 0x4 RECV_COMMAND, 0x8 TRANSM_STATUS, 0xC
/// TRANSM_COMMAND — so a command-field offset of 0xC within a device block
/// selects the transmit half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    pub line: u32,
    pub device: u32,
    pub is_terminal_transmit: bool,
}

/// Decode a device-register offset (already relative to `DEV_REG_START`)
/// into a line/device/sub-device triple, and the device-semaphore index
/// that synchronizes it.
///
/// Kept formulaic rather than table-driven (see DESIGN.md's Open Question
/// resolution): the register layout is fixed by the external device map
/// and this nucleus targets a single emulator geometry.
pub const fn decode_device_register(offset: u32) -> DeviceAddress {
    let line = offset / LINE_SPAN + IL_DISK;
    let within_line = offset % LINE_SPAN;
    let device = within_line / 0x10;
    let sub_offset = within_line % 0x10;
    DeviceAddress {
        line,
        device,
        is_terminal_transmit: sub_offset == 0x0C,
    }
}

/// The device semaphore index a decoded `DeviceAddress` should block on.
pub const fn device_address_sem_index(addr: DeviceAddress) -> usize {
    if addr.line == IL_TERMINAL {
        if addr.is_terminal_transmit {
            term_tx_sem(addr.device)
        } else {
            term_rx_sem(addr.device)
        }
    } else {
        dev_sem_base(addr.line, addr.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_sem_indices_match_spec_table() {
        assert_eq!(dev_sem_base(3, 0), 0);
        assert_eq!(dev_sem_base(6, 2), 26);
        assert_eq!(term_tx_sem(0), 32);
        assert_eq!(term_rx_sem(0), 40);
        assert_eq!(PSEUDOCLOCK_SEM, 48);
        assert_eq!(TOT_SEMS, 49);
    }

    #[test]
    fn decode_non_terminal_device_register() {
        // line 6 (printer), device 2, status word (sub-offset 0).
        let offset = (6 - IL_DISK) * LINE_SPAN + 2 * 0x10;
        let addr = decode_device_register(offset);
        assert_eq!(addr.line, 6);
        assert_eq!(addr.device, 2);
        assert!(!addr.is_terminal_transmit);
        assert_eq!(device_address_sem_index(addr), 26);
    }

    #[test]
    fn decode_terminal_transmit_vs_receive() {
        let tx_offset = (IL_TERMINAL - IL_DISK) * LINE_SPAN + 1 * 0x10 + 0x0C;
        let tx = decode_device_register(tx_offset);
        assert!(tx.is_terminal_transmit);
        assert_eq!(device_address_sem_index(tx), term_tx_sem(1));

        let rx_offset = (IL_TERMINAL - IL_DISK) * LINE_SPAN + 1 * 0x10 + 0x00;
        let rx = decode_device_register(rx_offset);
        assert!(!rx.is_terminal_transmit);
        assert_eq!(device_address_sem_index(rx), term_rx_sem(1));
    }
}
