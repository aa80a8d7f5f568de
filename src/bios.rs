//! The BIOS/firmware boundary (spec.md §6 EXTERNAL INTERFACES).
//!
//! Everything in this module stands in for services the real µRISC-V-like
//! BIOS ROM provides — TLB refill, HALT/PANIC, state/context load, the
//! time-of-day clock, and the device register map. Per spec.md §1 these
//! are external collaborators, entirely out of scope for the nucleus core;
//! this module only fixes the *contract* (as a trait) so the core can be
//! written once and exercised against a real BIOS or, in tests, against
//! [`mock::MockBios`].
//!
//! Generalizes the teaching kernel's direct hardware access (`x86_64`
//! register/port instructions in `interrupts/idt.rs`, `Port<u8>` I/O in
//! `serial.rs`) into a trait object boundary, per Design Note §9's push to
//! make the kernel testable in isolation.

use bitflags::bitflags;

/// Number of general-purpose registers saved/restored on every trap.
pub const NUM_REGS: usize = 32;

bitflags! {
    /// Processor status/interrupt-enable word.
    ///
    /// `KERNEL_MODE` models the previous-privilege bit the syscall handler
    /// inspects (spec.md §4.7 rule 1): set when the trapped instruction ran
    /// in kernel mode, clear for user mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusWord: u32 {
        /// Global interrupt enable.
        const INTERRUPTS_ENABLED = 1 << 0;
        /// Interrupt-enable bit saved across the trap (restored on return).
        const PREV_INTERRUPTS_ENABLED = 1 << 1;
        /// Previous privilege was kernel mode.
        const KERNEL_MODE = 1 << 2;
    }
}

bitflags! {
    /// Per-line interrupt enable mask. Bit index equals the interrupt line
    /// number (1 = per-processor timer, 2 = interval timer, 3..7 = devices).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptMask: u32 {
        const CPU_TIMER = 1 << 1;
        const INTERVAL_TIMER = 1 << 2;
        const DISK = 1 << 3;
        const FLASH = 1 << 4;
        const ETHERNET = 1 << 5;
        const PRINTER = 1 << 6;
        const TERMINAL = 1 << 7;
        const ALL = Self::CPU_TIMER.bits()
            | Self::INTERVAL_TIMER.bits()
            | Self::DISK.bits()
            | Self::FLASH.bits()
            | Self::ETHERNET.bits()
            | Self::PRINTER.bits()
            | Self::TERMINAL.bits();
    }
}

/// The full processor state the BIOS saves into the BIOS data page on
/// every trap, and the state the kernel loads to resume a process
/// (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    /// General-purpose registers, RISC-V ABI indexing (a0..a3 = x10..x13).
    pub regs: [i64; NUM_REGS],
    pub pc: u64,
    pub status: StatusWord,
    /// Interrupt-enable mask active when the trap occurred.
    pub interrupt_enable: InterruptMask,
    pub cause: u32,
}

impl SavedState {
    /// RISC-V ABI stack-pointer register (x2).
    pub const SP: usize = 2;
    pub const A0: usize = 10;
    pub const A1: usize = 11;
    pub const A2: usize = 12;
    pub const A3: usize = 13;

    /// Width of one instruction, in bytes — `pc` advances by this amount
    /// to skip a completed syscall trap.
    pub const WORDLEN: u64 = 4;

    pub const fn empty() -> Self {
        SavedState {
            regs: [0; NUM_REGS],
            pc: 0,
            status: StatusWord::empty(),
            interrupt_enable: InterruptMask::empty(),
            cause: 0,
        }
    }

    pub fn a0(&self) -> i64 {
        self.regs[Self::A0]
    }
    pub fn a1(&self) -> i64 {
        self.regs[Self::A1]
    }
    pub fn a2(&self) -> i64 {
        self.regs[Self::A2]
    }
    pub fn a3(&self) -> i64 {
        self.regs[Self::A3]
    }
    pub fn set_a0(&mut self, value: i64) {
        self.regs[Self::A0] = value;
    }

    /// Advance past the completed trapping instruction. Spec.md §4.7's
    /// "blocking-syscall invariant": always called before the state is
    /// committed to a PCB, so a resumed process never re-executes its own
    /// syscall.
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(Self::WORDLEN);
    }

    /// Exception code extracted from `cause` (bits 2..6, mirroring the
    /// original's `GETEXECCODE`/`CAUSESHIFT`).
    pub fn exception_code(&self) -> u32 {
        use bit_field::BitField;
        self.cause.get_bits(2..7)
    }

    /// High bit of `cause` marks an interrupt rather than a syscall/trap.
    pub fn is_interrupt(&self) -> bool {
        use bit_field::BitField;
        self.cause.get_bit(31)
    }
}

/// Saved kernel-mode execution context for a Support Level handler
/// (spec.md §4.9's `exceptContext[index]`: stack pointer, status, pc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub stack_ptr: u64,
    pub status: StatusWord,
    pub pc: u64,
}

/// Index into a Support Structure's `exceptState`/`exceptContext` pair
/// (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionClass {
    PgFault = 0,
    General = 1,
}

/// A process's registered Support Structure (spec.md §3, §4.9). Opaque to
/// the core beyond the two arrays pass-up-or-die reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct SupportStruct {
    pub except_state: [SavedState; 2],
    pub except_context: [Context; 2],
}

impl SupportStruct {
    pub const fn new() -> Self {
        SupportStruct {
            except_state: [SavedState::empty(); 2],
            except_context: [Context {
                stack_ptr: 0,
                status: StatusWord::empty(),
                pc: 0,
            }; 2],
        }
    }
}

impl Default for SupportStruct {
    fn default() -> Self {
        Self::new()
    }
}

/// Trampoline record populated once at boot (spec.md §6 Pass-Up Vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassUpRecord {
    pub handler_pc: u64,
    pub kernel_stack_ptr: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassUpVector {
    pub tlb_refill: PassUpRecord,
    pub general_exception: PassUpRecord,
}

/// One 4-word device register block (spec.md §6 device register map).
/// Non-terminal devices read it as `[status, command, data0, data1]`;
/// terminals read the same four words as
/// `[recv_status, recv_command, transm_status, transm_command]`.
///
/// Backed by `volatile::Volatile` per Design Note §9 ("device-register
/// reads and writes... are volatile memory-mapped regions").
#[derive(Debug)]
pub struct DeviceRegisterBlock {
    words: [volatile::Volatile<u32>; 4],
}

impl DeviceRegisterBlock {
    pub fn new() -> Self {
        DeviceRegisterBlock {
            words: core::array::from_fn(|_| volatile::Volatile::new(0)),
        }
    }

    fn read(&self, idx: usize) -> u32 {
        self.words[idx].read()
    }
    fn write(&mut self, idx: usize, value: u32) {
        self.words[idx].write(value);
    }

    pub fn status(&self) -> u32 {
        self.read(0)
    }
    pub fn set_command(&mut self, value: u32) {
        self.write(1, value)
    }
    pub fn recv_status(&self) -> u32 {
        self.read(0)
    }
    pub fn set_recv_command(&mut self, value: u32) {
        self.write(1, value)
    }
    pub fn transm_status(&self) -> u32 {
        self.read(2)
    }
    pub fn set_transm_command(&mut self, value: u32) {
        self.write(3, value)
    }

    /// Test-only hook: a real BIOS's device hardware sets status words;
    /// nothing in this crate writes them outside of a simulated device.
    /// Not `cfg(test)`-gated since it must also be reachable from the
    /// `tests/` integration suite, which links this crate as an ordinary
    /// dependency rather than under `--cfg test`.
    pub fn set_status_for_test(&mut self, value: u32) {
        self.write(0, value)
    }
    pub fn set_transm_status_for_test(&mut self, value: u32) {
        self.write(2, value)
    }
}

impl Default for DeviceRegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Device status low byte values with defined meaning (spec.md §6).
pub mod status_code {
    pub const READY: u32 = 1;
    pub const BUSY: u32 = 3;
    pub const ACK: u32 = 1;
}

/// The BIOS-provided primitives the nucleus consumes by name and contract
/// (spec.md §6). Every method that the spec describes as non-returning
/// (load-state, load-context, HALT, PANIC) is documented as such; this
/// trait models them as ordinary methods rather than `-> !` so that
/// [`mock::MockBios`] can record the call and hand control back to the
/// test harness. A real BIOS binding backing this trait would never
/// return from those calls — callers in this crate (`sched`, `trap`) treat
/// them as terminal and perform no further nucleus-state mutation after
/// invoking them.
pub trait Bios {
    /// Resume execution at `state`. Does not return on real hardware.
    fn load_state(&mut self, state: &SavedState);
    /// Resume in a Support Level execution context. Does not return.
    fn load_context(&mut self, ctx: Context);
    /// Stop the machine cleanly. Does not return.
    fn halt(&mut self);
    /// Stop the machine on an unrecoverable error. Does not return.
    fn panic(&mut self);
    /// Wait for the next interrupt.
    fn wait(&mut self);

    fn read_tod(&self) -> u64;
    fn set_timer(&mut self, ticks: u32);
    fn load_interval_timer(&mut self, micros: u32);

    fn status(&self) -> StatusWord;
    fn set_status(&mut self, status: StatusWord);
    fn interrupt_enable(&self) -> InterruptMask;
    fn set_interrupt_enable(&mut self, mask: InterruptMask);

    /// Bitmask of interrupt lines with at least one pending device.
    fn pending_lines(&self) -> InterruptMask;
    /// Per-device pending bitmap for one interrupt line (bit N = device N).
    fn line_device_bitmap(&self, line: u32) -> u32;

    fn device_register(&mut self, line: u32, device: u32) -> &mut DeviceRegisterBlock;

    /// Top of RAM, used to seed the root process's initial stack pointer.
    fn ram_top(&self) -> u64;

    /// Populate the pass-up vector at its fixed BIOS address (§6). Called
    /// exactly once, at boot.
    fn install_pass_up_vector(&mut self, vector: PassUpVector);
}

/// Host-side `Bios` test double, used by every unit test in this crate
/// and by the `tests/` end-to-end scenarios. Records every call instead
/// of diverging, so a test can assert on what the nucleus tried to do.
pub mod mock {
    use super::*;
    use crate::config::{DEVICES_PER_LINE, IL_DISK, IL_TERMINAL};

    const LINES: usize = (IL_TERMINAL - IL_DISK + 1) as usize;

    pub struct MockBios {
        pub last_loaded_state: Option<SavedState>,
        pub last_loaded_context: Option<Context>,
        pub halted: bool,
        pub panicked: bool,
        pub waited: bool,
        pub tod: u64,
        pub timer_ticks: u32,
        pub interval_timer_micros: u32,
        pub status: StatusWord,
        interrupt_enable: InterruptMask,
        pub pending_lines: InterruptMask,
        pub line_bitmaps: [u32; LINES],
        devices: [[DeviceRegisterBlock; DEVICES_PER_LINE as usize]; LINES],
        pub ram_top: u64,
        pub pass_up_vector: Option<PassUpVector>,
    }

    impl MockBios {
        pub fn new() -> Self {
            MockBios {
                last_loaded_state: None,
                last_loaded_context: None,
                halted: false,
                panicked: false,
                waited: false,
                tod: 0,
                timer_ticks: 0,
                interval_timer_micros: 0,
                status: StatusWord::KERNEL_MODE | StatusWord::INTERRUPTS_ENABLED,
                interrupt_enable: InterruptMask::ALL,
                pending_lines: InterruptMask::empty(),
                line_bitmaps: [0; LINES],
                devices: core::array::from_fn(|_| core::array::from_fn(|_| DeviceRegisterBlock::new())),
                ram_top: 0x8000_0000,
                pass_up_vector: None,
            }
        }

        fn line_index(line: u32) -> usize {
            (line - IL_DISK) as usize
        }

        /// Test helper: mark `device` on `line` pending, for
        /// `interrupt::service` to discover. The two timer lines carry no
        /// device bitmap (`line_bitmaps` is only indexed `IL_DISK..=
        /// IL_TERMINAL`), so they only ever set `pending_lines`.
        pub fn raise_device(&mut self, line: u32, device: u32) {
            if line == crate::config::IL_CPU_TIMER {
                self.pending_lines |= InterruptMask::CPU_TIMER;
                return;
            }
            if line == crate::config::IL_TIMER {
                self.pending_lines |= InterruptMask::INTERVAL_TIMER;
                return;
            }
            self.line_bitmaps[Self::line_index(line)] |= 1 << device;
            self.pending_lines |= match line {
                3 => InterruptMask::DISK,
                4 => InterruptMask::FLASH,
                5 => InterruptMask::ETHERNET,
                6 => InterruptMask::PRINTER,
                _ => InterruptMask::TERMINAL,
            };
        }

        pub fn clear_line(&mut self, line: u32, mask: InterruptMask) {
            self.line_bitmaps[Self::line_index(line)] = 0;
            self.pending_lines -= mask;
        }
    }

    impl Default for MockBios {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Bios for MockBios {
        fn load_state(&mut self, state: &SavedState) {
            self.last_loaded_state = Some(*state);
        }
        fn load_context(&mut self, ctx: Context) {
            self.last_loaded_context = Some(ctx);
        }
        fn halt(&mut self) {
            self.halted = true;
        }
        fn panic(&mut self) {
            self.panicked = true;
        }
        fn wait(&mut self) {
            self.waited = true;
        }
        fn read_tod(&self) -> u64 {
            self.tod
        }
        fn set_timer(&mut self, ticks: u32) {
            self.timer_ticks = ticks;
        }
        fn load_interval_timer(&mut self, micros: u32) {
            self.interval_timer_micros = micros;
        }
        fn status(&self) -> StatusWord {
            self.status
        }
        fn set_status(&mut self, status: StatusWord) {
            self.status = status;
        }
        fn interrupt_enable(&self) -> InterruptMask {
            self.interrupt_enable
        }
        fn set_interrupt_enable(&mut self, mask: InterruptMask) {
            self.interrupt_enable = mask;
        }
        fn pending_lines(&self) -> InterruptMask {
            self.pending_lines
        }
        fn line_device_bitmap(&self, line: u32) -> u32 {
            self.line_bitmaps[Self::line_index(line)]
        }
        fn device_register(&mut self, line: u32, device: u32) -> &mut DeviceRegisterBlock {
            &mut self.devices[Self::line_index(line)][device as usize]
        }
        fn ram_top(&self) -> u64 {
            self.ram_top
        }
        fn install_pass_up_vector(&mut self, vector: PassUpVector) {
            self.pass_up_vector = Some(vector);
        }
    }
}
