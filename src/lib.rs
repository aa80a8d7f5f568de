//! A µRISC-V-like educational kernel nucleus: PCB pool, ready queue,
//! process tree, Active Semaphore List, scheduler, and exception/
//! interrupt/syscall dispatch (Level-2/Level-3 of a PandOS-style teaching
//! kernel). See `SPEC_FULL.md` for the full module map.
//!
//! `no_std` except under `cfg(test)`, so the pure-logic modules (`pcb`,
//! `queue`, `asl`, `config`) run their unit tests on the host, and the
//! `tests/` integration suite drives the whole dispatch surface against
//! `bios::mock::MockBios` without real hardware.

#![cfg_attr(not(test), no_std)]

pub mod asl;
pub mod bios;
pub mod boot;
pub mod config;
pub mod diag;
pub mod interrupt;
pub mod pcb;
pub mod proc_mgmt;
pub mod queue;
pub mod sched;
pub mod syscall;
pub mod trap;

use bios::Bios;
use pcb::{Handle, Pid};

/// Logs via [`diag`] and then aborts — the kernel's single non-returning
/// error action (spec.md §7: "the kernel never loops on an error — all
/// error edges lead to a single non-returning action").
#[macro_export]
macro_rules! kpanic {
    ($($arg:tt)*) => {{
        $crate::diag::log_error!($($arg)*);
        panic!($($arg)*)
    }};
}

/// The six kernel globals of spec.md §3, gathered into one value passed
/// by reference into every handler rather than left as file-scope
/// statics (Design Note §9). Generic over `Bios` so the same dispatch
/// code runs against real hardware or `bios::mock::MockBios`.
pub struct Nucleus<B: Bios> {
    pub bios: B,
    pub pcbs: pcb::PcbPool,
    pub ready_queue: queue::ProcQueue,
    pub asl: asl::Asl,
    pub current: Option<Handle>,
    pub process_count: u32,
    pub soft_block_count: u32,
    pub dev_sems: [i32; config::TOT_SEMS],
    pub start_tod: u64,
}

impl<B: Bios> Nucleus<B> {
    pub fn new(bios: B) -> Self {
        Nucleus {
            bios,
            pcbs: pcb::PcbPool::new(),
            ready_queue: queue::ProcQueue::new(),
            asl: asl::Asl::new(),
            current: None,
            process_count: 0,
            soft_block_count: 0,
            dev_sems: [0; config::TOT_SEMS],
            start_tod: 0,
        }
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current.map(|h| self.pcbs.get(h).pid())
    }
}

/// What a dispatch entry point did on its way out. Every variant
/// corresponds to one of spec.md §5's four suspension points; production
/// callers treat every variant as terminal (there is no continuation
/// after `sched::run`/`trap::dispatch`/`syscall::dispatch`/
/// `interrupt::service` return) — the return value exists purely so
/// `bios::mock::MockBios`-driven tests can assert on which suspension
/// point was taken, since the `Bios` trait's own terminal primitives
/// (`load_state`, `load_context`, `halt`) are modeled as ordinary
/// (non-diverging) methods for exactly that reason (see `bios::Bios`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A process was resumed via a state-load.
    Resumed(Pid),
    /// Control passed up to the Support Level via a context-load.
    PassedUp(Pid),
    /// The machine halted (`processCount == 0`).
    Halted,
    /// The scheduler entered the wait-for-interrupt primitive.
    Waiting,
}
