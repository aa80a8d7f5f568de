//! One-shot bootstrap: populate the pass-up vector, initialize every pool
//! and global counter, create the root process, and hand off to the
//! scheduler.
//!
//! Grounded on `original_source/phase2/initial.c`'s `main()` and the
//! teaching kernel's `lib.rs::_start`/`scheduler::init`/`syscalls::init`
//! sequence.

use crate::bios::{Bios, PassUpRecord, PassUpVector, SavedState, StatusWord};
use crate::config::ROOT_PRIORITY;
use crate::log_info;
use crate::{kpanic, Nucleus, Outcome};

/// Initialize a fresh [`Nucleus`] and run the root process to its first
/// dispatch. `root_entry` is the program counter the root process starts
/// at (a test payload, out of this crate's scope per spec.md §1); the
/// caller supplies `pass_up` so the nucleus can wire the Level-4 trampoline
/// the way `initial.c` populates `passupvector_t`.
pub fn init<B: Bios>(mut bios: B, root_entry: u64, pass_up: PassUpVector) -> Outcome {
    bios.install_pass_up_vector(pass_up);
    bios.load_interval_timer(crate::config::PSECOND);

    let mut nucleus = Nucleus::new(bios);

    let root = match nucleus.pcbs.allocate() {
        Some(h) => h,
        None => kpanic!("boot: no free PCB for the root process"),
    };

    let ram_top = nucleus.bios.ram_top();
    {
        let pcb = nucleus.pcbs.get_mut(root);
        pcb.priority = ROOT_PRIORITY;
        pcb.state.pc = root_entry;
        pcb.state.status = StatusWord::KERNEL_MODE | StatusWord::INTERRUPTS_ENABLED;
        pcb.state.regs[SavedState::SP] = ram_top as i64;
    }

    nucleus.ready_queue.insert(&mut nucleus.pcbs, root);
    nucleus.process_count = 1;
    log_info!("boot: root pid={} entry={:#x}", nucleus.pcbs.get(root).pid().0, root_entry);

    crate::sched::run(&mut nucleus)
}

/// Convenience constructor for a pass-up vector pointing both trampolines
/// at the same handler, matching how a minimal Level-4 Support Level
/// would register itself at boot.
pub fn single_handler_pass_up_vector(handler_pc: u64, kernel_stack_ptr: u64) -> PassUpVector {
    let record = PassUpRecord {
        handler_pc,
        kernel_stack_ptr,
    };
    PassUpVector {
        tlb_refill: record,
        general_exception: record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::mock::MockBios;

    #[test]
    fn boot_creates_root_and_dispatches_it() {
        let bios = MockBios::new();
        let vector = single_handler_pass_up_vector(0x1000, 0x2000);
        let outcome = init(bios, 0x4000_0000, vector);
        assert_eq!(outcome, Outcome::Resumed(crate::pcb::Pid(1)));
    }
}
