//! Scheduler (spec.md §4.5): dispatch, halt, wait, or panic, depending on
//! the ready queue and the two live-process counters.
//!
//! Grounded on `original_source/phase2/scheduler.c`'s `scheduler(void)`,
//! generalizing the teaching kernel's `scheduler::yield_now`/
//! `exit_current` dispatch-or-halt-or-panic shape onto the `bios::Bios`
//! trait instead of direct `x86_64::instructions` calls.

use crate::bios::{Bios, InterruptMask};
use crate::config::TIMESLICE;
use crate::log_info;
use crate::{kpanic, Nucleus, Outcome};

/// Run one scheduling decision (§4.5). Every branch is terminal: the
/// caller must have already committed all state to memory, since in
/// production `bios.load_state`/`bios.halt` never return (see
/// `Outcome`'s doc comment for why this still returns a value).
pub fn run<B: Bios>(nucleus: &mut Nucleus<B>) -> Outcome {
    if let Some(next) = nucleus.ready_queue.remove_head(&mut nucleus.pcbs) {
        nucleus.current = Some(next);
        nucleus.start_tod = nucleus.bios.read_tod();
        nucleus.bios.set_timer(TIMESLICE);
        let pid = nucleus.pcbs.get(next).pid();
        log_info!("scheduler: dispatch pid={}", pid.0);
        nucleus.bios.load_state(&nucleus.pcbs.get(next).state);
        return Outcome::Resumed(pid);
    }

    if nucleus.process_count == 0 {
        log_info!("scheduler: halt, no live processes");
        nucleus.bios.halt();
        return Outcome::Halted;
    }

    if nucleus.soft_block_count > 0 {
        nucleus.current = None;
        // "No current process" window (Design Note §9): mask the
        // per-processor timer so it cannot fire with nothing running.
        nucleus
            .bios
            .set_interrupt_enable(InterruptMask::ALL - InterruptMask::CPU_TIMER);
        log_info!("scheduler: wait, soft_block_count={}", nucleus.soft_block_count);
        nucleus.bios.wait();
        return Outcome::Waiting;
    }

    kpanic!("scheduler: deadlock, {} live processes all blocked", nucleus.process_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::mock::MockBios;

    #[test]
    fn dispatches_highest_priority_ready_process() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let h = nucleus.pcbs.allocate().unwrap();
        nucleus.pcbs.get_mut(h).priority = 5;
        nucleus.ready_queue.insert(&mut nucleus.pcbs, h);
        nucleus.process_count = 1;

        let outcome = run(&mut nucleus);
        assert_eq!(outcome, Outcome::Resumed(nucleus.pcbs.get(h).pid()));
        assert_eq!(nucleus.current, Some(h));
        assert_eq!(nucleus.bios.timer_ticks, TIMESLICE);
    }

    #[test]
    fn halts_when_no_live_processes() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let outcome = run(&mut nucleus);
        assert_eq!(outcome, Outcome::Halted);
        assert!(nucleus.bios.halted);
    }

    #[test]
    fn waits_when_soft_blocked_with_timer_masked() {
        let mut nucleus = Nucleus::new(MockBios::new());
        nucleus.process_count = 1;
        nucleus.soft_block_count = 1;
        let outcome = run(&mut nucleus);
        assert_eq!(outcome, Outcome::Waiting);
        assert!(nucleus.current.is_none());
        assert!(!nucleus
            .bios
            .interrupt_enable()
            .contains(InterruptMask::CPU_TIMER));
        assert!(nucleus.bios.waited);
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn panics_on_deadlock() {
        let mut nucleus = Nucleus::new(MockBios::new());
        nucleus.process_count = 1;
        nucleus.soft_block_count = 0;
        run(&mut nucleus);
    }
}
