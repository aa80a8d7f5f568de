//! Interrupt handler (spec.md §4.8): services exactly one interrupt per
//! invocation, in strict priority order.
//!
//! Grounded in full on `original_source/phase2/interrupts.c` (PLT
//! handling, interval-timer pseudo-clock drain, device line arbitration
//! including terminal TX-over-RX priority). Generalizes the teaching
//! kernel's `idt.rs` PIC end-of-interrupt acknowledgement into the
//! `bios::Bios` trait's device-register accessors.

use crate::asl::SemKey;
use crate::bios::{status_code, Bios, InterruptMask, SavedState};
use crate::config::{self, PSEUDOCLOCK_SEM, TIMESLICE};
use crate::log_info;
use crate::{sched, Nucleus, Outcome};

/// Service the highest-priority pending interrupt (§4.8). `trapped` is
/// the state the BIOS saved for whatever the processor was doing when
/// the interrupt arrived.
pub fn service<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    let pending = nucleus.bios.pending_lines();

    if pending.contains(InterruptMask::CPU_TIMER) {
        return service_plt(nucleus, trapped);
    }
    if pending.contains(InterruptMask::INTERVAL_TIMER) {
        return service_interval_timer(nucleus, trapped);
    }
    for line in config::IL_DISK..=config::IL_TERMINAL {
        if nucleus.bios.line_device_bitmap(line) != 0 {
            return service_device_line(nucleus, trapped, line);
        }
    }
    // Spurious: no source matched. Same resume rule as every other path.
    resume_or_schedule(nucleus, trapped)
}

fn service_plt<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    nucleus.bios.set_timer(TIMESLICE);
    if let Some(current) = nucleus.current {
        log_info!("interrupt: PLT expiry pid={}", nucleus.pcbs.get(current).pid().0);
        let elapsed = nucleus.bios.read_tod() - nucleus.start_tod;
        nucleus.pcbs.get_mut(current).cpu_time += elapsed;
        nucleus.pcbs.get_mut(current).state = trapped;
        nucleus.ready_queue.insert(&mut nucleus.pcbs, current);
        nucleus.current = None;
    }
    sched::run(nucleus)
}

fn service_interval_timer<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    nucleus.bios.load_interval_timer(config::PSECOND);
    log_info!("interrupt: pseudo-clock tick");
    while let Some(waiter) = nucleus
        .asl
        .remove_blocked(&mut nucleus.pcbs, SemKey::Device(PSEUDOCLOCK_SEM))
    {
        nucleus.pcbs.get_mut(waiter).state.set_a0(0);
        nucleus.ready_queue.insert(&mut nucleus.pcbs, waiter);
        nucleus.soft_block_count -= 1;
    }
    nucleus.dev_sems[PSEUDOCLOCK_SEM] = 0;
    resume_or_schedule(nucleus, trapped)
}

fn service_device_line<B: Bios>(
    nucleus: &mut Nucleus<B>,
    trapped: SavedState,
    line: u32,
) -> Outcome {
    let bitmap = nucleus.bios.line_device_bitmap(line);
    let device = bitmap.trailing_zeros();

    let (sem_index, status) = if line == config::IL_TERMINAL {
        let register = nucleus.bios.device_register(line, device);
        let tx_status = register.transm_status();
        let rx_status = register.recv_status();
        if !is_idle(tx_status) {
            register.set_transm_command(status_code::ACK);
            (config::term_tx_sem(device), tx_status)
        } else {
            register.set_recv_command(status_code::ACK);
            (config::term_rx_sem(device), rx_status)
        }
    } else {
        let register = nucleus.bios.device_register(line, device);
        let status = register.status();
        register.set_command(status_code::ACK);
        (config::dev_sem_base(line, device), status)
    };

    log_info!("interrupt: device line={} device={} sem={}", line, device, sem_index);
    nucleus.dev_sems[sem_index] += 1;
    if nucleus.dev_sems[sem_index] <= 0 {
        if let Some(waiter) = nucleus
            .asl
            .remove_blocked(&mut nucleus.pcbs, SemKey::Device(sem_index))
        {
            nucleus.pcbs.get_mut(waiter).state.set_a0(status as i64);
            nucleus.ready_queue.insert(&mut nucleus.pcbs, waiter);
            nucleus.soft_block_count -= 1;
        }
    }

    resume_or_schedule(nucleus, trapped)
}

fn is_idle(status_word: u32) -> bool {
    let low_byte = status_word & 0xFF;
    low_byte == status_code::READY || low_byte == status_code::BUSY
}

fn resume_or_schedule<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    match nucleus.current {
        Some(current) => {
            nucleus.pcbs.get_mut(current).state = trapped;
            let pid = nucleus.pcbs.get(current).pid();
            nucleus.bios.load_state(&nucleus.pcbs.get(current).state);
            Outcome::Resumed(pid)
        }
        None => sched::run(nucleus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::mock::MockBios;

    fn trapped() -> SavedState {
        SavedState::empty()
    }

    #[test]
    fn plt_expiry_requeues_current_and_schedules() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let current = nucleus.pcbs.allocate().unwrap();
        nucleus.pcbs.get_mut(current).priority = 3;
        nucleus.current = Some(current);
        nucleus.process_count = 1;
        nucleus.bios.raise_device(config::IL_CPU_TIMER, 0);

        let outcome = service(&mut nucleus, trapped());
        // Requeued, then immediately redispatched since it's the only
        // ready process.
        assert_eq!(outcome, Outcome::Resumed(nucleus.pcbs.get(current).pid()));
        assert_eq!(nucleus.current, Some(current));
    }

    #[test]
    fn pseudo_clock_tick_wakes_all_waiters() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let a = nucleus.pcbs.allocate().unwrap();
        let b = nucleus.pcbs.allocate().unwrap();
        let c = nucleus.pcbs.allocate().unwrap();
        nucleus.process_count = 3;
        for h in [a, b, c] {
            nucleus
                .asl
                .insert_blocked(&mut nucleus.pcbs, SemKey::Device(PSEUDOCLOCK_SEM), h);
        }
        nucleus.soft_block_count = 3;
        nucleus.dev_sems[PSEUDOCLOCK_SEM] = -3;
        nucleus.bios.raise_device(config::IL_TIMER, 0);

        let outcome = service(&mut nucleus, trapped());
        // All three were requeued; the scheduler immediately dispatches
        // the first one (FIFO within equal priority).
        assert_eq!(outcome, Outcome::Resumed(nucleus.pcbs.get(a).pid()));
        assert_eq!(nucleus.soft_block_count, 0);
        assert_eq!(nucleus.dev_sems[PSEUDOCLOCK_SEM], 0);
        for h in [a, b, c] {
            assert_eq!(nucleus.pcbs.get(h).state.a0(), 0);
        }
    }

    #[test]
    fn device_interrupt_wakes_the_queued_waiter_with_snapshotted_status() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let waiter = nucleus.pcbs.allocate().unwrap();
        nucleus.process_count = 1;
        let sem_index = config::dev_sem_base(6, 2);
        nucleus
            .asl
            .insert_blocked(&mut nucleus.pcbs, SemKey::Device(sem_index), waiter);
        nucleus.dev_sems[sem_index] = -1;
        nucleus.soft_block_count = 1;

        // Simulate completion status word (nonzero low byte, not READY/BUSY).
        nucleus.bios.device_register(6, 2).set_status_for_test(5);
        nucleus.bios.raise_device(6, 2);

        let outcome = service(&mut nucleus, trapped());
        assert_eq!(outcome, Outcome::Resumed(nucleus.pcbs.get(waiter).pid()));
        assert_eq!(nucleus.dev_sems[sem_index], 0);
        assert_eq!(nucleus.soft_block_count, 0);
        assert_eq!(nucleus.pcbs.get(waiter).state.a0(), 5);
    }
}
