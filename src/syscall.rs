//! Syscall handler (spec.md §4.7): the ten kernel services.
//!
//! Grounded on `original_source/phase2/exceptions.c`'s `syscallHandler`,
//! which implements five of the ten (CREATEPROCESS, TERMPROCESS,
//! PASSEREN, VERHOGEN, YIELD — an earlier iteration of the same kernel);
//! extended here with DOIO, GETCPUTIME, WAITCLOCK, GETSUPPORTPTR, and
//! GETPROCESSID per spec.md §4.7's full service table. Generalizes the
//! teaching kernel's `syscalls::dispatch` match-on-number shape and its
//! register-argument convention onto the spec's a0..a3 registers.

use crate::asl::SemKey;
use crate::bios::{Bios, ExceptionClass, SavedState, StatusWord};
use crate::config::{self, PSEUDOCLOCK_SEM};
use crate::log_info;
use crate::pcb::Handle;
use crate::{proc_mgmt, sched, trap, Nucleus, Outcome};

pub const NSYS1_CREATEPROCESS: i64 = 1;
pub const NSYS2_TERMPROCESS: i64 = 2;
pub const NSYS3_PASSEREN: i64 = 3;
pub const NSYS4_VERHOGEN: i64 = 4;
pub const NSYS5_DOIO: i64 = 5;
pub const NSYS6_GETCPUTIME: i64 = 6;
pub const NSYS7_WAITCLOCK: i64 = 7;
pub const NSYS8_GETSUPPORTPTR: i64 = 8;
pub const NSYS9_GETPROCESSID: i64 = 9;
pub const NSYS10_YIELD: i64 = 10;

/// Entry point from `trap::dispatch` for exception codes 8/11 (§4.6).
/// `trapped` is the BIOS-saved state of the instruction that trapped.
pub fn dispatch<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let sys_code = trapped.a0();

    // Rule 1 (§4.7): a negative syscall code from user mode is really a
    // privileged-instruction attempt — synthesize a program trap.
    if !trapped.status.contains(StatusWord::KERNEL_MODE) && sys_code < 0 {
        trapped.cause = synthesize_privileged_instruction_cause();
        return trap::pass_up_or_die(nucleus, trapped, ExceptionClass::General);
    }
    // Rule 2: undefined or positive codes are not kernel services.
    if sys_code >= 1 {
        return trap::pass_up_or_die(nucleus, trapped, ExceptionClass::General);
    }

    let service = -sys_code;
    log_info!("syscall: code={}", service);
    match service {
        NSYS1_CREATEPROCESS => create_process(nucleus, trapped),
        NSYS2_TERMPROCESS => terminate_process(nucleus, trapped),
        NSYS3_PASSEREN => passeren(nucleus, trapped),
        NSYS4_VERHOGEN => verhogen(nucleus, trapped),
        NSYS5_DOIO => doio(nucleus, trapped),
        NSYS6_GETCPUTIME => get_cpu_time(nucleus, trapped),
        NSYS7_WAITCLOCK => wait_clock(nucleus, trapped),
        NSYS8_GETSUPPORTPTR => get_support_ptr(nucleus, trapped),
        NSYS9_GETPROCESSID => get_process_id(nucleus, trapped),
        NSYS10_YIELD => yield_now(nucleus, trapped),
        _ => trap::pass_up_or_die(nucleus, trapped, ExceptionClass::General),
    }
}

/// Placeholder "privileged instruction" cause value — a fixed exception
/// code reserved for syscalls §4.7 rule 1 synthesizes when user mode
/// issues a negative sysCode.
const PRIVILEGED_INSTRUCTION_CODE: u32 = 11;
fn synthesize_privileged_instruction_cause() -> u32 {
    PRIVILEGED_INSTRUCTION_CODE << 2
}

fn charge_cpu_time<B: Bios>(nucleus: &mut Nucleus<B>, who: Handle) {
    let elapsed = nucleus.bios.read_tod() - nucleus.start_tod;
    nucleus.pcbs.get_mut(who).cpu_time += elapsed;
}

fn current<B: Bios>(nucleus: &Nucleus<B>) -> Handle {
    match nucleus.current {
        Some(h) => h,
        None => crate::kpanic!("syscall dispatched with no current process"),
    }
}

fn create_process<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    trapped.advance_pc();
    let caller = current(nucleus);
    nucleus.pcbs.get_mut(caller).state = trapped;

    match nucleus.pcbs.allocate() {
        None => {
            nucleus.pcbs.get_mut(caller).state.set_a0(-1);
        }
        Some(child) => {
            // SAFETY: a1 is a pointer to a SavedState the caller owns;
            // word-by-word copy avoids relying on a library memcpy in
            // freestanding code (Design Note §9).
            let state_ptr = trapped.a1() as *const SavedState;
            let copied = unsafe { core::ptr::read(state_ptr) };
            nucleus.pcbs.get_mut(child).state = copied;
            nucleus.pcbs.get_mut(child).priority = trapped.a2() as i32;
            let support = trapped.a3();
            nucleus.pcbs.get_mut(child).support = if support == 0 {
                None
            } else {
                Some(support as *mut crate::bios::SupportStruct)
            };
            nucleus.ready_queue.insert(&mut nucleus.pcbs, child);
            nucleus.pcbs.insert_child(caller, child);
            nucleus.process_count += 1;
            let new_pid = nucleus.pcbs.get(child).pid();
            nucleus.pcbs.get_mut(caller).state.set_a0(new_pid.0 as i64);
        }
    }
    nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
    Outcome::Resumed(nucleus.pcbs.get(caller).pid())
}

fn terminate_process<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    nucleus.pcbs.get_mut(caller).state = trapped;

    let target_pid = trapped.a1();
    let target = if target_pid == 0 {
        Some(caller)
    } else {
        nucleus
            .pcbs
            .find_by_pid(crate::pcb::Pid(target_pid as u32))
    };

    if let Some(h) = target {
        proc_mgmt::terminate(nucleus, h);
    }
    sched::run(nucleus)
}

fn passeren<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    trapped.advance_pc();
    let caller = current(nucleus);
    let sem_addr = trapped.a1() as u64;
    // SAFETY: the address is a raw pointer value supplied by the caller,
    // the same way the original dereferences semAddr through a C pointer.
    let value = unsafe {
        let ptr = sem_addr as *mut i32;
        *ptr -= 1;
        *ptr
    };

    if value < 0 {
        nucleus.pcbs.get_mut(caller).state = trapped;
        charge_cpu_time(nucleus, caller);
        nucleus
            .asl
            .insert_blocked(&mut nucleus.pcbs, SemKey::User(sem_addr), caller);
        nucleus.current = None;
        sched::run(nucleus)
    } else {
        nucleus.pcbs.get_mut(caller).state = trapped;
        nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
        Outcome::Resumed(nucleus.pcbs.get(caller).pid())
    }
}

fn verhogen<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    let sem_addr = trapped.a1() as u64;
    let value = unsafe {
        let ptr = sem_addr as *mut i32;
        *ptr += 1;
        *ptr
    };

    if value <= 0 {
        if let Some(waiter) = nucleus
            .asl
            .remove_blocked(&mut nucleus.pcbs, SemKey::User(sem_addr))
        {
            nucleus.ready_queue.insert(&mut nucleus.pcbs, waiter);
        }
    }

    trapped.advance_pc();
    nucleus.pcbs.get_mut(caller).state = trapped;
    nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
    Outcome::Resumed(nucleus.pcbs.get(caller).pid())
}

fn doio<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    let command_addr = trapped.a1() as u32;
    let command_word = trapped.a2() as u32;

    let offset = command_addr - config::DEV_REG_START;
    let addr = config::decode_device_register(offset);
    let sem_index = config::device_address_sem_index(addr);

    trapped.advance_pc();
    nucleus.pcbs.get_mut(caller).state = trapped;
    charge_cpu_time(nucleus, caller);

    nucleus.dev_sems[sem_index] -= 1;
    nucleus
        .asl
        .insert_blocked(&mut nucleus.pcbs, SemKey::Device(sem_index), caller);
    nucleus.soft_block_count += 1;
    nucleus.current = None;

    let register = nucleus.bios.device_register(addr.line, addr.device);
    if addr.line == config::IL_TERMINAL {
        if addr.is_terminal_transmit {
            register.set_transm_command(command_word);
        } else {
            register.set_recv_command(command_word);
        }
    } else {
        register.set_command(command_word);
    }

    sched::run(nucleus)
}

fn get_cpu_time<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    let now = nucleus.bios.read_tod();
    let total = nucleus.pcbs.get(caller).cpu_time + (now - nucleus.start_tod);
    trapped.set_a0(total as i64);
    trapped.advance_pc();
    nucleus.pcbs.get_mut(caller).state = trapped;
    nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
    Outcome::Resumed(nucleus.pcbs.get(caller).pid())
}

fn wait_clock<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    trapped.advance_pc();
    let caller = current(nucleus);
    nucleus.pcbs.get_mut(caller).state = trapped;
    charge_cpu_time(nucleus, caller);

    nucleus.dev_sems[PSEUDOCLOCK_SEM] -= 1;
    nucleus
        .asl
        .insert_blocked(&mut nucleus.pcbs, SemKey::Device(PSEUDOCLOCK_SEM), caller);
    nucleus.soft_block_count += 1;
    nucleus.current = None;
    sched::run(nucleus)
}

fn get_support_ptr<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    let ptr = nucleus
        .pcbs
        .get(caller)
        .support
        .map(|p| p as u64)
        .unwrap_or(0);
    trapped.set_a0(ptr as i64);
    trapped.advance_pc();
    nucleus.pcbs.get_mut(caller).state = trapped;
    nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
    Outcome::Resumed(nucleus.pcbs.get(caller).pid())
}

fn get_process_id<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    let caller = current(nucleus);
    let pid = if trapped.a1() == 0 {
        nucleus.pcbs.get(caller).pid().0
    } else {
        match nucleus.pcbs.get(caller).parent() {
            Some(parent) => nucleus.pcbs.get(parent).pid().0,
            None => 0,
        }
    };
    trapped.set_a0(pid as i64);
    trapped.advance_pc();
    nucleus.pcbs.get_mut(caller).state = trapped;
    nucleus.bios.load_state(&nucleus.pcbs.get(caller).state);
    Outcome::Resumed(nucleus.pcbs.get(caller).pid())
}

fn yield_now<B: Bios>(nucleus: &mut Nucleus<B>, mut trapped: SavedState) -> Outcome {
    trapped.advance_pc();
    let caller = current(nucleus);
    nucleus.pcbs.get_mut(caller).state = trapped;
    charge_cpu_time(nucleus, caller);
    nucleus.ready_queue.insert(&mut nucleus.pcbs, caller);
    nucleus.current = None;
    sched::run(nucleus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::mock::MockBios;

    fn state_with(a0: i64, a1: i64, a2: i64, a3: i64) -> SavedState {
        let mut s = SavedState::empty();
        s.status = StatusWord::KERNEL_MODE;
        s.set_a0(a0);
        s.regs[SavedState::A1] = a1;
        s.regs[SavedState::A2] = a2;
        s.regs[SavedState::A3] = a3;
        s
    }

    #[test]
    fn create_process_exhaustion_returns_minus_one() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let caller = nucleus.pcbs.allocate().unwrap();
        nucleus.current = Some(caller);
        nucleus.process_count = 1;
        // Exhaust the pool so the syscall's own allocate() fails.
        while nucleus.pcbs.allocate().is_some() {}

        let state = state_with(-NSYS1_CREATEPROCESS, 0, 0, 0);
        dispatch(&mut nucleus, state);
        assert_eq!(nucleus.pcbs.get(caller).state.a0(), -1);
    }

    #[test]
    fn passeren_blocks_when_semaphore_goes_negative() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let caller = nucleus.pcbs.allocate().unwrap();
        nucleus.current = Some(caller);
        nucleus.process_count = 1;
        let mut sem: i32 = 0;
        let sem_addr = &mut sem as *mut i32 as i64;

        let state = state_with(-NSYS3_PASSEREN, sem_addr, 0, 0);
        let outcome = dispatch(&mut nucleus, state);
        assert_eq!(outcome, Outcome::Halted);
        assert_eq!(sem, -1);
        assert!(nucleus.current.is_none());
        assert_eq!(
            nucleus.asl.head_blocked(SemKey::User(sem_addr as u64)),
            Some(caller)
        );
    }

    #[test]
    fn verhogen_wakes_a_blocked_waiter() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let waiter = nucleus.pcbs.allocate().unwrap();
        let waker = nucleus.pcbs.allocate().unwrap();
        nucleus.process_count = 2;
        let mut sem: i32 = -1;
        let sem_addr = &mut sem as *mut i32 as i64;
        nucleus
            .asl
            .insert_blocked(&mut nucleus.pcbs, SemKey::User(sem_addr as u64), waiter);

        nucleus.current = Some(waker);
        let state = state_with(-NSYS4_VERHOGEN, sem_addr, 0, 0);
        let outcome = dispatch(&mut nucleus, state);

        assert_eq!(outcome, Outcome::Resumed(nucleus.pcbs.get(waker).pid()));
        assert_eq!(sem, 0);
        assert!(nucleus
            .asl
            .head_blocked(SemKey::User(sem_addr as u64))
            .is_none());
    }

    #[test]
    fn doio_queues_on_the_derived_device_semaphore() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let caller = nucleus.pcbs.allocate().unwrap();
        nucleus.current = Some(caller);
        nucleus.process_count = 1;

        // line 6 (printer), device 2: offset = (6-3)*0x80 + 2*0x10 = 0x1A0.
        let offset: u32 = 3 * 0x80 + 2 * 0x10;
        let addr = config::DEV_REG_START + offset;
        let state = state_with(-NSYS5_DOIO, addr as i64, 0x2a, 0);

        let outcome = dispatch(&mut nucleus, state);
        assert_eq!(outcome, Outcome::Waiting);
        assert_eq!(nucleus.dev_sems[26], -1);
        assert_eq!(nucleus.soft_block_count, 1);
        assert_eq!(
            nucleus.asl.head_blocked(SemKey::Device(26)),
            Some(caller)
        );
    }

    #[test]
    fn get_process_id_reports_parent_or_zero_for_root() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let root = nucleus.pcbs.allocate().unwrap();
        let child = nucleus.pcbs.allocate().unwrap();
        nucleus.pcbs.insert_child(root, child);
        nucleus.process_count = 2;

        nucleus.current = Some(child);
        let state = state_with(-NSYS9_GETPROCESSID, 1, 0, 0);
        dispatch(&mut nucleus, state);
        assert_eq!(
            nucleus.pcbs.get(child).state.a0() as u32,
            nucleus.pcbs.get(root).pid().0
        );

        nucleus.current = Some(root);
        let state = state_with(-NSYS9_GETPROCESSID, 1, 0, 0);
        dispatch(&mut nucleus, state);
        assert_eq!(nucleus.pcbs.get(root).state.a0(), 0);
    }

    #[test]
    fn negative_code_from_user_mode_synthesizes_privileged_trap() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let caller = nucleus.pcbs.allocate().unwrap();
        nucleus.current = Some(caller);
        nucleus.process_count = 1;

        let mut state = state_with(-NSYS1_CREATEPROCESS, 0, 0, 0);
        state.status = StatusWord::empty(); // user mode
        let outcome = dispatch(&mut nucleus, state);
        assert_eq!(outcome, Outcome::Halted); // dies: no support structure
    }
}
