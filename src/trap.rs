//! Exception dispatcher (spec.md §4.6) and pass-up-or-die (§4.9).
//!
//! Grounded on `original_source/phase2/exceptions.c`'s
//! `exceptionHandler`/`passUpOrDie`. Generalizes the teaching kernel's
//! `interrupts/idt.rs` cause-classification style (match on a cause
//! value, route to a handler function) away from the `x86-interrupt` ABI
//! extern-fn shape — not applicable to an abstract trap model — toward a
//! plain function taking the kernel state and the BIOS-saved state.

use crate::bios::{Bios, ExceptionClass, SavedState};
use crate::log_warn;
use crate::{interrupt, proc_mgmt, syscall, Nucleus, Outcome};

const SYSCALL_CODE_SYS: u32 = 8;
const SYSCALL_CODE_BREAKPOINT: u32 = 11;
const TLB_CODE_LO: u32 = 24;
const TLB_CODE_HI: u32 = 28;

/// Classify the trap's cause and route it (§4.6). Called once per trap
/// entry with the BIOS-saved state for the interrupted instruction.
pub fn dispatch<B: Bios>(nucleus: &mut Nucleus<B>, trapped: SavedState) -> Outcome {
    if trapped.is_interrupt() {
        return interrupt::service(nucleus, trapped);
    }

    let code = trapped.exception_code();
    if code == SYSCALL_CODE_SYS || code == SYSCALL_CODE_BREAKPOINT {
        return syscall::dispatch(nucleus, trapped);
    }
    if (TLB_CODE_LO..=TLB_CODE_HI).contains(&code) {
        log_warn!("trap: TLB exception code={}", code);
        return pass_up_or_die(nucleus, trapped, ExceptionClass::PgFault);
    }
    log_warn!("trap: program trap code={}", code);
    pass_up_or_die(nucleus, trapped, ExceptionClass::General)
}

/// Escalate `trapped` to the Support Level, or terminate the current
/// process's subtree if it registered none (§4.9).
pub fn pass_up_or_die<B: Bios>(
    nucleus: &mut Nucleus<B>,
    trapped: SavedState,
    class: ExceptionClass,
) -> Outcome {
    let current = match nucleus.current {
        Some(h) => h,
        None => crate::kpanic!("pass_up_or_die: no current process"),
    };
    let pid = nucleus.pcbs.get(current).pid();

    match nucleus.pcbs.get(current).support {
        None => {
            log_warn!("trap: pid={} has no support structure, dying", pid.0);
            nucleus.pcbs.get_mut(current).cpu_time +=
                nucleus.bios.read_tod() - nucleus.start_tod;
            proc_mgmt::terminate(nucleus, current);
            crate::sched::run(nucleus)
        }
        Some(support) => {
            let idx = class as usize;
            // SAFETY: `support` was registered by the process itself via
            // GETSUPPORTPTR/CreateProcess's a3 argument and is never
            // dereferenced except here and by GetSupportPtr's plain
            // return of the pointer value.
            unsafe {
                (*support).except_state[idx] = trapped;
                let ctx = (*support).except_context[idx];
                nucleus.bios.load_context(ctx);
            }
            Outcome::PassedUp(pid)
        }
    }
}
