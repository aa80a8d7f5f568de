//! Recursive subtree termination (spec.md §4.10), shared by
//! `syscall::terminate_process` (NSYS2) and `trap::pass_up_or_die`'s die
//! path.
//!
//! Grounded on `original_source/phase1/pcb.c`'s `removeChild`-driven
//! recursion as invoked by `original_source/phase2/exceptions.c`'s
//! `terminateProcess`. Split into its own module the way the teaching
//! kernel splits `sys_fork`/`exit_current`/`sys_wait` out of its syscall
//! dispatch match into free functions in `scheduler::mod`.

use crate::asl::SemKey;
use crate::bios::Bios;
use crate::pcb::Handle;
use crate::Nucleus;

/// Recursively terminate `target` and its entire descendant subtree
/// (§4.10). Children are drained and terminated before the target itself
/// so every PCB is fully detached before any destructive step runs.
///
/// Recursion depth is bounded by process-tree depth, itself bounded by
/// `MAXPROC` (Design Note §9 flags unbounded recursion as a risk on
/// pathological trees; with at most `MAXPROC` live processes the worst
/// case is a single chain of `MAXPROC` ancestors, well within any stack
/// budget this kernel runs with).
pub fn terminate<B: Bios>(nucleus: &mut Nucleus<B>, target: Handle) {
    while let Some(child) = nucleus.pcbs.remove_first_child(target) {
        terminate(nucleus, child);
    }

    nucleus.process_count -= 1;

    if nucleus.current == Some(target) {
        nucleus.current = None;
    } else if let Some(sem) = nucleus.pcbs.get(target).sem {
        nucleus.asl.out_blocked(&mut nucleus.pcbs, target);
        if matches!(sem, SemKey::Device(_)) {
            nucleus.soft_block_count -= 1;
        }
    } else {
        nucleus.ready_queue.remove(&mut nucleus.pcbs, target);
    }

    nucleus.pcbs.remove_from_parent(target);
    nucleus.pcbs.free(target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::mock::MockBios;
    use crate::asl::SemKey;

    fn spawn<B: Bios>(nucleus: &mut Nucleus<B>, parent: Option<Handle>) -> Handle {
        let h = nucleus.pcbs.allocate().unwrap();
        nucleus.process_count += 1;
        if let Some(p) = parent {
            nucleus.pcbs.insert_child(p, h);
        }
        h
    }

    #[test]
    fn terminates_whole_subtree_and_frees_pool() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let root = spawn(&mut nucleus, None);
        let c1 = spawn(&mut nucleus, Some(root));
        let g1 = spawn(&mut nucleus, Some(c1));
        nucleus.ready_queue.insert(&mut nucleus.pcbs, c1);
        nucleus.ready_queue.insert(&mut nucleus.pcbs, g1);
        nucleus.current = Some(root);

        terminate(&mut nucleus, root);

        assert_eq!(nucleus.process_count, 0);
        assert!(nucleus.current.is_none());
        assert!(nucleus.ready_queue.is_empty());
    }

    #[test]
    fn terminating_device_blocked_descendant_drops_soft_block_count() {
        let mut nucleus = Nucleus::new(MockBios::new());
        let root = spawn(&mut nucleus, None);
        let c1 = spawn(&mut nucleus, Some(root));
        nucleus.current = Some(root);
        nucleus
            .asl
            .insert_blocked(&mut nucleus.pcbs, SemKey::Device(26), c1);
        nucleus.soft_block_count = 1;

        terminate(&mut nucleus, root);

        assert_eq!(nucleus.soft_block_count, 0);
        assert_eq!(nucleus.process_count, 0);
    }
}
