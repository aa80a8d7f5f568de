//! PCB pool (spec.md §4.1) and process tree (§4.3).
//!
//! Grounded on `original_source/phase1/pcb.c`'s `initPcbs`/`allocPcb`/
//! `freePcb`/`insertChild`/`removeChild`/`outChild`. Per Design Note §9,
//! PCBs live in a fixed array addressed by a small integer handle instead
//! of the original's intrusive pointers; `Pid` is a separate, monotonic,
//! externally-visible identifier (never reused, unlike the array slot).

use crate::asl::SemKey;
use crate::bios::SavedState;
use crate::config::MAXPROC;

/// Externally visible process identifier. Assigned monotonically at
/// allocation (§4.1); never reused, unlike the arena slot it currently
/// occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

/// Internal arena slot — the PCB pool's array index for a live PCB.
/// Reused immediately after `PcbPool::free`; never exposed to syscalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u32);

impl Handle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A process control block (§3 DATA MODEL).
pub struct Pcb {
    pid: Pid,
    pub state: SavedState,
    pub cpu_time: u64,
    pub priority: i32,
    pub support: Option<*mut crate::bios::SupportStruct>,
    pub sem: Option<SemKey>,
    parent: Option<Handle>,
    children_head: Option<Handle>,
    children_tail: Option<Handle>,
    sib_next: Option<Handle>,
    sib_prev: Option<Handle>,
    pub(crate) q_next: Option<Handle>,
    pub(crate) q_prev: Option<Handle>,
}

impl Pcb {
    fn fresh(pid: Pid) -> Self {
        Pcb {
            pid,
            state: SavedState::empty(),
            cpu_time: 0,
            priority: 0,
            support: None,
            sem: None,
            parent: None,
            children_head: None,
            children_tail: None,
            sib_next: None,
            sib_prev: None,
            q_next: None,
            q_prev: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }
}

/// Fixed-size PCB arena (§4.1). `slots[h]` is `Some` iff `h` is a live
/// process; the free list is a plain index stack, since MAXPROC is small
/// and there is no heap to draw free nodes from.
pub struct PcbPool {
    slots: [Option<Pcb>; MAXPROC],
    free_stack: [u32; MAXPROC],
    free_top: usize,
    next_pid: u32,
}

impl PcbPool {
    /// *initialize-pool*: build a free list over all MAXPROC slots; PIDs
    /// start from 1 (§4.1).
    pub fn new() -> Self {
        let mut free_stack = [0u32; MAXPROC];
        for (i, slot) in free_stack.iter_mut().enumerate() {
            // Push in descending order so index 0 pops first — matches
            // allocating low slots before high ones, though allocation
            // order is not spec-significant.
            *slot = (MAXPROC - 1 - i) as u32;
        }
        PcbPool {
            slots: core::array::from_fn(|_| None),
            free_stack,
            free_top: MAXPROC,
            next_pid: 1,
        }
    }

    /// *allocate*: remove head of free list, assign next monotonic PID,
    /// zero everything else. "none" (here `None`) when the pool is empty.
    pub fn allocate(&mut self) -> Option<Handle> {
        if self.free_top == 0 {
            return None;
        }
        self.free_top -= 1;
        let idx = self.free_stack[self.free_top];
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        self.slots[idx as usize] = Some(Pcb::fresh(pid));
        Some(Handle(idx))
    }

    /// *free*: return the slot to the free pool. Caller guarantees `h` is
    /// already detached from every queue, the ASL, and its parent's child
    /// list (§4.1).
    pub fn free(&mut self, h: Handle) {
        self.slots[h.index()] = None;
        self.free_stack[self.free_top] = h.0;
        self.free_top += 1;
    }

    pub fn get(&self, h: Handle) -> &Pcb {
        self.slots[h.index()].as_ref().expect("stale PCB handle")
    }

    pub fn get_mut(&mut self, h: Handle) -> &mut Pcb {
        self.slots[h.index()].as_mut().expect("stale PCB handle")
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<Handle> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(p) if p.pid == pid))
            .map(|idx| Handle(idx as u32))
    }

    // --- Process tree (§4.3) ---
    //
    // Sibling links (`sib_next`/`sib_prev`) track child-list membership
    // only; `q_next`/`q_prev` (used by `queue::ProcQueue`) track
    // ready/blocked membership only. The two never interact.

    /// *insert-child*: set `child`'s parent pointer; append `child` to
    /// `parent`'s children list via the sibling link.
    pub fn insert_child(&mut self, parent: Handle, child: Handle) {
        self.get_mut(child).parent = Some(parent);
        self.get_mut(child).sib_prev = self.get(parent).children_tail;
        self.get_mut(child).sib_next = None;
        match self.get(parent).children_tail {
            Some(tail) => self.get_mut(tail).sib_next = Some(child),
            None => self.get_mut(parent).children_head = Some(child),
        }
        self.get_mut(parent).children_tail = Some(child);
    }

    /// *empty-children?*
    pub fn empty_children(&self, parent: Handle) -> bool {
        self.get(parent).children_head.is_none()
    }

    /// *remove-first-child*: detach the first child, clear its parent
    /// pointer, return it; "none" if there are no children.
    pub fn remove_first_child(&mut self, parent: Handle) -> Option<Handle> {
        let child = self.get(parent).children_head?;
        self.detach_sibling(parent, child);
        self.get_mut(child).parent = None;
        Some(child)
    }

    /// *remove-from-parent*: detach `child` from its parent's children
    /// list; "none" if `child` is a root.
    pub fn remove_from_parent(&mut self, child: Handle) -> Option<Handle> {
        let parent = self.get(child).parent?;
        self.detach_sibling(parent, child);
        self.get_mut(child).parent = None;
        Some(child)
    }

    fn detach_sibling(&mut self, parent: Handle, child: Handle) {
        let prev = self.get(child).sib_prev;
        let next = self.get(child).sib_next;
        match prev {
            Some(p) => self.get_mut(p).sib_next = next,
            None => self.get_mut(parent).children_head = next,
        }
        match next {
            Some(n) => self.get_mut(n).sib_prev = prev,
            None => self.get_mut(parent).children_tail = prev,
        }
        self.get_mut(child).sib_next = None;
        self.get_mut(child).sib_prev = None;
    }
}

impl Default for PcbPool {
    fn default() -> Self {
        Self::new()
    }
}
