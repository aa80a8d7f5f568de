//! Priority-ordered process queue (spec.md §4.2): the ready queue, and the
//! queue embedded in every ASL descriptor.
//!
//! Grounded on `original_source/phase1/pcb.c`'s `insertProcQ`/`headProcQ`/
//! `removeProcQ`/`outProcQ`/`emptyProcQ`. Implemented as an index-linked
//! doubly linked list over the PCB arena (`pcb::PcbPool`) rather than the
//! original's embedded sentinel node, per Design Note §9 — the queue
//! itself only ever holds `(head, tail)`; the links live in each `Pcb`.

use crate::pcb::{Handle, PcbPool};

/// A priority-ordered doubly linked queue of PCB handles. Holds no data of
/// its own beyond head/tail; link storage lives in `Pcb::q_next`/`q_prev`.
#[derive(Debug, Clone, Copy)]
pub struct ProcQueue {
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl ProcQueue {
    pub const fn new() -> Self {
        ProcQueue {
            head: None,
            tail: None,
        }
    }

    /// *empty?*
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// *head*: peek without removing; "none" on empty.
    pub fn head(&self) -> Option<Handle> {
        self.head
    }

    /// *insert*: walk from head, splice `h` immediately before the first
    /// node whose priority is lower than `h`'s; append to tail if none
    /// exists. Strictly-decreasing priority order, FIFO within a band.
    pub fn insert(&mut self, pool: &mut PcbPool, h: Handle) {
        let priority = pool.get(h).priority;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            if pool.get(node).priority < priority {
                break;
            }
            cursor = pool.get(node).q_next;
        }

        match cursor {
            Some(before) => {
                let prev = pool.get(before).q_prev;
                pool.get_mut(h).q_prev = prev;
                pool.get_mut(h).q_next = Some(before);
                pool.get_mut(before).q_prev = Some(h);
                match prev {
                    Some(p) => pool.get_mut(p).q_next = Some(h),
                    None => self.head = Some(h),
                }
            }
            None => {
                pool.get_mut(h).q_prev = self.tail;
                pool.get_mut(h).q_next = None;
                match self.tail {
                    Some(t) => pool.get_mut(t).q_next = Some(h),
                    None => self.head = Some(h),
                }
                self.tail = Some(h);
            }
        }
    }

    /// *remove-head*: remove and return the first PCB; "none" on empty.
    /// The removed node's links are reset so a later re-insertion starts
    /// clean (§4.2).
    pub fn remove_head(&mut self, pool: &mut PcbPool) -> Option<Handle> {
        let h = self.head?;
        self.unlink(pool, h);
        Some(h)
    }

    /// *remove-identity*: scan for `h`; unlink and return it, or "none" if
    /// it is not a member of this queue.
    pub fn remove(&mut self, pool: &mut PcbPool, h: Handle) -> Option<Handle> {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            if node == h {
                self.unlink(pool, h);
                return Some(h);
            }
            cursor = pool.get(node).q_next;
        }
        None
    }

    fn unlink(&mut self, pool: &mut PcbPool, h: Handle) {
        let prev = pool.get(h).q_prev;
        let next = pool.get(h).q_next;
        match prev {
            Some(p) => pool.get_mut(p).q_next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => pool.get_mut(n).q_prev = prev,
            None => self.tail = prev,
        }
        pool.get_mut(h).q_next = None;
        pool.get_mut(h).q_prev = None;
    }
}

impl Default for ProcQueue {
    fn default() -> Self {
        Self::new()
    }
}
