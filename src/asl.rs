//! Active Semaphore List (spec.md §4.4): directory of semaphore keys with
//! non-empty waiter queues, backed by a descriptor pool sized `MAXPROC`.
//!
//! Grounded on `original_source/phase1/asl.c`'s `insertBlocked`/
//! `removeBlocked`/`outBlocked`/`headBlocked`.
//!
//! The original keys descriptors by a raw semaphore address and compares
//! pointer identity. This nucleus has no addressable user memory (virtual
//! memory is explicitly out of scope, spec.md §1), so `SemKey` splits the
//! two namespaces the original conflated behind one pointer: device/
//! pseudo-clock semaphores (identified by their `devSems` index) and
//! arbitrary user semaphores (identified by the raw address a process
//! passed in `a1`, dereferenced unsafely at the P/V call site the same way
//! the teaching kernel dereferences raw pointers from register arguments).
//! This keeps §4.10's "does `semAdd` lie within `devSems`" check a plain
//! pattern match instead of an address-range comparison.

use crate::config::MAXPROC;
use crate::pcb::{Handle, PcbPool};
use crate::queue::ProcQueue;

/// Semaphore identity (§3: "the identity is the address itself, not its
/// value").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemKey {
    /// A device or pseudo-clock semaphore, by its `devSems` index.
    Device(usize),
    /// An arbitrary user semaphore, by its raw address.
    User(u64),
}

impl SemKey {
    /// Whether this key names a slot in `devSems` — the check
    /// termination (§4.10 step 3) and the interrupt handler use to decide
    /// whether unblocking a waiter should also decrement `softBlockCount`.
    pub fn is_device(&self) -> bool {
        matches!(self, SemKey::Device(_))
    }
}

struct SemDescriptor {
    key: SemKey,
    queue: ProcQueue,
}

/// Fixed-size semaphore descriptor pool (§4.4).
pub struct Asl {
    descriptors: [Option<SemDescriptor>; MAXPROC],
    free_stack: [u32; MAXPROC],
    free_top: usize,
}

impl Asl {
    pub fn new() -> Self {
        let mut free_stack = [0u32; MAXPROC];
        for (i, slot) in free_stack.iter_mut().enumerate() {
            *slot = (MAXPROC - 1 - i) as u32;
        }
        Asl {
            descriptors: core::array::from_fn(|_| None),
            free_stack,
            free_top: MAXPROC,
        }
    }

    fn find(&self, key: SemKey) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|slot| matches!(slot, Some(d) if d.key == key))
    }

    /// *insert-blocked*: find or allocate the descriptor for `key`,
    /// append `pcb` to its FIFO queue, set `pcb.sem`. `false` iff the
    /// descriptor pool is exhausted (an invariant violation per §7 — the
    /// pool is sized to `MAXPROC` and can never hold more blocked PCBs
    /// than live processes).
    pub fn insert_blocked(&mut self, pool: &mut PcbPool, key: SemKey, pcb: Handle) -> bool {
        let idx = match self.find(key) {
            Some(idx) => idx,
            None => {
                if self.free_top == 0 {
                    return false;
                }
                self.free_top -= 1;
                let idx = self.free_stack[self.free_top] as usize;
                self.descriptors[idx] = Some(SemDescriptor {
                    key,
                    queue: ProcQueue::new(),
                });
                idx
            }
        };
        self.descriptors[idx].as_mut().unwrap().queue.insert(pool, pcb);
        pool.get_mut(pcb).sem = Some(key);
        true
    }

    /// *remove-blocked*: pop the head waiter on `key`'s descriptor, clear
    /// its `sem`, release the descriptor if its queue empties.
    pub fn remove_blocked(&mut self, pool: &mut PcbPool, key: SemKey) -> Option<Handle> {
        let idx = self.find(key)?;
        let h = self.descriptors[idx].as_mut().unwrap().queue.remove_head(pool)?;
        pool.get_mut(h).sem = None;
        self.release_if_empty(idx);
        Some(h)
    }

    /// *out-blocked*: remove `pcb` from the descriptor named by its own
    /// `sem` field; "none" if `pcb` is not currently blocked.
    pub fn out_blocked(&mut self, pool: &mut PcbPool, pcb: Handle) -> Option<Handle> {
        let key = pool.get(pcb).sem?;
        let idx = self.find(key)?;
        let removed = self.descriptors[idx].as_mut().unwrap().queue.remove(pool, pcb)?;
        pool.get_mut(removed).sem = None;
        self.release_if_empty(idx);
        Some(removed)
    }

    /// *head-blocked*: peek the first waiter on `key` without removing it.
    pub fn head_blocked(&self, key: SemKey) -> Option<Handle> {
        let idx = self.find(key)?;
        self.descriptors[idx].as_ref().unwrap().queue.head()
    }

    fn release_if_empty(&mut self, idx: usize) {
        if self.descriptors[idx].as_ref().unwrap().queue.is_empty() {
            self.descriptors[idx] = None;
            self.free_stack[self.free_top] = idx as u32;
            self.free_top += 1;
        }
    }
}

impl Default for Asl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_remove_restores_empty_asl() {
        let mut pool = PcbPool::new();
        let mut asl = Asl::new();
        let p = pool.allocate().unwrap();
        let key = SemKey::User(0x4000);

        assert!(asl.insert_blocked(&mut pool, key, p));
        assert_eq!(pool.get(p).sem, Some(key));
        assert_eq!(asl.head_blocked(key), Some(p));

        let removed = asl.remove_blocked(&mut pool, key).unwrap();
        assert_eq!(removed, p);
        assert!(pool.get(p).sem.is_none());
        assert!(asl.head_blocked(key).is_none());
    }

    #[test]
    fn fifo_order_within_one_semaphore() {
        let mut pool = PcbPool::new();
        let mut asl = Asl::new();
        let key = SemKey::Device(26);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        asl.insert_blocked(&mut pool, key, a);
        asl.insert_blocked(&mut pool, key, b);

        assert_eq!(asl.remove_blocked(&mut pool, key), Some(a));
        assert_eq!(asl.remove_blocked(&mut pool, key), Some(b));
        assert_eq!(asl.remove_blocked(&mut pool, key), None);
    }

    #[test]
    fn out_blocked_detaches_by_own_sem_field() {
        let mut pool = PcbPool::new();
        let mut asl = Asl::new();
        let key = SemKey::Device(48);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        asl.insert_blocked(&mut pool, key, a);
        asl.insert_blocked(&mut pool, key, b);

        assert_eq!(asl.out_blocked(&mut pool, b), Some(b));
        assert!(pool.get(b).sem.is_none());
        assert_eq!(asl.head_blocked(key), Some(a));
        assert_eq!(asl.out_blocked(&mut pool, b), None);
    }

    #[test]
    fn device_key_reports_is_device() {
        assert!(SemKey::Device(0).is_device());
        assert!(!SemKey::User(0).is_device());
    }
}
