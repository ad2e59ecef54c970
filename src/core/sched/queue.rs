//! Multi-level round-robin ready queue
//!
//! One fixed slot table per priority class. The occupied slots of a
//! class form a circular singly-linked list threaded through `link`,
//! and a per-class tail cursor advances one link per election, which
//! yields strict FIFO round-robin inside the class. Two mappings are
//! kept mutually consistent at all times: the identity stored in each
//! cell and the location recorded for each identity.
//!
//! Election reads nothing but this queue, so exchanging the
//! identities of two cells moves each task's effective urgency
//! without touching any priority anywhere else. That exchange is the
//! whole priority-inheritance mechanism.
//!
//! Callers mutate the queue only with interrupts masked.

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_MAX, CFG_SLOTS_PER_PRIO};
use crate::prio::PrioTable;
use crate::types::{os_slot_index, os_slot_prio, OsPrio, OsSlotId, OsTaskId};

/// Ready queue over every priority class
pub struct ReadyQueue {
    /// Task identity stored in each (priority, slot) cell
    ident: [[Option<OsTaskId>; CFG_SLOTS_PER_PRIO]; CFG_PRIO_MAX],
    /// Next occupied slot in the class's circular list; meaningful
    /// only for occupied cells
    link: [[u8; CFG_SLOTS_PER_PRIO]; CFG_PRIO_MAX],
    /// Per-class round-robin tail cursor
    tail: [Option<u8>; CFG_PRIO_MAX],
    /// Current location of each task identity
    location: [Option<OsSlotId>; CFG_MAX_TASKS],
    /// Occupancy bitmap over the classes
    occ: PrioTable,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        ReadyQueue {
            ident: [[None; CFG_SLOTS_PER_PRIO]; CFG_PRIO_MAX],
            link: [[0; CFG_SLOTS_PER_PRIO]; CFG_PRIO_MAX],
            tail: [None; CFG_PRIO_MAX],
            location: [None; CFG_MAX_TASKS],
            occ: PrioTable::new(),
        }
    }

    /// Reset every cell, cursor, and mapping
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Place `id` into the cell named by `slot` and splice the slot
    /// into its class's circular list just after the current tail;
    /// the new slot becomes the tail.
    pub fn insert(&mut self, slot: OsSlotId, id: OsTaskId) {
        let p = os_slot_prio(slot) as usize;
        let s = os_slot_index(slot) as usize;

        debug_assert!(self.ident[p][s].is_none());
        debug_assert!(self.location[id as usize].is_none());

        match self.tail[p] {
            // First occupant: the slot is the whole circle
            None => self.link[p][s] = s as u8,
            Some(t) => {
                self.link[p][s] = self.link[p][t as usize];
                self.link[p][t as usize] = s as u8;
            }
        }
        self.tail[p] = Some(s as u8);

        self.ident[p][s] = Some(id);
        self.location[id as usize] = Some(slot);
        self.occ.insert(p as OsPrio);
    }

    /// Unlink the cell named by `slot` and clear both mappings.
    ///
    /// Removing the tail rewinds the cursor to its predecessor so the
    /// round-robin order of the survivors is undisturbed. Removing
    /// the last occupant empties the class. Absent slots are a no-op.
    pub fn remove(&mut self, slot: OsSlotId) {
        let p = os_slot_prio(slot) as usize;
        let s = os_slot_index(slot) as usize;

        let Some(id) = self.ident[p][s] else {
            return;
        };

        if self.link[p][s] as usize == s {
            // Last occupant of the class
            self.tail[p] = None;
            self.occ.remove(p as OsPrio);
        } else {
            let mut prev = s;
            while self.link[p][prev] as usize != s {
                prev = self.link[p][prev] as usize;
            }
            self.link[p][prev] = self.link[p][s];
            if self.tail[p] == Some(s as u8) {
                self.tail[p] = Some(prev as u8);
            }
        }

        self.ident[p][s] = None;
        self.location[id as usize] = None;
    }

    /// Elect the next runnable identity: take the most urgent
    /// occupied class, advance its tail one link, and return the
    /// identity at the new tail. `None` means every class is idle.
    pub fn next(&mut self) -> Option<OsTaskId> {
        let prio = self.occ.highest()?;
        let p = prio as usize;
        let t = self.tail[p]? as usize;

        let head = self.link[p][t];
        self.tail[p] = Some(head);
        self.ident[p][head as usize]
    }

    /// Exchange the cell identities and recorded locations of two
    /// queued tasks. The link structure and tails are untouched, so
    /// each task inherits exactly the other's turn position. No-op
    /// unless both identities are currently queued.
    pub fn swap_identities(&mut self, a: OsTaskId, b: OsTaskId) {
        let (Some(la), Some(lb)) = (self.location[a as usize], self.location[b as usize])
        else {
            return;
        };

        self.ident[os_slot_prio(la) as usize][os_slot_index(la) as usize] = Some(b);
        self.ident[os_slot_prio(lb) as usize][os_slot_index(lb) as usize] = Some(a);
        self.location[a as usize] = Some(lb);
        self.location[b as usize] = Some(la);
    }

    /// Where `id` currently sits, or `None` when it is not queued
    #[inline]
    pub fn location_of(&self, id: OsTaskId) -> Option<OsSlotId> {
        self.location[id as usize]
    }

    /// Identity stored in the cell named by `slot`
    #[inline]
    pub fn identity_at(&self, slot: OsSlotId) -> Option<OsTaskId> {
        self.ident[os_slot_prio(slot) as usize][os_slot_index(slot) as usize]
    }

    /// True when no class has an occupied slot
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occ.is_empty()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::os_slot_id;

    fn consistent(q: &ReadyQueue, id: OsTaskId, slot: OsSlotId) {
        assert_eq!(q.location_of(id), Some(slot));
        assert_eq!(q.identity_at(slot), Some(id));
    }

    #[test]
    fn strict_priority_between_classes() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(6, 0), 2);
        q.insert(os_slot_id(2, 0), 0);
        q.insert(os_slot_id(4, 0), 1);

        // One task per class: elections cycle 0, 1, 2 only when the
        // more urgent classes empty out
        assert_eq!(q.next(), Some(0));
        assert_eq!(q.next(), Some(0));

        q.remove(os_slot_id(2, 0));
        assert_eq!(q.next(), Some(1));

        q.remove(os_slot_id(4, 0));
        assert_eq!(q.next(), Some(2));
    }

    #[test]
    fn round_robin_within_class() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(4, 0), 7);
        q.insert(os_slot_id(4, 1), 8);
        q.insert(os_slot_id(4, 2), 9);

        // FIFO insertion order, each election advances exactly one
        for expect in [7, 8, 9, 7, 8, 9] {
            assert_eq!(q.next(), Some(expect));
        }
    }

    #[test]
    fn all_idle_sentinel() {
        let mut q = ReadyQueue::new();
        assert_eq!(q.next(), None);

        q.insert(os_slot_id(3, 0), 5);
        assert_eq!(q.next(), Some(5));

        q.remove(os_slot_id(3, 0));
        assert_eq!(q.next(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn remove_tail_rewinds_to_predecessor() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(4, 0), 1);
        q.insert(os_slot_id(4, 1), 2);
        q.insert(os_slot_id(4, 2), 3);

        // Tail is slot 2; removing it must hand the cursor to slot 1
        // so the next election still starts at the head
        q.remove(os_slot_id(4, 2));
        assert_eq!(q.next(), Some(1));
        assert_eq!(q.next(), Some(2));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn remove_mid_slot_keeps_turn_order() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(4, 0), 1);
        q.insert(os_slot_id(4, 1), 2);
        q.insert(os_slot_id(4, 2), 3);

        q.remove(os_slot_id(4, 1));
        for expect in [1, 3, 1, 3] {
            assert_eq!(q.next(), Some(expect));
        }
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(4, 0), 1);

        q.remove(os_slot_id(4, 3));
        q.remove(os_slot_id(5, 0));

        consistent(&q, 1, os_slot_id(4, 0));
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn mappings_stay_mutually_consistent() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(2, 0), 4);
        q.insert(os_slot_id(2, 1), 5);
        q.insert(os_slot_id(7, 0), 6);

        consistent(&q, 4, os_slot_id(2, 0));
        consistent(&q, 5, os_slot_id(2, 1));
        consistent(&q, 6, os_slot_id(7, 0));

        q.remove(os_slot_id(2, 0));
        assert_eq!(q.location_of(4), None);
        assert_eq!(q.identity_at(os_slot_id(2, 0)), None);
        consistent(&q, 5, os_slot_id(2, 1));
    }

    #[test]
    fn swap_moves_identities_not_structure() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(2, 0), 0);
        q.insert(os_slot_id(6, 0), 1);

        q.swap_identities(0, 1);
        consistent(&q, 1, os_slot_id(2, 0));
        consistent(&q, 0, os_slot_id(6, 0));

        // The urgent cell now elects the other identity
        assert_eq!(q.next(), Some(1));
    }

    #[test]
    fn swap_twice_is_identity() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(2, 0), 0);
        q.insert(os_slot_id(6, 0), 1);

        q.swap_identities(0, 1);
        q.swap_identities(0, 1);
        consistent(&q, 0, os_slot_id(2, 0));
        consistent(&q, 1, os_slot_id(6, 0));
    }

    #[test]
    fn swap_with_unqueued_party_is_noop() {
        let mut q = ReadyQueue::new();
        q.insert(os_slot_id(2, 0), 0);

        q.swap_identities(0, 1);
        consistent(&q, 0, os_slot_id(2, 0));
        assert_eq!(q.location_of(1), None);
    }
}
