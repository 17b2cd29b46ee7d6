//! A priority queue of callbacks keyed by simulation timestep.
//!
//! Defines a `Queue<T, P>` that stores items of type `T` - called 'plans' -
//! sorted by integer timestep and an orderable phase `P`. Plans scheduled for
//! the same timestep and phase keep insertion order. Adding a plan is
//! *O*(log(*n*)) while cancellation is *O*(1).
//!
//! `Context` uses this queue to hold the sub-steps of every timestep, one
//! `FnOnce(&mut Context)` per plan.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use log::trace;
use rustc_hash::FxHashMap;

/// A simulation timestep. Timestep 0 is the initial state of an episode.
pub type Timestep = usize;

/// A priority queue of plans ordered by `(timestep, phase, id)`.
///
/// The keys live in a binary heap while the payload lives in a map keyed by plan
/// id. Cancelling a plan removes only the payload; its key is skipped when it
/// reaches the top of the heap.
pub struct Queue<T, P: Ord> {
    queue: BinaryHeap<Reverse<Entry<P>>>,
    data_map: FxHashMap<u64, T>,
    plan_counter: u64,
}

impl<T, P: Ord> Queue<T, P> {
    #[must_use]
    pub fn new() -> Queue<T, P> {
        Queue {
            queue: BinaryHeap::new(),
            data_map: FxHashMap::default(),
            plan_counter: 0,
        }
    }

    /// Add a plan to run at `timestep` during `phase`.
    ///
    /// Returns a `PlanId` that can be used to cancel the plan.
    pub fn add_plan(&mut self, timestep: Timestep, data: T, phase: P) -> PlanId {
        let id = self.plan_counter;
        trace!("adding plan {id} at timestep {timestep}");
        self.queue.push(Reverse(Entry {
            timestep,
            phase,
            id,
        }));
        self.data_map.insert(id, data);
        self.plan_counter += 1;
        PlanId(id)
    }

    /// Cancel a plan that has not run yet. Returns `false` if the plan already
    /// ran or was cancelled before.
    pub fn cancel_plan(&mut self, id: PlanId) -> bool {
        self.data_map.remove(&id.0).is_some()
    }

    /// Remove and return the earliest live plan.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        while let Some(Reverse(entry)) = self.queue.pop() {
            if let Some(data) = self.data_map.remove(&entry.id) {
                return Some(Plan {
                    timestep: entry.timestep,
                    data,
                });
            }
        }
        None
    }
}

impl<T, P: Ord> Default for Queue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(PartialEq, Eq, Debug)]
struct Entry<P: Ord> {
    timestep: Timestep,
    phase: P,
    id: u64,
}

impl<P: Ord> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestep
            .cmp(&other.timestep)
            .then_with(|| self.phase.cmp(&other.phase))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Handle to a plan added to a `Queue`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(u64);

/// A plan that holds data of type `T` to be used at `timestep`.
pub struct Plan<T> {
    pub timestep: Timestep,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::Queue;

    #[test]
    fn empty_queue() {
        let mut plan_queue = Queue::<(), ()>::new();
        assert!(plan_queue.get_next_plan().is_none());
    }

    #[test]
    fn plans_come_out_in_timestep_order() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, 'a', ());
        plan_queue.add_plan(3, 'c', ());
        plan_queue.add_plan(2, 'b', ());

        let order: Vec<_> = std::iter::from_fn(|| plan_queue.get_next_plan())
            .map(|plan| (plan.timestep, plan.data))
            .collect();
        assert_eq!(order, vec![(1, 'a'), (2, 'b'), (3, 'c')]);
    }

    #[test]
    fn phase_breaks_timestep_ties() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, "late", 2);
        plan_queue.add_plan(1, "early", 0);
        plan_queue.add_plan(1, "middle", 1);

        assert_eq!(plan_queue.get_next_plan().unwrap().data, "early");
        assert_eq!(plan_queue.get_next_plan().unwrap().data, "middle");
        assert_eq!(plan_queue.get_next_plan().unwrap().data, "late");
    }

    #[test]
    fn insertion_order_breaks_phase_ties() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(4, 1, ());
        plan_queue.add_plan(4, 2, ());

        assert_eq!(plan_queue.get_next_plan().unwrap().data, 1);
        assert_eq!(plan_queue.get_next_plan().unwrap().data, 2);
    }

    #[test]
    fn cancelled_plans_are_skipped() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1, 1, ());
        let to_cancel = plan_queue.add_plan(2, 2, ());
        plan_queue.add_plan(3, 3, ());
        assert!(plan_queue.cancel_plan(to_cancel));
        assert!(!plan_queue.cancel_plan(to_cancel));

        assert_eq!(plan_queue.get_next_plan().unwrap().data, 1);
        let next = plan_queue.get_next_plan().unwrap();
        assert_eq!((next.timestep, next.data), (3, 3));
        assert!(plan_queue.get_next_plan().is_none());
    }
}
