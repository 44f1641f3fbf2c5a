//! Capacity-bounded resource with a FIFO wait queue.
//!
//! The resource only does the bookkeeping. Suspending a requester and waking
//! the next waiter through the event queue is the scheduler's job, see
//! [`crate::Simulation`].

use std::collections::VecDeque;

use tracing::debug;

use crate::{ProcessId, SimError, SimResult};

/// Handle to a resource registered with a [`crate::Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

/// Outcome of a slot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// A free slot was taken; the requester carries on without suspending.
    Granted,
    /// Every slot is held; the requester joined the back of the wait queue.
    Queued,
}

#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    capacity: usize,
    in_use: usize,
    wait_queue: VecDeque<ProcessId>,
}

impl Resource {
    pub(crate) fn new(id: ResourceId, capacity: usize) -> SimResult<Resource> {
        if capacity == 0 {
            return Err(SimError::InvalidCapacity);
        }
        Ok(Resource {
            id,
            capacity,
            in_use: 0,
            wait_queue: VecDeque::new(),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of requesters waiting for a slot.
    ///
    /// This is the read-only view queue samplers should use.
    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    pub fn is_full(&self) -> bool {
        self.in_use == self.capacity
    }

    pub(crate) fn request(&mut self, requester: ProcessId) -> Grant {
        if self.in_use < self.capacity {
            self.in_use += 1;
            debug!(
                resource = self.id.0,
                process = requester.0,
                in_use = self.in_use,
                "slot granted"
            );
            Grant::Granted
        } else {
            self.wait_queue.push_back(requester);
            debug!(
                resource = self.id.0,
                process = requester.0,
                queue_len = self.wait_queue.len(),
                "all slots held, requester queued"
            );
            Grant::Queued
        }
    }

    /// Frees one slot and hands it straight to the oldest waiter, if any.
    ///
    /// Returns the waiter that now holds the slot. The caller must schedule its
    /// resumption.
    pub(crate) fn release(&mut self) -> SimResult<Option<ProcessId>> {
        if self.in_use == 0 {
            return Err(SimError::IdleRelease(self.id));
        }
        self.in_use -= 1;

        let next = self.wait_queue.pop_front();
        if let Some(waiter) = next {
            self.in_use += 1;
            debug!(resource = self.id.0, process = waiter.0, "slot passed to oldest waiter");
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> Resource {
        Resource::new(ResourceId(0), capacity).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = Resource::new(ResourceId(3), 0);
        assert_eq!(result.unwrap_err(), SimError::InvalidCapacity);
    }

    #[test]
    fn given_free_slot_when_requested_then_granted_without_queueing() {
        let mut resource = pool(2);

        assert_eq!(resource.request(ProcessId(1)), Grant::Granted);

        assert_eq!(resource.in_use(), 1);
        assert_eq!(resource.queue_len(), 0);
        assert!(!resource.is_full());
    }

    #[test]
    fn given_full_resource_when_requested_then_queued() {
        let mut resource = pool(1);
        resource.request(ProcessId(1));

        assert_eq!(resource.request(ProcessId(2)), Grant::Queued);

        assert_eq!(resource.in_use(), 1, "in_use never exceeds capacity");
        assert_eq!(resource.queue_len(), 1);
        assert!(resource.is_full());
    }

    #[test]
    fn given_waiters_when_released_then_oldest_takes_the_slot() {
        let mut resource = pool(1);
        resource.request(ProcessId(1));
        resource.request(ProcessId(2));
        resource.request(ProcessId(3));

        assert_eq!(resource.release().unwrap(), Some(ProcessId(2)));
        assert_eq!(resource.in_use(), 1, "slot handed over, not freed");
        assert_eq!(resource.queue_len(), 1);

        assert_eq!(resource.release().unwrap(), Some(ProcessId(3)));
        assert_eq!(resource.release().unwrap(), None);
        assert_eq!(resource.in_use(), 0);
    }

    #[test]
    fn given_idle_resource_when_released_then_error() {
        let mut resource = pool(2);

        assert_eq!(
            resource.release().unwrap_err(),
            SimError::IdleRelease(ResourceId(0))
        );
        assert_eq!(resource.in_use(), 0);
    }
}
