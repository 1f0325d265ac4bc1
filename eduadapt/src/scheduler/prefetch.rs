//! Bounded prefetch queue for supported-reading jobs.
//!
//! Pure bookkeeping: FIFO of pending jobs plus an active-slot counter. The
//! owner mutates it only inside its own critical section.

use std::collections::VecDeque;

use super::reading::JobId;

#[derive(Debug, Clone)]
pub struct PrefetchQueue {
    pending: VecDeque<JobId>,
    active: usize,
    max_concurrent: usize,
    max_queue_items: usize,
    version: u64,
}

impl PrefetchQueue {
    pub fn new(max_concurrent: usize, max_queue_items: usize, version: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            active: 0,
            max_concurrent: max_concurrent.max(1),
            max_queue_items,
            version,
        }
    }

    /// Epoch the queue's entries belong to.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Drop every pending entry and active slot and move to a new epoch.
    pub fn reset(&mut self, version: u64) {
        self.pending.clear();
        self.active = 0;
        self.version = version;
    }

    /// Add a job to the back of the queue. Refused when full or already queued.
    pub fn enqueue(&mut self, job: JobId) -> bool {
        if self.pending.len() >= self.max_queue_items || self.pending.contains(&job) {
            return false;
        }
        self.pending.push_back(job);
        true
    }

    /// Remove a queued job (user asked for it out of order).
    pub fn remove(&mut self, job: JobId) -> bool {
        match self.pending.iter().position(|j| *j == job) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Next job to start, if a slot is free. Claims the slot.
    pub fn next_ready(&mut self) -> Option<JobId> {
        if self.active >= self.max_concurrent {
            return None;
        }
        let job = self.pending.pop_front()?;
        self.active += 1;
        Some(job)
    }

    /// Claim a slot for a user-started job, regardless of capacity.
    pub fn start_now(&mut self) {
        self.active += 1;
    }

    /// Release a slot.
    pub fn finish(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_with_concurrency_bound() {
        let mut queue = PrefetchQueue::new(2, 8, 1);
        for id in 0..4 {
            assert!(queue.enqueue(JobId::new(id)));
        }
        assert_eq!(queue.next_ready(), Some(JobId::new(0)));
        assert_eq!(queue.next_ready(), Some(JobId::new(1)));
        assert_eq!(queue.next_ready(), None);

        queue.finish();
        assert_eq!(queue.next_ready(), Some(JobId::new(2)));
        assert_eq!(queue.active(), 2);
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let mut queue = PrefetchQueue::new(2, 2, 0);
        assert!(queue.enqueue(JobId::new(0)));
        assert!(!queue.enqueue(JobId::new(0)));
        assert!(queue.enqueue(JobId::new(1)));
        assert!(!queue.enqueue(JobId::new(2)));
    }

    #[test]
    fn test_remove_and_reset() {
        let mut queue = PrefetchQueue::new(1, 8, 3);
        queue.enqueue(JobId::new(5));
        queue.enqueue(JobId::new(6));
        assert!(queue.remove(JobId::new(5)));
        assert!(!queue.remove(JobId::new(5)));
        queue.start_now();
        assert!(!queue.is_idle());

        queue.reset(4);
        assert!(queue.is_idle());
        assert_eq!(queue.version(), 4);
    }
}
