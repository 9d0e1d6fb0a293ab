use std::collections::{HashMap, VecDeque};

use smolrpc_core::Byte;

/// One submission waiting to be picked up by an invoker. Named after the
/// original's `broker::pending_addition_submission`; the submission's
/// actual meaning (what gets compiled, judged, etc.) is the
/// application-level protocol this crate does not specify.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub job_id: u64,
    pub payload: Vec<Byte>,
}

/// A FIFO job queue shared by every connected invoker. Out of scope per the
/// specification beyond this shape: no priority, no retry, no persistence
/// across restarts.
#[derive(Default)]
pub struct Queue {
    pending: VecDeque<PendingSubmission>,
    results: HashMap<u64, Vec<Byte>>,
}

impl Queue {
    pub fn new() -> Self {
        Queue::default()
    }

    pub fn add_submission(&mut self, job_id: u64, payload: Vec<Byte>) {
        self.pending.push_back(PendingSubmission { job_id, payload });
    }

    /// Hands the oldest pending submission to whichever invoker asks next.
    pub fn take_next(&mut self) -> Option<PendingSubmission> {
        self.pending.pop_front()
    }

    pub fn record_result(&mut self, job_id: u64, output: Vec<Byte>) {
        self.results.insert(job_id, output);
    }

    pub fn result_of(&self, job_id: u64) -> Option<&Vec<Byte>> {
        self.results.get(&job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_next_is_fifo() {
        let mut q = Queue::new();
        q.add_submission(1, vec![]);
        q.add_submission(2, vec![Byte(9)]);
        assert_eq!(q.take_next().unwrap().job_id, 1);
        assert_eq!(q.take_next().unwrap().job_id, 2);
        assert!(q.take_next().is_none());
    }

    #[test]
    fn records_and_looks_up_results() {
        let mut q = Queue::new();
        q.record_result(5, vec![Byte(1), Byte(2)]);
        assert_eq!(q.result_of(5).unwrap(), &vec![Byte(1), Byte(2)]);
        assert!(q.result_of(6).is_none());
    }
}
