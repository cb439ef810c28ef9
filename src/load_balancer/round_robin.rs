//! Round-robin cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared rotation counter.
///
/// Concurrent callers each get a distinct slot from a single atomic
/// increment; no lock is taken on the selection path.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next slot in a ring of `len` entries. `len` must be non-zero.
    pub fn next_index(&self, len: usize) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % len
    }

    /// Make the following claim start right after `index`.
    pub fn resume_after(&self, index: usize) {
        self.counter.store(index.wrapping_add(1), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let rr = RoundRobin::new();
        let picks: Vec<usize> = (0..6).map(|_| rr.next_index(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn resume_after_skips_ahead() {
        let rr = RoundRobin::new();
        assert_eq!(rr.next_index(4), 0);
        rr.resume_after(2);
        assert_eq!(rr.next_index(4), 3);
        assert_eq!(rr.next_index(4), 0);
    }

    #[test]
    fn distinct_slots_under_contention() {
        let rr = std::sync::Arc::new(RoundRobin::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rr = rr.clone();
                std::thread::spawn(move || (0..300).map(|_| rr.next_index(3)).collect::<Vec<_>>())
            })
            .collect();

        let mut counts = [0usize; 3];
        for handle in handles {
            for index in handle.join().unwrap() {
                counts[index] += 1;
            }
        }
        assert_eq!(counts, [400, 400, 400]);
    }
}
