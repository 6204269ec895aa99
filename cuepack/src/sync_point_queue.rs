//! Shared queue of candidate and promoted cue times.
//!
//! Every stream thread registers itself, then coordinates through this
//! queue: the video stream (when present) promotes candidates at key
//! frames, while audio/text streams block in [`SyncPointQueue::get_next`]
//! until a promotion happens. If every registered thread ends up waiting,
//! there is no video stream to decide, so the queue promotes at the shared
//! hint by consensus.

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, Condvar, Mutex, MutexGuard},
};

use log::debug;

use crate::stream::CueEvent;

/// Hint value meaning "no further cues".
pub const NO_MORE_CUES: f64 = f64::MAX;

/// Total-ordered wrapper so seconds can key a `BTreeMap`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Seconds(f64);

impl Eq for Seconds {}

impl PartialOrd for Seconds {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Seconds {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

struct State {
    /// Candidate cues not yet confirmed at a concrete stream time.
    unpromoted: BTreeMap<Seconds, Arc<CueEvent>>,
    /// Confirmed cues, keyed by their promoted time.
    promoted: BTreeMap<Seconds, Arc<CueEvent>>,
    thread_count: usize,
    waiting_thread_count: usize,
    cancelled: bool,
}

/// The single lock-protected resource shared between stream threads.
pub struct SyncPointQueue {
    state: Mutex<State>,
    cond: Condvar,
}

impl SyncPointQueue {
    /// Create a queue seeded with cue candidates known up front.
    pub fn new(cue_times_in_seconds: impl IntoIterator<Item = f64>) -> Self {
        let unpromoted = cue_times_in_seconds
            .into_iter()
            .map(|t| (Seconds(t), Arc::new(CueEvent::new(t))))
            .collect();

        Self {
            state: Mutex::new(State {
                unpromoted,
                promoted: BTreeMap::new(),
                thread_count: 0,
                waiting_thread_count: 0,
                cancelled: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Register a participating stream thread. Must be called once per
    /// stream before any data flows.
    pub fn add_thread(&self) {
        self.lock().thread_count += 1;
    }

    /// Withdraw a stream thread, e.g. when its input flushes before the
    /// others finish. Re-evaluates the waiting consensus so the remaining
    /// threads cannot deadlock on the departed one.
    pub fn remove_thread(&self) {
        let mut state = self.lock();
        state.thread_count = state.thread_count.saturating_sub(1);
        drop(state);
        self.cond.notify_all();
    }

    /// Register a cue candidate delivered mid-stream. Candidates at or
    /// before an already promoted cue are ignored.
    pub fn add_candidate(&self, time_in_seconds: f64) {
        let mut state = self.lock();

        let stale = state
            .promoted
            .range((Bound::Included(Seconds(time_in_seconds)), Bound::Unbounded))
            .next()
            .is_some();
        if stale {
            debug!("ignoring cue candidate at {time_in_seconds}s behind a promoted cue");
            return;
        }

        state
            .unpromoted
            .entry(Seconds(time_in_seconds))
            .or_insert_with(|| Arc::new(CueEvent::new(time_in_seconds)));
        drop(state);
        self.cond.notify_all();
    }

    /// Cancel the queue, unblocking every waiting thread. No further
    /// promotions happen afterwards.
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.cond.notify_all();
    }

    /// True once [`SyncPointQueue::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Next admissible cue time strictly after `after`, or
    /// [`NO_MORE_CUES`] when no candidate is known.
    pub fn get_hint(&self, after: f64) -> f64 {
        let state = self.lock();
        let bounds = (Bound::Excluded(Seconds(after)), Bound::Unbounded);

        if let Some((t, _)) = state.promoted.range(bounds).next() {
            return t.0;
        }
        if let Some((t, _)) = state.unpromoted.range(bounds).next() {
            return t.0;
        }
        NO_MORE_CUES
    }

    /// Non-blocking check whether any cue at or after `hint` remains,
    /// promoted or not. Callers use this to avoid blocking forever on an
    /// exhausted queue.
    pub fn has_more(&self, hint: f64) -> bool {
        let state = self.lock();

        state
            .promoted
            .range((Bound::Included(Seconds(hint)), Bound::Unbounded))
            .next()
            .is_some()
            || !state.unpromoted.is_empty()
    }

    /// Block until a cue at or after `hint` is promoted, returning it, or
    /// `None` once the queue is cancelled.
    ///
    /// If every registered thread ends up waiting here, no video stream is
    /// going to promote, so the first thread to notice promotes at the hint
    /// on everyone's behalf.
    pub fn get_next(&self, hint: f64) -> Option<Arc<CueEvent>> {
        let mut state = self.lock();

        loop {
            if state.cancelled {
                return None;
            }

            let bounds = (Bound::Included(Seconds(hint)), Bound::Unbounded);
            if let Some((_, cue)) = state.promoted.range(bounds).next() {
                return Some(cue.clone());
            }

            state.waiting_thread_count += 1;
            if state.waiting_thread_count == state.thread_count {
                if let Some(cue) = Self::promote_locked(&mut state, hint) {
                    state.waiting_thread_count -= 1;
                    self.cond.notify_all();
                    return Some(cue);
                }
            }

            state = self
                .cond
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.waiting_thread_count -= 1;
        }
    }

    /// Confirm a cue at `time_in_seconds` (a video key-frame time). Returns
    /// `None` when no candidate exists at or before that time, which means
    /// the streams are not GOP-aligned. Never blocks.
    pub fn promote_at(&self, time_in_seconds: f64) -> Option<Arc<CueEvent>> {
        let mut state = self.lock();
        if state.cancelled {
            return None;
        }

        let cue = Self::promote_locked(&mut state, time_in_seconds);
        if cue.is_some() {
            drop(state);
            self.cond.notify_all();
        }
        cue
    }

    fn promote_locked(state: &mut State, time_in_seconds: f64) -> Option<Arc<CueEvent>> {
        // All candidates at or before the promotion time collapse into one
        // promoted cue, re-timed to the confirming key frame.
        let obsolete: Vec<Seconds> = state
            .unpromoted
            .range(..=Seconds(time_in_seconds))
            .map(|(t, _)| *t)
            .collect();
        if obsolete.is_empty() {
            return None;
        }

        for t in &obsolete {
            state.unpromoted.remove(t);
        }

        let cue = Arc::new(CueEvent::new(time_in_seconds));
        state.promoted.insert(Seconds(time_in_seconds), cue.clone());
        debug!("promoted sync point at {time_in_seconds}s");
        Some(cue)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_hint_walks_candidates() {
        let queue = SyncPointQueue::new([2.0, 5.0, 9.0]);

        assert_eq!(queue.get_hint(f64::NEG_INFINITY), 2.0);
        assert_eq!(queue.get_hint(2.0), 5.0);
        assert_eq!(queue.get_hint(5.0), 9.0);
        assert_eq!(queue.get_hint(9.0), NO_MORE_CUES);
    }

    #[test]
    fn test_promote_requires_candidate_at_or_before() {
        let queue = SyncPointQueue::new([5.0]);

        assert!(queue.promote_at(4.9).is_none());
        let cue = queue.promote_at(5.5).unwrap();
        assert_eq!(cue.time_in_seconds, 5.5);

        // The candidate is consumed.
        assert!(queue.promote_at(6.0).is_none());
    }

    #[test]
    fn test_promotion_collapses_earlier_candidates() {
        let queue = SyncPointQueue::new([1.0, 2.0, 3.0, 8.0]);

        let cue = queue.promote_at(3.5).unwrap();
        assert_eq!(cue.time_in_seconds, 3.5);
        assert_eq!(queue.get_hint(3.5), 8.0);
    }

    #[test]
    fn test_get_next_sees_promotions_in_order() {
        let queue = Arc::new(SyncPointQueue::new([1.0, 2.0]));
        queue.add_thread();
        queue.add_thread();

        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut seen = vec![];
                let mut hint = queue.get_hint(f64::NEG_INFINITY);
                while queue.has_more(hint) {
                    match queue.get_next(hint) {
                        Some(cue) => {
                            seen.push(cue.time_in_seconds);
                            hint = queue.get_hint(cue.time_in_seconds);
                        }
                        None => break,
                    }
                }
                seen
            })
        };

        assert!(queue.promote_at(1.25).is_some());
        assert!(queue.promote_at(2.5).is_some());

        assert_eq!(waiter.join().unwrap(), vec![1.25, 2.5]);
    }

    #[test]
    fn test_all_waiting_promotes_at_hint() {
        let queue = Arc::new(SyncPointQueue::new([4.0]));
        queue.add_thread();
        queue.add_thread();

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.get_next(4.0).map(|c| c.time_in_seconds))
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), Some(4.0));
        }
    }

    #[test]
    fn test_cancel_unblocks_waiters() {
        let queue = Arc::new(SyncPointQueue::new([4.0]));
        queue.add_thread();
        queue.add_thread(); // second thread never waits, so no consensus

        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.get_next(4.0))
        };

        queue.cancel();
        assert!(waiter.join().unwrap().is_none());
        assert!(queue.is_cancelled());
    }

    #[test]
    fn test_remove_thread_restores_consensus() {
        let queue = Arc::new(SyncPointQueue::new([4.0]));
        queue.add_thread();
        queue.add_thread();

        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.get_next(4.0).map(|c| c.time_in_seconds))
        };

        // With the second thread gone, the waiter alone is "everyone".
        queue.remove_thread();
        assert_eq!(waiter.join().unwrap(), Some(4.0));
    }

    #[test]
    fn test_stale_candidates_ignored() {
        let queue = SyncPointQueue::new([3.0]);
        assert!(queue.promote_at(3.0).is_some());

        queue.add_candidate(2.0);
        assert_eq!(queue.get_hint(3.0), NO_MORE_CUES);

        queue.add_candidate(7.0);
        assert_eq!(queue.get_hint(3.0), 7.0);
    }
}
