//! FIFO matchmaking queue of users awaiting an opponent.

use std::collections::VecDeque;

use uuid::Uuid;

/// Ordered set of user identities currently seeking an opponent.
///
/// Membership is decoupled from connection liveness: callers must re-validate
/// a candidate's session before committing a pairing, since a user can
/// disconnect between being observed in the queue and being selected.
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<Uuid>,
}

impl MatchQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to the back of the queue. Returns `false` if already queued.
    pub fn enqueue(&mut self, user_id: Uuid) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.entries.push_back(user_id);
        true
    }

    /// Pop the earliest queued user other than `user_id`, FIFO.
    ///
    /// The candidate is removed from the queue; a caller that rejects it
    /// (stale session, no longer searching) simply drops it.
    pub fn dequeue_candidate_excluding(&mut self, user_id: Uuid) -> Option<Uuid> {
        let position = self.entries.iter().position(|entry| *entry != user_id)?;
        self.entries.remove(position)
    }

    /// Remove a user from the queue, wherever it sits. Returns `true` if present.
    pub fn remove(&mut self, user_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != user_id);
        self.entries.len() != before
    }

    /// Whether the user is currently queued.
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.entries.contains(&user_id)
    }

    /// Number of queued users.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
