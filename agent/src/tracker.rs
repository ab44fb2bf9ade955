// Copyright 2019-2021 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::collections::{HashMap, HashSet};

/// Whether tracking a new instance brought a previously-untracked client
/// into scope — the caller uses this to decide whether to subscribe to that
/// client's `__clientInfo__` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
    pub client_is_new: bool,
}

/// Clients that became fully untracked as a result of removing an instance
/// — the caller unsubscribes their `__clientInfo__` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrackOutcome {
    pub clients_now_empty: Vec<String>,
}

/// The two client maps, kept independent so "empty for this kind" is O(1).
#[derive(Default)]
pub struct ClientTracker {
    anonymous_clients: HashMap<String, HashSet<String>>,
    named_clients: HashMap<String, HashSet<String>>,
    anonymous_owner: HashMap<String, String>,
}

impl ClientTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the broker still needs a `__clientInfo__` subscription for
    /// `client_id` (the disjunction of both map memberships).
    pub fn is_tracked(&self, client_id: &str) -> bool {
        self.anonymous_clients.contains_key(client_id) || self.named_clients.contains_key(client_id)
    }

    pub fn track_anonymous(&mut self, client_id: &str, instance_id: &str) -> TrackOutcome {
        let client_is_new = !self.is_tracked(client_id);
        self.anonymous_clients.entry(client_id.to_string()).or_default().insert(instance_id.to_string());
        self.anonymous_owner.insert(instance_id.to_string(), client_id.to_string());
        TrackOutcome { client_is_new }
    }

    pub fn track_named(&mut self, client_id: &str, instance_id: &str) -> TrackOutcome {
        let client_is_new = !self.is_tracked(client_id);
        self.named_clients.entry(client_id.to_string()).or_default().insert(instance_id.to_string());
        TrackOutcome { client_is_new }
    }

    /// Removes `instance_id` from every map that references it. Used on
    /// `__delete__`.
    pub fn untrack_instance(&mut self, instance_id: &str) -> UntrackOutcome {
        let mut touched: HashSet<String> = HashSet::new();

        if let Some(owner) = self.anonymous_owner.remove(instance_id) {
            if let Some(set) = self.anonymous_clients.get_mut(&owner) {
                set.remove(instance_id);
                if set.is_empty() {
                    self.anonymous_clients.remove(&owner);
                }
            }
            touched.insert(owner);
        }

        let mut now_empty_named = Vec::new();
        for (client_id, set) in self.named_clients.iter_mut() {
            if set.remove(instance_id) {
                touched.insert(client_id.clone());
                if set.is_empty() {
                    now_empty_named.push(client_id.clone());
                }
            }
        }
        for client_id in &now_empty_named {
            self.named_clients.remove(client_id);
        }

        let clients_now_empty = touched.into_iter().filter(|c| !self.is_tracked(c)).collect();
        UntrackOutcome { clients_now_empty }
    }

    /// Anonymous instances owned by `client_id`.
    pub fn anonymous_instances_of(&self, client_id: &str) -> Vec<String> {
        self.anonymous_clients.get(client_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    /// Drops all bookkeeping for `client_id`. Callers must have already
    /// deleted/untracked its instances via [`Self::untrack_instance`].
    pub fn forget_client(&mut self, client_id: &str) {
        self.anonymous_clients.remove(client_id);
        self.named_clients.remove(client_id);
        self.anonymous_owner.retain(|_, owner| owner != client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_flagged_once() {
        let mut tracker = ClientTracker::new();
        let first = tracker.track_anonymous("c1", "i1");
        assert!(first.client_is_new);
        let second = tracker.track_anonymous("c1", "i2");
        assert!(!second.client_is_new);
    }

    #[test]
    fn untrack_releases_client_when_last_instance_leaves() {
        let mut tracker = ClientTracker::new();
        tracker.track_anonymous("c1", "i1");
        let outcome = tracker.untrack_instance("i1");
        assert_eq!(outcome.clients_now_empty, vec!["c1".to_string()]);
        assert!(!tracker.is_tracked("c1"));
    }

    #[test]
    fn named_instance_can_have_many_owning_clients() {
        let mut tracker = ClientTracker::new();
        tracker.track_named("c1", "alice");
        tracker.track_named("c2", "alice");
        let outcome = tracker.untrack_instance("alice");
        let mut clients = outcome.clients_now_empty;
        clients.sort();
        assert_eq!(clients, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn client_with_both_anonymous_and_named_stays_tracked_until_both_empty() {
        let mut tracker = ClientTracker::new();
        tracker.track_anonymous("c1", "anon1");
        tracker.track_named("c1", "alice");
        let outcome = tracker.untrack_instance("anon1");
        assert!(outcome.clients_now_empty.is_empty());
        assert!(tracker.is_tracked("c1"));
        let outcome2 = tracker.untrack_instance("alice");
        assert_eq!(outcome2.clients_now_empty, vec!["c1".to_string()]);
    }
}
