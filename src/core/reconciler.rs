//! Running task set and the pure diff that keeps it in line with snapshots.
//!
//! `RunningTaskSet::update` is the only place keys are admitted or evicted.
//! It performs no I/O and never fails. Every staged start is registered with
//! a fresh, unconnected handle before `update` returns, so the next diff sees
//! the key as occupied even if the pipeline has not been spawned yet.

use std::collections::{HashMap, HashSet};

use crate::core::entries::{
    DesiredEntry, InvalidationEntry, InvalidationKey, MessageId, Partitioned,
};
use crate::core::handle::CancellationHandle;

/// Running validation task and the entry version it was started for.
#[derive(Debug)]
struct ValidationSlot {
    version: i32,
    handle: CancellationHandle,
}

/// Work the scheduler must carry out after one diff.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Handles to dispose, already removed from the set.
    pub to_cancel: Vec<CancellationHandle>,
    /// Action entries to start, each with its registered handle.
    pub begin_actions: Vec<(DesiredEntry, CancellationHandle)>,
    /// Invalidation entries to start, each with its registered handle.
    pub begin_validations: Vec<(InvalidationEntry, CancellationHandle)>,
}

impl ReconcileOutcome {
    /// True when the diff changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_cancel.is_empty()
            && self.begin_actions.is_empty()
            && self.begin_validations.is_empty()
    }
}

/// Keys with a live handle, owned by one scheduler.
#[derive(Debug, Default)]
pub struct RunningTaskSet {
    action_tasks: HashMap<MessageId, CancellationHandle>,
    validate_tasks: HashMap<InvalidationKey, ValidationSlot>,
    closed: bool,
}

impl RunningTaskSet {
    /// Create an empty, open set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the set against a snapshot.
    ///
    /// The first entry seen for a peer wins that peer; later entries for the
    /// same peer wait until the winner disappears upstream. Invalidations for
    /// a peer claimed by an action are not admitted, and evicted if running.
    /// A running validation whose entry version changed is replaced. A key
    /// whose handle already finished counts as free, since snapshots may merge
    /// its removal and a later re-record into one.
    pub fn update(
        &mut self,
        entries: &[DesiredEntry],
        invalidations: &[InvalidationEntry],
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        if self.closed {
            return outcome;
        }

        let mut claimed = HashSet::new();
        let mut valid_ids = HashSet::new();
        for entry in entries {
            if !claimed.insert(entry.owner()) {
                continue;
            }
            valid_ids.insert(entry.key);
            let occupied = self
                .action_tasks
                .get(&entry.key)
                .is_some_and(|handle| !handle.is_finished());
            if !occupied {
                let handle = CancellationHandle::new(entry.key.to_string());
                self.action_tasks.insert(entry.key, handle.clone());
                outcome.begin_actions.push((entry.clone(), handle));
            }
        }

        self.action_tasks.retain(|id, handle| {
            let keep = valid_ids.contains(id);
            if !keep && !handle.is_finished() {
                outcome.to_cancel.push(handle.clone());
            }
            keep
        });

        let mut valid_keys: HashSet<&InvalidationKey> = HashSet::new();
        for entry in invalidations {
            if claimed.contains(&entry.owner()) || !valid_keys.insert(&entry.key) {
                continue;
            }
            let running_version = self
                .validate_tasks
                .get(&entry.key)
                .filter(|slot| !slot.handle.is_finished())
                .map(|slot| slot.version);
            if running_version == Some(entry.version) {
                continue;
            }
            let handle = CancellationHandle::new(entry.key.to_string());
            let previous = self.validate_tasks.insert(
                entry.key.clone(),
                ValidationSlot {
                    version: entry.version,
                    handle: handle.clone(),
                },
            );
            if let Some(previous) = previous.filter(|slot| !slot.handle.is_finished()) {
                outcome.to_cancel.push(previous.handle);
            }
            outcome.begin_validations.push((entry.clone(), handle));
        }

        self.validate_tasks.retain(|key, slot| {
            let keep = valid_keys.contains(key);
            if !keep && !slot.handle.is_finished() {
                outcome.to_cancel.push(slot.handle.clone());
            }
            keep
        });

        outcome
    }

    /// Remove every handle and close the set. A closed set admits nothing.
    pub fn reset(&mut self) -> Vec<CancellationHandle> {
        self.closed = true;
        let mut handles: Vec<CancellationHandle> =
            self.action_tasks.drain().map(|(_, handle)| handle).collect();
        handles.extend(self.validate_tasks.drain().map(|(_, slot)| slot.handle));
        handles
    }

    /// True after `reset`.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sorted keys of registered action tasks.
    #[must_use]
    pub fn action_keys(&self) -> Vec<MessageId> {
        let mut keys: Vec<_> = self.action_tasks.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Sorted keys of registered validation tasks.
    #[must_use]
    pub fn validation_keys(&self) -> Vec<InvalidationKey> {
        let mut keys: Vec<_> = self.validate_tasks.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Handle registered for an action key.
    #[must_use]
    pub fn action_handle(&self, key: &MessageId) -> Option<&CancellationHandle> {
        self.action_tasks.get(key)
    }

    /// Handle registered for an invalidation key.
    #[must_use]
    pub fn validation_handle(&self, key: &InvalidationKey) -> Option<&CancellationHandle> {
        self.validate_tasks.get(key).map(|slot| &slot.handle)
    }

    /// Number of registered handles across both maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.action_tasks.len() + self.validate_tasks.len()
    }

    /// True when no handle is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
