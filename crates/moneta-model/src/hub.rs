//! Change notification fan-out.
//!
//! The hub owns three registries: per-type creation subscribers, per-type
//! change subscribers, and per-instance subscribers. Subscriber ids come
//! from one monotonic counter. Notification awaits each callback in turn;
//! a callback's failure is logged and never aborts its siblings or the
//! triggering operation.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use asupersync::Cx;
use moneta_core::error::{Error, Result};

use crate::bo::BusinessObject;

/// Reserved name of the abstract base type; subscribing to all changes of
/// the base itself is refused.
pub const BASE_TYPE_NAME: &str = "business_object";

/// The boxed future a subscriber returns.
pub type BoFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A change/creation subscriber.
///
/// Receives the full mutated business object. A returned error is logged
/// by the dispatcher and never aborts sibling subscribers or the
/// triggering operation.
pub trait ChangeSubscriber: Send + Sync {
    /// React to one event.
    fn notify<'a>(&'a self, cx: &'a Cx, bo: BusinessObject) -> BoFuture<'a>;
}

/// A shared subscriber callback.
pub type BoCallback = Arc<dyn ChangeSubscriber>;

#[derive(Default)]
struct HubState {
    next_id: u64,
    creation: BTreeMap<String, BTreeMap<u64, BoCallback>>,
    change: BTreeMap<String, BTreeMap<u64, BoCallback>>,
    instance: BTreeMap<(String, i64), BTreeMap<u64, BoCallback>>,
}

/// Registry and dispatcher for creation/change subscriptions.
#[derive(Default)]
pub struct ChangeHub {
    state: Mutex<HubState>,
}

impl ChangeHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to creations of a type. Returns the subscriber id used to
    /// unsubscribe.
    pub fn subscribe_to_creation(&self, type_name: &str, callback: BoCallback) -> u64 {
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state
            .creation
            .entry(type_name.to_string())
            .or_default()
            .insert(id, callback);
        id
    }

    /// Remove a creation subscriber.
    pub fn unsubscribe_from_creation(&self, type_name: &str, subscriber_id: u64) {
        let mut state = self.state();
        let removed = state
            .creation
            .get_mut(type_name)
            .and_then(|subs| subs.remove(&subscriber_id));
        if removed.is_none() {
            tracing::warn!(
                bo_type = %type_name,
                subscriber = subscriber_id,
                "creation subscriber not found"
            );
        }
    }

    /// Subscribe to every change of a type's instances.
    ///
    /// Refuses to operate on the abstract base type itself.
    pub fn subscribe_to_all_changes(&self, type_name: &str, callback: BoCallback) -> Result<u64> {
        if type_name == BASE_TYPE_NAME {
            return Err(Error::validation(
                "cannot subscribe to changes of the business-object base type",
            ));
        }
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state
            .change
            .entry(type_name.to_string())
            .or_default()
            .insert(id, callback);
        Ok(id)
    }

    /// Remove a change subscriber.
    pub fn unsubscribe_from_all_changes(&self, type_name: &str, subscriber_id: u64) {
        let mut state = self.state();
        let removed = state
            .change
            .get_mut(type_name)
            .and_then(|subs| subs.remove(&subscriber_id));
        if removed.is_none() {
            tracing::warn!(
                bo_type = %type_name,
                subscriber = subscriber_id,
                "change subscriber not found"
            );
        }
    }

    /// Subscribe to changes of one instance.
    pub fn subscribe_to_instance(
        &self,
        type_name: &str,
        instance_id: i64,
        callback: BoCallback,
    ) -> u64 {
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state
            .instance
            .entry((type_name.to_string(), instance_id))
            .or_default()
            .insert(id, callback);
        id
    }

    /// Remove an instance subscriber.
    pub fn unsubscribe_from_instance(&self, type_name: &str, instance_id: i64, subscriber_id: u64) {
        let mut state = self.state();
        let key = (type_name.to_string(), instance_id);
        let removed = state
            .instance
            .get_mut(&key)
            .and_then(|subs| subs.remove(&subscriber_id));
        if removed.is_none() {
            tracing::warn!(
                bo_type = %type_name,
                instance = instance_id,
                subscriber = subscriber_id,
                "instance subscriber not found"
            );
        }
    }

    /// Drop the whole registry of one instance (the owner went away).
    pub fn clear_instance(&self, type_name: &str, instance_id: i64) {
        self.state()
            .instance
            .remove(&(type_name.to_string(), instance_id));
    }

    /// Drop every registry of one type.
    pub fn clear_type(&self, type_name: &str) {
        let mut state = self.state();
        state.creation.remove(type_name);
        state.change.remove(type_name);
        state
            .instance
            .retain(|(name, _), _| name != type_name);
    }

    /// Number of change subscribers of a type (diagnostics).
    pub fn change_subscriber_count(&self, type_name: &str) -> usize {
        self.state()
            .change
            .get(type_name)
            .map_or(0, BTreeMap::len)
    }

    /// Notify creation subscribers of a newly registered object.
    pub async fn notify_created(&self, cx: &Cx, bo: &BusinessObject) {
        let callbacks: Vec<BoCallback> = {
            let state = self.state();
            state
                .creation
                .get(bo.meta().type_name())
                .map(|subs| subs.values().cloned().collect())
                .unwrap_or_default()
        };
        self.dispatch(cx, bo, callbacks, "creation").await;
    }

    /// Notify change and instance subscribers of a mutated object.
    pub async fn notify_changed(&self, cx: &Cx, bo: &BusinessObject) {
        let callbacks: Vec<BoCallback> = {
            let state = self.state();
            let mut callbacks: Vec<BoCallback> = state
                .change
                .get(bo.meta().type_name())
                .map(|subs| subs.values().cloned().collect())
                .unwrap_or_default();
            if let Some(id) = bo.id() {
                if let Some(subs) = state
                    .instance
                    .get(&(bo.meta().type_name().to_string(), id))
                {
                    callbacks.extend(subs.values().cloned());
                }
            }
            callbacks
        };
        self.dispatch(cx, bo, callbacks, "change").await;
    }

    /// Invoke each callback, logging failures without aborting siblings.
    async fn dispatch(&self, cx: &Cx, bo: &BusinessObject, callbacks: Vec<BoCallback>, kind: &str) {
        for callback in callbacks {
            if let Err(e) = callback.notify(cx, bo.clone()).await {
                tracing::error!(
                    bo_type = %bo.meta().type_name(),
                    kind,
                    error = %e,
                    "subscriber callback failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for ChangeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ChangeHub")
            .field("creation_types", &state.creation.len())
            .field("change_types", &state.change.len())
            .field("instances", &state.instance.len())
            .finish()
    }
}
