//! Live query-result subscriptions.
//!
//! A [`ListSubscription`] wraps either a whole type's matching-id set or a
//! single tracked instance. It subscribes to the relevant change events,
//! re-evaluates on every event, and forwards the refreshed payload to an
//! injected delivery channel (the messaging layer sits outside this core).
//!
//! Lifetime is explicit: call [`ListSubscription::cleanup`] to detach from
//! the hub; nothing is evicted implicitly.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use asupersync::{Cx, Outcome};
use moneta_core::connection::Backend;
use moneta_core::error::{Error, Result};

use crate::bo::{BoMeta, BusinessObject};
use crate::hub::{BoCallback, BoFuture, ChangeSubscriber};
use crate::persistence::Persistence;

/// Payload forwarded to the delivery channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPayload {
    /// The flat sequence of matching ids (type scope).
    Ids(Vec<i64>),
    /// One object's serialized attribute mapping (instance scope).
    Object(serde_json::Value),
}

/// The delivery channel receiving refreshed payloads.
pub type ListSink = Arc<dyn Fn(ListPayload) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Scope {
    Type,
    Instance(i64),
}

/// A live subscription over a type's id set or a single instance.
pub struct ListSubscription<B: Backend> {
    persistence: Arc<Persistence<B>>,
    meta: Arc<BoMeta>,
    sink: ListSink,
    scope: Scope,
    handler: Mutex<Option<BoCallback>>,
    root_sub: Mutex<Option<u64>>,
    instance_subs: Mutex<BTreeMap<i64, u64>>,
}

impl<B: Backend> ListSubscription<B> {
    /// Track a whole type: every creation or change re-queries the
    /// matching ids and forwards them.
    pub fn watch_type(
        persistence: Arc<Persistence<B>>,
        meta: Arc<BoMeta>,
        sink: ListSink,
    ) -> Arc<Self> {
        let sub = Arc::new(Self {
            persistence,
            meta,
            sink,
            scope: Scope::Type,
            handler: Mutex::new(None),
            root_sub: Mutex::new(None),
            instance_subs: Mutex::new(BTreeMap::new()),
        });
        let handler = Self::make_handler(&sub);
        let sub_id = sub
            .persistence
            .hub()
            .subscribe_to_creation(sub.meta.type_name(), handler.clone());
        *sub.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        *sub.root_sub.lock().unwrap_or_else(PoisonError::into_inner) = Some(sub_id);
        sub
    }

    /// Track one instance: every change re-fetches it and forwards the
    /// serialized attribute mapping.
    pub fn watch_instance(
        persistence: Arc<Persistence<B>>,
        meta: Arc<BoMeta>,
        instance_id: i64,
        sink: ListSink,
    ) -> Arc<Self> {
        let sub = Arc::new(Self {
            persistence,
            meta,
            sink,
            scope: Scope::Instance(instance_id),
            handler: Mutex::new(None),
            root_sub: Mutex::new(None),
            instance_subs: Mutex::new(BTreeMap::new()),
        });
        let handler = Self::make_handler(&sub);
        let sub_id = sub.persistence.hub().subscribe_to_instance(
            sub.meta.type_name(),
            instance_id,
            handler.clone(),
        );
        *sub.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        *sub.root_sub.lock().unwrap_or_else(PoisonError::into_inner) = Some(sub_id);
        sub
    }

    fn make_handler(sub: &Arc<Self>) -> BoCallback {
        Arc::new(RefreshSubscriber {
            target: Arc::downgrade(sub),
        })
    }

    /// Re-evaluate now and forward the payload.
    pub async fn refresh(&self, cx: &Cx) -> Result<()> {
        match self.scope {
            Scope::Type => self.refresh_type(cx).await,
            Scope::Instance(id) => self.refresh_instance(cx, id).await,
        }
    }

    async fn refresh_type(&self, cx: &Cx) -> Result<()> {
        let new_ids = match self.persistence.matching_ids(cx, &self.meta, &[]).await {
            Outcome::Ok(ids) => ids,
            Outcome::Err(e) => return Err(e),
            Outcome::Cancelled(_) | Outcome::Panicked(_) => {
                return Err(Error::operational("list refresh did not complete"));
            }
        };

        // Track membership: drop subscriptions of departed instances, add
        // subscriptions for new ones.
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        {
            let hub = self.persistence.hub();
            let mut subs = self
                .instance_subs
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let departed: Vec<i64> = subs
                .keys()
                .copied()
                .filter(|id| !new_ids.contains(id))
                .collect();
            for id in departed {
                if let Some(sub_id) = subs.remove(&id) {
                    hub.unsubscribe_from_instance(self.meta.type_name(), id, sub_id);
                }
            }
            if let Some(handler) = handler {
                for id in &new_ids {
                    if !subs.contains_key(id) {
                        let sub_id = hub.subscribe_to_instance(
                            self.meta.type_name(),
                            *id,
                            handler.clone(),
                        );
                        subs.insert(*id, sub_id);
                    }
                }
            }
        }

        tracing::debug!(
            bo_type = %self.meta.type_name(),
            objects = new_ids.len(),
            "updating list subscribers"
        );
        (self.sink)(ListPayload::Ids(new_ids));
        Ok(())
    }

    async fn refresh_instance(&self, cx: &Cx, id: i64) -> Result<()> {
        let mut bo = self.persistence.object_with_id(self.meta.type_name(), id)?;
        match self.persistence.fetch(cx, &mut bo, Some(id), false).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Err(e),
            Outcome::Cancelled(_) | Outcome::Panicked(_) => {
                return Err(Error::operational("instance refresh did not complete"));
            }
        }
        (self.sink)(ListPayload::Object(bo.attributes_json()));
        Ok(())
    }

    /// Detach from the hub.
    pub fn cleanup(&self) {
        let hub = self.persistence.hub();
        let root = self
            .root_sub
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sub_id) = root {
            match self.scope {
                Scope::Type => hub.unsubscribe_from_creation(self.meta.type_name(), sub_id),
                Scope::Instance(id) => {
                    hub.unsubscribe_from_instance(self.meta.type_name(), id, sub_id);
                }
            }
        } else {
            tracing::debug!("nothing to clean up, subscription not active");
        }
        let mut subs = self
            .instance_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, sub_id) in std::mem::take(&mut *subs) {
            hub.unsubscribe_from_instance(self.meta.type_name(), id, sub_id);
        }
    }
}

/// The hub-side handler of a list subscription.
///
/// Holds only a weak reference: a dropped subscription degrades to a
/// no-op handler until it is cleaned up.
struct RefreshSubscriber<B: Backend> {
    target: Weak<ListSubscription<B>>,
}

impl<B: Backend> ChangeSubscriber for RefreshSubscriber<B> {
    fn notify<'a>(&'a self, cx: &'a Cx, _bo: BusinessObject) -> BoFuture<'a> {
        let target = self.target.clone();
        Box::pin(async move {
            match target.upgrade() {
                Some(subscription) => subscription.refresh(cx).await,
                None => Ok(()),
            }
        })
    }
}
