//! Event Service channels: push and pull admin/proxy objects mediating between suppliers and
//! consumers, with a FIFO queue backing the pull discipline.

mod pull;
mod push;

pub use pull::{ProxyPullConsumer, ProxyPullSupplier, PullChannel, DEFAULT_POLL_INTERVAL};
pub use push::{ProxyPushConsumer, ProxyPushSupplier, PushChannel};

use crate::any::Value;
use crate::error::{CorbaError, CorbaResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// An event payload: CORBA events are `Any`s in their own right; this runtime carries the boxed
/// value directly since the accompanying TypeCode travels with it already via [`crate::any::Any`]
/// at the call boundary — the channel core only needs the value for queuing/fan-out.
pub type Event = Value;

/// Participant id, unique within one channel, used to identify a proxy without a back-pointer.
pub type ParticipantId = u64;

pub trait Consumer: Send + Sync + std::fmt::Debug {
    fn push(&self, event: &Event);
    fn disconnect(&self);
}

pub trait Supplier: Send + Sync + std::fmt::Debug {
    fn disconnect(&self);
}

/// Shared state behind both push and pull channels: membership and destruction status. Proxies
/// hold an `Arc<ChannelCore>` plus their own id rather than a pointer back to their specific
/// peer, and resolve peers by looking them up in here at call sites.
#[derive(Debug, Default)]
pub struct ChannelCore {
    next_id: AtomicU64,
    destroyed: AtomicBool,
    consumers: RwLock<HashMap<ParticipantId, Arc<dyn Consumer>>>,
    suppliers: RwLock<HashMap<ParticipantId, Arc<dyn Supplier>>>,
}

impl ChannelCore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> ParticipantId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_alive(&self) -> CorbaResult<()> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(CorbaError::ChannelDestroyed)
        } else {
            Ok(())
        }
    }

    fn add_consumer(&self, id: ParticipantId, consumer: Arc<dyn Consumer>) -> CorbaResult<()> {
        self.check_alive()?;
        self.consumers.write()?.insert(id, consumer);
        Ok(())
    }

    fn add_supplier(&self, id: ParticipantId, supplier: Arc<dyn Supplier>) -> CorbaResult<()> {
        self.check_alive()?;
        self.suppliers.write()?.insert(id, supplier);
        Ok(())
    }

    fn remove_consumer(&self, id: ParticipantId) -> CorbaResult<()> {
        self.consumers.write()?.remove(&id);
        Ok(())
    }

    fn remove_supplier(&self, id: ParticipantId) -> CorbaResult<()> {
        self.suppliers.write()?.remove(&id);
        Ok(())
    }

    /// Delivers `event` to every connected consumer except `excluding`, logging (not
    /// propagating) any individual consumer's failure.
    fn fan_out(&self, event: &Event, excluding: Option<ParticipantId>) -> CorbaResult<()> {
        self.check_alive()?;
        // Event delivery iterates a snapshot, per the "short critical section" rule: the
        // membership lock is released before any consumer callback runs.
        let snapshot: Vec<(ParticipantId, Arc<dyn Consumer>)> = self
            .consumers
            .read()?
            .iter()
            .map(|(id, c)| (*id, Arc::clone(c)))
            .collect();
        for (id, consumer) in snapshot {
            if Some(id) == excluding {
                continue;
            }
            consumer.push(event);
        }
        Ok(())
    }

    /// Disconnects every attached participant and marks the channel destroyed.
    fn destroy(&self) -> CorbaResult<()> {
        self.destroyed.store(true, Ordering::Release);
        for c in self.consumers.write()?.drain() {
            c.1.disconnect();
        }
        for s in self.suppliers.write()?.drain() {
            s.1.disconnect();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Push,
    Pull,
}
