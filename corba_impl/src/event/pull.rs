use super::{Event, ParticipantId, Supplier};
use crate::error::{CorbaError, CorbaResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Default interval [`ProxyPullSupplier::pull`] waits for a new event before giving up with
/// [`CorbaError::NoEvents`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct Queue {
    events: Mutex<VecDeque<Event>>,
    condvar: Condvar,
}

/// Shared state behind a pull channel: a FIFO buffer suppliers feed and consumers drain, plus the
/// registered proxies a `destroy` cascades to. Both proxy kinds are tracked as `Arc<dyn Supplier>`
/// here since `destroy` only ever needs to disconnect them, never deliver an event through the
/// trait (data moves through [`PullCore::submit`]/[`PullCore::pull`] directly).
#[derive(Debug)]
struct PullCore {
    queue: Queue,
    destroyed: AtomicBool,
    poll_interval: Duration,
    next_id: AtomicU64,
    participants: RwLock<HashMap<ParticipantId, Arc<dyn Supplier>>>,
}

impl PullCore {
    fn new(poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            queue: Queue::default(),
            destroyed: AtomicBool::new(false),
            poll_interval,
            next_id: AtomicU64::new(0),
            participants: RwLock::new(HashMap::new()),
        })
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

    fn register(&self, id: ParticipantId, proxy: Arc<dyn Supplier>) -> CorbaResult<()> {
        self.check_alive()?;
        self.participants.write()?.insert(id, proxy);
        Ok(())
    }

    fn submit(&self, event: Event) -> CorbaResult<()> {
        self.check_alive()?;
        let mut events = self.queue.events.lock()?;
        events.push_back(event);
        self.queue.condvar.notify_one();
        Ok(())
    }

    /// Blocks up to `poll_interval` for an event to arrive; returns `NoEvents` if none does.
    fn pull(&self) -> CorbaResult<Event> {
        self.check_alive()?;
        let deadline = Instant::now() + self.poll_interval;
        let mut events = self.queue.events.lock()?;
        loop {
            if let Some(event) = events.pop_front() {
                return Ok(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CorbaError::NoEvents);
            }
            let (guard, timeout) = self.queue.condvar.wait_timeout(events, deadline - now)?;
            events = guard;
            if timeout.timed_out() && events.is_empty() {
                return Err(CorbaError::NoEvents);
            }
        }
    }

    fn try_pull(&self) -> CorbaResult<Option<Event>> {
        self.check_alive()?;
        Ok(self.queue.events.lock()?.pop_front())
    }

    fn destroy(&self) -> CorbaResult<()> {
        debug!("destroying pull channel");
        self.destroyed.store(true, Ordering::Release);
        for (_, proxy) in self.participants.write()?.drain() {
            proxy.disconnect();
        }
        // wake any pull() waiters so they observe the destroyed flag instead of blocking out
        // their full interval
        let _events = self.queue.events.lock();
        self.queue.condvar.notify_all();
        Ok(())
    }
}

/// Vended to real suppliers; `submit` enqueues an event for later retrieval by consumers. A real
/// supplier connects via [`ProxyPullConsumer::connect_pull_supplier`] before submitting so
/// `destroy` can reach it; the peer's only contractual method here is `disconnect`.
#[derive(Debug)]
pub struct ProxyPullConsumer {
    id: ParticipantId,
    core: Arc<PullCore>,
    peer: RwLock<Option<Arc<dyn Supplier>>>,
}

impl ProxyPullConsumer {
    pub fn connect_pull_supplier(&self, supplier: Arc<dyn Supplier>) -> CorbaResult<()> {
        let mut slot = self.peer.write()?;
        if slot.is_some() {
            return Err(CorbaError::AlreadyConnected);
        }
        *slot = Some(supplier);
        debug!("proxy pull consumer {} connected to a supplier", self.id);
        Ok(())
    }

    pub fn disconnect_pull_supplier(&self) -> CorbaResult<()> {
        if let Some(peer) = self.peer.write()?.take() {
            peer.disconnect();
        }
        Ok(())
    }

    pub fn submit(&self, event: Event) -> CorbaResult<()> {
        self.core.submit(event)
    }
}

impl Supplier for ProxyPullConsumer {
    fn disconnect(&self) {
        let _ = self.disconnect_pull_supplier();
    }
}

/// Vended to real consumers; `pull` blocks briefly for the next event, `try_pull` never blocks. A
/// real consumer connects via [`ProxyPullSupplier::connect_pull_consumer`] before pulling so
/// `destroy` can reach it.
#[derive(Debug)]
pub struct ProxyPullSupplier {
    id: ParticipantId,
    core: Arc<PullCore>,
    peer: RwLock<Option<Arc<dyn Supplier>>>,
}

impl ProxyPullSupplier {
    pub fn connect_pull_consumer(&self, consumer: Arc<dyn Supplier>) -> CorbaResult<()> {
        let mut slot = self.peer.write()?;
        if slot.is_some() {
            return Err(CorbaError::AlreadyConnected);
        }
        *slot = Some(consumer);
        debug!("proxy pull supplier {} connected to a consumer", self.id);
        Ok(())
    }

    pub fn disconnect_pull_consumer(&self) -> CorbaResult<()> {
        if let Some(peer) = self.peer.write()?.take() {
            peer.disconnect();
        }
        Ok(())
    }

    pub fn pull(&self) -> CorbaResult<Event> {
        self.core.pull()
    }

    pub fn try_pull(&self) -> CorbaResult<Option<Event>> {
        self.core.try_pull()
    }
}

impl Supplier for ProxyPullSupplier {
    fn disconnect(&self) {
        let _ = self.disconnect_pull_consumer();
    }
}

/// A pull-model event channel: suppliers submit into a FIFO buffer, consumers drain it.
#[derive(Debug)]
pub struct PullChannel {
    core: Arc<PullCore>,
}

impl Default for PullChannel {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PullChannel {
    pub fn new(poll_interval: Duration) -> Self {
        Self { core: PullCore::new(poll_interval) }
    }

    pub fn new_for_supplier(&self) -> CorbaResult<Arc<ProxyPullConsumer>> {
        let id = self.core.next_id();
        let proxy = Arc::new(ProxyPullConsumer { id, core: Arc::clone(&self.core), peer: RwLock::new(None) });
        self.core.register(id, proxy.clone() as Arc<dyn Supplier>)?;
        Ok(proxy)
    }

    pub fn new_for_consumer(&self) -> CorbaResult<Arc<ProxyPullSupplier>> {
        let id = self.core.next_id();
        let proxy = Arc::new(ProxyPullSupplier { id, core: Arc::clone(&self.core), peer: RwLock::new(None) });
        self.core.register(id, proxy.clone() as Arc<dyn Supplier>)?;
        Ok(proxy)
    }

    pub fn destroy(&self) -> CorbaResult<()> {
        self.core.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::Value;

    #[derive(Debug, Default)]
    struct RecordingPeer {
        disconnected: std::sync::atomic::AtomicBool,
    }
    impl Supplier for RecordingPeer {
        fn disconnect(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn submit_then_pull_is_fifo() {
        let channel = PullChannel::new(Duration::from_millis(50));
        let supplier = channel.new_for_supplier().unwrap();
        let consumer = channel.new_for_consumer().unwrap();

        supplier.submit(Value::Long(1)).unwrap();
        supplier.submit(Value::Long(2)).unwrap();

        assert_eq!(consumer.pull().unwrap(), Value::Long(1));
        assert_eq!(consumer.pull().unwrap(), Value::Long(2));
    }

    #[test]
    fn pull_times_out_with_no_events() {
        let channel = PullChannel::new(Duration::from_millis(20));
        let consumer = channel.new_for_consumer().unwrap();
        let err = consumer.pull().unwrap_err();
        assert!(matches!(err, CorbaError::NoEvents));
    }

    #[test]
    fn try_pull_never_blocks() {
        let channel = PullChannel::new(Duration::from_secs(5));
        let consumer = channel.new_for_consumer().unwrap();
        assert_eq!(consumer.try_pull().unwrap(), None);

        let supplier = channel.new_for_supplier().unwrap();
        supplier.submit(Value::Boolean(true)).unwrap();
        assert_eq!(consumer.try_pull().unwrap(), Some(Value::Boolean(true)));
        assert_eq!(consumer.try_pull().unwrap(), None);
    }

    #[test]
    fn destroyed_channel_rejects_further_use() {
        let channel = PullChannel::new(Duration::from_millis(20));
        let supplier = channel.new_for_supplier().unwrap();
        channel.destroy().unwrap();
        let err = supplier.submit(Value::Long(1)).unwrap_err();
        assert!(matches!(err, CorbaError::ChannelDestroyed));
    }

    #[test]
    fn reconnecting_without_disconnect_fails() {
        let channel = PullChannel::new(Duration::from_millis(20));
        let proxy = channel.new_for_supplier().unwrap();
        let peer = Arc::new(RecordingPeer::default());
        proxy.connect_pull_supplier(peer.clone()).unwrap();
        let err = proxy.connect_pull_supplier(peer).unwrap_err();
        assert!(matches!(err, CorbaError::AlreadyConnected));
    }

    #[test]
    fn destroy_disconnects_every_connected_peer() {
        let channel = PullChannel::new(Duration::from_millis(20));
        let supplier_proxy = channel.new_for_supplier().unwrap();
        let supplier_peer = Arc::new(RecordingPeer::default());
        supplier_proxy.connect_pull_supplier(supplier_peer.clone()).unwrap();

        let consumer_proxy = channel.new_for_consumer().unwrap();
        let consumer_peer = Arc::new(RecordingPeer::default());
        consumer_proxy.connect_pull_consumer(consumer_peer.clone()).unwrap();

        channel.destroy().unwrap();
        assert!(supplier_peer.disconnected.load(Ordering::SeqCst));
        assert!(consumer_peer.disconnected.load(Ordering::SeqCst));
    }
}
