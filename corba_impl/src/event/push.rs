use super::{ChannelCore, Consumer, Event, ParticipantId, Supplier};
use crate::error::CorbaResult;
use std::sync::{Arc, RwLock};

/// Vended by the channel's supplier-facing admin; a real `Supplier` connects to this and calls
/// [`ProxyPushConsumer::push`], which fans the event out to every connected
/// [`ProxyPushSupplier`].
#[derive(Debug)]
pub struct ProxyPushConsumer {
    id: ParticipantId,
    core: Arc<ChannelCore>,
    peer: RwLock<Option<Arc<dyn Supplier>>>,
}

impl ProxyPushConsumer {
    pub fn connect_push_supplier(&self, supplier: Arc<dyn Supplier>) -> CorbaResult<()> {
        let mut slot = self.peer.write()?;
        if slot.is_some() {
            return Err(crate::error::CorbaError::AlreadyConnected);
        }
        *slot = Some(supplier);
        debug!("proxy push consumer {} connected to a supplier", self.id);
        Ok(())
    }

    pub fn disconnect_push_supplier(&self) -> CorbaResult<()> {
        if let Some(peer) = self.peer.write()?.take() {
            peer.disconnect();
        }
        Ok(())
    }

    /// Forwards `event` to every connected consumer on the channel, except this proxy itself.
    pub fn push(&self, event: Event) -> CorbaResult<()> {
        self.core.fan_out(&event, Some(self.id))
    }
}

impl Supplier for ProxyPushConsumer {
    fn disconnect(&self) {
        let _ = self.disconnect_push_supplier();
    }
}

/// Vended by the channel's consumer-facing admin; a real `Consumer` connects to this and
/// receives every event the channel fans out, via [`Consumer::push`].
#[derive(Debug)]
pub struct ProxyPushSupplier {
    id: ParticipantId,
    core: Arc<ChannelCore>,
    peer: RwLock<Option<Arc<dyn Consumer>>>,
}

impl ProxyPushSupplier {
    pub fn connect_push_consumer(&self, consumer: Arc<dyn Consumer>) -> CorbaResult<()> {
        let mut slot = self.peer.write()?;
        if slot.is_some() {
            return Err(crate::error::CorbaError::AlreadyConnected);
        }
        *slot = Some(consumer);
        Ok(())
    }

    pub fn disconnect_push_consumer(&self) -> CorbaResult<()> {
        if let Some(peer) = self.peer.write()?.take() {
            peer.disconnect();
        }
        Ok(())
    }
}

impl Consumer for ProxyPushSupplier {
    fn push(&self, event: &Event) {
        if let Ok(slot) = self.peer.read() {
            if let Some(consumer) = slot.as_ref() {
                consumer.push(event);
            }
        }
    }

    fn disconnect(&self) {
        let _ = self.disconnect_push_consumer();
    }
}

/// A push-model event channel: suppliers push, consumers receive, fan-out is immediate.
#[derive(Debug)]
pub struct PushChannel {
    core: Arc<ChannelCore>,
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PushChannel {
    pub fn new() -> Self {
        Self { core: ChannelCore::new() }
    }

    pub fn new_for_supplier(&self) -> CorbaResult<Arc<ProxyPushConsumer>> {
        let id = self.core.next_id();
        let proxy = Arc::new(ProxyPushConsumer { id, core: Arc::clone(&self.core), peer: RwLock::new(None) });
        self.core.add_supplier(id, proxy.clone() as Arc<dyn Supplier>)?;
        Ok(proxy)
    }

    pub fn new_for_consumer(&self) -> CorbaResult<Arc<ProxyPushSupplier>> {
        let id = self.core.next_id();
        let proxy = Arc::new(ProxyPushSupplier { id, core: Arc::clone(&self.core), peer: RwLock::new(None) });
        self.core.add_consumer(id, proxy.clone() as Arc<dyn Consumer>)?;
        Ok(proxy)
    }

    pub fn destroy(&self) -> CorbaResult<()> {
        debug!("destroying push channel");
        self.core.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::Value;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingConsumer {
        events: Mutex<Vec<Value>>,
    }
    impl Consumer for RecordingConsumer {
        fn push(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
        fn disconnect(&self) {}
    }

    #[test]
    fn fan_out_delivers_in_order_to_all_consumers() {
        let channel = PushChannel::new();
        let supplier_proxy = channel.new_for_supplier().unwrap();

        let c1 = Arc::new(RecordingConsumer::default());
        let c1_proxy = channel.new_for_consumer().unwrap();
        c1_proxy.connect_push_consumer(c1.clone()).unwrap();

        let c2 = Arc::new(RecordingConsumer::default());
        let c2_proxy = channel.new_for_consumer().unwrap();
        c2_proxy.connect_push_consumer(c2.clone()).unwrap();

        for i in 0..3 {
            supplier_proxy.push(Value::Long(i)).unwrap();
        }

        assert_eq!(c1.events.lock().unwrap().len(), 3);
        assert_eq!(c2.events.lock().unwrap().len(), 3);
        assert_eq!(*c1.events.lock().unwrap(), *c2.events.lock().unwrap());

        c1_proxy.disconnect_push_consumer().unwrap();
        supplier_proxy.push(Value::Long(99)).unwrap();
        assert_eq!(c1.events.lock().unwrap().len(), 3);
        assert_eq!(c2.events.lock().unwrap().len(), 4);
    }

    #[test]
    fn reconnecting_without_disconnect_fails() {
        let channel = PushChannel::new();
        let proxy = channel.new_for_consumer().unwrap();
        let c1 = Arc::new(RecordingConsumer::default());
        proxy.connect_push_consumer(c1.clone()).unwrap();
        let err = proxy.connect_push_consumer(c1).unwrap_err();
        assert!(matches!(err, crate::error::CorbaError::AlreadyConnected));
    }

    #[test]
    fn destroy_disconnects_everyone_and_blocks_further_use() {
        let channel = PushChannel::new();
        let supplier_proxy = channel.new_for_supplier().unwrap();
        channel.destroy().unwrap();
        let err = supplier_proxy.push(Value::Long(1)).unwrap_err();
        assert!(matches!(err, crate::error::CorbaError::ChannelDestroyed));
    }
}
