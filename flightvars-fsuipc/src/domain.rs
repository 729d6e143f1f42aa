use crate::adapter::{AdapterError, OffsetAdapter};
use crate::buffer::DoubleBuffer;
use crate::message::{OffsetMessage, SENDER_SELF};
use crate::offset::{Offset, OffsetLength, ValuedOffset};
use crate::{OFFSETS_GROUP, OFFSETS_TOPIC_PREFIX};
use flightvars_bus::{Bus, BusError, Pattern, Qos, Topic, TopicMessage};
use flightvars_core::api::{
    make_subscription_id, ApiError, FlightVars, SubscriptionId, VarUpdateHandler,
};
use flightvars_core::codec::{VariableGroup, VariableId, VariableValue};
use flightvars_core::Shutdown;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, info, trace, warn};

/// Offsets below this limit can be written from the bus; the region above
/// belongs to the FSUIPC machinery itself.
const MAX_WRITE_ADDRESS: u32 = 0xcccc;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("bus failure: {0}")]
    Bus(#[from] BusError),
}

/// Configuration for an [`OffsetDomain`].
#[derive(Debug, Clone)]
pub struct DomainSettings {
    /// Offsets observed and published from startup, with no subscriber.
    pub exports: Vec<Offset>,
    /// Period of the sampling task.
    pub poll_interval: Duration,
}

impl Default for DomainSettings {
    fn default() -> DomainSettings {
        DomainSettings {
            exports: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Subscriber {
    var_id: VariableId,
    offset: Offset,
    handler: VarUpdateHandler,
}

/// Subscriber bookkeeping, shared between the API and the sampling task
/// under a mutex, like the router maps.
struct Subscriptions {
    subscribers: HashMap<SubscriptionId, Subscriber>,
    by_offset: HashMap<Offset, Vec<SubscriptionId>>,
    exports: HashSet<Offset>,
}

/// Everything the sampling task needs to touch the offset region: the
/// access adapter, the edge detector and the watch/write queues. The task
/// owns this exclusively; no other thread ever drives the adapter.
struct SamplerState {
    adapter: Box<dyn OffsetAdapter>,
    detector: DoubleBuffer,
    watched: HashSet<Offset>,
    pending_writes: Vec<ValuedOffset>,
}

impl SamplerState {
    /// Start observing an offset. The current value is read and mirrored
    /// into both detector sides, so observation alone never raises an edge.
    fn watch(&mut self, offset: Offset) -> Result<(), AdapterError> {
        if self.watched.contains(&offset) {
            return Ok(());
        }
        self.adapter.schedule_read(offset);
        let values = self.adapter.commit()?;
        for vo in values {
            self.prime(vo);
        }
        self.watched.insert(offset);
        Ok(())
    }

    fn prime(&mut self, vo: ValuedOffset) {
        for _ in 0..2 {
            self.store(vo);
            self.detector.swap();
        }
    }

    fn store(&mut self, vo: ValuedOffset) {
        let bytes = vo.value.to_le_bytes();
        let length = vo.offset.length.in_bytes();
        self.detector
            .copy_in(&bytes, 0, vo.offset.address as usize, length);
    }

    /// One sampling pass: commit queued writes and a read of every watched
    /// offset in a single adapter batch, then report the offsets whose
    /// value changed since the previous pass.
    fn sample(&mut self) -> Result<Vec<ValuedOffset>, AdapterError> {
        self.detector.swap();
        for write in self.pending_writes.drain(..).collect::<Vec<_>>() {
            self.adapter.schedule_write(write);
        }
        for offset in &self.watched {
            self.adapter.schedule_read(*offset);
        }
        let values = self.adapter.commit()?;
        let mut changed = Vec::new();
        for vo in values {
            self.store(vo);
            let modified = match vo.offset.length {
                OffsetLength::Byte => self.detector.is_modified::<u8>(vo.offset.address as usize),
                OffsetLength::Word => self.detector.is_modified::<u16>(vo.offset.address as usize),
                OffsetLength::DWord => self.detector.is_modified::<u32>(vo.offset.address as usize),
            };
            if modified {
                changed.push(vo);
            }
        }
        Ok(changed)
    }
}

/// Work posted onto the sampling task. Everything that has to reach the
/// offset region goes through here, so the adapter is only ever driven
/// from that one task.
enum DomainCommand {
    Bus(TopicMessage),
    Watch(Offset),
    Unwatch(Offset),
    Write(ValuedOffset),
}

/// The master of the `fsuipc/offset` variable group.
///
/// Every offset is addressable as a variable named `<hex address>:<length>`
/// and as the bus topic `fsuipc/offsets/<hex address>:<length>`. A periodic
/// task polls the watched offsets through the access adapter, fans changes
/// out to the variable subscribers and publishes them on the bus. The task
/// exclusively owns the adapter and the edge detector: inbound bus
/// messages and the subscribe/unsubscribe/update operations post commands
/// onto its inbox instead of touching the offset region themselves, so
/// sampling, watching and write intake never race.
pub struct OffsetDomain {
    group: VariableGroup,
    poll_interval: Duration,
    subscriptions: Mutex<Subscriptions>,
    bus: Arc<dyn Bus>,
    topic_re: Regex,
    cmd_tx: mpsc::UnboundedSender<DomainCommand>,
    sampler: Mutex<Option<SamplerState>>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<DomainCommand>>>,
}

impl OffsetDomain {
    pub fn new(
        settings: DomainSettings,
        bus: Arc<dyn Bus>,
        adapter: Box<dyn OffsetAdapter>,
    ) -> Result<Arc<OffsetDomain>, DomainError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let sampler = SamplerState {
            adapter,
            detector: DoubleBuffer::new(0x10000),
            watched: HashSet::new(),
            pending_writes: Vec::new(),
        };
        let mut exports = HashSet::new();
        for offset in &settings.exports {
            info!("loading export for offset {}", offset);
            exports.insert(*offset);
            // Observation begins once the sampling task drains its inbox.
            let _ = cmd_tx.send(DomainCommand::Watch(*offset));
        }

        let domain = Arc::new(OffsetDomain {
            group: VariableGroup::new(OFFSETS_GROUP),
            poll_interval: settings.poll_interval,
            subscriptions: Mutex::new(Subscriptions {
                subscribers: HashMap::new(),
                by_offset: HashMap::new(),
                exports,
            }),
            bus,
            topic_re: Regex::new(r"^fsuipc/offsets/([0-9a-fA-F]+):([0-9]+)$")
                .expect("offset topic pattern"),
            cmd_tx: cmd_tx.clone(),
            sampler: Mutex::new(Some(sampler)),
            cmd_rx: Mutex::new(Some(cmd_rx)),
        });

        // The bus callback only posts onto the domain inbox; the message is
        // handled from the sampling task.
        domain.bus.subscribe(
            Pattern::new(format!("{}/+", OFFSETS_TOPIC_PREFIX))?,
            Qos::AtMostOnce,
            Arc::new(move |msg: &TopicMessage| {
                let _ = cmd_tx.send(DomainCommand::Bus(msg.clone()));
            }),
        )?;
        Ok(domain)
    }

    /// Spawn the sampling task. It stops when the shutdown channel fires.
    pub fn start(self: Arc<Self>, notify: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        let sampler = self.sampler.lock().unwrap().take();
        let cmd_rx = self.cmd_rx.lock().unwrap().take();
        let domain = self;
        tokio::spawn(async move {
            let (mut sampler, mut cmd_rx) = match (sampler, cmd_rx) {
                (Some(sampler), Some(cmd_rx)) => (sampler, cmd_rx),
                _ => {
                    warn!("FSUIPC offsets domain is already running");
                    return;
                }
            };
            let mut shutdown = Shutdown::new(notify);
            let mut ticker = time::interval(domain.poll_interval);
            info!("FSUIPC offsets domain started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => domain.poll_tick(&mut sampler),
                    Some(command) = cmd_rx.recv() => domain.handle_command(&mut sampler, command),
                    _ = shutdown.recv() => break,
                }
            }
            info!("FSUIPC offsets domain stopped");
        })
    }

    fn post(&self, command: DomainCommand) {
        if self.cmd_tx.send(command).is_err() {
            warn!("sampling task is gone, dropping command");
        }
    }

    fn poll_tick(&self, sampler: &mut SamplerState) {
        let changes = match sampler.sample() {
            Ok(changes) => changes,
            Err(e) => {
                warn!("offset sampling failed, skipping tick: {}", e);
                return;
            }
        };
        let notifications = {
            let subscriptions = self.subscriptions.lock().unwrap();
            let mut notifications = Vec::new();
            for vo in &changes {
                if let Some(ids) = subscriptions.by_offset.get(&vo.offset) {
                    for id in ids {
                        if let Some(sub) = subscriptions.subscribers.get(id) {
                            notifications.push((
                                sub.var_id.clone(),
                                sub.handler.clone(),
                                value_for(vo.offset, vo.value),
                            ));
                        }
                    }
                }
            }
            notifications
        };
        for (var_id, handler, value) in notifications {
            handler(&var_id, &value);
        }
        for vo in changes {
            self.publish_change(vo);
        }
    }

    fn handle_command(&self, sampler: &mut SamplerState, command: DomainCommand) {
        match command {
            DomainCommand::Bus(msg) => {
                if let Some(vo) = self.valued_offset_for(&msg) {
                    trace!(
                        "bus message requesting update of offset {} with value {}",
                        vo.offset,
                        vo.value
                    );
                    sampler.pending_writes.push(vo);
                }
            }
            DomainCommand::Watch(offset) => {
                if let Err(e) = sampler.watch(offset) {
                    warn!("cannot start observing offset {}: {}", offset, e);
                }
            }
            DomainCommand::Unwatch(offset) => {
                sampler.watched.remove(&offset);
            }
            DomainCommand::Write(vo) => sampler.pending_writes.push(vo),
        }
    }

    fn publish_change(&self, vo: ValuedOffset) {
        trace!("change detected in offset {}", vo.offset);
        let raw = format!(
            "{}/{:x}:{}",
            OFFSETS_TOPIC_PREFIX, vo.offset.address, vo.offset.length
        );
        let topic = match Topic::new(&raw) {
            Ok(topic) => topic,
            Err(e) => {
                warn!("cannot build topic for offset {}: {}", vo.offset, e);
                return;
            }
        };
        let payload = OffsetMessage::own(vo.value).encode(vo.offset.length);
        if let Err(e) = self.bus.publish(&topic, payload, Qos::AtMostOnce) {
            warn!("cannot publish change of offset {}: {}", vo.offset, e);
        }
    }

    fn valued_offset_for(&self, msg: &TopicMessage) -> Option<ValuedOffset> {
        let caps = match self.topic_re.captures(msg.topic.as_str()) {
            Some(caps) => caps,
            None => {
                warn!("received message with invalid topic {}", msg.topic);
                return None;
            }
        };
        let address = match u32::from_str_radix(&caps[1], 16) {
            Ok(address) => address,
            Err(_) => {
                warn!("received message with invalid offset address {}", &caps[1]);
                return None;
            }
        };
        if address == 0 || address >= MAX_WRITE_ADDRESS {
            warn!(
                "received message with out of range offset address 0x{:x}",
                address
            );
            return None;
        }
        let length = match caps[2].parse().ok().and_then(OffsetLength::from_bytes) {
            Some(length) => length,
            None => {
                warn!("received message with invalid offset length {}", &caps[2]);
                return None;
            }
        };
        let decoded = match OffsetMessage::decode(length, &msg.payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("received a message with invalid payload: {}", e);
                return None;
            }
        };
        if decoded.sender == SENDER_SELF {
            trace!("ignoring own message on topic {}", msg.topic);
            return None;
        }
        Some(ValuedOffset::new(
            Offset::new(address as u16, length),
            decoded.value,
        ))
    }
}

impl FlightVars for OffsetDomain {
    fn subscribe(
        &self,
        var: &VariableId,
        handler: VarUpdateHandler,
    ) -> Result<SubscriptionId, ApiError> {
        if var.group != self.group {
            return Err(ApiError::NoSuchVariable(var.clone()));
        }
        let offset: Offset = var
            .name
            .as_str()
            .parse()
            .map_err(|_| ApiError::NoSuchVariable(var.clone()))?;
        let id = make_subscription_id();
        {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.subscribers.insert(
                id,
                Subscriber {
                    var_id: var.clone(),
                    offset,
                    handler,
                },
            );
            subscriptions.by_offset.entry(offset).or_default().push(id);
        }
        self.post(DomainCommand::Watch(offset));
        debug!("subscription {} registered for offset {}", id, offset);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), ApiError> {
        let (offset, unwatch) = {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            let sub = subscriptions
                .subscribers
                .remove(&id)
                .ok_or(ApiError::NoSuchSubscription(id))?;
            let drained = match subscriptions.by_offset.get_mut(&sub.offset) {
                Some(ids) => {
                    ids.retain(|s| *s != id);
                    ids.is_empty()
                }
                None => false,
            };
            if drained {
                subscriptions.by_offset.remove(&sub.offset);
            }
            (
                sub.offset,
                drained && !subscriptions.exports.contains(&sub.offset),
            )
        };
        if unwatch {
            self.post(DomainCommand::Unwatch(offset));
        }
        debug!("subscription {} for offset {} removed", id, offset);
        Ok(())
    }

    fn update(&self, id: SubscriptionId, value: &VariableValue) -> Result<(), ApiError> {
        let offset = self
            .subscriptions
            .lock()
            .unwrap()
            .subscribers
            .get(&id)
            .map(|sub| sub.offset)
            .ok_or(ApiError::NoSuchSubscription(id))?;
        let raw = raw_for(offset, value).ok_or_else(|| ApiError::InvalidValueType {
            subs_id: id,
            value_type: value.var_type().to_string(),
        })?;
        self.post(DomainCommand::Write(ValuedOffset::new(offset, raw)));
        Ok(())
    }
}

fn value_for(offset: Offset, raw: u32) -> VariableValue {
    match offset.length {
        OffsetLength::Byte => VariableValue::Byte(raw as u8),
        OffsetLength::Word => VariableValue::Word(raw as u16),
        OffsetLength::DWord => VariableValue::DWord(raw),
    }
}

fn raw_for(offset: Offset, value: &VariableValue) -> Option<u32> {
    match (offset.length, value) {
        (OffsetLength::Byte, VariableValue::Byte(v)) => Some(*v as u32),
        (OffsetLength::Word, VariableValue::Word(v)) => Some(*v as u32),
        (OffsetLength::DWord, VariableValue::DWord(v)) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapter::DummyOffsetAdapter;
    use flightvars_bus::LocalBus;

    type Published = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    /// Drives the sampling task by hand: commands are drained and ticks
    /// run exactly when the test says so.
    struct Fixture {
        domain: Arc<OffsetDomain>,
        sampler: SamplerState,
        cmd_rx: mpsc::UnboundedReceiver<DomainCommand>,
        adapter: Arc<Mutex<DummyOffsetAdapter>>,
        bus: Arc<LocalBus>,
        published: Published,
    }

    impl Fixture {
        fn drain(&mut self) {
            while let Ok(command) = self.cmd_rx.try_recv() {
                self.domain.handle_command(&mut self.sampler, command);
            }
        }

        fn tick(&mut self) {
            self.drain();
            self.domain.poll_tick(&mut self.sampler);
        }

        fn inbound(&mut self, topic: &str, payload: bytes::Bytes) {
            let msg = TopicMessage {
                topic: Topic::new(topic).unwrap(),
                payload,
            };
            self.domain
                .handle_command(&mut self.sampler, DomainCommand::Bus(msg));
        }
    }

    fn fixture(exports: &[&str]) -> Fixture {
        let bus = Arc::new(LocalBus::new());
        let published: Published = Arc::new(Mutex::new(Vec::new()));
        let sink = published.clone();
        bus.subscribe(
            Pattern::new("fsuipc/offsets/#").unwrap(),
            Qos::AtMostOnce,
            Arc::new(move |msg: &TopicMessage| {
                sink.lock()
                    .unwrap()
                    .push((msg.topic.to_string(), msg.payload.to_vec()));
            }),
        )
        .unwrap();

        let adapter = Arc::new(Mutex::new(DummyOffsetAdapter::new()));
        let settings = DomainSettings {
            exports: exports.iter().map(|e| e.parse().unwrap()).collect(),
            ..DomainSettings::default()
        };
        let domain = OffsetDomain::new(settings, bus.clone(), Box::new(adapter.clone())).unwrap();
        let sampler = domain.sampler.lock().unwrap().take().unwrap();
        let cmd_rx = domain.cmd_rx.lock().unwrap().take().unwrap();
        Fixture {
            domain,
            sampler,
            cmd_rx,
            adapter,
            bus,
            published,
        }
    }

    #[test]
    fn external_write_roundtrips_through_the_sampler() {
        let mut fx = fixture(&["1000:2"]);
        let offset: Offset = "1000:2".parse().unwrap();

        fx.tick();
        assert!(fx.published.lock().unwrap().is_empty());

        let payload = OffsetMessage {
            sender: 1,
            reserved: 0,
            value: 0x1234,
        }
        .encode(OffsetLength::Word);
        fx.inbound("fsuipc/offsets/1000:2", payload);
        fx.tick();

        assert_eq!(fx.adapter.lock().unwrap().read_value(offset), 0x1234);
        {
            let published = fx.published.lock().unwrap();
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].0, "fsuipc/offsets/1000:2");
            assert_eq!(
                published[0].1,
                OffsetMessage::own(0x1234).encode(OffsetLength::Word).to_vec()
            );
        }

        // Steady state: no further change, no further publish.
        fx.tick();
        assert_eq!(fx.published.lock().unwrap().len(), 1);
    }

    #[test]
    fn bus_messages_are_posted_onto_the_sampler() {
        let mut fx = fixture(&["1000:2"]);
        fx.tick();

        let payload = OffsetMessage {
            sender: 1,
            reserved: 0,
            value: 0x4321,
        }
        .encode(OffsetLength::Word);
        fx.bus
            .publish(
                &Topic::new("fsuipc/offsets/1000:2").unwrap(),
                payload,
                Qos::AtMostOnce,
            )
            .unwrap();
        fx.tick();

        assert_eq!(
            fx.adapter.lock().unwrap().read_value("1000:2".parse().unwrap()),
            0x4321
        );
        // The probe saw the inbound message itself, then the publication
        // the change produced.
        let published = fx.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(
            published[1].1,
            OffsetMessage::own(0x4321).encode(OffsetLength::Word).to_vec()
        );
    }

    #[test]
    fn own_messages_are_suppressed_on_intake() {
        let mut fx = fixture(&["1000:2"]);
        let offset: Offset = "1000:2".parse().unwrap();

        fx.tick();
        let payload = OffsetMessage::own(0x1234).encode(OffsetLength::Word);
        fx.inbound("fsuipc/offsets/1000:2", payload);
        fx.tick();

        assert_eq!(fx.adapter.lock().unwrap().read_value(offset), 0);
        assert!(fx.published.lock().unwrap().is_empty());
    }

    #[test]
    fn out_of_range_addresses_are_rejected() {
        let mut fx = fixture(&[]);
        for topic in &["fsuipc/offsets/0:1", "fsuipc/offsets/cccc:1"] {
            let payload = OffsetMessage {
                sender: 1,
                reserved: 0,
                value: 7,
            }
            .encode(OffsetLength::Byte);
            fx.inbound(topic, payload);
        }
        fx.tick();
        let adapter = fx.adapter.lock().unwrap();
        assert_eq!(adapter.read_value("0:1".parse().unwrap()), 0);
        assert_eq!(adapter.read_value("cccc:1".parse().unwrap()), 0);
    }

    #[test]
    fn in_range_addresses_are_accepted() {
        let mut fx = fixture(&[]);
        let payload = OffsetMessage {
            sender: 1,
            reserved: 0,
            value: 7,
        }
        .encode(OffsetLength::Byte);
        fx.inbound("fsuipc/offsets/14:1", payload);
        fx.tick();
        assert_eq!(
            fx.adapter.lock().unwrap().read_value("14:1".parse().unwrap()),
            7
        );
    }

    #[test]
    fn malformed_intake_is_dropped() {
        let mut fx = fixture(&[]);
        // Wrong payload width for the declared length.
        fx.inbound(
            "fsuipc/offsets/1000:4",
            OffsetMessage {
                sender: 1,
                reserved: 0,
                value: 7,
            }
            .encode(OffsetLength::Byte),
        );
        // Unknown length.
        fx.inbound("fsuipc/offsets/1000:3", bytes::Bytes::from_static(&[1, 0, 7]));
        fx.tick();
        assert_eq!(
            fx.adapter.lock().unwrap().read_value("1000:4".parse().unwrap()),
            0
        );
    }

    #[test]
    fn subscription_fans_out_changes() {
        let mut fx = fixture(&[]);
        let var = VariableId::new(OFFSETS_GROUP, "0x330a:1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = fx
            .domain
            .subscribe(
                &var,
                Arc::new(move |var_id: &VariableId, value: &VariableValue| {
                    sink.lock().unwrap().push((var_id.clone(), *value));
                }),
            )
            .unwrap();
        assert_ne!(id, 0);

        // Watching alone does not raise an edge.
        fx.tick();
        assert!(seen.lock().unwrap().is_empty());

        fx.adapter
            .lock()
            .unwrap()
            .write_value("330a:1".parse().unwrap(), 0x42);
        fx.tick();
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].0, var);
            assert_eq!(seen[0].1, VariableValue::Byte(0x42));
        }
        assert_eq!(fx.published.lock().unwrap().len(), 1);

        fx.tick();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn update_writes_through_the_adapter() {
        let mut fx = fixture(&[]);
        let var = VariableId::new(OFFSETS_GROUP, "0x66c0:2");
        let id = fx.domain.subscribe(&var, Arc::new(|_, _| {})).unwrap();

        fx.domain.update(id, &VariableValue::Word(0x0102)).unwrap();
        fx.tick();
        assert_eq!(
            fx.adapter.lock().unwrap().read_value("66c0:2".parse().unwrap()),
            0x0102
        );

        match fx.domain.update(id, &VariableValue::Bool(true)) {
            Err(ApiError::InvalidValueType { subs_id, .. }) => assert_eq!(subs_id, id),
            other => panic!("expected invalid value type, got {:?}", other),
        }
    }

    #[test]
    fn unsubscribed_offsets_are_no_longer_watched() {
        let mut fx = fixture(&[]);
        let var = VariableId::new(OFFSETS_GROUP, "0x0dc8:1");
        let id = fx.domain.subscribe(&var, Arc::new(|_, _| {})).unwrap();
        fx.domain.unsubscribe(id).unwrap();

        fx.adapter
            .lock()
            .unwrap()
            .write_value("dc8:1".parse().unwrap(), 0x42);
        fx.tick();
        assert!(fx.published.lock().unwrap().is_empty());

        assert_eq!(
            fx.domain.unsubscribe(id),
            Err(ApiError::NoSuchSubscription(id))
        );
    }

    #[test]
    fn unknown_variables_are_rejected() {
        let fx = fixture(&[]);
        let handler: VarUpdateHandler = Arc::new(|_, _| {});
        for var in &[
            VariableId::new("unknown", "foo"),
            VariableId::new(OFFSETS_GROUP, "not-an-offset"),
        ] {
            match fx.domain.subscribe(var, handler.clone()) {
                Err(ApiError::NoSuchVariable(v)) => assert_eq!(&v, var),
                other => panic!("expected no such variable, got {:?}", other),
            }
        }
    }
}
