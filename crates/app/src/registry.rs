//! Process-wide table of output modules.
//!
//! Every module sits behind its own mutex, so writes to one module are
//! serialized while different modules proceed independently. A write that
//! must observe two modules at once ([`ModuleRegistry::energize_exclusive`])
//! locks them in ascending id order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use minido_domain::address::{Command, Endpoint, LOCAL_SOURCE};
use minido_domain::device::ChannelRef;
use minido_domain::error::{MinidoError, NotFoundError};
use minido_domain::event::{BusEvent, ChangeOrigin};
use minido_domain::frame::{self, Frame};
use minido_domain::history::HistoryEntry;
use minido_domain::id::{Channel, ModuleId};
use minido_domain::output_module::{
    CHANNEL_COUNT, ChannelChange, DEFAULT_HISTORY_CAPACITY, ModuleSnapshot, OutputModule, Sample,
};
use minido_domain::time::now;

use crate::ports::{EventPublisher, HistoryStore, TransportBridge};

/// When output modules come into existence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleProvisioning {
    /// All sixteen modules exist from startup.
    #[default]
    Eager,
    /// A module is created by the first bus frame that addresses it.
    Lazy,
}

/// Tunables of a [`ModuleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub history_capacity: usize,
    pub provisioning: ModuleProvisioning,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            provisioning: ModuleProvisioning::Eager,
        }
    }
}

type Slot = Arc<Mutex<OutputModule>>;

/// Owner of all output module state.
pub struct ModuleRegistry<H, T, P> {
    config: RegistryConfig,
    modules: RwLock<BTreeMap<ModuleId, Slot>>,
    history: H,
    transport: T,
    events: P,
}

impl<H, T, P> ModuleRegistry<H, T, P>
where
    H: HistoryStore,
    T: TransportBridge,
    P: EventPublisher,
{
    /// Create a registry, provisioning every module up front when configured eagerly.
    pub fn new(config: RegistryConfig, history: H, transport: T, events: P) -> Self {
        let modules = match config.provisioning {
            ModuleProvisioning::Eager => ModuleId::all()
                .map(|id| (id, new_slot(id, config.history_capacity)))
                .collect(),
            ModuleProvisioning::Lazy => BTreeMap::new(),
        };
        Self {
            config,
            modules: RwLock::new(modules),
            history,
            transport,
            events,
        }
    }

    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Publisher shared with the rest of the bus path.
    pub fn events(&self) -> &P {
        &self.events
    }

    /// Ids of every provisioned module in ascending order.
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.read_modules().keys().copied().collect()
    }

    /// Apply a status report received from the bus.
    ///
    /// Returns the channels that changed; each one is also recorded to history
    /// and published. Returns nothing when the module is not provisioned.
    pub fn update(
        &self,
        module: ModuleId,
        source: Endpoint,
        status: &[u8; CHANNEL_COUNT],
    ) -> Vec<ChannelChange> {
        let Some(slot) = self.slot_for_bus(module) else {
            tracing::warn!(%module, %source, "status for unprovisioned module ignored");
            return Vec::new();
        };
        let mut guard = lock(&slot);
        let changes = guard.apply_status(status, now());
        for change in &changes {
            tracing::info!(
                %source,
                %module,
                channel = %change.channel,
                value = change.value,
                "channel changed"
            );
            self.commit(module, *change, ChangeOrigin::Bus);
        }
        changes
    }

    /// Record that `module` answered an echo request.
    pub fn mark_present(&self, module: ModuleId) {
        let Some(slot) = self.slot_for_bus(module) else {
            return;
        };
        if lock(&slot).mark_present() {
            tracing::info!(%module, "module present on bus");
            self.events.publish(BusEvent::ModulePresent { module, at: now() });
        }
    }

    /// Write a channel and re-broadcast the module's full status.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when the module is not provisioned.
    pub fn set_output(
        &self,
        module: ModuleId,
        channel: Channel,
        value: u8,
    ) -> Result<ModuleSnapshot, MinidoError> {
        let slot = self.require(module)?;
        let mut guard = lock(&slot);
        let change = guard.write(channel, value, now());
        tracing::debug!(%module, %channel, value, "output written");
        self.commit(module, change, ChangeOrigin::Command);
        self.broadcast_status(&guard);
        Ok(guard.snapshot())
    }

    /// Latest value of a channel.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when the module is not provisioned.
    pub fn get_output(&self, module: ModuleId, channel: Channel) -> Result<Option<u8>, MinidoError> {
        let slot = self.require(module)?;
        let value = lock(&slot).value(channel);
        Ok(value)
    }

    /// Bounded history of a channel, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when the module is not provisioned.
    pub fn history(&self, module: ModuleId, channel: Channel) -> Result<Vec<Sample>, MinidoError> {
        let slot = self.require(module)?;
        let samples = lock(&slot).history(channel);
        Ok(samples)
    }

    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when the module is not provisioned.
    pub fn snapshot(&self, module: ModuleId) -> Result<ModuleSnapshot, MinidoError> {
        let slot = self.require(module)?;
        let snapshot = lock(&slot).snapshot();
        Ok(snapshot)
    }

    /// Snapshot of every provisioned module in ascending id order.
    pub fn list(&self) -> Vec<ModuleSnapshot> {
        let slots: Vec<Slot> = self.read_modules().values().cloned().collect();
        slots.iter().map(|slot| lock(slot).snapshot()).collect()
    }

    /// Write `value` only if `target` still holds `expected`. Returns whether it wrote.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when the module is not provisioned.
    pub fn compare_and_set(
        &self,
        target: ChannelRef,
        expected: Option<u8>,
        value: u8,
    ) -> Result<bool, MinidoError> {
        let slot = self.require(target.module)?;
        let mut guard = lock(&slot);
        let Some(change) = guard.compare_and_write(target.channel, expected, value, now()) else {
            return Ok(false);
        };
        self.commit(target.module, change, ChangeOrigin::Command);
        self.broadcast_status(&guard);
        Ok(true)
    }

    /// Write `value` to `target` only while `opposing` reads 0 or unset.
    ///
    /// Both modules stay locked between the check and the write, so no other
    /// writer can energize `opposing` in between. Returns whether it wrote.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::NotFound`] when either module is not provisioned.
    pub fn energize_exclusive(
        &self,
        target: ChannelRef,
        opposing: ChannelRef,
        value: u8,
    ) -> Result<bool, MinidoError> {
        let target_slot = self.require(target.module)?;

        if target.module == opposing.module {
            let mut guard = lock(&target_slot);
            if is_energized(guard.value(opposing.channel)) {
                return Ok(false);
            }
            let change = guard.write(target.channel, value, now());
            self.commit(target.module, change, ChangeOrigin::Command);
            self.broadcast_status(&guard);
            return Ok(true);
        }

        let opposing_slot = self.require(opposing.module)?;
        let (mut target_guard, opposing_guard) = if target.module < opposing.module {
            let t = lock(&target_slot);
            let o = lock(&opposing_slot);
            (t, o)
        } else {
            let o = lock(&opposing_slot);
            let t = lock(&target_slot);
            (t, o)
        };
        if is_energized(opposing_guard.value(opposing.channel)) {
            return Ok(false);
        }
        let change = target_guard.write(target.channel, value, now());
        self.commit(target.module, change, ChangeOrigin::Command);
        self.broadcast_status(&target_guard);
        Ok(true)
    }

    /// Replay persisted history without recording or transmitting anything.
    ///
    /// Entries must be ordered oldest first. Returns how many were applied.
    pub fn restore(&self, entries: impl IntoIterator<Item = HistoryEntry>) -> usize {
        let mut applied = 0;
        for entry in entries.into_iter().filter(HistoryEntry::is_output) {
            let Some(slot) = self.slot_for_bus(entry.module) else {
                continue;
            };
            lock(&slot).restore(entry.channel, entry.sample());
            applied += 1;
        }
        applied
    }

    /// Encode and queue an arbitrary frame.
    ///
    /// # Errors
    ///
    /// Returns [`MinidoError::Frame`] when the payload is too long, or
    /// [`MinidoError::Transport`] when the frame cannot be queued.
    pub fn transmit(&self, frame: &Frame) -> Result<(), MinidoError> {
        let bytes = frame.encode()?;
        self.transport.send(bytes)
    }

    fn commit(&self, module: ModuleId, change: ChannelChange, origin: ChangeOrigin) {
        self.history.record(HistoryEntry::from_change(module, &change));
        self.events.publish(BusEvent::channel_changed(module, change, origin));
    }

    fn broadcast_status(&self, module: &OutputModule) {
        let id = module.id();
        let result = frame::encode(
            id.address(),
            LOCAL_SOURCE,
            Command::Update.byte(),
            &module.wire_status(),
        )
        .map_err(MinidoError::from)
        .and_then(|bytes| self.transport.send(bytes));
        if let Err(error) = result {
            tracing::warn!(module = %id, %error, "failed to queue status frame");
        }
    }

    fn read_modules(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ModuleId, Slot>> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, module: ModuleId) -> Option<Slot> {
        self.read_modules().get(&module).cloned()
    }

    fn require(&self, module: ModuleId) -> Result<Slot, MinidoError> {
        self.slot(module).ok_or_else(|| {
            NotFoundError {
                entity: "Module",
                id: module.get().to_string(),
            }
            .into()
        })
    }

    /// Slot for a module addressed from the bus, creating it under lazy provisioning.
    fn slot_for_bus(&self, module: ModuleId) -> Option<Slot> {
        if let Some(slot) = self.slot(module) {
            return Some(slot);
        }
        if self.config.provisioning != ModuleProvisioning::Lazy {
            return None;
        }
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let slot = modules.entry(module).or_insert_with(|| {
            tracing::info!(%module, "provisioning module on first contact");
            new_slot(module, self.config.history_capacity)
        });
        Some(Arc::clone(slot))
    }
}

fn new_slot(id: ModuleId, capacity: usize) -> Slot {
    Arc::new(Mutex::new(OutputModule::new(id, capacity)))
}

fn lock(slot: &Mutex<OutputModule>) -> MutexGuard<'_, OutputModule> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_energized(value: Option<u8>) -> bool {
    value.is_some_and(|v| v != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use minido_domain::address::EXI_BASE;
    use minido_domain::history::OUTPUT_KIND;

    fn m(n: u8) -> ModuleId {
        ModuleId::new(n).unwrap()
    }

    fn ch(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    fn from_input_one() -> Endpoint {
        Endpoint::classify(EXI_BASE + 1)
    }

    #[test]
    fn should_provision_all_sixteen_modules_eagerly() {
        let h = harness(RegistryConfig::default());
        assert_eq!(h.registry.module_ids().len(), 16);
        assert_eq!(h.registry.get_output(m(16), ch(8)).unwrap(), None);
    }

    #[test]
    fn should_create_module_on_first_frame_when_lazy() {
        let h = harness(RegistryConfig {
            provisioning: ModuleProvisioning::Lazy,
            ..RegistryConfig::default()
        });
        assert!(h.registry.module_ids().is_empty());

        h.registry
            .update(m(5), from_input_one(), &[0, 0, 0, 0, 0, 0, 0, 9]);

        assert_eq!(h.registry.module_ids(), vec![m(5)]);
        assert_eq!(h.registry.get_output(m(5), ch(8)).unwrap(), Some(9));
    }

    #[test]
    fn should_report_not_found_on_control_plane_for_unprovisioned_module() {
        let h = harness(RegistryConfig {
            provisioning: ModuleProvisioning::Lazy,
            ..RegistryConfig::default()
        });
        let err = h.registry.set_output(m(2), ch(1), 255).unwrap_err();
        assert!(matches!(err, MinidoError::NotFound(_)));
        assert!(h.registry.module_ids().is_empty());
    }

    #[test]
    fn should_record_one_history_entry_per_changed_channel() {
        let h = harness(RegistryConfig::default());
        h.registry
            .update(m(1), from_input_one(), &[0, 0, 0, 0, 0, 0, 0, 0]);
        let before = h.history.entries().len();

        let changes = h
            .registry
            .update(m(1), from_input_one(), &[255, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].channel, ch(1));
        assert_eq!(changes[0].previous, Some(0));
        let entries = h.history.entries();
        assert_eq!(entries.len(), before + 1);
        let last = entries.last().unwrap();
        assert_eq!(last.kind, OUTPUT_KIND);
        assert_eq!(last.module, m(1));
        assert_eq!(last.channel, ch(1));
        assert_eq!(last.value, 255);
    }

    #[test]
    fn should_not_transmit_on_bus_update() {
        let h = harness(RegistryConfig::default());
        h.registry
            .update(m(1), from_input_one(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(h.transport.frames().is_empty());
    }

    #[test]
    fn should_broadcast_full_status_vector_on_set_output() {
        let h = harness(RegistryConfig::default());
        h.registry
            .update(m(1), from_input_one(), &[10, 20, 0, 0, 0, 0, 0, 0]);

        let snapshot = h.registry.set_output(m(1), ch(3), 128).unwrap();

        assert_eq!(snapshot.channels[2], Some(128));
        assert_eq!(h.registry.get_output(m(1), ch(3)).unwrap(), Some(128));
        let frames = h.transport.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].dest, 0x3C);
        assert_eq!(frames[0].src, LOCAL_SOURCE);
        assert_eq!(frames[0].command, 0x01);
        assert_eq!(frames[0].payload, vec![10, 20, 128, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn should_send_unset_channels_as_zero() {
        let h = harness(RegistryConfig::default());
        h.registry.set_output(m(2), ch(8), 1).unwrap();
        let frames = h.transport.frames();
        assert_eq!(frames[0].dest, 0x3D);
        assert_eq!(frames[0].payload, vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn should_keep_state_when_transport_rejects_frame() {
        let h = harness(RegistryConfig::default());
        h.transport.fail_sends();
        h.registry.set_output(m(1), ch(1), 255).unwrap();
        assert_eq!(h.registry.get_output(m(1), ch(1)).unwrap(), Some(255));
        assert_eq!(h.history.entries().len(), 1);
    }

    #[test]
    fn should_publish_channel_changed_events_with_origin() {
        let h = harness(RegistryConfig::default());
        h.registry.set_output(m(1), ch(1), 255).unwrap();
        let events = h.events.events();
        assert!(matches!(
            events.as_slice(),
            [BusEvent::ChannelChanged {
                origin: ChangeOrigin::Command,
                value: 255,
                ..
            }]
        ));
    }

    #[test]
    fn should_publish_presence_once() {
        let h = harness(RegistryConfig::default());
        h.registry.mark_present(m(3));
        h.registry.mark_present(m(3));
        assert_eq!(h.events.events().len(), 1);
        assert!(h.registry.snapshot(m(3)).unwrap().present);
    }

    #[test]
    fn should_skip_compare_and_set_when_value_moved() {
        let h = harness(RegistryConfig::default());
        let target = ChannelRef::new(m(1), ch(1));
        h.registry.set_output(m(1), ch(1), 0).unwrap();

        assert!(!h.registry.compare_and_set(target, Some(255), 0).unwrap());
        assert_eq!(h.transport.frames().len(), 1);
    }

    #[test]
    fn should_refuse_energize_while_opposing_channel_is_on() {
        let h = harness(RegistryConfig::default());
        let up = ChannelRef::new(m(1), ch(1));
        let down = ChannelRef::new(m(2), ch(1));
        h.registry.set_output(m(2), ch(1), 255).unwrap();

        assert!(!h.registry.energize_exclusive(up, down, 255).unwrap());
        assert_eq!(h.registry.get_output(m(1), ch(1)).unwrap(), None);

        h.registry.set_output(m(2), ch(1), 0).unwrap();
        assert!(h.registry.energize_exclusive(up, down, 255).unwrap());
        assert_eq!(h.registry.get_output(m(1), ch(1)).unwrap(), Some(255));
    }

    #[test]
    fn should_energize_within_one_module() {
        let h = harness(RegistryConfig::default());
        let up = ChannelRef::new(m(4), ch(1));
        let down = ChannelRef::new(m(4), ch(2));
        assert!(h.registry.energize_exclusive(down, up, 255).unwrap());
        assert!(!h.registry.energize_exclusive(up, down, 255).unwrap());
    }

    #[test]
    fn should_restore_history_silently() {
        let h = harness(RegistryConfig::default());
        let at = now();
        let applied = h.registry.restore(vec![
            HistoryEntry::output(m(1), ch(2), 10, at),
            HistoryEntry::output(m(1), ch(2), 20, at),
        ]);

        assert_eq!(applied, 2);
        assert_eq!(h.registry.history(m(1), ch(2)).unwrap().len(), 2);
        assert_eq!(h.registry.get_output(m(1), ch(2)).unwrap(), Some(20));
        assert!(h.history.entries().is_empty());
        assert!(h.transport.frames().is_empty());
        assert!(h.events.events().is_empty());
    }

    #[test]
    fn should_list_modules_in_ascending_order() {
        let h = harness(RegistryConfig::default());
        let ids: Vec<u8> = h.registry.list().iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn should_serialize_each_module_under_concurrent_writers() {
        let h = harness(RegistryConfig {
            history_capacity: 1000,
            ..RegistryConfig::default()
        });
        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let registry = Arc::clone(&h.registry);
                std::thread::spawn(move || {
                    for i in 0..50u8 {
                        registry.set_output(m(1), ch(worker + 1), i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(h.history.entries().len(), 200);
        for worker in 0..4u8 {
            assert_eq!(h.registry.history(m(1), ch(worker + 1)).unwrap().len(), 50);
        }
    }
}
