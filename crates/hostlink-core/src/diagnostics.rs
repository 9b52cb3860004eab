//! Diagnostics pub/sub channel
//!
//! Named emitters publish JSON snapshots to local listeners and to the native
//! side. Each emitter is backed by a registered [`EmitterHandle`], so native can
//! address it by instance id: it reports how many native listeners exist and
//! drives polling with tick commands.
//!
//! Collectors are polled only while the emitter has at least one listener,
//! local or native. Whatever they return is shallow-merged into the emitter's
//! snapshot, and a changed snapshot is pushed to everyone once per tick.

use core::any::Any;
use core::fmt;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::config::DiagnosticsConfig;
use crate::dispatch::{DispatchTable, IncomingCommand};
use crate::errors::{DiagnosticsError, HostlinkError, HostlinkResult};
use crate::registry::HostObject;
use crate::types::{ClassId, MethodId, ObjectId, Opcode};
use crate::value::ScriptValue;

/// Snapshot payload of an emitter
pub type Diagnostics = Map<String, Value>;

type Listener = Box<dyn FnMut(&Diagnostics) + Send>;
type Collector = Box<dyn FnMut() -> Option<Diagnostics> + Send>;

// ----------------------------------------------------------------------------
// Wire Methods
// ----------------------------------------------------------------------------

/// Method ids of the diagnostics class
pub mod methods {
    use crate::types::{MethodId, Opcode};

    /// out: `[id, name, intervalFrames]`
    pub const CREATE: MethodId = Opcode::CREATE;
    /// out: `[totalListeners]`
    pub const SET_LISTENER_COUNT: MethodId = 1;
    /// out: `[jsonSnapshot]`
    pub const EMIT: MethodId = 2;
    /// out: `[]`
    pub const DESTROY: MethodId = 3;

    /// in: `[nativeListenerCount]`
    pub const NATIVE_LISTENERS: MethodId = 1;
    /// in: `[]`
    pub const TICK: MethodId = 2;
}

// ----------------------------------------------------------------------------
// Emitter Handle
// ----------------------------------------------------------------------------

/// Registered object standing in for one emitter
#[derive(Debug)]
pub struct EmitterHandle {
    name: String,
    class_id: ClassId,
}

impl EmitterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl HostObject for EmitterHandle {
    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn destroy_method(&self) -> MethodId {
        methods::DESTROY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handle returned by [`DiagnosticsRecord::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// ----------------------------------------------------------------------------
// Diagnostics Record
// ----------------------------------------------------------------------------

/// One named emitter
pub struct DiagnosticsRecord {
    name: String,
    handle: Arc<dyn HostObject>,
    id: ObjectId,
    interval_frames: u32,
    diags: Diagnostics,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    native_listeners: u32,
    collectors: Vec<Collector>,
    dirty: bool,
}

impl fmt::Debug for DiagnosticsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsRecord")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("interval_frames", &self.interval_frames)
            .field("local_listeners", &self.listeners.len())
            .field("native_listeners", &self.native_listeners)
            .field("collectors", &self.collectors.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl DiagnosticsRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn interval_frames(&self) -> u32 {
        self.interval_frames
    }

    /// Local plus native listeners
    pub fn listener_count(&self) -> u32 {
        u32::try_from(self.listeners.len())
            .unwrap_or(u32::MAX)
            .saturating_add(self.native_listeners)
    }

    pub fn is_active(&self) -> bool {
        self.listener_count() > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn snapshot(&self) -> &Diagnostics {
        &self.diags
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Subscribe locally; the new total is reported to native immediately
    pub fn add_listener<F>(&mut self, bridge: &mut Bridge, listener: F) -> HostlinkResult<ListenerId>
    where
        F: FnMut(&Diagnostics) + Send + 'static,
    {
        let was_active = self.is_active();
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Box::new(listener));

        self.report_listener_count(bridge)?;
        if !was_active {
            self.activate(bridge)?;
        }
        Ok(id)
    }

    /// Unsubscribe; returns false if the listener was not registered
    pub fn remove_listener(&mut self, bridge: &mut Bridge, id: ListenerId) -> HostlinkResult<bool> {
        if self.listeners.remove(&id).is_none() {
            return Ok(false);
        }
        self.report_listener_count(bridge)?;
        Ok(true)
    }

    /// Native reported how many listeners it has
    pub fn set_native_listeners(&mut self, bridge: &mut Bridge, count: u32) -> HostlinkResult<()> {
        let was_active = self.is_active();
        self.native_listeners = count;
        debug!(emitter = %self.name, count, "native listener count");
        if !was_active && self.is_active() {
            self.activate(bridge)?;
        }
        Ok(())
    }

    fn report_listener_count(&mut self, bridge: &mut Bridge) -> HostlinkResult<()> {
        let total = self.listener_count();
        bridge.append_instance_command(
            Opcode::new(self.handle.class_id(), methods::SET_LISTENER_COUNT),
            Some(&self.handle),
            &[total.into()],
        )
    }

    /// First listener arrived: collect once so it sees current data
    fn activate(&mut self, bridge: &mut Bridge) -> HostlinkResult<()> {
        self.collect();
        if self.dirty {
            self.push(bridge)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------------

    /// Add a polled collector; it runs once right away if anyone is listening
    pub fn push_collector<F>(&mut self, bridge: &mut Bridge, collector: F) -> HostlinkResult<()>
    where
        F: FnMut() -> Option<Diagnostics> + Send + 'static,
    {
        let mut collector: Collector = Box::new(collector);
        if self.is_active() {
            if let Some(values) = collector() {
                self.update(values);
            }
            self.collectors.push(collector);
            if self.dirty {
                self.push(bridge)?;
            }
        } else {
            self.collectors.push(collector);
        }
        Ok(())
    }

    fn collect(&mut self) {
        let mut merged = Diagnostics::new();
        for collector in self.collectors.iter_mut() {
            if let Some(values) = collector() {
                merged.extend(values);
            }
        }
        if !merged.is_empty() {
            self.update(merged);
        }
    }

    /// Poll collectors and push if anything changed; returns whether a push happened
    ///
    /// Without listeners this does nothing at all.
    pub fn tick(&mut self, bridge: &mut Bridge) -> HostlinkResult<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        self.collect();
        if !self.dirty {
            return Ok(false);
        }
        self.push(bridge)?;
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------------

    /// Shallow-merge values without pushing
    pub fn update(&mut self, values: Diagnostics) {
        self.diags.extend(values);
        self.dirty = true;
    }

    /// Shallow-merge values and push immediately
    pub fn push_update(&mut self, bridge: &mut Bridge, values: Diagnostics) -> HostlinkResult<()> {
        self.update(values);
        self.push(bridge)
    }

    /// Send the full snapshot to local listeners and to native
    pub fn push(&mut self, bridge: &mut Bridge) -> HostlinkResult<()> {
        for listener in self.listeners.values_mut() {
            listener(&self.diags);
        }
        bridge.append_instance_command(
            Opcode::new(self.handle.class_id(), methods::EMIT),
            Some(&self.handle),
            &[ScriptValue::from(self.diags.clone())],
        )?;
        self.dirty = false;
        Ok(())
    }

    /// Discard every key, optionally seeding new ones
    pub fn reset(&mut self, seed: Option<Diagnostics>) {
        self.diags = seed.unwrap_or_default();
        self.dirty = true;
    }
}

// ----------------------------------------------------------------------------
// Diagnostic Registry
// ----------------------------------------------------------------------------

/// State that owns a [`DiagnosticRegistry`], so its dispatch table can reach it
pub trait DiagnosticsHost {
    fn diagnostics(&mut self) -> &mut DiagnosticRegistry;
}

/// All emitters of one runtime, keyed by name
#[derive(Debug)]
pub struct DiagnosticRegistry {
    class_id: ClassId,
    default_interval_frames: u32,
    emitters: BTreeMap<String, DiagnosticsRecord>,
}

impl DiagnosticsHost for DiagnosticRegistry {
    fn diagnostics(&mut self) -> &mut DiagnosticRegistry {
        self
    }
}

impl DiagnosticRegistry {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            class_id: config.class_id,
            default_interval_frames: config.default_interval_frames,
            emitters: BTreeMap::new(),
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.emitters.keys().map(String::as_str)
    }

    /// Look up an emitter without creating it
    pub fn find_emitter(&self, name: &str) -> Option<&DiagnosticsRecord> {
        self.emitters.get(name)
    }

    pub fn find_emitter_mut(&mut self, name: &str) -> Option<&mut DiagnosticsRecord> {
        self.emitters.get_mut(name)
    }

    /// Get the named emitter, creating it with the default interval if needed
    pub fn create_emitter(
        &mut self,
        bridge: &mut Bridge,
        name: &str,
    ) -> HostlinkResult<&mut DiagnosticsRecord> {
        if !self.emitters.contains_key(name) {
            let interval = self.default_interval_frames;
            self.insert_emitter(bridge, name, interval)?;
        }
        self.emitters
            .get_mut(name)
            .ok_or_else(|| HostlinkError::config_error(format!("emitter {name} vanished")))
    }

    /// Create a new emitter; a name that is already taken keeps the original
    pub fn register_emitter(
        &mut self,
        bridge: &mut Bridge,
        name: &str,
        interval_frames: u32,
    ) -> HostlinkResult<&mut DiagnosticsRecord> {
        if self.emitters.contains_key(name) {
            warn!(emitter = %name, "diagnostics emitter already registered");
            return Err(DiagnosticsError::DuplicateEmitter {
                name: name.to_string(),
            }
            .into());
        }
        self.insert_emitter(bridge, name, interval_frames)
    }

    fn insert_emitter(
        &mut self,
        bridge: &mut Bridge,
        name: &str,
        interval_frames: u32,
    ) -> HostlinkResult<&mut DiagnosticsRecord> {
        let handle: Arc<dyn HostObject> = Arc::new(EmitterHandle {
            name: name.to_string(),
            class_id: self.class_id,
        });
        let id = bridge.create_instance(&handle, &[name.into(), interval_frames.into()])?;
        debug!(emitter = %name, object_id = %id, interval_frames, "created emitter");

        let record = DiagnosticsRecord {
            name: name.to_string(),
            handle,
            id,
            interval_frames,
            diags: Diagnostics::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            native_listeners: 0,
            collectors: Vec::new(),
            dirty: false,
        };
        Ok(self.emitters.entry(name.to_string()).or_insert(record))
    }

    /// Destroy an emitter; returns false if no such emitter exists
    pub fn remove_emitter(&mut self, bridge: &mut Bridge, name: &str) -> bool {
        match self.emitters.remove(name) {
            Some(record) => {
                bridge.destroy_instance(&record.handle);
                debug!(emitter = %name, "removed emitter");
                true
            }
            None => false,
        }
    }

    fn record_for(&mut self, obj: &Arc<dyn HostObject>) -> HostlinkResult<&mut DiagnosticsRecord> {
        let handle = obj
            .downcast_ref::<EmitterHandle>()
            .ok_or_else(|| HostlinkError::parse_error("instance is not a diagnostics emitter"))?;
        self.emitters
            .get_mut(handle.name())
            .ok_or_else(|| HostlinkError::parse_error(format!("emitter {} is gone", handle.name())))
    }

    /// Handlers for the inbound diagnostics methods
    pub fn dispatch_table<S: DiagnosticsHost + 'static>(&self) -> DispatchTable<S> {
        DispatchTable::new(self.class_id, "Diagnostics")
            .on_instance(methods::NATIVE_LISTENERS, native_listeners_handler::<S>)
            .on_instance(methods::TICK, tick_handler::<S>)
    }
}

fn native_listeners_handler<S: DiagnosticsHost>(
    bridge: &mut Bridge,
    state: &mut S,
    obj: &Arc<dyn HostObject>,
    cmd: &mut IncomingCommand,
) -> HostlinkResult<()> {
    cmd.expect_remaining(1)?;
    let raw = cmd.pop_int()?;
    let count = u32::try_from(raw)
        .map_err(|_| HostlinkError::parse_error(format!("listener count {raw} out of range")))?;
    state
        .diagnostics()
        .record_for(obj)?
        .set_native_listeners(bridge, count)
}

fn tick_handler<S: DiagnosticsHost>(
    bridge: &mut Bridge,
    state: &mut S,
    obj: &Arc<dyn HostObject>,
    cmd: &mut IncomingCommand,
) -> HostlinkResult<()> {
    cmd.expect_remaining(0)?;
    state.diagnostics().record_for(obj)?.tick(bridge)?;
    Ok(())
}
