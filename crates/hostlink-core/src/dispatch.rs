//! Command router and per-class dispatch tables
//!
//! The router pops the class id of each incoming record and hands the rest to
//! that class's [`DispatchTable`]. The table pops the command id: positive ids
//! resolve an instance through the registry and use the instance handlers,
//! everything else goes to the static handlers without touching the registry.
//!
//! Nothing on this path escapes as an error. Each failure is logged and the
//! command is dropped; an instance that was destroyed while a message to it was
//! in flight is an expected race and is logged at a lower severity.

use hashbrown::HashMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{error, trace, warn};

use crate::bridge::Bridge;
use crate::codec::{
    decode_bool, decode_float, decode_int, decode_json, decode_object_ref, decode_string,
    TOKEN_SEPARATOR,
};
use crate::errors::{DecodeError, HostlinkError, HostlinkResult, ProtocolError};
use crate::registry::HostObject;
use crate::types::{CallbackId, ClassId, MethodId, ObjectId};
use crate::value::ScriptValue;
use crate::wire::parse_frame;

// ----------------------------------------------------------------------------
// Incoming Command
// ----------------------------------------------------------------------------

/// Token queue of one incoming record, consumed front to back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingCommand {
    tokens: VecDeque<String>,
}

impl IncomingCommand {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Split one record into tokens
    pub fn parse(record: &str) -> Self {
        Self::new(record.split(TOKEN_SEPARATOR))
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check a command's declared shape against what is left
    pub fn expect_remaining(&self, expected: usize) -> Result<(), ProtocolError> {
        if self.tokens.len() == expected {
            Ok(())
        } else {
            Err(ProtocolError::token_count(expected, self.tokens.len()))
        }
    }

    pub fn pop_token(&mut self, expected: &'static str) -> Result<String, DecodeError> {
        self.tokens
            .pop_front()
            .ok_or_else(|| DecodeError::missing(expected))
    }

    pub fn pop_int(&mut self) -> Result<i64, DecodeError> {
        decode_int(&self.pop_token("integer")?)
    }

    pub fn pop_float(&mut self) -> Result<f64, DecodeError> {
        decode_float(&self.pop_token("float")?)
    }

    pub fn pop_bool(&mut self) -> Result<bool, DecodeError> {
        decode_bool(&self.pop_token("boolean")?)
    }

    pub fn pop_string(&mut self) -> Result<String, DecodeError> {
        decode_string(&self.pop_token("string")?)
    }

    pub fn pop_json(&mut self) -> Result<ScriptValue, DecodeError> {
        decode_json(&self.pop_token("json")?)
    }

    /// Object reference argument; `-1` decodes to `None`
    pub fn pop_object_ref(&mut self) -> Result<Option<ObjectId>, DecodeError> {
        decode_object_ref(&self.pop_token("object id")?)
    }

    pub fn pop_callback_id(&mut self) -> Result<CallbackId, DecodeError> {
        let token = self.pop_token("callback id")?;
        decode_int(&token)
            .ok()
            .and_then(|raw| u32::try_from(raw).ok())
            .map(CallbackId::new)
            .ok_or_else(|| DecodeError::invalid("callback id", token))
    }

    fn pop_class_id(&mut self) -> Result<ClassId, ProtocolError> {
        let raw = self.pop_int()?;
        ClassId::try_from(raw).map_err(|_| ProtocolError::UnknownClass { class_id: raw })
    }

    fn pop_method_id(&mut self) -> Result<MethodId, DecodeError> {
        let token = self.pop_token("command id")?;
        decode_int(&token)
            .ok()
            .and_then(|raw| MethodId::try_from(raw).ok())
            .ok_or_else(|| DecodeError::invalid("command id", token))
    }
}

// ----------------------------------------------------------------------------
// Dispatch Table
// ----------------------------------------------------------------------------

/// Handler for a command addressed to a live instance
pub type InstanceHandler<S> = Box<
    dyn Fn(&mut Bridge, &mut S, &Arc<dyn HostObject>, &mut IncomingCommand) -> HostlinkResult<()>
        + Send
        + Sync,
>;

/// Handler for a static or class-level command
pub type StaticHandler<S> =
    Box<dyn Fn(&mut Bridge, &mut S, &mut IncomingCommand) -> HostlinkResult<()> + Send + Sync>;

/// Handlers of one class, keyed by command id
///
/// `S` is the runtime state handed to every handler next to the bridge.
pub struct DispatchTable<S> {
    class_id: ClassId,
    name: String,
    instance_handlers: HashMap<MethodId, InstanceHandler<S>>,
    static_handlers: HashMap<MethodId, StaticHandler<S>>,
}

impl<S> DispatchTable<S> {
    pub fn new<N: Into<String>>(class_id: ClassId, name: N) -> Self {
        Self {
            class_id,
            name: name.into(),
            instance_handlers: HashMap::new(),
            static_handlers: HashMap::new(),
        }
    }

    /// Register an instance handler; instance command ids are positive
    pub fn on_instance<F>(mut self, method_id: MethodId, handler: F) -> Self
    where
        F: Fn(&mut Bridge, &mut S, &Arc<dyn HostObject>, &mut IncomingCommand) -> HostlinkResult<()>
            + Send
            + Sync
            + 'static,
    {
        debug_assert!(method_id > 0, "instance command ids are positive");
        self.instance_handlers.insert(method_id, Box::new(handler));
        self
    }

    /// Register a static handler; static command ids are zero or negative
    pub fn on_static<F>(mut self, method_id: MethodId, handler: F) -> Self
    where
        F: Fn(&mut Bridge, &mut S, &mut IncomingCommand) -> HostlinkResult<()>
            + Send
            + Sync
            + 'static,
    {
        debug_assert!(method_id <= 0, "static command ids are zero or negative");
        self.static_handlers.insert(method_id, Box::new(handler));
        self
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch the remainder of a record whose class id was already popped
    pub fn dispatch(
        &self,
        bridge: &mut Bridge,
        state: &mut S,
        cmd: &mut IncomingCommand,
    ) -> HostlinkResult<()> {
        let method_id = cmd.pop_method_id().map_err(ProtocolError::from)?;

        if method_id > 0 {
            let raw_instance = cmd.pop_int().map_err(ProtocolError::from)?;
            let instance = ObjectId::from_wire(raw_instance)
                .and_then(|id| bridge.id_to_object(id))
                .cloned()
                .ok_or(ProtocolError::DanglingReference {
                    class_id: self.class_id,
                    method_id,
                    instance_id: raw_instance,
                })?;

            if instance.class_id() != self.class_id {
                return Err(HostlinkError::parse_error(format!(
                    "instance {raw_instance} belongs to class {:#x}, not {:#x}",
                    instance.class_id(),
                    self.class_id
                )));
            }

            let handler = self.instance_handlers.get(&method_id).ok_or(
                ProtocolError::UnknownMethod {
                    class_id: self.class_id,
                    method_id,
                },
            )?;
            trace!(class = %self.name, method_id, instance = raw_instance, "instance command");
            handler(bridge, state, &instance, cmd)
        } else {
            let handler =
                self.static_handlers
                    .get(&method_id)
                    .ok_or(ProtocolError::UnknownMethod {
                        class_id: self.class_id,
                        method_id,
                    })?;
            trace!(class = %self.name, method_id, "static command");
            handler(bridge, state, cmd)
        }
    }
}

// ----------------------------------------------------------------------------
// Router
// ----------------------------------------------------------------------------

/// Result of routing one incoming command
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled,
    Dropped(HostlinkError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }
}

/// Counts for one routed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub handled: usize,
    pub dropped: usize,
    /// Dropped commands whose instance was already gone
    pub dangling: usize,
}

impl FrameReport {
    pub fn total(&self) -> usize {
        self.handled + self.dropped
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled => self.handled += 1,
            DispatchOutcome::Dropped(err) => {
                self.dropped += 1;
                if err.is_dangling_reference() {
                    self.dangling += 1;
                }
            }
        }
    }
}

/// Directory of dispatch tables, frozen once built
pub struct Router<S> {
    tables: BTreeMap<ClassId, DispatchTable<S>>,
}

impl<S> Router<S> {
    /// Build a router; two tables for the same class id are a configuration error
    pub fn new<I>(tables: I) -> HostlinkResult<Self>
    where
        I: IntoIterator<Item = DispatchTable<S>>,
    {
        let mut by_class = BTreeMap::new();
        for table in tables {
            let class_id = table.class_id();
            if let Some(existing) = by_class.insert(class_id, table) {
                return Err(HostlinkError::config_error(format!(
                    "class id {class_id:#x} registered twice ({})",
                    existing.name()
                )));
            }
        }
        Ok(Self { tables: by_class })
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.tables.keys().copied()
    }

    pub fn table(&self, class_id: ClassId) -> Option<&DispatchTable<S>> {
        self.tables.get(&class_id)
    }

    /// Route one command; failures are logged and reported, never raised
    pub fn route(
        &self,
        bridge: &mut Bridge,
        state: &mut S,
        mut cmd: IncomingCommand,
    ) -> DispatchOutcome {
        match self.try_route(bridge, state, &mut cmd) {
            Ok(()) => DispatchOutcome::Handled,
            Err(err) => {
                if err.is_dangling_reference() {
                    warn!(%err, "dropping command");
                } else {
                    error!(%err, "dropping command");
                }
                DispatchOutcome::Dropped(err)
            }
        }
    }

    fn try_route(
        &self,
        bridge: &mut Bridge,
        state: &mut S,
        cmd: &mut IncomingCommand,
    ) -> HostlinkResult<()> {
        let class_id = cmd.pop_class_id()?;
        let table = self
            .tables
            .get(&class_id)
            .ok_or(ProtocolError::UnknownClass {
                class_id: class_id.into(),
            })?;
        table.dispatch(bridge, state, cmd)
    }

    /// Route every record of a frame in arrival order
    pub fn route_frame(&self, bridge: &mut Bridge, state: &mut S, frame: &str) -> FrameReport {
        let mut report = FrameReport::default();
        for cmd in parse_frame(frame) {
            let outcome = self.route(bridge, state, cmd);
            report.record(&outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::any::Any;

    const CLASS: ClassId = 0x148;

    struct Body;

    impl HostObject for Body {
        fn class_id(&self) -> ClassId {
            CLASS
        }

        fn destroy_method(&self) -> MethodId {
            1
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct Seen {
        calls: Vec<String>,
    }

    fn router() -> Router<Seen> {
        let table = DispatchTable::new(CLASS, "Body")
            .on_instance(2, |_bridge, seen: &mut Seen, _obj, cmd| {
                cmd.expect_remaining(1)?;
                let value = cmd.pop_int()?;
                seen.calls.push(format!("instance:{value}"));
                Ok(())
            })
            .on_static(0, |_bridge, seen: &mut Seen, cmd| {
                let first = cmd.pop_token("any")?;
                seen.calls.push(format!("static:{first}"));
                Ok(())
            });
        Router::new([table]).unwrap()
    }

    #[test]
    fn test_instance_dispatch() {
        let router = router();
        let mut bridge = Bridge::new();
        let body: Arc<dyn HostObject> = Arc::new(Body);
        let id = bridge.register(&body).unwrap();
        let mut seen = Seen::default();

        let outcome = router.route(
            &mut bridge,
            &mut seen,
            IncomingCommand::parse(&format!("328,2,{id},7")),
        );
        assert!(outcome.is_handled());
        assert_eq!(seen.calls, vec!["instance:7"]);
    }

    #[test]
    fn test_static_dispatch_skips_instance_resolution() {
        let router = router();
        let mut bridge = Bridge::new();
        let mut seen = Seen::default();

        // 99 is not a registered id; the static path must not care
        let outcome = router.route(&mut bridge, &mut seen, IncomingCommand::parse("328,0,99"));
        assert!(outcome.is_handled());
        assert_eq!(seen.calls, vec!["static:99"]);
    }

    #[test]
    fn test_dangling_instance_is_dropped() {
        let router = router();
        let mut bridge = Bridge::new();
        let mut seen = Seen::default();

        let outcome = router.route(&mut bridge, &mut seen, IncomingCommand::parse("328,2,1,7"));
        match outcome {
            DispatchOutcome::Dropped(err) => assert!(err.is_dangling_reference()),
            DispatchOutcome::Handled => panic!("dangling command was handled"),
        }
        assert!(seen.calls.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let router = router();
        let mut bridge = Bridge::new();
        let mut seen = Seen::default();

        let report = router.route_frame(&mut bridge, &mut seen, "999,0:328,-5:328,x");
        assert_eq!(report.dropped, 3);
        assert_eq!(report.handled, 0);
        assert_eq!(report.dangling, 0);
    }

    #[test]
    fn test_wrong_token_count_is_dropped() {
        let router = router();
        let mut bridge = Bridge::new();
        let body: Arc<dyn HostObject> = Arc::new(Body);
        let id = bridge.register(&body).unwrap();
        let mut seen = Seen::default();

        let report = router.route_frame(
            &mut bridge,
            &mut seen,
            &format!("328,2,{id},1,2:328,2,{id},3"),
        );
        assert_eq!(report.dropped, 1);
        assert_eq!(report.handled, 1);
        assert_eq!(seen.calls, vec!["instance:3"]);
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let tables: Vec<DispatchTable<Seen>> =
            vec![DispatchTable::new(CLASS, "A"), DispatchTable::new(CLASS, "B")];
        assert!(Router::new(tables).is_err());
    }

    #[test]
    fn test_pop_callback_id() {
        let mut cmd = IncomingCommand::parse("3,-2");
        assert_eq!(cmd.pop_callback_id().unwrap(), CallbackId::new(3));
        assert!(cmd.pop_callback_id().is_err());
        assert!(cmd.pop_callback_id().is_err());
    }
}
