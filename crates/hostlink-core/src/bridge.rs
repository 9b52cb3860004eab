//! The bridge: object registry plus the outgoing command buffer
//!
//! Every outgoing call goes through a [`Bridge`]. Arguments are encoded into
//! a complete record before it is pushed, so a failed call never leaves a
//! partial record behind.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec::{encode_args, encode_int};
use crate::command::{CommandBuffer, CommandRecord, Target};
use crate::errors::{EncodeError, HostlinkResult};
use crate::registry::{HostObject, ObjectRegistry};
use crate::types::{ObjectId, Opcode};
use crate::value::ScriptValue;
use crate::validation::Schema;
use crate::wire::encode_frame;

#[cfg(feature = "validation")]
use crate::validation::validate_args;

/// Registry and outbox of one runtime
#[derive(Default)]
pub struct Bridge {
    registry: ObjectRegistry<dyn HostObject>,
    outbox: CommandBuffer,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    pub fn register(&mut self, obj: &Arc<dyn HostObject>) -> HostlinkResult<ObjectId> {
        Ok(self.registry.register(obj)?)
    }

    pub fn unregister(&mut self, obj: &Arc<dyn HostObject>) -> Option<ObjectId> {
        self.registry.unregister(obj)
    }

    pub fn unregister_id(&mut self, id: ObjectId) -> Option<Arc<dyn HostObject>> {
        self.registry.unregister_id(id)
    }

    pub fn id_to_object(&self, id: ObjectId) -> Option<&Arc<dyn HostObject>> {
        self.registry.id_to_object(id)
    }

    pub fn object_to_id(&self, obj: &Arc<dyn HostObject>) -> Option<ObjectId> {
        self.registry.object_to_id(obj)
    }

    pub fn registry(&self) -> &ObjectRegistry<dyn HostObject> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Encoder
    // ------------------------------------------------------------------------

    /// Append a static or create command
    pub fn append_command(&mut self, opcode: Opcode, args: &[ScriptValue]) -> HostlinkResult<()> {
        let tokens = encode_args(args, &self.registry)?;
        trace!(%opcode, "append command");
        self.outbox.push(CommandRecord::command(opcode, tokens));
        Ok(())
    }

    /// Append an instance command; `None` addresses the null instance (`-1`)
    pub fn append_instance_command(
        &mut self,
        opcode: Opcode,
        instance: Option<&Arc<dyn HostObject>>,
        args: &[ScriptValue],
    ) -> HostlinkResult<()> {
        let target = match instance {
            None => Target::Null,
            Some(obj) => Target::Object(self.registry.object_to_id(obj).ok_or(
                EncodeError::UnregisteredInstance {
                    class_id: obj.class_id(),
                },
            )?),
        };
        let tokens = encode_args(args, &self.registry)?;
        trace!(%opcode, instance = %target.to_token(), "append instance command");
        self.outbox
            .push(CommandRecord::instance_command(opcode, target, tokens));
        Ok(())
    }

    /// Append a continuation record carrying more payload for the previous command
    pub fn append_subcommand(&mut self, args: &[ScriptValue]) -> HostlinkResult<()> {
        let tokens = encode_args(args, &self.registry)?;
        self.outbox.push(CommandRecord::subcommand(tokens));
        Ok(())
    }

    /// Validate `args` against any of `schemas`, then append a static command
    ///
    /// Without the `validation` feature this is [`Bridge::append_command`].
    #[allow(unused_variables)]
    pub fn append_command_checked(
        &mut self,
        opcode: Opcode,
        args: &[ScriptValue],
        schemas: &[Schema],
    ) -> HostlinkResult<()> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "validation")] {
                validate_args(args, schemas)?;
            }
        }
        self.append_command(opcode, args)
    }

    /// Validate `args` against any of `schemas`, then append an instance command
    #[allow(unused_variables)]
    pub fn append_instance_command_checked(
        &mut self,
        opcode: Opcode,
        instance: Option<&Arc<dyn HostObject>>,
        args: &[ScriptValue],
        schemas: &[Schema],
    ) -> HostlinkResult<()> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "validation")] {
                validate_args(args, schemas)?;
            }
        }
        self.append_instance_command(opcode, instance, args)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Register `obj` and emit its create command with the new id first
    ///
    /// If the arguments fail to encode the object is left unregistered. An
    /// object that is already registered keeps its id and nothing is emitted.
    pub fn create_instance(
        &mut self,
        obj: &Arc<dyn HostObject>,
        args: &[ScriptValue],
    ) -> HostlinkResult<ObjectId> {
        if let Some(id) = self.registry.object_to_id(obj) {
            debug!(object_id = %id, "instance already created");
            return Ok(id);
        }
        let id = self.registry.register(obj)?;

        let mut tokens = vec![encode_int(id.get().into())];
        match encode_args(args, &self.registry) {
            Ok(encoded) => tokens.extend(encoded),
            Err(err) => {
                self.registry.unregister(obj);
                return Err(err.into());
            }
        }

        let opcode = Opcode::create(obj.class_id());
        self.outbox.push(CommandRecord::command(opcode, tokens));
        debug!(object_id = %id, %opcode, "created instance");
        Ok(id)
    }

    /// Run the destroy hook, emit the destroy command, then unregister
    ///
    /// Destroying an object that is not registered is a no-op returning `None`.
    pub fn destroy_instance(&mut self, obj: &Arc<dyn HostObject>) -> Option<ObjectId> {
        let id = self.registry.object_to_id(obj)?;
        obj.on_destroy();

        let opcode = Opcode::new(obj.class_id(), obj.destroy_method());
        self.outbox.push(CommandRecord::instance_command(
            opcode,
            Target::Object(id),
            Vec::new(),
        ));
        self.registry.unregister(obj);
        debug!(object_id = %id, "destroyed instance");
        Some(id)
    }

    // ------------------------------------------------------------------------
    // Frame Output
    // ------------------------------------------------------------------------

    pub fn outbox(&self) -> &CommandBuffer {
        &self.outbox
    }

    /// Take every pending record
    pub fn drain_outbox(&mut self) -> Vec<CommandRecord> {
        self.outbox.drain()
    }

    /// Encode and clear the pending records as one frame
    pub fn flush_frame(&mut self) -> String {
        encode_frame(&self.outbox.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HostlinkError;
    use crate::types::{ClassId, MethodId};
    use crate::validation::{arg, Kind};
    use core::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    const CLASS: ClassId = 0x148;

    #[derive(Default)]
    struct Sound {
        stopped: AtomicBool,
    }

    impl HostObject for Sound {
        fn class_id(&self) -> ClassId {
            CLASS
        }

        fn destroy_method(&self) -> MethodId {
            3
        }

        fn on_destroy(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn sound() -> Arc<dyn HostObject> {
        Arc::new(Sound::default())
    }

    #[test]
    fn test_create_instance_emits_id_first() {
        let mut bridge = Bridge::new();
        let obj = sound();
        let id = bridge.create_instance(&obj, &["clip".into()]).unwrap();

        assert_eq!(id.get(), 1);
        assert_eq!(bridge.flush_frame(), "148ffff,1,clip");
    }

    #[test]
    fn test_instance_command_resolves_id() {
        let mut bridge = Bridge::new();
        let a = sound();
        let b = sound();
        bridge.register(&a).unwrap();
        bridge.register(&b).unwrap();

        bridge
            .append_instance_command(
                Opcode::new(CLASS, 4),
                Some(&b),
                &[ScriptValue::Instance(Arc::clone(&a)), 0.5.into()],
            )
            .unwrap();
        bridge
            .append_instance_command(Opcode::new(CLASS, 4), None, &[])
            .unwrap();
        assert_eq!(bridge.flush_frame(), "1480004,2,1,0.5:1480004,-1");
    }

    #[test]
    fn test_failed_encode_leaves_outbox_untouched() {
        let mut bridge = Bridge::new();
        let stranger = sound();

        let err = bridge.append_command(
            Opcode::new(CLASS, 0),
            &[1.into(), ScriptValue::Instance(stranger)],
        );
        assert!(err.is_err());
        assert!(bridge.outbox().is_empty());

        assert!(bridge
            .append_command(Opcode::new(CLASS, 0), &[ScriptValue::Undefined])
            .is_err());
        assert!(bridge.outbox().is_empty());
    }

    #[test]
    fn test_failed_create_does_not_register() {
        let mut bridge = Bridge::new();
        let obj = sound();
        assert!(bridge
            .create_instance(&obj, &[ScriptValue::Undefined])
            .is_err());
        assert!(bridge.object_to_id(&obj).is_none());
        assert!(bridge.outbox().is_empty());
    }

    #[test]
    fn test_destroy_instance() {
        let mut bridge = Bridge::new();
        let obj = sound();
        let id = bridge.create_instance(&obj, &[]).unwrap();
        bridge.flush_frame();

        assert_eq!(bridge.destroy_instance(&obj), Some(id));
        assert_eq!(bridge.flush_frame(), "1480003,1");
        assert!(bridge.id_to_object(id).is_none());
        assert!(obj.downcast_ref::<Sound>().unwrap().stopped.load(Ordering::SeqCst));

        assert_eq!(bridge.destroy_instance(&obj), None);
        assert!(bridge.outbox().is_empty());
    }

    #[test]
    fn test_subcommand() {
        let mut bridge = Bridge::new();
        bridge.append_command(Opcode::new(CLASS, -2), &[1.into()]).unwrap();
        bridge.append_subcommand(&["a,b".into()]).unwrap();
        assert_eq!(bridge.flush_frame(), "148fffe,1:,a%2Cb");
    }

    #[test]
    fn test_create_instance_twice_keeps_id() {
        let mut bridge = Bridge::new();
        let obj = sound();
        let id = bridge.create_instance(&obj, &["clip".into()]).unwrap();
        assert_eq!(bridge.create_instance(&obj, &["other".into()]).unwrap(), id);
        assert_eq!(bridge.flush_frame(), "148ffff,1,clip");
        assert_eq!(bridge.registry().len(), 1);
    }

    #[cfg(feature = "validation")]
    #[test]
    fn test_checked_append_runs_validator() {
        let mut bridge = Bridge::new();
        let err = bridge
            .append_command_checked(Opcode::new(CLASS, 0), &["loud".into()], &[arg(Kind::Number)])
            .unwrap_err();
        assert!(matches!(err, HostlinkError::Validation(_)));
        assert!(bridge.outbox().is_empty());
    }

    #[cfg(not(feature = "validation"))]
    #[test]
    fn test_checked_append_skips_validator() {
        let mut bridge = Bridge::new();
        bridge
            .append_command_checked(Opcode::new(CLASS, 0), &["loud".into()], &[arg(Kind::Number)])
            .unwrap();
        bridge
            .append_instance_command_checked(Opcode::new(CLASS, 4), None, &[], &[arg(Kind::Number)])
            .unwrap();
        assert_eq!(bridge.flush_frame(), "1480000,loud:1480004,-1");
    }
}
