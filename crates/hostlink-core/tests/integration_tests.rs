//! Integration tests for the hostlink core
//!
//! These tests drive a bridge and a router together the way a feature class
//! would: objects are created and destroyed, native replies are routed back,
//! asynchronous results are correlated and outgoing calls are validated.

use hostlink_core::validation::{arg, list, optional_arg, or, Kind};
use hostlink_core::wire::decode_outgoing_frame;
use hostlink_core::*;
use std::any::Any;
use std::sync::{Arc, Mutex};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const SOUND_CLASS: ClassId = 0x148;

mod sound_methods {
    use hostlink_core::MethodId;

    pub const LOAD: MethodId = -2;
    pub const PLAY: MethodId = 1;
    pub const DESTROY: MethodId = 2;
    pub const VOLUME: MethodId = 3;

    // inbound
    pub const LOADED: MethodId = 0;
    pub const FINISHED: MethodId = 1;
}

/// Minimal feature class: a sound with an async "loaded" reply
#[derive(Default)]
struct Sound {
    finished: Mutex<u32>,
}

impl HostObject for Sound {
    fn class_id(&self) -> ClassId {
        SOUND_CLASS
    }

    fn destroy_method(&self) -> MethodId {
        sound_methods::DESTROY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct SoundState {
    loads: CallbackRegistry<bool>,
    log: Arc<Mutex<Vec<String>>>,
}

fn sound_router() -> Router<SoundState> {
    let table = DispatchTable::new(SOUND_CLASS, "Sound")
        .on_instance(sound_methods::FINISHED, |_bridge, _state: &mut SoundState, obj, cmd| {
            cmd.expect_remaining(0)?;
            if let Some(sound) = obj.downcast_ref::<Sound>() {
                if let Ok(mut finished) = sound.finished.lock() {
                    *finished += 1;
                }
            }
            Ok(())
        })
        .on_static(sound_methods::LOADED, |_bridge, state: &mut SoundState, cmd| {
            cmd.expect_remaining(2)?;
            let callback_id = cmd.pop_callback_id()?;
            let ok = cmd.pop_bool()?;
            state.loads.resolve(callback_id, ok)?;
            Ok(())
        });
    Router::new([table]).unwrap()
}

fn new_sound() -> Arc<dyn HostObject> {
    Arc::new(Sound::default())
}

// ----------------------------------------------------------------------------
// End-to-end Lifecycle
// ----------------------------------------------------------------------------

#[test]
fn test_create_command_destroy_lifecycle() {
    let router = sound_router();
    let mut bridge = Bridge::new();
    let mut state = SoundState::default();

    let sound = new_sound();
    let id = bridge.create_instance(&sound, &["boom.ogg".into()]).unwrap();
    assert_eq!(id.get(), 1);

    bridge
        .append_instance_command(
            Opcode::new(SOUND_CLASS, sound_methods::PLAY),
            Some(&sound),
            &[],
        )
        .unwrap();

    let records = decode_outgoing_frame(&bridge.flush_frame()).unwrap();
    let create = records[0].opcode().unwrap();
    assert!(create.is_create());
    assert_eq!(create.pack() & 0xFFFF, 0xFFFF);
    assert_eq!(records[0].args()[0], "1");
    assert_eq!(records[0].args()[1], "boom.ogg");

    // native reports playback finished
    let report = router.route_frame(&mut bridge, &mut state, "328,1,1");
    assert_eq!(report.handled, 1);
    assert_eq!(*sound.downcast_ref::<Sound>().unwrap().finished.lock().unwrap(), 1);

    bridge.destroy_instance(&sound);
    assert_eq!(bridge.flush_frame(), "1480002,1");

    // a message that crossed the destroy in flight is dropped, not delivered
    let report = router.route_frame(&mut bridge, &mut state, "328,1,1");
    assert_eq!(report.dropped, 1);
    assert_eq!(report.dangling, 1);
    assert_eq!(*sound.downcast_ref::<Sound>().unwrap().finished.lock().unwrap(), 1);
}

#[test]
fn test_command_namespaces_are_per_class() {
    let other = DispatchTable::new(0x149, "Other").on_static(0, |_b, seen: &mut Vec<u16>, _c| {
        seen.push(0x149);
        Ok(())
    });
    let sound = DispatchTable::new(SOUND_CLASS, "Sound").on_static(0, |_b, seen: &mut Vec<u16>, _c| {
        seen.push(SOUND_CLASS);
        Ok(())
    });
    let router = Router::new([other, sound]).unwrap();
    let mut bridge = Bridge::new();
    let mut seen = Vec::new();

    router.route_frame(&mut bridge, &mut seen, "329,0:328,0:329,0");
    assert_eq!(seen, vec![0x149, SOUND_CLASS, 0x149]);
}

#[test]
fn test_instance_of_wrong_class_is_dropped() {
    struct Other;
    impl HostObject for Other {
        fn class_id(&self) -> ClassId {
            0x149
        }
        fn destroy_method(&self) -> MethodId {
            1
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let router = sound_router();
    let mut bridge = Bridge::new();
    let mut state = SoundState::default();
    let other: Arc<dyn HostObject> = Arc::new(Other);
    bridge.register(&other).unwrap();

    let report = router.route_frame(&mut bridge, &mut state, "328,1,1");
    assert_eq!(report.dropped, 1);
    assert_eq!(report.dangling, 0);
}

// ----------------------------------------------------------------------------
// Callback Correlation
// ----------------------------------------------------------------------------

#[test]
fn test_replies_resolve_out_of_order_exactly_once() {
    let router = sound_router();
    let mut bridge = Bridge::new();
    let mut state = SoundState::default();

    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let log = Arc::clone(&state.log);
        let id = state.loads.register(move |ok| {
            log.lock().unwrap().push(format!("{name}:{ok}"));
        });
        bridge
            .append_command(
                Opcode::new(SOUND_CLASS, sound_methods::LOAD),
                &[name.into(), id.get().into()],
            )
            .unwrap();
        ids.push(id.get());
    }
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(
        bridge.flush_frame(),
        "148fffe,a,1:148fffe,b,2:148fffe,c,3"
    );

    let report = router.route_frame(&mut bridge, &mut state, "328,0,2,1:328,0,3,0:328,0,1,1");
    assert_eq!(report.handled, 3);
    assert_eq!(
        *state.log.lock().unwrap(),
        vec!["b:true", "c:false", "a:true"]
    );

    // duplicate reply is logged and dropped
    let report = router.route_frame(&mut bridge, &mut state, "328,0,2,1");
    assert_eq!(report.dropped, 1);
    assert_eq!(state.log.lock().unwrap().len(), 3);

    // callback id 0 means no reply was wanted
    let report = router.route_frame(&mut bridge, &mut state, "328,0,0,1");
    assert_eq!(report.handled, 1);
}

// ----------------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------------

#[cfg(feature = "validation")]
#[test]
fn test_validation_failure_leaves_outbox_untouched() {
    let mut bridge = Bridge::new();
    let sound = new_sound();
    bridge.create_instance(&sound, &[]).unwrap();
    bridge.flush_frame();

    let schemas = [list([arg(Kind::Number), optional_arg(Kind::Number)])];
    let err = bridge
        .append_instance_command_checked(
            Opcode::new(SOUND_CLASS, sound_methods::VOLUME),
            Some(&sound),
            &["loud".into()],
            &schemas,
        )
        .unwrap_err();
    match err {
        HostlinkError::Validation(err) => {
            assert_eq!(err.path, "args[0]");
            assert_eq!(err.expected, "number");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(bridge.outbox().is_empty());

    bridge
        .append_instance_command_checked(
            Opcode::new(SOUND_CLASS, sound_methods::VOLUME),
            Some(&sound),
            &[0.5.into()],
            &schemas,
        )
        .unwrap();
    assert_eq!(bridge.flush_frame(), "1480003,1,0.5");
}

#[cfg(feature = "validation")]
#[test]
fn test_union_of_signatures() {
    let mut bridge = Bridge::new();
    let schemas = [
        list([arg(Kind::String)]),
        list([or([arg(Kind::Integer), arg(Kind::Boolean)]), arg(Kind::String)]),
    ];

    assert!(bridge
        .append_command_checked(Opcode::new(SOUND_CLASS, -3), &["x".into()], &schemas)
        .is_ok());
    assert!(bridge
        .append_command_checked(Opcode::new(SOUND_CLASS, -3), &[true.into(), "x".into()], &schemas)
        .is_ok());
    assert!(bridge
        .append_command_checked(Opcode::new(SOUND_CLASS, -3), &[1.5.into()], &schemas)
        .is_err());
    assert_eq!(bridge.outbox().len(), 2);
}
