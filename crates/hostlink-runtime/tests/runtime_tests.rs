//! Integration tests for the hostlink runtime
//!
//! These tests build complete runtimes, register a feature class, and drive
//! ticks both directly and through the async transport loop.

use hostlink_core::diagnostics::Diagnostics;
use hostlink_core::{CallbackRegistry, ClassId, MethodId};
use hostlink_runtime::*;
use serde_json::json;
use std::any::Any;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const TIMER_CLASS: ClassId = 0x160;
const TIMER_FIRED: MethodId = 1;
const TIMER_DESTROY: MethodId = 2;
const TIMER_QUERY_REPLY: MethodId = 0;

struct Timer;

impl HostObject for Timer {
    fn class_id(&self) -> ClassId {
        TIMER_CLASS
    }

    fn destroy_method(&self) -> MethodId {
        TIMER_DESTROY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct TimerState {
    fired: Vec<ObjectId>,
    queries: CallbackRegistry<i64>,
}

fn timer_table() -> DispatchTable<RuntimeState> {
    DispatchTable::new(TIMER_CLASS, "Timer")
        .on_instance(TIMER_FIRED, |bridge, state: &mut RuntimeState, obj, cmd| {
            cmd.expect_remaining(0)?;
            let id = bridge.object_to_id(obj);
            if let (Some(timers), Some(id)) = (state.extension_mut::<TimerState>(), id) {
                timers.fired.push(id);
            }
            Ok(())
        })
        .on_static(TIMER_QUERY_REPLY, |_bridge, state: &mut RuntimeState, cmd| {
            cmd.expect_remaining(2)?;
            let callback_id = cmd.pop_callback_id()?;
            let elapsed = cmd.pop_int()?;
            if let Some(timers) = state.extension_mut::<TimerState>() {
                timers.queries.resolve(callback_id, elapsed)?;
            }
            Ok(())
        })
}

fn timer_runtime() -> HostRuntime {
    RuntimeBuilder::new()
        .with_config(HostlinkConfig::testing())
        .register_class(timer_table())
        .with_extension(TimerState::default())
        .build()
        .expect("runtime should build")
}

// ----------------------------------------------------------------------------
// Direct Ticks
// ----------------------------------------------------------------------------

#[test]
fn test_feature_class_round_trip() {
    let mut runtime = timer_runtime();
    let timer: Arc<dyn HostObject> = Arc::new(Timer);
    let id = runtime.create_instance(&timer, &[250.into()]).unwrap();

    // the protocol emitter took id 1
    assert_eq!(id.get(), 2);
    assert_eq!(
        runtime.flush(),
        "150ffff,1,hostlink.protocol,1:160ffff,2,250"
    );

    // 0x160 == 352
    let report = runtime.process_frame("352,1,2:352,1,2");
    assert_eq!(report.handled, 2);
    let fired = &runtime.state().extension::<TimerState>().unwrap().fired;
    assert_eq!(fired, &vec![id, id]);

    runtime.destroy_instance(&timer);
    assert_eq!(runtime.flush(), "1600002,2");

    let report = runtime.process_frame("352,1,2");
    assert_eq!(report.dangling, 1);
    assert_eq!(runtime.stats().dangling_references, 1);
    assert_eq!(
        runtime.state().extension::<TimerState>().unwrap().fired.len(),
        2
    );
}

#[test]
fn test_async_reply_through_extension_state() {
    let mut runtime = timer_runtime();
    runtime.flush();

    let result = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&result);
    let callback_id = runtime
        .state_mut()
        .extension_mut::<TimerState>()
        .unwrap()
        .queries
        .register(move |elapsed| *sink.lock().unwrap() = Some(elapsed));

    runtime
        .bridge_mut()
        .append_command(
            Opcode::new(TIMER_CLASS, -2),
            &[callback_id.get().into()],
        )
        .unwrap();
    assert_eq!(runtime.flush(), "160fffe,1");

    runtime.tick(&format!("352,0,{},1500", callback_id.get()));
    assert_eq!(*result.lock().unwrap(), Some(1500));

    // the reply was consumed; a repeat is dropped
    let report = runtime.process_frame(&format!("352,0,{},1500", callback_id.get()));
    assert_eq!(report.dropped, 1);
}

#[test]
fn test_local_listener_sees_pushed_updates() {
    let mut runtime = timer_runtime();
    let seen: Arc<Mutex<Vec<Diagnostics>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    runtime
        .with_emitter("render", |record, bridge| {
            record.add_listener(bridge, move |diags| sink.lock().unwrap().push(diags.clone()))?;
            let update = match json!({ "fps": 60 }) {
                serde_json::Value::Object(map) => map,
                _ => Diagnostics::new(),
            };
            record.push_update(bridge, update)
        })
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["fps"], 60);

    assert!(runtime.remove_emitter("render"));
    assert!(!runtime.remove_emitter("render"));
}

// ----------------------------------------------------------------------------
// Transport Loop
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_run_loop_over_channel_transport() {
    let mut runtime = timer_runtime();
    let (mut transport, mut native) = ChannelTransport::pair(8);

    let handle = tokio::spawn(async move {
        runtime.run(&mut transport).await?;
        Ok::<_, HostlinkError>(runtime.stats())
    });

    native.send_frame("").await.unwrap();
    let first = native.recv_frame().await.unwrap();
    assert_eq!(first, "150ffff,1,hostlink.protocol,1");

    // one native listener on the protocol emitter triggers a first collection
    native.send_frame("336,1,1,1").await.unwrap();
    let second = native.recv_frame().await.unwrap();
    assert!(second.starts_with("1500002,1,"), "unexpected frame {second}");
    assert!(second.contains("frames_in"));

    // the counters moved since the last poll, so the tick emits again
    native.send_frame("336,2,1").await.unwrap();
    let third = native.recv_frame().await.unwrap();
    assert!(third.starts_with("1500002,1,"));

    native.finish();
    let stats = timeout(Duration::from_secs(5), handle)
        .await
        .expect("runtime loop should finish")
        .expect("runtime task should not panic")
        .expect("runtime loop should succeed");
    assert_eq!(stats.frames_in, 3);
    assert_eq!(stats.frames_out, 3);
    assert_eq!(stats.commands_handled, 2);
}

#[tokio::test]
async fn test_run_loop_stops_when_native_goes_away() {
    let mut runtime = timer_runtime();
    let (mut transport, native) = ChannelTransport::pair(1);
    drop(native);

    let result = timeout(Duration::from_secs(5), runtime.run(&mut transport))
        .await
        .expect("runtime loop should finish");
    assert!(result.is_ok());
    assert_eq!(runtime.stats().frames_in, 0);
}
