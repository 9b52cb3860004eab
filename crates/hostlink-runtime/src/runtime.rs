//! Hostlink Runtime
//!
//! A [`HostRuntime`] is the explicitly constructed context every feature class
//! works through: the bridge (registry and outbox), the frozen router, the
//! handler state and the protocol counters. There is no global instance.
//!
//! Each tick processes one inbound frame to completion and then flushes the
//! outgoing records as one frame. Nothing inside a tick runs concurrently.

use hostlink_core::{
    Bridge, DiagnosticsHost, DiagnosticsRecord, DispatchTable, FrameReport, HostObject,
    HostlinkConfig, HostlinkResult, ObjectId, Router, ScriptValue,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::RuntimeState;
use crate::stats::{stats_collector, ProtocolStats, StatsSnapshot};
use crate::transport::Transport;

// ----------------------------------------------------------------------------
// Host Runtime
// ----------------------------------------------------------------------------

/// Runtime context of one scripting side
pub struct HostRuntime {
    config: HostlinkConfig,
    bridge: Bridge,
    router: Router<RuntimeState>,
    state: RuntimeState,
    stats: Arc<ProtocolStats>,
}

impl HostRuntime {
    /// Build a runtime around the given class tables
    ///
    /// The diagnostics table is always installed; the caller's tables must not
    /// reuse its class id.
    pub(crate) fn new(
        config: HostlinkConfig,
        tables: Vec<DispatchTable<RuntimeState>>,
        state: RuntimeState,
    ) -> HostlinkResult<Self> {
        let mut all_tables = Vec::with_capacity(tables.len() + 1);
        all_tables.push(state.diagnostics_ref().dispatch_table::<RuntimeState>());
        all_tables.extend(tables);
        let router = Router::new(all_tables)?;

        let mut runtime = Self {
            config,
            bridge: Bridge::new(),
            router,
            state,
            stats: Arc::new(ProtocolStats::new()),
        };

        if runtime.config.diagnostics.publish_protocol_stats {
            runtime.install_protocol_emitter()?;
        }
        debug!(classes = ?runtime.router.class_ids().collect::<Vec<_>>(), "runtime ready");
        Ok(runtime)
    }

    fn install_protocol_emitter(&mut self) -> HostlinkResult<()> {
        let name = self.config.diagnostics.protocol_emitter_name.clone();
        let collector = stats_collector(Arc::clone(&self.stats));
        self.state
            .diagnostics()
            .create_emitter(&mut self.bridge, &name)?
            .push_collector(&mut self.bridge, collector)
    }

    pub fn config(&self) -> &HostlinkConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    /// Bridge and state together, for code that needs both mutably
    pub fn parts_mut(&mut self) -> (&mut Bridge, &mut RuntimeState) {
        (&mut self.bridge, &mut self.state)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    pub fn create_instance(
        &mut self,
        obj: &Arc<dyn HostObject>,
        args: &[ScriptValue],
    ) -> HostlinkResult<ObjectId> {
        self.bridge.create_instance(obj, args)
    }

    pub fn destroy_instance(&mut self, obj: &Arc<dyn HostObject>) -> Option<ObjectId> {
        self.bridge.destroy_instance(obj)
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Run `f` against the named emitter, creating it if needed
    pub fn with_emitter<R, F>(&mut self, name: &str, f: F) -> HostlinkResult<R>
    where
        F: FnOnce(&mut DiagnosticsRecord, &mut Bridge) -> HostlinkResult<R>,
    {
        let record = self.state.diagnostics().create_emitter(&mut self.bridge, name)?;
        f(record, &mut self.bridge)
    }

    pub fn remove_emitter(&mut self, name: &str) -> bool {
        self.state.diagnostics().remove_emitter(&mut self.bridge, name)
    }

    // ------------------------------------------------------------------------
    // Frame Processing
    // ------------------------------------------------------------------------

    /// Route every record of an inbound frame
    pub fn process_frame(&mut self, frame: &str) -> FrameReport {
        let report = self
            .router
            .route_frame(&mut self.bridge, &mut self.state, frame);
        self.stats.record_inbound(frame.len(), &report);
        if report.dropped > 0 {
            debug!(
                handled = report.handled,
                dropped = report.dropped,
                dangling = report.dangling,
                "frame processed with drops"
            );
        }
        report
    }

    /// Encode and clear everything appended since the last flush
    pub fn flush(&mut self) -> String {
        let frame = self.bridge.flush_frame();
        self.stats.record_outbound(frame.len());
        frame
    }

    /// One tick: process the inbound frame, then return the outbound frame
    pub fn tick(&mut self, inbound: &str) -> String {
        self.process_frame(inbound);
        self.flush()
    }

    /// Drive ticks from a transport until the native side closes it
    ///
    /// Anything queued before the first inbound frame (object creation at
    /// startup, the protocol emitter) goes out with the first reply.
    pub async fn run<T: Transport>(&mut self, transport: &mut T) -> HostlinkResult<()> {
        info!("Hostlink runtime loop started");
        let mut ticks: u64 = 0;
        while let Some(frame) = transport.recv_frame().await? {
            let outbound = self.tick(&frame);
            transport.send_frame(outbound).await?;
            ticks += 1;
        }
        info!(ticks, "Hostlink runtime loop finished");
        Ok(())
    }
}
