//! Tuner input streams and playback output streams.
//!
//! Packets arrive (or are consumed) at exponentially distributed sizes, paced
//! so that the long-run rate matches the stream bit rate. A stream that finds
//! no room (input) or too little data (output) logs a buffer incident instead
//! of blocking.

use std::rc::Rc;

use dvrsim_config::StreamGroupConfig;
use dvrsim_core::SimTime;
use serde::Serialize;

use crate::controller::{BufferController, ReadPolicy, RequestLimits, WritePolicy};
use crate::diagnostics::IncidentKind;
use crate::scheduler::Scheduler;
use crate::system::Platform;

/// kB per megabit of stream data.
pub const KB_PER_MEGABIT: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Input,
    Output,
}

/// One packet: size in megabits and the time it takes at the stream rate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packet {
    size_kb: f64,
    interval_ms: SimTime,
}

/// A tuner or playback stream together with its buffer controller.
#[derive(Clone)]
pub struct Stream {
    name: Rc<str>,
    kind: StreamKind,
    platform: Platform,
    controller: BufferController,
    bitrate_mbps: f64,
    mean_packet_mb: f64,
    controller_delay: SimTime,
    max_underflow_retries: u32,
}

impl Stream {
    /// Tuner feeding `Write Requester of <name>`.
    pub fn input(
        name: impl Into<String>,
        platform: &Platform,
        scheduler: &Scheduler,
        group: &StreamGroupConfig,
    ) -> Self {
        let name: String = name.into();
        let policy = Rc::new(WritePolicy::new(RequestLimits::from(group)));
        let controller = BufferController::new(
            format!("Write Requester of {name}"),
            platform,
            scheduler,
            group,
            policy,
        );
        Self::with_controller(name, StreamKind::Input, platform, group, controller)
    }

    /// Playback drained by `Read Requester of <name>`.
    pub fn output(
        name: impl Into<String>,
        platform: &Platform,
        scheduler: &Scheduler,
        group: &StreamGroupConfig,
    ) -> Self {
        let name: String = name.into();
        let policy = Rc::new(ReadPolicy::new(RequestLimits::from(group)));
        let controller = BufferController::new(
            format!("Read Requester of {name}"),
            platform,
            scheduler,
            group,
            policy,
        );
        Self::with_controller(name, StreamKind::Output, platform, group, controller)
    }

    fn with_controller(
        name: String,
        kind: StreamKind,
        platform: &Platform,
        group: &StreamGroupConfig,
        controller: BufferController,
    ) -> Self {
        Self {
            name: Rc::from(name),
            kind,
            platform: platform.clone(),
            controller,
            bitrate_mbps: group.bitrate_mbps,
            mean_packet_mb: group.mean_packet_mb(),
            controller_delay: group.controller_start_delay_ms,
            max_underflow_retries: group.max_underflow_retries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn controller(&self) -> &BufferController {
        &self.controller
    }

    /// Spawns the stream now and its controller after the start-up delay.
    pub fn activate(&self) {
        let sim = &self.platform.sim;
        let stream = self.clone();
        match self.kind {
            StreamKind::Input => sim.spawn(self.name.to_string(), stream.fill_buffer()),
            StreamKind::Output => sim.spawn(self.name.to_string(), stream.drain_buffer()),
        };
        sim.spawn_at(
            self.controller.name().to_string(),
            self.controller.clone().run(),
            sim.now() + self.controller_delay,
        );
    }

    fn next_packet(&self) -> Packet {
        let size_mb = self.platform.sim.rng().exponential(self.mean_packet_mb);
        Packet {
            size_kb: KB_PER_MEGABIT * size_mb,
            interval_ms: 1_000.0 * size_mb / self.bitrate_mbps,
        }
    }

    async fn fill_buffer(self) {
        let Platform {
            sim,
            ram_bus,
            metrics,
            diagnostics,
            ..
        } = self.platform.clone();
        let buffer = self.controller.buffer().clone();
        loop {
            let packet = self.next_packet();
            if buffer.free_space() < packet.size_kb {
                diagnostics.record(&self.name, IncidentKind::Overflow, sim.now(), packet.size_kb);
                metrics.overflows.inc();
            } else {
                buffer.put(packet.size_kb).await;
                ram_bus.transfer(packet.size_kb).await;
            }
            sim.hold(packet.interval_ms).await;
        }
    }

    async fn drain_buffer(self) {
        let Platform {
            sim,
            ram_bus,
            metrics,
            diagnostics,
            ..
        } = self.platform.clone();
        let buffer = self.controller.buffer().clone();
        let mut retries = 0u32;
        loop {
            let packet = self.next_packet();
            if buffer.amount() < packet.size_kb {
                diagnostics.record(&self.name, IncidentKind::Underflow, sim.now(), packet.size_kb);
                metrics.underflows.inc();
                retries += 1;
                // Retry at once with a fresh draw, but let time move eventually.
                if retries >= self.max_underflow_retries {
                    retries = 0;
                    sim.hold(packet.interval_ms).await;
                }
                continue;
            }
            retries = 0;
            buffer.get(packet.size_kb).await;
            ram_bus.transfer(packet.size_kb).await;
            sim.hold(packet.interval_ms).await;
        }
    }
}
