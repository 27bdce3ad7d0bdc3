//! ## dvrsim-simulator::hdd
//! **Storage device: cache, disk and flush**
//!
//! Three cooperating processes share one [`Cache`]:
//! - cache fill pulls dispatched requests from the scheduler and reserves space
//! - the disk services open requests in admission order
//! - flush hands closed requests back over the RAM bus
//!
//! ### Key Submodules:
//! - `cache`: stage queues, admission and flushing
//! - `disk`: seek/rotation/transfer timing and the service loop
//! - `maintenance`: ATR stall model

pub mod cache;
pub mod disk;
pub mod maintenance;

use std::cell::RefCell;
use std::rc::Rc;

use dvrsim_core::Sim;

use crate::scheduler::Scheduler;
use crate::system::Platform;

pub use cache::Cache;
pub use disk::DiskModel;
pub use maintenance::MaintenanceModel;

use cache::{CacheFill, CacheFlush};
use disk::DiskProcess;

pub struct Hdd {
    platform: Platform,
    scheduler: Scheduler,
    cache: Cache,
    model: Rc<RefCell<DiskModel>>,
    maintenance: Rc<RefCell<MaintenanceModel>>,
}

impl Hdd {
    pub fn new(platform: &Platform, scheduler: &Scheduler) -> Self {
        let config = &platform.config;
        Self {
            cache: Cache::new(&platform.sim, config.cache.capacity_kb),
            model: Rc::new(RefCell::new(DiskModel::new(config.disk.clone()))),
            maintenance: Rc::new(RefCell::new(MaintenanceModel::new(
                config.maintenance.base_chance,
            ))),
            platform: platform.clone(),
            scheduler: scheduler.clone(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn head(&self) -> u64 {
        self.model.borrow().head()
    }

    pub fn atr_threshold(&self) -> u32 {
        self.maintenance.borrow().threshold()
    }

    /// Spawns the disk, cache-fill and flush processes.
    pub fn activate(&self) {
        let sim: &Sim = &self.platform.sim;
        let poll_interval = self.platform.config.scheduler.poll_interval_ms;

        let disk = DiskProcess {
            sim: sim.clone(),
            cache: self.cache.clone(),
            model: self.model.clone(),
            maintenance: self.maintenance.clone(),
            poll_interval,
            metrics: self.platform.metrics.clone(),
        };
        sim.spawn("HDD", disk.run());

        let fill = CacheFill {
            sim: sim.clone(),
            cache: self.cache.clone(),
            scheduler: self.scheduler.clone(),
            poll_interval,
            flush_when_idle: self.platform.config.cache.flush_when_idle,
        };
        sim.spawn("HDD cache", fill.run());

        let flush = CacheFlush {
            cache: self.cache.clone(),
            ram_bus: self.platform.ram_bus.clone(),
            metrics: self.platform.metrics.clone(),
        };
        sim.spawn("HDD flush", flush.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IoRequest;
    use dvrsim_config::{SchedulingPolicy, SimulationConfig};
    use dvrsim_core::Signal;
    use dvrsim_telemetry::MetricsRecorder;
    use std::cell::Cell;

    struct Rig {
        platform: Platform,
        scheduler: Scheduler,
        hdd: Hdd,
    }

    fn rig(configure: impl FnOnce(&mut SimulationConfig)) -> Rig {
        let mut config = SimulationConfig::default();
        config.run.policy = SchedulingPolicy::Deadline;
        configure(&mut config);
        let platform = Platform::new(config, MetricsRecorder::new().unwrap());
        let scheduler = Scheduler::new(&platform);
        let hdd = Hdd::new(&platform, &scheduler);
        scheduler.activate();
        hdd.activate();
        Rig {
            platform,
            scheduler,
            hdd,
        }
    }

    fn submit(rig: &Rig, size_kb: f64, write: bool, done: &Signal) {
        let sim = &rig.platform.sim;
        rig.scheduler.add(IoRequest::new(
            rig.platform.request_ids.next_id(),
            size_kb,
            0,
            write,
            sim.now() + 1_000.0,
            sim.now(),
            Rc::from("test"),
            done.clone(),
        ));
    }

    /// Records the cache occupancy whenever `done` fires.
    fn watch_completion(rig: &Rig, done: &Signal) -> Rc<Cell<Option<(f64, f64)>>> {
        let seen = Rc::new(Cell::new(None));
        let (sim, done, level, out) = (
            rig.platform.sim.clone(),
            done.clone(),
            rig.hdd.cache().level().clone(),
            seen.clone(),
        );
        rig.platform.sim.spawn("observer", async move {
            done.wait().await;
            out.set(Some((sim.now(), level.amount())));
        });
        seen
    }

    #[test]
    fn write_space_is_released_at_disk_completion() {
        let rig = rig(|c| c.cache.flush_when_idle = true);
        let done = Signal::new(&rig.platform.sim, "done");
        let seen = watch_completion(&rig, &done);
        submit(&rig, 1_100.0, true, &done);

        // Admitted and flushed at 100 ms, before the disk polls again at 200 ms.
        rig.platform.sim.run_until(150.0);
        let (completed_at, at_completion) = seen.get().expect("write completed");
        assert!(completed_at > 100.0 && completed_at < 101.0);
        assert_eq!(at_completion, 1_100.0);
        assert_eq!(rig.hdd.cache().level().amount(), 1_100.0);
        assert_eq!(rig.platform.metrics.requests_completed.get(), 1);
        assert_eq!(rig.platform.metrics.requests_serviced.get(), 0);

        // The disk gives the space back once it has written the data.
        rig.platform.sim.run_until(1_000.0);
        assert_eq!(rig.hdd.cache().level().amount(), 0.0);
        assert_eq!(rig.platform.metrics.requests_serviced.get(), 1);
        assert_eq!(rig.platform.metrics.requests_completed.get(), 1);
    }

    #[test]
    fn read_space_is_released_at_flush() {
        let rig = rig(|c| c.cache.flush_when_idle = false);
        let done = Signal::new(&rig.platform.sim, "done");
        let seen = watch_completion(&rig, &done);
        submit(&rig, 512.0, false, &done);

        rig.platform.sim.run_until(2_000.0);
        // Serviced but never flushed: the read still holds its space.
        assert_eq!(rig.platform.metrics.requests_serviced.get(), 1);
        assert_eq!(rig.hdd.cache().closed_len(), 1);
        assert_eq!(rig.hdd.cache().level().amount(), 512.0);
        assert!(seen.get().is_none());
    }

    #[test]
    fn idle_flush_completes_reads_and_frees_their_space() {
        let rig = rig(|c| c.cache.flush_when_idle = true);
        let done = Signal::new(&rig.platform.sim, "done");
        let seen = watch_completion(&rig, &done);
        submit(&rig, 512.0, false, &done);

        rig.platform.sim.run_until(2_000.0);
        let (_, at_completion) = seen.get().expect("read completed");
        assert_eq!(at_completion, 0.0);
        assert_eq!(rig.hdd.cache().closed_len(), 0);
        assert_eq!(rig.hdd.cache().level().amount(), 0.0);
        assert!(rig.platform.metrics.flushes.get() >= 1);
    }

    #[test]
    fn full_cache_forces_a_flush() {
        let rig = rig(|c| {
            c.cache.capacity_kb = 6_144.0;
            c.cache.flush_when_idle = false;
        });
        let done = Signal::new(&rig.platform.sim, "done");
        for _ in 0..4 {
            submit(&rig, 2_048.0, false, &done);
        }
        rig.platform.sim.run_until(5_000.0);

        // Three reads fill the cache; the fourth waits until they are flushed.
        assert!(rig.platform.metrics.flushes.get() >= 1);
        assert_eq!(rig.platform.metrics.requests_completed.get(), 3);
        assert_eq!(rig.platform.metrics.requests_serviced.get(), 4);
        assert_eq!(rig.hdd.cache().level().amount(), 2_048.0);
    }

    #[test]
    fn pinned_space_is_flushed_once_the_disk_runs_dry() {
        let rig = rig(|c| {
            c.cache.capacity_kb = 6_144.0;
            c.cache.flush_when_idle = false;
        });
        let done = Signal::new(&rig.platform.sim, "done");
        for _ in 0..3 {
            submit(&rig, 3_000.0, false, &done);
        }
        rig.platform.sim.run_until(5_000.0);

        // Two reads fill the cache and close after service. The backlog never
        // reaches three, but nothing else can free space, so they are flushed.
        assert_eq!(rig.platform.metrics.requests_serviced.get(), 3);
        assert_eq!(rig.platform.metrics.requests_completed.get(), 2);
        assert!(rig.platform.metrics.flushes.get() >= 1);
        assert_eq!(rig.hdd.cache().closed_len(), 1);
        assert_eq!(rig.hdd.cache().level().amount(), 3_000.0);
    }
}
