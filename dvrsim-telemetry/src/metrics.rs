//! ## dvrsim-telemetry::metrics
//! **Prometheus counters for one simulation run**
//!
//! Each recorder owns its own registry, so parallel runs never share counts.

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub requests_submitted: IntCounter,
    pub requests_dispatched: IntCounter,
    pub requests_serviced: IntCounter,
    pub requests_completed: IntCounter,
    pub overflows: IntCounter,
    pub underflows: IntCounter,
    pub atr_stalls: IntCounter,
    pub flushes: IntCounter,
    pub batches_sorted: IntCounter,
    pub disk_service_ms: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let requests_submitted =
            counter("dvrsim_requests_submitted_total", "I/O requests handed to the scheduler")?;
        let requests_dispatched = counter(
            "dvrsim_requests_dispatched_total",
            "I/O requests moved to the dispatch queue",
        )?;
        let requests_serviced =
            counter("dvrsim_requests_serviced_total", "I/O requests serviced by the disk")?;
        let requests_completed =
            counter("dvrsim_requests_completed_total", "I/O requests completed")?;
        let overflows = counter("dvrsim_buffer_overflows_total", "Input buffer overflows")?;
        let underflows = counter("dvrsim_buffer_underflows_total", "Output buffer underflows")?;
        let atr_stalls = counter("dvrsim_atr_stalls_total", "Disk maintenance stalls")?;
        let flushes = counter("dvrsim_cache_flushes_total", "Cache flush passes")?;
        let batches_sorted = counter("dvrsim_batches_sorted_total", "Scheduler sort passes")?;

        let disk_service_ms = Histogram::with_opts(
            HistogramOpts::new("dvrsim_disk_service_ms", "Disk service time per request")
                .buckets(vec![5.0, 10.0, 20.0, 30.0, 40.0, 60.0, 100.0]),
        )?;
        registry.register(Box::new(disk_service_ms.clone()))?;

        Ok(Self {
            registry,
            requests_submitted,
            requests_dispatched,
            requests_serviced,
            requests_completed,
            overflows,
            underflows,
            atr_stalls,
            flushes,
            batches_sorted,
            disk_service_ms,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn observe_service_time(&self, ms: f64) {
        self.disk_service_ms.observe(ms);
    }
}
