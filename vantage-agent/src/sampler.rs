use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vantage_metrics::MetricStore;

/// Periodic collection loop writing host and process statistics into a
/// [`MetricStore`].
///
/// Every cycle overwrites one gauge per statistic and increments the
/// `sampler.samples` counter by one. A statistic that cannot be read is
/// skipped for that cycle only.
pub struct Sampler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sampler {
    /// Starts the sampling loop with the given interval.
    pub fn start(store: Arc<MetricStore>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let worker = Worker {
            store,
            // sysinfo recommends one `System` instance per program; the
            // sampler owns this one for its whole lifetime.
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            seq: 0,
        };

        let handle = tokio::spawn(worker.run(interval, token.clone()));
        Self { token, handle }
    }

    /// Signals the loop to exit before its next tick.
    ///
    /// Safe to call more than once; repeated calls are no-ops.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

struct Worker {
    store: Arc<MetricStore>,
    system: System,
    pid: Option<Pid>,
    seq: u64,
}

impl Worker {
    async fn run(mut self, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.sample(),
            }
        }

        vantage_log::debug!("sampler stopped after {} cycles", self.seq);
    }

    fn sample(&mut self) {
        self.seq += 1;

        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let store = &self.store;
        store.set_gauge("host.mem.total", self.system.total_memory() as f64);
        store.set_gauge("host.mem.used", self.system.used_memory() as f64);
        store.set_gauge("host.mem.available", self.system.available_memory() as f64);
        store.set_gauge("host.cpu.usage", f64::from(self.system.global_cpu_usage()));

        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            match self.system.process(pid) {
                Some(process) => {
                    store.set_gauge("proc.mem.resident", process.memory() as f64);
                    store.set_gauge("proc.mem.virtual", process.virtual_memory() as f64);
                    store.set_gauge("proc.cpu.usage", f64::from(process.cpu_usage()));
                }
                None => vantage_log::debug!("process statistics unavailable this cycle"),
            }
        }

        store.set_gauge("sampler.seq", self.seq as f64);
        store.set_gauge("sampler.random", rand::random::<f64>());
        store.add_counter("sampler.samples", 1);
    }
}
