//! Per-phase timing for a model run, plus process CPU and resident memory
//! when built with the `cli` feature.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// What the monitor saw when one pipeline phase finished.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSample {
    pub phase: String,
    /// Time since the previous phase finished (or since the monitor started).
    pub phase_time: Duration,
    pub cpu_percent: f32,
    pub resident_mb: u64,
}

pub struct SystemMonitor {
    enabled: bool,
    started: Instant,
    last_mark: Mutex<Instant>,
    samples: Mutex<Vec<PhaseSample>>,
    #[cfg(feature = "cli")]
    sampler: Option<process::ProcessSampler>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            last_mark: Mutex::new(now),
            samples: Mutex::new(Vec::new()),
            #[cfg(feature = "cli")]
            sampler: if enabled {
                process::ProcessSampler::current()
            } else {
                None
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Close the current phase: record its duration and resource usage and log them.
    pub fn finish_phase(&self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let phase_time = match self.last_mark.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => return,
        };
        let (cpu_percent, resident_mb) = self.usage();

        tracing::info!(
            phase,
            cpu_percent,
            resident_mb,
            "Phase finished in {:?}",
            phase_time
        );

        if let Ok(mut samples) = self.samples.lock() {
            samples.push(PhaseSample {
                phase: phase.to_string(),
                phase_time,
                cpu_percent,
                resident_mb,
            });
        }
    }

    pub fn samples(&self) -> Vec<PhaseSample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Log total run time, the slowest phase and peak resident memory.
    pub fn log_summary(&self) {
        if !self.enabled {
            return;
        }

        let samples = self.samples();
        let peak_mb = samples.iter().map(|s| s.resident_mb).max().unwrap_or(0);
        match samples.iter().max_by_key(|s| s.phase_time) {
            Some(slowest) => tracing::info!(
                peak_mb,
                "Run took {:?}; slowest phase was {} ({:?})",
                self.started.elapsed(),
                slowest.phase,
                slowest.phase_time
            ),
            None => tracing::info!("Run took {:?}", self.started.elapsed()),
        }
    }

    #[cfg(feature = "cli")]
    fn usage(&self) -> (f32, u64) {
        self.sampler
            .as_ref()
            .and_then(process::ProcessSampler::sample)
            .unwrap_or((0.0, 0))
    }

    #[cfg(not(feature = "cli"))]
    fn usage(&self) -> (f32, u64) {
        (0.0, 0)
    }
}

#[cfg(feature = "cli")]
mod process {
    use std::sync::Mutex;
    use sysinfo::{Pid, ProcessesToUpdate, System};

    pub(super) struct ProcessSampler {
        system: Mutex<System>,
        pid: Pid,
    }

    impl ProcessSampler {
        pub(super) fn current() -> Option<Self> {
            match sysinfo::get_current_pid() {
                Ok(pid) => Some(Self {
                    system: Mutex::new(System::new()),
                    pid,
                }),
                Err(e) => {
                    tracing::warn!("Process sampling unavailable: {}", e);
                    None
                }
            }
        }

        /// CPU percent and resident memory in MB for this process.
        pub(super) fn sample(&self) -> Option<(f32, u64)> {
            let mut system = self.system.lock().ok()?;
            system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
            let process = system.process(self.pid)?;
            Some((process.cpu_usage(), process.memory() / 1024 / 1024))
        }
    }
}
