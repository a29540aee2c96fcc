//! Process resource sampling.

use anyhow::Result;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessExt, System, SystemExt};

use crate::error::HarnessError;

/// Source of memory and CPU readings for the metrics collector.
pub trait ResourceProbe {
    /// Current memory footprint of the process, in bytes.
    fn sample_memory(&mut self) -> Result<u64>;

    /// Starts the interval the next `sample_cpu` reports on.
    fn start_cpu_window(&mut self) -> Result<()>;

    /// CPU utilization since `start_cpu_window`, in percent of the whole machine.
    fn sample_cpu(&mut self) -> Result<f64>;
}

/// Probe backed by `sysinfo`, reading the current process.
///
/// Memory is the resident set size. CPU is the process usage accumulated
/// between the two refreshes, divided by the number of logical CPUs so that
/// a fully busy machine reads 100%. Runs shorter than `MIN_CPU_WINDOW` are
/// padded with an idle sleep, and the reading is rescaled to the run itself.
pub struct SystemProbe {
    system: System,
    pid: Pid,
    num_cpus: usize,
    window_start: Option<Instant>,
}

impl SystemProbe {
    /// Below this sysinfo cannot resolve a CPU delta; shorter windows are padded.
    pub const MIN_CPU_WINDOW: Duration = Duration::from_millis(200);

    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| HarnessError::Probe(format!("cannot resolve current PID: {}", e)))?;

        let mut system = System::new();
        system.refresh_cpu();
        if !system.refresh_process(pid) {
            return Err(HarnessError::Probe(format!("process {} is not visible", pid)).into());
        }
        let num_cpus = system.cpus().len().max(1);

        Ok(Self {
            system,
            pid,
            num_cpus,
            window_start: None,
        })
    }

    fn refresh(&mut self) -> Result<&sysinfo::Process> {
        self.system.refresh_cpu();
        if !self.system.refresh_process(self.pid) {
            return Err(HarnessError::Probe(format!("failed to refresh process {}", self.pid)).into());
        }
        self.system
            .process(self.pid)
            .ok_or_else(|| HarnessError::Probe(format!("process {} disappeared", self.pid)).into())
    }
}

impl ResourceProbe for SystemProbe {
    fn sample_memory(&mut self) -> Result<u64> {
        Ok(self.refresh()?.memory())
    }

    fn start_cpu_window(&mut self) -> Result<()> {
        self.refresh()?;
        self.window_start = Some(Instant::now());
        Ok(())
    }

    fn sample_cpu(&mut self) -> Result<f64> {
        let start = self.window_start.take();
        let active = start.map_or(Duration::ZERO, |s| s.elapsed());
        // sysinfo reports 0 for windows shorter than its update interval.
        if active < Self::MIN_CPU_WINDOW {
            std::thread::sleep(Self::MIN_CPU_WINDOW - active);
        }
        let window = start.map_or(active, |s| s.elapsed());
        let usage = self.refresh()?.cpu_usage() as f64;
        Ok(machine_cpu_percent(usage, self.num_cpus, active, window))
    }
}

/// Converts sysinfo's per-core process usage over `window` into a share of the
/// whole machine during `active`.
///
/// The process sleeps for `window - active`, so all of the measured usage
/// belongs to the active part.
fn machine_cpu_percent(usage: f64, num_cpus: usize, active: Duration, window: Duration) -> f64 {
    let per_machine = usage / num_cpus.max(1) as f64;
    let scale = if active.is_zero() || window <= active {
        1.0
    } else {
        window.as_secs_f64() / active.as_secs_f64()
    };
    (per_machine * scale).clamp(0.0, 100.0)
}
