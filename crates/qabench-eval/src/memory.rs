use sysinfo::{Pid, ProcessesToUpdate, System};

/// Source of the process resident-memory snapshots taken after each query.
pub trait MemoryProbe: Send {
    fn resident_mb(&mut self) -> f64;
}

/// Resident set size of the current process, read through `sysinfo`.
///
/// The value is process-wide and cumulative; it is not scoped to the call
/// that was just measured.
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self { system: System::new(), pid: Pid::from_u32(std::process::id()) }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn resident_mb(&mut self) -> f64 {
        self.system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        match self.system.process(self.pid) {
            Some(process) => process.memory() as f64 / (1024.0 * 1024.0),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_positive_rss() {
        let mut probe = ProcessMemory::new();
        assert!(probe.resident_mb() > 0.0);
    }
}
