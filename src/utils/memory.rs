//! Resident memory of this process, for the before/after delta in the report.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Samples this process's resident set size. Observational only; `None` when the platform
/// does not expose it.
pub struct MemoryProbe {
    sys: System,
    pid: Option<Pid>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Current resident set size in bytes.
    pub fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.sys.process(pid).map(|p| p.memory())
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed difference `end - start` in KiB. Zero when either sample is missing.
pub fn memory_delta_kb(start: Option<u64>, end: Option<u64>) -> i64 {
    match (start, end) {
        (Some(s), Some(e)) => (e as i64 - s as i64) / 1024,
        _ => 0,
    }
}
