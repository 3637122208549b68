// src/ingest/memory.rs

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Reads this process' resident memory so batch boundaries can be logged with it.
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

    pub fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.sys.process(pid).map(|p| p.memory())
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}
