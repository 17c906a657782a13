//! Process memory and concurrency sampler.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use super::Sampler;
use crate::observability::attributes;
use crate::observability::error::SamplerError;
use crate::observability::instruments::ProcessInstruments;

const PROC_SELF_STATUS: &str = "/proc/self/status";

/// One reading of process statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    /// Resident set size in bytes
    pub resident_bytes: u64,
    /// Data segment (heap) size in bytes
    pub heap_bytes: u64,
    /// OS threads
    pub threads: u64,
    /// Live Tokio tasks
    pub tasks: u64,
}

/// Reads process statistics.
pub trait ProcessProbe: Send + Sync {
    /// Takes one reading.
    fn read(&self) -> Result<ProcessStats, SamplerError>;
}

/// Linux probe over `/proc/self/status` and the current Tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcFsProbe {
    status_path: PathBuf,
}

impl ProcFsProbe {
    /// Probe reading the calling process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status_path: PathBuf::from(PROC_SELF_STATUS),
        }
    }

    /// Probe reading an arbitrary status file.
    #[must_use]
    pub fn with_status_path(path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: path.into(),
        }
    }
}

impl Default for ProcFsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for ProcFsProbe {
    fn read(&self) -> Result<ProcessStats, SamplerError> {
        let status = std::fs::read_to_string(&self.status_path).map_err(|e| {
            SamplerError::Process(format!("{}: {e}", self.status_path.display()))
        })?;
        let mut stats = parse_proc_status(&status)?;
        stats.tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks() as u64)
            .unwrap_or(0);
        Ok(stats)
    }
}

/// Parses `VmRSS`, `VmData` and `Threads` out of a `/proc/<pid>/status` body.
pub fn parse_proc_status(status: &str) -> Result<ProcessStats, SamplerError> {
    let mut resident = None;
    let mut heap = None;
    let mut threads = None;

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "VmRSS" => resident = Some(parse_kib(key, value)?),
            "VmData" => heap = Some(parse_kib(key, value)?),
            "Threads" => threads = Some(parse_count(key, value)?),
            _ => {}
        }
    }

    match (resident, heap, threads) {
        (Some(resident_bytes), Some(heap_bytes), Some(threads)) => Ok(ProcessStats {
            resident_bytes,
            heap_bytes,
            threads,
            tasks: 0,
        }),
        _ => Err(SamplerError::Process(
            "status is missing VmRSS, VmData or Threads".to_string(),
        )),
    }
}

fn parse_kib(key: &str, value: &str) -> Result<u64, SamplerError> {
    let number = value.trim().trim_end_matches("kB").trim();
    number
        .parse::<u64>()
        .map(|kib| kib.saturating_mul(1024))
        .map_err(|e| SamplerError::Process(format!("{key}: {e}")))
}

fn parse_count(key: &str, value: &str) -> Result<u64, SamplerError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| SamplerError::Process(format!("{key}: {e}")))
}

/// Publishes `memory_usage_bytes` and `goroutine_count`.
pub struct ProcessSampler {
    probe: Box<dyn ProcessProbe>,
    instruments: ProcessInstruments,
}

impl ProcessSampler {
    /// Creates a sampler over `probe`.
    pub fn new(probe: impl ProcessProbe + 'static, instruments: ProcessInstruments) -> Self {
        Self {
            probe: Box::new(probe),
            instruments,
        }
    }
}

#[async_trait]
impl Sampler for ProcessSampler {
    fn name(&self) -> &'static str {
        "process_sampler"
    }

    async fn sample(&self) -> Result<(), SamplerError> {
        let stats = self.probe.read()?;

        let memory = &self.instruments.memory;
        memory.record(stats.resident_bytes, &attributes::kind("resident"));
        memory.record(stats.heap_bytes, &attributes::kind("heap"));

        let goroutines = &self.instruments.goroutines;
        goroutines.record(stats.threads, &attributes::kind("thread"));
        goroutines.record(stats.tasks, &attributes::kind("task"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\ttaskboard-backend\n\
                          VmPeak:\t  120000 kB\n\
                          VmData:\t   40960 kB\n\
                          VmRSS:\t   20480 kB\n\
                          Threads:\t9\n";

    #[test]
    fn test_parse_status() {
        let stats = parse_proc_status(STATUS).unwrap();
        assert_eq!(stats.resident_bytes, 20480 * 1024);
        assert_eq!(stats.heap_bytes, 40960 * 1024);
        assert_eq!(stats.threads, 9);
    }

    #[test]
    fn test_missing_field_is_error() {
        let err = parse_proc_status("VmRSS:\t 1 kB\nThreads:\t1\n").unwrap_err();
        assert!(matches!(err, SamplerError::Process(_)));
    }

    #[test]
    fn test_garbage_value_is_error() {
        assert!(parse_proc_status("VmRSS:\tlots kB\nVmData:\t1 kB\nThreads:\t1\n").is_err());
    }

    #[test]
    fn test_unreadable_status_file() {
        let probe = ProcFsProbe::with_status_path("/nonexistent/status");
        assert!(matches!(probe.read(), Err(SamplerError::Process(_))));
    }
}
