//! The load configuration record consumed by the load generator workload.
//!
//! The record is persisted as flat string data in a ConfigMap. Every key is optional; the
//! workload applies its own defaults for absent keys.
use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Default number of CPU worker threads.
pub const DEFAULT_CPU_THREADS: u32 = 4;
/// Default size of each allocated memory chunk in MB.
pub const DEFAULT_MEMORY_CHUNK_SIZE_MB: u32 = 250;
/// Default number of concurrent network requests.
pub const DEFAULT_NETWORK_CONCURRENT_REQUESTS: u32 = 3;
/// Default size of each written storage file in MB.
pub const DEFAULT_STORAGE_FILE_SIZE_MB: u32 = 1;
/// Default run duration in seconds.
pub const DEFAULT_DURATION_SECS: u64 = 300;

/// Kind of load produced by the workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkloadType {
    /// Busy loops on every worker thread.
    Cpu,
    /// Repeated allocation of memory chunks.
    Memory,
    /// Concurrent outbound HTTP requests.
    Network,
    /// File writes and reads on local storage.
    Storage,
    /// All of the above at once.
    #[default]
    Mixed,
}

impl WorkloadType {
    /// All workload types in menu order.
    pub const ALL: [WorkloadType; 5] = [
        WorkloadType::Cpu,
        WorkloadType::Memory,
        WorkloadType::Network,
        WorkloadType::Storage,
        WorkloadType::Mixed,
    ];

    /// Value stored in the configuration record.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::Cpu => "cpu",
            WorkloadType::Memory => "memory",
            WorkloadType::Network => "network",
            WorkloadType::Storage => "storage",
            WorkloadType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        WorkloadType::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown workload type: {s}"))
    }
}

/// How hard the workload pushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Intensity {
    /// Light load.
    Low,
    /// Moderate load.
    #[default]
    Medium,
    /// Heavy load.
    High,
    /// Load shaped by the custom numeric parameters.
    Custom,
}

impl Intensity {
    /// All intensities in menu order.
    pub const ALL: [Intensity; 4] = [
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
        Intensity::Custom,
    ];

    /// Value stored in the configuration record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
            Intensity::Custom => "custom",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intensity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Intensity::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown intensity: {s}"))
    }
}

/// Numeric parameters used when the intensity is custom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomParams {
    /// Number of CPU worker threads.
    pub cpu_threads: u32,
    /// Size of each memory chunk in MB.
    pub memory_chunk_size_mb: u32,
    /// Number of concurrent network requests.
    pub network_concurrent_requests: u32,
    /// Size of each storage file in MB.
    pub storage_file_size_mb: u32,
}

impl Default for CustomParams {
    fn default() -> Self {
        Self {
            cpu_threads: DEFAULT_CPU_THREADS,
            memory_chunk_size_mb: DEFAULT_MEMORY_CHUNK_SIZE_MB,
            network_concurrent_requests: DEFAULT_NETWORK_CONCURRENT_REQUESTS,
            storage_file_size_mb: DEFAULT_STORAGE_FILE_SIZE_MB,
        }
    }
}

/// The load configuration record.
///
/// Serializes to the flat kebab-case keys of the ConfigMap data. Absent fields are skipped so
/// a partially filled record doubles as a merge patch touching only its own keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadConfig {
    /// Kind of load, one of the [`WorkloadType`] values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_type: Option<String>,
    /// Intensity, one of the [`Intensity`] values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_intensity: Option<String>,
    /// Custom CPU worker thread count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_threads: Option<String>,
    /// Custom memory chunk size in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_chunk_size_mb: Option<String>,
    /// Custom concurrent network requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_concurrent_requests: Option<String>,
    /// Custom storage file size in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_file_size_mb: Option<String>,
    /// Run duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Whether load is applied in bursts, `true` or `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_pattern: Option<String>,
}

impl LoadConfig {
    /// A record with every key set to its default value.
    pub fn defaults() -> Self {
        Self::default()
            .with_workload_type(WorkloadType::default())
            .with_intensity(Intensity::default())
            .with_custom_params(CustomParams::default())
            .with_duration(DEFAULT_DURATION_SECS)
            .with_burst_pattern(false)
    }

    /// Set the workload type.
    pub fn with_workload_type(mut self, workload_type: WorkloadType) -> Self {
        self.workload_type = Some(workload_type.to_string());
        self
    }

    /// Set the intensity.
    pub fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.load_intensity = Some(intensity.to_string());
        self
    }

    /// Set all four custom numeric parameters.
    pub fn with_custom_params(mut self, params: CustomParams) -> Self {
        self.cpu_threads = Some(params.cpu_threads.to_string());
        self.memory_chunk_size_mb = Some(params.memory_chunk_size_mb.to_string());
        self.network_concurrent_requests = Some(params.network_concurrent_requests.to_string());
        self.storage_file_size_mb = Some(params.storage_file_size_mb.to_string());
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration = Some(secs.to_string());
        self
    }

    /// Set the burst pattern flag.
    pub fn with_burst_pattern(mut self, burst: bool) -> Self {
        self.burst_pattern = Some(burst.to_string());
        self
    }

    /// Key and value pairs in a fixed order, `None` for keys that are not set.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("workload-type", self.workload_type.as_deref()),
            ("load-intensity", self.load_intensity.as_deref()),
            ("cpu-threads", self.cpu_threads.as_deref()),
            ("memory-chunk-size-mb", self.memory_chunk_size_mb.as_deref()),
            (
                "network-concurrent-requests",
                self.network_concurrent_requests.as_deref(),
            ),
            ("storage-file-size-mb", self.storage_file_size_mb.as_deref()),
            ("duration", self.duration.as_deref()),
            ("burst-pattern", self.burst_pattern.as_deref()),
        ]
    }

    /// Flat ConfigMap data holding only the keys that are set.
    pub fn to_data(&self) -> BTreeMap<String, String> {
        self.entries()
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_owned(), v.to_owned())))
            .collect()
    }

    /// Build a record from ConfigMap data, ignoring keys outside the record.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::to_value(data)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_key() {
        let data = LoadConfig::defaults().to_data();
        assert_eq!(
            data,
            BTreeMap::from_iter(
                [
                    ("burst-pattern", "false"),
                    ("cpu-threads", "4"),
                    ("duration", "300"),
                    ("load-intensity", "medium"),
                    ("memory-chunk-size-mb", "250"),
                    ("network-concurrent-requests", "3"),
                    ("storage-file-size-mb", "1"),
                    ("workload-type", "mixed"),
                ]
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
            )
        );
    }

    #[test]
    fn partial_record_serializes_only_its_keys() {
        let patch = LoadConfig::default().with_workload_type(WorkloadType::Cpu);
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"workload-type":"cpu"}"#
        );
    }

    #[test]
    fn from_data_ignores_foreign_keys() {
        let data = BTreeMap::from_iter([
            ("duration".to_owned(), "60".to_owned()),
            ("metrics-port".to_owned(), "8000".to_owned()),
        ]);
        let config = LoadConfig::from_data(&data).unwrap();
        assert_eq!(config.duration.as_deref(), Some("60"));
        assert_eq!(config.workload_type, None);
    }

    #[test]
    fn parse_enums_case_insensitively() {
        assert_eq!("CPU".parse::<WorkloadType>().unwrap(), WorkloadType::Cpu);
        assert_eq!(" high ".parse::<Intensity>().unwrap(), Intensity::High);
        assert!("turbo".parse::<Intensity>().is_err());
    }
}
