//! Interactive editing of the load configuration record.
use std::time::Duration;

use clap::Args;
use loadgen_common::config::{
    CustomParams, Intensity, LoadConfig, WorkloadType, DEFAULT_CPU_THREADS,
    DEFAULT_DURATION_SECS, DEFAULT_MEMORY_CHUNK_SIZE_MB, DEFAULT_NETWORK_CONCURRENT_REQUESTS,
    DEFAULT_STORAGE_FILE_SIZE_MB,
};
use tracing::info;

use crate::{
    cluster::Cluster,
    error::{Error, Result},
    names::{CONFIG_MAP_NAME, LOADGEN_APP, LOADGEN_NAMESPACE},
    prompt::{is_yes, Prompt},
    readiness::{self, DEFAULT_TIMEOUT},
    store::ConfigStore,
};

/// Options for the configure command.
#[derive(Args, Clone, Debug)]
pub struct Opts {
    /// Seconds to wait for the workload rollout after a restart.
    #[arg(long, env = "LOADGEN_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

/// Text of the main menu.
pub const MENU: &str = "\
Load generator configuration
  1) Show current configuration
  2) Set workload type
  3) Set load intensity
  4) Set custom parameters
  5) Set duration
  6) Set burst pattern
  7) Restart load generator
  8) Exit";

/// A main menu selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    /// 1: print the record.
    ShowConfig,
    /// 2: pick the workload type.
    WorkloadType,
    /// 3: pick the load intensity.
    Intensity,
    /// 4: enter the four custom parameters.
    CustomParams,
    /// 5: enter the duration.
    Duration,
    /// 6: toggle bursts.
    BurstPattern,
    /// 7: restart the workload so it reads the record again.
    Restart,
    /// 8: leave.
    Exit,
}

impl MenuChoice {
    /// Parse a selection between 1 and 8.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::ShowConfig),
            "2" => Some(Self::WorkloadType),
            "3" => Some(Self::Intensity),
            "4" => Some(Self::CustomParams),
            "5" => Some(Self::Duration),
            "6" => Some(Self::BurstPattern),
            "7" => Some(Self::Restart),
            "8" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// What the loop does after a handler ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Show the message and display the menu again.
    Continue(String),
    /// Leave the loop.
    Exit,
}

/// Workload type for a sub-menu answer, `mixed` for anything but 1-5.
pub fn workload_for(answer: &str) -> WorkloadType {
    pick(&WorkloadType::ALL, answer)
}

/// Intensity for a sub-menu answer, `medium` for anything but 1-4.
pub fn intensity_for(answer: &str) -> Intensity {
    pick(&Intensity::ALL, answer)
}

/// The 1-based `answer` entry of `items`, the default item when out of range.
fn pick<T: Copy + Default>(items: &[T], answer: &str) -> T {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| items.get(i).copied())
        .unwrap_or_default()
}

/// A positive number, or `default` for blank and invalid answers.
pub fn number_or<T>(answer: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    answer
        .trim()
        .parse()
        .ok()
        .filter(|n| *n > T::default())
        .unwrap_or(default)
}

/// Menu dispatcher over the configuration store and the cluster.
pub struct Configurator<'a, S, C> {
    store: &'a S,
    cluster: &'a C,
    timeout: Duration,
}

impl<'a, S: ConfigStore, C: Cluster> Configurator<'a, S, C> {
    /// Dispatcher waiting at most `timeout` for restarts.
    pub fn new(store: &'a S, cluster: &'a C, timeout: Duration) -> Self {
        Self {
            store,
            cluster,
            timeout,
        }
    }

    /// Fail unless the namespace and the configuration object exist.
    pub async fn ensure_deployed(&self) -> Result<LoadConfig> {
        if !self.cluster.namespace_exists(LOADGEN_NAMESPACE).await? {
            return Err(Error::NotDeployed {
                what: format!("namespace {LOADGEN_NAMESPACE}"),
            });
        }
        self.current().await
    }

    /// Show the menu until the operator exits or input runs out.
    pub async fn run(&self, prompt: &mut impl Prompt) -> Result<()> {
        self.ensure_deployed().await?;
        loop {
            prompt.say(MENU)?;
            let Some(input) = prompt.ask("Select an option [1-8]: ")? else {
                return Ok(());
            };
            let Some(choice) = MenuChoice::parse(&input) else {
                prompt.say(&format!("Invalid option '{input}', choose 1-8."))?;
                continue;
            };
            match self.dispatch(choice, prompt).await? {
                Outcome::Continue(message) => prompt.say(&message)?,
                Outcome::Exit => return Ok(()),
            }
        }
    }

    /// Run the handler of one selection.
    #[tracing::instrument(skip(self, prompt))]
    pub async fn dispatch(&self, choice: MenuChoice, prompt: &mut impl Prompt) -> Result<Outcome> {
        match choice {
            MenuChoice::ShowConfig => Ok(Outcome::Continue(render(&self.current().await?))),
            MenuChoice::WorkloadType => {
                let Some(answer) = prompt.ask(
                    "Workload type: 1) cpu 2) memory 3) network 4) storage 5) mixed [5]: ",
                )?
                else {
                    return Ok(Outcome::Exit);
                };
                let workload = workload_for(&answer);
                self.save(LoadConfig::default().with_workload_type(workload))
                    .await?;
                Ok(Outcome::Continue(format!("Workload type set to {workload}")))
            }
            MenuChoice::Intensity => {
                let Some(answer) =
                    prompt.ask("Load intensity: 1) low 2) medium 3) high 4) custom [2]: ")?
                else {
                    return Ok(Outcome::Exit);
                };
                let intensity = intensity_for(&answer);
                self.save(LoadConfig::default().with_intensity(intensity))
                    .await?;
                let mut message = format!("Load intensity set to {intensity}");
                if intensity == Intensity::Custom {
                    message.push_str(", set the custom parameters with option 4");
                }
                Ok(Outcome::Continue(message))
            }
            MenuChoice::CustomParams => {
                let mut values = [0u32; 4];
                for (value, (label, default)) in values.iter_mut().zip([
                    ("CPU threads", DEFAULT_CPU_THREADS),
                    ("Memory chunk size (MB)", DEFAULT_MEMORY_CHUNK_SIZE_MB),
                    (
                        "Concurrent network requests",
                        DEFAULT_NETWORK_CONCURRENT_REQUESTS,
                    ),
                    ("Storage file size (MB)", DEFAULT_STORAGE_FILE_SIZE_MB),
                ]) {
                    let Some(answer) = prompt.ask(&format!("{label} [{default}]: "))? else {
                        return Ok(Outcome::Exit);
                    };
                    *value = number_or(&answer, default);
                }
                let [cpu_threads, memory_chunk_size_mb, network_concurrent_requests, storage_file_size_mb] =
                    values;
                let params = CustomParams {
                    cpu_threads,
                    memory_chunk_size_mb,
                    network_concurrent_requests,
                    storage_file_size_mb,
                };
                self.save(LoadConfig::default().with_custom_params(params))
                    .await?;
                Ok(Outcome::Continue("Custom parameters updated".to_owned()))
            }
            MenuChoice::Duration => {
                let Some(answer) =
                    prompt.ask(&format!("Duration in seconds [{DEFAULT_DURATION_SECS}]: "))?
                else {
                    return Ok(Outcome::Exit);
                };
                let secs = number_or(&answer, DEFAULT_DURATION_SECS);
                self.save(LoadConfig::default().with_duration(secs)).await?;
                Ok(Outcome::Continue(format!("Duration set to {secs}s")))
            }
            MenuChoice::BurstPattern => {
                let Some(answer) = prompt.ask("Enable burst pattern? (y/N): ")? else {
                    return Ok(Outcome::Exit);
                };
                let burst = is_yes(&answer);
                self.save(LoadConfig::default().with_burst_pattern(burst))
                    .await?;
                Ok(Outcome::Continue(format!(
                    "Burst pattern {}",
                    if burst { "enabled" } else { "disabled" }
                )))
            }
            MenuChoice::Restart => {
                self.cluster
                    .restart_deployment(LOADGEN_NAMESPACE, LOADGEN_APP)
                    .await?;
                readiness::wait_rolled_out(
                    self.cluster,
                    LOADGEN_NAMESPACE,
                    LOADGEN_APP,
                    self.timeout,
                )
                .await?;
                Ok(Outcome::Continue(
                    "Load generator restarted with the current configuration".to_owned(),
                ))
            }
            MenuChoice::Exit => Ok(Outcome::Exit),
        }
    }

    async fn current(&self) -> Result<LoadConfig> {
        self.store.get().await?.ok_or_else(|| Error::NotDeployed {
            what: format!("configuration object {LOADGEN_NAMESPACE}/{CONFIG_MAP_NAME}"),
        })
    }

    async fn save(&self, patch: LoadConfig) -> Result<()> {
        info!(keys = ?patch.to_data().keys().collect::<Vec<_>>(), "updating load configuration");
        self.store.merge_patch(&patch).await
    }
}

/// One `key: value` line per key, unset keys shown as defaults. Workload types and intensities
/// the workload does not know, e.g. after a manual edit of the ConfigMap, are flagged.
pub fn render(config: &LoadConfig) -> String {
    let mut out = String::from("Current configuration:");
    for (key, value) in config.entries() {
        let Some(value) = value else {
            out.push_str(&format!("\n  {key}: (default)"));
            continue;
        };
        let known = match key {
            "workload-type" => value.parse::<WorkloadType>().is_ok(),
            "load-intensity" => value.parse::<Intensity>().is_ok(),
            _ => true,
        };
        out.push_str(&format!("\n  {key}: {value}"));
        if !known {
            out.push_str(" (unrecognized, the workload uses its default)");
        }
    }
    out
}
