use clap::{Args, ValueEnum};
use std::path::PathBuf;

use mas_agent::SchedulerConfig;
use mas_core::SchedulingPolicy;
use mas_lang::RunSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceFormat {
    /// One human-readable line per event
    Text,
    /// One JSON object per line
    Json,
}

/// Options of `mas run`. Anything given here overrides the system file.
#[derive(Debug, Clone, Args)]
pub struct RunOptions {
    /// System file (`.toml` or `.mas2j`)
    pub file: PathBuf,

    /// Stop after this many rounds
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Seed for plan selection, `.rand_int` and the environment
    #[arg(long)]
    pub seed: Option<u64>,

    /// Scheduling policy: round-robin or priority
    #[arg(long)]
    pub policy: Option<SchedulingPolicy>,

    /// Print the full event trace after the run
    #[arg(long, value_enum)]
    pub trace: Option<TraceFormat>,
}

impl RunOptions {
    pub fn scheduler_config(&self, settings: &RunSettings) -> SchedulerConfig {
        let mut config = SchedulerConfig::from(settings);
        if let Some(max) = self.max_steps {
            config.max_steps = Some(max);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_agent::DEFAULT_MAX_STEPS;

    fn options() -> RunOptions {
        RunOptions {
            file: PathBuf::from("system.toml"),
            max_steps: None,
            seed: None,
            policy: None,
            trace: None,
        }
    }

    #[test]
    fn test_file_settings_apply_without_overrides() {
        let settings = RunSettings {
            seed: 9,
            max_steps: Some(50),
            ..RunSettings::default()
        };
        let config = options().scheduler_config(&settings);
        assert_eq!(config.seed, 9);
        assert_eq!(config.max_steps, Some(50));
        assert_eq!(config.policy, SchedulingPolicy::RoundRobin);
    }

    #[test]
    fn test_cli_overrides_win() {
        let opts = RunOptions {
            max_steps: Some(5),
            seed: Some(1),
            policy: Some(SchedulingPolicy::Priority),
            ..options()
        };
        let config = opts.scheduler_config(&RunSettings::default());
        assert_eq!(config.max_steps, Some(5));
        assert_eq!(config.seed, 1);
        assert_eq!(config.policy, SchedulingPolicy::Priority);
    }

    #[test]
    fn test_default_step_limit() {
        let config = options().scheduler_config(&RunSettings::default());
        assert_eq!(config.max_steps, Some(DEFAULT_MAX_STEPS));
    }
}
