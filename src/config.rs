use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Network construction parameters.
    pub network: NetworkConfig,
    /// Adoption model parameters.
    pub model: ModelConfig,
    /// Run parameters.
    pub run: RunConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Number of agents (nodes of the network).
    pub n_agents: usize,
    /// Number of edges each new node attaches with.
    pub n_attach: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_agents: 1000,
            n_attach: 40,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Number of competing technologies.
    pub n_tech: usize,
    /// Probability that a decided agent reconsiders its technology.
    pub prob_switch: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_tech: 3,
            prob_switch: 0.9,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of iterations (single agent updates).
    pub n_iter: usize,
    /// Random number generator seed. Seeded from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_iter: 10_000,
            seed: None,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.network.n_agents, 2..=100_000).context("invalid number of agents")?;
        check_num(self.network.n_attach, 1..self.network.n_agents)
            .context("invalid number of attachment edges")?;

        check_num(self.model.n_tech, 1..=100).context("invalid number of technologies")?;
        check_num(self.model.prob_switch, 0.0..=1.0).context("invalid switching probability")?;

        // Every technology needs two distinct early adopters.
        check_num(2 * self.model.n_tech, ..=self.network.n_agents)
            .context("too few agents to seed every technology")?;

        check_num(self.run.n_iter, 0..=100_000_000).context("invalid number of iterations")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
