use crate::adoption::AdoptionTracker;
use crate::config::Config;
use crate::model::{Agent, Neighborhood, Tech};
use crate::network::Network;
use anyhow::{Context, Result, bail};
use rand::{prelude::*, seq::index};
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Number of early adopters seeded per technology.
const SEEDS_PER_TECH: usize = 2;

/// Lifecycle of an [`Engine`]. Operations must follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    NetworkPrepared,
    TechnologiesSeeded,
    Running,
    Completed,
}

/// Simulation engine.
///
/// Owns the network, the agents, the adoption tracker and the random number
/// generator, and provides methods to initialize and run simulations.
pub struct Engine {
    n_attach: usize,
    prob_switch: f64,
    phase: Phase,
    network: Network,
    agt_vec: Vec<Agent>,
    tech_vec: Vec<Tech>,
    tracker: AdoptionTracker,
    rng: ChaCha12Rng,
}

/// Neighbor lookups for the agent being updated.
struct World<'a> {
    network: &'a Network,
    agt_vec: &'a [Agent],
}

impl Neighborhood for World<'_> {
    fn neighbors(&self, id: usize) -> Result<&[usize]> {
        self.network
            .neighbors(id)
            .with_context(|| format!("agent {id} is not placed on the network"))
    }

    fn technology(&self, id: usize) -> Result<Option<Tech>> {
        self.agt_vec
            .get(id)
            .map(Agent::technology)
            .with_context(|| format!("no agent with id {id}"))
    }
}

impl Engine {
    /// Create an uninitialized `Engine`.
    pub fn new(n_attach: usize, prob_switch: f64, rng: ChaCha12Rng) -> Self {
        Self {
            n_attach,
            prob_switch,
            phase: Phase::Uninitialized,
            network: Network::default(),
            agt_vec: Vec::new(),
            tech_vec: Vec::new(),
            tracker: AdoptionTracker::new(0),
            rng,
        }
    }

    /// Create a new `Engine` from the configuration, with the network prepared
    /// and the early adopters seeded.
    pub fn generate_initial_condition(cfg: &Config) -> Result<Self> {
        let rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut engine = Self::new(cfg.network.n_attach, cfg.model.prob_switch, rng);
        engine
            .prepare_agent_network(cfg.network.n_agents)
            .context("failed to prepare agent network")?;
        engine
            .initialize_technologies(cfg.model.n_tech)
            .context("failed to initialize technologies")?;

        Ok(engine)
    }

    /// Build a preferential attachment network and place one agent on each node.
    pub fn prepare_agent_network(&mut self, n_agents: usize) -> Result<()> {
        self.expect_phase(&[Phase::Uninitialized])?;

        let network = Network::barabasi_albert(n_agents, self.n_attach, &mut self.rng)
            .context("failed to build network")?;
        log::info!(
            "built network with {} nodes and {} edges",
            network.n_nodes(),
            network.n_edges()
        );

        self.place_agents(network)
    }

    /// Place one undecided agent on each node of `network`.
    pub fn place_agents(&mut self, network: Network) -> Result<()> {
        self.expect_phase(&[Phase::Uninitialized])?;

        self.agt_vec = (0..network.n_nodes())
            .map(|id| Agent::new(id, self.prob_switch))
            .collect();
        self.network = network;
        self.phase = Phase::NetworkPrepared;

        Ok(())
    }

    /// Create technologies `0..n_tech` and seed each with two distinct early adopters.
    pub fn initialize_technologies(&mut self, n_tech: usize) -> Result<()> {
        self.expect_phase(&[Phase::NetworkPrepared])?;

        let n_agt = self.agt_vec.len();
        let n_seed = SEEDS_PER_TECH * n_tech;
        if n_seed > n_agt {
            bail!("{n_tech} technologies need {n_seed} early adopters, but there are {n_agt}");
        }

        // A single draw keeps the early adopters of different technologies disjoint.
        let i_agt_seed = index::sample(&mut self.rng, n_agt, n_seed);
        for (i_seed, i_agt) in i_agt_seed.into_iter().enumerate() {
            let tech = i_seed / SEEDS_PER_TECH;
            self.agt_vec[i_agt].set_initial_technology(tech);
            log::debug!("seeded agent {i_agt} with technology {tech}");
        }

        self.tech_vec = (0..n_tech).collect();
        self.tracker = AdoptionTracker::new(n_tech);
        self.phase = Phase::TechnologiesSeeded;

        Ok(())
    }

    /// Run `n_iter` single agent updates, recording the adoption counts after each.
    ///
    /// Running again after completion continues from the current agents with
    /// fresh time series.
    pub fn run(&mut self, n_iter: usize) -> Result<()> {
        self.expect_phase(&[Phase::TechnologiesSeeded, Phase::Completed])?;

        self.tracker = AdoptionTracker::new(self.tech_vec.len());
        self.phase = Phase::Running;

        let agt_dist = Uniform::new(0, self.agt_vec.len())?;
        let log_every = (n_iter / 10).max(1);

        for i_iter in 0..n_iter {
            self.perform_step(&agt_dist)
                .with_context(|| format!("failed to perform iteration {i_iter}"))?;

            if (i_iter + 1) % log_every == 0 {
                let progress = 100.0 * (i_iter + 1) as f64 / n_iter as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        self.phase = Phase::Completed;

        Ok(())
    }

    fn perform_step(&mut self, agt_dist: &Uniform<usize>) -> Result<()> {
        // Pick an agent uniformly, with replacement across steps.
        let i_agt = agt_dist.sample(&mut self.rng);

        let mut agt = self.agt_vec[i_agt];
        let world = World {
            network: &self.network,
            agt_vec: &self.agt_vec,
        };
        agt.iterate(&world, &mut self.rng)
            .with_context(|| format!("failed to iterate agent {i_agt}"))?;
        self.agt_vec[i_agt] = agt;

        self.tracker
            .record(&self.agt_vec)
            .context("failed to record adoption counts")?;

        Ok(())
    }

    fn expect_phase(&self, allowed: &[Phase]) -> Result<()> {
        if !allowed.contains(&self.phase) {
            bail!("engine phase must be one of {allowed:?}, but is {:?}", self.phase);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    #[cfg(test)]
    pub fn technologies(&self) -> &[Tech] {
        &self.tech_vec
    }

    /// Adoption time series of the last run.
    pub fn adoption(&self) -> &AdoptionTracker {
        &self.tracker
    }
}
