//! Agents and their technology choice rule.

use anyhow::Result;
use rand::prelude::*;

/// Technology identifier.
pub type Tech = usize;

/// Read access to the neighbors of an agent and to the technology of any agent.
///
/// Passed to [`Agent`] methods that copy a neighbor's choice.
pub trait Neighborhood {
    /// Identifiers of the agents adjacent to agent `id`.
    fn neighbors(&self, id: usize) -> Result<&[usize]>;

    /// Current technology of agent `id`.
    fn technology(&self, id: usize) -> Result<Option<Tech>>;
}

/// Agent of the simulation.
///
/// Each agent holds at most one technology (`tech`) and reconsiders it with
/// probability `prob_switch` every time it is updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    id: usize,
    prob_switch: f64,
    tech: Option<Tech>,
}

impl Agent {
    /// Create a new undecided agent.
    pub fn new(id: usize, prob_switch: f64) -> Self {
        Self {
            id,
            prob_switch,
            tech: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the current technology of the agent.
    pub fn technology(&self) -> Option<Tech> {
        self.tech
    }

    /// Overwrite the technology. Only used to seed early adopters.
    pub fn set_initial_technology(&mut self, tech: Tech) {
        self.tech = Some(tech);
    }

    /// Copy the technology of a random adopting neighbor.
    ///
    /// Neighbors are visited in a random order and the first one holding a
    /// technology is copied. Ends undecided if no neighbor holds one.
    pub fn choose_new_technology<N, R>(&mut self, nbh: &N, rng: &mut R) -> Result<()>
    where
        N: Neighborhood + ?Sized,
        R: Rng + ?Sized,
    {
        let mut nbrs = nbh.neighbors(self.id)?.to_vec();
        nbrs.shuffle(rng);

        self.tech = None;

        for nbr in nbrs {
            if let Some(tech) = nbh.technology(nbr)? {
                self.tech = Some(tech);
                break;
            }
        }

        Ok(())
    }

    /// Update the agent.
    ///
    /// An undecided agent always tries to adopt; a decided one reconsiders
    /// with probability `prob_switch`.
    pub fn iterate<N, R>(&mut self, nbh: &N, rng: &mut R) -> Result<()>
    where
        N: Neighborhood + ?Sized,
        R: Rng + ?Sized,
    {
        if self.tech.is_none() || rng.random_bool(self.prob_switch) {
            self.choose_new_technology(nbh, rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use rand_chacha::ChaCha12Rng;

    /// Star around agent 0 with fixed neighbor technologies.
    struct Star {
        nbrs: Vec<usize>,
        techs: Vec<Option<Tech>>,
    }

    impl Star {
        fn new(techs: Vec<Option<Tech>>) -> Self {
            Self {
                nbrs: (1..techs.len()).collect(),
                techs,
            }
        }
    }

    impl Neighborhood for Star {
        fn neighbors(&self, id: usize) -> Result<&[usize]> {
            if id == 0 { Ok(self.nbrs.as_slice()) } else { Ok(&[][..]) }
        }

        fn technology(&self, id: usize) -> Result<Option<Tech>> {
            self.techs
                .get(id)
                .copied()
                .with_context(|| format!("no agent {id}"))
        }
    }

    fn rng() -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(3)
    }

    #[test]
    fn copies_the_only_adopting_neighbor() {
        let mut rng = rng();
        let nbh = Star::new(vec![None, None, None, Some(2), None, None]);
        for _ in 0..100 {
            let mut agt = Agent::new(0, 0.9);
            agt.choose_new_technology(&nbh, &mut rng)
                .expect("failed to choose technology");
            assert_eq!(agt.technology(), Some(2));
        }
    }

    #[test]
    fn isolated_agent_stays_undecided() {
        let mut rng = rng();
        let nbh = Star::new(vec![None]);
        let mut agt = Agent::new(0, 0.9);
        for _ in 0..1000 {
            agt.iterate(&nbh, &mut rng).expect("failed to iterate");
            assert_eq!(agt.technology(), None);
        }
    }

    #[test]
    fn reconsidering_without_adopting_neighbors_clears_choice() {
        let mut rng = rng();
        let nbh = Star::new(vec![None, None, None]);
        let mut agt = Agent::new(0, 1.0);
        agt.set_initial_technology(1);
        agt.iterate(&nbh, &mut rng).expect("failed to iterate");
        assert_eq!(agt.technology(), None);
    }

    #[test]
    fn decided_agent_never_reconsiders_with_zero_switching() {
        let mut rng = rng();
        let nbh = Star::new(vec![None, Some(0), Some(0)]);
        let mut agt = Agent::new(0, 0.0);
        agt.set_initial_technology(1);
        for _ in 0..1000 {
            agt.iterate(&nbh, &mut rng).expect("failed to iterate");
        }
        assert_eq!(agt.technology(), Some(1));
    }

    #[test]
    fn undecided_agent_always_adopts_when_possible() {
        let mut rng = rng();
        let nbh = Star::new(vec![None, None, Some(4)]);
        let mut agt = Agent::new(0, 0.0);
        agt.iterate(&nbh, &mut rng).expect("failed to iterate");
        assert_eq!(agt.technology(), Some(4));
    }

    #[test]
    fn copies_uniformly_among_adopting_neighbors() {
        let mut rng = rng();
        let nbh = Star::new(vec![None, Some(0), None, Some(1), None, None, None]);
        let n_trials = 4000;
        let mut n_zero = 0;
        for _ in 0..n_trials {
            let mut agt = Agent::new(0, 1.0);
            agt.choose_new_technology(&nbh, &mut rng)
                .expect("failed to choose technology");
            match agt.technology() {
                Some(0) => n_zero += 1,
                Some(1) => {}
                other => panic!("unexpected technology {other:?}"),
            }
        }
        let frac = n_zero as f64 / n_trials as f64;
        assert!((frac - 0.5).abs() < 0.05, "fraction of technology 0 is {frac}");
    }

    #[test]
    fn unknown_neighbor_is_an_error() {
        let mut rng = rng();
        let nbh = Star {
            nbrs: vec![7],
            techs: vec![None],
        };
        let mut agt = Agent::new(0, 0.9);
        assert!(agt.choose_new_technology(&nbh, &mut rng).is_err());
    }
}
