use anyhow::{Context, Result, bail};
use rand::prelude::*;
use std::iter;

/// Undirected agent interaction graph.
///
/// Nodes are the agent identifiers `0..n_nodes`. The topology is fixed once built.
#[derive(Default)]
pub struct Network {
    adj_vec: Vec<Vec<usize>>,
    n_edges: usize,
}

impl Network {
    /// Grow a scale-free network by preferential attachment (Barabási–Albert).
    ///
    /// The first `n_attach` nodes start unconnected. Every following node attaches
    /// to `n_attach` distinct existing nodes, each drawn with probability
    /// proportional to its current degree.
    pub fn barabasi_albert<R: Rng + ?Sized>(
        n_nodes: usize,
        n_attach: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if n_attach < 1 || n_attach >= n_nodes {
            bail!("attachment edges must be in the range 1..{n_nodes}, but is {n_attach}");
        }

        let mut adj_vec = vec![Vec::with_capacity(n_attach); n_nodes];
        let mut n_edges = 0;

        // Every node appears here once per incident edge, so a uniform draw
        // from this list is a degree-weighted draw over nodes.
        let mut endpoints = Vec::with_capacity(2 * (n_nodes - n_attach) * n_attach);

        let mut targets: Vec<usize> = (0..n_attach).collect();
        for source in n_attach..n_nodes {
            for &target in &targets {
                adj_vec[source].push(target);
                adj_vec[target].push(source);
            }
            n_edges += targets.len();

            endpoints.extend_from_slice(&targets);
            endpoints.extend(iter::repeat_n(source, n_attach));

            targets = sample_distinct(&endpoints, n_attach, rng)
                .context("failed to select attachment targets")?;
        }

        Ok(Self { adj_vec, n_edges })
    }

    /// Build a network from an explicit edge list.
    #[cfg(test)]
    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut adj_vec = vec![Vec::new(); n_nodes];
        for &(u, v) in edges {
            if u >= n_nodes || v >= n_nodes {
                bail!("edge ({u}, {v}) references a node outside 0..{n_nodes}");
            }
            if u == v {
                bail!("self-loop on node {u}");
            }
            if adj_vec[u].contains(&v) {
                bail!("duplicate edge ({u}, {v})");
            }
            adj_vec[u].push(v);
            adj_vec[v].push(u);
        }
        Ok(Self {
            adj_vec,
            n_edges: edges.len(),
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.adj_vec.len()
    }

    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    /// Neighbors of `node` in insertion order, or `None` if the node does not exist.
    pub fn neighbors(&self, node: usize) -> Option<&[usize]> {
        self.adj_vec.get(node).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub fn degree(&self, node: usize) -> Option<usize> {
        self.neighbors(node).map(<[usize]>::len)
    }
}

fn sample_distinct<R: Rng + ?Sized>(
    pool: &[usize],
    amount: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let mut chosen = Vec::with_capacity(amount);
    while chosen.len() < amount {
        let &node = pool.choose(rng).context("pool is empty")?;
        if !chosen.contains(&node) {
            chosen.push(node);
        }
    }
    Ok(chosen)
}
