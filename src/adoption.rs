use crate::model::{Agent, Tech};
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Adoption time series of a single technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionSeries {
    /// Technology identifier.
    pub tech: Tech,
    /// Legend label for plotting.
    pub label: String,
    /// Number of adopters after every iteration.
    pub counts: Vec<usize>,
}

/// Legend label of technology `tech`, counted from one.
pub fn tech_label(tech: Tech) -> String {
    format!("Technology {}", tech + 1)
}

/// Records how many agents hold each technology after every iteration.
pub struct AdoptionTracker {
    series_vec: Vec<AdoptionSeries>,
    count_vec: Vec<usize>,
}

impl AdoptionTracker {
    /// Create a tracker with an empty series for each technology in `0..n_tech`.
    pub fn new(n_tech: usize) -> Self {
        let series_vec = (0..n_tech)
            .map(|tech| AdoptionSeries {
                tech,
                label: tech_label(tech),
                counts: Vec::new(),
            })
            .collect();
        Self {
            series_vec,
            count_vec: vec![0; n_tech],
        }
    }

    /// Recount the adopters of every technology over the whole population
    /// and append the counts.
    pub fn record(&mut self, agt_vec: &[Agent]) -> Result<()> {
        self.count_vec.fill(0);
        for agt in agt_vec {
            if let Some(tech) = agt.technology() {
                match self.count_vec.get_mut(tech) {
                    Some(count) => *count += 1,
                    None => bail!("agent {} holds unknown technology {tech}", agt.id()),
                }
            }
        }

        for (series, &count) in self.series_vec.iter_mut().zip(&self.count_vec) {
            series.counts.push(count);
        }
        Ok(())
    }

    /// Number of recorded iterations.
    #[cfg(test)]
    pub fn n_steps(&self) -> usize {
        self.series_vec.first().map_or(0, |series| series.counts.len())
    }

    /// Time series of technology `tech`.
    #[cfg(test)]
    pub fn series(&self, tech: Tech) -> Option<&[usize]> {
        self.series_vec
            .get(tech)
            .map(|series| series.counts.as_slice())
    }

    pub fn series_vec(&self) -> &[AdoptionSeries] {
        &self.series_vec
    }

    /// Save all time series to a MessagePack file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &self.series_vec)
            .context("failed to serialize adoption series")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

/// Load the time series written by [`AdoptionTracker::save`].
pub fn load_series<P: AsRef<Path>>(file: P) -> Result<Vec<AdoptionSeries>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let series_vec =
        decode::from_read(&mut reader).context("failed to deserialize adoption series")?;
    Ok(series_vec)
}
