use crate::adoption::{AdoptionSeries, load_series, tech_label};
use crate::config::Config;
use crate::model::Tech;
use crate::stats::{Accumulator, AccumulatorReport, TimeSeriesReport, report_counts};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Summary of one technology's adoption in a single run.
#[derive(Debug, Serialize, Deserialize)]
pub struct TechReport {
    pub tech: Tech,
    pub label: String,
    pub final_count: usize,
    pub final_share: f64,
    pub max_count: usize,
    pub series: TimeSeriesReport,
}

/// Final adoption share of one technology across all runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareReport {
    pub tech: Tech,
    pub label: String,
    pub final_share: AccumulatorReport,
}

pub struct Analyzer {
    n_agents: usize,
    label_vec: Vec<String>,
    share_acc_vec: Vec<Accumulator>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let n_tech = cfg.model.n_tech;
        let label_vec = (0..n_tech).map(tech_label).collect();
        let mut share_acc_vec = Vec::new();
        share_acc_vec.resize_with(n_tech, Accumulator::new);
        Self {
            n_agents: cfg.network.n_agents,
            label_vec,
            share_acc_vec,
        }
    }

    /// Analyze the adoption file of a single run.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<Vec<TechReport>> {
        let series_vec = load_series(file).context("failed to load adoption series")?;
        self.add_series(&series_vec)
    }

    pub fn add_series(&mut self, series_vec: &[AdoptionSeries]) -> Result<Vec<TechReport>> {
        let n_tech = self.share_acc_vec.len();
        if series_vec.len() != n_tech {
            bail!(
                "number of series must be {n_tech}, but is {}",
                series_vec.len()
            );
        }

        let mut reports = Vec::with_capacity(n_tech);
        for (series, acc) in series_vec.iter().zip(&mut self.share_acc_vec) {
            let counts = &series.counts;
            let final_count = counts.last().copied().unwrap_or(0);
            let final_share = final_count as f64 / self.n_agents as f64;
            acc.add(final_share);

            reports.push(TechReport {
                tech: series.tech,
                label: series.label.clone(),
                final_count,
                final_share,
                max_count: counts.iter().copied().max().unwrap_or(0),
                series: report_counts(counts),
            });
        }
        Ok(reports)
    }

    /// Final shares accumulated over every added run.
    pub fn report(&self) -> Vec<ShareReport> {
        self.share_acc_vec
            .iter()
            .zip(&self.label_vec)
            .enumerate()
            .map(|(tech, (acc, label))| ShareReport {
                tech,
                label: label.clone(),
                final_share: acc.report(),
            })
            .collect()
    }
}

/// Write reports to a MessagePack file.
pub fn save_reports<P: AsRef<Path>, T: Serialize + ?Sized>(file: P, reports: &T) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, reports).context("failed to serialize reports")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml("[network]\nn_agents = 10\nn_attach = 2\n[model]\nn_tech = 2\n")
            .expect("failed to parse config")
    }

    fn series(tech: Tech, counts: Vec<usize>) -> AdoptionSeries {
        AdoptionSeries {
            tech,
            label: tech_label(tech),
            counts,
        }
    }

    #[test]
    fn reports_final_and_max_counts() {
        let mut analyzer = Analyzer::new(&config());
        let reports = analyzer
            .add_series(&[series(0, vec![2, 3, 6, 5]), series(1, vec![2, 1, 0, 0])])
            .expect("failed to add series");

        assert_eq!(reports[0].final_count, 5);
        assert_eq!(reports[0].max_count, 6);
        assert_eq!(reports[0].final_share, 0.5);
        assert_eq!(reports[1].final_count, 0);
        assert_eq!(reports[1].max_count, 2);
        assert_eq!(reports[1].label, "Technology 2");
    }

    #[test]
    fn accumulates_shares_across_runs() {
        let mut analyzer = Analyzer::new(&config());
        analyzer
            .add_series(&[series(0, vec![4]), series(1, vec![6])])
            .expect("failed to add series");
        analyzer
            .add_series(&[series(0, vec![8]), series(1, vec![2])])
            .expect("failed to add series");

        let report = analyzer.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[1].label, tech_label(1));
        assert!((report[0].final_share.mean - 0.6).abs() < 1e-12);
        assert!((report[1].final_share.mean - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_runs_have_zero_final_count() {
        let mut analyzer = Analyzer::new(&config());
        let reports = analyzer
            .add_series(&[series(0, vec![]), series(1, vec![])])
            .expect("failed to add series");
        assert!(reports.iter().all(|report| report.final_count == 0));
    }

    #[test]
    fn mismatched_technology_count_is_an_error() {
        let mut analyzer = Analyzer::new(&config());
        assert!(analyzer.add_series(&[series(0, vec![1])]).is_err());
    }
}
