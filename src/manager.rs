use crate::analysis::{Analyzer, save_reports};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

const ADOPTION_FILE: &str = "adoption.msgpack";
const RESULTS_FILE: &str = "results.msgpack";
const SUMMARY_FILE: &str = "summary.msgpack";

/// Layout of a simulation directory.
///
/// ```text
/// sim_dir/
///   config.toml
///   summary.msgpack
///   run-0000/
///     adoption.msgpack
///     results.msgpack
/// ```
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self) -> Result<()> {
        let mut engine = Engine::generate_initial_condition(&self.cfg)
            .context("failed to generate initial condition")?;

        engine
            .run(self.cfg.run.n_iter)
            .context("failed to run simulation")?;

        let n_undecided = engine
            .agents()
            .iter()
            .filter(|agt| agt.technology().is_none())
            .count();
        for series in engine.adoption().series_vec() {
            let n_final = series.counts.last().copied().unwrap_or(0);
            log::info!("{}: {n_final} adopters", series.label);
        }
        log::info!("undecided: {n_undecided} agents");

        // The run directory only appears once there is a completed run to save.
        let run_dir = self.next_run_dir().context("failed to choose run dir")?;
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let adoption_file = run_dir.join(ADOPTION_FILE);
        if let Err(error) = engine.adoption().save(&adoption_file) {
            fs::remove_dir_all(&run_dir).ok();
            return Err(error.context("failed to save adoption series"));
        }
        log::info!("saved {adoption_file:?}");

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(&self.cfg);

        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            let adoption_file = run_dir.join(ADOPTION_FILE);
            if !adoption_file.is_file() {
                log::warn!("skipped {run_dir:?}: no adoption series");
                continue;
            }

            let reports = analyzer
                .add_file(&adoption_file)
                .with_context(|| format!("failed to analyze {adoption_file:?}"))?;

            let results_file = run_dir.join(RESULTS_FILE);
            save_reports(&results_file, &reports).context("failed to save results")?;
            log::info!("saved {results_file:?}");
        }

        let summary_file = self.sim_dir.join(SUMMARY_FILE);
        save_reports(&summary_file, &analyzer.report()).context("failed to save summary")?;
        log::info!("saved {summary_file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let summary_file = self.sim_dir.join(SUMMARY_FILE);
        if summary_file.exists() {
            fs::remove_file(&summary_file)
                .with_context(|| format!("failed to remove {summary_file:?}"))?;
            log::info!("removed {summary_file:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn next_run_dir(&self) -> Result<PathBuf> {
        let mut run_idx = self.run_dirs()?.len();
        while self.run_dir(run_idx).exists() {
            run_idx += 1;
        }
        Ok(self.run_dir(run_idx))
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }
}
