//! Episode-end reporting sinks

use std::fs::File;
use std::path::PathBuf;

use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{Column, CsvWriter, NamedFrom},
};
use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// Summary emitted at the end of an episode on the reporting cadence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    /// Global steps taken so far.
    pub steps: usize,
    /// Accumulator entries, the just-completed episode included.
    pub episodes: usize,
    /// Mean total reward over the trailing window of completed episodes.
    pub mean_reward: f64,
    /// Environment quality metric at episode end.
    pub quality: f64,
    pub explore_prob: f64,
}

pub trait Reporter {
    fn report(&mut self, report: &EpisodeReport) -> Result<()>;

    /// Flushes anything buffered; called once when training ends.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> Reporter for F
where
    F: FnMut(&EpisodeReport),
{
    fn report(&mut self, report: &EpisodeReport) -> Result<()> {
        self(report);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&mut self, _report: &EpisodeReport) -> Result<()> {
        Ok(())
    }
}

/// Emits each report as a structured `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, report: &EpisodeReport) -> Result<()> {
        info!(
            steps = report.steps,
            episodes = report.episodes,
            mean_reward = %format!("{:.1}", report.mean_reward),
            nmse = report.quality,
            exploring_pct = (100.0 * report.explore_prob) as u32,
            "episode finished"
        );
        Ok(())
    }
}

/// Collects reports and writes them as CSV on `finish`.
pub struct CsvReporter {
    path: PathBuf,
    rows: Vec<EpisodeReport>,
}

impl CsvReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }
}

impl Reporter for CsvReporter {
    fn report(&mut self, report: &EpisodeReport) -> Result<()> {
        self.rows.push(report.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let steps: Vec<u64> = self.rows.iter().map(|r| r.steps as u64).collect();
        let episodes: Vec<u64> = self.rows.iter().map(|r| r.episodes as u64).collect();
        let mean_reward: Vec<f64> = self.rows.iter().map(|r| r.mean_reward).collect();
        let quality: Vec<f64> = self.rows.iter().map(|r| r.quality).collect();
        let explore_prob: Vec<f64> = self.rows.iter().map(|r| r.explore_prob).collect();

        let mut df = DataFrame::new(vec![
            Column::new("steps".into(), steps),
            Column::new("episodes".into(), episodes),
            Column::new("mean_reward".into(), mean_reward),
            Column::new("quality".into(), quality),
            Column::new("explore_prob".into(), explore_prob),
        ])?;

        let mut file = File::create(&self.path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        info!(path = %self.path.display(), rows = self.rows.len(), "wrote episode reports");
        Ok(())
    }
}

/// Wraps two reporters so both receive every report.
pub struct Tee<A, B>(pub A, pub B);

impl<A: Reporter, B: Reporter> Reporter for Tee<A, B> {
    fn report(&mut self, report: &EpisodeReport) -> Result<()> {
        self.0.report(report)?;
        self.1.report(report)
    }

    fn finish(&mut self) -> Result<()> {
        self.0.finish()?;
        self.1.finish()
    }
}
