//! Drive a stream of clusters through the analysis, the export filter, and the writers.

use std::{collections::BTreeMap, io::Write};

use context_error::{BasicKind, BoxedError};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisContext, ClusterSummary},
    cluster::Cluster,
    export::{ClusterWriter, ExportFormat},
    filter::{ExportFilter, FilterDecision, Rejection},
};

/// Counters for a single conversion run
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConversionStatistics {
    /// Clusters read successfully
    pub clusters: usize,
    /// Records in the input that could not be read
    pub unreadable: usize,
    /// Clusters that passed the export filter
    pub accepted: usize,
    /// Rejected clusters per [`Rejection::reason`]
    pub rejected: BTreeMap<String, usize>,
    /// Records written per format
    pub written: BTreeMap<ExportFormat, usize>,
}

impl ConversionStatistics {
    /// The total number of rejected clusters
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

impl std::fmt::Display for ConversionStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} clusters read, {} accepted, {} rejected",
            self.clusters,
            self.accepted,
            self.rejected_total()
        )?;
        if self.unreadable > 0 {
            write!(f, ", {} unreadable", self.unreadable)?;
        }
        for (reason, count) in &self.rejected {
            write!(f, "\n  rejected on {reason}: {count}")?;
        }
        for (format, count) in &self.written {
            write!(f, "\n  {format} records written: {count}")?;
        }
        Ok(())
    }
}

/// Converts clusters one at a time. Each cluster is analysed once, the filter is evaluated once,
/// and an accepted cluster is handed to every writer.
#[derive(Debug)]
pub struct ClusterConverter<'a, W: Write> {
    context: AnalysisContext<'a>,
    filter: ExportFilter,
    writers: Vec<ClusterWriter<'a, W>>,
    statistics: ConversionStatistics,
}

impl<'a, W: Write> ClusterConverter<'a, W> {
    /// Create a converter writing to all given writers
    pub fn new(
        context: AnalysisContext<'a>,
        filter: ExportFilter,
        writers: Vec<ClusterWriter<'a, W>>,
    ) -> Self {
        Self {
            context,
            filter,
            writers,
            statistics: ConversionStatistics::default(),
        }
    }

    /// The statistics so far
    pub const fn statistics(&self) -> &ConversionStatistics {
        &self.statistics
    }

    /// Analyse, filter, and write a single cluster. Returns the decision of the export filter.
    /// # Errors
    /// If any of the writers failed.
    pub fn on_cluster(&mut self, cluster: &Cluster) -> std::io::Result<FilterDecision> {
        self.statistics.clusters += 1;
        let summary = ClusterSummary::analyse(cluster, self.context);
        let decision = self.filter.evaluate(&summary);
        match &decision {
            FilterDecision::Rejected(rejection) => {
                let id = cluster.id().unwrap_or("-");
                if let Rejection::Analysis(err) = rejection {
                    log::warn!("Cluster {id} is excluded: {err}");
                } else {
                    log::debug!("Cluster {id} is excluded: {rejection}");
                }
                *self
                    .statistics
                    .rejected
                    .entry(rejection.reason().to_string())
                    .or_default() += 1;
            }
            FilterDecision::Accepted { protein } => {
                self.statistics.accepted += 1;
                for writer in &mut self.writers {
                    if writer.on_cluster(cluster, &summary, protein.as_deref())? {
                        *self.statistics.written.entry(writer.format()).or_default() += 1;
                    }
                }
            }
        }
        Ok(decision)
    }

    /// Convert all clusters from the given source. Unreadable records are logged and counted,
    /// the conversion continues with the next record.
    /// # Errors
    /// If any of the writers failed.
    pub fn convert(
        &mut self,
        clusters: impl IntoIterator<Item = Result<Cluster, BoxedError<'static, BasicKind>>>,
    ) -> std::io::Result<()> {
        for cluster in clusters {
            match cluster {
                Ok(cluster) => {
                    self.on_cluster(&cluster)?;
                }
                Err(err) => {
                    log::warn!("Skipping unreadable cluster\n{err}");
                    self.statistics.unreadable += 1;
                }
            }
        }
        log::info!("{}", self.statistics);
        Ok(())
    }

    /// Flush all writers and return their outputs with the statistics of this run
    /// # Errors
    /// If flushing any of the writers failed.
    pub fn finish(self) -> std::io::Result<(Vec<W>, ConversionStatistics)> {
        let outputs = self
            .writers
            .into_iter()
            .map(ClusterWriter::finish)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok((outputs, self.statistics))
    }
}
