//! Write clusters as spectral libraries or peak lists.

mod mgf;
mod msp;

use std::{io::Write, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::ClusterSummary, cluster::Cluster, helper_functions::round_half_up,
    modification_names::ModificationNameTable, ontology::ModificationLookup,
};

pub use mgf::MgfWriter;
pub use msp::MspWriter;

/// The intensity of the base peak after normalisation
pub const BASE_PEAK_INTENSITY: f64 = 10_000.0;

/// The supported output formats
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ExportFormat {
    /// NIST/SpectraST spectral library
    Msp,
    /// Mascot generic format peak list
    Mgf,
}

impl ExportFormat {
    /// The file extension (without dot)
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Msp => "msp",
            Self::Mgf => "mgf",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msp" => Ok(Self::Msp),
            "mgf" => Ok(Self::Mgf),
            other => Err(format!("Unknown export format '{other}', use 'msp' or 'mgf'")),
        }
    }
}

/// Options for the written spectra
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct OutputParameters {
    /// Rescale the intensities so the base peak is [`BASE_PEAK_INTENSITY`]
    pub normalize: bool,
    /// Add fragment annotations to the peaks
    pub annotate_peaks: bool,
}

impl OutputParameters {
    /// Set the normalisation
    #[must_use]
    pub fn normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the peak annotation
    #[must_use]
    pub fn annotate_peaks(self, annotate_peaks: bool) -> Self {
        Self {
            annotate_peaks,
            ..self
        }
    }
}

/// Rescale the intensities so that the highest becomes [`BASE_PEAK_INTENSITY`], rounded half up
/// to whole numbers. Applying this twice gives the same result as applying it once.
pub fn normalize(intensities: &[f64]) -> Vec<f64> {
    let max = intensities.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return intensities.to_vec();
    }
    intensities
        .iter()
        .map(|i| round_half_up(i * BASE_PEAK_INTENSITY / max))
        .collect()
}

/// The peaks to write in input order as (mz, intensity), optionally normalised, without peaks
/// with zero m/z or zero intensity.
pub(crate) fn export_peaks(cluster: &Cluster, normalize_intensities: bool) -> Vec<(f64, f64)> {
    let intensities = if normalize_intensities {
        normalize(cluster.consensus_intensity())
    } else {
        cluster.consensus_intensity().to_vec()
    };
    cluster
        .consensus_mz()
        .iter()
        .zip(intensities)
        .filter(|(mz, intensity)| **mz != 0.0 && *intensity != 0.0)
        .map(|(mz, intensity)| (*mz, intensity))
        .collect()
}

/// A writer for one of the [`ExportFormat`]s
#[derive(Debug)]
pub enum ClusterWriter<'a, W: Write> {
    /// MSP writer
    Msp(MspWriter<'a, W>),
    /// MGF writer
    Mgf(MgfWriter<W>),
}

impl<'a, W: Write> ClusterWriter<'a, W> {
    /// Create a writer for the given format
    pub fn new(
        format: ExportFormat,
        output: W,
        parameters: OutputParameters,
        modifications: &'a dyn ModificationLookup,
        names: &'a ModificationNameTable,
    ) -> Self {
        match format {
            ExportFormat::Msp => Self::Msp(MspWriter::new(output, parameters, modifications, names)),
            ExportFormat::Mgf => Self::Mgf(MgfWriter::new(output)),
        }
    }

    /// The format of this writer
    pub const fn format(&self) -> ExportFormat {
        match self {
            Self::Msp(_) => ExportFormat::Msp,
            Self::Mgf(_) => ExportFormat::Mgf,
        }
    }

    /// Write a cluster that passed the export filter, returns if a record was written.
    /// # Errors
    /// If writing to the underlying output failed.
    pub fn on_cluster(
        &mut self,
        cluster: &Cluster,
        summary: &ClusterSummary<'_>,
        protein: Option<&str>,
    ) -> std::io::Result<bool> {
        match self {
            Self::Msp(writer) => writer.on_cluster(cluster, summary, protein),
            Self::Mgf(writer) => writer.on_cluster(cluster, summary, protein),
        }
    }

    /// The number of records written by this writer
    pub const fn records(&self) -> usize {
        match self {
            Self::Msp(writer) => writer.records(),
            Self::Mgf(writer) => writer.records(),
        }
    }

    /// Flush the output and return it
    /// # Errors
    /// If flushing failed.
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Self::Msp(writer) => writer.finish(),
            Self::Mgf(writer) => writer.finish(),
        }
    }
}
