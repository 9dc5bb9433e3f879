//! Errors that can occur while analysing a single cluster.
//!
//! None of these abort a conversion run. They are collected in the [`crate::analysis::ClusterSummary`]
//! and turn into an excluded cluster (with a logged reason) once the export filter needs them.

use serde::{Deserialize, Serialize};

/// Why a modification could not be used in a mass calculation
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum UnresolvedReason {
    /// The accession is not present in the modification database
    NotFound,
    /// The accession is known but has no monoisotopic mass delta
    NoMonoisotopicDelta,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found in the modification database"),
            Self::NoMonoisotopicDelta => write!(f, "has no monoisotopic mass delta"),
        }
    }
}

/// A failure to derive one of the values of a cluster summary
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum AnalysisError {
    /// A modification of the representative PSM could not be resolved
    UnresolvedModification {
        /// The accession as given in the input
        accession: String,
        /// Why it could not be resolved
        reason: UnresolvedReason,
    },
    /// The charge could not be determined from the theoretical mass and the precursor m/z
    ChargeEstimationFailure(String),
    /// The peaks could not be annotated with theoretical fragments
    AnnotationUnavailable(String),
    /// The cluster itself is inconsistent
    MalformedCluster(String),
    /// The cluster does not contain any identified spectrum
    Unidentified,
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedModification { accession, reason } => {
                write!(f, "Modification '{accession}' {reason}")
            }
            Self::ChargeEstimationFailure(explanation) => {
                write!(f, "Charge estimation failed: {explanation}")
            }
            Self::AnnotationUnavailable(explanation) => {
                write!(f, "Annotation unavailable: {explanation}")
            }
            Self::MalformedCluster(explanation) => write!(f, "Malformed cluster: {explanation}"),
            Self::Unidentified => write!(f, "Cluster has no identified spectra"),
        }
    }
}

impl std::error::Error for AnalysisError {}
