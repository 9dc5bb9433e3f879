#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod annotation;
pub mod charge;
pub mod chemistry;
pub mod cluster;
pub mod clustering;
pub mod consensus;
pub mod convert;
pub mod error;
pub mod export;
pub mod fasta;
pub mod filter;
pub mod fragment;
mod helper_functions;
pub mod modification_names;
pub mod ontology;

/// A subset of the types and traits that are envisioned to be used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::{
        analysis::{AnalysisContext, ClusterSummary},
        charge::{ChargeEstimate, RepresentativeMatch},
        cluster::{Cluster, Modification, PeptideSpectrumMatch, SpectrumReference},
        clustering::ClusteringFileReader,
        consensus::{Consensus, RatioKind},
        convert::{ClusterConverter, ConversionStatistics},
        error::{AnalysisError, UnresolvedReason},
        export::{ClusterWriter, ExportFormat, OutputParameters},
        fasta::ProteinDatabase,
        filter::{ExportFilter, FilterDecision, FilterParameters, Rejection},
        fragment::{BackboneFragmenter, FragmentGenerator, FragmentationModel, IonType, ProductIon},
        modification_names::ModificationNameTable,
        ontology::{ModificationDatabase, ModificationEntry, ModificationLookup},
    };
}
