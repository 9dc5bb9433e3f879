//! Decide which clusters are exported.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::ClusterSummary, consensus::RatioKind, error::AnalysisError, fasta::ProteinDatabase,
};

/// The maximal absolute precursor mass error (Th) unless large deltas are explicitly included
pub const MAX_DELTA_MASS: f64 = 1.0;

/// Parameters for the export filter, allowing control over which clusters are exported.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FilterParameters {
    /// The minimal number of identified spectra (inclusive)
    pub min_size: usize,
    /// The maximal number of identified spectra (inclusive)
    pub max_size: usize,
    /// The minimal identification ratio (inclusive)
    pub min_ratio: f64,
    /// The maximal identification ratio (inclusive)
    pub max_ratio: f64,
    /// The identification ratio that is checked
    pub ratio_kind: RatioKind,
    /// The minimal annotated fraction of the ion current (inclusive)
    pub min_tic: f64,
    /// The maximal annotated fraction of the ion current (inclusive)
    pub max_tic: f64,
    /// If the annotated ion current is checked at all
    pub tic_filter: bool,
    /// Export clusters whose representative PSM does not fit the precursor m/z
    pub include_large_deltas: bool,
    /// The allowed species, empty allows all
    pub species: BTreeSet<String>,
}

impl FilterParameters {
    /// Set the range of identified spectra
    #[must_use]
    pub fn size(self, min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            ..self
        }
    }

    /// Set the ratio range
    #[must_use]
    pub fn ratio(self, min_ratio: f64, max_ratio: f64) -> Self {
        Self {
            min_ratio,
            max_ratio,
            ..self
        }
    }

    /// Set the ratio that is checked
    #[must_use]
    pub fn ratio_kind(self, ratio_kind: RatioKind) -> Self {
        Self { ratio_kind, ..self }
    }

    /// Set the annotated ion current range
    #[must_use]
    pub fn tic(self, min_tic: f64, max_tic: f64) -> Self {
        Self {
            min_tic,
            max_tic,
            ..self
        }
    }

    /// Turn the annotated ion current check on or off
    #[must_use]
    pub fn tic_filter(self, tic_filter: bool) -> Self {
        Self { tic_filter, ..self }
    }

    /// Set if clusters with large precursor mass errors are exported
    #[must_use]
    pub fn include_large_deltas(self, include_large_deltas: bool) -> Self {
        Self {
            include_large_deltas,
            ..self
        }
    }

    /// Set the allowed species
    #[must_use]
    pub fn species(self, species: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            species: species.into_iter().map(Into::into).collect(),
            ..self
        }
    }
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: usize::MAX,
            min_ratio: 0.0,
            max_ratio: 1.0,
            ratio_kind: RatioKind::Psm,
            min_tic: 0.0,
            max_tic: 1.0,
            tic_filter: true,
            include_large_deltas: false,
            species: BTreeSet::new(),
        }
    }
}

/// Why a cluster was not exported
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    /// The number of identified spectra is out of range
    Size(usize),
    /// The identification ratio is out of range
    Ratio(f64),
    /// The precursor mass error is too large
    DeltaMass(f64),
    /// The annotated ion current is out of range
    AnnotatedTic(f64),
    /// A value needed for filtering could not be computed
    Analysis(AnalysisError),
    /// None of the species of the cluster is allowed
    Species,
    /// The consensus sequence is not found in the protein database
    Protein,
}

impl Rejection {
    /// A short name for the kind of rejection, used to group rejections in run statistics
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Size(_) => "size",
            Self::Ratio(_) => "ratio",
            Self::DeltaMass(_) => "delta mass",
            Self::AnnotatedTic(_) => "annotated TIC",
            Self::Analysis(_) => "analysis failure",
            Self::Species => "species",
            Self::Protein => "protein",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Size(size) => write!(f, "{size} identified spectra is out of range"),
            Self::Ratio(ratio) => write!(f, "ratio {ratio:.3} is out of range"),
            Self::DeltaMass(delta) => write!(f, "precursor delta {delta:.4} is too large"),
            Self::AnnotatedTic(tic) => write!(f, "annotated TIC {tic:.3} is out of range"),
            Self::Analysis(err) => write!(f, "{err}"),
            Self::Species => write!(f, "no allowed species"),
            Self::Protein => write!(f, "sequence does not map to any protein"),
        }
    }
}

/// The outcome of the export filter
#[derive(Clone, Debug, PartialEq)]
pub enum FilterDecision {
    /// Export the cluster, with the header of the protein the consensus maps to if a protein
    /// database is used
    Accepted {
        /// The protein header
        protein: Option<String>,
    },
    /// Do not export the cluster
    Rejected(Rejection),
}

impl FilterDecision {
    /// If the cluster is accepted
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// The export filter with its protein lookup cache
#[derive(Clone, Debug)]
pub struct ExportFilter {
    parameters: FilterParameters,
    proteins: Option<ProteinDatabase>,
    protein_cache: HashMap<String, Option<String>>,
}

impl ExportFilter {
    /// Create a new filter
    pub fn new(parameters: FilterParameters, proteins: Option<ProteinDatabase>) -> Self {
        Self {
            parameters,
            proteins,
            protein_cache: HashMap::new(),
        }
    }

    /// The parameters in use
    pub const fn parameters(&self) -> &FilterParameters {
        &self.parameters
    }

    /// Check all predicates in order, stopping at the first failure
    pub fn evaluate(&mut self, summary: &ClusterSummary<'_>) -> FilterDecision {
        match self.check(summary) {
            Ok(protein) => FilterDecision::Accepted { protein },
            Err(rejection) => FilterDecision::Rejected(rejection),
        }
    }

    fn check(&mut self, summary: &ClusterSummary<'_>) -> Result<Option<String>, Rejection> {
        let parameters = &self.parameters;
        let cluster = summary.cluster();
        let identified = cluster.identified_count();
        if identified < parameters.min_size || identified > parameters.max_size {
            return Err(Rejection::Size(identified));
        }

        let ratio = summary
            .consensus()
            .map_or(0.0, |c| c.ratio(parameters.ratio_kind));
        if ratio < parameters.min_ratio || ratio > parameters.max_ratio {
            return Err(Rejection::Ratio(ratio));
        }

        if !parameters.include_large_deltas && identified > 0 {
            let delta = *summary
                .delta_mass()
                .as_ref()
                .map_err(|err| Rejection::Analysis(err.clone()))?;
            if delta.abs() > MAX_DELTA_MASS {
                return Err(Rejection::DeltaMass(delta));
            }
        }

        if parameters.tic_filter {
            let tic = *summary
                .annotated_tic()
                .as_ref()
                .map_err(|err| Rejection::Analysis(err.clone()))?;
            if tic < parameters.min_tic || tic > parameters.max_tic {
                return Err(Rejection::AnnotatedTic(tic));
            }
        }

        if !parameters.species.is_empty() {
            let mut tags = cluster.spectra().iter().flat_map(|s| s.species_tags()).peekable();
            if tags.peek().is_some() && !tags.any(|tag| parameters.species.contains(tag)) {
                return Err(Rejection::Species);
            }
        }

        match &self.proteins {
            None => Ok(None),
            Some(proteins) => {
                let sequence = summary.sequence();
                let protein = self
                    .protein_cache
                    .entry(sequence.to_string())
                    .or_insert_with(|| {
                        proteins
                            .find_protein(sequence)
                            .map(|protein| protein.header.clone())
                    })
                    .clone();
                protein.map(Some).ok_or(Rejection::Protein)
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        analysis::AnalysisContext,
        cluster::{Cluster, Modification, PeptideSpectrumMatch, SpectrumReference},
        fasta::Protein,
        fragment::BackboneFragmenter,
        ontology::ModificationDatabase,
    };

    fn spectrum(sequence: &str, species: Option<&str>) -> SpectrumReference {
        SpectrumReference::new(
            "P;A;1".to_string(),
            305.17,
            2,
            species.map(ToString::to_string),
            !sequence.is_empty(),
            if sequence.is_empty() {
                Vec::new()
            } else {
                vec![PeptideSpectrumMatch::new(sequence.to_string(), Vec::new())]
            },
        )
    }

    fn cluster(spectra: Vec<SpectrumReference>) -> Cluster {
        Cluster::new(
            Some("c".to_string()),
            305.17,
            vec![129.109, 406.148, 250.0],
            vec![1.0, 3.0, 4.0],
            spectra,
        )
    }

    fn decide(filter: &mut ExportFilter, cluster: &Cluster) -> FilterDecision {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let summary =
            ClusterSummary::analyse(cluster, AnalysisContext::new(&database, &fragmenter));
        filter.evaluate(&summary)
    }

    #[test]
    fn default_accepts() {
        let mut filter = ExportFilter::new(FilterParameters::default(), None);
        assert_eq!(
            decide(&mut filter, &cluster(vec![spectrum("KNYGK", None)])),
            FilterDecision::Accepted { protein: None }
        );
    }

    #[test]
    fn size_and_ratio() {
        let mut filter = ExportFilter::new(FilterParameters::default().size(2, 10), None);
        assert_eq!(
            decide(&mut filter, &cluster(vec![spectrum("KNYGK", None)])),
            FilterDecision::Rejected(Rejection::Size(1))
        );
        let mut filter = ExportFilter::new(FilterParameters::default().ratio(0.9, 1.0), None);
        assert!(matches!(
            decide(
                &mut filter,
                &cluster(vec![spectrum("KNYGK", None), spectrum("GGGGG", None)])
            ),
            FilterDecision::Rejected(Rejection::Ratio(_))
        ));
    }

    #[test]
    fn unidentified_needs_disabled_tic() {
        let unidentified = cluster(vec![spectrum("", None)]);
        let mut filter = ExportFilter::new(FilterParameters::default(), None);
        assert!(matches!(
            decide(&mut filter, &unidentified),
            FilterDecision::Rejected(Rejection::Analysis(AnalysisError::AnnotationUnavailable(_)))
        ));
        let mut filter = ExportFilter::new(FilterParameters::default().tic_filter(false), None);
        assert!(decide(&mut filter, &unidentified).is_accepted());
    }

    #[test]
    fn delta_and_tic() {
        // Precursor m/z far off for KNYGK at any charge
        let shifted = Cluster::new(
            None,
            310.0,
            vec![129.109],
            vec![1.0],
            vec![spectrum("KNYGK", None)],
        );
        let mut filter = ExportFilter::new(FilterParameters::default(), None);
        assert!(matches!(
            decide(&mut filter, &shifted),
            FilterDecision::Rejected(Rejection::DeltaMass(_))
        ));
        let mut filter =
            ExportFilter::new(FilterParameters::default().include_large_deltas(true), None);
        assert!(decide(&mut filter, &shifted).is_accepted());

        let mut filter = ExportFilter::new(FilterParameters::default().tic(0.6, 1.0), None);
        assert!(matches!(
            decide(&mut filter, &cluster(vec![spectrum("KNYGK", None)])),
            FilterDecision::Rejected(Rejection::AnnotatedTic(_))
        ));
    }

    #[test]
    fn unresolved_modification_is_excluded() {
        let modified = cluster(vec![SpectrumReference::new(
            "P;A;1".to_string(),
            305.17,
            2,
            None,
            true,
            vec![PeptideSpectrumMatch::new(
                "KNYGK".to_string(),
                vec![Modification::new(3, "MOD:99999")],
            )],
        )]);
        let mut filter =
            ExportFilter::new(FilterParameters::default().include_large_deltas(true), None);
        assert!(matches!(
            decide(&mut filter, &modified),
            FilterDecision::Rejected(Rejection::Analysis(AnalysisError::AnnotationUnavailable(_)))
        ));
        let mut filter = ExportFilter::new(FilterParameters::default(), None);
        assert!(matches!(
            decide(&mut filter, &modified),
            FilterDecision::Rejected(Rejection::Analysis(
                AnalysisError::UnresolvedModification { .. }
            ))
        ));
    }

    #[test]
    fn species() {
        let mut filter = ExportFilter::new(FilterParameters::default().species(["9606"]), None);
        assert!(decide(&mut filter, &cluster(vec![spectrum("KNYGK", None)])).is_accepted());
        assert!(
            decide(
                &mut filter,
                &cluster(vec![
                    spectrum("KNYGK", Some("10090")),
                    spectrum("KNYGK", Some(" 9606 ,10116"))
                ])
            )
            .is_accepted()
        );
        assert_eq!(
            decide(&mut filter, &cluster(vec![spectrum("KNYGK", Some("10090"))])),
            FilterDecision::Rejected(Rejection::Species)
        );
    }

    #[test]
    fn protein_mapping() {
        let proteins = ProteinDatabase::new(vec![
            Protein {
                header: "first".to_string(),
                sequence: "MMMM".to_string(),
            },
            Protein {
                header: "second".to_string(),
                sequence: "AKNYGKA".to_string(),
            },
            Protein {
                header: "third".to_string(),
                sequence: "KNYGK".to_string(),
            },
        ]);
        // GGGGG does not fit the precursor, keep it to reach the protein check
        let mut filter = ExportFilter::new(
            FilterParameters::default().include_large_deltas(true),
            Some(proteins),
        );
        let knygk = cluster(vec![spectrum("KNYGK", None)]);
        assert_eq!(
            decide(&mut filter, &knygk),
            FilterDecision::Accepted {
                protein: Some("second".to_string())
            }
        );
        // Served from the cache the second time
        assert_eq!(
            decide(&mut filter, &knygk),
            FilterDecision::Accepted {
                protein: Some("second".to_string())
            }
        );
        assert_eq!(
            decide(&mut filter, &cluster(vec![spectrum("GGGGG", None)])),
            FilterDecision::Rejected(Rejection::Protein)
        );
    }
}
