//! Derive everything that is needed to filter and export a cluster in one place.

use std::collections::{BTreeSet, HashSet};

use crate::{
    annotation::{TIC_TOLERANCE, annotated_tic},
    charge::{ChargeEstimate, RepresentativeMatch},
    cluster::{Cluster, PeptideSpectrumMatch},
    consensus::Consensus,
    error::AnalysisError,
    fragment::{FragmentGenerator, PlacedModification, ProductIon},
    helper_functions::round_half_up,
    ontology::ModificationLookup,
};

/// The collaborators needed to analyse a cluster, these are built once per run
#[derive(Clone, Copy)]
pub struct AnalysisContext<'a> {
    modifications: &'a dyn ModificationLookup,
    fragmenter: &'a dyn FragmentGenerator,
}

impl std::fmt::Debug for AnalysisContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext").finish_non_exhaustive()
    }
}

impl<'a> AnalysisContext<'a> {
    /// Create a new context
    pub fn new(
        modifications: &'a dyn ModificationLookup,
        fragmenter: &'a dyn FragmentGenerator,
    ) -> Self {
        Self {
            modifications,
            fragmenter,
        }
    }

    /// The modification lookup
    pub fn modifications(&self) -> &'a dyn ModificationLookup {
        self.modifications
    }

    /// The fragment generator
    pub fn fragmenter(&self) -> &'a dyn FragmentGenerator {
        self.fragmenter
    }
}

/// The minimal number of identified spectra for a cluster to be considered stable
const STABLE_MIN_IDENTIFIED: usize = 10;
/// The minimal spectrum ratio for a cluster to be considered stable
const STABLE_MIN_RATIO: f64 = 0.7;

/// All derived information of a cluster. This is computed once per cluster and is shared between
/// the export filter and all writers.
#[derive(Clone, Debug)]
pub struct ClusterSummary<'a> {
    cluster: &'a Cluster,
    consensus: Option<Consensus>,
    representative: Option<RepresentativeMatch<'a>>,
    charge: ChargeEstimate,
    delta_mass: Result<f64, AnalysisError>,
    product_ions: Result<Vec<ProductIon>, AnalysisError>,
    annotated_tic: Result<f64, AnalysisError>,
    projects: usize,
    assays: usize,
    species: BTreeSet<String>,
}

impl<'a> ClusterSummary<'a> {
    /// Analyse the given cluster
    pub fn analyse(cluster: &'a Cluster, context: AnalysisContext<'_>) -> Self {
        let consensus = Consensus::resolve(cluster);
        let representative = consensus.as_ref().and_then(|c| {
            RepresentativeMatch::select(cluster, &c.sequence, context.modifications())
        });
        let charge = ChargeEstimate::estimate(cluster, representative.as_ref());
        let delta_mass = representative
            .as_ref()
            .map_or(Err(AnalysisError::Unidentified), |r| r.delta_mass.clone());

        let product_ions = match (&consensus, &representative) {
            (Some(consensus), Some(representative)) => place_modifications(
                representative.psm,
                consensus.sequence.len(),
                context.modifications(),
            )
            .and_then(|placed| {
                context.fragmenter().theoretical_ions(
                    &consensus.sequence,
                    &placed,
                    charge.charge.max(1) as usize,
                )
            }),
            _ => Err(AnalysisError::Unidentified),
        };
        let annotated_tic = match &product_ions {
            Ok(ions) => annotated_tic(cluster, ions, TIC_TOLERANCE),
            Err(AnalysisError::Unidentified) => Err(AnalysisError::AnnotationUnavailable(
                "there is no representative PSM".to_string(),
            )),
            Err(err) => Err(AnalysisError::AnnotationUnavailable(err.to_string())),
        };

        let projects = cluster
            .spectra()
            .iter()
            .map(|s| s.project())
            .collect::<HashSet<_>>()
            .len();
        let assays = cluster
            .spectra()
            .iter()
            .map(|s| s.assay().unwrap_or("Unknown"))
            .collect::<HashSet<_>>()
            .len();
        let species = cluster
            .spectra()
            .iter()
            .flat_map(|s| s.species_tags())
            .map(ToString::to_string)
            .collect();

        log::debug!(
            "Cluster {}: consensus {:?}, charge {}{}, delta {:?}, annotated TIC {:?}",
            cluster.id().unwrap_or("-"),
            consensus.as_ref().map(|c| c.sequence.as_str()),
            charge.charge,
            if charge.averaged { " (averaged)" } else { "" },
            delta_mass,
            annotated_tic,
        );

        Self {
            cluster,
            consensus,
            representative,
            charge,
            delta_mass,
            product_ions,
            annotated_tic,
            projects,
            assays,
            species,
        }
    }

    /// The cluster this summary describes
    pub const fn cluster(&self) -> &'a Cluster {
        self.cluster
    }

    /// The consensus identification, `None` if no spectrum is identified
    pub const fn consensus(&self) -> Option<&Consensus> {
        self.consensus.as_ref()
    }

    /// The consensus sequence, empty if no spectrum is identified
    pub fn sequence(&self) -> &str {
        self.consensus.as_ref().map_or("", |c| c.sequence.as_str())
    }

    /// The PSM that represents the consensus
    pub fn representative(&self) -> Option<&'a PeptideSpectrumMatch> {
        self.representative.as_ref().map(|r| r.psm)
    }

    /// The estimated charge
    pub const fn charge(&self) -> ChargeEstimate {
        self.charge
    }

    /// The precursor mass error of the representative PSM
    pub const fn delta_mass(&self) -> &Result<f64, AnalysisError> {
        &self.delta_mass
    }

    /// The theoretical fragments of the representative PSM, sorted on m/z
    pub const fn product_ions(&self) -> &Result<Vec<ProductIon>, AnalysisError> {
        &self.product_ions
    }

    /// The fraction of the ion current explained by b and y ions
    pub const fn annotated_tic(&self) -> &Result<f64, AnalysisError> {
        &self.annotated_tic
    }

    /// The number of identified spectra supporting the consensus, 0 if there is no consensus
    pub fn consensus_count(&self) -> usize {
        self.consensus.as_ref().map_or(0, |c| c.count)
    }

    /// The `<correct>/<minimum>` label used in MSP annotations, where the minimum is 70% of the
    /// spectra in the cluster.
    pub fn peak_count_label(&self) -> String {
        format!(
            "{}/{}",
            self.consensus_count(),
            round_half_up(self.cluster.spectrum_count() as f64 * 0.7) as usize
        )
    }

    /// The number of distinct projects contributing spectra
    pub const fn projects(&self) -> usize {
        self.projects
    }

    /// The number of distinct assays contributing spectra
    pub const fn assays(&self) -> usize {
        self.assays
    }

    /// All species tags in the cluster
    pub const fn species(&self) -> &BTreeSet<String> {
        &self.species
    }

    /// A cluster is stable if it has at least 10 identified spectra and more than 70% of those
    /// agree on the consensus.
    pub fn is_stable(&self) -> bool {
        self.cluster.identified_count() >= STABLE_MIN_IDENTIFIED
            && self
                .consensus
                .as_ref()
                .is_some_and(|c| c.spectrum_ratio > STABLE_MIN_RATIO)
    }
}

/// Resolve the modifications of the PSM to residue indices for fragmentation. Terminal
/// modifications are placed on the first or last residue.
/// # Errors
/// If any modification does not resolve to a monoisotopic delta.
fn place_modifications(
    psm: &PeptideSpectrumMatch,
    length: usize,
    modifications: &dyn ModificationLookup,
) -> Result<Vec<PlacedModification>, AnalysisError> {
    psm.modifications()
        .iter()
        .map(|modification| {
            modifications
                .monoisotopic_delta(&modification.accession)
                .map(|delta| PlacedModification {
                    index: modification
                        .position
                        .saturating_sub(1)
                        .min(length.saturating_sub(1)),
                    delta,
                })
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        cluster::{Modification, SpectrumReference},
        fragment::BackboneFragmenter,
        ontology::ModificationDatabase,
    };

    fn spectrum(id: &str, identified: bool, psms: &[&str]) -> SpectrumReference {
        SpectrumReference::new(
            id.to_string(),
            305.17,
            2,
            Some("9606".to_string()),
            identified,
            psms.iter()
                .map(|s| PeptideSpectrumMatch::new((*s).to_string(), Vec::new()))
                .collect(),
        )
    }

    #[test]
    fn knygk() {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let context = AnalysisContext::new(&database, &fragmenter);
        let cluster = Cluster::new(
            Some("c1".to_string()),
            305.17,
            vec![129.109, 406.148, 250.0],
            vec![1.0, 3.0, 4.0],
            vec![
                spectrum("PXD1;a.xml;1", true, &["KNYGK"]),
                spectrum("PXD1;b.xml;2", true, &["KNYGK"]),
                spectrum("PXD2;c.xml;3", false, &[]),
            ],
        );
        let summary = ClusterSummary::analyse(&cluster, context);
        assert_eq!(summary.sequence(), "KNYGK");
        assert_eq!(summary.charge().charge, 2);
        assert!(!summary.charge().averaged);
        assert!(summary.delta_mass().as_ref().unwrap().abs() < 0.01);
        assert!((summary.annotated_tic().as_ref().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(summary.peak_count_label(), "2/2");
        assert_eq!(summary.projects(), 2);
        assert_eq!(summary.assays(), 3);
        assert_eq!(summary.species().len(), 1);
        assert!(!summary.is_stable());
    }

    #[test]
    fn unidentified() {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let context = AnalysisContext::new(&database, &fragmenter);
        let cluster = Cluster::new(
            None,
            305.17,
            vec![100.0],
            vec![1.0],
            vec![spectrum("P;A;1", false, &["KNYGK"])],
        );
        let summary = ClusterSummary::analyse(&cluster, context);
        assert!(summary.consensus().is_none());
        assert!(summary.representative().is_none());
        assert_eq!(summary.charge(), ChargeEstimate { charge: 2, averaged: true });
        assert_eq!(summary.delta_mass(), &Err(AnalysisError::Unidentified));
        assert!(matches!(
            summary.annotated_tic(),
            Err(AnalysisError::AnnotationUnavailable(_))
        ));
        assert_eq!(summary.peak_count_label(), "0/1");
    }

    #[test]
    fn stable() {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let context = AnalysisContext::new(&database, &fragmenter);
        let spectra = (0..10)
            .map(|i| spectrum(&format!("P;A;{i}"), true, &["KNYGK"]))
            .collect();
        let cluster = Cluster::new(None, 305.17, Vec::new(), Vec::new(), spectra);
        assert!(ClusterSummary::analyse(&cluster, context).is_stable());
    }

    #[test]
    fn terminal_modifications() {
        let database = ModificationDatabase::default();
        let psm = PeptideSpectrumMatch::new(
            "KNYGK".to_string(),
            vec![
                Modification::new(0, "UNIMOD:1"),
                Modification::new(6, "UNIMOD:2"),
            ],
        );
        let placed = place_modifications(&psm, 5, &database).unwrap();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].index, 0);
        assert_eq!(placed[1].index, 4);
    }

    #[test]
    fn unresolved_modification_has_no_annotation() {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let context = AnalysisContext::new(&database, &fragmenter);
        let cluster = Cluster::new(
            None,
            305.17,
            vec![129.109, 406.148],
            vec![1.0, 1.0],
            vec![SpectrumReference::new(
                "P;A;1".to_string(),
                305.17,
                2,
                None,
                true,
                vec![PeptideSpectrumMatch::new(
                    "KNYGK".to_string(),
                    vec![Modification::new(3, "MOD:99999")],
                )],
            )],
        );
        let summary = ClusterSummary::analyse(&cluster, context);
        assert_eq!(summary.sequence(), "KNYGK");
        assert!(matches!(
            summary.delta_mass(),
            Err(AnalysisError::UnresolvedModification { .. })
        ));
        assert!(summary.product_ions().is_err());
        assert!(matches!(
            summary.annotated_tic(),
            Err(AnalysisError::AnnotationUnavailable(reason)) if reason.contains("MOD:99999")
        ));
    }
}
