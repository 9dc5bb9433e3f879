//! Estimate the precursor charge and the precursor mass error of a cluster.

use serde::{Deserialize, Serialize};

use crate::{
    chemistry::{PROTON, backbone_mass},
    cluster::{Cluster, PeptideSpectrumMatch, SpectrumReference},
    error::AnalysisError,
    helper_functions::round_half_up,
    ontology::ModificationLookup,
};

/// The theoretical monoisotopic mass of the PSM, the backbone mass of the cleaned sequence plus
/// the monoisotopic deltas of all modifications.
/// # Errors
/// If any modification could not be resolved or the sequence contains an unknown residue.
pub fn theoretical_mass(
    psm: &PeptideSpectrumMatch,
    modifications: &dyn ModificationLookup,
) -> Result<f64, AnalysisError> {
    let sequence = psm.sequence();
    let backbone = backbone_mass(&sequence).map_err(|residue| {
        AnalysisError::ChargeEstimationFailure(format!(
            "Unknown residue '{residue}' in '{sequence}'"
        ))
    })?;
    psm.modifications()
        .iter()
        .try_fold(backbone, |mass, modification| {
            modifications
                .monoisotopic_delta(&modification.accession)
                .map(|delta| mass + delta)
        })
}

/// The charge that best explains the observed precursor m/z for the given mass.
/// # Errors
/// If the rounded charge is zero (or the m/z is not positive).
pub fn trial_charge(mass: f64, precursor_mz: f64) -> Result<isize, AnalysisError> {
    let charge = round_half_up(mass / precursor_mz);
    if charge.is_finite() && charge >= 1.0 {
        Ok(charge as isize)
    } else {
        Err(AnalysisError::ChargeEstimationFailure(format!(
            "A mass of {mass:.4} Da does not fit a precursor m/z of {precursor_mz:.4}"
        )))
    }
}

/// The difference between the theoretical m/z at the given charge and the observed m/z
pub fn delta_mass(mass: f64, charge: isize, precursor_mz: f64) -> f64 {
    let z = charge as f64;
    z.mul_add(PROTON, mass) / z - precursor_mz
}

/// A candidate PSM for a cluster with its own charge and mass error
#[derive(Clone, Debug, PartialEq)]
pub struct RepresentativeMatch<'a> {
    /// The PSM
    pub psm: &'a PeptideSpectrumMatch,
    /// The charge as derived from the theoretical mass of the PSM
    pub charge: Result<isize, AnalysisError>,
    /// The precursor mass error at that charge
    pub delta_mass: Result<f64, AnalysisError>,
}

impl<'a> RepresentativeMatch<'a> {
    /// Evaluate a single PSM against the cluster precursor m/z
    pub fn evaluate(
        psm: &'a PeptideSpectrumMatch,
        precursor_mz: f64,
        modifications: &dyn ModificationLookup,
    ) -> Self {
        let mass = theoretical_mass(psm, modifications);
        let charge = mass
            .clone()
            .and_then(|mass| trial_charge(mass, precursor_mz));
        let delta_mass = match (&mass, &charge) {
            (Ok(mass), Ok(charge)) => Ok(delta_mass(*mass, *charge, precursor_mz)),
            (Err(err), _) | (_, Err(err)) => Err(err.clone()),
        };
        Self {
            psm,
            charge,
            delta_mass,
        }
    }

    /// Find the PSM that best represents the given sequence in this cluster. All PSMs (of all
    /// spectra) with exactly this cleaned sequence are candidates, the one with the smallest
    /// absolute mass error wins. If no candidate has a mass error the first candidate is returned.
    /// Returns `None` if there are no candidates.
    pub fn select(
        cluster: &'a Cluster,
        sequence: &str,
        modifications: &dyn ModificationLookup,
    ) -> Option<Self> {
        let mut best: Option<Self> = None;
        for psm in cluster
            .spectra()
            .iter()
            .flat_map(|s| s.psms())
            .filter(|psm| psm.sequence() == sequence)
        {
            let candidate = Self::evaluate(psm, cluster.average_precursor_mz(), modifications);
            best = match best {
                None => Some(candidate),
                Some(current) => match (&current.delta_mass, &candidate.delta_mass) {
                    (Err(_), Ok(_)) => Some(candidate),
                    (Ok(a), Ok(b)) if b.abs() < a.abs() => Some(candidate),
                    _ => Some(current),
                },
            };
        }
        best
    }
}

/// The estimated charge of a cluster
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ChargeEstimate {
    /// The charge, 0 if it could not be determined
    pub charge: isize,
    /// If this charge is the rounded average of the spectrum charges instead of derived from
    /// the representative PSM
    pub averaged: bool,
}

impl ChargeEstimate {
    /// Use the charge of the representative PSM if available, otherwise fall back on
    /// [`Self::averaged`].
    pub fn estimate(cluster: &Cluster, representative: Option<&RepresentativeMatch<'_>>) -> Self {
        match representative.map(|r| &r.charge) {
            Some(Ok(charge)) => Self {
                charge: *charge,
                averaged: false,
            },
            _ => Self::averaged(cluster),
        }
    }

    /// The average of all known spectrum charges rounded half up, 0 if no spectrum has a known
    /// charge.
    pub fn averaged(cluster: &Cluster) -> Self {
        let (sum, count) = cluster
            .spectra()
            .iter()
            .filter_map(SpectrumReference::charge)
            .fold((0_isize, 0_u32), |(sum, count), charge| (sum + charge, count + 1));
        Self {
            charge: if count == 0 {
                0
            } else {
                round_half_up(sum as f64 / f64::from(count)) as isize
            },
            averaged: true,
        }
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        cluster::Modification,
        error::UnresolvedReason,
        ontology::{ModificationDatabase, ModificationEntry},
    };

    fn spectrum(charge: isize, psms: Vec<PeptideSpectrumMatch>) -> SpectrumReference {
        SpectrumReference::new("P;A;1".to_string(), 305.17, charge, None, true, psms)
    }

    #[test]
    fn knygk_doubly_charged() {
        let database = ModificationDatabase::default();
        let psm = PeptideSpectrumMatch::new("KNYGK".to_string(), Vec::new());
        let mass = theoretical_mass(&psm, &database).unwrap();
        assert_eq!(trial_charge(mass, 305.17).unwrap(), 2);
        let representative = RepresentativeMatch::evaluate(&psm, 305.17, &database);
        let delta = representative.delta_mass.unwrap();
        assert!((delta - 0.00137).abs() < 1e-3, "{delta}");
    }

    #[test]
    fn zero_charge() {
        assert!(matches!(
            trial_charge(100.0, 500.0),
            Err(AnalysisError::ChargeEstimationFailure(_))
        ));
        assert!(trial_charge(100.0, 0.0).is_err());
    }

    #[test]
    fn unresolved_modification() {
        let database = ModificationDatabase::default();
        let psm = PeptideSpectrumMatch::new(
            "KNYGK".to_string(),
            vec![Modification::new(1, "MOD:99999")],
        );
        assert_eq!(
            theoretical_mass(&psm, &database),
            Err(AnalysisError::UnresolvedModification {
                accession: "MOD:99999".to_string(),
                reason: UnresolvedReason::NotFound
            })
        );
    }

    #[test]
    fn select_smallest_delta() {
        let database = ModificationDatabase::default();
        let cluster = Cluster::new(
            None,
            305.17,
            Vec::new(),
            Vec::new(),
            vec![
                spectrum(
                    2,
                    vec![PeptideSpectrumMatch::new(
                        "KNYGK".to_string(),
                        vec![Modification::new(3, "MOD:00696")],
                    )],
                ),
                spectrum(2, vec![PeptideSpectrumMatch::new("KNYGK".to_string(), Vec::new())]),
                spectrum(2, vec![PeptideSpectrumMatch::new("OTHER".to_string(), Vec::new())]),
            ],
        );
        let representative = RepresentativeMatch::select(&cluster, "KNYGK", &database).unwrap();
        assert!(representative.psm.modifications().is_empty());
        let estimate = ChargeEstimate::estimate(&cluster, Some(&representative));
        assert_eq!(
            estimate,
            ChargeEstimate {
                charge: 2,
                averaged: false
            }
        );
        assert!(RepresentativeMatch::select(&cluster, "MISSING", &database).is_none());
    }

    #[test]
    fn averaging_fallback() {
        let mut database = ModificationDatabase::default();
        database.insert(ModificationEntry::new("MOD:00000", "protein modification", None, None));
        let cluster = Cluster::new(
            None,
            305.17,
            Vec::new(),
            Vec::new(),
            vec![
                spectrum(
                    2,
                    vec![PeptideSpectrumMatch::new(
                        "KNYGK".to_string(),
                        vec![Modification::new(1, "MOD:00000")],
                    )],
                ),
                spectrum(3, Vec::new()),
                spectrum(0, Vec::new()),
            ],
        );
        let representative = RepresentativeMatch::select(&cluster, "KNYGK", &database).unwrap();
        assert!(representative.delta_mass.is_err());
        assert_eq!(
            ChargeEstimate::estimate(&cluster, Some(&representative)),
            ChargeEstimate {
                charge: 3,
                averaged: true
            }
        );
        let empty = Cluster::new(None, 1.0, Vec::new(), Vec::new(), vec![spectrum(0, Vec::new())]);
        assert_eq!(ChargeEstimate::averaged(&empty).charge, 0);
    }
}
