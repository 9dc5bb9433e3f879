//! The clustered spectra as read from a clustering result.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::helper_functions::clean_sequence;

/// A modification on a peptide, as reported by the search engine
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Modification {
    /// The 1-based position, 0 is the N-terminus and anything beyond the sequence length is the C-terminus
    pub position: usize,
    /// The ontology accession, eg `MOD:00696` or `UNIMOD:21`
    pub accession: String,
}

impl Modification {
    /// Create a new modification
    pub fn new(position: usize, accession: impl Into<String>) -> Self {
        Self {
            position,
            accession: accession.into(),
        }
    }
}

/// A single peptide identification for a spectrum
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct PeptideSpectrumMatch {
    sequence: String,
    modifications: Vec<Modification>,
}

impl PeptideSpectrumMatch {
    /// Create a new PSM, the sequence is kept as given
    pub const fn new(sequence: String, modifications: Vec<Modification>) -> Self {
        Self {
            sequence,
            modifications,
        }
    }

    /// The sequence as given in the input
    pub fn raw_sequence(&self) -> &str {
        &self.sequence
    }

    /// The sequence upper cased and with all non letters removed
    pub fn sequence(&self) -> String {
        clean_sequence(&self.sequence)
    }

    /// The modifications in input order
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }
}

/// One observed spectrum that is part of a cluster
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SpectrumReference {
    id: String,
    precursor_mz: f64,
    charge: isize,
    species: Option<String>,
    identified: bool,
    psms: Vec<PeptideSpectrumMatch>,
}

impl SpectrumReference {
    /// Create a new spectrum reference. A charge of zero or below means unknown charge.
    pub const fn new(
        id: String,
        precursor_mz: f64,
        charge: isize,
        species: Option<String>,
        identified: bool,
        psms: Vec<PeptideSpectrumMatch>,
    ) -> Self {
        Self {
            id,
            precursor_mz,
            charge,
            species,
            identified,
            psms,
        }
    }

    /// The spectrum identifier, project, assay, and spectrum separated by `;`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The precursor m/z
    pub const fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }

    /// The charge, if known
    pub const fn charge(&self) -> Option<isize> {
        if self.charge > 0 {
            Some(self.charge)
        } else {
            None
        }
    }

    /// The species as given in the input (comma separated taxonomy identifiers or names)
    pub fn species(&self) -> Option<&str> {
        self.species.as_deref()
    }

    /// All species tags, trimmed and without empty tags
    pub fn species_tags(&self) -> impl Iterator<Item = &str> {
        self.species
            .iter()
            .flat_map(|s| s.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// All PSMs for this spectrum
    pub fn psms(&self) -> &[PeptideSpectrumMatch] {
        &self.psms
    }

    /// If this spectrum is identified, this needs the flag to be set and at least one PSM
    pub fn is_identified(&self) -> bool {
        self.identified && !self.psms.is_empty()
    }

    /// The PSM whose cleaned sequence occurs most often for this spectrum, ties are broken by taking
    /// the first in input order.
    pub fn most_common_psm(&self) -> Option<&PeptideSpectrumMatch> {
        let sequences = self.psms.iter().map(PeptideSpectrumMatch::sequence).collect_vec();
        let counts = sequences.iter().counts();
        // max_by_key returns the last maximum, so iterate in reverse to keep the first
        self.psms
            .iter()
            .zip(sequences.iter())
            .rev()
            .max_by_key(|(_, s)| counts[s])
            .map(|(psm, _)| psm)
    }

    /// The project accession, the first field of the identifier
    pub fn project(&self) -> &str {
        self.id.split(';').next().unwrap_or_default()
    }

    /// The assay accession, the second field of the identifier if the identifier has all three fields
    pub fn assay(&self) -> Option<&str> {
        let fields = self.id.split(';').collect_vec();
        (fields.len() >= 3).then(|| fields[1])
    }
}

/// A cluster of spectra that are expected to originate from the same peptide ion
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Cluster {
    id: Option<String>,
    average_precursor_mz: f64,
    consensus_mz: Vec<f64>,
    consensus_intensity: Vec<f64>,
    spectra: Vec<SpectrumReference>,
}

impl Cluster {
    /// Create a new cluster, the consensus spectrum is given as parallel m/z and intensity lists
    pub const fn new(
        id: Option<String>,
        average_precursor_mz: f64,
        consensus_mz: Vec<f64>,
        consensus_intensity: Vec<f64>,
        spectra: Vec<SpectrumReference>,
    ) -> Self {
        Self {
            id,
            average_precursor_mz,
            consensus_mz,
            consensus_intensity,
            spectra,
        }
    }

    /// The cluster identifier
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The average precursor m/z of all spectra
    pub const fn average_precursor_mz(&self) -> f64 {
        self.average_precursor_mz
    }

    /// The consensus m/z values including sentinel peaks
    pub fn consensus_mz(&self) -> &[f64] {
        &self.consensus_mz
    }

    /// The consensus intensities including sentinel peaks
    pub fn consensus_intensity(&self) -> &[f64] {
        &self.consensus_intensity
    }

    /// If the m/z and intensity lists have the same length
    pub fn is_consistent(&self) -> bool {
        self.consensus_mz.len() == self.consensus_intensity.len()
    }

    /// The consensus peaks in input order as (index, mz, intensity), skipping sentinel peaks
    /// (zero m/z or zero intensity).
    pub fn peaks(&self) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        self.consensus_mz
            .iter()
            .zip(self.consensus_intensity.iter())
            .enumerate()
            .filter(|(_, (mz, intensity))| **mz != 0.0 && **intensity != 0.0)
            .map(|(index, (mz, intensity))| (index, *mz, *intensity))
    }

    /// The spectra in this cluster
    pub fn spectra(&self) -> &[SpectrumReference] {
        &self.spectra
    }

    /// The identified spectra in this cluster
    pub fn identified_spectra(&self) -> impl Iterator<Item = &SpectrumReference> {
        self.spectra.iter().filter(|s| s.is_identified())
    }

    /// The number of identified spectra
    pub fn identified_count(&self) -> usize {
        self.identified_spectra().count()
    }

    /// The number of spectra, identified or not
    pub fn spectrum_count(&self) -> usize {
        self.spectra.len()
    }

    /// The difference between the highest and lowest precursor m/z, 0 for an empty cluster
    pub fn precursor_mz_range(&self) -> f64 {
        self.spectra
            .iter()
            .map(SpectrumReference::precursor_mz)
            .minmax_by(f64::total_cmp)
            .into_option()
            .map_or(0.0, |(min, max)| max - min)
    }
}
