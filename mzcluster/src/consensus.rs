//! Find the majority identification of a cluster.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::Cluster,
    helper_functions::{clean_sequence, leucine_agnostic},
};

/// The majority identification of a cluster
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Consensus {
    /// The winning sequence as first seen in the cluster (I and L kept as given)
    pub sequence: String,
    /// The number of identified spectra supporting the winning sequence
    pub count: usize,
    /// The fraction of identified spectra supporting the winning sequence
    pub spectrum_ratio: f64,
    /// The fraction of all PSMs of the identified spectra that match the winning sequence
    pub psm_ratio: f64,
    /// The runner up sequence and its count
    pub second: Option<(String, usize)>,
    /// The third sequence and its count
    pub third: Option<(String, usize)>,
}

impl Consensus {
    /// Determine the consensus of the given cluster. Every identified spectrum votes with the
    /// cleaned sequence of its most common PSM, votes are grouped with I and L considered equal.
    /// The largest group wins, ties are broken by taking the alphabetically first group. Returns
    /// `None` if the cluster has no identified spectra.
    pub fn resolve(cluster: &Cluster) -> Option<Self> {
        // Grouping key -> (first seen sequence, votes)
        let mut groups: IndexMap<String, (String, usize)> = IndexMap::new();
        for spectrum in cluster.identified_spectra() {
            if let Some(psm) = spectrum.most_common_psm() {
                let sequence = psm.sequence();
                groups
                    .entry(leucine_agnostic(&sequence))
                    .or_insert_with(|| (sequence, 0))
                    .1 += 1;
            }
        }
        let identified: usize = groups.values().map(|(_, count)| count).sum();
        if identified == 0 {
            return None;
        }

        let mut ranked = groups.into_iter().collect::<Vec<_>>();
        // Stable sort: larger counts first, then alphabetical on the grouping key
        ranked.sort_by(|(key_a, (_, a)), (key_b, (_, b))| b.cmp(a).then_with(|| key_a.cmp(key_b)));
        let mut ranked = ranked.into_iter();
        let (winner_key, (sequence, count)) = ranked.next()?;
        let second = ranked.next().map(|(_, v)| v);
        let third = ranked.next().map(|(_, v)| v);

        let (matching, total) = cluster
            .identified_spectra()
            .flat_map(|s| s.psms())
            .fold((0_usize, 0_usize), |(matching, total), psm| {
                let key = leucine_agnostic(&clean_sequence(psm.raw_sequence()));
                (matching + usize::from(key == winner_key), total + 1)
            });

        Some(Self {
            sequence,
            count,
            spectrum_ratio: count as f64 / identified as f64,
            psm_ratio: if total == 0 {
                0.0
            } else {
                matching as f64 / total as f64
            },
            second,
            third,
        })
    }

    /// The ratio selected by the given kind
    pub const fn ratio(&self, kind: RatioKind) -> f64 {
        match kind {
            RatioKind::Psm => self.psm_ratio,
            RatioKind::Spectrum => self.spectrum_ratio,
        }
    }
}

/// Which identification ratio to use
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RatioKind {
    /// The fraction of PSMs supporting the consensus
    #[default]
    Psm,
    /// The fraction of identified spectra supporting the consensus
    Spectrum,
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::cluster::{PeptideSpectrumMatch, SpectrumReference};

    fn spectrum(identified: bool, sequences: &[&str]) -> SpectrumReference {
        SpectrumReference::new(
            "P;A;1".to_string(),
            500.0,
            2,
            None,
            identified,
            sequences
                .iter()
                .map(|s| PeptideSpectrumMatch::new((*s).to_string(), Vec::new()))
                .collect(),
        )
    }

    fn cluster(spectra: Vec<SpectrumReference>) -> Cluster {
        Cluster::new(None, 500.0, Vec::new(), Vec::new(), spectra)
    }

    #[test]
    fn leucine_agnostic_majority() {
        let consensus = Consensus::resolve(&cluster(vec![
            spectrum(true, &["PEPTIDE"]),
            spectrum(true, &["PEPTLDE"]),
            spectrum(true, &["ANOTHER"]),
            spectrum(false, &["ANOTHER"]),
        ]))
        .unwrap();
        assert_eq!(consensus.sequence, "PEPTIDE");
        assert_eq!(consensus.count, 2);
        assert!((consensus.spectrum_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((consensus.psm_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(consensus.second, Some(("ANOTHER".to_string(), 1)));
        assert_eq!(consensus.third, None);
    }

    #[test]
    fn tie_break_alphabetical() {
        let consensus = Consensus::resolve(&cluster(vec![
            spectrum(true, &["YYY"]),
            spectrum(true, &["KKK"]),
            spectrum(true, &["MMM"]),
        ]))
        .unwrap();
        assert_eq!(consensus.sequence, "KKK");
        assert_eq!(consensus.second, Some(("MMM".to_string(), 1)));
        assert_eq!(consensus.third, Some(("YYY".to_string(), 1)));
    }

    #[test]
    fn psm_ratio_counts_all_psms() {
        let consensus = Consensus::resolve(&cluster(vec![
            spectrum(true, &["KNYGK", "KNYGK", "OTHER"]),
            spectrum(true, &["knygk"]),
        ]))
        .unwrap();
        assert_eq!(consensus.sequence, "KNYGK");
        assert!((consensus.spectrum_ratio - 1.0).abs() < f64::EPSILON);
        assert!((consensus.psm_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unidentified() {
        assert_eq!(
            Consensus::resolve(&cluster(vec![spectrum(false, &["PEPTIDE"]), spectrum(true, &[])])),
            None
        );
        assert_eq!(Consensus::resolve(&cluster(Vec::new())), None);
    }
}
