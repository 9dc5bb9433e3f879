//! Match theoretical fragments to the peaks of a consensus spectrum.
//!
//! Both the peaks and the ions are walked in m/z order with a single forward cursor, so matching is
//! linear in the number of peaks plus ions. The cursors are plain values that are passed in and
//! handed back, so the caller decides their lifetime.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::Cluster,
    error::AnalysisError,
    fragment::{IonType, ProductIon},
};

/// The tolerance (Th) used to determine the annotated fraction of the ion current
pub const TIC_TOLERANCE: f64 = 0.5;
/// The tolerance (Th) used for MSP peak annotations
pub const PEAK_ANNOTATION_TOLERANCE: f64 = 0.8;

/// A position in a sorted list of peaks
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PeakCursor(usize);

/// A position in a sorted list of product ions
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IonCursor(usize);

/// The peaks of a cluster without sentinels, sorted on m/z, as (original index, mz, intensity)
pub fn sorted_peaks(cluster: &Cluster) -> Vec<(usize, f64, f64)> {
    let mut peaks: Vec<_> = cluster.peaks().collect();
    peaks.sort_by_key(|(_, mz, intensity)| (OrderedFloat(*mz), OrderedFloat(*intensity)));
    peaks
}

/// Find the first peak at or after the cursor that lies within the tolerance of the given m/z.
/// Peaks below the window are skipped for good, a matched peak is consumed. Returns the index of
/// the matched peak (into `peaks`) and the new cursor.
pub fn match_ion(
    peaks: &[(usize, f64, f64)],
    mz: f64,
    tolerance: f64,
    cursor: PeakCursor,
) -> (Option<usize>, PeakCursor) {
    let mut index = cursor.0;
    while index < peaks.len() && peaks[index].1 < mz - tolerance {
        index += 1;
    }
    if index < peaks.len() && peaks[index].1 <= mz + tolerance {
        (Some(index), PeakCursor(index + 1))
    } else {
        (None, PeakCursor(index))
    }
}

/// The fraction of the total ion current of the cluster that is explained by b and y ions.
/// # Errors
/// When the cluster has inconsistent peak lists or has no intensity at all.
pub fn annotated_tic(
    cluster: &Cluster,
    ions: &[ProductIon],
    tolerance: f64,
) -> Result<f64, AnalysisError> {
    if !cluster.is_consistent() {
        return Err(AnalysisError::MalformedCluster(format!(
            "{} m/z values but {} intensities",
            cluster.consensus_mz().len(),
            cluster.consensus_intensity().len()
        )));
    }
    let peaks = sorted_peaks(cluster);
    let total: f64 = peaks.iter().map(|p| p.2).sum();
    if total <= 0.0 {
        return Err(AnalysisError::AnnotationUnavailable(
            "the consensus spectrum has no intensity".to_string(),
        ));
    }

    let mut cursor = PeakCursor::default();
    let mut annotated = 0.0;
    for ion in ions
        .iter()
        .filter(|ion| matches!(ion.kind, IonType::B | IonType::Y))
    {
        let (matched, next) = match_ion(&peaks, ion.mz, tolerance, cursor);
        if let Some(index) = matched {
            annotated += peaks[index].2;
        }
        cursor = next;
    }
    Ok(annotated / total)
}

/// Creates the MSP annotation string for each peak of a consensus spectrum
#[derive(Clone, Debug)]
pub struct PeakAnnotator<'a> {
    ions: &'a [ProductIon],
    precursor_mz: f64,
    peak_count: String,
    tolerance: f64,
}

impl<'a> PeakAnnotator<'a> {
    /// Create an annotator. The ions should be sorted on m/z, the peak count is the
    /// `<correct>/<minimum>` label added to every annotation.
    pub fn new(ions: &'a [ProductIon], precursor_mz: f64, peak_count: String) -> Self {
        Self {
            ions,
            precursor_mz,
            peak_count,
            tolerance: PEAK_ANNOTATION_TOLERANCE,
        }
    }

    /// Set the tolerance
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Annotate the peak at the given m/z. Peaks have to be presented in increasing m/z order with
    /// the cursor returned by the previous call, any ion that is used as candidate for a peak is
    /// not available for later peaks.
    pub fn annotate(&self, mz: f64, cursor: IonCursor) -> (String, IonCursor) {
        let parent = (mz > self.precursor_mz - self.tolerance
            && mz < self.precursor_mz + self.tolerance)
            .then(|| {
                format!(
                    "p/{:.2} {} 1.0",
                    self.precursor_mz - mz,
                    self.peak_count
                )
            });

        let mut index = cursor.0;
        let mut candidates = Vec::new();
        while let Some(ion) = self.ions.get(index) {
            if ion.mz < mz - self.tolerance {
                index += 1;
            } else if ion.mz > mz + self.tolerance {
                break;
            } else {
                candidates.push(ion);
                index += 1;
            }
        }
        let cursor = IonCursor(index);

        if let Some(parent) = parent {
            return (parent, cursor);
        }
        let best = candidates
            .iter()
            .find(|i| i.kind == IonType::Y && i.charge == 1)
            .or_else(|| {
                candidates
                    .iter()
                    .find(|i| i.kind == IonType::B && i.charge == 1)
            })
            .or_else(|| candidates.iter().find(|i| i.kind == IonType::Y))
            .or_else(|| candidates.iter().find(|i| i.kind == IonType::B))
            .or_else(|| candidates.first());
        let annotation = best.map_or_else(
            || format!("? {} 0.5", self.peak_count),
            |ion| {
                let charge = if ion.charge > 1 {
                    format!("^{}", ion.charge)
                } else {
                    String::new()
                };
                format!(
                    "{}{}{charge}/{:.2} {} 1.0",
                    ion.kind,
                    ion.position,
                    ion.mz - mz,
                    self.peak_count
                )
            },
        );
        (annotation, cursor)
    }

    /// Annotate all given peaks, the result is in the same order as the input
    pub fn annotate_all(&self, peaks: &[(usize, f64, f64)]) -> Vec<String> {
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by_key(|index| OrderedFloat(peaks[*index].1));
        let mut annotations = vec![String::new(); peaks.len()];
        let mut cursor = IonCursor::default();
        for index in order {
            let (annotation, next) = self.annotate(peaks[index].1, cursor);
            annotations[index] = annotation;
            cursor = next;
        }
        annotations
    }
}

/// Serialisable summary of a single match, useful for diagnostics
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct MatchedPeak {
    /// The peak m/z
    pub mz: f64,
    /// The peak intensity
    pub intensity: f64,
    /// The matched ion
    pub ion: ProductIon,
}

/// List all peaks that are matched to an ion, using the same first fit strategy as
/// [`annotated_tic`] but considering all ion types.
pub fn matched_peaks(cluster: &Cluster, ions: &[ProductIon], tolerance: f64) -> Vec<MatchedPeak> {
    let peaks = sorted_peaks(cluster);
    let mut cursor = PeakCursor::default();
    let mut matches = Vec::new();
    for ion in ions {
        let (matched, next) = match_ion(&peaks, ion.mz, tolerance, cursor);
        if let Some(index) = matched {
            matches.push(MatchedPeak {
                mz: peaks[index].1,
                intensity: peaks[index].2,
                ion: *ion,
            });
        }
        cursor = next;
    }
    matches
}
