//! The symbolic modification names used in MSP spectral libraries.

use std::{fs::File, io::BufReader, path::Path};

use context_error::*;
use serde::{Deserialize, Serialize};

/// Translate a modification mass delta into the name SpectraST expects in MSP files. Entries are
/// searched in order, so for names that share a mass the first entry wins.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ModificationNameTable {
    /// The names and their monoisotopic mass deltas
    pub entries: Vec<(String, f64)>,
    /// The maximal absolute difference (exclusive) between a delta and a table entry (Da)
    pub tolerance: f64,
}

impl ModificationNameTable {
    /// The default tolerance (Da)
    pub const DEFAULT_TOLERANCE: f64 = 0.01;

    /// Set the tolerance
    #[must_use]
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Find the name for the given monoisotopic delta
    pub fn name_for_delta(&self, delta: f64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, mass)| (mass - delta).abs() < self.tolerance)
            .map(|(name, _)| name.as_str())
    }

    /// Load a table from a JSON file containing a list of `[name, mass]` pairs, the tolerance is
    /// set to the default.
    /// # Errors
    /// If the file could not be opened or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BoxedError<'static, BasicKind>> {
        let path = path.as_ref();
        let context = || Context::default().source(path.to_string_lossy()).to_owned();
        let file = File::open(path).map_err(|err| {
            BoxedError::new(
                BasicKind::Error,
                "Could not open modification name table",
                err.to_string(),
                context(),
            )
        })?;
        let entries: Vec<(String, f64)> =
            serde_json::from_reader(BufReader::new(file)).map_err(|err| {
                BoxedError::new(
                    BasicKind::Error,
                    "Invalid modification name table",
                    format!("The JSON could not be parsed: {err}"),
                    context(),
                )
            })?;
        Ok(Self {
            entries,
            tolerance: Self::DEFAULT_TOLERANCE,
        })
    }
}

impl Default for ModificationNameTable {
    fn default() -> Self {
        Self {
            entries: SPECTRAST_NAMES
                .iter()
                .map(|(name, mass)| ((*name).to_string(), *mass))
                .collect(),
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// Legacy SpectraST names come before their PSI counterparts
const SPECTRAST_NAMES: &[(&str, f64)] = &[
    ("ICAT_light", 227.126991),
    ("ICAT-C", 227.126991),
    ("ICAT_heavy", 236.157185),
    ("ICAT-C:13C(9)", 236.157185),
    ("AB_old_ICATd0", 442.224991),
    ("ICAT-D", 442.224991),
    ("AB_old_ICATd8", 450.275205),
    ("ICAT-D:2H(8)", 450.275205),
    ("Carbamidomethyl", 57.021464),
    ("Carboxymethyl", 58.005479),
    ("Propionamide", 71.037114),
    ("Propionamide:2H(3)", 74.055944),
    ("Propionamide:13C(3)", 74.047178),
    ("Oxidation", 15.99491),
    ("Acetyl", 42.010565),
    ("Deamidation", 0.984016),
    ("Deamidated", 0.984016),
    ("Pyro-cmC", 39.994915),
    ("Pyro-carbamidomethyl", 39.994915),
    ("Pyro-glu", -17.026549),
    ("Gln->pyro-Glu", -17.026549),
    ("Pyro_glu", -18.010565),
    ("Glu->pyro-Glu", -18.010565),
    ("Amide", -0.984016),
    ("Amidated", -0.984016),
    ("Phospho", 79.966331),
    ("Thiophospho", 95.943487),
    ("Sulfo", 79.956815),
    ("Methyl", 14.01565),
    ("Carbamyl", 43.005814),
    ("iTRAQ4plex", 144.102063),
    ("iTRAQ4plexAcetyl", 186.112628),
    ("iTRAQ8plex:13C(6)15N(2)", 304.19904),
    ("iTRAQ8plex", 304.20536),
    ("TMT6plex", 229.162932),
    ("PEO-Iodoacetyl-LC-Biotin", 414.52),
    ("Label:2H(3)", 3.01883),
    ("Label:2H(4)", 4.025107),
    ("Label:13C(6)", 6.020129),
    ("Label:13C(6)15N(1)", 7.017165),
    ("Label:13C(6)15N(2)", 8.014199),
    ("Label:13C(6)15N(3)", 9.011235),
    ("Label:13C(6)15N(4)", 10.008269),
    ("Methylthio", 45.987721),
    ("Leucyl", 113.08406),
    ("Leucyl:13C(6)15N(1)", 120.101224),
    ("Nitro", 44.985078),
    ("Dimethyl", 28.0313),
    ("Trimethyl", 42.04695),
    ("Bromo", 77.910511),
    ("SUMO_1", 2135.920495),
    ("SUMO_2_3_Tryp", 3549.536567),
    ("Smt3_R93A_Tryp", 3812.747563),
    ("Smt3_R93A_LysC", 4544.074787),
    ("NEDD8_LysC", 1555.956231),
    ("Rub1_LysC", 2454.341699),
    ("Ub_LysC", 1431.831075),
    ("GlyGly", 114.042927),
    ("Formyl", 27.994915),
];
