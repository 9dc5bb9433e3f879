//! Monoisotopic masses of the building blocks of peptides.

use mzcore::{chemistry::AmbiguousMolecule, sequence::AminoAcid};

/// The mass of a proton (Da)
pub const PROTON: f64 = 1.007_276_466_621;
/// The monoisotopic mass of water (Da)
pub const WATER: f64 = 18.010_564_686_3;
/// The monoisotopic mass of carbon monoxide (Da), the difference between a and b ions
pub const CARBON_MONOXIDE: f64 = 27.994_915;
/// The monoisotopic mass of ammonia (Da), the difference between c and b ions
pub const AMMONIA: f64 = 17.026_549;
/// The shift from a y ion to an x ion (CO minus H2)
pub(crate) const Y_TO_X: f64 = 25.979_265;
/// The shift from a y ion to a z• ion (NH3 minus H)
pub(crate) const Y_TO_Z: f64 = -16.018_724;

/// Get the monoisotopic residue mass of the given amino acid (one letter code, case insensitive).
/// Returns `None` for letters that do not define a single unambiguous residue (B, X, Z).
pub fn residue_mass(residue: char) -> Option<f64> {
    match AminoAcid::try_from(residue) {
        Ok(AminoAcid::Unknown) | Err(()) => None,
        Ok(amino_acid) => amino_acid
            .formulas()
            .single()
            .map(|formula| formula.monoisotopic_mass().value),
    }
}

/// The unmodified monoisotopic mass of a full peptide: the sum of its residues plus water.
/// # Errors
/// The first residue without a defined mass.
pub fn backbone_mass(sequence: &str) -> Result<f64, char> {
    sequence
        .chars()
        .try_fold(WATER, |acc, c| residue_mass(c).map(|m| acc + m).ok_or(c))
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn backbone() {
        let mass = backbone_mass("KNYGK").unwrap();
        assert!((mass - 608.3282).abs() < 1e-3, "{mass}");
        assert_eq!(backbone_mass("PEPTXDE"), Err('X'));
        assert!((backbone_mass("").unwrap() - WATER).abs() < f64::EPSILON);
    }

    #[test]
    fn leucine_isoleucine() {
        assert_eq!(residue_mass('I'), residue_mass('L'));
        assert_eq!(residue_mass('k'), residue_mass('K'));
        assert_eq!(residue_mass('J'), residue_mass('L'));
    }

    #[test]
    fn ambiguous_residues() {
        assert_eq!(residue_mass('B'), None);
        assert_eq!(residue_mass('Z'), None);
        assert_eq!(residue_mass('X'), None);
        assert_eq!(residue_mass('*'), None);
        assert!((residue_mass('W').unwrap() - 186.079313).abs() < 1e-5);
        assert!((residue_mass('U').unwrap() - 150.953636).abs() < 1e-5);
    }
}
