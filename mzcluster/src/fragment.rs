//! Theoretical backbone fragmentation of linear peptides.

use serde::{Deserialize, Serialize};

use crate::{
    chemistry::{AMMONIA, CARBON_MONOXIDE, PROTON, WATER, Y_TO_X, Y_TO_Z, residue_mass},
    error::AnalysisError,
};

/// The kind of a backbone fragment
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IonType {
    /// N terminal, b minus CO
    A,
    /// N terminal, cleavage of the peptide bond
    B,
    /// N terminal, b plus NH3
    C,
    /// C terminal, y plus CO minus H2
    X,
    /// C terminal, cleavage of the peptide bond
    Y,
    /// C terminal, z• (y minus NH3 plus H)
    Z,
}

impl IonType {
    /// All ion types
    pub const ALL: [Self; 6] = [Self::A, Self::B, Self::C, Self::X, Self::Y, Self::Z];

    /// If this fragment contains the N terminus
    pub const fn is_n_terminal(self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }

    /// The neutral mass shift from the summed residue masses of the fragment
    const fn shift(self) -> f64 {
        match self {
            Self::A => -CARBON_MONOXIDE,
            Self::B => 0.0,
            Self::C => AMMONIA,
            Self::X => WATER + Y_TO_X,
            Self::Y => WATER,
            Self::Z => WATER + Y_TO_Z,
        }
    }
}

impl std::fmt::Display for IonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::A => "a",
                Self::B => "b",
                Self::C => "c",
                Self::X => "x",
                Self::Y => "y",
                Self::Z => "z",
            }
        )
    }
}

/// A theoretical fragment ion
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProductIon {
    /// The ion series
    pub kind: IonType,
    /// The number of residues in this fragment
    pub position: usize,
    /// The charge
    pub charge: usize,
    /// The m/z
    pub mz: f64,
}

/// A modification mass placed on a residue (0-based index)
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlacedModification {
    /// The 0-based residue index
    pub index: usize,
    /// The monoisotopic mass delta
    pub delta: f64,
}

/// Generate theoretical fragments for a peptide
pub trait FragmentGenerator {
    /// Generate all theoretical product ions for the given (cleaned) sequence with the given
    /// modifications for a precursor of the given charge. The ions are sorted by m/z.
    /// # Errors
    /// If the sequence contains a residue without a defined mass.
    fn theoretical_ions(
        &self,
        sequence: &str,
        modifications: &[PlacedModification],
        charge: usize,
    ) -> Result<Vec<ProductIon>, AnalysisError>;
}

/// The ion series that are generated
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct FragmentationModel {
    /// The ion series
    pub ions: Vec<IonType>,
}

impl FragmentationModel {
    /// All backbone ion series
    pub fn all() -> Self {
        Self {
            ions: IonType::ALL.to_vec(),
        }
    }

    /// Only b and y ions
    pub fn cid() -> Self {
        Self {
            ions: vec![IonType::B, IonType::Y],
        }
    }

    /// Set the ion series
    #[must_use]
    pub fn ions(self, ions: impl IntoIterator<Item = IonType>) -> Self {
        Self {
            ions: ions.into_iter().collect(),
        }
    }
}

impl Default for FragmentationModel {
    /// a, b, and y ions
    fn default() -> Self {
        Self {
            ions: vec![IonType::A, IonType::B, IonType::Y],
        }
    }
}

/// Monoisotopic backbone fragmentation, for a precursor of charge z fragments are generated with
/// charges 1 up to and including max(1, z - 1).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct BackboneFragmenter {
    model: FragmentationModel,
}

impl BackboneFragmenter {
    /// Create a fragmenter for the given model
    pub const fn new(model: FragmentationModel) -> Self {
        Self { model }
    }

    /// The model in use
    pub const fn model(&self) -> &FragmentationModel {
        &self.model
    }
}

impl FragmentGenerator for BackboneFragmenter {
    fn theoretical_ions(
        &self,
        sequence: &str,
        modifications: &[PlacedModification],
        charge: usize,
    ) -> Result<Vec<ProductIon>, AnalysisError> {
        let mut residues = sequence
            .chars()
            .enumerate()
            .map(|(index, c)| {
                residue_mass(c).ok_or_else(|| {
                    AnalysisError::ChargeEstimationFailure(format!(
                        "Unknown residue '{c}' at position {} in '{sequence}'",
                        index + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for modification in modifications {
            if let Some(residue) = residues.get_mut(modification.index) {
                *residue += modification.delta;
            }
        }

        let length = residues.len();
        let max_charge = charge.saturating_sub(1).max(1);
        let mut ions = Vec::with_capacity(self.model.ions.len() * length * max_charge);
        let mut prefix = 0.0_f64;
        let mut prefixes = Vec::with_capacity(length);
        for residue in &residues {
            prefix += residue;
            prefixes.push(prefix);
        }
        let total = prefix;

        for position in 1..length {
            let n_terminal = prefixes[position - 1];
            let c_terminal = total - prefixes[length - position - 1];
            for kind in &self.model.ions {
                let fragment_residues = if kind.is_n_terminal() {
                    n_terminal
                } else {
                    c_terminal
                };
                let neutral = fragment_residues + kind.shift();
                for z in 1..=max_charge {
                    ions.push(ProductIon {
                        kind: *kind,
                        position,
                        charge: z,
                        mz: (neutral + z as f64 * PROTON) / z as f64,
                    });
                }
            }
        }
        ions.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Ok(ions)
    }
}
