use std::num::{IntErrorKind, ParseIntError};

/// Round half away from zero for positive numbers, half up for negative numbers (`floor(x + 0.5)`).
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Upper case the sequence and remove everything that is not a letter.
pub(crate) fn clean_sequence(sequence: &str) -> String {
    sequence
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Collapse isoleucine onto leucine, used when grouping sequences.
pub(crate) fn leucine_agnostic(sequence: &str) -> String {
    sequence.replace('I', "L")
}

pub(crate) const fn explain_number_error(error: &ParseIntError) -> &'static str {
    match error.kind() {
        IntErrorKind::Empty => "is empty",
        IntErrorKind::InvalidDigit => "contains an invalid character",
        IntErrorKind::NegOverflow => "is too small to fit in the internal representation",
        IntErrorKind::PosOverflow => "is too big to fit in the internal representation",
        IntErrorKind::Zero => "is zero, which is not allowed here",
        _ => "is not a valid number",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning() {
        assert_eq!(clean_sequence("_pep[+16]TIde-2"), "PEPTIDE");
        assert_eq!(leucine_agnostic("PIPLI"), "PLPLL");
    }

    #[test]
    fn rounding() {
        assert!((round_half_up(0.5) - 1.0).abs() < f64::EPSILON);
        assert!((round_half_up(2.49) - 2.0).abs() < f64::EPSILON);
        assert!((round_half_up(-0.5) - 0.0).abs() < f64::EPSILON);
    }
}
