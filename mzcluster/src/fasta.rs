//! A minimal protein database used to map consensus peptides onto proteins.

use std::{
    io::{BufRead, BufReader},
    path::Path,
};

use context_error::*;

/// A protein from a fasta file
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Protein {
    /// The full header line without the leading `>`
    pub header: String,
    /// The protein sequence, upper cased and without whitespace
    pub sequence: String,
}

/// All proteins of a fasta file in file order
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProteinDatabase {
    proteins: Vec<Protein>,
}

impl ProteinDatabase {
    /// Create a database from the given proteins
    pub const fn new(proteins: Vec<Protein>) -> Self {
        Self { proteins }
    }

    /// Parse a fasta file
    /// # Errors
    /// If the file could not be opened or read, or if it contains a sequence before the first
    /// header.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, BoxedError<'static, BasicKind>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|_| {
            BoxedError::new(
                BasicKind::Error,
                "Failed reading fasta file",
                "Error occurred while opening the file",
                Context::default().source(path.to_string_lossy()).to_owned(),
            )
        })?;
        Self::parse_reader(BufReader::new(file), Some(path))
    }

    /// Parse a fasta file from a reader. Empty lines are ignored.
    /// # Errors
    /// If the reader fails, or if there is a sequence line before the first header.
    pub fn parse_reader(
        reader: impl BufRead,
        path: Option<&Path>,
    ) -> Result<Self, BoxedError<'static, BasicKind>> {
        let mut proteins = Vec::new();
        let mut current: Option<Protein> = None;

        for (line_index, line) in reader.lines().enumerate() {
            let line = line.map_err(|_| {
                BoxedError::new(
                    BasicKind::Error,
                    "Failed reading fasta file",
                    format!("Error occurred while reading line {}", line_index + 1),
                    path.map_or_else(Context::none, |p| {
                        Context::default().source(p.to_string_lossy()).to_owned()
                    }),
                )
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('>') {
                proteins.extend(current.take().filter(|p| !p.sequence.is_empty()));
                current = Some(Protein {
                    header: header.to_string(),
                    sequence: String::new(),
                });
            } else if let Some(protein) = current.as_mut() {
                protein.sequence.extend(
                    trimmed
                        .chars()
                        .filter(|c| !c.is_ascii_whitespace())
                        .map(|c| c.to_ascii_uppercase()),
                );
            } else {
                return Err(BoxedError::new(
                    BasicKind::Error,
                    "Failed reading fasta file",
                    "A sequence was found before the first header",
                    Context::full_line(line_index as u32, &line).to_owned(),
                ));
            }
        }
        proteins.extend(current.filter(|p| !p.sequence.is_empty()));
        Ok(Self { proteins })
    }

    /// The first protein (in file order) that contains the given peptide
    pub fn find_protein(&self, peptide: &str) -> Option<&Protein> {
        if peptide.is_empty() {
            return None;
        }
        self.proteins.iter().find(|p| p.sequence.contains(peptide))
    }

    /// The number of proteins
    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    /// If there are no proteins
    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }
}
