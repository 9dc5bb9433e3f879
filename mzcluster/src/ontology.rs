//! Resolve modification accessions to their mass deltas.

use std::{
    borrow::Cow,
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use context_error::*;
use mzcore::{
    chemistry::Molecule,
    ontology::{Ontologies, Ontology, STATIC_ONTOLOGIES},
    sequence::{SimpleModification, SimpleModificationInner},
};
use mzcv::AccessionCode;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, UnresolvedReason};

/// A modification as known to the ontology
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ModificationEntry {
    /// The accession, eg `MOD:00696`
    pub accession: String,
    /// The human readable name
    pub name: String,
    /// The monoisotopic mass delta (Da), not every ontology term defines a mass
    #[serde(default)]
    pub monoisotopic_delta: Option<f64>,
    /// The average mass delta (Da)
    #[serde(default)]
    pub average_delta: Option<f64>,
}

impl ModificationEntry {
    /// Create a new entry
    pub fn new(
        accession: impl Into<String>,
        name: impl Into<String>,
        monoisotopic_delta: Option<f64>,
        average_delta: Option<f64>,
    ) -> Self {
        Self {
            accession: accession.into(),
            name: name.into(),
            monoisotopic_delta,
            average_delta,
        }
    }

    /// Describe an ontology modification, massless terms (comments, root terms without a
    /// formula) do not get a delta
    fn from_ontology(accession: &str, modification: &SimpleModification) -> Self {
        let name = modification
            .description()
            .map_or_else(|| accession.to_string(), |id| id.name.to_string());
        let formula = match &**modification {
            SimpleModificationInner::Info(_) => None,
            inner => Some(inner.formula()).filter(|formula| !formula.is_empty()),
        };
        Self {
            accession: accession.to_string(),
            name,
            monoisotopic_delta: formula.as_ref().map(|f| f.monoisotopic_mass().value),
            average_delta: formula.as_ref().map(|f| f.average_weight().value),
        }
    }
}

/// Anything that can look up modifications by accession
pub trait ModificationLookup {
    /// Find the modification with the given accession
    fn resolve_modification(&self, accession: &str) -> Option<Cow<'_, ModificationEntry>>;

    /// Get the monoisotopic delta for the given accession.
    /// # Errors
    /// If the accession is unknown or the modification does not have a monoisotopic delta.
    fn monoisotopic_delta(&self, accession: &str) -> Result<f64, AnalysisError> {
        let entry = self.resolve_modification(accession).ok_or_else(|| {
            AnalysisError::UnresolvedModification {
                accession: accession.to_string(),
                reason: UnresolvedReason::NotFound,
            }
        })?;
        entry
            .monoisotopic_delta
            .ok_or_else(|| AnalysisError::UnresolvedModification {
                accession: accession.to_string(),
                reason: UnresolvedReason::NoMonoisotopicDelta,
            })
    }
}

/// A modification database backed by the PSI-MOD, Unimod, and XL-MOD ontologies, with custom
/// entries on top. Custom entries take precedence over ontology terms with the same accession.
#[derive(Clone)]
pub struct ModificationDatabase {
    entries: HashMap<String, ModificationEntry>,
    /// Alternative accessions that resolve to another accession
    aliases: HashMap<String, String>,
    ontologies: Option<&'static Ontologies>,
}

impl std::fmt::Debug for ModificationDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModificationDatabase")
            .field("entries", &self.entries)
            .field("aliases", &self.aliases)
            .field("ontologies", &self.ontologies.is_some())
            .finish()
    }
}

impl ModificationLookup for ModificationDatabase {
    fn resolve_modification(&self, accession: &str) -> Option<Cow<'_, ModificationEntry>> {
        let accession = accession.trim();
        let accession = self.aliases.get(accession).map_or(accession, String::as_str);
        self.entries
            .get(accession)
            .map(Cow::Borrowed)
            .or_else(|| self.resolve_in_ontologies(accession).map(Cow::Owned))
    }
}

impl ModificationDatabase {
    /// An empty database, without any ontology
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
            ontologies: None,
        }
    }

    /// A database with all terms from the given ontologies
    pub fn with_ontologies(ontologies: &'static Ontologies) -> Self {
        Self {
            ontologies: Some(ontologies),
            ..Self::empty()
        }
    }

    /// Find an accession like `MOD:00696` or `UNIMOD:21` in the ontologies
    fn resolve_in_ontologies(&self, accession: &str) -> Option<ModificationEntry> {
        let ontologies = self.ontologies?;
        let (prefix, id) = accession.split_once(':')?;
        let ontology = match prefix.trim().to_ascii_uppercase().as_str() {
            "MOD" | "PSI-MOD" => Ontology::Psimod,
            "UNIMOD" | "U" => Ontology::Unimod,
            "XLMOD" | "XL-MOD" => Ontology::Xlmod,
            _ => return None,
        };
        let id = AccessionCode::Numeric(id.trim().parse::<u32>().ok()?);
        ontologies
            .get_by_index(ontology, &id)
            .map(|modification| ModificationEntry::from_ontology(accession, &modification))
    }

    /// Add an entry, replacing any entry with the same accession
    pub fn insert(&mut self, entry: ModificationEntry) {
        self.entries.insert(entry.accession.clone(), entry);
    }

    /// Let the alias resolve to the target accession
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// The number of custom modifications (excluding aliases and ontology terms)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// If there are no custom modifications in this database
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extend this database with entries from a JSON file, see [`Self::extend_from_reader`].
    /// # Errors
    /// If the file could not be opened or is not valid.
    pub fn extend_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<usize, BoxedError<'static, BasicKind>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            BoxedError::new(
                BasicKind::Error,
                "Could not open modification database",
                err.to_string(),
                Context::default().source(path.to_string_lossy()).to_owned(),
            )
        })?;
        self.extend_from_reader(BufReader::new(file), Some(path))
    }

    /// Extend this database with entries from JSON. The JSON should be a list of objects each with
    /// an `accession` and `name` and optionally `monoisotopic_delta` and `average_delta`. Entries
    /// with an accession that is already known replace the existing entry. Returns the number of
    /// entries read.
    /// # Errors
    /// If the JSON is not valid or contains an entry with an empty accession.
    pub fn extend_from_reader(
        &mut self,
        reader: impl Read,
        path: Option<&Path>,
    ) -> Result<usize, BoxedError<'static, BasicKind>> {
        let context = || {
            path.map_or_else(Context::none, |p| {
                Context::default().source(p.to_string_lossy()).to_owned()
            })
        };
        let entries: Vec<ModificationEntry> = serde_json::from_reader(reader).map_err(|err| {
            BoxedError::new(
                BasicKind::Error,
                "Invalid modification database",
                format!("The JSON could not be parsed: {err}"),
                context(),
            )
        })?;
        let count = entries.len();
        for entry in entries {
            if entry.accession.trim().is_empty() {
                return Err(BoxedError::new(
                    BasicKind::Error,
                    "Invalid modification database",
                    format!("The modification '{}' has an empty accession", entry.name),
                    context(),
                ));
            }
            self.insert(entry);
        }
        Ok(count)
    }
}

impl Default for ModificationDatabase {
    /// The ontologies that are built into `mzcore`
    fn default() -> Self {
        // A known typo in some PRIDE submissions
        Self::with_ontologies(&STATIC_ONTOLOGIES).alias("MOD:010900", "MOD:01090")
    }
}
