//! Read `.clustering` files, the text output of the spectra-cluster algorithm.
//!
//! ```text
//! name=example clustering
//! =Cluster=
//! id=9b5a7f1c
//! av_precursor_mz=305.170
//! av_precursor_intens=1.0
//! sequence=[KNYGK:1]
//! consensus_mz=129.109,406.148
//! consensus_intens=2071.0,9367.0
//! SPEC	PXD000001;assay.xml;spectrum=1	true	KNYGK	305.17	2	9606	2-MOD:01090	0.9
//! ```
//!
//! Everything before the first `=Cluster=` line is a file header and ignored. A `SPEC` line holds
//! the tab separated spectrum identifier, identification flag, `;` separated sequences, precursor
//! m/z, charge, `,` separated species (may be empty or `null`), and the modifications. The
//! modifications are given as `;` separated groups (one per sequence) of `,` separated
//! `<position>-<accession>` items.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    num::ParseFloatError,
    path::{Path, PathBuf},
};

use context_error::*;
use flate2::bufread::GzDecoder;

use crate::{
    cluster::{Cluster, Modification, PeptideSpectrumMatch, SpectrumReference},
    helper_functions::explain_number_error,
};

const CLUSTER_START: &str = "=Cluster=";

/// Read all clusters from a `.clustering` file one at a time. A malformed cluster results in an
/// error for that cluster only, reading continues with the next cluster.
#[derive(Debug)]
pub struct ClusteringFileReader<R: BufRead> {
    lines: std::iter::Enumerate<Lines<R>>,
    path: Option<PathBuf>,
    current: Option<ClusterBuilder>,
    done: bool,
}

impl ClusteringFileReader<Box<dyn BufRead>> {
    /// Open a clustering file, if the extension is `.gz` it is decompressed on the fly.
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BoxedError<'static, BasicKind>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            BoxedError::new(
                BasicKind::Error,
                "Failed reading clustering file",
                format!("Error occurred while opening the file: {err}"),
                Context::default().source(path.to_string_lossy()).to_owned(),
            )
        })?;
        let reader: Box<dyn BufRead> = if path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("gz"))
        {
            Box::new(BufReader::new(GzDecoder::new(BufReader::new(file))))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader, Some(path)))
    }
}

impl<R: BufRead> ClusteringFileReader<R> {
    /// Read clusters from the given reader, the path is only used for error messages
    pub fn new(reader: R, path: Option<&Path>) -> Self {
        Self {
            lines: reader.lines().enumerate(),
            path: path.map(Path::to_path_buf),
            current: None,
            done: false,
        }
    }

    fn error(
        &self,
        line_index: usize,
        line: &str,
        explanation: impl Into<String>,
    ) -> BoxedError<'static, BasicKind> {
        let context = Context::full_line(line_index as u32, line);
        BoxedError::new(
            BasicKind::Error,
            "Invalid clustering file",
            explanation.into(),
            match &self.path {
                Some(path) => context.source(path.to_string_lossy()).to_owned(),
                None => context.to_owned(),
            },
        )
    }

    fn parse_line(&self, builder: &mut ClusterBuilder, line_index: usize, line: &str) {
        if builder.error.is_some() || line.trim().is_empty() {
            return;
        }
        let result = if let Some(spectrum) = line.strip_prefix("SPEC\t") {
            parse_spectrum(spectrum).map(|spectrum| builder.spectra.push(spectrum))
        } else if let Some((key, value)) = line.split_once('=') {
            builder.set(key.trim(), value.trim())
        } else {
            Err("Line is not a key=value pair or spectrum".to_string())
        };
        if let Err(explanation) = result {
            builder.error = Some(self.error(line_index, line, explanation));
        }
    }

    fn finish(&self, builder: ClusterBuilder) -> Result<Cluster, BoxedError<'static, BasicKind>> {
        if let Some(error) = builder.error {
            return Err(error);
        }
        builder
            .build()
            .map_err(|(line_index, explanation)| self.error(line_index, CLUSTER_START, explanation))
    }
}

impl<R: BufRead> Iterator for ClusteringFileReader<R> {
    type Item = Result<Cluster, BoxedError<'static, BasicKind>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some((line_index, line)) = self.lines.next() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    self.done = true;
                    return Some(Err(self.error(
                        line_index,
                        "",
                        format!("Error occurred while reading: {err}"),
                    )));
                }
            };
            if line.trim() == CLUSTER_START {
                let finished = self.current.replace(ClusterBuilder::new(line_index));
                if let Some(builder) = finished {
                    return Some(self.finish(builder));
                }
            } else if let Some(mut builder) = self.current.take() {
                self.parse_line(&mut builder, line_index, &line);
                self.current = Some(builder);
            }
        }
        self.done = true;
        self.current.take().map(|builder| self.finish(builder))
    }
}

#[derive(Debug)]
struct ClusterBuilder {
    start_line: usize,
    id: Option<String>,
    average_precursor_mz: Option<f64>,
    consensus_mz: Vec<f64>,
    consensus_intensity: Vec<f64>,
    spectra: Vec<SpectrumReference>,
    error: Option<BoxedError<'static, BasicKind>>,
}

impl ClusterBuilder {
    const fn new(start_line: usize) -> Self {
        Self {
            start_line,
            id: None,
            average_precursor_mz: None,
            consensus_mz: Vec::new(),
            consensus_intensity: Vec::new(),
            spectra: Vec::new(),
            error: None,
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "id" => self.id = (!value.is_empty()).then(|| value.to_string()),
            "av_precursor_mz" => {
                self.average_precursor_mz = Some(parse_float(value, "average precursor m/z")?);
            }
            "consensus_mz" => self.consensus_mz = parse_float_list(value, "consensus m/z")?,
            "consensus_intens" => {
                self.consensus_intensity = parse_float_list(value, "consensus intensity")?;
            }
            // Not needed, the consensus is recalculated from the spectra
            "av_precursor_intens" | "sequence" => (),
            other => log::debug!("Ignoring unknown cluster property '{other}'"),
        }
        Ok(())
    }

    fn build(self) -> Result<Cluster, (usize, String)> {
        let average_precursor_mz = self.average_precursor_mz.ok_or_else(|| {
            (
                self.start_line,
                "The cluster does not define 'av_precursor_mz'".to_string(),
            )
        })?;
        if self.consensus_mz.len() != self.consensus_intensity.len() {
            return Err((
                self.start_line,
                format!(
                    "The cluster has {} consensus m/z values but {} intensities",
                    self.consensus_mz.len(),
                    self.consensus_intensity.len()
                ),
            ));
        }
        Ok(Cluster::new(
            self.id,
            average_precursor_mz,
            self.consensus_mz,
            self.consensus_intensity,
            self.spectra,
        ))
    }
}

fn parse_float(value: &str, name: &str) -> Result<f64, String> {
    value
        .trim()
        .parse()
        .map_err(|err: ParseFloatError| format!("The {name} '{value}' is not a valid number: {err}"))
}

fn parse_float_list(value: &str, name: &str) -> Result<Vec<f64>, String> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value.split(',').map(|v| parse_float(v, name)).collect()
}

fn parse_spectrum(line: &str) -> Result<SpectrumReference, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 5 {
        return Err(format!(
            "A spectrum line needs at least 6 tab separated fields but {} were found",
            fields.len() + 1
        ));
    }
    let id = fields[0].trim().to_string();
    let identified = match fields[1].trim() {
        "true" => true,
        "false" => false,
        other => return Err(format!("The identification flag '{other}' is not 'true' or 'false'")),
    };
    let sequences: Vec<&str> = fields[2]
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let precursor_mz = parse_float(fields[3], "precursor m/z")?;
    let charge = fields[4].trim().parse::<isize>().map_err(|err| {
        format!(
            "The charge '{}' {}",
            fields[4].trim(),
            explain_number_error(&err)
        )
    })?;
    let species = fields
        .get(5)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(ToString::to_string);
    let mut modification_groups = fields
        .get(6)
        .map(|s| s.split(';').map(parse_modifications).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();
    if modification_groups.len() > sequences.len()
        && modification_groups[sequences.len()..]
            .iter()
            .any(|g| !g.is_empty())
    {
        return Err(format!(
            "There are modifications for {} peptides but only {} sequences",
            modification_groups.len(),
            sequences.len()
        ));
    }
    modification_groups.resize(sequences.len(), Vec::new());

    Ok(SpectrumReference::new(
        id,
        precursor_mz,
        charge,
        species,
        identified,
        sequences
            .into_iter()
            .zip(modification_groups)
            .map(|(sequence, modifications)| {
                PeptideSpectrumMatch::new(sequence.to_string(), modifications)
            })
            .collect(),
    ))
}

fn parse_modifications(group: &str) -> Result<Vec<Modification>, String> {
    group
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            let (position, accession) = m.split_once('-').ok_or_else(|| {
                format!("The modification '{m}' is not of the form '<position>-<accession>'")
            })?;
            let position = position.trim().parse::<usize>().map_err(|err| {
                format!(
                    "The position of modification '{m}' {}",
                    explain_number_error(&err)
                )
            })?;
            Ok(Modification::new(position, accession.trim()))
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    const FILE: &str = "name=test\nfasta=none\n\n=Cluster=\nid=one\nav_precursor_mz=305.170\nav_precursor_intens=1.0\nsequence=[KNYGK:2]\nconsensus_mz=129.109,406.148\nconsensus_intens=2071.0,9367.0\nSPEC\tPXD1;a.xml;spectrum=1\ttrue\tKNYGK\t305.17\t2\t9606\t\t0.9\nSPEC\tPXD1;a.xml;spectrum=2\ttrue\tKNYGK;KNYGR\t305.2\t2\tnull\t1-MOD:01090,3-MOD:00696;\nSPEC\tPXD2;b.xml;spectrum=3\tfalse\t\t305.1\t0\t\t\n=Cluster=\nid=broken\nav_precursor_mz=abc\n=Cluster=\nid=three\nav_precursor_mz=500.0\nconsensus_mz=\nconsensus_intens=\n";

    #[test]
    fn read_clusters() {
        let clusters: Vec<_> = ClusteringFileReader::new(FILE.as_bytes(), None).collect();
        assert_eq!(clusters.len(), 3);
        let first = clusters[0].as_ref().unwrap();
        assert_eq!(first.id(), Some("one"));
        assert_eq!(first.consensus_mz(), &[129.109, 406.148]);
        assert_eq!(first.spectrum_count(), 3);
        assert_eq!(first.identified_count(), 2);
        let second = &first.spectra()[1];
        assert_eq!(second.species(), None);
        assert_eq!(second.psms().len(), 2);
        assert_eq!(
            second.psms()[0].modifications(),
            &[
                Modification::new(1, "MOD:01090"),
                Modification::new(3, "MOD:00696")
            ]
        );
        assert!(second.psms()[1].modifications().is_empty());
        assert_eq!(first.spectra()[0].species(), Some("9606"));
        assert_eq!(first.spectra()[2].charge(), None);
        assert!(clusters[1].is_err());
        let third = clusters[2].as_ref().unwrap();
        assert!(third.consensus_mz().is_empty());
        assert!(third.spectra().is_empty());
    }

    #[test]
    fn malformed_spectra() {
        assert!(parse_spectrum("id\tmaybe\tPEPTIDE\t500.0\t2").is_err());
        assert!(parse_spectrum("id\ttrue\tPEPTIDE\t500.0").is_err());
        assert!(parse_spectrum("id\ttrue\tPEPTIDE\t500.0\tx").is_err());
        assert!(parse_spectrum("id\ttrue\tPEPTIDE\t500.0\t2\t\t1-A;2-B").is_err());
        assert!(parse_spectrum("id\ttrue\tPEPTIDE\t500.0\t2\t\tA-1").is_err());
        let spectrum = parse_spectrum("id\ttrue\tPEPTIDE\t500.0\t2").unwrap();
        assert!(spectrum.is_identified());
        assert_eq!(spectrum.species(), None);
    }

    #[test]
    fn mismatched_peaks() {
        let text = "=Cluster=\nav_precursor_mz=1\nconsensus_mz=1,2\nconsensus_intens=1\n";
        let clusters: Vec<_> = ClusteringFileReader::new(text.as_bytes(), None).collect();
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].is_err());
    }

    #[test]
    fn header_only() {
        assert_eq!(
            ClusteringFileReader::new("name=x\n".as_bytes(), None).count(),
            0
        );
    }
}
