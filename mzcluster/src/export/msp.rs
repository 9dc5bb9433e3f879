use std::io::Write;

use itertools::Itertools;

use crate::{
    analysis::ClusterSummary,
    annotation::PeakAnnotator,
    chemistry::PROTON,
    cluster::{Cluster, Modification},
    export::{OutputParameters, export_peaks},
    modification_names::ModificationNameTable,
    ontology::ModificationLookup,
};

/// Writes clusters as consensus spectra in a NIST/SpectraST MSP spectral library. Clusters
/// without a consensus identification are skipped.
pub struct MspWriter<'a, W: Write> {
    output: W,
    parameters: OutputParameters,
    modifications: &'a dyn ModificationLookup,
    names: &'a ModificationNameTable,
    records: usize,
}

impl<W: Write + std::fmt::Debug> std::fmt::Debug for MspWriter<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MspWriter")
            .field("output", &self.output)
            .field("parameters", &self.parameters)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl<'a, W: Write> MspWriter<'a, W> {
    /// Create a new writer
    pub fn new(
        output: W,
        parameters: OutputParameters,
        modifications: &'a dyn ModificationLookup,
        names: &'a ModificationNameTable,
    ) -> Self {
        Self {
            output,
            parameters,
            modifications,
            names,
            records: 0,
        }
    }

    /// The number of records written
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Flush and return the output
    /// # Errors
    /// If flushing failed.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.output.flush()?;
        Ok(self.output)
    }

    /// Write a single cluster, returns false if the cluster was skipped
    /// # Errors
    /// If writing failed.
    pub fn on_cluster(
        &mut self,
        cluster: &Cluster,
        summary: &ClusterSummary<'_>,
        protein: Option<&str>,
    ) -> std::io::Result<bool> {
        let Some(consensus) = summary.consensus() else {
            log::warn!(
                "Cluster {} has no identified spectra and is not written to the MSP library",
                cluster.id().unwrap_or("-")
            );
            return Ok(false);
        };
        let sequence = consensus.sequence.as_str();
        let charge = summary.charge().charge;
        let precursor_mz = cluster.average_precursor_mz();

        writeln!(self.output, "Name: {sequence}/{charge}")?;
        if charge >= 1 {
            let z = charge as f64;
            writeln!(self.output, "MW: {:.4}", precursor_mz * z - z * PROTON)?;
        }

        let mods = summary.representative().map_or_else(
            || "0".to_string(),
            |psm| self.modification_descriptor(sequence, psm.modifications()),
        );
        write!(
            self.output,
            "Comment: Spec=Consensus Mods={mods} Parent={precursor_mz:.3} Nreps={} Naa={} MaxRatio={:.3} PrecursorMzRange={:.4}",
            cluster.spectrum_count(),
            sequence.len(),
            consensus.spectrum_ratio,
            cluster.precursor_mz_range(),
        )?;
        if charge >= 1
            && let Ok(delta) = summary.delta_mass()
        {
            write!(self.output, " DeltaMass={delta:.3}")?;
        }
        if let Some(id) = cluster.id() {
            write!(self.output, " ClusterId={id}")?;
        }
        if let Some(protein) = protein {
            write!(self.output, " Protein={protein}")?;
        }
        writeln!(self.output)?;

        let peaks = export_peaks(cluster, self.parameters.normalize);
        writeln!(self.output, "Num peaks: {}", peaks.len())?;
        let annotations = if self.parameters.annotate_peaks {
            let ions = summary.product_ions().as_deref().unwrap_or(&[]);
            let indexed = peaks
                .iter()
                .enumerate()
                .map(|(index, (mz, intensity))| (index, *mz, *intensity))
                .collect_vec();
            PeakAnnotator::new(ions, precursor_mz, summary.peak_count_label())
                .annotate_all(&indexed)
        } else {
            Vec::new()
        };
        for (index, (mz, intensity)) in peaks.iter().enumerate() {
            match annotations.get(index) {
                Some(annotation) => writeln!(self.output, "{mz} {intensity} \"{annotation}\"")?,
                None => writeln!(self.output, "{mz} {intensity}")?,
            }
        }
        writeln!(self.output)?;
        self.records += 1;
        Ok(true)
    }

    /// Build the `Mods=` value: `0` without modifications, otherwise the number of unique
    /// modifications followed by `/<position>,<residue>,<name>` for each modification sorted on
    /// position. Positions are 0 based, the residue is `^` for N-terminal modifications and `$`
    /// for any modification at or after the last residue.
    pub fn modification_descriptor(&self, sequence: &str, modifications: &[Modification]) -> String {
        let unique = modifications
            .iter()
            .unique_by(|m| (m.accession.trim().to_string(), m.position))
            .sorted_by(|a, b| {
                a.position
                    .cmp(&b.position)
                    .then_with(|| a.accession.trim().cmp(b.accession.trim()))
            })
            .collect_vec();
        if unique.is_empty() {
            return "0".to_string();
        }

        let length = sequence.len();
        let mut descriptor = unique.len().to_string();
        for modification in unique {
            let residue = if modification.position < 1 {
                '^'
            } else if modification.position >= length {
                '$'
            } else {
                sequence
                    .chars()
                    .nth(modification.position - 1)
                    .unwrap_or('$')
            };
            let position = modification.position.saturating_sub(1);
            descriptor.push_str(&format!(
                "/{position},{residue},{}",
                self.modification_name(&modification.accession)
            ));
        }
        descriptor
    }

    fn modification_name(&self, accession: &str) -> String {
        let Some(entry) = self.modifications.resolve_modification(accession) else {
            log::warn!("Failed to resolve modification {accession}");
            return accession.to_string();
        };
        let Some(delta) = entry.monoisotopic_delta else {
            log::warn!(
                "Modification accession {accession} is not associated with a monoisotopic mass delta"
            );
            return accession.to_string();
        };
        self.names.name_for_delta(delta).map_or_else(
            || {
                log::warn!(
                    "Failed to match modification delta ({accession} > {delta}) to an MSP name"
                );
                delta.to_string()
            },
            ToString::to_string,
        )
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::{
        analysis::AnalysisContext,
        cluster::{PeptideSpectrumMatch, SpectrumReference},
        fragment::BackboneFragmenter,
        ontology::{ModificationDatabase, ModificationEntry},
    };

    fn knygk(modifications: Vec<Modification>, charge: isize) -> Cluster {
        Cluster::new(
            Some("cluster-1".to_string()),
            305.17,
            vec![129.109, 0.0, 406.148, 250.0],
            vec![2071.0, 0.0, 9367.0, 10.0],
            vec![SpectrumReference::new(
                "PXD000001;assay.xml;spectrum=1".to_string(),
                305.17,
                charge,
                None,
                true,
                vec![PeptideSpectrumMatch::new("KNYGK".to_string(), modifications)],
            )],
        )
    }

    fn write(cluster: &Cluster, parameters: OutputParameters, protein: Option<&str>) -> String {
        let database = ModificationDatabase::default();
        let names = ModificationNameTable::default();
        let fragmenter = BackboneFragmenter::default();
        let summary =
            crate::analysis::ClusterSummary::analyse(cluster, AnalysisContext::new(&database, &fragmenter));
        let mut writer = MspWriter::new(Vec::new(), parameters, &database, &names);
        assert!(writer.on_cluster(cluster, &summary, protein).unwrap());
        assert_eq!(writer.records(), 1);
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn plain_record() {
        let text = write(&knygk(Vec::new(), 2), OutputParameters::default(), None);
        let lines = text.lines().collect_vec();
        assert_eq!(lines[0], "Name: KNYGK/2");
        assert_eq!(lines[1], "MW: 608.3254");
        assert!(lines[2].starts_with(
            "Comment: Spec=Consensus Mods=0 Parent=305.170 Nreps=1 Naa=5 MaxRatio=1.000 PrecursorMzRange=0.0000 DeltaMass=0.001 ClusterId=cluster-1"
        ), "{}", lines[2]);
        assert_eq!(lines[3], "Num peaks: 3");
        assert_eq!(lines[4], "129.109 2071");
        assert_eq!(lines[5], "406.148 9367");
        assert_eq!(lines[6], "250 10");
        assert!(text.ends_with("250 10\n\n"));
    }

    #[test]
    fn annotated_and_normalised() {
        let text = write(
            &knygk(Vec::new(), 2),
            OutputParameters::default()
                .normalize(true)
                .annotate_peaks(true),
            Some("sp|P1|TEST"),
        );
        assert!(text.contains(" Protein=sp|P1|TEST\n"));
        assert!(text.contains("129.109 2211 \"b1/-0.01 1/1 1.0\"\n"), "{text}");
        assert!(text.contains("406.148 10000 \"b3/0.06 1/1 1.0\"\n"), "{text}");
        assert!(text.contains("250 11 \"? 1/1 0.5\"\n"), "{text}");
    }

    #[test]
    fn modifications() {
        let text = write(
            &knygk(
                vec![
                    Modification::new(3, "MOD:00048"),
                    Modification::new(0, "UNIMOD:1"),
                    Modification::new(3, "MOD:00048"),
                    Modification::new(9, "MOD:99999"),
                ],
                2,
            ),
            OutputParameters::default(),
            None,
        );
        assert!(
            text.contains("Mods=3/0,^,Acetyl/2,Y,Phospho/8,$,MOD:99999 "),
            "{text}"
        );
    }

    #[test]
    fn descriptor_order_invariant() {
        let mut database = ModificationDatabase::empty();
        database.insert(ModificationEntry::new("X:1", "odd", Some(1.2345), None));
        database.insert(ModificationEntry::new("X:2", "massless", None, None));
        let names = ModificationNameTable::default();
        let writer = MspWriter::new(Vec::new(), OutputParameters::default(), &database, &names);
        let a = vec![Modification::new(2, "X:1"), Modification::new(1, "X:2")];
        let b = vec![
            Modification::new(1, "X:2"),
            Modification::new(2, "X:1"),
            Modification::new(1, "X:2"),
        ];
        assert_eq!(
            writer.modification_descriptor("PEPTIDE", &a),
            "2/0,P,X:2/1,E,1.2345"
        );
        assert_eq!(
            writer.modification_descriptor("PEPTIDE", &a),
            writer.modification_descriptor("PEPTIDE", &b)
        );
        assert_eq!(writer.modification_descriptor("PEPTIDE", &[]), "0");
    }

    #[test]
    fn last_residue_is_c_terminal() {
        let database = ModificationDatabase::default();
        let names = ModificationNameTable::default();
        let writer = MspWriter::new(Vec::new(), OutputParameters::default(), &database, &names);
        assert_eq!(
            writer.modification_descriptor("KNYGK", &[Modification::new(5, "UNIMOD:35")]),
            "1/4,$,Oxidation"
        );
        assert_eq!(
            writer.modification_descriptor("KNYGK", &[Modification::new(4, "UNIMOD:35")]),
            "1/3,G,Oxidation"
        );
        assert_eq!(
            writer.modification_descriptor("KNYGK", &[Modification::new(6, "UNIMOD:35")]),
            "1/5,$,Oxidation"
        );
    }

    #[test]
    fn skip_unidentified_and_zero_charge() {
        let database = ModificationDatabase::default();
        let names = ModificationNameTable::default();
        let fragmenter = BackboneFragmenter::default();
        let context = AnalysisContext::new(&database, &fragmenter);
        let unidentified = Cluster::new(None, 500.0, vec![100.0], vec![1.0], Vec::new());
        let summary = crate::analysis::ClusterSummary::analyse(&unidentified, context);
        let mut writer = MspWriter::new(Vec::new(), OutputParameters::default(), &database, &names);
        assert!(!writer.on_cluster(&unidentified, &summary, None).unwrap());
        assert_eq!(writer.records(), 0);

        // A charge that cannot be estimated leaves out MW and DeltaMass
        let cluster = knygk(vec![Modification::new(1, "MOD:99999")], 0);
        let text = write(&cluster, OutputParameters::default(), None);
        assert!(text.starts_with("Name: KNYGK/0\nComment:"), "{text}");
        assert!(!text.contains("DeltaMass"));
    }
}
