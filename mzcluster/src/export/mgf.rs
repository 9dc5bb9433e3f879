use std::io::Write;

use crate::{analysis::ClusterSummary, cluster::Cluster, export::export_peaks};

/// Writes clusters as MGF spectra with the raw consensus peaks
#[derive(Debug)]
pub struct MgfWriter<W: Write> {
    output: W,
    records: usize,
}

impl<W: Write> MgfWriter<W> {
    /// Create a new writer
    pub const fn new(output: W) -> Self {
        Self { output, records: 0 }
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

    /// Write a single cluster, MGF has no place for a protein so that is ignored
    /// # Errors
    /// If writing failed.
    pub fn on_cluster(
        &mut self,
        cluster: &Cluster,
        summary: &ClusterSummary<'_>,
        _protein: Option<&str>,
    ) -> std::io::Result<bool> {
        writeln!(self.output, "BEGIN IONS")?;
        let id = cluster
            .id()
            .map_or_else(String::new, |id| format!("{id},sequence="));
        let sequence = summary
            .consensus()
            .map_or("UNIDENTIFIED", |c| c.sequence.as_str());
        writeln!(self.output, "TITLE={id}{sequence}")?;
        writeln!(self.output, "PEPMASS={:.4}", cluster.average_precursor_mz())?;
        let charge = summary.charge().charge;
        writeln!(
            self.output,
            "CHARGE={}{}",
            charge.unsigned_abs(),
            if charge > 0 { '+' } else { '-' }
        )?;
        for (mz, intensity) in export_peaks(cluster, false) {
            writeln!(self.output, "{mz} {intensity}")?;
        }
        writeln!(self.output, "END IONS\n")?;
        self.records += 1;
        Ok(true)
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
        ontology::ModificationDatabase,
    };

    fn write(cluster: &Cluster) -> String {
        let database = ModificationDatabase::default();
        let fragmenter = BackboneFragmenter::default();
        let summary = ClusterSummary::analyse(cluster, AnalysisContext::new(&database, &fragmenter));
        let mut writer = MgfWriter::new(Vec::new());
        assert!(writer.on_cluster(cluster, &summary, Some("ignored")).unwrap());
        assert_eq!(writer.records(), 1);
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn identified() {
        let cluster = Cluster::new(
            Some("c-7".to_string()),
            305.17,
            vec![129.109, 0.0, 406.148],
            vec![2071.5, 0.0, 9367.0],
            vec![SpectrumReference::new(
                "P;A;1".to_string(),
                305.17,
                2,
                None,
                true,
                vec![PeptideSpectrumMatch::new("KNYGK".to_string(), Vec::new())],
            )],
        );
        assert_eq!(
            write(&cluster),
            "BEGIN IONS\nTITLE=c-7,sequence=KNYGK\nPEPMASS=305.1700\nCHARGE=2+\n129.109 2071.5\n406.148 9367\nEND IONS\n\n"
        );
    }

    #[test]
    fn unidentified() {
        let cluster = Cluster::new(None, 500.0, vec![100.0], vec![1.0], Vec::new());
        assert_eq!(
            write(&cluster),
            "BEGIN IONS\nTITLE=UNIDENTIFIED\nPEPMASS=500.0000\nCHARGE=0-\n100 1\nEND IONS\n\n"
        );
    }
}
