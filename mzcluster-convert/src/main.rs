//! Convert clustering files into spectral libraries and peak lists

use std::{
    ffi::OsString,
    fs::OpenOptions,
    io::BufWriter,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use context_error::{BasicKind, BoxedError, Context, CreateError};
use mzcluster::prelude::*;

/// The command line interface arguments
#[expect(clippy::struct_excessive_bools)]
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The clustering files, gzipped files are detected by the `.gz` extension
    #[arg(required = true)]
    input: Vec<PathBuf>,
    /// The base path for the output files, the format extension is added
    #[arg(short, long)]
    output_path: PathBuf,
    /// The output formats (msp, mgf), can be given multiple times
    #[arg(short, long = "format", required = true, value_delimiter = ',')]
    formats: Vec<ExportFormat>,
    /// The minimal number of identified spectra in a cluster
    #[arg(long, default_value_t = 0)]
    min_size: usize,
    /// The maximal number of identified spectra in a cluster
    #[arg(long)]
    max_size: Option<usize>,
    /// The minimal identification ratio
    #[arg(long, default_value_t = 0.0)]
    min_ratio: f64,
    /// The maximal identification ratio
    #[arg(long, default_value_t = 1.0)]
    max_ratio: f64,
    /// Use the fraction of identified spectra as ratio instead of the fraction of PSMs
    #[arg(long)]
    spectrum_ratio: bool,
    /// The minimal fraction of the ion current explained by b and y ions
    #[arg(long, default_value_t = 0.0)]
    min_tic: f64,
    /// The maximal fraction of the ion current explained by b and y ions
    #[arg(long, default_value_t = 1.0)]
    max_tic: f64,
    /// Do not filter on the annotated ion current, this also keeps unidentified clusters
    #[arg(long)]
    no_tic_filter: bool,
    /// Only keep clusters with at least one spectrum of these species (taxonomy ids)
    #[arg(long)]
    species: Vec<String>,
    /// Write all input files into a single output file per format, appending to existing files
    #[arg(long)]
    combine: bool,
    /// Only keep clusters whose consensus sequence is found in these proteins
    #[arg(long)]
    fasta: Option<PathBuf>,
    /// Keep clusters with a precursor mass error above 1 Th
    #[arg(long)]
    include_large_deltas: bool,
    /// Annotate the peaks in MSP files with the matching fragments
    #[arg(long)]
    spec_lib_add_annotation: bool,
    /// Normalise the MSP peak intensities so the base peak is 10000
    #[arg(long)]
    spec_lib_normalize: bool,
    /// Additional modifications as a JSON list of `{accession, name, monoisotopic_delta}`
    #[arg(long)]
    modifications: Option<PathBuf>,
    /// Replace the MSP modification names with a JSON list of `[name, mass]` pairs
    #[arg(long)]
    modification_names: Option<PathBuf>,
    /// The tolerance (Da) for matching modification masses to MSP names
    #[arg(long, default_value_t = ModificationNameTable::DEFAULT_TOLERANCE)]
    modification_tolerance: f64,
}

impl Cli {
    fn filter_parameters(&self) -> FilterParameters {
        FilterParameters::default()
            .size(self.min_size, self.max_size.unwrap_or(usize::MAX))
            .ratio(self.min_ratio, self.max_ratio)
            .ratio_kind(if self.spectrum_ratio {
                RatioKind::Spectrum
            } else {
                RatioKind::Psm
            })
            .tic(self.min_tic, self.max_tic)
            .tic_filter(!self.no_tic_filter)
            .include_large_deltas(self.include_large_deltas)
            .species(self.species.iter().cloned())
    }

    fn output_parameters(&self) -> OutputParameters {
        OutputParameters::default()
            .normalize(self.spec_lib_normalize)
            .annotate_peaks(self.spec_lib_add_annotation)
    }

    /// `<output>.<ext>` when combining, `<output>-<input file name>.<ext>` otherwise
    fn output_file(&self, input: &Path, format: ExportFormat) -> PathBuf {
        let mut path = OsString::from(self.output_path.as_os_str());
        if !self.combine {
            path.push("-");
            path.push(input.file_name().unwrap_or(input.as_os_str()));
        }
        path.push(".");
        path.push(format.extension());
        PathBuf::from(path)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<(), BoxedError<'static, BasicKind>> {
    let mut database = ModificationDatabase::default();
    if let Some(path) = &args.modifications {
        let added = database.extend_from_file(path)?;
        log::info!("Loaded {added} modifications from {}", path.display());
    }
    let names = args
        .modification_names
        .as_ref()
        .map_or_else(
            || Ok(ModificationNameTable::default()),
            ModificationNameTable::from_file,
        )?
        .tolerance(args.modification_tolerance);
    let proteins = args
        .fasta
        .as_ref()
        .map(ProteinDatabase::parse_file)
        .transpose()?;
    if let Some(proteins) = &proteins {
        log::info!("Loaded {} proteins", proteins.len());
    }

    let fragmenter = BackboneFragmenter::default();
    let context = AnalysisContext::new(&database, &fragmenter);
    let mut formats = args.formats.clone();
    formats.sort_unstable();
    formats.dedup();

    for input in &args.input {
        let paths = formats
            .iter()
            .map(|format| args.output_file(input, *format))
            .collect::<Vec<_>>();
        let writers = formats
            .iter()
            .zip(&paths)
            .map(|(format, path)| {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(args.combine)
                    .truncate(!args.combine)
                    .open(path)
                    .map_err(|err| io_error(path, "Could not open output file", &err))?;
                Ok(ClusterWriter::new(
                    *format,
                    BufWriter::new(file),
                    args.output_parameters(),
                    &database,
                    &names,
                ))
            })
            .collect::<Result<Vec<_>, BoxedError<'static, BasicKind>>>()?;

        let mut converter = ClusterConverter::new(
            context,
            ExportFilter::new(args.filter_parameters(), proteins.clone()),
            writers,
        );
        let failed_write = |err: std::io::Error| {
            io_error(
                &args.output_path,
                "Could not write output file",
                &err,
            )
        };
        converter
            .convert(ClusteringFileReader::open(input)?)
            .map_err(failed_write)?;
        let (_, statistics) = converter.finish().map_err(failed_write)?;

        println!("Converted {}: {statistics}", input.display());
        for path in &paths {
            println!("Written {}", path.display());
        }
    }
    Ok(())
}

fn io_error(path: &Path, short: &str, err: &std::io::Error) -> BoxedError<'static, BasicKind> {
    BoxedError::new(
        BasicKind::Error,
        short.to_string(),
        err.to_string(),
        Context::default().source(path.to_string_lossy()).to_owned(),
    )
}
