//! fpgen - Subfingerprint generator for raw PCM audio
//!
//! Usage: fpgen [--profile default|sync] [--format s16le|f32le] <input>...

use anyhow::{Context, Result};
use audioprint_cli::output::{self, TrackOutput};
use audioprint_core::{
    ChannelSink, FingerprintGenerator, PcmFormat, Profile, RawPcmSource, SinkEvent,
    SubFingerprint,
};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    S16le,
    F32le,
}

impl From<Format> for PcmFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::S16le => PcmFormat::S16le,
            Format::F32le => PcmFormat::F32le,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fpgen")]
#[command(about = "Generate chroma subfingerprints from raw mono PCM files", long_about = None)]
struct Args {
    /// Headerless mono PCM files sampled at the profile's rate
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Built-in profile (default, sync)
    #[arg(short, long, default_value = "default")]
    profile: String,

    /// Load the profile from a TOML file instead
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Sample encoding of the inputs
    #[arg(short, long, value_enum, default_value_t = Format::S16le)]
    format: Format,

    /// Only report counts, not the subfingerprints themselves
    #[arg(long)]
    summary_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default: no logs (clean JSON output for parsing)
    // Verbose: show Info level logs for debugging
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    let profile = load_profile(&args)?;
    profile.validate()?;

    log::info!(
        "Profile '{}': {} Hz, hop {} samples, {} classifiers",
        profile.name,
        profile.sample_rate,
        profile.hop_size,
        profile.classifiers.len()
    );

    // Each track runs its own single-threaded pipeline
    let tracks: Vec<TrackOutput> = args
        .inputs
        .par_iter()
        .map(|path| {
            let input_file = path.display().to_string();
            match run_fpgen(path, &profile, args.format.into(), args.summary_only) {
                Ok(track) => track,
                Err(e) => {
                    log::error!("{}: {:#}", input_file, e);
                    TrackOutput::failure(input_file, &e)
                }
            }
        })
        .collect();

    output::print_json_results(&profile.name, profile.hop_duration_secs(), &tracks);

    let failed = tracks.iter().filter(|t| !t.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, tracks.len());
    }

    Ok(())
}

fn load_profile(args: &Args) -> Result<Profile> {
    match &args.profile_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile: {}", path.display()))?;
            Profile::from_toml_str(&text)
                .with_context(|| format!("Invalid profile: {}", path.display()))
        }
        None => Ok(Profile::by_name(&args.profile)?),
    }
}

fn run_fpgen(
    input_path: &Path,
    profile: &Profile,
    format: PcmFormat,
    summary_only: bool,
) -> Result<TrackOutput> {
    let source = RawPcmSource::open(input_path, format, profile.sample_rate)
        .with_context(|| format!("Failed to open input: {}", input_path.display()))?;

    let track = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_path.display().to_string());

    let (sink, rx) = ChannelSink::bounded(4);

    std::thread::scope(|scope| {
        // Batches are consumed off the generating thread
        let consumer = scope.spawn(move || {
            let mut entries: Vec<SubFingerprint> = Vec::new();
            for event in rx.iter() {
                match event {
                    SinkEvent::Batch(batch) => {
                        log::debug!(
                            "{}: {:.0}% ({}/{})",
                            batch.track,
                            batch.progress() * 100.0,
                            batch.processed,
                            batch.total
                        );
                        if !summary_only {
                            entries.extend(batch.entries);
                        }
                    }
                    SinkEvent::Complete => break,
                }
            }
            entries
        });

        let summary = FingerprintGenerator::new(profile, track)?
            .subscribe(sink)
            .generate(source)
            .with_context(|| format!("Fingerprinting failed: {}", input_path.display()))?;

        let entries = consumer
            .join()
            .map_err(|_| anyhow::anyhow!("batch consumer panicked"))?;

        let subfingerprints = if summary_only { None } else { Some(entries) };
        Ok(TrackOutput::success(
            input_path.display().to_string(),
            &summary,
            subfingerprints,
        ))
    })
}
