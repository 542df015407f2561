/// Filter Bench: QuadWarp filter measurement CLI.
///
/// Usage:
///   filter-bench sweep   [FILTER] [--cutoff HZ] [--reso R] [--start F1] [--end F2] [--points N] [--csv FILE]
///   filter-bench impulse [FILTER] [--cutoff HZ] [--reso R] [--samples N]
///   filter-bench render  [FILTER] [--from HZ] [--to HZ] [--duration S] [--seed N] [--output FILE]
///
/// FILTER: --family k35|warp --response lowpass|highpass|notch|bandpass|allpass
///         --stages 1-4 --saturator tanh|soft --saturation S --sample-rate SR --block-size B
///
/// Set RUST_LOG=debug for per-block parameter traces.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use quadwarp_dsp::filter::{FAMILY_K35, FAMILY_RESONANCE_WARP};
use quadwarp_dsp::tuning::pitch_for_frequency;
use quadwarp_dsp::{EqualTemperament, FilterType, Lanes, QuadFilter, LANES};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filter-bench")]
#[command(about = "Measure and render QuadWarp filters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Frequency response sweep (log scale)
    Sweep {
        #[command(flatten)]
        filter: FilterArgs,

        /// Cutoff frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        cutoff: f32,

        /// Resonance, 0..1
        #[arg(long, default_value_t = 0.5)]
        reso: f32,

        /// First measured frequency in Hz
        #[arg(long, default_value_t = 20.0)]
        start: f64,

        /// Last measured frequency in Hz
        #[arg(long, default_value_t = 20_000.0)]
        end: f64,

        /// Number of measured frequencies
        #[arg(long, default_value_t = 40)]
        points: usize,

        /// Probe sine amplitude
        #[arg(long, default_value_t = 0.01)]
        amplitude: f64,

        /// Also write the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the first samples of the impulse response
    Impulse {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, default_value_t = 1000.0)]
        cutoff: f32,

        #[arg(long, default_value_t = 0.5)]
        reso: f32,

        /// Number of samples to print
        #[arg(short = 'n', long, default_value_t = 32)]
        samples: usize,
    },

    /// White noise through a block-rate cutoff sweep, one resonance per channel
    Render {
        #[command(flatten)]
        filter: FilterArgs,

        /// Cutoff at the start of the sweep in Hz
        #[arg(long, default_value_t = 100.0)]
        from: f32,

        /// Cutoff at the end of the sweep in Hz
        #[arg(long, default_value_t = 8000.0)]
        to: f32,

        /// Duration in seconds
        #[arg(short, long, default_value_t = 4.0)]
        duration: f64,

        /// Noise seed
        #[arg(long, default_value_t = 1)]
        seed: u64,

        #[arg(short, long, default_value = "/tmp/filter_render.wav")]
        output: PathBuf,
    },
}

#[derive(Args, Clone, Debug)]
struct FilterArgs {
    #[arg(long, value_enum, default_value_t = Family::Warp)]
    family: Family,

    #[arg(long, value_enum, default_value_t = Response::Lowpass)]
    response: Response,

    /// ResonanceWarp stage count
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=4))]
    stages: u8,

    /// ResonanceWarp register saturator
    #[arg(long, value_enum, default_value_t = SaturatorArg::Tanh)]
    saturator: SaturatorArg,

    /// K35 drive; 0 is linear
    #[arg(long, default_value_t = 0.0)]
    saturation: f32,

    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Samples per parameter update
    #[arg(long, default_value_t = 32)]
    block_size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Family {
    K35,
    Warp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Response {
    Lowpass,
    Highpass,
    Notch,
    Bandpass,
    Allpass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SaturatorArg {
    Tanh,
    Soft,
}

impl FilterArgs {
    /// Resolve flags through the same selector codes a host would send.
    fn filter_type(&self) -> Result<FilterType> {
        let family = match self.family {
            Family::K35 => FAMILY_K35,
            Family::Warp => FAMILY_RESONANCE_WARP,
        };
        let response = self.response as u8;
        let saturator = match self.saturator {
            SaturatorArg::Tanh => 0u8,
            SaturatorArg::Soft => 1u8,
        };
        let subtype = (self.stages - 1) | saturator << 2;
        FilterType::from_codes(family, response, subtype, self.saturation)
            .with_context(|| format!("{:?} does not support {:?}", self.family, self.response))
    }

    fn build(&self) -> Result<QuadFilter> {
        let filter_type = self.filter_type()?;
        info!(?filter_type, sample_rate = self.sample_rate, block_size = self.block_size, "filter configured");
        QuadFilter::new(filter_type, self.sample_rate as f32, self.block_size)
            .with_context(|| format!("cannot run at {} Hz", self.sample_rate))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sweep {
            filter,
            cutoff,
            reso,
            start,
            end,
            points,
            amplitude,
            csv,
        } => cmd_sweep(&filter, cutoff, reso, start, end, points, amplitude, csv),
        Commands::Impulse {
            filter,
            cutoff,
            reso,
            samples,
        } => cmd_impulse(&filter, cutoff, reso, samples),
        Commands::Render {
            filter,
            from,
            to,
            duration,
            seed,
            output,
        } => cmd_render(&filter, from, to, duration, seed, &output),
    }
}

// ─── Frequency sweep ────────────────────────────────────────────────────────

/// Gain of lane 0 at `freq`: settle for 0.2 s, then DFT over 0.1 s.
fn measure_gain_at(filter: &mut QuadFilter, freq: f64, amplitude: f64) -> f64 {
    filter.reset();
    let sr = filter.sample_rate() as f64;
    let n_settle = (sr * 0.2) as usize;
    let n_measure = (sr * 0.1) as usize;

    let mut measured = Vec::with_capacity(n_measure);
    for i in 0..n_settle + n_measure {
        let t = i as f64 / sr;
        let x = (amplitude * (2.0 * PI * freq * t).sin()) as f32;
        let y = filter.process(Lanes::splat(x)).lane(0);
        if i >= n_settle {
            measured.push(y as f64);
        }
    }

    dft_magnitude(&measured, freq, sr) / amplitude
}

#[allow(clippy::too_many_arguments)]
fn cmd_sweep(
    args: &FilterArgs,
    cutoff: f32,
    reso: f32,
    start: f64,
    end: f64,
    points: usize,
    amplitude: f64,
    csv: Option<PathBuf>,
) -> Result<()> {
    let mut filter = args.build()?;
    filter.set_params(pitch_for_frequency(cutoff), reso, &EqualTemperament);
    let nyquist = filter.sample_rate() as f64 / 2.0;
    let end = end.min(nyquist * 0.99);

    println!("Frequency response: {:?}", filter.filter_type());
    println!("  Cutoff: {cutoff:.0} Hz  Reso: {reso:.2}  Amplitude: {amplitude:.4}");
    println!();
    println!("{:>10}  {:>10}", "Freq (Hz)", "Gain (dB)");
    println!("{:>10}  {:>10}", "─────────", "─────────");

    let mut csv_lines = vec!["freq_hz,gain_db".to_string()];
    for i in 0..points {
        let t = if points > 1 { i as f64 / (points - 1) as f64 } else { 0.0 };
        let freq = start * (end / start).powf(t);
        let gain = measure_gain_at(&mut filter, freq, amplitude);
        let gain_db = 20.0 * gain.max(1e-9).log10();
        debug!(freq, gain, "measured");
        println!("{freq:>10.1}  {gain_db:>10.2}");
        csv_lines.push(format!("{freq:.1},{gain_db:.2}"));
    }

    if let Some(path) = csv {
        std::fs::write(&path, csv_lines.join("\n") + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\nCSV written to {}", path.display());
    }
    Ok(())
}

// ─── Impulse response ───────────────────────────────────────────────────────

fn cmd_impulse(args: &FilterArgs, cutoff: f32, reso: f32, samples: usize) -> Result<()> {
    let mut filter = args.build()?;
    filter.set_params(pitch_for_frequency(cutoff), reso, &EqualTemperament);

    println!("Impulse response: {:?}", filter.filter_type());
    println!("  Cutoff: {cutoff:.0} Hz  Reso: {reso:.2}");
    println!();
    for n in 0..samples {
        let x = if n == 0 { 1.0 } else { 0.0 };
        let y = filter.process(Lanes::splat(x)).lane(0);
        println!("{n:>6}  {y:+.9}");
    }
    Ok(())
}

// ─── Swept-noise render ─────────────────────────────────────────────────────

/// Per-channel resonance in the render.
const RENDER_RESONANCE: [f32; LANES] = [0.0, 0.33, 0.66, 1.0];
const NOISE_LEVEL: f32 = 0.25;

fn cmd_render(
    args: &FilterArgs,
    from: f32,
    to: f32,
    duration: f64,
    seed: u64,
    output: &Path,
) -> Result<()> {
    let mut filter = args.build()?;
    let sample_rate = args.sample_rate;
    let block_size = filter.block_size();
    let n_samples = (duration * sample_rate as f64).round() as usize;
    let n_blocks = n_samples.div_ceil(block_size).max(1);

    let mut rng = Pcg32::seed_from_u64(seed);
    let mut rendered: Vec<Lanes> = Vec::with_capacity(n_blocks * block_size);
    let mut block = vec![Lanes::ZERO; block_size];

    for b in 0..n_blocks {
        // Exponential sweep, one cutoff per block.
        let t = if n_blocks > 1 { b as f32 / (n_blocks - 1) as f32 } else { 0.0 };
        let cutoff = from * (to / from).powf(t);
        let pitch = pitch_for_frequency(cutoff);
        for (lane, &reso) in RENDER_RESONANCE.iter().enumerate() {
            filter.set_lane_params(lane, pitch, reso, &EqualTemperament)?;
        }
        debug!(block = b, cutoff, "retarget");

        for frame in block.iter_mut() {
            *frame = Lanes::from_array(std::array::from_fn(|_| {
                rng.gen_range(-NOISE_LEVEL..NOISE_LEVEL)
            }));
        }
        filter.process_block(&mut block);
        rendered.extend_from_slice(&block);
    }
    rendered.truncate(n_samples);

    // Normalize to -3 dBFS if needed
    let peak = rendered
        .iter()
        .flat_map(|frame| frame.to_array())
        .fold(0.0f32, |acc, x| acc.max(x.abs()));
    let peak_dbfs = if peak > 0.0 { 20.0 * peak.log10() } else { -120.0 };
    let scale = if peak > 0.7 { 0.7 / peak } else { 1.0 };

    let spec = hound::WavSpec {
        channels: LANES as u16,
        sample_rate,
        bits_per_sample: 24,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let max_val = (1 << 23) - 1;
    for frame in &rendered {
        for sample in frame.to_array() {
            let scaled = (sample * scale * max_val as f32).round() as i32;
            writer.write_sample(scaled.clamp(-max_val, max_val))?;
        }
    }
    writer.finalize()?;
    info!(frames = rendered.len(), path = %output.display(), "render written");

    println!("Render complete");
    println!("  Filter:    {:?}", filter.filter_type());
    println!("  Sweep:     {from:.0} Hz -> {to:.0} Hz");
    println!("  Channels:  reso {RENDER_RESONANCE:?}");
    println!("  Duration:  {duration:.1}s");
    println!("  Peak:      {peak_dbfs:.1} dBFS (raw)");
    println!("  Output:    {}", output.display());
    Ok(())
}

// ─── DFT helper ─────────────────────────────────────────────────────────────

fn dft_magnitude(signal: &[f64], freq: f64, sr: f64) -> f64 {
    let n = signal.len() as f64;
    let mut re = 0.0;
    let mut im = 0.0;
    for (i, &s) in signal.iter().enumerate() {
        let phase = 2.0 * PI * freq * i as f64 / sr;
        re += s * phase.cos();
        im -= s * phase.sin();
    }
    2.0 * ((re / n).powi(2) + (im / n).powi(2)).sqrt()
}
