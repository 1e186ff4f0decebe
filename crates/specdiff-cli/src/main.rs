use anyhow::{ensure, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use serde::Serialize;
use specdiff_lib::{
    compare::{compare, compare_segmented, BoundaryMembership, EpochSplit},
    io::load_recording,
    recording::RawRecording,
    table::filter_channel,
    welch::{estimate, WindowSpec},
    window::WindowKind,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "specdiff",
    version,
    about = "Welch PSD comparison tools for windowed EEG recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Membership {
    Lower,
    Upper,
    Neither,
}

impl From<Membership> for BoundaryMembership {
    fn from(value: Membership) -> Self {
        match value {
            Membership::Lower => BoundaryMembership::Lower,
            Membership::Upper => BoundaryMembership::Upper,
            Membership::Neither => BoundaryMembership::Neither,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported window function names
    Windows,
    /// Compute a Welch PSD long-form table from a windowed `.npz` recording
    Psd {
        #[arg(long)]
        input: PathBuf,
        /// Override the sampling rate attached by the loader (Hz)
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long, default_value = "hann")]
        window: String,
        #[arg(long, default_value_t = 200)]
        nperseg: usize,
        #[arg(long, default_value_t = 0.2)]
        overlap_ratio: f64,
        /// Restrict CSV export to one channel
        #[arg(long)]
        channel: Option<String>,
        /// Write the long-form rows to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Compare two Welch parameterizations over one channel
    Compare {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value = "hann")]
        window_a: String,
        #[arg(long, default_value_t = 200)]
        nperseg_a: usize,
        #[arg(long, default_value_t = 0.2)]
        overlap_ratio_a: f64,
        #[arg(long, default_value = "hann")]
        window_b: String,
        #[arg(long, default_value_t = 200)]
        nperseg_b: usize,
        #[arg(long, default_value_t = 0.8)]
        overlap_ratio_b: f64,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Segment-averaged comparison of two Welch parameterizations
    CompareSegmented {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value = "hann")]
        window_a: String,
        #[arg(long, default_value_t = 200)]
        nperseg_a: usize,
        #[arg(long, default_value_t = 0.2)]
        overlap_ratio_a: f64,
        #[arg(long, default_value = "hann")]
        window_b: String,
        #[arg(long, default_value_t = 200)]
        nperseg_b: usize,
        #[arg(long, default_value_t = 0.8)]
        overlap_ratio_b: f64,
        /// Epoch index splitting the two bands
        #[arg(long, default_value_t = 14)]
        boundary: usize,
        /// Which band keeps the boundary epoch itself
        #[arg(long, value_enum, default_value = "neither")]
        membership: Membership,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Render the per-epoch comparison to a PNG scatter plot
    Plot {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        fs: Option<f64>,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value = "hann")]
        window_a: String,
        #[arg(long, default_value_t = 200)]
        nperseg_a: usize,
        #[arg(long, default_value_t = 0.2)]
        overlap_ratio_a: f64,
        #[arg(long, default_value = "hann")]
        window_b: String,
        #[arg(long, default_value_t = 200)]
        nperseg_b: usize,
        #[arg(long, default_value_t = 0.8)]
        overlap_ratio_b: f64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render every supported window's shape and normalized frequency
    /// response to a PNG, showing the spectral-leakage trade-offs
    PlotWindows {
        /// Window length in samples
        #[arg(long, default_value_t = 51)]
        n: usize,
        /// Zero-padded FFT length for the response panel
        #[arg(long, default_value_t = 2048)]
        n_fft: usize,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Windows => cmd_windows()?,
        Commands::Psd {
            input,
            fs,
            window,
            nperseg,
            overlap_ratio,
            channel,
            csv,
        } => cmd_psd(
            &input,
            fs,
            &window,
            nperseg,
            overlap_ratio,
            channel.as_deref(),
            csv.as_deref(),
        )?,
        Commands::Compare {
            input,
            fs,
            channel,
            window_a,
            nperseg_a,
            overlap_ratio_a,
            window_b,
            nperseg_b,
            overlap_ratio_b,
            csv,
        } => {
            let a = window_spec(&window_a, nperseg_a, overlap_ratio_a)?;
            let b = window_spec(&window_b, nperseg_b, overlap_ratio_b)?;
            cmd_compare(&input, fs, &channel, &a, &b, csv.as_deref())?
        }
        Commands::CompareSegmented {
            input,
            fs,
            channel,
            window_a,
            nperseg_a,
            overlap_ratio_a,
            window_b,
            nperseg_b,
            overlap_ratio_b,
            boundary,
            membership,
            csv,
        } => {
            let a = window_spec(&window_a, nperseg_a, overlap_ratio_a)?;
            let b = window_spec(&window_b, nperseg_b, overlap_ratio_b)?;
            let split = EpochSplit::new(boundary, membership.into());
            cmd_compare_segmented(&input, fs, &channel, &a, &b, split, csv.as_deref())?
        }
        Commands::Plot {
            input,
            fs,
            channel,
            window_a,
            nperseg_a,
            overlap_ratio_a,
            window_b,
            nperseg_b,
            overlap_ratio_b,
            out,
        } => {
            let a = window_spec(&window_a, nperseg_a, overlap_ratio_a)?;
            let b = window_spec(&window_b, nperseg_b, overlap_ratio_b)?;
            cmd_plot(&input, fs, &channel, &a, &b, &out)?
        }
        Commands::PlotWindows { n, n_fft, out } => cmd_plot_windows(n, n_fft, &out)?,
    }
    Ok(())
}

fn load_raw(input: &Path, fs: Option<f64>) -> Result<RawRecording> {
    let mut raw = load_recording(input)?;
    if let Some(fs) = fs {
        ensure!(fs.is_finite() && fs > 0.0, "--fs must be positive, got {fs}");
        raw.fs = fs;
    }
    Ok(raw)
}

fn window_spec(window: &str, nperseg: usize, overlap_ratio: f64) -> Result<WindowSpec> {
    let kind: WindowKind = window.parse()?;
    ensure!(
        (0.0..1.0).contains(&overlap_ratio),
        "--overlap-ratio must be in [0, 1), got {overlap_ratio}"
    );
    Ok(WindowSpec::from_overlap_ratio(kind, nperseg, overlap_ratio))
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn cmd_windows() -> Result<()> {
    let names: Vec<&str> = WindowKind::ALL.iter().map(|w| w.name()).collect();
    println!("{}", serde_json::to_string(&names)?);
    Ok(())
}

#[derive(Serialize)]
struct PsdSummary<'a> {
    epochs: usize,
    channels: usize,
    samples: usize,
    fs: f64,
    window: &'a str,
    nperseg: usize,
    noverlap: usize,
    n_bins: usize,
    freq_step: f64,
    freq_max: f64,
    n_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

fn cmd_psd(
    input: &Path,
    fs: Option<f64>,
    window: &str,
    nperseg: usize,
    overlap_ratio: f64,
    channel: Option<&str>,
    csv: Option<&Path>,
) -> Result<()> {
    let raw = load_raw(input, fs)?;
    let spec = window_spec(window, nperseg, overlap_ratio)?;
    if let Some(ch) = channel {
        ensure!(
            raw.channel_index(ch).is_some(),
            "unknown channel name `{ch}`"
        );
    }
    let est = estimate(&raw, &spec)?;
    if let Some(path) = csv {
        match channel {
            Some(ch) => write_csv(path, &filter_channel(&est.rows, ch))?,
            None => write_csv(path, &est.rows)?,
        }
    }
    let summary = PsdSummary {
        epochs: raw.n_epochs(),
        channels: raw.n_channels(),
        samples: raw.n_samples(),
        fs: raw.fs,
        window: spec.kind.name(),
        nperseg: spec.nperseg,
        noverlap: spec.noverlap,
        n_bins: est.freqs.len(),
        freq_step: raw.fs / spec.nperseg as f64,
        freq_max: est.freqs.last().copied().unwrap_or(0.0),
        n_rows: est.rows.len(),
        channel,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[derive(Serialize)]
struct CompareSummary<'a> {
    channel: &'a str,
    window_a: &'a str,
    nperseg_a: usize,
    noverlap_a: usize,
    window_b: &'a str,
    nperseg_b: usize,
    noverlap_b: usize,
    n_bins: usize,
    n_rows: usize,
    max_diff: f64,
    mean_diff: f64,
}

fn cmd_compare(
    input: &Path,
    fs: Option<f64>,
    channel: &str,
    a: &WindowSpec,
    b: &WindowSpec,
    csv: Option<&Path>,
) -> Result<()> {
    let raw = load_raw(input, fs)?;
    let cmp = compare(&raw, channel, a, b)?;
    if let Some(path) = csv {
        write_csv(path, &cmp.diff)?;
    }
    let max_diff = cmp.diff.iter().map(|r| r.value_diff).fold(0.0, f64::max);
    let mean_diff = if cmp.diff.is_empty() {
        0.0
    } else {
        cmp.diff.iter().map(|r| r.value_diff).sum::<f64>() / cmp.diff.len() as f64
    };
    let summary = CompareSummary {
        channel,
        window_a: a.kind.name(),
        nperseg_a: a.nperseg,
        noverlap_a: a.noverlap,
        window_b: b.kind.name(),
        nperseg_b: b.nperseg,
        noverlap_b: b.noverlap,
        n_bins: a.n_bins(),
        n_rows: cmp.diff.len(),
        max_diff,
        mean_diff,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_compare_segmented(
    input: &Path,
    fs: Option<f64>,
    channel: &str,
    a: &WindowSpec,
    b: &WindowSpec,
    split: EpochSplit,
    csv: Option<&Path>,
) -> Result<()> {
    let raw = load_raw(input, fs)?;
    let rows = compare_segmented(&raw, channel, a, b, split)?;
    if let Some(path) = csv {
        write_csv(path, &rows)?;
    }
    println!("{}", serde_json::to_string(&rows)?);
    Ok(())
}

fn cmd_plot(
    input: &Path,
    fs: Option<f64>,
    channel: &str,
    a: &WindowSpec,
    b: &WindowSpec,
    out: &Path,
) -> Result<()> {
    let raw = load_raw(input, fs)?;
    let cmp = compare(&raw, channel, a, b)?;

    let root = BitMapBackend::new(out, (800, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    let freq_max = cmp
        .diff
        .iter()
        .map(|r| r.freq)
        .fold(0.0, f64::max)
        .max(1.0);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            format!("Diff({}, {}) @ {}", a.kind, b.kind, channel),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..freq_max, -20.0..-10.0)?;
    chart
        .configure_mesh()
        .x_desc("frequency [Hz]")
        .y_desc("log10 PSD [V**2/Hz]")
        .draw()?;
    for e in 0..raw.n_epochs() {
        let color = Palette99::pick(e);
        chart.draw_series(
            cmp.diff
                .iter()
                .filter(|r| r.epoch_idx == e)
                .map(|r| Circle::new((r.freq, log10_floor(r.value_diff)), 2, color.filled())),
        )?;
    }
    root.present()?;
    Ok(())
}

fn log10_floor(value: f64) -> f64 {
    value.max(1e-30).log10()
}

const RESPONSE_FLOOR: f64 = 1e-8;

fn cmd_plot_windows(n: usize, n_fft: usize, out: &Path) -> Result<()> {
    let root = BitMapBackend::new(out, (900, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(360);

    let mut shapes = ChartBuilder::on(&upper)
        .margin(10)
        .caption("Window shapes", ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..(n as f64 - 1.0).max(1.0), -0.1..1.05)?;
    shapes
        .configure_mesh()
        .x_desc("sample")
        .y_desc("amplitude")
        .draw()?;
    for (i, kind) in WindowKind::ALL.iter().enumerate() {
        let color = Palette99::pick(i);
        let w = kind.symmetric(n);
        shapes
            .draw_series(LineSeries::new(
                w.iter().enumerate().map(|(t, v)| (t as f64, *v)),
                &color,
            ))?
            .label(kind.name())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], color.stroke_width(2))
            });
    }
    shapes
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;

    let mut responses = ChartBuilder::on(&lower)
        .margin(10)
        .caption("Frequency responses of the windows", ("sans-serif", 24))
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..0.5, (RESPONSE_FLOOR..1.0).log_scale())?;
    responses
        .configure_mesh()
        .x_desc("normalized frequency [cycles per sample]")
        .y_desc("normalized magnitude")
        .draw()?;
    for (i, kind) in WindowKind::ALL.iter().enumerate() {
        let color = Palette99::pick(i);
        let (freqs, resp) = kind.frequency_response(n, n_fft)?;
        responses.draw_series(LineSeries::new(
            freqs
                .iter()
                .zip(&resp)
                .map(|(f, r)| (*f, r.max(RESPONSE_FLOOR))),
            &color,
        ))?;
    }
    root.present()?;
    Ok(())
}
