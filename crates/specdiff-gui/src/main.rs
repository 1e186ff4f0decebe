use anyhow::Result;
use eframe::{egui, egui::ViewportBuilder};
use egui_plot::{Legend, Plot, Points};
use rfd::FileDialog;
use specdiff_lib::compare::{compare, compare_segmented, BoundaryMembership, EpochSplit};
use specdiff_lib::io::load_recording;
use specdiff_lib::recording::{RawRecording, STANDARD_MONTAGE};
use specdiff_lib::welch::WindowSpec;
use specdiff_lib::window::WindowKind;
use std::env;
use std::path::Path;

fn main() -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default().with_inner_size([1280.0, 860.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Spectral Window Explorer",
        native_options,
        Box::new(|_cc| Ok(Box::new(SpecdiffApp::from_args()))),
    )
}

const NPERSEG_RANGE: std::ops::RangeInclusive<usize> = 100..=500;
const OVERLAP_RANGE: std::ops::RangeInclusive<f64> = 0.2..=0.8;
const LOG_FLOOR: f64 = 1e-30;

#[derive(Clone, PartialEq)]
struct SideParams {
    window: WindowKind,
    nperseg: usize,
    overlap_ratio: f64,
}

impl SideParams {
    fn new(overlap_ratio: f64) -> Self {
        Self {
            window: WindowKind::Hann,
            nperseg: 200,
            overlap_ratio,
        }
    }

    fn spec(&self) -> WindowSpec {
        WindowSpec::from_overlap_ratio(self.window, self.nperseg, self.overlap_ratio)
    }
}

/// One named scatter series, already in (frequency, log10 density) space.
type Series = (String, Vec<[f64; 2]>);

struct Computed {
    title_a: String,
    title_b: String,
    per_epoch_a: Vec<Series>,
    per_epoch_b: Vec<Series>,
    per_epoch_diff: Vec<Series>,
    segment_diff: Vec<Series>,
}

#[derive(Clone, PartialEq)]
struct ComputeKey {
    generation: u64,
    channel: String,
    a: SideParams,
    b: SideParams,
}

struct SpecdiffApp {
    raw: Option<RawRecording>,
    raw_path: Option<String>,
    generation: u64,
    channel: String,
    a: SideParams,
    b: SideParams,
    status: String,
    computed: Option<Computed>,
    last_key: Option<ComputeKey>,
}

impl Default for SpecdiffApp {
    fn default() -> Self {
        Self {
            raw: None,
            raw_path: None,
            generation: 0,
            channel: STANDARD_MONTAGE[0].to_string(),
            a: SideParams::new(0.2),
            b: SideParams::new(0.8),
            status: "Load a windowed recording (.npz) to begin.".to_string(),
            computed: None,
            last_key: None,
        }
    }
}

impl SpecdiffApp {
    fn from_args() -> Self {
        let mut app = Self::default();
        if let Some(path) = env::args().nth(1) {
            if let Err(err) = app.load(Path::new(&path)) {
                app.status = format!("Failed to load {path}: {err}");
            }
        }
        app
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let raw = load_recording(path)?;
        if !raw.ch_names.contains(&self.channel) {
            self.channel = raw
                .ch_names
                .first()
                .cloned()
                .unwrap_or_else(|| STANDARD_MONTAGE[0].to_string());
        }
        self.status = format!(
            "Loaded {} ({} epochs x {} channels x {} samples @ {:.0} Hz)",
            path.display(),
            raw.n_epochs(),
            raw.n_channels(),
            raw.n_samples(),
            raw.fs
        );
        self.raw = Some(raw);
        self.raw_path = Some(path.display().to_string());
        self.generation += 1;
        Ok(())
    }

    fn key(&self) -> ComputeKey {
        ComputeKey {
            generation: self.generation,
            channel: self.channel.clone(),
            a: self.a.clone(),
            b: self.b.clone(),
        }
    }

    fn recompute_if_stale(&mut self) {
        let key = self.key();
        if self.last_key.as_ref() == Some(&key) {
            return;
        }
        self.last_key = Some(key);
        let Some(raw) = &self.raw else {
            return;
        };
        match build_plots(raw, &self.channel, &self.a, &self.b) {
            Ok(computed) => {
                // Replace any stale error text from an earlier failed recompute.
                self.status = format!(
                    "Compared {} and {} on {}",
                    self.a.window, self.b.window, self.channel
                );
                self.computed = Some(computed);
            }
            Err(err) => {
                self.computed = None;
                self.status = format!("{err}");
            }
        }
    }

    fn side_controls(ui: &mut egui::Ui, label: &str, params: &mut SideParams) {
        ui.heading(label);
        egui::ComboBox::from_id_salt(label)
            .selected_text(params.window.name())
            .show_ui(ui, |ui| {
                for kind in WindowKind::ALL {
                    ui.selectable_value(&mut params.window, kind, kind.name());
                }
            });
        ui.add(egui::Slider::new(&mut params.nperseg, NPERSEG_RANGE).text("Segment length"));
        ui.add(egui::Slider::new(&mut params.overlap_ratio, OVERLAP_RANGE).text("Overlap ratio"));
    }

    fn show_controls(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("controls").show(ctx, |ui| {
            ui.heading("Recording");
            if ui.button("Load recording").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("Windowed recording", &["npz"])
                    .pick_file()
                {
                    if let Err(err) = self.load(&path) {
                        self.status = format!("Failed to load {}: {err}", path.display());
                    }
                }
            }
            if let Some(path) = &self.raw_path {
                ui.monospace(path);
            }

            ui.separator();
            let channels: Vec<String> = match &self.raw {
                Some(raw) => raw.ch_names.clone(),
                None => specdiff_lib::recording::standard_montage(),
            };
            egui::ComboBox::from_label("Channel")
                .selected_text(&self.channel)
                .show_ui(ui, |ui| {
                    for name in &channels {
                        ui.selectable_value(&mut self.channel, name.clone(), name);
                    }
                });

            ui.separator();
            Self::side_controls(ui, "Parameters A", &mut self.a);
            ui.separator();
            Self::side_controls(ui, "Parameters B", &mut self.b);

            ui.separator();
            ui.label(format!("Status: {}", self.status));
        });
    }

    fn show_plots(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(computed) = &self.computed else {
                ui.centered_and_justified(|ui| {
                    ui.label("Load a recording to see the spectra.");
                });
                return;
            };
            egui::ScrollArea::vertical().show(ui, |ui| {
                scatter_plot(ui, "psd_a", &computed.title_a, &computed.per_epoch_a);
                scatter_plot(ui, "psd_b", &computed.title_b, &computed.per_epoch_b);
                scatter_plot(
                    ui,
                    "diff",
                    "Per-epoch |A - B| difference",
                    &computed.per_epoch_diff,
                );
                scatter_plot(
                    ui,
                    "diff_mean",
                    "Segment-averaged |A - B| difference",
                    &computed.segment_diff,
                );
            });
        });
    }
}

impl eframe::App for SpecdiffApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.recompute_if_stale();
        self.show_controls(ctx);
        self.show_plots(ctx);
    }
}

fn log10_floor(value: f64) -> f64 {
    value.max(LOG_FLOOR).log10()
}

fn scatter_plot(ui: &mut egui::Ui, id: &str, title: &str, series: &[Series]) {
    ui.label(title);
    Plot::new(id)
        .height(230.0)
        .legend(Legend::default())
        .include_y(-20.0)
        .include_y(-10.0)
        .x_axis_label("frequency [Hz]")
        .y_axis_label("log10 PSD [V**2/Hz]")
        .show(ui, |plot_ui| {
            for (name, points) in series {
                plot_ui.points(Points::new(points.clone()).radius(1.5).name(name));
            }
        });
    ui.separator();
}

fn side_title(channel: &str, spec: &WindowSpec) -> String {
    format!(
        "Welch output: {channel}, {} | {} | {}",
        spec.kind, spec.nperseg, spec.noverlap
    )
}

fn build_plots(
    raw: &RawRecording,
    channel: &str,
    a: &SideParams,
    b: &SideParams,
) -> Result<Computed> {
    let spec_a = a.spec();
    let spec_b = b.spec();
    let cmp = compare(raw, channel, &spec_a, &spec_b)?;

    let n_epochs = raw.n_epochs();
    let mut per_epoch_a: Vec<Series> = Vec::with_capacity(n_epochs);
    let mut per_epoch_b: Vec<Series> = Vec::with_capacity(n_epochs);
    let mut per_epoch_diff: Vec<Series> = Vec::with_capacity(n_epochs);
    for e in 0..n_epochs {
        let label = format!("epoch {}", e + 1);
        per_epoch_a.push((label.clone(), Vec::new()));
        per_epoch_b.push((label.clone(), Vec::new()));
        per_epoch_diff.push((label, Vec::new()));
    }
    for row in &cmp.diff {
        per_epoch_a[row.epoch_idx]
            .1
            .push([row.freq, log10_floor(row.value_a)]);
        per_epoch_b[row.epoch_idx]
            .1
            .push([row.freq, log10_floor(row.value_b)]);
        per_epoch_diff[row.epoch_idx]
            .1
            .push([row.freq, log10_floor(row.value_diff)]);
    }

    // Fall back to a midpoint split when the recording is too short for the
    // default boundary to leave both bands non-empty.
    let mut split = EpochSplit::default();
    if split.bands(n_epochs).is_err() {
        split = EpochSplit::new(n_epochs / 2, BoundaryMembership::Lower);
    }
    let mut segment_diff: Vec<Series> = Vec::new();
    for row in compare_segmented(raw, channel, &spec_a, &spec_b, split)? {
        let label = format!("epochs {}", row.segment);
        let point = [row.freq, log10_floor(row.value_diff)];
        match segment_diff.iter_mut().find(|(name, _)| *name == label) {
            Some((_, points)) => points.push(point),
            None => segment_diff.push((label, vec![point])),
        }
    }

    Ok(Computed {
        title_a: side_title(channel, &spec_a),
        title_b: side_title(channel, &spec_b),
        per_epoch_a,
        per_epoch_b,
        per_epoch_diff,
        segment_diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn small_app() -> SpecdiffApp {
        let data = Array3::<f64>::zeros((4, 2, 64));
        let raw = RawRecording::new(data, 16.0, vec!["A".into(), "B".into()]).unwrap();
        let mut app = SpecdiffApp::default();
        app.raw = Some(raw);
        app.channel = "A".to_string();
        app.a.nperseg = 32;
        app.b.nperseg = 32;
        app
    }

    #[test]
    fn default_channel_is_the_first_montage_entry() {
        let app = SpecdiffApp::default();
        assert_eq!(app.channel, STANDARD_MONTAGE[0]);
        assert_eq!(app.channel, "FP1");
    }

    #[test]
    fn successful_recompute_replaces_a_stale_error() {
        let mut app = small_app();
        app.status = "unknown channel name `nope`".to_string();
        app.recompute_if_stale();
        assert!(app.computed.is_some());
        assert!(
            app.status.starts_with("Compared"),
            "stale status survived: {}",
            app.status
        );
    }

    #[test]
    fn failed_recompute_surfaces_the_error() {
        let mut app = small_app();
        app.channel = "nope".to_string();
        app.recompute_if_stale();
        assert!(app.computed.is_none());
        assert!(app.status.contains("nope"), "status: {}", app.status);
    }

    #[test]
    fn short_recordings_fall_back_to_a_midpoint_split() {
        let app = small_app();
        let raw = app.raw.as_ref().unwrap();
        let computed = build_plots(raw, "A", &app.a, &app.b).unwrap();
        assert_eq!(computed.per_epoch_a.len(), 4);
        assert_eq!(computed.segment_diff.len(), 2);
    }
}
