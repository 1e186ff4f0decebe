use crate::error::{PsdError, Result};
use crate::recording::RawRecording;
use crate::table::{flatten, PsdRow};
use crate::window::WindowKind;
use ndarray::{s, Array3};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// One parameterization of the Welch estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub kind: WindowKind,
    /// Samples per Welch segment.
    pub nperseg: usize,
    /// Samples shared between consecutive segments.
    pub noverlap: usize,
}

impl WindowSpec {
    pub fn new(kind: WindowKind, nperseg: usize, noverlap: usize) -> Self {
        Self {
            kind,
            nperseg,
            noverlap,
        }
    }

    /// Derive the overlap sample count from a ratio, truncating toward zero.
    pub fn from_overlap_ratio(kind: WindowKind, nperseg: usize, ratio: f64) -> Self {
        let noverlap = (nperseg as f64 * ratio) as usize;
        Self::new(kind, nperseg, noverlap)
    }

    fn validate(&self, n_samples: usize) -> Result<()> {
        if self.nperseg == 0 {
            return Err(PsdError::InvalidParameter(
                "segment length must be positive".into(),
            ));
        }
        if self.nperseg > n_samples {
            return Err(PsdError::InvalidParameter(format!(
                "segment length {} exceeds the {} available samples per epoch",
                self.nperseg, n_samples
            )));
        }
        if self.noverlap >= self.nperseg {
            return Err(PsdError::InvalidParameter(format!(
                "overlap {} must be strictly less than segment length {}",
                self.noverlap, self.nperseg
            )));
        }
        Ok(())
    }

    /// Number of one-sided frequency bins this parameterization produces.
    pub fn n_bins(&self) -> usize {
        self.nperseg / 2 + 1
    }
}

/// Output of one Welch invocation over a whole recording.
#[derive(Debug, Clone)]
pub struct PsdEstimate {
    /// Shared one-sided frequency axis (Hz), identical for every epoch/channel.
    pub freqs: Vec<f64>,
    /// Power spectral density, shape (epochs, channels, bins).
    pub power: Array3<f64>,
    /// Long-form table: one row per (epoch, channel, frequency bin).
    pub rows: Vec<PsdRow>,
}

/// Welch's averaged-periodogram PSD per epoch and channel.
///
/// Each segment is detrended by removing its mean, multiplied by the DFT-even
/// window, transformed, and accumulated with one-sided density scaling
/// `1 / (fs * sum(w^2))`; interior bins are doubled and segments averaged.
pub fn estimate(raw: &RawRecording, spec: &WindowSpec) -> Result<PsdEstimate> {
    spec.validate(raw.n_samples())?;

    let nperseg = spec.nperseg;
    let n_bins = spec.n_bins();
    let step = nperseg - spec.noverlap;
    let win = spec.kind.periodic(nperseg);
    let win_energy: f64 = win.iter().map(|w| w * w).sum();
    let scale = 1.0 / (raw.fs * win_energy);

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(nperseg);
    let mut frame = vec![0.0; nperseg];
    let mut spectrum = r2c.make_output_vec();

    let mut power = Array3::<f64>::zeros((raw.n_epochs(), raw.n_channels(), n_bins));
    for e in 0..raw.n_epochs() {
        for c in 0..raw.n_channels() {
            let series = raw.data.slice(s![e, c, ..]);
            let mut acc = vec![0.0; n_bins];
            let mut segments = 0usize;
            let mut pos = 0;
            while pos + nperseg <= series.len() {
                let segment = series.slice(s![pos..pos + nperseg]);
                let mean = segment.sum() / nperseg as f64;
                for (i, (&x, &w)) in segment.iter().zip(&win).enumerate() {
                    frame[i] = (x - mean) * w;
                }
                r2c.process(&mut frame, &mut spectrum)
                    .expect("frame length matches the planned FFT");
                for (k, val) in spectrum.iter().enumerate() {
                    let mut p = val.norm_sqr() * scale;
                    if k != 0 && !(nperseg % 2 == 0 && k == nperseg / 2) {
                        p *= 2.0;
                    }
                    acc[k] += p;
                }
                segments += 1;
                pos += step;
            }
            // validate() guarantees at least one full segment
            for (k, total) in acc.iter().enumerate() {
                power[[e, c, k]] = total / segments as f64;
            }
        }
    }

    let freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * raw.fs / nperseg as f64)
        .collect();
    let rows = flatten(&power, &raw.ch_names, &freqs);
    Ok(PsdEstimate { freqs, power, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowKind;
    use ndarray::Array3;
    use std::f64::consts::PI;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    /// Two epochs, one channel, 16 samples at 8 Hz; epoch 1 carries a 2 Hz tone.
    fn tone_recording() -> RawRecording {
        let mut data = Array3::<f64>::zeros((2, 1, 16));
        for t in 0..16 {
            data[[1, 0, t]] = (2.0 * PI * 2.0 * t as f64 / 8.0).sin();
        }
        RawRecording::new(data, 8.0, vec!["C1".into()]).unwrap()
    }

    #[test]
    fn frequency_axis_matches_the_reference_scenario() {
        let raw = tone_recording();
        let spec = WindowSpec::new(WindowKind::Boxcar, 8, 4);
        let est = estimate(&raw, &spec).unwrap();
        assert_eq!(est.freqs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(est.rows.len(), 2 * 1 * 5);
        assert_eq!(est.power.shape(), &[2, 1, 5]);
    }

    #[test]
    fn boxcar_tone_concentrates_density_in_its_bin() {
        let raw = tone_recording();
        let spec = WindowSpec::new(WindowKind::Boxcar, 8, 4);
        let est = estimate(&raw, &spec).unwrap();
        // Unit-amplitude sine: total power 0.5 over a 1 Hz bin width.
        assert_close(est.power[[1, 0, 2]], 0.5, 1e-9);
        for k in [0usize, 1, 3, 4] {
            assert!(est.power[[1, 0, k]].abs() < 1e-12, "leak at bin {k}");
        }
    }

    #[test]
    fn silent_epoch_has_zero_density_everywhere() {
        let raw = tone_recording();
        let spec = WindowSpec::new(WindowKind::Hann, 8, 4);
        let est = estimate(&raw, &spec).unwrap();
        for k in 0..est.freqs.len() {
            assert!(est.power[[0, 0, k]].abs() < 1e-15);
        }
    }

    #[test]
    fn constant_signal_is_removed_by_detrending() {
        let mut data = Array3::<f64>::zeros((1, 1, 16));
        data.fill(3.25);
        let raw = RawRecording::new(data, 8.0, vec!["C1".into()]).unwrap();
        let est = estimate(&raw, &WindowSpec::new(WindowKind::Boxcar, 8, 0)).unwrap();
        for k in 0..est.freqs.len() {
            assert!(est.power[[0, 0, k]].abs() < 1e-20);
        }
    }

    #[test]
    fn overlap_equal_to_segment_length_is_rejected() {
        let raw = tone_recording();
        let err = estimate(&raw, &WindowSpec::new(WindowKind::Hann, 8, 8)).unwrap_err();
        assert!(matches!(err, PsdError::InvalidParameter(_)));
    }

    #[test]
    fn oversized_segment_is_rejected() {
        let raw = tone_recording();
        let err = estimate(&raw, &WindowSpec::new(WindowKind::Hann, 32, 4)).unwrap_err();
        assert!(matches!(err, PsdError::InvalidParameter(_)));
    }

    #[test]
    fn overlap_ratio_truncates_toward_zero() {
        let spec = WindowSpec::from_overlap_ratio(WindowKind::Hann, 250, 0.3);
        assert_eq!(spec.noverlap, 75);
        let spec = WindowSpec::from_overlap_ratio(WindowKind::Hann, 201, 0.8);
        assert_eq!(spec.noverlap, 160);
    }

    #[test]
    fn axis_is_shared_across_epochs_and_channels() {
        let mut data = Array3::<f64>::zeros((3, 2, 64));
        for e in 0..3 {
            for c in 0..2 {
                for t in 0..64 {
                    data[[e, c, t]] =
                        ((e + 1) as f64 * (2.0 * PI * (c + 1) as f64 * t as f64 / 16.0).sin())
                            + 0.1 * e as f64;
                }
            }
        }
        let raw = RawRecording::new(data, 16.0, vec!["A".into(), "B".into()]).unwrap();
        let est = estimate(&raw, &WindowSpec::new(WindowKind::Hamming, 16, 8)).unwrap();
        assert_eq!(est.freqs.len(), 9);
        assert_eq!(est.rows.len(), 3 * 2 * 9);
        // Every row's frequency is drawn from the shared axis.
        for row in &est.rows {
            assert!(est.freqs.contains(&row.freq));
        }
    }
}
