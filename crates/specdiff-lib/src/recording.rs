use crate::error::{PsdError, Result};
use ndarray::Array3;

/// Sampling rate of the standard windowed recordings (Hz).
pub const DEFAULT_FS: f64 = 200.0;

/// Fixed, ordered montage of the 60 EEG sensors in the standard recordings.
pub const STANDARD_MONTAGE: [&str; 60] = [
    "FP1", "FPZ", "FP2", "AF3", "AF4", "F7", "F5", "F3", "F1", "FZ", "F2", "F4", "F6", "F8", "FT7",
    "FC5", "FC3", "FC1", "FCZ", "FC2", "FC4", "FC6", "FT8", "T7", "C5", "C3", "C1", "CZ", "C2",
    "C4", "C6", "T8", "TP7", "CP5", "CP3", "CP1", "CPZ", "CP2", "CP4", "CP6", "TP8", "P7", "P5",
    "P3", "P1", "PZ", "P2", "P4", "P6", "P8", "PO7", "PO5", "PO3", "POZ", "PO4", "PO6", "PO8",
    "O1", "OZ", "O2",
];

pub fn standard_montage() -> Vec<String> {
    STANDARD_MONTAGE.iter().map(|s| s.to_string()).collect()
}

/// In-memory windowed recording with axes (epoch, channel, sample).
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Uniform sampling frequency in Hz.
    pub fs: f64,
    /// Channel names, one per entry along the channel axis.
    pub ch_names: Vec<String>,
    /// Samples, shape (epochs, channels, samples).
    pub data: Array3<f64>,
}

impl RawRecording {
    pub fn new(data: Array3<f64>, fs: f64, ch_names: Vec<String>) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(PsdError::InvalidParameter(format!(
                "sampling rate must be positive, got {fs}"
            )));
        }
        let n_channels = data.shape()[1];
        if n_channels != ch_names.len() {
            return Err(PsdError::FileFormat(format!(
                "channel axis has {} entries but {} channel names are known",
                n_channels,
                ch_names.len()
            )));
        }
        Ok(Self { fs, ch_names, data })
    }

    pub fn n_epochs(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn n_channels(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn n_samples(&self) -> usize {
        self.data.shape()[2]
    }

    /// Duration of one epoch in seconds.
    pub fn epoch_duration(&self) -> f64 {
        self.n_samples() as f64 / self.fs
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|ch| ch == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn montage_has_sixty_unique_names() {
        assert_eq!(STANDARD_MONTAGE.len(), 60);
        let mut names: Vec<&str> = STANDARD_MONTAGE.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 60);
    }

    #[test]
    fn rejects_channel_count_mismatch() {
        let data = Array3::<f64>::zeros((2, 3, 8));
        let err = RawRecording::new(data, 100.0, vec!["A".into(), "B".into()]).unwrap_err();
        assert!(matches!(err, PsdError::FileFormat(_)));
    }

    #[test]
    fn exposes_axis_lengths() {
        let data = Array3::<f64>::zeros((2, 2, 10));
        let raw = RawRecording::new(data, 5.0, vec!["A".into(), "B".into()]).unwrap();
        assert_eq!(raw.n_epochs(), 2);
        assert_eq!(raw.n_channels(), 2);
        assert_eq!(raw.n_samples(), 10);
        assert_eq!(raw.epoch_duration(), 2.0);
        assert_eq!(raw.channel_index("B"), Some(1));
        assert_eq!(raw.channel_index("Z"), None);
    }
}
