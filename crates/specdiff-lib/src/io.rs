use crate::error::{PsdError, Result};
use crate::recording::{standard_montage, RawRecording, DEFAULT_FS};
use ndarray::Array3;
use ndarray_npy::NpzReader;
use std::fs::File;
use std::path::Path;

/// Name of the tensor field holding the cut windows inside the `.npz` archive.
pub const TENSOR_FIELD: &str = "windows_data";

/// Load a standard windowed recording (epochs x 60 channels x samples) from an
/// `.npz` file, attaching the fixed montage and sampling rate.
pub fn load_recording(path: &Path) -> Result<RawRecording> {
    let file = File::open(path)?;
    let mut npz = NpzReader::new(file)
        .map_err(|e| PsdError::FileFormat(format!("{}: not an npz archive: {e}", path.display())))?;
    let data: Array3<f64> = npz.by_name(TENSOR_FIELD).map_err(|e| {
        PsdError::FileFormat(format!(
            "{}: field `{TENSOR_FIELD}` missing or not a 3-D f64 tensor: {e}",
            path.display()
        ))
    })?;
    log::info!(
        "loaded {}: shape {:?} (epochs x channels x samples)",
        path.display(),
        data.shape()
    );
    RawRecording::new(data, DEFAULT_FS, standard_montage())
}
