use crate::error::{PsdError, Result};
use crate::recording::RawRecording;
use crate::table::PsdRow;
use crate::welch::{estimate, PsdEstimate, WindowSpec};
use serde::{Deserialize, Serialize};

/// One aligned (epoch, channel, frequency) pair from both comparison sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRow {
    pub epoch_idx: usize,
    pub ch_name: String,
    pub freq: f64,
    pub value_a: f64,
    pub value_b: f64,
    pub value_diff: f64,
}

/// Output of [`compare`]: both full long-form tables plus the per-epoch
/// difference restricted to the selected channel.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub rows_a: Vec<PsdRow>,
    pub rows_b: Vec<PsdRow>,
    pub diff: Vec<DiffRow>,
}

/// Which band, if any, the boundary epoch itself belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMembership {
    Lower,
    Upper,
    /// The boundary epoch is excluded from both bands. This reproduces the
    /// historical `< boundary` / `> boundary` partition; band labels expose
    /// the gap rather than hiding it.
    Neither,
}

/// Partition of the epoch axis into two bands around a boundary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSplit {
    pub boundary: usize,
    pub membership: BoundaryMembership,
}

impl Default for EpochSplit {
    fn default() -> Self {
        Self {
            boundary: 14,
            membership: BoundaryMembership::Neither,
        }
    }
}

impl EpochSplit {
    pub fn new(boundary: usize, membership: BoundaryMembership) -> Self {
        Self {
            boundary,
            membership,
        }
    }

    /// Resolve the two bands as (1-based label, epoch indices). Errors if a
    /// band ends up empty, which would make its mean undefined.
    pub fn bands(&self, n_epochs: usize) -> Result<[(String, Vec<usize>); 2]> {
        let mut lower: Vec<usize> = (0..n_epochs.min(self.boundary)).collect();
        let mut upper: Vec<usize> = (self.boundary.saturating_add(1)..n_epochs).collect();
        match self.membership {
            BoundaryMembership::Lower if self.boundary < n_epochs => lower.push(self.boundary),
            BoundaryMembership::Upper if self.boundary < n_epochs => {
                upper.insert(0, self.boundary)
            }
            _ => {}
        }
        for (side, band) in [("lower", &lower), ("upper", &upper)] {
            if band.is_empty() {
                return Err(PsdError::InvalidParameter(format!(
                    "segment boundary {} leaves the {side} band empty for {} epochs",
                    self.boundary, n_epochs
                )));
            }
        }
        let label = |band: &[usize]| format!("{}-{}", band[0] + 1, band[band.len() - 1] + 1);
        Ok([(label(&lower), lower), (label(&upper), upper)])
    }
}

/// One frequency bin of a segment-averaged comparison band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDiffRow {
    /// 1-based epoch-range label of the band, e.g. "1-14".
    pub segment: String,
    pub freq: f64,
    pub value_a: f64,
    pub value_b: f64,
    pub value_diff: f64,
}

/// Run the estimator once per parameter set and align the two long-form
/// tables for the selected channel on (epoch, frequency bin), taking the
/// absolute per-row difference.
pub fn compare(
    raw: &RawRecording,
    channel: &str,
    spec_a: &WindowSpec,
    spec_b: &WindowSpec,
) -> Result<Comparison> {
    let ch = channel_index(raw, channel)?;
    let est_a = estimate(raw, spec_a)?;
    let est_b = estimate(raw, spec_b)?;
    ensure_aligned(&est_a, &est_b, raw.n_epochs())?;

    let mut diff = Vec::with_capacity(raw.n_epochs() * est_a.freqs.len());
    for e in 0..raw.n_epochs() {
        for (k, &freq) in est_a.freqs.iter().enumerate() {
            let value_a = est_a.power[[e, ch, k]];
            let value_b = est_b.power[[e, ch, k]];
            diff.push(DiffRow {
                epoch_idx: e,
                ch_name: channel.to_string(),
                freq,
                value_a,
                value_b,
                value_diff: (value_a - value_b).abs(),
            });
        }
    }
    Ok(Comparison {
        rows_a: est_a.rows,
        rows_b: est_b.rows,
        diff,
    })
}

/// Segment-averaged comparison: average density across the epochs of each
/// band per frequency bin on both sides, then difference per bin and tag
/// with the band label. Bands are concatenated lower-first.
pub fn compare_segmented(
    raw: &RawRecording,
    channel: &str,
    spec_a: &WindowSpec,
    spec_b: &WindowSpec,
    split: EpochSplit,
) -> Result<Vec<SegmentDiffRow>> {
    let ch = channel_index(raw, channel)?;
    let est_a = estimate(raw, spec_a)?;
    let est_b = estimate(raw, spec_b)?;
    ensure_aligned(&est_a, &est_b, raw.n_epochs())?;

    let bands = split.bands(raw.n_epochs())?;
    let mut out = Vec::with_capacity(bands.len() * est_a.freqs.len());
    for (label, epochs) in &bands {
        for (k, &freq) in est_a.freqs.iter().enumerate() {
            let mean = |est: &PsdEstimate| {
                epochs.iter().map(|&e| est.power[[e, ch, k]]).sum::<f64>() / epochs.len() as f64
            };
            let value_a = mean(&est_a);
            let value_b = mean(&est_b);
            out.push(SegmentDiffRow {
                segment: label.clone(),
                freq,
                value_a,
                value_b,
                value_diff: (value_a - value_b).abs(),
            });
        }
    }
    Ok(out)
}

fn channel_index(raw: &RawRecording, channel: &str) -> Result<usize> {
    raw.channel_index(channel).ok_or_else(|| {
        PsdError::InvalidParameter(format!("unknown channel name `{channel}`"))
    })
}

/// Refuse to join tables whose frequency axes diverge; with equal segment
/// lengths the axes are bitwise identical, so any mismatch means the two
/// sides were parameterized incompatibly.
fn ensure_aligned(est_a: &PsdEstimate, est_b: &PsdEstimate, n_epochs: usize) -> Result<()> {
    let matched = est_a
        .freqs
        .iter()
        .filter(|f| est_b.freqs.contains(f))
        .count();
    let left_only = est_a.freqs.len() - matched;
    let right_only = est_b.freqs.len() - matched;
    if left_only == 0 && right_only == 0 {
        return Ok(());
    }
    Err(PsdError::JoinMismatch {
        left_only: left_only * n_epochs,
        right_only: right_only * n_epochs,
    })
}
