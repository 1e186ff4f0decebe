use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// One long-form PSD observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdRow {
    pub epoch_idx: usize,
    pub ch_name: String,
    pub freq: f64,
    pub value: f64,
}

/// Expand a PSD tensor (epochs x channels x bins) into one row per
/// (epoch, channel, frequency bin). Row order is epoch-major, then channel,
/// then ascending frequency.
pub fn flatten(power: &Array3<f64>, ch_names: &[String], freqs: &[f64]) -> Vec<PsdRow> {
    let (n_epochs, n_channels, n_bins) = power.dim();
    debug_assert_eq!(n_channels, ch_names.len());
    debug_assert_eq!(n_bins, freqs.len());
    let mut rows = Vec::with_capacity(n_epochs * n_channels * n_bins);
    for e in 0..n_epochs {
        for (c, ch_name) in ch_names.iter().enumerate() {
            for (k, &freq) in freqs.iter().enumerate() {
                rows.push(PsdRow {
                    epoch_idx: e,
                    ch_name: ch_name.clone(),
                    freq,
                    value: power[[e, c, k]],
                });
            }
        }
    }
    rows
}

/// Rows of a single channel, cloned out of a long-form table.
pub fn filter_channel(rows: &[PsdRow], ch_name: &str) -> Vec<PsdRow> {
    rows.iter()
        .filter(|row| row.ch_name == ch_name)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn row_count_is_the_full_product() {
        let power = Array3::<f64>::zeros((3, 2, 5));
        let rows = flatten(&power, &names(&["A", "B"]), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(rows.len(), 3 * 2 * 5);
    }

    #[test]
    fn rows_are_epoch_major_with_ascending_frequency() {
        let mut power = Array3::<f64>::zeros((2, 2, 3));
        power[[1, 0, 2]] = 42.0;
        let rows = flatten(&power, &names(&["A", "B"]), &[0.0, 2.0, 4.0]);
        assert_eq!(rows[0].epoch_idx, 0);
        assert_eq!(rows[0].ch_name, "A");
        assert_eq!(rows[0].freq, 0.0);
        assert_eq!(rows[1].freq, 2.0);
        assert_eq!(rows[3].ch_name, "B");
        let hit = rows
            .iter()
            .find(|r| r.epoch_idx == 1 && r.ch_name == "A" && r.freq == 4.0)
            .unwrap();
        assert_eq!(hit.value, 42.0);
    }

    #[test]
    fn channel_filter_keeps_only_matching_rows() {
        let power = Array3::<f64>::zeros((2, 2, 3));
        let rows = flatten(&power, &names(&["A", "B"]), &[0.0, 2.0, 4.0]);
        let only_b = filter_channel(&rows, "B");
        assert_eq!(only_b.len(), 2 * 3);
        assert!(only_b.iter().all(|r| r.ch_name == "B"));
    }

    #[test]
    fn rows_serialize_to_flat_json() {
        let row = PsdRow {
            epoch_idx: 3,
            ch_name: "CZ".into(),
            freq: 12.5,
            value: 1e-12,
        };
        let js = serde_json::to_string(&row).unwrap();
        assert!(js.contains("\"epoch_idx\":3"));
        assert!(js.contains("\"ch_name\":\"CZ\""));
    }
}
