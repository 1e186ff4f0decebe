use crate::error::{PsdError, Result};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Supported window functions for Welch segmentation.
///
/// The set and the default shape parameters (tukey alpha 0.5, exponential
/// tau 1.0, taylor nbar 4 / sll 30 dB) match the conventional
/// string-selectable windows of common spectral-analysis toolkits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Boxcar,
    Triang,
    Blackman,
    Hamming,
    Hann,
    Bartlett,
    Flattop,
    Parzen,
    Bohman,
    Blackmanharris,
    Nuttall,
    Barthann,
    Cosine,
    Exponential,
    Tukey,
    Taylor,
    Lanczos,
}

impl WindowKind {
    pub const ALL: [WindowKind; 17] = [
        WindowKind::Boxcar,
        WindowKind::Triang,
        WindowKind::Blackman,
        WindowKind::Hamming,
        WindowKind::Hann,
        WindowKind::Bartlett,
        WindowKind::Flattop,
        WindowKind::Parzen,
        WindowKind::Bohman,
        WindowKind::Blackmanharris,
        WindowKind::Nuttall,
        WindowKind::Barthann,
        WindowKind::Cosine,
        WindowKind::Exponential,
        WindowKind::Tukey,
        WindowKind::Taylor,
        WindowKind::Lanczos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Boxcar => "boxcar",
            WindowKind::Triang => "triang",
            WindowKind::Blackman => "blackman",
            WindowKind::Hamming => "hamming",
            WindowKind::Hann => "hann",
            WindowKind::Bartlett => "bartlett",
            WindowKind::Flattop => "flattop",
            WindowKind::Parzen => "parzen",
            WindowKind::Bohman => "bohman",
            WindowKind::Blackmanharris => "blackmanharris",
            WindowKind::Nuttall => "nuttall",
            WindowKind::Barthann => "barthann",
            WindowKind::Cosine => "cosine",
            WindowKind::Exponential => "exponential",
            WindowKind::Tukey => "tukey",
            WindowKind::Taylor => "taylor",
            WindowKind::Lanczos => "lanczos",
        }
    }

    /// Symmetric (filter-design) window of length `n`.
    pub fn symmetric(&self, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![1.0; n];
        }
        match self {
            WindowKind::Boxcar => vec![1.0; n],
            WindowKind::Triang => triang(n),
            WindowKind::Blackman => general_cosine(n, &[0.42, 0.5, 0.08]),
            WindowKind::Hamming => general_cosine(n, &[0.54, 0.46]),
            WindowKind::Hann => general_cosine(n, &[0.5, 0.5]),
            WindowKind::Bartlett => bartlett(n),
            WindowKind::Flattop => general_cosine(
                n,
                &[0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368],
            ),
            WindowKind::Parzen => parzen(n),
            WindowKind::Bohman => bohman(n),
            WindowKind::Blackmanharris => general_cosine(n, &[0.35875, 0.48829, 0.14128, 0.01168]),
            WindowKind::Nuttall => {
                general_cosine(n, &[0.3635819, 0.4891775, 0.1365995, 0.0106411])
            }
            WindowKind::Barthann => barthann(n),
            WindowKind::Cosine => cosine(n),
            WindowKind::Exponential => exponential(n),
            WindowKind::Tukey => tukey(n, 0.5),
            WindowKind::Taylor => taylor(n),
            WindowKind::Lanczos => lanczos(n),
        }
    }

    /// DFT-even window of length `n`, the variant applied to Welch segments:
    /// the symmetric window of length `n + 1` with the final sample dropped.
    pub fn periodic(&self, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![1.0; n];
        }
        let mut w = self.symmetric(n + 1);
        w.truncate(n);
        w
    }

    /// Normalized magnitude response of the symmetric window: zero-padded to
    /// `n_fft` points, peak-normalized, and mirrored onto the full axis of
    /// -0.5 ..= 0.5 cycles per sample. Shows the main-lobe width and
    /// sidelobe (spectral-leakage) trade-off of each window.
    pub fn frequency_response(&self, n: usize, n_fft: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        if n == 0 {
            return Err(PsdError::InvalidParameter(
                "window length must be positive".into(),
            ));
        }
        if n_fft < n {
            return Err(PsdError::InvalidParameter(format!(
                "FFT length {n_fft} is shorter than the {n}-sample window"
            )));
        }
        let mut frame = vec![0.0; n_fft];
        for (slot, w) in frame.iter_mut().zip(self.symmetric(n)) {
            *slot = w;
        }
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(n_fft);
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum)
            .expect("frame length matches the planned FFT");

        let mags: Vec<f64> = spectrum.iter().map(|c| c.norm()).collect();
        let peak = mags.iter().copied().fold(0.0, f64::max);
        let half = n_fft / 2;
        let mut freqs = Vec::with_capacity(2 * half + 1);
        let mut response = Vec::with_capacity(2 * half + 1);
        for k in (1..=half).rev() {
            freqs.push(-(k as f64) / n_fft as f64);
            response.push(mags[k] / peak);
        }
        for (k, mag) in mags.iter().enumerate().take(half + 1) {
            freqs.push(k as f64 / n_fft as f64);
            response.push(mag / peak);
        }
        Ok((freqs, response))
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = PsdError;

    fn from_str(s: &str) -> Result<Self> {
        WindowKind::ALL
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| PsdError::InvalidParameter(format!("unsupported window name `{s}`")))
    }
}

/// Weighted sum of cosine terms over `fac = -pi ..= pi`; the basis for the
/// hann/hamming/blackman family.
fn general_cosine(n: usize, coeffs: &[f64]) -> Vec<f64> {
    let span = n as f64 - 1.0;
    (0..n)
        .map(|i| {
            let fac = -PI + 2.0 * PI * i as f64 / span;
            coeffs
                .iter()
                .enumerate()
                .map(|(k, a)| a * (k as f64 * fac).cos())
                .sum()
        })
        .collect()
}

fn triang(n: usize) -> Vec<f64> {
    let m = n as f64;
    let half = (n + 1) / 2;
    let mut w = Vec::with_capacity(n);
    if n % 2 == 1 {
        for k in 1..=half {
            w.push(2.0 * k as f64 / (m + 1.0));
        }
        for k in (1..half).rev() {
            w.push(2.0 * k as f64 / (m + 1.0));
        }
    } else {
        for k in 1..=half {
            w.push((2.0 * k as f64 - 1.0) / m);
        }
        for k in (1..=half).rev() {
            w.push((2.0 * k as f64 - 1.0) / m);
        }
    }
    w
}

fn bartlett(n: usize) -> Vec<f64> {
    let span = n as f64 - 1.0;
    (0..n)
        .map(|i| 1.0 - (2.0 * i as f64 / span - 1.0).abs())
        .collect()
}

fn parzen(n: usize) -> Vec<f64> {
    let center = (n as f64 - 1.0) / 2.0;
    let half = n as f64 / 2.0;
    (0..n)
        .map(|i| {
            let a = (i as f64 - center).abs();
            let r = a / half;
            if a <= (n as f64 - 1.0) / 4.0 {
                1.0 - 6.0 * r * r + 6.0 * r * r * r
            } else {
                2.0 * (1.0 - r).powi(3)
            }
        })
        .collect()
}

fn bohman(n: usize) -> Vec<f64> {
    let span = n as f64 - 1.0;
    (0..n)
        .map(|i| {
            let x = (2.0 * i as f64 / span - 1.0).abs();
            (1.0 - x) * (PI * x).cos() + (PI * x).sin() / PI
        })
        .collect()
}

fn barthann(n: usize) -> Vec<f64> {
    let span = n as f64 - 1.0;
    (0..n)
        .map(|i| {
            let fac = (i as f64 / span - 0.5).abs();
            0.62 - 0.48 * fac + 0.38 * (2.0 * PI * fac).cos()
        })
        .collect()
}

fn cosine(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (PI / n as f64 * (i as f64 + 0.5)).sin())
        .collect()
}

fn exponential(n: usize) -> Vec<f64> {
    // Centered, tau = 1.
    let center = (n as f64 - 1.0) / 2.0;
    (0..n).map(|i| (-(i as f64 - center).abs()).exp()).collect()
}

fn tukey(n: usize, alpha: f64) -> Vec<f64> {
    let span = n as f64 - 1.0;
    let width = (alpha * span / 2.0).floor() as usize;
    (0..n)
        .map(|i| {
            if i <= width {
                let x = i as f64 / span;
                0.5 * (1.0 + (PI * (2.0 * x / alpha - 1.0)).cos())
            } else if i >= n - width - 1 {
                let x = i as f64 / span;
                0.5 * (1.0 + (PI * (2.0 * x / alpha - 2.0 / alpha + 1.0)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

fn taylor(n: usize) -> Vec<f64> {
    const NBAR: usize = 4;
    const SLL_DB: f64 = 30.0;
    let b = 10f64.powf(SLL_DB / 20.0);
    let a = (b + (b * b - 1.0).sqrt()).ln() / PI;
    let s2 = (NBAR as f64).powi(2) / (a * a + (NBAR as f64 - 0.5).powi(2));
    let ma: Vec<f64> = (1..NBAR).map(|m| m as f64).collect();
    let mut fm = vec![0.0; NBAR - 1];
    for (mi, &m) in ma.iter().enumerate() {
        let sign = if mi % 2 == 0 { 1.0 } else { -1.0 };
        let mut numer = sign;
        for &nn in &ma {
            numer *= 1.0 - m * m / s2 / (a * a + (nn - 0.5).powi(2));
        }
        let mut denom = 2.0;
        for (j, &nn) in ma.iter().enumerate() {
            if j != mi {
                denom *= 1.0 - m * m / (nn * nn);
            }
        }
        fm[mi] = numer / denom;
    }
    let nf = n as f64;
    let w_at = |x: f64| -> f64 {
        1.0 + 2.0
            * fm.iter()
                .zip(&ma)
                .map(|(f, m)| f * (2.0 * PI * m * (x - nf / 2.0 + 0.5) / nf).cos())
                .sum::<f64>()
    };
    let scale = 1.0 / w_at((nf - 1.0) / 2.0);
    (0..n).map(|i| w_at(i as f64) * scale).collect()
}

fn lanczos(n: usize) -> Vec<f64> {
    let span = n as f64 - 1.0;
    (0..n)
        .map(|i| sinc(2.0 * i as f64 / span - 1.0))
        .collect()
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn every_name_round_trips() {
        for kind in WindowKind::ALL {
            let parsed: WindowKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!(WindowKind::ALL.len(), 17);
    }

    #[test]
    fn unknown_name_is_an_invalid_parameter() {
        let err = "not-a-window".parse::<WindowKind>().unwrap_err();
        assert!(matches!(err, PsdError::InvalidParameter(_)));
    }

    #[test]
    fn hann_symmetric_matches_known_values() {
        let w = WindowKind::Hann.symmetric(5);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (a, e) in w.iter().zip(expected) {
            assert_close(*a, e, 1e-12);
        }
    }

    #[test]
    fn periodic_drops_the_trailing_sample() {
        let w = WindowKind::Hann.periodic(4);
        let expected = [0.0, 0.5, 1.0, 0.5];
        assert_eq!(w.len(), 4);
        for (a, e) in w.iter().zip(expected) {
            assert_close(*a, e, 1e-12);
        }
    }

    #[test]
    fn hamming_endpoints_are_nonzero() {
        let w = WindowKind::Hamming.symmetric(11);
        assert_close(w[0], 0.08, 1e-12);
        assert_close(w[10], 0.08, 1e-12);
        assert_close(w[5], 1.0, 1e-12);
    }

    #[test]
    fn triang_matches_both_parities() {
        let odd = WindowKind::Triang.symmetric(3);
        for (a, e) in odd.iter().zip([0.5, 1.0, 0.5]) {
            assert_close(*a, e, 1e-12);
        }
        let even = WindowKind::Triang.symmetric(4);
        for (a, e) in even.iter().zip([0.25, 0.75, 0.75, 0.25]) {
            assert_close(*a, e, 1e-12);
        }
    }

    #[test]
    fn tukey_has_a_flat_middle() {
        let w = WindowKind::Tukey.symmetric(9);
        assert_close(w[0], 0.0, 1e-12);
        assert_close(w[4], 1.0, 1e-12);
        assert_close(w[8], 0.0, 1e-12);
        // alpha = 0.5 tapers the outer quarter on each side
        assert_close(w[3], 1.0, 1e-12);
    }

    #[test]
    fn all_windows_are_symmetric_and_bounded() {
        for kind in WindowKind::ALL {
            let w = kind.symmetric(33);
            assert_eq!(w.len(), 33);
            for i in 0..w.len() {
                let mirror = w[w.len() - 1 - i];
                assert_close(w[i], mirror, 1e-9);
                assert!(w[i].is_finite());
                assert!(w[i].abs() <= 1.0 + 1e-9, "{kind} exceeds unity: {}", w[i]);
            }
            // Peak near the center for every taper.
            assert!(w[16] > 0.5, "{kind} center too small: {}", w[16]);
        }
    }

    #[test]
    fn degenerate_lengths_fall_back_to_ones() {
        for kind in WindowKind::ALL {
            assert!(kind.symmetric(0).is_empty());
            assert_eq!(kind.symmetric(1), vec![1.0]);
            assert_eq!(kind.periodic(1), vec![1.0]);
        }
    }

    #[test]
    fn taylor_is_normalized_at_the_center() {
        let w = WindowKind::Taylor.symmetric(51);
        assert_close(w[25], 1.0, 1e-9);
        assert!(w[0] > 0.0 && w[0] < 1.0);
    }

    #[test]
    fn frequency_response_peaks_at_dc_and_mirrors() {
        let (freqs, resp) = WindowKind::Hann.frequency_response(51, 512).unwrap();
        assert_eq!(freqs.len(), resp.len());
        let mid = freqs.len() / 2;
        assert_close(freqs[0], -0.5, 1e-12);
        assert_close(freqs[mid], 0.0, 1e-12);
        assert_close(freqs[freqs.len() - 1], 0.5, 1e-12);
        assert_close(resp[mid], 1.0, 1e-12);
        for i in 0..resp.len() {
            assert!(resp[i] <= 1.0 + 1e-12);
            assert_close(resp[i], resp[resp.len() - 1 - i], 1e-9);
        }
    }

    #[test]
    fn hann_leaks_less_than_boxcar_far_from_the_main_lobe() {
        let at_quarter = |kind: WindowKind| {
            let (freqs, resp) = kind.frequency_response(51, 2048).unwrap();
            freqs
                .iter()
                .zip(&resp)
                .find(|(f, _)| (**f - 0.25).abs() < 1e-9)
                .map(|(_, r)| *r)
                .unwrap()
        };
        let boxcar = at_quarter(WindowKind::Boxcar);
        let hann = at_quarter(WindowKind::Hann);
        assert!(hann < boxcar / 10.0, "boxcar {boxcar}, hann {hann}");
        assert!(hann < 1e-3);
    }

    #[test]
    fn frequency_response_rejects_degenerate_lengths() {
        let err = WindowKind::Hann.frequency_response(0, 256).unwrap_err();
        assert!(matches!(err, PsdError::InvalidParameter(_)));
        let err = WindowKind::Hann.frequency_response(64, 32).unwrap_err();
        assert!(matches!(err, PsdError::InvalidParameter(_)));
    }

    #[test]
    fn lanczos_is_a_sinc_arch() {
        let w = WindowKind::Lanczos.symmetric(5);
        assert_close(w[0], 0.0, 1e-12);
        assert_close(w[2], 1.0, 1e-12);
        assert_close(w[1], sinc(-0.5), 1e-12);
    }
}
