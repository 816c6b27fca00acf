use realfft::RealFftPlanner;

use crate::window::hann;

/// Minimum sample count `analyze` requires before it will produce a real
/// measurement. Below this, the buffer is "warming up" and has no opinion.
pub const MIN_SAMPLES: usize = 32;

/// Tolerance added to the signal-power bucket on either side of the bin
/// closest to the expected carrier, to absorb minor frequency quantization.
const SIGNAL_BIN_SPAN: i64 = 1;

/// Floor applied to noise power before dividing, so a perfectly clean
/// carrier doesn't produce a division by zero.
const NOISE_FLOOR: f64 = 1e-12;

/// Spectral analysis of a sample window against an expected carrier.
///
/// Returns `(spectral_error, snr_db)`. `spectral_error` is the fraction of
/// total spectral power found outside the carrier's bin neighborhood,
/// clamped to `[0, 1]`; `snr_db` is ten times the base-10 log of the
/// signal-to-noise power ratio. Fewer than [`MIN_SAMPLES`] samples yields
/// `(1.0, f64::NEG_INFINITY)`, which callers should treat as "no data yet"
/// rather than a degraded reading.
pub fn analyze(samples: &[f64], expected_freq: f64, sample_rate: f64) -> (f64, f64) {
    let len = samples.len();
    if len < MIN_SAMPLES {
        return (1.0, f64::NEG_INFINITY);
    }

    let mean = samples.iter().sum::<f64>() / len as f64;
    let window = hann(len);
    let windowed: Vec<f64> = samples
        .iter()
        .zip(&window)
        .map(|(s, w)| (s - mean) * w)
        .collect();

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(len);
    let mut input = windowed;
    let mut spectrum = fft.make_output_vec();
    // `process` only fails on a buffer-length mismatch, which can't happen
    // here since both buffers come from the same planned length.
    fft.process(&mut input, &mut spectrum)
        .expect("fft input/output buffers sized by the same plan");

    let power: Vec<f64> = spectrum.iter().map(|c| c.norm_sqr()).collect();
    let bin_count = power.len();

    let target_bin = closest_bin(bin_count, len, sample_rate, expected_freq);

    let mut signal_power = 0.0;
    let mut noise_power = 0.0;
    for (k, p) in power.iter().enumerate() {
        if (k as i64 - target_bin as i64).abs() <= SIGNAL_BIN_SPAN {
            signal_power += p;
        } else {
            noise_power += p;
        }
    }

    let snr_linear = signal_power / noise_power.max(NOISE_FLOOR);
    let snr_db = 10.0 * snr_linear.log10();
    let spectral_error = (noise_power / (signal_power + noise_power)).clamp(0.0, 1.0);

    (spectral_error, snr_db)
}

/// Find the bin whose center frequency `k * sample_rate / len` is closest
/// to `expected_freq`. Ties (two bins equidistant) favor the lower index.
fn closest_bin(bin_count: usize, len: usize, sample_rate: f64, expected_freq: f64) -> usize {
    let mut best_bin = 0;
    let mut best_dist = f64::INFINITY;
    for k in 0..bin_count {
        let center = k as f64 * sample_rate / len as f64;
        let dist = (center - expected_freq).abs();
        if dist < best_dist {
            best_dist = dist;
            best_bin = k;
        }
    }
    best_bin
}
