// src/estimate.rs
//! Rough force estimate from EMG activity, for live display only

use crate::config::constants::sinks::EMG_ACTIVITY_FULL_SCALE;

/// Sum of absolute channel values in one EMG frame
pub fn emg_activity(frame: &[f32]) -> f32 {
    frame.iter().map(|v| v.abs()).sum()
}

/// Map EMG activity linearly from `[0, EMG_ACTIVITY_FULL_SCALE]` onto
/// `[0, max(force_window)]`, clamping at both ends.
///
/// An empty or all-zero force window yields zero.
pub fn activity_to_force(frame: &[f32], force_window: &[f64]) -> f64 {
    let ceiling = force_window.iter().copied().fold(0.0_f64, f64::max);
    if ceiling <= 0.0 {
        return 0.0;
    }

    let fraction = (f64::from(emg_activity(frame)) / f64::from(EMG_ACTIVITY_FULL_SCALE)).clamp(0.0, 1.0);
    fraction * ceiling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_sums_magnitudes() {
        assert_eq!(emg_activity(&[1.0, -2.0, 3.0, -4.0]), 10.0);
        assert_eq!(emg_activity(&[]), 0.0);
    }

    #[test]
    fn test_linear_mapping() {
        let window = [1.0, 8.0, 4.0];
        // 250 of 500 is half scale
        assert!((activity_to_force(&[125.0, -125.0], &window) - 4.0).abs() < 1e-12);
        assert_eq!(activity_to_force(&[0.0; 8], &window), 0.0);
    }

    #[test]
    fn test_clamped_above_full_scale() {
        assert_eq!(activity_to_force(&[127.0; 8], &[2.0, 6.0]), 6.0);
    }

    #[test]
    fn test_no_force_reference() {
        assert_eq!(activity_to_force(&[100.0; 8], &[]), 0.0);
        assert_eq!(activity_to_force(&[100.0; 8], &[0.0; 4]), 0.0);
    }
}
