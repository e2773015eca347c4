// tests/ring_buffer_properties.rs
//! Property tests for buffer, parsing and conversion invariants

use grip_core::acquisition::{parse_line, ChannelBuffer, Sample};
use grip_core::config::{CalibrationModel, InterpolationTable, PolynomialCoefficients};
use grip_core::utils::ForceConverter;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn buffer_keeps_last_pushes_in_order(capacity in 1usize..128, values in prop::collection::vec(-1e6f64..1e6, 0..400)) {
        let mut buffer = ChannelBuffer::new(capacity).unwrap();
        for (i, value) in values.iter().enumerate() {
            buffer.push(Sample::new(i as u64, *value));
            prop_assert!(buffer.len() <= capacity);
        }

        let expected: Vec<f64> = values.iter().skip(values.len().saturating_sub(capacity)).copied().collect();
        let actual: Vec<f64> = buffer.iter().map(|s| s.value).collect();
        prop_assert_eq!(actual, expected);
        prop_assert!(buffer.iter().zip(buffer.iter().skip(1)).all(|(a, b)| a.timestamp_us < b.timestamp_us));
    }

    #[test]
    fn window_is_exactly_k_and_left_padded(capacity in 1usize..64, pushes in 0usize..100, k_seed in 0usize..64) {
        let k = k_seed % (capacity + 1);
        let mut buffer = ChannelBuffer::new(capacity).unwrap();
        for i in 1..=pushes {
            buffer.push(Sample::new(i as u64, i as f64));
        }

        let window = buffer.window(k);
        prop_assert_eq!(window.len(), k);

        let real = buffer.len().min(k);
        prop_assert!(window[..k - real].iter().all(|v| *v == 0.0));
        prop_assert!(window[k - real..].iter().all(|v| *v > 0.0));
        if real > 0 {
            prop_assert_eq!(window[k - 1], pushes as f64);
        }
    }

    #[test]
    fn polynomial_conversion_never_negative(raw in 0u32..=1023, a in -5.0f64..5.0, b in -5.0f64..5.0, c in -5.0f64..5.0, d in -5.0f64..5.0) {
        let model = CalibrationModel::Polynomial(PolynomialCoefficients { a, b, c, d });
        let converter = ForceConverter::new(Arc::new(model));
        prop_assert!(converter.convert(raw) >= 0.0);
    }

    #[test]
    fn table_conversion_monotonic(steps in prop::collection::vec((0.01f64..1.0, 0.0f64..5.0), 2..12), raw_a in 0u32..=1023, raw_b in 0u32..=1023) {
        // Increasing voltages and non-decreasing forces make a monotonic curve
        let mut voltage = 0.0;
        let mut force = 0.0;
        let (voltages, forces): (Vec<f64>, Vec<f64>) = steps
            .into_iter()
            .map(|(dv, df)| {
                voltage += dv;
                force += df;
                (voltage, force)
            })
            .unzip();

        let table = InterpolationTable::new(voltages, forces).unwrap();
        let converter = ForceConverter::new(Arc::new(CalibrationModel::Table(table)));

        let (low, high) = if raw_a <= raw_b { (raw_a, raw_b) } else { (raw_b, raw_a) };
        prop_assert!(converter.convert(low) <= converter.convert(high) + 1e-9);
        prop_assert!(converter.convert(low) >= 0.0);
    }

    #[test]
    fn any_bad_token_rejects_the_line(values in prop::collection::vec(0u32..2000, 5), bad_index in 0usize..5, bad in "[a-z.+-]{1,3}") {
        let mut tokens: Vec<String> = values.iter().map(u32::to_string).collect();
        prop_assert_eq!(parse_line(tokens.join(",").as_bytes(), 5).unwrap(), values);

        tokens[bad_index] = bad;
        prop_assert!(parse_line(tokens.join(",").as_bytes(), 5).is_err());
    }
}
