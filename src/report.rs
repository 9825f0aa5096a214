use thiserror::Error;
use zerocopy::{Immutable, IntoBytes};

// Constants
const REPORT_HEADER: [u8; 6] = [0x00, 0x55, 0xAA, 0x01, 0x01, 0x06];
pub const REPORT_FRAME_SIZE: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "output report length {length} is shorter than the {} byte display frame",
    REPORT_FRAME_SIZE
)]
pub struct InvalidReportLength {
    pub length: usize,
}

/// One temperature as the display firmware expects it: a byte per decimal place.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct Digits {
    pub tens: u8,
    pub ones: u8,
    pub tenths: u8,
}

impl Digits {
    /// Splits a count of tenths of a degree into its decimal places.
    ///
    /// Division truncates toward zero, so negative or out-of-range counts
    /// produce wrapped bytes rather than being clamped.
    fn from_tenths(tenths: i64) -> Self {
        let whole = tenths / 10;
        Self {
            tens: (whole / 10) as u8,
            ones: (whole % 10) as u8,
            tenths: (tenths % 10) as u8,
        }
    }

    fn from_celsius(celsius: Option<f32>) -> Self {
        Self::from_tenths(tenths_of(celsius.unwrap_or(0.0)))
    }

    /// Reassembles the displayed value. Only meaningful for 0.0 to 99.9.
    pub fn value(&self) -> f32 {
        (self.tens as f32 * 10.0) + self.ones as f32 + self.tenths as f32 / 10.0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoBytes, Immutable)]
#[repr(C)]
pub struct ReportFrame {
    pub header: [u8; 6],
    pub cpu: Digits,
    pub gpu: Digits,
    pub checksum: u8,
}

impl ReportFrame {
    fn new(cpu: Digits, gpu: Digits) -> Self {
        let mut frame = Self {
            header: REPORT_HEADER,
            cpu,
            gpu,
            checksum: 0,
        };
        frame.checksum = frame.expected_checksum();
        frame
    }

    /// Additive checksum over every byte preceding the checksum field.
    pub fn expected_checksum(&self) -> u8 {
        let bytes = self.as_bytes();
        let checksum: u16 = bytes[..REPORT_FRAME_SIZE - 1]
            .iter()
            .map(|&byte| byte as u16)
            .sum();
        (checksum % 256) as u8
    }
}

// Compile-time size verification
const _: () = {
    assert!(
        std::mem::size_of::<ReportFrame>() == REPORT_FRAME_SIZE,
        "ReportFrame must be exactly 13 bytes"
    );
};

/// A complete output report, padded with zeros to the device's report length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayReport {
    frame: ReportFrame,
    bytes: Box<[u8]>,
}

impl DisplayReport {
    pub fn frame(&self) -> &ReportFrame {
        &self.frame
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Builds the report for a pair of readings. Missing readings are sent as 0.0.
pub fn encode(
    report_length: usize,
    cpu: Option<f32>,
    gpu: Option<f32>,
) -> Result<DisplayReport, InvalidReportLength> {
    if report_length < REPORT_FRAME_SIZE {
        return Err(InvalidReportLength {
            length: report_length,
        });
    }

    let frame = ReportFrame::new(Digits::from_celsius(cpu), Digits::from_celsius(gpu));
    let mut bytes = vec![0u8; report_length].into_boxed_slice();
    bytes[..REPORT_FRAME_SIZE].copy_from_slice(frame.as_bytes());

    Ok(DisplayReport { frame, bytes })
}

/// Rounds to one decimal place the same way the report digits are derived.
pub fn round_to_tenths(celsius: f32) -> f32 {
    tenths_of(celsius) as f32 / 10.0
}

// Half-to-even on the widened value; `as` saturates and maps NaN to zero.
fn tenths_of(celsius: f32) -> i64 {
    (f64::from(celsius) * 10.0).round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum_of(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
    }

    #[test]
    fn test_encode_reference_readings() {
        let report = encode(13, Some(45.6), Some(38.2)).unwrap();
        let bytes = report.as_bytes();

        assert_eq!(&bytes[..6], &[0, 85, 170, 1, 1, 6]);
        assert_eq!(&bytes[6..9], &[4, 5, 6]);
        assert_eq!(&bytes[9..12], &[3, 8, 2]);
        // 0+85+170+1+1+6 + 4+5+6 + 3+8+2 = 291
        assert_eq!(bytes[12], (291 % 256) as u8);
        assert_eq!(bytes[12], 35);
    }

    #[test]
    fn test_encode_pads_to_report_length() {
        let report = encode(65, Some(45.6), Some(38.2)).unwrap();
        let short = encode(13, Some(45.6), Some(38.2)).unwrap();

        assert_eq!(report.len(), 65);
        assert_eq!(&report.as_bytes()[..13], short.as_bytes());
        assert!(report.as_bytes()[13..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_encode_rejects_short_lengths() {
        for length in 0..REPORT_FRAME_SIZE {
            assert_eq!(
                encode(length, Some(50.0), Some(50.0)),
                Err(InvalidReportLength { length })
            );
        }
    }

    #[test]
    fn test_checksum_over_plausible_range() {
        for step in 0..1000 {
            let cpu = step as f32 / 10.0;
            let gpu = (999 - step) as f32 / 10.0;
            let report = encode(13, Some(cpu), Some(gpu)).unwrap();
            let bytes = report.as_bytes();

            assert_eq!(bytes[12], checksum_of(&bytes[..12]), "cpu={cpu} gpu={gpu}");
            assert_eq!(report.frame().checksum, report.frame().expected_checksum());
        }
    }

    #[test]
    fn test_digits_reassemble_rounded_value() {
        for step in 0..1000 {
            let celsius = step as f32 / 10.0;
            let report = encode(13, Some(celsius), None).unwrap();
            let digits = report.frame().cpu;

            let expected = (f64::from(celsius) * 10.0).round() as u32;
            let decoded = u32::from(digits.tens) * 100
                + u32::from(digits.ones) * 10
                + u32::from(digits.tenths);

            assert!(digits.tens <= 9 && digits.ones <= 9 && digits.tenths <= 9);
            assert_eq!(decoded, expected, "celsius={celsius}");
            assert!((digits.value() - round_to_tenths(celsius)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_tenths_survive_float_error() {
        // 8.7 - 8 is 0.6999... in binary floating point
        let report = encode(13, Some(8.7), Some(99.9)).unwrap();
        assert_eq!(report.frame().cpu, Digits { tens: 0, ones: 8, tenths: 7 });
        assert_eq!(report.frame().gpu, Digits { tens: 9, ones: 9, tenths: 9 });
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        let report = encode(13, Some(45.66), Some(38.24)).unwrap();
        assert_eq!(report.frame().cpu, Digits { tens: 4, ones: 5, tenths: 7 });
        assert_eq!(report.frame().gpu, Digits { tens: 3, ones: 8, tenths: 2 });

        // exact midpoints round to even
        assert_eq!(round_to_tenths(45.25), 45.2);
        assert_eq!(round_to_tenths(45.75), 45.8);
    }

    #[test]
    fn test_missing_readings_encode_as_zero() {
        assert_eq!(encode(20, None, None), encode(20, Some(0.0), Some(0.0)));
        assert_eq!(encode(13, Some(61.3), None), encode(13, Some(61.3), Some(0.0)));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let first = encode(64, Some(72.45), Some(55.5)).unwrap();
        let second = encode(64, Some(72.45), Some(55.5)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_values_wrap() {
        let report = encode(13, Some(-45.6), Some(123.4)).unwrap();

        assert_eq!(report.frame().cpu, Digits { tens: 252, ones: 251, tenths: 250 });
        assert_eq!(report.frame().gpu, Digits { tens: 12, ones: 3, tenths: 4 });
        assert_eq!(report.as_bytes()[12], checksum_of(&report.as_bytes()[..12]));
    }
}
