//! Scaled fixed-point decimal rendering.
//!
//! Columnar files store decimals as unscaled integers next to a declared
//! precision and scale. [`render()`] turns such an integer into the decimal
//! text the host parses, along with the type modifier the text should be
//! typed with. Files written by readers that predate scale metadata report a
//! non-zero legacy scale; when present it overrides the declared scale.

use std::fmt;

use rust_decimal::Decimal;

use crate::{
    error::{ScanError, ScanResult},
    types::DecimalSpec,
};

/// Scale assumed for decimals written by format versions without scale metadata.
pub const LEGACY_DEFAULT_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDecimal {
    Narrow(i64),
    Wide(i128),
}

impl RawDecimal {
    pub fn as_i128(self) -> i128 {
        match self {
            RawDecimal::Narrow(value) => value as i128,
            RawDecimal::Wide(value) => value,
        }
    }
}

/// Decimal text plus the modifier it is typed with. `typmod` is `None` for an
/// untyped literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericText {
    pub text: String,
    pub typmod: Option<DecimalSpec>,
}

impl NumericText {
    pub fn untyped(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            typmod: None,
        }
    }

    /// Host packed modifier, -1 when untyped.
    pub fn packed_typmod(&self) -> i32 {
        self.typmod.map(|spec| spec.packed_typmod()).unwrap_or(-1)
    }

    /// Unscaled integer and scale of the text, exact for up to 38 digits.
    pub fn to_scaled(&self) -> Option<(i128, u32)> {
        let (negative, unsigned) = match self.text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, self.text.as_str()),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude = format!("{whole}{fraction}").parse::<i128>().ok()?;
        let value = if negative { -magnitude } else { magnitude };
        Some((value, fraction.len() as u32))
    }

    /// Exact conversion into `rust_decimal`. Values beyond its 96-bit
    /// mantissa or 28-digit scale are an error rather than rounded.
    pub fn to_decimal(&self) -> ScanResult<Decimal> {
        let not_representable = |reason: String| ScanError::Cast {
            column: String::new(),
            reason: format!("'{}' is not representable: {reason}", self.text),
        };
        let (value, scale) = self
            .to_scaled()
            .ok_or_else(|| not_representable("not a decimal literal".into()))?;
        Decimal::try_from_i128_with_scale(value, scale)
            .map_err(|err| not_representable(err.to_string()))
    }
}

/// Moves `value` from scale `from` to scale `to`, rounding half away from
/// zero. `None` when the result overflows 128 bits.
pub fn rescale(value: i128, from: u32, to: u32) -> Option<i128> {
    if to >= from {
        return value.checked_mul(10_i128.checked_pow(to - from)?);
    }
    let Some(divisor) = 10_i128.checked_pow(from - to) else {
        return Some(0);
    };
    let quotient = value / divisor;
    let remainder = (value % divisor).unsigned_abs();
    if remainder >= divisor.unsigned_abs() - remainder {
        quotient.checked_add(value.signum())
    } else {
        Some(quotient)
    }
}

/// Number of decimal digits in the magnitude of `value`.
pub fn digit_count(value: i128) -> u32 {
    value.unsigned_abs().checked_ilog10().map_or(1, |log| log + 1)
}

impl fmt::Display for NumericText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn render(raw: RawDecimal, precision: u32, scale: u32, legacy_scale: u32) -> NumericText {
    let value = raw.as_i128();
    let digits = value.unsigned_abs().to_string();
    let negative = value < 0;

    let (precision, scale) = if legacy_scale > 0 {
        (legacy_scale.max(digits.len() as u32), legacy_scale)
    } else {
        (precision, scale)
    };

    if scale == 0 || precision == 0 {
        return NumericText::untyped(value.to_string());
    }

    let scale_len = scale as usize;
    let mut text = String::with_capacity(digits.len() + scale_len + 3);
    if negative {
        text.push('-');
    }
    if digits.len() <= scale_len {
        text.push_str("0.");
        text.extend(std::iter::repeat_n('0', scale_len - digits.len()));
        text.push_str(&digits);
    } else {
        let split = digits.len() - scale_len;
        text.push_str(&digits[..split]);
        text.push('.');
        text.push_str(&digits[split..]);
    }

    NumericText {
        text,
        typmod: Some(DecimalSpec { precision, scale }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn inserts_point_from_declared_scale() {
        let rendered = render(RawDecimal::Narrow(123_456), 10, 2, 0);
        assert_eq!(rendered.text, "1234.56");
        assert_eq!(rendered.typmod, Some(DecimalSpec { precision: 10, scale: 2 }));
        assert_eq!(rendered.packed_typmod(), (10 << 16) + 2 + 4);
    }

    #[test]
    fn sign_is_not_counted_as_a_digit() {
        assert_eq!(render(RawDecimal::Narrow(-123_456), 10, 2, 0).text, "-1234.56");
        assert_eq!(render(RawDecimal::Narrow(-5), 4, 2, 0).text, "-0.05");
    }

    #[test]
    fn small_magnitudes_are_zero_padded() {
        assert_eq!(render(RawDecimal::Narrow(5), 4, 2, 0).text, "0.05");
        assert_eq!(render(RawDecimal::Narrow(42), 4, 2, 0).text, "0.42");
        assert_eq!(render(RawDecimal::Narrow(0), 4, 2, 0).text, "0.00");
    }

    #[test]
    fn zero_scale_or_precision_is_untyped() {
        let rendered = render(RawDecimal::Narrow(987), 5, 0, 0);
        assert_eq!(rendered.text, "987");
        assert_eq!(rendered.typmod, None);
        assert_eq!(rendered.packed_typmod(), -1);
        assert_eq!(render(RawDecimal::Narrow(987), 0, 2, 0).typmod, None);
    }

    #[test]
    fn legacy_scale_overrides_declared_metadata() {
        let rendered = render(RawDecimal::Narrow(1_234_567), 20, 0, LEGACY_DEFAULT_SCALE);
        assert_eq!(rendered.text, "1.234567");
        assert_eq!(rendered.typmod, Some(DecimalSpec { precision: 7, scale: 6 }));

        let short = render(RawDecimal::Narrow(12), 20, 0, LEGACY_DEFAULT_SCALE);
        assert_eq!(short.text, "0.000012");
        assert_eq!(short.typmod, Some(DecimalSpec { precision: 6, scale: 6 }));
    }

    #[test]
    fn wide_values_render_all_digits() {
        let raw = RawDecimal::Wide(123_456_789_012_345_678_901_234_567_890);
        let rendered = render(raw, 38, 10, 0);
        assert_eq!(rendered.text, "12345678901234567890.1234567890");
    }

    #[test]
    fn wide_text_parses_back_exactly() {
        let raw = RawDecimal::Wide(12_345_678_901_234_567_890_123_456_789_012_345_678);
        let rendered = render(raw, 38, 4, 0);
        assert_eq!(
            rendered.to_scaled(),
            Some((12_345_678_901_234_567_890_123_456_789_012_345_678, 4))
        );
        assert_eq!(NumericText::untyped("-0.05").to_scaled(), Some((-5, 2)));
        assert_eq!(NumericText::untyped("12").to_scaled(), Some((12, 0)));
        assert_eq!(NumericText::untyped("1e5").to_scaled(), None);
        assert_eq!(NumericText::untyped(".5").to_scaled(), None);
    }

    #[test]
    fn too_many_digits_for_rust_decimal_is_an_error() {
        let raw = RawDecimal::Wide(12_345_678_901_234_567_890_123_456_785_678);
        let rendered = render(raw, 38, 4, 0);
        assert!(rendered.to_decimal().is_err());
    }

    #[test]
    fn rescale_rounds_half_away_from_zero() {
        assert_eq!(rescale(5678, 4, 2), Some(57));
        assert_eq!(rescale(-5650, 4, 2), Some(-57));
        assert_eq!(rescale(5649, 4, 2), Some(56));
        assert_eq!(rescale(-5, 2, 1), Some(-1));
        assert_eq!(rescale(4, 0, 1), Some(40));
        assert_eq!(rescale(i128::MAX, 0, 1), None);
    }

    #[test]
    fn digit_count_ignores_sign() {
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(-999), 3);
        assert_eq!(digit_count(1_000), 4);
        assert_eq!(digit_count(i128::MIN), 39);
    }

    #[test]
    fn renders_into_rust_decimal() {
        let rendered = render(RawDecimal::Narrow(-250), 6, 2, 0);
        assert_eq!(rendered.to_decimal().unwrap(), Decimal::new(-250, 2));
    }

    proptest! {
        #[test]
        fn rendered_text_matches_rust_decimal(raw in any::<i64>(), scale in 1u32..=18) {
            let rendered = render(RawDecimal::Narrow(raw), 18, scale, 0);
            let expected = Decimal::from_i128_with_scale(raw as i128, scale);
            prop_assert_eq!(rendered.to_decimal().unwrap(), expected);
        }

        #[test]
        fn rescale_matches_rust_decimal_rounding(raw in any::<i32>(), from in 0u32..=12, to in 0u32..=12) {
            let expected = Decimal::from_i128_with_scale(raw as i128, from)
                .round_dp_with_strategy(to, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
            let rescaled = rescale(raw as i128, from, to).unwrap();
            prop_assert_eq!(Decimal::from_i128_with_scale(rescaled, to), expected);
        }

        #[test]
        fn fractional_part_has_exactly_scale_digits(raw in any::<i64>(), scale in 1u32..=18) {
            let rendered = render(RawDecimal::Narrow(raw), 18, scale, 0);
            let fraction = rendered.text.split('.').nth(1).unwrap();
            prop_assert_eq!(fraction.len(), scale as usize);
        }
    }
}
