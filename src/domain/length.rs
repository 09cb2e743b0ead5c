//! CSS-style lengths used for page margins.
//!
//! Chromium's `Page.printToPDF` takes margins in inches, while callers speak
//! in the units they would use in a stylesheet. Only the absolute units the
//! print pipeline understands are accepted.

use std::{fmt, str::FromStr};

use thiserror::Error;

const CSS_PX_PER_INCH: f64 = 96.0;
const CM_PER_INCH: f64 = 2.54;
const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
}

impl LengthUnit {
    fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    value: f64,
    unit: LengthUnit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LengthError {
    #[error("length must not be empty")]
    Empty,
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("unsupported unit `{0}` (expected px, in, cm or mm)")]
    UnsupportedUnit(String),
    #[error("length must be a finite, non-negative value")]
    OutOfRange,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Result<Self, LengthError> {
        if !value.is_finite() || value < 0.0 {
            return Err(LengthError::OutOfRange);
        }
        Ok(Self { value, unit })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    pub fn to_inches(&self) -> f64 {
        match self.unit {
            LengthUnit::Px => self.value / CSS_PX_PER_INCH,
            LengthUnit::In => self.value,
            LengthUnit::Cm => self.value / CM_PER_INCH,
            LengthUnit::Mm => self.value / MM_PER_INCH,
        }
    }
}

impl FromStr for Length {
    type Err = LengthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LengthError::Empty);
        }

        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        // Bare numbers are CSS pixels, mirroring how browsers read unitless print margins.
        let unit = match unit.to_ascii_lowercase().as_str() {
            "" | "px" => LengthUnit::Px,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            other => return Err(LengthError::UnsupportedUnit(other.to_string())),
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| LengthError::NotANumber(number.trim().to_string()))?;

        Length::new(value, unit)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inches(raw: &str) -> f64 {
        raw.parse::<Length>().expect("valid length").to_inches()
    }

    #[test]
    fn converts_supported_units_to_inches() {
        assert!((inches("2.54cm") - 1.0).abs() < 1e-9);
        assert!((inches("25.4mm") - 1.0).abs() < 1e-9);
        assert!((inches("96px") - 1.0).abs() < 1e-9);
        assert!((inches("0.5in") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unitless_values_are_pixels() {
        let length: Length = "48".parse().expect("valid length");
        assert_eq!(length.unit(), LengthUnit::Px);
        assert!((length.to_inches() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tolerates_whitespace_and_case() {
        let length: Length = " 1 CM ".parse().expect("valid length");
        assert_eq!(length.unit(), LengthUnit::Cm);
        assert_eq!(length.value(), 1.0);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<Length>(), Err(LengthError::Empty));
        assert_eq!(
            "1em".parse::<Length>(),
            Err(LengthError::UnsupportedUnit("em".to_string()))
        );
        assert_eq!(
            "abc".parse::<Length>(),
            Err(LengthError::UnsupportedUnit("abc".to_string()))
        );
        assert_eq!(
            "1.2.3cm".parse::<Length>(),
            Err(LengthError::NotANumber("1.2.3".to_string()))
        );
        assert_eq!("-1cm".parse::<Length>(), Err(LengthError::OutOfRange));
    }
}
