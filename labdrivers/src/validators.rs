//! Static range checks applied before a value is sent to an instrument.

use crate::Error;

/// Inclusive floating point range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Numbers {
    pub min: f64,
    pub max: f64,
}

impl Numbers {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, parameter: &str, value: f64) -> crate::Result<f64> {
        if value.is_nan() || value < self.min || value > self.max {
            return Err(Error::OutOfRange {
                parameter: parameter.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }
}

/// Inclusive integer range, e.g. the signed bit fields of the DC DAC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ints {
    pub min: i64,
    pub max: i64,
}

impl Ints {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Signed two's complement range of `bits` bits.
    pub const fn signed_bits(bits: u32) -> Self {
        let half = 1_i64 << (bits - 1);
        Self::new(-half, half - 1)
    }

    pub fn validate(&self, parameter: &str, value: i64) -> crate::Result<i64> {
        if value < self.min || value > self.max {
            return Err(Error::OutOfRange {
                parameter: parameter.to_string(),
                value: value as f64,
                min: self.min as f64,
                max: self.max as f64,
            });
        }
        Ok(value)
    }
}

/// A fixed set of allowed values, such as the range table of a source.
#[derive(Clone, Copy, Debug)]
pub struct Enum<'a> {
    values: &'a [f64],
}

impl<'a> Enum<'a> {
    pub const fn new(values: &'a [f64]) -> Self {
        Self { values }
    }

    /// Returns the table entry equal to `value` (within rounding).
    pub fn validate(&self, parameter: &str, value: f64) -> crate::Result<f64> {
        self.values
            .iter()
            .copied()
            .find(|x| (x - value).abs() <= x.abs() * 1e-9)
            .ok_or_else(|| Error::InvalidValue {
                parameter: parameter.to_string(),
                value: value.to_string(),
                allowed: self
                    .values
                    .iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().fold(None, |acc, x| match acc {
            Some(y) if y >= x => Some(y),
            _ => Some(x),
        })
    }
}

/// On/off flags are sent as `1` / `0`.
pub fn on_off(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        let v = Numbers::new(-10.0, 10.0);
        assert_eq!(v.validate("voltage", 10.0).unwrap(), 10.0);
        assert_eq!(v.validate("voltage", -10.0).unwrap(), -10.0);
        assert!(v.validate("voltage", 10.1).is_err());
        assert!(v.validate("voltage", -10.1).is_err());
        assert!(v.validate("voltage", f64::NAN).is_err());
        let err = v.validate("voltage", 11.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value 11 of `voltage` is out of range [-10, 10]"
        );
    }

    #[test]
    fn ints() {
        assert_eq!(Ints::signed_bits(8), Ints::new(-128, 127));
        assert_eq!(Ints::signed_bits(6), Ints::new(-32, 31));
        let v = Ints::signed_bits(6);
        assert!(v.validate("step", 31).is_ok());
        assert!(v.validate("step", 32).is_err());
        assert!(v.validate("step", -33).is_err());
    }

    #[test]
    fn enums() {
        let table = [200e-3, 2e0, 7e0, 18e0];
        let v = Enum::new(&table);
        assert_eq!(v.validate("range", 0.2).unwrap(), 200e-3);
        assert_eq!(v.validate("range", 7.0000000001).unwrap(), 7.0);
        assert!(v.validate("range", 5.0).is_err());
        assert_eq!(v.max(), Some(18.0));
        assert_eq!(Enum::new(&[]).max(), None);
    }
}
