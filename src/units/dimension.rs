//! Dimensional algebra over the seven SI base dimensions
//!
//! A physical dimension is a vector of seven rational exponents, ordered
//! `(L, M, T, I, Θ, N, J)`. Multiplication adds exponents, division
//! subtracts them, exponentiation scales them; addition is only defined
//! between equal vectors, which is exactly the property the unit guard
//! checks. Exponents are rational, not integral, because `sqrt` halves them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reduced rational exponent. Denominator is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    num: i32,
    den: i32,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { num: 0, den: 1 };

    pub fn new(num: i32, den: i32) -> Ratio {
        assert!(den != 0, "zero denominator in dimension exponent");
        let sign = if den < 0 { -1 } else { 1 };
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i32;
        Ratio {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    pub fn from_int(n: i32) -> Ratio {
        Ratio { num: n, den: 1 }
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn add(self, other: Ratio) -> Ratio {
        Ratio::new(self.num * other.den + other.num * self.den, self.den * other.den)
    }

    pub fn sub(self, other: Ratio) -> Ratio {
        Ratio::new(self.num * other.den - other.num * self.den, self.den * other.den)
    }

    pub fn scale(self, by: Ratio) -> Ratio {
        Ratio::new(self.num * by.num, self.den * by.den)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Base-dimension symbols in vector order.
const SYMBOLS: [&str; 7] = ["L", "M", "T", "I", "Θ", "N", "J"];

/// A physical dimension as seven rational exponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension([Ratio; 7]);

impl Dimension {
    pub const DIMENSIONLESS: Dimension = Dimension([Ratio::ZERO; 7]);

    pub fn from_exponents(exponents: [i32; 7]) -> Dimension {
        Dimension(exponents.map(Ratio::from_int))
    }

    pub fn length() -> Dimension {
        Dimension::from_exponents([1, 0, 0, 0, 0, 0, 0])
    }

    pub fn mass() -> Dimension {
        Dimension::from_exponents([0, 1, 0, 0, 0, 0, 0])
    }

    pub fn time() -> Dimension {
        Dimension::from_exponents([0, 0, 1, 0, 0, 0, 0])
    }

    pub fn current() -> Dimension {
        Dimension::from_exponents([0, 0, 0, 1, 0, 0, 0])
    }

    pub fn temperature() -> Dimension {
        Dimension::from_exponents([0, 0, 0, 0, 1, 0, 0])
    }

    pub fn amount() -> Dimension {
        Dimension::from_exponents([0, 0, 0, 0, 0, 1, 0])
    }

    pub fn luminosity() -> Dimension {
        Dimension::from_exponents([0, 0, 0, 0, 0, 0, 1])
    }

    pub fn velocity() -> Dimension {
        Dimension::from_exponents([1, 0, -1, 0, 0, 0, 0])
    }

    pub fn acceleration() -> Dimension {
        Dimension::from_exponents([1, 0, -2, 0, 0, 0, 0])
    }

    pub fn force() -> Dimension {
        Dimension::from_exponents([1, 1, -2, 0, 0, 0, 0])
    }

    pub fn energy() -> Dimension {
        Dimension::from_exponents([2, 1, -2, 0, 0, 0, 0])
    }

    pub fn power() -> Dimension {
        Dimension::from_exponents([2, 1, -3, 0, 0, 0, 0])
    }

    pub fn pressure() -> Dimension {
        Dimension::from_exponents([-1, 1, -2, 0, 0, 0, 0])
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(Ratio::is_zero)
    }

    /// Component-wise sum of exponents (multiplication of quantities).
    pub fn mul(self, other: Dimension) -> Dimension {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0.iter()) {
            *a = a.add(*b);
        }
        Dimension(out)
    }

    /// Component-wise difference of exponents (division of quantities).
    pub fn div(self, other: Dimension) -> Dimension {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0.iter()) {
            *a = a.sub(*b);
        }
        Dimension(out)
    }

    /// Scale every exponent by an integer power.
    pub fn powi(self, n: i32) -> Dimension {
        self.pow_ratio(Ratio::from_int(n))
    }

    /// Scale every exponent by a rational power (`sqrt` is 1/2).
    pub fn pow_ratio(self, r: Ratio) -> Dimension {
        Dimension(self.0.map(|e| e.scale(r)))
    }

    pub fn sqrt(self) -> Dimension {
        self.pow_ratio(Ratio::new(1, 2))
    }
}

impl fmt::Display for Dimension {
    /// Human-readable form: `[1]`, `[L]`, `[L T^-1]`, `[L^1/2]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return f.write_str("[1]");
        }
        let mut parts = Vec::new();
        for (symbol, exp) in SYMBOLS.iter().zip(self.0.iter()) {
            if exp.is_zero() {
                continue;
            }
            if *exp == Ratio::from_int(1) {
                parts.push((*symbol).to_string());
            } else {
                parts.push(format!("{symbol}^{exp}"));
            }
        }
        write!(f, "[{}]", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_is_length_over_time() {
        assert_eq!(Dimension::length().div(Dimension::time()), Dimension::velocity());
    }

    #[test]
    fn energy_decomposes() {
        let energy = Dimension::mass()
            .mul(Dimension::velocity())
            .mul(Dimension::velocity());
        assert_eq!(energy, Dimension::energy());
    }

    #[test]
    fn sqrt_halves_exponents() {
        let area = Dimension::length().powi(2);
        assert_eq!(area.sqrt(), Dimension::length());
        // sqrt of a bare length is a genuinely fractional dimension
        assert_eq!(Dimension::length().sqrt().to_string(), "[L^1/2]");
    }

    #[test]
    fn display_matches_report_format() {
        assert_eq!(Dimension::DIMENSIONLESS.to_string(), "[1]");
        assert_eq!(Dimension::length().to_string(), "[L]");
        assert_eq!(Dimension::velocity().to_string(), "[L T^-1]");
        assert_eq!(Dimension::force().to_string(), "[L M T^-2]");
    }

    #[test]
    fn ratio_arithmetic_reduces() {
        let half = Ratio::new(2, 4);
        assert_eq!(half, Ratio::new(1, 2));
        assert_eq!(half.add(half), Ratio::from_int(1));
        assert_eq!(Ratio::new(1, -2).to_string(), "-1/2");
    }

    #[test]
    fn powi_round_trips() {
        let d = Dimension::pressure();
        assert_eq!(d.powi(3).pow_ratio(Ratio::new(1, 3)), d);
        assert_eq!(d.powi(0), Dimension::DIMENSIONLESS);
    }
}
