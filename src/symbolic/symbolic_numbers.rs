//! # Numeric tower
//!
//! Numeric leaves are stored in the narrowest exact representation that holds the value:
//! `Int(i64)`, reduced `Rational(i64/i64)`, `Real(f64)` and the three complex mirrors of these.
//!
//! ## Promotion
//! A binary operation starts at the lowest tier both operands can be represented in
//! ([`NumericTier::join`], an explicit `(left, right)` table) and tries an exact, overflow-checked
//! computation there. When the computation overflows it moves on to the next tier both operands
//! fit in. The complex-double tier always succeeds (possibly with NaN/inf), so the climb terminates.
//!
//! ## Conventions
//! - exact division by zero gives NaN instead of a fault,
//! - `sqrt`/`ln` of a negative real give the principal complex value,
//! - integer powers use repeated squaring and continue in double precision on overflow,
//! - results are normalized on construction: `4/2` becomes `Int(2)`, `3+0i` becomes `Int(3)`.

use num::integer::Roots;
use num::rational::Ratio;
use num_complex::{Complex, Complex64};
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Signed, Zero};
use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;
use strum_macros::{Display, EnumIter};

pub type Rational = Ratio<i64>;

/// A numeric value in one of the six tower representations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Rational(Rational),
    Real(f64),
    ComplexInt(Complex<i64>),
    ComplexRational(Complex<Rational>),
    ComplexReal(Complex64),
}

/// Position in the numeric tower. The order of the variants is the order of the tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum NumericTier {
    Boolean,
    Integer,
    Rational,
    Real,
    ComplexInteger,
    ComplexRational,
    ComplexReal,
    NonNumeric,
}

impl NumericTier {
    /// Lowest tier that can hold values of both kinds.
    pub fn join(self, other: NumericTier) -> NumericTier {
        use NumericTier::*;
        match (self, other) {
            (NonNumeric, _) | (_, NonNumeric) => NonNumeric,
            (Boolean, Boolean) => Boolean,
            (Boolean | Integer, Boolean | Integer) => Integer,
            (Boolean | Integer | Rational, Boolean | Integer | Rational) => Rational,
            (Boolean | Integer | Rational | Real, Boolean | Integer | Rational | Real) => Real,
            (Boolean | Integer | ComplexInteger, Boolean | Integer | ComplexInteger) => {
                ComplexInteger
            }
            (
                Boolean | Integer | Rational | ComplexInteger | ComplexRational,
                Boolean | Integer | Rational | ComplexInteger | ComplexRational,
            ) => ComplexRational,
            (_, _) => ComplexReal,
        }
    }

    fn successor(self) -> Option<NumericTier> {
        use NumericTier::*;
        match self {
            Boolean => Some(Integer),
            Integer => Some(Rational),
            Rational => Some(Real),
            Real => Some(ComplexInteger),
            ComplexInteger => Some(ComplexRational),
            ComplexRational => Some(ComplexReal),
            ComplexReal | NonNumeric => None,
        }
    }
}

/// `n/d` as a ratio, refusing the cases `Ratio::new` can not normalize without overflow.
fn checked_ratio(numer: i64, denom: i64) -> Option<Rational> {
    if denom == 0 || numer == i64::MIN || denom == i64::MIN {
        None
    } else {
        Some(Ratio::new(numer, denom))
    }
}

fn ratio_to_f64(r: &Rational) -> f64 {
    *r.numer() as f64 / *r.denom() as f64
}

fn ratio_neg(r: &Rational) -> Option<Rational> {
    Some(Ratio::new_raw(r.numer().checked_neg()?, *r.denom()))
}

impl Number {
    /////////////////////////////CONSTRUCTION//////////////////////////////////

    /// `numer / denom` in reduced form; a zero denominator gives NaN.
    pub fn rational(numer: i64, denom: i64) -> Number {
        if denom == 0 {
            return Number::Real(f64::NAN);
        }
        match checked_ratio(numer, denom) {
            Some(r) => Number::from_ratio(r),
            None => Number::Real(numer as f64 / denom as f64),
        }
    }

    pub fn from_ratio(r: Rational) -> Number {
        if r.is_integer() {
            Number::Int(r.to_integer())
        } else {
            Number::Rational(r)
        }
    }

    pub fn complex_int(re: i64, im: i64) -> Number {
        if im == 0 {
            Number::Int(re)
        } else {
            Number::ComplexInt(Complex::new(re, im))
        }
    }

    pub fn complex_rational(re: Rational, im: Rational) -> Number {
        if im.is_zero() {
            Number::from_ratio(re)
        } else if re.is_integer() && im.is_integer() {
            Number::ComplexInt(Complex::new(re.to_integer(), im.to_integer()))
        } else {
            Number::ComplexRational(Complex::new(re, im))
        }
    }

    pub fn complex_real(c: Complex64) -> Number {
        if c.im == 0.0 {
            Number::Real(c.re)
        } else {
            Number::ComplexReal(c)
        }
    }

    ///////////////////////////////TIERS//////////////////////////////////////

    pub fn tier(&self) -> NumericTier {
        match self {
            Number::Int(_) => NumericTier::Integer,
            Number::Rational(_) => NumericTier::Rational,
            Number::Real(_) => NumericTier::Real,
            Number::ComplexInt(_) => NumericTier::ComplexInteger,
            Number::ComplexRational(_) => NumericTier::ComplexRational,
            Number::ComplexReal(_) => NumericTier::ComplexReal,
        }
    }

    /// Whether this value can be represented exactly at `tier`.
    pub fn fits(&self, tier: NumericTier) -> bool {
        use NumericTier as T;
        match self {
            Number::Int(_) => (T::Integer..=T::ComplexReal).contains(&tier),
            Number::Rational(_) => matches!(
                tier,
                T::Rational | T::Real | T::ComplexRational | T::ComplexReal
            ),
            Number::Real(_) => matches!(tier, T::Real | T::ComplexReal),
            Number::ComplexInt(_) => (T::ComplexInteger..=T::ComplexReal).contains(&tier),
            Number::ComplexRational(_) => matches!(tier, T::ComplexRational | T::ComplexReal),
            Number::ComplexReal(_) => tier == T::ComplexReal,
        }
    }

    fn next_shared_tier(&self, other: &Number, tier: NumericTier) -> Option<NumericTier> {
        let mut next = tier.successor();
        while let Some(candidate) = next {
            if self.fits(candidate) && other.fits(candidate) {
                return Some(candidate);
            }
            next = candidate.successor();
        }
        None
    }

    /// Climbs the tower from the joined tier until `op` succeeds.
    fn promote<F>(&self, other: &Number, op: F) -> Number
    where
        F: Fn(NumericTier) -> Option<Number>,
    {
        let mut tier = Some(self.tier().join(other.tier()));
        while let Some(current) = tier {
            if let Some(result) = op(current) {
                return result;
            }
            tier = self.next_shared_tier(other, current);
        }
        Number::Real(f64::NAN)
    }

    ///////////////////////////////VIEWS//////////////////////////////////////

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value of an `Int` or of an integral, finite `Real`.
    pub fn integer_value(&self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(*v),
            Number::Real(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => Some(*x as i64),
            _ => None,
        }
    }

    pub fn to_ratio(&self) -> Option<Rational> {
        match self {
            Number::Int(v) => Some(Ratio::from_integer(*v)),
            Number::Rational(r) => Some(*r),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Number::Int(v) => Some(*v as f64),
            Number::Rational(r) => Some(ratio_to_f64(r)),
            Number::Real(x) => Some(*x),
            _ => None,
        }
    }

    pub fn to_complex_int(&self) -> Option<Complex<i64>> {
        match self {
            Number::Int(v) => Some(Complex::new(*v, 0)),
            Number::ComplexInt(c) => Some(*c),
            _ => None,
        }
    }

    pub fn to_complex_ratio(&self) -> Option<Complex<Rational>> {
        match self {
            Number::Int(_) | Number::Rational(_) => {
                Some(Complex::new(self.to_ratio()?, Ratio::from_integer(0)))
            }
            Number::ComplexInt(c) => Some(Complex::new(
                Ratio::from_integer(c.re),
                Ratio::from_integer(c.im),
            )),
            Number::ComplexRational(c) => Some(*c),
            _ => None,
        }
    }

    pub fn to_complex64(&self) -> Complex64 {
        match self {
            Number::Int(v) => Complex64::new(*v as f64, 0.0),
            Number::Rational(r) => Complex64::new(ratio_to_f64(r), 0.0),
            Number::Real(x) => Complex64::new(*x, 0.0),
            Number::ComplexInt(c) => Complex64::new(c.re as f64, c.im as f64),
            Number::ComplexRational(c) => Complex64::new(ratio_to_f64(&c.re), ratio_to_f64(&c.im)),
            Number::ComplexReal(c) => *c,
        }
    }

    ///////////////////////////////PREDICATES/////////////////////////////////

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            Number::ComplexInt(_) | Number::ComplexRational(_) | Number::ComplexReal(_)
        )
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Int(v) => *v == 0,
            Number::Real(x) => *x == 0.0,
            _ => false,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Number::Int(v) => *v == 1,
            Number::Real(x) => *x == 1.0,
            _ => false,
        }
    }

    pub fn is_minus_one(&self) -> bool {
        match self {
            Number::Int(v) => *v == -1,
            Number::Real(x) => *x == -1.0,
            _ => false,
        }
    }

    /// Strictly negative real value.
    pub fn is_negative(&self) -> bool {
        match self {
            Number::Int(v) => *v < 0,
            Number::Rational(r) => r.is_negative(),
            Number::Real(x) => *x < 0.0,
            _ => false,
        }
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Number::Real(x) => x.is_nan(),
            Number::ComplexReal(c) => c.re.is_nan() || c.im.is_nan(),
            _ => false,
        }
    }

    ///////////////////////////////ARITHMETIC/////////////////////////////////

    pub fn add(&self, other: &Number) -> Number {
        self.promote(other, |tier| match tier {
            NumericTier::Integer => Some(Number::Int(self.as_int()?.checked_add(other.as_int()?)?)),
            NumericTier::Rational => Some(Number::from_ratio(
                self.to_ratio()?.checked_add(&other.to_ratio()?)?,
            )),
            NumericTier::Real => Some(Number::Real(self.to_f64()? + other.to_f64()?)),
            NumericTier::ComplexInteger => {
                let (a, b) = (self.to_complex_int()?, other.to_complex_int()?);
                Some(Number::complex_int(
                    a.re.checked_add(b.re)?,
                    a.im.checked_add(b.im)?,
                ))
            }
            NumericTier::ComplexRational => {
                let (a, b) = (self.to_complex_ratio()?, other.to_complex_ratio()?);
                Some(Number::complex_rational(
                    a.re.checked_add(&b.re)?,
                    a.im.checked_add(&b.im)?,
                ))
            }
            _ => Some(Number::complex_real(
                self.to_complex64() + other.to_complex64(),
            )),
        })
    }

    pub fn sub(&self, other: &Number) -> Number {
        self.promote(other, |tier| match tier {
            NumericTier::Integer => Some(Number::Int(self.as_int()?.checked_sub(other.as_int()?)?)),
            NumericTier::Rational => Some(Number::from_ratio(
                self.to_ratio()?.checked_sub(&other.to_ratio()?)?,
            )),
            NumericTier::Real => Some(Number::Real(self.to_f64()? - other.to_f64()?)),
            NumericTier::ComplexInteger => {
                let (a, b) = (self.to_complex_int()?, other.to_complex_int()?);
                Some(Number::complex_int(
                    a.re.checked_sub(b.re)?,
                    a.im.checked_sub(b.im)?,
                ))
            }
            NumericTier::ComplexRational => {
                let (a, b) = (self.to_complex_ratio()?, other.to_complex_ratio()?);
                Some(Number::complex_rational(
                    a.re.checked_sub(&b.re)?,
                    a.im.checked_sub(&b.im)?,
                ))
            }
            _ => Some(Number::complex_real(
                self.to_complex64() - other.to_complex64(),
            )),
        })
    }

    pub fn mul(&self, other: &Number) -> Number {
        self.promote(other, |tier| match tier {
            NumericTier::Integer => Some(Number::Int(self.as_int()?.checked_mul(other.as_int()?)?)),
            NumericTier::Rational => Some(Number::from_ratio(
                self.to_ratio()?.checked_mul(&other.to_ratio()?)?,
            )),
            NumericTier::Real => Some(Number::Real(self.to_f64()? * other.to_f64()?)),
            NumericTier::ComplexInteger => {
                let (a, b) = (self.to_complex_int()?, other.to_complex_int()?);
                let re = a.re.checked_mul(b.re)?.checked_sub(a.im.checked_mul(b.im)?)?;
                let im = a.re.checked_mul(b.im)?.checked_add(a.im.checked_mul(b.re)?)?;
                Some(Number::complex_int(re, im))
            }
            NumericTier::ComplexRational => {
                let (a, b) = (self.to_complex_ratio()?, other.to_complex_ratio()?);
                let re = a.re.checked_mul(&b.re)?.checked_sub(&a.im.checked_mul(&b.im)?)?;
                let im = a.re.checked_mul(&b.im)?.checked_add(&a.im.checked_mul(&b.re)?)?;
                Some(Number::complex_rational(re, im))
            }
            _ => Some(Number::complex_real(
                self.to_complex64() * other.to_complex64(),
            )),
        })
    }

    /// Division. Exact tiers return NaN for a zero divisor.
    pub fn div(&self, other: &Number) -> Number {
        self.promote(other, |tier| match tier {
            NumericTier::Integer => {
                let (a, b) = (self.as_int()?, other.as_int()?);
                if b == 0 {
                    return Some(Number::Real(f64::NAN));
                }
                Some(Number::from_ratio(checked_ratio(a, b)?))
            }
            NumericTier::Rational => {
                let (a, b) = (self.to_ratio()?, other.to_ratio()?);
                if b.is_zero() {
                    return Some(Number::Real(f64::NAN));
                }
                Some(Number::from_ratio(a.checked_div(&b)?))
            }
            NumericTier::Real => {
                let (a, b) = (self.to_f64()?, other.to_f64()?);
                if b == 0.0 {
                    return Some(Number::Real(f64::NAN));
                }
                Some(Number::Real(a / b))
            }
            NumericTier::ComplexInteger => {
                let (a, b) = (self.to_complex_int()?, other.to_complex_int()?);
                let denom = b.re.checked_mul(b.re)?.checked_add(b.im.checked_mul(b.im)?)?;
                if denom == 0 {
                    return Some(Number::Real(f64::NAN));
                }
                let re = a.re.checked_mul(b.re)?.checked_add(a.im.checked_mul(b.im)?)?;
                let im = a.im.checked_mul(b.re)?.checked_sub(a.re.checked_mul(b.im)?)?;
                Some(Number::complex_rational(
                    checked_ratio(re, denom)?,
                    checked_ratio(im, denom)?,
                ))
            }
            NumericTier::ComplexRational => {
                let (a, b) = (self.to_complex_ratio()?, other.to_complex_ratio()?);
                let denom = b.re.checked_mul(&b.re)?.checked_add(&b.im.checked_mul(&b.im)?)?;
                if denom.is_zero() {
                    return Some(Number::Real(f64::NAN));
                }
                let re = a.re.checked_mul(&b.re)?.checked_add(&a.im.checked_mul(&b.im)?)?;
                let im = a.im.checked_mul(&b.re)?.checked_sub(&a.re.checked_mul(&b.im)?)?;
                Some(Number::complex_rational(
                    re.checked_div(&denom)?,
                    im.checked_div(&denom)?,
                ))
            }
            _ => {
                let divisor = other.to_complex64();
                if divisor.is_zero() {
                    return Some(Number::Real(f64::NAN));
                }
                Some(Number::complex_real(self.to_complex64() / divisor))
            }
        })
    }

    pub fn neg(&self) -> Number {
        match self {
            Number::Int(v) => v
                .checked_neg()
                .map(Number::Int)
                .unwrap_or(Number::Real(-(*v as f64))),
            Number::Rational(r) => ratio_neg(r)
                .map(Number::Rational)
                .unwrap_or(Number::Real(-ratio_to_f64(r))),
            Number::Real(x) => Number::Real(-x),
            Number::ComplexInt(c) => match (c.re.checked_neg(), c.im.checked_neg()) {
                (Some(re), Some(im)) => Number::complex_int(re, im),
                _ => Number::complex_real(-self.to_complex64()),
            },
            Number::ComplexRational(c) => match (ratio_neg(&c.re), ratio_neg(&c.im)) {
                (Some(re), Some(im)) => Number::complex_rational(re, im),
                _ => Number::complex_real(-self.to_complex64()),
            },
            Number::ComplexReal(c) => Number::ComplexReal(-c),
        }
    }

    /// `self ^ exponent`.
    pub fn pow(&self, exponent: &Number) -> Number {
        match (self, exponent) {
            (Number::Int(base), Number::Int(exp)) => pow_int(*base, *exp),
            (Number::Rational(base), Number::Int(exp)) => pow_ratio(base, *exp),
            (base, Number::Rational(exp)) if !base.is_complex() && *exp == Ratio::new(1, 2) => {
                base.sqrt()
            }
            (Number::ComplexInt(base), Number::Int(exp)) if *exp >= 0 => {
                pow_complex_int(*base, *exp as u64)
            }
            _ => match (self.to_f64(), exponent.to_f64()) {
                (Some(base), Some(exp)) if base >= 0.0 || base.is_nan() || exp.fract() == 0.0 => {
                    Number::Real(base.powf(exp))
                }
                (Some(base), Some(exp)) => {
                    // negative base, fractional exponent: |b|^e * e^(i*pi*e)
                    Number::complex_real(Complex64::from_polar((-base).powf(exp), PI * exp))
                }
                _ => {
                    let base = self.to_complex64();
                    match exponent.as_int().and_then(|e| i32::try_from(e).ok()) {
                        Some(exp) => Number::complex_real(base.powi(exp)),
                        None => Number::complex_real(base.powc(exponent.to_complex64())),
                    }
                }
            },
        }
    }

    /// Principal square root, exact where the radicand is a perfect square.
    pub fn sqrt(&self) -> Number {
        match self {
            Number::Int(v) => {
                let magnitude = v.unsigned_abs();
                let root = Roots::sqrt(&magnitude);
                let exact = root.checked_mul(root) == Some(magnitude);
                match (*v >= 0, exact) {
                    (true, true) => Number::Int(root as i64),
                    (true, false) => Number::Real((magnitude as f64).sqrt()),
                    (false, true) => Number::complex_int(0, root as i64),
                    (false, false) => {
                        Number::complex_real(Complex64::new(0.0, (magnitude as f64).sqrt()))
                    }
                }
            }
            Number::Rational(r) => {
                let numer = Number::Int(*r.numer()).sqrt();
                let denom = Number::Int(*r.denom()).sqrt();
                match (numer, denom) {
                    (Number::Int(n), Number::Int(d)) => Number::rational(n, d),
                    (Number::ComplexInt(n), Number::Int(d)) => Number::complex_rational(
                        Ratio::from_integer(0),
                        checked_ratio(n.im, d).unwrap_or(Ratio::from_integer(0)),
                    ),
                    _ => {
                        let x = ratio_to_f64(r);
                        if x < 0.0 {
                            Number::complex_real(Complex64::new(0.0, (-x).sqrt()))
                        } else {
                            Number::Real(x.sqrt())
                        }
                    }
                }
            }
            Number::Real(x) if *x < 0.0 => Number::complex_real(Complex64::new(0.0, (-x).sqrt())),
            Number::Real(x) => Number::Real(x.sqrt()),
            _ => Number::complex_real(self.to_complex64().sqrt()),
        }
    }

    /// Natural logarithm; negative reals map to `ln|x| + i*pi`.
    pub fn ln(&self) -> Number {
        if self.is_one() {
            return Number::Int(0);
        }
        match self.to_f64() {
            Some(x) if x > 0.0 || x.is_nan() => Number::Real(x.ln()),
            Some(x) if x == 0.0 => Number::Real(f64::NEG_INFINITY),
            Some(x) => Number::complex_real(Complex64::new((-x).ln(), PI)),
            None => Number::complex_real(self.to_complex64().ln()),
        }
    }

    pub fn abs(&self) -> Number {
        match self {
            Number::Int(v) => v
                .checked_abs()
                .map(Number::Int)
                .unwrap_or(Number::Real((*v as f64).abs())),
            Number::Rational(r) if r.is_negative() => self.neg(),
            Number::Rational(_) => *self,
            Number::Real(x) => Number::Real(x.abs()),
            Number::ComplexInt(c) => match c
                .re
                .checked_mul(c.re)
                .and_then(|re2| c.im.checked_mul(c.im).and_then(|im2| re2.checked_add(im2)))
            {
                Some(square) => Number::Int(square).sqrt(),
                None => Number::Real(self.to_complex64().norm()),
            },
            _ => Number::Real(self.to_complex64().norm()),
        }
    }

    /// -1, 0 or 1 for reals, `z/|z|` for complex values.
    pub fn signum(&self) -> Number {
        if self.is_nan() {
            return Number::Real(f64::NAN);
        }
        match self.to_f64() {
            Some(x) if x > 0.0 => Number::Int(1),
            Some(x) if x < 0.0 => Number::Int(-1),
            Some(_) => Number::Int(0),
            None => {
                let z = self.to_complex64();
                Number::complex_real(z / z.norm())
            }
        }
    }

    pub fn conj(&self) -> Number {
        match self {
            Number::ComplexInt(c) => c
                .im
                .checked_neg()
                .map(|im| Number::complex_int(c.re, im))
                .unwrap_or(Number::complex_real(self.to_complex64().conj())),
            Number::ComplexRational(c) => ratio_neg(&c.im)
                .map(|im| Number::complex_rational(c.re, im))
                .unwrap_or(Number::complex_real(self.to_complex64().conj())),
            Number::ComplexReal(c) => Number::ComplexReal(c.conj()),
            _ => *self,
        }
    }

    ///////////////////////////////COMPARISON/////////////////////////////////

    /// Ordering of two real values; `None` for complex operands or NaN.
    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        if self.is_complex() || other.is_complex() {
            return None;
        }
        match (self.to_ratio(), other.to_ratio()) {
            (Some(a), Some(b)) => {
                let left = *a.numer() as i128 * *b.denom() as i128;
                let right = *b.numer() as i128 * *a.denom() as i128;
                Some(left.cmp(&right))
            }
            _ => self.to_f64()?.partial_cmp(&other.to_f64()?),
        }
    }

    /// Equality by value across representations (`Int(2)` equals `Real(2.0)`).
    pub fn value_eq(&self, other: &Number) -> bool {
        if !self.is_complex() && !other.is_complex() {
            return self.compare(other) == Some(Ordering::Equal);
        }
        match (self.to_complex_ratio(), other.to_complex_ratio()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_complex64() == other.to_complex64(),
        }
    }
}

/// Integer power by repeated squaring, most significant exponent bit first.
/// When a squaring step overflows, the remaining bits are processed in double precision
/// starting from the last value that still fitted.
pub fn pow_int(base: i64, exponent: i64) -> Number {
    if exponent < 0 {
        let Some(positive) = exponent.checked_neg() else {
            return Number::Real((base as f64).powf(exponent as f64));
        };
        return match pow_int(base, positive) {
            Number::Int(0) => Number::Real(f64::NAN),
            Number::Int(v) => Number::rational(1, v),
            other => Number::Real(1.0 / other.to_f64().unwrap_or(f64::NAN)),
        };
    }
    if exponent == 0 {
        return Number::Int(1);
    }
    let exp = exponent as u64;
    let mut bit = 1u64 << (63 - exp.leading_zeros());
    let mut acc = base;
    bit >>= 1;
    while bit != 0 {
        let step = acc.checked_mul(acc).and_then(|square| {
            if exp & bit != 0 {
                square.checked_mul(base)
            } else {
                Some(square)
            }
        });
        match step {
            Some(value) => acc = value,
            None => break,
        }
        bit >>= 1;
    }
    if bit == 0 {
        return Number::Int(acc);
    }
    let base = base as f64;
    let mut value = acc as f64;
    while bit != 0 {
        value *= value;
        if exp & bit != 0 {
            value *= base;
        }
        bit >>= 1;
    }
    Number::Real(value)
}

fn pow_ratio(base: &Rational, exponent: i64) -> Number {
    let (numer, denom) = if exponent < 0 {
        (*base.denom(), *base.numer())
    } else {
        (*base.numer(), *base.denom())
    };
    let Some(exp) = exponent.checked_abs() else {
        return Number::Real(ratio_to_f64(base).powf(exponent as f64));
    };
    match (pow_int(numer, exp), pow_int(denom, exp)) {
        (Number::Int(n), Number::Int(d)) => Number::rational(n, d),
        (n, d) => match (n.to_f64(), d.to_f64()) {
            (Some(n), Some(d)) if d != 0.0 => Number::Real(n / d),
            _ => Number::Real(f64::NAN),
        },
    }
}

fn pow_complex_int(base: Complex<i64>, exponent: u64) -> Number {
    let checked_mul = |a: Complex<i64>, b: Complex<i64>| -> Option<Complex<i64>> {
        let re = a.re.checked_mul(b.re)?.checked_sub(a.im.checked_mul(b.im)?)?;
        let im = a.re.checked_mul(b.im)?.checked_add(a.im.checked_mul(b.re)?)?;
        Some(Complex::new(re, im))
    };
    let mut result = Complex::new(1i64, 0);
    let mut square = base;
    let mut remaining = exponent;
    while remaining > 0 {
        if remaining & 1 == 1 {
            match checked_mul(result, square) {
                Some(value) => result = value,
                None => return fallback_complex_pow(base, exponent),
            }
        }
        remaining >>= 1;
        if remaining > 0 {
            match checked_mul(square, square) {
                Some(value) => square = value,
                None => return fallback_complex_pow(base, exponent),
            }
        }
    }
    Number::complex_int(result.re, result.im)
}

fn fallback_complex_pow(base: Complex<i64>, exponent: u64) -> Number {
    let base = Complex64::new(base.re as f64, base.im as f64);
    Number::complex_real(base.powf(exponent as f64))
}

fn write_signed_imaginary(f: &mut fmt::Formatter, negative: bool, magnitude: String) -> fmt::Result {
    if negative {
        write!(f, "-{}i", magnitude)
    } else {
        write!(f, "+{}i", magnitude)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Number::Real(x) => write!(f, "{}", x),
            Number::ComplexInt(c) => {
                if c.re == 0 {
                    return write!(f, "{}i", c.im);
                }
                write!(f, "{}", c.re)?;
                write_signed_imaginary(f, c.im < 0, c.im.unsigned_abs().to_string())
            }
            Number::ComplexRational(c) => {
                if c.re.is_zero() {
                    return write!(f, "{}i", c.im);
                }
                write!(f, "{}", c.re)?;
                write_signed_imaginary(f, c.im.is_negative(), c.im.abs().to_string())
            }
            Number::ComplexReal(c) => {
                if c.re == 0.0 {
                    return write!(f, "{}i", c.im);
                }
                write!(f, "{}", c.re)?;
                write_signed_imaginary(f, c.im < 0.0, c.im.abs().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integer_add_exact_and_promoted() {
        assert_eq!(Number::Int(2).add(&Number::Int(3)), Number::Int(5));
        let overflow = Number::Int(i64::MAX).add(&Number::Int(1));
        assert_eq!(overflow, Number::Real(i64::MAX as f64 + 1.0));
        let underflow = Number::Int(i64::MIN).sub(&Number::Int(1));
        assert_eq!(underflow, Number::Real(i64::MIN as f64 - 1.0));
    }

    #[test]
    fn test_integer_mul_promotes_on_overflow() {
        let a = 3_037_000_500_i64;
        assert_eq!(
            Number::Int(a).mul(&Number::Int(a)),
            Number::Real(a as f64 * a as f64)
        );
        assert_eq!(Number::Int(-7).mul(&Number::Int(6)), Number::Int(-42));
    }

    #[test]
    fn test_safe_range_matches_checked_arithmetic() {
        let samples = [
            0_i64,
            1,
            -1,
            17,
            -4096,
            1 << 31,
            -(1 << 40),
            i64::MAX / 2,
            i64::MIN / 3,
            i64::MAX,
        ];
        for &a in &samples {
            for &b in &samples {
                let (x, y) = (Number::Int(a), Number::Int(b));
                let expected_add = a
                    .checked_add(b)
                    .map(Number::Int)
                    .unwrap_or(Number::Real(a as f64 + b as f64));
                let expected_sub = a
                    .checked_sub(b)
                    .map(Number::Int)
                    .unwrap_or(Number::Real(a as f64 - b as f64));
                let expected_mul = a
                    .checked_mul(b)
                    .map(Number::Int)
                    .unwrap_or(Number::Real(a as f64 * b as f64));
                assert_eq!(x.add(&y), expected_add, "{} + {}", a, b);
                assert_eq!(x.sub(&y), expected_sub, "{} - {}", a, b);
                assert_eq!(x.mul(&y), expected_mul, "{} * {}", a, b);
            }
        }
    }

    #[test]
    fn test_rational_normalization() {
        assert_eq!(Number::rational(4, 2), Number::Int(2));
        assert_eq!(Number::rational(2, -4), Number::Rational(Ratio::new(-1, 2)));
        assert!(Number::rational(1, 0).is_nan());
        let third = Number::rational(1, 3);
        let sum = third.add(&third).add(&third);
        assert_eq!(sum, Number::Int(1));
    }

    #[test]
    fn test_division_by_zero_is_nan() {
        assert!(Number::Int(1).div(&Number::Int(0)).is_nan());
        assert!(Number::Real(1.0).div(&Number::Real(0.0)).is_nan());
        assert!(Number::rational(1, 2).div(&Number::Int(0)).is_nan());
        assert_eq!(Number::Int(1).div(&Number::Int(4)), Number::rational(1, 4));
    }

    #[test]
    fn test_complex_tiers() {
        let i = Number::complex_int(0, 1);
        assert_eq!(i.mul(&i), Number::Int(-1));
        let half = Number::rational(1, 2);
        assert_eq!(
            i.mul(&half),
            Number::ComplexRational(Complex::new(Ratio::from_integer(0), Ratio::new(1, 2)))
        );
        // real joined with complex-integer lands on complex-double
        let mixed = Number::Real(1.5).add(&i);
        assert_eq!(mixed, Number::ComplexReal(Complex64::new(1.5, 1.0)));
        assert_eq!(Number::complex_int(3, 4).abs(), Number::Int(5));
    }

    #[test]
    fn test_sqrt_and_ln_of_negative() {
        assert_eq!(Number::Int(9).sqrt(), Number::Int(3));
        assert_eq!(Number::Int(-4).sqrt(), Number::complex_int(0, 2));
        match Number::Real(-2.0).sqrt() {
            Number::ComplexReal(c) => {
                assert_eq!(c.re, 0.0);
                assert_relative_eq!(c.im, 2.0_f64.sqrt());
            }
            other => panic!("expected complex result, got {:?}", other),
        }
        match Number::Int(-1).ln() {
            Number::ComplexReal(c) => {
                assert_relative_eq!(c.re, 0.0);
                assert_relative_eq!(c.im, PI);
            }
            other => panic!("expected complex result, got {:?}", other),
        }
        assert_eq!(Number::rational(9, 4).sqrt(), Number::rational(3, 2));
        assert_eq!(Number::Int(1).ln(), Number::Int(0));
    }

    #[test]
    fn test_integer_power() {
        assert_eq!(pow_int(2, 10), Number::Int(1024));
        assert_eq!(pow_int(-3, 3), Number::Int(-27));
        assert_eq!(pow_int(2, 62), Number::Int(1 << 62));
        assert_eq!(pow_int(2, 63), Number::Real(9_223_372_036_854_775_808.0));
        assert_eq!(pow_int(0, 3), Number::Int(0));
        match pow_int(3, 50) {
            Number::Real(x) => assert_relative_eq!(x, 3f64.powi(50), max_relative = 1e-12),
            other => panic!("expected double, got {:?}", other),
        }
        assert_eq!(pow_int(2, -2), Number::rational(1, 4));
        assert_eq!(pow_int(-2, -3), Number::rational(-1, 8));
        assert!(pow_int(0, -1).is_nan());
    }

    #[test]
    fn test_fractional_powers() {
        assert_eq!(
            Number::Int(16).pow(&Number::rational(1, 2)),
            Number::Int(4)
        );
        assert_eq!(Number::rational(2, 3).pow(&Number::Int(2)), Number::rational(4, 9));
        match Number::Real(-8.0).pow(&Number::Real(1.0 / 3.0)) {
            Number::ComplexReal(c) => {
                assert_relative_eq!(c.re, 1.0, epsilon = 1e-12);
                assert_relative_eq!(c.im, 3.0_f64.sqrt(), epsilon = 1e-12);
            }
            other => panic!("expected complex result, got {:?}", other),
        }
        assert_eq!(
            Number::complex_int(1, 1).pow(&Number::Int(2)),
            Number::complex_int(0, 2)
        );
    }

    #[test]
    fn test_compare_and_value_eq() {
        assert_eq!(
            Number::rational(1, 3).compare(&Number::rational(1, 2)),
            Some(Ordering::Less)
        );
        assert!(Number::Int(2).value_eq(&Number::Real(2.0)));
        assert_eq!(Number::complex_int(1, 1).compare(&Number::Int(0)), None);
        assert_eq!(Number::Real(f64::NAN).compare(&Number::Int(0)), None);
    }

    #[test]
    fn test_join_table() {
        use NumericTier::*;
        assert_eq!(Integer.join(Rational), Rational);
        assert_eq!(Real.join(ComplexInteger), ComplexReal);
        assert_eq!(Rational.join(ComplexInteger), ComplexRational);
        assert_eq!(Boolean.join(Integer), Integer);
        assert_eq!(Real.join(NonNumeric), NonNumeric);
    }

    #[test]
    fn test_display() {
        assert_eq!(Number::rational(-1, 2).to_string(), "-1/2");
        assert_eq!(Number::complex_int(3, -2).to_string(), "3-2i");
        assert_eq!(Number::complex_int(0, 5).to_string(), "5i");
        assert_eq!(Number::Real(13.0).to_string(), "13");
    }
}
