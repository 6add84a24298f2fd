use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinOp, Expr};
use crate::errors::UnitError;
use crate::parser::parse_expression;

pub const BASE_DIMENSIONS: [&str; 7] = [
    "length",
    "mass",
    "time",
    "current",
    "temperature",
    "substance",
    "luminosity",
];

/// Integer exponents over the SI base dimensions, in `BASE_DIMENSIONS` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions([i32; 7]);

impl Dimensions {
    pub const DIMENSIONLESS: Dimensions = Dimensions([0; 7]);

    pub const fn new(exponents: [i32; 7]) -> Self {
        Self(exponents)
    }

    pub fn base(index: usize) -> Self {
        let mut exponents = [0; 7];
        exponents[index] = 1;
        Self(exponents)
    }

    pub fn exponents(&self) -> [i32; 7] {
        self.0
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    /// `None` when an exponent leaves the `i32` range.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.zip_exponents(other, i32::checked_add)
    }

    pub fn checked_div(self, other: Self) -> Option<Self> {
        self.zip_exponents(other, i32::checked_sub)
    }

    pub fn checked_powi(self, n: i32) -> Option<Self> {
        self.zip_exponents(Self([n; 7]), i32::checked_mul)
    }

    fn zip_exponents(self, other: Self, op: fn(i32, i32) -> Option<i32>) -> Option<Self> {
        let mut exponents = [0; 7];
        for (i, exponent) in exponents.iter_mut().enumerate() {
            *exponent = op(self.0[i], other.0[i])?;
        }
        Some(Self(exponents))
    }

    /// `None` when some exponent is odd.
    pub fn sqrt(self) -> Option<Self> {
        if self.0.iter().any(|e| e % 2 != 0) {
            return None;
        }
        Some(Self(self.0.map(|e| e / 2)))
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return f.write_str("dimensionless");
        }
        let term = |name: &str, exponent: i32| match exponent {
            1 => format!("[{name}]"),
            n => format!("[{name}] ** {n}"),
        };
        let numerator: Vec<String> = BASE_DIMENSIONS
            .iter()
            .zip(self.0)
            .filter(|(_, e)| *e > 0)
            .map(|(name, e)| term(name, e))
            .collect();
        let denominator: Vec<String> = BASE_DIMENSIONS
            .iter()
            .zip(self.0)
            .filter(|(_, e)| *e < 0)
            .map(|(name, e)| term(name, -e))
            .collect();
        let numerator = if numerator.is_empty() {
            "1".to_string()
        } else {
            numerator.join(" * ")
        };
        if denominator.is_empty() {
            f.write_str(&numerator)
        } else {
            write!(f, "{numerator} / {}", denominator.join(" / "))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    name: String,
    scale: f64,
    dims: Dimensions,
}

impl Unit {
    pub fn new(name: impl Into<String>, scale: f64, dims: Dimensions) -> Self {
        Self {
            name: name.into(),
            scale,
            dims,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new("dimensionless", 1.0, Dimensions::DIMENSIONLESS)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Factor converting a value in this unit to SI base units.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims.is_dimensionless()
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Unit of `self + other`; fails unless both share dimensions.
    pub fn checked_add(&self, other: &Unit) -> Result<Unit, UnitError> {
        if self.is_compatible(other) {
            Ok(self.clone())
        } else {
            Err(UnitError::Dimensionality {
                from: other.name.clone(),
                from_dims: other.dims.to_string(),
                to: self.name.clone(),
                to_dims: self.dims.to_string(),
            })
        }
    }

    pub fn mul(&self, other: &Unit) -> Result<Unit, UnitError> {
        if self.is_dimensionless() && self.scale == 1.0 {
            return Ok(other.clone());
        }
        if other.is_dimensionless() && other.scale == 1.0 {
            return Ok(self.clone());
        }
        let name = format!("{} * {}", self.name, other.grouped_name());
        let dims = self
            .dims
            .checked_mul(other.dims)
            .ok_or_else(|| UnitError::ExponentOverflow(name.clone()))?;
        Ok(Unit::new(name, self.scale * other.scale, dims))
    }

    pub fn div(&self, other: &Unit) -> Result<Unit, UnitError> {
        if other.is_dimensionless() && other.scale == 1.0 {
            return Ok(self.clone());
        }
        let name = format!("{} / {}", self.name, other.grouped_name());
        let dims = self
            .dims
            .checked_div(other.dims)
            .ok_or_else(|| UnitError::ExponentOverflow(name.clone()))?;
        Ok(Unit::new(name, self.scale / other.scale, dims))
    }

    pub fn powi(&self, n: i32) -> Result<Unit, UnitError> {
        match n {
            0 => Ok(Unit::dimensionless()),
            1 => Ok(self.clone()),
            n => {
                let name = format!("{} ** {n}", self.grouped_name());
                let dims = self
                    .dims
                    .checked_powi(n)
                    .ok_or_else(|| UnitError::ExponentOverflow(name.clone()))?;
                Ok(Unit::new(name, self.scale.powi(n), dims))
            }
        }
    }

    pub fn sqrt(&self) -> Result<Unit, UnitError> {
        let dims = self
            .dims
            .sqrt()
            .ok_or_else(|| UnitError::NonIntegerPower(self.name.clone()))?;
        Ok(Unit::new(
            format!("{} ** 0.5", self.grouped_name()),
            self.scale.sqrt(),
            dims,
        ))
    }

    fn grouped_name(&self) -> String {
        if self.name.contains(' ') {
            format!("({})", self.name)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Named units, looked up by full name or symbol.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, Unit>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let [length, mass, time, current, temperature, substance, luminosity] =
            std::array::from_fn(Dimensions::base);
        let none = Dimensions::DIMENSIONLESS;

        registry.define("meter", &["m", "metre"], 1.0, length);
        registry.define("kilometer", &["km"], 1e3, length);
        registry.define("centimeter", &["cm"], 1e-2, length);
        registry.define("millimeter", &["mm"], 1e-3, length);
        registry.define("kilogram", &["kg"], 1.0, mass);
        registry.define("gram", &["g"], 1e-3, mass);
        registry.define("second", &["s", "sec"], 1.0, time);
        registry.define("minute", &["min"], 60.0, time);
        registry.define("hour", &["h", "hr"], 3600.0, time);
        registry.define("ampere", &["A"], 1.0, current);
        registry.define("kelvin", &["K"], 1.0, temperature);
        registry.define("mole", &["mol"], 1.0, substance);
        registry.define("candela", &["cd"], 1.0, luminosity);
        registry.define("radian", &["rad"], 1.0, none);
        registry.define("percent", &[], 1e-2, none);

        // Exponents in BASE_DIMENSIONS order.
        let volume = Dimensions::new([3, 0, 0, 0, 0, 0, 0]);
        let frequency = Dimensions::new([0, 0, -1, 0, 0, 0, 0]);
        let force = Dimensions::new([1, 1, -2, 0, 0, 0, 0]);
        let energy = Dimensions::new([2, 1, -2, 0, 0, 0, 0]);
        let power = Dimensions::new([2, 1, -3, 0, 0, 0, 0]);
        let pressure = Dimensions::new([-1, 1, -2, 0, 0, 0, 0]);
        let charge = Dimensions::new([0, 0, 1, 1, 0, 0, 0]);
        let voltage = Dimensions::new([2, 1, -3, -1, 0, 0, 0]);
        let resistance = Dimensions::new([2, 1, -3, -2, 0, 0, 0]);
        registry.define("liter", &["l", "L", "litre"], 1e-3, volume);
        registry.define("hertz", &["Hz"], 1.0, frequency);
        registry.define("newton", &["N"], 1.0, force);
        registry.define("joule", &["J"], 1.0, energy);
        registry.define("kilojoule", &["kJ"], 1e3, energy);
        registry.define("watt", &["W"], 1.0, power);
        registry.define("kilowatt", &["kW"], 1e3, power);
        registry.define("pascal", &["Pa"], 1.0, pressure);
        registry.define("kilopascal", &["kPa"], 1e3, pressure);
        registry.define("bar", &[], 1e5, pressure);
        registry.define("coulomb", &["C"], 1.0, charge);
        registry.define("volt", &["V"], 1.0, voltage);
        registry.define("ohm", &[], 1.0, resistance);
        registry
    }
}

impl UnitRegistry {
    pub fn empty() -> Self {
        let mut units = HashMap::new();
        units.insert("dimensionless".to_string(), Unit::dimensionless());
        Self { units }
    }

    pub fn define(&mut self, name: &str, aliases: &[&str], scale: f64, dims: Dimensions) {
        let unit = Unit::new(name, scale, dims);
        for alias in aliases {
            self.units.insert(alias.to_string(), unit.clone());
        }
        self.units.insert(name.to_string(), unit);
    }

    pub fn lookup(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// Parses unit text such as `m/s^2` or `kg*m**2/s**2`. The result keeps
    /// the text as its name.
    pub fn parse_unit(&self, text: &str) -> Result<Unit, UnitError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let expr = parse_expression(text).map_err(|e| UnitError::Syntax {
            text: text.to_string(),
            message: e.message,
        })?;
        Ok(self.build(&expr, text)?.renamed(text))
    }

    fn build(&self, expr: &Expr, text: &str) -> Result<Unit, UnitError> {
        match expr {
            Expr::Number(value) => Ok(Unit::new(value.to_string(), *value, Dimensions::DIMENSIONLESS)),
            Expr::Name(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| UnitError::UndefinedUnit(name.clone())),
            Expr::Binary { op: BinOp::Mul, lhs, rhs } => {
                self.build(lhs, text)?.mul(&self.build(rhs, text)?)
            }
            Expr::Binary { op: BinOp::Div, lhs, rhs } => {
                self.build(lhs, text)?.div(&self.build(rhs, text)?)
            }
            Expr::Binary { op: BinOp::Pow, lhs, rhs } => {
                let base = self.build(lhs, text)?;
                let exponent = integer_literal(rhs).ok_or_else(|| UnitError::NonIntegerPower(base.name.clone()))?;
                base.powi(exponent)
            }
            _ => Err(UnitError::Syntax {
                text: text.to_string(),
                message: format!("unsupported term '{expr}'"),
            }),
        }
    }
}

/// `n` or `-n` where `n` is a whole number.
pub fn integer_literal(expr: &Expr) -> Option<i32> {
    match expr {
        Expr::Number(value) if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 => {
            Some(*value as i32)
        }
        Expr::Neg(inner) => integer_literal(inner).map(|n| -n),
        _ => None,
    }
}
