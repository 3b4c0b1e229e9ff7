//! Parameter specifications and the normalized <-> physical codec.
//!
//! The optimizer searches the unit interval for every parameter. The
//! simulator needs physical engineering units. [`ParameterSpec`] holds the
//! linear rescale between the two; [`Transform`] is the per-parameter policy
//! applied on top of the rescale (e.g. `10^x` for a log-scale search).
//! [`ParameterTable`] is the single table consulted by the live evaluation
//! path and by the archive aggregator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, SimfitError};

/// Post-rescale transform applied when building physical values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Physical value is the denormalized value.
    #[default]
    Identity,

    /// Search runs over the exponent; physical value is `10^denormalized`.
    Log10,
}

impl Transform {
    /// Map a denormalized (search-space) value to physical units.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Log10 => 10f64.powf(value),
        }
    }

    /// Map a physical value back to search-space units.
    pub fn invert(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Log10 => value.log10(),
        }
    }
}

/// A named, bounded calibration parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpec {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub transform: Transform,
}

impl ParameterSpec {
    /// Create a validated spec with the identity transform.
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            lower,
            upper,
            transform: Transform::Identity,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Replace the transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Check `lower < upper`, finite bounds and a usable name.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SimfitError::InvalidParameter(
                "parameter name must not be empty".to_string(),
            ));
        }
        if self.name.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(SimfitError::InvalidParameter(format!(
                "parameter name {:?} must not contain whitespace or commas",
                self.name
            )));
        }
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(SimfitError::InvalidParameter(format!(
                "parameter {} has non-finite bounds",
                self.name
            )));
        }
        if self.lower >= self.upper {
            return Err(SimfitError::InvalidParameter(format!(
                "parameter {} requires lower < upper, got [{}, {}]",
                self.name, self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Linear rescale into the unit interval. Not clamped.
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.lower) / (self.upper - self.lower)
    }

    /// Inverse of [`normalize`](Self::normalize). Not clamped.
    pub fn denormalize(&self, unit: f64) -> f64 {
        unit * (self.upper - self.lower) + self.lower
    }

    /// Unit value -> physical value (rescale, then transform).
    pub fn to_physical(&self, unit: f64) -> f64 {
        self.transform.apply(self.denormalize(unit))
    }

    /// Physical value -> unit value (untransform, then rescale).
    pub fn to_unit(&self, physical: f64) -> f64 {
        self.normalize(self.transform.invert(physical))
    }
}

/// `(value - lower) / (upper - lower)`.
pub fn normalize(spec: &ParameterSpec, value: f64) -> f64 {
    spec.normalize(value)
}

/// `unit * (upper - lower) + lower`.
pub fn denormalize(spec: &ParameterSpec, unit: f64) -> f64 {
    spec.denormalize(unit)
}

/// A single named value inside a [`ParamVector`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamValue {
    pub name: String,
    pub value: f64,
}

/// Ordered name -> value mapping.
///
/// Used for both normalized and physical vectors; the order is the
/// declaration order of the [`ParameterTable`] that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ParamVector {
    entries: Vec<ParamValue>,
}

impl ParamVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. Existing names are overwritten in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(ParamValue { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value))
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ParamVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut vector = ParamVector::new();
        for (name, value) in iter {
            vector.insert(name, value);
        }
        vector
    }
}

/// The ordered set of parameters for one study.
///
/// Declaration order fixes the simulator's argument order and the order of
/// values in each result file's header line.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ParameterTable {
    specs: Vec<ParameterSpec>,
}

impl ParameterTable {
    /// Build a table, validating every spec and rejecting duplicate names.
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(SimfitError::InvalidParameter(
                "parameter table must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(SimfitError::InvalidParameter(format!(
                    "duplicate parameter name: {}",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    /// Resolve an optimizer proposal into the vector passed to the simulator.
    pub fn to_physical(&self, normalized: &ParamVector) -> Result<ParamVector> {
        self.specs
            .iter()
            .map(|spec| {
                let unit = lookup(normalized, &spec.name)?;
                Ok((spec.name.clone(), spec.to_physical(unit)))
            })
            .collect()
    }

    /// Inverse of [`to_physical`](Self::to_physical).
    pub fn to_normalized(&self, physical: &ParamVector) -> Result<ParamVector> {
        self.specs
            .iter()
            .map(|spec| {
                let value = lookup(physical, &spec.name)?;
                Ok((spec.name.clone(), spec.to_unit(value)))
            })
            .collect()
    }

    /// Undo each transform so values read in search-space units
    /// (e.g. the exponent of a log-scaled parameter).
    pub fn to_display(&self, physical: &ParamVector) -> Result<ParamVector> {
        self.specs
            .iter()
            .map(|spec| {
                let value = lookup(physical, &spec.name)?;
                let shown = spec.transform.invert(value);
                if !shown.is_finite() {
                    return Err(SimfitError::InvalidParameter(format!(
                        "{} = {value} has no finite {:?} inverse",
                        spec.name, spec.transform
                    )));
                }
                Ok((spec.name.clone(), shown))
            })
            .collect()
    }

    /// Zip positional values (declaration order) into a named vector.
    pub fn vector_from_values(&self, values: &[f64]) -> Result<ParamVector> {
        if values.len() != self.specs.len() {
            return Err(SimfitError::InvalidParameter(format!(
                "expected {} parameter values, got {}",
                self.specs.len(),
                values.len()
            )));
        }
        Ok(self
            .specs
            .iter()
            .zip(values)
            .map(|(spec, value)| (spec.name.clone(), *value))
            .collect())
    }
}

impl<'de> Deserialize<'de> for ParameterTable {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let specs = Vec::<ParameterSpec>::deserialize(deserializer)?;
        ParameterTable::new(specs).map_err(serde::de::Error::custom)
    }
}

fn lookup(vector: &ParamVector, name: &str) -> Result<f64> {
    vector
        .get(name)
        .ok_or_else(|| SimfitError::InvalidParameter(format!("missing value for {name}")))
}
