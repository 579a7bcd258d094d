//! Scalar modifiers applied to leaf values before a sample is emitted.
//! Modifiers run in declared order, inherited ones before node-local ones;
//! some suppress the sample entirely.

use serde_json::Value;

/// A single scalar transform. The set is open: adding a kind means adding a
/// variant here and its arm in [`apply`] plus the compile arm in the
/// configuration loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Multiplies the value by a constant factor.
    Mul(f64),
    /// Replaces the value with `1.0` if its string form equals the token,
    /// otherwise suppresses the sample.
    Eq(String),
}

/// The intermediate value flowing through the pipeline. Kept un-coerced so
/// `eq` can observe the raw string form of the leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Extracts the scalar from a JSON leaf. Null, objects and arrays do not
    /// produce samples.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::Bool(value) => Some(Self::Bool(*value)),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }

    /// String form used by `eq`: integral numbers print without a decimal
    /// point so a token `"5"` matches a JSON `5`.
    fn stringify(&self) -> String {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{value:.0}")
            }
            Self::Number(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// Runs the pipeline over a leaf scalar. `None` means the sample is not
/// emitted, either because a modifier suppressed it or because the final
/// value is not a finite number.
pub fn apply(modifiers: &[Modifier], mut scalar: Scalar) -> Option<f64> {
    for modifier in modifiers {
        scalar = match modifier {
            Modifier::Mul(factor) => match scalar.as_f64() {
                Some(value) => Scalar::Number(value * factor),
                None => {
                    tracing::warn!(?scalar, "`mul` applied to a non-numeric value");
                    return None;
                }
            },
            Modifier::Eq(token) => {
                if scalar.stringify() == *token {
                    Scalar::Number(1.0)
                } else {
                    return None;
                }
            }
        };
    }
    let value = scalar.as_f64()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pipeline_coerces_the_scalar() {
        assert_eq!(apply(&[], Scalar::Number(3.0)), Some(3.0));
        assert_eq!(apply(&[], Scalar::Bool(true)), Some(1.0));
        assert_eq!(apply(&[], Scalar::Bool(false)), Some(0.0));
        assert_eq!(apply(&[], Scalar::Text("2.5".to_string())), Some(2.5));
        assert_eq!(apply(&[], Scalar::Text("yellow".to_string())), None);
    }

    #[test]
    fn mul_scales_the_value() {
        let pipeline = [Modifier::Mul(0.001)];
        assert_eq!(apply(&pipeline, Scalar::Number(2500.0)), Some(2.5));
    }

    #[test]
    fn chained_mul_composes() {
        let chained = [Modifier::Mul(3.0), Modifier::Mul(4.0)];
        let composed = [Modifier::Mul(12.0)];
        assert_eq!(
            apply(&chained, Scalar::Number(1.5)),
            apply(&composed, Scalar::Number(1.5)),
        );
    }

    #[test]
    fn mul_drops_non_numeric_input() {
        let pipeline = [Modifier::Mul(2.0)];
        assert_eq!(apply(&pipeline, Scalar::Text("green".to_string())), None);
        // A numeric string is numeric input, consistent with leaf coercion.
        assert_eq!(apply(&pipeline, Scalar::Text("21".to_string())), Some(42.0));
    }

    #[test]
    fn eq_emits_one_on_match_and_suppresses_otherwise() {
        let pipeline = [Modifier::Eq("yellow".to_string())];
        assert_eq!(apply(&pipeline, Scalar::Text("yellow".to_string())), Some(1.0));
        assert_eq!(apply(&pipeline, Scalar::Text("green".to_string())), None);
    }

    #[test]
    fn eq_matches_integral_numbers_without_decimal_point() {
        let pipeline = [Modifier::Eq("5".to_string())];
        assert_eq!(apply(&pipeline, Scalar::Number(5.0)), Some(1.0));
        let pipeline = [Modifier::Eq("true".to_string())];
        assert_eq!(apply(&pipeline, Scalar::Bool(true)), Some(1.0));
    }

    #[test]
    fn eq_result_feeds_subsequent_modifiers() {
        let pipeline = [Modifier::Eq("red".to_string()), Modifier::Mul(10.0)];
        assert_eq!(apply(&pipeline, Scalar::Text("red".to_string())), Some(10.0));
    }

    #[test]
    fn non_finite_results_are_dropped() {
        let pipeline = [Modifier::Mul(f64::MAX), Modifier::Mul(f64::MAX)];
        assert_eq!(apply(&pipeline, Scalar::Number(1.0)), None);
    }
}
