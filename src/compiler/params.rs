//! Host parameter values and the table they are resolved from.

use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsl::ParamDSL;

use super::types::{Param, ParamId, ValueType};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientKey {
    pub time: f32,
    pub color: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

/// Concrete value of a host parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Int(i32),
    Uint(u32),
    /// Asset path of the bound texture; an empty path binds nothing.
    Texture2D(String),
    Texture3D(String),
    /// Column-major 4x4 matrix.
    Transform([f32; 16]),
    ColorGradient(Vec<GradientKey>),
    Curve(Vec<CurveKey>),
}

impl ParamValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ParamValue::Float(_) => ValueType::Float,
            ParamValue::Float2(_) => ValueType::Float2,
            ParamValue::Float3(_) => ValueType::Float3,
            ParamValue::Float4(_) => ValueType::Float4,
            ParamValue::Int(_) => ValueType::Int,
            ParamValue::Uint(_) => ValueType::Uint,
            ParamValue::Texture2D(_) => ValueType::Texture2D,
            ParamValue::Texture3D(_) => ValueType::Texture3D,
            ParamValue::Transform(_) => ValueType::Transform,
            ParamValue::ColorGradient(_) => ValueType::ColorGradient,
            ParamValue::Curve(_) => ValueType::Curve,
        }
    }

    /// Parse a JSON value according to its declared type. Missing numeric
    /// components default to zero.
    pub fn from_json(ty: ValueType, v: &Value) -> Result<Self> {
        Ok(match ty {
            ValueType::Float => ParamValue::Float(parse_json_number_f32(v).unwrap_or(0.0)),
            ValueType::Float2 => ParamValue::Float2(parse_json_floats::<2>(v)?),
            ValueType::Float3 => ParamValue::Float3(parse_json_floats::<3>(v)?),
            ValueType::Float4 => ParamValue::Float4(parse_json_floats::<4>(v)?),
            ValueType::Int => ParamValue::Int(parse_json_int(v)?),
            ValueType::Uint => ParamValue::Uint(parse_json_int(v)?),
            ValueType::Texture2D => ParamValue::Texture2D(v.as_str().unwrap_or("").to_string()),
            ValueType::Texture3D => ParamValue::Texture3D(v.as_str().unwrap_or("").to_string()),
            ValueType::Transform => ParamValue::Transform(parse_transform(v)?),
            ValueType::ColorGradient => ParamValue::ColorGradient(
                serde_json::from_value(v.clone())
                    .map_err(|e| anyhow!("invalid colorGradient keys: {e}"))?,
            ),
            ValueType::Curve => ParamValue::Curve(
                serde_json::from_value(v.clone()).map_err(|e| anyhow!("invalid curve keys: {e}"))?,
            ),
        })
    }
}

fn parse_json_number_f32(v: &Value) -> Option<f32> {
    v.as_f64()
        .map(|x| x as f32)
        .or_else(|| v.as_i64().map(|x| x as f32))
        .or_else(|| v.as_u64().map(|x| x as f32))
}

/// Integers must be JSON integers that fit the target; null is zero.
fn parse_json_int<T>(v: &Value) -> Result<T>
where
    T: TryFrom<i64> + TryFrom<u64> + Default,
{
    if v.is_null() {
        return Ok(T::default());
    }
    let parsed = match (v.as_i64(), v.as_u64()) {
        (Some(x), _) => <T as TryFrom<i64>>::try_from(x).ok(),
        (None, Some(x)) => <T as TryFrom<u64>>::try_from(x).ok(),
        (None, None) => bail!("expected an integer, got {v}"),
    };
    match parsed {
        Some(x) => Ok(x),
        None => bail!("integer {v} is out of range"),
    }
}

fn parse_json_floats<const N: usize>(v: &Value) -> Result<[f32; N]> {
    let Some(arr) = v.as_array() else {
        if v.is_null() {
            return Ok([0.0; N]);
        }
        bail!("expected an array of {N} numbers, got {v}");
    };
    let mut out = [0.0_f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = arr.get(i).and_then(parse_json_number_f32).unwrap_or(0.0);
    }
    Ok(out)
}

fn parse_transform(v: &Value) -> Result<[f32; 16]> {
    if v.is_null() {
        let mut identity = [0.0_f32; 16];
        for i in 0..4 {
            identity[i * 5] = 1.0;
        }
        return Ok(identity);
    }
    parse_json_floats::<16>(v)
}

/// Every parameter declared by a system, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct ParamTable {
    values: HashMap<ParamId, ParamValue>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dsl(params: &[ParamDSL]) -> Result<Self> {
        let mut table = Self::new();
        for p in params {
            let value = ParamValue::from_json(p.value_type, &p.value)
                .map_err(|e| anyhow!("param {}: {e}", p.id))?;
            if table.values.insert(ParamId::new(&p.id), value).is_some() {
                bail!("duplicate param id: {}", p.id);
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, id: impl Into<String>, value: ParamValue) -> Param {
        let param = Param {
            id: ParamId::new(id),
            ty: value.value_type(),
        };
        self.values.insert(param.id.clone(), value);
        param
    }

    pub fn get(&self, id: &ParamId) -> Option<&ParamValue> {
        self.values.get(id)
    }

    /// Resolve an id to its reduced parameter identity.
    pub fn param(&self, id: &ParamId) -> Option<Param> {
        self.values.get(id).map(|v| Param {
            id: id.clone(),
            ty: v.value_type(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vectors_default_missing_components() {
        let v = ParamValue::from_json(ValueType::Float3, &json!([1.0, 2])).unwrap();
        assert_eq!(v, ParamValue::Float3([1.0, 2.0, 0.0]));
    }

    #[test]
    fn integers_must_fit_their_type() {
        assert_eq!(
            ParamValue::from_json(ValueType::Int, &json!(-3)).unwrap(),
            ParamValue::Int(-3)
        );
        assert_eq!(
            ParamValue::from_json(ValueType::Uint, &json!(7)).unwrap(),
            ParamValue::Uint(7)
        );
        assert_eq!(
            ParamValue::from_json(ValueType::Int, &Value::Null).unwrap(),
            ParamValue::Int(0)
        );
        assert!(ParamValue::from_json(ValueType::Int, &json!(3_000_000_000_u64)).is_err());
        assert!(ParamValue::from_json(ValueType::Uint, &json!(-1)).is_err());
        assert!(ParamValue::from_json(ValueType::Uint, &json!(5_000_000_000_u64)).is_err());
        assert!(ParamValue::from_json(ValueType::Int, &json!("12")).is_err());
        assert!(ParamValue::from_json(ValueType::Int, &json!(1.5)).is_err());
    }

    #[test]
    fn null_transform_is_identity() {
        let ParamValue::Transform(m) = ParamValue::from_json(ValueType::Transform, &Value::Null).unwrap() else {
            panic!("expected transform");
        };
        assert_eq!(m[0], 1.0);
        assert_eq!(m[5], 1.0);
        assert_eq!(m[1], 0.0);
    }

    #[test]
    fn gradient_keys_parse() {
        let v = ParamValue::from_json(
            ValueType::ColorGradient,
            &json!([{ "time": 0.0, "color": [1, 0, 0, 1] }]),
        )
        .unwrap();
        assert_eq!(v.value_type(), ValueType::ColorGradient);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let p = ParamDSL {
            id: "a".to_string(),
            value_type: ValueType::Float,
            value: json!(1.0),
        };
        assert!(ParamTable::from_dsl(&[p.clone(), p]).is_err());
    }
}
