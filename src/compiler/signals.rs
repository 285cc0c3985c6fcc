//! Baking of gradient and curve params into lookup textures.

use std::collections::HashMap;

use serde::Serialize;

use super::{
    error::CompileError,
    params::{CurveKey, GradientKey, ParamTable, ParamValue},
    types::ParamId,
    uniforms::ParamSet,
};

/// Texels per baked row.
pub const SIGNAL_TEXTURE_WIDTH: u32 = 128;

/// A baked lookup texture: one row per signal, `channels` floats per texel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BakedTexture {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl BakedTexture {
    /// Texel of row `row` at column `x`.
    pub fn texel(&self, x: u32, row: u32) -> &[f32] {
        let start = ((row * self.width + x) * self.channels) as usize;
        &self.data[start..start + self.channels as usize]
    }
}

/// Service turning signal params into lookup textures plus the per-param
/// uniform values that select a row.
pub trait SignalBaker {
    fn remove_all_values(&mut self);
    fn add_values(&mut self, signals: &ParamSet, params: &ParamTable) -> Result<(), CompileError>;
    fn generate(&mut self);

    fn has_color_texture(&self) -> bool;
    fn has_float_texture(&self) -> bool;

    /// HLSL lines of the `sampleSignal` overloads for the baked textures.
    fn shader_functions(&self) -> Vec<String>;

    fn gradient_uniform(&self, id: &ParamId) -> Option<f32>;
    fn curve_uniform(&self, id: &ParamId) -> Option<[f32; 4]>;

    fn color_texture(&self) -> Option<&BakedTexture>;
    fn float_texture(&self) -> Option<&BakedTexture>;
}

#[derive(Clone, Debug, PartialEq)]
enum SignalValue {
    Gradient(Vec<GradientKey>),
    Curve(Vec<CurveKey>),
}

/// Default baker: one RGBA row per gradient, one R row per curve.
#[derive(Clone, Debug, Default)]
pub struct GeneratedTextureData {
    values: Vec<(ParamId, SignalValue)>,
    gradient_rows: HashMap<ParamId, u32>,
    curve_rows: HashMap<ParamId, (u32, f32, f32)>,
    color_texture: Option<BakedTexture>,
    float_texture: Option<BakedTexture>,
}

impl GeneratedTextureData {
    pub fn new() -> Self {
        Self::default()
    }
}

fn row_coordinate(row: u32, rows: u32) -> f32 {
    (row as f32 + 0.5) / rows as f32
}

fn sorted<T: Clone>(keys: &[T], time: impl Fn(&T) -> f32) -> Vec<T> {
    let mut keys = keys.to_vec();
    keys.sort_by(|a, b| time(a).total_cmp(&time(b)));
    keys
}

/// Piecewise linear sample of sorted keys, clamped at both ends.
fn sample_gradient(keys: &[GradientKey], t: f32) -> [f32; 4] {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return [1.0, 1.0, 1.0, 1.0];
    };
    if t <= first.time {
        return first.color;
    }
    if t >= last.time {
        return last.color;
    }
    for pair in keys.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.time {
            let span = b.time - a.time;
            let f = if span > 0.0 { (t - a.time) / span } else { 1.0 };
            let mut out = [0.0; 4];
            for (i, c) in out.iter_mut().enumerate() {
                *c = a.color[i] + (b.color[i] - a.color[i]) * f;
            }
            return out;
        }
    }
    last.color
}

fn sample_curve(keys: &[CurveKey], t: f32) -> f32 {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return 0.0;
    };
    if t <= first.time {
        return first.value;
    }
    if t >= last.time {
        return last.value;
    }
    for pair in keys.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.time {
            let span = b.time - a.time;
            let f = if span > 0.0 { (t - a.time) / span } else { 1.0 };
            return a.value + (b.value - a.value) * f;
        }
    }
    last.value
}

impl SignalBaker for GeneratedTextureData {
    fn remove_all_values(&mut self) {
        *self = Self::default();
    }

    fn add_values(&mut self, signals: &ParamSet, params: &ParamTable) -> Result<(), CompileError> {
        for param in signals.iter() {
            if self.values.iter().any(|(id, _)| id == &param.id) {
                continue;
            }
            let value = match params.get(&param.id) {
                Some(ParamValue::ColorGradient(keys)) => {
                    SignalValue::Gradient(sorted(keys, |k| k.time))
                }
                Some(ParamValue::Curve(keys)) => SignalValue::Curve(sorted(keys, |k| k.time)),
                _ => return Err(CompileError::MissingParamValue(param.id.clone())),
            };
            self.values.push((param.id.clone(), value));
        }
        Ok(())
    }

    fn generate(&mut self) {
        let width = SIGNAL_TEXTURE_WIDTH;
        let mut color = Vec::new();
        let mut float = Vec::new();
        self.gradient_rows.clear();
        self.curve_rows.clear();

        for (id, value) in &self.values {
            match value {
                SignalValue::Gradient(keys) => {
                    self.gradient_rows
                        .insert(id.clone(), self.gradient_rows.len() as u32);
                    for x in 0..width {
                        let t = x as f32 / (width - 1) as f32;
                        color.extend_from_slice(&sample_gradient(keys, t));
                    }
                }
                SignalValue::Curve(keys) => {
                    let min = keys.first().map_or(0.0, |k| k.time);
                    let max = keys.last().map_or(1.0, |k| k.time);
                    let range = if max > min { max - min } else { 1.0 };
                    self.curve_rows
                        .insert(id.clone(), (self.curve_rows.len() as u32, min, range));
                    for x in 0..width {
                        let t = min + range * x as f32 / (width - 1) as f32;
                        float.push(sample_curve(keys, t));
                    }
                }
            }
        }

        self.color_texture = (!self.gradient_rows.is_empty()).then(|| BakedTexture {
            width,
            height: self.gradient_rows.len() as u32,
            channels: 4,
            data: color,
        });
        self.float_texture = (!self.curve_rows.is_empty()).then(|| BakedTexture {
            width,
            height: self.curve_rows.len() as u32,
            channels: 1,
            data: float,
        });
    }

    fn has_color_texture(&self) -> bool {
        self.color_texture.is_some()
    }

    fn has_float_texture(&self) -> bool {
        self.float_texture.is_some()
    }

    fn shader_functions(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.has_color_texture() {
            lines.extend(
                [
                    "float4 sampleSignal(float v,float u)",
                    "{",
                    "\treturn tex2Dlod(gradientTexture,float4(0.9921875 * saturate(u) + 0.00390625,v,0,0));",
                    "}",
                ]
                .map(String::from),
            );
        }
        if self.has_float_texture() {
            lines.extend(
                [
                    "float sampleSignal(float4 curveData,float u)",
                    "{",
                    "\tfloat uNorm = saturate(u * curveData.x + curveData.y);",
                    "\treturn tex2Dlod(curveTexture,float4(0.9921875 * uNorm + 0.00390625,curveData.z,0,0)).r;",
                    "}",
                ]
                .map(String::from),
            );
        }
        lines
    }

    fn gradient_uniform(&self, id: &ParamId) -> Option<f32> {
        let rows = self.gradient_rows.len() as u32;
        self.gradient_rows.get(id).map(|&row| row_coordinate(row, rows))
    }

    fn curve_uniform(&self, id: &ParamId) -> Option<[f32; 4]> {
        let rows = self.curve_rows.len() as u32;
        self.curve_rows
            .get(id)
            .map(|&(row, min, range)| [1.0 / range, -min / range, row_coordinate(row, rows), 0.0])
    }

    fn color_texture(&self) -> Option<&BakedTexture> {
        self.color_texture.as_ref()
    }

    fn float_texture(&self) -> Option<&BakedTexture> {
        self.float_texture.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{Param, ValueType};

    fn table() -> ParamTable {
        let mut params = ParamTable::new();
        params.insert(
            "grad",
            ParamValue::ColorGradient(vec![
                GradientKey {
                    time: 1.0,
                    color: [0.0, 0.0, 1.0, 1.0],
                },
                GradientKey {
                    time: 0.0,
                    color: [1.0, 0.0, 0.0, 1.0],
                },
            ]),
        );
        params.insert(
            "curve",
            ParamValue::Curve(vec![
                CurveKey {
                    time: 2.0,
                    value: 0.0,
                },
                CurveKey {
                    time: 4.0,
                    value: 1.0,
                },
            ]),
        );
        params
    }

    fn signals() -> ParamSet {
        [
            Param::new("grad", ValueType::ColorGradient),
            Param::new("curve", ValueType::Curve),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn bakes_one_row_per_signal() {
        let mut baker = GeneratedTextureData::new();
        baker.add_values(&signals(), &table()).unwrap();
        baker.add_values(&signals(), &table()).unwrap();
        baker.generate();

        let color = baker.color_texture().unwrap();
        assert_eq!((color.width, color.height, color.channels), (128, 1, 4));
        assert_eq!(color.texel(0, 0), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(color.texel(127, 0), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(baker.gradient_uniform(&ParamId::new("grad")), Some(0.5));

        let curve = baker.curve_uniform(&ParamId::new("curve")).unwrap();
        assert_eq!(curve, [0.5, -1.0, 0.5, 0.0]);
        assert_eq!(baker.float_texture().unwrap().texel(127, 0), &[1.0]);
    }

    #[test]
    fn reset_clears_textures() {
        let mut baker = GeneratedTextureData::new();
        baker.add_values(&signals(), &table()).unwrap();
        baker.generate();
        baker.remove_all_values();
        baker.generate();
        assert!(!baker.has_color_texture());
        assert!(!baker.has_float_texture());
        assert!(baker.shader_functions().is_empty());
    }

    #[test]
    fn missing_value_fails() {
        let mut baker = GeneratedTextureData::new();
        let set: ParamSet = [Param::new("nope", ValueType::Curve)].into_iter().collect();
        let err = baker.add_values(&set, &table()).unwrap_err();
        assert_eq!(err, CompileError::MissingParamValue(ParamId::new("nope")));
    }
}
