//! Uniform collection, sampler/signal separation, global promotion and
//! naming.

use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer, ser::SerializeMap};

use super::{
    error::CompileError,
    flatten::{FlattenedSystem, ResolvedBlock},
    generators::StageGenerator,
    params::ParamTable,
    signals::SignalBaker,
    types::{Param, ParamId},
};

/// Insertion-ordered set of params, keyed by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet {
    items: Vec<Param>,
    ids: HashSet<ParamId>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, param: Param) -> bool {
        if !self.ids.insert(param.id.clone()) {
            return false;
        }
        self.items.push(param);
        true
    }

    pub fn remove(&mut self, id: &ParamId) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.items.retain(|p| &p.id != id);
        true
    }

    pub fn contains(&self, id: &ParamId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Param> for ParamSet {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        let mut set = ParamSet::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

/// Param id -> generated HLSL name, in naming order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamNames {
    order: Vec<(ParamId, String)>,
    index: HashMap<ParamId, usize>,
}

impl ParamNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name every param of `set` as `{prefix}{n}`. Params already named keep
    /// their name and do not consume a counter value.
    pub fn generate(&mut self, set: &ParamSet, prefix: &str) {
        let mut counter = 0;
        for param in set.iter() {
            if self.index.contains_key(&param.id) {
                continue;
            }
            self.index.insert(param.id.clone(), self.order.len());
            self.order.push((param.id.clone(), format!("{prefix}{counter}")));
            counter += 1;
        }
    }

    pub fn get(&self, id: &ParamId) -> Option<&str> {
        self.index.get(id).map(|&i| self.order[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, &str)> {
        self.order.iter().map(|(id, name)| (id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Serialize for ParamNames {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (id, name) in &self.order {
            map.serialize_entry(id.as_str(), name)?;
        }
        map.end()
    }
}

/// Params referenced by block slots; expressions are not uniforms.
pub fn collect_uniforms(blocks: &[ResolvedBlock]) -> ParamSet {
    blocks.iter().flat_map(|b| b.params().cloned()).collect()
}

pub fn collect_and_remove_samplers(uniforms: &mut ParamSet) -> ParamSet {
    let samplers: ParamSet = uniforms.iter().filter(|p| p.ty.is_sampler()).cloned().collect();
    for p in samplers.iter() {
        uniforms.remove(&p.id);
    }
    samplers
}

/// Gradient and curve params. They stay in `uniforms`: the generated code
/// reads the raw value as the row selector of the baked lookup.
pub fn collect_signals(uniforms: &ParamSet) -> ParamSet {
    uniforms.iter().filter(|p| p.ty.is_signal()).cloned().collect()
}

/// Move params present in both sets into a new set.
pub fn collect_intersection(a: &mut ParamSet, b: &mut ParamSet) -> ParamSet {
    let shared: ParamSet = a.iter().filter(|p| b.contains(&p.id)).cloned().collect();
    for p in shared.iter() {
        a.remove(&p.id);
        b.remove(&p.id);
    }
    shared
}

#[derive(Clone, Debug, Default)]
pub struct UniformPartition {
    pub global_uniforms: ParamSet,
    pub init_uniforms: ParamSet,
    pub update_uniforms: ParamSet,
    pub output_uniforms: ParamSet,
    pub global_samplers: ParamSet,
    pub init_samplers: ParamSet,
    pub update_samplers: ParamSet,
    pub output_samplers: ParamSet,
    pub param_to_name: ParamNames,
    pub output_param_to_name: ParamNames,
}

/// Split the params of a flattened system into per-stage uniform and
/// sampler sets, bake its signals and name everything.
pub fn partition_uniforms(
    system: &FlattenedSystem,
    params: &ParamTable,
    baker: &mut dyn SignalBaker,
) -> Result<UniformPartition, CompileError> {
    let mut init_uniforms = collect_uniforms(&system.init_blocks);
    StageGenerator::Init(&system.init).update_uniforms(&mut init_uniforms);
    let mut update_uniforms = collect_uniforms(&system.update_blocks);
    StageGenerator::Update(&system.update).update_uniforms(&mut update_uniforms);

    let mut init_samplers = collect_and_remove_samplers(&mut init_uniforms);
    let mut update_samplers = collect_and_remove_samplers(&mut update_uniforms);

    let init_signals = collect_signals(&init_uniforms);
    let update_signals = collect_signals(&update_uniforms);
    baker.remove_all_values();
    baker.add_values(&init_signals, params)?;
    baker.add_values(&update_signals, params)?;
    baker.generate();

    let global_uniforms = collect_intersection(&mut init_uniforms, &mut update_uniforms);
    let global_samplers = collect_intersection(&mut init_samplers, &mut update_samplers);

    let mut output_uniforms = collect_uniforms(&system.output_blocks);
    StageGenerator::Output(&system.output).update_uniforms(&mut output_uniforms);
    let output_samplers = collect_and_remove_samplers(&mut output_uniforms);

    let mut param_to_name = ParamNames::new();
    param_to_name.generate(&global_uniforms, "globalUniform");
    param_to_name.generate(&init_uniforms, "initUniform");
    param_to_name.generate(&update_uniforms, "updateUniform");
    param_to_name.generate(&global_samplers, "globalSampler");
    param_to_name.generate(&init_samplers, "initSampler");
    param_to_name.generate(&update_samplers, "updateSampler");

    let mut output_param_to_name = ParamNames::new();
    output_param_to_name.generate(&output_uniforms, "outputUniform");
    output_param_to_name.generate(&output_samplers, "outputSampler");

    Ok(UniformPartition {
        global_uniforms,
        init_uniforms,
        update_uniforms,
        output_uniforms,
        global_samplers,
        init_samplers,
        update_samplers,
        output_samplers,
        param_to_name,
        output_param_to_name,
    })
}
