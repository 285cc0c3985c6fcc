//! Attribute collection and the structural rules applied before packing.

use std::collections::HashMap;

use super::{
    diagnostics::{Diagnostic, Diagnostics},
    error::CompileError,
    flatten::{ResolvedBlock, StageFlags},
    types::{Attribute, AttributeUsage, ContextType, common},
};

/// Attributes with their usage masks, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeTable {
    order: Vec<Attribute>,
    usage: HashMap<Attribute, AttributeUsage>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// OR `usage` into the mask of `attr`, registering it if new.
    pub fn or_usage(&mut self, attr: Attribute, usage: AttributeUsage) {
        match self.usage.get_mut(&attr) {
            Some(mask) => *mask |= usage,
            None => {
                self.order.push(attr.clone());
                self.usage.insert(attr, usage);
            }
        }
    }

    /// Combine two tables. Masks are OR-ed; `other`'s new attributes are
    /// appended after ours.
    pub fn merge(mut self, other: AttributeTable) -> AttributeTable {
        for attr in other.order {
            let usage = other.usage.get(&attr).copied().unwrap_or_default();
            self.or_usage(attr, usage);
        }
        self
    }

    pub fn get(&self, attr: &Attribute) -> Option<AttributeUsage> {
        self.usage.get(attr).copied()
    }

    pub fn contains(&self, attr: &Attribute) -> bool {
        self.usage.contains_key(attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Attribute, AttributeUsage)> {
        self.order
            .iter()
            .map(|a| (a, self.usage.get(a).copied().unwrap_or_default()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Buffers address attributes by name, so one name may carry one type.
    pub fn check_distinct_names(&self) -> Result<(), CompileError> {
        let mut seen: HashMap<&str, &Attribute> = HashMap::with_capacity(self.order.len());
        for attr in &self.order {
            if let Some(first) = seen.insert(&*attr.name, attr) {
                return Err(CompileError::ConflictingAttributeType {
                    name: attr.name.to_string(),
                    first: first.ty,
                    second: attr.ty,
                });
            }
        }
        Ok(())
    }
}

/// Usage contributed by the blocks of one stage.
pub fn collect_attributes(blocks: &[ResolvedBlock], stage: ContextType) -> AttributeTable {
    let mut table = AttributeTable::new();
    for block in blocks {
        for decl in &block.desc.attributes {
            table.or_usage(decl.attribute(), AttributeUsage::declared(stage, decl.writable));
        }
    }
    table
}

/// Phase shift, seed allocation and default initialization, in that order.
///
/// A phase shift request that cannot be honoured clears `phase_shift` before
/// failing so the caller can retry without it.
pub fn apply_structural_rules(
    table: &mut AttributeTable,
    flags: &mut StageFlags,
    phase_shift: &mut bool,
    diagnostics: &mut dyn Diagnostics,
) -> Result<(), CompileError> {
    if *phase_shift {
        let missing = if !table.contains(&common::POSITION) {
            Some("position")
        } else if !table.contains(&common::VELOCITY) {
            Some("velocity")
        } else {
            None
        };
        if let Some(name) = missing {
            *phase_shift = false;
            return Err(CompileError::PhaseShiftPrerequisite(name));
        }
        table.or_usage(common::PHASE, AttributeUsage::INIT | AttributeUsage::UPDATE);
        table.or_usage(common::POSITION, AttributeUsage::INIT | AttributeUsage::UPDATE);
        table.or_usage(
            common::VELOCITY,
            AttributeUsage::INIT_READ | AttributeUsage::UPDATE_READ,
        );
        flags.init_rand = true;
    }

    if flags.has_rand() {
        flags.update_rand = true;
        table.or_usage(common::SEED, AttributeUsage::INIT | AttributeUsage::UPDATE);
    }

    let uninitialized: Vec<Attribute> = table
        .iter()
        .filter(|(_, usage)| !usage.used(ContextType::Init))
        .map(|(a, _)| a.clone())
        .collect();
    for attr in uninitialized {
        if attr != common::SEED && attr != common::AGE {
            diagnostics.report(Diagnostic::UninitializedAttribute(attr.name.to_string()));
        }
        table.or_usage(attr, AttributeUsage::INIT);
    }

    Ok(())
}
