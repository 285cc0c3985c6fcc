//! Groups attributes into GPU structured buffers by usage class.

use super::{
    attributes::AttributeTable,
    error::CompileError,
    types::{Attribute, AttributeUsage, ContextType},
};

/// Buffers the host can bind on top of the two it reserves for the dead
/// list and the alive flags.
pub const DEFAULT_MAX_ATTRIBUTE_BUFFERS: usize = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeBuffer {
    pub index: u32,
    pub usage: AttributeUsage,
    pub attributes: Vec<Attribute>,
}

impl AttributeBuffer {
    pub fn used(&self, stage: ContextType) -> bool {
        self.usage.used(stage)
    }

    pub fn writable(&self, stage: ContextType) -> bool {
        self.usage.writable(stage)
    }

    pub fn size_in_bytes(&self) -> u32 {
        self.attributes.iter().map(Attribute::size_in_bytes).sum()
    }

    pub fn stride(&self) -> u32 {
        match self.size_in_bytes() {
            12 => 16,
            n => n,
        }
    }

    /// The struct needs a trailing pad so its size matches the stride.
    pub fn needs_padding(&self) -> bool {
        self.stride() != self.size_in_bytes()
    }
}

/// One buffer per distinct usage mask, in first-seen class order.
pub fn pack(
    table: &AttributeTable,
    max_buffers: usize,
) -> Result<Vec<AttributeBuffer>, CompileError> {
    let mut classes: Vec<(AttributeUsage, Vec<Attribute>)> = Vec::new();
    for (attr, usage) in table.iter() {
        match classes.iter_mut().find(|(u, _)| *u == usage) {
            Some((_, members)) => members.push(attr.clone()),
            None => classes.push((usage, vec![attr.clone()])),
        }
    }

    if classes.len() > max_buffers {
        return Err(CompileError::TooManyBuffers {
            used: classes.len(),
            max: max_buffers,
        });
    }

    Ok(classes
        .into_iter()
        .enumerate()
        .map(|(index, (usage, mut attributes))| {
            // stable: ties keep table order
            attributes.sort_by_key(|a| std::cmp::Reverse(a.ty.components().unwrap_or(0)));
            AttributeBuffer {
                index: index as u32,
                usage,
                attributes,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{ValueType, common};
    use proptest::prelude::*;

    #[test]
    fn members_sorted_by_size_descending() {
        let mut table = AttributeTable::new();
        let usage = AttributeUsage::INIT | AttributeUsage::UPDATE;
        table.or_usage(common::ALPHA, usage);
        table.or_usage(common::POSITION, usage);
        table.or_usage(common::AGE, usage);
        table.or_usage(common::SIZE, usage);

        let buffers = pack(&table, DEFAULT_MAX_ATTRIBUTE_BUFFERS).unwrap();
        assert_eq!(buffers.len(), 1);
        let names: Vec<_> = buffers[0].attributes.iter().map(|a| a.name.as_ref()).collect();
        assert_eq!(names, ["position", "size", "alpha", "age"]);
        assert_eq!(buffers[0].size_in_bytes(), 28);
    }

    #[test]
    fn twelve_bytes_round_to_sixteen() {
        let mut table = AttributeTable::new();
        table.or_usage(common::POSITION, AttributeUsage::INIT);
        table.or_usage(common::ALPHA, AttributeUsage::INIT | AttributeUsage::OUTPUT_READ);
        let buffers = pack(&table, DEFAULT_MAX_ATTRIBUTE_BUFFERS).unwrap();
        assert_eq!(buffers[0].size_in_bytes(), 12);
        assert_eq!(buffers[0].stride(), 16);
        assert!(buffers[0].needs_padding());
        assert_eq!(buffers[1].stride(), 4);
        assert!(!buffers[1].needs_padding());
    }

    #[test]
    fn too_many_usage_classes_fail() {
        let classes = [
            AttributeUsage::INIT,
            AttributeUsage::INIT | AttributeUsage::UPDATE_READ,
            AttributeUsage::INIT | AttributeUsage::UPDATE_WRITE,
            AttributeUsage::INIT | AttributeUsage::UPDATE,
            AttributeUsage::INIT | AttributeUsage::OUTPUT_READ,
            AttributeUsage::INIT | AttributeUsage::UPDATE_READ | AttributeUsage::OUTPUT_READ,
            AttributeUsage::INIT | AttributeUsage::UPDATE | AttributeUsage::OUTPUT_READ,
        ];
        let mut table = AttributeTable::new();
        for (i, usage) in classes.into_iter().enumerate() {
            table.or_usage(Attribute::new(format!("a{i}"), ValueType::Float), usage);
        }
        let err = pack(&table, 6).unwrap_err();
        assert_eq!(err, CompileError::TooManyBuffers { used: 7, max: 6 });
    }

    fn usage_strategy() -> impl Strategy<Value = AttributeUsage> {
        (1u8..0x20).prop_map(AttributeUsage::from_bits_truncate)
    }

    fn type_strategy() -> impl Strategy<Value = ValueType> {
        prop_oneof![
            Just(ValueType::Float),
            Just(ValueType::Float2),
            Just(ValueType::Float3),
            Just(ValueType::Float4),
            Just(ValueType::Uint),
        ]
    }

    proptest! {
        #[test]
        fn packing_covers_every_attribute_once(
            entries in prop::collection::vec((type_strategy(), usage_strategy()), 0..16)
        ) {
            let mut table = AttributeTable::new();
            for (i, (ty, usage)) in entries.iter().enumerate() {
                table.or_usage(Attribute::new(format!("a{i}"), *ty), *usage);
            }
            let buffers = pack(&table, usize::MAX).unwrap();

            let total: usize = buffers.iter().map(|b| b.attributes.len()).sum();
            prop_assert_eq!(total, table.len());
            for (i, b) in buffers.iter().enumerate() {
                prop_assert_eq!(b.index as usize, i);
                for a in &b.attributes {
                    prop_assert_eq!(table.get(a), Some(b.usage));
                }
                let sizes: Vec<_> = b.attributes.iter().map(|a| a.size_in_bytes()).collect();
                prop_assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
            }
            prop_assert_eq!(pack(&table, usize::MAX).unwrap(), buffers);
        }
    }
}
