//! Graph flattening: contexts -> per-stage block lists, flags and generators.

use crate::dsl::{SlotBinding, SystemDSL};
use crate::schema::{BlockDesc, BlockLibrary};

use super::{
    error::CompileError,
    generators::{InitGenerator, OutputGenerator, UpdateGenerator},
    params::ParamTable,
    types::{BlockFlags, ContextType, Param, ParamId, ValueType},
};

/// What a block property resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotArg {
    Param(Param),
    /// Unreduced expression, inlined at the call site.
    Expr(String),
}

/// A block instance with its descriptor and resolved properties.
#[derive(Clone, Debug)]
pub struct ResolvedBlock {
    pub id: String,
    pub function_name: String,
    pub desc: BlockDesc,
    /// One entry per `desc.properties`, same order.
    pub args: Vec<SlotArg>,
}

impl ResolvedBlock {
    pub fn flags(&self) -> BlockFlags {
        self.desc.flags()
    }

    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.args.iter().filter_map(|a| match a {
            SlotArg::Param(p) => Some(p),
            SlotArg::Expr(_) => None,
        })
    }
}

/// Aggregate capability flags of a system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageFlags {
    pub init_rand: bool,
    pub update_rand: bool,
    pub update_kill: bool,
}

impl StageFlags {
    pub fn has_rand(&self) -> bool {
        self.init_rand || self.update_rand
    }
}

#[derive(Clone, Debug)]
pub struct FlattenedSystem {
    pub init_blocks: Vec<ResolvedBlock>,
    pub update_blocks: Vec<ResolvedBlock>,
    pub output_blocks: Vec<ResolvedBlock>,
    pub flags: StageFlags,
    pub init: InitGenerator,
    pub update: UpdateGenerator,
    pub output: OutputGenerator,
}

/// Resolve one slot binding against the param table, checking its type.
pub fn resolve_slot(
    binding: &SlotBinding,
    expected: ValueType,
    params: &ParamTable,
    owner: &str,
    property: &str,
) -> Result<SlotArg, CompileError> {
    match binding {
        SlotBinding::Expr { expr } => Ok(SlotArg::Expr(expr.clone())),
        SlotBinding::Param { param } => {
            let id = ParamId::new(param.as_str());
            let resolved = params.param(&id).ok_or_else(|| CompileError::UnknownParam {
                block: owner.to_string(),
                property: property.to_string(),
                param: id.clone(),
            })?;
            if resolved.ty != expected {
                return Err(CompileError::SlotTypeMismatch {
                    block: owner.to_string(),
                    property: property.to_string(),
                    param: id,
                    expected,
                    found: resolved.ty,
                });
            }
            Ok(SlotArg::Param(resolved))
        }
    }
}

fn resolve_block(
    block: &crate::dsl::BlockDSL,
    library: &BlockLibrary,
    params: &ParamTable,
) -> Result<ResolvedBlock, CompileError> {
    let desc = library
        .resolve(block)
        .ok_or_else(|| CompileError::UnknownBlockType {
            block: block.id.clone(),
            block_type: block.block_type.clone(),
        })?;
    desc.validate(&block.id)?;

    let mut args = Vec::with_capacity(desc.properties.len());
    for prop in &desc.properties {
        let arg = match (block.slots.get(&prop.name), prop.default.as_ref()) {
            (Some(binding), _) => resolve_slot(binding, prop.ty, params, &block.id, &prop.name)?,
            (None, Some(default)) => SlotArg::Expr(default.clone()),
            (None, None) => {
                return Err(CompileError::MissingSlot {
                    block: block.id.clone(),
                    property: prop.name.clone(),
                });
            }
        };
        args.push(arg);
    }

    Ok(ResolvedBlock {
        id: block.id.clone(),
        function_name: desc.function_name(&block.block_type),
        desc: desc.clone(),
        args,
    })
}

fn check_placement(block: &ResolvedBlock, stage: ContextType) -> Result<(), CompileError> {
    let flags = block.flags();
    let misplaced = match stage {
        ContextType::Init => flags.contains(BlockFlags::KILL).then_some("kill"),
        ContextType::Update => None,
        ContextType::Output => {
            if flags.contains(BlockFlags::RAND) {
                Some("rand")
            } else if flags.contains(BlockFlags::KILL) {
                Some("kill")
            } else {
                None
            }
        }
    };
    match misplaced {
        Some(capability) => Err(CompileError::MisplacedBlock {
            block: block.id.clone(),
            capability,
            stage,
        }),
        None => Ok(()),
    }
}

/// Collapse the contexts of a system into one block list per stage.
///
/// Several contexts of the same type concatenate their blocks; the last one
/// provides the stage generator.
pub fn flatten_system(
    system: &SystemDSL,
    library: &BlockLibrary,
    params: &ParamTable,
) -> Result<FlattenedSystem, CompileError> {
    let mut init = None;
    let mut update = None;
    let mut output = None;
    for context in &system.contexts {
        match context.context_type {
            ContextType::Init => init = Some(InitGenerator::from_params(&context.params, params)?),
            ContextType::Update => update = Some(UpdateGenerator::from_params(&context.params)?),
            ContextType::Output => {
                output = Some(OutputGenerator::from_params(&context.params, params)?)
            }
        }
    }
    let init = init.ok_or(CompileError::MissingContext(ContextType::Init))?;
    let update = update.ok_or(CompileError::MissingContext(ContextType::Update))?;
    let output = output.ok_or(CompileError::MissingContext(ContextType::Output))?;

    let mut init_blocks = Vec::new();
    let mut update_blocks = Vec::new();
    let mut output_blocks = Vec::new();
    let mut flags = StageFlags::default();

    for context in &system.contexts {
        let stage = context.context_type;
        for block in &context.blocks {
            let resolved = resolve_block(block, library, params)?;
            check_placement(&resolved, stage)?;
            let block_flags = resolved.flags();
            match stage {
                ContextType::Init => {
                    flags.init_rand |= block_flags.contains(BlockFlags::RAND);
                    init_blocks.push(resolved);
                }
                ContextType::Update => {
                    flags.update_rand |= block_flags.contains(BlockFlags::RAND);
                    flags.update_kill |= block_flags.contains(BlockFlags::KILL);
                    update_blocks.push(resolved);
                }
                ContextType::Output => output_blocks.push(resolved),
            }
        }
    }

    if init_blocks.is_empty() && update_blocks.is_empty() {
        return Err(CompileError::EmptySystem);
    }

    Ok(FlattenedSystem {
        init_blocks,
        update_blocks,
        output_blocks,
        flags,
        init,
        update,
        output,
    })
}
