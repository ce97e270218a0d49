// Licensed under the Apache-2.0 license

//! Context records handed to the template engine.
//!
//! The builder walks the [`World`] and produces one [`AddrMapContext`] per
//! address map, folded into a single [`TopContext`]:
//!
//! ```text
//! World → ContextBuilder → TopContext
//!                          └── addrmaps: [AddrMapContext]   (post-order, top last)
//!                              ├── reg_insts / regs         (declared / unrolled)
//!                              ├── mem_insts / mems
//!                              ├── rgf_insts / regf
//!                              ├── ext_insts / exts         (nested address maps)
//!                              └── *_types                  (one record per type name)
//! ```
//!
//! The implementation is split across submodules:
//! - `channel`: access channel lookup through the ancestry
//! - `item`: one [`ItemContext`] per child node
//! - `unroll`: array unrolling and type dedup
//! - `addrmap`: per-map assembly and the traversal itself

mod addrmap;
mod channel;
mod item;
mod unroll;

use crate::error::ContextResult;
use crate::types::{AccessType, World};
use crate::util::{AccessMode, FixedPoint};
use crate::value::Properties;
use serde::Serialize;

pub use channel::access_channel;

/// Build the aggregate context for the whole design.
pub fn build_contexts(world: &World, separator: &str) -> ContextResult<TopContext> {
    addrmap::ContextBuilder::new(world, separator).build()
}

/// Kind tag of an item record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum NodeType {
    #[serde(rename = "REG")]
    Register,
    #[serde(rename = "MEM")]
    Memory,
    #[serde(rename = "REGFILE")]
    RegFile,
    #[serde(rename = "ADDRMAP")]
    AddrMap,
}

/// Array shape of an instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Dimensions {
    /// Product of all axes, 1 for scalars.
    pub elements: u64,
    pub dim_n: u64,
    pub dim_m: u64,
    /// 1 for scalars, 2 for one axis, 3 for two axes.
    pub dim: u8,
}

impl Dimensions {
    pub fn is_array(&self) -> bool {
        self.dim > 1
    }
}

/// A bit field within a register.
#[derive(Clone, Debug, Serialize)]
pub struct FieldContext {
    #[serde(flatten)]
    pub properties: Properties,
    pub type_name: String,
    pub inst_name: String,
    pub width: u32,
    pub sw: AccessType,
    pub hw: AccessType,
    /// Software side.
    pub rw: AccessMode,
    /// Hardware side.
    pub hw_rw: AccessMode,
    /// Set when hardware cannot write the field.
    #[serde(rename = "const")]
    pub constant: u8,
    pub reset: i64,
    pub reset_hex: String,
    pub low: u32,
    pub high: u32,
    pub mask: u64,
    pub mask_hex: String,
    pub decrwidth: u64,
    pub incrwidth: u64,
    pub decrvalue: u64,
    pub incrvalue: u64,
    pub dtype: String,
    pub signed: u8,
    pub fixedpoint: FixedPoint,
    pub desc: String,
    pub desc_html: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterDetail {
    pub fields: Vec<FieldContext>,
    pub fields_count: usize,
    pub reset: u64,
    pub reset_hex: String,
}

/// Registers held by a memory or register file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RegisterBlock {
    pub insts: Vec<ItemContext>,
    pub reg_insts: Vec<ItemContext>,
    pub regs: Vec<ItemContext>,
    pub reg_types: Vec<ItemContext>,
    pub reg_type_names: Vec<String>,
    pub n_reg_insts: usize,
    pub n_regs: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryDetail {
    pub entries: u64,
    pub addresses: u64,
    pub datawidth: u32,
    pub addrwidth: u32,
    pub sw: AccessType,
    #[serde(flatten)]
    pub block: RegisterBlock,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExtDetail {
    pub interface: Option<String>,
    pub addrwidth: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ItemDetail {
    Register(RegisterDetail),
    Memory(MemoryDetail),
    RegFile(RegisterBlock),
    AddrMap(ExtDetail),
}

/// One declared instance, or one element of it after unrolling.
#[derive(Clone, Debug, Serialize)]
pub struct ItemContext {
    #[serde(flatten)]
    pub properties: Properties,
    pub node_type: NodeType,
    pub type_name: String,
    pub inst_name: String,
    pub type_name_org: String,
    pub access_channel: u64,
    pub address_offset: u64,
    pub address_offset_high: u64,
    pub absolute_address: u64,
    pub absolute_address_high: u64,
    pub array_stride: u64,
    pub total_size: u64,
    pub total_words: u64,
    pub width: u32,
    pub dtype: String,
    pub signed: u8,
    pub fixedpoint: FixedPoint,
    pub rw: AccessMode,
    pub desc: String,
    pub desc_html: String,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    /// Position of the first element in the unrolled list of its category.
    ///
    /// Not dense across categories: templates use it to index straight into
    /// `regs`, `mems`, `regf` or `exts`, so it has to match the element
    /// position there. The dense per-map numbering is [`Self::inst_idx`].
    pub idx: usize,
    /// Dense index of the declared instance across all categories of its map.
    pub inst_idx: usize,
    #[serde(flatten)]
    pub detail: ItemDetail,
}

impl ItemContext {
    pub fn register(&self) -> Option<&RegisterDetail> {
        match &self.detail {
            ItemDetail::Register(reg) => Some(reg),
            _ => None,
        }
    }

    /// Registers of a memory or register file.
    pub fn block(&self) -> Option<&RegisterBlock> {
        match &self.detail {
            ItemDetail::Memory(mem) => Some(&mem.block),
            ItemDetail::RegFile(block) => Some(block),
            _ => None,
        }
    }
}

/// Everything the templates know about one address map.
#[derive(Clone, Debug, Serialize)]
pub struct AddrMapContext {
    pub type_name: String,
    pub inst_name: String,
    pub type_name_org: String,
    pub interface: Option<String>,
    pub access_channel: u64,
    pub addrwidth: u32,
    pub desc: String,
    pub desc_html: String,
    pub path_segments: Vec<String>,
    pub path: String,
    pub path_notop: String,
    pub path_addrmap_name: String,
    #[serde(flatten)]
    pub dimensions: Dimensions,

    pub insts: Vec<ItemContext>,
    pub reg_insts: Vec<ItemContext>,
    pub mem_insts: Vec<ItemContext>,
    pub ext_insts: Vec<ItemContext>,
    pub rgf_insts: Vec<ItemContext>,
    pub reg_types: Vec<ItemContext>,
    pub mem_types: Vec<ItemContext>,
    pub ext_types: Vec<ItemContext>,
    pub rgf_types: Vec<ItemContext>,
    pub reg_type_names: Vec<String>,
    pub mem_type_names: Vec<String>,
    pub ext_type_names: Vec<String>,
    pub rgf_type_names: Vec<String>,
    pub regs: Vec<ItemContext>,
    pub mems: Vec<ItemContext>,
    pub exts: Vec<ItemContext>,
    pub regf: Vec<ItemContext>,

    pub n_reg_insts: usize,
    pub n_mem_insts: usize,
    pub n_ext_insts: usize,
    pub n_rgf_insts: usize,
    pub n_regs: usize,
    pub n_mems: usize,
    pub n_exts: usize,
    pub n_regf: usize,
    /// Registers across all unrolled register files.
    pub n_regf_regs: usize,

    /// `parent_to_child` bridges needed by nested maps, first seen first.
    pub interface_adapters: Vec<String>,

    /// Whether hardware sources are generated for this map.
    #[serde(skip)]
    pub generate_hdl: bool,
}

/// Non-fatal finding reported while building contexts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lint {
    pub register: String,
    pub field: String,
    pub message: String,
}

/// Aggregate of all address maps, used by the root-only formats.
#[derive(Clone, Debug, Serialize)]
pub struct TopContext {
    pub addrmaps: Vec<AddrMapContext>,
    pub separator: String,
    pub interface_adapters: Vec<String>,
    pub access_channel: Option<u64>,
    #[serde(skip)]
    pub lints: Vec<Lint>,
}

impl TopContext {
    pub(crate) fn new(separator: &str) -> Self {
        Self {
            addrmaps: Vec::new(),
            separator: separator.to_string(),
            interface_adapters: Vec::new(),
            access_channel: None,
            lints: Vec::new(),
        }
    }

    /// Fold a finished map into the aggregate.
    pub(crate) fn absorb(&mut self, map: AddrMapContext) {
        for adapter in &map.interface_adapters {
            push_unique(&mut self.interface_adapters, adapter);
        }
        self.access_channel = Some(map.access_channel);
        self.addrmaps.push(map);
    }

    /// The top address map, which is always finalized last.
    pub fn top(&self) -> Option<&AddrMapContext> {
        self.addrmaps.last()
    }
}

pub(crate) fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
