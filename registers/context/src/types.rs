// Licensed under the Apache-2.0 license

//! Elaborated register-map tree.
//!
//! The [`World`] holds every node of the elaborated design in an arena and
//! links them by index, so the walker can go up to ancestors (access channel
//! lookup) and down to children without borrowing trouble.
//!
//! ```text
//! World
//! ├── arena: Vec<Node>
//! │   ├── AddrMap    # address maps, root or nested
//! │   ├── RegFile    # relatively addressed groups of registers
//! │   ├── Mem        # memories, may hold control/status registers
//! │   ├── Reg        # registers
//! │   └── Field      # bit fields within registers
//! └── top: NodeIdx
//! ```
//!
//! The tree is read from the JSON dump of an external elaborator. Absolute
//! addresses are derived while loading: a child's absolute address is its
//! parent's absolute address plus its own offset.

use crate::error::{ContextError, ContextResult};
use crate::value::{Properties, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Index into the node arena.
pub type NodeIdx = usize;

/// Hardware or software access tag of a field or memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Na,
    Rw,
    Wr,
    R,
    W,
    Rw1,
    W1,
}

impl AccessType {
    pub fn name(self) -> &'static str {
        match self {
            AccessType::Na => "na",
            AccessType::Rw => "rw",
            AccessType::Wr => "wr",
            AccessType::R => "r",
            AccessType::W => "w",
            AccessType::Rw1 => "rw1",
            AccessType::W1 => "w1",
        }
    }

    pub fn readable(self) -> bool {
        matches!(
            self,
            AccessType::Rw | AccessType::Wr | AccessType::R | AccessType::Rw1
        )
    }

    pub fn writable(self) -> bool {
        matches!(
            self,
            AccessType::Rw | AccessType::Wr | AccessType::W | AccessType::Rw1 | AccessType::W1
        )
    }
}

fn default_sw() -> AccessType {
    AccessType::Rw
}

/// Kind-specific part of a node.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    Addrmap,
    Regfile,
    Mem {
        mementries: u64,
        memwidth: u32,
        #[serde(default = "default_sw")]
        sw: AccessType,
    },
    Reg,
    Field {
        low: u32,
        high: u32,
        sw: AccessType,
        hw: AccessType,
        #[serde(default)]
        reset: Option<u64>,
        #[serde(default, rename = "virtual")]
        is_virtual: bool,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Addrmap => "addrmap",
            NodeKind::Regfile => "regfile",
            NodeKind::Mem { .. } => "mem",
            NodeKind::Reg => "reg",
            NodeKind::Field { .. } => "field",
        }
    }
}

/// A node as it appears in the elaborator's JSON dump.
#[derive(Clone, Debug, Deserialize)]
struct RawNode {
    #[serde(flatten)]
    kind: NodeKind,
    type_name: String,
    inst_name: String,
    #[serde(default)]
    orig_type_name: Option<String>,
    #[serde(default)]
    address_offset: u64,
    #[serde(default)]
    absolute_address: Option<u64>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    array_dimensions: Vec<u64>,
    #[serde(default)]
    array_stride: Option<u64>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    children: Vec<RawNode>,
}

/// A node of the elaborated tree.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub type_name: String,
    pub inst_name: String,
    /// Type name before any parameter override.
    pub orig_type_name: Option<String>,
    /// Offset from the parent; first element for arrays.
    pub address_offset: u64,
    pub absolute_address: u64,
    /// Byte size of one element.
    pub size: u64,
    pub array_dimensions: Vec<u64>,
    pub array_stride: Option<u64>,
    pub desc: Option<String>,
    pub properties: Properties,
    /// Instance names from the top node down to this node.
    pub path_segments: Vec<String>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
}

impl Node {
    pub fn is_array(&self) -> bool {
        !self.array_dimensions.is_empty()
    }

    /// Typed lookup of a property; a value of the wrong type is a configuration error.
    pub fn property<T>(&self, name: &str) -> ContextResult<Option<T>>
    where
        T: TryFrom<Value, Error = ContextError>,
    {
        self.properties
            .get(name)
            .cloned()
            .map(T::try_from)
            .transpose()
            .map_err(|err| {
                ContextError::Configuration(format!(
                    "property '{}' of '{}': {}",
                    name, self.inst_name, err
                ))
            })
    }
}

/// The elaborated design.
#[derive(Clone, Debug)]
pub struct World {
    /// Holds all nodes so that they can be referenced by index.
    /// Nodes are added but never deleted.
    pub arena: Vec<Node>,
    pub top: NodeIdx,
}

impl World {
    pub fn from_json_str(input: &str) -> ContextResult<World> {
        let raw: RawNode = serde_json::from_str(input)?;
        Self::from_raw(raw)
    }

    pub fn from_file(path: &Path) -> ContextResult<World> {
        let input = std::fs::read_to_string(path).map_err(|e| ContextError::io(path, e))?;
        Self::from_json_str(&input)
    }

    fn from_raw(raw: RawNode) -> ContextResult<World> {
        if !matches!(raw.kind, NodeKind::Addrmap) {
            return Err(ContextError::Configuration(format!(
                "top node '{}' is a {}, expected an addrmap",
                raw.inst_name,
                raw.kind.name()
            )));
        }
        let mut world = World {
            arena: Vec::new(),
            top: 0,
        };
        world.top = world.insert(raw, None)?;
        Ok(world)
    }

    fn insert(&mut self, raw: RawNode, parent: Option<NodeIdx>) -> ContextResult<NodeIdx> {
        let (parent_absolute, mut path_segments) = match parent {
            Some(p) => (
                self.arena[p].absolute_address,
                self.arena[p].path_segments.clone(),
            ),
            None => (0, Vec::new()),
        };
        let absolute_address = parent_absolute
            .checked_add(raw.address_offset)
            .ok_or_else(|| {
                ContextError::UnsupportedShape(format!(
                    "'{}' at offset 0x{:x} lies beyond the address space",
                    raw.inst_name, raw.address_offset
                ))
            })?;
        if let Some(given) = raw.absolute_address {
            if given != absolute_address {
                return Err(ContextError::Configuration(format!(
                    "'{}' declares absolute address 0x{:x} but parent and offset give 0x{:x}",
                    raw.inst_name, given, absolute_address
                )));
            }
        }
        if let NodeKind::Field { low, high, .. } = raw.kind {
            if high < low || high >= 64 {
                return Err(ContextError::UnsupportedShape(format!(
                    "field '{}' has bit range [{}:{}]",
                    raw.inst_name, high, low
                )));
            }
        }
        path_segments.push(raw.inst_name.clone());

        let idx = self.arena.len();
        self.arena.push(Node {
            kind: raw.kind,
            type_name: raw.type_name,
            inst_name: raw.inst_name,
            orig_type_name: raw.orig_type_name,
            address_offset: raw.address_offset,
            absolute_address,
            size: raw.size,
            array_dimensions: raw.array_dimensions,
            array_stride: raw.array_stride,
            desc: raw.desc,
            properties: raw.properties,
            path_segments,
            parent,
            children: Vec::new(),
        });

        for child in raw.children {
            self.check_nesting(idx, &child)?;
            let child_idx = self.insert(child, Some(idx))?;
            self.arena[idx].children.push(child_idx);
        }
        if matches!(self.arena[idx].kind, NodeKind::Reg) && self.arena[idx].children.is_empty() {
            return Err(ContextError::Configuration(format!(
                "register '{}' has no fields",
                self.arena[idx].inst_name
            )));
        }
        Ok(idx)
    }

    fn check_nesting(&self, parent: NodeIdx, child: &RawNode) -> ContextResult<()> {
        let parent = &self.arena[parent];
        let is_field = matches!(child.kind, NodeKind::Field { .. });
        let allowed = match parent.kind {
            NodeKind::Reg => is_field,
            NodeKind::Field { .. } => false,
            NodeKind::Addrmap | NodeKind::Regfile | NodeKind::Mem { .. } => !is_field,
        };
        if allowed {
            Ok(())
        } else {
            Err(ContextError::Configuration(format!(
                "{} '{}' cannot contain {} '{}'",
                parent.kind.name(),
                parent.inst_name,
                child.kind.name(),
                child.inst_name
            )))
        }
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.arena[idx]
    }

    pub fn children(&self, idx: NodeIdx) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.arena[idx]
            .children
            .iter()
            .map(move |&child| (child, &self.arena[child]))
    }
}
