// Licensed under the Apache-2.0 license

//! Address-map assembly and the traversal over nested maps.

use super::item::{dimensions, map_addr_width};
use super::unroll::{dedup_types, unroll};
use super::{
    access_channel, push_unique, AddrMapContext, ItemContext, ItemDetail, Lint, NodeType,
    TopContext,
};
use crate::error::ContextResult;
use crate::types::{NodeIdx, NodeKind, World};
use crate::value::{validate_properties, GENERATE_HDL, INTERFACE};

/// Progress of one address map on the traversal stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum MapState {
    /// Just pushed; nested maps not yet scheduled.
    Entered,
    /// Nested maps are being finalized above this frame.
    Visiting,
    /// All nested maps are done; this map is assembled next.
    Finalizing,
}

#[derive(Debug)]
struct Frame {
    idx: NodeIdx,
    state: MapState,
}

impl Frame {
    fn new(idx: NodeIdx) -> Self {
        Self {
            idx,
            state: MapState::Entered,
        }
    }
}

pub(crate) struct ContextBuilder<'w> {
    pub(super) world: &'w World,
    separator: String,
    pub(super) lints: Vec<Lint>,
}

impl<'w> ContextBuilder<'w> {
    pub(crate) fn new(world: &'w World, separator: &str) -> Self {
        Self {
            world,
            separator: separator.to_string(),
            lints: Vec::new(),
        }
    }

    /// Walk all address maps depth first and fold each finished map into
    /// the aggregate. Nested maps are folded before their parent.
    pub(crate) fn build(mut self) -> ContextResult<TopContext> {
        let world = self.world;
        let mut top = TopContext::new(&self.separator);
        let mut stack = vec![Frame::new(world.top)];

        while let Some(frame) = stack.last_mut() {
            match frame.state {
                MapState::Entered => {
                    frame.state = MapState::Visiting;
                    let idx = frame.idx;
                    let nested: Vec<Frame> = world
                        .children(idx)
                        .filter(|(_, child)| matches!(child.kind, NodeKind::Addrmap))
                        .map(|(child_idx, _)| Frame::new(child_idx))
                        .collect();
                    // Reversed so the first declared map is finalized first.
                    stack.extend(nested.into_iter().rev());
                }
                MapState::Visiting => frame.state = MapState::Finalizing,
                MapState::Finalizing => {
                    let idx = frame.idx;
                    stack.pop();
                    let map = self.addrmap_context(idx)?;
                    log::debug!(
                        "finalized {} ({}): {} regs, {} mems, {} regfiles, {} sub-maps",
                        map.inst_name,
                        map.type_name,
                        map.n_regs,
                        map.n_mems,
                        map.n_regf,
                        map.n_exts
                    );
                    top.absorb(map);
                }
            }
        }

        top.lints = std::mem::take(&mut self.lints);
        Ok(top)
    }

    fn addrmap_context(&mut self, idx: NodeIdx) -> ContextResult<AddrMapContext> {
        let world = self.world;
        let node = world.node(idx);
        validate_properties(&node.inst_name, &node.properties)?;

        let interface = node.property::<String>(INTERFACE)?;
        let generate_hdl = node.property::<bool>(GENERATE_HDL)?.unwrap_or(true);
        let path_segments = node.path_segments.clone();
        let path = path_segments.join(self.separator.as_str());
        let path_notop = path_segments
            .get(1..)
            .unwrap_or_default()
            .join(self.separator.as_str());
        let path_addrmap_name = path_segments.last().cloned().unwrap_or_default();
        let desc = node.desc.clone().unwrap_or_default();

        let mut interface_adapters = Vec::new();
        let mut reg_insts = Vec::new();
        let mut mem_insts = Vec::new();
        let mut rgf_insts = Vec::new();
        let mut ext_insts = Vec::new();
        // (category, position) of every child in declaration order
        let mut order = Vec::new();

        for (child_idx, _) in world.children(idx) {
            let item = self.item_context(child_idx)?;
            if let (Some(parent_if), ItemDetail::AddrMap(ext)) = (&interface, &item.detail) {
                match &ext.interface {
                    Some(child_if) if child_if != parent_if => {
                        let adapter = format!(
                            "{}_to_{}",
                            parent_if.to_lowercase(),
                            child_if.to_lowercase()
                        );
                        push_unique(&mut interface_adapters, &adapter);
                    }
                    _ => {}
                }
            }
            let list = match item.node_type {
                NodeType::Register => &mut reg_insts,
                NodeType::Memory => &mut mem_insts,
                NodeType::RegFile => &mut rgf_insts,
                NodeType::AddrMap => &mut ext_insts,
            };
            order.push((item.node_type, list.len()));
            list.push(item);
        }

        let mut next_inst_idx = 0;
        let regs = unroll(&mut reg_insts, &mut next_inst_idx);
        let mems = unroll(&mut mem_insts, &mut next_inst_idx);
        let regf = unroll(&mut rgf_insts, &mut next_inst_idx);
        let exts = unroll(&mut ext_insts, &mut next_inst_idx);

        let insts: Vec<ItemContext> = order
            .iter()
            .map(|&(node_type, pos)| {
                let list = match node_type {
                    NodeType::Register => &reg_insts,
                    NodeType::Memory => &mem_insts,
                    NodeType::RegFile => &rgf_insts,
                    NodeType::AddrMap => &ext_insts,
                };
                list[pos].clone()
            })
            .collect();

        let (reg_types, reg_type_names) = dedup_types(&reg_insts);
        let (mem_types, mem_type_names) = dedup_types(&mem_insts);
        let (rgf_types, rgf_type_names) = dedup_types(&rgf_insts);
        let (ext_types, ext_type_names) = dedup_types(&ext_insts);
        let n_regf_regs: usize = regf
            .iter()
            .filter_map(ItemContext::block)
            .map(|block| block.regs.len())
            .sum();

        Ok(AddrMapContext {
            type_name: node.type_name.clone(),
            inst_name: node.inst_name.clone(),
            type_name_org: node
                .orig_type_name
                .clone()
                .unwrap_or_else(|| node.type_name.clone()),
            interface,
            access_channel: access_channel(world, idx)?,
            addrwidth: map_addr_width(node)?,
            desc_html: desc.clone(),
            desc,
            path_segments,
            path,
            path_notop,
            path_addrmap_name,
            dimensions: dimensions(node)?,

            insts,
            n_reg_insts: reg_insts.len(),
            n_mem_insts: mem_insts.len(),
            n_ext_insts: ext_insts.len(),
            n_rgf_insts: rgf_insts.len(),
            reg_insts,
            mem_insts,
            ext_insts,
            rgf_insts,
            reg_types,
            mem_types,
            ext_types,
            rgf_types,
            reg_type_names,
            mem_type_names,
            ext_type_names,
            rgf_type_names,
            n_regs: regs.len(),
            n_mems: mems.len(),
            n_exts: exts.len(),
            n_regf: regf.len(),
            n_regf_regs,
            regs,
            mems,
            exts,
            regf,

            interface_adapters,
            generate_hdl,
        })
    }
}
