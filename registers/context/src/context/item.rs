// Licensed under the Apache-2.0 license

//! Item context builder.
//!
//! Builds one [`ItemContext`] per child node of an address map, memory or
//! register file, dispatching on the node kind for the kind-specific part.

use super::addrmap::ContextBuilder;
use super::unroll::{dedup_types, unroll};
use super::{
    access_channel, Dimensions, ExtDetail, FieldContext, ItemContext, ItemDetail, Lint,
    MemoryDetail, NodeType, RegisterBlock, RegisterDetail,
};
use crate::error::{ContextError, ContextResult};
use crate::types::{AccessType, Node, NodeIdx, NodeKind};
use crate::util::{
    addr_width, bitmask, data_type_fixed, data_type_signed, hex_string, to_int32, AccessMode,
    FixedPoint,
};
use crate::value::{validate_properties, DATA_TYPE, INTERFACE};

/// Array shape of a node; more than two axes, empty axes or a stride that
/// does not fit the element are rejected here, before unrolling.
pub(crate) fn dimensions(node: &Node) -> ContextResult<Dimensions> {
    let (dim_n, dim_m, dim) = match node.array_dimensions.as_slice() {
        [] => (1, 1, 1),
        [m] => (1, *m, 2),
        [n, m] => (*n, *m, 3),
        dims => {
            return Err(ContextError::UnsupportedShape(format!(
                "'{}' has {} array dimensions, at most 2 are supported",
                node.inst_name,
                dims.len()
            )))
        }
    };
    if dim_n == 0 || dim_m == 0 {
        return Err(ContextError::UnsupportedShape(format!(
            "'{}' has an empty array dimension",
            node.inst_name
        )));
    }
    if node.is_array() {
        match node.array_stride {
            Some(stride) if stride > 0 && stride >= node.size => {}
            Some(stride) => {
                return Err(ContextError::UnsupportedShape(format!(
                    "'{}' has stride 0x{:x} smaller than its element size 0x{:x}",
                    node.inst_name, stride, node.size
                )))
            }
            None => {
                return Err(ContextError::UnsupportedShape(format!(
                    "array '{}' has no stride",
                    node.inst_name
                )))
            }
        }
    }
    let elements = dim_n.checked_mul(dim_m).ok_or_else(|| {
        ContextError::UnsupportedShape(format!(
            "'{}' has too many array elements",
            node.inst_name
        ))
    })?;
    Ok(Dimensions {
        elements,
        dim_n,
        dim_m,
        dim,
    })
}

/// Address width of a map-like node from its byte size.
pub(crate) fn map_addr_width(node: &Node) -> ContextResult<u32> {
    if node.size == 0 {
        return Err(ContextError::Configuration(format!(
            "address map '{}' has zero size",
            node.inst_name
        )));
    }
    Ok(addr_width(node.size))
}

fn data_type(node: &Node) -> ContextResult<(String, u8, FixedPoint)> {
    let tag = node.property::<String>(DATA_TYPE)?;
    let tag = tag.as_deref().unwrap_or("");
    let dtype = if tag.is_empty() { "uint" } else { tag };
    Ok((
        dtype.to_string(),
        data_type_signed(tag) as u8,
        data_type_fixed(tag),
    ))
}

impl ContextBuilder<'_> {
    pub(super) fn item_context(&mut self, idx: NodeIdx) -> ContextResult<ItemContext> {
        let world = self.world;
        let node = world.node(idx);
        validate_properties(&node.inst_name, &node.properties)?;
        let dimensions = dimensions(node)?;
        let array_stride = node.array_stride.unwrap_or(0);
        let total_size = if node.is_array() {
            array_stride.checked_mul(dimensions.elements)
        } else {
            Some(node.size)
        };
        // Every unrolled element lies below `absolute_address + total_size`.
        let (total_size, address_offset_high, absolute_address_high) = total_size
            .and_then(|total| {
                let offset_end = node.address_offset.checked_add(total)?;
                let absolute_end = node.absolute_address.checked_add(total)?;
                Some((
                    total,
                    offset_end.saturating_sub(1),
                    absolute_end.saturating_sub(1),
                ))
            })
            .ok_or_else(|| {
                ContextError::UnsupportedShape(format!(
                    "'{}' at 0x{:x} does not fit in the address space",
                    node.inst_name, node.absolute_address
                ))
            })?;
        let desc = node.desc.clone().unwrap_or_default();

        let mut item = ItemContext {
            properties: node.properties.clone(),
            node_type: NodeType::Register,
            type_name: node.type_name.clone(),
            inst_name: node.inst_name.clone(),
            type_name_org: node
                .orig_type_name
                .clone()
                .unwrap_or_else(|| node.type_name.clone()),
            access_channel: access_channel(world, idx)?,
            address_offset: node.address_offset,
            address_offset_high,
            absolute_address: node.absolute_address,
            absolute_address_high,
            array_stride,
            total_size,
            total_words: total_size / 4,
            width: 32,
            dtype: "uint".to_string(),
            signed: 0,
            fixedpoint: FixedPoint::None,
            rw: AccessMode::RW,
            desc_html: desc.clone(),
            desc,
            dimensions,
            idx: 0,
            inst_idx: 0,
            detail: ItemDetail::RegFile(RegisterBlock::default()),
        };

        match &node.kind {
            NodeKind::Reg => {
                item.node_type = NodeType::Register;
                let reg = self.register_detail(idx, &mut item)?;
                item.detail = ItemDetail::Register(reg);
            }
            NodeKind::Mem {
                mementries,
                memwidth,
                sw,
            } => {
                item.node_type = NodeType::Memory;
                if *mementries == 0 {
                    return Err(ContextError::UnsupportedShape(format!(
                        "memory '{}' has no entries",
                        node.inst_name
                    )));
                }
                let (dtype, signed, fixedpoint) = data_type(node)?;
                item.width = *memwidth;
                item.dtype = dtype;
                item.signed = signed;
                item.fixedpoint = fixedpoint;
                item.rw = AccessMode::from_access(sw.readable(), sw.writable());
                let addresses = mementries.checked_mul(4).ok_or_else(|| {
                    ContextError::UnsupportedShape(format!(
                        "memory '{}' has too many entries ({})",
                        node.inst_name, mementries
                    ))
                })?;
                item.detail = ItemDetail::Memory(MemoryDetail {
                    entries: *mementries,
                    addresses,
                    datawidth: *memwidth,
                    addrwidth: addr_width(addresses),
                    sw: *sw,
                    block: self.register_block(idx)?,
                });
            }
            NodeKind::Regfile => {
                item.node_type = NodeType::RegFile;
                item.detail = ItemDetail::RegFile(self.register_block(idx)?);
            }
            NodeKind::Addrmap => {
                item.node_type = NodeType::AddrMap;
                item.detail = ItemDetail::AddrMap(ExtDetail {
                    interface: node.property::<String>(INTERFACE)?,
                    addrwidth: map_addr_width(node)?,
                });
            }
            NodeKind::Field { .. } => {
                return Err(ContextError::Configuration(format!(
                    "field '{}' is not an addressable item",
                    node.inst_name
                )))
            }
        }
        Ok(item)
    }

    /// Registers of a memory or register file, unrolled and deduplicated on their own.
    fn register_block(&mut self, idx: NodeIdx) -> ContextResult<RegisterBlock> {
        let world = self.world;
        let mut reg_insts = Vec::new();
        for (child_idx, child) in world.children(idx) {
            if !matches!(child.kind, NodeKind::Reg) {
                return Err(ContextError::UnsupportedShape(format!(
                    "'{}' may only contain registers, found {} '{}'",
                    world.node(idx).inst_name,
                    child.kind.name(),
                    child.inst_name
                )));
            }
            reg_insts.push(self.item_context(child_idx)?);
        }
        let mut next_inst_idx = 0;
        let regs = unroll(&mut reg_insts, &mut next_inst_idx);
        let (reg_types, reg_type_names) = dedup_types(&reg_insts);
        Ok(RegisterBlock {
            insts: reg_insts.clone(),
            n_reg_insts: reg_insts.len(),
            n_regs: regs.len(),
            reg_insts,
            regs,
            reg_types,
            reg_type_names,
        })
    }

    fn register_detail(
        &mut self,
        idx: NodeIdx,
        item: &mut ItemContext,
    ) -> ContextResult<RegisterDetail> {
        let mut total_width = 0;
        let mut reset = 0u64;
        let mut sw_readable = false;
        let mut sw_writable = false;
        let mut fields = Vec::new();
        let world = self.world;
        for (field_idx, _) in world.children(idx) {
            let field = self.field_context(idx, field_idx)?;
            total_width += field.width;
            sw_readable |= field.sw.readable();
            sw_writable |= field.sw.writable();
            if let NodeKind::Field {
                reset: Some(field_reset),
                ..
            } = world.node(field_idx).kind
            {
                reset |= (field_reset << field.low) & field.mask;
            }
            fields.push(field);
        }

        let (dtype, signed, fixedpoint) = data_type(world.node(idx))?;
        item.width = total_width;
        item.dtype = dtype;
        item.signed = signed;
        item.fixedpoint = fixedpoint;
        item.rw = AccessMode::from_access(sw_readable, sw_writable);
        Ok(RegisterDetail {
            fields_count: fields.len(),
            fields,
            reset,
            reset_hex: format!("0x{reset:x}"),
        })
    }

    fn field_context(&mut self, reg_idx: NodeIdx, idx: NodeIdx) -> ContextResult<FieldContext> {
        let world = self.world;
        let node = world.node(idx);
        let NodeKind::Field {
            low,
            high,
            sw,
            hw,
            reset,
            is_virtual,
        } = node.kind
        else {
            return Err(ContextError::Configuration(format!(
                "register '{}' contains non-field '{}'",
                world.node(reg_idx).inst_name,
                node.inst_name
            )));
        };
        validate_properties(&node.inst_name, &node.properties)?;

        let width = high - low + 1;
        let mask = bitmask(width) << low;
        let reset = reset.map(to_int32).unwrap_or(0);
        let (dtype, signed, fixedpoint) = data_type(node)?;
        let desc = node.desc.clone().unwrap_or_default();

        let we = node.property::<bool>("we")?.unwrap_or(false);
        if hw.writable() && sw.writable() && !we && !is_virtual {
            self.lint_missing_we(reg_idx, idx, sw, hw);
        }

        Ok(FieldContext {
            properties: node.properties.clone(),
            type_name: node.type_name.clone(),
            inst_name: node.inst_name.clone(),
            width,
            sw,
            hw,
            rw: AccessMode::from_access(sw.readable(), sw.writable()),
            hw_rw: AccessMode::from_access(hw.readable(), hw.writable()),
            constant: matches!(hw, AccessType::Na | AccessType::R) as u8,
            reset,
            reset_hex: hex_string(reset),
            low,
            high,
            mask,
            mask_hex: format!("0x{mask:x}"),
            decrwidth: node.property::<u64>("decrwidth")?.unwrap_or(0),
            incrwidth: node.property::<u64>("incrwidth")?.unwrap_or(0),
            decrvalue: node.property::<u64>("decrvalue")?.unwrap_or(0),
            incrvalue: node.property::<u64>("incrvalue")?.unwrap_or(0),
            dtype,
            signed,
            fixedpoint,
            desc_html: desc.clone(),
            desc,
        })
    }

    fn lint_missing_we(&mut self, reg_idx: NodeIdx, idx: NodeIdx, sw: AccessType, hw: AccessType) {
        let register = self.world.node(reg_idx).inst_name.clone();
        let field = self.world.node(idx).inst_name.clone();
        let message = format!(
            "missing 'we' flag. 'sw = {}' and 'hw = {}' both can write to the register field. \
             'sw' will be always overwritten.",
            sw.name(),
            hw.name()
        );
        log::warn!("{message}\nRegister: {register}, field: {field}");
        self.lints.push(Lint {
            register,
            field,
            message,
        });
    }
}
