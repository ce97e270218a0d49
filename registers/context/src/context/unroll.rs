// Licensed under the Apache-2.0 license

//! Array unrolling and per-map type dedup.

use super::ItemContext;

/// Expand declared instances into one record per array element.
///
/// Each declared instance gets `idx` set to the position of its first
/// element in the returned list and `inst_idx` taken from `next_inst_idx`.
/// Element `i` sits at `base + stride * i`; array elements also get their
/// own `*_high` bound. The whole span was checked against the address space
/// when the item was built.
pub(crate) fn unroll(insts: &mut [ItemContext], next_inst_idx: &mut usize) -> Vec<ItemContext> {
    let mut index = 0;
    let mut unrolled = Vec::new();
    for inst in insts.iter_mut() {
        inst.idx = index;
        inst.inst_idx = *next_inst_idx;
        *next_inst_idx += 1;
        for position in 0..inst.dimensions.elements {
            let step = inst.array_stride * position;
            let mut element = inst.clone();
            element.idx = index;
            element.address_offset = inst.address_offset + step;
            element.absolute_address = inst.absolute_address + step;
            if inst.dimensions.is_array() {
                element.address_offset_high = element.address_offset + inst.array_stride - 1;
                element.absolute_address_high = element.absolute_address + inst.array_stride - 1;
            }
            unrolled.push(element);
            index += 1;
        }
    }
    unrolled
}

/// First declared instance of every type name, in declaration order.
pub(crate) fn dedup_types(insts: &[ItemContext]) -> (Vec<ItemContext>, Vec<String>) {
    let mut names = Vec::new();
    let mut types = Vec::new();
    for inst in insts {
        if !names.contains(&inst.type_name) {
            names.push(inst.type_name.clone());
            types.push(inst.clone());
        }
    }
    (types, names)
}
