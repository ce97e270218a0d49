// Licensed under the Apache-2.0 license

use crate::error::{ContextError, ContextResult};
use crate::types::{NodeIdx, World};
use crate::value::ACCESS_CHANNEL;

/// Access channel of a node: its own, or the closest ancestor's.
///
/// Reaching past the top node without finding one is fatal.
pub fn access_channel(world: &World, idx: NodeIdx) -> ContextResult<u64> {
    let mut cur = Some(idx);
    while let Some(node_idx) = cur {
        let node = world.node(node_idx);
        if let Some(channel) = node.property::<u64>(ACCESS_CHANNEL)? {
            return Ok(channel);
        }
        cur = node.parent;
    }
    Err(ContextError::Configuration(format!(
        "couldn't find the access channel for '{}'",
        world.node(idx).inst_name
    )))
}
