//! Legacy row-major serials and directory sharding.
//!
//! Kept for storage roots written before the Hilbert layout existed.

use crate::{BLOCK_BITS, BLOCK_ZOOM, block_fragments};

/// Serial of a tile: the number of tiles on all shallower levels plus the row-major
/// offset within its own level. Valid for `z <= 31`.
#[must_use]
pub fn serial(z: u8, x: u32, y: u32) -> u64 {
    debug_assert!(z <= 31, "legacy serials overflow beyond level 31");
    let shallower = ((1_u64 << (2 * u32::from(z))) - 1) / 3;
    shallower + (u64::from(y) << z) + u64::from(x)
}

/// Directory fragments for a tile, with 64×64 blocks numbered row by row.
#[must_use]
pub fn coord_to_dir(z: u8, x: u32, y: u32) -> Vec<String> {
    let mut dirs = vec![format!("{z:02}")];
    if z > BLOCK_ZOOM {
        let order = z - BLOCK_ZOOM;
        let block = (u64::from(y >> BLOCK_BITS) << order) + u64::from(x >> BLOCK_BITS);
        dirs.extend(block_fragments(block, order));
    }
    dirs
}
