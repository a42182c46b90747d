//! Hilbert-curve serials and directory sharding.
//!
//! Neighbouring tiles get numerically close distances along the curve, so both the
//! serial ordering and the sharded directories keep geographically adjacent tiles
//! together.

use crate::{BLOCK_BITS, BLOCK_ZOOM, block_fragments};

/// Number of low bits reserved for the curve distance in a serial.
const SERIAL_SHIFT: u8 = 58;

/// Distance of `(x, y)` along a Hilbert curve filling a `2^order × 2^order` grid.
#[must_use]
pub fn hilbert_distance(x: u32, y: u32, order: u8) -> u64 {
    let (mut x, mut y) = (x, y);
    let mut distance = 0_u64;
    for i in (0..u32::from(order)).rev() {
        let xi = (x >> i) & 1;
        let yi = (y >> i) & 1;
        if yi == 0 {
            // swap, and complement both when xi is set
            let mask = 0_u32.wrapping_sub(xi);
            (x, y) = (y ^ mask, x ^ mask);
        }
        distance = (distance << 2) | u64::from((xi << 1) | (xi ^ yi));
    }
    distance
}

/// Inverse of [`hilbert_distance`].
#[must_use]
pub fn hilbert_coord(distance: u64, order: u8) -> (u32, u32) {
    let (mut x, mut y) = (0_u32, 0_u32);
    for i in 0..u32::from(order) {
        let quadrant = ((distance >> (2 * i)) & 3) as u32;
        let xi = quadrant >> 1;
        let yi = xi ^ (quadrant & 1);
        if yi == 0 {
            let low_bits = (1_u32 << i) - 1;
            let mask = 0_u32.wrapping_sub(xi) & low_bits;
            (x, y) = (y ^ mask, x ^ mask);
        }
        x |= xi << i;
        y |= yi << i;
    }
    (x, y)
}

/// Serial of a tile: zoom level in the top bits, curve distance below.
#[must_use]
pub fn serial(z: u8, x: u32, y: u32) -> u64 {
    (u64::from(z) << SERIAL_SHIFT) | hilbert_distance(x, y, z)
}

/// Directory fragments for a tile.
///
/// Levels up to 6 fit into one directory named after the level. Deeper levels group
/// tiles into 64×64 blocks, numbered along the Hilbert curve of the block grid and
/// written as hex pairs, which bounds every directory to a few thousand entries.
#[must_use]
pub fn coord_to_dir(z: u8, x: u32, y: u32) -> Vec<String> {
    let mut dirs = vec![format!("{z:02}")];
    if z > BLOCK_ZOOM {
        let order = z - BLOCK_ZOOM;
        let block = hilbert_distance(x >> BLOCK_BITS, y >> BLOCK_BITS, order);
        dirs.extend(block_fragments(block, order));
    }
    dirs
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use insta::assert_snapshot;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_first_order_curve() {
        assert_eq!(hilbert_distance(0, 0, 1), 0);
        assert_eq!(hilbert_distance(0, 1, 1), 1);
        assert_eq!(hilbert_distance(1, 1, 1), 2);
        assert_eq!(hilbert_distance(1, 0, 1), 3);
    }

    #[test]
    fn test_curve_is_continuous() {
        let order = 4;
        let mut prev = hilbert_coord(0, order);
        for d in 1..(1_u64 << (2 * order)) {
            let (x, y) = hilbert_coord(d, order);
            assert_eq!(x.abs_diff(prev.0) + y.abs_diff(prev.1), 1, "jump at {d}");
            prev = (x, y);
        }
    }

    #[rstest]
    #[case(3)]
    #[case(5)]
    #[case(16)]
    fn test_coord_round_trip(#[case] order: u8) {
        let dim = 1_u32 << order;
        for (x, y) in [(0, 0), (dim - 1, 0), (0, dim - 1), (dim / 2, dim / 3), (dim - 1, dim - 1)] {
            let d = hilbert_distance(x, y, order);
            assert!(d < 1 << (2 * u32::from(order)));
            assert_eq!(hilbert_coord(d, order), (x, y));
        }
    }

    #[test]
    fn test_serial_injective_on_shallow_levels() {
        let mut seen = HashSet::new();
        for z in 0..=5_u8 {
            for x in 0..1_u32 << z {
                for y in 0..1_u32 << z {
                    assert!(seen.insert(serial(z, x, y)), "duplicate serial {z}/{x}/{y}");
                }
            }
        }
    }

    #[test]
    fn test_serial_deepest_level() {
        let max = (1_u32 << 28) - 1;
        let deep = serial(28, max, 0);
        assert_eq!(deep >> SERIAL_SHIFT, 28);
        assert!(deep > serial(27, max, max));
        assert_ne!(deep, serial(28, max, 1));
    }

    #[test]
    fn test_coord_to_dir() {
        assert_eq!(coord_to_dir(0, 0, 0), ["00"]);
        assert_eq!(coord_to_dir(6, 63, 63), ["06"]);
        assert_eq!(coord_to_dir(7, 64, 0), ["07", "03"]);
        assert_eq!(coord_to_dir(7, 127, 63), ["07", "03"]);
        assert_snapshot!(coord_to_dir(12, 0, 4095).join("/"), @"12/05/55");
    }

    #[test]
    fn test_blocks_share_directory() {
        let a = coord_to_dir(15, 64 * 100, 64 * 7);
        let b = coord_to_dir(15, 64 * 100 + 63, 64 * 7 + 63);
        let c = coord_to_dir(15, 64 * 101, 64 * 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 1 + 3);
    }
}
