// vis.rs — potentially visible set decompression and per-frame visibility marking

use crate::bspmodel::Map;
use crate::bsptree::{LeafId, NodeId};
use crate::cvar::cvar_variable_value;

/// Bytes in one decompressed PVS row for a map with `visleafs` visible leaves.
pub fn vis_row_len(visleafs: usize) -> usize {
    (visleafs + 7) >> 3
}

/// Expands the run-length coded PVS row starting at `offset` in `vis`.
///
/// A zero byte is followed by a count of zero bytes to emit; any other byte is copied.
/// Without vis data (`offset` is `None` or `vis` is empty) every leaf is visible.
/// Truncated input leaves the rest of the row zeroed.
pub fn decompress_vis(vis: &[u8], offset: Option<usize>, row: usize) -> Vec<u8> {
    let offset = match offset {
        Some(ofs) if !vis.is_empty() => ofs,
        _ => return vec![0xff; row],
    };

    let mut out = vec![0u8; row];
    let mut out_p = 0;
    let mut inp = offset;

    while out_p < row {
        let Some(&b) = vis.get(inp) else {
            log::warn!("Mod_DecompressVis: row at {} runs off the end of the vis lump", offset);
            break;
        };
        if b != 0 {
            out[out_p] = b;
            out_p += 1;
            inp += 1;
            continue;
        }

        // run of zero bytes
        let Some(&count) = vis.get(inp + 1) else {
            log::warn!("Mod_DecompressVis: row at {} runs off the end of the vis lump", offset);
            break;
        };
        inp += 2;
        let mut c = count as usize;
        if out_p + c > row {
            c = row - out_p;
            log::warn!("Mod_DecompressVis: overrun in row at {}", offset);
        }
        // out is already zeroed
        out_p += c;
    }

    out
}

/// Tests bit `i` of a decompressed row, i.e. whether leaf `i + 1` is visible.
#[inline]
pub fn pvs_bit(pvs: &[u8], i: usize) -> bool {
    pvs.get(i >> 3).is_some_and(|&b| b & (1 << (i & 7)) != 0)
}

// ============================================================
// VisCache
// ============================================================

/// Per-frame visibility stamps for one viewer of one map.
///
/// The map itself is never written. A leaf or node is visible in the current frame when
/// its stamp equals the frame passed to the last `mark_leaves`. Frame numbers start at 1.
#[derive(Debug, Clone, Default)]
pub struct VisCache {
    frame: u32,
    view_leaf: Option<LeafId>,
    leaf_frames: Vec<u32>,
    node_frames: Vec<u32>,
    /// Mark everything visible regardless of the PVS.
    pub novis: bool,
}

impl VisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks up `bsp_novis` from the cvar system.
    pub fn from_cvars() -> Self {
        Self { novis: cvar_variable_value("bsp_novis") != 0.0, ..Self::default() }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn view_leaf(&self) -> Option<LeafId> {
        self.view_leaf
    }

    /// Stamps every leaf in the view leaf's PVS, and the nodes above it, with `frame`.
    /// Returns how many leaves were marked.
    pub fn mark_leaves(&mut self, map: &Map, view_leaf: Option<LeafId>, frame: u32) -> usize {
        let tree = map.tree();
        self.leaf_frames.resize(tree.leaves().len(), 0);
        self.node_frames.resize(tree.nodes().len(), 0);
        self.frame = frame;
        self.view_leaf = view_leaf;

        let view = match view_leaf {
            Some(leaf) if !self.novis && !map.visibility().is_empty() => leaf,
            _ => {
                // mark everything
                self.leaf_frames.iter_mut().for_each(|f| *f = frame);
                self.node_frames.iter_mut().for_each(|f| *f = frame);
                return self.leaf_frames.len();
            }
        };

        let pvs = map.leaf_pvs(view);
        let mut marked = 0;
        for i in 0..map.visleafs() {
            if !pvs_bit(&pvs, i) {
                continue;
            }
            let leaf = LeafId(i + 1);
            let Some(stamp) = self.leaf_frames.get_mut(leaf.0) else {
                continue;
            };
            *stamp = frame;
            marked += 1;

            let mut parent = tree.leaf_parent(leaf);
            while let Some(NodeId(n)) = parent {
                if self.node_frames[n] == frame {
                    break;
                }
                self.node_frames[n] = frame;
                parent = tree.node_parent(NodeId(n));
            }
        }

        marked
    }

    pub fn leaf_visible(&self, leaf: LeafId) -> bool {
        self.frame != 0 && self.leaf_frames.get(leaf.0) == Some(&self.frame)
    }

    pub fn node_visible(&self, node: NodeId) -> bool {
        self.frame != 0 && self.node_frames.get(node.0) == Some(&self.frame)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspmodel::{sample_map_bytes, LoadOptions};

    #[test]
    fn test_row_len() {
        assert_eq!(vis_row_len(0), 0);
        assert_eq!(vis_row_len(1), 1);
        assert_eq!(vis_row_len(8), 1);
        assert_eq!(vis_row_len(9), 2);
    }

    #[test]
    fn test_no_vis_data_sees_everything() {
        assert_eq!(decompress_vis(&[], Some(0), 3), vec![0xff; 3]);
        assert_eq!(decompress_vis(&[1, 2, 3], None, 2), vec![0xff; 2]);
    }

    #[test]
    fn test_literal_and_zero_runs() {
        // row 0 at offset 0: 0x81, then 3 zero bytes, then 0x01
        let vis = [0x81, 0x00, 0x03, 0x01];
        assert_eq!(decompress_vis(&vis, Some(0), 5), vec![0x81, 0, 0, 0, 0x01]);
    }

    #[test]
    fn test_row_offset() {
        let vis = [0xAA, 0xBB, 0x0F, 0xF0];
        assert_eq!(decompress_vis(&vis, Some(2), 2), vec![0x0F, 0xF0]);
    }

    #[test]
    fn test_zero_run_overrun_clamped() {
        let vis = [0x00, 0x10];
        assert_eq!(decompress_vis(&vis, Some(0), 4), vec![0; 4]);
    }

    #[test]
    fn test_truncated_row() {
        let vis = [0xFF];
        assert_eq!(decompress_vis(&vis, Some(0), 3), vec![0xFF, 0, 0]);
        assert_eq!(decompress_vis(&vis, Some(9), 2), vec![0, 0]);
    }

    #[test]
    fn test_pvs_bit() {
        let pvs = [0b0000_0101, 0b1000_0000];
        assert!(pvs_bit(&pvs, 0));
        assert!(!pvs_bit(&pvs, 1));
        assert!(pvs_bit(&pvs, 2));
        assert!(pvs_bit(&pvs, 15));
        assert!(!pvs_bit(&pvs, 16));
    }

    #[test]
    fn test_mark_leaves_walks_parents() {
        let map = Map::from_bytes("vis", &sample_map_bytes(), &LoadOptions::default()).unwrap();
        let mut cache = VisCache::new();

        assert_eq!(cache.mark_leaves(&map, Some(LeafId(1)), 1), 1);
        assert!(cache.leaf_visible(LeafId(1)));
        assert!(!cache.leaf_visible(LeafId(2)));
        assert!(cache.node_visible(NodeId(0)));
        assert!(!cache.node_visible(NodeId(1)));

        assert_eq!(cache.mark_leaves(&map, Some(LeafId(2)), 2), 2);
        assert!(cache.leaf_visible(LeafId(1)));
        assert!(cache.leaf_visible(LeafId(2)));
        assert!(cache.node_visible(NodeId(1)));
        assert!(cache.node_visible(NodeId(0)));
        assert_eq!(cache.view_leaf(), Some(LeafId(2)));
    }

    #[test]
    fn test_stale_stamps_not_visible() {
        let map = Map::from_bytes("vis", &sample_map_bytes(), &LoadOptions::default()).unwrap();
        let mut cache = VisCache::new();
        cache.mark_leaves(&map, Some(LeafId(2)), 1);
        cache.mark_leaves(&map, Some(LeafId(1)), 2);
        assert!(!cache.leaf_visible(LeafId(2)));
        assert_eq!(cache.frame(), 2);
    }

    #[test]
    fn test_unknown_view_marks_everything() {
        let map = Map::from_bytes("vis", &sample_map_bytes(), &LoadOptions::default()).unwrap();
        let mut cache = VisCache::new();
        assert_eq!(cache.mark_leaves(&map, None, 5), 3);
        assert!(cache.leaf_visible(LeafId(0)));
        assert!(cache.node_visible(NodeId(1)));
    }

    #[test]
    fn test_fresh_cache_marks_nothing() {
        let cache = VisCache::new();
        assert!(!cache.leaf_visible(LeafId(0)));
        assert!(!cache.node_visible(NodeId(0)));
        assert_eq!(cache.frame(), 0);
    }
}
