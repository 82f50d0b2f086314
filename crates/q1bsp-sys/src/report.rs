// report.rs — console output for a loaded map and point queries

use q1bsp_common::bspmodel::{find_leaf_containing, Map};
use q1bsp_common::bsptree::LeafId;
use q1bsp_common::common::com_printf;
use q1bsp_common::q_shared::Vec3;
use q1bsp_common::qfiles::LeafContents;
use q1bsp_common::vis::VisCache;

/// Prints lump record counts and the map checksum.
pub fn print_map_summary(map: &Map) {
    com_printf(&format!("{}: checksum {:08x}\n", map.name(), map.checksum()));
    com_printf(&format!(
        "{:6} planes {:6} nodes {:6} leafs {:6} clipnodes\n",
        map.planes().len(),
        map.nodes().len(),
        map.leaves().len(),
        map.clip_tree().nodes().len()
    ));
    com_printf(&format!(
        "{:6} vertexes {:6} edges {:6} surfedges {:6} faces {:6} marksurfaces\n",
        map.vertexes().len(),
        map.edges().len(),
        map.surfedges().len(),
        map.faces().len(),
        map.marksurfaces().len()
    ));
    com_printf(&format!(
        "{:6} textures {:6} texinfo {:6} models {:6} visleafs\n",
        map.textures().len(),
        map.texinfo().len(),
        map.models().len(),
        map.visleafs()
    ));
    let census = TextureCensus::of(map);
    com_printf(&format!(
        "{:6} present {:6} sky {:6} turbulent {:6} animated\n",
        census.present, census.sky, census.turbulent, census.animated
    ));
    com_printf(&format!(
        "{:6} bytes lighting {:6} bytes visibility {:6} bytes entities\n",
        map.lighting().len(),
        map.visibility().len(),
        map.entity_string().len()
    ));
}

/// Texture counts by surface class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureCensus {
    pub present: usize,
    pub sky: usize,
    pub turbulent: usize,
    pub animated: usize,
}

impl TextureCensus {
    pub fn of(map: &Map) -> Self {
        let mut census = Self::default();
        for tex in map.textures().iter().flatten() {
            census.present += 1;
            census.sky += tex.is_sky() as usize;
            census.turbulent += tex.is_turbulent() as usize;
            census.animated += tex.is_animated() as usize;
        }
        census
    }
}

/// Answer to one point query.
#[derive(Debug, Clone, PartialEq)]
pub struct PointReport {
    pub point: Vec3,
    pub leaf: Option<LeafId>,
    pub contents: Option<LeafContents>,
    /// Leaves marked visible from the containing leaf.
    pub visible: usize,
}

impl PointReport {
    pub fn describe(&self) -> String {
        let [x, y, z] = self.point;
        match (self.leaf, self.contents) {
            (Some(LeafId(leaf)), Some(contents)) => format!(
                "({} {} {}): leaf {} {:?}, {} leafs visible",
                x, y, z, leaf, contents, self.visible
            ),
            _ => format!("({} {} {}): map has no nodes", x, y, z),
        }
    }
}

/// Locates `point` and marks the PVS of its leaf for `frame`.
pub fn query_point(map: &Map, vis: &mut VisCache, point: Vec3, frame: u32) -> PointReport {
    let leaf = find_leaf_containing(map, &point);
    let contents = leaf.and_then(|id| map.tree().leaf(id)).map(|l| l.contents);
    let visible = match leaf {
        Some(_) => vis.mark_leaves(map, leaf, frame),
        None => 0,
    };
    PointReport { point, leaf, contents, visible }
}
