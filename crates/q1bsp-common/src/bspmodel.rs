// bspmodel.rs — the loaded map: every decoded lump plus the linked trees
//
// `Map::from_bytes` runs the whole load: lump directory, every lump decoder, cross-lump
// index checks, then the drawing tree and clip hulls. A `Map` only exists once all of it
// succeeded, and is immutable afterwards.

use crate::bspfile::{BspFile, BspTexture, PARALLEL_LUMP_THRESHOLD};
use crate::bsptree::{BspLeaf, BspNode, BspTree, ClipTree, LeafId, NodeId};
use crate::bspwrite::BspWriter;
use crate::common::com_dprintf;
use crate::cvar::cvar_variable_value;
use crate::entities::{parse_entities, Entity};
use crate::error::LoadError;
use crate::files::FileLoader;
use crate::md4::com_block_checksum;
use crate::q_shared::{radius_from_bounds, vector_subtract, Vec3};
use crate::qfiles::*;
use crate::vis::{decompress_vis, vis_row_len};

// ============================================================
// Load options
// ============================================================

/// Knobs read once at the start of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Lumps with at least this many records are decoded on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { parallel_threshold: PARALLEL_LUMP_THRESHOLD }
    }
}

impl LoadOptions {
    /// Snapshot of `bsp_parallel_threshold`. Unset or non-positive values keep the default.
    pub fn from_cvars() -> Self {
        let threshold = cvar_variable_value("bsp_parallel_threshold");
        if threshold >= 1.0 {
            Self { parallel_threshold: threshold as usize }
        } else {
            Self::default()
        }
    }
}

// ============================================================
// Submodels
// ============================================================

/// A brush model: model 0 is the world, the rest are doors, platforms and triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct BspModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub radius: f32,
    /// Hull 0 is a node index; hulls 1 and 2 are clipnode indices, or a contents value
    /// when negative.
    pub headnode: [i32; MAX_MAP_HULLS],
    pub visleafs: usize,
    pub firstface: usize,
    pub numfaces: usize,
}

impl BspModel {
    fn to_record(&self) -> DModel {
        DModel {
            mins: self.mins,
            maxs: self.maxs,
            origin: self.origin,
            headnode: self.headnode,
            visleafs: self.visleafs as i32,
            firstface: self.firstface as i32,
            numfaces: self.numfaces as i32,
        }
    }
}

/// Fails unless `first..first + count` lies within `0..len`.
fn check_range(kind: LumpKind, record: usize, first: i64, count: i64, len: usize) -> Result<(), LoadError> {
    if first < 0 {
        return Err(LoadError::BadIndex { kind, record, index: first, count: len });
    }
    if count < 0 || first + count > len as i64 {
        return Err(LoadError::BadIndex { kind, record, index: first.max(len as i64), count: len });
    }
    Ok(())
}

fn load_submodels(
    raw: &[DModel],
    leaf_count: usize,
    node_count: usize,
    clipnode_count: usize,
    face_count: usize,
) -> Result<Vec<BspModel>, LoadError> {
    let kind = LumpKind::Models;
    let mut models = Vec::with_capacity(raw.len());

    for (i, m) in raw.iter().enumerate() {
        // leaf 0 is the shared solid leaf and never has a PVS bit
        if m.visleafs < 0 || m.visleafs as i64 > leaf_count.saturating_sub(1) as i64 {
            return Err(LoadError::bad_data(
                kind,
                format!("model {} has {} visleafs for {} leafs", i, m.visleafs, leaf_count),
            ));
        }
        check_range(kind, i, m.firstface.into(), m.numfaces.into(), face_count)?;

        if node_count > 0 {
            check_range(kind, i, m.headnode[0].into(), 1, node_count)?;
        }
        if clipnode_count > 0 {
            for &head in &m.headnode[1..3] {
                if head >= 0 {
                    check_range(kind, i, head.into(), 1, clipnode_count)?;
                } else if LeafContents::from_raw(head).is_none() {
                    return Err(LoadError::BadIndex { kind, record: i, index: head.into(), count: clipnode_count });
                }
            }
        }

        // spread the bounds by a pixel
        let mins = m.mins.map(|v| v - 1.0);
        let maxs = m.maxs.map(|v| v + 1.0);
        let radius = radius_from_bounds(&vector_subtract(&mins, &m.origin), &vector_subtract(&maxs, &m.origin));

        models.push(BspModel {
            mins: m.mins,
            maxs: m.maxs,
            origin: m.origin,
            radius,
            headnode: m.headnode,
            visleafs: m.visleafs as usize,
            firstface: m.firstface as usize,
            numfaces: m.numfaces as usize,
        });
    }

    Ok(models)
}

// ============================================================
// Map
// ============================================================

#[derive(Debug, Clone)]
pub struct Map {
    name: String,
    checksum: u32,
    entity_string: String,
    vertexes: Vec<Vec3>,
    edges: Vec<DEdge>,
    surfedges: Vec<i32>,
    textures: Vec<Option<BspTexture>>,
    texinfo: Vec<TexInfo>,
    faces: Vec<DFace>,
    marksurfaces: Vec<u16>,
    lighting: Vec<u8>,
    visibility: Vec<u8>,
    tree: BspTree,
    clip: ClipTree,
    models: Vec<BspModel>,
}

impl Map {
    /// Fetches `path` through `loader` and loads it with the options in the cvars.
    pub fn load(loader: &dyn FileLoader, path: &str) -> Result<Self, LoadError> {
        let data = loader.load_file(path).ok_or_else(|| LoadError::Io { path: path.to_string() })?;
        Self::from_bytes(path, &data, &LoadOptions::from_cvars())
    }

    /// Loads a map from an in-memory BSP29 file.
    pub fn from_bytes(name: &str, data: &[u8], options: &LoadOptions) -> Result<Self, LoadError> {
        let bsp = BspFile::parse(data)?.with_parallel_threshold(options.parallel_threshold);

        let vertexes = bsp.load_vertexes()?;
        let edges = bsp.load_edges()?;
        let surfedges = bsp.load_surfedges()?;
        let textures = bsp.load_textures()?;
        let lighting = bsp.load_lighting()?;
        let planes = bsp.load_planes()?;
        let texinfo = bsp.load_texinfo()?;
        let faces = bsp.load_faces()?;
        let marksurfaces = bsp.load_marksurfaces()?;
        let visibility = bsp.load_visibility()?;
        let raw_leafs = bsp.load_leafs()?;
        let raw_nodes = bsp.load_nodes()?;
        let raw_clipnodes = bsp.load_clipnodes()?;
        let entity_string = bsp.load_entity_string()?;
        let raw_models = bsp.load_submodels()?;

        // cross-lump references
        if !textures.is_empty() {
            for (i, ti) in texinfo.iter().enumerate() {
                check_range(LumpKind::TexInfo, i, ti.miptex.into(), 1, textures.len())?;
            }
        }
        for (i, f) in faces.iter().enumerate() {
            check_range(LumpKind::Faces, i, f.planenum.into(), 1, planes.len())?;
            check_range(LumpKind::Faces, i, f.texinfo.into(), 1, texinfo.len())?;
            check_range(LumpKind::Faces, i, f.firstedge.into(), f.numedges.into(), surfedges.len())?;
        }
        for (i, &m) in marksurfaces.iter().enumerate() {
            check_range(LumpKind::MarkSurfaces, i, m.into(), 1, faces.len())?;
        }

        let leaves = raw_leafs
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                check_range(
                    LumpKind::Leafs,
                    i,
                    rec.firstmarksurface.into(),
                    rec.nummarksurfaces.into(),
                    marksurfaces.len(),
                )?;
                BspLeaf::from_record(i, rec)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, n) in raw_nodes.iter().enumerate() {
            check_range(LumpKind::Nodes, i, n.firstface.into(), n.numfaces.into(), faces.len())?;
        }

        let plane_count = planes.len();
        let tree = BspTree::build(&raw_nodes, leaves, planes)?;
        let models = load_submodels(&raw_models, tree.leaves().len(), raw_nodes.len(), raw_clipnodes.len(), faces.len())?;

        let clip_roots: Vec<usize> = models
            .iter()
            .flat_map(|m| m.headnode[1..3].iter().copied())
            .filter_map(|h| usize::try_from(h).ok())
            .collect();
        let clip = ClipTree::build(&raw_clipnodes, plane_count, &clip_roots)?;

        let map = Self {
            name: name.to_string(),
            checksum: com_block_checksum(data),
            entity_string,
            vertexes,
            edges,
            surfedges,
            textures,
            texinfo,
            faces,
            marksurfaces,
            lighting,
            visibility,
            tree,
            clip,
            models,
        };

        com_dprintf(&format!(
            "Mod_LoadBrushModel: {}: {} nodes, {} leafs, {} planes, {} submodels\n",
            map.name,
            map.tree.nodes().len(),
            map.tree.leaves().len(),
            map.tree.planes().len(),
            map.models.len()
        ));

        Ok(map)
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// MD4 block checksum of the file the map was loaded from.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn tree(&self) -> &BspTree {
        &self.tree
    }

    pub fn planes(&self) -> &[DPlane] {
        self.tree.planes()
    }

    pub fn nodes(&self) -> &[BspNode] {
        self.tree.nodes()
    }

    pub fn leaves(&self) -> &[BspLeaf] {
        self.tree.leaves()
    }

    pub fn clip_tree(&self) -> &ClipTree {
        &self.clip
    }

    pub fn models(&self) -> &[BspModel] {
        &self.models
    }

    pub fn vertexes(&self) -> &[Vec3] {
        &self.vertexes
    }

    pub fn edges(&self) -> &[DEdge] {
        &self.edges
    }

    pub fn surfedges(&self) -> &[i32] {
        &self.surfedges
    }

    pub fn textures(&self) -> &[Option<BspTexture>] {
        &self.textures
    }

    pub fn texinfo(&self) -> &[TexInfo] {
        &self.texinfo
    }

    pub fn faces(&self) -> &[DFace] {
        &self.faces
    }

    pub fn marksurfaces(&self) -> &[u16] {
        &self.marksurfaces
    }

    pub fn lighting(&self) -> &[u8] {
        &self.lighting
    }

    pub fn visibility(&self) -> &[u8] {
        &self.visibility
    }

    pub fn entity_string(&self) -> &str {
        &self.entity_string
    }

    pub fn entities(&self) -> Result<Vec<Entity>, LoadError> {
        parse_entities(&self.entity_string)
    }

    // ============================================================
    // Queries
    // ============================================================

    /// The leaf of the world tree containing `p`.
    pub fn find_leaf(&self, p: &Vec3) -> Option<&BspLeaf> {
        self.tree.find_leaf(p).and_then(|id| self.tree.leaf(id))
    }

    /// Point location within one brush model's drawing hull.
    pub fn find_leaf_in_model(&self, model: usize, p: &Vec3) -> Option<LeafId> {
        let head = self.models.get(model)?.headnode[0];
        self.tree.find_leaf_from(NodeId(usize::try_from(head).ok()?), p)
    }

    /// Contents at `p` in hull 0 (point), 1 (player) or 2 (large monster) of `model`.
    pub fn hull_point_contents(&self, model: usize, hull: usize, p: &Vec3) -> Option<LeafContents> {
        let m = self.models.get(model)?;
        match hull {
            0 => {
                let leaf = self.find_leaf_in_model(model, p)?;
                self.tree.leaf(leaf).map(|l| l.contents)
            }
            1 | 2 => self.clip.point_contents(self.tree.planes(), m.headnode[hull], p),
            _ => None,
        }
    }

    /// Number of leaves covered by the PVS rows (every leaf but the solid leaf 0).
    pub fn visleafs(&self) -> usize {
        self.models
            .first()
            .map_or(self.tree.leaves().len().saturating_sub(1), |world| world.visleafs)
    }

    /// Decompressed PVS row of `leaf`. Bit `i` is set when leaf `i + 1` may be visible.
    pub fn leaf_pvs(&self, leaf: LeafId) -> Vec<u8> {
        let row = vis_row_len(self.visleafs());
        let offset = self.tree.leaf(leaf).and_then(|l| l.visofs);
        decompress_vis(&self.visibility, offset, row)
    }

    /// Encodes the map back into a BSP29 file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let nodes: Vec<DNode> = self.tree.nodes().iter().map(BspNode::to_record).collect();
        let leafs: Vec<DLeaf> = self.tree.leaves().iter().map(BspLeaf::to_record).collect();
        let models: Vec<DModel> = self.models.iter().map(BspModel::to_record).collect();

        let mut w = BspWriter::new();
        w.entities(&self.entity_string)
            .planes(self.tree.planes())
            .textures(&self.textures)
            .vertexes(&self.vertexes)
            .visibility(&self.visibility)
            .nodes(&nodes)
            .texinfo(&self.texinfo)
            .faces(&self.faces)
            .lighting(&self.lighting)
            .clipnodes(&self.clip.to_records())
            .leafs(&leafs)
            .marksurfaces(&self.marksurfaces)
            .edges(&self.edges)
            .surfedges(&self.surfedges)
            .models(&models);
        w.finish()
    }
}

/// Returns the leaf of `map`'s world tree containing `p`, or `None` if the map has no nodes.
pub fn find_leaf_containing(map: &Map, p: &Vec3) -> Option<LeafId> {
    map.tree.find_leaf(p)
}

// =============================================================================
// Test fixture
// =============================================================================

/// A small but complete map:
///
/// - planes: X=0, Y=0 (unused), Z=0
/// - node 0 splits on X: front is node 1, back is leaf 1 (empty)
/// - node 1 splits on Z: front is leaf 2 (water), back is leaf 0 (solid)
/// - leaf 1 sees only itself, leaf 2 sees both
/// - model 1 is a submodel rooted at node 1 whose clip hulls are solid
#[cfg(test)]
pub(crate) fn sample_map_bytes() -> Vec<u8> {
    let planes = vec![
        DPlane { normal: [1.0, 0.0, 0.0], dist: 0.0, plane_type: PLANE_X },
        DPlane { normal: [0.0, 1.0, 0.0], dist: 0.0, plane_type: PLANE_Y },
        DPlane { normal: [0.0, 0.0, 1.0], dist: 0.0, plane_type: PLANE_Z },
    ];
    let nodes = vec![
        DNode { planenum: 0, children: [1, -2], mins: [-64; 3], maxs: [64; 3], ..Default::default() },
        DNode { planenum: 2, children: [-3, -1], mins: [0, -64, -64], maxs: [64; 3], ..Default::default() },
    ];
    let leafs = vec![
        DLeaf { contents: CONTENTS_SOLID, visofs: -1, ..Default::default() },
        DLeaf { contents: CONTENTS_EMPTY, visofs: 0, ambient_level: [0, 40, 0, 0], ..Default::default() },
        DLeaf { contents: CONTENTS_WATER, visofs: 1, ambient_level: [200, 0, 0, 0], ..Default::default() },
    ];
    let clipnodes = vec![DClipNode { planenum: 0, children: [CONTENTS_EMPTY as i16, CONTENTS_SOLID as i16] }];
    let models = vec![
        DModel {
            mins: [-64.0; 3],
            maxs: [64.0; 3],
            headnode: [0, 0, 0, 0],
            visleafs: 2,
            ..Default::default()
        },
        DModel {
            mins: [0.0, -64.0, -64.0],
            maxs: [64.0; 3],
            origin: [32.0, 0.0, 0.0],
            headnode: [1, CONTENTS_SOLID, CONTENTS_SOLID, 0],
            visleafs: 0,
            ..Default::default()
        },
    ];
    let texture = BspTexture {
        name: "*water0".into(),
        width: 16,
        height: 16,
        mipmaps: [vec![1; 256], vec![2; 64], vec![3; 16], vec![4; 4]],
    };
    let texinfo = vec![TexInfo { vecs: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]], miptex: 0, flags: TEX_SPECIAL }];

    let mut w = BspWriter::new();
    w.entities("{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"info_player_start\"\n\"origin\" \"-32 0 24\"\n}\n")
        .planes(&planes)
        .textures(&[Some(texture)])
        .vertexes(&[[0.0, 0.0, 0.0], [64.0, 0.0, 0.0]])
        .visibility(&[0x01, 0x03])
        .nodes(&nodes)
        .texinfo(&texinfo)
        .clipnodes(&clipnodes)
        .leafs(&leafs)
        .edges(&[DEdge { v: [0, 1] }])
        .surfedges(&[0])
        .models(&models);
    w.finish()
}

// =============================================================================
// Tests
// =============================================================================
