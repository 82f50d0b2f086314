// bsptree.rs — linked BSP tree, acyclicity validation and point location
//
// Nodes and leaves live in flat arrays; a node's children are `ChildRef`s into them. The
// tree is immutable once built and every query is a read-only descent.

use crate::common::com_dprintf;
use crate::error::LoadError;
use crate::q_shared::{dot_product, Vec3};
use crate::qfiles::{DClipNode, DLeaf, DNode, DPlane, LeafContents, LumpKind};

// ============================================================
// Identifiers
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub usize);

/// One side of a node: another node, or a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Node(NodeId),
    Leaf(LeafId),
}

impl ChildRef {
    /// Decodes the on-disk child reference: non-negative values are node indices,
    /// negative values `r` name leaf `!r` (so -1 is leaf 0).
    pub fn from_raw(raw: i16) -> Self {
        if raw >= 0 {
            ChildRef::Node(NodeId(raw as usize))
        } else {
            ChildRef::Leaf(LeafId((!raw) as usize))
        }
    }

    pub fn to_raw(self) -> i16 {
        match self {
            ChildRef::Node(NodeId(n)) => n as i16,
            ChildRef::Leaf(LeafId(l)) => !(l as i16),
        }
    }

    pub fn node(self) -> Option<NodeId> {
        match self {
            ChildRef::Node(n) => Some(n),
            ChildRef::Leaf(_) => None,
        }
    }
}

// ============================================================
// Nodes and leaves
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BspNode {
    pub id: NodeId,
    pub plane: PlaneId,
    /// Front, back.
    pub children: [ChildRef; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16,
}

impl BspNode {
    pub fn to_record(&self) -> DNode {
        DNode {
            planenum: self.plane.0 as i32,
            children: [self.children[0].to_raw(), self.children[1].to_raw()],
            mins: self.mins,
            maxs: self.maxs,
            firstface: self.firstface,
            numfaces: self.numfaces,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BspLeaf {
    pub id: LeafId,
    pub contents: LeafContents,
    /// Offset of the compressed PVS row. `None` means the leaf sees everything.
    pub visofs: Option<usize>,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstmarksurface: u16,
    pub nummarksurfaces: u16,
    pub ambient_level: [u8; 4],
}

impl BspLeaf {
    pub fn from_record(index: usize, rec: &DLeaf) -> Result<Self, LoadError> {
        let contents = LeafContents::from_raw(rec.contents)
            .ok_or(LoadError::BadLeafContents { leaf: index, contents: rec.contents })?;

        let visofs = match rec.visofs {
            -1 => None,
            ofs if ofs >= 0 => Some(ofs as usize),
            ofs => {
                return Err(LoadError::bad_data(
                    LumpKind::Leafs,
                    format!("leaf {} has visibility offset {}", index, ofs),
                ))
            }
        };

        Ok(Self {
            id: LeafId(index),
            contents,
            visofs,
            mins: rec.mins,
            maxs: rec.maxs,
            firstmarksurface: rec.firstmarksurface,
            nummarksurfaces: rec.nummarksurfaces,
            ambient_level: rec.ambient_level,
        })
    }

    pub fn to_record(&self) -> DLeaf {
        DLeaf {
            contents: self.contents.to_raw(),
            visofs: self.visofs.map_or(-1, |ofs| ofs as i32),
            mins: self.mins,
            maxs: self.maxs,
            firstmarksurface: self.firstmarksurface,
            nummarksurfaces: self.nummarksurfaces,
            ambient_level: self.ambient_level,
        }
    }
}

/// Signed distance from `plane` to `p`. Zero counts as the front side.
#[inline]
pub fn plane_diff(plane: &DPlane, p: &Vec3) -> f32 {
    dot_product(p, &plane.normal) - plane.dist
}

fn check_plane(kind: LumpKind, record: usize, planenum: i32, plane_count: usize) -> Result<PlaneId, LoadError> {
    usize::try_from(planenum)
        .ok()
        .filter(|&p| p < plane_count)
        .map(PlaneId)
        .ok_or(LoadError::BadIndex { kind, record, index: planenum as i64, count: plane_count })
}

// ============================================================
// Acyclicity
// ============================================================

/// Validates that the node graph is a forest and returns each node's parent.
///
/// `roots` start out claimed, so nothing may point at them. Any other node may be claimed
/// once. Nodes left unreachable from the parentless nodes sit on a cycle.
fn check_acyclic(
    kind: LumpKind,
    children: &[[Option<usize>; 2]],
    roots: &[usize],
) -> Result<Vec<Option<usize>>, LoadError> {
    let count = children.len();
    let mut claimed = vec![false; count];
    let mut parents = vec![None; count];

    for &root in roots {
        if let Some(c) = claimed.get_mut(root) {
            *c = true;
        }
    }

    for (i, kids) in children.iter().enumerate() {
        for &child in kids.iter().flatten() {
            if claimed[child] {
                return Err(LoadError::NonAcyclicTree { kind, node: child });
            }
            claimed[child] = true;
            parents[child] = Some(i);
        }
    }

    let mut reached = vec![false; count];
    let mut stack: Vec<usize> = (0..count).filter(|&i| parents[i].is_none()).collect();
    while let Some(i) = stack.pop() {
        reached[i] = true;
        stack.extend(children[i].iter().flatten().copied());
    }

    if let Some(node) = reached.iter().position(|&r| !r) {
        return Err(LoadError::NonAcyclicTree { kind, node });
    }

    Ok(parents)
}

// ============================================================
// BspTree
// ============================================================

/// The drawing hull: nodes, leaves and the planes they split on.
#[derive(Debug, Clone, Default)]
pub struct BspTree {
    nodes: Vec<BspNode>,
    leaves: Vec<BspLeaf>,
    planes: Vec<DPlane>,
    node_parents: Vec<Option<NodeId>>,
    leaf_parents: Vec<Option<NodeId>>,
}

impl BspTree {
    /// Links the raw node records into a tree over `leaves` and `planes`.
    ///
    /// Plane and child indices are range-checked and the node graph must be acyclic with
    /// node 0 as the root. A leaf may be the child of several nodes; its recorded parent
    /// is the last one that references it.
    pub fn build(raw: &[DNode], leaves: Vec<BspLeaf>, planes: Vec<DPlane>) -> Result<Self, LoadError> {
        let kind = LumpKind::Nodes;
        let mut nodes = Vec::with_capacity(raw.len());

        for (i, rec) in raw.iter().enumerate() {
            let plane = check_plane(kind, i, rec.planenum, planes.len())?;

            let mut children = [ChildRef::Leaf(LeafId(0)); 2];
            for (side, &r) in rec.children.iter().enumerate() {
                let child = ChildRef::from_raw(r);
                let (index, count) = match child {
                    ChildRef::Node(NodeId(n)) => (n, raw.len()),
                    ChildRef::Leaf(LeafId(l)) => (l, leaves.len()),
                };
                if index >= count {
                    return Err(LoadError::BadIndex { kind, record: i, index: index as i64, count });
                }
                children[side] = child;
            }

            nodes.push(BspNode {
                id: NodeId(i),
                plane,
                children,
                mins: rec.mins,
                maxs: rec.maxs,
                firstface: rec.firstface,
                numfaces: rec.numfaces,
            });
        }

        let links: Vec<[Option<usize>; 2]> = nodes
            .iter()
            .map(|n| [n.children[0].node().map(|id| id.0), n.children[1].node().map(|id| id.0)])
            .collect();
        let roots: &[usize] = if nodes.is_empty() { &[] } else { &[0] };
        let node_parents = check_acyclic(kind, &links, roots)?
            .into_iter()
            .map(|p| p.map(NodeId))
            .collect();

        let mut leaf_parents = vec![None; leaves.len()];
        for node in &nodes {
            for child in node.children {
                if let ChildRef::Leaf(LeafId(l)) = child {
                    leaf_parents[l] = Some(node.id);
                }
            }
        }

        com_dprintf(&format!("Mod_LoadNodes: linked {} nodes over {} leaves\n", nodes.len(), leaves.len()));

        Ok(Self { nodes, leaves, planes, node_parents, leaf_parents })
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    pub fn planes(&self) -> &[DPlane] {
        &self.planes
    }

    pub fn node(&self, id: NodeId) -> Option<&BspNode> {
        self.nodes.get(id.0)
    }

    pub fn leaf(&self, id: LeafId) -> Option<&BspLeaf> {
        self.leaves.get(id.0)
    }

    pub fn plane(&self, id: PlaneId) -> Option<&DPlane> {
        self.planes.get(id.0)
    }

    pub fn node_parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_parents.get(id.0).copied().flatten()
    }

    pub fn leaf_parent(&self, id: LeafId) -> Option<NodeId> {
        self.leaf_parents.get(id.0).copied().flatten()
    }

    /// Returns the leaf containing `p`, or `None` for a tree without nodes.
    ///
    /// Each node tests `dot(p, normal) - dist`, not the bare dot product, so planes that
    /// do not pass through the origin split where the compiler put them. The two agree
    /// whenever `dist` is zero. A point exactly on a plane goes to the front child.
    pub fn find_leaf(&self, p: &Vec3) -> Option<LeafId> {
        self.find_leaf_from(self.root()?, p)
    }

    /// Descends from `start` to the leaf containing `p`.
    pub fn find_leaf_from(&self, start: NodeId, p: &Vec3) -> Option<LeafId> {
        let mut node = self.nodes.get(start.0)?;
        loop {
            let plane = &self.planes[node.plane.0];
            let side = if plane_diff(plane, p) >= 0.0 { 0 } else { 1 };
            match node.children[side] {
                ChildRef::Node(next) => node = &self.nodes[next.0],
                ChildRef::Leaf(leaf) => return Some(leaf),
            }
        }
    }
}

// ============================================================
// Clipping hulls
// ============================================================

/// Clipnode children are node indices or, when negative, a contents value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipChild {
    Node(usize),
    Contents(LeafContents),
}

impl ClipChild {
    pub fn to_raw(self) -> i16 {
        match self {
            ClipChild::Node(n) => n as i16,
            ClipChild::Contents(c) => c.to_raw() as i16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BspClipNode {
    pub plane: PlaneId,
    pub children: [ClipChild; 2],
}

/// The collision hulls (1 and 2) shared by every model of the map.
#[derive(Debug, Clone, Default)]
pub struct ClipTree {
    nodes: Vec<BspClipNode>,
}

impl ClipTree {
    /// Links the clipnode records. `roots` are the models' clip head nodes; they may not
    /// be referenced as anyone's child.
    pub fn build(raw: &[DClipNode], plane_count: usize, roots: &[usize]) -> Result<Self, LoadError> {
        let kind = LumpKind::ClipNodes;
        let mut nodes = Vec::with_capacity(raw.len());

        for (i, rec) in raw.iter().enumerate() {
            let plane = check_plane(kind, i, rec.planenum, plane_count)?;

            let mut children = [ClipChild::Contents(LeafContents::Solid); 2];
            for (side, &r) in rec.children.iter().enumerate() {
                children[side] = if r >= 0 {
                    let n = r as usize;
                    if n >= raw.len() {
                        return Err(LoadError::BadIndex { kind, record: i, index: n as i64, count: raw.len() });
                    }
                    ClipChild::Node(n)
                } else {
                    let contents = LeafContents::from_raw(i32::from(r)).ok_or_else(|| {
                        LoadError::bad_data(kind, format!("clipnode {} has contents {}", i, r))
                    })?;
                    ClipChild::Contents(contents)
                };
            }

            nodes.push(BspClipNode { plane, children });
        }

        let links: Vec<[Option<usize>; 2]> = nodes
            .iter()
            .map(|n| {
                n.children.map(|c| match c {
                    ClipChild::Node(i) => Some(i),
                    ClipChild::Contents(_) => None,
                })
            })
            .collect();
        check_acyclic(kind, &links, roots)?;

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[BspClipNode] {
        &self.nodes
    }

    pub fn to_records(&self) -> Vec<DClipNode> {
        self.nodes
            .iter()
            .map(|n| DClipNode {
                planenum: n.plane.0 as i32,
                children: [n.children[0].to_raw(), n.children[1].to_raw()],
            })
            .collect()
    }

    /// Walks the hull starting at `head` (a clipnode index, or a contents value when
    /// negative) and returns the contents at `p`.
    pub fn point_contents(&self, planes: &[DPlane], head: i32, p: &Vec3) -> Option<LeafContents> {
        let mut child = if head >= 0 {
            ClipChild::Node(head as usize)
        } else {
            ClipChild::Contents(LeafContents::from_raw(head)?)
        };

        loop {
            match child {
                ClipChild::Contents(c) => return Some(c),
                ClipChild::Node(n) => {
                    let node = self.nodes.get(n)?;
                    let plane = planes.get(node.plane.0)?;
                    let side = if plane_diff(plane, p) >= 0.0 { 0 } else { 1 };
                    child = node.children[side];
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
