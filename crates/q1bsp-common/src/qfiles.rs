// qfiles.rs — Quake BSP29 on-disk structures and constants
//
// Every struct here mirrors a packed, little-endian file record. The loaders never
// transmute file bytes into these types; fields are extracted one by one, and the
// `size_of` checks below pin the record strides the loaders rely on.

use std::fmt;

// ============================================================
// BSP file format
// ============================================================

pub const BSPVERSION: i32 = 29;

// Upper design bounds
pub const MAX_MAP_MODELS: usize = 256;
pub const MAX_MAP_ENTSTRING: usize = 65536;
pub const MAX_MAP_PLANES: usize = 32767;
pub const MAX_MAP_NODES: usize = 32767;
pub const MAX_MAP_CLIPNODES: usize = 32767;
pub const MAX_MAP_LEAFS: usize = 8192;
pub const MAX_MAP_VERTS: usize = 65535;
pub const MAX_MAP_FACES: usize = 65535;
pub const MAX_MAP_MARKSURFACES: usize = 65535;
pub const MAX_MAP_TEXINFO: usize = 4096;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_TEXTURES: usize = 512;
pub const MAX_MAP_MIPTEX: usize = 0x200000;
pub const MAX_MAP_LIGHTING: usize = 0x100000;
pub const MAX_MAP_VISIBILITY: usize = 0x100000;

/// Number of collision hulls a model carries head nodes for.
pub const MAX_MAP_HULLS: usize = 4;
pub const NUM_AMBIENTS: usize = 4;
pub const MAXLIGHTMAPS: usize = 4;
pub const MIPLEVELS: usize = 4;
pub const MIPTEX_NAME_LEN: usize = 16;

/// Mip textures must have dimensions that are multiples of this.
pub const MIPTEX_ALIGN: u32 = 16;

/// Header size: version + HEADER_LUMPS lump descriptors.
pub const HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

// Lump indices
pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXTURES: usize = 2;
pub const LUMP_VERTEXES: usize = 3;
pub const LUMP_VISIBILITY: usize = 4;
pub const LUMP_NODES: usize = 5;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_LIGHTING: usize = 8;
pub const LUMP_CLIPNODES: usize = 9;
pub const LUMP_LEAFS: usize = 10;
pub const LUMP_MARKSURFACES: usize = 11;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;
pub const HEADER_LUMPS: usize = 15;

/// Named lump kinds, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LumpKind {
    Entities,
    Planes,
    Textures,
    Vertexes,
    Visibility,
    Nodes,
    TexInfo,
    Faces,
    Lighting,
    ClipNodes,
    Leafs,
    MarkSurfaces,
    Edges,
    SurfEdges,
    Models,
}

impl LumpKind {
    pub const ALL: [LumpKind; HEADER_LUMPS] = [
        LumpKind::Entities,
        LumpKind::Planes,
        LumpKind::Textures,
        LumpKind::Vertexes,
        LumpKind::Visibility,
        LumpKind::Nodes,
        LumpKind::TexInfo,
        LumpKind::Faces,
        LumpKind::Lighting,
        LumpKind::ClipNodes,
        LumpKind::Leafs,
        LumpKind::MarkSurfaces,
        LumpKind::Edges,
        LumpKind::SurfEdges,
        LumpKind::Models,
    ];

    /// Position of this lump's descriptor in the header.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LumpKind::Entities => "entities",
            LumpKind::Planes => "planes",
            LumpKind::Textures => "textures",
            LumpKind::Vertexes => "vertexes",
            LumpKind::Visibility => "visibility",
            LumpKind::Nodes => "nodes",
            LumpKind::TexInfo => "texinfo",
            LumpKind::Faces => "faces",
            LumpKind::Lighting => "lighting",
            LumpKind::ClipNodes => "clipnodes",
            LumpKind::Leafs => "leafs",
            LumpKind::MarkSurfaces => "marksurfaces",
            LumpKind::Edges => "edges",
            LumpKind::SurfEdges => "surfedges",
            LumpKind::Models => "models",
        }
    }
}

impl fmt::Display for LumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DHeader {
    pub version: i32,
    pub lumps: [Lump; HEADER_LUMPS],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    pub headnode: [i32; MAX_MAP_HULLS],
    /// Number of leaves covered by this model's visibility rows, not counting leaf 0.
    pub visleafs: i32,
    pub firstface: i32,
    pub numfaces: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct DVertex {
    pub point: [f32; 3],
}

// Plane types: 0-2 are axial planes, 3-5 are non-axial planes snapped to the nearest
pub const PLANE_X: i32 = 0;
pub const PLANE_Y: i32 = 1;
pub const PLANE_Z: i32 = 2;
pub const PLANE_ANYX: i32 = 3;
pub const PLANE_ANYY: i32 = 4;
pub const PLANE_ANYZ: i32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub plane_type: i32,
}

// Leaf contents. Compiled maps keep ORIGIN and CLIP out of the leaf lump.
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;
pub const CONTENTS_ORIGIN: i32 = -7;
pub const CONTENTS_CLIP: i32 = -8;
pub const CONTENTS_CURRENT_0: i32 = -9;
pub const CONTENTS_CURRENT_90: i32 = -10;
pub const CONTENTS_CURRENT_180: i32 = -11;
pub const CONTENTS_CURRENT_270: i32 = -12;
pub const CONTENTS_CURRENT_UP: i32 = -13;
pub const CONTENTS_CURRENT_DOWN: i32 = -14;

/// What a leaf (or a clip hull region) is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafContents {
    Empty,
    Solid,
    Water,
    Slime,
    Lava,
    Sky,
    Current0,
    Current90,
    Current180,
    Current270,
    CurrentUp,
    CurrentDown,
}

impl LeafContents {
    pub fn from_raw(value: i32) -> Option<Self> {
        Some(match value {
            CONTENTS_EMPTY => LeafContents::Empty,
            CONTENTS_SOLID => LeafContents::Solid,
            CONTENTS_WATER => LeafContents::Water,
            CONTENTS_SLIME => LeafContents::Slime,
            CONTENTS_LAVA => LeafContents::Lava,
            CONTENTS_SKY => LeafContents::Sky,
            CONTENTS_CURRENT_0 => LeafContents::Current0,
            CONTENTS_CURRENT_90 => LeafContents::Current90,
            CONTENTS_CURRENT_180 => LeafContents::Current180,
            CONTENTS_CURRENT_270 => LeafContents::Current270,
            CONTENTS_CURRENT_UP => LeafContents::CurrentUp,
            CONTENTS_CURRENT_DOWN => LeafContents::CurrentDown,
            _ => return None,
        })
    }

    pub fn to_raw(self) -> i32 {
        match self {
            LeafContents::Empty => CONTENTS_EMPTY,
            LeafContents::Solid => CONTENTS_SOLID,
            LeafContents::Water => CONTENTS_WATER,
            LeafContents::Slime => CONTENTS_SLIME,
            LeafContents::Lava => CONTENTS_LAVA,
            LeafContents::Sky => CONTENTS_SKY,
            LeafContents::Current0 => CONTENTS_CURRENT_0,
            LeafContents::Current90 => CONTENTS_CURRENT_90,
            LeafContents::Current180 => CONTENTS_CURRENT_180,
            LeafContents::Current270 => CONTENTS_CURRENT_270,
            LeafContents::CurrentUp => CONTENTS_CURRENT_UP,
            LeafContents::CurrentDown => CONTENTS_CURRENT_DOWN,
        }
    }

    /// True for every liquid, including the water currents.
    pub fn is_liquid(self) -> bool {
        !matches!(self, LeafContents::Empty | LeafContents::Solid | LeafContents::Sky)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DNode {
    pub planenum: i32,
    /// Negative numbers are -(leafs+1), not nodes
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DClipNode {
    pub planenum: i32,
    /// Negative numbers are contents
    pub children: [i16; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct TexInfo {
    /// [s/t][xyz offset]
    pub vecs: [[f32; 4]; 2],
    pub miptex: i32,
    pub flags: i32,
}

/// Sky or slime texinfo, no lightmap or 256 subdivision
pub const TEX_SPECIAL: i32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DFace {
    pub planenum: i16,
    pub side: i16,
    /// we must support > 64k edges
    pub firstedge: i32,
    pub numedges: i16,
    pub texinfo: i16,
    pub styles: [u8; MAXLIGHTMAPS],
    /// start of [numstyles*surfsize] samples
    pub lightofs: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DLeaf {
    pub contents: i32,
    /// -1 = no visibility info
    pub visofs: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstmarksurface: u16,
    pub nummarksurfaces: u16,
    pub ambient_level: [u8; NUM_AMBIENTS],
}

// Ambient sound channels, indexing `DLeaf::ambient_level`
pub const AMBIENT_WATER: usize = 0;
pub const AMBIENT_SKY: usize = 1;
pub const AMBIENT_SLIME: usize = 2;
pub const AMBIENT_LAVA: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct DMipTex {
    pub name: [u8; MIPTEX_NAME_LEN],
    pub width: u32,
    pub height: u32,
    /// four mip maps stored
    pub offsets: [u32; MIPLEVELS],
}

/// Texture directory slot value for a texture the compiler left out.
pub const MIPTEX_ABSENT: i32 = -1;

// Record strides used by the lump decoders
pub const SIZEOF_DMODEL: usize = 64;
pub const SIZEOF_DVERTEX: usize = 12;
pub const SIZEOF_DPLANE: usize = 20;
pub const SIZEOF_DNODE: usize = 24;
pub const SIZEOF_DCLIPNODE: usize = 8;
pub const SIZEOF_TEXINFO: usize = 40;
pub const SIZEOF_DEDGE: usize = 4;
pub const SIZEOF_DFACE: usize = 20;
pub const SIZEOF_DLEAF: usize = 28;
pub const SIZEOF_DMIPTEX: usize = 40;
pub const SIZEOF_MARKSURFACE: usize = 2;
pub const SIZEOF_SURFEDGE: usize = 4;

// =============================================================================
// Tests
// =============================================================================
