// bspfile.rs — BSP29 lump directory and per-lump record decoders
//
// `BspFile` borrows the raw file buffer. Each `load_*` method validates one lump and
// returns an owned array of records; nothing here links records to each other.

use rayon::prelude::*;

use crate::common::com_dprintf;
use crate::error::LoadError;
use crate::q_shared::Vec3;
use crate::qfiles::*;

// ============================================================
// BSP byte helpers
// ============================================================

#[inline]
pub(crate) fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[inline]
pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[inline]
pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

fn read_short3(data: &[u8], offset: usize) -> [i16; 3] {
    [
        read_i16_le(data, offset),
        read_i16_le(data, offset + 2),
        read_i16_le(data, offset + 4),
    ]
}

/// Default record count at which a lump is decoded in parallel.
pub const PARALLEL_LUMP_THRESHOLD: usize = 64;

// ============================================================
// Generic record decoding
// ============================================================

/// Splits `lump` into `stride`-byte records and decodes each with `decode`.
///
/// Fails if the lump is not a whole number of records or holds more than `max`. Large
/// lumps (`count >= parallel_threshold`) are decoded on the rayon pool; the output order
/// is the record order either way.
pub fn decode_records<T, F>(
    kind: LumpKind,
    lump: &[u8],
    stride: usize,
    max: usize,
    parallel_threshold: usize,
    decode: F,
) -> Result<Vec<T>, LoadError>
where
    T: Send,
    F: Fn(&[u8]) -> T + Sync + Send,
{
    if lump.len() % stride != 0 {
        return Err(LoadError::MalformedChunk { kind, size: lump.len(), record_size: stride });
    }
    let count = lump.len() / stride;
    if count > max {
        return Err(LoadError::TooManyRecords { kind, count, max });
    }

    com_dprintf(&format!("Mod_Load: {} {} records\n", count, kind));

    if count >= parallel_threshold {
        Ok(lump.par_chunks_exact(stride).map(|rec| decode(rec)).collect())
    } else {
        Ok(lump.chunks_exact(stride).map(decode).collect())
    }
}

// ============================================================
// Lump directory
// ============================================================

impl DHeader {
    /// Reads the header. Only the version is validated here; lump bounds are checked
    /// when a lump's bytes are requested.
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        if data.len() < HEADER_SIZE {
            return Err(LoadError::TruncatedHeader { len: data.len() });
        }

        let version = read_i32_le(data, 0);
        if version != BSPVERSION {
            return Err(LoadError::FormatVersionMismatch { found: version, expected: BSPVERSION });
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            let base = 4 + i * 8;
            lump.fileofs = read_i32_le(data, base);
            lump.filelen = read_i32_le(data, base + 4);
        }

        Ok(Self { version, lumps })
    }

    pub fn lump(&self, kind: LumpKind) -> Lump {
        self.lumps[kind.index()]
    }
}

/// A parsed lump directory over a borrowed file buffer.
pub struct BspFile<'a> {
    data: &'a [u8],
    header: DHeader,
    parallel_threshold: usize,
}

impl<'a> BspFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, LoadError> {
        Ok(Self { data, header: DHeader::parse(data)?, parallel_threshold: PARALLEL_LUMP_THRESHOLD })
    }

    /// Overrides the record count at which lumps are decoded in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    pub fn header(&self) -> &DHeader {
        &self.header
    }

    /// Borrows one lump's bytes. Descriptors with a negative field or reaching past the
    /// end of the buffer are rejected.
    pub fn lump_data(&self, kind: LumpKind) -> Result<&'a [u8], LoadError> {
        let lump = self.header.lump(kind);
        let out_of_bounds = || LoadError::LumpOutOfBounds {
            kind,
            fileofs: lump.fileofs,
            filelen: lump.filelen,
            buffer_len: self.data.len(),
        };

        let ofs = usize::try_from(lump.fileofs).map_err(|_| out_of_bounds())?;
        let len = usize::try_from(lump.filelen).map_err(|_| out_of_bounds())?;
        let end = ofs.checked_add(len).ok_or_else(out_of_bounds)?;
        self.data.get(ofs..end).ok_or_else(out_of_bounds)
    }

    fn records<T, F>(&self, kind: LumpKind, stride: usize, max: usize, decode: F) -> Result<Vec<T>, LoadError>
    where
        T: Send,
        F: Fn(&[u8]) -> T + Sync + Send,
    {
        let lump = self.lump_data(kind)?;
        decode_records(kind, lump, stride, max, self.parallel_threshold, decode)
    }

    // ============================================================
    // Lump loaders
    // ============================================================

    pub fn load_vertexes(&self) -> Result<Vec<Vec3>, LoadError> {
        self.records(LumpKind::Vertexes, SIZEOF_DVERTEX, MAX_MAP_VERTS, |rec| read_vec3(rec, 0))
    }

    pub fn load_edges(&self) -> Result<Vec<DEdge>, LoadError> {
        self.records(LumpKind::Edges, SIZEOF_DEDGE, MAX_MAP_EDGES, |rec| DEdge {
            v: [read_u16_le(rec, 0), read_u16_le(rec, 2)],
        })
    }

    /// The edge table: signed edge indices, negative meaning the edge is walked backwards.
    pub fn load_surfedges(&self) -> Result<Vec<i32>, LoadError> {
        self.records(LumpKind::SurfEdges, SIZEOF_SURFEDGE, MAX_MAP_SURFEDGES, |rec| read_i32_le(rec, 0))
    }

    pub fn load_planes(&self) -> Result<Vec<DPlane>, LoadError> {
        self.records(LumpKind::Planes, SIZEOF_DPLANE, MAX_MAP_PLANES, |rec| DPlane {
            normal: read_vec3(rec, 0),
            dist: read_f32_le(rec, 12),
            plane_type: read_i32_le(rec, 16),
        })
    }

    pub fn load_nodes(&self) -> Result<Vec<DNode>, LoadError> {
        self.records(LumpKind::Nodes, SIZEOF_DNODE, MAX_MAP_NODES, |rec| DNode {
            planenum: read_i32_le(rec, 0),
            children: [read_i16_le(rec, 4), read_i16_le(rec, 6)],
            mins: read_short3(rec, 8),
            maxs: read_short3(rec, 14),
            firstface: read_u16_le(rec, 20),
            numfaces: read_u16_le(rec, 22),
        })
    }

    pub fn load_clipnodes(&self) -> Result<Vec<DClipNode>, LoadError> {
        self.records(LumpKind::ClipNodes, SIZEOF_DCLIPNODE, MAX_MAP_CLIPNODES, |rec| DClipNode {
            planenum: read_i32_le(rec, 0),
            children: [read_i16_le(rec, 4), read_i16_le(rec, 6)],
        })
    }

    pub fn load_leafs(&self) -> Result<Vec<DLeaf>, LoadError> {
        self.records(LumpKind::Leafs, SIZEOF_DLEAF, MAX_MAP_LEAFS, |rec| DLeaf {
            contents: read_i32_le(rec, 0),
            visofs: read_i32_le(rec, 4),
            mins: read_short3(rec, 8),
            maxs: read_short3(rec, 14),
            firstmarksurface: read_u16_le(rec, 20),
            nummarksurfaces: read_u16_le(rec, 22),
            ambient_level: [rec[24], rec[25], rec[26], rec[27]],
        })
    }

    /// The face table: leaves list their faces as a range into this array.
    pub fn load_marksurfaces(&self) -> Result<Vec<u16>, LoadError> {
        self.records(LumpKind::MarkSurfaces, SIZEOF_MARKSURFACE, MAX_MAP_MARKSURFACES, |rec| {
            read_u16_le(rec, 0)
        })
    }

    pub fn load_texinfo(&self) -> Result<Vec<TexInfo>, LoadError> {
        self.records(LumpKind::TexInfo, SIZEOF_TEXINFO, MAX_MAP_TEXINFO, |rec| {
            let mut vecs = [[0.0f32; 4]; 2];
            for (i, row) in vecs.iter_mut().enumerate() {
                for (j, v) in row.iter_mut().enumerate() {
                    *v = read_f32_le(rec, (i * 4 + j) * 4);
                }
            }
            TexInfo { vecs, miptex: read_i32_le(rec, 32), flags: read_i32_le(rec, 36) }
        })
    }

    pub fn load_faces(&self) -> Result<Vec<DFace>, LoadError> {
        self.records(LumpKind::Faces, SIZEOF_DFACE, MAX_MAP_FACES, |rec| DFace {
            planenum: read_i16_le(rec, 0),
            side: read_i16_le(rec, 2),
            firstedge: read_i32_le(rec, 4),
            numedges: read_i16_le(rec, 8),
            texinfo: read_i16_le(rec, 10),
            styles: [rec[12], rec[13], rec[14], rec[15]],
            lightofs: read_i32_le(rec, 16),
        })
    }

    pub fn load_submodels(&self) -> Result<Vec<DModel>, LoadError> {
        self.records(LumpKind::Models, SIZEOF_DMODEL, MAX_MAP_MODELS, |rec| DModel {
            mins: read_vec3(rec, 0),
            maxs: read_vec3(rec, 12),
            origin: read_vec3(rec, 24),
            headnode: [
                read_i32_le(rec, 36),
                read_i32_le(rec, 40),
                read_i32_le(rec, 44),
                read_i32_le(rec, 48),
            ],
            visleafs: read_i32_le(rec, 52),
            firstface: read_i32_le(rec, 56),
            numfaces: read_i32_le(rec, 60),
        })
    }

    /// Entity text, up to the first NUL.
    pub fn load_entity_string(&self) -> Result<String, LoadError> {
        let lump = self.lump_data(LumpKind::Entities)?;
        if lump.len() > MAX_MAP_ENTSTRING {
            return Err(LoadError::TooManyRecords {
                kind: LumpKind::Entities,
                count: lump.len(),
                max: MAX_MAP_ENTSTRING,
            });
        }
        let end = lump.iter().position(|&b| b == 0).unwrap_or(lump.len());
        Ok(String::from_utf8_lossy(&lump[..end]).into_owned())
    }

    pub fn load_lighting(&self) -> Result<Vec<u8>, LoadError> {
        self.blob(LumpKind::Lighting, MAX_MAP_LIGHTING)
    }

    pub fn load_visibility(&self) -> Result<Vec<u8>, LoadError> {
        self.blob(LumpKind::Visibility, MAX_MAP_VISIBILITY)
    }

    fn blob(&self, kind: LumpKind, max: usize) -> Result<Vec<u8>, LoadError> {
        let lump = self.lump_data(kind)?;
        if lump.len() > max {
            return Err(LoadError::TooManyRecords { kind, count: lump.len(), max });
        }
        com_dprintf(&format!("Mod_Load: {} bytes of {}\n", lump.len(), kind));
        Ok(lump.to_vec())
    }

    /// Decodes the texture directory. Slots the compiler left empty (offset -1) come
    /// back as `None` so texinfo indices stay valid.
    pub fn load_textures(&self) -> Result<Vec<Option<BspTexture>>, LoadError> {
        let kind = LumpKind::Textures;
        let lump = self.lump_data(kind)?;
        if lump.is_empty() {
            return Ok(Vec::new());
        }
        if lump.len() > MAX_MAP_MIPTEX {
            return Err(LoadError::TooManyRecords { kind, count: lump.len(), max: MAX_MAP_MIPTEX });
        }
        if lump.len() < 4 {
            return Err(LoadError::bad_data(kind, "missing texture count"));
        }

        let count = read_i32_le(lump, 0);
        let count = usize::try_from(count)
            .map_err(|_| LoadError::bad_data(kind, format!("negative texture count {}", count)))?;
        if count > MAX_MAP_TEXTURES {
            return Err(LoadError::TooManyRecords { kind, count, max: MAX_MAP_TEXTURES });
        }
        if 4 + count * 4 > lump.len() {
            return Err(LoadError::bad_data(kind, "texture directory runs past the lump"));
        }

        let mut textures = Vec::with_capacity(count);
        for i in 0..count {
            let ofs = read_i32_le(lump, 4 + i * 4);
            if ofs == MIPTEX_ABSENT {
                com_dprintf(&format!("Mod_LoadTextures: texture {} is absent\n", i));
                textures.push(None);
                continue;
            }
            let ofs = usize::try_from(ofs)
                .map_err(|_| LoadError::bad_data(kind, format!("texture {} has offset {}", i, ofs)))?;
            textures.push(Some(BspTexture::decode(lump, ofs)?));
        }

        Ok(textures)
    }
}

// ============================================================
// Textures
// ============================================================

/// A mip texture from the map's texture lump. Pixels are palette indices, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BspTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Full, half, quarter and eighth size levels. Empty when the file stores no pixels.
    pub mipmaps: [Vec<u8>; MIPLEVELS],
}

impl BspTexture {
    fn decode(lump: &[u8], ofs: usize) -> Result<Self, LoadError> {
        let kind = LumpKind::Textures;
        let rec = ofs
            .checked_add(SIZEOF_DMIPTEX)
            .and_then(|end| lump.get(ofs..end))
            .ok_or_else(|| LoadError::bad_data(kind, format!("texture header at {} runs past the lump", ofs)))?;

        let name_len = rec[..MIPTEX_NAME_LEN].iter().position(|&b| b == 0).unwrap_or(MIPTEX_NAME_LEN);
        let name = String::from_utf8_lossy(&rec[..name_len]).into_owned();
        let width = read_u32_le(rec, 16);
        let height = read_u32_le(rec, 20);

        if width % MIPTEX_ALIGN != 0 || height % MIPTEX_ALIGN != 0 {
            return Err(LoadError::IllegalTextureDimensions { name, width, height });
        }

        let mut mipmaps: [Vec<u8>; MIPLEVELS] = Default::default();
        for (level, mip) in mipmaps.iter_mut().enumerate() {
            let mip_ofs = read_u32_le(rec, 24 + level * 4) as usize;
            if mip_ofs == 0 {
                continue;
            }
            let size = ((width >> level) as usize) * ((height >> level) as usize);
            let start = ofs + mip_ofs;
            let pixels = start
                .checked_add(size)
                .and_then(|end| lump.get(start..end))
                .ok_or_else(|| {
                    LoadError::bad_data(kind, format!("mip level {} of {} runs past the lump", level, name))
                })?;
            *mip = pixels.to_vec();
        }

        Ok(Self { name, width, height, mipmaps })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mipmap(&self, level: usize) -> &[u8] {
        &self.mipmaps[level]
    }

    /// Animated textures are stored as separate frames named `+0name`, `+1name`, ...
    pub fn is_animated(&self) -> bool {
        self.name.starts_with('+')
    }

    pub fn is_sky(&self) -> bool {
        self.name.starts_with("sky")
    }

    /// Water, slime and lava textures are named with a leading `*`.
    pub fn is_turbulent(&self) -> bool {
        self.name.starts_with('*')
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspwrite::BspWriter;

    fn file_with(kind: LumpKind, bytes: Vec<u8>) -> Vec<u8> {
        let mut w = BspWriter::new();
        w.set_lump(kind, bytes);
        w.finish()
    }

    // =========================================================================
    // Header
    // =========================================================================

    #[test]
    fn test_byte_readers() {
        let data: Vec<u8> = vec![0x01, 0x00, 0x00, 0x00, 0xFF, 0x7F, 0xFF, 0xFF];
        assert_eq!(read_i32_le(&data, 0), 1);
        assert_eq!(read_u16_le(&data, 4), 0x7FFF);
        assert_eq!(read_i16_le(&data, 4), 0x7FFF);
        assert_eq!(read_i16_le(&data, 6), -1);
        assert_eq!(read_f32_le(&1.5f32.to_le_bytes(), 0), 1.5);
    }

    #[test]
    fn test_header_truncated() {
        let err = DHeader::parse(&[0u8; 10]).unwrap_err();
        assert_eq!(err, LoadError::TruncatedHeader { len: 10 });
    }

    #[test]
    fn test_header_wrong_version() {
        let mut data = BspWriter::new().finish();
        data[..4].copy_from_slice(&38i32.to_le_bytes());
        let err = DHeader::parse(&data).unwrap_err();
        assert_eq!(err, LoadError::FormatVersionMismatch { found: 38, expected: 29 });
    }

    #[test]
    fn test_lump_slices_are_views() {
        let data = file_with(LumpKind::Lighting, vec![1, 2, 3]);
        let bsp = BspFile::parse(&data).unwrap();
        let lump = bsp.header().lump(LumpKind::Lighting);
        let slice = bsp.lump_data(LumpKind::Lighting).unwrap();
        assert_eq!(slice, &[1, 2, 3]);
        assert_eq!(slice.as_ptr(), data[lump.fileofs as usize..].as_ptr());
    }

    #[test]
    fn test_lump_out_of_bounds() {
        let mut data = file_with(LumpKind::Vertexes, vec![0u8; 12]);
        // point the vertex lump past the end of the file
        let base = 4 + LUMP_VERTEXES * 8;
        let len = data.len() as i32;
        data[base..base + 4].copy_from_slice(&len.to_le_bytes());
        let bsp = BspFile::parse(&data).unwrap();
        assert!(matches!(
            bsp.load_vertexes(),
            Err(LoadError::LumpOutOfBounds { kind: LumpKind::Vertexes, .. })
        ));
    }

    #[test]
    fn test_lump_negative_length() {
        let mut data = BspWriter::new().finish();
        let base = 4 + LUMP_PLANES * 8;
        data[base + 4..base + 8].copy_from_slice(&(-20i32).to_le_bytes());
        let bsp = BspFile::parse(&data).unwrap();
        assert!(matches!(bsp.load_planes(), Err(LoadError::LumpOutOfBounds { .. })));
    }

    // =========================================================================
    // Record decoding
    // =========================================================================

    #[test]
    fn test_record_count_matches_lump_size() {
        for count in [0usize, 1, 7, 63, 64, 65, 200] {
            let lump = vec![0u8; count * SIZEOF_DNODE];
            let nodes = decode_records(LumpKind::Nodes, &lump, SIZEOF_DNODE, MAX_MAP_NODES, 64, |r| r.len())
                .unwrap();
            assert_eq!(nodes.len(), count);
            assert!(nodes.iter().all(|&len| len == SIZEOF_DNODE));
        }
    }

    #[test]
    fn test_funny_lump_size() {
        for size in [1usize, 23, 25, 47] {
            let lump = vec![0u8; size];
            let err = decode_records(LumpKind::Nodes, &lump, SIZEOF_DNODE, MAX_MAP_NODES, 64, |_| ())
                .unwrap_err();
            assert_eq!(
                err,
                LoadError::MalformedChunk { kind: LumpKind::Nodes, size, record_size: SIZEOF_DNODE }
            );
        }
    }

    #[test]
    fn test_too_many_records() {
        let lump = vec![0u8; 5 * SIZEOF_DEDGE];
        let err = decode_records(LumpKind::Edges, &lump, SIZEOF_DEDGE, 4, 64, |_| ()).unwrap_err();
        assert_eq!(err, LoadError::TooManyRecords { kind: LumpKind::Edges, count: 5, max: 4 });
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let lump: Vec<u8> = (0..300u32).flat_map(|i| (i as i32).to_le_bytes()).collect();
        let seq = decode_records(LumpKind::SurfEdges, &lump, 4, usize::MAX, usize::MAX, |r| read_i32_le(r, 0))
            .unwrap();
        let par = decode_records(LumpKind::SurfEdges, &lump, 4, usize::MAX, 1, |r| read_i32_le(r, 0)).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq[299], 299);
    }

    #[test]
    fn test_load_nodes_fields() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&7i32.to_le_bytes());
        rec.extend_from_slice(&3i16.to_le_bytes());
        rec.extend_from_slice(&(-1i16).to_le_bytes());
        for v in [-16i16, -32, -48, 16, 32, 48] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        rec.extend_from_slice(&5u16.to_le_bytes());
        rec.extend_from_slice(&2u16.to_le_bytes());
        assert_eq!(rec.len(), SIZEOF_DNODE);

        let data = file_with(LumpKind::Nodes, rec);
        let nodes = BspFile::parse(&data).unwrap().load_nodes().unwrap();
        assert_eq!(
            nodes,
            vec![DNode {
                planenum: 7,
                children: [3, -1],
                mins: [-16, -32, -48],
                maxs: [16, 32, 48],
                firstface: 5,
                numfaces: 2,
            }]
        );
    }

    #[test]
    fn test_load_leafs_fields() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&CONTENTS_WATER.to_le_bytes());
        rec.extend_from_slice(&(-1i32).to_le_bytes());
        for v in [0i16, 0, 0, 64, 64, 64] {
            rec.extend_from_slice(&v.to_le_bytes());
        }
        rec.extend_from_slice(&10u16.to_le_bytes());
        rec.extend_from_slice(&4u16.to_le_bytes());
        rec.extend_from_slice(&[255, 0, 12, 0]);

        let data = file_with(LumpKind::Leafs, rec);
        let leafs = BspFile::parse(&data).unwrap().load_leafs().unwrap();
        assert_eq!(leafs.len(), 1);
        assert_eq!(leafs[0].contents, CONTENTS_WATER);
        assert_eq!(leafs[0].visofs, -1);
        assert_eq!(leafs[0].maxs, [64, 64, 64]);
        assert_eq!(leafs[0].firstmarksurface, 10);
        assert_eq!(leafs[0].nummarksurfaces, 4);
        assert_eq!(leafs[0].ambient_level[AMBIENT_WATER], 255);
        assert_eq!(leafs[0].ambient_level[AMBIENT_SLIME], 12);
    }

    #[test]
    fn test_load_planes_size_mismatch() {
        let data = file_with(LumpKind::Planes, vec![0u8; SIZEOF_DPLANE + 3]);
        let err = BspFile::parse(&data).unwrap().load_planes().unwrap_err();
        assert!(matches!(err, LoadError::MalformedChunk { kind: LumpKind::Planes, .. }));
    }

    #[test]
    fn test_load_models_size_mismatch() {
        let data = file_with(LumpKind::Models, vec![0u8; SIZEOF_DMODEL - 4]);
        let err = BspFile::parse(&data).unwrap().load_submodels().unwrap_err();
        assert!(matches!(err, LoadError::MalformedChunk { kind: LumpKind::Models, .. }));
    }

    #[test]
    fn test_entity_string_stops_at_nul() {
        let data = file_with(LumpKind::Entities, b"{\n\"classname\" \"worldspawn\"\n}\n\0junk".to_vec());
        let ents = BspFile::parse(&data).unwrap().load_entity_string().unwrap();
        assert_eq!(ents, "{\n\"classname\" \"worldspawn\"\n}\n");
    }

    // =========================================================================
    // Texture directory
    // =========================================================================

    fn miptex(name: &str, width: u32, height: u32) -> Vec<u8> {
        let mut rec = vec![0u8; SIZEOF_DMIPTEX];
        rec[..name.len()].copy_from_slice(name.as_bytes());
        rec[16..20].copy_from_slice(&width.to_le_bytes());
        rec[20..24].copy_from_slice(&height.to_le_bytes());
        // pixels follow the header, one level after another
        let mut ofs = SIZEOF_DMIPTEX as u32;
        for level in 0..MIPLEVELS {
            rec[24 + level * 4..28 + level * 4].copy_from_slice(&ofs.to_le_bytes());
            ofs += (width >> level) * (height >> level);
        }
        for level in 0..MIPLEVELS {
            let size = ((width >> level) * (height >> level)) as usize;
            rec.extend(std::iter::repeat(level as u8).take(size));
        }
        rec
    }

    fn texture_lump(entries: &[Option<Vec<u8>>]) -> Vec<u8> {
        let mut dir = Vec::new();
        let mut body = Vec::new();
        let header_len = 4 + entries.len() * 4;
        dir.extend_from_slice(&(entries.len() as i32).to_le_bytes());
        for entry in entries {
            match entry {
                Some(rec) => {
                    dir.extend_from_slice(&((header_len + body.len()) as i32).to_le_bytes());
                    body.extend_from_slice(rec);
                }
                None => dir.extend_from_slice(&MIPTEX_ABSENT.to_le_bytes()),
            }
        }
        dir.extend_from_slice(&body);
        dir
    }

    #[test]
    fn test_texture_directory_skips_absent_slot() {
        let lump = texture_lump(&[
            Some(miptex("wall1", 16, 16)),
            None,
            Some(miptex("*water", 32, 16)),
        ]);
        let data = file_with(LumpKind::Textures, lump);
        let textures = BspFile::parse(&data).unwrap().load_textures().unwrap();

        assert_eq!(textures.len(), 3);
        assert_eq!(textures.iter().flatten().count(), 2);
        assert!(textures[1].is_none());

        let water = textures[2].as_ref().unwrap();
        assert_eq!(water.name, "*water");
        assert_eq!(water.dimensions(), (32, 16));
        assert!(water.is_turbulent());
        assert_eq!(water.mipmap(0).len(), 512);
        assert_eq!(water.mipmap(3).len(), 8);
        assert!(water.mipmap(1).iter().all(|&p| p == 1));
    }

    #[test]
    fn test_texture_illegal_dimensions() {
        let lump = texture_lump(&[Some(miptex("bad", 24, 16))]);
        let data = file_with(LumpKind::Textures, lump);
        let err = BspFile::parse(&data).unwrap().load_textures().unwrap_err();
        assert_eq!(
            err,
            LoadError::IllegalTextureDimensions { name: "bad".into(), width: 24, height: 16 }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_texture_offset_past_lump() {
        let mut lump = texture_lump(&[Some(miptex("ok", 16, 16))]);
        lump[4..8].copy_from_slice(&10_000i32.to_le_bytes());
        let data = file_with(LumpKind::Textures, lump);
        let err = BspFile::parse(&data).unwrap().load_textures().unwrap_err();
        assert!(matches!(err, LoadError::BadLumpData { kind: LumpKind::Textures, .. }));
    }

    #[test]
    fn test_texture_lump_over_limit() {
        let data = file_with(LumpKind::Textures, vec![0u8; MAX_MAP_MIPTEX + 4]);
        let err = BspFile::parse(&data).unwrap().load_textures().unwrap_err();
        assert!(matches!(
            err,
            LoadError::TooManyRecords { kind: LumpKind::Textures, count, max: MAX_MAP_MIPTEX } if count == MAX_MAP_MIPTEX + 4
        ));
    }

    #[test]
    fn test_empty_texture_lump() {
        let data = BspWriter::new().finish();
        assert!(BspFile::parse(&data).unwrap().load_textures().unwrap().is_empty());
    }
}
