// bspwrite.rs — BSP29 encoder
//
// Lays out the header followed by every lump in directory order, each padded to a
// 4 byte boundary. Typed helpers write records with the same field layout the decoders
// in bspfile.rs read.

use crate::bspfile::BspTexture;
use crate::q_shared::Vec3;
use crate::qfiles::*;

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_vec3(out: &mut Vec<u8>, v: &[f32; 3]) {
    v.iter().for_each(|&f| put_f32(out, f));
}

fn put_short3(out: &mut Vec<u8>, v: &[i16; 3]) {
    v.iter().for_each(|&s| put_i16(out, s));
}

/// Builds a BSP29 file one lump at a time. Lumps never set are written empty.
#[derive(Debug, Clone, Default)]
pub struct BspWriter {
    lumps: [Vec<u8>; HEADER_LUMPS],
}

impl BspWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a lump with raw bytes.
    pub fn set_lump(&mut self, kind: LumpKind, bytes: Vec<u8>) -> &mut Self {
        self.lumps[kind.index()] = bytes;
        self
    }

    fn records<T>(&mut self, kind: LumpKind, records: &[T], stride: usize, encode: impl Fn(&T, &mut Vec<u8>)) -> &mut Self {
        let mut out = Vec::with_capacity(records.len() * stride);
        for rec in records {
            encode(rec, &mut out);
        }
        debug_assert_eq!(out.len(), records.len() * stride);
        self.set_lump(kind, out)
    }

    pub fn entities(&mut self, text: &str) -> &mut Self {
        let mut out = text.as_bytes().to_vec();
        if !out.is_empty() {
            out.push(0);
        }
        self.set_lump(LumpKind::Entities, out)
    }

    pub fn planes(&mut self, planes: &[DPlane]) -> &mut Self {
        self.records(LumpKind::Planes, planes, SIZEOF_DPLANE, |p, out| {
            put_vec3(out, &p.normal);
            put_f32(out, p.dist);
            put_i32(out, p.plane_type);
        })
    }

    pub fn textures(&mut self, textures: &[Option<BspTexture>]) -> &mut Self {
        let mut dir = Vec::new();
        let mut body = Vec::new();
        let header_len = 4 + textures.len() * 4;
        put_i32(&mut dir, textures.len() as i32);

        for slot in textures {
            let Some(tex) = slot else {
                put_i32(&mut dir, MIPTEX_ABSENT);
                continue;
            };
            put_i32(&mut dir, (header_len + body.len()) as i32);

            let mut name = [0u8; MIPTEX_NAME_LEN];
            let len = tex.name.len().min(MIPTEX_NAME_LEN);
            name[..len].copy_from_slice(&tex.name.as_bytes()[..len]);
            body.extend_from_slice(&name);
            put_u32(&mut body, tex.width);
            put_u32(&mut body, tex.height);

            let mut ofs = SIZEOF_DMIPTEX as u32;
            for mip in &tex.mipmaps {
                if mip.is_empty() {
                    put_u32(&mut body, 0);
                } else {
                    put_u32(&mut body, ofs);
                    ofs += mip.len() as u32;
                }
            }
            for mip in &tex.mipmaps {
                body.extend_from_slice(mip);
            }
        }

        dir.extend_from_slice(&body);
        if textures.is_empty() {
            dir.clear();
        }
        self.set_lump(LumpKind::Textures, dir)
    }

    pub fn vertexes(&mut self, vertexes: &[Vec3]) -> &mut Self {
        self.records(LumpKind::Vertexes, vertexes, SIZEOF_DVERTEX, |v, out| put_vec3(out, v))
    }

    pub fn visibility(&mut self, vis: &[u8]) -> &mut Self {
        self.set_lump(LumpKind::Visibility, vis.to_vec())
    }

    pub fn nodes(&mut self, nodes: &[DNode]) -> &mut Self {
        self.records(LumpKind::Nodes, nodes, SIZEOF_DNODE, |n, out| {
            put_i32(out, n.planenum);
            put_i16(out, n.children[0]);
            put_i16(out, n.children[1]);
            put_short3(out, &n.mins);
            put_short3(out, &n.maxs);
            put_u16(out, n.firstface);
            put_u16(out, n.numfaces);
        })
    }

    pub fn texinfo(&mut self, texinfo: &[TexInfo]) -> &mut Self {
        self.records(LumpKind::TexInfo, texinfo, SIZEOF_TEXINFO, |t, out| {
            t.vecs.iter().flatten().for_each(|&f| put_f32(out, f));
            put_i32(out, t.miptex);
            put_i32(out, t.flags);
        })
    }

    pub fn faces(&mut self, faces: &[DFace]) -> &mut Self {
        self.records(LumpKind::Faces, faces, SIZEOF_DFACE, |f, out| {
            put_i16(out, f.planenum);
            put_i16(out, f.side);
            put_i32(out, f.firstedge);
            put_i16(out, f.numedges);
            put_i16(out, f.texinfo);
            out.extend_from_slice(&f.styles);
            put_i32(out, f.lightofs);
        })
    }

    pub fn lighting(&mut self, lighting: &[u8]) -> &mut Self {
        self.set_lump(LumpKind::Lighting, lighting.to_vec())
    }

    pub fn clipnodes(&mut self, clipnodes: &[DClipNode]) -> &mut Self {
        self.records(LumpKind::ClipNodes, clipnodes, SIZEOF_DCLIPNODE, |c, out| {
            put_i32(out, c.planenum);
            put_i16(out, c.children[0]);
            put_i16(out, c.children[1]);
        })
    }

    pub fn leafs(&mut self, leafs: &[DLeaf]) -> &mut Self {
        self.records(LumpKind::Leafs, leafs, SIZEOF_DLEAF, |l, out| {
            put_i32(out, l.contents);
            put_i32(out, l.visofs);
            put_short3(out, &l.mins);
            put_short3(out, &l.maxs);
            put_u16(out, l.firstmarksurface);
            put_u16(out, l.nummarksurfaces);
            out.extend_from_slice(&l.ambient_level);
        })
    }

    pub fn marksurfaces(&mut self, marksurfaces: &[u16]) -> &mut Self {
        self.records(LumpKind::MarkSurfaces, marksurfaces, SIZEOF_MARKSURFACE, |&m, out| put_u16(out, m))
    }

    pub fn edges(&mut self, edges: &[DEdge]) -> &mut Self {
        self.records(LumpKind::Edges, edges, SIZEOF_DEDGE, |e, out| {
            put_u16(out, e.v[0]);
            put_u16(out, e.v[1]);
        })
    }

    pub fn surfedges(&mut self, surfedges: &[i32]) -> &mut Self {
        self.records(LumpKind::SurfEdges, surfedges, SIZEOF_SURFEDGE, |&s, out| put_i32(out, s))
    }

    pub fn models(&mut self, models: &[DModel]) -> &mut Self {
        self.records(LumpKind::Models, models, SIZEOF_DMODEL, |m, out| {
            put_vec3(out, &m.mins);
            put_vec3(out, &m.maxs);
            put_vec3(out, &m.origin);
            m.headnode.iter().for_each(|&h| put_i32(out, h));
            put_i32(out, m.visleafs);
            put_i32(out, m.firstface);
            put_i32(out, m.numfaces);
        })
    }

    /// Lays out the header and lumps into one buffer.
    pub fn finish(&self) -> Vec<u8> {
        let total: usize = self.lumps.iter().map(|l| (l.len() + 3) & !3).sum();
        let mut out = Vec::with_capacity(HEADER_SIZE + total);

        put_i32(&mut out, BSPVERSION);
        let mut ofs = HEADER_SIZE;
        for lump in &self.lumps {
            put_i32(&mut out, ofs as i32);
            put_i32(&mut out, lump.len() as i32);
            ofs += (lump.len() + 3) & !3;
        }

        for lump in &self.lumps {
            out.extend_from_slice(lump);
            out.resize((out.len() + 3) & !3, 0);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspfile::{read_i32_le, BspFile};

    #[test]
    fn test_empty_file_layout() {
        let data = BspWriter::new().finish();
        assert_eq!(data.len(), HEADER_SIZE);
        let header = DHeader::parse(&data).unwrap();
        assert_eq!(header.version, BSPVERSION);
        for kind in LumpKind::ALL {
            assert_eq!(header.lump(kind), Lump { fileofs: HEADER_SIZE as i32, filelen: 0 });
        }
    }

    #[test]
    fn test_lumps_are_aligned() {
        let mut w = BspWriter::new();
        w.entities("{ }").lighting(&[1, 2, 3, 4, 5]).visibility(&[9]);
        let data = w.finish();
        let header = DHeader::parse(&data).unwrap();
        for kind in LumpKind::ALL {
            assert_eq!(header.lump(kind).fileofs % 4, 0, "{} lump misaligned", kind);
        }
        assert_eq!(data.len() % 4, 0);
        assert_eq!(header.lump(LumpKind::Entities).filelen, 4);
    }

    #[test]
    fn test_records_decode_back() {
        let faces = vec![DFace {
            planenum: 3,
            side: 1,
            firstedge: 100,
            numedges: 4,
            texinfo: 2,
            styles: [0, 255, 255, 255],
            lightofs: -1,
        }];
        let texinfo = vec![TexInfo { vecs: [[1.0, 0.0, 0.0, 8.0], [0.0, -1.0, 0.0, 0.0]], miptex: 1, flags: TEX_SPECIAL }];
        let models = vec![DModel {
            mins: [-64.0; 3],
            maxs: [64.0; 3],
            origin: [0.0; 3],
            headnode: [0, 0, 5, 0],
            visleafs: 12,
            firstface: 0,
            numfaces: 1,
        }];

        let mut w = BspWriter::new();
        w.faces(&faces).texinfo(&texinfo).models(&models).surfedges(&[1, -2, 3]).marksurfaces(&[0, 7]);
        let data = w.finish();
        let bsp = BspFile::parse(&data).unwrap();

        assert_eq!(bsp.load_faces().unwrap(), faces);
        assert_eq!(bsp.load_texinfo().unwrap(), texinfo);
        assert_eq!(bsp.load_submodels().unwrap(), models);
        assert_eq!(bsp.load_surfedges().unwrap(), vec![1, -2, 3]);
        assert_eq!(bsp.load_marksurfaces().unwrap(), vec![0, 7]);
    }

    #[test]
    fn test_texture_directory_layout() {
        let tex = BspTexture {
            name: "sky4".into(),
            width: 16,
            height: 16,
            mipmaps: [vec![1; 256], vec![2; 64], vec![3; 16], vec![4; 4]],
        };
        let mut w = BspWriter::new();
        w.textures(&[None, Some(tex.clone())]);
        let data = w.finish();
        let bsp = BspFile::parse(&data).unwrap();

        let lump = bsp.lump_data(LumpKind::Textures).unwrap();
        assert_eq!(read_i32_le(lump, 0), 2);
        assert_eq!(read_i32_le(lump, 4), MIPTEX_ABSENT);
        assert_eq!(read_i32_le(lump, 8), 12);

        let textures = bsp.load_textures().unwrap();
        assert_eq!(textures, vec![None, Some(tex)]);
        assert!(textures[1].as_ref().unwrap().is_sky());
    }
}
