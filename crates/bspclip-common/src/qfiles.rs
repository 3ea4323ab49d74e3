// qfiles.rs — parsed level data handed to the collision system
//
// The level parser lives elsewhere; these records mirror the on-disk lumps
// after decoding. Indices are kept signed so invalid references can be
// reported instead of wrapping.

use crate::q_shared::Vec3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DPlane {
    pub normal: Vec3,
    pub dist: f32,
}

#[derive(Debug, Clone, Default)]
pub struct DShader {
    pub shader: String,
    pub surface_flags: i32,
    pub content_flags: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DNode {
    pub plane_num: i32,
    pub children: [i32; 2], // negative numbers are -(leafs+1), not nodes
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DLeaf {
    pub cluster: i32, // -1 = opaque cluster
    pub area: i32,
    pub first_leaf_surface: i32,
    pub num_leaf_surfaces: i32,
    pub first_leaf_brush: i32,
    pub num_leaf_brushes: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DBrushSide {
    pub plane_num: i32, // positive plane side faces out of the leaf
    pub shader_num: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DBrush {
    pub first_side: i32,
    pub num_sides: i32,
    pub shader_num: i32, // the shader that determines the contents flags
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapSurfaceType {
    #[default]
    Bad,
    Planar,
    Patch,
    TriangleSoup,
    Flare,
}

impl MapSurfaceType {
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => MapSurfaceType::Planar,
            2 => MapSurfaceType::Patch,
            3 => MapSurfaceType::TriangleSoup,
            4 => MapSurfaceType::Flare,
            _ => MapSurfaceType::Bad,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DrawVert {
    pub xyz: Vec3,
    pub st: [f32; 2],
    pub lightmap: [f32; 2],
    pub normal: Vec3,
    pub color: [u8; 4],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DSurface {
    pub shader_num: i32,
    pub surface_type: MapSurfaceType,
    pub first_vert: i32,
    pub num_verts: i32,
    pub patch_width: i32,
    pub patch_height: i32,
}

/// Every lump the collision system reads, already decoded.
#[derive(Debug, Clone, Default)]
pub struct BspData {
    pub name: String,
    pub shaders: Vec<DShader>,
    pub planes: Vec<DPlane>,
    pub nodes: Vec<DNode>,
    pub leafs: Vec<DLeaf>,
    pub leaf_surfaces: Vec<i32>,
    pub leaf_brushes: Vec<i32>,
    pub brushes: Vec<DBrush>,
    pub brush_sides: Vec<DBrushSide>,
    pub draw_verts: Vec<DrawVert>,
    pub surfaces: Vec<DSurface>,
}

impl BspData {
    /// Appends the six axial planes and sides of an axis-aligned box brush,
    /// in the `-X, +X, -Y, +Y, -Z, +Z` order the loader expects, and
    /// returns the new brush index.
    pub fn push_box_brush(&mut self, mins: &Vec3, maxs: &Vec3, shader_num: i32) -> i32 {
        let first_side = self.brush_sides.len() as i32;
        for axis in 0..3 {
            for (sign, dist) in [(-1.0f32, -mins[axis]), (1.0, maxs[axis])] {
                let mut normal = [0.0; 3];
                normal[axis] = sign;
                self.brush_sides.push(DBrushSide {
                    plane_num: self.planes.len() as i32,
                    shader_num,
                });
                self.planes.push(DPlane { normal, dist });
            }
        }
        self.brushes.push(DBrush {
            first_side,
            num_sides: 6,
            shader_num,
        });
        self.brushes.len() as i32 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_type_from_i32() {
        assert_eq!(MapSurfaceType::from_i32(2), MapSurfaceType::Patch);
        assert_eq!(MapSurfaceType::from_i32(1), MapSurfaceType::Planar);
        assert_eq!(MapSurfaceType::from_i32(42), MapSurfaceType::Bad);
    }

    #[test]
    fn test_push_box_brush_order() {
        let mut bsp = BspData::default();
        let b = bsp.push_box_brush(&[-1.0, -2.0, -3.0], &[4.0, 5.0, 6.0], 0);
        assert_eq!(b, 0);
        assert_eq!(bsp.planes.len(), 6);
        assert_eq!(bsp.planes[0].normal, [-1.0, 0.0, 0.0]);
        assert_eq!(bsp.planes[0].dist, 1.0);
        assert_eq!(bsp.planes[5].normal, [0.0, 0.0, 1.0]);
        assert_eq!(bsp.planes[5].dist, 6.0);
    }
}
