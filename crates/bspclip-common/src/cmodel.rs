// cmodel.rs — collision world built from parsed level data

use crate::common::{com_dprintf, com_error, com_printf, com_warning};
use crate::cvar::{cvar_get, cvar_init, with_cvar_ctx, CvarContext, CvarFlags};
use crate::patch::{generate_patch_collide, PatchCollide};
use crate::q_shared::{
    box_on_plane_side, dot_product, CPlane, Trace, Vec3, ERR_FATAL, MAX_MAP_BOUNDS,
};
use crate::qfiles::{BspData, MapSurfaceType};

use parking_lot::RwLock;
use rayon::prelude::*;

// ============================================================
// Runtime structures
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct CNode {
    pub plane_num: usize,
    pub children: [i32; 2], // negative numbers are leafs
}

#[derive(Debug, Clone, Default)]
pub struct CLeaf {
    pub cluster: i32,
    pub area: i32,
    pub first_leaf_brush: usize,
    pub num_leaf_brushes: usize,
    pub first_leaf_surface: usize,
    pub num_leaf_surfaces: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CBrushSide {
    pub plane_num: usize,
    pub shader_num: usize,
    pub surface_flags: i32,
}

#[derive(Debug, Clone)]
pub struct CBrush {
    pub shader_num: usize, // the shader that determined the contents
    pub contents: i32,
    pub bounds: [Vec3; 2],
    /// The first six sides are the axial planes, so `bounds` is exact.
    pub axial_bounds: bool,
    pub first_side: usize,
    pub num_sides: usize,
}

impl Default for CBrush {
    fn default() -> Self {
        Self {
            shader_num: 0,
            contents: 0,
            bounds: [[-MAX_MAP_BOUNDS; 3], [MAX_MAP_BOUNDS; 3]],
            axial_bounds: false,
            first_side: 0,
            num_sides: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CPatch {
    pub surface_num: usize,
    pub surface_flags: i32,
    pub contents: i32,
    pub pc: PatchCollide,
}

/// Cvar-driven switches, snapshotted so queries never touch the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionConfig {
    /// `cm_nocurves`: ignore patches entirely.
    pub no_curves: bool,
    /// `cm_playercurveclip`: let point traces collide with patches.
    pub player_curve_clip: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            no_curves: false,
            player_curve_clip: true,
        }
    }
}

impl CollisionConfig {
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| cvars.find_var(name).map_or(default, |v| v.value != 0.0);
        Self {
            no_curves: flag("cm_nocurves", defaults.no_curves),
            player_curve_clip: flag("cm_playercurveclip", defaults.player_curve_clip),
        }
    }
}

/// Registers the collision cvars with the global registry.
pub fn cmodel_register_cvars() {
    cvar_init();
    cvar_get("developer", "0", CvarFlags::empty());
    cvar_get("cm_nocurves", "0", CvarFlags::empty());
    cvar_get("cm_playercurveclip", "1", CvarFlags::ARCHIVE);
}

// ============================================================
// Collision model context
// ============================================================

/// Static collision data for one loaded level. Read-only while queries run.
#[derive(Debug, Clone, Default)]
pub struct CModelContext {
    pub name: String,
    pub planes: Vec<CPlane>,
    pub brush_sides: Vec<CBrushSide>,
    pub brushes: Vec<CBrush>,
    /// Indexed by draw surface; `None` for non-patch surfaces.
    pub patches: Vec<Option<CPatch>>,
    pub nodes: Vec<CNode>,
    pub leafs: Vec<CLeaf>,
    pub leaf_brushes: Vec<usize>,
    pub leaf_surfaces: Vec<usize>,
    pub config: CollisionConfig,
}

fn check_index(what: &str, owner: usize, index: i32, count: usize) -> usize {
    if index < 0 || index as usize >= count {
        com_error(
            ERR_FATAL,
            &format!("{} {}: reference {} out of range (0..{})", what, owner, index, count),
        );
    }
    index as usize
}

fn check_range(what: &str, owner: usize, first: i32, num: i32, count: usize) -> (usize, usize) {
    if first < 0 || num < 0 || first as usize + num as usize > count {
        com_error(
            ERR_FATAL,
            &format!("{} {}: range {}+{} exceeds {}", what, owner, first, num, count),
        );
    }
    (first as usize, num as usize)
}

impl CModelContext {
    const PARALLEL_LUMP_THRESHOLD: usize = 64;
    const PARALLEL_PATCH_THRESHOLD: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    /// True once a level with a tree has been loaded.
    pub fn is_loaded(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        let config = self.config;
        *self = Self::default();
        self.config = config;
    }

    /// Re-reads the collision cvars from the global registry.
    pub fn refresh_config(&mut self) {
        self.config = with_cvar_ctx(|c| CollisionConfig::from_cvars(c)).unwrap_or_default();
    }

    /// Builds the physics view of a parsed level, replacing any previous one.
    pub fn load_map(&mut self, bsp: &BspData) {
        self.clear();
        self.name = bsp.name.clone();
        self.refresh_config();

        self.generate_physics_plane_data(bsp);
        self.generate_physics_brush_side_data(bsp);
        self.generate_physics_brush_data(bsp);
        self.load_leaf_brushes(bsp);
        self.load_leaf_surfaces(bsp);
        self.load_leafs(bsp);
        self.load_nodes(bsp);
        self.generate_physics_patches(bsp);

        let num_patches = self.patches.iter().flatten().count();
        let num_facets: usize = self.patches.iter().flatten().map(|p| p.pc.facets.len()).sum();
        com_printf(&format!(
            "loaded collision for {}: {} planes, {} brushes, {} patches ({} facets)\n",
            if self.name.is_empty() { "<unnamed>" } else { self.name.as_str() },
            self.planes.len(),
            self.brushes.len(),
            num_patches,
            num_facets
        ));
    }

    // ============================================================
    // World data builder
    // ============================================================

    /// Copies the level planes, precomputing type and signbits.
    pub fn generate_physics_plane_data(&mut self, bsp: &BspData) {
        let count = bsp.planes.len();
        self.planes = if count >= Self::PARALLEL_LUMP_THRESHOLD {
            bsp.planes.par_iter().map(|p| CPlane::new(p.normal, p.dist)).collect()
        } else {
            bsp.planes.iter().map(|p| CPlane::new(p.normal, p.dist)).collect()
        };
    }

    /// Binds each side to its plane and pulls surface flags from its shader.
    pub fn generate_physics_brush_side_data(&mut self, bsp: &BspData) {
        let num_planes = self.planes.len();
        let num_shaders = bsp.shaders.len();
        let convert = |(i, side): (usize, &crate::qfiles::DBrushSide)| {
            let plane_num = check_index("brush side plane", i, side.plane_num, num_planes);
            let shader_num = check_index("brush side shader", i, side.shader_num, num_shaders);
            CBrushSide {
                plane_num,
                shader_num,
                surface_flags: bsp.shaders[shader_num].surface_flags,
            }
        };

        self.brush_sides = if bsp.brush_sides.len() >= Self::PARALLEL_LUMP_THRESHOLD {
            bsp.brush_sides.par_iter().enumerate().map(convert).collect()
        } else {
            bsp.brush_sides.iter().enumerate().map(convert).collect()
        };
    }

    /// Binds contents and precomputes bounds from the six leading axial sides.
    pub fn generate_physics_brush_data(&mut self, bsp: &BspData) {
        let num_sides = self.brush_sides.len();
        let num_shaders = bsp.shaders.len();
        let planes = &self.planes;
        let sides = &self.brush_sides;

        let convert = |(i, b): (usize, &crate::qfiles::DBrush)| {
            let shader_num = check_index("brush shader", i, b.shader_num, num_shaders);
            let (first_side, count) = check_range("brush sides", i, b.first_side, b.num_sides, num_sides);
            let mut brush = CBrush {
                shader_num,
                contents: bsp.shaders[shader_num].content_flags,
                first_side,
                num_sides: count,
                ..CBrush::default()
            };

            let side_planes: Vec<&CPlane> = sides[first_side..first_side + count]
                .iter()
                .map(|s| &planes[s.plane_num])
                .collect();
            match axial_bounds(&side_planes) {
                Some(bounds) => {
                    brush.bounds = bounds;
                    brush.axial_bounds = true;
                }
                None => com_warning(&format!(
                    "brush {} does not start with six axial sides, bounds left open\n",
                    i
                )),
            }
            brush
        };

        self.brushes = if bsp.brushes.len() >= Self::PARALLEL_LUMP_THRESHOLD {
            bsp.brushes.par_iter().enumerate().map(convert).collect()
        } else {
            bsp.brushes.iter().enumerate().map(convert).collect()
        };
    }

    /// Builds a `PatchCollide` for every patch surface; other surfaces get `None`.
    pub fn generate_physics_patches(&mut self, bsp: &BspData) {
        let num_verts = bsp.draw_verts.len();
        let num_shaders = bsp.shaders.len();

        let build = |(i, surf): (usize, &crate::qfiles::DSurface)| -> Option<CPatch> {
            if surf.surface_type != MapSurfaceType::Patch {
                return None;
            }
            let shader_num = check_index("patch shader", i, surf.shader_num, num_shaders);
            let width = surf.patch_width.max(0) as usize;
            let height = surf.patch_height.max(0) as usize;
            let (first, count) = check_range(
                "patch vertices",
                i,
                surf.first_vert,
                (width * height) as i32,
                num_verts,
            );
            let points: Vec<Vec3> = bsp.draw_verts[first..first + count].iter().map(|v| v.xyz).collect();

            let pc = generate_patch_collide(width, height, &points);
            com_dprintf(&format!(
                "patch {}: {}x{} -> {} planes, {} facets\n",
                i,
                width,
                height,
                pc.planes.len(),
                pc.facets.len()
            ));
            let shader = &bsp.shaders[shader_num];
            Some(CPatch {
                surface_num: i,
                surface_flags: shader.surface_flags,
                contents: shader.content_flags,
                pc,
            })
        };

        let num_patches = bsp
            .surfaces
            .iter()
            .filter(|s| s.surface_type == MapSurfaceType::Patch)
            .count();
        self.patches = if num_patches >= Self::PARALLEL_PATCH_THRESHOLD {
            bsp.surfaces.par_iter().enumerate().map(build).collect()
        } else {
            bsp.surfaces.iter().enumerate().map(build).collect()
        };
    }

    fn load_leaf_brushes(&mut self, bsp: &BspData) {
        let num_brushes = self.brushes.len();
        self.leaf_brushes = bsp
            .leaf_brushes
            .iter()
            .enumerate()
            .map(|(i, &b)| check_index("leaf brush", i, b, num_brushes))
            .collect();
    }

    fn load_leaf_surfaces(&mut self, bsp: &BspData) {
        let num_surfaces = bsp.surfaces.len();
        self.leaf_surfaces = bsp
            .leaf_surfaces
            .iter()
            .enumerate()
            .map(|(i, &s)| check_index("leaf surface", i, s, num_surfaces))
            .collect();
    }

    fn load_leafs(&mut self, bsp: &BspData) {
        let num_leaf_brushes = self.leaf_brushes.len();
        let num_leaf_surfaces = self.leaf_surfaces.len();
        self.leafs = bsp
            .leafs
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let (first_leaf_brush, num_brushes) =
                    check_range("leaf brushes", i, l.first_leaf_brush, l.num_leaf_brushes, num_leaf_brushes);
                let (first_leaf_surface, num_surfaces) = check_range(
                    "leaf surfaces",
                    i,
                    l.first_leaf_surface,
                    l.num_leaf_surfaces,
                    num_leaf_surfaces,
                );
                CLeaf {
                    cluster: l.cluster,
                    area: l.area,
                    first_leaf_brush,
                    num_leaf_brushes: num_brushes,
                    first_leaf_surface,
                    num_leaf_surfaces: num_surfaces,
                }
            })
            .collect();
    }

    fn load_nodes(&mut self, bsp: &BspData) {
        if !bsp.nodes.is_empty() && self.leafs.is_empty() {
            com_error(ERR_FATAL, "Map has no leafs");
        }
        let num_planes = self.planes.len();
        let num_nodes = bsp.nodes.len();
        let num_leafs = self.leafs.len();
        self.nodes = bsp
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let plane_num = check_index("node plane", i, n.plane_num, num_planes);
                for &child in &n.children {
                    if child >= 0 {
                        check_index("node child", i, child, num_nodes);
                    } else {
                        check_index("node leaf", i, -1 - child, num_leafs);
                    }
                }
                CNode {
                    plane_num,
                    children: n.children,
                }
            })
            .collect();
    }

    // ============================================================
    // World queries
    // ============================================================

    pub fn leaf_brushes(&self, leaf: &CLeaf) -> &[usize] {
        &self.leaf_brushes[leaf.first_leaf_brush..leaf.first_leaf_brush + leaf.num_leaf_brushes]
    }

    pub fn leaf_surfaces(&self, leaf: &CLeaf) -> &[usize] {
        &self.leaf_surfaces[leaf.first_leaf_surface..leaf.first_leaf_surface + leaf.num_leaf_surfaces]
    }

    pub fn brush_sides(&self, brush: &CBrush) -> &[CBrushSide] {
        &self.brush_sides[brush.first_side..brush.first_side + brush.num_sides]
    }

    /// Leaf containing `p`. Returns 0 when no level is loaded.
    pub fn point_leafnum(&self, p: &Vec3) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut num: i32 = 0;
        while num >= 0 {
            let node = &self.nodes[num as usize];
            let plane = &self.planes[node.plane_num];
            let d = plane.distance(p);
            num = if d < 0.0 { node.children[1] } else { node.children[0] };
        }
        (-1 - num) as usize
    }

    /// OR of the contents of every brush that contains `p`.
    pub fn point_contents(&self, p: &Vec3) -> i32 {
        if self.nodes.is_empty() {
            return 0;
        }
        let leaf = &self.leafs[self.point_leafnum(p)];
        let mut contents = 0;
        for &brushnum in self.leaf_brushes(leaf) {
            let brush = &self.brushes[brushnum];
            let inside = self.brush_sides(brush).iter().all(|side| {
                let plane = &self.planes[side.plane_num];
                dot_product(p, &plane.normal) <= plane.dist
            });
            if inside {
                contents |= brush.contents;
            }
        }
        contents
    }

    /// Every leaf the box touches.
    pub fn box_leafnums(&self, mins: &Vec3, maxs: &Vec3) -> Vec<usize> {
        let mut list = Vec::new();
        if !self.nodes.is_empty() {
            self.box_leafnums_r(mins, maxs, 0, &mut list);
        }
        list
    }

    fn box_leafnums_r(&self, mins: &Vec3, maxs: &Vec3, mut nodenum: i32, list: &mut Vec<usize>) {
        loop {
            if nodenum < 0 {
                list.push((-1 - nodenum) as usize);
                return;
            }
            let node = &self.nodes[nodenum as usize];
            match box_on_plane_side(mins, maxs, &self.planes[node.plane_num]) {
                1 => nodenum = node.children[0],
                2 => nodenum = node.children[1],
                _ => {
                    // go down both
                    self.box_leafnums_r(mins, maxs, node.children[0], list);
                    nodenum = node.children[1];
                }
            }
        }
    }
}

/// Bounds from sides ordered `-X, +X, -Y, +Y, -Z, +Z`, or `None` if the
/// brush does not lead with exactly those planes.
fn axial_bounds(side_planes: &[&CPlane]) -> Option<[Vec3; 2]> {
    if side_planes.len() < 6 {
        return None;
    }
    let mut bounds = [[0.0f32; 3]; 2];
    for axis in 0..3 {
        let neg = side_planes[axis * 2];
        let pos = side_planes[axis * 2 + 1];
        let mut expect = [0.0f32; 3];
        expect[axis] = -1.0;
        if neg.normal != expect {
            return None;
        }
        expect[axis] = 1.0;
        if pos.normal != expect {
            return None;
        }
        bounds[0][axis] = -neg.dist;
        bounds[1][axis] = pos.dist;
    }
    Some(bounds)
}

// ============================================================
// Global singleton
// ============================================================

static CMODEL_CTX: RwLock<Option<CModelContext>> = parking_lot::const_rwlock(None);

pub fn cmodel_init() {
    cmodel_register_cvars();
    let mut g = CMODEL_CTX.write();
    if g.is_none() {
        *g = Some(CModelContext::new());
    }
}

/// Shared access to the global collision world. Returns None if not initialized.
pub fn with_cmodel_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&CModelContext) -> R,
{
    CMODEL_CTX.read().as_ref().map(f)
}

/// Exclusive access, for loading and configuration.
pub fn with_cmodel_ctx_mut<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CModelContext) -> R,
{
    CMODEL_CTX.write().as_mut().map(f)
}

pub fn cm_load_world(bsp: &BspData) {
    cmodel_init();
    with_cmodel_ctx_mut(|c| c.load_map(bsp));
}

pub fn cm_clear_world() {
    with_cmodel_ctx_mut(|c| c.clear());
}

pub fn cm_refresh_config() {
    with_cmodel_ctx_mut(|c| c.refresh_config());
}

fn no_world_trace(end: &Vec3) -> Trace {
    Trace {
        endpos: *end,
        ..Trace::default()
    }
}

pub fn cm_box_trace(start: &Vec3, end: &Vec3, mins: &Vec3, maxs: &Vec3, brushmask: i32) -> Trace {
    with_cmodel_ctx(|c| c.box_trace(start, end, mins, maxs, brushmask)).unwrap_or_else(|| no_world_trace(end))
}

pub fn cm_transformed_box_trace(
    start: &Vec3,
    end: &Vec3,
    origin: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
    brushmask: i32,
) -> Trace {
    with_cmodel_ctx(|c| c.trace(start, end, origin, mins, maxs, brushmask))
        .unwrap_or_else(|| no_world_trace(end))
}

pub fn cm_point_contents(p: &Vec3) -> i32 {
    with_cmodel_ctx(|c| c.point_contents(p)).unwrap_or(0)
}

pub fn cm_point_leafnum(p: &Vec3) -> usize {
    with_cmodel_ctx(|c| c.point_leafnum(p)).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::q_shared::{CONTENTS_SOLID, CONTENTS_WATER, SURF_SLICK};
    use crate::qfiles::{DLeaf, DNode, DPlane, DShader, DSurface, DrawVert};

    /// One solid slab x,y in [-64,64], z in [-10,10], split by the z=0 plane
    /// so both leaves reference the same brush.
    pub(crate) fn slab_world() -> BspData {
        let mut bsp = BspData {
            name: "maps/slab.bsp".to_string(),
            shaders: vec![DShader {
                shader: "textures/base/floor".to_string(),
                surface_flags: SURF_SLICK,
                content_flags: CONTENTS_SOLID,
            }],
            ..BspData::default()
        };
        bsp.push_box_brush(&[-64.0, -64.0, -10.0], &[64.0, 64.0, 10.0], 0);

        let split = bsp.planes.len() as i32;
        bsp.planes.push(DPlane { normal: [0.0, 0.0, 1.0], dist: 0.0 });
        bsp.nodes.push(DNode { plane_num: split, children: [-1, -2] });
        bsp.leaf_brushes = vec![0, 0];
        for k in 0..2 {
            bsp.leafs.push(DLeaf {
                cluster: k,
                area: 0,
                first_leaf_brush: k,
                num_leaf_brushes: 1,
                ..DLeaf::default()
            });
        }
        bsp
    }

    #[test]
    fn test_context_creation() {
        let ctx = CModelContext::new();
        assert!(!ctx.is_loaded());
        assert_eq!(ctx.point_leafnum(&[0.0; 3]), 0);
        assert_eq!(ctx.point_contents(&[0.0; 3]), 0);
        assert!(ctx.box_leafnums(&[-1.0; 3], &[1.0; 3]).is_empty());
    }

    #[test]
    fn test_load_slab_world() {
        let mut ctx = CModelContext::new();
        ctx.load_map(&slab_world());
        assert_eq!(ctx.planes.len(), 7);
        assert_eq!(ctx.brushes.len(), 1);
        assert_eq!(ctx.num_nodes(), 1);

        let brush = &ctx.brushes[0];
        assert!(brush.axial_bounds);
        assert_eq!(brush.bounds, [[-64.0, -64.0, -10.0], [64.0, 64.0, 10.0]]);
        assert_eq!(brush.contents, CONTENTS_SOLID);
        assert!(ctx.brush_sides(brush).iter().all(|s| s.surface_flags == SURF_SLICK));

        let top = &ctx.planes[ctx.brush_sides[5].plane_num];
        assert_eq!(top.plane_type, crate::q_shared::PLANE_Z);
        let bottom = &ctx.planes[ctx.brush_sides[4].plane_num];
        assert_eq!(bottom.signbits, 4);
    }

    #[test]
    fn test_point_queries() {
        let mut ctx = CModelContext::new();
        ctx.load_map(&slab_world());
        assert_eq!(ctx.point_leafnum(&[0.0, 0.0, 5.0]), 0);
        assert_eq!(ctx.point_leafnum(&[0.0, 0.0, -5.0]), 1);
        assert_eq!(ctx.point_contents(&[0.0, 0.0, 5.0]), CONTENTS_SOLID);
        assert_eq!(ctx.point_contents(&[0.0, 0.0, 50.0]), 0);
        assert_eq!(ctx.point_contents(&[100.0, 0.0, -5.0]), 0);
    }

    #[test]
    fn test_box_leafnums() {
        let mut ctx = CModelContext::new();
        ctx.load_map(&slab_world());
        assert_eq!(ctx.box_leafnums(&[-1.0, -1.0, 1.0], &[1.0, 1.0, 2.0]), vec![0]);
        assert_eq!(ctx.box_leafnums(&[-1.0, -1.0, -2.0], &[1.0, 1.0, -1.0]), vec![1]);
        let mut both = ctx.box_leafnums(&[-1.0; 3], &[1.0; 3]);
        both.sort();
        assert_eq!(both, vec![0, 1]);
    }

    #[test]
    fn test_non_axial_brush_left_unbounded() {
        let mut bsp = slab_world();
        // swap the first two sides so the -X/+X order is broken
        bsp.brush_sides.swap(0, 1);
        let mut ctx = CModelContext::new();
        ctx.load_map(&bsp);
        let brush = &ctx.brushes[0];
        assert!(!brush.axial_bounds);
        assert_eq!(brush.bounds[0], [-MAX_MAP_BOUNDS; 3]);
        // containment still works through the planes themselves
        assert_eq!(ctx.point_contents(&[0.0, 0.0, 5.0]), CONTENTS_SOLID);
    }

    #[test]
    fn test_patches_only_for_patch_surfaces() {
        let mut bsp = slab_world();
        bsp.shaders.push(DShader {
            shader: "textures/base/water".to_string(),
            surface_flags: 0,
            content_flags: CONTENTS_WATER,
        });
        for j in 0..3 {
            for i in 0..3 {
                bsp.draw_verts.push(DrawVert {
                    xyz: [64.0 * i as f32, 64.0 * j as f32, 32.0],
                    ..DrawVert::default()
                });
            }
        }
        bsp.surfaces.push(DSurface {
            shader_num: 0,
            surface_type: MapSurfaceType::Planar,
            first_vert: 0,
            num_verts: 9,
            ..DSurface::default()
        });
        bsp.surfaces.push(DSurface {
            shader_num: 1,
            surface_type: MapSurfaceType::Patch,
            first_vert: 0,
            num_verts: 9,
            patch_width: 3,
            patch_height: 3,
        });

        let mut ctx = CModelContext::new();
        ctx.load_map(&bsp);
        assert_eq!(ctx.patches.len(), 2);
        assert!(ctx.patches[0].is_none());
        let patch = ctx.patches[1].as_ref().unwrap();
        assert_eq!(patch.surface_num, 1);
        assert_eq!(patch.contents, CONTENTS_WATER);
        assert_eq!(patch.pc.facets.len(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bad_plane_reference_is_fatal() {
        let mut bsp = slab_world();
        bsp.brush_sides[2].plane_num = 99;
        CModelContext::new().load_map(&bsp);
    }

    #[test]
    fn test_collision_config_from_cvars() {
        let mut cvars = CvarContext::new();
        assert_eq!(CollisionConfig::from_cvars(&cvars), CollisionConfig::default());
        cvars.get("cm_nocurves", "1", CvarFlags::empty());
        cvars.get("cm_playercurveclip", "0", CvarFlags::empty());
        let config = CollisionConfig::from_cvars(&cvars);
        assert!(config.no_curves);
        assert!(!config.player_curve_clip);
    }

    #[test]
    fn test_global_world() {
        cm_load_world(&slab_world());
        assert_eq!(with_cmodel_ctx(|c| c.num_nodes()), Some(1));
        assert_eq!(cm_point_contents(&[0.0, 0.0, 5.0]), CONTENTS_SOLID);
        assert_eq!(cm_point_leafnum(&[0.0, 0.0, -5.0]), 1);

        let tr = cm_box_trace(&[0.0, 0.0, 100.0], &[0.0, 0.0, -100.0], &[0.0; 3], &[0.0; 3], CONTENTS_SOLID);
        assert!(tr.fraction < 1.0);
        let tr = cm_transformed_box_trace(
            &[0.0, 0.0, 100.0],
            &[0.0, 0.0, -100.0],
            &[1000.0, 0.0, 0.0],
            &[0.0; 3],
            &[0.0; 3],
            CONTENTS_SOLID,
        );
        assert_eq!(tr.fraction, 1.0);

        cm_clear_world();
        let end = [0.0, 0.0, -100.0];
        let tr = cm_box_trace(&[0.0, 0.0, 100.0], &end, &[0.0; 3], &[0.0; 3], CONTENTS_SOLID);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.endpos, end);
    }

    #[test]
    fn test_clear_keeps_config() {
        let mut ctx = CModelContext::new();
        ctx.load_map(&slab_world());
        ctx.config.no_curves = true;
        ctx.clear();
        assert!(!ctx.is_loaded());
        assert!(ctx.config.no_curves);
    }
}
