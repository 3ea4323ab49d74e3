// trace.rs — swept box and point traces through the collision world

use crate::cmodel::{CBrush, CModelContext, CPatch};
use crate::q_shared::{
    bounds_intersect, dot_product, vector_add, vector_average, vector_compare, vector_ma,
    vector_subtract, Trace, Vec3, MASK_SOLID, PLANE_NON_AXIAL, SURFACE_CLIP_EPSILON,
};

use rayon::prelude::*;
use std::collections::HashSet;

/// Query-local state for one trace.
///
/// The box is recentred on its own origin, so `size[0] == -size[1]` and the
/// start and end points are shifted by the same amount.
#[derive(Debug, Clone)]
pub struct TraceWork {
    pub start: Vec3,
    pub end: Vec3,
    pub size: [Vec3; 2],    // size of the box being swept through the model
    pub offsets: [Vec3; 8], // [signbits][x] = either size[0][x] or size[1][x]
    pub extents: Vec3,      // greatest of abs(size[0]) and abs(size[1])
    pub bounds: [Vec3; 2],  // enclosing box of start and end surrounding by size
    pub contents: i32,      // ored contents of the model tracing through
    pub is_point: bool,     // optimized case
    pub trace: Trace,       // returned from trace call
    checked_brushes: HashSet<usize>,
    checked_patches: HashSet<usize>,
}

impl TraceWork {
    pub fn new(start: &Vec3, end: &Vec3, mins: &Vec3, maxs: &Vec3, contents: i32) -> Self {
        // adjust so that mins and maxs are always symmetric, which
        // avoids some complications with plane expanding of rotated
        // bmodels
        let offset = vector_average(mins, maxs);
        let size = [vector_subtract(mins, &offset), vector_subtract(maxs, &offset)];
        let start = vector_add(start, &offset);
        let end = vector_add(end, &offset);

        let mut offsets = [[0.0f32; 3]; 8];
        for (bits, o) in offsets.iter_mut().enumerate() {
            for j in 0..3 {
                o[j] = if bits & (1 << j) != 0 { size[1][j] } else { size[0][j] };
            }
        }

        let mut bounds = [[0.0f32; 3]; 2];
        for i in 0..3 {
            if start[i] < end[i] {
                bounds[0][i] = start[i] + size[0][i];
                bounds[1][i] = end[i] + size[1][i];
            } else {
                bounds[0][i] = end[i] + size[0][i];
                bounds[1][i] = start[i] + size[1][i];
            }
        }

        let is_point = size[0] == [0.0; 3] && size[1] == [0.0; 3];

        Self {
            start,
            end,
            size,
            offsets,
            extents: size[1],
            bounds,
            contents,
            is_point,
            trace: Trace::default(),
            checked_brushes: HashSet::new(),
            checked_patches: HashSet::new(),
        }
    }
}

/// One entry of a batched trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceQuery {
    pub start: Vec3,
    pub end: Vec3,
    pub origin: Vec3,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub brushmask: i32,
}

impl TraceQuery {
    /// A world-space box trace against solid brushes.
    pub fn new(start: Vec3, end: Vec3, mins: Vec3, maxs: Vec3) -> Self {
        Self {
            start,
            end,
            origin: [0.0; 3],
            mins,
            maxs,
            brushmask: MASK_SOLID,
        }
    }
}

impl CModelContext {
    const PARALLEL_TRACE_THRESHOLD: usize = 32;

    /// Sweeps the box `mins..maxs` from `start` to `end` through the world,
    /// translated by `origin`. `brushmask` selects which contents collide.
    pub fn trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        origin: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        brushmask: i32,
    ) -> Trace {
        if self.nodes.is_empty() {
            return Trace {
                endpos: *end,
                ..Trace::default()
            };
        }

        let local_start = vector_subtract(start, origin);
        let local_end = vector_subtract(end, origin);
        let mut tw = TraceWork::new(&local_start, &local_end, mins, maxs, brushmask);

        if vector_compare(start, end) {
            self.position_test(&mut tw);
        } else {
            let (p1, p2) = (tw.start, tw.end);
            self.trace_through_tree(&mut tw, 0, 0.0, 1.0, &p1, &p2);
        }

        let mut trace = tw.trace;
        // generate endpos from the original, unmodified start/end
        trace.endpos = if trace.fraction == 1.0 {
            *end
        } else {
            vector_ma(start, trace.fraction, &vector_subtract(end, start))
        };

        debug_assert!(
            trace.allsolid
                || trace.fraction == 1.0
                || (dot_product(&trace.plane.normal, &trace.plane.normal) - 1.0).abs() < 1e-3,
            "trace hit a plane without a unit normal"
        );
        trace
    }

    /// World-space trace at the origin.
    pub fn box_trace(&self, start: &Vec3, end: &Vec3, mins: &Vec3, maxs: &Vec3, brushmask: i32) -> Trace {
        self.trace(start, end, &[0.0; 3], mins, maxs, brushmask)
    }

    /// Runs independent traces, in parallel for large batches.
    pub fn trace_many(&self, queries: &[TraceQuery]) -> Vec<Trace> {
        let run = |q: &TraceQuery| self.trace(&q.start, &q.end, &q.origin, &q.mins, &q.maxs, q.brushmask);
        if queries.len() >= Self::PARALLEL_TRACE_THRESHOLD {
            queries.par_iter().map(run).collect()
        } else {
            queries.iter().map(run).collect()
        }
    }

    // ============================================================
    // Position test
    // ============================================================

    fn position_test(&self, tw: &mut TraceWork) {
        let mut mins = vector_add(&tw.start, &tw.size[0]);
        let mut maxs = vector_add(&tw.start, &tw.size[1]);
        for i in 0..3 {
            mins[i] -= 1.0;
            maxs[i] += 1.0;
        }

        for leafnum in self.box_leafnums(&mins, &maxs) {
            self.test_in_leaf(tw, leafnum);
            if tw.trace.allsolid {
                break;
            }
        }
    }

    fn test_in_leaf(&self, tw: &mut TraceWork, leafnum: usize) {
        let leaf = &self.leafs[leafnum];

        for &brushnum in self.leaf_brushes(leaf) {
            if !tw.checked_brushes.insert(brushnum) {
                continue; // already checked this brush in another leaf
            }
            let brush = &self.brushes[brushnum];
            if brush.contents & tw.contents == 0 {
                continue;
            }
            self.test_box_in_brush(tw, brush);
            if tw.trace.allsolid {
                return;
            }
        }

        if self.config.no_curves {
            return;
        }
        for &surfnum in self.leaf_surfaces(leaf) {
            let Some(patch) = self.patches.get(surfnum).and_then(Option::as_ref) else {
                continue;
            };
            if !tw.checked_patches.insert(surfnum) {
                continue;
            }
            if patch.contents & tw.contents == 0 {
                continue;
            }
            if patch.pc.position_test(tw) {
                tw.trace.startsolid = true;
                tw.trace.allsolid = true;
                tw.trace.fraction = 0.0;
                tw.trace.contents = patch.contents;
                return;
            }
        }
    }

    fn test_box_in_brush(&self, tw: &mut TraceWork, brush: &CBrush) {
        if brush.num_sides == 0 {
            return;
        }

        // special test for axial
        for i in 0..3 {
            if tw.bounds[0][i] > brush.bounds[1][i] || tw.bounds[1][i] < brush.bounds[0][i] {
                return;
            }
        }

        // the first six planes are the axial planes, so we only
        // need to test the remainder
        let skip = if brush.axial_bounds { 6 } else { 0 };
        for side in &self.brush_sides(brush)[skip..] {
            let plane = &self.planes[side.plane_num];
            // adjust the plane distance appropriately for mins/maxs
            let dist = plane.dist - dot_product(&tw.offsets[plane.signbits as usize], &plane.normal);
            let d1 = dot_product(&tw.start, &plane.normal) - dist;
            // if completely in front of face, no intersection
            if d1 > 0.0 {
                return;
            }
        }

        // inside this brush
        tw.trace.startsolid = true;
        tw.trace.allsolid = true;
        tw.trace.fraction = 0.0;
        tw.trace.contents = brush.contents;
    }

    // ============================================================
    // Swept traces
    // ============================================================

    /// Walks the tree along `p1..p2`, covering `p1f..p2f` of the full
    /// trace, visiting the near side of each split first.
    fn trace_through_tree(&self, tw: &mut TraceWork, num: i32, p1f: f32, p2f: f32, p1: &Vec3, p2: &Vec3) {
        if tw.trace.fraction <= p1f {
            return; // already hit something nearer
        }

        // if < 0, we are in a leaf node
        if num < 0 {
            self.trace_through_leaf(tw, (-1 - num) as usize);
            return;
        }

        // find the point distances to the separating plane
        // and the offset for the size of the box
        let node = &self.nodes[num as usize];
        let plane = &self.planes[node.plane_num];

        let (t1, t2, offset) = if plane.plane_type < PLANE_NON_AXIAL {
            let t = plane.plane_type as usize;
            (p1[t] - plane.dist, p2[t] - plane.dist, tw.extents[t])
        } else {
            let offset = if tw.is_point {
                0.0
            } else {
                (0..3).map(|i| (tw.extents[i] * plane.normal[i]).abs()).sum::<f32>()
            };
            (
                dot_product(&plane.normal, p1) - plane.dist,
                dot_product(&plane.normal, p2) - plane.dist,
                offset,
            )
        };

        // see which sides we need to consider
        if t1 >= offset + 1.0 && t2 >= offset + 1.0 {
            self.trace_through_tree(tw, node.children[0], p1f, p2f, p1, p2);
            return;
        }
        if t1 < -offset - 1.0 && t2 < -offset - 1.0 {
            self.trace_through_tree(tw, node.children[1], p1f, p2f, p1, p2);
            return;
        }

        // put the crosspoint SURFACE_CLIP_EPSILON pixels on the near side
        let (side, frac, frac2) = if t1 < t2 {
            let idist = 1.0 / (t1 - t2);
            (
                1,
                (t1 - offset + SURFACE_CLIP_EPSILON) * idist,
                (t1 + offset + SURFACE_CLIP_EPSILON) * idist,
            )
        } else if t1 > t2 {
            let idist = 1.0 / (t1 - t2);
            (
                0,
                (t1 + offset + SURFACE_CLIP_EPSILON) * idist,
                (t1 - offset - SURFACE_CLIP_EPSILON) * idist,
            )
        } else {
            (0, 1.0, 0.0)
        };

        // move up to the node
        let frac = frac.clamp(0.0, 1.0);
        let midf = p1f + (p2f - p1f) * frac;
        let mid = lerp(p1, p2, frac);
        self.trace_through_tree(tw, node.children[side], p1f, midf, p1, &mid);

        // go past the node
        let frac2 = frac2.clamp(0.0, 1.0);
        let midf = p1f + (p2f - p1f) * frac2;
        let mid = lerp(p1, p2, frac2);
        self.trace_through_tree(tw, node.children[side ^ 1], midf, p2f, &mid, p2);
    }

    fn trace_through_leaf(&self, tw: &mut TraceWork, leafnum: usize) {
        let leaf = &self.leafs[leafnum];

        // trace line against all brushes in the leaf
        for &brushnum in self.leaf_brushes(leaf) {
            if !tw.checked_brushes.insert(brushnum) {
                continue;
            }
            let brush = &self.brushes[brushnum];
            if brush.contents & tw.contents == 0 {
                continue;
            }
            if !bounds_intersect(&tw.bounds[0], &tw.bounds[1], &brush.bounds[0], &brush.bounds[1]) {
                continue;
            }
            self.trace_through_brush(tw, brush);
            if tw.trace.fraction == 0.0 {
                return;
            }
        }

        // trace line against all patches in the leaf
        if self.config.no_curves {
            return;
        }
        for &surfnum in self.leaf_surfaces(leaf) {
            let Some(patch) = self.patches.get(surfnum).and_then(Option::as_ref) else {
                continue;
            };
            if !tw.checked_patches.insert(surfnum) {
                continue;
            }
            if patch.contents & tw.contents == 0 {
                continue;
            }
            self.trace_through_patch(tw, patch);
            if tw.trace.fraction == 0.0 {
                return;
            }
        }
    }

    fn trace_through_patch(&self, tw: &mut TraceWork, patch: &CPatch) {
        if tw.is_point && !self.config.player_curve_clip {
            return;
        }
        let old_frac = tw.trace.fraction;
        patch.pc.trace_through(tw);
        if tw.trace.fraction < old_frac {
            tw.trace.surface_flags = patch.surface_flags;
            tw.trace.contents = patch.contents;
        }
    }

    fn trace_through_brush(&self, tw: &mut TraceWork, brush: &CBrush) {
        if brush.num_sides == 0 {
            return;
        }

        let mut enter_frac = -1.0f32;
        let mut leave_frac = 1.0f32;
        let mut clip = None;
        let mut getout = false;
        let mut startout = false;

        // compare the trace against all planes of the brush
        // find the latest time the trace crosses a plane towards the interior
        // and the earliest time the trace crosses a plane towards the exterior
        for side in self.brush_sides(brush) {
            let plane = &self.planes[side.plane_num];

            // adjust the plane distance appropriately for mins/maxs
            let dist = plane.dist - dot_product(&tw.offsets[plane.signbits as usize], &plane.normal);
            let d1 = dot_product(&tw.start, &plane.normal) - dist;
            let d2 = dot_product(&tw.end, &plane.normal) - dist;

            if d2 > 0.0 {
                getout = true; // endpoint is not in solid
            }
            if d1 > 0.0 {
                startout = true;
            }

            // if completely in front of face, no intersection with the entire brush
            if d1 > 0.0 && (d2 >= SURFACE_CLIP_EPSILON || d2 >= d1) {
                return;
            }

            // if it doesn't cross the plane, the plane isn't relevent
            if d1 <= 0.0 && d2 <= 0.0 {
                continue;
            }

            // crosses face
            if d1 > d2 {
                // enter
                let f = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
                if f > enter_frac {
                    enter_frac = f;
                    clip = Some((plane, side.surface_flags));
                }
            } else {
                // leave
                let f = ((d1 + SURFACE_CLIP_EPSILON) / (d1 - d2)).min(1.0);
                if f < leave_frac {
                    leave_frac = f;
                }
            }
        }

        // all planes have been checked, and the trace was not
        // completely outside the brush
        if !startout {
            // original point was inside brush
            tw.trace.startsolid = true;
            if !getout {
                tw.trace.allsolid = true;
                tw.trace.fraction = 0.0;
                tw.trace.contents = brush.contents;
            }
            return;
        }

        if enter_frac < leave_frac && enter_frac > -1.0 && enter_frac < tw.trace.fraction {
            if let Some((plane, surface_flags)) = clip {
                tw.trace.fraction = enter_frac.max(0.0);
                tw.trace.plane = *plane;
                tw.trace.surface_flags = surface_flags;
                tw.trace.contents = brush.contents;
            }
        }
    }
}

fn lerp(p1: &Vec3, p2: &Vec3, frac: f32) -> Vec3 {
    [
        p1[0] + frac * (p2[0] - p1[0]),
        p1[1] + frac * (p2[1] - p1[1]),
        p1[2] + frac * (p2[2] - p1[2]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmodel::tests::slab_world;
    use crate::q_shared::{
        CONTENTS_PLAYERCLIP, CONTENTS_SOLID, MASK_PLAYERSOLID, MASK_WATER, SURF_NOIMPACT, SURF_SLICK,
    };
    use crate::qfiles::{BspData, DLeaf, DNode, DPlane, DShader, DSurface, DrawVert, MapSurfaceType};
    use rand::{Rng, SeedableRng};

    const PLAYER_MINS: Vec3 = [-16.0, -16.0, -24.0];
    const PLAYER_MAXS: Vec3 = [16.0, 16.0, 32.0];

    fn slab() -> CModelContext {
        let mut ctx = CModelContext::new();
        ctx.load_map(&slab_world());
        ctx
    }

    /// Axis-aligned boxes under a single z=0 split; both leafs list every box.
    fn boxes_world(boxes: &[(Vec3, Vec3)]) -> CModelContext {
        let mut bsp = BspData {
            shaders: vec![DShader {
                shader: "textures/base/wall".to_string(),
                surface_flags: 0,
                content_flags: CONTENTS_SOLID,
            }],
            ..BspData::default()
        };
        for (mins, maxs) in boxes {
            bsp.push_box_brush(mins, maxs, 0);
        }
        let split = bsp.planes.len() as i32;
        bsp.planes.push(DPlane { normal: [0.0, 0.0, 1.0], dist: 0.0 });
        bsp.nodes.push(DNode { plane_num: split, children: [-1, -2] });
        let n = boxes.len() as i32;
        for k in 0..2 {
            bsp.leaf_brushes.extend(0..n);
            bsp.leafs.push(DLeaf {
                first_leaf_brush: k * n,
                num_leaf_brushes: n,
                ..DLeaf::default()
            });
        }
        let mut ctx = CModelContext::new();
        ctx.load_map(&bsp);
        ctx
    }

    /// The slab plus a flat 3x3 patch at z=32 over [0,128] in x and y, linked
    /// into the upper leaf.
    fn slab_with_patch() -> CModelContext {
        let mut bsp = slab_world();
        bsp.shaders.push(DShader {
            shader: "textures/base/curve".to_string(),
            surface_flags: SURF_NOIMPACT,
            content_flags: CONTENTS_SOLID,
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
            shader_num: 1,
            surface_type: MapSurfaceType::Patch,
            first_vert: 0,
            num_verts: 9,
            patch_width: 3,
            patch_height: 3,
        });
        bsp.leaf_surfaces.push(0);
        bsp.leafs[0].first_leaf_surface = 0;
        bsp.leafs[0].num_leaf_surfaces = 1;

        let mut ctx = CModelContext::new();
        ctx.load_map(&bsp);
        ctx.config = Default::default();
        ctx
    }

    #[test]
    fn test_trace_work_setup() {
        let tw = TraceWork::new(&[0.0, 0.0, 100.0], &[0.0, 0.0, -100.0], &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        assert_eq!(tw.start, [0.0, 0.0, 104.0]);
        assert_eq!(tw.end, [0.0, 0.0, -96.0]);
        assert_eq!(tw.size, [[-16.0, -16.0, -28.0], [16.0, 16.0, 28.0]]);
        assert_eq!(tw.offsets[0], [-16.0, -16.0, -28.0]);
        assert_eq!(tw.offsets[5], [16.0, -16.0, 28.0]);
        assert_eq!(tw.bounds, [[-16.0, -16.0, -124.0], [16.0, 16.0, 132.0]]);
        assert!(!tw.is_point);

        let tw = TraceWork::new(&[1.0; 3], &[2.0; 3], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!(tw.is_point);
        assert_eq!(tw.extents, [0.0; 3]);
    }

    #[test]
    fn test_box_lands_on_slab() {
        let ctx = slab();
        let tr = ctx.box_trace(&[0.0, 0.0, 100.0], &[0.0, 0.0, -100.0], &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        assert!(!tr.startsolid);
        assert!(!tr.allsolid);
        assert!((tr.fraction - 0.329375).abs() < 1e-5);
        assert!((tr.endpos[2] - 34.125).abs() < 1e-3);
        assert_eq!(tr.plane.normal, [0.0, 0.0, 1.0]);
        assert_eq!(tr.contents, CONTENTS_SOLID);
        assert_eq!(tr.surface_flags, SURF_SLICK);
    }

    #[test]
    fn test_point_inside_brush_is_allsolid() {
        let ctx = slab();
        let tr = ctx.box_trace(&[0.0; 3], &[0.0, 0.0, 5.0], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!(tr.startsolid);
        assert!(tr.allsolid);
        assert_eq!(tr.fraction, 0.0);
        assert_eq!(tr.contents, CONTENTS_SOLID);
    }

    #[test]
    fn test_leaving_brush_is_startsolid_only() {
        let ctx = slab();
        let tr = ctx.box_trace(&[0.0; 3], &[0.0, 0.0, 50.0], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!(tr.startsolid);
        assert!(!tr.allsolid);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.endpos, [0.0, 0.0, 50.0]);
    }

    #[test]
    fn test_empty_world_trace() {
        let ctx = CModelContext::new();
        let end = [10.0, 20.0, 30.0];
        let tr = ctx.box_trace(&[0.0; 3], &end, &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.endpos, end);
        assert!(!tr.startsolid && !tr.allsolid);
    }

    #[test]
    fn test_miss_beside_slab() {
        let ctx = slab();
        let tr = ctx.box_trace(&[200.0, 0.0, 100.0], &[200.0, 0.0, -100.0], &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.endpos, [200.0, 0.0, -100.0]);
    }

    #[test]
    fn test_trace_is_repeatable() {
        let ctx = slab();
        let start = [10.0, -20.0, 80.0];
        let end = [-30.0, 15.0, -60.0];
        let a = ctx.box_trace(&start, &end, &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        let b = ctx.box_trace(&start, &end, &PLAYER_MINS, &PLAYER_MAXS, MASK_SOLID);
        assert_eq!(a, b);
    }

    #[test]
    fn test_bigger_brush_never_increases_fraction() {
        let small = boxes_world(&[([-64.0, -64.0, -10.0], [64.0, 64.0, 10.0])]);
        let big = boxes_world(&[
            ([-64.0, -64.0, -10.0], [64.0, 64.0, 10.0]),
            ([-32.0, -32.0, -10.0], [32.0, 32.0, 40.0]),
        ]);
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let start = [rng.gen_range(-96.0..96.0), rng.gen_range(-96.0..96.0), rng.gen_range(60.0..200.0)];
            let end = [rng.gen_range(-96.0..96.0), rng.gen_range(-96.0..96.0), rng.gen_range(-200.0..-20.0)];
            let a = small.box_trace(&start, &end, &[-8.0; 3], &[8.0; 3], MASK_SOLID);
            let b = big.box_trace(&start, &end, &[-8.0; 3], &[8.0; 3], MASK_SOLID);
            assert!(b.fraction <= a.fraction, "{:?} -> {:?}", start, end);
        }
    }

    #[test]
    fn test_brush_shared_by_leafs_is_checked_once() {
        let ctx = slab();
        // crosses the split plane inside the brush
        let tr = ctx.box_trace(&[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!(tr.allsolid);
    }

    #[test]
    fn test_origin_translates_model() {
        let ctx = slab();
        let origin = [500.0, 0.0, 0.0];
        let tr = ctx.trace(&[500.0, 0.0, 100.0], &[500.0, 0.0, -100.0], &origin, &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!((tr.fraction - 0.449375).abs() < 1e-5);
        assert!((tr.endpos[0] - 500.0).abs() < 1e-4);
        assert!((tr.endpos[2] - 10.125).abs() < 1e-3);

        // the untranslated model is not there
        let tr = ctx.box_trace(&[500.0, 0.0, 100.0], &[500.0, 0.0, -100.0], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert_eq!(tr.fraction, 1.0);
    }

    #[test]
    fn test_brushmask_filters_contents() {
        let ctx = slab();
        let start = [0.0, 0.0, 100.0];
        let end = [0.0, 0.0, -100.0];
        let tr = ctx.box_trace(&start, &end, &[0.0; 3], &[0.0; 3], MASK_WATER);
        assert_eq!(tr.fraction, 1.0);
        let tr = ctx.box_trace(&start, &end, &[0.0; 3], &[0.0; 3], MASK_PLAYERSOLID);
        assert!(tr.fraction < 1.0);
        let tr = ctx.box_trace(&start, &end, &[0.0; 3], &[0.0; 3], CONTENTS_PLAYERCLIP);
        assert_eq!(tr.fraction, 1.0);
    }

    #[test]
    fn test_position_test() {
        let ctx = slab();
        let tr = ctx.box_trace(&[0.0, 0.0, 17.0], &[0.0, 0.0, 17.0], &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(tr.startsolid && tr.allsolid);
        assert_eq!(tr.fraction, 0.0);

        let tr = ctx.box_trace(&[0.0, 0.0, 30.0], &[0.0, 0.0, 30.0], &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(!tr.startsolid);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.endpos, [0.0, 0.0, 30.0]);
    }

    #[test]
    fn test_position_test_non_axial_brush() {
        let mut bsp = slab_world();
        bsp.brush_sides.swap(0, 1);
        let mut ctx = CModelContext::new();
        ctx.load_map(&bsp);
        let tr = ctx.box_trace(&[0.0, 0.0, 17.0], &[0.0, 0.0, 17.0], &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(tr.allsolid);
        let tr = ctx.box_trace(&[0.0, 0.0, 30.0], &[0.0, 0.0, 30.0], &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(!tr.startsolid);
    }

    #[test]
    fn test_point_trace_hits_patch_before_brush() {
        let ctx = slab_with_patch();
        let tr = ctx.box_trace(&[64.0, 64.0, 100.0], &[64.0, 64.0, 0.0], &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!((tr.fraction - 0.67875).abs() < 1e-5);
        assert_eq!(tr.plane.normal, [0.0, 0.0, 1.0]);
        assert_eq!(tr.surface_flags, SURF_NOIMPACT);
    }

    #[test]
    fn test_box_trace_hits_patch() {
        let ctx = slab_with_patch();
        let tr = ctx.box_trace(&[64.0, 64.0, 100.0], &[64.0, 64.0, 0.0], &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(tr.fraction > 0.5 && tr.fraction < 0.7, "fraction {}", tr.fraction);
        assert_eq!(tr.surface_flags, SURF_NOIMPACT);
    }

    #[test]
    fn test_curve_switches() {
        let mut ctx = slab_with_patch();
        let start = [64.0, 64.0, 100.0];
        let end = [64.0, 64.0, 0.0];

        ctx.config.player_curve_clip = false;
        let tr = ctx.box_trace(&start, &end, &[0.0; 3], &[0.0; 3], MASK_SOLID);
        assert!((tr.fraction - 0.89875).abs() < 1e-5);
        let tr = ctx.box_trace(&start, &end, &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!(tr.fraction < 0.7);

        ctx.config.no_curves = true;
        let tr = ctx.box_trace(&start, &end, &[-8.0; 3], &[8.0; 3], MASK_SOLID);
        assert!((tr.fraction - 0.81875).abs() < 1e-5);
        assert_eq!(tr.surface_flags, SURF_SLICK);
    }

    #[test]
    fn test_trace_many_matches_sequential() {
        let ctx = slab_with_patch();
        let mut rng = rand::rngs::StdRng::seed_from_u64(4242);
        let queries: Vec<TraceQuery> = (0..100)
            .map(|_| {
                let start = [rng.gen_range(-128.0..192.0), rng.gen_range(-128.0..192.0), rng.gen_range(-64.0..128.0)];
                let end = [rng.gen_range(-128.0..192.0), rng.gen_range(-128.0..192.0), rng.gen_range(-64.0..128.0)];
                let half = rng.gen_range(0.0..16.0f32);
                TraceQuery::new(start, end, [-half; 3], [half; 3])
            })
            .collect();

        let batched = ctx.trace_many(&queries);
        assert_eq!(batched.len(), queries.len());
        for (q, tr) in queries.iter().zip(&batched) {
            let single = ctx.trace(&q.start, &q.end, &q.origin, &q.mins, &q.maxs, q.brushmask);
            assert_eq!(*tr, single);
        }
    }
}
