// patch.rs — collision surfaces for curved (biquadratic) patches
//
// A patch control grid is flattened into a grid of points lying exactly on
// the curve, then every grid cell becomes one or two planar facets bounded
// by border planes. Bevel planes are added to each facet so a swept box
// stops at edges and corners, not only against the flat face.

use crate::common::{com_dprintf, com_error, com_warning};
use crate::polylib::{
    base_winding_for_plane, chop_winding_in_place, plane_from_points, snap_vector, Winding,
    DIST_EPSILON, NORMAL_EPSILON, PLANE_TRI_EPSILON, POINT_EPSILON, WRAP_POINT_EPSILON,
};
use crate::q_shared::{
    add_point_to_bounds, bounds_intersect, clear_bounds, cross_product, dot_product,
    signbits_for_normal, vec4_flip, vec4_normal, vector_add, vector_average, vector_length,
    vector_normalize, vector_scale, vector_subtract, CPlane, Vec3, Vec4, ERR_FATAL,
    MAX_MAP_BOUNDS, SIDE_BACK, SIDE_FRONT, SIDE_ON, SURFACE_CLIP_EPSILON,
};
use crate::trace::TraceWork;

pub const MAX_FACETS: usize = 1024;
pub const MAX_PATCH_PLANES: usize = 2048;
pub const MAX_GRID_SIZE: usize = 129;

/// 4 edges, 6 axial bevels, 16 edge bevels.
pub const MAX_FACET_BORDERS: usize = 4 + 6 + 16;

/// A curve segment is flattened once its midpoint is this close to the chord.
pub const SUBDIVIDE_DISTANCE: f32 = 16.0;

const EN_TOP: usize = 0;
const EN_RIGHT: usize = 1;
const EN_BOTTOM: usize = 2;
const EN_LEFT: usize = 3;

// ============================================================
// Data
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchPlane {
    pub plane: Vec4,
    pub signbits: u8, // signx + (signy<<1) + (signz<<2), used as lookup during collision
}

impl PatchPlane {
    fn new(plane: Vec4) -> Self {
        Self {
            plane,
            signbits: signbits_for_normal(&plane[..3]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facet {
    pub surface_plane: i32,
    pub num_borders: usize,
    pub border_planes: [i32; MAX_FACET_BORDERS],
    pub border_inward: [bool; MAX_FACET_BORDERS],
    pub border_no_adjust: [bool; MAX_FACET_BORDERS],
}

impl Default for Facet {
    fn default() -> Self {
        Self {
            surface_plane: -1,
            num_borders: 0,
            border_planes: [-1; MAX_FACET_BORDERS],
            border_inward: [false; MAX_FACET_BORDERS],
            border_no_adjust: [false; MAX_FACET_BORDERS],
        }
    }
}

impl Facet {
    fn push_border(&mut self, plane: i32, inward: bool, no_adjust: bool) {
        if self.num_borders >= MAX_FACET_BORDERS {
            com_error(ERR_FATAL, "add_facet_bevels: too many bevels");
        }
        let n = self.num_borders;
        self.border_planes[n] = plane;
        self.border_inward[n] = inward;
        self.border_no_adjust[n] = no_adjust;
        self.num_borders += 1;
    }

    pub fn borders(&self) -> impl Iterator<Item = (i32, bool)> + '_ {
        (0..self.num_borders).map(move |k| (self.border_planes[k], self.border_inward[k]))
    }
}

/// Collision representation of one curved surface. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct PatchCollide {
    pub bounds: [Vec3; 2],
    pub planes: Vec<PatchPlane>,
    pub facets: Vec<Facet>,
}

/// Points on the curve, indexed `points[column][row]`.
#[derive(Clone)]
struct Grid {
    width: usize,
    height: usize,
    wrap_width: bool,
    wrap_height: bool,
    points: Vec<[Vec3; MAX_GRID_SIZE]>,
}

impl Grid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            wrap_width: false,
            wrap_height: false,
            points: vec![[[0.0; 3]; MAX_GRID_SIZE]; MAX_GRID_SIZE],
        }
    }

    /// Swaps rows and columns so the column passes can run on rows.
    fn transpose(&mut self) {
        let mut transposed = vec![[[0.0; 3]; MAX_GRID_SIZE]; MAX_GRID_SIZE];
        for i in 0..self.width {
            for j in 0..self.height {
                transposed[j][i] = self.points[i][j];
            }
        }
        self.points = transposed;
        std::mem::swap(&mut self.width, &mut self.height);
        std::mem::swap(&mut self.wrap_width, &mut self.wrap_height);
    }

    /// The surface closes on itself if the first and last columns coincide.
    fn set_wrap_width(&mut self) {
        self.wrap_width = (0..self.height).all(|i| {
            let a = &self.points[0][i];
            let b = &self.points[self.width - 1][i];
            (0..3).all(|j| (a[j] - b[j]).abs() <= WRAP_POINT_EPSILON)
        });
    }

    fn remove_column(&mut self, col: usize) {
        for j in 0..self.height {
            for k in col + 1..self.width {
                self.points[k - 1][j] = self.points[k][j];
            }
        }
        self.width -= 1;
    }

    /// Adaptively subdivides each interpolating / approximating / interpolating
    /// column triple until the curve is flat to within `SUBDIVIDE_DISTANCE`.
    fn subdivide_columns(&mut self) {
        let mut i = 0;
        while i + 2 < self.width {
            // points[i] and points[i+2] are interpolating, points[i+1] approximating

            // first see if we can collapse the approximating column away
            let flat = (0..self.height).all(|j| {
                !needs_subdivision(&self.points[i][j], &self.points[i + 1][j], &self.points[i + 2][j])
            });
            if flat {
                self.remove_column(i + 1);
                // go to the next curve segment
                i += 1;
                continue;
            }

            if self.width + 2 > MAX_GRID_SIZE {
                com_dprintf(&format!(
                    "subdivide_columns: grid full at width {}, leaving segment coarse\n",
                    self.width
                ));
                i += 2;
                continue;
            }

            // we need to subdivide the curve
            for j in 0..self.height {
                let prev = self.points[i][j];
                let mid = self.points[i + 1][j];
                let next = self.points[i + 2][j];

                // make room for two additional columns: i+2 becomes i+4
                let mut k = self.width - 1;
                while k > i + 1 {
                    self.points[k + 2][j] = self.points[k][j];
                    k -= 1;
                }

                let (out1, out2, out3) = subdivide(&prev, &mid, &next);
                self.points[i + 1][j] = out1;
                self.points[i + 2][j] = out2;
                self.points[i + 3][j] = out3;
            }
            self.width += 2;

            // the new approximating point at i+1 may need to be removed
            // or subdivided farther, so don't advance i
        }
    }

    /// Corner points of cell `(i, j)`: the whole quad for `which == -1`,
    /// otherwise triangle 0 or 1. Empty for any other `which`.
    fn cell_corners(&self, i: usize, j: usize, which: i32) -> Vec<Vec3> {
        match which {
            -1 => vec![
                self.points[i][j],
                self.points[i + 1][j],
                self.points[i + 1][j + 1],
                self.points[i][j + 1],
            ],
            0 => vec![self.points[i][j], self.points[i + 1][j], self.points[i + 1][j + 1]],
            1 => vec![self.points[i + 1][j + 1], self.points[i][j + 1], self.points[i][j]],
            _ => Vec::new(),
        }
    }

    /// Merges adjacent columns whose points all coincide.
    fn remove_degenerate_columns(&mut self) {
        let mut i = 0;
        while i + 1 < self.width {
            let degenerate =
                (0..self.height).all(|j| compare_points(&self.points[i][j], &self.points[i + 1][j]));
            if degenerate {
                self.remove_column(i + 1);
                // check against the next column
                continue;
            }
            i += 1;
        }
    }
}

fn needs_subdivision(a: &Vec3, b: &Vec3, c: &Vec3) -> bool {
    // linear midpoint against the exact curve midpoint
    let lmid = vector_average(a, c);
    let cmid = vector_average(&vector_average(a, b), &vector_average(b, c));
    vector_length(&vector_subtract(&cmid, &lmid)) >= SUBDIVIDE_DISTANCE
}

/// de Casteljau split of a quadratic segment at t = 0.5.
fn subdivide(a: &Vec3, b: &Vec3, c: &Vec3) -> (Vec3, Vec3, Vec3) {
    let out1 = vector_average(a, b);
    let out3 = vector_average(b, c);
    let out2 = vector_average(&out1, &out3);
    (out1, out2, out3)
}

fn compare_points(a: &Vec3, b: &Vec3) -> bool {
    (0..3).all(|i| (a[i] - b[i]).abs() <= POINT_EPSILON)
}

/// Returns `Some(flipped)` if `plane` matches `p` in either orientation.
fn plane_equal(p: &PatchPlane, plane: &Vec4) -> Option<bool> {
    let matches = |q: &Vec4| {
        (p.plane[0] - q[0]).abs() < NORMAL_EPSILON
            && (p.plane[1] - q[1]).abs() < NORMAL_EPSILON
            && (p.plane[2] - q[2]).abs() < NORMAL_EPSILON
            && (p.plane[3] - q[3]).abs() < DIST_EPSILON
    };
    if matches(plane) {
        return Some(false);
    }
    if matches(&vec4_flip(plane)) {
        return Some(true);
    }
    None
}

/// Plane indices for the two triangles of every grid cell.
struct GridPlanes {
    height: usize,
    planes: Vec<[i32; 2]>,
}

impl GridPlanes {
    fn new(width: usize, height: usize) -> Self {
        Self {
            height,
            planes: vec![[-1, -1]; width * height],
        }
    }

    #[inline]
    fn get(&self, i: usize, j: usize, tri: usize) -> i32 {
        self.planes[i * self.height + j][tri]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, tri: usize, plane: i32) {
        self.planes[i * self.height + j][tri] = plane;
    }

    /// Plane of a triangle, falling back to the other triangle of the cell.
    fn resolve(&self, i: usize, j: usize, tri: usize) -> i32 {
        let p = self.get(i, j, tri);
        if p != -1 {
            return p;
        }
        let p = self.get(i, j, tri ^ 1);
        if p != -1 {
            return p;
        }
        com_warning("grid_plane unresolvable\n");
        -1
    }
}

// ============================================================
// Build context
// ============================================================

/// Bounded plane and facet tables used while one patch is being built.
#[derive(Default)]
pub struct PatchCollideContext {
    pub planes: Vec<PatchPlane>,
    pub facets: Vec<Facet>,
}

impl PatchCollideContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_plane(&mut self, plane: Vec4) -> i32 {
        if self.planes.len() >= MAX_PATCH_PLANES {
            com_error(ERR_FATAL, "MAX_PATCH_PLANES");
        }
        self.planes.push(PatchPlane::new(plane));
        self.planes.len() as i32 - 1
    }

    fn add_facet(&mut self, facet: Facet) {
        if self.facets.len() >= MAX_FACETS {
            com_error(ERR_FATAL, "MAX_FACETS");
        }
        self.facets.push(facet);
    }

    /// Index of the plane through the triangle, reusing any existing plane
    /// that faces the same way and passes within `PLANE_TRI_EPSILON` of all
    /// three points. -1 for a degenerate triangle.
    pub fn find_plane(&mut self, p1: &Vec3, p2: &Vec3, p3: &Vec3) -> i32 {
        let Some(plane) = plane_from_points(p1, p2, p3) else {
            return -1;
        };
        let normal = vec4_normal(&plane);

        // see if the points are close enough to an existing plane
        for (i, existing) in self.planes.iter().enumerate() {
            let en = vec4_normal(&existing.plane);
            if dot_product(&normal, &en) < 0.0 {
                continue; // allow backwards planes?
            }
            let close = [p1, p2, p3]
                .iter()
                .all(|p| (dot_product(p, &en) - existing.plane[3]).abs() <= PLANE_TRI_EPSILON);
            if close {
                return i as i32;
            }
        }

        self.add_plane(plane)
    }

    /// Index of a plane equal to `plane` in either orientation, adding it if
    /// none exists. The flag reports whether the stored plane is reversed.
    pub fn find_plane2(&mut self, plane: &Vec4) -> (i32, bool) {
        for (i, existing) in self.planes.iter().enumerate() {
            if let Some(flipped) = plane_equal(existing, plane) {
                return (i as i32, flipped);
            }
        }
        (self.add_plane(*plane), false)
    }

    fn edge_plane_num(&mut self, grid: &Grid, gp: &GridPlanes, i: usize, j: usize, k: usize) -> i32 {
        let (p1, p2, tri, swap) = match k {
            0 => (grid.points[i][j], grid.points[i + 1][j], 0, false), // top border
            2 => (grid.points[i][j + 1], grid.points[i + 1][j + 1], 1, true), // bottom border
            3 => (grid.points[i][j], grid.points[i][j + 1], 1, true),  // left border
            1 => (grid.points[i + 1][j], grid.points[i + 1][j + 1], 0, false), // right border
            4 => (grid.points[i + 1][j + 1], grid.points[i][j], 0, false), // diagonal out of triangle 0
            5 => (grid.points[i][j], grid.points[i + 1][j + 1], 1, false), // diagonal out of triangle 1
            _ => {
                com_error(ERR_FATAL, "edge_plane_num: bad k");
                return -1;
            }
        };

        let p = gp.resolve(i, j, tri);
        if p == -1 {
            return -1;
        }
        let up = vector_add(&p1, &vector_scale(&vec4_normal(&self.planes[p as usize].plane), 4.0));
        if swap {
            self.find_plane(&p2, &p1, &up)
        } else {
            self.find_plane(&p1, &p2, &up)
        }
    }

    fn point_on_plane_side(&self, p: &Vec3, plane_num: i32) -> i32 {
        if plane_num == -1 {
            return SIDE_ON;
        }
        let plane = &self.planes[plane_num as usize].plane;
        let d = dot_product(p, &vec4_normal(plane)) - plane[3];
        if d > PLANE_TRI_EPSILON {
            SIDE_FRONT
        } else if d < -PLANE_TRI_EPSILON {
            SIDE_BACK
        } else {
            SIDE_ON
        }
    }

    /// Classifies each border plane against the facet's own corners.
    /// `which` is -1 for a whole quad cell, 0 or 1 for one of its triangles.
    fn set_border_inward(&self, facet: &mut Facet, grid: &Grid, i: usize, j: usize, which: i32) {
        let points = grid.cell_corners(i, j, which);
        if points.is_empty() {
            com_error(ERR_FATAL, "set_border_inward: bad parameter");
            return;
        }

        for k in 0..facet.num_borders {
            let mut front = 0;
            let mut back = 0;
            for p in &points {
                match self.point_on_plane_side(p, facet.border_planes[k]) {
                    SIDE_FRONT => front += 1,
                    SIDE_BACK => back += 1,
                    _ => {}
                }
            }

            if front > 0 && back == 0 {
                facet.border_inward[k] = true;
            } else if back > 0 && front == 0 {
                facet.border_inward[k] = false;
            } else if front == 0 && back == 0 {
                // flat side border
                facet.border_planes[k] = -1;
            } else {
                // bisecting side border
                com_error(
                    ERR_FATAL,
                    &format!("set_border_inward: mixed plane sides at cell {} {}", i, j),
                );
            }
        }
    }

    /// Border plane `k` of a facet, oriented so the facet lies in front of it.
    fn inward_border(&self, facet: &Facet, k: usize) -> Vec4 {
        let plane = self.planes[facet.border_planes[k] as usize].plane;
        if facet.border_inward[k] {
            plane
        } else {
            vec4_flip(&plane)
        }
    }

    /// Facet polygon: the surface plane's base winding clipped by every border.
    fn facet_winding(&self, facet: &Facet, skip_surface: bool) -> Option<Winding> {
        let plane = &self.planes[facet.surface_plane as usize].plane;
        let mut w = Some(base_winding_for_plane(&vec4_normal(plane), plane[3]));
        for k in 0..facet.num_borders {
            if w.is_none() {
                break;
            }
            if skip_surface && facet.border_planes[k] == facet.surface_plane {
                continue;
            }
            let plane = self.inward_border(facet, k);
            chop_winding_in_place(&mut w, &vec4_normal(&plane), plane[3], 0.1);
        }
        w
    }

    /// A facet is usable if it has a surface plane, every border resolved,
    /// and its clipped polygon is bounded.
    fn validate_facet(&self, facet: &Facet) -> bool {
        if facet.surface_plane == -1 {
            return false;
        }
        if facet.border_planes[..facet.num_borders].iter().any(|&p| p == -1) {
            return false;
        }

        let Some(w) = self.facet_winding(facet, false) else {
            return false; // winding was completely chopped away
        };

        // see if the facet is unreasonably large
        let (mins, maxs) = w.bounds();
        for j in 0..3 {
            if maxs[j] - mins[j] > MAX_MAP_BOUNDS {
                return false; // we must be missing a plane
            }
            if mins[j] >= MAX_MAP_BOUNDS || maxs[j] <= -MAX_MAP_BOUNDS {
                return false;
            }
        }
        true
    }

    fn has_plane(&self, facet: &Facet, plane: &Vec4) -> bool {
        if plane_equal(&self.planes[facet.surface_plane as usize], plane).is_some() {
            return true;
        }
        facet.border_planes[..facet.num_borders]
            .iter()
            .any(|&b| plane_equal(&self.planes[b as usize], plane).is_some())
    }

    /// Adds axial and edge bevels, then the reversed surface plane that
    /// closes the facet from behind.
    fn add_facet_bevels(&mut self, facet: &mut Facet) {
        let Some(w) = self.facet_winding(facet, true) else {
            return;
        };
        let (mins, maxs) = w.bounds();

        // add the axial planes
        for axis in 0..3 {
            for dir in [-1.0f32, 1.0] {
                let mut plane = [0.0f32; 4];
                plane[axis] = dir;
                plane[3] = if dir > 0.0 { maxs[axis] } else { -mins[axis] };

                if self.has_plane(facet, &plane) {
                    continue;
                }
                let (num, flipped) = self.find_plane2(&plane);
                facet.push_border(num, flipped, false);
            }
        }

        // add the edge bevels, testing only the non-axial edges
        let n = w.num_points();
        for j in 0..n {
            let k = (j + 1) % n;
            let mut vec = vector_subtract(&w.p[j], &w.p[k]);
            // degenerate edge
            if vector_normalize(&mut vec) < 0.5 {
                continue;
            }
            snap_vector(&mut vec);
            if vec.iter().any(|&c| c == 1.0 || c == -1.0) {
                continue; // axial
            }

            // try the six possible slanted axials from this edge
            for axis in 0..3 {
                for dir in [-1.0f32, 1.0] {
                    let mut vec2 = [0.0f32; 3];
                    vec2[axis] = dir;
                    let mut normal = cross_product(&vec, &vec2);
                    if vector_normalize(&mut normal) < 0.5 {
                        continue;
                    }
                    let plane = [normal[0], normal[1], normal[2], dot_product(&w.p[j], &normal)];

                    // if all the points of the facet winding are
                    // behind this plane, it is a proper edge bevel
                    if w.p.iter().any(|p| dot_product(p, &normal) - plane[3] > 0.1) {
                        continue;
                    }

                    if self.has_plane(facet, &plane) {
                        continue;
                    }

                    let (num, flipped) = self.find_plane2(&plane);
                    if facet.border_planes[..facet.num_borders].contains(&num) {
                        com_warning("bevel plane already used\n");
                    }

                    let stored = self.planes[num as usize].plane;
                    let newplane = if flipped { stored } else { vec4_flip(&stored) };
                    let mut w2 = Some(w.clone());
                    chop_winding_in_place(&mut w2, &vec4_normal(&newplane), newplane[3], 0.1);
                    if w2.is_none() {
                        com_warning("add_facet_bevels: invalid bevel\n");
                        continue;
                    }

                    facet.push_border(num, flipped, false);
                }
            }
        }

        // add opposite plane
        facet.push_border(facet.surface_plane, true, false);
    }

    fn finish_facet(&mut self, mut facet: Facet, grid: &Grid, i: usize, j: usize, which: i32) {
        self.set_border_inward(&mut facet, grid, i, j, which);
        if self.validate_facet(&facet) {
            self.add_facet_bevels(&mut facet);
            self.add_facet(facet);
        }
    }

    fn patch_collide_from_grid(&mut self, grid: &Grid) {
        let gp = self.grid_planes(grid);

        // create the borders for each facet
        for i in 0..grid.width - 1 {
            for j in 0..grid.height - 1 {
                self.add_cell_facets(grid, &gp, i, j);
            }
        }
    }

    /// Finds the planes for each triangle of the grid.
    fn grid_planes(&mut self, grid: &Grid) -> GridPlanes {
        let mut gp = GridPlanes::new(grid.width, grid.height);
        for i in 0..grid.width - 1 {
            for j in 0..grid.height - 1 {
                let p = self.find_plane(&grid.points[i][j], &grid.points[i + 1][j], &grid.points[i + 1][j + 1]);
                gp.set(i, j, 0, p);
                let p = self.find_plane(&grid.points[i + 1][j + 1], &grid.points[i][j + 1], &grid.points[i][j]);
                gp.set(i, j, 1, p);
            }
        }
        gp
    }

    /// Adds the facet (or pair of triangle facets) for cell `(i, j)`.
    fn add_cell_facets(&mut self, grid: &Grid, gp: &GridPlanes, i: usize, j: usize) {
        let mut borders = [-1i32; 4];
        let mut no_adjust = [false; 4];

        if j > 0 {
            borders[EN_TOP] = gp.get(i, j - 1, 1);
        } else if grid.wrap_height {
            borders[EN_TOP] = gp.get(i, grid.height - 2, 1);
        }
        no_adjust[EN_TOP] = borders[EN_TOP] == gp.get(i, j, 0);
        if borders[EN_TOP] == -1 || no_adjust[EN_TOP] {
            borders[EN_TOP] = self.edge_plane_num(grid, gp, i, j, 0);
        }

        if j < grid.height - 2 {
            borders[EN_BOTTOM] = gp.get(i, j + 1, 0);
        } else if grid.wrap_height {
            borders[EN_BOTTOM] = gp.get(i, 0, 0);
        }
        no_adjust[EN_BOTTOM] = borders[EN_BOTTOM] == gp.get(i, j, 1);
        if borders[EN_BOTTOM] == -1 || no_adjust[EN_BOTTOM] {
            borders[EN_BOTTOM] = self.edge_plane_num(grid, gp, i, j, 2);
        }

        if i > 0 {
            borders[EN_LEFT] = gp.get(i - 1, j, 0);
        } else if grid.wrap_width {
            borders[EN_LEFT] = gp.get(grid.width - 2, j, 0);
        }
        no_adjust[EN_LEFT] = borders[EN_LEFT] == gp.get(i, j, 1);
        if borders[EN_LEFT] == -1 || no_adjust[EN_LEFT] {
            borders[EN_LEFT] = self.edge_plane_num(grid, gp, i, j, 3);
        }

        if i < grid.width - 2 {
            borders[EN_RIGHT] = gp.get(i + 1, j, 1);
        } else if grid.wrap_width {
            borders[EN_RIGHT] = gp.get(0, j, 1);
        }
        no_adjust[EN_RIGHT] = borders[EN_RIGHT] == gp.get(i, j, 0);
        if borders[EN_RIGHT] == -1 || no_adjust[EN_RIGHT] {
            borders[EN_RIGHT] = self.edge_plane_num(grid, gp, i, j, 1);
        }

        let tri0 = gp.get(i, j, 0);
        let tri1 = gp.get(i, j, 1);

        if tri0 == tri1 {
            if tri0 == -1 {
                return; // degenerate
            }
            let mut facet = Facet { surface_plane: tri0, ..Facet::default() };
            for edge in [EN_TOP, EN_RIGHT, EN_BOTTOM, EN_LEFT] {
                facet.push_border(borders[edge], false, no_adjust[edge]);
            }
            self.finish_facet(facet, grid, i, j, -1);
        } else {
            // two seperate triangles
            let mut facet = Facet { surface_plane: tri0, ..Facet::default() };
            facet.push_border(borders[EN_TOP], false, no_adjust[EN_TOP]);
            facet.push_border(borders[EN_RIGHT], false, no_adjust[EN_RIGHT]);
            let mut diagonal = tri1;
            if diagonal == -1 {
                diagonal = borders[EN_BOTTOM];
                if diagonal == -1 {
                    diagonal = self.edge_plane_num(grid, gp, i, j, 4);
                }
            }
            facet.push_border(diagonal, false, false);
            self.finish_facet(facet, grid, i, j, 0);

            let mut facet = Facet { surface_plane: tri1, ..Facet::default() };
            facet.push_border(borders[EN_BOTTOM], false, no_adjust[EN_BOTTOM]);
            facet.push_border(borders[EN_LEFT], false, no_adjust[EN_LEFT]);
            let mut diagonal = tri0;
            if diagonal == -1 {
                diagonal = borders[EN_TOP];
                if diagonal == -1 {
                    diagonal = self.edge_plane_num(grid, gp, i, j, 5);
                }
            }
            facet.push_border(diagonal, false, false);
            self.finish_facet(facet, grid, i, j, 1);
        }
    }
}

/// Flattens a validated control grid into points lying on the curve. The
/// result is transposed: columns run along the control grid's rows.
fn curve_grid(width: usize, height: usize, points: &[Vec3]) -> Grid {
    let mut grid = Grid::new(width, height);
    for i in 0..width {
        for j in 0..height {
            grid.points[i][j] = points[j * width + i];
        }
    }

    // subdivide the grid
    grid.set_wrap_width();
    grid.subdivide_columns();
    grid.remove_degenerate_columns();

    grid.transpose();

    grid.set_wrap_width();
    grid.subdivide_columns();
    grid.remove_degenerate_columns();
    grid
}

/// Builds the collision surface for a `width` x `height` control grid.
/// `points` is row-major: point `(i, j)` is `points[j * width + i]`.
pub fn generate_patch_collide(width: usize, height: usize, points: &[Vec3]) -> PatchCollide {
    if width <= 2 || height <= 2 || points.len() < width * height {
        com_error(
            ERR_FATAL,
            &format!(
                "generate_patch_collide: bad parameters: ({}, {}, {} points)",
                width,
                height,
                points.len()
            ),
        );
    }
    if width & 1 == 0 || height & 1 == 0 {
        com_error(ERR_FATAL, "generate_patch_collide: even sizes are invalid for quadratic meshes");
    }
    if width > MAX_GRID_SIZE || height > MAX_GRID_SIZE {
        com_error(ERR_FATAL, "generate_patch_collide: source is > MAX_GRID_SIZE");
    }

    let grid = curve_grid(width, height, points);

    // we now have a grid of points exactly on the curve; the approximate
    // surface defined by these points will be collided against
    let mut bounds = [[0.0f32; 3]; 2];
    {
        let [mins, maxs] = &mut bounds;
        clear_bounds(mins, maxs);
        for i in 0..grid.width {
            for j in 0..grid.height {
                add_point_to_bounds(&grid.points[i][j], mins, maxs);
            }
        }
    }

    let mut ctx = PatchCollideContext::new();
    if grid.width >= 2 && grid.height >= 2 {
        ctx.patch_collide_from_grid(&grid);
    }

    // expand by one unit for epsilon purposes
    for i in 0..3 {
        bounds[0][i] -= 1.0;
        bounds[1][i] += 1.0;
    }

    PatchCollide {
        bounds,
        planes: ctx.planes,
        facets: ctx.facets,
    }
}

// ============================================================
// Collision against a built patch
// ============================================================

/// Clips the segment against one facet plane, narrowing `enter_frac` and
/// `leave_frac`. Returns false if the segment stays entirely in front, in
/// which case the whole facet is missed.
pub fn check_facet_plane(
    plane: &Vec4,
    start: &Vec3,
    end: &Vec3,
    enter_frac: &mut f32,
    leave_frac: &mut f32,
    hit: &mut bool,
) -> bool {
    *hit = false;

    let normal = vec4_normal(plane);
    let d1 = dot_product(start, &normal) - plane[3];
    let d2 = dot_product(end, &normal) - plane[3];

    // if completely in front of face, no intersection with the entire facet
    if d1 > 0.0 && (d2 >= SURFACE_CLIP_EPSILON || d2 >= d1) {
        return false;
    }

    // if it doesn't cross the plane, the plane isn't relevent
    if d1 <= 0.0 && d2 <= 0.0 {
        return true;
    }

    // crosses face
    if d1 > d2 {
        // enter
        let f = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
        // always favor previous plane hits and thus also the surface plane hit
        if f > *enter_frac {
            *enter_frac = f;
            *hit = true;
        }
    } else {
        // leave
        let f = ((d1 + SURFACE_CLIP_EPSILON) / (d1 - d2)).min(1.0);
        if f < *leave_frac {
            *leave_frac = f;
        }
    }
    true
}

impl PatchCollide {
    /// Border plane `k` of `facet` expanded by the box extents. Inward
    /// borders are reversed so the facet volume is always behind the plane.
    fn expanded_border(&self, tw: &TraceWork, facet: &Facet, k: usize) -> Vec4 {
        let pp = &self.planes[facet.border_planes[k] as usize];
        let mut plane = if facet.border_inward[k] { vec4_flip(&pp.plane) } else { pp.plane };
        // the box is centered, so the offset is valid even for a flipped plane
        let offset = dot_product(&tw.offsets[pp.signbits as usize], &vec4_normal(&plane));
        plane[3] += offset.abs();
        plane
    }

    fn expanded_surface(&self, tw: &TraceWork, facet: &Facet) -> Vec4 {
        let pp = &self.planes[facet.surface_plane as usize];
        let mut plane = pp.plane;
        plane[3] -= dot_product(&tw.offsets[pp.signbits as usize], &vec4_normal(&plane));
        plane
    }

    /// Sweeps the trace box against every facet.
    pub fn trace_through(&self, tw: &mut TraceWork) {
        if !bounds_intersect(&tw.bounds[0], &tw.bounds[1], &self.bounds[0], &self.bounds[1]) {
            return;
        }

        if tw.is_point {
            self.trace_point_through(tw);
            return;
        }

        for facet in &self.facets {
            let mut enter_frac = -1.0f32;
            let mut leave_frac = 1.0f32;
            let mut hit = false;
            let mut hitnum: Option<usize> = None;
            let mut bestplane = [0.0f32; 4];

            let plane = self.expanded_surface(tw, facet);
            if !check_facet_plane(&plane, &tw.start, &tw.end, &mut enter_frac, &mut leave_frac, &mut hit) {
                continue;
            }
            if hit {
                bestplane = plane;
            }

            let mut missed = false;
            for k in 0..facet.num_borders {
                let plane = self.expanded_border(tw, facet, k);
                if !check_facet_plane(&plane, &tw.start, &tw.end, &mut enter_frac, &mut leave_frac, &mut hit) {
                    missed = true;
                    break;
                }
                if hit {
                    hitnum = Some(k);
                    bestplane = plane;
                }
            }
            if missed {
                continue;
            }

            // never clip against the back side
            if hitnum == Some(facet.num_borders - 1) {
                continue;
            }

            if enter_frac < leave_frac && enter_frac >= 0.0 && enter_frac < tw.trace.fraction {
                tw.trace.fraction = enter_frac;
                tw.trace.plane = CPlane::from_vec4(&bestplane);
            }
        }
    }

    /// Point traces: classify the segment against every plane once, then
    /// take the nearest surface crossing that lies inside all its borders.
    pub fn trace_point_through(&self, tw: &mut TraceWork) {
        let mut front_facing = Vec::with_capacity(self.planes.len());
        let mut intersection = Vec::with_capacity(self.planes.len());

        // determine the trace's relationship to all planes
        for pp in &self.planes {
            let normal = vec4_normal(&pp.plane);
            let offset = dot_product(&tw.offsets[pp.signbits as usize], &normal);
            let d1 = dot_product(&tw.start, &normal) - pp.plane[3] + offset;
            let d2 = dot_product(&tw.end, &normal) - pp.plane[3] + offset;
            front_facing.push(d1 > 0.0);
            let t = if d1 == d2 { 99999.0 } else { d1 / (d1 - d2) };
            intersection.push(if t <= 0.0 { 99999.0 } else { t });
        }

        // see if any of the surface planes are intersected
        for facet in &self.facets {
            let surface = facet.surface_plane as usize;
            if !front_facing[surface] {
                continue;
            }
            let intersect = intersection[surface];
            if intersect < 0.0 {
                continue; // surface is behind the starting point
            }
            if intersect > tw.trace.fraction {
                continue; // already hit something closer
            }

            let inside = facet.borders().all(|(k, inward)| {
                let k = k as usize;
                if front_facing[k] ^ inward {
                    intersection[k] <= intersect
                } else {
                    intersection[k] >= intersect
                }
            });
            if !inside {
                continue;
            }

            // we hit this facet; calculate intersection with a slight pushoff
            let pp = &self.planes[surface];
            let normal = vec4_normal(&pp.plane);
            let offset = dot_product(&tw.offsets[pp.signbits as usize], &normal);
            let d1 = dot_product(&tw.start, &normal) - pp.plane[3] + offset;
            let d2 = dot_product(&tw.end, &normal) - pp.plane[3] + offset;
            tw.trace.fraction = ((d1 - SURFACE_CLIP_EPSILON) / (d1 - d2)).max(0.0);
            tw.trace.plane = CPlane::from_vec4(&pp.plane);
        }
    }

    /// True if the trace box at its start position overlaps any facet volume.
    pub fn position_test(&self, tw: &TraceWork) -> bool {
        if tw.is_point {
            return false;
        }
        if !bounds_intersect(&tw.bounds[0], &tw.bounds[1], &self.bounds[0], &self.bounds[1]) {
            return false;
        }

        self.facets.iter().any(|facet| {
            let plane = self.expanded_surface(tw, facet);
            if dot_product(&tw.start, &vec4_normal(&plane)) - plane[3] > 0.0 {
                return false;
            }
            (0..facet.num_borders).all(|k| {
                let plane = self.expanded_border(tw, facet, k);
                dot_product(&tw.start, &vec4_normal(&plane)) - plane[3] <= 0.0
            })
        })
    }
}
