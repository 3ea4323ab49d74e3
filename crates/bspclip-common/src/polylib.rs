// polylib.rs — winding (convex polygon) and plane construction utilities

use crate::common::com_error;
use crate::q_shared::{
    cross_product, dot_product, vector_add, vector_normalize, vector_scale, vector_subtract,
    Vec3, Vec4, ERR_FATAL, MAX_MAP_BOUNDS, SIDE_BACK, SIDE_FRONT, SIDE_ON,
};

pub const MAX_POINTS_ON_WINDING: usize = 96;

pub const NORMAL_EPSILON: f32 = 0.0001;
pub const DIST_EPSILON: f32 = 0.02;
pub const PLANE_TRI_EPSILON: f32 = 0.1;
pub const POINT_EPSILON: f32 = 0.1;
pub const WRAP_POINT_EPSILON: f32 = 0.1;

/// Ordered points of a convex polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Winding {
    pub p: Vec<Vec3>,
}

impl Winding {
    pub fn with_capacity(points: usize) -> Self {
        Self { p: Vec::with_capacity(points) }
    }

    pub fn num_points(&self) -> usize {
        self.p.len()
    }

    /// Axis-aligned bounds, seeded with the inverted world extents.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut mins = [MAX_MAP_BOUNDS; 3];
        let mut maxs = [-MAX_MAP_BOUNDS; 3];
        for p in &self.p {
            for j in 0..3 {
                if p[j] < mins[j] {
                    mins[j] = p[j];
                }
                if p[j] > maxs[j] {
                    maxs[j] = p[j];
                }
            }
        }
        (mins, maxs)
    }
}

/// Plane through three points, wound so that `a, b, c` runs clockwise
/// seen from the front. Returns `None` for collinear points.
pub fn plane_from_points(a: &Vec3, b: &Vec3, c: &Vec3) -> Option<Vec4> {
    let d1 = vector_subtract(b, a);
    let d2 = vector_subtract(c, a);
    let mut normal = cross_product(&d2, &d1);
    if vector_normalize(&mut normal) == 0.0 {
        return None;
    }
    Some([normal[0], normal[1], normal[2], dot_product(a, &normal)])
}

/// Projects a map-sized square onto the plane.
pub fn base_winding_for_plane(normal: &Vec3, dist: f32) -> Winding {
    // find the major axis
    let mut max = -MAX_MAP_BOUNDS;
    let mut x = None;
    for i in 0..3 {
        let v = normal[i].abs();
        if v > max {
            x = Some(i);
            max = v;
        }
    }

    let mut vup = [0.0f32; 3];
    match x {
        Some(0) | Some(1) => vup[2] = 1.0,
        Some(_) => vup[0] = 1.0,
        None => com_error(ERR_FATAL, "base_winding_for_plane: no axis found"),
    }

    let v = dot_product(&vup, normal);
    vup = vector_subtract(&vup, &vector_scale(normal, v));
    vector_normalize(&mut vup);

    let org = vector_scale(normal, dist);
    let vright = vector_scale(&cross_product(&vup, normal), MAX_MAP_BOUNDS);
    let vup = vector_scale(&vup, MAX_MAP_BOUNDS);

    let mut w = Winding::with_capacity(4);
    w.p.push(vector_add(&vector_subtract(&org, &vright), &vup));
    w.p.push(vector_add(&vector_add(&org, &vright), &vup));
    w.p.push(vector_subtract(&vector_add(&org, &vright), &vup));
    w.p.push(vector_subtract(&vector_subtract(&org, &vright), &vup));
    w
}

/// Clips the winding to the front of the plane.
///
/// All points behind: the winding is freed (`None`). No points behind: the
/// winding is left untouched. Otherwise it is replaced by the clipped polygon.
pub fn chop_winding_in_place(inout: &mut Option<Winding>, normal: &Vec3, dist: f32, epsilon: f32) {
    let Some(w) = inout.as_ref() else {
        return;
    };
    let numpoints = w.num_points();

    let mut dists = Vec::with_capacity(numpoints + 1);
    let mut sides = Vec::with_capacity(numpoints + 1);
    let mut counts = [0usize; 3];

    // determine sides for each point
    for p in &w.p {
        let d = dot_product(p, normal) - dist;
        let side = if d > epsilon {
            SIDE_FRONT
        } else if d < -epsilon {
            SIDE_BACK
        } else {
            SIDE_ON
        };
        dists.push(d);
        sides.push(side);
        counts[side as usize] += 1;
    }
    if numpoints > 0 {
        sides.push(sides[0]);
        dists.push(dists[0]);
    }

    if counts[SIDE_FRONT as usize] == 0 {
        *inout = None;
        return;
    }
    if counts[SIDE_BACK as usize] == 0 {
        return; // inout stays the same
    }

    // can't use counts[0]+2 because of fp grouping errors
    let maxpts = numpoints + 4;
    let mut f = Winding::with_capacity(maxpts);

    for i in 0..numpoints {
        let p1 = &w.p[i];

        if sides[i] == SIDE_ON {
            f.p.push(*p1);
            continue;
        }

        if sides[i] == SIDE_FRONT {
            f.p.push(*p1);
        }

        if sides[i + 1] == SIDE_ON || sides[i + 1] == sides[i] {
            continue;
        }

        // generate a split point
        let p2 = &w.p[(i + 1) % numpoints];
        let dot = dists[i] / (dists[i] - dists[i + 1]);
        let mut mid = [0.0f32; 3];
        for j in 0..3 {
            // avoid round off error when possible
            mid[j] = if normal[j] == 1.0 {
                dist
            } else if normal[j] == -1.0 {
                -dist
            } else {
                p1[j] + dot * (p2[j] - p1[j])
            };
        }
        f.p.push(mid);
    }

    if f.num_points() > maxpts {
        com_error(ERR_FATAL, "chop_winding_in_place: points exceeded estimate");
    }
    if f.num_points() > MAX_POINTS_ON_WINDING {
        com_error(ERR_FATAL, "chop_winding_in_place: MAX_POINTS_ON_WINDING");
    }

    *inout = Some(f);
}

/// Snap a nearly axial vector onto the axis.
pub fn snap_vector(normal: &mut Vec3) {
    for i in 0..3 {
        if (normal[i] - 1.0).abs() < NORMAL_EPSILON {
            *normal = [0.0; 3];
            normal[i] = 1.0;
            break;
        }
        if (normal[i] + 1.0).abs() < NORMAL_EPSILON {
            *normal = [0.0; 3];
            normal[i] = -1.0;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::vector_length;
    use rand::{Rng, SeedableRng};

    fn square(size: f32) -> Winding {
        Winding {
            p: vec![
                [-size, -size, 0.0],
                [size, -size, 0.0],
                [size, size, 0.0],
                [-size, size, 0.0],
            ],
        }
    }

    #[test]
    fn test_plane_from_points() {
        let plane = plane_from_points(&[0.0, 0.0, 5.0], &[0.0, 10.0, 5.0], &[10.0, 0.0, 5.0]).unwrap();
        assert_eq!([plane[0], plane[1], plane[2]], [0.0, 0.0, 1.0]);
        assert_eq!(plane[3], 5.0);
    }

    #[test]
    fn test_plane_from_collinear_points_fails() {
        assert!(plane_from_points(&[0.0; 3], &[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]).is_none());
        assert!(plane_from_points(&[3.0; 3], &[3.0; 3], &[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_plane_from_random_points_is_unit() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let mut pt = || -> Vec3 {
                [rng.gen_range(-512.0..512.0), rng.gen_range(-512.0..512.0), rng.gen_range(-512.0..512.0)]
            };
            let (a, b, c) = (pt(), pt(), pt());
            if let Some(plane) = plane_from_points(&a, &b, &c) {
                let n = [plane[0], plane[1], plane[2]];
                assert!((vector_length(&n) - 1.0).abs() < 1e-5);
                for p in [a, b, c] {
                    assert!((dot_product(&p, &n) - plane[3]).abs() < 0.05);
                }
            }
        }
    }

    #[test]
    fn test_base_winding_lies_on_plane() {
        let s = std::f32::consts::FRAC_1_SQRT_2;
        for (normal, dist) in [([0.0, 0.0, 1.0], 32.0), ([s, s, 0.0], -8.0), ([0.0, -1.0, 0.0], 100.0)] {
            let w = base_winding_for_plane(&normal, dist);
            assert_eq!(w.num_points(), 4);
            for p in &w.p {
                assert!((dot_product(p, &normal) - dist).abs() < 0.5);
            }
            let (mins, maxs) = w.bounds();
            assert!(maxs[0] - mins[0] > 1000.0 || maxs[1] - mins[1] > 1000.0);
        }
    }

    #[test]
    fn test_chop_keeps_front() {
        let mut w = Some(square(10.0));
        chop_winding_in_place(&mut w, &[1.0, 0.0, 0.0], 0.0, 0.1);
        let w = w.unwrap();
        assert_eq!(w.num_points(), 4);
        let (mins, maxs) = w.bounds();
        assert_eq!(mins[0], 0.0);
        assert_eq!(maxs[0], 10.0);
    }

    #[test]
    fn test_chop_all_back_frees() {
        let mut w = Some(square(10.0));
        chop_winding_in_place(&mut w, &[1.0, 0.0, 0.0], 20.0, 0.1);
        assert!(w.is_none());
    }

    #[test]
    fn test_chop_all_front_unchanged() {
        let orig = square(10.0);
        let mut w = Some(orig.clone());
        chop_winding_in_place(&mut w, &[0.0, 1.0, 0.0], -50.0, 0.1);
        assert_eq!(w, Some(orig));
    }

    #[test]
    fn test_chop_random_planes_stays_convex() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut w = Some(square(64.0));
            for _ in 0..6 {
                let before = match &w {
                    Some(w) => w.num_points(),
                    None => break,
                };
                let mut normal = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0];
                if vector_normalize(&mut normal) == 0.0 {
                    continue;
                }
                let dist = rng.gen_range(-48.0..48.0);
                chop_winding_in_place(&mut w, &normal, dist, 0.1);
                if let Some(out) = &w {
                    assert!(out.num_points() <= before + 1);
                    for p in &out.p {
                        assert!(dot_product(p, &normal) - dist > -0.2);
                    }
                    // every turn goes the same way
                    let n = out.num_points();
                    for i in 0..n {
                        let a = out.p[i];
                        let b = out.p[(i + 1) % n];
                        let c = out.p[(i + 2) % n];
                        let e1 = vector_subtract(&b, &a);
                        let e2 = vector_subtract(&c, &b);
                        assert!(cross_product(&e1, &e2)[2] > -1e-2);
                    }
                }
            }
        }
    }

    #[test]
    fn test_snap_vector() {
        let mut v = [0.00001, 0.99999, 0.0];
        snap_vector(&mut v);
        assert_eq!(v, [0.0, 1.0, 0.0]);
        let mut v = [0.6, 0.8, 0.0];
        snap_vector(&mut v);
        assert_eq!(v, [0.6, 0.8, 0.0]);
    }
}
