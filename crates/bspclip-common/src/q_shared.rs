// q_shared.rs — shared math types, plane classification and trace results

pub type Vec3 = [f32; 3];

/// Plane packed as `[nx, ny, nz, dist]`; points on the plane satisfy `dot(n, p) == dist`.
pub type Vec4 = [f32; 4];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// ============================================================
// Error codes
// ============================================================

pub const ERR_FATAL: i32 = 0;

// ============================================================
// World limits and epsilons
// ============================================================

/// Half extent of the largest representable level.
pub const MAX_MAP_BOUNDS: f32 = 65535.0;

/// Traces stop this far in front of the surface they hit.
pub const SURFACE_CLIP_EPSILON: f32 = 0.125;

// ============================================================
// Plane types
// ============================================================

pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
pub const PLANE_NON_AXIAL: u8 = 3;

pub const SIDE_FRONT: i32 = 0;
pub const SIDE_BACK: i32 = 1;
pub const SIDE_ON: i32 = 2;

// ============================================================
// Contents flags (brush/shader content classification)
// ============================================================

pub const CONTENTS_SOLID: i32 = 0x1;
pub const CONTENTS_LAVA: i32 = 0x8;
pub const CONTENTS_SLIME: i32 = 0x10;
pub const CONTENTS_WATER: i32 = 0x20;
pub const CONTENTS_FOG: i32 = 0x40;

pub const CONTENTS_AREAPORTAL: i32 = 0x8000;
pub const CONTENTS_PLAYERCLIP: i32 = 0x10000;
pub const CONTENTS_MONSTERCLIP: i32 = 0x20000;
pub const CONTENTS_TELEPORTER: i32 = 0x40000;
pub const CONTENTS_JUMPPAD: i32 = 0x80000;
pub const CONTENTS_CLUSTERPORTAL: i32 = 0x100000;
pub const CONTENTS_DONOTENTER: i32 = 0x200000;
pub const CONTENTS_BOTCLIP: i32 = 0x400000;
pub const CONTENTS_MOVER: i32 = 0x800000;
pub const CONTENTS_ORIGIN: i32 = 0x1000000;
pub const CONTENTS_BODY: i32 = 0x2000000;
pub const CONTENTS_CORPSE: i32 = 0x4000000;
pub const CONTENTS_DETAIL: i32 = 0x8000000;
pub const CONTENTS_STRUCTURAL: i32 = 0x10000000;
pub const CONTENTS_TRANSLUCENT: i32 = 0x20000000;
pub const CONTENTS_TRIGGER: i32 = 0x40000000;
pub const CONTENTS_NODROP: i32 = 0x80000000_u32 as i32;

pub const MASK_ALL: i32 = -1;
pub const MASK_SOLID: i32 = CONTENTS_SOLID;
pub const MASK_PLAYERSOLID: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP | CONTENTS_BODY;
pub const MASK_DEADSOLID: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP;
pub const MASK_WATER: i32 = CONTENTS_WATER | CONTENTS_LAVA | CONTENTS_SLIME;
pub const MASK_SHOT: i32 = CONTENTS_SOLID | CONTENTS_BODY | CONTENTS_CORPSE;

// ============================================================
// Surface flags (per-shader, reported on impact)
// ============================================================

pub const SURF_NODAMAGE: i32 = 0x1;
pub const SURF_SLICK: i32 = 0x2;
pub const SURF_SKY: i32 = 0x4;
pub const SURF_LADDER: i32 = 0x8;
pub const SURF_NOIMPACT: i32 = 0x10;
pub const SURF_NOMARKS: i32 = 0x20;
pub const SURF_FLESH: i32 = 0x40;
pub const SURF_NODRAW: i32 = 0x80;
pub const SURF_HINT: i32 = 0x100;
pub const SURF_SKIP: i32 = 0x200;
pub const SURF_NOLIGHTMAP: i32 = 0x400;
pub const SURF_POINTLIGHT: i32 = 0x800;
pub const SURF_METALSTEPS: i32 = 0x1000;
pub const SURF_NOSTEPS: i32 = 0x2000;
pub const SURF_NONSOLID: i32 = 0x4000;

// ============================================================
// Plane
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8, // for fast side tests
    pub signbits: u8,   // signx + (signy<<1) + (signz<<2)
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: 0,
            signbits: 0,
        }
    }
}

impl CPlane {
    /// Build a plane and precompute its type and signbits.
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self {
            normal,
            dist,
            plane_type: plane_type_for_normal(&normal),
            signbits: signbits_for_normal(&normal),
        }
    }

    pub fn from_vec4(plane: &Vec4) -> Self {
        Self::new([plane[0], plane[1], plane[2]], plane[3])
    }

    /// Signed distance from `p` to the plane.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        if self.plane_type < PLANE_NON_AXIAL {
            p[self.plane_type as usize] - self.dist
        } else {
            dot_product(&self.normal, p) - self.dist
        }
    }
}

/// Classify a normal as axial (X/Y/Z) or non-axial.
pub fn plane_type_for_normal(normal: &Vec3) -> u8 {
    if normal[0] == 1.0 {
        PLANE_X
    } else if normal[1] == 1.0 {
        PLANE_Y
    } else if normal[2] == 1.0 {
        PLANE_Z
    } else {
        PLANE_NON_AXIAL
    }
}

/// Bitmask with bit `j` set when `normal[j]` is negative.
pub fn signbits_for_normal(normal: &[f32]) -> u8 {
    let mut bits = 0u8;
    for j in 0..3 {
        if normal[j] < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

/// Returns 1 if the box is entirely in front, 2 if entirely behind, 3 if it straddles.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
    // fast axial cases
    if p.plane_type < PLANE_NON_AXIAL {
        let t = p.plane_type as usize;
        if p.dist <= emins[t] {
            return 1;
        }
        if p.dist >= emaxs[t] {
            return 2;
        }
        return 3;
    }

    // general case: pick the corners nearest and farthest along the normal
    let mut near = [0.0f32; 3];
    let mut far = [0.0f32; 3];
    for i in 0..3 {
        if p.signbits & (1 << i) != 0 {
            far[i] = emins[i];
            near[i] = emaxs[i];
        } else {
            far[i] = emaxs[i];
            near[i] = emins[i];
        }
    }
    let dist1 = dot_product(&p.normal, &far);
    let dist2 = dot_product(&p.normal, &near);

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = 1;
    }
    if dist2 < p.dist {
        sides |= 2;
    }
    sides
}

// ============================================================
// Trace result
// ============================================================

/// Result of a single swept-box query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    pub allsolid: bool,   // if true, plane is not valid
    pub startsolid: bool, // if true, the initial point was in a solid area
    pub fraction: f32,    // time completed, 1.0 = didn't hit anything
    pub endpos: Vec3,     // final position
    pub plane: CPlane,    // surface normal at impact
    pub surface_flags: i32,
    pub contents: i32,    // contents on other side of surface hit
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: CPlane::default(),
            surface_flags: 0,
            contents: 0,
        }
    }
}

// ============================================================
// Vector math
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// Midpoint of `a` and `b`.
#[inline]
pub fn vector_average(a: &Vec3, b: &Vec3) -> Vec3 {
    [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5, (a[2] + b[2]) * 0.5]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

pub fn vector_compare(v1: &Vec3, v2: &Vec3) -> bool {
    v1[0] == v2[0] && v1[1] == v2[1] && v1[2] == v2[2]
}

pub fn clear_bounds(mins: &mut Vec3, maxs: &mut Vec3) {
    *mins = [99999.0; 3];
    *maxs = [-99999.0; 3];
}

pub fn add_point_to_bounds(v: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    for i in 0..3 {
        if v[i] < mins[i] {
            mins[i] = v[i];
        }
        if v[i] > maxs[i] {
            maxs[i] = v[i];
        }
    }
}

/// True if two boxes overlap, allowing `SURFACE_CLIP_EPSILON` of slack.
pub fn bounds_intersect(mins: &Vec3, maxs: &Vec3, mins2: &Vec3, maxs2: &Vec3) -> bool {
    for i in 0..3 {
        if maxs[i] < mins2[i] - SURFACE_CLIP_EPSILON || mins[i] > maxs2[i] + SURFACE_CLIP_EPSILON {
            return false;
        }
    }
    true
}

#[inline]
pub fn vec4_normal(plane: &Vec4) -> Vec3 {
    [plane[0], plane[1], plane[2]]
}

/// Flip a packed plane so it faces the other way.
#[inline]
pub fn vec4_flip(plane: &Vec4) -> Vec4 {
    [-plane[0], -plane[1], -plane[2], -plane[3]]
}
