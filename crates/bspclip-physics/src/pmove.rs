// pmove.rs — sliding and stepping movement of a collision object

use bspclip_common::cmodel::CModelContext;
use bspclip_common::q_shared::{
    cross_product, dot_product, vector_scale, Trace, Vec3, MASK_PLAYERSOLID, VEC3_ORIGIN,
};

use crate::world::CollisionObject;

pub const STOP_EPSILON: f32 = 0.1;
pub const MIN_STEP_NORMAL: f32 = 0.7;
pub const MAX_CLIP_PLANES: usize = 5;
pub const OVERCLIP: f32 = 1.01;

/// How far below the object the ground check reaches.
pub const GROUND_CHECK_DISTANCE: f32 = 1.0;

/// Trace provider for movement.
pub trait MoveCallbacks {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace;
}

impl MoveCallbacks for CModelContext {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace {
        self.box_trace(start, end, mins, maxs, MASK_PLAYERSOLID)
    }
}

/// Slide off of the impacting surface.
pub fn clip_velocity(inv: &Vec3, normal: &Vec3, out: &mut Vec3, overbounce: f32) {
    let backoff = dot_product(inv, normal) * overbounce;
    for i in 0..3 {
        let change = normal[i] * backoff;
        out[i] = inv[i] - change;
        if out[i] > -STOP_EPSILON && out[i] < STOP_EPSILON {
            out[i] = 0.0;
        }
    }
}

struct MoveContext<'a, C: MoveCallbacks> {
    cb: &'a C,
    origin: Vec3,
    velocity: Vec3,
    mins: Vec3,
    maxs: Vec3,
    frametime: f32,
}

impl<'a, C: MoveCallbacks> MoveContext<'a, C> {
    fn slide_move(&mut self) {
        let numbumps = 4;
        let primal_velocity = self.velocity;
        let mut numplanes: usize = 0;
        let mut planes = [[0.0f32; 3]; MAX_CLIP_PLANES];

        let mut time_left = self.frametime;

        for _bumpcount in 0..numbumps {
            let end = [
                self.origin[0] + time_left * self.velocity[0],
                self.origin[1] + time_left * self.velocity[1],
                self.origin[2] + time_left * self.velocity[2],
            ];

            let trace = self.cb.trace(&self.origin, &self.mins, &self.maxs, &end);

            if trace.allsolid {
                // trapped in a solid
                self.velocity[2] = 0.0;
                return;
            }

            if trace.fraction > 0.0 {
                // actually covered some distance
                self.origin = trace.endpos;
                numplanes = 0;
            }

            if trace.fraction == 1.0 {
                break; // moved the entire distance
            }

            time_left -= time_left * trace.fraction;

            // slide along this plane
            if numplanes >= MAX_CLIP_PLANES {
                self.velocity = VEC3_ORIGIN;
                break;
            }

            planes[numplanes] = trace.plane.normal;
            numplanes += 1;

            // modify velocity so it parallels all of the clip planes
            let mut found = false;
            for i in 0..numplanes {
                let inv = self.velocity;
                clip_velocity(&inv, &planes[i], &mut self.velocity, OVERCLIP);
                let ok = (0..numplanes).all(|j| j == i || dot_product(&self.velocity, &planes[j]) >= 0.0);
                if ok {
                    found = true;
                    break;
                }
            }

            if !found {
                // go along the crease
                if numplanes != 2 {
                    self.velocity = VEC3_ORIGIN;
                    break;
                }
                let dir = cross_product(&planes[0], &planes[1]);
                let d = dot_product(&dir, &self.velocity);
                self.velocity = vector_scale(&dir, d);
            }

            // if velocity is against the original velocity, stop dead
            if dot_product(&self.velocity, &primal_velocity) <= 0.0 {
                self.velocity = VEC3_ORIGIN;
                break;
            }
        }
    }

    fn step_slide_move(&mut self, step_height: f32) {
        let start_o = self.origin;
        let start_v = self.velocity;

        self.slide_move();

        if step_height <= 0.0 {
            return;
        }

        let down_o = self.origin;
        let down_v = self.velocity;

        let mut up = start_o;
        up[2] += step_height;

        let trace = self.cb.trace(&up, &self.mins, &self.maxs, &up);
        if trace.allsolid {
            return; // can't step up
        }

        // try sliding above
        self.origin = up;
        self.velocity = start_v;

        self.slide_move();

        // push down the final amount
        let mut down = self.origin;
        down[2] -= step_height;
        let trace = self.cb.trace(&self.origin, &self.mins, &self.maxs, &down);
        if !trace.allsolid {
            self.origin = trace.endpos;
        }

        let up = self.origin;

        // decide which one went farther
        let down_dist = (down_o[0] - start_o[0]) * (down_o[0] - start_o[0])
            + (down_o[1] - start_o[1]) * (down_o[1] - start_o[1]);
        let up_dist = (up[0] - start_o[0]) * (up[0] - start_o[0]) + (up[1] - start_o[1]) * (up[1] - start_o[1]);

        if down_dist > up_dist || trace.plane.normal[2] < MIN_STEP_NORMAL {
            self.origin = down_o;
            self.velocity = down_v;
            return;
        }
        // if we were walking along a plane, then we need to copy the Z over
        self.velocity[2] = down_v[2];
    }

    /// Traces straight down; standing needs a walkable plane within reach.
    fn check_ground(&self) -> bool {
        let mut point = self.origin;
        point[2] -= GROUND_CHECK_DISTANCE;
        let trace = self.cb.trace(&self.origin, &self.mins, &self.maxs, &point);
        !trace.allsolid && trace.fraction < 1.0 && trace.plane.normal[2] >= MIN_STEP_NORMAL
    }
}

/// Advances `obj` by its velocity over `frametime`, sliding along and
/// stepping over whatever it hits, then refreshes `on_ground`.
pub fn move_object(obj: &mut CollisionObject, cb: &impl MoveCallbacks, frametime: f32) {
    let mut ctx = MoveContext {
        cb,
        origin: obj.motions.translation,
        velocity: obj.motions.velocity,
        mins: obj.shape.bounding[0],
        maxs: obj.shape.bounding[1],
        frametime,
    };

    if ctx.velocity != VEC3_ORIGIN && frametime > 0.0 {
        ctx.step_slide_move(obj.shape.step_height);
    }

    obj.on_ground = ctx.check_ground();
    if obj.on_ground && ctx.velocity[2] < 0.0 {
        ctx.velocity[2] = 0.0;
    }
    obj.motions.translation = ctx.origin;
    obj.motions.velocity = ctx.velocity;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Floor at z=0 for any box.
    struct FloorCallbacks;

    impl MoveCallbacks for FloorCallbacks {
        fn trace(&self, start: &Vec3, mins: &Vec3, _maxs: &Vec3, end: &Vec3) -> Trace {
            let floor = -mins[2];
            if end[2] < floor {
                let frac = if (start[2] - end[2]).abs() > f32::EPSILON {
                    ((start[2] - floor) / (start[2] - end[2])).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let mut tr = Trace {
                    fraction: frac,
                    endpos: [
                        start[0] + frac * (end[0] - start[0]),
                        start[1] + frac * (end[1] - start[1]),
                        floor,
                    ],
                    ..Trace::default()
                };
                tr.plane.normal = [0.0, 0.0, 1.0];
                tr
            } else {
                Trace {
                    endpos: *end,
                    ..Trace::default()
                }
            }
        }
    }

    #[test]
    fn test_clip_velocity() {
        let mut out = [0.0; 3];
        clip_velocity(&[10.0, 0.0, -10.0], &[0.0, 0.0, 1.0], &mut out, 1.0);
        assert_eq!(out, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clip_velocity_overbounce() {
        let mut out = [0.0; 3];
        clip_velocity(&[0.0, 0.0, -100.0], &[0.0, 0.0, 1.0], &mut out, OVERCLIP);
        assert!((out[2] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_clip_velocity_stop_epsilon() {
        let mut out = [0.0; 3];
        clip_velocity(&[0.05, 5.0, 0.0], &[0.0, 1.0, 0.0], &mut out, 1.0);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fall_onto_floor() {
        let mut obj = CollisionObject::default();
        obj.shape.bounding = [[-16.0, -16.0, -24.0], [16.0, 16.0, 32.0]];
        obj.motions.translation = [0.0, 0.0, 100.0];
        obj.motions.velocity = [50.0, 0.0, -200.0];
        move_object(&mut obj, &FloorCallbacks, 1.0);
        assert!((obj.motions.translation[2] - 24.0).abs() < 1e-3);
        assert!(obj.on_ground);
        assert!(obj.motions.velocity[2] >= 0.0);
    }

    #[test]
    fn test_free_flight() {
        let mut obj = CollisionObject::default();
        obj.motions.translation = [0.0, 0.0, 100.0];
        obj.motions.velocity = [10.0, 20.0, 0.0];
        move_object(&mut obj, &FloorCallbacks, 0.5);
        assert_eq!(obj.motions.translation, [5.0, 10.0, 100.0]);
        assert_eq!(obj.motions.velocity, [10.0, 20.0, 0.0]);
        assert!(!obj.on_ground);
    }
}
