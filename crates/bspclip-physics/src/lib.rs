#![allow(dead_code)]
#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::manual_range_contains)]

pub mod pmove;
pub mod world;

pub use world::{CollisionObject, Motions, ObjectId, PhysicsWorld, Shape};
