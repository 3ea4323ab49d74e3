// world.rs — physics world: collision objects tracked against a loaded level

use bspclip_common::cmodel::CModelContext;
use bspclip_common::common::com_dprintf;
use bspclip_common::q_shared::{Trace, Vec3, MASK_PLAYERSOLID};
use bspclip_common::qfiles::BspData;

use crate::pmove::move_object;

/// Default height an object may climb without jumping.
pub const STEPSIZE: f32 = 18.0;

/// Identifies the game-side actor a collision object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motions {
    pub translation: Vec3,
    pub velocity: Vec3, // units per second
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub bounding: [Vec3; 2], // mins, maxs relative to translation
    pub step_height: f32,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            bounding: [[0.0; 3]; 2],
            step_height: STEPSIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionObject {
    pub object: Option<ObjectId>,
    pub motions: Motions,
    pub shape: Shape,
    pub on_ground: bool,
}

/// A loaded level plus the objects moving through it. Only the camera is
/// tracked.
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    cm: CModelContext,
    camera: CollisionObject,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bsp(bsp: &BspData) -> Self {
        let mut world = Self::new();
        world.init_physics_world(bsp);
        world
    }

    /// Builds the collision data for `bsp`; tracked objects are kept.
    pub fn init_physics_world(&mut self, bsp: &BspData) {
        self.cm.load_map(bsp);
    }

    pub fn cmodel(&self) -> &CModelContext {
        &self.cm
    }

    pub fn cmodel_mut(&mut self) -> &mut CModelContext {
        &mut self.cm
    }

    /// Starts tracking `obj` as the camera with a fresh collision object.
    pub fn set_camera(&mut self, obj: ObjectId) -> &mut CollisionObject {
        self.camera = CollisionObject {
            object: Some(obj),
            ..CollisionObject::default()
        };
        &mut self.camera
    }

    pub fn camera(&self) -> &CollisionObject {
        &self.camera
    }

    /// The collision object tracking `obj`, if any.
    pub fn find(&mut self, obj: ObjectId) -> Option<&mut CollisionObject> {
        // the camera is checked first
        if self.camera.object == Some(obj) {
            return Some(&mut self.camera);
        }
        None
    }

    /// Advances every tracked object by `frametime` seconds.
    pub fn simulate(&mut self, frametime: f32) {
        if self.camera.object.is_none() {
            return;
        }
        move_object(&mut self.camera, &self.cm, frametime);

        let m = &self.camera.motions;
        com_dprintf(&format!(
            "camera at ({:.3} {:.3} {:.3}) vel ({:.3} {:.3} {:.3}){}\n",
            m.translation[0],
            m.translation[1],
            m.translation[2],
            m.velocity[0],
            m.velocity[1],
            m.velocity[2],
            if self.camera.on_ground { " on ground" } else { "" }
        ));
    }

    /// Box trace against the level with the mask movement uses.
    pub fn trace(&self, start: &Vec3, end: &Vec3, mins: &Vec3, maxs: &Vec3) -> Trace {
        self.cm.box_trace(start, end, mins, maxs, MASK_PLAYERSOLID)
    }
}
