/*!
The view onto a world.

The camera's transform is the top-left corner of the view in world pixels. It eases towards
its target (an entity or a fixed point), stays inside the boundaries of the world it looks at
and can be shaken for a fraction of a second.
*/

use crate::clock::ContextClockExt;
use crate::context::{Context, DataPlugin};
use crate::entity::{ContextEntityExt, EntityId};
use crate::geometry::{tile_size, Vec2};
use crate::random::ContextRandomExt;
use crate::world::{ContextWorldExt, WorldId};
use log::trace;
use std::collections::VecDeque;

crate::define_rng!(CameraRng);

pub const DEFAULT_VIEW_SIZE: Vec2 = Vec2 {
    x: 1280.0,
    y: 720.0,
};
pub const SHAKE_TIME: f64 = 0.2;
pub const SHAKE_FORCE: f64 = 5.0;

/// Fraction of the remaining distance covered per second.
const CAMERA_SPEED: f64 = 2.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CameraTarget {
    Entity(EntityId),
    Position(Vec2),
}

/// Random offsets applied one per frame, after which the camera returns to `origin`.
#[derive(Clone, Debug)]
struct Shaker {
    origin: Vec2,
    offsets: VecDeque<Vec2>,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub transform: Vec2,
    pub view_size: Vec2,
    pub velocity: Vec2,
    pub speed: f64,
    target: Option<CameraTarget>,
    world: Option<WorldId>,
    /// Lowest and highest allowed transform.
    boundaries: Option<(Vec2, Vec2)>,
    shaker: Option<Shaker>,
}

impl DataPlugin for Camera {
    fn init() -> Self {
        Camera {
            transform: Vec2::ZERO,
            view_size: DEFAULT_VIEW_SIZE,
            velocity: Vec2::ZERO,
            speed: CAMERA_SPEED,
            target: None,
            world: None,
            boundaries: None,
            shaker: None,
        }
    }
}

impl Camera {
    #[must_use]
    pub fn centre(&self) -> Vec2 {
        self.transform + self.view_size * 0.5
    }

    #[must_use]
    pub fn target(&self) -> Option<CameraTarget> {
        self.target
    }

    #[must_use]
    pub fn world(&self) -> Option<WorldId> {
        self.world
    }

    #[must_use]
    pub fn is_shaking(&self) -> bool {
        self.shaker.is_some()
    }

    /// Screen position to world position.
    #[must_use]
    pub fn to_world(&self, screen: Vec2) -> Vec2 {
        screen + self.transform
    }

    fn update_boundaries(&mut self, world_size: Vec2) {
        // a world smaller than the view is centred on that axis
        let axis = |world: f64, view: f64| {
            let max = world - view;
            if max < 0.0 {
                (max / 2.0, max / 2.0)
            } else {
                (0.0, max)
            }
        };
        let (min_x, max_x) = axis(world_size.x, self.view_size.x);
        let (min_y, max_y) = axis(world_size.y, self.view_size.y);
        self.boundaries = Some((Vec2::new(min_x, min_y), Vec2::new(max_x, max_y)));
        self.clamp();
    }

    fn clamp(&mut self) {
        if let Some((min, max)) = self.boundaries {
            self.transform.x = self.transform.x.clamp(min.x, max.x);
            self.transform.y = self.transform.y.clamp(min.y, max.y);
        }
    }

    /// Returns true while a shake is still in progress.
    fn tick_shaker(&mut self) -> bool {
        let Some(shaker) = self.shaker.as_mut() else {
            return false;
        };
        match shaker.offsets.pop_front() {
            Some(offset) => self.transform = shaker.origin + offset,
            None => {
                self.transform = shaker.origin;
                self.shaker = None;
            }
        }
        true
    }
}

pub trait ContextCameraExt {
    /// Sets the view size, normally the display resolution.
    fn init_camera(&mut self, view_size: Vec2);

    fn camera(&self) -> &Camera;

    /// Looks at `world`, limiting the view to its area.
    fn set_camera_world(&mut self, world: WorldId);

    fn follow(&mut self, target: Option<CameraTarget>);

    /// Eases towards the target, or runs the shake if there is one.
    fn tick_camera(&mut self);

    /// Jumps so that `position` (or the target, if `None`) is in the middle of the view.
    fn centre_camera(&mut self, position: Option<Vec2>);

    /// Moves the camera by `velocity` for one frame.
    fn move_camera(&mut self, velocity: Vec2);

    fn shake_camera(&mut self, time: f64, force: f64);
}

impl ContextCameraExt for Context {
    fn init_camera(&mut self, view_size: Vec2) {
        let world = {
            let camera = self.get_data_container_mut::<Camera>();
            camera.view_size = view_size;
            camera.world
        };
        if let Some(world) = world {
            self.set_camera_world(world);
        }
    }

    fn camera(&self) -> &Camera {
        self.get_data_container::<Camera>()
            .expect("camera has not been initialised")
    }

    fn set_camera_world(&mut self, world: WorldId) {
        let w = self.world(world);
        let size = Vec2::new(w.pixel_width(), w.pixel_height());
        let camera = self.get_data_container_mut::<Camera>();
        camera.world = Some(world);
        camera.update_boundaries(size);
        trace!("camera now looking at {world}");
    }

    fn follow(&mut self, target: Option<CameraTarget>) {
        self.get_data_container_mut::<Camera>().target = target;
    }

    fn tick_camera(&mut self) {
        let delta = self.delta();
        let target = self.get_data_container_mut::<Camera>().target;
        let target = match target {
            Some(CameraTarget::Entity(id)) => Some(self.entity(id).transform),
            Some(CameraTarget::Position(position)) => Some(position),
            None => None,
        };

        let camera = self.get_data_container_mut::<Camera>();
        if camera.tick_shaker() {
            return;
        }
        let Some(target) = target else {
            return;
        };

        let offset = target - camera.centre();
        let tile = tile_size();
        if offset.length_sqrd() < tile * tile / 2.0 {
            camera.velocity = Vec2::ZERO;
            return;
        }
        camera.velocity = offset * camera.speed;
        camera.transform += camera.velocity * delta;
        camera.clamp();
    }

    fn centre_camera(&mut self, position: Option<Vec2>) {
        let target = self.get_data_container_mut::<Camera>().target;
        let position = match (position, target) {
            (Some(position), _) | (None, Some(CameraTarget::Position(position))) => position,
            (None, Some(CameraTarget::Entity(id))) => self.entity(id).transform,
            (None, None) => return,
        };
        let camera = self.get_data_container_mut::<Camera>();
        camera.transform = position - camera.view_size * 0.5;
        camera.clamp();
    }

    fn move_camera(&mut self, velocity: Vec2) {
        let delta = self.delta();
        let camera = self.get_data_container_mut::<Camera>();
        camera.velocity = velocity;
        camera.transform += velocity * delta;
        camera.clamp();
    }

    fn shake_camera(&mut self, time: f64, force: f64) {
        let count = (time / self.delta()).round().max(0.0) as usize;
        let offsets = (0..count)
            .map(|_| {
                Vec2::new(
                    self.sample_range::<CameraRng, _, f64>(-force..=force),
                    self.sample_range::<CameraRng, _, f64>(-force..=force),
                )
            })
            .collect();
        let camera = self.get_data_container_mut::<Camera>();
        // a shake already underway keeps its origin
        let origin = camera
            .shaker
            .as_ref()
            .map_or(camera.transform, |s| s.origin);
        camera.shaker = Some(Shaker { origin, offsets });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{World, WorldKind};

    fn setup(width: usize, height: usize, view: Vec2) -> (Context, WorldId) {
        let mut context = Context::new();
        let row = ".".repeat(width);
        let rows: Vec<&str> = (0..height).map(|_| row.as_str()).collect();
        let world = World::from_ascii(WorldId(0), "test", WorldKind::Outside, &rows).unwrap();
        let world = context.add_world(world);
        context.init_camera(view);
        context.set_camera_world(world);
        (context, world)
    }

    #[test]
    fn centring_is_clamped_to_the_world() {
        let (mut context, _) = setup(40, 30, Vec2::new(320.0, 240.0));
        context.centre_camera(Some(Vec2::new(10.0, 10.0)));
        assert_eq!(context.camera().transform, Vec2::ZERO);
        context.centre_camera(Some(Vec2::new(5000.0, 5000.0)));
        assert_eq!(context.camera().transform, Vec2::new(1280.0 - 320.0, 960.0 - 240.0));
        context.centre_camera(Some(Vec2::new(640.0, 480.0)));
        assert_eq!(context.camera().centre(), Vec2::new(640.0, 480.0));
    }

    #[test]
    fn small_worlds_are_centred() {
        let (mut context, _) = setup(5, 5, Vec2::new(320.0, 240.0));
        context.centre_camera(Some(Vec2::new(1000.0, 0.0)));
        assert_eq!(context.camera().transform, Vec2::new(-80.0, -40.0));
    }

    #[test]
    fn easing_stops_near_the_target() {
        let (mut context, _) = setup(40, 30, Vec2::new(320.0, 240.0));
        context.follow(Some(CameraTarget::Position(Vec2::new(400.0, 300.0))));
        let start = context.camera().centre();
        context.tick_camera();
        let after = context.camera().centre();
        assert!(after.x > start.x && after.y > start.y);
        for _ in 0..600 {
            context.tick_camera();
        }
        let left = Vec2::new(400.0, 300.0) - context.camera().centre();
        assert!(left.length_sqrd() < tile_size() * tile_size() / 2.0);
        assert_eq!(context.camera().velocity, Vec2::ZERO);
    }

    #[test]
    fn shaking_returns_to_the_origin() {
        let (mut context, _) = setup(40, 30, Vec2::new(320.0, 240.0));
        context.centre_camera(Some(Vec2::new(400.0, 300.0)));
        let origin = context.camera().transform;
        context.shake_camera(SHAKE_TIME, SHAKE_FORCE);
        assert!(context.camera().is_shaking());
        for _ in 0..12 {
            context.tick_camera();
            let offset = context.camera().transform - origin;
            assert!(offset.x.abs() <= SHAKE_FORCE && offset.y.abs() <= SHAKE_FORCE);
        }
        context.tick_camera();
        assert!(!context.camera().is_shaking());
        assert_eq!(context.camera().transform, origin);
    }
}
