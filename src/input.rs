/*!
Player input.

The player controls at most one entity at a time. Keys go to that entity's controller, or to
the free camera when nothing is controlled. Clicking an entity takes control of it; clicking a
door looks inside its building.
*/

use crate::block::BlockType;
use crate::building::ContextBuildingExt;
use crate::camera::{CameraTarget, ContextCameraExt, SHAKE_FORCE, SHAKE_TIME};
use crate::clock::ContextClockExt;
use crate::context::{Context, DataPlugin};
use crate::controller::{
    DriveState, Engine, Key, Movement, VehicleCrashEvent, CAMERA_FAST_SPEED, CAMERA_MIN_SPEED,
};
use crate::entity::{ContextEntityExt, ContextEntityExtInternal, EntityId, EntityKind};
use crate::geometry::{pixel_to_tile, tile_size, Vec2};
use crate::state::{ContextStateExt, View};
use crate::world::ContextWorldExt;
use log::{debug, info, warn};

/// Crashes faster than this shake the camera when the player is driving.
const CRASH_SHAKE_SPEED: f64 = 150.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Screen position of a left click.
    MouseClick(Vec2),
}

/// Camera movement while nobody is controlled. It starts at full speed and glides to a stop.
#[derive(Clone, Debug)]
pub struct FreeCamera {
    movement: Movement,
    engine: Engine,
    state: DriveState,
    heading: Vec2,
}

impl Default for FreeCamera {
    fn default() -> Self {
        FreeCamera {
            movement: Movement::new(CAMERA_MIN_SPEED, CAMERA_FAST_SPEED),
            engine: Engine::new(300.0, -1.0, 2.5),
            state: DriveState::Stopped,
            heading: Vec2::ZERO,
        }
    }
}

impl FreeCamera {
    fn handle(&mut self, key: Key, down: bool) -> bool {
        if !self.movement.handle(key, down) {
            return false;
        }
        if self.movement.keys.any() {
            self.heading = self.movement.velocity().normalized();
            self.state = DriveState::Accelerating;
        } else {
            self.state = DriveState::Braking;
        }
        true
    }

    fn halt(&mut self) {
        self.movement.halt();
        self.state = DriveState::Braking;
    }

    fn tick(&mut self, delta: f64) -> Vec2 {
        self.heading * self.engine.speed(self.state, delta)
    }
}

#[derive(Default)]
struct PlayerData {
    controlled: Option<EntityId>,
    free_camera: FreeCamera,
}

impl DataPlugin for PlayerData {
    fn init() -> Self {
        PlayerData::default()
    }
}

pub trait ContextPlayerExt {
    /// Shakes the camera when the player crashes hard.
    fn init_player(&mut self);

    fn controlled_entity(&self) -> Option<EntityId>;

    /// Hands control to `entity`, or back to the free camera. The camera follows.
    fn transfer_control(&mut self, entity: Option<EntityId>);

    /// Returns true if the event was used.
    fn handle_input(&mut self, event: InputEvent) -> bool;

    /// Moves the free camera, if nothing is controlled.
    fn tick_free_camera(&mut self);
}

trait ContextPlayerExtInternal {
    fn click(&mut self, screen: Vec2) -> bool;
    fn interact(&mut self) -> bool;
}

impl ContextPlayerExtInternal for Context {
    fn click(&mut self, screen: Vec2) -> bool {
        let Some(world) = self.current_world() else {
            return false;
        };
        let position = self.camera().to_world(screen);
        let tile = tile_size();

        if let Some(closest) = self.nearest_entity(world, position, tile * tile, |_| true) {
            let entity = self.entity(closest);
            let target = match entity.kind {
                // empty vehicles can't be driven
                EntityKind::Vehicle => (!entity.is_empty()).then_some(closest),
                EntityKind::Human => Some(entity.vehicle().unwrap_or(closest)),
            };
            return match target {
                Some(target) => {
                    self.transfer_control(Some(target));
                    true
                }
                None => false,
            };
        }

        let tile = pixel_to_tile(position);
        let Some((building, blocktype)) = self
            .world(world)
            .get_door_block(tile)
            .and_then(|b| Some((b.building?, b.blocktype)))
        else {
            return false;
        };

        let entering = blocktype == BlockType::SlidingDoor;
        let door = if entering {
            self.push_view(View::Building(building));
            self.building(building)
                .doors
                .iter()
                .find(|d| pixel_to_tile(d.outside) == tile)
                .map(|d| d.inside)
        } else {
            self.pop_view();
            self.building(building).closest_exit(position)
        };

        match door {
            Some(door) => {
                self.transfer_control(None);
                self.centre_camera(Some(door));
            }
            None => warn!(
                "could not find the {} door of {building}",
                if entering { "entrance" } else { "exit" }
            ),
        }
        true
    }

    fn interact(&mut self) -> bool {
        let Some(controlled) = self.controlled_entity() else {
            return false;
        };
        let entity = self.entity(controlled);
        match entity.kind {
            EntityKind::Human => {
                let tile = tile_size();
                let nearby = self.nearest_entity(
                    entity.world,
                    entity.transform,
                    tile * tile,
                    |e| e.kind == EntityKind::Vehicle,
                );
                nearby.is_some_and(|vehicle| self.enter_vehicle(vehicle, controlled))
            }
            EntityKind::Vehicle => entity
                .first_full_seat()
                .is_some_and(|seat| self.exit_vehicle(controlled, seat)),
        }
    }
}

impl ContextPlayerExt for Context {
    fn init_player(&mut self) {
        self.subscribe_to_event(|context, event: VehicleCrashEvent| {
            if context.controlled_entity() == Some(event.vehicle) && event.speed > CRASH_SHAKE_SPEED {
                context.shake_camera(SHAKE_TIME, SHAKE_FORCE);
            }
        });
    }

    fn controlled_entity(&self) -> Option<EntityId> {
        self.get_data_container::<PlayerData>()
            .and_then(|data| data.controlled)
    }

    fn transfer_control(&mut self, entity: Option<EntityId>) {
        if let Some(old) = self.controlled_entity() {
            self.set_ai_suppressed(old, false);
            if let Some(vehicle) = self
                .entity_mut(old)
                .controller
                .as_mut()
                .and_then(|c| c.as_vehicle_mut())
            {
                vehicle.on_control_end();
            }
        }

        self.get_data_container_mut::<PlayerData>().controlled = entity;
        if let Some(new) = entity {
            self.set_ai_suppressed(new, true);
            if self.entity(new).kind == EntityKind::Human {
                self.halt_entity(new);
            }
            info!("player now controls {new}");
        } else {
            debug!("player released control");
        }

        self.get_data_container_mut::<PlayerData>().free_camera.halt();
        self.follow(entity.map(CameraTarget::Entity));
    }

    fn handle_input(&mut self, event: InputEvent) -> bool {
        let (key, down) = match event {
            InputEvent::MouseClick(screen) => return self.click(screen),
            InputEvent::KeyDown(key) => (key, true),
            InputEvent::KeyUp(key) => (key, false),
        };

        match (key, down) {
            (Key::Quit, true) => {
                info!("quit requested");
                self.shutdown();
                return true;
            }
            (Key::ReleaseControl, true) => {
                self.transfer_control(None);
                return true;
            }
            (Key::Interact, true) => {
                if self.interact() {
                    return true;
                }
            }
            _ => {}
        }

        match self.controlled_entity() {
            Some(entity) => self.handle_entity_key(entity, key, down),
            None => self
                .get_data_container_mut::<PlayerData>()
                .free_camera
                .handle(key, down),
        }
    }

    fn tick_free_camera(&mut self) {
        if self.controlled_entity().is_some() {
            return;
        }
        let delta = self.delta();
        let velocity = self
            .get_data_container_mut::<PlayerData>()
            .free_camera
            .tick(delta);
        if !velocity.is_zero() {
            self.move_camera(velocity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ContextCameraExt;
    use crate::geometry::Direction;
    use crate::world::{World, WorldId, WorldKind};

    fn setup() -> (Context, WorldId) {
        let mut context = Context::new();
        let row = ".".repeat(60);
        let rows: Vec<&str> = (0..40).map(|_| row.as_str()).collect();
        let world = World::from_ascii(WorldId(0), "park", WorldKind::Outside, &rows).unwrap();
        let world = context.add_world(world);
        context.init_camera(Vec2::new(640.0, 480.0));
        context.init_states(View::Outside(world));
        context.init_player();
        (context, world)
    }

    #[test]
    fn clicking_takes_control() {
        let (mut context, world) = setup();
        let human = context.create_human(world, Vec2::new(100.0, 100.0));
        assert!(context.handle_input(InputEvent::MouseClick(Vec2::new(110.0, 100.0))));
        assert_eq!(context.controlled_entity(), Some(human));
        assert_eq!(context.camera().target(), Some(CameraTarget::Entity(human)));
        assert!(context.entity(human).controller.as_ref().unwrap().as_human().unwrap().is_suppressed());

        assert!(context.handle_input(InputEvent::KeyDown(Key::ReleaseControl)));
        assert_eq!(context.controlled_entity(), None);
        assert!(!context.entity(human).controller.as_ref().unwrap().as_human().unwrap().is_suppressed());
    }

    #[test]
    fn empty_vehicles_are_not_selectable() {
        let (mut context, world) = setup();
        let vehicle = context.create_vehicle(world, Vec2::new(300.0, 300.0), Direction::South);
        assert!(!context.handle_input(InputEvent::MouseClick(Vec2::new(300.0, 300.0))));
        assert_eq!(context.controlled_entity(), None);

        let human = context.create_human(world, Vec2::new(200.0, 300.0));
        assert!(context.enter_vehicle(vehicle, human));
        assert!(context.handle_input(InputEvent::MouseClick(Vec2::new(300.0, 300.0))));
        assert_eq!(context.controlled_entity(), Some(vehicle));
    }

    #[test]
    fn interact_boards_and_leaves_vehicles() {
        let (mut context, world) = setup();
        let human = context.create_human(world, Vec2::new(100.0, 100.0));
        let vehicle = context.create_vehicle(world, Vec2::new(120.0, 110.0), Direction::South);
        context.transfer_control(Some(human));

        assert!(context.handle_input(InputEvent::KeyDown(Key::Interact)));
        assert_eq!(context.controlled_entity(), Some(vehicle));
        assert_eq!(context.entity(vehicle).driver(), Some(human));

        assert!(context.handle_input(InputEvent::KeyDown(Key::Interact)));
        assert_eq!(context.controlled_entity(), Some(human));
        assert!(context.entity(vehicle).is_empty());
    }

    #[test]
    fn keys_move_the_controlled_human() {
        let (mut context, world) = setup();
        let human = context.create_human(world, Vec2::new(100.0, 100.0));
        context.transfer_control(Some(human));
        assert!(context.handle_input(InputEvent::KeyDown(Key::Right)));
        assert!(context.entity(human).velocity.x > 0.0);
        assert!(context.handle_input(InputEvent::KeyUp(Key::Right)));
        assert!(context.entity(human).velocity.is_zero());
    }

    #[test]
    fn free_camera_moves_without_a_controlled_entity() {
        let (mut context, _) = setup();
        let start = context.camera().transform;
        assert!(context.handle_input(InputEvent::KeyDown(Key::Right)));
        for _ in 0..30 {
            context.tick_free_camera();
        }
        assert!(context.camera().transform.x > start.x);
        assert_eq!(context.camera().transform.y, start.y);
    }

    #[test]
    fn hard_crashes_shake_the_camera() {
        let (mut context, world) = setup();
        let human = context.create_human(world, Vec2::new(100.0, 100.0));
        let vehicle = context.create_vehicle(world, Vec2::new(120.0, 110.0), Direction::South);
        context.transfer_control(Some(human));
        context.enter_vehicle(vehicle, human);
        context.emit_event(VehicleCrashEvent { vehicle, speed: 100.0 });
        context.execute();
        assert!(!context.camera().is_shaking());
        context.emit_event(VehicleCrashEvent { vehicle, speed: 300.0 });
        context.execute();
        assert!(context.camera().is_shaking());
    }

    #[test]
    fn quit_shuts_down() {
        let (mut context, _) = setup();
        assert!(context.handle_input(InputEvent::KeyDown(Key::Quit)));
        assert!(context.is_shutdown_requested());
    }
}
