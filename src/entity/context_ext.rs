use super::{physics, Entity, EntityData, EntityId, EntityKilledEvent, EntityKind, Role, VehicleEvent};
use crate::behaviour::{BoxedTask, FollowPath, Repeater, Roam};
use crate::context::Context;
use crate::controller::{
    Controller, HumanController, Key, Movement, VehicleController, HUMAN_FAST_SPEED,
    HUMAN_MAX_SPEED, HUMAN_MIN_SPEED,
};
use crate::error::CityError;
use crate::geometry::{distance_sqrd, Direction, TilePos, Vec2};
use crate::input::ContextPlayerExt;
use crate::random::ContextRandomExt;
use crate::world::{ContextWorldExt, EntityGrid, WorldId};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

crate::define_rng!(EntityRng);

pub trait ContextEntityExt {
    fn entity_count(&self) -> usize;

    fn entity(&self, id: EntityId) -> &Entity;

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity;

    /// Every entity ever created, dead or alive.
    fn entity_ids(&self) -> Vec<EntityId>;

    /// Creates a human centred on `position` with a random walking speed.
    fn create_human(&mut self, world: WorldId, position: Vec2) -> EntityId;

    /// Creates a vehicle with a random colour and top speed.
    fn create_vehicle(&mut self, world: WorldId, position: Vec2, direction: Direction) -> EntityId;

    fn spawn_human(&mut self, world: WorldId, spawn_index: usize) -> Result<EntityId, CityError>;

    fn spawn_vehicle(&mut self, world: WorldId, spawn_index: usize) -> Result<EntityId, CityError>;

    /// Moves an entity into one of its world's spawn areas, at a random spot inside it when
    /// `vary` is set, and faces it the spawn's way.
    fn move_to_spawn(&mut self, id: EntityId, spawn_index: usize, vary: bool) -> Result<(), CityError>;

    fn move_entity(&mut self, id: EntityId, position: Vec2);

    fn turn_entity(&mut self, id: EntityId, direction: Direction);

    /// Moves an entity to another world, keeping its position. The worlds' entity lists
    /// catch up when they are next ticked.
    fn transfer_entity(&mut self, id: EntityId, world: WorldId);

    /// Ticks every living entity of a world, then applies arrivals and departures.
    fn tick_world(&mut self, world: WorldId);

    fn tick_entity(&mut self, id: EntityId);

    fn kill_entity(&mut self, id: EntityId);

    /// Seats `human` in the first free seat. Returns false when the vehicle is full.
    fn enter_vehicle(&mut self, vehicle: EntityId, human: EntityId) -> bool;

    /// Lets out whoever sits in `seat`. Returns false when the seat is empty.
    fn exit_vehicle(&mut self, vehicle: EntityId, seat: usize) -> bool;

    /// The closest living entity within `radius_sqrd` of `position` that matches
    /// `predicate`. Only entities in the world's grid are considered.
    fn nearest_entity(
        &self,
        world: WorldId,
        position: Vec2,
        radius_sqrd: f64,
        predicate: impl Fn(&Entity) -> bool,
    ) -> Option<EntityId>;

    /// Passes a key to the entity's controller.
    fn handle_entity_key(&mut self, id: EntityId, key: Key, down: bool) -> bool;

    fn halt_entity(&mut self, id: EntityId);

    /// Replaces a human's behaviour.
    fn set_behaviour(&mut self, human: EntityId, root: BoxedTask);

    /// Walks a human to `goal` along the pavement before carrying on as before. Returns false
    /// if there is no path.
    fn walk_to_goal(&mut self, human: EntityId, goal: TilePos) -> bool;

    /// Sets a human roaming between random navigation nodes.
    fn roam(&mut self, human: EntityId);
}

pub(crate) trait ContextEntityExtInternal {
    /// Runs `f` with the entity's controller taken out, so it can use the context freely.
    fn with_controller<T>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Controller, &mut Context) -> T,
    ) -> Option<T>;

    fn set_collisions_enabled(&mut self, id: EntityId, enabled: bool);

    fn set_ai_suppressed(&mut self, id: EntityId, suppressed: bool);

    /// Moves an entity to the grid cell of its position, if it takes part in collisions.
    fn update_grid_cell(&mut self, id: EntityId);

    fn spawn_point(
        &mut self,
        world: WorldId,
        kind: EntityKind,
        spawn_index: usize,
        vary: bool,
    ) -> Result<(Vec2, Direction), CityError>;

    fn add_entity(&mut self, entity: Entity) -> EntityId;
}

impl ContextEntityExtInternal for Context {
    fn with_controller<T>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Controller, &mut Context) -> T,
    ) -> Option<T> {
        let mut controller = self.entity_mut(id).controller.take()?;
        let result = f(&mut controller, self);
        self.entity_mut(id).controller = Some(controller);
        Some(result)
    }

    fn set_collisions_enabled(&mut self, id: EntityId, enabled: bool) {
        let entity = self.entity_mut(id);
        entity.collisions_enabled = enabled;
        if enabled {
            self.update_grid_cell(id);
        } else if let Some(cell) = entity.grid_cell.take() {
            let world = entity.world;
            self.world_mut(world).entity_grid.remove(id, cell);
        }
    }

    fn set_ai_suppressed(&mut self, id: EntityId, suppressed: bool) {
        if let Some(controller) = self.entity_mut(id).controller.as_mut() {
            controller.set_suppressed(suppressed);
        }
    }

    fn update_grid_cell(&mut self, id: EntityId) {
        let entity = self.entity(id);
        if entity.dead || !entity.collisions_enabled {
            return;
        }
        let (world, cell, position) = (entity.world, entity.grid_cell, entity.transform);
        let cell = self
            .world_mut(world)
            .entity_grid
            .relocate(id, cell, position);
        self.entity_mut(id).grid_cell = Some(cell);
    }

    fn spawn_point(
        &mut self,
        world: WorldId,
        kind: EntityKind,
        spawn_index: usize,
        vary: bool,
    ) -> Result<(Vec2, Direction), CityError> {
        let spawn = *self.world(world).spawn(kind, spawn_index)?;
        let mut position = spawn.position;
        if vary {
            position.x += self.sample_range::<EntityRng, _, f64>(0.0..spawn.width.max(1.0));
            position.y += self.sample_range::<EntityRng, _, f64>(0.0..spawn.height.max(1.0));
        }
        Ok((position, spawn.orientation))
    }

    fn add_entity(&mut self, entity: Entity) -> EntityId {
        let world = entity.world;
        let id = self.get_data_container_mut::<EntityData>().add(entity);
        let w = self.world_mut(world);
        w.queue_entity(id, true);
        w.flush_entity_buffer();
        self.update_grid_cell(id);
        id
    }
}

impl ContextEntityExt for Context {
    fn entity_count(&self) -> usize {
        self.get_data_container::<EntityData>()
            .map_or(0, EntityData::len)
    }

    fn entity(&self, id: EntityId) -> &Entity {
        self.get_data_container::<EntityData>()
            .expect("no entities have been created")
            .get(id)
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        self.get_data_container_mut::<EntityData>().get_mut(id)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.get_data_container::<EntityData>()
            .map(|data| data.iter().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    fn create_human(&mut self, world: WorldId, position: Vec2) -> EntityId {
        let id = self.get_data_container_mut::<EntityData>().next_id();
        let mut human = Entity::new_human(id, world);
        human.set_position(position);
        let movement = self.sample::<EntityRng, _>(|rng| {
            Movement::random(HUMAN_MIN_SPEED, HUMAN_FAST_SPEED, HUMAN_MAX_SPEED, rng)
        });
        human.controller = Some(Controller::Human(HumanController::new(movement)));
        debug!(
            "created human {id} in {world} at {position}, speed {:.0}/{:.0}",
            movement.speed, movement.sprint_speed
        );
        self.add_entity(human)
    }

    fn create_vehicle(&mut self, world: WorldId, position: Vec2, direction: Direction) -> EntityId {
        let id = self.get_data_container_mut::<EntityData>().next_id();
        let (colour, max_speed) = self.sample::<EntityRng, _>(|rng| {
            let mut colour = [
                rng.random_range(127..254),
                rng.random_range(50..150),
                rng.random_range(0..50),
            ];
            colour.shuffle(rng);
            (colour, VehicleController::random_max_speed(rng))
        });
        let mut vehicle = Entity::new_vehicle(id, world, colour);
        vehicle.set_position(position);
        vehicle.turn(direction);
        // the controller remembers where the vehicle starts, so it must come after placement
        vehicle.controller = Some(Controller::Vehicle(VehicleController::new(
            max_speed,
            vehicle.transform,
            vehicle.direction,
        )));
        debug!("created vehicle {id} in {world} at {position}, top speed {max_speed:.0}");
        self.add_entity(vehicle)
    }

    fn spawn_human(&mut self, world: WorldId, spawn_index: usize) -> Result<EntityId, CityError> {
        let (position, direction) = self.spawn_point(world, EntityKind::Human, spawn_index, true)?;
        let id = self.create_human(world, position);
        self.turn_entity(id, direction);
        Ok(id)
    }

    fn spawn_vehicle(&mut self, world: WorldId, spawn_index: usize) -> Result<EntityId, CityError> {
        let (position, direction) =
            self.spawn_point(world, EntityKind::Vehicle, spawn_index, true)?;
        Ok(self.create_vehicle(world, position, direction))
    }

    fn move_to_spawn(&mut self, id: EntityId, spawn_index: usize, vary: bool) -> Result<(), CityError> {
        let (world, kind) = {
            let entity = self.entity(id);
            (entity.world, entity.kind)
        };
        let (position, direction) = self.spawn_point(world, kind, spawn_index, vary)?;
        self.move_entity(id, position);
        self.turn_entity(id, direction);
        Ok(())
    }

    fn move_entity(&mut self, id: EntityId, position: Vec2) {
        self.entity_mut(id).set_position(position);
        self.update_grid_cell(id);
    }

    fn turn_entity(&mut self, id: EntityId, direction: Direction) {
        self.entity_mut(id).turn(direction);
    }

    fn transfer_entity(&mut self, id: EntityId, world: WorldId) {
        let entity = self.entity_mut(id);
        let from = entity.world;
        if from == world {
            return;
        }
        entity.world = world;
        let cell = entity.grid_cell.take();

        let old = self.world_mut(from);
        if let Some(cell) = cell {
            old.entity_grid.remove(id, cell);
        }
        old.queue_entity(id, false);
        self.world_mut(world).queue_entity(id, true);
        self.update_grid_cell(id);
        debug!("{id} moved from {from} to {world}");
    }

    fn tick_world(&mut self, world: WorldId) {
        let ids = self.world(world).entities().to_vec();
        for id in ids {
            let entity = self.entity(id);
            if entity.dead || entity.world != world {
                continue;
            }
            self.tick_entity(id);
        }
        self.world_mut(world).flush_entity_buffer();
    }

    fn tick_entity(&mut self, id: EntityId) {
        // passengers are carried by their vehicle
        if self.entity(id).vehicle().is_some() {
            return;
        }

        self.with_controller(id, |controller, context| match controller {
            Controller::Human(c) => c.tick(context, id),
            Controller::Vehicle(c) => c.tick(context, id),
        });
        if self.entity(id).dead {
            return;
        }

        let entity = self.entity(id);
        if let Some(direction) = entity.direction_from_velocity() {
            if direction != entity.direction {
                self.turn_entity(id, direction);
            }
        }
        physics::step(self, id);

        if self.entity(id).kind == EntityKind::Vehicle {
            physics::carry_passengers(self, id);
        }
    }

    fn kill_entity(&mut self, id: EntityId) {
        let entity = self.entity_mut(id);
        if entity.dead {
            return;
        }
        entity.dead = true;
        entity.velocity = Vec2::ZERO;
        let (kind, world, cell) = (entity.kind, entity.world, entity.grid_cell.take());

        let w = self.world_mut(world);
        if let Some(cell) = cell {
            w.entity_grid.remove(id, cell);
        }
        w.queue_entity(id, false);

        if self.controlled_entity() == Some(id) {
            self.transfer_control(None);
        }
        info!("{id} ({kind}) died");
        self.emit_event(EntityKilledEvent { entity: id, kind });
    }

    fn enter_vehicle(&mut self, vehicle: EntityId, human: EntityId) -> bool {
        if self.entity(human).vehicle().is_some() {
            return false;
        }
        let Some(seat) = self.entity(vehicle).first_free_seat() else {
            debug!("{vehicle} is full");
            return false;
        };

        if let Role::Vehicle { seats, .. } = &mut self.entity_mut(vehicle).role {
            seats[seat] = Some(human);
        }
        if let Role::Human { vehicle: riding, .. } = &mut self.entity_mut(human).role {
            *riding = Some(vehicle);
        }

        if self.controlled_entity() == Some(human) {
            self.transfer_control(Some(vehicle));
        } else {
            self.set_ai_suppressed(human, true);
        }
        self.set_collisions_enabled(human, false);
        self.halt_entity(human);

        info!("{human} got into seat {seat} of {vehicle}");
        self.emit_event(VehicleEvent {
            vehicle,
            human,
            seat,
            entered: true,
        });
        true
    }

    fn exit_vehicle(&mut self, vehicle: EntityId, seat: usize) -> bool {
        let Some(human) = self.entity(vehicle).seats().get(seat).copied().flatten() else {
            return false;
        };

        if let Role::Human { vehicle: riding, .. } = &mut self.entity_mut(human).role {
            *riding = None;
        }
        if self.controlled_entity() == Some(vehicle) {
            self.transfer_control(Some(human));
        } else {
            self.set_ai_suppressed(human, false);
        }
        self.set_collisions_enabled(human, true);

        if let Role::Vehicle { seats, .. } = &mut self.entity_mut(vehicle).role {
            seats[seat] = None;
        }

        info!("{human} got out of {vehicle}");
        self.emit_event(VehicleEvent {
            vehicle,
            human,
            seat,
            entered: false,
        });
        true
    }

    fn nearest_entity(
        &self,
        world: WorldId,
        position: Vec2,
        radius_sqrd: f64,
        predicate: impl Fn(&Entity) -> bool,
    ) -> Option<EntityId> {
        let cell = EntityGrid::cell_for(position);
        self.world(world)
            .entity_grid
            .neighbours(cell)
            .map(|id| self.entity(id))
            .filter(|e| !e.dead && predicate(e))
            .map(|e| (e.id, distance_sqrd(e.transform, position)))
            .filter(|(_, d)| *d <= radius_sqrd)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn handle_entity_key(&mut self, id: EntityId, key: Key, down: bool) -> bool {
        let (heading, has_driver) = {
            let entity = self.entity(id);
            (entity.direction, entity.driver().is_some())
        };
        self.with_controller(id, |controller, context| match controller {
            Controller::Human(c) => c.handle(context, id, key, down),
            Controller::Vehicle(c) => c.handle(key, down, heading, has_driver),
        })
        .unwrap_or(false)
    }

    fn halt_entity(&mut self, id: EntityId) {
        let halted = self.with_controller(id, |controller, context| match controller {
            Controller::Human(c) => c.halt(context, id),
            Controller::Vehicle(c) => c.halt(context, id),
        });
        if halted.is_none() {
            self.entity_mut(id).velocity = Vec2::ZERO;
        }
    }

    fn set_behaviour(&mut self, human: EntityId, root: BoxedTask) {
        self.with_controller(human, |controller, context| {
            if let Some(c) = controller.as_human_mut() {
                c.set_behaviour(root, context, human);
            }
        });
    }

    fn walk_to_goal(&mut self, human: EntityId, goal: TilePos) -> bool {
        let (world, tile) = {
            let entity = self.entity(human);
            (entity.world, entity.tile())
        };
        let path = {
            let w = self.world(world);
            w.nav_graph
                .as_ref()
                .and_then(|graph| graph.find_walking_path(w, tile, goal))
        };
        let Some(path) = path else {
            debug!("{human} has no way from {tile:?} to {goal:?}");
            return false;
        };

        self.with_controller(human, |controller, context| {
            controller.as_human_mut().is_some_and(|c| {
                c.prefix_behaviour(Box::new(FollowPath::new(&path)), context, human);
                true
            })
        })
        .unwrap_or(false)
    }

    fn roam(&mut self, human: EntityId) {
        self.set_behaviour(human, Box::new(Repeater::forever(Box::new(Roam::new()))));
    }
}
