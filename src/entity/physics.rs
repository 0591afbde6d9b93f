//! Per-frame movement: integrate velocity, resolve collisions, keep entities on the map and
//! let humans use doors.

use super::{ContextEntityExt, ContextEntityExtInternal, EntityId, EntityKind};
use crate::block::BlockType;
use crate::building::{BuildingId, ContextBuildingExt};
use crate::clock::ContextClockExt;
use crate::context::Context;
use crate::controller::{Controller, VEHICLE_MAX_SPEED, VEHICLE_MIN_SPEED};
use crate::geometry::{pixel_to_tile, tile_size, Rect, Vec2};
use crate::world::{ContextWorldExt, EntityGrid};

/// Vehicles faster than this kill the humans they hit.
const KILL_SPEED: f64 = VEHICLE_MAX_SPEED / 2.0;
/// Vehicles faster than this are slowed by hitting a human.
const DAMAGE_SPEED: f64 = VEHICLE_MIN_SPEED / 2.0;

pub(super) fn step(context: &mut Context, id: EntityId) {
    let delta = context.delta();
    let entity = context.entity_mut(id);
    let position = entity.aabb.center() + entity.velocity * delta;
    entity.set_position(position);

    let entity = context.entity(id);
    if entity.world_collisions && entity.collisions_enabled {
        resolve_world_collisions(context, id);
        resolve_entity_collisions(context, id);
    }
    if !context.entity(id).can_leave_world {
        clamp_to_world(context, id);
    }
    if context.entity(id).world_interactions {
        interact(context, id);
    }
    context.update_grid_cell(id);
}

/// Moves every passenger to the vehicle's position and heading.
pub(super) fn carry_passengers(context: &mut Context, vehicle: EntityId) {
    let entity = context.entity(vehicle);
    let (transform, direction) = (entity.transform, entity.direction);
    let passengers: Vec<EntityId> = entity.passengers().collect();
    for passenger in passengers {
        let p = context.entity_mut(passenger);
        p.set_position(transform);
        p.direction = direction;
    }
}

/// Pushes `aabb` out of `other` along the axis of least overlap.
pub(crate) fn push_out(aabb: &mut Rect, other: &Rect) {
    if !aabb.collides(other) {
        return;
    }
    let (centre, other_centre) = (aabb.center(), other.center());
    let dx = if centre.x < other_centre.x {
        other.x - aabb.right()
    } else {
        other.right() - aabb.x
    };
    let dy = if centre.y < other_centre.y {
        other.y - aabb.bottom()
    } else {
        other.bottom() - aabb.y
    };
    if dy.abs() < dx.abs() {
        aabb.y += dy;
    } else {
        aabb.x += dx;
    }
}

fn resolve_world_collisions(context: &mut Context, id: EntityId) {
    let entity = context.entity(id);
    let (aabb, interacts) = (entity.aabb, entity.world_interactions);
    let world = context.world(entity.world);

    // doors and mats are walls to anything that can't use them
    let mut rects = world.get_colliding_blocks(&aabb, false);
    if !interacts {
        rects.extend(world.get_colliding_blocks(&aabb, true));
    }
    if rects.is_empty() {
        return;
    }

    let entity = context.entity_mut(id);
    for rect in &rects {
        push_out(&mut entity.aabb, rect);
    }
    entity.sync_rects();
}

fn resolve_entity_collisions(context: &mut Context, id: EntityId) {
    let entity = context.entity(id);
    let kind = entity.kind;
    let cell = entity
        .grid_cell
        .unwrap_or_else(|| EntityGrid::cell_for(entity.transform));
    let others: Vec<EntityId> = context
        .world(entity.world)
        .entity_grid
        .neighbours(cell)
        .filter(|other| *other != id)
        .collect();

    for other in others {
        let (other_kind, other_aabb) = {
            let o = context.entity(other);
            if o.dead || !context.entity(id).aabb.collides(&o.aabb) {
                continue;
            }
            (o.kind, o.aabb)
        };
        match (kind, other_kind) {
            (EntityKind::Human, EntityKind::Vehicle) => {
                let entity = context.entity_mut(id);
                push_out(&mut entity.aabb, &other_aabb);
                entity.sync_rects();
            }
            (EntityKind::Vehicle, EntityKind::Human) => run_over(context, id, other),
            _ => {}
        }
    }
}

fn run_over(context: &mut Context, vehicle: EntityId, human: EntityId) {
    let entity = context.entity(vehicle);
    if entity.passengers().any(|p| p == human) {
        return;
    }
    let speed_sqrd = entity.velocity.length_sqrd();
    let fraction = if speed_sqrd > KILL_SPEED * KILL_SPEED {
        context.kill_entity(human);
        0.6
    } else if speed_sqrd > DAMAGE_SPEED * DAMAGE_SPEED {
        0.8
    } else {
        return;
    };
    if let Some(controller) = context
        .entity_mut(vehicle)
        .controller
        .as_mut()
        .and_then(Controller::as_vehicle_mut)
    {
        controller.slow(fraction);
    }
}

fn clamp_to_world(context: &mut Context, id: EntityId) {
    let entity = context.entity(id);
    let world = context.world(entity.world);
    let (width, height) = (world.pixel_width(), world.pixel_height());
    let (w, h) = if world.half_block_boundaries {
        (entity.aabb.width / 2.0, entity.aabb.height / 2.0)
    } else {
        (0.0, 0.0)
    };

    let (tl, br) = (entity.rect.topleft(), entity.rect.bottomright());
    let dx = if tl.x < -w {
        -tl.x - w
    } else if br.x >= width + w {
        width - br.x + w
    } else {
        0.0
    };
    let dy = if tl.y < -2.0 * h {
        -tl.y - 2.0 * h
    } else if br.y >= height + h {
        height - br.y + h
    } else {
        0.0
    };

    if dx != 0.0 || dy != 0.0 {
        let position = entity.aabb.center() + Vec2::new(dx, dy);
        context.entity_mut(id).set_position(position);
    }
}

/// Doors take humans inside; stepping far enough onto a mat takes them back out.
fn interact(context: &mut Context, id: EntityId) {
    let entity = context.entity(id);
    let Some(interact_aabb) = entity.interact_aabb() else {
        return;
    };
    let world_id = entity.world;
    let feet_y = entity.rect.center().y;

    let actions: Vec<(BuildingId, BlockType, Rect)> = {
        let world = context.world(world_id);
        let mut seen = Vec::new();
        world
            .get_colliding_blocks(&interact_aabb, true)
            .into_iter()
            .filter_map(|rect| {
                let block = world.get_door_block(pixel_to_tile(rect.topleft()))?;
                Some((block.building?, block.blocktype, rect))
            })
            .filter(|(building, ..)| {
                let first = !seen.contains(building);
                seen.push(*building);
                first
            })
            .collect()
    };

    for (building, blocktype, rect) in actions {
        match blocktype {
            BlockType::SlidingDoor => {
                context.entity_mut(id).velocity = Vec2::ZERO;
                context.enter_building(building, id);
            }
            BlockType::EntranceMat => {
                let dy = feet_y - rect.y;
                if dy > 0.0 && dy <= tile_size() / 2.0 {
                    context.exit_building(building, id);
                }
            }
            _ => {}
        }
        if context.entity(id).world != world_id {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Direction;
    use crate::world::{World, WorldId, WorldKind};

    fn world(context: &mut Context, rows: &[&str]) -> WorldId {
        let world = World::from_ascii(WorldId(0), "test", WorldKind::Outside, rows).unwrap();
        context.add_world(world)
    }

    #[test]
    fn push_out_takes_the_shallow_axis() {
        let wall = Rect::new(32.0, 0.0, 32.0, 32.0);
        let mut aabb = Rect::new(20.0, 8.0, 16.0, 16.0);
        push_out(&mut aabb, &wall);
        assert_eq!(aabb.x, 16.0);
        assert_eq!(aabb.y, 8.0);

        let mut aabb = Rect::new(40.0, 28.0, 16.0, 16.0);
        push_out(&mut aabb, &wall);
        assert_eq!((aabb.x, aabb.y), (40.0, 32.0));

        let mut apart = Rect::new(100.0, 100.0, 4.0, 4.0);
        push_out(&mut apart, &wall);
        assert_eq!((apart.x, apart.y), (100.0, 100.0));
    }

    #[test]
    fn humans_stop_at_water() {
        let mut context = Context::new();
        let w = world(&mut context, &["...", "..~", "..."]);
        let human = context.create_human(w, Vec2::new(48.0, 48.0));
        context.entity_mut(human).velocity = Vec2::new(300.0, 0.0);
        step(&mut context, human);
        let entity = context.entity(human);
        assert!((entity.aabb.right() - 64.0).abs() < 1e-9);
        assert!((entity.transform.x - 51.0).abs() < 1e-9);
        assert_eq!(entity.transform.y, 48.0);
    }

    #[test]
    fn entities_are_kept_on_the_map() {
        let mut context = Context::new();
        let w = world(&mut context, &["...", "...", "..."]);
        context.world_mut(w).half_block_boundaries = false;
        let human = context.create_human(w, Vec2::new(-50.0, 48.0));
        step(&mut context, human);
        assert_eq!(context.entity(human).rect.x, 0.0);
        assert_eq!(context.entity(human).transform.x, 16.0);
    }

    #[test]
    fn fast_vehicles_kill_and_slow_down() {
        let mut context = Context::new();
        let w = world(&mut context, &["........", "........", "........"]);
        let human = context.create_human(w, Vec2::new(100.0, 48.0));
        let vehicle = context.create_vehicle(w, Vec2::new(100.0, 48.0), Direction::East);
        context.entity_mut(vehicle).velocity = Vec2::new(300.0, 0.0);
        step(&mut context, vehicle);
        assert!(context.entity(human).dead);

        let survivor = context.create_human(w, Vec2::new(60.0, 80.0));
        context.move_entity(vehicle, Vec2::new(60.0, 80.0));
        context.entity_mut(vehicle).velocity = Vec2::new(150.0, 0.0);
        step(&mut context, vehicle);
        assert!(!context.entity(survivor).dead);
    }

    #[test]
    fn humans_are_pushed_out_of_vehicles() {
        let mut context = Context::new();
        let w = world(&mut context, &["........", "........", "........"]);
        let vehicle = context.create_vehicle(w, Vec2::new(100.0, 48.0), Direction::North);
        let human = context.create_human(w, Vec2::new(120.0, 48.0));
        step(&mut context, human);
        let (h, v) = (context.entity(human).aabb, context.entity(vehicle).aabb);
        assert!(!h.collides(&v));
        assert!(context.entity(human).transform.x > 120.0);
    }
}
