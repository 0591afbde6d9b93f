use citysim::block::BlockType;
use citysim::building::ContextBuildingExt;
use citysim::context::Context;
use citysim::entity::{ContextEntityExt, EntityKind};
use citysim::geometry::{Direction, Vec2};
use citysim::navigation::NavigationGraph;
use citysim::random::ContextRandomExt;
use citysim::world::{ContextWorldExt, LayerKind, WorldId};
use std::path::{Path, PathBuf};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("res/maps/world.json")
}

fn load() -> (Context, WorldId) {
    let mut context = Context::new();
    context.init_random(3);
    let world = context.load_world(&fixture()).unwrap();
    (context, world)
}

#[test]
fn loads_the_outside_world_and_its_house() {
    let (context, world) = load();
    assert_eq!(context.world_ids().len(), 2);
    assert_eq!(context.outside_world_ids(), vec![world]);

    let outside = context.world(world);
    assert_eq!((outside.tile_width(), outside.tile_height()), (20, 15));
    assert_eq!(outside.terrain_type((4, 4)), Some(BlockType::SlidingDoor));
    assert_eq!(outside.terrain_type((0, 7)), Some(BlockType::Road));
    assert_eq!(
        outside.get_block((9, 2), LayerKind::Objects).map(|b| b.blocktype),
        Some(BlockType::Tree)
    );
    assert_eq!(outside.get_door_block((4, 4)).and_then(|b| b.building), Some(context.building_ids()[0]));

    let house = context.building(context.building_ids()[0]);
    assert_eq!(house.name, "house");
    assert_eq!(house.world, world);
    assert_eq!(house.doors.len(), 2);
    assert_eq!(house.windows().count(), 2);
    let inside = context.world(house.inside);
    assert!(!inside.is_outside());
    assert_eq!(inside.spawns(EntityKind::Human).len(), 2);
}

#[test]
fn spawns_are_anchored_one_tile_low() {
    let (context, world) = load();
    let outside = context.world(world);
    let human = outside.spawn(EntityKind::Human, 0).unwrap();
    assert_eq!(human.position, Vec2::new(64.0, 192.0));
    assert_eq!(human.orientation, Direction::East);
    assert!((human.width - 128.0).abs() < f64::EPSILON);
    let vehicle = outside.spawn(EntityKind::Vehicle, 0).unwrap();
    assert_eq!(vehicle.position, Vec2::new(32.0, 224.0));
    assert!(outside.spawn(EntityKind::Vehicle, 1).is_err());
}

#[test]
fn discovers_the_main_road() {
    let (context, world) = load();
    let roads = context.world(world).roadmap.roads();
    assert_eq!(roads.len(), 1);
    let road = &roads[0];
    assert_eq!(road.width, 2);
    assert_eq!(road.road_direction, (1, 0));
    assert!(!road.vertical_road);
    assert!(road.is_spawn);
    assert_eq!(context.world(world).roadmap.nodes().len(), 1);
}

#[test]
fn pavement_paths_are_walkable() {
    let (context, world) = load();
    let outside = context.world(world);
    let graph: &NavigationGraph = outside.nav_graph.as_ref().unwrap();
    assert!(graph.node_count() >= 2);

    let path = graph.find_walking_path(outside, (1, 6), (18, 6)).unwrap();
    assert_eq!(path.first(), Some(&(1, 6)));
    assert_eq!(path.last(), Some(&(18, 6)));
    // graph hops run along a row or column
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert_ne!(a, b);
        assert!(a.0 == b.0 || a.1 == b.1, "{a:?} -> {b:?}");
    }
    // the legs to and from the graph step tile by tile
    let step = |a: (i32, i32), b: (i32, i32)| (a.0 - b.0).abs() + (a.1 - b.1).abs();
    assert_eq!(step(path[0], path[1]), 1);
    assert_eq!(step(path[path.len() - 2], path[path.len() - 1]), 1);
}

#[test]
fn humans_go_in_and_out_of_the_house() {
    let (mut context, world) = load();
    let building = context.building_ids()[0];
    let inside = context.building(building).inside;

    let human = context.create_human(world, Vec2::new(144.0, 176.0));
    context.enter_building(building, human);
    assert_eq!(context.entity(human).world, inside);
    context.world_mut(world).flush_entity_buffer();
    context.world_mut(inside).flush_entity_buffer();
    assert!(context.world(inside).entities().contains(&human));
    assert!(!context.world(world).entities().contains(&human));

    // already inside
    context.enter_building(building, human);
    assert_eq!(context.entity(human).world, inside);

    context.exit_building(building, human);
    let entity = context.entity(human);
    assert_eq!(entity.world, world);
    assert_eq!(entity.direction, Direction::South);
    assert!(entity.transform.y > 4.0 * 32.0);
}

#[test]
fn ascii_rendering_shows_the_map() {
    let (mut context, world) = load();
    context.create_vehicle(world, Vec2::new(96.0, 240.0), Direction::East);
    let text = context.render_ascii(world);
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 15);
    assert!(rows[6].chars().all(|c| c == '_'));
    assert!(rows[7].contains('V'));
}
