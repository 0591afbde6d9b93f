/*!
Wires a whole simulation together from a [`Config`].

[`ContextGameExt::setup_game`] loads the map, spawns the population and schedules a frame
plan every `1 / tick-rate` seconds until the configured duration, plus the building light
show. Frames tick the free camera, every world and then the camera.
*/

use crate::behaviour::{Repeater, Wander};
use crate::building::ContextBuildingExt;
use crate::camera::ContextCameraExt;
use crate::clock::ContextClockExt;
use crate::config::Config;
use crate::context::{Context, DataPlugin, ExecutionPhase};
use crate::entity::{ContextEntityExt, EntityId, EntityKind};
use crate::error::CityError;
use crate::input::ContextPlayerExt;
use crate::navigation::NavigationGraph;
use crate::random::ContextRandomExt;
use crate::state::{ContextStateExt, View};
use crate::world::{ContextWorldExt, WorldId};
use log::{error, info};
use serde::Serialize;

crate::define_rng!(GameRng);

/// Frames between window changes.
const STROBE_FRAMES: std::ops::Range<u32> = 20..100;

struct GameData {
    main_world: Option<WorldId>,
    delta: f64,
    duration: f64,
}

impl DataPlugin for GameData {
    fn init() -> Self {
        GameData {
            main_world: None,
            delta: 1.0 / crate::clock::DEFAULT_TICK_RATE,
            duration: 0.0,
        }
    }
}

/// End-of-run statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub simulated_time: f64,
    pub frames: u64,
    pub worlds: usize,
    pub buildings: usize,
    pub humans: usize,
    pub vehicles: usize,
    pub humans_inside: usize,
    pub dead: usize,
    pub roads: usize,
    pub navigation_nodes: usize,
}

pub trait ContextGameExt {
    /// Loads the map and population and schedules the run. Returns the outside world.
    fn setup_game(&mut self, config: &Config) -> Result<WorldId, CityError>;

    fn main_world(&self) -> Option<WorldId>;

    /// Advances every world by one frame of `delta` seconds.
    fn tick_frame(&mut self, delta: f64);

    fn summary(&self) -> Summary;
}

trait ContextGameExtInternal {
    fn spawn_population(&mut self, world: WorldId, config: &Config) -> Result<(), CityError>;
    fn schedule_frame(&mut self, time: f64);
    fn schedule_strobe(&mut self, time: f64);
}

impl ContextGameExtInternal for Context {
    fn spawn_population(&mut self, world: WorldId, config: &Config) -> Result<(), CityError> {
        let humans = &config.game.humans;
        let mut first_human: Option<EntityId> = None;
        let spawns = self.world(world).spawns(EntityKind::Human).len();
        for i in 0..humans.spawn_count {
            let human = self.spawn_human(world, i % spawns.max(1))?;
            if humans.wandering {
                if self.world(world).nav_graph.is_some() {
                    self.roam(human);
                } else {
                    self.set_behaviour(human, Box::new(Repeater::forever(Box::new(Wander::new(true)))));
                }
            }
            first_human.get_or_insert(human);
        }

        let spawns = self.world(world).spawns(EntityKind::Vehicle).len();
        for i in 0..config.game.vehicles.spawn_count {
            self.spawn_vehicle(world, i % spawns.max(1))?;
        }

        if let Some(human) = first_human {
            self.transfer_control(Some(human));
            self.centre_camera(None);
        }
        info!(
            "spawned {} humans and {} vehicles",
            humans.spawn_count, config.game.vehicles.spawn_count
        );
        Ok(())
    }

    fn schedule_frame(&mut self, time: f64) {
        self.add_plan(time, move |context| {
            let (delta, duration) = {
                let game = context.get_data_container_mut::<GameData>();
                (game.delta, game.duration)
            };
            context.tick_frame(delta);
            let next = time + delta;
            if next <= duration {
                context.schedule_frame(next);
            }
        });
    }

    fn schedule_strobe(&mut self, time: f64) {
        self.add_plan(time, move |context| {
            for building in context.building_ids() {
                if let Err(e) = context.strobe_windows(building) {
                    error!("could not strobe the windows of {building}: {e}");
                }
            }
            let game = context.get_data_container_mut::<GameData>();
            let (delta, duration) = (game.delta, game.duration);
            let frames = context.sample_range::<GameRng, _, u32>(STROBE_FRAMES);
            let next = time + f64::from(frames) * delta;
            if next <= duration {
                context.schedule_strobe(next);
            }
        });
    }
}

impl ContextGameExt for Context {
    fn setup_game(&mut self, config: &Config) -> Result<WorldId, CityError> {
        let sim = &config.simulation;
        self.init_random(sim.seed);
        {
            let game = self.get_data_container_mut::<GameData>();
            game.delta = config.delta();
            game.duration = sim.duration;
        }

        let world = self.load_world(&sim.map)?;
        self.get_data_container_mut::<GameData>().main_world = Some(world);
        info!("loaded {} worlds", self.world_ids().len());

        self.init_camera(config.resolution());
        self.init_states(View::Outside(world));
        self.init_player();
        self.spawn_population(world, config)?;

        self.schedule_frame(0.0);
        if config.game.buildings.strobe_lights {
            self.schedule_strobe(0.0);
        }
        self.add_plan_with_phase(sim.duration, Context::shutdown, ExecutionPhase::Last);
        Ok(world)
    }

    fn main_world(&self) -> Option<WorldId> {
        self.get_data_container::<GameData>()
            .and_then(|game| game.main_world)
    }

    fn tick_frame(&mut self, delta: f64) {
        self.advance_frame(delta);
        self.tick_free_camera();
        for world in self.world_ids() {
            self.tick_world(world);
        }
        self.tick_camera();
    }

    fn summary(&self) -> Summary {
        let entities: Vec<_> = self.entity_ids().into_iter().map(|id| self.entity(id)).collect();
        let count = |kind: EntityKind| entities.iter().filter(|e| e.kind == kind).count();
        let outside = self.main_world();
        Summary {
            simulated_time: self.get_current_time(),
            frames: self.frame(),
            worlds: self.world_ids().len(),
            buildings: self.building_ids().len(),
            humans: count(EntityKind::Human),
            vehicles: count(EntityKind::Vehicle),
            humans_inside: entities
                .iter()
                .filter(|e| e.kind == EntityKind::Human && !e.dead)
                .filter(|e| !self.world(e.world).is_outside())
                .count(),
            dead: entities.iter().filter(|e| e.dead).count(),
            roads: outside.map_or(0, |w| self.world(w).roadmap.roads().len()),
            navigation_nodes: outside.map_or(0, |w| {
                self.world(w)
                    .nav_graph
                    .as_ref()
                    .map_or(0, NavigationGraph::node_count)
            }),
        }
    }
}
