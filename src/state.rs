//! The stack of views the player is looking at: the outside world, or inside a building.

use crate::building::{BuildingId, BuildingMovementEvent, ContextBuildingExt};
use crate::camera::ContextCameraExt;
use crate::context::{Context, DataPlugin};
use crate::entity::ContextEntityExt;
use crate::input::ContextPlayerExt;
use crate::world::WorldId;
use log::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum View {
    Outside(WorldId),
    Building(BuildingId),
}

#[derive(Default)]
struct StateManager {
    stack: Vec<View>,
}

impl DataPlugin for StateManager {
    fn init() -> Self {
        StateManager::default()
    }
}

pub trait ContextStateExt {
    /// Starts with `root` and follows the controlled human through doors.
    fn init_states(&mut self, root: View);

    fn current_view(&self) -> Option<View>;

    /// The world shown by the current view.
    fn current_world(&self) -> Option<WorldId>;

    fn view_depth(&self) -> usize;

    fn push_view(&mut self, view: View);

    /// Returns to the previous view. The bottom view is never popped.
    fn pop_view(&mut self) -> Option<View>;
}

trait ContextStateExtInternal {
    fn view_world(&self, view: View) -> WorldId;
    fn load_view(&mut self, view: View);
}

impl ContextStateExtInternal for Context {
    fn view_world(&self, view: View) -> WorldId {
        match view {
            View::Outside(world) => world,
            View::Building(building) => self.building(building).inside,
        }
    }

    fn load_view(&mut self, view: View) {
        let world = self.view_world(view);
        self.set_camera_world(world);
        self.centre_camera(None);
        debug!("showing {view:?}");
    }
}

impl ContextStateExt for Context {
    fn init_states(&mut self, root: View) {
        self.push_view(root);
        self.subscribe_to_event(|context, event: BuildingMovementEvent| {
            context.entity_mut(event.entity).visible = true;
            if context.controlled_entity() != Some(event.entity) {
                return;
            }
            if event.entered {
                context.push_view(View::Building(event.building));
            } else {
                context.pop_view();
            }
        });
    }

    fn current_view(&self) -> Option<View> {
        self.get_data_container::<StateManager>()
            .and_then(|states| states.stack.last().copied())
    }

    fn current_world(&self) -> Option<WorldId> {
        self.current_view().map(|view| self.view_world(view))
    }

    fn view_depth(&self) -> usize {
        self.get_data_container::<StateManager>()
            .map_or(0, |states| states.stack.len())
    }

    fn push_view(&mut self, view: View) {
        self.get_data_container_mut::<StateManager>().stack.push(view);
        self.load_view(view);
    }

    fn pop_view(&mut self) -> Option<View> {
        let stack = &mut self.get_data_container_mut::<StateManager>().stack;
        if stack.len() <= 1 {
            debug!("ignoring pop of the last view");
            return None;
        }
        let popped = stack.pop();
        if let Some(view) = self.current_view() {
            self.load_view(view);
        }
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraTarget;
    use crate::geometry::Vec2;
    use crate::world::{ContextWorldExt, World, WorldKind};

    #[test]
    fn last_view_stays() {
        let mut context = Context::new();
        let world = World::from_ascii(WorldId(0), "a", WorldKind::Outside, &["....", "...."]).unwrap();
        let a = context.add_world(world);
        let world = World::from_ascii(WorldId(0), "b", WorldKind::Outside, &["..", ".."]).unwrap();
        let b = context.add_world(world);

        context.init_states(View::Outside(a));
        context.push_view(View::Outside(b));
        assert_eq!(context.current_world(), Some(b));
        assert_eq!(context.camera().world(), Some(b));
        assert_eq!(context.pop_view(), Some(View::Outside(b)));
        assert_eq!(context.pop_view(), None);
        assert_eq!(context.current_view(), Some(View::Outside(a)));
        assert_eq!(context.camera().world(), Some(a));
        assert_eq!(context.view_depth(), 1);
    }

    #[test]
    fn loading_a_view_centres_on_the_target() {
        let mut context = Context::new();
        let row = ".".repeat(100);
        let rows: Vec<&str> = (0..100).map(|_| row.as_str()).collect();
        let world = World::from_ascii(WorldId(0), "big", WorldKind::Outside, &rows).unwrap();
        let world = context.add_world(world);
        context.init_camera(Vec2::new(320.0, 240.0));
        context.follow(Some(CameraTarget::Position(Vec2::new(1600.0, 1600.0))));
        context.init_states(View::Outside(world));
        assert_eq!(context.camera().centre(), Vec2::new(1600.0, 1600.0));
    }
}
