/*!
CSV log of notable simulation events.

Once [`ContextReportExt::init_report`] has been called, every building entry and exit, vehicle
boarding and exit, and death is written as a `time,event,entity,detail` row.
*/

use crate::building::{BuildingMovementEvent, ContextBuildingExt};
use crate::context::{Context, DataPlugin};
use crate::entity::{ContextEntityExt, EntityKilledEvent, VehicleEvent};
use crate::error::CityError;
use csv::Writer;
use log::error;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ReportRow {
    time: f64,
    event: &'static str,
    entity: String,
    detail: String,
}

#[derive(Default)]
struct ReportData {
    writer: Option<Writer<File>>,
    rows: usize,
}

impl DataPlugin for ReportData {
    fn init() -> Self {
        ReportData::default()
    }
}

fn record(context: &mut Context, event: &'static str, entity: String, detail: String) {
    let row = ReportRow {
        time: context.get_current_time(),
        event,
        entity,
        detail,
    };
    let data = context.get_data_container_mut::<ReportData>();
    let Some(writer) = data.writer.as_mut() else {
        return;
    };
    match writer.serialize(&row) {
        Ok(()) => data.rows += 1,
        Err(e) => error!("could not write report row {row:?}: {e}"),
    }
}

pub trait ContextReportExt {
    /// Creates the report file, overwriting any existing one, and starts recording.
    fn init_report(&mut self, path: &Path) -> Result<(), CityError>;

    /// Rows written so far.
    fn report_rows(&self) -> usize;

    fn flush_report(&mut self) -> Result<(), CityError>;
}

impl ContextReportExt for Context {
    fn init_report(&mut self, path: &Path) -> Result<(), CityError> {
        let writer = Writer::from_path(path)?;
        self.get_data_container_mut::<ReportData>().writer = Some(writer);

        self.subscribe_to_event(|context, event: BuildingMovementEvent| {
            let name = context.building(event.building).name.clone();
            let kind = if event.entered { "building_enter" } else { "building_exit" };
            record(context, kind, event.entity.to_string(), name);
        });
        self.subscribe_to_event(|context, event: VehicleEvent| {
            let kind = if event.entered { "vehicle_enter" } else { "vehicle_exit" };
            let detail = format!("{} seat {}", event.vehicle, event.seat);
            record(context, kind, event.human.to_string(), detail);
        });
        self.subscribe_to_event(|context, event: EntityKilledEvent| {
            let detail = format!("{} at {}", event.kind, context.entity(event.entity).transform);
            record(context, "death", event.entity.to_string(), detail);
        });
        Ok(())
    }

    fn report_rows(&self) -> usize {
        self.get_data_container::<ReportData>()
            .map_or(0, |data| data.rows)
    }

    fn flush_report(&mut self) -> Result<(), CityError> {
        if let Some(writer) = self.get_data_container_mut::<ReportData>().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::geometry::Vec2;
    use crate::world::{ContextWorldExt, World, WorldId, WorldKind};

    #[test]
    fn deaths_and_boardings_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let mut context = Context::new();
        context.init_report(&path).unwrap();

        let world = World::from_ascii(WorldId(0), "lot", WorldKind::Outside, &["....", "...."]).unwrap();
        let world = context.add_world(world);
        let human = context.create_human(world, Vec2::new(20.0, 20.0));
        let vehicle = context.create_vehicle(world, Vec2::new(60.0, 40.0), crate::geometry::Direction::South);
        context.enter_vehicle(vehicle, human);
        context.kill_entity(vehicle);
        context.execute();
        context.flush_report().unwrap();
        assert_eq!(context.report_rows(), 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["time", "event", "entity", "detail"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(&rows[0][1], "vehicle_enter");
        assert_eq!(&rows[0][2], human.to_string());
        assert_eq!(&rows[1][1], "death");
        assert!(rows[1][3].starts_with(&EntityKind::Vehicle.to_string()));
    }
}
