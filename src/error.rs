use std::path::PathBuf;
use thiserror::Error;

use crate::entity::EntityKind;

/// Everything that can go wrong while loading or running a simulation.
#[derive(Error, Debug)]
pub enum CityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse map {path}: {source}")]
    MapParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown block id {0}")]
    UnknownBlock(u32),
    #[error("layer '{0}' does not exist in this world")]
    UnknownLayer(String),
    #[error("invalid map: {0}")]
    InvalidMap(String),
    #[error("Mismatching entrances in building '{building}': {doors} doors but {mats} exit mats")]
    MismatchingEntrances {
        building: String,
        doors: usize,
        mats: usize,
    },
    #[error("no {kind} spawn at index {index}")]
    MissingSpawn { kind: EntityKind, index: usize },
    #[error("report error: {0}")]
    Csv(#[from] csv::Error),
    #[error("logging error: {0}")]
    Logging(String),
}
