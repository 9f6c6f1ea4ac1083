use crate::core::SearchEngine;
use crate::{Error, Result};

mod list;
mod vns;

pub use list::Greedy;
pub use vns::VariableNeighborhoodSearch;

/// Registered search engines.
#[allow(unsafe_code)]
#[linkme::distributed_slice]
pub static SEARCH_ENGINES: [fn() -> Box<dyn SearchEngine>];

/// Name of the engine used when none is configured.
pub const DEFAULT_ENGINE: &str = "VNS";

/// Creates the registered engine with the given name.
///
/// # Errors
/// - If no engine with that name is registered.
pub fn engine(name: &str) -> Result<Box<dyn SearchEngine>> {
    SEARCH_ENGINES
        .iter()
        .map(|init| init())
        .find(|engine| engine.name() == name)
        .ok_or_else(|| Error::UnknownEngine(name.into()))
}

/// Returns the names of all registered engines.
#[must_use]
pub fn names() -> Vec<String> {
    SEARCH_ENGINES.iter().map(|init| init().name().to_owned()).collect()
}
