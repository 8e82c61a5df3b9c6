pub mod appearance;
pub mod cell;
pub mod cell_id;
pub mod dep_graph;
pub mod error;
pub mod events;
pub mod formula;
pub mod grid;
pub mod merge;
pub mod metrics;
pub mod recalc;
pub mod selection;
pub mod sheet;
pub mod snapshot;
