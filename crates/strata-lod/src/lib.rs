//! Level-of-detail management: distance thresholds and chunk bounds distance.

mod selector;

pub use selector::{LodInfo, LodTable, LodTableError, sqr_distance_to_bounds};
