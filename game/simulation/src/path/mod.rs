mod astar;
mod cache;
mod system;

pub use astar::Cell;
pub use cache::PathCache;
pub use system::{
    request_path, PathFollowerComponent, PathRequestError, PathRequestQueue, PathfindingSystem,
};
