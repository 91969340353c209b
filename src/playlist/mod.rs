pub mod controller;
pub mod loader;
pub mod state;

pub use controller::{PlaybackController, PlaybackSnapshot};
pub use state::PlaylistState;
