pub mod controller;
pub mod state;

pub use controller::{PomodoroController, PomodoroEvent};
pub use state::{Effect, FocusStatus, PomodoroSnapshot, PomodoroState};
