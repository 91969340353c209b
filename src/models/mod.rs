pub mod audio_item;
pub mod session;
pub mod task;

pub use audio_item::AudioItem;
pub use session::{SessionMode, SessionRecord};
pub use task::TaskRef;
