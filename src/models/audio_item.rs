use std::{fmt, sync::Arc};

/// An audio file held in memory together with the name shown in the player.
#[derive(Clone)]
pub struct AudioItem {
    pub name: String,
    data: Arc<[u8]>,
}

impl AudioItem {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Shared handle to the encoded bytes; cloning it does not copy the file.
    pub fn data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for AudioItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioItem")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}
