use crate::models::AudioItem;

/// Ordered items plus a cursor. `current_index` always points at a valid item
/// while the list is non-empty.
#[derive(Debug, Clone, Default)]
pub struct PlaylistState {
    items: Vec<AudioItem>,
    current_index: usize,
    is_playing: bool,
}

impl PlaylistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list and rewinds to the first item. Empty input is
    /// ignored and reported with `false`.
    pub fn replace(&mut self, items: Vec<AudioItem>) -> bool {
        if items.is_empty() {
            return false;
        }
        self.items = items;
        self.current_index = 0;
        self.is_playing = false;
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current_index = 0;
        self.is_playing = false;
    }

    pub fn items(&self) -> &[AudioItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&AudioItem> {
        self.items.get(self.current_index)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.current().map(|item| item.name.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing && !self.items.is_empty();
    }

    /// Moves to the following item, wrapping to the first after the last.
    pub fn advance(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        self.current_index = (self.current_index + 1) % len;
        Some(self.current_index)
    }

    /// Moves to the preceding item, wrapping to the last before the first.
    pub fn retreat(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        self.current_index = (self.current_index + len - 1) % len;
        Some(self.current_index)
    }

    /// Moves to the following item unless the cursor is on the last one.
    pub fn advance_without_wrap(&mut self) -> Option<usize> {
        if self.current_index + 1 >= self.items.len() {
            return None;
        }
        self.current_index += 1;
        Some(self.current_index)
    }
}
