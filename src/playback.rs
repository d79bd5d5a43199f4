//! Tracks which row is currently speaking

use crate::types::RowId;

/// Slot for the row in a speaking state. Written by the sequencer, read by
/// its cancel path to know what to reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    speaking_row: Option<RowId>,
}

impl PlaybackState {
    pub fn current(&self) -> Option<RowId> {
        self.speaking_row
    }

    pub fn set(&mut self, row: RowId) {
        self.speaking_row = Some(row);
    }

    pub fn clear(&mut self) {
        self.speaking_row = None;
    }

    pub fn take(&mut self) -> Option<RowId> {
        self.speaking_row.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_row() {
        let mut state = PlaybackState::default();
        state.set(1);
        state.set(2);
        assert_eq!(state.current(), Some(2));
    }

    #[test]
    fn test_take_clears() {
        let mut state = PlaybackState::default();
        state.set(0);
        assert_eq!(state.take(), Some(0));
        assert_eq!(state.current(), None);
    }
}
