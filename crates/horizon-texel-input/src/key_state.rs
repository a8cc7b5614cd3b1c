//! Shared keyboard press state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::logging::targets;

/// A read handle onto the set of currently pressed keys.
///
/// Key identifiers are logical key names as reported by the host, e.g.
/// `"Control"`, `"Shift"` or `" "` for the space bar.
///
/// Every clone observes the same underlying state. Only the owning
/// [`InputRouter`](crate::InputRouter) can change it, so consumers always
/// read the latest value without subscribing to anything.
#[derive(Clone, Default)]
pub struct KeyState {
    keys: Arc<RwLock<HashMap<String, bool>>>,
}

impl KeyState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` is currently held.
    pub fn is_pressed(&self, key: &str) -> bool {
        self.keys.read().get(key).copied().unwrap_or(false)
    }

    /// Returns the identifiers of all keys currently held, sorted.
    pub fn pressed_keys(&self) -> Vec<String> {
        let mut pressed: Vec<String> = self
            .keys
            .read()
            .iter()
            .filter(|(_, down)| **down)
            .map(|(key, _)| key.clone())
            .collect();
        pressed.sort();
        pressed
    }

    /// Marks `key` pressed. Returns `false` if it was already pressed.
    pub(crate) fn press(&self, key: &str) -> bool {
        let mut keys = self.keys.write();
        if keys.get(key).copied().unwrap_or(false) {
            return false;
        }
        keys.insert(key.to_owned(), true);
        tracing::trace!(target: targets::KEYS, key, "pressed");
        true
    }

    /// Marks `key` released. Returns `false` if it was not pressed.
    pub(crate) fn release(&self, key: &str) -> bool {
        let mut keys = self.keys.write();
        match keys.get_mut(key) {
            Some(down) if *down => {
                *down = false;
                tracing::trace!(target: targets::KEYS, key, "released");
                true
            }
            _ => false,
        }
    }

    /// Releases every held key. Returns the number of keys released.
    pub(crate) fn release_all(&self) -> usize {
        let mut keys = self.keys.write();
        let mut released = 0;
        for down in keys.values_mut().filter(|down| **down) {
            *down = false;
            released += 1;
        }
        released
    }
}

impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyState")
            .field("pressed", &self.pressed_keys())
            .finish()
    }
}
