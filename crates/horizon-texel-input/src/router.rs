//! Global input routing.
//!
//! The [`InputRouter`] is the broadest input scope a host has: it receives
//! every key, pointer-move and wheel event regardless of which element has
//! focus. Keyboard events update the router's [`KeyState`]; pointer and
//! wheel events are fanned out to every attached [`InputListener`].
//!
//! Listeners are attached with [`InputRouter::attach`], which returns a
//! [`ListenerGuard`]. The listener stays attached exactly as long as the
//! guard lives.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::events::{PointerMoveEvent, WheelEvent};
use crate::key_state::KeyState;
use crate::logging::targets;

new_key_type! {
    /// A unique identifier for an attached listener.
    pub struct ListenerId;
}

/// Receives pointer-move and wheel events from an [`InputRouter`].
///
/// Both methods return `true` if the listener consumed the event, which
/// the host may use to suppress its default handling.
pub trait InputListener: Send + Sync {
    /// Called for every pointer-move event seen by the router.
    fn pointer_moved(&self, event: &PointerMoveEvent, keys: &KeyState) -> bool {
        let _ = (event, keys);
        false
    }

    /// Called for every wheel event seen by the router.
    fn wheel(&self, event: &WheelEvent, keys: &KeyState) -> bool {
        let _ = (event, keys);
        false
    }
}

type ListenerMap = Mutex<SlotMap<ListenerId, Arc<dyn InputListener>>>;

/// Owns the keyboard state for one input scope and dispatches pointer input.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_texel_input::{InputListener, InputRouter, KeyState, WheelEvent};
///
/// struct Logger;
/// impl InputListener for Logger {
///     fn wheel(&self, event: &WheelEvent, keys: &KeyState) -> bool {
///         keys.is_pressed("Control") && event.delta_y != 0.0
///     }
/// }
///
/// let router = InputRouter::new();
/// let guard = router.attach(Arc::new(Logger));
/// router.key_down("Control");
/// assert!(router.wheel(WheelEvent::new(1.0, None)));
///
/// drop(guard);
/// assert_eq!(router.listener_count(), 0);
/// ```
pub struct InputRouter {
    keys: KeyState,
    listeners: Arc<ListenerMap>,
}

impl InputRouter {
    /// Create a router with no keys held and no listeners.
    pub fn new() -> Self {
        Self {
            keys: KeyState::new(),
            listeners: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Get a read handle onto this router's key state.
    pub fn key_state(&self) -> KeyState {
        self.keys.clone()
    }

    /// Record a key press. Repeated presses without a release are ignored.
    ///
    /// Returns `true` if the state changed.
    pub fn key_down(&self, key: &str) -> bool {
        self.keys.press(key)
    }

    /// Record a key release. Releasing a key that is not held is ignored.
    ///
    /// Returns `true` if the state changed.
    pub fn key_up(&self, key: &str) -> bool {
        self.keys.release(key)
    }

    /// Release every held key, e.g. when the host window loses focus and
    /// will not deliver the matching key-up events.
    pub fn focus_lost(&self) {
        let released = self.keys.release_all();
        if released > 0 {
            tracing::debug!(target: targets::KEYS, released, "released held keys on focus loss");
        }
    }

    /// Dispatch a pointer-move event to every listener.
    ///
    /// Returns `true` if any listener consumed the event.
    pub fn pointer_moved(&self, event: PointerMoveEvent) -> bool {
        self.dispatch(|listener| listener.pointer_moved(&event, &self.keys))
    }

    /// Dispatch a wheel event to every listener.
    ///
    /// Returns `true` if any listener consumed the event.
    pub fn wheel(&self, event: WheelEvent) -> bool {
        self.dispatch(|listener| listener.wheel(&event, &self.keys))
    }

    /// Attach a listener for as long as the returned guard lives.
    #[must_use = "the listener is detached as soon as the guard is dropped"]
    pub fn attach(&self, listener: Arc<dyn InputListener>) -> ListenerGuard {
        let id = self.listeners.lock().insert(listener);
        tracing::debug!(target: targets::ROUTER, ?id, "listener attached");
        ListenerGuard {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Get the number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn dispatch(&self, mut f: impl FnMut(&dyn InputListener) -> bool) -> bool {
        // Snapshot so listeners may attach or detach while being called.
        let snapshot: Vec<Arc<dyn InputListener>> =
            self.listeners.lock().values().cloned().collect();
        tracing::trace!(target: targets::ROUTER, listener_count = snapshot.len(), "dispatching");

        let mut consumed = false;
        for listener in &snapshot {
            consumed |= f(listener.as_ref());
        }
        consumed
    }
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InputRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRouter")
            .field("keys", &self.keys)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener attached to its router. Detaches on drop.
///
/// The guard holds only a weak reference, so it is fine for it to outlive
/// the router.
#[derive(Debug)]
pub struct ListenerGuard {
    listeners: Weak<ListenerMap>,
    id: ListenerId,
}

impl ListenerGuard {
    /// Get the ID of the guarded listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(self.id);
            tracing::debug!(target: targets::ROUTER, id = ?self.id, "listener detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::PointerButtons;

    #[derive(Default)]
    struct Counter {
        moves: AtomicUsize,
        wheels: AtomicUsize,
    }

    impl InputListener for Counter {
        fn pointer_moved(&self, _event: &PointerMoveEvent, _keys: &KeyState) -> bool {
            self.moves.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn wheel(&self, _event: &WheelEvent, _keys: &KeyState) -> bool {
            self.wheels.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn test_key_down_up() {
        let router = InputRouter::new();
        let keys = router.key_state();
        assert!(router.key_down("Control"));
        assert!(keys.is_pressed("Control"));
        assert!(router.key_up("Control"));
        assert!(!keys.is_pressed("Control"));
    }

    #[test]
    fn test_repeated_key_down() {
        let router = InputRouter::new();
        assert!(router.key_down("Control"));
        let before = router.key_state().pressed_keys();
        assert!(!router.key_down("Control"));
        assert_eq!(router.key_state().pressed_keys(), before);
    }

    #[test]
    fn test_key_up_without_down() {
        let router = InputRouter::new();
        assert!(!router.key_up(" "));
        assert!(router.key_state().pressed_keys().is_empty());
    }

    #[test]
    fn test_focus_lost_releases_keys() {
        let router = InputRouter::new();
        router.key_down(" ");
        router.key_down("Control");
        router.focus_lost();
        assert!(router.key_state().pressed_keys().is_empty());
    }

    #[test]
    fn test_dispatch_reaches_listener() {
        let router = InputRouter::new();
        let counter = Arc::new(Counter::default());
        let _guard = router.attach(counter.clone());

        assert!(router.pointer_moved(PointerMoveEvent::new(1.0, 2.0, PointerButtons::PRIMARY)));
        assert!(!router.wheel(WheelEvent::new(1.0, None)));
        assert_eq!(counter.moves.load(Ordering::SeqCst), 1);
        assert_eq!(counter.wheels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_detaches() {
        let router = InputRouter::new();
        let counter = Arc::new(Counter::default());
        let guard = router.attach(counter.clone());
        assert_eq!(router.listener_count(), 1);

        drop(guard);
        assert_eq!(router.listener_count(), 0);
        assert!(!router.pointer_moved(PointerMoveEvent::new(1.0, 1.0, PointerButtons::NONE)));
        assert_eq!(counter.moves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_outlives_router() {
        let router = InputRouter::new();
        let guard = router.attach(Arc::new(Counter::default()));
        drop(router);
        drop(guard);
    }
}
