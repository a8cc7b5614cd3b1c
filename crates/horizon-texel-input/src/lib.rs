//! Input routing for Horizon Texel.
//!
//! This crate owns the keyboard and pointer plumbing shared by every viewer
//! mounted under one input provider:
//!
//! - **KeyState**: which keys are currently held, readable by any consumer
//! - **InputRouter**: the sole mutator of that state, and the dispatcher for
//!   pointer-move and wheel events to attached listeners
//! - **ListenerGuard**: RAII registration that detaches a listener on drop
//!
//! # Example
//!
//! ```
//! use horizon_texel_input::InputRouter;
//!
//! let router = InputRouter::new();
//! let keys = router.key_state();
//!
//! router.key_down("Control");
//! assert!(keys.is_pressed("Control"));
//!
//! router.key_up("Control");
//! assert!(!keys.is_pressed("Control"));
//! ```

mod events;
mod key_state;
pub mod logging;
mod router;

pub use events::{PointerButtons, PointerMoveEvent, TargetId, WheelEvent};
pub use key_state::KeyState;
pub use router::{InputListener, InputRouter, ListenerGuard, ListenerId};
