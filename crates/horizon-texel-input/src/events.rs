//! Pointer and wheel events forwarded by the host.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique target IDs.
static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies an element of the host's presentation tree that an event was
/// delivered to, such as a viewer container or one of its surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a new, process-unique target ID.
    pub fn new() -> Self {
        Self(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Bitmask of pointer buttons held during an event.
///
/// Bit layout follows the usual convention: bit 0 is the primary button,
/// bit 1 the secondary and bit 2 the auxiliary (middle) button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PointerButtons(u8);

impl PointerButtons {
    /// No buttons held.
    pub const NONE: Self = Self(0);
    /// Primary (usually left) button.
    pub const PRIMARY: Self = Self(1);
    /// Secondary (usually right) button.
    pub const SECONDARY: Self = Self(1 << 1);
    /// Auxiliary (usually middle) button.
    pub const AUXILIARY: Self = Self(1 << 2);

    /// Create from a raw bitmask.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get the raw bitmask.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every button in `other` is held.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the primary button is held.
    #[inline]
    pub const fn primary(self) -> bool {
        self.contains(Self::PRIMARY)
    }
}

impl std::ops::BitOr for PointerButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Relative pointer motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMoveEvent {
    /// Horizontal motion since the previous event, in screen pixels.
    pub movement_x: f64,
    /// Vertical motion since the previous event, in screen pixels.
    pub movement_y: f64,
    /// Buttons held during the move.
    pub buttons: PointerButtons,
}

impl PointerMoveEvent {
    /// Create a new pointer move event.
    pub fn new(movement_x: f64, movement_y: f64, buttons: PointerButtons) -> Self {
        Self {
            movement_x,
            movement_y,
            buttons,
        }
    }
}

/// A scroll-wheel step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Vertical scroll delta (positive = up/away from user).
    pub delta_y: f64,
    /// The element under the pointer, if the host performed hit testing.
    pub target: Option<TargetId>,
}

impl WheelEvent {
    /// Create a new wheel event.
    pub fn new(delta_y: f64, target: Option<TargetId>) -> Self {
        Self { delta_y, target }
    }

    /// Returns `true` if this step scrolls away from the user.
    #[inline]
    pub fn is_away(&self) -> bool {
        self.delta_y > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_uniqueness() {
        let a = TargetId::new();
        let b = TargetId::new();
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_buttons() {
        let held = PointerButtons::PRIMARY | PointerButtons::AUXILIARY;
        assert!(held.primary());
        assert!(held.contains(PointerButtons::AUXILIARY));
        assert!(!held.contains(PointerButtons::SECONDARY));
        assert!(!PointerButtons::from_bits(0b10).primary());
        assert_eq!(PointerButtons::NONE.bits(), 0);
    }

    #[test]
    fn test_wheel_direction() {
        assert!(WheelEvent::new(1.0, None).is_away());
        assert!(!WheelEvent::new(-3.0, None).is_away());
    }
}
