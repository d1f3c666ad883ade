//! Animated icons: a set of decoded frames plus a display sequence.

use crate::Bitmap;

/// One step of an animation: which frame to show, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimFrame {
    pub frame: usize,
    pub delay_ms: u32,
}

/// Decoded frames and the order they play in. Step 0 is the still icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatedIcon {
    frames: Vec<Bitmap>,
    sequence: Vec<AnimFrame>,
}

impl AnimatedIcon {
    /// Build an animation. Returns `None` if the sequence is empty or
    /// refers to a frame that does not exist.
    pub fn new(frames: Vec<Bitmap>, sequence: Vec<AnimFrame>) -> Option<Self> {
        if sequence.is_empty() || sequence.iter().any(|s| s.frame >= frames.len()) {
            return None;
        }
        Some(Self { frames, sequence })
    }

    pub fn frames(&self) -> &[Bitmap] {
        &self.frames
    }

    pub fn sequence(&self) -> &[AnimFrame] {
        &self.sequence
    }

    /// The bitmap shown first.
    pub fn primary(&self) -> &Bitmap {
        // Construction guarantees sequence[0] indexes a real frame.
        &self.frames[self.sequence[0].frame]
    }

    /// Total play time of one loop.
    pub fn duration_ms(&self) -> u64 {
        self.sequence.iter().map(|s| s.delay_ms as u64).sum()
    }
}
