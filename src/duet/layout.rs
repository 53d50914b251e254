//! Duet composition layout
//!
//! Where the reference and the captured stream sit in the final frame.
//! Pure presentation geometry; never involved in synchronization.

use serde::{Deserialize, Serialize};

/// Spatial arrangement of the two streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuetLayout {
    /// Reference on the left, camera on the right
    #[default]
    #[serde(rename = "side-by-side")]
    SideBySide,
    /// Reference on top, camera below
    #[serde(rename = "vertical")]
    Stacked,
}

impl DuetLayout {
    pub fn toggled(self) -> Self {
        match self {
            DuetLayout::SideBySide => DuetLayout::Stacked,
            DuetLayout::Stacked => DuetLayout::SideBySide,
        }
    }

    /// Pixel rectangles for a `width` x `height` output frame
    pub fn compose(self, width: u32, height: u32) -> Composition {
        match self {
            DuetLayout::SideBySide => {
                let left = width / 2;
                Composition {
                    reference: Rect::new(0, 0, left, height),
                    captured: Rect::new(left, 0, width - left, height),
                }
            }
            DuetLayout::Stacked => {
                let top = height / 2;
                Composition {
                    reference: Rect::new(0, 0, width, top),
                    captured: Rect::new(0, top, width, height - top),
                }
            }
        }
    }
}

/// Rectangle in output pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Placement of both streams in the output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub reference: Rect,
    pub captured: Rect,
}
