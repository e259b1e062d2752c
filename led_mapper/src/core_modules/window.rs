// THEORY:
// The capture plays LEDs back to back, each lit for the same duration. The video is
// therefore a sequence of equal slots of `frames_per_led` frames, slot `i` belonging
// to LED `i`. A `FrameWindow` is the part of a slot that is safe to analyse: the
// first and last `margin` frames are dropped because the previous LED may still be
// decaying and the next one may already be ramping up.

use std::ops::Range;

/// Number of frames each LED is lit for, rounded to the nearest frame.
pub fn frames_per_led(fps: f64, seconds_per_led: f64) -> u64 {
    let frames = (fps * seconds_per_led).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// The half-open frame range `[start, end)` analysed for one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub led_index: usize,
    pub start: u64,
    pub end: u64,
}

impl FrameWindow {
    /// `start = i * frames_per_led + margin`, `end = (i + 1) * frames_per_led - margin`.
    /// A margin that swallows the whole slot yields an empty window. Bounds saturate
    /// at `u64::MAX`, which lies past the end of any real source.
    pub fn for_led(led_index: usize, frames_per_led: u64, margin: u64) -> Self {
        let slot_start = (led_index as u64).saturating_mul(frames_per_led);
        let slot_end = slot_start.saturating_add(frames_per_led);
        let start = slot_start.saturating_add(margin);
        let end = slot_end.saturating_sub(margin).max(start);
        Self {
            led_index,
            start,
            end,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn frames(&self) -> Range<u64> {
        self.start..self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_arithmetic_for_first_leds() {
        let fpl = frames_per_led(30.0, 0.5);
        assert_eq!(fpl, 15);

        let first = FrameWindow::for_led(0, fpl, 5);
        assert_eq!(first.frames(), 5..10);

        let second = FrameWindow::for_led(1, fpl, 5);
        assert_eq!(second.frames(), 20..25);
        assert_eq!(second.len(), 5);

        let later = FrameWindow::for_led(10, fpl, 5);
        assert_eq!(later.frames(), 155..160);
    }

    #[test]
    fn frames_per_led_rounds_to_nearest() {
        assert_eq!(frames_per_led(29.97, 0.5), 15);
        assert_eq!(frames_per_led(24.0, 0.125), 3);
        assert_eq!(frames_per_led(60.0, 0.25), 15);
        assert_eq!(frames_per_led(0.0, 0.5), 0);
        assert_eq!(frames_per_led(f64::NAN, 0.5), 0);
    }

    #[test]
    fn oversized_margin_gives_empty_window() {
        let window = FrameWindow::for_led(2, 10, 5);
        assert!(window.is_empty());
        assert_eq!(window.frames().count(), 0);

        let window = FrameWindow::for_led(2, 10, 7);
        assert!(window.is_empty());
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn zero_margin_covers_whole_slot() {
        let window = FrameWindow::for_led(3, 12, 0);
        assert_eq!(window.frames(), 36..48);
    }

    #[test]
    fn huge_slots_saturate_instead_of_overflowing() {
        let window = FrameWindow::for_led(usize::MAX, u64::MAX / 2, 5);
        assert!(window.is_empty());
        assert_eq!(window.start, u64::MAX);

        let window = FrameWindow::for_led(3, u64::MAX / 2, u64::MAX);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);

        let first = FrameWindow::for_led(0, u64::MAX, 5);
        assert_eq!(first.frames(), 5..u64::MAX - 5);
    }
}
