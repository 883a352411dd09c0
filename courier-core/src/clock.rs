//! In-game time as seen by the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    Dawn,
    Morning,
    Midday,
    Afternoon,
    Evening,
    Night,
}

impl TimeWindow {
    pub fn name(&self) -> &'static str {
        match self {
            TimeWindow::Dawn => "dawn",
            TimeWindow::Morning => "morning",
            TimeWindow::Midday => "midday",
            TimeWindow::Afternoon => "afternoon",
            TimeWindow::Evening => "evening",
            TimeWindow::Night => "night",
        }
    }

    fn from_hour(hour: u32) -> Self {
        match hour {
            5..=7 => TimeWindow::Dawn,
            8..=11 => TimeWindow::Morning,
            12..=13 => TimeWindow::Midday,
            14..=17 => TimeWindow::Afternoon,
            18..=20 => TimeWindow::Evening,
            _ => TimeWindow::Night,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Day counter plus the segment within the day. One segment is one time
/// unit of obligation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    pub day: u32,
    pub segment: u32,
    pub segments_per_day: u32,
}

impl GameClock {
    pub fn new(day: u32, segment: u32, segments_per_day: u32) -> Self {
        let segments_per_day = segments_per_day.max(1);
        Self {
            day: day.saturating_add(segment / segments_per_day),
            segment: segment % segments_per_day,
            segments_per_day,
        }
    }

    /// The first segment of `window` on `day`. Falls back to the start of the
    /// day when the day is too coarse to contain that window.
    pub fn at_window(day: u32, window: TimeWindow, segments_per_day: u32) -> Self {
        let segments_per_day = segments_per_day.max(1);
        let segment = (0..segments_per_day)
            .find(|&segment| Self::new(day, segment, segments_per_day).window() == window)
            .unwrap_or(0);
        Self::new(day, segment, segments_per_day)
    }

    /// Rebuild through [`new`](Self::new) so a hand-built or deserialized
    /// clock gets a positive day length and an in-range segment.
    pub fn normalized(self) -> Self {
        Self::new(self.day, self.segment, self.segments_per_day)
    }

    pub fn advance(&mut self, segments: u32) {
        let per_day = u64::from(self.segments_per_day.max(1));
        let total = u64::from(self.segment) + u64::from(segments);
        self.segments_per_day = per_day as u32;
        self.segment = (total % per_day) as u32;
        self.day = self
            .day
            .saturating_add(u32::try_from(total / per_day).unwrap_or(u32::MAX));
    }

    /// The named window the current segment falls in. Segments are scaled
    /// onto a 24-hour day.
    pub fn window(&self) -> TimeWindow {
        let per_day = u64::from(self.segments_per_day.max(1));
        let hour = u64::from(self.segment) * 24 / per_day;
        TimeWindow::from_hour(u32::try_from(hour).unwrap_or(u32::MAX))
    }
}

impl Default for GameClock {
    fn default() -> Self {
        // Day 1, dawn.
        Self::new(1, 6, 24)
    }
}
