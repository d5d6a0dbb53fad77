//! Pure classifiers over vitals scalars.
//!
//! All functions here are total over the reals and reject NaN by returning
//! `None` instead of picking an arbitrary band.

use std::collections::VecDeque;

/// Number of heart-rate samples averaged for the sleep-state label.
pub const HR_WINDOW_SIZE: usize = 5;

/// Average heart rate strictly above this reads as awake.
pub const AWAKE_HR_THRESHOLD: f64 = 80.0;
/// Average heart rate strictly below this reads as asleep.
pub const SLEEP_HR_THRESHOLD: f64 = 70.0;

/// Breathing rate strictly below this is abnormally low.
pub const BR_LOW_THRESHOLD: f64 = 4.0;
/// Breathing rate strictly above this is abnormally high.
pub const BR_HIGH_THRESHOLD: f64 = 20.0;

/// Inclusive room-temperature band considered comfortable for sleep, °C.
pub const TEMP_SLEEP_RANGE: (f64, f64) = (18.0, 27.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    Asleep,
    Uncertain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathingBand {
    AbnormallyLow,
    Normal,
    AbnormallyHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempComfort {
    TooCold,
    Comfortable,
    TooHot,
}

/// Classify a window of heart-rate samples by its average.
///
/// Averages exactly on a threshold resolve to `Uncertain` (the comparisons
/// are strict). Returns `None` for an empty window or any NaN member.
pub fn detect_sleep_state(window: &[f64]) -> Option<SleepState> {
    if window.is_empty() || window.iter().any(|value| value.is_nan()) {
        return None;
    }
    let avg = window.iter().sum::<f64>() / window.len() as f64;
    if avg > AWAKE_HR_THRESHOLD {
        Some(SleepState::Awake)
    } else if avg < SLEEP_HR_THRESHOLD {
        Some(SleepState::Asleep)
    } else {
        Some(SleepState::Uncertain)
    }
}

/// Band a breathing rate. The cutoffs themselves (4 and 20) are Normal.
pub fn classify_breathing(br: f64) -> Option<BreathingBand> {
    if br.is_nan() {
        return None;
    }
    if br < BR_LOW_THRESHOLD {
        Some(BreathingBand::AbnormallyLow)
    } else if br > BR_HIGH_THRESHOLD {
        Some(BreathingBand::AbnormallyHigh)
    } else {
        Some(BreathingBand::Normal)
    }
}

/// Band a room temperature against the comfortable sleep range, inclusive
/// at both ends.
pub fn classify_temperature(temp: f64) -> Option<TempComfort> {
    if temp.is_nan() {
        return None;
    }
    if temp < TEMP_SLEEP_RANGE.0 {
        Some(TempComfort::TooCold)
    } else if temp > TEMP_SLEEP_RANGE.1 {
        Some(TempComfort::TooHot)
    } else {
        Some(TempComfort::Comfortable)
    }
}

/// Bounded window of the most recent heart-rate samples.
///
/// Rebuilt per session by the acquisition loop; classification only fires
/// once the window is full, matching the offline analysis behavior.
#[derive(Debug)]
pub struct HrWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HrWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, heart_rate: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(heart_rate);
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Sleep-state label for the current window, or `None` while the window
    /// is still filling (or contains NaN).
    pub fn classify(&self) -> Option<SleepState> {
        if !self.is_full() {
            return None;
        }
        let (front, back) = self.values.as_slices();
        let joined: Vec<f64> = front.iter().chain(back.iter()).copied().collect();
        detect_sleep_state(&joined)
    }
}

impl Default for HrWindow {
    fn default() -> Self {
        Self::new(HR_WINDOW_SIZE)
    }
}
