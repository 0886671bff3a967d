use crate::config::{MAX_FOLLOW_WINDOW_SECS, MIN_FOLLOW_WINDOW_SECS};
use crate::ping::Sample;

const AUTO_RANGE_PADDING: f64 = 0.05;
const MANUAL_CHANGE_TOLERANCE: f64 = 0.1;
const FOLLOW_Y_PADDING: f64 = 0.1;
const FOLLOW_Y_MIN_PADDING_MS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRange {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ViewRange {
    pub const EMPTY: ViewRange = ViewRange {
        x_min: -1.0,
        x_max: 1.0,
        y_min: 0.0,
        y_max: 100.0,
    };
}

/// What the chart should do with its visible range after a data or mode change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewDecision {
    /// Show exactly this range.
    Follow(ViewRange),
    /// Fit the whole history.
    AutoFit,
    /// Leave the user's range alone.
    Keep,
}

/// The two display modes. They are tracked separately because a manual zoom
/// or pan turns auto-range off without turning follow mode on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    auto_range: bool,
    follow_mode: bool,
    follow_window_secs: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ViewState {
    pub fn new(follow_window_secs: u32) -> Self {
        Self {
            auto_range: true,
            follow_mode: false,
            follow_window_secs: follow_window_secs.clamp(MIN_FOLLOW_WINDOW_SECS, MAX_FOLLOW_WINDOW_SECS),
        }
    }

    pub fn auto_range(&self) -> bool {
        self.auto_range
    }

    pub fn follow_mode(&self) -> bool {
        self.follow_mode
    }

    pub fn follow_window_secs(&self) -> u32 {
        self.follow_window_secs
    }

    pub fn set_follow_mode(&mut self, enabled: bool) {
        self.follow_mode = enabled;
        self.auto_range = !enabled;
    }

    pub fn set_follow_window(&mut self, secs: u32) {
        self.follow_window_secs = secs.clamp(MIN_FOLLOW_WINDOW_SECS, MAX_FOLLOW_WINDOW_SECS);
    }

    pub fn reset(&mut self) {
        self.follow_mode = false;
        self.auto_range = true;
    }

    /// A new session starts fitted unless the user asked to follow.
    pub fn on_session_start(&mut self) {
        if !self.follow_mode {
            self.auto_range = true;
        }
    }

    pub fn decide<'a, I>(&self, samples: I) -> ViewDecision
    where
        I: IntoIterator<Item = &'a Sample>,
        I::IntoIter: Clone,
    {
        if self.follow_mode {
            match follow_range(samples, self.follow_window_secs) {
                Some(range) => ViewDecision::Follow(range),
                None => ViewDecision::Keep,
            }
        } else if self.auto_range {
            ViewDecision::AutoFit
        } else {
            ViewDecision::Keep
        }
    }

    /// Called when the chart reports a zoom or pan. The chart does not say
    /// who moved it, so a right edge far from where auto-range would put it
    /// is taken as the user's doing. Returns the resulting auto-range flag.
    pub fn on_manual_view_change<'a, I>(&mut self, samples: I, current_x_max: f64) -> bool
    where
        I: IntoIterator<Item = &'a Sample>,
        I::IntoIter: Clone,
    {
        let samples = samples.into_iter();
        if self.follow_mode || samples.clone().next().is_none() {
            return self.auto_range;
        }

        let (expected_min, expected_max) = expected_x_range(samples);
        let span = expected_max - expected_min;
        let span = if span > 0.0 { span } else { 1.0 };

        self.auto_range = (current_x_max - expected_max).abs() <= span * MANUAL_CHANGE_TOLERANCE;
        if !self.auto_range {
            log::debug!("View changed by user, auto-range off");
        }
        self.auto_range
    }
}

/// The trailing `window_secs` of data, with the latency axis fitted to the
/// samples inside the window. None when there is no data.
pub fn follow_range<'a, I>(samples: I, window_secs: u32) -> Option<ViewRange>
where
    I: IntoIterator<Item = &'a Sample>,
    I::IntoIter: Clone,
{
    let samples = samples.into_iter();
    let latest = samples.clone().map(|s| s.elapsed_s).reduce(f64::max)?;
    let window_start = latest - f64::from(window_secs);

    let (y_min, y_max) = latency_bounds(samples.filter(|s| s.elapsed_s >= window_start))?;
    let padding = ((y_max - y_min) * FOLLOW_Y_PADDING).max(FOLLOW_Y_MIN_PADDING_MS);

    Some(ViewRange {
        x_min: window_start,
        x_max: latest,
        y_min: (y_min - padding).max(0.0),
        y_max: y_max + padding,
    })
}

/// The x range auto-range would settle on: the data span plus 5% each side.
pub fn expected_x_range<'a, I>(samples: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut count = 0usize;
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for sample in samples {
        count += 1;
        min = min.min(sample.elapsed_s);
        max = max.max(sample.elapsed_s);
    }

    if count < 2 {
        return (-1.0, 1.0);
    }
    let padding = if max > min { (max - min) * AUTO_RANGE_PADDING } else { 1.0 };
    (min - padding, max + padding)
}

/// The range shown when auto-range is on.
pub fn fit_range<'a, I>(samples: I) -> ViewRange
where
    I: IntoIterator<Item = &'a Sample>,
    I::IntoIter: Clone,
{
    let samples = samples.into_iter();
    let Some((y_min, y_max)) = latency_bounds(samples.clone()) else {
        return ViewRange::EMPTY;
    };

    let (x_min, x_max) = expected_x_range(samples);
    let padding = if y_max > y_min { (y_max - y_min) * AUTO_RANGE_PADDING } else { 1.0 };

    ViewRange {
        x_min,
        x_max,
        y_min: (y_min - padding).max(0.0),
        y_max: y_max + padding,
    }
}

fn latency_bounds<'a>(samples: impl Iterator<Item = &'a Sample>) -> Option<(f64, f64)> {
    samples.fold(None, |bounds, s| match bounds {
        None => Some((s.latency_ms, s.latency_ms)),
        Some((min, max)) => Some((f64::min(min, s.latency_ms), f64::max(max, s.latency_ms))),
    })
}
