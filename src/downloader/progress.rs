//! Live multi-resource progress display.
//!
//! One [`ProgressBar`] per probed resource, composed into a single
//! [`MultiProgress`] pool that redraws in the background until every bar is
//! finished or the pool is stopped.
//!
//! Log output shares stderr with the pool; route it through [`SuspendWriter`]
//! so lines are printed above the bars instead of over them.

use std::io;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const REFRESH_HZ: u8 = 20;
const REFRESH_INTERVAL: Duration = Duration::from_millis(50);

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓░")
}

fn unsized_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {bytes} ({bytes_per_sec}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

static TERMINAL: LazyLock<MultiProgress> = LazyLock::new(|| {
    MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(REFRESH_HZ))
});

/// The process-wide stderr pool every visible tracker draws into.
pub fn terminal() -> &'static MultiProgress {
    &TERMINAL
}

/// Writer that hides the bars of `multi` while writing, then redraws them.
pub struct SuspendWriter<W> {
    multi: MultiProgress,
    inner: W,
}

impl<W: io::Write> SuspendWriter<W> {
    pub fn new(multi: MultiProgress, inner: W) -> Self {
        SuspendWriter { multi, inner }
    }
}

impl<W: io::Write> io::Write for SuspendWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        self.multi.suspend(|| inner.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let inner = &mut self.inner;
        self.multi.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let inner = &mut self.inner;
        self.multi.suspend(|| inner.flush())
    }
}

/// Bars with a known length redraw on every `inc`, throttled by the pool's
/// refresh rate. Only spinners need a ticker to keep moving between chunks.
fn needs_steady_tick(bar: &ProgressBar) -> bool {
    bar.length().is_none()
}

pub struct ProgressTracker {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
}

impl ProgressTracker {
    /// Tracker drawing into the shared stderr pool, see [`terminal`].
    pub fn new() -> Self {
        Self::with_pool(terminal().clone())
    }

    /// Tracker that tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self::with_pool(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    fn with_pool(multi: MultiProgress) -> Self {
        ProgressTracker {
            multi,
            bars: Mutex::new(Vec::new()),
        }
    }

    /// Creates an unregistered bar for a resource of `size_bytes`. A size of 0
    /// means the length is unknown and the bar counts bytes without a total.
    pub fn create(&self, target_name: &str, size_bytes: u64) -> ProgressBar {
        let (length, style) = if size_bytes == 0 {
            (None, unsized_style())
        } else {
            (Some(size_bytes), bar_style())
        };
        let bar = ProgressBar::with_draw_target(length, ProgressDrawTarget::hidden());
        bar.set_style(style);
        bar.set_prefix(format!("[{}]", target_name));
        bar
    }

    /// Adds the bars to the pool. Spinners also get a background ticker.
    pub fn register_all(&self, bars: &[ProgressBar]) {
        let mut registered = match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for bar in bars {
            let bar = self.multi.add(bar.clone());
            if needs_steady_tick(&bar) {
                bar.enable_steady_tick(REFRESH_INTERVAL);
            }
            registered.push(bar);
        }
    }

    pub fn len(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finalizes the pool. Bars still running are abandoned in place.
    pub fn stop(self) {
        let bars = match self.bars.into_inner() {
            Ok(bars) => bars,
            Err(poisoned) => poisoned.into_inner(),
        };
        for bar in bars.iter().filter(|bar| !bar.is_finished()) {
            bar.abandon_with_message("timed out");
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Advances `bar` by one streamed chunk.
pub fn advance(bar: &ProgressBar, delta_bytes: u64) {
    bar.inc(delta_bytes);
}

/// Marks `bar` as complete at `total_bytes`.
pub fn finish(bar: &ProgressBar, total_bytes: u64) {
    bar.set_length(total_bytes);
    bar.set_position(total_bytes);
    bar.finish_with_message("done");
}
