use std::fmt::{Display, Formatter};

use logminer_types::{log::debug, models::config::WindowConfig, offset::Scn};

/// An inclusive SCN range mined in one LogMiner session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScnWindow {
    pub start: Scn,
    pub end: Scn,
}

impl ScnWindow {
    pub fn new(start: Scn, end: Scn) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, scn: Scn) -> bool {
        self.start <= scn && scn <= self.end
    }
}

impl Display for ScnWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Picks consecutive mining windows and sizes them by what the previous one yielded.
#[derive(Debug, Clone)]
pub struct WindowAdvancer {
    config: WindowConfig,
    size: Scn,
    next_start: Scn,
    low_water_mark: Option<Scn>,
}

impl WindowAdvancer {
    pub fn new(config: WindowConfig, start: Scn) -> Self {
        let size = config
            .default_size
            .max(config.min_size)
            .min(config.max_size)
            .max(1);
        Self {
            config,
            size,
            next_start: start,
            low_water_mark: None,
        }
    }

    pub fn size(&self) -> Scn {
        self.size
    }

    pub fn next_start(&self) -> Scn {
        self.next_start
    }

    /// Highest SCN all rows up to which have been handed out.
    pub fn low_water_mark(&self) -> Option<Scn> {
        self.low_water_mark
    }

    pub fn is_caught_up(&self, current_scn: Scn) -> bool {
        self.next_start > current_scn
    }

    /// The next window, never past `current_scn`. `None` when there is nothing new to mine.
    pub fn next_window(&self, current_scn: Scn) -> Option<ScnWindow> {
        if self.is_caught_up(current_scn) {
            return None;
        }
        let end = self
            .next_start
            .saturating_add(self.size - 1)
            .min(current_scn);
        Some(ScnWindow::new(self.next_start, end))
    }

    /// Records that `window` has been mined, with `rows` rows of monitored tables.
    ///
    /// Rows of transactions open since `open_since` are still buffered, so the low-water mark
    /// stays below it.
    pub fn complete(&mut self, window: ScnWindow, rows: usize, open_since: Option<Scn>) {
        self.next_start = window.end + 1;
        let handed_out =
            open_since.map_or(window.end, |scn| window.end.min(scn.saturating_sub(1)));
        self.low_water_mark = Some(
            self.low_water_mark
                .map_or(handed_out, |mark| mark.max(handed_out)),
        );

        let min_size = self.config.min_size.max(1);
        let max_size = self.config.max_size.max(min_size);
        if rows == 0 {
            self.size = self.size.saturating_mul(2).min(max_size);
        } else if rows > self.config.high_water_rows {
            self.size = (self.size / 2).max(min_size);
        }
        debug!(
            "Window {} yielded {} rows, next window size {}",
            window, rows, self.size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WindowConfig {
        WindowConfig {
            default_size: 100,
            min_size: 10,
            max_size: 400,
            high_water_rows: 1000,
        }
    }

    #[test]
    fn test_never_past_current_scn() {
        let advancer = WindowAdvancer::new(config(), 1000);
        assert_eq!(advancer.next_window(999), None);
        assert_eq!(advancer.next_window(1000), Some(ScnWindow::new(1000, 1000)));
        assert_eq!(advancer.next_window(1050), Some(ScnWindow::new(1000, 1050)));
        assert_eq!(advancer.next_window(5000), Some(ScnWindow::new(1000, 1099)));
    }

    #[test]
    fn test_grow_on_empty_and_shrink_on_busy() {
        let mut advancer = WindowAdvancer::new(config(), 1);
        let window = advancer.next_window(10_000).unwrap();
        advancer.complete(window, 0, None);
        assert_eq!(advancer.size(), 200);
        let window = advancer.next_window(10_000).unwrap();
        assert_eq!(window, ScnWindow::new(101, 300));
        advancer.complete(window, 0, None);
        advancer.complete(advancer.next_window(10_000).unwrap(), 0, None);
        assert_eq!(advancer.size(), 400);

        advancer.complete(advancer.next_window(10_000).unwrap(), 5000, None);
        assert_eq!(advancer.size(), 200);
        advancer.complete(advancer.next_window(10_000).unwrap(), 500, None);
        assert_eq!(advancer.size(), 200);
        for _ in 0..10 {
            advancer.complete(advancer.next_window(100_000).unwrap(), 5000, None);
        }
        assert_eq!(advancer.size(), 10);
    }

    #[test]
    fn test_low_water_mark_moves_forward() {
        let mut advancer = WindowAdvancer::new(config(), 1);
        assert_eq!(advancer.low_water_mark(), None);
        let window = advancer.next_window(50).unwrap();
        advancer.complete(window, 3, None);
        assert_eq!(advancer.low_water_mark(), Some(50));
        assert_eq!(advancer.next_start(), 51);
        assert!(advancer.is_caught_up(50));
        assert!(!advancer.is_caught_up(51));
    }

    #[test]
    fn test_low_water_mark_stays_below_open_transactions() {
        let mut advancer = WindowAdvancer::new(config(), 1);
        advancer.complete(advancer.next_window(1000).unwrap(), 3, Some(20));
        assert_eq!(advancer.low_water_mark(), Some(19));
        assert_eq!(advancer.next_start(), 101);
        advancer.complete(advancer.next_window(1000).unwrap(), 0, Some(20));
        assert_eq!(advancer.low_water_mark(), Some(19));
        let window = advancer.next_window(1000).unwrap();
        advancer.complete(window, 2, None);
        assert_eq!(advancer.low_water_mark(), Some(window.end));
        // Never moves back.
        advancer.complete(advancer.next_window(1000).unwrap(), 1, Some(5));
        assert_eq!(advancer.low_water_mark(), Some(window.end));
    }

    #[test]
    fn test_size_respects_bounds() {
        let advancer = WindowAdvancer::new(
            WindowConfig {
                default_size: 5,
                ..config()
            },
            1,
        );
        assert_eq!(advancer.size(), 10);
    }
}
