//! Tick timing metrics for the game loop.

use std::collections::VecDeque;
use std::time::Duration;

const WINDOW: usize = 120;

/// Tracks tick durations over a rolling window.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    tick_times: VecDeque<Duration>,
    pub total_ticks: u64,
}

impl TickMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            tick_times: VecDeque::with_capacity(WINDOW),
            total_ticks: 0,
        }
    }

    /// Record one completed tick.
    pub fn record_tick(&mut self, elapsed: Duration) {
        self.total_ticks += 1;
        self.tick_times.push_back(elapsed);
        if self.tick_times.len() > WINDOW {
            self.tick_times.pop_front();
        }
    }

    /// Get average tick time in milliseconds (over last 120 ticks).
    pub fn avg_tick_time_ms(&self) -> f32 {
        if self.tick_times.is_empty() {
            return 0.0;
        }
        let sum: Duration = self.tick_times.iter().sum();
        sum.as_secs_f32() * 1000.0 / self.tick_times.len() as f32
    }

    /// Ticks per second the simulation could sustain at the average tick time.
    pub fn max_tps(&self) -> f32 {
        let ms = self.avg_tick_time_ms();
        if ms > 0.0 {
            1000.0 / ms
        } else {
            0.0
        }
    }

    pub fn min_tick_time_ms(&self) -> f32 {
        self.tick_times
            .iter()
            .min()
            .map(|d| d.as_secs_f32() * 1000.0)
            .unwrap_or(0.0)
    }

    pub fn max_tick_time_ms(&self) -> f32 {
        self.tick_times
            .iter()
            .max()
            .map(|d| d.as_secs_f32() * 1000.0)
            .unwrap_or(0.0)
    }

    pub fn last_tick_time_ms(&self) -> f32 {
        self.tick_times
            .back()
            .map(|d| d.as_secs_f32() * 1000.0)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let mut metrics = TickMetrics::new();
        metrics.record_tick(Duration::from_millis(2));
        metrics.record_tick(Duration::from_millis(4));

        assert_eq!(metrics.total_ticks, 2);
        assert!((metrics.avg_tick_time_ms() - 3.0).abs() < 0.01);
        assert!((metrics.min_tick_time_ms() - 2.0).abs() < 0.01);
        assert!((metrics.max_tick_time_ms() - 4.0).abs() < 0.01);
        assert!((metrics.last_tick_time_ms() - 4.0).abs() < 0.01);
        assert!((metrics.max_tps() - 333.3).abs() < 1.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut metrics = TickMetrics::new();
        for _ in 0..WINDOW {
            metrics.record_tick(Duration::from_millis(100));
        }
        for _ in 0..WINDOW {
            metrics.record_tick(Duration::from_millis(1));
        }

        assert_eq!(metrics.total_ticks, 2 * WINDOW as u64);
        assert!((metrics.max_tick_time_ms() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = TickMetrics::new();
        assert_eq!(metrics.avg_tick_time_ms(), 0.0);
        assert_eq!(metrics.max_tps(), 0.0);
    }
}
