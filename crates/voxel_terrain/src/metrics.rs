//! Rebuild statistics.
//!
//! Rebuild tasks record into a shared [`BuildMetrics`]; the world hands out
//! clones of it so readers never hold the lock while inspecting values.

use std::collections::VecDeque;

/// Samples kept per rolling window.
pub const WINDOW_SIZE: usize = 120;

/// Fixed-capacity history of recent values, oldest first.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  /// Window holding the last `capacity` values. Zero is treated as one.
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Push a value, evicting the oldest at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn sum(&self) -> u64 {
    self.buffer.iter().sum()
  }

  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

/// Per-world rebuild counters and recent history.
#[derive(Debug, Clone)]
pub struct BuildMetrics {
  /// Rebuild wall time in microseconds.
  pub rebuild_us: RollingWindow<u64>,
  /// Triangles in each published chunk mesh (seam excluded).
  pub triangles: RollingWindow<u64>,
  pub completed: u64,
  pub failed: u64,
  pub nav_created: u64,
  pub nav_removed: u64,
}

impl Default for BuildMetrics {
  fn default() -> Self {
    Self {
      rebuild_us: RollingWindow::new(WINDOW_SIZE),
      triangles: RollingWindow::new(WINDOW_SIZE),
      completed: 0,
      failed: 0,
      nav_created: 0,
      nav_removed: 0,
    }
  }
}

impl BuildMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_rebuild(&mut self, micros: u64, triangles: usize, nav_created: usize, nav_removed: usize) {
    self.rebuild_us.push(micros);
    self.triangles.push(triangles as u64);
    self.completed += 1;
    self.nav_created += nav_created as u64;
    self.nav_removed += nav_removed as u64;
  }

  pub fn record_failure(&mut self) {
    self.failed += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_window_evicts_oldest() {
    let mut window = RollingWindow::new(3);
    for v in 1..=5u64 {
      window.push(v);
    }
    assert_eq!(window.len(), 3);
    assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(window.last(), Some(&5));
    assert_eq!(window.min_max(), Some((3, 5)));
    assert!((window.average() - 4.0).abs() < 1e-9);
  }

  #[test]
  fn test_zero_capacity_keeps_latest() {
    let mut window = RollingWindow::new(0);
    assert_eq!(window.capacity(), 1);
    window.push(1u64);
    window.push(2);
    assert_eq!(window.len(), 1);
    assert_eq!(window.last(), Some(&2));
  }

  #[test]
  fn test_empty_window() {
    let mut window: RollingWindow<u64> = RollingWindow::new(4);
    assert!(window.is_empty());
    assert_eq!(window.average(), 0.0);
    assert_eq!(window.min_max(), None);
    window.push(9);
    window.clear();
    assert!(window.is_empty());
  }

  #[test]
  fn test_build_metrics_accumulate() {
    let mut metrics = BuildMetrics::new();
    metrics.record_rebuild(100, 12, 1, 0);
    metrics.record_rebuild(300, 0, 0, 1);
    metrics.record_failure();
    assert_eq!(metrics.completed, 2);
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.nav_created, 1);
    assert_eq!(metrics.nav_removed, 1);
    assert_eq!(metrics.triangles.sum(), 12);
    assert!((metrics.rebuild_us.average() - 200.0).abs() < 1e-9);
  }
}
