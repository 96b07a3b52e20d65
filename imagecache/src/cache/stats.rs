//! Cache statistics tracking and reporting.

use std::time::{Duration, Instant};

/// Counters and gauges for both cache tiers.
///
/// Each tier owns its own `CacheStats` and only touches its own fields;
/// [`CacheStats::absorb`] merges them into one view.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory tier
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_cost: u64,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,
    pub memory_clears: u64,
    pub memory_pressure_clears: u64,

    // Disk tier
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_read_failures: u64,
    pub disk_writes: u64,
    pub disk_write_failures: u64,
    pub disk_writes_coalesced: u64,
    pub disk_clears: u64,

    // Facade
    pub promotions: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,

    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_cost: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            memory_clears: 0,
            memory_pressure_clears: 0,
            disk_hits: 0,
            disk_misses: 0,
            disk_read_failures: 0,
            disk_writes: 0,
            disk_write_failures: 0,
            disk_writes_coalesced: 0,
            disk_clears: 0,
            promotions: 0,
            encode_failures: 0,
            decode_failures: 0,
            created_at: Instant::now(),
        }
    }

    /// Memory hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Disk hit rate (0.0 to 1.0).
    pub fn disk_hit_rate(&self) -> f64 {
        ratio(self.disk_hits, self.disk_hits + self.disk_misses)
    }

    /// Hit rate across both tiers (0.0 to 1.0).
    ///
    /// Every memory miss falls through to disk, so a disk miss is a full miss.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        ratio(hits, hits + self.disk_misses)
    }

    /// Time since statistics started.
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    pub fn record_memory_clear(&mut self) {
        self.memory_clears += 1;
    }

    pub fn record_memory_pressure_clear(&mut self) {
        self.memory_pressure_clears += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_disk_miss(&mut self) {
        self.disk_misses += 1;
    }

    /// A read that failed for a reason other than a missing file.
    ///
    /// Still counted as a miss as well.
    pub fn record_disk_read_failure(&mut self) {
        self.disk_read_failures += 1;
        self.disk_misses += 1;
    }

    pub fn record_disk_write(&mut self) {
        self.disk_writes += 1;
    }

    pub fn record_disk_write_failure(&mut self) {
        self.disk_write_failures += 1;
    }

    pub fn record_disk_write_coalesced(&mut self) {
        self.disk_writes_coalesced += 1;
    }

    pub fn record_disk_clear(&mut self) {
        self.disk_clears += 1;
    }

    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    pub fn record_encode_failure(&mut self) {
        self.encode_failures += 1;
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    /// Update memory tier gauges.
    pub fn update_memory_size(&mut self, cost: u64, entry_count: usize) {
        self.memory_cost = cost;
        self.memory_entry_count = entry_count;
    }

    /// Merge another tier's statistics into this one.
    pub fn absorb(&mut self, other: &CacheStats) {
        self.memory_hits += other.memory_hits;
        self.memory_misses += other.memory_misses;
        self.memory_cost += other.memory_cost;
        self.memory_entry_count += other.memory_entry_count;
        self.memory_evictions += other.memory_evictions;
        self.memory_clears += other.memory_clears;
        self.memory_pressure_clears += other.memory_pressure_clears;
        self.disk_hits += other.disk_hits;
        self.disk_misses += other.disk_misses;
        self.disk_read_failures += other.disk_read_failures;
        self.disk_writes += other.disk_writes;
        self.disk_write_failures += other.disk_write_failures;
        self.disk_writes_coalesced += other.disk_writes_coalesced;
        self.disk_clears += other.disk_clears;
        self.promotions += other.promotions;
        self.encode_failures += other.encode_failures;
        self.decode_failures += other.decode_failures;
        self.created_at = self.created_at.min(other.created_at);
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub disk_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
    pub uptime_secs: u64,
}

impl CacheStatistics {
    /// Create a statistics snapshot from current stats.
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            disk_hit_rate_percent: stats.disk_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
            uptime_secs: stats.uptime().as_secs(),
        }
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self) -> String {
        let stats = &self.stats;

        format!(
            r#"Image Cache Statistics

MEMORY
  Entries:     {}
  Cost:        {:.2} MP
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}
  Clears:      {} ({} on pressure)

DISK
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Coalesced:   {}
  Failures:    {}
  Clears:      {}

FACADE
  Promotions:  {}
  Encode errs: {}
  Decode errs: {}

OVERALL
  Hit Rate:    {:.1}%
  Uptime:      {}s
"#,
            stats.memory_entry_count,
            stats.memory_cost as f64 / 1_000_000.0,
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.memory_evictions,
            stats.memory_clears,
            stats.memory_pressure_clears,
            stats.disk_hits,
            stats.disk_misses,
            self.disk_hit_rate_percent,
            stats.disk_writes,
            stats.disk_writes_coalesced,
            stats.disk_write_failures,
            stats.disk_clears,
            stats.promotions,
            stats.encode_failures,
            stats.decode_failures,
            self.overall_hit_rate_percent,
            self.uptime_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();

        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 0);
        assert_eq!(stats.promotions, 0);
    }

    #[test]
    fn test_hit_rates_without_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.memory_hit_rate(), 0.0);
        assert_eq!(stats.disk_hit_rate(), 0.0);
        assert_eq!(stats.overall_hit_rate(), 0.0);
    }

    #[test]
    fn test_memory_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.memory_hits = 75;
        stats.memory_misses = 25;

        assert_eq!(stats.memory_hit_rate(), 0.75);
    }

    #[test]
    fn test_overall_hit_rate() {
        let mut stats = CacheStats::new();
        stats.memory_hits = 70;
        stats.disk_hits = 20;
        stats.disk_misses = 10;

        assert_eq!(stats.overall_hit_rate(), 0.9);
    }

    #[test]
    fn test_read_failure_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_disk_read_failure();

        assert_eq!(stats.disk_read_failures, 1);
        assert_eq!(stats.disk_misses, 1);
    }

    #[test]
    fn test_absorb_sums_tiers() {
        let mut memory = CacheStats::new();
        memory.record_memory_hit();
        memory.record_memory_eviction(3);
        memory.update_memory_size(5_000, 2);

        let mut disk = CacheStats::new();
        disk.record_disk_hit();
        disk.record_disk_write();
        disk.record_disk_write_coalesced();

        let mut combined = CacheStats::new();
        combined.absorb(&memory);
        combined.absorb(&disk);

        assert_eq!(combined.memory_hits, 1);
        assert_eq!(combined.memory_evictions, 3);
        assert_eq!(combined.memory_cost, 5_000);
        assert_eq!(combined.memory_entry_count, 2);
        assert_eq!(combined.disk_hits, 1);
        assert_eq!(combined.disk_writes, 1);
        assert_eq!(combined.disk_writes_coalesced, 1);
        assert!(combined.created_at <= memory.created_at);
    }

    #[test]
    fn test_cache_statistics_format() {
        let mut stats = CacheStats::new();
        stats.memory_hits = 9;
        stats.memory_misses = 1;
        stats.memory_entry_count = 4;
        stats.memory_pressure_clears = 2;
        stats.memory_clears = 3;

        let snapshot = CacheStatistics::from_stats(&stats);
        let formatted = snapshot.format();

        assert_eq!(snapshot.memory_hit_rate_percent, 90.0);
        assert!(formatted.contains("MEMORY"));
        assert!(formatted.contains("DISK"));
        assert!(formatted.contains("Entries:     4"));
        assert!(formatted.contains("Clears:      3 (2 on pressure)"));
    }
}
