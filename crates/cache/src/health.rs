//! Cache health reporting
//!
//! Turns a [`CacheStats`] snapshot into a coarse status plus tuning
//! recommendations, for periodic monitoring.

use std::fmt;

use tracing::{info, warn};

use crate::stats::CacheStats;

/// Cache health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealth {
    /// Cache is operating normally
    Healthy,
    /// Cache hit rate is low, consider tuning
    LowHitRate,
    /// Cache is nearly full, consider increasing the entry limit
    NearCapacity,
    /// Cache has both low hit rate and near capacity
    Critical,
}

impl fmt::Display for CacheHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::LowHitRate => write!(f, "Low Hit Rate"),
            Self::NearCapacity => write!(f, "Near Capacity"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Cache health report with diagnostics
#[derive(Debug, Clone)]
pub struct CacheHealthReport {
    /// Overall health status
    pub health: CacheHealth,
    /// Statistics the report was computed from
    pub stats: CacheStats,
    /// Recommendations for optimization
    pub recommendations: Vec<String>,
}

impl CacheHealthReport {
    /// Hit rate under which the cache counts as under-performing
    pub const LOW_HIT_RATE: f64 = 0.5;
    /// Fill ratio above which the cache counts as nearly full
    pub const NEAR_CAPACITY: f64 = 0.85;
    /// Accesses needed before the hit rate is judged
    pub const MIN_ACCESSES: u64 = 100;

    /// Generate a health report from a statistics snapshot
    ///
    /// # Example
    /// ```
    /// use stowage_cache::{CacheHealth, CacheHealthReport, CacheStats};
    ///
    /// let stats = CacheStats {
    ///     size: 10,
    ///     max_entries: Some(100),
    ///     hits: 90,
    ///     misses: 10,
    ///     ..Default::default()
    /// };
    /// assert_eq!(CacheHealthReport::from_stats(stats).health, CacheHealth::Healthy);
    /// ```
    pub fn from_stats(stats: CacheStats) -> Self {
        let mut recommendations = Vec::new();

        let low_hit_rate =
            stats.hit_rate() < Self::LOW_HIT_RATE && stats.total_accesses() > Self::MIN_ACCESSES;
        if low_hit_rate {
            recommendations.push(format!(
                "Hit rate is {:.2}%. Consider raising capacity limits or adjusting TTL.",
                stats.hit_rate() * 100.0
            ));
        }

        let fill = stats.fill_percentage();
        let near_capacity = fill.is_some_and(|pct| pct > Self::NEAR_CAPACITY);
        if let Some(pct) = fill.filter(|_| near_capacity) {
            recommendations
                .push(format!(
                    "Cache is {:.1}% full. Consider increasing max_entries.",
                    pct * 100.0
                ));
        }

        if stats.total_accesses() > 0 {
            let accesses = stats.total_accesses() as f64;
            let eviction_rate = stats.evictions as f64 / accesses;
            if eviction_rate > 0.2 {
                recommendations.push(format!(
                    "High eviction rate: {:.2}%. Cache may be too small for workload.",
                    eviction_rate * 100.0
                ));
            }
            let expiration_rate = stats.expirations as f64 / accesses;
            if expiration_rate > 0.3 {
                recommendations.push(format!(
                    "High expiration rate: {:.2}%. Consider increasing TTL.",
                    expiration_rate * 100.0
                ));
            }
        }

        if stats.load_failures + stats.store_failures > 0 {
            recommendations.push(format!(
                "{} load and {} store failures recorded. Check the backing source.",
                stats.load_failures, stats.store_failures
            ));
        }

        let health = match (low_hit_rate, near_capacity) {
            (true, true) => CacheHealth::Critical,
            (true, false) => CacheHealth::LowHitRate,
            (false, true) => CacheHealth::NearCapacity,
            (false, false) => CacheHealth::Healthy,
        };

        Self { health, stats, recommendations }
    }

    /// Emit the report through `tracing`
    pub fn log(&self) {
        match self.health {
            CacheHealth::Healthy => {
                info!(
                    health = %self.health,
                    hit_rate = self.stats.hit_rate(),
                    size = self.stats.size,
                    "Cache health check: Healthy"
                );
            }
            CacheHealth::LowHitRate | CacheHealth::NearCapacity | CacheHealth::Critical => {
                warn!(
                    health = %self.health,
                    hit_rate = self.stats.hit_rate(),
                    size = self.stats.size,
                    max_entries = ?self.stats.max_entries,
                    "Cache health check: Issues detected"
                );
                for rec in &self.recommendations {
                    warn!(recommendation = %rec, "Cache optimization recommendation");
                }
            }
        }
    }

    /// Report in JSON form for structured sinks
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "health": self.health.to_string(),
            "stats": self.stats,
            "hit_rate": self.stats.hit_rate(),
            "fill_percentage": self.stats.fill_percentage(),
            "recommendations": self.recommendations,
        })
    }
}

impl fmt::Display for CacheHealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache Health Report")?;
        writeln!(f, "===================")?;
        writeln!(f, "Status: {}", self.health)?;
        writeln!(f)?;
        writeln!(f, "Statistics:")?;
        writeln!(f, "  Size: {}/{:?}", self.stats.size, self.stats.max_entries)?;
        writeln!(f, "  Hits: {}", self.stats.hits)?;
        writeln!(f, "  Misses: {}", self.stats.misses)?;
        writeln!(f, "  Hit Rate: {:.2}%", self.stats.hit_rate() * 100.0)?;
        writeln!(f, "  Loads: {} ({} failed)", self.stats.loads, self.stats.load_failures)?;
        writeln!(f, "  Evictions: {}", self.stats.evictions)?;
        writeln!(f, "  Expirations: {}", self.stats.expirations)?;
        if let Some(fill_pct) = self.stats.fill_percentage() {
            writeln!(f, "  Fill: {:.1}%", fill_pct * 100.0)?;
        }

        if !self.recommendations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recommendations:")?;
            for (i, rec) in self.recommendations.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, rec)?;
            }
        }

        Ok(())
    }
}
