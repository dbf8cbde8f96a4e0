//! Memory pressure probes consulted by the index builders.
//!
//! A builder asks its probe at fixed intervals whether memory is tight. The
//! probe is injected, so tests can script pressure and exercise the spill
//! path deterministically.

use std::sync::atomic::{AtomicU64, Ordering};

/// Capability queried by the build driver before it decides to spill.
pub trait MemoryPressureProbe: Send + Sync {
    /// `accumulated` is the builder's own estimate of its in-memory state.
    fn under_pressure(&self, accumulated: u64) -> bool;

    /// Called once after the first breach, before the second check.
    fn reclaim(&self) {}

    /// Ceiling in bytes, for logging.
    fn ceiling(&self) -> u64;
}

/// Compares the resident set size of this process against a ceiling.
#[derive(Debug, Clone)]
pub struct ProcessMemoryProbe {
    ceiling: u64,
}

impl ProcessMemoryProbe {
    /// Ceiling of `ratio` times physical memory, or `limit` when given.
    pub fn new(ratio: f64, limit: Option<u64>) -> Self {
        let ceiling = limit.unwrap_or_else(|| (physical_memory() as f64 * ratio) as u64);
        Self { ceiling }
    }

    /// Resident set size of the current process in bytes (0 when unknown).
    pub fn resident(&self) -> u64 {
        resident_set_size()
    }
}

impl MemoryPressureProbe for ProcessMemoryProbe {
    fn under_pressure(&self, _accumulated: u64) -> bool {
        let used = resident_set_size();
        used > 0 && used > self.ceiling
    }

    fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

/// Compares the builder's accumulator estimate against a fixed byte budget.
#[derive(Debug)]
pub struct BudgetProbe {
    budget: u64,
    reclaims: AtomicU64,
}

impl BudgetProbe {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            reclaims: AtomicU64::new(0),
        }
    }

    /// Number of times a builder asked for memory to be reclaimed.
    pub fn reclaims(&self) -> u64 {
        self.reclaims.load(Ordering::Relaxed)
    }
}

impl MemoryPressureProbe for BudgetProbe {
    fn under_pressure(&self, accumulated: u64) -> bool {
        accumulated > self.budget
    }

    fn reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::Relaxed);
    }

    fn ceiling(&self) -> u64 {
        self.budget
    }
}

#[cfg(unix)]
fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

#[cfg(unix)]
fn physical_memory() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    if pages > 0 {
        pages as u64 * page_size()
    } else {
        u64::MAX
    }
}

#[cfg(not(unix))]
fn physical_memory() -> u64 {
    u64::MAX
}

#[cfg(target_os = "linux")]
fn resident_set_size() -> u64 {
    // Second field of statm is the resident page count
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| s.split_whitespace().nth(1)?.parse::<u64>().ok())
        .map(|pages| pages * page_size())
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn resident_set_size() -> u64 {
    0
}
