//! Display-unit formatters for sizes, speeds, and memory.
//!
//! The lifecycle initializes one [`Formatters`] set before the session is
//! constructed so every status line and log message renders values the same
//! way: SI (base-1000) units for sizes and speeds, IEC (base-1024) units for
//! memory.

/// Unit formatter set initialized once at daemon startup.
#[derive(Debug, Clone)]
pub struct Formatters {
    size_units: [&'static str; 5],
    speed_units: [&'static str; 5],
    mem_units: [&'static str; 5],
    size_base: f64,
    mem_base: f64,
}

impl Formatters {
    /// SI sizes/speeds (kB = 1000 bytes) and IEC memory (KiB = 1024 bytes).
    #[must_use]
    pub fn si() -> Self {
        Self {
            size_units: ["B", "kB", "MB", "GB", "TB"],
            speed_units: ["B/s", "kB/s", "MB/s", "GB/s", "TB/s"],
            mem_units: ["B", "KiB", "MiB", "GiB", "TiB"],
            size_base: 1000.0,
            mem_base: 1024.0,
        }
    }

    /// Format a byte count, e.g. `1.44 MB`.
    #[must_use]
    pub fn size(&self, bytes: u64) -> String {
        scale(to_f64(bytes), self.size_base, &self.size_units)
    }

    /// Format a transfer rate in bytes per second, e.g. `250.0 kB/s`.
    #[must_use]
    pub fn speed(&self, bytes_per_sec: f64) -> String {
        scale(bytes_per_sec.max(0.0), self.size_base, &self.speed_units)
    }

    /// Format a memory amount, e.g. `512.0 MiB`.
    #[must_use]
    pub fn memory(&self, bytes: u64) -> String {
        scale(to_f64(bytes), self.mem_base, &self.mem_units)
    }
}

impl Default for Formatters {
    fn default() -> Self {
        Self::si()
    }
}

#[allow(clippy::cast_precision_loss)] // display only, precision loss is acceptable
fn to_f64(value: u64) -> f64 {
    value as f64
}

fn scale(value: f64, base: f64, units: &[&'static str; 5]) -> String {
    let mut value = value;
    let mut index = 0;
    while value >= base && index + 1 < units.len() {
        value /= base;
        index += 1;
    }
    if index == 0 {
        // Whole bytes, no fraction.
        format!("{value:.0} {}", units[index])
    } else {
        format!("{value:.1} {}", units[index])
    }
}
