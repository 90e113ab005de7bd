use std::collections::HashMap;
use std::time::Instant;

/// Startup timing, enabled with `-profile`.
///
/// Every report logs the absolute and the delta time since the previous
/// report. Reports whose label starts with `<` close a step and are added to
/// the owning plugin's total.
#[derive(Debug)]
pub struct Profiler {
    start: Instant,
    last_ms: u128,
    totals: HashMap<String, u128>,
}

impl Profiler {
    pub fn new() -> Self {
        log::info!("Profiling started");
        Self {
            start: Instant::now(),
            last_ms: 0,
            totals: HashMap::new(),
        }
    }

    pub fn report(&mut self, what: &str, plugin: Option<&str>) {
        let absolute_ms = self.start.elapsed().as_millis();
        let elapsed_ms = absolute_ms - self.last_ms;
        self.last_ms = absolute_ms;
        match plugin {
            Some(name) => log::info!("{:<22} {:<22} {:>8}ms ({:>8}ms)", what, name, absolute_ms, elapsed_ms),
            None => log::info!("{:<45} {:>8}ms ({:>8}ms)", what, absolute_ms, elapsed_ms),
        }
        if let (Some(name), true) = (plugin, what.starts_with('<')) {
            *self.totals.entry(name.to_string()).or_insert(0) += elapsed_ms;
        }
    }

    /// Per-plugin totals, cheapest first
    pub fn totals(&self) -> Vec<(String, u128)> {
        let mut totals: Vec<_> = self.totals.iter().map(|(n, t)| (n.clone(), *t)).collect();
        totals.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        totals
    }

    pub fn summary(&self) {
        let totals = self.totals();
        let total: u128 = totals.iter().map(|(_, t)| t).sum();
        for (name, ms) in &totals {
            let share = if total == 0 { 0.0 } else { 100.0 * *ms as f64 / total as f64 };
            log::info!("{:<22} {:>8}ms   ( {:>5.2}% )", name, ms, share);
        }
        log::info!("Total: {:>8}ms", total);
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}
