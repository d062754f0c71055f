//! # Resource Governor Module
//!
//! Controllo di ammissione "soft" basato sul carico del sistema.
//!
//! ## Responsabilità:
//! - Campiona CPU e memoria con `sysinfo`
//! - `admit`: controllo non bloccante (cpu < limite E memoria < limite)
//! - `await_admission`: ripete il controllo a intervalli fissi fino al
//!   timeout; allo scadere restituisce `false` ma l'orchestratore procede
//!   comunque (riduce la contesa, non rifiuta mai il lavoro)
//! - Abbassa la priorità del processo una volta all'avvio (best-effort)
//! - `inter_job_pause`: pausa fissa tra un job e il successivo
//!
//! Il campionatore è un trait così i test possono fornire carichi sintetici.

use crate::config::EngineConfig;
use crate::platform::PlatformCommands;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::System;
use tokio::time::Instant;
use tracing::{debug, info};

/// Point-in-time load reading; never persisted
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub sampled_at: Instant,
}

impl ResourceSnapshot {
    /// Admission predicate
    pub fn within(&self, config: &EngineConfig) -> bool {
        self.cpu_percent < config.cpu_limit_pct && self.memory_percent < config.memory_limit_pct
    }
}

/// Source of load readings
pub trait ResourceSampler {
    /// Current reading; must not block
    fn sample(&self) -> ResourceSnapshot;

    /// Time left before the next reading is meaningful
    fn settle_time(&self) -> Duration {
        Duration::ZERO
    }
}

/// `sysinfo`-backed sampler
///
/// CPU usage is a delta between two refreshes, so the first refresh happens
/// at construction. `settle_time` reports how much of the minimum update
/// interval is left; callers that can wait do so asynchronously.
pub struct SysinfoSampler {
    state: Mutex<(System, std::time::Instant)>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            state: Mutex::new((system, std::time::Instant::now())),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSampler {
    fn lock(&self) -> std::sync::MutexGuard<'_, (System, std::time::Instant)> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ResourceSampler for SysinfoSampler {
    fn settle_time(&self) -> Duration {
        let since = self.lock().1.elapsed();
        sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.saturating_sub(since)
    }

    fn sample(&self) -> ResourceSnapshot {
        let mut guard = self.lock();
        let (system, last_refresh) = &mut *guard;

        system.refresh_cpu_usage();
        system.refresh_memory();
        *last_refresh = std::time::Instant::now();

        let total_memory = system.total_memory();
        let memory_percent = if total_memory > 0 {
            (system.used_memory() as f64 / total_memory as f64 * 100.0) as f32
        } else {
            0.0
        };

        ResourceSnapshot {
            cpu_percent: system.global_cpu_usage(),
            memory_percent,
            sampled_at: Instant::now(),
        }
    }
}

/// Gates job admission on current system load
pub struct ResourceGovernor<S: ResourceSampler> {
    sampler: S,
}

impl ResourceGovernor<SysinfoSampler> {
    /// Governor over real system load; lowers this process's priority once
    pub fn system(config: &EngineConfig) -> Self {
        if PlatformCommands::lower_priority(config.process_nice) {
            debug!("Process priority lowered (nice {})", config.process_nice);
        } else {
            debug!("Could not change process priority, continuing");
        }
        Self::new(SysinfoSampler::new())
    }
}

impl<S: ResourceSampler> ResourceGovernor<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler }
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        self.sampler.sample()
    }

    /// Non-blocking admission check
    pub fn admit(&self, config: &EngineConfig) -> bool {
        let snapshot = self.sampler.sample();
        let admitted = snapshot.within(config);
        debug!(
            cpu = snapshot.cpu_percent,
            memory = snapshot.memory_percent,
            admitted,
            "Resource check"
        );
        admitted
    }

    /// Re-check every `config.admission_poll()` until admitted or `timeout` elapses
    pub async fn await_admission(&self, config: &EngineConfig, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut announced = false;

        loop {
            let settle = self.sampler.settle_time();
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            if self.admit(config) {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            if !announced {
                info!(
                    "⏳ System busy (limits CPU {:.0}% / memory {:.0}%), waiting for resources...",
                    config.cpu_limit_pct, config.memory_limit_pct
                );
                announced = true;
            }
            tokio::time::sleep(config.admission_poll()).await;
        }
    }

    /// Fixed pause between jobs to let transient load subside
    pub async fn inter_job_pause(&self, config: &EngineConfig) {
        let pause = config.inter_job_pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed series of (cpu, memory) readings, repeating the last one
    pub(crate) struct ScriptedSampler {
        readings: Mutex<VecDeque<(f32, f32)>>,
        last: Mutex<(f32, f32)>,
        settle: Duration,
        pub calls: AtomicUsize,
    }

    impl ScriptedSampler {
        pub(crate) fn new(readings: &[(f32, f32)]) -> Self {
            Self {
                readings: Mutex::new(readings.iter().copied().collect()),
                last: Mutex::new(readings.last().copied().unwrap_or((0.0, 0.0))),
                settle: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_settle(mut self, settle: Duration) -> Self {
            self.settle = settle;
            self
        }

        pub(crate) fn idle() -> Self {
            Self::new(&[(5.0, 20.0)])
        }
    }

    impl ResourceSampler for ScriptedSampler {
        fn settle_time(&self) -> Duration {
            self.settle
        }

        fn sample(&self) -> ResourceSnapshot {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reading = self
                .readings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(*self.last.lock().unwrap());
            ResourceSnapshot {
                cpu_percent: reading.0,
                memory_percent: reading.1,
                sampled_at: Instant::now(),
            }
        }
    }

    #[test]
    fn test_admit_predicate() {
        let config = EngineConfig::default();
        let governor = ResourceGovernor::new(ScriptedSampler::new(&[
            (10.0, 10.0),
            (90.0, 10.0),
            (10.0, 90.0),
            (85.0, 10.0),
        ]));
        assert!(governor.admit(&config));
        assert!(!governor.admit(&config));
        assert!(!governor.admit(&config));
        // strict comparison: sitting exactly on the limit is not admitted
        assert!(!governor.admit(&config));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_admission_waits_for_a_poll_interval() {
        let config = EngineConfig::default();
        let governor = ResourceGovernor::new(ScriptedSampler::new(&[(99.0, 20.0), (40.0, 20.0)]));

        let start = Instant::now();
        assert!(governor.await_admission(&config, Duration::from_secs(60)).await);
        assert!(start.elapsed() >= config.admission_poll());
        assert_eq!(governor.sampler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_admission_times_out() {
        let config = EngineConfig::default();
        let governor = ResourceGovernor::new(ScriptedSampler::new(&[(99.0, 99.0)]));

        let start = Instant::now();
        assert!(!governor.await_admission(&config, Duration::from_secs(10)).await);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_admission_immediate_when_idle() {
        let config = EngineConfig::default();
        let governor = ResourceGovernor::new(ScriptedSampler::idle());

        let start = Instant::now();
        assert!(governor.await_admission(&config, Duration::from_secs(10)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_job_pause() {
        let config = EngineConfig {
            inter_job_pause_seconds: 1.5,
            ..Default::default()
        };
        let governor = ResourceGovernor::new(ScriptedSampler::idle());
        let start = Instant::now();
        governor.inter_job_pause(&config).await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_admission_sleeps_out_settle_time() {
        let config = EngineConfig::default();
        let governor = ResourceGovernor::new(ScriptedSampler::idle().with_settle(Duration::from_millis(200)));

        let start = Instant::now();
        assert!(governor.await_admission(&config, Duration::from_secs(10)).await);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(governor.sampler.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_system_sampler_reports_percentages() {
        let snapshot = SysinfoSampler::new().sample();
        assert!(snapshot.memory_percent >= 0.0 && snapshot.memory_percent <= 100.0);
        assert!(snapshot.cpu_percent >= 0.0);
    }

    #[test]
    fn test_system_sampler_never_blocks() {
        let sampler = SysinfoSampler::new();
        assert!(sampler.settle_time() <= sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        let start = std::time::Instant::now();
        sampler.sample();
        sampler.sample();
        assert!(start.elapsed() < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    }
}
