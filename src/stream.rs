//! Live telemetry stream.
//!
//! A single controller owns one periodic tokio task that appends a fresh
//! reading to a bounded ring buffer on every tick. Starting a running stream
//! and stopping a stopped one are both no-ops.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::catalog::{self, Status};
use crate::generator::PointGenerator;
use crate::logging::{log, log_stream_state, obj, v_str, Domain, Level};
use crate::sample::Sample;

/// Readings generated when a stream starts with an empty buffer.
pub const PREFILL: usize = 10;
/// Shortest timer period; tokio rejects a zero interval.
pub const MIN_TICK: Duration = Duration::from_millis(1);

// =============================================================================
// Ring buffer
// =============================================================================

/// Bounded FIFO that drops its oldest entries once full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, returning the evicted oldest one if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    /// Shrinking drops the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

// =============================================================================
// Live readings
// =============================================================================

/// All live channels sampled at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub frequency: f64,
    pub efficiency: f64,
    pub power: f64,
    pub snr: f64,
}

impl LiveReading {
    pub fn channels(&self) -> [(&'static str, f64); 7] {
        [
            ("voltage", self.voltage),
            ("current", self.current),
            ("temperature", self.temperature),
            ("frequency", self.frequency),
            ("efficiency", self.efficiency),
            ("power", self.power),
            ("snr", self.snr),
        ]
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.channels().iter().find(|(id, _)| *id == metric).map(|(_, v)| *v)
    }

    /// Status against the live bands; channels without bands are normal.
    pub fn status(&self, metric: &str) -> Status {
        match (catalog::live_metric(metric), self.get(metric)) {
            (Some(band), Some(value)) => band.status(value),
            _ => Status::Normal,
        }
    }

    /// Live power is derived as V·I/1000 and so is in watts, unlike the
    /// catalog's milliwatt power metric.
    pub fn unit(metric: &str) -> &'static str {
        match (metric, catalog::live_metric(metric)) {
            (_, Some(m)) => m.unit,
            ("power", None) => "W",
            _ => catalog::unit_of(metric),
        }
    }

    /// Flatten into samples so stream data can be fed to the stats engine.
    pub fn to_samples(&self, entity_id: &str) -> Vec<Sample> {
        let ts = self.timestamp.timestamp_millis();
        self.channels()
            .iter()
            .map(|(metric, value)| Sample {
                id: format!("{}-{}-{}", entity_id, metric, ts),
                entity_id: entity_id.to_string(),
                metric: metric.to_string(),
                value: *value,
                unit: Self::unit(metric).to_string(),
                timestamp: self.timestamp,
                meta: None,
            })
            .collect()
    }
}

// =============================================================================
// Controller
// =============================================================================

struct StreamState {
    buffer: RingBuffer<LiveReading>,
    generator: PointGenerator<StdRng>,
}

impl StreamState {
    fn step(&mut self, now: DateTime<Utc>) {
        let next = self.generator.next_live_reading(self.buffer.last(), now);
        self.buffer.push(next);
    }
}

pub struct StreamController {
    state: Arc<Mutex<StreamState>>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    tick: Duration,
}

impl StreamController {
    pub fn new(generator: PointGenerator<StdRng>, capacity: usize, tick: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(StreamState {
                buffer: RingBuffer::new(capacity),
                generator,
            })),
            running: Arc::new(AtomicBool::new(false)),
            task: None,
            tick: tick.max(MIN_TICK),
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(
            PointGenerator::from_config(cfg),
            cfg.buffer_size,
            Duration::from_millis(cfg.tick_ms),
        )
    }

    pub fn tick_period(&self) -> Duration {
        self.tick
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the timer. Must be called inside a tokio runtime. Returns
    /// `false` if the stream was already running.
    pub fn start(&mut self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Ok(mut state) = self.state.lock() {
            if state.buffer.is_empty() {
                let now = Utc::now();
                for _ in 0..PREFILL {
                    state.step(now);
                }
            }
            log_stream_state("started", state.buffer.len(), state.buffer.capacity());
        }

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let period = self.tick;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the prefill covers it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match state.lock() {
                    Ok(mut state) => state.step(Utc::now()),
                    Err(_) => {
                        log(Level::Error, Domain::Stream, "poisoned", obj(&[("msg", v_str("stream state lock poisoned"))]));
                        break;
                    }
                }
            }
        }));
        true
    }

    /// Stop the timer. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let (len, cap) = self.dimensions();
        log_stream_state("stopped", len, cap);
        true
    }

    /// Stop and drop all buffered readings.
    pub fn clear(&mut self) {
        self.stop();
        if let Ok(mut state) = self.state.lock() {
            state.buffer.clear();
        }
    }

    /// One synchronous step, independent of the timer.
    pub fn tick(&self, now: DateTime<Utc>) {
        if let Ok(mut state) = self.state.lock() {
            state.step(now);
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.buffer.set_capacity(capacity);
        }
    }

    pub fn snapshot(&self) -> Vec<LiveReading> {
        self.state
            .lock()
            .map(|state| state.buffer.to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.dimensions().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.dimensions().1
    }

    fn dimensions(&self) -> (usize, usize) {
        self.state
            .lock()
            .map(|state| (state.buffer.len(), state.buffer.capacity()))
            .unwrap_or((0, 0))
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
