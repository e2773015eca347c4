//! Simulated collaborators for running without hardware
//!
//! `SimulatedEmgDevice` plays the part of the armband driver: it owns a
//! thread, calls back into an [`EmgListener`] and only streams after the
//! listener asks it to. `SimulatedForceBoard` and `ScriptedTransport` stand
//! in for the serial link.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::constants::emg::{CHANNEL_COUNT, SIMULATED_AMPLITUDE};
use crate::config::constants::force::DEFAULT_ADC_MAX;
use crate::error::TransportError;
use crate::hal::traits::{DeviceCommandError, EmgListener, EmgStreamControl, LineTransport};
use crate::scheduler::{SampleClock, StopToken};

/// Armband stand-in producing 8-channel bursts
pub struct SimulatedEmgDevice {
    rate_hz: u32,
    amplitude: f32,
    rng: StdRng,
    streaming: bool,
    frame_limit: Option<u64>,
    origin: Instant,
}

impl SimulatedEmgDevice {
    pub fn new(rate_hz: u32, seed: u64) -> Self {
        Self {
            rate_hz: rate_hz.max(1),
            amplitude: SIMULATED_AMPLITUDE,
            rng: StdRng::seed_from_u64(seed),
            streaming: false,
            frame_limit: None,
            origin: Instant::now(),
        }
    }

    /// Disconnect after delivering `frames` frames
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Connect to `listener` and push frames until stopped, the frame limit
    /// is reached, or the listener never enables streaming. Returns the
    /// number of frames delivered.
    pub fn run(&mut self, listener: &dyn EmgListener, stop: &StopToken) -> u64 {
        listener.on_connected(self);
        if !self.streaming {
            info!("simulated EMG device connected but streaming was not enabled");
            listener.on_disconnected();
            return 0;
        }

        let mut clock = SampleClock::from_rate_hz(f64::from(self.rate_hz), Instant::now());
        let mut delivered = 0u64;

        while !stop.is_stopped() && self.frame_limit.map_or(true, |limit| delivered < limit) {
            let timestamp_us = self.origin.elapsed().as_micros() as u64;
            let frame = self.next_frame(timestamp_us);
            listener.on_frame(timestamp_us, &frame);
            delivered += 1;

            let wait = clock.schedule_next(Instant::now());
            if !wait.is_zero() && stop.wait_timeout(wait) {
                break;
            }
        }

        debug!(delivered, "simulated EMG device stopping");
        listener.on_disconnected();
        delivered
    }

    /// Bursty activity: a slow grip envelope modulating noise, rounded to
    /// the integer steps the real device reports
    pub fn next_frame(&mut self, timestamp_us: u64) -> [f32; CHANNEL_COUNT] {
        let t = timestamp_us as f32 / 1_000_000.0;
        let envelope = 0.5 * (1.0 + (TAU * 0.5 * t).sin());

        let mut frame = [0.0f32; CHANNEL_COUNT];
        for (channel, value) in frame.iter_mut().enumerate() {
            let gain = 1.0 - channel as f32 * 0.08;
            let noise: f32 = self.rng.gen_range(-1.0..1.0);
            *value = (self.amplitude * envelope * gain * noise)
                .round()
                .clamp(-128.0, 127.0);
        }
        frame
    }
}

impl EmgStreamControl for SimulatedEmgDevice {
    fn stream_emg(&mut self, enabled: bool) -> Result<(), DeviceCommandError> {
        self.streaming = enabled;
        Ok(())
    }
}

/// FSR board stand-in emitting `a,b,c,d,e` lines at a fixed rate
pub struct SimulatedForceBoard {
    channels: usize,
    rng: StdRng,
    clock: SampleClock,
    origin: Instant,
    lines_sent: u64,
    line_limit: Option<u64>,
    corrupt_every: Option<u64>,
}

impl SimulatedForceBoard {
    pub fn new(channels: usize, rate_hz: u32, seed: u64) -> Self {
        let now = Instant::now();
        Self {
            channels,
            rng: StdRng::seed_from_u64(seed),
            clock: SampleClock::from_rate_hz(f64::from(rate_hz.max(1)), now),
            origin: now,
            lines_sent: 0,
            line_limit: None,
            corrupt_every: None,
        }
    }

    /// Report a disconnect after `lines` lines
    pub fn with_line_limit(mut self, lines: u64) -> Self {
        self.line_limit = Some(lines);
        self
    }

    /// Replace every `n`th line with garbage
    pub fn with_corruption_every(mut self, n: u64) -> Self {
        self.corrupt_every = Some(n.max(1));
        self
    }

    fn next_line(&mut self) -> String {
        if let Some(n) = self.corrupt_every {
            if self.lines_sent % n == n - 1 {
                return "12,x3,,".to_string();
            }
        }

        let t = self.origin.elapsed().as_secs_f64();
        let squeeze = 0.5 * (1.0 + (std::f64::consts::TAU * 0.25 * t).sin());
        let full_scale = f64::from(DEFAULT_ADC_MAX);

        (0..self.channels)
            .map(|channel| {
                let share = 0.6 + 0.1 * channel as f64;
                let jitter: f64 = self.rng.gen_range(-8.0..8.0);
                let raw = (squeeze * share * full_scale + jitter).clamp(0.0, full_scale);
                (raw as u32).to_string()
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl LineTransport for SimulatedForceBoard {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        if self.line_limit.is_some_and(|limit| self.lines_sent >= limit) {
            return Err(TransportError::Disconnected("simulated board unplugged".to_string()));
        }

        let wait = self.clock.schedule_next(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        let line = self.next_line();
        self.lines_sent += 1;
        buf.clear();
        buf.extend_from_slice(line.as_bytes());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("simulated FSR board ({} channels)", self.channels)
    }
}

/// Replays fixed lines, then fails with a final transport error
pub struct ScriptedTransport {
    lines: VecDeque<Vec<u8>>,
    final_error: Option<TransportError>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            lines: lines.into_iter().map(|l| l.as_ref().to_vec()).collect(),
            final_error: None,
            delay: Duration::ZERO,
        }
    }

    /// Error returned once the script runs out (default: disconnect)
    pub fn ending_with(mut self, error: TransportError) -> Self {
        self.final_error = Some(error);
        self
    }

    /// Pause before every line to mimic a slow link
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineTransport for ScriptedTransport {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        match self.lines.pop_front() {
            Some(line) => {
                buf.clear();
                buf.extend_from_slice(&line);
                Ok(())
            }
            None => Err(self
                .final_error
                .take()
                .unwrap_or_else(|| TransportError::Disconnected("script exhausted".to_string()))),
        }
    }

    fn describe(&self) -> String {
        "scripted transport".to_string()
    }
}
