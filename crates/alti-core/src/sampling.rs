//! Fixed-interval sampling loop
//!
//! A [`Sampler`] owns a sensor and drives one read-decode cycle per tick,
//! handing every outcome to a [`SampleConsumer`]. Lifecycle is controlled
//! through a [`SamplerControl`], which may live in a `static` and be shared
//! with whichever task decides when sampling ends.
//!
//! ```text
//!   Idle --run()--> Running --stop()--> Stopped
//! ```
//!
//! Guarantees:
//! - the first cycle runs immediately, then one per interval
//! - cycles never overlap; a cycle that overruns the interval defers the
//!   next tick until it completes instead of bursting to catch up
//! - a failed cycle is reported and the loop carries on
//! - once `stop()` returns, the consumer is not called again, provided
//!   `stop()` is called from the executor thread that runs the sampler
//!
//! The last guarantee rests on the stop check and the consumer call running
//! without an await between them. A `stop()` from another thread can land
//! in that gap, so one result may still be delivered after it returns.

use core::cell::Cell;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use log::{debug, error, info, warn};

use crate::config::SamplerConfig;
use crate::error::TransportError;
use crate::sensors::Sensor;
use crate::sensors::mpl3115a2::Reading;

/// Outcome of one sampling cycle.
pub type SampleResult = Result<Reading, TransportError>;

/// Receiver of sampling outcomes.
///
/// Called once per tick, never concurrently with itself. Any plain closure
/// taking a [`SampleResult`] is a consumer.
pub trait SampleConsumer {
    fn on_sample(&mut self, result: SampleResult) -> impl Future<Output = ()>;
}

impl<F> SampleConsumer for F
where
    F: FnMut(SampleResult),
{
    async fn on_sample(&mut self, result: SampleResult) {
        (*self)(result)
    }
}

/// Consumer that forwards every outcome into an embassy channel.
///
/// Waits for space when the channel is full, which delays the next tick
/// rather than dropping results.
pub struct ChannelConsumer<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, SampleResult, N>,
}

impl<'a, M: RawMutex, const N: usize> ChannelConsumer<'a, M, N> {
    pub const fn new(sender: Sender<'a, M, SampleResult, N>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex, const N: usize> SampleConsumer for ChannelConsumer<'_, M, N> {
    async fn on_sample(&mut self, result: SampleResult) {
        self.sender.send(result).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
}

/// Shared lifecycle handle for a [`Sampler`].
///
/// `Stopped` is terminal: a control that has been stopped, even before it
/// ever ran, will not start again.
pub struct SamplerControl<M: RawMutex> {
    state: BlockingMutex<M, Cell<SamplerState>>,
    stop: Signal<M, ()>,
}

impl<M: RawMutex> SamplerControl<M> {
    pub const fn new() -> Self {
        Self {
            state: BlockingMutex::new(Cell::new(SamplerState::Idle)),
            stop: Signal::new(),
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state.lock(|state| state.get())
    }

    /// Stop sampling. Idempotent.
    ///
    /// Takes effect before the next tick. A bus transaction already in
    /// flight is allowed to finish but its result is discarded. Call it from
    /// the sampler's executor thread for the no-delivery-after-stop
    /// guarantee to hold; see the module docs.
    pub fn stop(&self) {
        let previous = self.state.lock(|state| state.replace(SamplerState::Stopped));
        match previous {
            SamplerState::Running => {
                info!("Sampler stop requested");
                self.stop.signal(());
            }
            SamplerState::Idle => info!("Sampler stopped before it started"),
            SamplerState::Stopped => {}
        }
    }

    fn is_stopped(&self) -> bool {
        self.state() == SamplerState::Stopped
    }

    /// `Idle -> Running`; returns the state that blocked the transition otherwise.
    fn begin(&self) -> Result<(), SamplerState> {
        self.state.lock(|state| match state.get() {
            SamplerState::Idle => {
                state.set(SamplerState::Running);
                Ok(())
            }
            other => Err(other),
        })
    }
}

impl<M: RawMutex> Default for SamplerControl<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic read-decode loop over a single sensor.
pub struct Sampler<'a, M: RawMutex, S> {
    sensor: S,
    config: SamplerConfig,
    control: &'a SamplerControl<M>,
}

impl<'a, M, S> Sampler<'a, M, S>
where
    M: RawMutex,
    S: Sensor<Readings = Reading>,
{
    pub fn new(sensor: S, config: SamplerConfig, control: &'a SamplerControl<M>) -> Self {
        Self {
            sensor,
            config,
            control,
        }
    }

    /// Run until [`SamplerControl::stop`] is called, then hand the sensor
    /// back so its bus can be released.
    ///
    /// Returns immediately if the control is not `Idle`.
    pub async fn run<C: SampleConsumer>(mut self, consumer: &mut C) -> S {
        if let Err(state) = self.control.begin() {
            warn!("Sampler cannot start from {:?}", state);
            return self.sensor;
        }

        let interval = self.config.interval();
        info!("Sampler running every {} ms", interval.as_millis());

        let mut next_tick = Instant::now();
        loop {
            if self.control.is_stopped() {
                break;
            }

            let result = self.read_cycle().await;

            // stop() may have landed while the bus was busy. Nothing may be
            // awaited between this check and the delivery below.
            if self.control.is_stopped() {
                debug!("Discarding cycle that finished after stop");
                break;
            }

            consumer.on_sample(result).await;

            next_tick += interval;
            let now = Instant::now();
            if next_tick < now {
                debug!(
                    "Cycle overran interval by {} ms",
                    (now - next_tick).as_millis()
                );
                next_tick = now;
            }

            let tick = Timer::at(next_tick);
            if let Either::Second(()) = select(tick, self.control.stop.wait()).await {
                break;
            }
        }

        info!("Sampler stopped");
        self.sensor
    }

    /// One tick: read with up to `read_retries` extra attempts.
    async fn read_cycle(&mut self) -> SampleResult {
        let retries = self.config.read_retries;
        let mut attempt = 0;
        loop {
            match self.sensor.read().await {
                Ok(reading) => {
                    debug!(
                        "Sample: {:.3} kPa, {:.2} m, {:.2} °C",
                        reading.sample.pressure_kpa,
                        reading.sample.altitude_m,
                        reading.sample.temperature_c
                    );
                    return Ok(reading);
                }
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!("Sensor read failed ({}), retry {}/{}", e, attempt, retries);
                }
                Err(e) => {
                    error!("Sensor read failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::sensors::mpl3115a2::Mpl3115a2;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;
    use embassy_time::Duration;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

    const FRAME: [u8; 6] = [0x0E, 0x30, 0x00, 0x00, 0x19, 0x00];
    const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);

    /// Bus that replays scripted read outcomes, optionally slowly, and
    /// records when each transaction started and finished.
    struct FakeBus<'a> {
        script: Vec<Result<[u8; 6], ErrorKind>>,
        next: usize,
        delay: Duration,
        spans: &'a RefCell<Vec<(Instant, Instant)>>,
        in_flight: bool,
    }

    impl<'a> FakeBus<'a> {
        fn new(
            script: Vec<Result<[u8; 6], ErrorKind>>,
            spans: &'a RefCell<Vec<(Instant, Instant)>>,
        ) -> Self {
            Self {
                script,
                next: 0,
                delay: Duration::from_ticks(0),
                spans,
                in_flight: false,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Outcomes past the end of the script repeat the last entry.
        fn next_outcome(&mut self) -> Result<[u8; 6], ErrorKind> {
            let index = self.next.min(self.script.len() - 1);
            self.next += 1;
            self.script[index]
        }
    }

    impl ErrorType for FakeBus<'_> {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus<'_> {
        async fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert!(!self.in_flight, "overlapping bus transactions");
            self.in_flight = true;
            let start = Instant::now();

            if self.delay.as_ticks() > 0 {
                Timer::after(self.delay).await;
            }

            let mut outcome = Ok(());
            for op in operations.iter_mut() {
                if let Operation::Read(buf) = op {
                    match self.next_outcome() {
                        Ok(frame) => buf.copy_from_slice(&frame[..buf.len()]),
                        Err(kind) => outcome = Err(kind),
                    }
                }
            }

            self.spans.borrow_mut().push((start, Instant::now()));
            self.in_flight = false;
            outcome
        }
    }

    fn sensor(bus: FakeBus<'_>) -> Mpl3115a2<FakeBus<'_>> {
        Mpl3115a2::new(bus, &ConnectionConfig::default())
    }

    fn config(interval_ms: u64) -> SamplerConfig {
        SamplerConfig {
            interval_ms,
            read_retries: 0,
        }
    }

    #[test]
    fn test_first_cycle_is_immediate() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans);
        let sampler = Sampler::new(sensor(bus), config(1000), &control);

        let mut consumer = |r: SampleResult| results.borrow_mut().push(r);
        block_on(join(sampler.run(&mut consumer), async {
            Timer::after_millis(20).await;
            control.stop();
        }));

        let results = results.borrow();
        assert_eq!(results.len(), 1);
        let reading = results[0].as_ref().unwrap();
        assert_eq!(reading.sample.pressure_kpa, 49.152);
        assert_eq!(control.state(), SamplerState::Stopped);
    }

    #[test]
    fn test_error_cycle_is_reported_and_loop_continues() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let script = [Ok(FRAME), Err(NACK), Ok(FRAME)].into();
        let sampler = Sampler::new(sensor(FakeBus::new(script, &spans)), config(20), &control);

        let mut consumer = |r: SampleResult| {
            let mut results = results.borrow_mut();
            results.push((Instant::now(), r));
            if results.len() == 3 {
                control.stop();
            }
        };
        block_on(sampler.run(&mut consumer));

        let results = results.borrow();
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1, Err(TransportError::Bus(NACK)));
        assert!(results[2].1.is_ok());

        // The failed cycle did not delay or skip the following tick
        let gap = results[2].0 - results[1].0;
        assert!(gap >= Duration::from_millis(15), "gap {} ms", gap.as_millis());
        assert!(gap < Duration::from_millis(200), "gap {} ms", gap.as_millis());
    }

    #[test]
    fn test_no_delivery_after_stop() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let delivered_at_stop = Cell::new(0);
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans);
        let sampler = Sampler::new(sensor(bus), config(10), &control);

        let mut consumer = |r: SampleResult| results.borrow_mut().push(r);
        block_on(join(sampler.run(&mut consumer), async {
            Timer::after_millis(55).await;
            control.stop();
            delivered_at_stop.set(results.borrow().len());
        }));

        assert!(delivered_at_stop.get() >= 1);
        assert_eq!(results.borrow().len(), delivered_at_stop.get());
    }

    #[test]
    fn test_in_flight_cycle_completes_but_is_not_delivered() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans).with_delay(Duration::from_millis(60));
        let sampler = Sampler::new(sensor(bus), config(10), &control);

        let mut consumer = |r: SampleResult| results.borrow_mut().push(r);
        block_on(join(sampler.run(&mut consumer), async {
            Timer::after_millis(10).await;
            control.stop();
        }));

        assert_eq!(spans.borrow().len(), 1, "transaction must run to completion");
        assert!(results.borrow().is_empty());
    }

    #[test]
    fn test_slow_transport_defers_ticks_without_overlap() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let calls = RefCell::new(Vec::new());
        let in_consumer = Cell::new(false);
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans).with_delay(Duration::from_millis(30));
        let sampler = Sampler::new(sensor(bus), config(10), &control);

        let mut consumer = |_r: SampleResult| {
            assert!(!in_consumer.replace(true), "overlapping consumer calls");
            let mut calls = calls.borrow_mut();
            calls.push(Instant::now());
            if calls.len() == 4 {
                control.stop();
            }
            in_consumer.set(false);
        };
        block_on(sampler.run(&mut consumer));

        let spans = spans.borrow();
        assert_eq!(spans.len(), 4);
        for pair in spans.windows(2) {
            let (_, previous_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start >= previous_end, "transactions overlapped");
        }

        // Each delivery waits for the slow read, never bursting to catch up
        for pair in calls.borrow().windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(25));
        }
    }

    #[test]
    fn test_read_retry_recovers_within_tick() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let script = [Err(ErrorKind::Bus), Ok(FRAME)].into();
        let sampler = Sampler::new(
            sensor(FakeBus::new(script, &spans)),
            SamplerConfig {
                interval_ms: 1000,
                read_retries: 1,
            },
            &control,
        );

        let mut consumer = |r: SampleResult| {
            results.borrow_mut().push(r);
            control.stop();
        };
        block_on(sampler.run(&mut consumer));

        assert_eq!(spans.borrow().len(), 2);
        let results = results.borrow();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn test_retries_exhausted_reports_last_error() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let results = RefCell::new(Vec::new());
        let script = [Err(ErrorKind::Bus), Err(ErrorKind::Overrun)].into();
        let sampler = Sampler::new(
            sensor(FakeBus::new(script, &spans)),
            SamplerConfig {
                interval_ms: 1000,
                read_retries: 1,
            },
            &control,
        );

        let mut consumer = |r: SampleResult| {
            results.borrow_mut().push(r);
            control.stop();
        };
        block_on(sampler.run(&mut consumer));

        let results = results.borrow();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], Err(TransportError::Bus(ErrorKind::Overrun)));
    }

    #[test]
    fn test_slow_read_times_out() {
        let spans = RefCell::new(Vec::new());
        let bus =
            FakeBus::new([Ok(FRAME)].into(), &spans).with_delay(Duration::from_millis(200));
        let mut sensor = Mpl3115a2::new(
            bus,
            &ConnectionConfig {
                timeout_ms: 20,
                ..ConnectionConfig::default()
            },
        );

        let result = block_on(sensor.read_snapshot());
        assert_eq!(result, Err(TransportError::Timeout));
    }

    #[test]
    fn test_run_after_stop_returns_immediately() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        control.stop();
        control.stop();
        assert_eq!(control.state(), SamplerState::Stopped);

        let calls = Cell::new(0);
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans);
        let sampler = Sampler::new(sensor(bus), config(10), &control);
        let mut consumer = |_r: SampleResult| calls.set(calls.get() + 1);
        block_on(sampler.run(&mut consumer));

        assert_eq!(calls.get(), 0);
        assert!(spans.borrow().is_empty());
    }

    #[test]
    fn test_channel_consumer_receives_results() {
        let spans = RefCell::new(Vec::new());
        let control = SamplerControl::<CriticalSectionRawMutex>::new();
        let channel = Channel::<CriticalSectionRawMutex, SampleResult, 8>::new();
        let bus = FakeBus::new([Ok(FRAME)].into(), &spans);
        let sampler = Sampler::new(sensor(bus), config(10), &control);

        let mut consumer = ChannelConsumer::new(channel.sender());
        block_on(join(sampler.run(&mut consumer), async {
            Timer::after_millis(25).await;
            control.stop();
        }));

        let mut received = 0;
        while let Ok(result) = channel.try_receive() {
            assert_eq!(result.unwrap().sample.temperature_c, 25.0);
            received += 1;
        }
        assert!((1..=4).contains(&received), "received {}", received);
    }
}
