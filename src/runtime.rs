use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::engine::TypingEngine;
use crate::error::{EngineError, Result};
use crate::matcher::KeystrokeResult;
use crate::store::KeyValueStore;

/// Input delivered to the engine, one at a time
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Key { key: String, timestamp: i64 },
    KeyUp { key: String, timestamp: i64 },
    AutoScroll { timestamp: i64 },
    Tick,
}

/// Source of host events (keyboard, timers, scrolling)
pub trait EventSource {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> std::result::Result<EngineEvent, RecvTimeoutError>;
}

/// Queue fed from any number of producer threads through `Sender`s
pub struct ChannelEventSource {
    rx: Receiver<EngineEvent>,
}

impl ChannelEventSource {
    pub fn new() -> (Sender<EngineEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    pub fn from_receiver(rx: Receiver<EngineEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<EngineEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// What the runner stopped on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// the session ended
    Finished,
    /// every producer hung up
    Disconnected,
    /// step budget used up
    Exhausted,
}

/// Serializes events from one source into the engine
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout.
    /// `None` once all senders are gone.
    pub fn step(&self) -> Option<EngineEvent> {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) => Some(EngineEvent::Tick),
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Apply events until the running session ends, the source closes or
    /// `max_steps` events were handled
    pub fn run<K: KeyValueStore>(
        &self,
        engine: &mut TypingEngine<K>,
        max_steps: usize,
    ) -> Result<RunState> {
        for _ in 0..max_steps {
            let Some(event) = self.step() else {
                return Ok(RunState::Disconnected);
            };
            if let Some(result) = apply(engine, event)? {
                if result.completed {
                    return Ok(RunState::Finished);
                }
            }
            if engine.active_session().is_none() {
                return Ok(RunState::Finished);
            }
        }
        Ok(RunState::Exhausted)
    }
}

/// Route one event to the engine. Ticks while idle are dropped.
pub fn apply<K: KeyValueStore>(
    engine: &mut TypingEngine<K>,
    event: EngineEvent,
) -> Result<Option<KeystrokeResult>> {
    match event {
        EngineEvent::Key { key, timestamp } => engine.record_keystroke(&key, timestamp).map(Some),
        EngineEvent::KeyUp { key, timestamp } => {
            engine.record_key_up(&key, timestamp).map(|_| None)
        }
        EngineEvent::AutoScroll { timestamp } => engine.record_autoscroll(timestamp).map(|_| None),
        EngineEvent::Tick => {
            let now = engine.now_ms();
            match engine.tick(now) {
                Ok(()) | Err(EngineError::NoActiveSession) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}
