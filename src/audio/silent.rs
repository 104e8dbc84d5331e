//! Output driver that plays streams in real time without producing sound.
//!
//! Used by the headless binary. Payload length is turned into a duration at
//! an assumed bitrate; the driver thread consumes silence from the deck at
//! the nominal sample rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Result, bail};

use super::{AudioEngine, AudioStream, SharedDeck};
use crate::model::Payload;

const SAMPLE_RATE: u64 = 44_100;
const CHANNELS: u64 = 2;
const ASSUMED_BITRATE: u64 = 128_000;
const TICK: Duration = Duration::from_millis(50);

struct SilentStream {
    /// In frames
    position: u64,
    length: u64,
}

impl SilentStream {
    fn from_payload(payload: &[u8]) -> Self {
        let seconds = payload.len() as f64 * 8.0 / ASSUMED_BITRATE as f64;
        Self {
            position: 0,
            length: (seconds * SAMPLE_RATE as f64) as u64,
        }
    }
}

fn frames_to_duration(frames: u64) -> Duration {
    Duration::from_secs_f64(frames as f64 / SAMPLE_RATE as f64)
}

impl AudioStream for SilentStream {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let wanted = out.len() as u64 / CHANNELS;
        let frames = wanted.min(self.length - self.position);
        self.position += frames;
        let samples = (frames * CHANNELS) as usize;
        out[..samples].fill(0.0);
        samples
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.position)
    }

    fn duration(&self) -> Duration {
        frames_to_duration(self.length)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let frame = (position.as_secs_f64() * SAMPLE_RATE as f64) as u64;
        self.position = frame.min(self.length);
        Ok(())
    }
}

#[derive(Default)]
pub struct SilentEngine {
    running: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SilentEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

fn drive(deck: SharedDeck, running: Arc<AtomicBool>) {
    let frames_per_tick = SAMPLE_RATE * TICK.as_millis() as u64 / 1000;
    let mut buffer = vec![0.0f32; (frames_per_tick * CHANNELS) as usize];

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(TICK);

        let finished = {
            let mut deck = deck.lock().unwrap_or_else(PoisonError::into_inner);
            if deck.is_paused() {
                continue;
            }
            let gain = deck.gain();
            let exhausted = match deck.stream_mut() {
                Some(stream) => {
                    let n = stream.read(&mut buffer);
                    buffer[..n].iter_mut().for_each(|s| *s *= gain);
                    n == 0
                }
                None => false,
            };
            if exhausted { deck.take_completion() } else { None }
        };

        // Fired with the deck unlocked
        if let Some(completion) = finished {
            completion.complete();
        }
    }
}

impl AudioEngine for SilentEngine {
    fn decode(&self, payload: Payload) -> Result<Box<dyn AudioStream>> {
        if payload.is_empty() {
            bail!("empty payload");
        }
        Ok(Box::new(SilentStream::from_payload(&payload)))
    }

    fn attach(&self, deck: SharedDeck) {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.is_some() {
            tracing::warn!("Silent engine already attached");
            return;
        }
        self.running.store(true, Ordering::Relaxed);
        let running = self.running.clone();
        match std::thread::Builder::new()
            .name("silent-output".into())
            .spawn(move || drive(deck, running))
        {
            Ok(handle) => *driver = Some(handle),
            Err(e) => tracing::error!(error = %e, "Cannot start silent output thread"),
        }
    }
}

impl Drop for SilentEngine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.driver.get_mut().ok().and_then(Option::take) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Deck;

    #[test]
    fn test_payload_length_maps_to_duration() {
        // 16 KB at 128 kbit/s is one second
        let stream = SilentStream::from_payload(&[0u8; 16_000]);
        assert_eq!(stream.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_read_stops_at_end() {
        let mut stream = SilentStream::from_payload(&[0u8; 16_000]);
        let mut buf = vec![1.0f32; (SAMPLE_RATE * CHANNELS) as usize];
        assert_eq!(stream.read(&mut buf), buf.len());
        assert!(buf.iter().all(|s| *s == 0.0));
        assert_eq!(stream.read(&mut buf), 0);
        stream.seek(Duration::from_millis(500)).unwrap();
        assert_eq!(stream.position(), Duration::from_millis(500));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let engine = SilentEngine::new();
        assert!(engine.decode(Vec::new().into()).is_err());
    }

    #[tokio::test]
    async fn test_driver_completes_short_stream() {
        let engine = SilentEngine::new();
        let deck = Deck::shared();
        engine.attach(deck.clone());

        let stream = engine.decode(vec![0u8; 800].into()).unwrap();
        let (completion, done) = crate::audio::Completion::new();
        deck.lock().unwrap().install(stream, completion);

        tokio::time::timeout(Duration::from_secs(3), done)
            .await
            .expect("silent driver never finished the stream")
            .unwrap();
    }
}
