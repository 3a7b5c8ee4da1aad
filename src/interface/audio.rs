// 音訊輸出 - 模擬執行緒產生 PCM，音訊回呼從佇列取出
//
// 佇列滿時丟棄新取樣，佇列空時輸出靜音

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};

/// Stereo frames buffered between the emulation thread and the device.
pub const QUEUE_CAPACITY: usize = 8192;

const I16_SCALE: f32 = 32768.0;

/// Emulation-side end of the queue.
#[derive(Debug, Clone)]
pub struct SampleProducer {
    sender: Sender<[f32; 2]>,
}

/// Device-side end of the queue.
#[derive(Debug, Clone)]
pub struct SampleConsumer {
    receiver: Receiver<[f32; 2]>,
}

#[derive(Debug)]
pub struct SampleQueue;

impl SampleQueue {
    pub fn new() -> (SampleProducer, SampleConsumer) {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(frames: usize) -> (SampleProducer, SampleConsumer) {
        let (sender, receiver) = bounded(frames.max(1));
        (SampleProducer { sender }, SampleConsumer { receiver })
    }
}

impl SampleProducer {
    /// Queues one block of APU output as stereo frames. Frames that do not
    /// fit are dropped; returns how many were queued.
    pub fn push_block(&self, left: &[i16], right: &[i16]) -> usize {
        let mut queued = 0;
        for (&l, &r) in left.iter().zip(right) {
            let frame = [l as f32 / I16_SCALE, r as f32 / I16_SCALE];
            match self.sender.try_send(frame) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Disconnected(_)) => {
                    log::warn!("Audio queue closed, dropping samples");
                    break;
                }
            }
        }
        let dropped = left.len().min(right.len()) - queued;
        if dropped > 0 {
            log::trace!("Audio queue full, dropped {} frames", dropped);
        }
        queued
    }

    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

impl SampleConsumer {
    /// Fills an interleaved L/R buffer. Missing frames become silence;
    /// returns the number of frames that came from the queue.
    pub fn fill(&self, out: &mut [f32]) -> usize {
        let mut filled = 0;
        for frame in out.chunks_mut(2) {
            let samples = match self.receiver.try_recv() {
                Ok(samples) => {
                    filled += 1;
                    samples
                }
                Err(_) => [0.0; 2],
            };
            for (slot, sample) in frame.iter_mut().zip(samples) {
                *slot = sample;
            }
        }
        filled
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(feature = "sdl")]
pub use sdl_output::AudioInterface;

#[cfg(feature = "sdl")]
mod sdl_output {
    use super::SampleConsumer;
    use crate::error::{Error, Result};
    use sdl3::audio::{AudioCallback, AudioFormat, AudioSpec, AudioStream, AudioStreamWithCallback};
    use std::fmt;

    #[derive(Debug)]
    struct GbAudio {
        consumer: SampleConsumer,
        buffer: Vec<f32>,
    }

    impl AudioCallback<f32> for GbAudio {
        fn callback(&mut self, stream: &mut AudioStream, requested: i32) {
            self.buffer.clear();
            self.buffer.resize(requested.max(0) as usize, 0.0);
            self.consumer.fill(&mut self.buffer);
            let _ = stream.put_data_f32(&self.buffer);
        }
    }

    /// SDL3 stereo playback stream fed from a [`SampleConsumer`].
    pub struct AudioInterface {
        device: AudioStreamWithCallback<GbAudio>,
        sample_rate: u32,
    }

    impl fmt::Debug for AudioInterface {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AudioInterface")
                .field("sample_rate", &self.sample_rate)
                .finish_non_exhaustive()
        }
    }

    impl AudioInterface {
        pub fn new(sdl: &sdl3::Sdl, sample_rate: u32, consumer: SampleConsumer) -> Result<Self> {
            let audio_subsystem = sdl
                .audio()
                .map_err(|e| Error::Audio(format!("SDL audio error: {:?}", e)))?;
            let spec = AudioSpec {
                freq: Some(sample_rate as i32),
                channels: Some(2),
                format: Some(AudioFormat::f32_sys()),
            };
            let callback = GbAudio {
                consumer,
                buffer: Vec::with_capacity(4096),
            };
            let device = audio_subsystem
                .open_playback_stream(&spec, callback)
                .map_err(|e| Error::Audio(format!("Audio stream error: {:?}", e)))?;
            log::info!("SDL playback stream opened at {} Hz", sample_rate);
            Ok(Self {
                device,
                sample_rate,
            })
        }

        pub fn start(&self) -> Result<()> {
            self.device
                .resume()
                .map_err(|e| Error::Audio(format!("SDL resume error: {:?}", e)))
        }

        pub fn stop(&self) -> Result<()> {
            self.device
                .pause()
                .map_err(|e| Error::Audio(format!("SDL pause error: {:?}", e)))
        }
    }
}
