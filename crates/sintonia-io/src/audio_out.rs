//! Audio output: a bounded frame FIFO drained by the device callback.
//!
//! The synthesis loop pushes finished frames with [`AudioOutput::write`];
//! with the FIFO at capacity the push blocks, which is the backpressure
//! that paces the loop to real time. The cpal callback on the driver
//! thread pops frames and converts the `f64` samples to the device's
//! interleaved `f32` buffer; when no frame is ready it emits silence and
//! logs one underrun per incident.
//!
//! The stream is requested at exactly the configured sample rate and frame
//! size; a device that cannot honor them fails the open, it is not papered
//! over.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, bounded};
use sintonia_core::audio::{Frame, silence};
use sintonia_core::config::{FRAME_SIZE, SAMPLE_RATE};

use crate::{Error, Result};

/// Frames the FIFO holds before `write` blocks.
const FIFO_FRAMES: usize = 2;

/// Pulls frames out of the FIFO into interleaved device buffers.
///
/// Owned by the device callback; separated out so the fill logic is
/// testable without a device.
struct FrameCursor {
    rx: Receiver<Frame>,
    pending: Frame,
    /// Next sample index within `pending`; `FRAME_SIZE` means exhausted.
    position: usize,
    /// True while inside an underrun incident, to log it once.
    underrun: bool,
}

impl FrameCursor {
    fn new(rx: Receiver<Frame>) -> Self {
        Self { rx, pending: silence(), position: FRAME_SIZE, underrun: false }
    }

    /// Fill an interleaved stereo `f32` buffer from queued frames.
    fn fill(&mut self, data: &mut [f32]) {
        for slot in data.chunks_mut(2) {
            if self.position == FRAME_SIZE {
                match self.rx.try_recv() {
                    Ok(frame) => {
                        self.pending = frame;
                        self.position = 0;
                        self.underrun = false;
                    }
                    Err(_) => {
                        if !self.underrun {
                            tracing::warn!("audio output underrun, emitting silence");
                            self.underrun = true;
                        }
                        slot.fill(0.0);
                        continue;
                    }
                }
            }
            let sample = self.pending[self.position];
            self.position += 1;
            slot[0] = sample.left as f32;
            if let Some(right) = slot.get_mut(1) {
                *right = sample.right as f32;
            }
        }
    }
}

/// The audio output adapter.
pub struct AudioOutput {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    stream: Option<cpal::Stream>,
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput {
    /// An output with the FIFO allocated and no device attached.
    pub fn new() -> Self {
        let (tx, rx) = bounded(FIFO_FRAMES);
        Self { tx, rx, stream: None }
    }

    /// Open the output device and start streaming.
    ///
    /// `device_name` selects by case-insensitive substring, the default
    /// output device otherwise.
    pub fn open(&mut self, device_name: Option<&str>) -> Result<()> {
        let host = cpal::default_host();
        let device = find_output_device(&host, device_name)?;
        tracing::info!(
            host = host.id().name(),
            device = device.name().unwrap_or_else(|_| "unknown".into()),
            "opening audio output"
        );

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(SAMPLE_RATE as u32),
            buffer_size: cpal::BufferSize::Fixed(FRAME_SIZE as u32),
        };

        let mut cursor = FrameCursor::new(self.rx.clone());
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| cursor.fill(data),
                |error| tracing::error!(%error, "audio stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            sample_rate = SAMPLE_RATE,
            frame_size = FRAME_SIZE,
            fifo_frames = FIFO_FRAMES,
            "output stream started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Queue one finished frame, blocking while the FIFO is full.
    ///
    /// Fails only when the consumer side is gone (stream dropped).
    pub fn write(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).map_err(|_| Error::OutputClosed)
    }

    /// A receiver draining the same FIFO, for consumers that are not a
    /// real device (tests, offline rendering).
    pub fn drain_handle(&self) -> Receiver<Frame> {
        self.rx.clone()
    }
}

/// Find an output device by name substring, or the default one.
fn find_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        Some(search) => {
            let search = search.to_lowercase();
            let devices = host.output_devices().map_err(|e| Error::Stream(e.to_string()))?;
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name.to_lowercase().contains(&search) {
                        return Ok(device);
                    }
                }
            }
            Err(Error::DeviceNotFound(search))
        }
        None => host.default_output_device().ok_or(Error::NoDevice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sintonia_core::audio::Stereo;

    fn ramp_frame(base: f64) -> Frame {
        let mut frame = silence();
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample = Stereo { left: base + i as f64, right: -(base + i as f64) };
        }
        frame
    }

    #[test]
    fn cursor_interleaves_frames() {
        let (tx, rx) = bounded(FIFO_FRAMES);
        let mut cursor = FrameCursor::new(rx);
        tx.send(ramp_frame(0.0)).unwrap();

        let mut data = vec![1.0_f32; FRAME_SIZE * 2];
        cursor.fill(&mut data);
        assert_eq!(data[0], 0.0);
        assert_eq!(data[1], -0.0);
        assert_eq!(data[2], 1.0);
        assert_eq!(data[3], -1.0);
        assert_eq!(data[510], 255.0);
        assert_eq!(data[511], -255.0);
    }

    #[test]
    fn cursor_emits_silence_on_underrun() {
        let (_tx, rx) = bounded::<Frame>(FIFO_FRAMES);
        let mut cursor = FrameCursor::new(rx);
        let mut data = vec![0.5_f32; 64];
        cursor.fill(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
        assert!(cursor.underrun);
    }

    #[test]
    fn cursor_recovers_after_underrun() {
        let (tx, rx) = bounded(FIFO_FRAMES);
        let mut cursor = FrameCursor::new(rx);

        let mut data = vec![0.0_f32; 8];
        cursor.fill(&mut data);
        assert!(cursor.underrun);

        tx.send(ramp_frame(10.0)).unwrap();
        cursor.fill(&mut data);
        assert!(!cursor.underrun);
        assert_eq!(data[0], 10.0);
    }

    #[test]
    fn cursor_spans_device_buffers_smaller_than_a_frame() {
        let (tx, rx) = bounded(FIFO_FRAMES);
        let mut cursor = FrameCursor::new(rx);
        tx.send(ramp_frame(0.0)).unwrap();

        // Two half-frame device pulls consume one queued frame
        let mut first = vec![0.0_f32; FRAME_SIZE];
        cursor.fill(&mut first);
        let mut second = vec![0.0_f32; FRAME_SIZE];
        cursor.fill(&mut second);
        assert_eq!(first[0], 0.0);
        assert_eq!(second[0], (FRAME_SIZE / 2) as f32);
    }

    #[test]
    fn write_blocks_only_at_capacity() {
        let out = AudioOutput::new();
        // Capacity writes succeed immediately with nobody draining
        out.write(silence()).unwrap();
        out.write(silence()).unwrap();
        // Drain one, the next write fits again
        let rx = out.drain_handle();
        rx.try_recv().unwrap();
        out.write(silence()).unwrap();
    }
}
