use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::config::{OverflowPolicy, StreamConfiguration};
use crate::models::error::WavError;
use crate::models::format::{SampleFormat, WavSpec};
use crate::models::result::StreamResult;
use crate::models::state::StreamState;
use crate::processing::sample_convert::{self, Dither};
use crate::processing::triggers::{frame_magnitude, EndTrigger, StartTrigger};
use crate::storage::stream_file::StreamFileWriter;
use crate::traits::stream_delegate::StreamDelegate;

/// Live counters shared between the producer and the writer thread.
#[derive(Debug)]
struct StreamStatus {
    state: StreamState,
    frames_received: u64,
    frames_written: u64,
    dropped_buffers: u64,
    last_error: Option<WavError>,
}

impl StreamStatus {
    fn new() -> Self {
        Self { state: StreamState::Idle, frames_received: 0, frames_written: 0, dropped_buffers: 0, last_error: None }
    }
}

/// Captures pushed samples to a WAV file on a background thread.
///
/// ```text
/// [producer push] → [pending batch] → bounded channel → [writer thread]
///                                                         ├─ StartTrigger / EndTrigger
///                                                         ├─ sample_convert::encode
///                                                         └─ StreamFileWriter
/// ```
///
/// Samples are interleaved frames in the `f64` working format. The writer
/// thread evaluates triggers in push order, so what lands on disk depends
/// only on the pushed stream. `stop()` closes the channel, joins the thread
/// and returns once the header is patched.
pub struct StreamSession {
    config: StreamConfiguration,
    status: Arc<Mutex<StreamStatus>>,
    delegate: Option<Arc<dyn StreamDelegate>>,
    sender: Option<Sender<Vec<f64>>>,
    pending: Vec<f64>,
    worker: Option<thread::JoinHandle<Result<StreamResult, WavError>>>,
}

impl StreamSession {
    pub fn new(config: StreamConfiguration) -> Self {
        Self {
            config,
            status: Arc::new(Mutex::new(StreamStatus::new())),
            delegate: None,
            sender: None,
            pending: Vec::new(),
            worker: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn StreamDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &StreamConfiguration {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.status.lock().state
    }

    pub fn frames_received(&self) -> u64 {
        self.status.lock().frames_received
    }

    pub fn frames_written(&self) -> u64 {
        self.status.lock().frames_written
    }

    /// Open the file, write the header and start the writer thread.
    /// Transitions: idle → opening → streaming.
    pub fn start(&mut self) -> Result<(), WavError> {
        if !self.state().is_idle() {
            return Err(WavError::ConfigurationFailed("can only start from idle state".into()));
        }
        self.config.validate().map_err(WavError::ConfigurationFailed)?;

        self.set_state(StreamState::Opening);
        let mut file = StreamFileWriter::new(self.config.path.clone(), self.config.spec());
        if let Err(e) = file.open() {
            return Err(self.abort_start(e));
        }

        *self.status.lock() = StreamStatus { state: StreamState::Opening, ..StreamStatus::new() };

        let (tx, rx) = crossbeam_channel::bounded::<Vec<f64>>(self.config.queue_capacity);
        let worker = StreamWorker {
            spec: self.config.spec(),
            file,
            start: StartTrigger::new(self.config.start, self.config.sample_rate, self.config.silence_epsilon),
            end: EndTrigger::new(self.config.end, self.config.sample_rate, self.config.silence_epsilon),
            dither: (self.config.dither && self.config.format == SampleFormat::Pcm).then(Dither::new),
            status: Arc::clone(&self.status),
            delegate: self.delegate.clone(),
            next_index: 0,
            capped: false,
            ended_by_trigger: false,
        };

        let handle = match thread::Builder::new().name("riffcap-stream".into()).spawn(move || worker.run(rx)) {
            Ok(handle) => handle,
            // The failed spawn dropped the worker and its open file.
            Err(e) => return Err(self.abort_start(WavError::StorageError(format!("failed to spawn writer thread: {}", e)))),
        };

        self.sender = Some(tx);
        self.worker = Some(handle);
        self.pending.clear();
        self.set_state(StreamState::Streaming);
        log::info!("stream capture started: {}", self.config.path.display());
        Ok(())
    }

    /// Queue interleaved frames for the writer thread.
    ///
    /// A no-op unless the session is streaming. Frames are batched into
    /// `buffer_frames`-sized buffers before they are queued.
    ///
    /// Under `OverflowPolicy::Reject` a batch that does not fit stays
    /// pending, ahead of anything pushed later, and `QueueFull` is returned.
    /// Pushing again (an empty slice is enough) retries it.
    pub fn push(&mut self, samples: &[f64]) -> Result<(), WavError> {
        if !self.state().is_streaming() || self.sender.is_none() {
            return Ok(());
        }
        self.pending.extend_from_slice(samples);

        let batch_len = self.config.buffer_frames * self.config.channels as usize;
        while self.pending.len() >= batch_len {
            let rest = self.pending.split_off(batch_len);
            let batch = std::mem::replace(&mut self.pending, rest);
            if let Some(mut rejected) = self.send(batch) {
                rejected.append(&mut self.pending);
                self.pending = rejected;
                return Err(WavError::QueueFull);
            }
        }
        Ok(())
    }

    /// Hand a batch to the writer. Returns the batch if the queue is full and
    /// the policy is `Reject`.
    fn send(&mut self, batch: Vec<f64>) -> Option<Vec<f64>> {
        let tx = self.sender.as_ref()?;
        match tx.try_send(batch) {
            Ok(()) => None,
            Err(TrySendError::Full(batch)) => match self.config.overflow {
                OverflowPolicy::Reject => Some(batch),
                OverflowPolicy::DropNewest => {
                    let dropped = {
                        let mut s = self.status.lock();
                        s.dropped_buffers += 1;
                        s.dropped_buffers
                    };
                    log::warn!("stream queue full, dropped buffer ({} so far)", dropped);
                    None
                }
            },
            // The writer already finished.
            Err(TrySendError::Disconnected(_)) => None,
        }
    }

    /// Flush, close the channel, join the writer and finalize the file.
    ///
    /// Returns `Ok(None)` if nothing was running. A write failure recorded by
    /// the writer thread is returned here.
    pub fn stop(&mut self) -> Result<Option<StreamResult>, WavError> {
        let Some(tx) = self.sender.take() else {
            return Ok(None);
        };

        let channels = self.config.channels as usize;
        let whole = self.pending.len() - self.pending.len() % channels;
        let tail: Vec<f64> = self.pending.drain(..).take(whole).collect();
        if !tail.is_empty() && tx.send(tail).is_err() {
            log::debug!("writer finished before the final flush");
        }
        drop(tx);

        if self.state().is_streaming() {
            self.set_state(StreamState::Closing);
        }

        let outcome = match self.worker.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(WavError::StorageError("stream writer thread panicked".into()))),
            None => Err(WavError::StorageError("stream writer thread missing".into())),
        };

        let last_error = self.status.lock().last_error.take();
        self.set_state(StreamState::Idle);

        if let Some(e) = last_error {
            return Err(e);
        }
        let result = outcome?;
        log::info!(
            "stream capture stopped: {} frames written of {} received",
            result.frames_written,
            result.frames_received
        );
        Ok(Some(result))
    }

    /// Back out of a failed `start`.
    fn abort_start(&self, error: WavError) -> WavError {
        log::error!("stream capture failed to start: {}", error);
        self.set_state(StreamState::Idle);
        error
    }

    fn set_state(&self, new_state: StreamState) {
        self.status.lock().state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("failed to finalize stream on drop: {}", e);
        }
    }
}

/// State owned by the writer thread.
struct StreamWorker {
    spec: WavSpec,
    file: StreamFileWriter,
    start: StartTrigger,
    end: EndTrigger,
    dither: Option<Dither>,
    status: Arc<Mutex<StreamStatus>>,
    delegate: Option<Arc<dyn StreamDelegate>>,
    next_index: u64,
    capped: bool,
    ended_by_trigger: bool,
}

impl StreamWorker {
    fn ended(&self) -> bool {
        self.end.has_fired() || self.capped
    }

    fn run(mut self, rx: Receiver<Vec<f64>>) -> Result<StreamResult, WavError> {
        let mut failed = false;
        for batch in rx.iter() {
            if self.ended() || failed {
                continue;
            }
            if let Err(e) = self.process(&batch) {
                log::error!("stream write failed: {}", e);
                if let Some(ref d) = self.delegate {
                    d.on_error(&e);
                }
                self.status.lock().last_error = Some(e);
                failed = true;
            }
            if self.ended() && self.file.is_open() {
                self.ended_by_trigger = self.end.has_fired();
                let result = self.finish()?;
                self.set_state(StreamState::Finished);
                return self.drain(rx, result);
            }
        }
        self.finish()
    }

    /// Keep the channel empty after the file closed so producers never see a
    /// full queue.
    fn drain(&self, rx: Receiver<Vec<f64>>, result: StreamResult) -> Result<StreamResult, WavError> {
        for batch in rx.iter() {
            self.status.lock().frames_received += (batch.len() / self.spec.channels as usize) as u64;
        }
        Ok(result)
    }

    fn process(&mut self, batch: &[f64]) -> Result<(), WavError> {
        let channels = self.spec.channels as usize;
        let frame_bytes = self.spec.block_align() as u64;
        let mut encoded = Vec::with_capacity(batch.len() * self.spec.bytes_per_sample());
        let mut received = 0u64;
        let mut written = 0u64;

        for frame in batch.chunks_exact(channels) {
            let index = self.next_index;
            self.next_index += 1;
            received += 1;

            if self.ended() {
                continue;
            }
            let magnitude = frame_magnitude(frame);
            if !self.start.observe(index, magnitude) {
                continue;
            }
            if self.end.before_write(index) {
                continue;
            }
            if (encoded.len() as u64 + frame_bytes) > self.file.remaining_capacity() {
                log::warn!("stream reached the RIFF size limit, ending capture");
                self.capped = true;
                continue;
            }
            for &sample in frame {
                sample_convert::encode_sample(
                    sample,
                    self.spec.format,
                    self.spec.bits_per_sample,
                    self.dither.as_mut(),
                    &mut encoded,
                );
            }
            written += 1;
            self.end.after_write(magnitude);
        }

        let result = self.file.write(&encoded);
        let mut s = self.status.lock();
        s.frames_received += received;
        if result.is_ok() {
            s.frames_written += written;
        }
        result
    }

    fn finish(&mut self) -> Result<StreamResult, WavError> {
        let checksum = if self.file.is_open() { self.file.close()? } else { String::new() };
        let (frames_received, frames_written, dropped_buffers) = {
            let s = self.status.lock();
            (s.frames_received, s.frames_written, s.dropped_buffers)
        };
        let result = StreamResult {
            file_path: self.file.file_path().to_path_buf(),
            frames_received,
            frames_written,
            dropped_buffers,
            duration_secs: frames_written as f64 / self.spec.sample_rate as f64,
            ended_by_trigger: self.ended_by_trigger,
            checksum,
        };
        if let Some(ref d) = self.delegate {
            d.on_capture_finished(&result);
        }
        Ok(result)
    }

    fn set_state(&self, state: StreamState) {
        self.status.lock().state = state;
        if let Some(ref d) = self.delegate {
            d.on_state_changed(state);
        }
    }
}
