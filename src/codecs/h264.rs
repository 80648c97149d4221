use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::codecs::gate::{KeyframeGate, Publish};
use crate::codecs::video::{CodedUnit, PlanarImage, VideoBackend, VideoParams};
use crate::codecs::{Codec, CodecStats, FrameInfo, ResetFlags, StreamHeaders};
use crate::core::lock::lock_mutex;
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::status::{LifecycleState, Status, TS_EXIT, TS_REQUEST_IDR};
use crate::core::sync::Signal;
use crate::core::timestamp::tick_count;
use crate::ring::{OutputLock, RecordChannel};

pub const YUV_BUF_NUM: usize = 3;

// Idle poll interval of the worker while the encoder is not started.
const IDLE_POLL_MS: u64 = 100;

/// Fixed-depth queue of pre-allocated I420 slots. Counts slots, not bytes.
struct InputQueue {
    slots: Vec<Box<[u8]>>,
    head: usize,
    tail: usize,
    size: usize,
}

impl InputQueue {
    fn new(depth: usize, slot_bytes: usize) -> Self {
        Self {
            slots: (0..depth).map(|_| vec![0u8; slot_bytes].into_boxed_slice()).collect(),
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.size >= self.slots.len()
    }

    fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Copies `frame` into the tail slot. Returns false (and keeps every
    /// queued frame) when the queue is full.
    fn push(&mut self, frame: &[u8]) -> bool {
        if self.is_full() {
            return false;
        }
        let slot = &mut self.slots[self.tail];
        let n = frame.len().min(slot.len());
        slot[..n].copy_from_slice(&frame[..n]);
        self.tail = (self.tail + 1) % self.slots.len();
        self.size += 1;
        true
    }

    fn front(&self) -> &[u8] {
        &self.slots[self.head]
    }

    fn advance(&mut self) {
        self.head = (self.head + 1) % self.slots.len();
        self.size -= 1;
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.size = 0;
    }
}

struct InputState<B> {
    queue: InputQueue,
    backend: Option<B>,
}

struct Shared<B> {
    name: String,
    params: VideoParams,
    status: Arc<Status>,
    input: Signal<InputState<B>>,
    output: RecordChannel,
    input_dropped: AtomicU64,
    encoded: AtomicU64,
    gate_dropped: AtomicU64,
}

impl<B> ComponentLogger for Shared<B> {
    fn log_context(&self) -> LogContext {
        LogContext::new("Codec", &self.name).with_stream("video")
    }
}

/// H.264 encoder around an external [`VideoBackend`].
///
/// `write` queues raw frames (up to [`YUV_BUF_NUM`]); a worker thread encodes
/// them and publishes access units into the output ring, subject to the
/// keyframe-dependency gate.
pub struct H264Encoder<B: VideoBackend> {
    shared: Arc<Shared<B>>,
    headers: StreamHeaders,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<B: VideoBackend> H264Encoder<B> {
    pub fn new(params: VideoParams, mut backend: B) -> Result<Self> {
        if params.width == 0 || params.height == 0 || params.width % 2 != 0 || params.height % 2 != 0 {
            bail!("invalid picture size {}x{}", params.width, params.height);
        }
        if params.frame_rate == 0 {
            bail!("frame rate must be > 0");
        }

        let headers = backend
            .stream_headers()
            .context("failed to read stream headers")?;

        let status = Arc::new(Status::new());
        let shared = Arc::new(Shared {
            name: "h264enc".to_string(),
            input: Signal::new(
                InputState {
                    queue: InputQueue::new(YUV_BUF_NUM, params.frame_bytes()),
                    backend: Some(backend),
                },
                "h264 input",
            ),
            output: RecordChannel::new("h264enc.out", params.capacity, status.clone()),
            params,
            status,
            input_dropped: AtomicU64::new(0),
            encoded: AtomicU64::new(0),
            gate_dropped: AtomicU64::new(0),
        });

        let worker = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("h264enc".to_string())
                .spawn(move || encode_thread(shared))
                .context("failed to spawn encode thread")?
        };

        shared.info(&format!(
            "created {}x{}@{} {} bit/s, sps={}B pps={}B",
            shared.params.width,
            shared.params.height,
            shared.params.frame_rate,
            shared.params.bitrate,
            headers.sps.len(),
            headers.pps.len()
        ));

        Ok(Self {
            shared,
            headers,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn params(&self) -> &VideoParams {
        &self.shared.params
    }

    fn destroyed(&self, op: &str) -> bool {
        if self.shared.status.is_exiting() {
            self.shared.warn(&format!("{} on destroyed encoder ignored", op));
            return true;
        }
        false
    }
}

fn encode_thread<B: VideoBackend>(shared: Arc<Shared<B>>) {
    let status = &shared.status;
    let (width, height) = (shared.params.width as usize, shared.params.height as usize);
    shared.debug("encode thread running");

    while !status.is_exiting() {
        if !status.is_started() {
            let guard = shared.input.lock();
            let idle = Duration::from_millis(IDLE_POLL_MS);
            drop(shared.input.wait_while_for(guard, idle, |_| {
                !status.is_started() && !status.is_exiting()
            }));
            continue;
        }

        // the encode call runs under the input lock, writers queue behind it
        let mut input = shared.input.lock();
        input = shared
            .input
            .wait_while(input, |state| state.queue.is_empty() && !status.is_exiting());
        if input.queue.is_empty() {
            continue;
        }

        let force_key = status.take(TS_REQUEST_IDR);
        let InputState { queue, backend } = &mut *input;
        let result = match (backend.as_mut(), PlanarImage::i420(queue.front(), width, height)) {
            (Some(backend), Some(picture)) => backend.encode(&picture, force_key),
            (None, _) => Ok(Vec::new()),
            (_, None) => Err(anyhow::anyhow!("input slot smaller than one picture")),
        };
        queue.advance();
        drop(input);

        let units = match result {
            Ok(units) => units,
            Err(e) => {
                if force_key {
                    status.set(TS_REQUEST_IDR);
                }
                shared.error(&format!("encode failed: {:#}", e));
                continue;
            }
        };
        if units.is_empty() {
            continue;
        }
        shared.encoded.fetch_add(1, Ordering::Relaxed);
        publish(&shared, &units);
    }

    shared.debug("encode thread exit");
}

fn publish<B>(shared: &Shared<B>, units: &[CodedUnit]) {
    let key = units.first().is_some_and(|u| u.key);
    let parts: Vec<&[u8]> = units.iter().map(|u| u.payload.as_slice()).collect();
    let gate = KeyframeGate::new(&shared.status);

    let outcome = shared
        .output
        .with_ring(|ring| gate.offer(ring, key, &parts, tick_count()));

    match outcome {
        Publish::Stored => {
            shared.trace(&format!("{} frame published", if key { "key" } else { "non-key" }));
        }
        Publish::Dropped => {
            shared.warn(&format!("{} frame dropped", if key { "key" } else { "non-key" }));
        }
        Publish::Suppressed => {
            shared.gate_dropped.fetch_add(1, Ordering::Relaxed);
            shared.warn("last key frame has dropped, and current frame is non-key frame, so drop it");
        }
    }
}

impl<B: VideoBackend> Codec for H264Encoder<B> {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn write(&self, input: &[u8]) {
        if self.destroyed("write") {
            return;
        }
        let mut state = self.shared.input.lock();
        if !state.queue.push(input) {
            self.shared.input_dropped.fetch_add(1, Ordering::Relaxed);
            self.shared.debug("input queue full, frame dropped");
        }
        self.shared.input.notify();
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Option<FrameInfo> {
        if self.destroyed("read") {
            return None;
        }
        self.shared.output.read(buf, timeout)
    }

    fn start(&self, running: bool) {
        if self.destroyed("start") {
            return;
        }
        self.shared.output.set_started(running);
        // wake the idling worker
        let _input = self.shared.input.lock();
        self.shared.input.notify_all();
        self.shared.info(if running { "started" } else { "stopped" });
    }

    fn reset(&self, flags: ResetFlags) {
        if self.destroyed("reset") {
            return;
        }
        if flags.contains(ResetFlags::CLEAR_INBUF) {
            self.shared.input.lock().queue.clear();
        }
        if flags.contains(ResetFlags::CLEAR_OUTBUF) {
            self.shared.output.clear();
        }
        if flags.contains(ResetFlags::REQUEST_IDR) {
            self.shared.status.set(TS_REQUEST_IDR);
        }
    }

    fn reconfigure(&self, bitrate: u32) {
        if self.destroyed("reconfigure") {
            return;
        }
        let mut input = self.shared.input.lock();
        if let Some(backend) = input.backend.as_mut() {
            match backend.reconfigure(bitrate) {
                Ok(()) => self.shared.info(&format!("reconfig bitrate: {}", bitrate)),
                Err(e) => self.shared.warn(&format!("reconfig bitrate {} failed: {:#}", bitrate, e)),
            }
        }
    }

    fn lock_output(&self) -> Option<OutputLock<'_>> {
        if self.destroyed("lock_output") {
            return None;
        }
        Some(self.shared.output.lock_output())
    }

    fn stream_headers(&self) -> StreamHeaders {
        self.headers.clone()
    }

    fn state(&self) -> LifecycleState {
        self.shared.status.state()
    }

    fn stats(&self) -> CodecStats {
        CodecStats {
            name: self.shared.name.clone(),
            state: self.shared.status.state(),
            output: self.shared.output.stats(),
            input_dropped: self.shared.input_dropped.load(Ordering::Relaxed),
            encoded: self.shared.encoded.load(Ordering::Relaxed),
            gate_dropped: self.shared.gate_dropped.load(Ordering::Relaxed),
        }
    }

    fn teardown(&self) {
        if self.shared.status.is_exiting() {
            return;
        }
        {
            let _input = self.shared.input.lock();
            self.shared.status.set(TS_EXIT);
            self.shared.input.notify_all();
        }
        self.shared.output.raise(TS_EXIT);

        if let Some(handle) = lock_mutex(&self.worker, "h264 worker").take() {
            if handle.join().is_err() {
                self.shared.error("encode thread panicked");
            }
        }

        // release the external encoder now, not when the last Arc goes away
        drop(self.shared.input.lock().backend.take());
        self.shared.trace_ring(&self.shared.output.stats());
        self.shared.info("destroyed");
    }
}

impl<B: VideoBackend> Drop for H264Encoder<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
