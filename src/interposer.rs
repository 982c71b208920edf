use crate::bridge::FlowBridge;
use crate::gate;
use crate::layer::Filter;
use crate::sink::{Event, Listener, ResponseSink};
use crate::transform::CompressionTransform;
use bytes::Bytes;
use compression_core::Level;
use http::header::{HeaderName, HeaderValue};
use http::request;
use std::cell::RefCell;
use std::io;
use std::rc::{Rc, Weak};

/// Per-response interposition state.
///
/// `Uninitialized → {PassThrough | Compressing} → Ended`; the two decided
/// modes never transition into each other, and the transform lives inside
/// `Compressing` so exactly one destination can receive producer bytes.
enum Mode {
    Uninitialized,
    PassThrough,
    Compressing(CompressionTransform),
    Ended,
}

struct Inner<S> {
    sink: S,
    request: request::Parts,
    filter: Filter,
    threshold: u64,
    level: Level,
    mode: Mode,
    committed_length: Option<u64>,
    /// Drain subscriptions buffered until the decision resolves; `None` once
    /// the queue has been released to the real event source.
    pending_listeners: Option<Vec<Listener>>,
    bridge: FlowBridge,
}

/// A response sink that may compress what is written to it.
///
/// Wraps the server's [`ResponseSink`] for the lifetime of one response and
/// implements the same contract, so application code writes to it unaware of
/// whether a transform is active. The compression decision is made exactly
/// once, when headers commit: at the first `write`/`end`, or earlier through
/// [`commit_headers`](CompressionSink::commit_headers).
///
/// Cloning yields another handle onto the same response state.
pub struct CompressionSink<S> {
    inner: Rc<RefCell<Inner<S>>>,
}

impl<S> Clone for CompressionSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: ResponseSink + 'static> CompressionSink<S> {
    pub(crate) fn new(
        sink: S,
        request: request::Parts,
        filter: Filter,
        threshold: u64,
        level: Level,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                sink,
                request,
                filter,
                threshold,
                level,
                mode: Mode::Uninitialized,
                committed_length: None,
                pending_listeners: Some(Vec::new()),
                bridge: FlowBridge::new(),
            })),
        }
    }

    /// Runs the compression decision if it has not run yet.
    ///
    /// This is the entry point for the server's one-shot "headers about to
    /// commit" notification; the first `write` or `end` triggers it
    /// implicitly. A response cannot accept a body byte with an undecided
    /// compression state.
    pub fn commit_headers(&mut self) {
        let mut state = self.inner.borrow_mut();
        if matches!(state.mode, Mode::Uninitialized) {
            self.run_gate(&mut state);
        }
    }

    /// Forces the transform to emit any internally buffered compressed bytes.
    ///
    /// A no-op while no transform is active.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut state = self.inner.borrow_mut();
        let Inner {
            sink, mode, bridge, ..
        } = &mut *state;
        if let Mode::Compressing(transform) = mode {
            let mut produced = Vec::new();
            transform.flush(&mut produced)?;
            bridge.forward(sink, produced)?;
        }
        Ok(())
    }

    fn run_gate(&self, state: &mut Inner<S>) {
        let decision = {
            let Inner {
                sink,
                request,
                filter,
                threshold,
                committed_length,
                ..
            } = &*state;
            gate::decide(request, sink, filter, *threshold, *committed_length)
        };

        let listeners = state.pending_listeners.take().unwrap_or_default();
        match decision {
            Some(codec) => {
                gate::apply_compression_headers(&mut state.sink, codec);
                state.mode = Mode::Compressing(CompressionTransform::new(codec, state.level));
                state.bridge.activate(listeners);
                let weak = Rc::downgrade(&self.inner);
                state
                    .sink
                    .on(Event::Drain, Box::new(move || relay_drain(&weak)));
            }
            None => {
                state.mode = Mode::PassThrough;
                for listener in listeners {
                    state.sink.on(Event::Drain, listener);
                }
            }
        }
    }
}

impl<S: ResponseSink + 'static> ResponseSink for CompressionSink<S> {
    fn write(&mut self, chunk: Bytes) -> io::Result<bool> {
        let mut state = self.inner.borrow_mut();
        if matches!(state.mode, Mode::Ended) {
            return Ok(false);
        }
        if matches!(state.mode, Mode::Uninitialized) {
            if state.committed_length.is_none() {
                state.committed_length = Some(chunk.len() as u64);
            }
            self.run_gate(&mut state);
        }

        let Inner {
            sink, mode, bridge, ..
        } = &mut *state;
        match mode {
            Mode::PassThrough => sink.write(chunk),
            Mode::Compressing(transform) => {
                let mut produced = Vec::new();
                transform.write(&chunk, &mut produced)?;
                bridge.forward(sink, produced)
            }
            Mode::Uninitialized | Mode::Ended => Ok(false),
        }
    }

    fn end(&mut self, chunk: Option<Bytes>) -> io::Result<bool> {
        let mut state = self.inner.borrow_mut();
        if matches!(state.mode, Mode::Ended) {
            return Ok(false);
        }
        if matches!(state.mode, Mode::Uninitialized) {
            // The only place an implicit length estimate exists when the
            // response ends without a prior write.
            if let Some(chunk) = &chunk
                && state.committed_length.is_none()
            {
                state.committed_length = Some(chunk.len() as u64);
            }
            self.run_gate(&mut state);
        }

        match std::mem::replace(&mut state.mode, Mode::Ended) {
            Mode::PassThrough => state.sink.end(chunk),
            Mode::Compressing(mut transform) => {
                let mut produced = Vec::new();
                if let Some(chunk) = chunk {
                    transform.write(&chunk, &mut produced)?;
                }
                transform.finish(&mut produced)?;
                let Inner { sink, bridge, .. } = &mut *state;
                bridge.forward(sink, produced)?;
                bridge.finish(sink)?;
                Ok(true)
            }
            Mode::Uninitialized | Mode::Ended => Ok(false),
        }
    }

    fn on(&mut self, event: Event, listener: Listener) {
        let mut state = self.inner.borrow_mut();
        if event != Event::Drain {
            state.sink.on(event, listener);
            return;
        }

        let Inner {
            sink,
            mode,
            bridge,
            pending_listeners,
            ..
        } = &mut *state;
        match mode {
            // The real event source is not known yet.
            Mode::Uninitialized => match pending_listeners {
                Some(pending) => pending.push(listener),
                None => sink.on(Event::Drain, listener),
            },
            Mode::PassThrough => sink.on(Event::Drain, listener),
            Mode::Compressing(_) => bridge.drain_listeners.push(listener),
            Mode::Ended => {
                if bridge.is_active() {
                    bridge.drain_listeners.push(listener);
                } else {
                    sink.on(Event::Drain, listener);
                }
            }
        }
    }

    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.inner.borrow().sink.header(name)
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.borrow_mut().sink.set_header(name, value);
    }

    fn remove_header(&mut self, name: &HeaderName) {
        self.inner.borrow_mut().sink.remove_header(name);
    }
}

/// Resumes the flow on the sink's drain event.
///
/// The producer's own drain listeners fire only once every queued chunk has
/// been flushed, and run with the response state released so they can write
/// more data immediately.
fn relay_drain<S: ResponseSink>(weak: &Weak<RefCell<Inner<S>>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let mut ready = {
        let mut state = inner.borrow_mut();
        let Inner { sink, bridge, .. } = &mut *state;
        match bridge.pump(sink) {
            Ok(true) => std::mem::take(&mut bridge.drain_listeners),
            Ok(false) => return,
            Err(error) => {
                tracing::error!(%error, "failed to flush compressed output on drain");
                return;
            }
        }
    };

    for listener in ready.iter_mut() {
        listener();
    }

    // Listeners registered during dispatch land behind the originals.
    let mut state = inner.borrow_mut();
    let mut added = std::mem::take(&mut state.bridge.drain_listeners);
    ready.append(&mut added);
    state.bridge.drain_listeners = ready;
}
