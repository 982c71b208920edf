use crate::sink::{Listener, ResponseSink};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;

/// Relays data, backpressure, and completion between the transform's output
/// side and the underlying sink.
///
/// Only active while the transform is installed. Chunks the transform
/// produces are forwarded through the original sink write while the sink is
/// ready; on backpressure they queue here, in order, until the sink's drain
/// event resumes the flow. The producer-facing drain listeners live here for
/// the compressing half of a response's life and fire only once the queue is
/// empty again.
pub(crate) struct FlowBridge {
    pending: VecDeque<Bytes>,
    pub(crate) drain_listeners: Vec<Listener>,
    sink_ready: bool,
    finish_on_drain: bool,
    active: bool,
}

impl FlowBridge {
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            drain_listeners: Vec::new(),
            sink_ready: true,
            finish_on_drain: false,
            active: false,
        }
    }

    /// Takes over the buffered drain listeners when the transform installs.
    pub(crate) fn activate(&mut self, listeners: Vec<Listener>) {
        self.active = true;
        self.drain_listeners = listeners;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Forwards transform output to the sink.
    ///
    /// Returns `Ok(true)` when everything was accepted and the sink is still
    /// ready; `Ok(false)` is the backpressure signal surfaced to the
    /// producer's `write`.
    pub(crate) fn forward<S: ResponseSink>(
        &mut self,
        sink: &mut S,
        chunks: Vec<Bytes>,
    ) -> io::Result<bool> {
        self.pending.extend(chunks);
        self.flush_pending(sink)
    }

    /// Resumes after the sink's drain event.
    ///
    /// Returns `Ok(true)` once every queued chunk has been flushed, meaning
    /// the producer's own drain listeners may fire.
    pub(crate) fn pump<S: ResponseSink>(&mut self, sink: &mut S) -> io::Result<bool> {
        self.sink_ready = true;
        if !self.flush_pending(sink)? {
            return Ok(false);
        }
        if self.finish_on_drain {
            self.finish_on_drain = false;
            sink.end(None)?;
        }
        Ok(true)
    }

    /// Finalizes the sink once all pending output has been flushed.
    ///
    /// The transform has already consumed all input bytes at this point; the
    /// sink's end carries no further payload.
    pub(crate) fn finish<S: ResponseSink>(&mut self, sink: &mut S) -> io::Result<()> {
        if self.pending.is_empty() {
            sink.end(None)?;
        } else {
            self.finish_on_drain = true;
        }
        Ok(())
    }

    fn flush_pending<S: ResponseSink>(&mut self, sink: &mut S) -> io::Result<bool> {
        while self.sink_ready {
            let Some(chunk) = self.pending.pop_front() else {
                break;
            };
            if !sink.write(chunk)? {
                self.sink_ready = false;
            }
        }
        Ok(self.sink_ready && self.pending.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::MockSink;

    #[test]
    fn test_forward_while_ready() {
        let (mut sink, state) = MockSink::new();
        let mut bridge = FlowBridge::new();

        let ready = bridge
            .forward(&mut sink, vec![Bytes::from("a"), Bytes::from("b")])
            .unwrap();

        assert!(ready);
        assert_eq!(state.borrow().body(), b"ab");
    }

    #[test]
    fn test_backpressure_queues_chunks() {
        let (mut sink, state) = MockSink::new();
        state.borrow_mut().ready = false;
        let mut bridge = FlowBridge::new();

        // First chunk is taken by the sink but reports backpressure; the rest queue.
        let ready = bridge
            .forward(&mut sink, vec![Bytes::from("a"), Bytes::from("b")])
            .unwrap();
        assert!(!ready);
        assert_eq!(state.borrow().body(), b"a");

        // Nothing moves until drain.
        let ready = bridge.forward(&mut sink, vec![Bytes::from("c")]).unwrap();
        assert!(!ready);
        assert_eq!(state.borrow().body(), b"a");

        state.borrow_mut().ready = true;
        assert!(bridge.pump(&mut sink).unwrap());
        assert_eq!(state.borrow().body(), b"abc");
    }

    #[test]
    fn test_finish_deferred_until_drained() {
        let (mut sink, state) = MockSink::new();
        state.borrow_mut().ready = false;
        let mut bridge = FlowBridge::new();

        bridge
            .forward(&mut sink, vec![Bytes::from("a"), Bytes::from("b")])
            .unwrap();
        bridge.finish(&mut sink).unwrap();
        assert!(!state.borrow().ended);

        state.borrow_mut().ready = true;
        bridge.pump(&mut sink).unwrap();
        assert!(state.borrow().ended);
        assert_eq!(state.borrow().end_calls, 1);
    }

    #[test]
    fn test_finish_immediate_when_empty() {
        let (mut sink, state) = MockSink::new();
        let mut bridge = FlowBridge::new();

        bridge.forward(&mut sink, vec![Bytes::from("a")]).unwrap();
        bridge.finish(&mut sink).unwrap();
        assert!(state.borrow().ended);
    }
}
