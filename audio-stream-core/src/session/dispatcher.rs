//! Event delivery off the real-time path.
//!
//! Hardware callbacks post events through a non-blocking [`EventSender`];
//! a dedicated thread runs the session's handler for each one, in order.

use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::models::error::StreamError;

type Handler<E> = Box<dyn FnMut(E) + Send + 'static>;

enum Envelope<E> {
    Event(E),
    Barrier(Sender<()>),
    Shutdown,
}

/// Cloneable, never-blocking handle for posting events.
pub(crate) struct EventSender<E> {
    tx: Sender<Envelope<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> EventSender<E> {
    pub fn send(&self, event: E) {
        // Fails only once the dispatcher is gone; late events are dropped.
        let _ = self.tx.send(Envelope::Event(event));
    }
}

/// Supplies the handler to a dispatcher thread spawned before its owner.
pub(crate) struct HandlerSlot<E> {
    tx: Sender<Handler<E>>,
}

impl<E> HandlerSlot<E> {
    pub fn bind<F>(self, handler: F)
    where
        F: FnMut(E) + Send + 'static,
    {
        let _ = self.tx.send(Box::new(handler));
    }
}

/// Owns the event thread of one session.
pub(crate) struct EventDispatcher<E> {
    tx: Sender<Envelope<E>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Send + 'static> EventDispatcher<E> {
    /// Spawn the event thread. Events queue until a handler is bound.
    pub fn spawn(name: &str) -> Result<(Self, HandlerSlot<E>), StreamError> {
        let (tx, rx) = unbounded::<Envelope<E>>();
        let (handler_tx, handler_rx) = bounded::<Handler<E>>(1);

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || run(rx, handler_rx))
            .map_err(|e| StreamError::DeviceInit(format!("failed to spawn {} thread: {}", name, e)))?;

        let dispatcher = Self {
            tx,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        };
        Ok((dispatcher, HandlerSlot { tx: handler_tx }))
    }

    pub fn sender(&self) -> EventSender<E> {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub fn dispatch(&self, event: E) {
        let _ = self.tx.send(Envelope::Event(event));
    }

    pub fn is_dispatch_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Wait until every event posted before this call has been handled.
    ///
    /// Returns false on timeout. From the dispatch thread itself this cannot
    /// wait and returns immediately.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_dispatch_thread() {
            return true;
        }
        let (done_tx, done_rx) = bounded(1);
        if self.tx.send(Envelope::Barrier(done_tx)).is_err() {
            return false;
        }
        done_rx.recv_timeout(timeout).is_ok()
    }
}

fn run<E>(rx: Receiver<Envelope<E>>, handler_rx: Receiver<Handler<E>>) {
    let Ok(mut handler) = handler_rx.recv() else {
        return;
    };
    for envelope in rx.iter() {
        match envelope {
            Envelope::Event(event) => handler(event),
            Envelope::Barrier(done) => {
                let _ = done.send(());
            }
            Envelope::Shutdown => break,
        }
    }
}

impl<E> Drop for EventDispatcher<E> {
    fn drop(&mut self) {
        let _ = self.tx.send(Envelope::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            // The owner can be dropped from its own handler.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
