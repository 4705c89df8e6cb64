//! A background worker thread and one-shot promises for its results.
//!
//! The render loop must never wait on the detector, so work is sent to a [`Worker`] with
//! [`Worker::try_send`] and results are collected with [`PromiseHandle::poll`], neither of
//! which block.

use std::{
    any::Any,
    fmt, io,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Creates a connected pair of [`Promise`] and [`PromiseHandle`].
pub fn promise<T>() -> (Promise<T>, PromiseHandle<T>) {
    // Capacity of 1 means that `Promise::fulfill` will never block.
    let (sender, recv) = crossbeam_channel::bounded(1);
    (Promise { inner: sender }, PromiseHandle { recv })
}

/// An empty slot that can be filled with a `T`, fulfilling the promise.
pub struct Promise<T> {
    inner: Sender<T>,
}

impl<T> Promise<T> {
    /// Fulfills the promise with a value, consuming it.
    ///
    /// If the connected [`PromiseHandle`] was dropped (its result was abandoned), `value` is
    /// dropped and nothing happens.
    pub fn fulfill(self, value: T) {
        self.inner.send(value).ok();
    }
}

/// A handle connected to a [`Promise`] that will eventually resolve to a value of type `T`.
pub struct PromiseHandle<T> {
    recv: Receiver<T>,
}

impl<T> PromiseHandle<T> {
    /// Checks whether the [`Promise`] has been resolved, without blocking.
    ///
    /// Returns `None` while the promise is still pending. Once this returns `Some`, the handle
    /// should be discarded.
    pub fn poll(&self) -> Option<Result<T, PromiseDropped>> {
        match self.recv.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PromiseDropped { _priv: () })),
        }
    }
}

/// Indicates that the connected [`Promise`] was dropped without being fulfilled.
///
/// This happens when the worker thread panicked or exited while processing the request.
#[derive(Debug, Clone, Copy)]
pub struct PromiseDropped {
    _priv: (),
}

/// A builder object that can be used to configure and spawn a [`Worker`].
#[derive(Clone)]
pub struct WorkerBuilder {
    name: Option<String>,
    capacity: usize,
}

impl WorkerBuilder {
    /// Sets the name of the [`Worker`] thread.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets how many messages may be queued while the worker is busy.
    ///
    /// By default, a capacity of 1 is used.
    pub fn capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Spawns a [`Worker`] thread that uses `handler` to process incoming messages.
    pub fn spawn<I, F>(self, mut handler: F) -> io::Result<Worker<I>>
    where
        I: Send + 'static,
        F: FnMut(I) + Send + 'static,
    {
        let (sender, recv) = crossbeam_channel::bounded(self.capacity);
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        let name = self.name.unwrap_or_else(|| "<unnamed>".into());
        let thread_name = name.clone();
        let handle = builder.spawn(move || {
            log::trace!("worker '{thread_name}' starting");
            for message in recv {
                handler(message);
            }
            log::trace!("worker '{thread_name}' exiting");
        })?;

        Ok(Worker {
            name,
            sender: Some(sender),
            handle: Some(handle),
        })
    }
}

/// Error returned by [`Worker::try_send`], handing the message back.
#[derive(PartialEq, Eq)]
pub enum TrySendError<I> {
    /// The queue is full; the worker is still running.
    Full(I),
    /// The worker thread has exited, usually because its handler panicked.
    Exited(I),
}

impl<I> TrySendError<I> {
    pub fn into_inner(self) -> I {
        match self {
            TrySendError::Full(msg) | TrySendError::Exited(msg) => msg,
        }
    }
}

impl<I> fmt::Debug for TrySendError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Exited(_) => f.write_str("Exited(..)"),
        }
    }
}

/// A handle to a worker thread that processes messages of type `I`.
///
/// When dropped, the channel to the thread is closed and the thread is joined once it has
/// finished the message it is processing. If the thread has panicked and nobody called
/// [`Worker::reap`], the panic is forwarded to the thread dropping the `Worker`.
pub struct Worker<I: Send + 'static> {
    name: String,
    sender: Option<Sender<I>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker<()> {
    /// Returns a builder that can be used to configure and spawn a [`Worker`].
    #[inline]
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder {
            name: None,
            capacity: 1,
        }
    }
}

impl<I: Send + 'static> Worker<I> {
    /// Queues a message for the worker thread without blocking.
    ///
    /// If the queue is full or the worker thread has exited, the message is handed back.
    pub fn try_send(&mut self, msg: I) -> Result<(), TrySendError<I>> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(TrySendError::Exited(msg));
        };
        match sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(crossbeam_channel::TrySendError::Full(msg)) => Err(TrySendError::Full(msg)),
            Err(crossbeam_channel::TrySendError::Disconnected(msg)) => {
                self.sender = None;
                Err(TrySendError::Exited(msg))
            }
        }
    }

    /// Closes the channel and waits for the worker thread to exit.
    ///
    /// Returns the panic message if the thread panicked. The panic is considered handled and
    /// will not be forwarded when the `Worker` is dropped.
    pub fn reap(&mut self) -> Option<String> {
        drop(self.sender.take());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(()) => None,
            Err(payload) => {
                let msg = panic_message(&*payload);
                log::trace!("worker '{}' panicked: {msg}", self.name);
                Some(msg)
            }
        }
    }

    fn wait_for_exit(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => {}
                Err(payload) => {
                    if !thread::panicking() {
                        resume_unwind(payload);
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".into()
    }
}

impl<I: Send + 'static> Drop for Worker<I> {
    fn drop(&mut self) {
        // Close the channel to signal the thread to exit.
        drop(self.sender.take());

        self.wait_for_exit();
    }
}
