use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::StreamTrait;
use crossbeam_channel::{bounded, Sender};

use crate::error::BackendError;

/// How long `spawn` waits for the stream to come up.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A dedicated thread that builds, plays and finally drops one cpal stream.
///
/// cpal streams are not `Send` on every host, so the stream never leaves
/// the thread that built it.
pub(crate) struct StreamWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamWorker {
    pub fn spawn<F>(name: &'static str, build: F) -> Result<Self, BackendError>
    where
        F: FnOnce() -> Result<cpal::Stream, BackendError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<Result<(), BackendError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let started = build().and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                });
                let stream = match started {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| BackendError::Thread(name, e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => Ok(Self { stop_tx, handle }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                // The thread exits on its own once the stream comes up.
                let _ = stop_tx.send(());
                Err(BackendError::Thread(name, format!("stream not started within {:?}", STARTUP_TIMEOUT)))
            }
        }
    }

    /// Drop the stream and join the thread.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            log::warn!("Audio stream thread panicked");
        }
    }
}
