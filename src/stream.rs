//! An async `Stream` of input events over the decoder's file descriptor.
//!
//! Requires a tokio reactor. The fd is put into non-blocking mode for the
//! lifetime of the stream (restored on drop), readiness comes from
//! `AsyncFd`, and the inter-byte timeout that [`crate::Decoder::wait_key`]
//! implements with `poll(2)` is a tokio sleep here: while a partial sequence
//! is buffered and no new bytes arrive within the decoder's wait time, the
//! sequence is force-decoded.

use std::future::Future;
use std::io;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::time::Sleep;
use tokio_stream::Stream;

use crate::{Decoder, Error, Event, Next};

pub struct EventStream {
    decoder: Decoder,
    fd: AsyncFd<RawFd>,
    /// Armed while a partial sequence waits for more bytes.
    timeout: Option<Pin<Box<Sleep>>>,
    old_fd_flags: Option<OFlag>,
}

impl EventStream {
    /// Wrap a started decoder that owns a file descriptor. The fd is set to
    /// non-blocking mode; original flags are restored when the stream is
    /// dropped.
    pub fn new(decoder: Decoder) -> io::Result<EventStream> {
        let raw = decoder.fd().ok_or_else(|| io::Error::from(Error::NoFd))?;
        let old_fd_flags = set_nonblocking(raw);
        let fd = AsyncFd::with_interest(raw, Interest::READABLE)?;
        Ok(EventStream {
            decoder,
            fd,
            timeout: None,
            old_fd_flags,
        })
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut Decoder {
        &mut self.decoder
    }

    fn restore_fd_flags(&mut self) {
        if let Some(flags) = self.old_fd_flags.take() {
            if let Err(err) = fcntl(*self.fd.get_ref(), FcntlArg::F_SETFL(flags)) {
                error!("unable to restore fd flags: {:?}", err);
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.restore_fd_flags();
    }
}

/// Set the fd to non-blocking mode. Returns the old flags if they could be
/// read and changed. Does not panic; errors are logged.
fn set_nonblocking(fd: RawFd) -> Option<OFlag> {
    let current = match fcntl(fd, FcntlArg::F_GETFL) {
        Err(err) => {
            error!("unable to read fd flags: {:?}", err);
            return None;
        }
        Ok(bits) => match OFlag::from_bits(bits) {
            None => {
                error!("unable to parse fd flags: {:x?}", bits);
                return None;
            }
            Some(flags) => flags,
        },
    };

    let mut new_flags = current;
    new_flags.set(OFlag::O_NONBLOCK, true);

    match fcntl(fd, FcntlArg::F_SETFL(new_flags)) {
        Err(err) => {
            error!("unable to set fd flags: {:?}", err);
            None
        }
        Ok(_) => Some(current),
    }
}

impl Stream for EventStream {
    type Item = io::Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Drain whatever the buffer already decodes to
            let again = match this.decoder.get_key() {
                Ok(Next::Key(ev)) => {
                    this.timeout = None;
                    return Poll::Ready(Some(Ok(ev)));
                }
                Ok(Next::Eof) => return Poll::Ready(None),
                Ok(Next::Again(_)) => true,
                Ok(Next::None) => false,
                Err(err) => return Poll::Ready(Some(Err(err.into()))),
            };

            if again && this.decoder.closed() {
                // No more bytes will ever arrive; resolve what's buffered
                this.timeout = None;
                return match this.decoder.get_key_force() {
                    Ok(Next::Key(ev)) => Poll::Ready(Some(Ok(ev))),
                    Ok(_) => Poll::Ready(None),
                    Err(err) => Poll::Ready(Some(Err(err.into()))),
                };
            }

            match this.fd.poll_read_ready(cx) {
                Poll::Ready(Ok(mut guard)) => {
                    // Clear readiness before reading, to avoid losing a
                    // wakeup for bytes that arrive between the read and the
                    // clear.
                    guard.clear_ready();
                    match this.decoder.advise_readable() {
                        Ok(true) => {
                            this.timeout = None;
                        }
                        Ok(false) => {}
                        Err(err) => return Poll::Ready(Some(Err(err.into()))),
                    }
                }
                Poll::Ready(Err(err)) => return Poll::Ready(Some(Err(err))),
                Poll::Pending => {
                    if !again {
                        this.timeout = None;
                        return Poll::Pending;
                    }

                    // Partial sequence and nothing to read: arm the
                    // inter-byte timeout and force a decision when it fires
                    let wait = Duration::from_millis(u64::from(this.decoder.wait_time()));
                    let sleep = this
                        .timeout
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(wait)));
                    match sleep.as_mut().poll(cx) {
                        Poll::Ready(()) => {
                            this.timeout = None;
                            match this.decoder.get_key_force() {
                                Ok(Next::Key(ev)) => return Poll::Ready(Some(Ok(ev))),
                                Ok(Next::Eof) => return Poll::Ready(None),
                                Ok(_) => {}
                                Err(err) => return Poll::Ready(Some(Err(err.into()))),
                            }
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }
}
