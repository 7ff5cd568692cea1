//! Host-side receive path for the emulated serial link.
//!
//! On the board the byte-received interrupt feeds the [`FrameProducer`]. On
//! the host a dedicated OS thread plays that role: it blocks on a reader
//! (usually the terminal) and pushes every byte into the ring until it sees
//! the quit byte or end of input. The thread is detached rather than joined,
//! so a read that never returns cannot hold up process exit.

use crate::framer::FrameProducer;
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

const READ_CHUNK: usize = 64;

/// Why a reader thread stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    QuitByte,
    EndOfInput,
    Failed(ErrorKind),
}

/// Feed `reader` into `rx` until the quit byte, EOF or a read error.
///
/// Bytes before the quit byte in the same chunk are still delivered.
pub fn pump<R: Read>(mut reader: R, rx: &FrameProducer, quit_byte: u8) -> ReaderExit {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return ReaderExit::EndOfInput,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Link read failed: {}", e);
                return ReaderExit::Failed(e.kind());
            }
        };

        if let Some(at) = buf[..n].iter().position(|&b| b == quit_byte) {
            rx.receive(&buf[..at]);
            return ReaderExit::QuitByte;
        }
        rx.receive(&buf[..n]);
    }
}

/// Handle to a running reader thread.
#[derive(Debug)]
pub struct ReaderThread {
    handle: Option<JoinHandle<ReaderExit>>,
}

impl ReaderThread {
    /// Start pumping `reader` on its own thread. `quit` is raised when it stops.
    pub fn spawn<R>(
        reader: R,
        rx: FrameProducer,
        quit_byte: u8,
        quit: Arc<AtomicBool>,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let handle = thread::Builder::new().name("obc-rx".into()).spawn(move || {
            let exit = pump(reader, &rx, quit_byte);
            info!("Link reader stopped: {:?}", exit);
            quit.store(true, Ordering::Release);
            exit
        })?;

        Ok(Self { handle: Some(handle) })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread if it already stopped, otherwise detach it.
    pub fn release(mut self) -> Option<ReaderExit> {
        let handle = self.handle.take()?;
        if handle.is_finished() {
            handle.join().ok()
        } else {
            // A blocked read cannot be interrupted; the OS reclaims it at exit
            drop(handle);
            None
        }
    }
}

/// Non-canonical, no-echo terminal mode, restored on drop.
///
/// Without it the tty line discipline buffers input until Enter, echoes
/// keystrokes onto the reply stream and swallows Ctrl-D as end of file.
/// Signals stay enabled so Ctrl-C still reaches the process.
#[cfg(unix)]
#[derive(Debug)]
pub struct RawTerminal {
    fd: libc::c_int,
    saved: libc::termios,
}

#[cfg(unix)]
impl RawTerminal {
    /// Switch `fd` to raw input. `Ok(None)` when it is not a terminal.
    pub fn enable(fd: libc::c_int) -> io::Result<Option<Self>> {
        // SAFETY: isatty only inspects the descriptor number.
        if unsafe { libc::isatty(fd) } != 1 {
            return Ok(None);
        }

        let mut saved = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: `saved` is a valid writable termios and `fd` is a terminal.
        if unsafe { libc::tcgetattr(fd, saved.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: tcgetattr succeeded, so every field was written.
        let saved = unsafe { saved.assume_init() };

        let mut raw = saved;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        // SAFETY: `raw` is a fully initialised termios copied from the terminal.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }

        info!("Terminal switched to raw input");
        Ok(Some(Self { fd, saved }))
    }

    /// Raw mode on standard input.
    pub fn stdin() -> io::Result<Option<Self>> {
        Self::enable(libc::STDIN_FILENO)
    }
}

#[cfg(unix)]
impl Drop for RawTerminal {
    fn drop(&mut self) {
        // SAFETY: `saved` came from tcgetattr on this same descriptor.
        if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved) } != 0 {
            error!("Failed to restore terminal: {}", io::Error::last_os_error());
        }
    }
}

/// Terminals are left untouched where termios is unavailable.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct RawTerminal;

#[cfg(not(unix))]
impl RawTerminal {
    pub fn stdin() -> io::Result<Option<Self>> {
        Ok(None)
    }
}
