#![allow(clippy::new_without_default)]

//! Decodes the byte stream a terminal sends into typed input events.
//!
//! Terminals encode input as a mix of raw text in the session encoding, C0
//! control codes and overlapping escape sequences: terminfo-declared function
//! key strings, ECMA-48-ish CSI/SS3 sequences, several mouse protocols,
//! focus and position reports. Telling them apart is stateful and greedy; a
//! lone `<Esc>` press can only be distinguished from the start of a sequence
//! by waiting, so decoding revolves around an "again" protocol: a partial
//! match consumes nothing and asks for more bytes, and the caller either
//! supplies them or forces a timeout decision.
//!
//! Bytes get in either explicitly ([`Decoder::push_bytes`]) or by asking the
//! decoder to read its file descriptor ([`Decoder::advise_readable`]).
//! Events come out of [`Decoder::get_key`]; [`Decoder::wait_key`] couples
//! that to a timed `poll(2)` so timed-out partial sequences resolve (a bare
//! `<Esc>` becomes a key, an incomplete multibyte becomes a replacement).
//! Async hosts can wrap the decoder in an [`EventStream`] instead.
//!
//! ```no_run
//! use term_decode::{Decoder, Next};
//!
//! let mut dec = Decoder::new(libc::STDIN_FILENO, 0).unwrap();
//! loop {
//!     match dec.wait_key().unwrap() {
//!         Next::Key(ev) => println!("{}", dec.format_key(&ev, 0)),
//!         Next::Eof => break,
//!         _ => {}
//!     }
//! }
//! ```

#[macro_use]
extern crate log;

mod buffer;
mod codec;
mod csi;
mod event;
mod mouse;
mod names;
mod stream;
mod ti;


pub use codec::{Codec, Decoded, Utf8Codec};
pub use event::{Event, Sym, CANON_DELBS, CANON_SPACESYMBOL, MOD_ALT, MOD_CTRL, MOD_SHIFT};
pub use mouse::{MouseEvent, MouseProto, MouseTracking};
pub use names::{
    FORMAT_ALTISMETA, FORMAT_CARETCTRL, FORMAT_LONGMOD, FORMAT_LOWERMOD, FORMAT_LOWERSPACE,
    FORMAT_MOUSE_POS, FORMAT_SPACEMOD, FORMAT_URWID, FORMAT_VIM, FORMAT_WRAPBRACKET,
};
pub use stream::EventStream;
pub use ti::{BuiltinSource, TermSource};

use std::cmp::Ordering;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use buffer::InputBuf;

/// Do not interpret C0 codes and DEL; pass them through as keys.
pub const FLAG_NOINTERPRET: u16 = 1 << 0;
/// Report keypad keys as the characters they stand for.
pub const FLAG_CONVERTKP: u16 = 1 << 1;
/// Do not decode the session encoding; report raw bytes.
pub const FLAG_RAW: u16 = 1 << 2;
/// Construct without starting.
pub const FLAG_NOSTART: u16 = 1 << 3;
/// Leave termios alone on start/stop.
pub const FLAG_NOTERMIOS: u16 = 1 << 4;
/// Sets [`CANON_SPACESYMBOL`].
pub const FLAG_SPACESYMBOL: u16 = 1 << 5;
/// Allow Ctrl-C to be read as input, disabling SIGINT.
pub const FLAG_CTRLC: u16 = 1 << 6;
/// Surface EINTR rather than retrying.
pub const FLAG_EINTR: u16 = 1 << 7;

pub(crate) const PEEK_FORCE: u8 = 1 << 0;
pub(crate) const PEEK_ALT_PREFIXED: u8 = 1 << 1;

const POSIX_VDISABLE: libc::cc_t = 0;

/// What a decode attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// One event; exactly its bytes were consumed.
    Key(Event),
    /// A partial sequence is buffered. Nothing was consumed; the payload is
    /// a preview of what a forced (timed-out) decode would produce, which
    /// the caller may ignore.
    Again(Option<Event>),
    /// No event is currently possible; push more bytes or poll.
    None,
    /// The file descriptor has closed and the buffer is drained.
    Eof,
}

/// Decode errors. Parse problems never show up here: malformed input always
/// degrades into replacement events.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decoder has not been started")]
    NotStarted,
    #[error("decoder has no file descriptor to read from")]
    NoFd,
    #[error("input buffer is full")]
    BufferFull,
    #[error("interrupted by a signal")]
    Interrupted,
    #[error(transparent)]
    Sys(#[from] Errno),
}

impl Error {
    pub fn errno(&self) -> Errno {
        match self {
            Error::NotStarted => Errno::EINVAL,
            Error::NoFd => Errno::EBADF,
            Error::BufferFull => Errno::ENOMEM,
            Error::Interrupted => Errno::EINTR,
            Error::Sys(e) => *e,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> std::io::Error {
        std::io::Error::from_raw_os_error(e.errno() as i32)
    }
}

/// What a single driver made of the buffer head.
#[derive(Debug)]
pub(crate) enum Peek {
    Key {
        event: Event,
        nbytes: usize,
        /// Bytes past the consumed ones to skip on the *next* peek; used to
        /// keep an unknown CSI readable until its event is acted on.
        pending: usize,
    },
    Again,
    None,
    Eof,
}

/// One layer of the decode pipeline. Drivers only look, never consume; the
/// orchestrator applies the byte counts they report.
pub(crate) trait Driver {
    fn peek(&self, dec: &Decoder, bytes: &[u8], flags: u8) -> Peek;

    fn start(&self, _dec: &Decoder) -> Result<(), Error> {
        Ok(())
    }

    fn stop(&self, _dec: &Decoder) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct C0Key {
    sym: Sym,
    mod_set: u8,
}

/// The decoder instance. Not safe for concurrent access; callers serialize.
pub struct Decoder {
    fd: Option<RawFd>,
    flags: u16,
    canonflags: u8,
    buf: InputBuf,
    wait_time: u16,
    is_closed: bool,
    is_started: bool,
    restore_termios: Option<libc::termios>,
    c0: [Option<C0Key>; 32],
    codec: Box<dyn Codec>,
    drivers: Vec<Box<dyn Driver>>,
    mouse_proto: MouseProto,
    guessed_mouse_proto: MouseProto,
    mouse_tracking: MouseTracking,
}

impl Decoder {
    /// Create a decoder reading from `fd`, with the terminal type taken from
    /// `$TERM` and the built-in capability tables. Starts immediately unless
    /// `FLAG_NOSTART` is given.
    pub fn new(fd: RawFd, flags: u16) -> Result<Decoder, Error> {
        let term = std::env::var("TERM").unwrap_or_default();
        let source = BuiltinSource::new(&term);
        Decoder::with_term_source(Some(fd), &term, &source, flags)
    }

    /// Create a decoder with no file descriptor, fed via
    /// [`Decoder::push_bytes`] only.
    pub fn new_abstract(term: &str, flags: u16) -> Result<Decoder, Error> {
        let source = BuiltinSource::new(term);
        Decoder::with_term_source(None, term, &source, flags)
    }

    /// Full-control constructor: any fd, terminal name and capability
    /// source. The source is consulted during construction only.
    pub fn with_term_source(
        fd: Option<RawFd>,
        term: &str,
        source: &dyn TermSource,
        flags: u16,
    ) -> Result<Decoder, Error> {
        let mut c0: [Option<C0Key>; 32] = [None; 32];
        c0[0x09] = Some(C0Key {
            sym: Sym::Tab,
            mod_set: 0,
        });
        c0[0x0d] = Some(C0Key {
            sym: Sym::Enter,
            mod_set: 0,
        });
        c0[0x1b] = Some(C0Key {
            sym: Sym::Escape,
            mod_set: 0,
        });

        let mut drivers: Vec<Box<dyn Driver>> = Vec::new();
        if let Some(ti) = ti::TiDriver::new(source) {
            drivers.push(Box::new(ti));
        }
        drivers.push(Box::new(csi::CsiDriver));

        let has_mouse = source.key_caps().iter().any(|(name, _)| name == "mouse");

        let mut dec = Decoder {
            fd,
            flags: 0,
            canonflags: 0,
            buf: InputBuf::new(buffer::DEFAULT_SIZE),
            wait_time: 50,
            is_closed: false,
            is_started: false,
            restore_termios: None,
            c0,
            codec: Box::new(Utf8Codec),
            drivers,
            mouse_proto: MouseProto::None,
            guessed_mouse_proto: ti::guess_mouse_proto(term, has_mouse),
            mouse_tracking: MouseTracking::Click,
        };
        dec.set_flags(flags);

        if flags & FLAG_NOSTART == 0 {
            dec.start()?;
        }
        Ok(dec)
    }

    /// Acquire the terminal: snapshot termios, disable canonical mode and
    /// echo, write the keypad-transmit string. Repeated starts are no-ops.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.is_started {
            return Ok(());
        }

        if let Some(fd) = self.fd {
            if self.flags & FLAG_NOTERMIOS == 0 {
                // SAFETY: POSIX calls with a locally owned termios struct;
                // it is only used after tcgetattr succeeded.
                unsafe {
                    let mut termios: libc::termios = std::mem::zeroed();
                    if libc::tcgetattr(fd, &mut termios) == 0 {
                        self.restore_termios = Some(termios);

                        termios.c_iflag &= !(libc::IXON | libc::INLCR | libc::ICRNL);
                        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
                        termios.c_cc[libc::VMIN] = 1;
                        termios.c_cc[libc::VTIME] = 0;

                        if self.flags & FLAG_CTRLC != 0 {
                            // No signal keys at all
                            termios.c_lflag &= !libc::ISIG;
                        } else {
                            // Disable ^\ and ^Z but leave ^C as SIGINT
                            termios.c_cc[libc::VQUIT] = POSIX_VDISABLE;
                            termios.c_cc[libc::VSUSP] = POSIX_VDISABLE;
                        }

                        libc::tcsetattr(fd, libc::TCSANOW, &termios);
                    }
                }
            }
        }

        for driver in &self.drivers {
            driver.start(self)?;
        }

        debug!("decoder started");
        self.is_started = true;
        Ok(())
    }

    /// Release the terminal, restoring the termios snapshot. Safe across
    /// repeated start/stop cycles.
    pub fn stop(&mut self) -> Result<(), Error> {
        if !self.is_started {
            return Ok(());
        }

        for driver in &self.drivers {
            if let Err(err) = driver.stop(self) {
                error!("driver stop failed: {}", err);
            }
        }

        if let (Some(fd), Some(termios)) = (self.fd, self.restore_termios.as_ref()) {
            unsafe {
                libc::tcsetattr(fd, libc::TCSANOW, termios);
            }
        }

        self.is_started = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.fd
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
        if flags & FLAG_SPACESYMBOL != 0 {
            self.canonflags |= CANON_SPACESYMBOL;
        } else {
            self.canonflags &= !CANON_SPACESYMBOL;
        }
    }

    pub fn canonflags(&self) -> u8 {
        self.canonflags
    }

    pub fn set_canonflags(&mut self, flags: u8) {
        self.canonflags = flags;
        if flags & CANON_SPACESYMBOL != 0 {
            self.flags |= FLAG_SPACESYMBOL;
        } else {
            self.flags &= !FLAG_SPACESYMBOL;
        }
    }

    /// Inter-byte timeout in milliseconds for [`Decoder::wait_key`].
    pub fn wait_time(&self) -> u16 {
        self.wait_time
    }

    pub fn set_wait_time(&mut self, msec: u16) {
        self.wait_time = msec;
    }

    pub fn buffer_size(&self) -> usize {
        self.buf.size()
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buf.resize(size);
    }

    /// Free space in the input buffer, i.e. what [`Decoder::push_bytes`] can
    /// still accept.
    pub fn buffer_remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn mouse_proto(&self) -> MouseProto {
        self.mouse_proto
    }

    /// Select the mouse protocol the read side decodes. Writing the enabling
    /// control sequences to the terminal is the host's business.
    pub fn set_mouse_proto(&mut self, proto: MouseProto) {
        self.mouse_proto = proto;
    }

    /// What the terminal type suggests the protocol should be.
    pub fn guess_mouse_proto(&self) -> MouseProto {
        self.guessed_mouse_proto
    }

    pub fn mouse_tracking(&self) -> MouseTracking {
        self.mouse_tracking
    }

    pub fn set_mouse_tracking(&mut self, mode: MouseTracking) {
        self.mouse_tracking = mode;
    }

    /// Swap the session codec. Affects decoding only from the next call.
    pub fn set_codec(&mut self, codec: Box<dyn Codec>) {
        self.codec = codec;
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub(crate) fn closed(&self) -> bool {
        self.is_closed
    }

    /// Stage bytes for decoding. At most [`Decoder::buffer_remaining`] bytes
    /// are stored; the number actually taken is returned.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        self.buf.push(bytes)
    }

    /// Read whatever the fd has into the buffer. `Ok(true)` when new bytes
    /// arrived; `Ok(false)` on EAGAIN or EOF (EOF also latches, so
    /// subsequent decodes drain the buffer and then report [`Next::Eof`]).
    pub fn advise_readable(&mut self) -> Result<bool, Error> {
        let fd = self.fd.ok_or(Error::NoFd)?;

        self.buf.compact();
        if self.buf.remaining() == 0 {
            return Err(Error::BufferFull);
        }

        loop {
            match nix::unistd::read(fd, self.buf.tail()) {
                Ok(0) => {
                    self.is_closed = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.buf.grow_count(n);
                    return Ok(true);
                }
                Err(Errno::EAGAIN) => return Ok(false),
                Err(Errno::EINTR) if self.flags & FLAG_EINTR == 0 => continue,
                Err(Errno::EINTR) => return Err(Error::Interrupted),
                Err(e) => return Err(Error::Sys(e)),
            }
        }
    }

    /// Decode one event. Consumes exactly the event's bytes on
    /// [`Next::Key`]; consumes nothing otherwise.
    pub fn get_key(&mut self) -> Result<Next, Error> {
        if !self.is_started {
            return Err(Error::NotStarted);
        }
        self.buf.apply_high_tide();

        match self.peek_at(self.buf.bytes(), 0) {
            Peek::Key {
                event,
                nbytes,
                pending,
            } => {
                self.buf.slide_if_halfway();
                self.buf.eat(nbytes);
                self.buf.set_high_tide(pending);
                Ok(Next::Key(event))
            }
            Peek::Again => {
                // Peek again in force mode so the caller sees what a timeout
                // would produce. Nothing is eaten yet.
                let preview = match self.peek_at(self.buf.bytes(), PEEK_FORCE) {
                    Peek::Key { event, .. } => Some(event),
                    _ => None,
                };
                Ok(Next::Again(preview))
            }
            Peek::None => Ok(Next::None),
            Peek::Eof => Ok(Next::Eof),
        }
    }

    /// Like [`Decoder::get_key`], but partial sequences are resolved now: a
    /// bare `<Esc>` becomes a key, an incomplete multibyte a replacement.
    pub fn get_key_force(&mut self) -> Result<Next, Error> {
        if !self.is_started {
            return Err(Error::NotStarted);
        }
        self.buf.apply_high_tide();

        match self.peek_at(self.buf.bytes(), PEEK_FORCE) {
            Peek::Key {
                event,
                nbytes,
                pending,
            } => {
                self.buf.slide_if_halfway();
                self.buf.eat(nbytes);
                self.buf.set_high_tide(pending);
                Ok(Next::Key(event))
            }
            Peek::Again => Ok(Next::Again(None)),
            Peek::None => Ok(Next::None),
            Peek::Eof => Ok(Next::Eof),
        }
    }

    /// Decode one event, sleeping in `poll(2)` while the input is ambiguous.
    /// A timeout resolves the pending partial sequence through
    /// [`Decoder::get_key_force`]. Returns [`Next::Key`], [`Next::Eof`], or
    /// [`Next::None`] when even a forced decode yields nothing.
    pub fn wait_key(&mut self) -> Result<Next, Error> {
        let fd = self.fd.ok_or(Error::NoFd)?;

        loop {
            match self.get_key()? {
                key @ Next::Key(_) => return Ok(key),
                Next::Eof => return Ok(Next::Eof),
                Next::None => {
                    self.advise_readable()?;
                }
                Next::Again(_) => {
                    if self.is_closed {
                        // Never going to get more bytes: go with what's there
                        return self.get_key_force();
                    }

                    let ready = loop {
                        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
                        match poll(&mut fds, i32::from(self.wait_time)) {
                            Ok(_) => {
                                break fds[0]
                                    .revents()
                                    .map(|r| {
                                        r.intersects(
                                            PollFlags::POLLIN
                                                | PollFlags::POLLHUP
                                                | PollFlags::POLLERR,
                                        )
                                    })
                                    .unwrap_or(false);
                            }
                            Err(Errno::EINTR) if self.flags & FLAG_EINTR == 0 => continue,
                            Err(Errno::EINTR) => return Err(Error::Interrupted),
                            Err(e) => return Err(Error::Sys(e)),
                        }
                    };

                    let got_bytes = if ready { self.advise_readable()? } else { false };
                    if !got_bytes {
                        // Timed out, or readable but dry: force a decision
                        return self.get_key_force();
                    }
                }
            }
        }
    }

    /// Run the driver chain over `bytes`. Drivers never mutate: byte counts
    /// and the high-tide value travel back in the result.
    fn peek_at(&self, bytes: &[u8], flags: u8) -> Peek {
        if bytes.is_empty() {
            return if self.is_closed { Peek::Eof } else { Peek::None };
        }

        let mut again = false;
        for driver in &self.drivers {
            match driver.peek(self, bytes, flags) {
                key @ Peek::Key { .. } => return key,
                Peek::Eof => return Peek::Eof,
                Peek::Again => {
                    if flags & PEEK_FORCE == 0 {
                        again = true;
                    }
                }
                Peek::None => {}
            }
        }

        if again {
            return Peek::Again;
        }
        self.peek_simple(bytes, flags)
    }

    /// Everything the sequence drivers didn't absorb: Esc and Alt prefixes,
    /// multibyte text, raw bytes.
    fn peek_simple(&self, bytes: &[u8], flags: u8) -> Peek {
        if bytes.is_empty() {
            return if self.is_closed { Peek::Eof } else { Peek::None };
        }
        let b0 = bytes[0];

        if b0 == 0x1b {
            if flags & PEEK_ALT_PREFIXED != 0 {
                // We got back here recursively, so no driver asked for more
                // bytes: return the Escape itself, otherwise a run of
                // <Esc>es would read as Alt-Esc.
                return Peek::Key {
                    event: self.emit_codepoint(0x1b),
                    nbytes: 1,
                    pending: 0,
                };
            }

            if bytes.len() == 1 {
                // Might be an <Esc> press, or the start of something longer
                if flags & PEEK_FORCE == 0 {
                    return Peek::Again;
                }
                return Peek::Key {
                    event: self.emit_codepoint(0x1b),
                    nbytes: 1,
                    pending: 0,
                };
            }

            // Esc-prefixed: run the full chain on the rest, then charge the
            // Esc byte and the ALT modifier on top
            return match self.peek_at(&bytes[1..], flags | PEEK_ALT_PREFIXED) {
                Peek::Key {
                    mut event,
                    nbytes,
                    pending,
                } => {
                    event.or_mods(MOD_ALT);
                    Peek::Key {
                        event,
                        nbytes: nbytes + 1,
                        pending,
                    }
                }
                other => other,
            };
        }

        if self.flags & FLAG_RAW == 0 {
            match self.codec.decode_one(bytes) {
                Decoded::Scalar { cp, len } => Peek::Key {
                    event: self.emit_codepoint(cp),
                    nbytes: len,
                    pending: 0,
                },
                Decoded::Incomplete => {
                    if flags & PEEK_FORCE == 0 {
                        Peek::Again
                    } else {
                        // Not enough bytes for a whole character but the
                        // caller demands an answer: eat what's there and
                        // report the replacement. If the rest arrives later
                        // it will be invalid on its own anyway.
                        Peek::Key {
                            event: self.emit_codepoint(codec::REPLACEMENT),
                            nbytes: bytes.len(),
                            pending: 0,
                        }
                    }
                }
            }
        } else {
            // Raw mode: the byte is the event
            Peek::Key {
                event: Event::Key {
                    codepoint: u32::from(b0),
                    mods: 0,
                    multibyte: vec![b0],
                },
                nbytes: 1,
                pending: 0,
            }
        }
    }

    /// Turn a decoded Unicode scalar into an event: C0 remapping, DEL,
    /// canonicalization, multibyte fill.
    pub(crate) fn emit_codepoint(&self, codepoint: u32) -> Event {
        let mut ev = if codepoint == 0 {
            // NUL is Ctrl-Space as well as Ctrl-@; prefer the former
            Event::Sym {
                sym: Sym::Space,
                mods: MOD_CTRL,
            }
        } else if codepoint < 0x20 {
            let c0 = if self.flags & FLAG_NOINTERPRET == 0 {
                self.c0[codepoint as usize]
            } else {
                None
            };
            match c0 {
                Some(c0) => Event::Sym {
                    sym: c0.sym,
                    mods: c0.mod_set,
                },
                None => {
                    // Report Ctrl-letters lowercase, so Ctrl-A reads as C-a
                    // and never C-S-a; Shift doesn't compose on generic
                    // Unicode
                    let cp = if (0x01..=0x1a).contains(&codepoint) {
                        codepoint + 0x60
                    } else {
                        codepoint + 0x40
                    };
                    Event::Key {
                        codepoint: cp,
                        mods: MOD_CTRL,
                        multibyte: Vec::new(),
                    }
                }
            }
        } else if codepoint == 0x7f && self.flags & FLAG_NOINTERPRET == 0 {
            Event::Sym {
                sym: Sym::Del,
                mods: 0,
            }
        } else {
            Event::Key {
                codepoint,
                mods: 0,
                multibyte: Vec::new(),
            }
        };

        event::canonicalise(&mut ev, self.canonflags, self.codec.as_ref());

        if let Event::Key {
            codepoint,
            multibyte,
            ..
        } = &mut ev
        {
            if multibyte.is_empty() {
                *multibyte = self.codec.encode(*codepoint);
            }
        }
        ev
    }

    pub(crate) fn peek_mouse(&self, bytes: &[u8]) -> Peek {
        mouse::peek_mouse(self.mouse_proto, bytes)
    }

    /// Apply the canonicalization flags to an event in place. Idempotent.
    pub fn canonicalise(&self, ev: &mut Event) {
        event::canonicalise(ev, self.canonflags, self.codec.as_ref());
    }

    /// Compare two events under canonicalization: kind, then payload, then
    /// modifiers. The multibyte form is ignored.
    pub fn keycmp(&self, a: &Event, b: &Event) -> Ordering {
        event::keycmp(a, b, self.canonflags, self.codec.as_ref())
    }

    /// Take a mouse event apart: `(event, button, line, col)`. Button 0
    /// means no button hint (plain release).
    pub fn interpret_mouse(&self, ev: &Event) -> Option<(MouseEvent, u8, u16, u16)> {
        match *ev {
            Event::Mouse { info, x, y, .. } => {
                let (mev, btn) = mouse::interpret(info);
                Some((mev, btn, y, x))
            }
            _ => None,
        }
    }

    /// `(line, col)` of a cursor position report.
    pub fn interpret_position(&self, ev: &Event) -> Option<(u16, u16)> {
        match *ev {
            Event::Position { line, col } => Some((line, col)),
            _ => None,
        }
    }

    /// `(initial, mode, value)` of a DECRPM mode report; `initial` is the
    /// private marker byte (0 for ANSI modes, `b'?'` for DEC).
    pub fn interpret_modereport(&self, ev: &Event) -> Option<(u8, u16, u16)> {
        match *ev {
            Event::ModeReport {
                initial,
                mode,
                value,
            } => Some((initial, mode, value)),
            _ => None,
        }
    }

    /// Reparse the bytes of an [`Event::UnknownCsi`] into `(args, command)`.
    /// Only possible between receiving the event and the next decode call,
    /// while the sequence bytes are still held in the buffer.
    pub fn interpret_csi(&self, ev: &Event) -> Option<(Vec<i64>, u32)> {
        if self.buf.high_tide() == 0 {
            return None;
        }
        if !matches!(ev, Event::UnknownCsi { .. }) {
            return None;
        }
        let csi = csi::parse_csi(self.buf.bytes(), 0)?;
        Some((csi.args[..csi.nargs].to_vec(), csi.command))
    }

    /// Render an event as text, e.g. `"C-x"`, `"<M-Up>"`, `"^C"`.
    pub fn format_key(&self, ev: &Event, format: u16) -> String {
        names::format_key(self, ev, format)
    }

    /// Parse an event from text, returning it and the unconsumed remainder.
    pub fn parse_key<'a>(&self, s: &'a str, format: u16) -> Option<(Event, &'a str)> {
        names::parse_key(self, s, format)
    }

    /// The canonical name of a key symbol.
    pub fn keyname(&self, sym: Sym) -> &'static str {
        names::keyname(sym)
    }

    /// Find the sym whose name prefixes `s`; returns it and the remainder.
    pub fn lookup_keyname<'a>(&self, s: &'a str) -> Option<(Sym, &'a str)> {
        names::lookup_keyname(s, 0)
    }

    /// Resolve a whole string to a sym.
    pub fn keyname2sym(&self, s: &str) -> Option<Sym> {
        match names::lookup_keyname(s, 0) {
            Some((sym, "")) => Some(sym),
            _ => None,
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if self.is_started {
            let _ = self.stop();
        }
    }
}
