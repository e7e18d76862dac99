//! The CSI/SS3 driver: generic ECMA-48-like control sequence parsing with a
//! per-final-byte dispatch.
//!
//! The naming is loose on purpose: what terminals send back doesn't have to
//! conform to ECMA-48, and indeed doesn't. rxvt ends shifted function keys
//! with `$`, which is out of the final-byte range, so the parser accepts it
//! as a final only while everything since the intro has been a digit.
//!
//! Anything without a handler is reported as `UnknownCsi` and the sequence
//! bytes are left in the buffer (the high-tide mechanism) so the caller can
//! still take the sequence apart before the next decode.

use crate::event::{Event, KeyInfo, Sym, MOD_ALT, MOD_CTRL, MOD_SHIFT};
use crate::{Decoder, Driver, Peek, FLAG_CONVERTKP, PEEK_FORCE};

pub(crate) const MAX_ARGS: usize = 16;

pub(crate) struct Csi {
    /// Total sequence length including the intro and the final byte.
    pub len: usize,
    /// Argument values; missing entries hold the -1 sentinel.
    pub args: [i64; MAX_ARGS],
    pub nargs: usize,
    /// `private << 8 | intermediate << 16 | final`.
    pub command: u32,
}

/// Parse a control sequence starting at `introlen`. `None` means the final
/// byte hasn't arrived yet.
pub(crate) fn parse_csi(bytes: &[u8], introlen: usize) -> Option<Csi> {
    // rxvt's shifted function keys have exactly one numeric argument and no
    // private marker, which is what disambiguates their `$` ending from a
    // DECRPM report's `$y`.
    let mut allow_dollar = true;

    let mut csi_end = introlen;
    loop {
        if csi_end >= bytes.len() {
            return None;
        }
        let c = bytes[csi_end];
        if (0x40..0x80).contains(&c) || (allow_dollar && c == b'$') {
            break;
        }
        if !c.is_ascii_digit() {
            allow_dollar = false;
        }
        csi_end += 1;
    }

    let mut command = u32::from(bytes[csi_end]);
    let mut args = [-1i64; MAX_ARGS];
    let mut nargs = 0usize;
    let mut present = false;

    let mut p = introlen;
    if p < csi_end && (b'<'..=b'?').contains(&bytes[p]) {
        command |= u32::from(bytes[p]) << 8;
        p += 1;
    }

    // number;number;... — anything past the argument cap is discarded, but
    // the sequence length stands.
    while p < csi_end {
        let c = bytes[p];
        if c.is_ascii_digit() {
            if nargs < MAX_ARGS {
                if present {
                    args[nargs] = args[nargs] * 10 + i64::from(c - b'0');
                } else {
                    args[nargs] = i64::from(c - b'0');
                }
            }
            present = true;
        } else if c == b';' {
            present = false;
            nargs += 1;
        } else if (0x20..=0x2f).contains(&c) {
            command |= u32::from(c) << 16;
            break;
        }
        p += 1;
    }
    if present {
        nargs += 1;
    }

    Some(Csi {
        len: csi_end + 1,
        args,
        nargs: nargs.min(MAX_ARGS),
        command,
    })
}

fn arg_mods(args: &[i64; MAX_ARGS], nargs: usize) -> u8 {
    if nargs > 1 && args[1] != -1 {
        ((args[1] - 1) & 0xff) as u8
    } else {
        0
    }
}

fn as_u16(v: i64) -> u16 {
    v.min(0xffff) as u16
}

/// The letters reachable both as `CSI x` and `SS3 x`.
fn csi_ss3_keyinfo(final_byte: u8) -> Option<KeyInfo> {
    match final_byte {
        b'E' => Some(KeyInfo::sym(Sym::Begin)),
        b'F' => Some(KeyInfo::sym(Sym::End)),
        b'H' => Some(KeyInfo::sym(Sym::Home)),
        b'P' => Some(KeyInfo::function(1)),
        b'Q' => Some(KeyInfo::function(2)),
        b'R' => Some(KeyInfo::function(3)),
        b'S' => Some(KeyInfo::function(4)),
        b'Z' => Some(KeyInfo::sym(Sym::Tab).with_mods(MOD_SHIFT)),
        _ => None,
    }
}

/// SS3-only sequences. Capital arrows are what terminals send in application
/// cursor key mode; small letters are rxvt's Ctrl-arrows.
fn ss3_keyinfo(final_byte: u8) -> Option<KeyInfo> {
    match final_byte {
        b'A' => Some(KeyInfo::sym(Sym::Up)),
        b'B' => Some(KeyInfo::sym(Sym::Down)),
        b'C' => Some(KeyInfo::sym(Sym::Right)),
        b'D' => Some(KeyInfo::sym(Sym::Left)),
        b'a' => Some(KeyInfo::sym(Sym::Up).with_mods(MOD_CTRL)),
        b'b' => Some(KeyInfo::sym(Sym::Down).with_mods(MOD_CTRL)),
        b'c' => Some(KeyInfo::sym(Sym::Right).with_mods(MOD_CTRL)),
        b'd' => Some(KeyInfo::sym(Sym::Left).with_mods(MOD_CTRL)),
        b'M' => Some(KeyInfo::sym(Sym::KpEnter)),
        b'X' => Some(KeyInfo::sym(Sym::KpEquals)),
        b'j' => Some(KeyInfo::sym(Sym::KpMult)),
        b'k' => Some(KeyInfo::sym(Sym::KpPlus)),
        b'l' => Some(KeyInfo::sym(Sym::KpComma)),
        b'm' => Some(KeyInfo::sym(Sym::KpMinus)),
        b'n' => Some(KeyInfo::sym(Sym::KpPeriod)),
        b'o' => Some(KeyInfo::sym(Sym::KpDiv)),
        b'p' => Some(KeyInfo::sym(Sym::Kp0)),
        b'q' => Some(KeyInfo::sym(Sym::Kp1)),
        b'r' => Some(KeyInfo::sym(Sym::Kp2)),
        b's' => Some(KeyInfo::sym(Sym::Kp3)),
        b't' => Some(KeyInfo::sym(Sym::Kp4)),
        b'u' => Some(KeyInfo::sym(Sym::Kp5)),
        b'v' => Some(KeyInfo::sym(Sym::Kp6)),
        b'w' => Some(KeyInfo::sym(Sym::Kp7)),
        b'x' => Some(KeyInfo::sym(Sym::Kp8)),
        b'y' => Some(KeyInfo::sym(Sym::Kp9)),
        _ => None,
    }
}

/// The plain character a keypad key stands for, for `FLAG_CONVERTKP`.
fn ss3_kpalt(final_byte: u8) -> Option<u8> {
    match final_byte {
        b'X' => Some(b'='),
        b'j' => Some(b'*'),
        b'k' => Some(b'+'),
        b'l' => Some(b','),
        b'm' => Some(b'-'),
        b'n' => Some(b'.'),
        b'o' => Some(b'/'),
        b'p'..=b'y' => Some(b'0' + (final_byte - b'p')),
        _ => None,
    }
}

/// `CSI number ~` function keys. The table has gaps where xterm skipped
/// numbers.
fn csifunc_keyinfo(n: i64) -> Option<KeyInfo> {
    match n {
        1 => Some(KeyInfo::sym(Sym::Find)),
        2 => Some(KeyInfo::sym(Sym::Insert)),
        3 => Some(KeyInfo::sym(Sym::Delete)),
        4 => Some(KeyInfo::sym(Sym::Select)),
        5 => Some(KeyInfo::sym(Sym::PageUp)),
        6 => Some(KeyInfo::sym(Sym::PageDown)),
        7 => Some(KeyInfo::sym(Sym::Home)),
        8 => Some(KeyInfo::sym(Sym::End)),
        11..=15 => Some(KeyInfo::function((n - 10) as i32)),
        17..=21 => Some(KeyInfo::function((n - 11) as i32)),
        23..=26 => Some(KeyInfo::function((n - 12) as i32)),
        28 | 29 => Some(KeyInfo::function((n - 13) as i32)),
        31..=34 => Some(KeyInfo::function((n - 14) as i32)),
        _ => None,
    }
}

fn csifunc(dec: &Decoder, args: &[i64; MAX_ARGS], nargs: usize) -> Option<Event> {
    let mods = arg_mods(args, nargs);

    if args[0] == 27 {
        // The Unicode scalar rides in the third argument; the emission path
        // may assign modifiers of its own (C0 remapping), which the explicit
        // ones are OR-ed back over.
        if nargs < 3 || args[2] < 0 {
            return None;
        }
        let mut ev = dec.emit_codepoint(args[2] as u32);
        ev.or_mods(mods);
        Some(ev)
    } else {
        csifunc_keyinfo(args[0]).map(|info| info.apply(mods))
    }
}

fn dispatch(dec: &Decoder, csi: &Csi) -> Option<Event> {
    let args = &csi.args;
    let nargs = csi.nargs;
    let final_byte = (csi.command & 0xff) as u8;

    match final_byte {
        // Cursor keys without an argument are usually Ctrl-modified; when
        // they aren't (urxvt) the plain form is declared in terminfo and the
        // trie takes it first. xterm spells modifiers out in the argument.
        b'A' | b'B' | b'C' | b'D' => {
            let mods = if nargs > 1 && args[1] != -1 {
                arg_mods(args, nargs)
            } else {
                MOD_CTRL
            };
            let sym = match final_byte {
                b'A' => Sym::Up,
                b'B' => Sym::Down,
                b'C' => Sym::Right,
                _ => Sym::Left,
            };
            Some(Event::Sym { sym, mods })
        }

        // CSI with a small letter is rxvt for Shift
        b'a' | b'b' | b'c' | b'd' => {
            let sym = match final_byte {
                b'a' => Sym::Up,
                b'b' => Sym::Down,
                b'c' => Sym::Right,
                _ => Sym::Left,
            };
            Some(Event::Sym {
                sym,
                mods: MOD_SHIFT,
            })
        }

        // A plain CSI R with no arguments is actually <F3>
        b'R' if csi.command == u32::from(b'R') | (u32::from(b'?') << 8) => {
            if nargs < 2 {
                return None;
            }
            Some(Event::Position {
                line: as_u16(args[0] - 1),
                col: as_u16(args[1] - 1),
            })
        }

        b'E' | b'F' | b'H' | b'P' | b'Q' | b'R' | b'S' | b'Z' => {
            csi_ss3_keyinfo(final_byte).map(|info| info.apply(arg_mods(args, nargs)))
        }

        b'~' => csifunc(dec, args, nargs),

        // rxvt emits these instead of ~ when holding modifiers
        b'^' => csifunc(dec, args, nargs).map(|mut ev| {
            ev.or_mods(MOD_CTRL);
            ev
        }),
        b'$' => csifunc(dec, args, nargs).map(|mut ev| {
            ev.or_mods(MOD_SHIFT);
            ev
        }),
        b'@' => csifunc(dec, args, nargs).map(|mut ev| {
            ev.or_mods(MOD_CTRL | MOD_SHIFT);
            ev
        }),

        // CSI u extended Unicode keys
        b'u' if csi.command == u32::from(b'u') => {
            if nargs < 1 || args[0] < 0 {
                return None;
            }
            let mods = arg_mods(args, nargs);
            let mut ev = dec.emit_codepoint(args[0] as u32);
            ev.or_mods(mods);
            Some(ev)
        }

        // SGR and rxvt mouse; the X10 form was taken care of before dispatch
        b'M' | b'm' => {
            let initial = csi.command >> 8;

            if initial == 0 && nargs >= 3 {
                // rxvt protocol
                let mut info = (args[0] - 0x20) as u16;
                let mods = ((info & 0x1c) >> 2) as u8;
                info &= !0x1c;
                Some(Event::Mouse {
                    info,
                    x: as_u16(args[1] - 1),
                    y: as_u16(args[2] - 1),
                    mods,
                })
            } else if initial == u32::from(b'<') && nargs >= 3 {
                // SGR protocol
                let mut info = args[0] as u16;
                let mods = ((info & 0x1c) >> 2) as u8;
                info &= !0x1c;
                if final_byte == b'm' {
                    // release
                    info |= 0x8000;
                }
                Some(Event::Mouse {
                    info,
                    x: as_u16(args[1] - 1),
                    y: as_u16(args[2] - 1),
                    mods,
                })
            } else {
                None
            }
        }

        b'I' => Some(Event::Focus { gained: true }),
        b'O' => Some(Event::Focus { gained: false }),

        // DECRPM: CSI ? mode ; value $ y
        b'y' => {
            let intermediate = (csi.command >> 16) & 0xff;
            let private = (csi.command >> 8) & 0xff;
            if intermediate != u32::from(b'$')
                || (private != 0 && private != u32::from(b'?'))
                || nargs < 2
            {
                return None;
            }
            Some(Event::ModeReport {
                initial: private as u8,
                mode: as_u16(args[0]),
                value: as_u16(args[1]),
            })
        }

        _ => None,
    }
}

pub(crate) struct CsiDriver;

impl CsiDriver {
    fn peek_csi(&self, dec: &Decoder, bytes: &[u8], introlen: usize, flags: u8) -> Peek {
        let csi = match parse_csi(bytes, introlen) {
            Some(csi) => csi,
            None => {
                if flags & PEEK_FORCE == 0 {
                    return Peek::Again;
                }
                // Incomplete and the caller wants an answer now: report the
                // intro as Alt-[ and let the rest re-enter the chain.
                let mut ev = dec.emit_codepoint(u32::from(b'['));
                ev.or_mods(MOD_ALT);
                return Peek::Key {
                    event: ev,
                    nbytes: introlen,
                    pending: 0,
                };
            }
        };

        // A bare CSI M is X10 mouse: the report rides in the next 3 bytes
        // (or more under the 1005 protocol)
        if csi.command == u32::from(b'M') && csi.nargs < 3 {
            return match dec.peek_mouse(&bytes[csi.len..]) {
                Peek::Key {
                    event,
                    nbytes,
                    pending,
                } => Peek::Key {
                    event,
                    nbytes: nbytes + csi.len,
                    pending,
                },
                other => other,
            };
        }

        match dispatch(dec, &csi) {
            Some(event) => Peek::Key {
                event,
                nbytes: csi.len,
                pending: 0,
            },
            None => {
                debug!(
                    "unknown CSI sequence, final byte {:?}",
                    (csi.command & 0xff) as u8 as char
                );
                // Report the intro consumed but keep the payload readable
                // until the event is acted on.
                Peek::Key {
                    event: Event::UnknownCsi {
                        command: csi.command,
                    },
                    nbytes: introlen,
                    pending: csi.len - introlen,
                }
            }
        }
    }

    fn peek_ss3(&self, dec: &Decoder, bytes: &[u8], introlen: usize, flags: u8) -> Peek {
        if bytes.len() < introlen + 1 {
            if flags & PEEK_FORCE == 0 {
                return Peek::Again;
            }
            let mut ev = dec.emit_codepoint(u32::from(b'O'));
            ev.or_mods(MOD_ALT);
            return Peek::Key {
                event: ev,
                nbytes: bytes.len(),
                pending: 0,
            };
        }

        let cmd = bytes[introlen];
        if !(0x40..0x80).contains(&cmd) {
            return Peek::None;
        }

        let event = match ss3_keyinfo(cmd) {
            Some(info) => {
                if dec.flags() & FLAG_CONVERTKP != 0 {
                    if let Some(alt) = ss3_kpalt(cmd) {
                        return Peek::Key {
                            event: Event::Key {
                                codepoint: u32::from(alt),
                                mods: 0,
                                multibyte: vec![alt],
                            },
                            nbytes: introlen + 1,
                            pending: 0,
                        };
                    }
                }
                info.apply(0)
            }
            None => match csi_ss3_keyinfo(cmd) {
                Some(info) => info.apply(0),
                None => return Peek::None,
            },
        };

        Peek::Key {
            event,
            nbytes: introlen + 1,
            pending: 0,
        }
    }
}

impl Driver for CsiDriver {
    fn peek(&self, dec: &Decoder, bytes: &[u8], flags: u8) -> Peek {
        if bytes.is_empty() {
            return Peek::None;
        }

        match bytes[0] {
            0x1b if bytes.len() == 1 => Peek::Again,
            0x1b => match bytes[1] {
                b'[' => self.peek_csi(dec, bytes, 2, flags),
                b'O' => self.peek_ss3(dec, bytes, 2, flags),
                _ => Peek::None,
            },
            0x9b => self.peek_csi(dec, bytes, 1, flags),
            0x8f => self.peek_ss3(dec, bytes, 1, flags),
            _ => Peek::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(bytes: &[u8]) -> Csi {
        parse_csi(bytes, 2).expect("sequence should be complete")
    }

    #[test]
    fn args_and_final() {
        let csi = parsed(b"\x1b[1;3A");
        assert_eq!(csi.command, u32::from(b'A'));
        assert_eq!(csi.nargs, 2);
        assert_eq!(&csi.args[..2], &[1, 3]);
        assert_eq!(csi.len, 6);
    }

    #[test]
    fn missing_args_are_sentinels() {
        let csi = parsed(b"\x1b[;5H");
        assert_eq!(csi.nargs, 2);
        assert_eq!(&csi.args[..2], &[-1, 5]);
    }

    #[test]
    fn private_marker_packs_into_command() {
        let csi = parsed(b"\x1b[?15;7R");
        assert_eq!(csi.command, u32::from(b'R') | (u32::from(b'?') << 8));
        assert_eq!(csi.nargs, 2);
        assert_eq!(&csi.args[..2], &[15, 7]);
    }

    #[test]
    fn intermediate_packs_into_command() {
        let csi = parsed(b"\x1b[?1;2$y");
        assert_eq!(
            csi.command,
            u32::from(b'y') | (u32::from(b'?') << 8) | (u32::from(b'$') << 16)
        );
    }

    #[test]
    fn dollar_final_only_after_digits() {
        // rxvt shifted function key: digits only, $ ends the sequence
        let csi = parsed(b"\x1b[23$");
        assert_eq!(csi.command, u32::from(b'$'));
        assert_eq!(&csi.args[..1], &[23]);

        // A semicolon kills the rxvt interpretation, so the $ here is the
        // DECRPM intermediate and y is the final
        let csi = parsed(b"\x1b[1;2$y");
        assert_eq!(
            csi.command,
            u32::from(b'y') | (u32::from(b'$') << 16)
        );
    }

    #[test]
    fn incomplete_sequence_returns_none() {
        assert!(parse_csi(b"\x1b[1;2", 2).is_none());
        assert!(parse_csi(b"\x1b[", 2).is_none());
    }

    #[test]
    fn argument_cap_discards_overflow() {
        let mut seq = b"\x1b[".to_vec();
        for i in 0..20 {
            if i > 0 {
                seq.push(b';');
            }
            seq.push(b'9');
        }
        seq.push(b'z');
        let csi = parse_csi(&seq, 2).expect("complete");
        assert_eq!(csi.nargs, MAX_ARGS);
        assert_eq!(csi.command, u32::from(b'z'));
        assert!(csi.args.iter().all(|&a| a == 9));
    }

    #[test]
    fn csifunc_table_gaps() {
        assert_eq!(csifunc_keyinfo(15), Some(KeyInfo::function(5)));
        assert_eq!(csifunc_keyinfo(16), None);
        assert_eq!(csifunc_keyinfo(17), Some(KeyInfo::function(6)));
        assert_eq!(csifunc_keyinfo(21), Some(KeyInfo::function(10)));
        assert_eq!(csifunc_keyinfo(22), None);
        assert_eq!(csifunc_keyinfo(34), Some(KeyInfo::function(20)));
        assert_eq!(csifunc_keyinfo(35), None);
    }

    #[test]
    fn kpalt_table() {
        assert_eq!(ss3_kpalt(b'M'), None);
        assert_eq!(ss3_kpalt(b'X'), Some(b'='));
        assert_eq!(ss3_kpalt(b'p'), Some(b'0'));
        assert_eq!(ss3_kpalt(b'y'), Some(b'9'));
    }
}
