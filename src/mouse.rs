//! Mouse report decoding.
//!
//! Three wire formats end up in the same opaque `Event::Mouse`: the X10
//! 3-byte form that follows `CSI M`, the UTF-8 extended (1005) variant of the
//! same, and the SGR/rxvt forms whose values arrive as ordinary CSI
//! arguments and are handled in the CSI driver. Interpretation of the packed
//! `info` field is separate so the event stays cheap to pass around.

use crate::codec::{parse_utf8, Utf8Parse, UTF8_INVALID};
use crate::event::Event;
use crate::Peek;

/// Which protocol the terminal is assumed to speak. The extended protocols
/// all build on the VT200 base; `None` disables mouse decoding entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseProto {
    None,
    /// X10/VT200 3-byte reports.
    Vt200,
    /// VT200 with UTF-8 encoded values (DECSET 1005).
    Utf8,
    /// SGR reports, `CSI < b;x;y M/m` (DECSET 1006).
    Sgr,
    /// rxvt decimal reports, `CSI b;x;y M` (DECSET 1015).
    Rxvt,
}

/// What to track, configuration state for the host. The decoder itself
/// accepts whatever the terminal sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseTracking {
    Click,
    Drag,
    Any,
}

/// An interpreted mouse event kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEvent {
    Unknown,
    Press,
    Drag,
    Release,
}

/// Decode an X10 (or, under [`MouseProto::Utf8`], a 1005) payload that
/// follows a mouse intro. `bytes` starts right after the intro.
pub(crate) fn peek_mouse(proto: MouseProto, bytes: &[u8]) -> Peek {
    let (b, x, y, nbytes);

    if proto == MouseProto::Utf8 {
        let mut pos = 0;
        let mut vals = [0u32; 3];
        for val in &mut vals {
            match parse_1005_value(&bytes[pos..]) {
                Some((v, n)) => {
                    *val = v;
                    pos += n;
                }
                None => return Peek::Again,
            }
        }
        b = vals[0];
        x = vals[1];
        y = vals[2];
        nbytes = pos;
    } else {
        if bytes.len() < 3 {
            return Peek::Again;
        }
        b = u32::from(bytes[0]);
        x = u32::from(bytes[1]);
        y = u32::from(bytes[2]);
        nbytes = 3;
    }

    let mut info = b.wrapping_sub(0x20) as u16;
    let mods = ((info & 0x1c) >> 2) as u8;
    info &= !0x1c;

    let event = Event::Mouse {
        info,
        x: x.wrapping_sub(0x21) as u16,
        y: y.wrapping_sub(0x21) as u16,
        mods,
    };
    Peek::Key {
        event,
        nbytes,
        pending: 0,
    }
}

/// One 1005 value: a UTF-8 scalar, with invalid input mapped to 0x20 so a
/// desynchronized report degrades into "no button, no movement" instead of
/// eating the stream. Returns `None` when more bytes are needed.
fn parse_1005_value(bytes: &[u8]) -> Option<(u32, usize)> {
    if bytes.is_empty() {
        return None;
    }
    match parse_utf8(bytes) {
        Utf8Parse::Incomplete => None,
        Utf8Parse::Scalar { cp, len } => {
            let cp = if cp == UTF8_INVALID { 0x20 } else { cp };
            Some((cp, len))
        }
    }
}

/// Take a packed `info` field apart into event kind and button number.
/// Button 0 means "no button hint" (plain release).
pub(crate) fn interpret(info: u16) -> (MouseEvent, u8) {
    let drag = info & 0x20 != 0;
    let code = info & !0x3c;

    let (ev, btn) = match code {
        0 | 1 | 2 => (
            if drag { MouseEvent::Drag } else { MouseEvent::Press },
            (code + 1) as u8,
        ),
        3 => (MouseEvent::Release, 0),
        64 | 65 => (
            if drag { MouseEvent::Drag } else { MouseEvent::Press },
            (code + 4 - 64) as u8,
        ),
        _ => (MouseEvent::Unknown, 0),
    };

    if info & 0x8000 != 0 {
        (MouseEvent::Release, btn)
    } else {
        (ev, btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_x10(bytes: &[u8]) -> Event {
        match peek_mouse(MouseProto::Vt200, bytes) {
            Peek::Key { event, nbytes, .. } => {
                assert_eq!(nbytes, 3);
                event
            }
            other => panic!("expected a key, got {:?}", other),
        }
    }

    #[test]
    fn x10_press_at_origin() {
        let ev = decode_x10(b" !!");
        assert_eq!(
            ev,
            Event::Mouse {
                info: 0,
                x: 0,
                y: 0,
                mods: 0
            }
        );
        if let Event::Mouse { info, .. } = ev {
            assert_eq!(interpret(info), (MouseEvent::Press, 1));
        }
    }

    #[test]
    fn x10_modifiers_are_extracted_and_cleared() {
        // 0x30 = 0x20 + button 0 + ctrl bit (0x10)
        let ev = decode_x10(b"0++");
        assert_eq!(
            ev,
            Event::Mouse {
                info: 0,
                x: 10,
                y: 10,
                mods: crate::MOD_CTRL
            }
        );
    }

    #[test]
    fn x10_short_payload_wants_more() {
        assert!(matches!(peek_mouse(MouseProto::Vt200, b" !"), Peek::Again));
    }

    #[test]
    fn utf8_payload_reads_scalars() {
        // 0xC2 0xA1 = U+00A1; column 0xA1 - 0x21 = 0x80
        let bytes = b" \xC2\xA1!";
        match peek_mouse(MouseProto::Utf8, bytes) {
            Peek::Key { event, nbytes, .. } => {
                assert_eq!(nbytes, 4);
                assert_eq!(
                    event,
                    Event::Mouse {
                        info: 0,
                        x: 0x80,
                        y: 0,
                        mods: 0
                    }
                );
            }
            other => panic!("expected a key, got {:?}", other),
        }
    }

    #[test]
    fn utf8_invalid_scalar_degrades_to_origin() {
        // A continuation byte on its own becomes 0x20: no movement.
        match peek_mouse(MouseProto::Utf8, b" \x80!") {
            Peek::Key { event, .. } => {
                assert_eq!(
                    event,
                    Event::Mouse {
                        info: 0,
                        x: 0xffff,
                        y: 0,
                        mods: 0
                    }
                );
            }
            other => panic!("expected a key, got {:?}", other),
        }
    }

    #[test]
    fn utf8_partial_scalar_wants_more() {
        assert!(matches!(peek_mouse(MouseProto::Utf8, b" \xC2"), Peek::Again));
    }

    #[test]
    fn interpret_wheel_and_release() {
        assert_eq!(interpret(64), (MouseEvent::Press, 4));
        assert_eq!(interpret(65 | 0x20), (MouseEvent::Drag, 5));
        assert_eq!(interpret(3), (MouseEvent::Release, 0));
        // SGR release bit wins over everything; the button hint is lost
        assert_eq!(interpret(0x8000), (MouseEvent::Release, 0));
        assert_eq!(interpret(1 | 0x8000), (MouseEvent::Release, 0));
    }
}
