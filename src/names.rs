//! Human-readable key names: the sym↔name table and the textual
//! formatting/parsing of whole events ("Ctrl-x", "<M-Up>", "^C", "page up").

use crate::codec::{parse_utf8_strict, Utf8Parse};
use crate::event::{canonicalise, Event, Sym, MOD_ALT, MOD_CTRL, MOD_SHIFT};
use crate::Decoder;

/// `Shift-` instead of `S-`.
pub const FORMAT_LONGMOD: u16 = 1 << 0;
/// `^X` instead of `C-X`.
pub const FORMAT_CARETCTRL: u16 = 1 << 1;
/// `Meta-` or `M-` instead of `Alt-` or `A-`.
pub const FORMAT_ALTISMETA: u16 = 1 << 2;
/// Wrap special keys in brackets like `<Escape>`.
pub const FORMAT_WRAPBRACKET: u16 = 1 << 3;
/// `M Foo` instead of `M-Foo`.
pub const FORMAT_SPACEMOD: u16 = 1 << 4;
/// `meta` or `m` instead of `Meta` or `M`.
pub const FORMAT_LOWERMOD: u16 = 1 << 5;
/// `page down` instead of `PageDown`.
pub const FORMAT_LOWERSPACE: u16 = 1 << 6;
/// Include the mouse position if relevant: `@ (col,line)`.
pub const FORMAT_MOUSE_POS: u16 = 1 << 8;

/// The format vim uses in its documentation.
pub const FORMAT_VIM: u16 = FORMAT_ALTISMETA | FORMAT_WRAPBRACKET;
/// The format urwid uses.
pub const FORMAT_URWID: u16 =
    FORMAT_LONGMOD | FORMAT_ALTISMETA | FORMAT_LOWERMOD | FORMAT_SPACEMOD | FORMAT_LOWERSPACE;

// Indexed by Sym discriminant; the order must stay in sync with the enum.
static KEYNAMES: &[(Sym, &str)] = &[
    (Sym::Backspace, "Backspace"),
    (Sym::Tab, "Tab"),
    (Sym::Enter, "Enter"),
    (Sym::Escape, "Escape"),
    (Sym::Space, "Space"),
    (Sym::Del, "DEL"),
    (Sym::Up, "Up"),
    (Sym::Down, "Down"),
    (Sym::Left, "Left"),
    (Sym::Right, "Right"),
    (Sym::Begin, "Begin"),
    (Sym::Find, "Find"),
    (Sym::Insert, "Insert"),
    (Sym::Delete, "Delete"),
    (Sym::Select, "Select"),
    (Sym::PageUp, "PageUp"),
    (Sym::PageDown, "PageDown"),
    (Sym::Home, "Home"),
    (Sym::End, "End"),
    (Sym::Cancel, "Cancel"),
    (Sym::Clear, "Clear"),
    (Sym::Close, "Close"),
    (Sym::Command, "Command"),
    (Sym::Copy, "Copy"),
    (Sym::Exit, "Exit"),
    (Sym::Help, "Help"),
    (Sym::Mark, "Mark"),
    (Sym::Message, "Message"),
    (Sym::Move, "Move"),
    (Sym::Open, "Open"),
    (Sym::Options, "Options"),
    (Sym::Print, "Print"),
    (Sym::Redo, "Redo"),
    (Sym::Reference, "Reference"),
    (Sym::Refresh, "Refresh"),
    (Sym::Replace, "Replace"),
    (Sym::Restart, "Restart"),
    (Sym::Resume, "Resume"),
    (Sym::Save, "Save"),
    (Sym::Suspend, "Suspend"),
    (Sym::Undo, "Undo"),
    (Sym::Kp0, "KP0"),
    (Sym::Kp1, "KP1"),
    (Sym::Kp2, "KP2"),
    (Sym::Kp3, "KP3"),
    (Sym::Kp4, "KP4"),
    (Sym::Kp5, "KP5"),
    (Sym::Kp6, "KP6"),
    (Sym::Kp7, "KP7"),
    (Sym::Kp8, "KP8"),
    (Sym::Kp9, "KP9"),
    (Sym::KpEnter, "KPEnter"),
    (Sym::KpPlus, "KPPlus"),
    (Sym::KpMinus, "KPMinus"),
    (Sym::KpMult, "KPMult"),
    (Sym::KpDiv, "KPDiv"),
    (Sym::KpComma, "KPComma"),
    (Sym::KpPeriod, "KPPeriod"),
    (Sym::KpEquals, "KPEquals"),
];

pub(crate) fn keyname(sym: Sym) -> &'static str {
    let entry = KEYNAMES[sym as u16 as usize];
    debug_assert_eq!(entry.0, sym);
    entry.1
}

/// Find the key whose name is a prefix of `str`, returning the remainder.
/// First table entry wins, which resolves "Up" against "UpMore"-style
/// ambiguity the same way every time.
pub(crate) fn lookup_keyname<'a>(s: &'a str, format: u16) -> Option<(Sym, &'a str)> {
    for &(sym, name) in KEYNAMES {
        if format & FORMAT_LOWERSPACE != 0 {
            if let Some(rest) = match_camel(s, name) {
                return Some((sym, rest));
            }
        } else if let Some(rest) = s.strip_prefix(name) {
            return Some((sym, rest));
        }
    }
    None
}

struct ModNames {
    shift: &'static str,
    alt: &'static str,
    ctrl: &'static str,
}

static MODNAMES: &[ModNames] = &[
    ModNames { shift: "S", alt: "A", ctrl: "C" },
    ModNames { shift: "Shift", alt: "Alt", ctrl: "Ctrl" },
    ModNames { shift: "S", alt: "M", ctrl: "C" },
    ModNames { shift: "Shift", alt: "Meta", ctrl: "Ctrl" },
    ModNames { shift: "s", alt: "a", ctrl: "c" },
    ModNames { shift: "shift", alt: "alt", ctrl: "ctrl" },
    ModNames { shift: "s", alt: "m", ctrl: "c" },
    ModNames { shift: "shift", alt: "meta", ctrl: "ctrl" },
];

fn modnames(format: u16) -> &'static ModNames {
    let idx = usize::from(format & FORMAT_LONGMOD != 0)
        + 2 * usize::from(format & FORMAT_ALTISMETA != 0)
        + 4 * usize::from(format & FORMAT_LOWERMOD != 0);
    &MODNAMES[idx]
}

/// "PageUp" -> "page up".
fn camel_to_spaces(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Match "page up" (in `s`) against "PageUp" (in `camel`), returning the
/// remainder of `s`.
fn match_camel<'a>(s: &'a str, camel: &str) -> Option<&'a str> {
    let mut rest = s;
    let mut prev_lower = false;
    for c in camel.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            rest = rest.strip_prefix(' ')?;
        }
        rest = rest.strip_prefix(c.to_ascii_lowercase())?;
        prev_lower = c.is_ascii_lowercase();
    }
    Some(rest)
}

pub(crate) fn format_key(dec: &Decoder, ev: &Event, format: u16) -> String {
    let mods = modnames(format);
    let wrap = format & FORMAT_WRAPBRACKET != 0
        && (!matches!(ev, Event::Key { .. }) || ev.mods() != 0);
    let sep = if format & FORMAT_SPACEMOD != 0 { ' ' } else { '-' };

    let mut out = String::new();

    if format & FORMAT_CARETCTRL != 0 {
        if let Event::Key {
            codepoint,
            mods: MOD_CTRL,
            ..
        } = *ev
        {
            let caret = if (0x61..=0x7a).contains(&codepoint) {
                // lowercase letter: print the uppercase caret form
                Some((codepoint - 0x20) as u8 as char)
            } else if codepoint == 0x40 || (0x5b..=0x5f).contains(&codepoint) {
                Some(codepoint as u8 as char)
            } else {
                None
            };
            if let Some(c) = caret {
                if wrap {
                    return format!("<^{}>", c);
                }
                return format!("^{}", c);
            }
        }
    }

    if wrap {
        out.push('<');
    }

    let m = ev.mods();
    if m & MOD_ALT != 0 {
        out.push_str(mods.alt);
        out.push(sep);
    }
    if m & MOD_CTRL != 0 {
        out.push_str(mods.ctrl);
        out.push(sep);
    }
    if m & MOD_SHIFT != 0 {
        out.push_str(mods.shift);
        out.push(sep);
    }

    match ev {
        Event::Key { codepoint, .. } => match char::from_u32(*codepoint) {
            Some(c) => out.push(c),
            None => out.push('?'),
        },
        Event::Sym { sym, .. } => {
            if format & FORMAT_LOWERSPACE != 0 {
                out.push_str(&camel_to_spaces(keyname(*sym)));
            } else {
                out.push_str(keyname(*sym));
            }
        }
        Event::Function { num, .. } => {
            let f = if format & FORMAT_LOWERSPACE != 0 { 'f' } else { 'F' };
            out.push(f);
            out.push_str(&num.to_string());
        }
        Event::Mouse { .. } => {
            static EVNAMES: [&str; 4] = ["Unknown", "Press", "Drag", "Release"];
            if let Some((mev, btn, line, col)) = dec.interpret_mouse(ev) {
                out.push_str(&format!("Mouse{}({})", EVNAMES[mev as usize], btn));
                if format & FORMAT_MOUSE_POS != 0 {
                    out.push_str(&format!(" @ ({},{})", col, line));
                }
            }
        }
        Event::Focus { gained } => {
            out.push_str(&format!("Focus({})", u8::from(*gained)));
        }
        Event::Position { .. } => out.push_str("Position"),
        Event::ModeReport {
            initial,
            mode,
            value,
        } => {
            if *initial != 0 {
                out.push_str(&format!("Mode({}{}={})", *initial as char, mode, value));
            } else {
                out.push_str(&format!("Mode({}={})", mode, value));
            }
        }
        Event::UnknownCsi { command } => {
            out.push_str(&format!("CSI {}", (command & 0xff) as u8 as char));
        }
    }

    if wrap {
        out.push('>');
    }
    out
}

pub(crate) fn parse_key<'a>(dec: &Decoder, s: &'a str, format: u16) -> Option<(Event, &'a str)> {
    if s.is_empty() {
        return None;
    }

    if format & FORMAT_CARETCTRL != 0 {
        if let Some(stripped) = s.strip_prefix('^') {
            if !stripped.is_empty() {
                let (mut ev, rest) = parse_key(dec, stripped, format & !FORMAT_CARETCTRL)?;
                match &mut ev {
                    Event::Key {
                        codepoint,
                        mods,
                        multibyte,
                    } if *mods == 0 && (0x40..=0x5f).contains(codepoint) => {
                        if (0x41..=0x5a).contains(codepoint) {
                            *codepoint += 0x20;
                        }
                        *mods = MOD_CTRL;
                        *multibyte = dec.codec().encode(*codepoint);
                    }
                    _ => return None,
                }
                return Some((ev, rest));
            }
        }
    }

    let mods = modnames(format);
    let sep = if format & FORMAT_SPACEMOD != 0 { ' ' } else { '-' };

    let mut m = 0u8;
    let mut s = s;
    while let Some(at) = s.find(sep) {
        let word = &s[..at];
        if word == mods.alt {
            m |= MOD_ALT;
        } else if word == mods.ctrl {
            m |= MOD_CTRL;
        } else if word == mods.shift {
            m |= MOD_SHIFT;
        } else {
            break;
        }
        s = &s[at + 1..];
    }

    let mut ev;
    if let Some((sym, rest)) = lookup_keyname(s, format) {
        ev = Event::Sym { sym, mods: m };
        s = rest;
    } else if let Some(rest) = s.strip_prefix('F') {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let num = rest[..digits].parse::<i32>().ok()?;
        ev = Event::Function { num, mods: m };
        s = &rest[digits..];
    } else {
        // A codepoint must come last, it matches almost anything
        match parse_utf8_strict(s.as_bytes()) {
            Utf8Parse::Scalar { cp, len } => {
                ev = Event::Key {
                    codepoint: cp,
                    mods: m,
                    multibyte: dec.codec().encode(cp),
                };
                s = &s[len..];
            }
            Utf8Parse::Incomplete => return None,
        }
    }

    canonicalise(&mut ev, dec.canonflags(), dec.codec());
    Some((ev, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyname_table_matches_enum_order() {
        for (i, &(sym, _)) in KEYNAMES.iter().enumerate() {
            assert_eq!(sym as u16 as usize, i);
        }
    }

    #[test]
    fn keyname_lookup_and_remainder() {
        assert_eq!(lookup_keyname("Up", 0), Some((Sym::Up, "")));
        assert_eq!(lookup_keyname("DownMore", 0), Some((Sym::Down, "More")));
        assert_eq!(lookup_keyname("SomeUnknownKey", 0), None);
    }

    #[test]
    fn camel_and_spaces() {
        assert_eq!(camel_to_spaces("PageUp"), "page up");
        assert_eq!(camel_to_spaces("Up"), "up");
        assert_eq!(camel_to_spaces("KPEnter"), "kpenter");

        assert_eq!(match_camel("page up", "PageUp"), Some(""));
        assert_eq!(match_camel("page uptrail", "PageUp"), Some("trail"));
        assert_eq!(match_camel("pageup", "PageUp"), None);
    }

    #[test]
    fn lowerspace_lookup() {
        assert_eq!(
            lookup_keyname("page down", FORMAT_LOWERSPACE),
            Some((Sym::PageDown, ""))
        );
    }
}
