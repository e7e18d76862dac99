//! The event model: everything a terminal can send us, as one tagged union.

use std::cmp::Ordering;

use crate::codec::Codec;

/// Shift was held.
pub const MOD_SHIFT: u8 = 1 << 0;
/// Alt (or Meta) was held.
pub const MOD_ALT: u8 = 1 << 1;
/// Ctrl was held.
pub const MOD_CTRL: u8 = 1 << 2;

/// Space is reported as `Sym::Space` rather than `Key(0x20)`.
pub const CANON_SPACESYMBOL: u8 = 1 << 0;
/// `Sym::Del` is rewritten to `Sym::Backspace`.
pub const CANON_DELBS: u8 = 1 << 1;

/// A named key. The discriminant doubles as the index into the keyname table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Sym {
    // Special names in C0
    Backspace,
    Tab,
    Enter,
    Escape,

    // Special names in G0
    Space,
    Del,

    // Special keys
    Up,
    Down,
    Left,
    Right,
    Begin,
    Find,
    Insert,
    Delete,
    Select,
    PageUp,
    PageDown,
    Home,
    End,

    // Special keys from terminfo
    Cancel,
    Clear,
    Close,
    Command,
    Copy,
    Exit,
    Help,
    Mark,
    Message,
    Move,
    Open,
    Options,
    Print,
    Redo,
    Reference,
    Refresh,
    Replace,
    Restart,
    Resume,
    Save,
    Suspend,
    Undo,

    // Numeric keypad special keys
    Kp0,
    Kp1,
    Kp2,
    Kp3,
    Kp4,
    Kp5,
    Kp6,
    Kp7,
    Kp8,
    Kp9,
    KpEnter,
    KpPlus,
    KpMinus,
    KpMult,
    KpDiv,
    KpComma,
    KpPeriod,
    KpEquals,
}

/// One decoded input event.
///
/// `Key` carries the Unicode scalar plus its multibyte form in the session
/// encoding. `Mouse` is opaque wire data; see [`crate::Decoder::interpret_mouse`].
/// `UnknownCsi` keeps the sequence bytes in the input buffer until the next
/// decode call so [`crate::Decoder::interpret_csi`] can still take it apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Key {
        codepoint: u32,
        mods: u8,
        multibyte: Vec<u8>,
    },
    Sym {
        sym: Sym,
        mods: u8,
    },
    Function {
        num: i32,
        mods: u8,
    },
    Mouse {
        info: u16,
        x: u16,
        y: u16,
        mods: u8,
    },
    Focus {
        gained: bool,
    },
    Position {
        line: u16,
        col: u16,
    },
    ModeReport {
        initial: u8,
        mode: u16,
        value: u16,
    },
    UnknownCsi {
        command: u32,
    },
}

impl Event {
    /// The modifier bits, zero for event kinds that don't carry any.
    pub fn mods(&self) -> u8 {
        match self {
            Event::Key { mods, .. }
            | Event::Sym { mods, .. }
            | Event::Function { mods, .. }
            | Event::Mouse { mods, .. } => *mods,
            _ => 0,
        }
    }

    pub(crate) fn or_mods(&mut self, extra: u8) {
        match self {
            Event::Key { mods, .. }
            | Event::Sym { mods, .. }
            | Event::Function { mods, .. }
            | Event::Mouse { mods, .. } => *mods |= extra,
            _ => {}
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Event::Key { .. } => 0,
            Event::Function { .. } => 1,
            Event::Sym { .. } => 2,
            Event::Mouse { .. } => 3,
            Event::Focus { .. } => 4,
            Event::Position { .. } => 5,
            Event::ModeReport { .. } => 6,
            Event::UnknownCsi { .. } => 7,
        }
    }
}

/// The event template a byte sequence or final byte maps to. `mod_mask` is
/// cleared from the wire-derived modifiers before `mod_set` is OR-ed in, so
/// e.g. Shift-Tab can force SHIFT even when the argument omits it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KeyInfo {
    pub kind: KeyKind,
    pub mod_set: u8,
    pub mod_mask: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyKind {
    Sym(Sym),
    Function(i32),
}

impl KeyInfo {
    pub(crate) const fn sym(sym: Sym) -> KeyInfo {
        KeyInfo {
            kind: KeyKind::Sym(sym),
            mod_set: 0,
            mod_mask: 0,
        }
    }

    pub(crate) const fn function(num: i32) -> KeyInfo {
        KeyInfo {
            kind: KeyKind::Function(num),
            mod_set: 0,
            mod_mask: 0,
        }
    }

    pub(crate) const fn with_mods(mut self, mods: u8) -> KeyInfo {
        self.mod_set = mods;
        self.mod_mask = mods;
        self
    }

    /// Build the event, masking then OR-ing the template modifiers over the
    /// wire-derived ones.
    pub(crate) fn apply(&self, wire_mods: u8) -> Event {
        let mods = (wire_mods & !self.mod_mask) | self.mod_set;
        match self.kind {
            KeyKind::Sym(sym) => Event::Sym { sym, mods },
            KeyKind::Function(num) => Event::Function { num, mods },
        }
    }
}

/// Fold equivalent events together according to the canonicalization flags.
/// Idempotent.
pub(crate) fn canonicalise(ev: &mut Event, canonflags: u8, codec: &dyn Codec) {
    if canonflags & CANON_SPACESYMBOL != 0 {
        if let Event::Key {
            codepoint: 0x20,
            mods,
            ..
        } = *ev
        {
            *ev = Event::Sym {
                sym: Sym::Space,
                mods,
            };
        }
    } else if let Event::Sym {
        sym: Sym::Space,
        mods,
    } = *ev
    {
        *ev = Event::Key {
            codepoint: 0x20,
            mods,
            multibyte: codec.encode(0x20),
        };
    }

    if canonflags & CANON_DELBS != 0 {
        if let Event::Sym {
            sym: sym @ Sym::Del,
            ..
        } = ev
        {
            *sym = Sym::Backspace;
        }
    }
}

/// Total order over canonicalized events: kind first, then payload, then
/// modifiers. The multibyte form of `Key` is ignored.
pub(crate) fn keycmp(a: &Event, b: &Event, canonflags: u8, codec: &dyn Codec) -> Ordering {
    let mut a = a.clone();
    let mut b = b.clone();
    canonicalise(&mut a, canonflags, codec);
    canonicalise(&mut b, canonflags, codec);

    let by_payload = match (&a, &b) {
        (Event::Key { codepoint: c1, .. }, Event::Key { codepoint: c2, .. }) => c1.cmp(c2),
        (Event::Sym { sym: s1, .. }, Event::Sym { sym: s2, .. }) => s1.cmp(s2),
        (Event::Function { num: n1, .. }, Event::Function { num: n2, .. }) => n1.cmp(n2),
        (
            Event::Mouse {
                info: i1,
                x: x1,
                y: y1,
                ..
            },
            Event::Mouse {
                info: i2,
                x: x2,
                y: y2,
                ..
            },
        ) => (i1, x1, y1).cmp(&(i2, x2, y2)),
        (Event::Focus { gained: g1 }, Event::Focus { gained: g2 }) => g1.cmp(g2),
        (
            Event::Position { line: l1, col: c1 },
            Event::Position { line: l2, col: c2 },
        ) => (l1, c1).cmp(&(l2, c2)),
        (
            Event::ModeReport {
                initial: i1,
                mode: m1,
                value: v1,
            },
            Event::ModeReport {
                initial: i2,
                mode: m2,
                value: v2,
            },
        ) => (i1, m1, v1).cmp(&(i2, m2, v2)),
        (Event::UnknownCsi { command: c1 }, Event::UnknownCsi { command: c2 }) => c1.cmp(c2),
        _ => a.rank().cmp(&b.rank()),
    };

    by_payload.then(a.mods().cmp(&b.mods()))
}
