//! The terminfo driver: longest-prefix matching of `key_*` byte sequences.
//!
//! Sequences are kept in a trie so matching walks one byte per edge instead
//! of scanning a flat list. Nodes start life as full 256-entry arrays while
//! the database loads, then a compression pass tightens every interior node
//! to the extent of its populated children.
//!
//! Where the capability strings come from is behind [`TermSource`], so tests
//! inject fixtures and hosts can plug a real terminfo reader. The built-in
//! source ships byte tables for the common terminal families, the same way
//! the sequences every xterm descendant sends are known ahead of time.

use std::os::unix::io::RawFd;

use nix::sys::stat::fstat;

use crate::event::{KeyInfo, Sym, MOD_SHIFT};
use crate::mouse::MouseProto;
use crate::{Decoder, Driver, Error, Peek, PEEK_FORCE};

/// A provider of terminfo capabilities for one terminal type.
pub trait TermSource {
    /// The `key_*` capabilities: suffix name (`"up"`, `"f5"`, `"mouse"`) and
    /// the byte string the terminal sends.
    fn key_caps(&self) -> Vec<(String, Vec<u8>)>;

    /// String to write when the decoder starts (application keypad mode).
    fn pkey_xmit(&self) -> Option<Vec<u8>> {
        None
    }

    /// String to write when the decoder stops.
    fn pkey_local(&self) -> Option<Vec<u8>> {
        None
    }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

enum Node {
    Arr(ArrNode),
    Key(KeyInfo),
    Mouse,
}

struct ArrNode {
    /// Inclusive endpoints of the populated extent.
    min: u8,
    max: u8,
    children: Vec<Option<Node>>,
}

impl ArrNode {
    fn new(min: u8, max: u8) -> ArrNode {
        let len = usize::from(max) - usize::from(min) + 1;
        ArrNode {
            min,
            max,
            children: (0..len).map(|_| None).collect(),
        }
    }

    fn child(&self, b: u8) -> Option<&Node> {
        if b < self.min || b > self.max {
            return None;
        }
        self.children[usize::from(b - self.min)].as_ref()
    }

    fn child_mut(&mut self, b: u8) -> Option<&mut Node> {
        if b < self.min || b > self.max {
            return None;
        }
        self.children[usize::from(b - self.min)].as_mut()
    }

    fn set(&mut self, b: u8, node: Node) {
        assert!(
            b >= self.min && b <= self.max,
            "trie insert at 0x{:02x} is outside the extent bounds (0x{:02x}..0x{:02x})",
            b,
            self.min,
            self.max
        );
        self.children[usize::from(b - self.min)] = Some(node);
    }
}

fn lookup_next<'a>(node: &'a Node, b: u8) -> Option<&'a Node> {
    match node {
        Node::Arr(arr) => arr.child(b),
        // Leaves are always terminal; walking past one cannot be caused by
        // input.
        Node::Key(_) | Node::Mouse => panic!("trie lookup within a leaf node"),
    }
}

fn insert_seq(root: &mut Node, seq: &[u8], leaf: Node) {
    let mut leaf = Some(leaf);
    let mut cur = root;

    for (i, &b) in seq.iter().enumerate() {
        let arr = match cur {
            Node::Arr(arr) => arr,
            Node::Key(_) | Node::Mouse => panic!("trie insert through a leaf node"),
        };

        if arr.child(b).is_none() {
            let next = if i + 1 == seq.len() {
                match leaf.take() {
                    Some(leaf) => leaf,
                    None => return,
                }
            } else {
                Node::Arr(ArrNode::new(0, 0xff))
            };
            arr.set(b, next);
        }

        cur = match arr.child_mut(b) {
            Some(next) => next,
            None => unreachable!(),
        };
    }
}

/// One bottom-up pass computing tight extents.
fn compress(node: Node) -> Node {
    let arr = match node {
        Node::Arr(arr) => arr,
        leaf => return leaf,
    };

    let lo = match arr.children.iter().position(|c| c.is_some()) {
        Some(lo) => lo,
        None => return Node::Arr(arr),
    };
    let hi = match arr.children.iter().rposition(|c| c.is_some()) {
        Some(hi) => hi,
        None => lo,
    };

    let min = arr.min + lo as u8;
    let max = arr.min + hi as u8;
    let children = arr
        .children
        .into_iter()
        .skip(lo)
        .take(hi - lo + 1)
        .map(|c| c.map(compress))
        .collect();

    Node::Arr(ArrNode { min, max, children })
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

// Must remain sorted for the binary search.
static FUNCS: &[(&str, KeyInfo)] = &[
    ("backspace", KeyInfo::sym(Sym::Backspace)),
    ("beg", KeyInfo::sym(Sym::Begin)),
    ("begin", KeyInfo::sym(Sym::Begin)),
    ("btab", KeyInfo::sym(Sym::Tab).with_mods(MOD_SHIFT)),
    ("cancel", KeyInfo::sym(Sym::Cancel)),
    ("clear", KeyInfo::sym(Sym::Clear)),
    ("close", KeyInfo::sym(Sym::Close)),
    ("command", KeyInfo::sym(Sym::Command)),
    ("copy", KeyInfo::sym(Sym::Copy)),
    ("dc", KeyInfo::sym(Sym::Delete)),
    ("down", KeyInfo::sym(Sym::Down)),
    ("end", KeyInfo::sym(Sym::End)),
    ("enter", KeyInfo::sym(Sym::Enter)),
    ("exit", KeyInfo::sym(Sym::Exit)),
    ("find", KeyInfo::sym(Sym::Find)),
    ("help", KeyInfo::sym(Sym::Help)),
    ("home", KeyInfo::sym(Sym::Home)),
    ("ic", KeyInfo::sym(Sym::Insert)),
    ("left", KeyInfo::sym(Sym::Left)),
    ("mark", KeyInfo::sym(Sym::Mark)),
    ("message", KeyInfo::sym(Sym::Message)),
    ("move", KeyInfo::sym(Sym::Move)),
    // Not quite, but it's the best we can do
    ("next", KeyInfo::sym(Sym::PageDown)),
    ("npage", KeyInfo::sym(Sym::PageDown)),
    ("open", KeyInfo::sym(Sym::Open)),
    ("options", KeyInfo::sym(Sym::Options)),
    ("ppage", KeyInfo::sym(Sym::PageUp)),
    ("previous", KeyInfo::sym(Sym::PageUp)),
    ("print", KeyInfo::sym(Sym::Print)),
    ("redo", KeyInfo::sym(Sym::Redo)),
    ("reference", KeyInfo::sym(Sym::Reference)),
    ("refresh", KeyInfo::sym(Sym::Refresh)),
    ("replace", KeyInfo::sym(Sym::Replace)),
    ("restart", KeyInfo::sym(Sym::Restart)),
    ("resume", KeyInfo::sym(Sym::Resume)),
    ("right", KeyInfo::sym(Sym::Right)),
    ("save", KeyInfo::sym(Sym::Save)),
    ("select", KeyInfo::sym(Sym::Select)),
    ("suspend", KeyInfo::sym(Sym::Suspend)),
    ("undo", KeyInfo::sym(Sym::Undo)),
    ("up", KeyInfo::sym(Sym::Up)),
];

/// Map a `key_*` suffix to the event template it produces. `None` for names
/// we have no representation for.
fn funcname_to_keyinfo(name: &str) -> Option<KeyInfo> {
    if let Ok(idx) = FUNCS.binary_search_by(|(n, _)| n.cmp(&name)) {
        return Some(FUNCS[idx].1);
    }

    let mut chars = name.chars();
    match chars.next() {
        Some('f') if !name[1..].is_empty() && name[1..].bytes().all(|b| b.is_ascii_digit()) => {
            name[1..].parse::<i32>().ok().map(KeyInfo::function)
        }
        // Last-ditch attempt; maybe it's a shift key?
        Some('s') => {
            let mut info = funcname_to_keyinfo(chars.as_str())?;
            info.mod_set |= MOD_SHIFT;
            info.mod_mask |= MOD_SHIFT;
            Some(info)
        }
        _ => None,
    }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

pub(crate) struct TiDriver {
    root: Node,
    start_string: Option<Vec<u8>>,
    stop_string: Option<Vec<u8>>,
}

impl TiDriver {
    /// Build the trie from a capability source. `None` when the source
    /// declares no key at all, in which case the driver is not registered.
    pub(crate) fn new(source: &dyn TermSource) -> Option<TiDriver> {
        let mut root = Node::Arr(ArrNode::new(0, 0xff));
        let mut loaded = 0usize;

        for (name, seq) in source.key_caps() {
            if seq.is_empty() {
                continue;
            }
            if name == "mouse" {
                // Whatever the entry says, the wire intro is the X10 one.
                insert_seq(&mut root, b"\x1b[M", Node::Mouse);
                loaded += 1;
            } else if let Some(info) = funcname_to_keyinfo(&name) {
                insert_seq(&mut root, &seq, Node::Key(info));
                loaded += 1;
            }
        }

        if loaded == 0 {
            return None;
        }
        debug!("terminfo driver loaded {} key sequences", loaded);

        Some(TiDriver {
            root: compress(root),
            start_string: source.pkey_xmit(),
            stop_string: source.pkey_local(),
        })
    }
}

impl Driver for TiDriver {
    fn peek(&self, dec: &Decoder, bytes: &[u8], flags: u8) -> Peek {
        let mut node = &self.root;

        for (pos, &b) in bytes.iter().enumerate() {
            node = match lookup_next(node, b) {
                Some(next) => next,
                None => return Peek::None,
            };

            match node {
                Node::Key(info) => {
                    return Peek::Key {
                        event: info.apply(0),
                        nbytes: pos + 1,
                        pending: 0,
                    };
                }
                Node::Mouse => {
                    return match dec.peek_mouse(&bytes[pos + 1..]) {
                        Peek::Key {
                            event,
                            nbytes,
                            pending,
                        } => Peek::Key {
                            event,
                            nbytes: nbytes + pos + 1,
                            pending,
                        },
                        other => other,
                    };
                }
                Node::Arr(_) => {}
            }
        }

        // We ran out of bytes without walking off the tree: partial match.
        if flags & PEEK_FORCE == 0 {
            Peek::Again
        } else {
            Peek::None
        }
    }

    fn start(&self, dec: &Decoder) -> Result<(), Error> {
        match (dec.fd(), &self.start_string) {
            (Some(fd), Some(s)) => write_to_tty(fd, s),
            _ => Ok(()),
        }
    }

    fn stop(&self, dec: &Decoder) -> Result<(), Error> {
        match (dec.fd(), &self.stop_string) {
            (Some(fd), Some(s)) => write_to_tty(fd, s),
            _ => Ok(()),
        }
    }
}

/// Write a capability string out, skipping pipes: there's no terminal on the
/// other end of those to switch modes on.
fn write_to_tty(fd: RawFd, mut bytes: &[u8]) -> Result<(), Error> {
    let st = fstat(fd)?;
    if st.st_mode & libc::S_IFMT == libc::S_IFIFO {
        return Ok(());
    }

    while !bytes.is_empty() {
        let written = nix::unistd::write(fd, bytes)?;
        bytes = &bytes[written..];
    }
    Ok(())
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

static XTERM_KEYS: &[(&str, &[u8])] = &[
    ("backspace", b"\x7f"),
    ("btab", b"\x1b[Z"),
    ("dc", b"\x1b[3~"),
    ("down", b"\x1bOB"),
    ("end", b"\x1bOF"),
    ("enter", b"\x1bOM"),
    ("f1", b"\x1bOP"),
    ("f2", b"\x1bOQ"),
    ("f3", b"\x1bOR"),
    ("f4", b"\x1bOS"),
    ("f5", b"\x1b[15~"),
    ("f6", b"\x1b[17~"),
    ("f7", b"\x1b[18~"),
    ("f8", b"\x1b[19~"),
    ("f9", b"\x1b[20~"),
    ("f10", b"\x1b[21~"),
    ("f11", b"\x1b[23~"),
    ("f12", b"\x1b[24~"),
    ("home", b"\x1bOH"),
    ("ic", b"\x1b[2~"),
    ("left", b"\x1bOD"),
    ("mouse", b"\x1b[M"),
    ("npage", b"\x1b[6~"),
    ("ppage", b"\x1b[5~"),
    ("right", b"\x1bOC"),
    ("up", b"\x1bOA"),
];

static RXVT_KEYS: &[(&str, &[u8])] = &[
    ("backspace", b"\x7f"),
    ("btab", b"\x1b[Z"),
    ("dc", b"\x1b[3~"),
    ("down", b"\x1b[B"),
    ("end", b"\x1b[8~"),
    ("f1", b"\x1b[11~"),
    ("f2", b"\x1b[12~"),
    ("f3", b"\x1b[13~"),
    ("f4", b"\x1b[14~"),
    ("f5", b"\x1b[15~"),
    ("f6", b"\x1b[17~"),
    ("f7", b"\x1b[18~"),
    ("f8", b"\x1b[19~"),
    ("f9", b"\x1b[20~"),
    ("f10", b"\x1b[21~"),
    ("f11", b"\x1b[23~"),
    ("f12", b"\x1b[24~"),
    ("home", b"\x1b[7~"),
    ("ic", b"\x1b[2~"),
    ("left", b"\x1b[D"),
    ("mouse", b"\x1b[M"),
    ("npage", b"\x1b[6~"),
    ("ppage", b"\x1b[5~"),
    ("right", b"\x1b[C"),
    ("up", b"\x1b[A"),
];

static VT100_KEYS: &[(&str, &[u8])] = &[
    ("backspace", b"\x08"),
    ("down", b"\x1bOB"),
    ("enter", b"\x1bOM"),
    ("f1", b"\x1bOP"),
    ("f2", b"\x1bOQ"),
    ("f3", b"\x1bOR"),
    ("f4", b"\x1bOS"),
    ("left", b"\x1bOD"),
    ("right", b"\x1bOC"),
    ("up", b"\x1bOA"),
];

/// Capability tables for the terminal families we know without consulting a
/// terminfo database.
pub struct BuiltinSource {
    term: String,
}

impl BuiltinSource {
    pub fn new(term: &str) -> BuiltinSource {
        BuiltinSource {
            term: term.to_owned(),
        }
    }

    fn is_rxvt(&self) -> bool {
        self.term.starts_with("rxvt") || self.term.starts_with("urxvt")
    }

    fn keys(&self) -> Option<&'static [(&'static str, &'static [u8])]> {
        let t = self.term.as_str();
        if self.is_rxvt() {
            Some(RXVT_KEYS)
        } else if t.starts_with("xterm") || t.starts_with("screen") || t.starts_with("tmux") {
            Some(XTERM_KEYS)
        } else if t.starts_with("vt100") || t.starts_with("vt102") || t.starts_with("vt220") {
            Some(VT100_KEYS)
        } else {
            None
        }
    }
}

impl TermSource for BuiltinSource {
    fn key_caps(&self) -> Vec<(String, Vec<u8>)> {
        self.keys()
            .unwrap_or(&[])
            .iter()
            .map(|&(name, seq)| (name.to_owned(), seq.to_vec()))
            .collect()
    }

    fn pkey_xmit(&self) -> Option<Vec<u8>> {
        self.keys()?;
        if self.is_rxvt() {
            Some(b"\x1b=".to_vec())
        } else {
            Some(b"\x1b[?1h\x1b=".to_vec())
        }
    }

    fn pkey_local(&self) -> Option<Vec<u8>> {
        self.keys()?;
        if self.is_rxvt() {
            Some(b"\x1b>".to_vec())
        } else {
            Some(b"\x1b[?1l\x1b>".to_vec())
        }
    }
}

/// TERM-name heuristic for what mouse protocol the terminal likely speaks.
pub(crate) fn guess_mouse_proto(term: &str, has_mouse_cap: bool) -> MouseProto {
    if term.starts_with("rxvt") || term.starts_with("urxvt") {
        MouseProto::Rxvt
    } else if term.starts_with("xterm") || term.starts_with("screen") || term.starts_with("tmux") {
        MouseProto::Sgr
    } else if has_mouse_cap {
        MouseProto::Vt200
    } else {
        MouseProto::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KeyKind;

    #[test]
    fn funcname_basic() {
        assert_eq!(
            funcname_to_keyinfo("up"),
            Some(KeyInfo::sym(Sym::Up))
        );
        assert_eq!(
            funcname_to_keyinfo("npage"),
            Some(KeyInfo::sym(Sym::PageDown))
        );
        assert_eq!(funcname_to_keyinfo("garbage"), None);
    }

    #[test]
    fn funcname_function_numbers() {
        assert_eq!(
            funcname_to_keyinfo("f5"),
            Some(KeyInfo::function(5))
        );
        assert_eq!(
            funcname_to_keyinfo("f20"),
            Some(KeyInfo::function(20))
        );
        // "f" alone is not a function key
        assert_eq!(funcname_to_keyinfo("f"), None);
    }

    #[test]
    fn funcname_shift_prefix_recursion() {
        let info = funcname_to_keyinfo("sf5").unwrap();
        assert_eq!(info.kind, KeyKind::Function(5));
        assert_eq!(info.mod_set, MOD_SHIFT);
        assert_eq!(info.mod_mask, MOD_SHIFT);

        let info = funcname_to_keyinfo("sdc").unwrap();
        assert_eq!(info.kind, KeyKind::Sym(Sym::Delete));
        assert_eq!(info.mod_set, MOD_SHIFT);
    }

    #[test]
    fn funcname_btab_forces_shift() {
        let info = funcname_to_keyinfo("btab").unwrap();
        assert_eq!(info.kind, KeyKind::Sym(Sym::Tab));
        assert_eq!(info.mod_set, MOD_SHIFT);
        assert_eq!(info.mod_mask, MOD_SHIFT);
    }

    #[test]
    fn funcs_table_is_sorted() {
        for pair in FUNCS.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} >= {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn trie_compression_tightens_extents() {
        let mut root = Node::Arr(ArrNode::new(0, 0xff));
        insert_seq(&mut root, b"\x1bOA", Node::Key(KeyInfo::sym(Sym::Up)));
        insert_seq(&mut root, b"\x1bOB", Node::Key(KeyInfo::sym(Sym::Down)));
        let root = compress(root);

        let arr = match &root {
            Node::Arr(arr) => arr,
            _ => panic!("root must stay an interior node"),
        };
        assert_eq!((arr.min, arr.max), (0x1b, 0x1b));

        let level2 = match arr.child(0x1b) {
            Some(Node::Arr(arr)) => arr,
            _ => panic!("expected interior node under ESC"),
        };
        assert_eq!((level2.min, level2.max), (b'O', b'O'));

        let level3 = match level2.child(b'O') {
            Some(Node::Arr(arr)) => arr,
            _ => panic!("expected interior node under O"),
        };
        assert_eq!((level3.min, level3.max), (b'A', b'B'));
        assert!(matches!(level3.child(b'A'), Some(Node::Key(_))));
        assert!(matches!(level3.child(b'B'), Some(Node::Key(_))));
        assert!(level3.child(b'C').is_none());
    }

    #[test]
    fn builtin_source_families() {
        assert!(!BuiltinSource::new("xterm-256color").key_caps().is_empty());
        assert!(!BuiltinSource::new("rxvt-unicode").key_caps().is_empty());
        assert!(!BuiltinSource::new("vt100").key_caps().is_empty());
        assert!(BuiltinSource::new("dumb").key_caps().is_empty());
    }

    #[test]
    fn mouse_proto_guess() {
        assert_eq!(guess_mouse_proto("rxvt-unicode", true), MouseProto::Rxvt);
        assert_eq!(guess_mouse_proto("xterm-256color", true), MouseProto::Sgr);
        assert_eq!(guess_mouse_proto("linux", true), MouseProto::Vt200);
        assert_eq!(guess_mouse_proto("dumb", false), MouseProto::None);
    }
}
