use log::trace;

/// Marker character inside every placeholder. Stripped from input before
/// any pass runs, so user text can never forge a placeholder.
pub(crate) const SENTINEL: char = '\u{1A}';

/// Kind of a placeholder, written on both sides of its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// A complete block element; never wrapped in a paragraph.
    Block,
    /// Content that must never be scanned again (script, comments).
    Clean,
    /// Inline replacement.
    General,
    /// Empty marker used to break lines in span-mode HTML regions.
    Separator,
}

impl Boundary {
    fn marker(self) -> char {
        match self {
            Boundary::Block => 'B',
            Boundary::Clean => 'C',
            Boundary::General => 'X',
            Boundary::Separator => ':',
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'B' => Some(Boundary::Block),
            b'C' => Some(Boundary::Clean),
            b'X' => Some(Boundary::General),
            b':' => Some(Boundary::Separator),
            _ => None,
        }
    }
}

/// Per-conversion table of finished HTML fragments.
#[derive(Debug, Default)]
pub(crate) struct HashStore {
    fragments: Vec<String>,
}

impl HashStore {
    /// Stores `fragment` and returns its placeholder. Placeholders inside
    /// `fragment` are resolved first so stored values are always flat.
    pub(crate) fn insert(&mut self, fragment: &str, boundary: Boundary) -> String {
        let flat = self.resolve(fragment);
        self.fragments.push(flat);
        let marker = boundary.marker();
        let key = format!("{marker}{SENTINEL}{}{marker}", self.fragments.len());
        trace!("hashed fragment as {:?}", key);
        key
    }

    /// Replaces every placeholder in `text` with its fragment.
    pub(crate) fn resolve(&self, text: &str) -> String {
        if !text.contains(SENTINEL) {
            return text.to_string();
        }

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut search = 0;

        while let Some(offset) = text[search..].find(SENTINEL) {
            let at = search + offset;
            search = at + SENTINEL.len_utf8();

            let Some(start) = at.checked_sub(1) else {
                continue;
            };
            if start < copied {
                continue;
            }
            let boundary = bytes[start];
            if Boundary::from_byte(boundary).is_none() {
                continue;
            }
            let digits_start = at + SENTINEL.len_utf8();
            let digits_len = bytes[digits_start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let digits_end = digits_start + digits_len;
            if digits_len == 0 || bytes.get(digits_end) != Some(&boundary) {
                continue;
            }
            let fragment = text[digits_start..digits_end]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| self.fragments.get(index));
            let Some(fragment) = fragment else {
                continue;
            };

            out.push_str(&text[copied..start]);
            out.push_str(fragment);
            copied = digits_end + 1;
            search = copied;
        }

        out.push_str(&text[copied..]);
        out
    }

    /// Whether `text` is a single block or clean placeholder, optionally
    /// followed by more text in the block case.
    pub(crate) fn starts_block(text: &str) -> bool {
        let bytes = text.as_bytes();
        let Some(&first) = bytes.first() else {
            return false;
        };
        let boundary = match Boundary::from_byte(first) {
            Some(b @ (Boundary::Block | Boundary::Clean)) => b,
            _ => return false,
        };
        let Some(rest) = text[1..].strip_prefix(SENTINEL) else {
            return false;
        };
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || rest.as_bytes().get(digits) != Some(&first) {
            return false;
        }
        match boundary {
            Boundary::Clean => rest.len() == digits + 1,
            _ => true,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.fragments.len()
    }
}
