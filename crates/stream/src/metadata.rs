//! In-band Icecast metadata parsing.
//!
//! Metadata blocks carry `key='value';` pairs, the one of interest being
//! `StreamTitle='Artist - Title';`. Blocks are NUL-padded to the length
//! byte's granularity and may arrive split across any number of socket
//! reads, so this is a byte-at-a-time state machine with small fixed
//! scratch buffers rather than a string search.

use crate::StreamEvents;

/// Which field a metadata event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetadataKind {
    /// Text before the `" - "` separator in `StreamTitle`.
    Artist,
    /// Text after the separator, or the whole value when there is none.
    Title,
}

/// Longest field we keep; broadcasters overrun this with DJ chatter, in
/// which case the field is emitted truncated.
const SCRATCH: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating a key, up to `='`.
    Key,
    /// Inside a value we do not care about, up to `';`.
    SkipValue,
    /// Inside `StreamTitle`, before the artist/title separator.
    Artist,
    /// Inside `StreamTitle`, after the separator.
    Title,
}

/// `StreamTitle` extractor.
pub struct MetadataParser {
    state: State,
    scratch: heapless::Vec<u8, SCRATCH>,
}

impl MetadataParser {
    /// Parser at the start of a block.
    pub const fn new() -> Self {
        Self {
            state: State::Key,
            scratch: heapless::Vec::new(),
        }
    }

    /// Forget partial state; call at the start of every metadata block.
    pub fn reset(&mut self) {
        self.state = State::Key;
        self.scratch.clear();
    }

    /// Feed one block fragment.
    pub fn push<E: StreamEvents>(&mut self, bytes: &[u8], events: &mut E) {
        for &byte in bytes {
            // NUL is padding wherever it appears.
            if byte == 0 {
                continue;
            }
            self.push_byte(byte, events);
        }
    }

    fn push_byte<E: StreamEvents>(&mut self, byte: u8, events: &mut E) {
        if self.scratch.push(byte).is_err() {
            match self.state {
                // A field longer than the scratch: emit what we have,
                // truncated, and skip the rest of the value.
                State::Artist => {
                    self.emit(MetadataKind::Artist, 0, events);
                    self.state = State::SkipValue;
                }
                State::Title => {
                    self.emit(MetadataKind::Title, 0, events);
                    self.state = State::SkipValue;
                }
                // An absurd key or skipped value: drop the prefix, keep
                // scanning for the delimiter.
                State::Key | State::SkipValue => self.scratch.clear(),
            }
            return;
        }

        match self.state {
            State::Key => {
                if self.scratch.ends_with(b"='") {
                    let key_len = self.scratch.len().saturating_sub(2);
                    let is_title = self.scratch.get(..key_len) == Some(b"StreamTitle");
                    self.scratch.clear();
                    self.state = if is_title { State::Artist } else { State::SkipValue };
                }
            }
            State::SkipValue => {
                if self.scratch.ends_with(b"';") {
                    self.scratch.clear();
                    self.state = State::Key;
                }
            }
            State::Artist => {
                if self.scratch.ends_with(b" - ") {
                    self.emit(MetadataKind::Artist, 3, events);
                    self.state = State::Title;
                } else if self.scratch.ends_with(b"';") {
                    // No separator: the whole value is the title.
                    self.emit(MetadataKind::Title, 2, events);
                    self.state = State::Key;
                }
            }
            State::Title => {
                if self.scratch.ends_with(b"';") {
                    self.emit(MetadataKind::Title, 2, events);
                    self.state = State::Key;
                }
            }
        }
    }

    /// Emit the scratch minus its `suffix` delimiter bytes, then clear.
    fn emit<E: StreamEvents>(&mut self, kind: MetadataKind, suffix: usize, events: &mut E) {
        let len = self.scratch.len().saturating_sub(suffix);
        let bytes = self.scratch.get(..len).unwrap_or(&[]);
        // Broadcasters send arbitrary encodings; keep the valid UTF-8
        // prefix and drop the rest.
        let text = match core::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let valid = bytes.get(..e.valid_up_to()).unwrap_or(&[]);
                core::str::from_utf8(valid).unwrap_or("")
            }
        };
        events.metadata(kind, text);
        self.scratch.clear();
    }
}

impl Default for MetadataParser {
    fn default() -> Self {
        Self::new()
    }
}
