// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Render buffer backed by an avt virtual terminal.
//!
//! Raw PTY output is full of escape sequences, `\r` overwrites, and cursor
//! motion; matching idle patterns against raw bytes produces false
//! positives. The screen feeds everything through avt and exposes only the
//! rendered text. DEC private mode 2004 (bracketed paste) is tracked from
//! the raw stream because escape bytes never reach the rendered view.

/// Maximum rendered characters returned by [`Screen::rendered_context`].
pub const CONTEXT_LIMIT: usize = 2000;

/// Bracketed paste enable/disable sequences.
const PASTE_ON: &[u8] = b"\x1b[?2004h";
const PASTE_OFF: &[u8] = b"\x1b[?2004l";

/// Opaque terminal screen.
pub struct Screen {
    vt: avt::Vt,
    seq: u64,
    bracketed_paste: bool,
    /// Buffer for incomplete UTF-8 trailing bytes between `feed()` calls.
    utf8_buf: [u8; 3],
    utf8_buf_len: u8,
    /// Trailing bytes that may start an incomplete escape sequence across
    /// `feed()` calls (max sequence length is 8: `\x1b[?2004h`).
    esc_buf: [u8; 7],
    esc_buf_len: u8,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("seq", &self.seq)
            .field("bracketed_paste", &self.bracketed_paste)
            .finish()
    }
}

/// Scan `data` for paste-mode on/off sequences, updating `enabled`.
fn scan_paste_mode(data: &[u8], enabled: &mut bool) {
    if data.len() < PASTE_ON.len() {
        return;
    }
    // The later of the two sequences wins within one chunk.
    let last_on = data.windows(PASTE_ON.len()).rposition(|w| w == PASTE_ON);
    let last_off = data.windows(PASTE_OFF.len()).rposition(|w| w == PASTE_OFF);
    match (last_on, last_off) {
        (Some(on), Some(off)) => *enabled = on > off,
        (Some(_), None) => *enabled = true,
        (None, Some(_)) => *enabled = false,
        (None, None) => {}
    }
}

/// Returns the number of trailing bytes that form an incomplete UTF-8
/// sequence, so they can be buffered until the next chunk.
fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xC0 {
            let expected = if byte < 0xE0 {
                2
            } else if byte < 0xF0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
        // Continuation byte; keep scanning backwards.
    }
    0
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            vt: avt::Vt::new(cols as usize, rows as usize),
            seq: 0,
            bracketed_paste: false,
            utf8_buf: [0; 3],
            utf8_buf_len: 0,
            esc_buf: [0; 7],
            esc_buf_len: 0,
        }
    }

    /// Feed raw bytes from the PTY into the virtual terminal.
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        // Prepend any buffered incomplete UTF-8 bytes from the previous call.
        let buf_len = self.utf8_buf_len as usize;
        let owned: Vec<u8>;
        let input = if buf_len == 0 {
            data
        } else {
            owned = [&self.utf8_buf[..buf_len], data].concat();
            self.utf8_buf_len = 0;
            &owned
        };

        // Detect paste-mode toggles split across PTY read boundaries by
        // bridging the buffered tail of the previous chunk with the head of
        // this one, then scanning the full chunk.
        let esc_len = self.esc_buf_len as usize;
        if esc_len > 0 {
            let take = input.len().min(PASTE_ON.len());
            let mut bridge = [0u8; 15]; // 7 + 8
            bridge[..esc_len].copy_from_slice(&self.esc_buf[..esc_len]);
            bridge[esc_len..esc_len + take].copy_from_slice(&input[..take]);
            scan_paste_mode(&bridge[..esc_len + take], &mut self.bracketed_paste);
        }
        scan_paste_mode(input, &mut self.bracketed_paste);

        let tail_len = input.len().min(7);
        self.esc_buf[..tail_len].copy_from_slice(&input[input.len() - tail_len..]);
        self.esc_buf_len = tail_len as u8;

        // Split off incomplete UTF-8 trailing bytes for the next call.
        let tail = incomplete_utf8_tail_len(input);
        let (to_feed, to_buffer) = input.split_at(input.len() - tail);

        if !to_buffer.is_empty() {
            self.utf8_buf[..to_buffer.len()].copy_from_slice(to_buffer);
            self.utf8_buf_len = to_buffer.len() as u8;
        }

        if !to_feed.is_empty() {
            let s = String::from_utf8_lossy(to_feed);
            let _ = self.vt.feed_str(&s);
        }

        self.seq += 1;
    }

    /// The trailing rendered text, at most [`CONTEXT_LIMIT`] characters.
    ///
    /// Lines are right-trimmed and empty trailing lines dropped, so regex
    /// patterns see what a human sees at the bottom of the terminal.
    pub fn rendered_context(&self) -> String {
        let mut lines: Vec<String> =
            self.vt.view().map(|line| line.text().trim_end().to_owned()).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        let joined = lines.join("\n");
        if joined.chars().count() <= CONTEXT_LIMIT {
            return joined;
        }
        let skip = joined.chars().count() - CONTEXT_LIMIT;
        joined.chars().skip(skip).collect()
    }

    /// Whether the child currently has bracketed paste enabled.
    pub fn bracketed_paste(&self) -> bool {
        self.bracketed_paste
    }

    /// Sequence number, incremented on each `feed`.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let _ = self.vt.resize(cols as usize, rows as usize);
    }
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
