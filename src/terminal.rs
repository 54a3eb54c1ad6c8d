//! Terminal sizing and frame display.

use std::io::{self, Write};

use crossterm::{cursor, queue, terminal};

use crate::convert::TextFrame;

/// Largest grid the player will render.
pub const MAX_WIDTH: u16 = 120;
pub const MAX_HEIGHT: u16 = 40;

/// Rows kept free for the status header.
pub const RESERVED_ROWS: u16 = 2;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

/// Current terminal size, or `None` when stdout is not a terminal.
pub fn query_size() -> Option<TerminalSize> {
    match terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => Some(TerminalSize { cols, rows }),
        Ok(_) => None,
        Err(e) => {
            log::warn!("terminal size unavailable: {}", e);
            None
        }
    }
}

/// Output grid for a terminal: capped at [`MAX_WIDTH`] x [`MAX_HEIGHT`] with
/// [`RESERVED_ROWS`] left for the header. Without a terminal the cap itself
/// is used.
pub fn resolve_dimensions(size: Option<TerminalSize>) -> (u16, u16) {
    match size {
        Some(TerminalSize { cols, rows }) => (
            cols.min(MAX_WIDTH).max(1),
            rows.saturating_sub(RESERVED_ROWS).min(MAX_HEIGHT).max(1),
        ),
        None => (MAX_WIDTH, MAX_HEIGHT),
    }
}

/// Where replayed frames go.
pub trait Display {
    /// Called once before the first frame.
    fn begin(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Replace the screen contents with `header` followed by `frame`.
    fn present(&mut self, header: &str, frame: &TextFrame) -> io::Result<()>;

    /// Called once after the last frame, including after an interrupt.
    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Display that draws with crossterm escape sequences.
///
/// Each frame is assembled in memory and handed to the writer in a single
/// `write_all`, so an interrupt never leaves half a frame on screen.
pub struct CrosstermDisplay<W: Write> {
    out: W,
    scratch: Vec<u8>,
}

impl<W: Write> CrosstermDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl CrosstermDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Display for CrosstermDisplay<W> {
    fn begin(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )?;
        self.out.flush()
    }

    fn present(&mut self, header: &str, frame: &TextFrame) -> io::Result<()> {
        self.scratch.clear();
        queue!(
            self.scratch,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::All)
        )?;
        self.scratch.extend_from_slice(header.as_bytes());
        self.scratch.extend_from_slice(b"\n");
        for row in frame.rows() {
            self.scratch.extend_from_slice(row.as_bytes());
            self.scratch.extend_from_slice(b"\n");
        }
        self.out.write_all(&self.scratch)?;
        self.out.flush()
    }

    fn end(&mut self) -> io::Result<()> {
        queue!(self.out, cursor::Show)?;
        self.out.flush()
    }
}
