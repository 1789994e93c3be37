use crate::bios::BIOS;
use crate::codepage::cp437;
use crate::memory::MMU;

#[cfg(test)]
#[path = "./gpu_test.rs"]
mod gpu_test;

/// segment of the 80x25 text framebuffer, 2-byte cells (char, attribute)
pub const TEXT_SEG: u16 = 0xB800;

/// segment of the mode 13h graphics framebuffer, 320x200 single bytes
pub const GFX_SEG: u16 = 0xA000;

pub const TEXT_COLS: u8 = 80;
pub const TEXT_ROWS: u8 = 25;

/// attribute used by teletype output and scrolling, grey on black
pub const DEFAULT_ATTRIBUTE: u8 = 0x07;

pub const MODE_TEXT_80_25: u8 = 0x03;
pub const MODE_GFX_320_200: u8 = 0x13;

/// text/graphics display state. the framebuffers live in guest memory,
/// this tracks the mode and per-page cursors and mirrors them into the
/// BIOS data area. the renderer polls this state each tick.
#[derive(Clone)]
pub struct GPU {
    pub mode: u8,
    pub cols: u8,
    pub rows: u8,
    /// (row, column) per display page
    pub cursor: [(u8, u8); 8],
    pub active_page: u8,
    /// start and end scan line of the cursor shape
    pub cursor_shape: (u8, u8),
}

impl GPU {
    pub fn default() -> Self {
        GPU {
            mode: MODE_TEXT_80_25,
            cols: TEXT_COLS,
            rows: TEXT_ROWS,
            cursor: [(0, 0); 8],
            active_page: 0,
            cursor_shape: (0x06, 0x07),
        }
    }

    /// sets the video mode and clears the matching framebuffer
    pub fn set_mode(&mut self, mmu: &mut MMU, mode: u8) {
        self.mode = mode;
        self.cursor = [(0, 0); 8];
        self.active_page = 0;
        match mode {
            MODE_GFX_320_200 => {
                self.cols = 40;
                self.rows = 25;
                for offset in 0..(320 * 200u32) {
                    mmu.write_u8(GFX_SEG, offset as u16, 0);
                }
            }
            _ => {
                // everything else renders as 80x25 text
                self.cols = TEXT_COLS;
                self.rows = TEXT_ROWS;
                for cell in 0..(u16::from(TEXT_COLS) * u16::from(TEXT_ROWS)) {
                    mmu.write_u16(TEXT_SEG, cell * 2, u16::from(DEFAULT_ATTRIBUTE) << 8 | u16::from(b' '));
                }
            }
        }
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_CURRENT_MODE, mode);
        mmu.write_u16(BIOS::DATA_SEG, BIOS::DATA_NB_COLS, u16::from(self.cols));
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_CURRENT_PAGE, 0);
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_NB_ROWS, self.rows - 1);
    }

    pub fn set_active_page(&mut self, mmu: &mut MMU, page: u8) {
        self.active_page = page & 7;
        mmu.write_u8(BIOS::DATA_SEG, BIOS::DATA_CURRENT_PAGE, self.active_page);
    }

    pub fn set_cursor_pos(&mut self, mmu: &mut MMU, row: u8, col: u8, page: u8) {
        let page = usize::from(page & 7);
        self.cursor[page] = (row, col);
        mmu.write_u16(
            BIOS::DATA_SEG,
            BIOS::DATA_CURSOR_POS + (page as u16) * 2,
            u16::from(row) << 8 | u16::from(col),
        );
    }

    pub fn cursor_pos(&self, page: u8) -> (u8, u8) {
        self.cursor[usize::from(page & 7)]
    }

    fn cell_offset(row: u8, col: u8) -> u16 {
        (u16::from(row) * u16::from(TEXT_COLS) + u16::from(col)) * 2
    }

    /// (character, attribute) at a text cell
    pub fn read_char_attr(&self, mmu: &MMU, row: u8, col: u8) -> (u8, u8) {
        let offset = GPU::cell_offset(row, col);
        (mmu.read_u8(TEXT_SEG, offset), mmu.read_u8(TEXT_SEG, offset + 1))
    }

    pub fn write_char_attr(&self, mmu: &mut MMU, row: u8, col: u8, ch: u8, attr: u8) {
        let offset = GPU::cell_offset(row, col);
        mmu.write_u8(TEXT_SEG, offset, ch);
        mmu.write_u8(TEXT_SEG, offset + 1, attr);
    }

    /// writes a character at the cursor without advancing it,
    /// repeated `count` times up to the end of the row (int 10h AH=09/0A)
    pub fn write_char_at_cursor(&mut self, mmu: &mut MMU, page: u8, ch: u8, attr: Option<u8>, count: u16) {
        let (row, cur_col) = self.cursor_pos(page);
        let mut col = u16::from(cur_col);
        for _ in 0..count {
            if col >= u16::from(self.cols) {
                break;
            }
            match attr {
                Some(a) => self.write_char_attr(mmu, row, col as u8, ch, a),
                None => {
                    let offset = GPU::cell_offset(row, col as u8);
                    mmu.write_u8(TEXT_SEG, offset, ch);
                }
            }
            col += 1;
        }
    }

    /// teletype output (int 10h AH=0E): honours bell, backspace,
    /// line feed, carriage return; printable bytes advance and wrap,
    /// writing past the last row scrolls.
    /// the cursor is widened for the arithmetic, a guest can park it on
    /// any row via int 10h AH=02
    pub fn teletype(&mut self, mmu: &mut MMU, page: u8, ch: u8) {
        let (cur_row, cur_col) = self.cursor_pos(page);
        let mut row = u16::from(cur_row);
        let mut col = u16::from(cur_col);
        match ch {
            0x07 => {} // bell
            0x08 => {
                // backspace, no wrap to the previous row
                if col > 0 {
                    col -= 1;
                }
            }
            0x0A => {
                // line feed
                row += 1;
            }
            0x0D => {
                // carriage return
                col = 0;
            }
            _ => {
                self.write_char_attr(mmu, cur_row, cur_col, ch, DEFAULT_ATTRIBUTE);
                col += 1;
                if col >= u16::from(self.cols) {
                    col = 0;
                    row += 1;
                }
            }
        }
        if row >= u16::from(self.rows) {
            self.scroll_up(mmu, 1, DEFAULT_ATTRIBUTE, 0, 0, self.rows - 1, self.cols - 1);
            row = u16::from(self.rows) - 1;
        }
        self.set_cursor_pos(mmu, row as u8, col as u8, page);
    }

    /// scrolls a window up by `lines` (0 clears it), blanking vacated
    /// rows with space and the given attribute.
    /// window bounds come straight from guest registers, so the row
    /// arithmetic is widened before comparing
    pub fn scroll_up(&mut self, mmu: &mut MMU, lines: u8, attr: u8, top: u8, left: u8, bottom: u8, right: u8) {
        if bottom < top || right < left {
            return;
        }
        let window = u16::from(bottom) - u16::from(top) + 1;
        let lines = if lines == 0 || u16::from(lines) >= window {
            window
        } else {
            u16::from(lines)
        };
        for row in top..=bottom {
            for col in left..=right.min(self.cols - 1) {
                let src = u16::from(row) + lines;
                if src <= u16::from(bottom) {
                    let (ch, a) = self.read_char_attr(mmu, src as u8, col);
                    self.write_char_attr(mmu, row, col, ch, a);
                } else {
                    self.write_char_attr(mmu, row, col, b' ', attr);
                }
            }
        }
    }

    pub fn scroll_down(&mut self, mmu: &mut MMU, lines: u8, attr: u8, top: u8, left: u8, bottom: u8, right: u8) {
        if bottom < top || right < left {
            return;
        }
        let window = u16::from(bottom) - u16::from(top) + 1;
        let lines = if lines == 0 || u16::from(lines) >= window {
            window
        } else {
            u16::from(lines)
        };
        for row in (top..=bottom).rev() {
            for col in left..=right.min(self.cols - 1) {
                if u16::from(row) >= u16::from(top) + lines {
                    let src = u16::from(row) - lines;
                    let (ch, a) = self.read_char_attr(mmu, src as u8, col);
                    self.write_char_attr(mmu, row, col, ch, a);
                } else {
                    self.write_char_attr(mmu, row, col, b' ', attr);
                }
            }
        }
    }

    /// renders the text framebuffer to host strings, one per row
    pub fn render_text(&self, mmu: &MMU) -> Vec<String> {
        let mut rows = Vec::with_capacity(usize::from(self.rows));
        for row in 0..self.rows {
            let mut line = String::with_capacity(usize::from(self.cols));
            for col in 0..self.cols {
                let (ch, _) = self.read_char_attr(mmu, row, col);
                line.push(cp437::u8_as_char(ch));
            }
            rows.push(line);
        }
        rows
    }
}
