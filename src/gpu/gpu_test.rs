use pretty_assertions::assert_eq;

use crate::gpu::{GPU, DEFAULT_ATTRIBUTE, MODE_TEXT_80_25, TEXT_SEG};
use crate::memory::MMU;

fn text_gpu() -> (GPU, MMU) {
    let mut mmu = MMU::default();
    let mut gpu = GPU::default();
    gpu.set_mode(&mut mmu, MODE_TEXT_80_25);
    (gpu, mmu)
}

#[test]
fn teletype_writes_char_and_attribute() {
    let (mut gpu, mut mmu) = text_gpu();
    for ch in b"Hi" {
        gpu.teletype(&mut mmu, 0, *ch);
    }
    assert_eq!(b'H', mmu.read_u8(TEXT_SEG, 0));
    assert_eq!(DEFAULT_ATTRIBUTE, mmu.read_u8(TEXT_SEG, 1));
    assert_eq!(b'i', mmu.read_u8(TEXT_SEG, 2));
    assert_eq!((0, 2), gpu.cursor_pos(0));
}

#[test]
fn teletype_control_characters() {
    let (mut gpu, mut mmu) = text_gpu();
    gpu.teletype(&mut mmu, 0, b'A');
    gpu.teletype(&mut mmu, 0, 0x08); // backspace
    assert_eq!((0, 0), gpu.cursor_pos(0));
    gpu.teletype(&mut mmu, 0, 0x08); // no wrap at column 0
    assert_eq!((0, 0), gpu.cursor_pos(0));
    gpu.teletype(&mut mmu, 0, 0x0A); // line feed
    assert_eq!((1, 0), gpu.cursor_pos(0));
    gpu.teletype(&mut mmu, 0, b'X');
    gpu.teletype(&mut mmu, 0, 0x0D); // carriage return
    assert_eq!((1, 0), gpu.cursor_pos(0));
    gpu.teletype(&mut mmu, 0, 0x07); // bell is ignored
    assert_eq!((1, 0), gpu.cursor_pos(0));
}

#[test]
fn line_feed_on_last_row_scrolls() {
    let (mut gpu, mut mmu) = text_gpu();
    gpu.set_cursor_pos(&mut mmu, 0, 0, 0);
    gpu.teletype(&mut mmu, 0, b'T'); // row 0
    gpu.set_cursor_pos(&mut mmu, 24, 0, 0);
    gpu.teletype(&mut mmu, 0, b'B'); // row 24
    gpu.teletype(&mut mmu, 0, 0x0A);

    // row 0 lost, row 23 now holds 'B', row 24 blanked with 0x07
    assert_eq!((24, 1), gpu.cursor_pos(0));
    assert_eq!((b'B', DEFAULT_ATTRIBUTE), gpu.read_char_attr(&mmu, 23, 0));
    assert_eq!((b' ', DEFAULT_ATTRIBUTE), gpu.read_char_attr(&mmu, 24, 0));
}

#[test]
fn wrap_at_end_of_row() {
    let (mut gpu, mut mmu) = text_gpu();
    gpu.set_cursor_pos(&mut mmu, 3, 79, 0);
    gpu.teletype(&mut mmu, 0, b'Z');
    assert_eq!((4, 0), gpu.cursor_pos(0));
    assert_eq!((b'Z', DEFAULT_ATTRIBUTE), gpu.read_char_attr(&mmu, 3, 79));
}

#[test]
fn scroll_window_clears_with_attribute() {
    let (mut gpu, mut mmu) = text_gpu();
    gpu.write_char_attr(&mut mmu, 5, 10, b'Q', 0x1E);
    gpu.scroll_up(&mut mmu, 0, 0x4F, 5, 10, 10, 20); // AL=0 clears
    assert_eq!((b' ', 0x4F), gpu.read_char_attr(&mmu, 5, 10));
}

#[test]
fn render_text_reads_back_framebuffer() {
    let (mut gpu, mut mmu) = text_gpu();
    for ch in b"Hello!" {
        gpu.teletype(&mut mmu, 0, *ch);
    }
    let rows = gpu.render_text(&mmu);
    assert_eq!(25, rows.len());
    assert!(rows[0].starts_with("Hello!"));
}
