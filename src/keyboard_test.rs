use pretty_assertions::assert_eq;

use crate::keyboard::Keyboard;

#[test]
fn buffer_is_first_in_first_out() {
    let mut kb = Keyboard::default();
    kb.push_ascii(b'a');
    kb.push_ascii(b'b');
    assert_eq!(Some(0x1E61), kb.peek());
    assert_eq!(Some(0x1E61), kb.pop());
    assert_eq!(Some(0x3062), kb.pop());
    assert_eq!(None, kb.pop());
}

#[test]
fn contains_ascii_scans_the_whole_buffer() {
    let mut kb = Keyboard::default();
    kb.push_ascii(b'h');
    kb.push_ascii(b'i');
    kb.push_ascii(0x0D);
    assert!(kb.contains_ascii(0x0D));
    assert!(!kb.contains_ascii(b'x'));
}
