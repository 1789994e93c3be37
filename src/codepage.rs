/// minimal code page 437 mapping used when rendering guest text for the host
pub mod cp437 {
    /// maps a guest byte to a host char
    pub fn u8_as_char(b: u8) -> char {
        match b {
            0x20..=0x7E => b as char,
            0x00 => ' ',
            0x01 => '☺',
            0x02 => '☻',
            0x03 => '♥',
            0x04 => '♦',
            0x05 => '♣',
            0x06 => '♠',
            0x07 => '•',
            0x0E => '♫',
            0x0F => '☼',
            0x10 => '►',
            0x11 => '◄',
            0x18 => '↑',
            0x19 => '↓',
            0x1A => '→',
            0x1B => '←',
            0xB0 => '░',
            0xB1 => '▒',
            0xB2 => '▓',
            0xB3 => '│',
            0xC4 => '─',
            0xC9 => '╔',
            0xBB => '╗',
            0xC8 => '╚',
            0xBC => '╝',
            0xCD => '═',
            0xBA => '║',
            0xDB => '█',
            0xDC => '▄',
            0xDF => '▀',
            _ => '.',
        }
    }

    /// decodes a guest byte string for host display
    pub fn to_utf8(data: &[u8]) -> String {
        data.iter().map(|b| u8_as_char(*b)).collect()
    }
}
