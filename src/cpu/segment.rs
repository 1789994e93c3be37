use std::fmt;

/// segment of a memory operand, `Default` resolves against the addressing form
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Segment {
    Default,
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Default | Segment::DS => "ds",
            Segment::ES => "es",
            Segment::CS => "cs",
            Segment::SS => "ss",
            Segment::FS => "fs",
            Segment::GS => "gs",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
