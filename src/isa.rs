use crate::MAX_LABEL_LEN;

pub const IMMEDIATE_BITS: u32 = 10;
pub const ADDRESS_BITS: u32 = 10;
pub const DATA_BITS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Immediate,
    Direct,
    Register,
}

impl Mode {
    /// Tag stored in the 3-bit mode fields of the opcode word.
    pub const fn tag(self) -> u16 {
        match self {
            Mode::Immediate => 1,
            Mode::Direct => 3,
            Mode::Register => 5,
        }
    }

    pub const fn flag(self) -> u8 {
        match self {
            Mode::Immediate => Modes::IMMEDIATE,
            Mode::Direct => Modes::DIRECT,
            Mode::Register => Modes::REGISTER,
        }
    }
}

pub struct Modes;

impl Modes {
    pub const NONE: u8 = 0;
    pub const IMMEDIATE: u8 = 1 << 0;
    pub const DIRECT: u8 = 1 << 1;
    pub const REGISTER: u8 = 1 << 2;
    pub const WRITABLE: u8 = Self::DIRECT | Self::REGISTER;
    pub const ALL: u8 = Self::IMMEDIATE | Self::DIRECT | Self::REGISTER;
}

/// Operand rules of one opcode. An empty mode set means the operand is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpDesc {
    pub name: &'static str,
    pub code: u16,
    pub src: u8,
    pub dst: u8,
}

impl OpDesc {
    pub const fn operands(&self) -> usize {
        (self.src != Modes::NONE) as usize + (self.dst != Modes::NONE) as usize
    }
}

macro_rules! op {
    ($name:expr, $code:expr, $src:expr, $dst:expr) => {
        OpDesc {
            name: $name,
            code: $code,
            src: $src,
            dst: $dst,
        }
    };
}

pub const OPCODES: &[OpDesc] = &[
    op!("mov", 0, Modes::ALL, Modes::WRITABLE),
    op!("cmp", 1, Modes::ALL, Modes::ALL),
    op!("add", 2, Modes::ALL, Modes::WRITABLE),
    op!("sub", 3, Modes::ALL, Modes::WRITABLE),
    op!("not", 4, Modes::NONE, Modes::WRITABLE),
    op!("clr", 5, Modes::NONE, Modes::WRITABLE),
    op!("lea", 6, Modes::DIRECT, Modes::WRITABLE),
    op!("inc", 7, Modes::NONE, Modes::WRITABLE),
    op!("dec", 8, Modes::NONE, Modes::WRITABLE),
    op!("jmp", 9, Modes::NONE, Modes::WRITABLE),
    op!("bne", 10, Modes::NONE, Modes::WRITABLE),
    op!("red", 11, Modes::NONE, Modes::WRITABLE),
    op!("prn", 12, Modes::NONE, Modes::ALL),
    op!("jsr", 13, Modes::NONE, Modes::WRITABLE),
    op!("rts", 14, Modes::NONE, Modes::NONE),
    op!("stop", 15, Modes::NONE, Modes::NONE),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Entry,
    External,
    String,
    Data,
}

pub const DIRECTIVES: &[(&str, DirectiveKind)] = &[
    (".string", DirectiveKind::String),
    (".data", DirectiveKind::Data),
    (".entry", DirectiveKind::Entry),
    (".extern", DirectiveKind::External),
];

pub const REGISTERS: &[&str] = &["@r0", "@r1", "@r2", "@r3", "@r4", "@r5", "@r6", "@r7"];

pub fn opcode(name: &str) -> Option<&'static OpDesc> {
    OPCODES.iter().find(|op| op.name == name)
}

pub fn directive(name: &str) -> Option<DirectiveKind> {
    DIRECTIVES
        .iter()
        .find_map(|(s, kind)| (*s == name).then_some(*kind))
}

pub fn register(name: &str) -> Option<u8> {
    REGISTERS.iter().position(|r| *r == name).map(|r| r as u8)
}

pub fn is_reserved(word: &str) -> bool {
    opcode(word).is_some() || directive(word).is_some() || register(word).is_some()
}

/// Checks a label name, returning the diagnostic message if it is unusable.
pub fn check_label(name: &str) -> Result<(), &'static str> {
    if is_reserved(name) {
        return Err("ERROR LABEL IS INVALID, RESERVED WORD USED");
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err("ERROR LABEL IS INVALID"),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err("ERROR LABEL IS INVALID");
    }
    if name.len() > MAX_LABEL_LEN {
        return Err("ERROR LABEL IS TOO LONG");
    }
    Ok(())
}

/// Parses an optionally signed decimal literal. Values too large for `i64`
/// saturate so range checks still reject them.
pub fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = digits.bytes().fold(0i64, |accum, c| {
        accum.saturating_mul(10).saturating_add((c - b'0') as i64)
    });
    Some(if negative { -value } else { value })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Immediate(i64),
    Direct(String),
    Register(u8),
    Invalid,
}

impl Operand {
    pub fn classify(text: &str) -> Self {
        if let Some(value) = parse_number(text) {
            Operand::Immediate(value)
        } else if let Some(reg) = register(text) {
            Operand::Register(reg)
        } else if check_label(text).is_ok() {
            Operand::Direct(text.to_string())
        } else {
            Operand::Invalid
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        match self {
            Operand::Immediate(_) => Some(Mode::Immediate),
            Operand::Direct(_) => Some(Mode::Direct),
            Operand::Register(_) => Some(Mode::Register),
            Operand::Invalid => None,
        }
    }
}

pub fn fits(value: i64, bits: u32) -> bool {
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    (min..=max).contains(&value)
}

/// Two's-complement encoding of `value` into the low `bits` bits.
pub fn encode_field(value: i64, bits: u32) -> u16 {
    (value & ((1i64 << bits) - 1)) as u16
}

pub fn decode_field(raw: u16, bits: u32) -> i64 {
    let value = (raw as i64) & ((1i64 << bits) - 1);
    if value & (1i64 << (bits - 1)) != 0 {
        value - (1i64 << bits)
    } else {
        value
    }
}
