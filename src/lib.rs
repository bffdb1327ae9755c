use std::fmt::{self, Display, Formatter};

pub mod asm;
pub mod codegen;
pub mod config;
pub mod isa;
pub mod link;
pub mod macros;
pub mod parser;
pub mod symbols;

/// First address of the assembled image.
pub const BASE_ADDRESS: u32 = 100;

/// Capacity of the machine in words, instructions and data combined.
pub const MEMORY_SIZE: u32 = 1024;

/// Longest accepted physical source line, newline excluded.
pub const MAX_LINE_LEN: usize = 80;

pub const MAX_LABEL_LEN: usize = 31;

pub const WORD_MASK: u16 = 0x0FFF;

/// The 2-bit linkage tag in the low bits of every word.
pub struct Are;

impl Are {
    pub const ABSOLUTE: u16 = 0b00;
    pub const EXTERNAL: u16 = 0b01;
    pub const RELOCATABLE: u16 = 0b10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Local,
    Entry,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Declaration,
    Usage,
    /// `.entry` seen before the label it exports was declared
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Option<usize>,
    pub message: String,
    pub text: Option<String>,
}

impl Diagnostic {
    pub fn new(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "{line}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(text) = &self.text {
            write!(f, " - \"{text}\"")?;
        }
        Ok(())
    }
}

/// A word whose value depends on the final address of `label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloc {
    pub offset: usize,
    pub label: String,
    pub line: usize,
}

#[derive(Debug)]
pub struct Segment {
    pub name: &'static str,
    pub words: Vec<u16>,
    pub relocs: Vec<Reloc>,
}

impl Segment {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            words: Vec::new(),
            relocs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn write(&mut self, word: u16) {
        self.words.push(word & WORD_MASK);
    }

    pub fn reloc(&mut self, label: &str, line: usize) {
        self.relocs.push(Reloc {
            offset: self.words.len(),
            label: label.to_string(),
            line,
        });
        // patched during linking
        self.words.push(0);
    }
}
