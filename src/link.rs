use std::io::{self, ErrorKind, Write};

use crate::{isa::ADDRESS_BITS, symbols::SymbolTable, Are, Linkage, Segment};

/// Symbols used for each 6-bit half of a word.
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub const ADDRESS_MASK: u32 = (1 << ADDRESS_BITS) - 1;

pub fn encode_word(word: u16) -> String {
    let hi = ALPHABET[((word >> 6) & 0x3F) as usize] as char;
    let lo = ALPHABET[(word & 0x3F) as usize] as char;
    [hi, lo].iter().collect()
}

/// A fully resolved image, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub base: u32,
    pub code: Vec<u16>,
    pub data: Vec<u16>,
    pub entries: Vec<(String, u32)>,
    pub externs: Vec<(String, u32)>,
}

impl Object {
    /// Every word with its address, code first.
    pub fn words(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        self.code
            .iter()
            .chain(self.data.iter())
            .enumerate()
            .map(|(i, word)| (self.base + i as u32, *word))
    }

    pub fn write_object<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{} {}", self.code.len(), self.data.len())?;
        for (_, word) in self.words() {
            writeln!(w, "{}", encode_word(word))?;
        }
        Ok(())
    }

    pub fn write_entries<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (label, addr) in &self.entries {
            writeln!(w, "{label} {addr}")?;
        }
        Ok(())
    }

    pub fn write_externs<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (label, addr) in &self.externs {
            writeln!(w, "{label} {addr}")?;
        }
        Ok(())
    }
}

/// Second pass: patches every pending word against the merged table.
pub fn link(
    mut code: Segment,
    mut data: Segment,
    syms: &SymbolTable,
    base: u32,
) -> io::Result<Object> {
    let total = code.len() + data.len();
    u32::try_from(total)
        .ok()
        .and_then(|len| base.checked_add(len))
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("{total} words starting at {base} overrun the address space"),
            )
        })?;
    // every address below is bounded by the check above
    let mut externs = Vec::new();
    let data_base = base + code.len() as u32;
    for (segment, start) in [(&mut code, base), (&mut data, data_base)] {
        tracing::trace!(
            "resolving {} references in segment \"{}\"",
            segment.relocs.len(),
            segment.name
        );
        for reloc in &segment.relocs {
            let sym = syms.lookup(&reloc.label).ok_or_else(|| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!(
                        "{}: unresolved reference to \"{}\" survived verification",
                        reloc.line, reloc.label
                    ),
                )
            })?;
            let word = if sym.linkage == Linkage::External {
                externs.push((reloc.label.clone(), start + reloc.offset as u32));
                Are::EXTERNAL
            } else {
                if sym.address > ADDRESS_MASK {
                    tracing::warn!(
                        "{}: address {} of \"{}\" does not fit in the address field",
                        reloc.line,
                        sym.address,
                        reloc.label
                    );
                }
                (((sym.address & ADDRESS_MASK) as u16) << 2) | Are::RELOCATABLE
            };
            segment.words[reloc.offset] = word;
        }
    }

    let entries = syms
        .entries()
        .map(|(label, addr)| (label.to_string(), addr))
        .collect();
    Ok(Object {
        base,
        code: code.words,
        data: data.words,
        entries,
        externs,
    })
}
