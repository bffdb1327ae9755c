use crate::{
    isa::{self, DirectiveKind, Mode, Operand, DATA_BITS, IMMEDIATE_BITS},
    parser::{Directive, Instruction, Statement, Stmt},
    symbols::{Externs, Occurrence, SymbolTable},
    Are, Diagnostic, Segment,
};

/// First pass: encodes statements into the two segments and collects the
/// segment-local symbol tables.
#[derive(Debug)]
pub struct CodeGen {
    pub code: Segment,
    pub data: Segment,
    pub code_syms: SymbolTable,
    pub data_syms: SymbolTable,
    pub externs: Externs,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        Self {
            code: Segment::new("code"),
            data: Segment::new("data"),
            code_syms: SymbolTable::new(),
            data_syms: SymbolTable::new(),
            externs: Externs::new(),
        }
    }

    /// Appends the words of one statement. Returns the number of diagnostics added.
    pub fn emit(&mut self, stmt: &Statement, line: usize, diags: &mut Vec<Diagnostic>) -> usize {
        match &stmt.stmt {
            Stmt::Instruction(ins) => {
                let mut errors = 0;
                if let Some(label) = &stmt.label {
                    let occ = Occurrence::declaration(label, self.code.len() as u32, line);
                    errors += self.code_syms.record(occ, diags);
                }
                self.instruction(ins, line);
                errors
            }
            Stmt::Directive(dir) => {
                let mut errors = 0;
                if let Some(label) = &stmt.label {
                    if matches!(dir.kind(), DirectiveKind::Entry | DirectiveKind::External) {
                        tracing::warn!("line {line}: label \"{label}\" on a linkage directive");
                    }
                    let occ = Occurrence::declaration(label, self.data.len() as u32, line);
                    errors += self.data_syms.record(occ, diags);
                }
                errors + self.directive(dir, line, diags)
            }
            Stmt::Empty | Stmt::Comment | Stmt::Error(_) => 0,
        }
    }

    fn instruction(&mut self, ins: &Instruction, line: usize) {
        let src = ins.source().map(Operand::classify);
        let dst = ins.destination().map(Operand::classify);
        let tag = |operand: &Option<Operand>| {
            operand
                .as_ref()
                .and_then(Operand::mode)
                .map_or(0, Mode::tag)
        };
        self.code
            .write((tag(&src) << 9) | (ins.op.code << 5) | (tag(&dst) << 2) | Are::ABSOLUTE);

        if let (Some(Operand::Register(s)), Some(Operand::Register(d))) = (&src, &dst) {
            self.code
                .write(((*s as u16) << 7) | ((*d as u16) << 2) | Are::ABSOLUTE);
            return;
        }
        if let Some(src) = &src {
            self.operand(src, 7, line);
        }
        if let Some(dst) = &dst {
            self.operand(dst, 2, line);
        }
    }

    fn operand(&mut self, operand: &Operand, reg_shift: u32, line: usize) {
        match operand {
            Operand::Immediate(value) => {
                self.code
                    .write((isa::encode_field(*value, IMMEDIATE_BITS) << 2) | Are::ABSOLUTE);
            }
            Operand::Register(reg) => {
                self.code.write(((*reg as u16) << reg_shift) | Are::ABSOLUTE);
            }
            Operand::Direct(label) => {
                let occ = Occurrence::usage(label, self.code.len() as u32, line);
                // usages never collide
                self.code_syms.record(occ, &mut Vec::new());
                self.code.reloc(label, line);
            }
            // rejected while parsing
            Operand::Invalid => self.code.write(0),
        }
    }

    fn directive(&mut self, dir: &Directive, line: usize, diags: &mut Vec<Diagnostic>) -> usize {
        match dir {
            Directive::String(text) => {
                for c in text.chars() {
                    self.data.write(c as u32 as u16);
                }
                self.data.write(0);
                0
            }
            Directive::Data(values) => {
                for value in values {
                    self.data.write(isa::encode_field(*value as i64, DATA_BITS));
                }
                0
            }
            Directive::Entry(label) => self.data_syms.record(Occurrence::entry(label, line), diags),
            Directive::External(label) => self.externs.declare(label, line, diags),
        }
    }
}
