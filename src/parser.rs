use crate::{
    isa::{self, DirectiveKind, OpDesc, Operand, DATA_BITS, IMMEDIATE_BITS},
    WORD_MASK,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub label: Option<String>,
    pub stmt: Stmt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Empty,
    Comment,
    Directive(Directive),
    Instruction(Instruction),
    Error(String),
}

impl Statement {
    /// Classifies one source line. Never fails: problems come back as `Stmt::Error`.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line = line.trim_start();
        if line.is_empty() {
            return Self::new(None, Stmt::Empty);
        }

        let (mut word, mut rest) = split_word(line);
        let mut label = None;
        if let Some(name) = word.strip_suffix(':') {
            if let Err(msg) = isa::check_label(name) {
                return Self::error(msg);
            }
            if rest.is_empty() {
                return Self::error("ERROR ONLY LABEL DECLARED");
            }
            label = Some(name.to_string());
            (word, rest) = split_word(rest);
        }

        match classify(word, rest) {
            Ok(stmt @ (Stmt::Directive(_) | Stmt::Instruction(_))) => Self::new(label, stmt),
            Ok(stmt) => Self::new(None, stmt),
            Err(msg) => Self::error(msg),
        }
    }

    fn new(label: Option<String>, stmt: Stmt) -> Self {
        Self { label, stmt }
    }

    fn error(msg: &str) -> Self {
        Self::new(None, Stmt::Error(msg.to_string()))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.stmt {
            Stmt::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}

fn classify(word: &str, rest: &str) -> Result<Stmt, &'static str> {
    if word.starts_with('.') {
        let kind = isa::directive(word).ok_or("ERROR INVALID DECLARATION")?;
        Ok(Stmt::Directive(Directive::parse(kind, rest)?))
    } else if word.starts_with(';') {
        Ok(Stmt::Comment)
    } else {
        let op = isa::opcode(word).ok_or("ERROR UNRECOGNIZED COMMAND")?;
        let ins = Instruction::parse(op, &squeeze(rest)?)?;
        ins.validate()?;
        Ok(Stmt::Instruction(ins))
    }
}

/// Drops whitespace from a parameter list while checking comma placement.
fn squeeze(params: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(params.len());
    let mut gap = false;
    let mut comma = false;
    for c in params.chars() {
        if c.is_whitespace() {
            gap = true;
            continue;
        }
        if c == ',' {
            if out.is_empty() {
                return Err("ERROR ILLEGAL COMMA");
            }
            if comma {
                return Err("ERROR TOO MANY COMMAS OR MISSING PARAMETER");
            }
            comma = true;
        } else {
            if gap && !comma {
                return Err("ERROR MISSING COMMA");
            }
            gap = false;
            comma = false;
        }
        out.push(c);
    }
    if out.ends_with(',') {
        return Err("ERROR MISSING PARAMETER OR TOO MANY COMMAS");
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Entry(String),
    External(String),
    String(String),
    Data(Vec<i32>),
}

impl Directive {
    fn parse(kind: DirectiveKind, rest: &str) -> Result<Self, &'static str> {
        match kind {
            DirectiveKind::String => Ok(Directive::String(string_literal(rest)?)),
            DirectiveKind::Data => {
                let params = squeeze(rest)?;
                if params.is_empty() {
                    return Err("ERROR NOT ENOUGH VARIABLES");
                }
                let mut values = Vec::new();
                for param in params.split(',') {
                    let value = isa::parse_number(param)
                        .ok_or("ERROR INPUT ISN'T A NUMBER OR INPUT IS EMPTY")?;
                    if !isa::fits(value, DATA_BITS) {
                        return Err("ERROR NUMBER OUT OF RANGE");
                    }
                    values.push(value as i32);
                }
                Ok(Directive::Data(values))
            }
            DirectiveKind::Entry | DirectiveKind::External => {
                let label = squeeze(rest)?;
                if label.contains(',') {
                    return Err("ERROR TOO MANY PARAMETERS");
                }
                if label.is_empty() {
                    return Err("ERROR MISSING LABEL");
                }
                if isa::check_label(&label).is_err() {
                    return Err("ERROR NOT A VALID LABEL");
                }
                Ok(if kind == DirectiveKind::Entry {
                    Directive::Entry(label)
                } else {
                    Directive::External(label)
                })
            }
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Entry(_) => DirectiveKind::Entry,
            Directive::External(_) => DirectiveKind::External,
            Directive::String(_) => DirectiveKind::String,
            Directive::Data(_) => DirectiveKind::Data,
        }
    }
}

fn string_literal(rest: &str) -> Result<String, &'static str> {
    let text = rest.trim();
    if text.is_empty() {
        return Err("ERROR MISSING STRING");
    }
    if !text.starts_with('"') {
        return Err("ERROR STRING NOT OPEN");
    }
    if text.len() < 2 || !text.ends_with('"') {
        return Err("ERROR STRING NOT CLOSED");
    }
    let body = &text[1..text.len() - 1];
    // each character is stored as its code point in one word
    if body.chars().any(|c| c as u32 > WORD_MASK as u32) {
        return Err("ERROR STRING CHARACTER OUT OF RANGE");
    }
    Ok(body.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: &'static OpDesc,
    pub operands: Vec<String>,
}

impl Instruction {
    fn parse(op: &'static OpDesc, params: &str) -> Result<Self, &'static str> {
        let operands = match op.operands() {
            2 => {
                let parts: Vec<&str> = params.split(',').collect();
                if parts.len() > 2 {
                    return Err("ERROR TOO MANY VARIABLES");
                }
                if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
                    return Err("ERROR MISSING PARAMETER");
                }
                parts.iter().map(|p| p.to_string()).collect()
            }
            1 => {
                if params.contains(',') {
                    return Err("ERROR TOO MANY VARIABLES");
                }
                if params.is_empty() {
                    return Err("ERROR MISSING VARIABLE");
                }
                vec![params.to_string()]
            }
            _ => {
                if !params.is_empty() {
                    return Err("ERROR TOO MANY PARAMETERS");
                }
                Vec::new()
            }
        };
        Ok(Self { op, operands })
    }

    pub fn source(&self) -> Option<&str> {
        match self.operands.as_slice() {
            [src, _] => Some(src),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        match self.operands.as_slice() {
            [_, dst] | [dst] => Some(dst),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if let Some(src) = self.source() {
            check_operand(src, self.op.src, "ERROR INVALID SOURCE OPERAND")?;
        }
        if let Some(dst) = self.destination() {
            check_operand(dst, self.op.dst, "ERROR INVALID DESTINATION OPERAND")?;
        }
        Ok(())
    }
}

fn check_operand(text: &str, allowed: u8, msg: &'static str) -> Result<(), &'static str> {
    let operand = Operand::classify(text);
    match operand.mode() {
        Some(mode) if allowed & mode.flag() != 0 => {}
        _ => return Err(msg),
    }
    if let Operand::Immediate(value) = operand {
        if !isa::fits(value, IMMEDIATE_BITS) {
            return Err("ERROR IMMEDIATE OUT OF RANGE");
        }
    }
    Ok(())
}
