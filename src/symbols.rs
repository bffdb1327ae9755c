use indexmap::IndexMap;

use crate::{Diagnostic, Linkage, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub label: String,
    /// Segment-relative until merged, absolute afterwards.
    pub address: u32,
    pub linkage: Linkage,
    pub role: Role,
    pub line: usize,
}

impl Occurrence {
    pub fn declaration(label: &str, address: u32, line: usize) -> Self {
        Self::new(label, address, Linkage::Local, Role::Declaration, line)
    }

    pub fn usage(label: &str, address: u32, line: usize) -> Self {
        Self::new(label, address, Linkage::Local, Role::Usage, line)
    }

    /// An `.entry` promotion whose declaration may not have been seen yet.
    pub fn entry(label: &str, line: usize) -> Self {
        Self::new(label, 0, Linkage::Entry, Role::Forward, line)
    }

    fn new(label: &str, address: u32, linkage: Linkage, role: Role, line: usize) -> Self {
        Self {
            label: label.to_string(),
            address,
            linkage,
            role,
            line,
        }
    }
}

/// Names brought in with `.extern`, with the line that declared them.
#[derive(Debug, Default)]
pub struct Externs(IndexMap<String, usize>);

impl Externs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, label: &str, line: usize, diags: &mut Vec<Diagnostic>) -> usize {
        if self.0.contains_key(label) {
            diags.push(Diagnostic::new(
                Some(line),
                format!("ERROR LABEL: {label} DEFINE TWICE AS EXTERNAL"),
            ));
            return 1;
        }
        self.0.insert(label.to_string(), line);
        0
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(label, line)| (label.as_str(), *line))
    }
}

/// Ordered record of every label occurrence in a segment or a whole file.
#[derive(Debug, Default)]
pub struct SymbolTable(Vec<Occurrence>);

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occurrence> {
        self.0.iter()
    }

    /// Inserts `occ`, folding declarations and entry promotions of the same
    /// label together. Returns the number of diagnostics added.
    pub fn record(&mut self, occ: Occurrence, diags: &mut Vec<Diagnostic>) -> usize {
        let prior = match occ.role {
            Role::Usage => None,
            _ => self
                .0
                .iter()
                .position(|o| o.label == occ.label && o.role != Role::Usage),
        };
        let Some(prior) = prior else {
            self.0.push(occ);
            return 0;
        };
        let prior = &mut self.0[prior];
        match occ.role {
            Role::Declaration => {
                if prior.role == Role::Declaration {
                    diags.push(Diagnostic::new(
                        Some(occ.line),
                        format!("ERROR LABEL: \"{}\" DECLARED TWICE", occ.label),
                    ));
                    return 1;
                }
                // forward entry
                prior.address = occ.address;
                prior.role = Role::Declaration;
                prior.line = occ.line;
                0
            }
            Role::Forward | Role::Usage => {
                if prior.linkage == Linkage::Entry {
                    diags.push(Diagnostic::new(
                        Some(occ.line),
                        format!("ERROR LABEL: {} DECLARED TWICE AS ENTRY", occ.label),
                    ));
                    return 1;
                }
                prior.linkage = Linkage::Entry;
                0
            }
        }
    }

    /// Re-records every occurrence of `from` with its address shifted by `offset`.
    pub fn merge(&mut self, from: &SymbolTable, offset: u32, diags: &mut Vec<Diagnostic>) -> usize {
        let mut errors = 0;
        for occ in from.iter() {
            let Some(address) = occ.address.checked_add(offset) else {
                diags.push(Diagnostic::new(Some(occ.line), "ERROR MEMORY OVERFLOW"));
                errors += 1;
                continue;
            };
            let occ = Occurrence {
                address,
                ..occ.clone()
            };
            errors += self.record(occ, diags);
        }
        errors
    }

    pub fn mark_external(&mut self, externs: &Externs, diags: &mut Vec<Diagnostic>) -> usize {
        let mut errors = 0;
        for (label, line) in externs.iter() {
            for occ in self.0.iter_mut().filter(|o| o.label == label) {
                let conflict = if occ.linkage == Linkage::Entry {
                    "ENTRY"
                } else if occ.role == Role::Declaration {
                    "DECLARED"
                } else {
                    occ.linkage = Linkage::External;
                    continue;
                };
                diags.push(Diagnostic::new(
                    Some(line),
                    format!("ERROR LABEL: {label} IS BOTH EXTERNAL AND {conflict}"),
                ));
                errors += 1;
            }
        }
        errors
    }

    /// Checks that every reference and every entry promotion names a label
    /// that is declared here or imported.
    pub fn verify(&self, externs: &Externs, diags: &mut Vec<Diagnostic>) -> usize {
        let mut errors = 0;
        for occ in self.0.iter().filter(|o| o.role != Role::Declaration) {
            if self.lookup(&occ.label).is_none() && !externs.contains(&occ.label) {
                diags.push(Diagnostic::new(
                    Some(occ.line),
                    format!("ERROR LABEL: \"{}\" USED BUT NEVER DECLARED", occ.label),
                ));
                errors += 1;
            }
        }
        errors
    }

    /// First occurrence that gives `label` a value: its declaration, or an
    /// external reference.
    pub fn lookup(&self, label: &str) -> Option<&Occurrence> {
        self.0.iter().find(|o| {
            o.label == label && (o.role == Role::Declaration || o.linkage == Linkage::External)
        })
    }

    pub fn lookup_address(&self, label: &str) -> Option<u32> {
        self.lookup(label).map(|o| o.address)
    }

    /// Exported labels with their addresses, in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0
            .iter()
            .filter(|o| o.linkage == Linkage::Entry && o.role == Role::Declaration)
            .map(|o| (o.label.as_str(), o.address))
    }
}
