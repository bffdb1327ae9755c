use indexmap::IndexMap;

use crate::{isa, Diagnostic};

const OPEN: &str = "mcro";
const CLOSE: &str = "endmcro";

/// Source text after macro expansion. Diagnostics from definitions carry
/// source line numbers; the rest refer to `lines`.
#[derive(Debug, Default)]
pub struct Expansion {
    pub lines: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Expansion {
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

struct Macro {
    line: usize,
    body: Vec<String>,
}

fn first_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    let end = line.find(char::is_whitespace).unwrap_or(line.len());
    (&line[..end], line[end..].trim())
}

fn is_blank(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with(';')
}

pub fn expand(source: &str) -> Expansion {
    let mut macros: IndexMap<String, Macro> = IndexMap::new();
    let mut out = Expansion::default();
    // name and body of the definition being read; `None` name when it is discarded
    let mut open: Option<(Option<String>, Macro)> = None;

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;
        let (word, rest) = first_word(line);

        if let Some((name, mut def)) = open.take() {
            if word == CLOSE {
                if let Some(name) = name {
                    tracing::debug!("macro \"{name}\": {} lines", def.body.len());
                    macros.insert(name, def);
                }
            } else {
                if !is_blank(line) {
                    def.body.push(line.to_string());
                }
                open = Some((name, def));
            }
            continue;
        }

        if word == OPEN {
            let name = if rest.is_empty() {
                out.diagnostics
                    .push(Diagnostic::new(Some(line_no), "ERROR MACRO NAME IS MISSING").with_text(line));
                None
            } else if rest.contains(char::is_whitespace)
                || isa::is_reserved(rest)
                || rest == OPEN
                || rest == CLOSE
                || macros.contains_key(rest)
            {
                out.diagnostics
                    .push(Diagnostic::new(Some(line_no), "ERROR MACRO NAME IS ILLEGAL").with_text(line));
                None
            } else {
                Some(rest.to_string())
            };
            let def = Macro {
                line: line_no,
                body: Vec::new(),
            };
            open = Some((name, def));
            continue;
        }

        if is_blank(line) {
            continue;
        }
        match macros.get(line.trim()) {
            Some(def) => out.lines.extend(def.body.iter().cloned()),
            None => out.lines.push(line.to_string()),
        }
    }

    if let Some((_, def)) = open {
        out.diagnostics
            .push(Diagnostic::new(Some(def.line), "ERROR MACRO NOT CLOSED"));
    }

    // a name still present was used before it was defined
    for (i, line) in out.lines.iter().enumerate() {
        if macros.contains_key(line.trim()) {
            out.diagnostics.push(
                Diagnostic::new(Some(i + 1), "ERROR MACRO CALLING BEFORE DECLARATION").with_text(line),
            );
        }
    }
    tracing::trace!(
        "expanded {} macros into {} lines",
        macros.len(),
        out.lines.len()
    );
    out
}
