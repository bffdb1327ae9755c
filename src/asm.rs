use std::{
    error::Error,
    ffi::{OsStr, OsString},
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    codegen::CodeGen,
    config::Config,
    link::{self, Object},
    macros,
    parser::Statement,
    symbols::SymbolTable,
    Diagnostic,
};

#[derive(Debug)]
pub struct Assembly {
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when the file assembled without errors.
    pub object: Option<Object>,
}

/// Assembles macro-expanded source text. Source errors are collected in the
/// result; `Err` is reserved for an unusable config and internal
/// inconsistencies.
pub fn assemble(source: &str, config: &Config) -> io::Result<Assembly> {
    config.validate()?;
    let mut diags = Vec::new();
    let mut gen = CodeGen::new();

    tracing::trace!("starting pass 1");
    for (i, text) in source.lines().enumerate() {
        let line = i + 1;
        if text.chars().count() > config.source.line_length {
            diags.push(Diagnostic::new(Some(line), "ERROR INPUT LENGTH IS TOO LONG"));
            continue;
        }
        let stmt = Statement::parse(text);
        if let Some(msg) = stmt.error_message() {
            diags.push(Diagnostic::new(Some(line), msg).with_text(text.trim()));
            continue;
        }
        gen.emit(&stmt, line, &mut diags);
    }

    let CodeGen {
        code,
        data,
        mut code_syms,
        data_syms,
        externs,
    } = gen;
    tracing::debug!("code: {} words", code.len());
    tracing::debug!("data: {} words", data.len());

    tracing::trace!("merging symbol tables");
    code_syms.merge(&data_syms, code.len() as u32, &mut diags);
    let mut syms = SymbolTable::new();
    syms.merge(&code_syms, config.memory.base, &mut diags);
    syms.mark_external(&externs, &mut diags);
    syms.verify(&externs, &mut diags);
    tracing::debug!("symbols: {}", syms.len());
    tracing::debug!("externals: {}", externs.len());

    if code.len() + data.len() > config.memory.size as usize {
        diags.push(Diagnostic::new(None, "ERROR MEMORY OVERFLOW"));
    }
    if !diags.is_empty() {
        return Ok(Assembly {
            diagnostics: diags,
            object: None,
        });
    }

    tracing::trace!("starting pass 2");
    let object = link::link(code, data, &syms, config.memory.base)?;
    Ok(Assembly {
        diagnostics: diags,
        object: Some(object),
    })
}

/// Appends `.ext` to `path`, keeping any dots already in the file name.
pub fn with_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Expands, assembles and writes the outputs of one source file. Returns the
/// number of errors found in it; output files are only written when that is 0.
pub fn assemble_file(
    path: &Path,
    config: &Config,
    out_dir: Option<&Path>,
) -> Result<usize, Box<dyn Error>> {
    let exts = &config.output;
    let (source, stem) = if path.extension() == Some(OsStr::new(&exts.source)) {
        (path.to_path_buf(), path.with_extension(""))
    } else {
        (with_ext(path, &exts.source), path.to_path_buf())
    };
    let stem = match out_dir {
        Some(dir) => {
            let name = stem
                .file_name()
                .ok_or_else(|| format!("{} does not name a file", path.display()))?;
            dir.join(name)
        }
        None => stem,
    };

    tracing::trace!("reading {}", source.display());
    let text = fs::read_to_string(&source)
        .map_err(|e| format!("cant open file {}: {e}", source.display()))?;

    tracing::trace!("expanding macros");
    let expansion = macros::expand(&text);
    let expanded = expansion.text();
    let am = with_ext(&stem, &exts.expanded);
    fs::write(&am, &expanded).map_err(|e| format!("cant write {}: {e}", am.display()))?;

    let assembly = assemble(&expanded, config)?;
    let mut errors = 0;
    for diag in expansion.diagnostics.iter().chain(&assembly.diagnostics) {
        tracing::error!("{}: {diag}", source.display());
        errors += 1;
    }
    if errors > 0 {
        return Ok(errors);
    }
    let Some(object) = assembly.object else {
        return Ok(0);
    };

    tracing::trace!("writing");
    write_with(&with_ext(&stem, &exts.object), |w| object.write_object(w))?;
    if !object.entries.is_empty() {
        write_with(&with_ext(&stem, &exts.entries), |w| object.write_entries(w))?;
    }
    if !object.externs.is_empty() {
        write_with(&with_ext(&stem, &exts.externals), |w| object.write_externs(w))?;
    }
    Ok(0)
}

fn write_with<F>(path: &Path, f: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(|e| format!("cant create {}: {e}", path.display()))?;
    let mut output = BufWriter::new(file);
    f(&mut output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(asm: &Assembly) -> Vec<String> {
        asm.diagnostics.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn long_lines_are_rejected_and_skipped() {
        let config = Config::default();
        let src = format!("prn 1\n{}\nprn 2\n", format!("prn {}", "9".repeat(80)));
        let asm = assemble(&src, &config).unwrap();
        assert_eq!(messages(&asm), vec!["2: ERROR INPUT LENGTH IS TOO LONG"]);
        assert!(asm.object.is_none());

        let line = format!("L: .string \"{}\"", "x".repeat(67));
        assert_eq!(line.len(), 80);
        let asm = assemble(&line, &config).unwrap();
        assert!(asm.diagnostics.is_empty());
    }

    #[test]
    fn parse_errors_carry_line_and_text() {
        let asm = assemble("stop\n  mov @r1 @r2  \n", &Config::default()).unwrap();
        assert_eq!(
            messages(&asm),
            vec!["2: ERROR MISSING COMMA - \"mov @r1 @r2\""]
        );
    }

    #[test]
    fn errors_are_collected_across_the_file() {
        let src = "\
A: stop
A: rts
mov 1,2
jmp NOWHERE
.extern A
";
        let asm = assemble(src, &Config::default()).unwrap();
        assert_eq!(
            messages(&asm),
            vec![
                "2: ERROR LABEL: \"A\" DECLARED TWICE",
                "3: ERROR INVALID DESTINATION OPERAND - \"mov 1,2\"",
                "5: ERROR LABEL: A IS BOTH EXTERNAL AND DECLARED",
                "4: ERROR LABEL: \"NOWHERE\" USED BUT NEVER DECLARED",
            ]
        );
    }

    #[test]
    fn base_address_from_config() {
        let config = Config::parse("[MEMORY]\nbase = \"0\"\n").unwrap();
        let asm = assemble("L: jmp L\n", &config).unwrap();
        let obj = asm.object.unwrap();
        assert_eq!(obj.base, 0);
        assert_eq!(obj.code, vec![(9 << 5) | (3 << 2), 0b10]);
    }

    #[test]
    fn memory_size_from_config() {
        let config = Config::parse("[MEMORY]\nsize = \"3\"\n").unwrap();
        assert!(assemble(".data 1,2,3\n", &config).unwrap().object.is_some());
        let asm = assemble(".data 1,2,3\nstop\n", &config).unwrap();
        assert_eq!(messages(&asm), vec!["ERROR MEMORY OVERFLOW"]);
    }

    #[test]
    fn unusable_memory_layout_is_an_error() {
        let mut config = Config::default();
        config.memory.base = u32::MAX;
        let err = assemble("L: jmp L\nstop\n", &config).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn output_names() {
        assert_eq!(with_ext(Path::new("dir/prog"), "as"), Path::new("dir/prog.as"));
        assert_eq!(with_ext(Path::new("a.b"), "obj"), Path::new("a.b.obj"));
    }
}
