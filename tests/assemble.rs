use std::{fs, path::PathBuf};

use tpasm::{
    asm::{self, Assembly},
    config::Config,
    link::Object,
    Are,
};

const PROGRAM: &str = "\
.entry LIST
.extern W
MAIN: mov @r3, LIST
LOOP: jmp W
prn -5
bne LOOP
sub @r1, @r4
END: stop
STR: .string \"ab\"
LIST: .data 6, -9
";

fn assemble(source: &str) -> Assembly {
    asm::assemble(source, &Config::default()).unwrap()
}

fn object(source: &str) -> Object {
    let asm = assemble(source);
    let errors: Vec<String> = asm.diagnostics.iter().map(ToString::to_string).collect();
    assert!(errors.is_empty(), "{errors:?}");
    asm.object.unwrap()
}

fn render<F>(f: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
{
    let mut out = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn sample_program() {
    let obj = object(PROGRAM);
    assert_eq!(
        render(|w| obj.write_object(w)),
        "12 5\noM\nGA\nHO\nEs\nAB\nGE\n/s\nFM\nGe\np0\nCQ\nHg\nBh\nBi\nAA\nAG\n/3\n"
    );
    assert_eq!(render(|w| obj.write_entries(w)), "LIST 115\n");
    assert_eq!(render(|w| obj.write_externs(w)), "W 104\n");
}

#[test]
fn register_pair_scenario() {
    let obj = object("MAIN: mov @r1,@r2\n");
    assert_eq!(obj.code, vec![0b101_0000_101_00, 0b00001_00010_00]);
    assert!(obj.entries.is_empty());
}

#[test]
fn data_scenario() {
    let obj = object(".data 5, -3, 2047\n");
    assert!(obj.code.is_empty());
    assert_eq!(obj.data, vec![0b000000000101, 0b111111111101, 0b011111111111]);
}

#[test]
fn external_reference_scenario() {
    let obj = object(".extern LIST\nstop\nprn LIST\n");
    assert_eq!(obj.code[2], Are::EXTERNAL);
    assert_eq!(obj.externs, vec![("LIST".to_string(), 102)]);
}

#[test]
fn every_external_reference_is_listed() {
    let obj = object(".extern X\njmp X\nmov X,X\n");
    let externs: Vec<(&str, u32)> = obj.externs.iter().map(|(l, a)| (l.as_str(), *a)).collect();
    assert_eq!(externs, vec![("X", 101), ("X", 103), ("X", 104)]);
}

#[test]
fn reserved_label_scenario() {
    let asm = assemble("mov: add @r1,@r2\n");
    assert_eq!(asm.diagnostics.len(), 1);
    assert_eq!(
        asm.diagnostics[0].message,
        "ERROR LABEL IS INVALID, RESERVED WORD USED"
    );
    assert!(asm.object.is_none());
}

#[test]
fn forward_entry_scenario() {
    let obj = object(".entry FOO\nstop\nFOO: .data 1\n");
    assert_eq!(obj.entries, vec![("FOO".to_string(), 101)]);

    let asm = assemble(".entry FOO\nstop\n");
    let errors: Vec<String> = asm.diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(errors, vec!["1: ERROR LABEL: \"FOO\" USED BUT NEVER DECLARED"]);
}

#[test]
fn memory_overflow_scenario() {
    let mut src = String::from("jmp NOWHERE\n");
    for _ in 0..103 {
        src.push_str(".data 1,2,3,4,5,6,7,8,9,10\n");
    }
    let asm = assemble(&src);
    let overflows = asm
        .diagnostics
        .iter()
        .filter(|d| d.message == "ERROR MEMORY OVERFLOW")
        .count();
    assert_eq!(overflows, 1);
    assert_eq!(asm.diagnostics.len(), 2);
}

#[test]
fn exactly_full_memory_is_accepted() {
    let mut src = String::new();
    for _ in 0..102 {
        src.push_str(".data 1,2,3,4,5,6,7,8,9,10\n");
    }
    src.push_str(".data 1,2,3\n");
    assert_eq!(object(&src).data.len(), 1023);
    src.push_str("stop\n");
    assert_eq!(object(&src).words().count(), 1024);
}

#[test]
fn output_is_deterministic() {
    let a = object(PROGRAM);
    let b = object(PROGRAM);
    assert_eq!(a, b);
    assert_eq!(
        render(|w| a.write_object(w)),
        render(|w| b.write_object(w))
    );
}

#[test]
fn addresses_are_contiguous() {
    let obj = object(PROGRAM);
    let addrs: Vec<u32> = obj.words().map(|(addr, _)| addr).collect();
    let expected: Vec<u32> = (100..100 + 17).collect();
    assert_eq!(addrs, expected);
}

#[test]
fn linkage_conflicts() {
    let asm = assemble(".extern A\n.entry A\nA: stop\n.extern B\nB: stop\n");
    let errors: Vec<String> = asm.diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(
        errors,
        vec![
            "1: ERROR LABEL: A IS BOTH EXTERNAL AND ENTRY",
            "4: ERROR LABEL: B IS BOTH EXTERNAL AND DECLARED",
        ]
    );
}

#[test]
fn wide_string_characters_are_rejected() {
    let asm = assemble("S: .string \"\u{20ac}\"\n");
    let errors: Vec<String> = asm.diagnostics.iter().map(|d| d.message.clone()).collect();
    assert_eq!(errors, vec!["ERROR STRING CHARACTER OUT OF RANGE"]);
    assert!(asm.object.is_none());
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tpasm-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn assembles_file_with_macros() {
    let dir = scratch_dir("macros");
    let body = PROGRAM.replace("END: stop\n", "m_tail\n");
    let src = format!("mcro m_tail\n END: stop\nendmcro\n{body}");
    fs::write(dir.join("prog.as"), src).unwrap();

    let errors = asm::assemble_file(&dir.join("prog"), &Config::default(), None).unwrap();
    assert_eq!(errors, 0);
    let obj = fs::read_to_string(dir.join("prog.obj")).unwrap();
    assert!(obj.starts_with("12 5\noM\n"));
    assert_eq!(fs::read_to_string(dir.join("prog.ent")).unwrap(), "LIST 115\n");
    assert_eq!(fs::read_to_string(dir.join("prog.ext")).unwrap(), "W 104\n");
    let am = fs::read_to_string(dir.join("prog.am")).unwrap();
    assert!(am.contains(" END: stop\nSTR: .string"));
    assert!(!am.contains("mcro"));
}

#[test]
fn failed_file_writes_no_object() {
    let dir = scratch_dir("failed");
    let out = scratch_dir("failed-out");
    fs::write(dir.join("bad.as"), "m\nmcro m\nstop\nendmcro\nprn 1\n").unwrap();

    let errors = asm::assemble_file(&dir.join("bad.as"), &Config::default(), Some(&out)).unwrap();
    // macro call before declaration, then the same line as an unknown command
    assert_eq!(errors, 2);
    assert!(out.join("bad.am").exists());
    assert!(!out.join("bad.obj").exists());
}

#[test]
fn missing_source_is_fatal() {
    let dir = scratch_dir("missing");
    assert!(asm::assemble_file(&dir.join("nope"), &Config::default(), None).is_err());
}
