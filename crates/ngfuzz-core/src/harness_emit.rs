//! Dispatcher emitter: renders the Rust harness module that decodes a
//! `NgoloFuzzList`, threads produced objects through per-type ring buffers
//! and executes the call sequence. The runtime glue (pseudo-socket,
//! generator helpers, corpus writer, entry points) is a fixed template
//! embedded as literal text; everything else is driven off the plan.

use std::collections::BTreeSet;

use crate::astutil::{snake, upper_camel};
use crate::classify::{ArgKind, GenForm, GENERATORS};
use crate::introspect::SelfStyle;
use crate::plan::{FuncArg, FuncPlan, FuncResult, PackageDescription, SRCDST_DST, SRCDST_SRC};

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Crate identifier of the target package, as referenced from the
    /// generated code.
    pub pkg: String,
    /// `<Recv><fn>.<arg>` keys whose argument is masked with `% 0x10001`.
    pub limits: BTreeSet<String>,
    pub source_digest: String,
}

// Runtime glue shared by every generated harness: a pseudo-socket over a
// byte buffer, the built-in generator helpers, the content-addressed corpus
// writer and the panic-filtering entry points. The panic filter swallows
// string payloads (expected library panics) and re-raises anything else.
const RUNTIME: &str = r#"
pub struct FuzzingConn {
    buf: Vec<u8>,
    offset: usize,
}

impl std::io::Read for FuzzingConn {
    fn read(&mut self, b: &mut [u8]) -> std::io::Result<usize> {
        if self.offset >= self.buf.len() {
            return Ok(0);
        }
        let n = std::cmp::min(b.len(), self.buf.len() - self.offset);
        b[..n].copy_from_slice(&self.buf[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

impl std::io::Write for FuzzingConn {
    fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
        Ok(b.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn create_fuzzing_conn(a: &[u8]) -> FuzzingConn {
    FuzzingConn { buf: a.to_vec(), offset: 0 }
}

pub fn create_reader(a: &[u8]) -> std::io::Cursor<Vec<u8>> {
    std::io::Cursor::new(a.to_vec())
}

pub fn create_bufreader(a: &[u8]) -> std::io::BufReader<std::io::Cursor<Vec<u8>>> {
    std::io::BufReader::new(std::io::Cursor::new(a.to_vec()))
}

pub fn create_writer(a: &[u8]) -> std::io::Cursor<Vec<u8>> {
    std::io::Cursor::new(a.to_vec())
}

pub fn create_big_int(a: &[u8]) -> num_bigint::BigInt {
    num_bigint::BigInt::from_bytes_be(num_bigint::Sign::Plus, a)
}

pub fn convert_usize_array(a: &[u64]) -> Vec<usize> {
    a.iter().map(|v| *v as usize).collect()
}

pub fn convert_u16_array(a: &[u32]) -> Vec<u16> {
    a.iter().map(|v| *v as u16).collect()
}

pub fn get_char(s: &str) -> char {
    s.chars().next().unwrap_or('\0')
}

/// Serialize a one-item envelope into the corpus directory, named by the
/// lowercase hex SHA-1 of the serialized bytes.
pub fn ngolo_corpus_marshal(item: ngolo_fuzz_one::Item) {
    let one = NgoloFuzzOne { item: Some(item) };
    let list = NgoloFuzzList { list: vec![one] };
    let data = list.encode_to_vec();
    let mut h = Sha1::new();
    h.update(&data);
    let digest = h.finalize();
    let mut name = String::with_capacity(digest.len() * 2);
    for b in digest {
        name.push_str(&format!("{:02x}", b));
    }
    let dir = std::env::var("FUZZ_NG_CORPUS_DIR").unwrap_or_default();
    let _ = std::fs::write(std::path::Path::new(&dir).join(name), &data);
}

pub fn fuzz_ng_valid(data: &[u8]) -> i32 {
    let gen = match NgoloFuzzList::decode(data) {
        Ok(gen) => gen,
        Err(_) => panic!("Failed to unmarshal LPM generated variables"),
    };
    run_filtered(&gen)
}

// We are unsure the input is a valid protobuf.
pub fn fuzz_ng_unsure(data: &[u8]) -> i32 {
    let gen = match NgoloFuzzList::decode(data) {
        Ok(gen) => gen,
        Err(_) => return 0,
    };
    run_filtered(&gen)
}

fn run_filtered(gen: &NgoloFuzzList) -> i32 {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fuzz_ng_list(gen))) {
        Ok(r) => r,
        Err(payload) => {
            if payload.downcast_ref::<String>().is_none()
                && payload.downcast_ref::<&str>().is_none()
            {
                std::panic::resume_unwind(payload);
            }
            0
        }
    }
}

static REPRO_INIT: std::sync::Once = std::sync::Once::new();
"#;

pub fn render_harness(descr: &PackageDescription, opts: &HarnessOptions) -> String {
    let mut w = String::new();
    w.push_str("// Generated by ngfuzz. Do not edit.\n");
    w.push_str(&format!("// source-sha256: {}\n", opts.source_digest));
    w.push_str("#![cfg(fuzzing)]\n");
    w.push_str(
        "#![allow(dead_code, unused_imports, unused_variables, unused_mut, \
         unreachable_patterns, clippy::all)]\n\n",
    );
    w.push_str("use prost::Message;\n");
    w.push_str("use sha1::{Digest, Sha1};\n\n");
    w.push_str("pub mod ngolofuzz {\n");
    w.push_str("    include!(concat!(env!(\"OUT_DIR\"), \"/ngolofuzz.rs\"));\n");
    w.push_str("}\n");
    w.push_str("use ngolofuzz::*;\n");
    w.push_str(RUNTIME);
    w.push('\n');

    for t in &descr.types {
        if t.is_enum() {
            emit_enum_helpers(&mut w, t, &opts.pkg);
        } else if t.is_struct() {
            emit_struct_helper(&mut w, t, &opts.pkg);
        }
    }

    emit_dispatcher(&mut w, descr, opts);
    emit_printer(&mut w, descr, opts);

    w
}

fn new_from_fuzz(name: &str) -> String {
    format!("{}_new_from_fuzz", snake(name))
}

fn ring(name: &str) -> String {
    format!("{}_results", snake(name))
}

fn emit_enum_helpers(w: &mut String, t: &crate::plan::TypePlan, pkg: &str) {
    let value = |v: &str| {
        if t.qualify {
            format!("{}::{}::{}", pkg, t.name, v)
        } else {
            format!("{}::{}", pkg, v)
        }
    };
    w.push_str(&format!(
        "pub fn {}(p: i32) -> {}::{} {{\n",
        new_from_fuzz(&t.name),
        pkg,
        t.name
    ));
    if t.values.len() > 1 {
        w.push_str("    match p {\n");
        for i in 1..t.values.len() {
            w.push_str(&format!("        {} => {},\n", i, value(&t.values[i])));
        }
        w.push_str(&format!("        _ => {},\n", value(&t.values[0])));
        w.push_str("    }\n");
    } else {
        w.push_str(&format!("    {}\n", value(&t.values[0])));
    }
    w.push_str("}\n\n");

    w.push_str(&format!(
        "pub fn convert_{}(a: &[i32]) -> Vec<{}::{}> {{\n",
        new_from_fuzz(&t.name),
        pkg,
        t.name
    ));
    w.push_str(&format!(
        "    a.iter().map(|v| {}(*v)).collect()\n",
        new_from_fuzz(&t.name)
    ));
    w.push_str("}\n\n");
}

fn emit_struct_helper(w: &mut String, t: &crate::plan::TypePlan, pkg: &str) {
    w.push_str(&format!(
        "pub fn {}(p: &{}Struct) -> {}::{} {{\n",
        new_from_fuzz(&t.name),
        upper_camel(&t.name),
        pkg,
        t.name
    ));
    w.push_str(&format!("    {}::{} {{\n", pkg, t.name));
    for a in &t.fields {
        if let Some(expr) = field_expr(a) {
            w.push_str(&format!("        {}: {},\n", a.name, expr));
        }
    }
    if t.partial {
        w.push_str("        ..Default::default()\n");
    }
    w.push_str("    }\n}\n\n");
}

// Field initializer of a struct surrogate, reading from `p`.
fn field_expr(a: &FuncArg) -> Option<String> {
    let access = format!("p.{}{}", snake(&a.name), a.suffix);
    match a.kind {
        ArgKind::Scalar => {
            if a.field_type == "NgoloFuzzAny" {
                Some(format!("Box::new({}.clone())", access))
            } else if copy_scalar(&a.field_type) {
                Some(access)
            } else {
                Some(format!("{}.clone()", access))
            }
        }
        ArgKind::ScalarGen => {
            let entry = GENERATORS.get(a.field_type.as_str())?;
            match entry.form {
                GenForm::Cast(c) => Some(format!("{} as {}", access, c)),
                GenForm::Helper(h) => Some(format!("{}(&{})", h, access)),
            }
        }
        ArgKind::PkgConst => {
            if let Some(rest) = a.field_type.strip_prefix("repeated ") {
                Some(format!("convert_{}(&{})", new_from_fuzz(rest), access))
            } else {
                Some(format!("{}({})", new_from_fuzz(&a.field_type), access))
            }
        }
        ArgKind::PkgStruct => Some(format!(
            "{}(&{}.clone().unwrap_or_default())",
            new_from_fuzz(&a.field_type),
            access
        )),
        ArgKind::PkgProduced
        | ArgKind::PkgProducedArray
        | ArgKind::Unhandled
        | ArgKind::Unknown => None,
    }
}

fn copy_scalar(field_type: &str) -> bool {
    matches!(
        field_type,
        "uint32" | "int32" | "uint64" | "int64" | "bool" | "float" | "double"
    )
}

fn variant_name(f: &FuncPlan) -> String {
    upper_camel(&f.schema_name())
}

fn message_access(a: &FuncArg) -> String {
    format!("m.{}{}", snake(&a.name), a.suffix)
}

// A scalar argument needs a prepared local when it is passed mutably or is
// the write-only `dst` buffer of the dst/src convention.
fn scalar_prepped(a: &FuncArg, f: &FuncPlan) -> bool {
    let dst = a.name == "dst"
        && a.field_type == "bytes"
        && f.src_dst == (SRCDST_DST | SRCDST_SRC);
    dst || a.prefix == "&mut "
}

fn limits_key(f: &FuncPlan, a: &FuncArg) -> String {
    format!("{}{}.{}", f.recv, f.name, a.name)
}

fn emit_dispatcher(w: &mut String, descr: &PackageDescription, opts: &HarnessOptions) {
    w.push_str("pub fn fuzz_ng_list(gen: &NgoloFuzzList) -> i32 {\n");
    w.push_str("    REPRO_INIT.call_once(|| {\n");
    w.push_str("        if let Ok(path) = std::env::var(\"FUZZ_NG_REPRODUCER\") {\n");
    w.push_str("            if !path.is_empty() {\n");
    w.push_str("                match std::fs::File::create(&path) {\n");
    w.push_str("                    Ok(mut f) => print_ng_list(gen, &mut f),\n");
    w.push_str(
        "                    Err(err) => panic!(\"Failed to open {}: {}\", path, err),\n",
    );
    w.push_str("                }\n");
    w.push_str("            }\n");
    w.push_str("        }\n");
    w.push_str("    });\n");
    for t in &descr.types {
        if t.is_opaque() {
            w.push_str(&format!(
                "    let mut {}: Vec<{}::{}> = Vec::new();\n",
                ring(&t.name),
                opts.pkg,
                t.name
            ));
            w.push_str(&format!("    let mut {}_index: usize = 0;\n", ring(&t.name)));
        }
    }
    if descr.functions.is_empty() {
        w.push_str("    1\n}\n\n");
        return;
    }
    w.push_str("    for one in &gen.list {\n");
    w.push_str("        let Some(item) = &one.item else { continue };\n");
    w.push_str("        match item {\n");
    for f in &descr.functions {
        emit_dispatch_case(w, f, opts);
    }
    w.push_str("        }\n");
    w.push_str("    }\n");
    w.push_str("    1\n");
    w.push_str("}\n\n");
}

fn emit_dispatch_case(w: &mut String, f: &FuncPlan, opts: &HarnessOptions) {
    w.push_str(&format!(
        "            ngolo_fuzz_one::Item::{}(m) => {{\n",
        variant_name(f)
    ));
    for (i, a) in f.args.iter().enumerate() {
        match a.kind {
            ArgKind::PkgProduced => {
                let r = ring(&a.field_type);
                w.push_str(&format!("                if {}.is_empty() {{\n", r));
                w.push_str("                    continue;\n");
                w.push_str("                }\n");
                w.push_str(&format!("                {}_index %= {}.len();\n", r, r));
                if a.prefix.is_empty() {
                    // Consuming call: the value is taken out of the buffer.
                    w.push_str(&format!(
                        "                let arg{} = {}.remove({}_index);\n",
                        i, r, r
                    ));
                } else {
                    w.push_str(&format!(
                        "                let arg{} = {}{}[{}_index];\n",
                        i, a.prefix, r, r
                    ));
                    w.push_str(&format!(
                        "                {}_index = ({}_index + 1) % {}.len();\n",
                        r, r, r
                    ));
                }
            }
            ArgKind::ScalarGen => {
                let Some(entry) = GENERATORS.get(a.field_type.as_str()) else {
                    continue;
                };
                let mutkw = if a.prefix == "&mut " { "mut " } else { "" };
                match entry.form {
                    GenForm::Cast(c) => {
                        w.push_str(&format!(
                            "                let {}arg{} = {} as {};\n",
                            mutkw,
                            i,
                            message_access(a),
                            c
                        ));
                    }
                    GenForm::Helper(h) => {
                        w.push_str(&format!(
                            "                let {}arg{} = {}(&{});\n",
                            mutkw,
                            i,
                            h,
                            message_access(a)
                        ));
                    }
                }
            }
            ArgKind::PkgConst => {
                w.push_str(&format!(
                    "                let arg{} = {}({});\n",
                    i,
                    new_from_fuzz(&a.field_type),
                    message_access(a)
                ));
            }
            ArgKind::PkgStruct => {
                w.push_str(&format!(
                    "                let arg{} = {}(&{}.clone().unwrap_or_default());\n",
                    i,
                    new_from_fuzz(&a.field_type),
                    message_access(a)
                ));
            }
            ArgKind::Scalar => {
                if a.name == "dst"
                    && a.field_type == "bytes"
                    && f.src_dst == (SRCDST_DST | SRCDST_SRC)
                {
                    // Write-only destination, pre-sized from the source.
                    w.push_str(&format!(
                        "                let mut arg{} = vec![0u8; 2 * m.src.len()];\n",
                        i
                    ));
                } else if a.prefix == "&mut " {
                    w.push_str(&format!(
                        "                let mut arg{} = {}.clone();\n",
                        i,
                        message_access(a)
                    ));
                }
            }
            ArgKind::PkgProducedArray | ArgKind::Unhandled | ArgKind::Unknown => {}
        }
    }

    let call = call_expr(f, opts);
    let value_atoms: Vec<&FuncResult> = f
        .returns
        .iter()
        .filter(|r| r.field_type != "error")
        .collect();
    let has_error = f.returns.len() != value_atoms.len();
    let use_return = f.returns.iter().any(|r| r.used);

    if !use_return {
        if f.returns.is_empty() {
            w.push_str(&format!("                {};\n", call));
        } else {
            w.push_str(&format!("                let _ = {};\n", call));
        }
    } else if value_atoms.is_empty() {
        // Result<(), E>: only the error path matters.
        w.push_str(&format!("                if {}.is_err() {{\n", call));
        w.push_str("                    return 0;\n");
        w.push_str("                }\n");
    } else {
        let bindings: Vec<String> = value_atoms
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if r.used {
                    format!("r{}", i)
                } else {
                    "_".to_string()
                }
            })
            .collect();
        let pat = if bindings.len() == 1 {
            bindings[0].clone()
        } else {
            format!("({})", bindings.join(", "))
        };
        if has_error {
            w.push_str(&format!("                let {} = match {} {{\n", pat, call));
            w.push_str("                    Ok(v) => v,\n");
            w.push_str("                    Err(_) => return 0,\n");
            w.push_str("                };\n");
        } else {
            w.push_str(&format!("                let {} = {};\n", pat, call));
        }
        for (i, r) in value_atoms.iter().enumerate() {
            if !r.used {
                continue;
            }
            let buf = ring(&r.field_type);
            if r.optional {
                w.push_str(&format!("                if let Some(v) = r{} {{\n", i));
                w.push_str(&format!("                    {}.push(v);\n", buf));
                w.push_str("                }\n");
            } else if r.suffix == "..." {
                w.push_str(&format!("                {}.extend(r{});\n", buf, i));
            } else if r.prefix == "*" {
                w.push_str(&format!("                {}.push(*r{});\n", buf, i));
            } else {
                w.push_str(&format!("                {}.push(r{});\n", buf, i));
            }
        }
    }
    w.push_str("            }\n");
}

fn call_expr(f: &FuncPlan, opts: &HarnessOptions) -> String {
    let mut call = match f.self_style {
        SelfStyle::Free => format!("{}::{}(", opts.pkg, f.name),
        SelfStyle::Assoc => format!("{}::{}::{}(", opts.pkg, f.self_ty, f.name),
        SelfStyle::Owned | SelfStyle::Ref | SelfStyle::RefMut => format!("arg0.{}(", f.name),
    };
    let method = !matches!(f.self_style, SelfStyle::Free | SelfStyle::Assoc);
    let mut comma = false;
    for (i, a) in f.args.iter().enumerate() {
        if method && i == 0 {
            continue;
        }
        if comma {
            call.push_str(", ");
        } else {
            comma = true;
        }
        let expr = match a.kind {
            ArgKind::Scalar => scalar_call_expr(a, f, i),
            ArgKind::PkgProduced => format!("arg{}", i),
            ArgKind::ScalarGen | ArgKind::PkgConst | ArgKind::PkgStruct => {
                if a.prefix == "&mut " {
                    format!("&mut arg{}", i)
                } else {
                    format!("{}arg{}", a.prefix, i)
                }
            }
            ArgKind::PkgProducedArray | ArgKind::Unhandled | ArgKind::Unknown => {
                format!("arg{}", i)
            }
        };
        call.push_str(&expr);
        if opts.limits.contains(&limits_key(f, a)) {
            // A constant mask is good enough to bound pathological sizes.
            call.push_str(" % 0x10001");
        }
    }
    call.push(')');
    call
}

fn scalar_call_expr(a: &FuncArg, f: &FuncPlan, i: usize) -> String {
    if scalar_prepped(a, f) {
        return if a.prefix == "&" {
            format!("&arg{}", i)
        } else if a.prefix == "&mut " {
            format!("&mut arg{}", i)
        } else {
            format!("arg{}", i)
        };
    }
    let access = message_access(a);
    match a.prefix {
        "&" => format!("&{}", access),
        _ => {
            if a.field_type == "NgoloFuzzAny" {
                format!("Box::new({}.clone())", access)
            } else if copy_scalar(&a.field_type) {
                access
            } else {
                format!("{}.clone()", access)
            }
        }
    }
}

fn emit_printer(w: &mut String, descr: &PackageDescription, opts: &HarnessOptions) {
    w.push_str("pub fn print_ng_list(gen: &NgoloFuzzList, w: &mut dyn std::io::Write) {\n");
    for t in &descr.types {
        if t.is_opaque() {
            w.push_str(&format!("    let mut {}_nb: usize = 0;\n", snake(&t.name)));
            w.push_str(&format!(
                "    let mut {}_index: usize = 0;\n",
                ring(&t.name)
            ));
        }
    }
    if descr.functions.is_empty() {
        w.push_str("}\n");
        return;
    }
    w.push_str("    for one in &gen.list {\n");
    w.push_str("        let Some(item) = &one.item else { continue };\n");
    w.push_str("        match item {\n");
    for f in &descr.functions {
        emit_print_case(w, f, opts);
    }
    w.push_str("        }\n");
    w.push_str("    }\n");
    w.push_str("}\n");
}

fn emit_print_case(w: &mut String, f: &FuncPlan, opts: &HarnessOptions) {
    w.push_str(&format!(
        "            ngolo_fuzz_one::Item::{}(m) => {{\n",
        variant_name(f)
    ));
    for a in &f.args {
        if a.kind == ArgKind::PkgProduced {
            w.push_str(&format!(
                "                if {}_nb == 0 {{\n",
                snake(&a.field_type)
            ));
            w.push_str("                    continue;\n");
            w.push_str("                }\n");
        }
    }

    let value_atoms: Vec<&FuncResult> = f
        .returns
        .iter()
        .filter(|r| r.field_type != "error")
        .collect();
    let printable = value_atoms.iter().any(|r| r.used);

    // The transcript line is itself a format string; braces are escaped.
    let mut fmt = String::new();
    let mut fargs: Vec<String> = Vec::new();
    if printable {
        let parts: Vec<String> = value_atoms
            .iter()
            .map(|r| {
                if r.used {
                    fargs.push(format!("{}_nb", snake(&r.field_type)));
                    format!("{}{{}}", snake(&r.field_type))
                } else {
                    "_".to_string()
                }
            })
            .collect();
        if parts.len() == 1 {
            fmt.push_str(&format!("let {} = ", parts[0]));
        } else {
            fmt.push_str(&format!("let ({}) = ", parts.join(", ")));
        }
    }
    match f.self_style {
        SelfStyle::Free => fmt.push_str(&format!("{}::{}(", opts.pkg, f.name)),
        SelfStyle::Assoc => fmt.push_str(&format!("{}::{}::{}(", opts.pkg, f.self_ty, f.name)),
        SelfStyle::Owned | SelfStyle::Ref | SelfStyle::RefMut => {
            let recv = &f.args[0];
            match recv.kind {
                ArgKind::PkgConst | ArgKind::PkgStruct => {
                    fmt.push_str(&format!("{}({{:?}}).{}(", new_from_fuzz(&recv.field_type), f.name));
                    fargs.push(message_access(recv));
                }
                _ => {
                    fmt.push_str(&format!("{}{{}}.{}(", snake(&recv.field_type), f.name));
                    fargs.push(format!("{}_index", ring(&recv.field_type)));
                }
            }
        }
    }
    let method = !matches!(f.self_style, SelfStyle::Free | SelfStyle::Assoc);
    let mut comma = false;
    for (i, a) in f.args.iter().enumerate() {
        if method && i == 0 {
            continue;
        }
        if comma {
            fmt.push_str(", ");
        } else {
            comma = true;
        }
        match a.kind {
            ArgKind::Scalar => {
                fmt.push_str("{:?}");
                fargs.push(message_access(a));
            }
            ArgKind::ScalarGen => {
                match GENERATORS.get(a.field_type.as_str()).map(|e| e.form) {
                    Some(GenForm::Cast(c)) => fmt.push_str(&format!("{{:?}} as {}", c)),
                    Some(GenForm::Helper(h)) => fmt.push_str(&format!("{}({{:?}})", h)),
                    None => fmt.push_str("{:?}"),
                }
                fargs.push(message_access(a));
            }
            ArgKind::PkgConst | ArgKind::PkgStruct => {
                fmt.push_str(&format!("{}({{:?}})", new_from_fuzz(&a.field_type)));
                fargs.push(message_access(a));
            }
            ArgKind::PkgProduced => {
                fmt.push_str(&format!("{}{{}}", snake(&a.field_type)));
                fargs.push(format!("{}_index", ring(&a.field_type)));
            }
            ArgKind::PkgProducedArray | ArgKind::Unhandled | ArgKind::Unknown => {
                fmt.push_str("{:?}");
                fargs.push(message_access(a));
            }
        }
        if opts.limits.contains(&limits_key(f, a)) {
            fmt.push_str(" % 0x10001");
        }
    }
    fmt.push(')');

    if fargs.is_empty() {
        w.push_str(&format!(
            "                let _ = writeln!(w, \"{}\");\n",
            fmt
        ));
    } else {
        w.push_str(&format!(
            "                let _ = writeln!(w, \"{}\", {});\n",
            fmt,
            fargs.join(", ")
        ));
    }

    for r in &value_atoms {
        if r.used {
            w.push_str(&format!(
                "                {}_nb += 1;\n",
                snake(&r.field_type)
            ));
        }
    }
    for a in &f.args {
        if a.kind == ArgKind::PkgProduced {
            w.push_str(&format!(
                "                {}_index = ({}_index + 1) % {}_nb;\n",
                ring(&a.field_type),
                ring(&a.field_type),
                snake(&a.field_type)
            ));
        }
    }
    w.push_str("            }\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::describe_files;

    fn harness(src: &str) -> String {
        let file = syn::parse_file(src).expect("source");
        let d = describe_files(&[file], "").expect("describe");
        render_harness(
            &d,
            &HarnessOptions {
                pkg: "tgt".to_string(),
                limits: BTreeSet::new(),
                source_digest: "test".to_string(),
            },
        )
    }

    #[test]
    fn free_function_dispatch() {
        let h = harness("pub fn compute(n: u32, data: &[u8]) -> i32 { 0 }");
        assert!(h.contains("ngolo_fuzz_one::Item::Compute(m) => {"));
        assert!(h.contains("let _ = tgt::compute(m.n, &m.data);"));
        assert!(h.starts_with("// Generated by ngfuzz."));
        assert!(h.contains("#![cfg(fuzzing)]"));
    }

    #[test]
    fn ring_buffer_threading() {
        let h = harness(
            "pub struct Parser { s: u8 }\n\
             pub fn new_parser() -> Parser { todo!() }\n\
             impl Parser { pub fn feed(&mut self, data: &[u8]) {} }",
        );
        assert!(h.contains("let mut parser_results: Vec<tgt::Parser> = Vec::new();"));
        assert!(h.contains("if parser_results.is_empty() {"));
        assert!(h.contains("let arg0 = &mut parser_results[parser_results_index];"));
        assert!(h.contains(
            "parser_results_index = (parser_results_index + 1) % parser_results.len();"
        ));
        assert!(h.contains("parser_results.push(r0);"));
        assert!(h.contains("arg0.feed(&m.data)"));
    }

    #[test]
    fn enum_new_from_fuzz_mapping() {
        let h = harness(
            "pub enum Mode { Fast, Small, Strict }\n\
             pub fn apply(m: Mode) {}",
        );
        assert!(h.contains("pub fn mode_new_from_fuzz(p: i32) -> tgt::Mode {"));
        assert!(h.contains("        1 => tgt::Mode::Small,\n"));
        assert!(h.contains("        2 => tgt::Mode::Strict,\n"));
        assert!(h.contains("        _ => tgt::Mode::Fast,\n"));
    }

    #[test]
    fn dst_preallocated_from_src() {
        let h = harness("pub fn encode(dst: &mut [u8], src: &[u8]) -> usize { 0 }");
        assert!(h.contains("let mut arg0 = vec![0u8; 2 * m.src.len()];"));
        assert!(h.contains("tgt::encode(&mut arg0, &m.src)"));
    }

    #[test]
    fn error_results_short_circuit() {
        let h = harness(
            "pub struct Conn { c: u8 }\n\
             pub fn open(addr: &str) -> Result<Conn, std::io::Error> { todo!() }\n\
             impl Conn { pub fn ping(&self) {} }",
        );
        assert!(h.contains("let r0 = match tgt::open(&m.addr) {"));
        assert!(h.contains("Err(_) => return 0,"));
        assert!(h.contains("conn_results.push(r0);"));
    }

    #[test]
    fn limits_mask_applied() {
        let file = syn::parse_file("pub fn prime(bits: usize) {}").expect("source");
        let d = describe_files(&[file], "").expect("describe");
        let mut limits = BTreeSet::new();
        limits.insert("prime.bits".to_string());
        let h = render_harness(
            &d,
            &HarnessOptions {
                pkg: "tgt".to_string(),
                limits,
                source_digest: "test".to_string(),
            },
        );
        assert!(h.contains("tgt::prime(arg0 % 0x10001)"));
    }

    #[test]
    fn reproducer_and_corpus_plumbing_present() {
        let h = harness("pub fn compute(n: u32) {}");
        assert!(h.contains("FUZZ_NG_REPRODUCER"));
        assert!(h.contains("FUZZ_NG_CORPUS_DIR"));
        assert!(h.contains("pub fn ngolo_corpus_marshal"));
        assert!(h.contains("pub fn print_ng_list"));
        assert!(h.contains("resume_unwind"));
    }
}
