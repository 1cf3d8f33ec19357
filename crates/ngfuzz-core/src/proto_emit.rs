//! Schema emitter: renders the plan as a proto3 file. Field numbers start
//! at 1 in every message and follow plan order, so identical input yields
//! byte-identical output.

use crate::astutil::{snake, upper_camel};
use crate::classify::{ArgKind, GENERATORS};
use crate::plan::{FuncArg, PackageDescription};

pub fn render_proto(descr: &PackageDescription, source_digest: &str) -> String {
    let mut w = String::new();
    w.push_str("// Generated by ngfuzz. Do not edit.\n");
    w.push_str(&format!("// source-sha256: {}\n", source_digest));
    w.push_str("syntax = \"proto3\";\n");
    w.push_str("package ngolofuzz;\n\n");

    for t in &descr.types {
        if t.is_enum() {
            w.push_str(&format!("enum {}Enum {{\n", upper_camel(&t.name)));
            for (i, v) in t.values.iter().enumerate() {
                w.push_str(&format!("  {} = {};\n", v, i));
            }
            w.push_str("}\n\n");
        } else if t.is_struct() {
            w.push_str(&format!("message {}Struct {{\n", upper_camel(&t.name)));
            let mut idx = 1;
            for a in &t.fields {
                if let Some(ft) = proto_field_type(a) {
                    w.push_str(&format!("  {} {}{} = {};\n", ft, snake(&a.name), a.suffix, idx));
                    idx += 1;
                }
            }
            w.push_str("}\n\n");
        }
    }

    for f in &descr.functions {
        w.push_str(&format!("message {}Args {{\n", f.schema_name()));
        let mut idx = 1;
        for a in &f.args {
            if let Some(ft) = proto_field_type(a) {
                w.push_str(&format!("  {} {}{} = {};\n", ft, snake(&a.name), a.suffix, idx));
                idx += 1;
            }
        }
        w.push_str("}\n");
    }
    w.push('\n');

    w.push_str("message NgoloFuzzOne {\n");
    w.push_str("  oneof item {\n");
    for (i, f) in descr.functions.iter().enumerate() {
        let name = f.schema_name();
        w.push_str(&format!("    {}Args {} = {};\n", name, snake(&name), i + 1));
    }
    w.push_str("  }\n}\n\n");

    w.push_str("message NgoloFuzzAny {\n");
    w.push_str("  oneof item {\n");
    w.push_str("    double DoubleArgs = 1;\n");
    w.push_str("    int64 Int64Args = 2;\n");
    w.push_str("    bool BoolArgs = 3;\n");
    w.push_str("    string StringArgs = 4;\n");
    w.push_str("    bytes BytesArgs = 5;\n");
    w.push_str("  }\n}\n\n");

    w.push_str("message NgoloFuzzList { repeated NgoloFuzzOne list = 1; }\n");

    w
}

/// Wire shape of one argument, `None` for ring-buffer arguments which have
/// no schema presence.
fn proto_field_type(a: &FuncArg) -> Option<String> {
    match a.kind {
        ArgKind::Scalar => Some(a.field_type.clone()),
        ArgKind::ScalarGen => GENERATORS
            .get(a.field_type.as_str())
            .map(|e| e.proto.to_string()),
        ArgKind::PkgConst => {
            if let Some(rest) = a.field_type.strip_prefix("repeated ") {
                Some(format!("repeated {}Enum", upper_camel(rest)))
            } else {
                Some(format!("{}Enum", upper_camel(&a.field_type)))
            }
        }
        ArgKind::PkgStruct => Some(format!("{}Struct", upper_camel(&a.field_type))),
        ArgKind::PkgProduced
        | ArgKind::PkgProducedArray
        | ArgKind::Unhandled
        | ArgKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::describe_files;

    fn proto(src: &str) -> String {
        let file = syn::parse_file(src).expect("source");
        let d = describe_files(&[file], "").expect("describe");
        render_proto(&d, "test")
    }

    #[test]
    fn free_function_schema() {
        let p = proto("pub fn compute(n: u32, data: &[u8]) -> i32 { 0 }");
        assert!(p.contains("message ComputeArgs {\n  uint32 n = 1;\n  bytes data = 2;\n}"));
        assert!(p.contains("    ComputeArgs compute = 1;\n"));
        assert!(p.contains("message NgoloFuzzList { repeated NgoloFuzzOne list = 1; }"));
    }

    #[test]
    fn enum_schema_counts_from_zero() {
        let p = proto(
            "pub enum Mode { Fast, Small, Strict }\n\
             pub fn apply(m: Mode) {}",
        );
        assert!(p.contains("enum ModeEnum {\n  Fast = 0;\n  Small = 1;\n  Strict = 2;\n}"));
        assert!(p.contains("message ApplyArgs {\n  ModeEnum m = 1;\n}"));
    }

    #[test]
    fn produced_args_have_no_schema_field() {
        let p = proto(
            "pub struct Parser { s: u8 }\n\
             pub fn new_parser() -> Parser { todo!() }\n\
             impl Parser { pub fn feed(&mut self, data: &[u8]) {} }",
        );
        assert!(p.contains("message ParserNgdotFeedArgs {\n  bytes data = 1;\n}"));
        assert!(p.contains("    NewParserArgs new_parser = 1;\n"));
        assert!(p.contains("    ParserNgdotFeedArgs parser_ngdot_feed = 2;\n"));
    }

    #[test]
    fn generator_args_use_surrogate_types() {
        let p = proto("pub fn run(count: usize, r: &mut dyn std::io::Read) {}");
        assert!(p.contains("message RunArgs {\n  uint64 count = 1;\n  bytes r = 2;\n}"));
    }

    #[test]
    fn identical_input_identical_output() {
        let src = "pub fn a(x: u32) {}\npub fn b(y: &str) {}";
        assert_eq!(proto(src), proto(src));
    }
}
