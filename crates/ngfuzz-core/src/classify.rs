//! Type-expression classifier: maps one `syn::Type` to an argument kind and
//! the field-type name used by the emitters. Pure, no mutation, no I/O.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use syn::Type;

use crate::astutil::short_name;

/// Argument kind. Everything downstream of the classifier is expressed in
/// this vocabulary; every consumer matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArgKind {
    /// Representable directly in the schema.
    Scalar,
    /// Scalar in the schema, adapted to the host type by a built-in generator.
    ScalarGen,
    /// Package type obtained from a previous call's return value.
    PkgProduced,
    /// Array of package-produced values; not threadable, drops the function.
    PkgProducedArray,
    /// Package type backed by exported constants; an enum in the schema.
    PkgConst,
    /// Package struct built inline from a generated surrogate message.
    PkgStruct,
    /// Known-unsupported shape.
    Unhandled,
    /// Shape the classifier did not recognize.
    Unknown,
}

/// How a built-in generator adapts the schema surrogate to the host type.
#[derive(Debug, Clone, Copy)]
pub enum GenForm {
    /// `as`-cast to the named primitive.
    Cast(&'static str),
    /// Call of a named helper from the runtime template.
    Helper(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct GenEntry {
    /// Scalar type written into the schema.
    pub proto: &'static str,
    pub form: GenForm,
}

/// The built-in generator table. Data, not code: the classifier hands out
/// the keys, the emitters look the rest up here.
pub static GENERATORS: Lazy<BTreeMap<&'static str, GenEntry>> = Lazy::new(|| {
    BTreeMap::from([
        ("usize", GenEntry { proto: "uint64", form: GenForm::Cast("usize") }),
        ("isize", GenEntry { proto: "int64", form: GenForm::Cast("isize") }),
        ("u8", GenEntry { proto: "uint32", form: GenForm::Cast("u8") }),
        ("u16", GenEntry { proto: "uint32", form: GenForm::Cast("u16") }),
        ("char", GenEntry { proto: "string", form: GenForm::Helper("get_char") }),
        ("io.Read", GenEntry { proto: "bytes", form: GenForm::Helper("create_reader") }),
        ("io.BufRead", GenEntry { proto: "bytes", form: GenForm::Helper("create_bufreader") }),
        ("io.Write", GenEntry { proto: "bytes", form: GenForm::Helper("create_writer") }),
        ("io.ReadWrite", GenEntry { proto: "bytes", form: GenForm::Helper("create_fuzzing_conn") }),
        ("BigInt", GenEntry { proto: "bytes", form: GenForm::Helper("create_big_int") }),
        ("[]usize", GenEntry { proto: "repeated uint64", form: GenForm::Helper("convert_usize_array") }),
        ("[]u16", GenEntry { proto: "repeated uint32", form: GenForm::Helper("convert_u16_array") }),
    ])
});

/// Classify one type expression. First match wins; the precedence follows
/// the argument-kind table top to bottom.
pub fn classify(ty: &Type) -> (ArgKind, String) {
    match ty {
        Type::Paren(p) => classify(&p.elem),
        Type::Group(g) => classify(&g.elem),
        Type::Reference(r) => classify_pointee(&r.elem),
        Type::Path(p) => classify_path(p),
        Type::Slice(s) => classify_seq(&s.elem, false),
        Type::Array(a) => classify_seq(&a.elem, true),
        Type::TraitObject(t) => classify_bounds(t.bounds.iter()),
        Type::ImplTrait(t) => classify_bounds(t.bounds.iter()),
        Type::BareFn(_) | Type::Ptr(_) | Type::Tuple(_) | Type::Never(_) => {
            (ArgKind::Unhandled, String::new())
        }
        _ => (ArgKind::Unknown, String::new()),
    }
}

// A reference classifies as its pointee; the borrow shape only matters for
// the call-site prefix, which the plan builder derives separately.
fn classify_pointee(elem: &Type) -> (ArgKind, String) {
    match elem {
        Type::Path(p) if p.path.is_ident("str") => (ArgKind::Scalar, "string".to_string()),
        Type::Slice(s) => classify_seq(&s.elem, false),
        other => classify(other),
    }
}

fn classify_path(p: &syn::TypePath) -> (ArgKind, String) {
    if p.qself.is_some() {
        return (ArgKind::Unknown, String::new());
    }
    if let Some(ident) = p.path.get_ident() {
        let name = ident.to_string();
        match name.as_str() {
            "u32" => return (ArgKind::Scalar, "uint32".to_string()),
            "i32" => return (ArgKind::Scalar, "int32".to_string()),
            "u64" => return (ArgKind::Scalar, "uint64".to_string()),
            "i64" => return (ArgKind::Scalar, "int64".to_string()),
            "bool" => return (ArgKind::Scalar, "bool".to_string()),
            "f32" => return (ArgKind::Scalar, "float".to_string()),
            "f64" => return (ArgKind::Scalar, "double".to_string()),
            "String" | "str" => return (ArgKind::Scalar, "string".to_string()),
            "usize" | "isize" | "char" | "u8" | "u16" => return (ArgKind::ScalarGen, name),
            // No protobuf surrogate for 128-bit integers.
            "u128" | "i128" => return (ArgKind::Unhandled, String::new()),
            "BigInt" => return (ArgKind::ScalarGen, "BigInt".to_string()),
            _ => return (ArgKind::PkgProduced, name),
        }
    }
    let Some(last) = p.path.segments.last() else {
        return (ArgKind::Unknown, String::new());
    };
    match last.ident.to_string().as_str() {
        "Vec" => {
            if let Some(inner) = crate::astutil::first_type_arg(last) {
                return classify_seq(inner, false);
            }
            (ArgKind::Unknown, String::new())
        }
        "Box" => {
            if let Some(inner) = crate::astutil::first_type_arg(last) {
                return classify(inner);
            }
            (ArgKind::Unknown, String::new())
        }
        "HashMap" | "BTreeMap" => classify_map(last),
        // An optional or fallible argument has no stable call shape.
        "Option" | "Result" => (ArgKind::Unhandled, String::new()),
        "BigInt" => (ArgKind::ScalarGen, "BigInt".to_string()),
        _ => match short_name(&Type::Path(p.clone())) {
            Some(name) => (ArgKind::PkgProduced, name),
            None => (ArgKind::Unknown, String::new()),
        },
    }
}

fn classify_map(seg: &syn::PathSegment) -> (ArgKind, String) {
    let syn::PathArguments::AngleBracketed(ab) = &seg.arguments else {
        return (ArgKind::Unhandled, String::new());
    };
    let mut types = ab.args.iter().filter_map(|a| match a {
        syn::GenericArgument::Type(t) => Some(t),
        _ => None,
    });
    let (Some(key), Some(val)) = (types.next(), types.next()) else {
        return (ArgKind::Unhandled, String::new());
    };
    let (kc, kn) = classify(key);
    if kc == ArgKind::Scalar && map_key_ok(&kn) {
        let (vc, vn) = classify(val);
        if vc == ArgKind::Scalar && !vn.contains(' ') && vn != "NgoloFuzzAny" {
            return (ArgKind::Scalar, format!("map<{}, {}>", kn, vn));
        }
    }
    (ArgKind::Unhandled, String::new())
}

// proto3 map keys: integral, bool or string.
fn map_key_ok(name: &str) -> bool {
    matches!(name, "int32" | "int64" | "uint32" | "uint64" | "bool" | "string")
}

fn classify_seq(elem: &Type, fixed: bool) -> (ArgKind, String) {
    let elem = peel_ref(elem);
    match elem {
        Type::Slice(inner) => {
            // Slice of byte slices.
            if let Type::Path(p) = peel_ref(&inner.elem) {
                if p.path.is_ident("u8") && !fixed {
                    return (ArgKind::Scalar, "repeated bytes".to_string());
                }
            }
            (ArgKind::Unhandled, String::new())
        }
        Type::Path(p) => {
            if let Some(ident) = p.path.get_ident() {
                match ident.to_string().as_str() {
                    "u8" => {
                        if fixed {
                            // No fixed-size arrays in protobuf.
                            return (ArgKind::Unhandled, String::new());
                        }
                        return (ArgKind::Scalar, "bytes".to_string());
                    }
                    "u16" => return (ArgKind::ScalarGen, "[]u16".to_string()),
                    "usize" => return (ArgKind::ScalarGen, "[]usize".to_string()),
                    "f64" => return (ArgKind::Scalar, "repeated double".to_string()),
                    "String" | "str" => return (ArgKind::Scalar, "repeated string".to_string()),
                    _ => {}
                }
            }
            if let Some(last) = p.path.segments.last() {
                if last.ident == "Vec" {
                    if let Some(inner) = crate::astutil::first_type_arg(last) {
                        if let Type::Path(ip) = peel_ref(inner) {
                            if ip.path.is_ident("u8") {
                                return (ArgKind::Scalar, "repeated bytes".to_string());
                            }
                        }
                    }
                }
            }
            if fixed {
                return (ArgKind::Unhandled, String::new());
            }
            match short_name(elem) {
                Some(name) => (ArgKind::PkgProducedArray, name),
                None => (ArgKind::Unknown, String::new()),
            }
        }
        _ => (ArgKind::Unhandled, String::new()),
    }
}

fn peel_ref(ty: &Type) -> &Type {
    match ty {
        Type::Reference(r) => peel_ref(&r.elem),
        Type::Paren(p) => peel_ref(&p.elem),
        Type::Group(g) => peel_ref(&g.elem),
        other => other,
    }
}

fn classify_bounds<'a>(
    bounds: impl Iterator<Item = &'a syn::TypeParamBound>,
) -> (ArgKind, String) {
    let mut traits: Vec<String> = Vec::new();
    for b in bounds {
        match b {
            syn::TypeParamBound::Trait(t) => {
                let Some(seg) = t.path.segments.last() else {
                    return (ArgKind::Unhandled, String::new());
                };
                let name = seg.ident.to_string();
                // Marker bounds do not change what we can synthesize.
                if matches!(name.as_str(), "Send" | "Sync" | "Unpin") {
                    continue;
                }
                traits.push(name);
            }
            syn::TypeParamBound::Lifetime(_) => continue,
            _ => return (ArgKind::Unhandled, String::new()),
        }
    }
    traits.sort();
    traits.dedup();
    let key = match traits.iter().map(String::as_str).collect::<Vec<_>>()[..] {
        ["Any"] => return (ArgKind::Scalar, "NgoloFuzzAny".to_string()),
        ["Read"] => "io.Read",
        ["BufRead"] => "io.BufRead",
        ["Write"] => "io.Write",
        ["Read", "Write"] => "io.ReadWrite",
        _ => return (ArgKind::Unhandled, String::new()),
    };
    (ArgKind::ScalarGen, key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cl(src: &str) -> (ArgKind, String) {
        classify(&syn::parse_str(src).expect("type"))
    }

    #[test]
    fn scalars() {
        assert_eq!(cl("u32"), (ArgKind::Scalar, "uint32".to_string()));
        assert_eq!(cl("f64"), (ArgKind::Scalar, "double".to_string()));
        assert_eq!(cl("&str"), (ArgKind::Scalar, "string".to_string()));
        assert_eq!(cl("String"), (ArgKind::Scalar, "string".to_string()));
        assert_eq!(cl("&[u8]"), (ArgKind::Scalar, "bytes".to_string()));
        assert_eq!(cl("Vec<u8>"), (ArgKind::Scalar, "bytes".to_string()));
        assert_eq!(cl("Vec<Vec<u8>>"), (ArgKind::Scalar, "repeated bytes".to_string()));
        assert_eq!(cl("&[&[u8]]"), (ArgKind::Scalar, "repeated bytes".to_string()));
        assert_eq!(cl("Vec<String>"), (ArgKind::Scalar, "repeated string".to_string()));
        assert_eq!(cl("&[f64]"), (ArgKind::Scalar, "repeated double".to_string()));
    }

    #[test]
    fn scalar_generators() {
        assert_eq!(cl("usize"), (ArgKind::ScalarGen, "usize".to_string()));
        assert_eq!(cl("char"), (ArgKind::ScalarGen, "char".to_string()));
        assert_eq!(cl("&[u16]"), (ArgKind::ScalarGen, "[]u16".to_string()));
        assert_eq!(cl("Vec<usize>"), (ArgKind::ScalarGen, "[]usize".to_string()));
        assert_eq!(cl("&mut dyn std::io::Read"), (ArgKind::ScalarGen, "io.Read".to_string()));
        assert_eq!(cl("impl BufRead"), (ArgKind::ScalarGen, "io.BufRead".to_string()));
        assert_eq!(
            cl("&mut (dyn Read + Write)"),
            (ArgKind::ScalarGen, "io.ReadWrite".to_string())
        );
        assert_eq!(cl("&num_bigint::BigInt"), (ArgKind::ScalarGen, "BigInt".to_string()));
    }

    #[test]
    fn maps() {
        assert_eq!(
            cl("HashMap<String, u32>"),
            (ArgKind::Scalar, "map<string, uint32>".to_string())
        );
        assert_eq!(cl("BTreeMap<f64, u32>").0, ArgKind::Unhandled);
        assert_eq!(cl("HashMap<String, Frame>").0, ArgKind::Unhandled);
    }

    #[test]
    fn any_is_scalar() {
        assert_eq!(cl("&dyn Any"), (ArgKind::Scalar, "NgoloFuzzAny".to_string()));
        assert_eq!(
            cl("Box<dyn std::any::Any>"),
            (ArgKind::Scalar, "NgoloFuzzAny".to_string())
        );
    }

    #[test]
    fn unhandled_shapes() {
        assert_eq!(cl("fn(u32) -> u32").0, ArgKind::Unhandled);
        assert_eq!(cl("&dyn Iterator<Item = u8>").0, ArgKind::Unhandled);
        assert_eq!(cl("(u32, bool)").0, ArgKind::Unhandled);
        assert_eq!(cl("Option<u32>").0, ArgKind::Unhandled);
        assert_eq!(cl("[u8; 16]").0, ArgKind::Unhandled);
        assert_eq!(cl("u128").0, ArgKind::Unhandled);
    }

    #[test]
    fn package_types() {
        assert_eq!(cl("Frame"), (ArgKind::PkgProduced, "Frame".to_string()));
        assert_eq!(cl("&mut Decoder"), (ArgKind::PkgProduced, "Decoder".to_string()));
        assert_eq!(cl("Box<Frame>"), (ArgKind::PkgProduced, "Frame".to_string()));
        assert_eq!(cl("&[Frame]"), (ArgKind::PkgProducedArray, "Frame".to_string()));
        assert_eq!(cl("Vec<Frame>"), (ArgKind::PkgProducedArray, "Frame".to_string()));
    }
}
