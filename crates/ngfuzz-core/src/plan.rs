//! Plan builder: the two-phase producer/consumer analysis over the flagged
//! types map, constant discovery, struct harvesting and function filtering.
//! The output `PackageDescription` is build-once and read-only; the schema
//! and dispatcher emitters are independent consumers of it.

use anyhow::Result;
use syn::Type;

use crate::astutil::{is_pub, is_rust_keyword, upper_camel};
use crate::classify::{classify, ArgKind};
use crate::diagnostics::{warn, Diagnostic, DiagnosticCode, Phase};
use crate::introspect::{
    self, FnDecl, RetForm, SelfStyle, TypesMap, TYPE_ARG, TYPE_CONST, TYPE_RESULT, TYPE_STRUCTEXP,
};

pub const SRCDST_DST: u8 = 1;
pub const SRCDST_SRC: u8 = 2;

#[derive(Debug, Clone)]
pub struct FuncArg {
    pub name: String,
    pub field_type: String,
    pub kind: ArgKind,
    /// Call-site borrow adjustment: `""` owned, `"&"` shared, `"&mut "` mutable.
    pub prefix: &'static str,
    /// `"_"` when the schema field name would collide with a Rust keyword.
    pub suffix: &'static str,
}

#[derive(Debug, Clone)]
pub struct FuncResult {
    pub field_type: String,
    /// True iff the result type is produced and consumed in the plan, or is
    /// the error sentinel.
    pub used: bool,
    /// `"*"` for boxed results (stored after a deref).
    pub prefix: &'static str,
    /// `"..."` for vector results (extended into the ring buffer).
    pub suffix: &'static str,
    /// `Option`-shaped result, stored under an `if let Some`.
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct FuncPlan {
    /// Function name as written in the target crate.
    pub name: String,
    /// Schema namespace: empty for free functions, else `<SelfTy>Ngdot`.
    pub recv: String,
    /// Receiver/impl type name, empty for free functions.
    pub self_ty: String,
    pub self_style: SelfStyle,
    /// `"_"` tie-breaker when the schema name collides with a generated one.
    pub suffix: &'static str,
    pub args: Vec<FuncArg>,
    pub returns: Vec<FuncResult>,
    pub src_dst: u8,
}

impl FuncPlan {
    /// Name of the `Args` message and oneof variant, without the suffix.
    pub fn schema_name(&self) -> String {
        format!("{}{}{}", self.recv, upper_camel(&self.name), self.suffix)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypePlan {
    pub name: String,
    /// Non-empty for enum-backed types: constant identifiers in source
    /// order, first value is the schema default.
    pub values: Vec<String>,
    /// Constants are reached as `pkg::Type::V` instead of `pkg::V`.
    pub qualify: bool,
    /// Non-empty for struct-backed types: the classified exported fields.
    pub fields: Vec<FuncArg>,
    /// Some declared fields were skipped; construction needs a default fill.
    pub partial: bool,
}

impl TypePlan {
    pub fn is_enum(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn is_struct(&self) -> bool {
        self.values.is_empty() && !self.fields.is_empty()
    }

    pub fn is_opaque(&self) -> bool {
        self.values.is_empty() && self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackageDescription {
    pub functions: Vec<FuncPlan>,
    pub types: Vec<TypePlan>,
}

/// Build the package description from parsed sources. Pure over the syntax
/// trees: no file system, no target resolution.
pub fn describe_files(files: &[syn::File], exclude: &str) -> Result<PackageDescription> {
    let excludes: Vec<String> = if exclude.is_empty() {
        Vec::new()
    } else {
        exclude.split(',').map(str::to_string).collect()
    };

    let mut types_map = introspect::collect_types(files);
    let fns = introspect::collect_fns(files, &excludes);
    introspect::accumulate_flags(&mut types_map, &fns);

    let mut types: Vec<TypePlan> = Vec::new();
    let mut struct_todo: Vec<String> = Vec::new();
    let keys: Vec<String> = types_map.keys().cloned().collect();
    for k in &keys {
        let v = types_map[k];
        if v & (TYPE_RESULT | TYPE_ARG) == (TYPE_RESULT | TYPE_ARG) {
            types.push(TypePlan {
                name: k.clone(),
                ..TypePlan::default()
            });
        } else if v & TYPE_ARG != 0 {
            if let Some((values, qualify)) = pkg_type_consts(files, k) {
                // No producer, but exported constants we can enumerate.
                *types_map.get_mut(k).expect("flagged type") |= TYPE_CONST;
                types.push(TypePlan {
                    name: k.clone(),
                    values,
                    qualify,
                    ..TypePlan::default()
                });
            } else if v & TYPE_STRUCTEXP != 0 {
                struct_todo.push(k.clone());
            } else {
                warn(
                    DiagnosticCode::NGF0109UnproducedType,
                    Phase::Plan,
                    format!("type {} is used as argument but not produced", k),
                );
            }
        }
    }

    // Struct bodies are synthesized after all types got their final flags,
    // so field upgrades see settled constant information.
    for k in &struct_todo {
        let (fields, partial) = exported_struct_fields(files, k, &types_map);
        if fields.is_empty() {
            *types_map.get_mut(k).expect("flagged type") &= !TYPE_STRUCTEXP;
            warn(
                DiagnosticCode::NGF0110NoFusableFields,
                Phase::Plan,
                format!("struct {} has no fusable fields", k),
            );
        } else {
            types.push(TypePlan {
                name: k.clone(),
                fields,
                partial,
                ..TypePlan::default()
            });
        }
    }

    let mut functions: Vec<FuncPlan> = Vec::new();
    for fd in &fns {
        if let Some(f) = build_function(fd, &types_map)? {
            functions.push(f);
        }
    }

    Ok(PackageDescription { functions, types })
}

fn produced_and_consumed(types_map: &TypesMap, name: &str) -> bool {
    types_map
        .get(name)
        .map(|v| v & (TYPE_RESULT | TYPE_ARG) == (TYPE_RESULT | TYPE_ARG))
        .unwrap_or(false)
}

fn build_function(fd: &FnDecl, types_map: &TypesMap) -> Result<Option<FuncPlan>> {
    let pascal = upper_camel(&fd.name);
    let suffix = if pascal == "Marshal" || pascal == "Unmarshal" {
        "_"
    } else {
        ""
    };
    let mut plan = FuncPlan {
        name: fd.name.clone(),
        recv: String::new(),
        self_ty: fd.self_ty.clone(),
        self_style: fd.self_style,
        suffix,
        args: Vec::new(),
        returns: Vec::new(),
        src_dst: 0,
    };

    match fd.self_style {
        SelfStyle::Free => {}
        SelfStyle::Assoc => {
            if !types_map.contains_key(&fd.self_ty) {
                // The type itself is not exported; `pkg::T::f` is unnameable.
                warn(
                    DiagnosticCode::NGF0105UnproducedReceiver,
                    Phase::Plan,
                    format!("function {} is associated to unexported {}", fd.name, fd.self_ty),
                );
                return Ok(None);
            }
            plan.recv = format!("{}Ngdot", upper_camel(&fd.self_ty));
        }
        SelfStyle::Owned | SelfStyle::Ref | SelfStyle::RefMut => {
            let v = types_map.get(&fd.self_ty).copied().unwrap_or(0);
            let kind = if v & TYPE_CONST != 0 {
                ArgKind::PkgConst
            } else if v & TYPE_STRUCTEXP != 0 && v & TYPE_RESULT == 0 {
                ArgKind::PkgStruct
            } else if v & TYPE_RESULT == 0 {
                warn(
                    DiagnosticCode::NGF0105UnproducedReceiver,
                    Phase::Plan,
                    format!("function {} has unproduced receiver {}", fd.name, fd.self_ty),
                );
                return Ok(None);
            } else {
                ArgKind::PkgProduced
            };
            plan.recv = format!("{}Ngdot", upper_camel(&fd.self_ty));
            let prefix = match fd.self_style {
                SelfStyle::Ref => "&",
                SelfStyle::RefMut => "&mut ",
                _ => "",
            };
            plan.args.push(FuncArg {
                name: "self".to_string(),
                field_type: fd.self_ty.clone(),
                kind,
                prefix,
                suffix: "_",
            });
        }
    }

    let mut dropped = false;
    for (i, input) in fd.sig.inputs.iter().enumerate() {
        let syn::FnArg::Typed(pt) = input else { continue };
        let (mut kind, mut field_type) = classify(&pt.ty);
        if field_type == "Self" && !fd.self_ty.is_empty() {
            field_type = fd.self_ty.clone();
        }
        let arg_name = match &*pt.pat {
            syn::Pat::Ident(pi) => pi.ident.to_string().trim_start_matches("r#").to_string(),
            _ => format!("arg{}", i),
        };
        match kind {
            ArgKind::Unknown => {
                // A shape the classifier does not recognize is a classifier
                // bug; fail loudly instead of silently dropping coverage.
                anyhow::bail!(
                    "{}",
                    Diagnostic::error(
                        DiagnosticCode::NGF0101UnknownArgument,
                        Phase::Plan,
                        format!("unknown argument {} for {}{}", arg_name, plan.recv, fd.name),
                    )
                );
            }
            ArgKind::Unhandled => {
                warn(
                    DiagnosticCode::NGF0102UnhandledArgument,
                    Phase::Plan,
                    format!("unhandled argument {} for {}{}", arg_name, plan.recv, fd.name),
                );
                dropped = true;
                continue;
            }
            ArgKind::PkgProduced => {
                let v = types_map.get(&field_type).copied().unwrap_or(0);
                if v & TYPE_CONST != 0 {
                    kind = ArgKind::PkgConst;
                } else if v & TYPE_RESULT == 0 {
                    warn(
                        DiagnosticCode::NGF0103UnproducedArgument,
                        Phase::Plan,
                        format!("function {} has unproduced argument {}", fd.name, field_type),
                    );
                    dropped = true;
                    continue;
                }
            }
            ArgKind::PkgProducedArray => {
                warn(
                    DiagnosticCode::NGF0104UnproducedArrayArgument,
                    Phase::Plan,
                    format!("function {} has unproduced array argument {}", fd.name, field_type),
                );
                dropped = true;
                continue;
            }
            ArgKind::Scalar | ArgKind::ScalarGen | ArgKind::PkgConst | ArgKind::PkgStruct => {}
        }
        let arg_suffix = if is_rust_keyword(&arg_name) { "_" } else { "" };
        if field_type == "bytes" {
            // hex::encode_to_slice-style write-only destination buffers.
            if arg_name == "dst" {
                plan.src_dst |= SRCDST_DST;
            } else if arg_name == "src" {
                plan.src_dst |= SRCDST_SRC;
            }
        }
        plan.args.push(FuncArg {
            name: arg_name,
            field_type,
            kind,
            prefix: borrow_prefix(&pt.ty),
            suffix: arg_suffix,
        });
    }
    if dropped {
        return Ok(None);
    }

    let Some(atoms) = introspect::flatten_return(&fd.sig.output, &fd.self_ty) else {
        warn(
            DiagnosticCode::NGF0106UnhandledResult,
            Phase::Plan,
            format!("unhandled result for {}{}", plan.recv, fd.name),
        );
        return Ok(None);
    };
    for atom in atoms {
        let mut fr = FuncResult {
            field_type: atom.name,
            used: false,
            prefix: "",
            suffix: "",
            optional: false,
        };
        match atom.form {
            RetForm::Error => {
                fr.field_type = "error".to_string();
                fr.used = true;
            }
            RetForm::Direct => {
                fr.used = produced_and_consumed(types_map, &fr.field_type);
            }
            RetForm::Optional => {
                fr.optional = true;
                fr.used = produced_and_consumed(types_map, &fr.field_type);
            }
            RetForm::Boxed => {
                fr.prefix = "*";
                fr.used = produced_and_consumed(types_map, &fr.field_type);
            }
            RetForm::Spread => {
                fr.suffix = "...";
                fr.used = produced_and_consumed(types_map, &fr.field_type);
            }
            RetForm::Borrowed => {}
        }
        plan.returns.push(fr);
    }

    Ok(Some(plan))
}

fn borrow_prefix(ty: &Type) -> &'static str {
    match ty {
        Type::Paren(p) => borrow_prefix(&p.elem),
        Type::Group(g) => borrow_prefix(&g.elem),
        Type::Reference(r) => {
            if r.mutability.is_some() {
                "&mut "
            } else {
                "&"
            }
        }
        _ => "",
    }
}

/// Constant discovery for a type `T`, first non-empty source wins:
/// top-level `pub const _: T`, then associated consts of inherent impls,
/// then the variants of a unit-variant enum declaration. The boolean says
/// whether values are reached through the type (`pkg::T::V`).
pub fn pkg_type_consts(files: &[syn::File], k: &str) -> Option<(Vec<String>, bool)> {
    let mut values: Vec<String> = Vec::new();
    for file in files {
        for item in &file.items {
            let syn::Item::Const(c) = item else { continue };
            if is_pub(&c.vis) && type_is(&c.ty, k, "") {
                values.push(c.ident.to_string());
            }
        }
    }
    if !values.is_empty() {
        return Some((values, false));
    }

    for file in files {
        for item in &file.items {
            let syn::Item::Impl(imp) = item else { continue };
            if imp.trait_.is_some() || introspect::impl_self_name(&imp.self_ty).as_deref() != Some(k)
            {
                continue;
            }
            for ii in &imp.items {
                let syn::ImplItem::Const(c) = ii else { continue };
                if is_pub(&c.vis) && type_is(&c.ty, k, k) {
                    values.push(c.ident.to_string());
                }
            }
        }
    }
    if !values.is_empty() {
        return Some((values, true));
    }

    for file in files {
        for item in &file.items {
            let syn::Item::Enum(e) = item else { continue };
            if e.ident == k
                && is_pub(&e.vis)
                && !e.variants.is_empty()
                && e.variants
                    .iter()
                    .all(|v| matches!(v.fields, syn::Fields::Unit))
            {
                return Some((
                    e.variants.iter().map(|v| v.ident.to_string()).collect(),
                    true,
                ));
            }
        }
    }
    None
}

fn type_is(ty: &Type, k: &str, self_ty: &str) -> bool {
    let Type::Path(p) = ty else { return false };
    p.path.is_ident(k) || (!self_ty.is_empty() && self_ty == k && p.path.is_ident("Self"))
}

/// Harvest the buildable exported fields of a struct. Produced-type fields
/// survive only through the constant upgrade; everything else that cannot
/// be synthesized inline is skipped and makes the construction partial.
fn exported_struct_fields(
    files: &[syn::File],
    sname: &str,
    types_map: &TypesMap,
) -> (Vec<FuncArg>, bool) {
    for file in files {
        for item in &file.items {
            let syn::Item::Struct(s) = item else { continue };
            if s.ident != sname {
                continue;
            }
            let syn::Fields::Named(named) = &s.fields else {
                return (Vec::new(), false);
            };
            let mut out: Vec<FuncArg> = Vec::new();
            let mut partial = false;
            for f in &named.named {
                if !is_pub(&f.vis) {
                    partial = true;
                    continue;
                }
                let fname = f.ident.as_ref().expect("named field").to_string();
                let (mut kind, mut field_type) = classify(&f.ty);
                match kind {
                    ArgKind::Unknown | ArgKind::Unhandled => {
                        warn(
                            DiagnosticCode::NGF0112UnhandledField,
                            Phase::Plan,
                            format!("unhandled field {} for struct {}", fname, sname),
                        );
                        partial = true;
                        continue;
                    }
                    ArgKind::PkgProduced | ArgKind::PkgProducedArray => {
                        let v = types_map.get(&field_type).copied().unwrap_or(0);
                        if v & TYPE_CONST != 0 {
                            if kind == ArgKind::PkgProducedArray {
                                field_type = format!("repeated {}", field_type);
                            }
                            kind = ArgKind::PkgConst;
                        } else {
                            partial = true;
                            continue;
                        }
                    }
                    ArgKind::Scalar | ArgKind::ScalarGen | ArgKind::PkgConst
                    | ArgKind::PkgStruct => {}
                }
                let suffix = if is_rust_keyword(&fname) { "_" } else { "" };
                out.push(FuncArg {
                    name: fname,
                    field_type,
                    kind,
                    prefix: "",
                    suffix,
                });
            }
            return (out, partial);
        }
    }
    (Vec::new(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(src: &str) -> PackageDescription {
        let file = syn::parse_file(src).expect("source");
        describe_files(&[file], "").expect("describe")
    }

    #[test]
    fn free_function_with_scalars() {
        let d = describe("pub fn compute(n: u32, data: &[u8]) -> i32 { 0 }");
        assert_eq!(d.functions.len(), 1);
        let f = &d.functions[0];
        assert_eq!(f.schema_name(), "Compute");
        assert_eq!(f.args.len(), 2);
        assert_eq!(f.args[0].kind, ArgKind::Scalar);
        assert_eq!(f.args[1].field_type, "bytes");
        assert_eq!(f.args[1].prefix, "&");
        assert!(f.returns.iter().all(|r| !r.used));
    }

    #[test]
    fn producer_consumer_pair_survives() {
        let d = describe(
            "pub struct Parser { state: u8 }\n\
             pub fn new_parser() -> Parser { todo!() }\n\
             impl Parser { pub fn feed(&mut self, data: &[u8]) {} }",
        );
        assert_eq!(d.types.len(), 1);
        assert!(d.types[0].is_opaque());
        assert_eq!(d.functions.len(), 2);
        assert!(d.functions[0].returns[0].used);
        let feed = &d.functions[1];
        assert_eq!(feed.recv, "ParserNgdot");
        assert_eq!(feed.args[0].kind, ArgKind::PkgProduced);
        assert_eq!(feed.args[0].prefix, "&mut ");
    }

    #[test]
    fn const_backed_enum_type() {
        let d = describe(
            "pub enum Mode { Fast, Small, Strict }\n\
             pub fn apply(m: Mode) {}",
        );
        assert_eq!(d.types.len(), 1);
        let t = &d.types[0];
        assert!(t.is_enum());
        assert!(t.qualify);
        assert_eq!(t.values, ["Fast", "Small", "Strict"]);
        assert_eq!(d.functions[0].args[0].kind, ArgKind::PkgConst);
    }

    #[test]
    fn top_level_consts_win_over_variants() {
        let d = describe(
            "pub struct Level(pub u8);\n\
             pub const LOW: Level = Level(0);\n\
             pub const HIGH: Level = Level(9);\n\
             pub fn set(l: Level) {}",
        );
        let t = &d.types[0];
        assert!(t.is_enum());
        assert!(!t.qualify);
        assert_eq!(t.values, ["LOW", "HIGH"]);
    }

    #[test]
    fn struct_backed_type_harvests_pub_fields() {
        let d = describe(
            "pub struct Options { pub depth: u32, pub label: String, secret: u8 }\n\
             impl Options { pub fn run(&self) {} }",
        );
        let t = d.types.iter().find(|t| t.name == "Options").expect("plan");
        assert!(t.is_struct());
        assert!(t.partial);
        assert_eq!(t.fields.len(), 2);
        let run = &d.functions[0];
        assert_eq!(run.args[0].kind, ArgKind::PkgStruct);
    }

    #[test]
    fn unproduced_argument_drops_function() {
        let d = describe(
            "pub struct Widget { w: u8 }\n\
             pub fn draw(w: &Widget) {}",
        );
        assert!(d.functions.is_empty());
        assert!(d.types.is_empty());
    }

    #[test]
    fn produced_array_argument_drops_function() {
        let d = describe(
            "pub struct Frame { f: u8 }\n\
             pub fn new_frame() -> Frame { todo!() }\n\
             pub fn join(frames: &[Frame]) {}\n\
             pub fn show(f: &Frame) {}",
        );
        assert!(d.functions.iter().all(|f| f.name != "join"));
        assert!(d.functions.iter().any(|f| f.name == "show"));
    }

    #[test]
    fn unhandled_argument_drops_function() {
        let d = describe("pub fn hook(cb: fn(u32) -> u32) {}\npub fn ok(n: u32) {}");
        assert_eq!(d.functions.len(), 1);
        assert_eq!(d.functions[0].name, "ok");
    }

    #[test]
    fn src_dst_convention_detected() {
        let d = describe("pub fn encode(dst: &mut [u8], src: &[u8]) -> usize { 0 }");
        assert_eq!(d.functions[0].src_dst, SRCDST_DST | SRCDST_SRC);
    }

    #[test]
    fn marshal_gets_suffix() {
        let d = describe("pub fn marshal(data: &[u8]) {}");
        assert_eq!(d.functions[0].schema_name(), "Marshal_");
    }

    #[test]
    fn result_flattening_marks_error() {
        let d = describe(
            "pub struct Conn { c: u8 }\n\
             pub fn open(addr: &str) -> Result<Conn, std::io::Error> { todo!() }\n\
             impl Conn { pub fn ping(&self) {} }",
        );
        let open = d.functions.iter().find(|f| f.name == "open").expect("open");
        assert_eq!(open.returns.len(), 2);
        assert!(open.returns[0].used);
        assert_eq!(open.returns[1].field_type, "error");
        assert!(open.returns[1].used);
    }
}
