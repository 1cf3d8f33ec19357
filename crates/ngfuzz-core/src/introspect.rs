//! Package introspector: walks top-level declarations, builds the per-type
//! flags map and the flat list of candidate functions the plan builder
//! filters.

use std::collections::BTreeMap;

use syn::Type;

use crate::astutil::{is_pub, short_name};
use crate::diagnostics::{warn, DiagnosticCode, Phase};

/// Some function returns a value of this type.
pub const TYPE_RESULT: u8 = 1;
/// Some function consumes a value of this type.
pub const TYPE_ARG: u8 = 2;
/// The type has exported constants (set during plan building).
pub const TYPE_CONST: u8 = 4;
/// Struct with an exported-field majority, buildable without a producer.
pub const TYPE_STRUCTEXP: u8 = 8;

pub type TypesMap = BTreeMap<String, u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfStyle {
    /// Top-level function.
    Free,
    /// `impl T` function without a `self` receiver, called as `T::f(..)`.
    Assoc,
    /// `self` by value.
    Owned,
    /// `&self`.
    Ref,
    /// `&mut self`.
    RefMut,
}

/// One candidate function, flattened out of its item or impl block.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    /// Receiver/impl type name; empty for free functions.
    pub self_ty: String,
    pub self_style: SelfStyle,
    pub sig: syn::Signature,
}

/// How one return-position atom can be threaded into a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetForm {
    /// Owned value, stored directly.
    Direct,
    /// `Option<T>`: stored under an `if let Some`.
    Optional,
    /// `Box<T>`: stored after a deref.
    Boxed,
    /// `Vec<T>`: extended into the buffer.
    Spread,
    /// Reference: cannot outlive the call, never stored.
    Borrowed,
    /// The `Err` side of a `Result`: short-circuits the sequence.
    Error,
}

#[derive(Debug, Clone)]
pub struct RetAtom {
    pub name: String,
    pub form: RetForm,
}

/// First pass: every exported type declaration, with the struct-majority
/// test for the exported-fields bit. Structs with generic parameters
/// (including lifetimes) cannot be built from owned surrogate data and
/// never get the bit.
pub fn collect_types(files: &[syn::File]) -> TypesMap {
    let mut map = TypesMap::new();
    for file in files {
        for item in &file.items {
            match item {
                syn::Item::Struct(s) if is_pub(&s.vis) => {
                    let mut init = 0u8;
                    if s.generics.params.is_empty() {
                        if let syn::Fields::Named(named) = &s.fields {
                            let nbu = named.named.iter().filter(|f| is_pub(&f.vis)).count();
                            let nbl = named.named.len() - nbu;
                            if nbu > nbl {
                                init = TYPE_STRUCTEXP;
                            }
                        }
                    }
                    map.insert(s.ident.to_string(), init);
                }
                syn::Item::Enum(e) if is_pub(&e.vis) => {
                    map.insert(e.ident.to_string(), 0);
                }
                syn::Item::Type(t) if is_pub(&t.vis) => {
                    map.insert(t.ident.to_string(), 0);
                }
                syn::Item::Union(u) if is_pub(&u.vis) => {
                    map.insert(u.ident.to_string(), 0);
                }
                _ => {}
            }
        }
    }
    map
}

/// Collect the candidate functions: exported top-level functions plus
/// exported functions of inherent impl blocks, minus the exclude matches
/// and anything generic.
pub fn collect_fns(files: &[syn::File], excludes: &[String]) -> Vec<FnDecl> {
    let mut out: Vec<FnDecl> = Vec::new();
    for file in files {
        for item in &file.items {
            match item {
                syn::Item::Fn(f) if is_pub(&f.vis) => {
                    if !name_ok(&f.sig.ident.to_string(), excludes) {
                        continue;
                    }
                    if !generics_ok(&f.sig, "") {
                        continue;
                    }
                    out.push(FnDecl {
                        name: f.sig.ident.to_string(),
                        self_ty: String::new(),
                        self_style: SelfStyle::Free,
                        sig: f.sig.clone(),
                    });
                }
                syn::Item::Impl(imp) if imp.trait_.is_none() => {
                    // Trait impls dispatch through the trait, not the type.
                    if !imp.generics.params.is_empty() {
                        continue;
                    }
                    let Some(self_ty) = impl_self_name(&imp.self_ty) else {
                        continue;
                    };
                    for ii in &imp.items {
                        let syn::ImplItem::Fn(f) = ii else { continue };
                        if !is_pub(&f.vis) {
                            continue;
                        }
                        let name = f.sig.ident.to_string();
                        if !name_ok(&name, excludes) {
                            continue;
                        }
                        if !generics_ok(&f.sig, &self_ty) {
                            continue;
                        }
                        let style = match f.sig.receiver() {
                            None => SelfStyle::Assoc,
                            Some(r) => {
                                if r.reference.is_none() {
                                    SelfStyle::Owned
                                } else if r.mutability.is_some() {
                                    SelfStyle::RefMut
                                } else {
                                    SelfStyle::Ref
                                }
                            }
                        };
                        out.push(FnDecl {
                            name,
                            self_ty: self_ty.clone(),
                            self_style: style,
                            sig: f.sig.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    out
}

fn name_ok(name: &str, excludes: &[String]) -> bool {
    !excludes.iter().any(|e| name.contains(e.as_str()))
}

fn generics_ok(sig: &syn::Signature, self_ty: &str) -> bool {
    if sig.generics.params.is_empty() {
        return true;
    }
    let scope = if self_ty.is_empty() {
        sig.ident.to_string()
    } else {
        format!("{}::{}", self_ty, sig.ident)
    };
    warn(
        DiagnosticCode::NGF0111UnsupportedGenerics,
        Phase::Introspect,
        format!("dropping generic function {}", scope),
    );
    false
}

pub(crate) fn impl_self_name(ty: &Type) -> Option<String> {
    let name = short_name(ty)?;
    if name.contains('.') {
        return None;
    }
    Some(name)
}

/// Second pass: OR producer/consumer bits into the types map. Only storable
/// return atoms count as production; slice and reference results are logged
/// and skipped so the producibility closure holds.
pub fn accumulate_flags(map: &mut TypesMap, fns: &[FnDecl]) {
    for fd in fns {
        if let Some(atoms) = flatten_return(&fd.sig.output, &fd.self_ty) {
            for atom in &atoms {
                match atom.form {
                    RetForm::Direct | RetForm::Optional | RetForm::Boxed => {
                        if let Some(v) = map.get_mut(&atom.name) {
                            *v |= TYPE_RESULT;
                        }
                    }
                    RetForm::Spread => {
                        if map.contains_key(&atom.name) {
                            warn(
                                DiagnosticCode::NGF0107ArrayResult,
                                Phase::Introspect,
                                format!("array result of {} for {}", atom.name, fd.name),
                            );
                        }
                    }
                    RetForm::Borrowed => {
                        if map.contains_key(&atom.name) {
                            warn(
                                DiagnosticCode::NGF0108BorrowedResult,
                                Phase::Introspect,
                                format!("borrowed result of {} for {}", atom.name, fd.name),
                            );
                        }
                    }
                    RetForm::Error => {}
                }
            }
        }
        for input in &fd.sig.inputs {
            let syn::FnArg::Typed(pt) = input else { continue };
            if let Some(name) = short_name_in(&pt.ty, &fd.self_ty) {
                if let Some(v) = map.get_mut(&name) {
                    *v |= TYPE_ARG;
                }
            }
        }
        match fd.self_style {
            SelfStyle::Owned | SelfStyle::Ref | SelfStyle::RefMut => {
                if let Some(v) = map.get_mut(&fd.self_ty) {
                    *v |= TYPE_ARG;
                }
            }
            SelfStyle::Free | SelfStyle::Assoc => {}
        }
    }
}

/// `short_name` with `Self` resolved to the impl type.
pub fn short_name_in(ty: &Type, self_ty: &str) -> Option<String> {
    let name = short_name(ty)?;
    if name == "Self" && !self_ty.is_empty() {
        return Some(self_ty.to_string());
    }
    Some(name)
}

/// Flatten a return type into its threadable atoms: `Result<T, E>` becomes
/// the atoms of `T` plus a trailing `error` sentinel, tuples flatten
/// element-wise, `Option`/`Box`/`Vec`/references mark the atom's form.
/// `None` means the shape has no usable flattening.
pub fn flatten_return(output: &syn::ReturnType, self_ty: &str) -> Option<Vec<RetAtom>> {
    let ty = match output {
        syn::ReturnType::Default => return Some(Vec::new()),
        syn::ReturnType::Type(_, ty) => ty,
    };
    let mut atoms = Vec::new();
    if flatten_ty(ty, self_ty, true, &mut atoms) {
        Some(atoms)
    } else {
        None
    }
}

fn flatten_ty(ty: &Type, self_ty: &str, top: bool, out: &mut Vec<RetAtom>) -> bool {
    match ty {
        Type::Paren(p) => flatten_ty(&p.elem, self_ty, top, out),
        Type::Group(g) => flatten_ty(&g.elem, self_ty, top, out),
        Type::Tuple(t) => {
            if t.elems.is_empty() {
                return true;
            }
            if !top {
                return false;
            }
            for elem in &t.elems {
                if !flatten_elem(elem, self_ty, out) {
                    return false;
                }
            }
            true
        }
        Type::Path(p) => {
            if let Some(last) = p.path.segments.last() {
                if last.ident == "Result" && top {
                    let ok = match crate::astutil::first_type_arg(last) {
                        Some(inner) => flatten_ty(inner, self_ty, true, out),
                        None => true,
                    };
                    if !ok {
                        return false;
                    }
                    out.push(RetAtom {
                        name: "error".to_string(),
                        form: RetForm::Error,
                    });
                    return true;
                }
            }
            flatten_elem(ty, self_ty, out)
        }
        _ => flatten_elem(ty, self_ty, out),
    }
}

fn flatten_elem(ty: &Type, self_ty: &str, out: &mut Vec<RetAtom>) -> bool {
    match ty {
        Type::Paren(p) => flatten_elem(&p.elem, self_ty, out),
        Type::Group(g) => flatten_elem(&g.elem, self_ty, out),
        Type::Tuple(t) if t.elems.is_empty() => true,
        Type::Reference(r) => {
            let Some(name) = short_name_in(&r.elem, self_ty) else {
                return false;
            };
            out.push(RetAtom {
                name,
                form: RetForm::Borrowed,
            });
            true
        }
        Type::Slice(s) => {
            let Some(name) = short_name_in(&s.elem, self_ty) else {
                return false;
            };
            out.push(RetAtom {
                name,
                form: RetForm::Spread,
            });
            true
        }
        Type::Path(p) => {
            let form = p
                .path
                .segments
                .last()
                .map(|seg| match seg.ident.to_string().as_str() {
                    "Option" => {
                        // Option<&T> cannot outlive the call either.
                        match crate::astutil::first_type_arg(seg) {
                            Some(Type::Reference(_)) => RetForm::Borrowed,
                            _ => RetForm::Optional,
                        }
                    }
                    "Box" => RetForm::Boxed,
                    "Vec" => RetForm::Spread,
                    _ => RetForm::Direct,
                })
                .unwrap_or(RetForm::Direct);
            let Some(name) = short_name_in(ty, self_ty) else {
                return false;
            };
            out.push(RetAtom { name, form });
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(src: &str) -> Vec<syn::File> {
        vec![syn::parse_file(src).expect("source")]
    }

    #[test]
    fn struct_majority_sets_structexp() {
        let fs = files(
            "pub struct Open { pub a: u32, pub b: u32, c: u32 }\n\
             pub struct Closed { pub a: u32, b: u32 }\n\
             pub struct Opaque(u32);",
        );
        let map = collect_types(&fs);
        assert_eq!(map["Open"], TYPE_STRUCTEXP);
        assert_eq!(map["Closed"], 0);
        assert_eq!(map["Opaque"], 0);
    }

    #[test]
    fn flags_mark_producers_and_consumers() {
        let fs = files(
            "pub struct Frame { data: u8 }\n\
             pub fn decode(data: &[u8]) -> Frame { unimplemented!() }\n\
             pub fn show(f: &Frame) {}",
        );
        let mut map = collect_types(&fs);
        let fns = collect_fns(&fs, &[]);
        accumulate_flags(&mut map, &fns);
        assert_eq!(map["Frame"], TYPE_RESULT | TYPE_ARG);
    }

    #[test]
    fn receiver_counts_as_consumer_and_self_as_producer() {
        let fs = files(
            "pub struct Decoder { x: u8 }\n\
             impl Decoder {\n\
                 pub fn new() -> Self { unimplemented!() }\n\
                 pub fn step(&mut self) {}\n\
             }",
        );
        let mut map = collect_types(&fs);
        let fns = collect_fns(&fs, &[]);
        accumulate_flags(&mut map, &fns);
        assert_eq!(map["Decoder"], TYPE_RESULT | TYPE_ARG);
        assert_eq!(fns.len(), 2);
        assert_eq!(fns[0].self_style, SelfStyle::Assoc);
        assert_eq!(fns[1].self_style, SelfStyle::RefMut);
    }

    #[test]
    fn vec_results_do_not_produce() {
        let fs = files(
            "pub struct Frame { data: u8 }\n\
             pub fn split(data: &[u8]) -> Vec<Frame> { unimplemented!() }\n\
             pub fn show(f: &Frame) {}",
        );
        let mut map = collect_types(&fs);
        let fns = collect_fns(&fs, &[]);
        accumulate_flags(&mut map, &fns);
        assert_eq!(map["Frame"], TYPE_ARG);
    }

    #[test]
    fn flatten_result_forms() {
        let f: syn::ItemFn =
            syn::parse_str("fn f() -> Result<(Frame, usize), Error> { todo!() }").expect("fn");
        let atoms = flatten_return(&f.sig.output, "").expect("atoms");
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].name, "Frame");
        assert_eq!(atoms[0].form, RetForm::Direct);
        assert_eq!(atoms[1].name, "usize");
        assert_eq!(atoms[2].form, RetForm::Error);
    }

    #[test]
    fn excludes_filter_candidates() {
        let fs = files("pub fn compute() {}\npub fn compute_unsafe() {}");
        let fns = collect_fns(&fs, &["unsafe".to_string()]);
        assert_eq!(fns.len(), 1);
        assert_eq!(fns[0].name, "compute");
    }
}
