//! Small accessors over `syn` types plus the identifier case helpers shared
//! by the schema and harness emitters.

use syn::Type;

/// Printable canonical name for a type expression: references, slices and
/// the `Vec`/`Box`/`Option` wrappers are peeled, remaining path segments are
/// joined with `.`. Maps and trait objects get sentinel names so they can be
/// keyed in the types map without ever being producible.
pub fn short_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Reference(r) => short_name(&r.elem),
        Type::Slice(s) => short_name(&s.elem),
        Type::Array(a) => short_name(&a.elem),
        Type::Paren(p) => short_name(&p.elem),
        Type::Group(g) => short_name(&g.elem),
        Type::TraitObject(_) | Type::ImplTrait(_) => Some("intf".to_string()),
        Type::Path(p) => {
            if p.qself.is_some() {
                return None;
            }
            let last = p.path.segments.last()?;
            match last.ident.to_string().as_str() {
                "HashMap" | "BTreeMap" => return Some("mapkv".to_string()),
                "Vec" | "Box" | "Option" => return short_name(first_type_arg(last)?),
                _ => {}
            }
            let mut parts: Vec<String> = Vec::new();
            for seg in &p.path.segments {
                let name = seg.ident.to_string();
                if parts.is_empty() && (name == "crate" || name == "self") {
                    continue;
                }
                parts.push(name);
            }
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("."))
            }
        }
        _ => None,
    }
}

/// First angle-bracketed type argument of a path segment, if any.
pub fn first_type_arg(seg: &syn::PathSegment) -> Option<&Type> {
    let syn::PathArguments::AngleBracketed(ab) = &seg.arguments else {
        return None;
    };
    for arg in &ab.args {
        if let syn::GenericArgument::Type(t) = arg {
            return Some(t);
        }
    }
    None
}

/// The export test. Go used identifier case; in Rust it is `pub`.
pub fn is_pub(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

// Word splitting compatible with what prost-build does to proto identifiers,
// so the names we write into the schema round-trip unchanged into the
// generated Rust the dispatcher compiles against. Boundaries: underscores,
// lower-to-upper transitions, and the last capital of an acronym run when a
// lowercase letter follows (HTTPClient -> Http Client).
fn split_words(s: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut cur = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c == '_' {
            if !cur.is_empty() {
                words.push(std::mem::take(&mut cur));
            }
            continue;
        }
        if c.is_uppercase() && !cur.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut cur));
            }
        }
        cur.push(*c);
    }
    if !cur.is_empty() {
        words.push(cur);
    }
    words
}

/// snake_case form of an identifier.
pub fn snake(s: &str) -> String {
    let words = split_words(s);
    let mut out = words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    if s.ends_with('_') {
        out.push('_');
    }
    out
}

/// UpperCamelCase form of an identifier.
pub fn upper_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for w in split_words(s) {
        let mut chars = w.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Keywords that would force raw identifiers in the generated harness.
/// Schema field names matching one get a trailing `_` instead.
pub fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "async" | "await" | "box" | "break" | "const" | "continue" | "crate" | "dyn"
            | "else" | "enum" | "extern" | "false" | "fn" | "for" | "if" | "impl" | "in"
            | "let" | "loop" | "match" | "mod" | "move" | "mut" | "pub" | "ref" | "return"
            | "self" | "static" | "struct" | "super" | "trait" | "true" | "type" | "unsafe"
            | "use" | "where" | "while" | "yield"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(src: &str) -> Type {
        syn::parse_str(src).expect("type")
    }

    #[test]
    fn short_name_unwraps_wrappers() {
        assert_eq!(short_name(&ty("&mut Decoder")).as_deref(), Some("Decoder"));
        assert_eq!(short_name(&ty("Vec<Frame>")).as_deref(), Some("Frame"));
        assert_eq!(short_name(&ty("Option<Box<Frame>>")).as_deref(), Some("Frame"));
        assert_eq!(short_name(&ty("[u8; 4]")).as_deref(), Some("u8"));
    }

    #[test]
    fn short_name_joins_paths_and_drops_crate() {
        assert_eq!(
            short_name(&ty("std::time::Duration")).as_deref(),
            Some("std.time.Duration")
        );
        assert_eq!(short_name(&ty("crate::Frame")).as_deref(), Some("Frame"));
    }

    #[test]
    fn short_name_sentinels() {
        assert_eq!(short_name(&ty("HashMap<String, u32>")).as_deref(), Some("mapkv"));
        assert_eq!(short_name(&ty("&dyn std::fmt::Debug")).as_deref(), Some("intf"));
        assert_eq!(short_name(&ty("(u32, u32)")), None);
    }

    #[test]
    fn case_helpers_are_prost_stable() {
        assert_eq!(upper_camel("new_decoder"), "NewDecoder");
        assert_eq!(upper_camel("HTTPClient"), "HttpClient");
        assert_eq!(upper_camel(&upper_camel("HTTPClient")), "HttpClient");
        assert_eq!(snake("TNgdotCompute"), "t_ngdot_compute");
        assert_eq!(snake("dst"), "dst");
    }
}
