//! Context inference for fragments
//!
//! Extracts defined symbols, referenced identifiers, required imports, and
//! type signatures from a fragment so it can execute independently. The
//! extraction is keyword/regex driven and language-lenient: it recognizes
//! the declaration forms of the mainstream curly-brace and indentation
//! languages without parsing any of them fully.

use axe_atom::AtomContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:pub(?:\([a-z]+\))?\s+)?(?:export\s+)?(?:async\s+)?(?:unsafe\s+)?(fn|struct|enum|trait|type|const|static|class|def|function|interface)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid declaration regex")
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:use|import|from|require|#include)\b").expect("valid import regex")
});

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"));

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fn", "let", "mut", "pub", "use", "struct", "enum", "impl", "trait", "const", "static",
        "if", "else", "match", "for", "while", "loop", "return", "break", "continue", "mod",
        "crate", "self", "super", "where", "async", "await", "move", "ref", "type", "dyn", "in",
        "as", "true", "false", "def", "class", "import", "from", "lambda", "None", "True",
        "False", "function", "var", "new", "this", "void", "export", "interface", "require",
        "unsafe", "pass", "not", "and", "or", "None", "print", "println",
    ]
    .into_iter()
    .collect()
});

/// Whether a line opens a new top-level declaration
pub(crate) fn is_declaration_start(line: &str) -> bool {
    DECL_RE.is_match(line)
}

/// Symbols a fragment defines (declaration names)
pub(crate) fn defined_symbols(fragment: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in fragment.lines() {
        if let Some(caps) = DECL_RE.captures(line) {
            if let Some(name) = caps.get(2) {
                let name = name.as_str().to_string();
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
    }
    out
}

/// Declaration header lines, trimmed (the fragment's type signatures)
pub(crate) fn signatures(fragment: &str) -> Vec<String> {
    fragment
        .lines()
        .filter(|l| DECL_RE.is_match(l))
        .map(|l| l.trim().trim_end_matches('{').trim_end().to_string())
        .collect()
}

/// Identifiers a fragment uses, minus keywords and its own definitions
pub(crate) fn referenced_symbols(fragment: &str, own_defines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for m in IDENT_RE.find_iter(fragment) {
        let ident = m.as_str();
        if KEYWORDS.contains(ident) {
            continue;
        }
        if own_defines.iter().any(|d| d == ident) {
            continue;
        }
        if !out.iter().any(|o: &String| o == ident) {
            out.push(ident.to_string());
        }
    }
    out
}

/// Import lines of the payload that mention identifiers the fragment uses
pub(crate) fn relevant_imports(payload: &str, fragment_idents: &[String]) -> Vec<String> {
    payload
        .lines()
        .filter(|l| IMPORT_RE.is_match(l))
        .filter(|l| {
            IDENT_RE
                .find_iter(l)
                .any(|m| fragment_idents.iter().any(|i| i == m.as_str()))
        })
        .map(|l| l.trim().to_string())
        .collect()
}

/// Maximum delimiter nesting depth inside the fragment
pub(crate) fn nesting_depth(fragment: &str) -> u32 {
    let mut depth: i64 = 0;
    let mut max: i64 = 0;
    for c in fragment.chars() {
        match c {
            '{' | '(' | '[' => {
                depth += 1;
                max = max.max(depth);
            }
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    max.max(0) as u32
}

/// Assemble the inferred context for one fragment of a payload
pub(crate) fn infer(payload: &str, fragment: &str) -> AtomContext {
    let defines = defined_symbols(fragment);
    let references = referenced_symbols(fragment, &defines);
    let imports = relevant_imports(payload, &references);
    let type_signatures = signatures(fragment);

    AtomContext {
        imports,
        defines,
        references,
        type_signatures,
        preconditions: Vec::new(),
        postconditions: Vec::new(),
        example_tests: Vec::new(),
    }
}
