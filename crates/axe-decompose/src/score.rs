//! Atomicity scoring heuristics
//!
//! Starts at 1.0 and deducts for signals that a fragment is poorly
//! isolated: multiple responsibilities, partial statements, unbounded side
//! effects, and oversize. Violations carry one message per deduction so a
//! reviewer can see what the score is made of.

use crate::context::defined_symbols;

/// Side-effect markers that suggest a fragment touches shared state
const SIDE_EFFECT_MARKERS: &[&str] = &[
    "static mut",
    "global ",
    "println!",
    "print(",
    "console.log",
    "process::exit",
    "os.environ",
];

/// Score one fragment; returns the clamped score and the violations found
pub(crate) fn atomicity(fragment: &str, granularity: usize) -> (f64, Vec<String>) {
    let mut score = 1.0f64;
    let mut violations = Vec::new();

    let defines = defined_symbols(fragment);
    if defines.len() > 1 {
        let extra = defines.len() - 1;
        score -= 0.2 * extra as f64;
        violations.push(format!(
            "multiple responsibilities: {} declarations in one unit",
            defines.len()
        ));
    }

    if !balanced(fragment) {
        score -= 0.4;
        violations.push("partial statement: unbalanced delimiters".to_string());
    }

    for marker in SIDE_EFFECT_MARKERS {
        if fragment.contains(marker) {
            score -= 0.1;
            violations.push(format!("side effect: {}", marker.trim()));
        }
    }

    let lines = fragment.lines().count();
    if lines > granularity {
        let extra = lines - granularity;
        score -= 0.05 * extra as f64;
        violations.push(format!(
            "oversized: {lines} lines against a target of {granularity}"
        ));
    }

    (score.clamp(0.0, 1.0), violations)
}

fn balanced(fragment: &str) -> bool {
    let mut depth: i64 = 0;
    for c in fragment.chars() {
        match c {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_fragment_scores_full() {
        let (score, violations) = atomicity("fn add(a: i32, b: i32) -> i32 { a + b }", 10);
        assert!((score - 1.0).abs() < f64::EPSILON);
        assert!(violations.is_empty());
    }

    #[test]
    fn multiple_declarations_deducted() {
        let fragment = "fn one() {}\nfn two() {}\nfn three() {}";
        let (score, violations) = atomicity(fragment, 10);
        assert!((score - 0.6).abs() < 1e-9);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("3 declarations"));
    }

    #[test]
    fn unbalanced_fragment_deducted() {
        let (score, violations) = atomicity("fn broken() {", 10);
        assert!(score < 0.7);
        assert!(violations.iter().any(|v| v.contains("unbalanced")));
    }

    #[test]
    fn side_effects_deducted() {
        let (score, violations) = atomicity("fn log() { println!(\"hi\"); }", 10);
        assert!((score - 0.9).abs() < 1e-9);
        assert!(violations.iter().any(|v| v.contains("side effect")));
    }

    #[test]
    fn oversize_deducted_per_line() {
        let lines: Vec<String> = (0..14).map(|i| format!("step_{i}();")).collect();
        let (score, violations) = atomicity(&lines.join("\n"), 10);
        assert!((score - 0.8).abs() < 1e-9);
        assert!(violations.iter().any(|v| v.contains("oversized")));
    }

    #[test]
    fn score_never_negative() {
        let mut text = String::new();
        for i in 0..20 {
            text.push_str(&format!("fn f{i}() {{}}\n"));
        }
        let (score, _) = atomicity(&text, 5);
        assert!((0.0..=1.0).contains(&score));
    }
}
