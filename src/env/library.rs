//! Built-in list, string and formatting primitives.
//!
//! These functions take evaluated operands and return the primitive's
//! result; the dispatch in `exec` decides which one to call.

use chrono::format::{Item, StrftimeItems};
use chrono::Local;

use crate::tree::Tree;
use crate::utils::error::{EvalError, EvalResult};

/// Default format of `date`.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

/// Character count of an atom, or the arity of a node.
pub fn length(t: &Tree) -> Tree {
    let n = match t.as_str() {
        Some(s) => s.chars().count(),
        None => t.arity(),
    };
    Tree::atom(n.to_string())
}

/// The half-open slice `[start, end)`, clamped to the bounds.
pub fn range(t: &Tree, start: i64, end: i64) -> Tree {
    let clamp = |i: i64, len: usize| i.clamp(0, len as i64) as usize;
    match t.as_str() {
        Some(s) => {
            let len = s.chars().count();
            let (i, j) = (clamp(start, len), clamp(end, len));
            Tree::atom(s.chars().skip(i).take(j.saturating_sub(i)).collect::<String>())
        }
        None => {
            let len = t.arity();
            let (i, j) = (clamp(start, len), clamp(end, len));
            let children = if i < j {
                t.children()[i..j].to_vec()
            } else {
                Vec::new()
            };
            t.with_children(children)
        }
    }
}

/// Child `index` of a node, or character `index` of an atom.
pub fn lookup(t: &Tree, index: i64) -> EvalResult<Tree> {
    let len = match t.as_str() {
        Some(s) => s.chars().count(),
        None => t.arity(),
    };
    let oob = || EvalError::index_oob(index, len);
    let i = usize::try_from(index).map_err(|_| oob())?;
    match t.as_str() {
        Some(s) => s
            .chars()
            .nth(i)
            .map(|c| Tree::atom(c.to_string()))
            .ok_or_else(oob),
        None => t.child(i).cloned().ok_or_else(oob),
    }
}

/// Format `n` in one of the numbering styles.
pub fn number(n: i64, style: &str) -> EvalResult<String> {
    Ok(match style {
        "arabic" => n.to_string(),
        "roman" => roman(n),
        "Roman" => roman(n).to_uppercase(),
        "alpha" => alpha(n),
        "Alpha" => alpha(n).to_uppercase(),
        "fnsymbol" => fnsymbol(n)?,
        other => {
            return Err(EvalError::invalid_op(format!(
                "unknown numbering style: {}",
                other
            )))
        }
    })
}

/// Lowercase roman numerals; empty outside `1..=3999`.
fn roman(n: i64) -> String {
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    if !(1..4000).contains(&n) {
        return String::new();
    }
    let mut rest = n;
    let mut out = String::new();
    for (value, digits) in NUMERALS {
        while rest >= value {
            out.push_str(digits);
            rest -= value;
        }
    }
    out
}

/// `a`..`z`, then `aa`, `ab`, ...; empty for non-positive numbers.
fn alpha(n: i64) -> String {
    let mut rest = n;
    let mut out = Vec::new();
    while rest > 0 {
        rest -= 1;
        out.push((b'a' + (rest % 26) as u8) as char);
        rest /= 26;
    }
    out.iter().rev().collect()
}

/// Footnote symbols, doubled and tripled after each round of six.
fn fnsymbol(n: i64) -> EvalResult<String> {
    const SYMBOLS: [&str; 6] = ["*", "†", "‡", "§", "¶", "‖"];
    const MAX_REPEAT: i64 = 16;
    if n <= 0 {
        return Ok(String::new());
    }
    let i = ((n - 1) % 6) as usize;
    let repeat = (n - 1) / 6 + 1;
    if repeat > MAX_REPEAT {
        return Err(EvalError::invalid_op(format!(
            "number too large for fnsymbol: {}",
            n
        )));
    }
    Ok(SYMBOLS[i].repeat(repeat as usize))
}

/// Today's date in a strftime `format`.
pub fn date(format: &str) -> EvalResult<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EvalError::invalid_op(format!("bad date format: {}", format)));
    }
    Ok(Local::now().format_with_items(items.into_iter()).to_string())
}
