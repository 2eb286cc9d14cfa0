//! Operations on evaluated trees.
//!
//! This module implements truth coercion, arithmetic and comparisons for
//! the evaluator. Operands are already evaluated; the functions here only
//! look at their shape.

use std::cmp::Ordering;

use super::units::{format_length, is_length, Units};
use crate::tree::{Tag, Tree};
use crate::utils::error::{EvalError, EvalResult};

/// Truth convention shared by every logical and conditional construct.
///
/// A tree is true iff it is an atom that is non-empty and neither `false`
/// nor `0`. Compound trees, `(uninit)` and error trees included, are false.
pub fn is_true(t: &Tree) -> bool {
    match t.as_str() {
        Some(s) => !s.is_empty() && s != "false" && s != "0",
        None => false,
    }
}

/// A numeric operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Real(f64),
    /// A length in tmpt
    Length(i64),
}

impl Number {
    /// Read a number or a length from an atom.
    pub fn decode(t: &Tree, units: &Units) -> Option<Number> {
        let s = t.as_str()?.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Some(Number::Int(i));
        }
        if let Ok(x) = s.parse::<f64>() {
            if x.is_finite() {
                return Some(Number::Real(x));
            }
        }
        if is_length(s) {
            return units.decode_length(s).map(Number::Length);
        }
        None
    }

    pub fn to_tree(self) -> Tree {
        match self {
            Number::Int(i) => Tree::atom(i.to_string()),
            Number::Real(x) => Tree::atom(format_real(x)),
            Number::Length(l) => Tree::atom(format_length(l)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(x) => x,
            Number::Length(l) => l as f64,
        }
    }

    fn is_length(self) -> bool {
        matches!(self, Number::Length(_))
    }
}

/// Integral reals print without a fractional part.
pub fn format_real(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

fn operand(op: &'static str, t: &Tree, units: &Units) -> EvalResult<Number> {
    Number::decode(t, units).ok_or_else(|| EvalError::type_mismatch(op, "number or length", t))
}

fn overflow(op: &str) -> EvalError {
    EvalError::invalid_op(format!("integer overflow in {}", op))
}

fn add(op: &'static str, a: Number, b: Number, rhs: &Tree) -> EvalResult<Number> {
    use Number::*;
    Ok(match (a, b) {
        (Int(x), Int(y)) => Int(x.checked_add(y).ok_or_else(|| overflow(op))?),
        (Length(x), Length(y)) => Length(x.checked_add(y).ok_or_else(|| overflow(op))?),
        (Length(_), _) | (_, Length(_)) => {
            return Err(EvalError::type_mismatch(op, "operands of the same kind", rhs))
        }
        (x, y) => Real(x.as_f64() + y.as_f64()),
    })
}

fn negate(n: Number) -> EvalResult<Number> {
    use Number::*;
    Ok(match n {
        Int(x) => Int(x.checked_neg().ok_or_else(|| overflow("minus"))?),
        Real(x) => Real(-x),
        Length(x) => Length(x.checked_neg().ok_or_else(|| overflow("minus"))?),
    })
}

/// Sum of numbers, or of lengths.
pub fn plus(args: &[Tree], units: &Units) -> EvalResult<Tree> {
    let mut acc = operand("plus", &args[0], units)?;
    for t in &args[1..] {
        acc = add("plus", acc, operand("plus", t, units)?, t)?;
    }
    Ok(acc.to_tree())
}

/// Negation with one operand, difference with two.
pub fn minus(a: &Tree, b: Option<&Tree>, units: &Units) -> EvalResult<Tree> {
    let x = operand("minus", a, units)?;
    let result = match b {
        None => negate(x)?,
        Some(b) => add("minus", x, negate(operand("minus", b, units)?)?, b)?,
    };
    Ok(result.to_tree())
}

/// Product of numbers; at most one factor may be a length.
pub fn times(args: &[Tree], units: &Units) -> EvalResult<Tree> {
    use Number::*;
    let mut acc = operand("times", &args[0], units)?;
    for t in &args[1..] {
        let y = operand("times", t, units)?;
        acc = match (acc, y) {
            (Int(a), Int(b)) => Int(a.checked_mul(b).ok_or_else(|| overflow("times"))?),
            (Length(_), Length(_)) => {
                return Err(EvalError::type_mismatch("times", "at most one length", t))
            }
            (Length(l), n) | (n, Length(l)) => Length((l as f64 * n.as_f64()).round() as i64),
            (a, b) => Real(a.as_f64() * b.as_f64()),
        };
    }
    Ok(acc.to_tree())
}

/// Real quotient. Dividing two lengths gives their ratio.
pub fn over(a: &Tree, b: &Tree, units: &Units) -> EvalResult<Tree> {
    use Number::*;
    let x = operand("over", a, units)?;
    let y = operand("over", b, units)?;
    if y.as_f64() == 0.0 {
        return Err(EvalError::div_zero("over"));
    }
    let result = match (x, y) {
        (Length(l), Length(m)) => Real(l as f64 / m as f64),
        (Length(l), n) => Length((l as f64 / n.as_f64()).round() as i64),
        (_, Length(_)) => return Err(EvalError::type_mismatch("over", "a number divisor", b)),
        (p, q) => Real(p.as_f64() / q.as_f64()),
    };
    Ok(result.to_tree())
}

fn integers(op: &'static str, a: &Tree, b: &Tree, units: &Units) -> EvalResult<(i64, i64)> {
    let int = |t: &Tree| match Number::decode(t, units) {
        Some(Number::Int(i)) => Ok(i),
        _ => Err(EvalError::type_mismatch(op, "integer", t)),
    };
    Ok((int(a)?, int(b)?))
}

/// Integer quotient, truncated towards zero.
pub fn divide(a: &Tree, b: &Tree, units: &Units) -> EvalResult<Tree> {
    let (x, y) = integers("divide", a, b, units)?;
    if y == 0 {
        return Err(EvalError::div_zero("divide"));
    }
    let q = x.checked_div(y).ok_or_else(|| overflow("divide"))?;
    Ok(Number::Int(q).to_tree())
}

/// Remainder with the sign of the dividend.
pub fn modulo(a: &Tree, b: &Tree, units: &Units) -> EvalResult<Tree> {
    let (x, y) = integers("modulo", a, b, units)?;
    if y == 0 {
        return Err(EvalError::div_zero("modulo"));
    }
    let r = x.checked_rem(y).ok_or_else(|| overflow("modulo"))?;
    Ok(Number::Int(r).to_tree())
}

/// Order two values: numerically when both are numbers or lengths (a
/// plain number next to a length counts in tmpt), lexicographically when
/// both are other atoms. Compound trees have no order.
pub fn compare(a: &Tree, b: &Tree, units: &Units) -> Option<Ordering> {
    match (Number::decode(a, units), Number::decode(b, units)) {
        (Some(Number::Length(x)), Some(Number::Length(y))) => Some(x.cmp(&y)),
        (Some(x), Some(y)) if x.is_length() || y.is_length() => {
            x.as_f64().partial_cmp(&y.as_f64())
        }
        (Some(Number::Int(x)), Some(Number::Int(y))) => Some(x.cmp(&y)),
        (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

/// Equality: numeric when both sides are numeric, structural otherwise.
pub fn equal(a: &Tree, b: &Tree, units: &Units) -> bool {
    match (Number::decode(a, units), Number::decode(b, units)) {
        (Some(_), Some(_)) => compare(a, b, units) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Evaluate one of `less`, `lesseq`, `greater`, `greatereq`.
pub fn ordered(tag: &Tag, a: &Tree, b: &Tree, units: &Units) -> EvalResult<bool> {
    let op: &'static str = match tag {
        Tag::Less => "less",
        Tag::Lesseq => "lesseq",
        Tag::Greater => "greater",
        _ => "greatereq",
    };
    let ord = compare(a, b, units).ok_or_else(|| {
        let culprit = if a.is_compound() { a } else { b };
        EvalError::type_mismatch(op, "comparable values", culprit)
    })?;
    Ok(match tag {
        Tag::Less => ord == Ordering::Less,
        Tag::Lesseq => ord != Ordering::Greater,
        Tag::Greater => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    })
}

/// Concatenate strings, or the children of tuples.
pub fn merge(args: &[Tree]) -> EvalResult<Tree> {
    if args.iter().all(Tree::is_atomic) {
        let joined: String = args.iter().filter_map(Tree::as_str).collect();
        return Ok(Tree::atom(joined));
    }
    if let Some(bad) = args.iter().find(|t| !t.is_tuple()) {
        return Err(EvalError::type_mismatch("merge", "all strings or all tuples", bad));
    }
    let children = args.iter().flat_map(|t| t.children().iter().cloned()).collect();
    Ok(Tree::node(Tag::Tuple, children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn units() -> Units {
        Units::new(600)
    }

    fn atoms(xs: &[&str]) -> Vec<Tree> {
        xs.iter().map(|x| Tree::atom(x)).collect()
    }

    #[test]
    fn test_truth_convention() {
        assert!(is_true(&Tree::atom("true")));
        assert!(is_true(&Tree::atom("yes")));
        assert!(is_true(&Tree::atom("1")));
        assert!(!is_true(&Tree::atom("false")));
        assert!(!is_true(&Tree::atom("0")));
        assert!(!is_true(&Tree::atom("")));
        assert!(!is_true(&Tree::uninit()));
        assert!(!is_true(&Tree::parse("(tuple true)").unwrap()));
    }

    #[test]
    fn test_plus_numbers_and_lengths() {
        assert_eq!(plus(&atoms(&["1", "2", "3"]), &units()).unwrap(), Tree::atom("6"));
        assert_eq!(plus(&atoms(&["1", "0.5"]), &units()).unwrap(), Tree::atom("1.5"));
        assert_eq!(
            plus(&atoms(&["10tmpt", "5tmpt"]), &units()).unwrap(),
            Tree::atom("15tmpt")
        );
        assert!(plus(&atoms(&["10tmpt", "5"]), &units()).is_err());
        assert!(plus(&atoms(&["a"]), &units()).is_err());
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let max = i64::MAX.to_string();
        assert!(plus(&atoms(&[&max, "1"]), &units()).is_err());
    }

    #[test]
    fn test_minus_times_over() {
        let u = units();
        assert_eq!(minus(&Tree::atom("4"), None, &u).unwrap(), Tree::atom("-4"));
        assert_eq!(
            minus(&Tree::atom("4"), Some(&Tree::atom("6")), &u).unwrap(),
            Tree::atom("-2")
        );
        assert_eq!(times(&atoms(&["3", "20tmpt"]), &u).unwrap(), Tree::atom("60tmpt"));
        assert_eq!(over(&Tree::atom("7"), &Tree::atom("2"), &u).unwrap(), Tree::atom("3.5"));
        assert_eq!(over(&Tree::atom("6"), &Tree::atom("3"), &u).unwrap(), Tree::atom("2"));
        assert_eq!(
            over(&Tree::atom("30tmpt"), &Tree::atom("10tmpt"), &u).unwrap(),
            Tree::atom("3")
        );
    }

    #[test]
    fn test_division_by_zero() {
        let u = units();
        let err = divide(&Tree::atom("1"), &Tree::atom("0"), &u).unwrap_err();
        assert_eq!(err.to_string(), "division by zero in divide");
        assert!(modulo(&Tree::atom("1"), &Tree::atom("0"), &u).is_err());
        assert!(over(&Tree::atom("1"), &Tree::atom("0.0"), &u).is_err());
    }

    #[test]
    fn test_divide_and_modulo_truncate() {
        let u = units();
        assert_eq!(divide(&Tree::atom("-7"), &Tree::atom("2"), &u).unwrap(), Tree::atom("-3"));
        assert_eq!(modulo(&Tree::atom("-7"), &Tree::atom("2"), &u).unwrap(), Tree::atom("-1"));
        assert!(divide(&Tree::atom("7.5"), &Tree::atom("2"), &u).is_err());
    }

    #[test]
    fn test_comparisons() {
        let u = units();
        let t = |s: &str| Tree::atom(s);
        assert!(ordered(&Tag::Less, &t("9"), &t("10"), &u).unwrap());
        assert!(ordered(&Tag::Less, &t("abc"), &t("abd"), &u).unwrap());
        assert!(ordered(&Tag::Greatereq, &t("1in"), &t("2.54cm"), &u).unwrap());
        assert!(ordered(&Tag::Less, &Tree::uninit(), &t("1"), &u).is_err());
        assert!(equal(&t("1"), &t("1.0"), &u));
        assert!(!equal(&t("1"), &t("x"), &u));
        assert!(equal(&Tree::uninit(), &Tree::uninit(), &u));
    }

    #[test]
    fn test_merge() {
        assert_eq!(merge(&atoms(&["ab", "", "c"])).unwrap(), Tree::atom("abc"));
        let a = Tree::parse("(tuple 1 2)").unwrap();
        let b = Tree::parse("(tuple 3)").unwrap();
        assert_eq!(merge(&[a.clone(), b]).unwrap().to_string(), "(tuple 1 2 3)");
        assert!(merge(&[a, Tree::atom("x")]).is_err());
    }
}
