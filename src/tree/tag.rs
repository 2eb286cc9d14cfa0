//! Node tags.
//!
//! Every primitive the evaluator and the inactive rewriter understand is a
//! variant of [`Tag`]. Macro applications carry their name in
//! [`Tag::User`]; they are data, not new node kinds.

use std::fmt;
use std::sync::Arc;

use phf::phf_map;

/// The tag of a compound tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------
    Document,
    Concat,
    Tuple,
    Uninit,
    Error,
    RawData,
    Symbol,
    Hybrid,
    Point,
    Include,

    // ------------------------------------------------------------------
    // Variables, arguments and macros
    // ------------------------------------------------------------------
    Value,
    Arg,
    EvalArgs,
    Quote,
    Delay,
    Quasiquote,
    Unquote,
    UnquoteSplice,
    Macro,
    XMacro,
    Compound,
    Assign,
    With,

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------
    Provides,
    DrdProps,
    GetLabel,
    GetArity,
    GetBinding,
    GetAttachment,

    // ------------------------------------------------------------------
    // Logic and arithmetic
    // ------------------------------------------------------------------
    Or,
    And,
    Xor,
    Not,
    Plus,
    Minus,
    Times,
    Over,
    Divide,
    Modulo,

    // ------------------------------------------------------------------
    // Strings and tuples
    // ------------------------------------------------------------------
    Merge,
    Length,
    Range,
    Lookup,
    IsTuple,
    Number,
    Date,
    Translate,
    FindFile,

    // ------------------------------------------------------------------
    // Comparisons and control flow
    // ------------------------------------------------------------------
    Equal,
    Unequal,
    Less,
    Lesseq,
    Greater,
    Greatereq,
    If,
    Case,
    While,
    RewriteInactive,

    // ------------------------------------------------------------------
    // Source view produced by the inactive rewriter
    // ------------------------------------------------------------------
    SrcArg,
    SrcValue,
    SrcSymbol,
    SrcHybrid,
    SrcRaw,
    SrcHighlight,
    SrcExpand,
    InlineTag,
    OpenTag,
    CloseTag,

    /// Application of a user macro.
    User(Arc<str>),
}

static TAGS: phf::Map<&'static str, Tag> = phf_map! {
    "document" => Tag::Document,
    "concat" => Tag::Concat,
    "tuple" => Tag::Tuple,
    "uninit" => Tag::Uninit,
    "error" => Tag::Error,
    "raw-data" => Tag::RawData,
    "symbol" => Tag::Symbol,
    "hybrid" => Tag::Hybrid,
    "point" => Tag::Point,
    "include" => Tag::Include,
    "value" => Tag::Value,
    "arg" => Tag::Arg,
    "eval-args" => Tag::EvalArgs,
    "quote" => Tag::Quote,
    "delay" => Tag::Delay,
    "quasiquote" => Tag::Quasiquote,
    "unquote" => Tag::Unquote,
    "unquote*" => Tag::UnquoteSplice,
    "macro" => Tag::Macro,
    "xmacro" => Tag::XMacro,
    "compound" => Tag::Compound,
    "assign" => Tag::Assign,
    "with" => Tag::With,
    "provides" => Tag::Provides,
    "drd-props" => Tag::DrdProps,
    "get-label" => Tag::GetLabel,
    "get-arity" => Tag::GetArity,
    "get-binding" => Tag::GetBinding,
    "get-attachment" => Tag::GetAttachment,
    "or" => Tag::Or,
    "and" => Tag::And,
    "xor" => Tag::Xor,
    "not" => Tag::Not,
    "plus" => Tag::Plus,
    "minus" => Tag::Minus,
    "times" => Tag::Times,
    "over" => Tag::Over,
    "divide" => Tag::Divide,
    "modulo" => Tag::Modulo,
    "merge" => Tag::Merge,
    "length" => Tag::Length,
    "range" => Tag::Range,
    "lookup" => Tag::Lookup,
    "is-tuple" => Tag::IsTuple,
    "number" => Tag::Number,
    "date" => Tag::Date,
    "translate" => Tag::Translate,
    "find-file" => Tag::FindFile,
    "equal" => Tag::Equal,
    "unequal" => Tag::Unequal,
    "less" => Tag::Less,
    "lesseq" => Tag::Lesseq,
    "greater" => Tag::Greater,
    "greatereq" => Tag::Greatereq,
    "if" => Tag::If,
    "case" => Tag::Case,
    "while" => Tag::While,
    "rewrite-inactive" => Tag::RewriteInactive,
    "src-arg" => Tag::SrcArg,
    "src-value" => Tag::SrcValue,
    "src-symbol" => Tag::SrcSymbol,
    "src-hybrid" => Tag::SrcHybrid,
    "src-raw" => Tag::SrcRaw,
    "src-highlight" => Tag::SrcHighlight,
    "src-expand" => Tag::SrcExpand,
    "inline-tag" => Tag::InlineTag,
    "open-tag" => Tag::OpenTag,
    "close-tag" => Tag::CloseTag,
};

/// Allowed number of children for a primitive: `(min, max)`.
pub type Arity = (usize, Option<usize>);

impl Tag {
    /// Resolve a tag name. Names that are not primitives become user tags.
    pub fn from_name(name: &str) -> Tag {
        match TAGS.get(name) {
            Some(tag) => tag.clone(),
            None => Tag::User(Arc::from(name)),
        }
    }

    /// Whether `name` is the name of a primitive.
    pub fn is_primitive_name(name: &str) -> bool {
        TAGS.contains_key(name)
    }

    /// The textual name of this tag.
    pub fn name(&self) -> &str {
        match self {
            Tag::Document => "document",
            Tag::Concat => "concat",
            Tag::Tuple => "tuple",
            Tag::Uninit => "uninit",
            Tag::Error => "error",
            Tag::RawData => "raw-data",
            Tag::Symbol => "symbol",
            Tag::Hybrid => "hybrid",
            Tag::Point => "point",
            Tag::Include => "include",
            Tag::Value => "value",
            Tag::Arg => "arg",
            Tag::EvalArgs => "eval-args",
            Tag::Quote => "quote",
            Tag::Delay => "delay",
            Tag::Quasiquote => "quasiquote",
            Tag::Unquote => "unquote",
            Tag::UnquoteSplice => "unquote*",
            Tag::Macro => "macro",
            Tag::XMacro => "xmacro",
            Tag::Compound => "compound",
            Tag::Assign => "assign",
            Tag::With => "with",
            Tag::Provides => "provides",
            Tag::DrdProps => "drd-props",
            Tag::GetLabel => "get-label",
            Tag::GetArity => "get-arity",
            Tag::GetBinding => "get-binding",
            Tag::GetAttachment => "get-attachment",
            Tag::Or => "or",
            Tag::And => "and",
            Tag::Xor => "xor",
            Tag::Not => "not",
            Tag::Plus => "plus",
            Tag::Minus => "minus",
            Tag::Times => "times",
            Tag::Over => "over",
            Tag::Divide => "divide",
            Tag::Modulo => "modulo",
            Tag::Merge => "merge",
            Tag::Length => "length",
            Tag::Range => "range",
            Tag::Lookup => "lookup",
            Tag::IsTuple => "is-tuple",
            Tag::Number => "number",
            Tag::Date => "date",
            Tag::Translate => "translate",
            Tag::FindFile => "find-file",
            Tag::Equal => "equal",
            Tag::Unequal => "unequal",
            Tag::Less => "less",
            Tag::Lesseq => "lesseq",
            Tag::Greater => "greater",
            Tag::Greatereq => "greatereq",
            Tag::If => "if",
            Tag::Case => "case",
            Tag::While => "while",
            Tag::RewriteInactive => "rewrite-inactive",
            Tag::SrcArg => "src-arg",
            Tag::SrcValue => "src-value",
            Tag::SrcSymbol => "src-symbol",
            Tag::SrcHybrid => "src-hybrid",
            Tag::SrcRaw => "src-raw",
            Tag::SrcHighlight => "src-highlight",
            Tag::SrcExpand => "src-expand",
            Tag::InlineTag => "inline-tag",
            Tag::OpenTag => "open-tag",
            Tag::CloseTag => "close-tag",
            Tag::User(name) => name.as_ref(),
        }
    }

    /// Arity constraint of an evaluated primitive, if it has one.
    pub fn arity(&self) -> Option<Arity> {
        use Tag::*;
        Some(match self {
            Value | EvalArgs | Quote | Delay | Quasiquote | Unquote | UnquoteSplice => (1, Some(1)),
            Provides | GetLabel | GetArity | Not | Length | IsTuple | Include => (1, Some(1)),
            Arg | Macro | Compound | Or | And | Plus | Times | Merge | FindFile | Point => {
                (1, None)
            }
            With => (1, None),
            XMacro | Assign | DrdProps | Xor | Over | Divide | Modulo | Lookup | Number => {
                (2, Some(2))
            }
            Equal | Unequal | Less | Lesseq | Greater | Greatereq | While | RewriteInactive => {
                (2, Some(2))
            }
            GetBinding | GetAttachment | Minus => (1, Some(2)),
            Range | Translate => (3, Some(3)),
            Date => (0, Some(2)),
            If => (2, Some(3)),
            Case => (2, None),
            _ => return None,
        })
    }

    /// Constructs that compute something when executed.
    ///
    /// The inactive rewriter shows these as tags instead of descending into
    /// them as markup.
    pub fn is_active(&self) -> bool {
        use Tag::*;
        matches!(
            self,
            EvalArgs
                | Quote
                | Delay
                | Quasiquote
                | Unquote
                | UnquoteSplice
                | Macro
                | XMacro
                | Assign
                | With
                | Provides
                | DrdProps
                | GetLabel
                | GetArity
                | GetBinding
                | GetAttachment
                | Or
                | And
                | Xor
                | Not
                | Plus
                | Minus
                | Times
                | Over
                | Divide
                | Modulo
                | Merge
                | Length
                | Range
                | Lookup
                | IsTuple
                | Number
                | Date
                | Translate
                | FindFile
                | Include
                | Equal
                | Unequal
                | Less
                | Lesseq
                | Greater
                | Greatereq
                | If
                | Case
                | While
                | RewriteInactive
        )
    }

    /// Whether this is a user macro tag.
    pub fn is_user(&self) -> bool {
        matches!(self, Tag::User(_))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_table() {
        for (name, tag) in TAGS.entries() {
            assert_eq!(tag.name(), *name);
            assert_eq!(&Tag::from_name(name), tag);
        }
    }

    #[test]
    fn test_unknown_names_are_user_tags() {
        let tag = Tag::from_name("theorem");
        assert!(tag.is_user());
        assert_eq!(tag.name(), "theorem");
        assert_eq!(tag.arity(), None);
        assert!(!tag.is_active());
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(Tag::If.arity(), Some((2, Some(3))));
        assert_eq!(Tag::Plus.arity(), Some((1, None)));
        assert_eq!(Tag::Document.arity(), None);
    }
}
