use crate::{magic_enum, ScriptError, ScriptResult};

magic_enum! {
    /// Operators and separators, numbered in the order of the default set: longer spellings first.
    pub Punct: u32, ScriptError::UnknownPunctuation {
        ShrAssign = 1 => ">>=",
        ShlAssign = 2 => "<<=",
        Ellipsis = 3 => "...",
        Paste = 4 => "##",
        LogicAnd = 5 => "&&",
        LogicOr = 6 => "||",
        GreaterEq = 7 => ">=",
        LessEq = 8 => "<=",
        Eq = 9 => "==",
        NotEq = 10 => "!=",
        MulAssign = 11 => "*=",
        DivAssign = 12 => "/=",
        ModAssign = 13 => "%=",
        AddAssign = 14 => "+=",
        SubAssign = 15 => "-=",
        Inc = 16 => "++",
        Dec = 17 => "--",
        AndAssign = 18 => "&=",
        OrAssign = 19 => "|=",
        XorAssign = 20 => "^=",
        Shr = 21 => ">>",
        Shl = 22 => "<<",
        Arrow = 23 => "->",
        Scope = 24 => "::",
        MemberPtr = 25 => ".*",
        Mul = 26 => "*",
        Div = 27 => "/",
        Mod = 28 => "%",
        Add = 29 => "+",
        Sub = 30 => "-",
        Assign = 31 => "=",
        BitAnd = 32 => "&",
        BitOr = 33 => "|",
        BitXor = 34 => "^",
        BitNot = 35 => "~",
        LogicNot = 36 => "!",
        Greater = 37 => ">",
        Less = 38 => "<",
        Dot = 39 => ".",
        Comma = 40 => ",",
        Semicolon = 41 => ";",
        Colon = 42 => ":",
        Question = 43 => "?",
        ParenOpen = 44 => "(",
        ParenClose = 45 => ")",
        BraceOpen = 46 => "{",
        BraceClose = 47 => "}",
        BracketOpen = 48 => "[",
        BracketClose = 49 => "]",
        Backslash = 50 => "\\",
        Hash = 51 => "#",
        Dollar = 52 => "$",
    }
}

/// The C/C++ operator set plus `#` and `$`.
pub const DEFAULT_PUNCTUATIONS: &[Punct] = Punct::ALL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunctEntry {
    pub text:  String,
    pub punct: Punct
}

/// Punctuation lookup bucketed by first byte. Each bucket is ordered longest spelling first, so
/// `>>=` is tried before `>>` before `>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunctuationTable {
    buckets: Vec<Vec<PunctEntry>>
}

impl PunctuationTable {
    pub fn new(set: &[Punct]) -> Self {
        Self::from_entries(set.iter().map(|&punct| PunctEntry { text: punct.text().to_string(), punct }))
    }

    /// Builds a table from `(spelling, code)` pairs. Codes must name a known [`Punct`].
    pub fn from_codes(set: &[(&str, u32)]) -> ScriptResult<Self> {
        let entries = set.iter()
            .map(|&(text, code)| Punct::try_from(code).map(|punct| PunctEntry { text: text.to_string(), punct }))
            .collect::<ScriptResult<Vec<_>>>()?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries<I: IntoIterator<Item = PunctEntry>>(entries: I) -> Self {
        let mut buckets = vec![Vec::new(); 256];
        for entry in entries {
            if let Some(&first) = entry.text.as_bytes().first() {
                buckets[first as usize].push(entry);
            }
        }
        for bucket in &mut buckets {
            bucket.sort_by(|a: &PunctEntry, b: &PunctEntry| b.text.len().cmp(&a.text.len()));
        }
        Self { buckets }
    }

    /// Longest entry that `input` starts with.
    pub fn longest_match(&self, input: &[u8]) -> Option<&PunctEntry> {
        let first = *input.first()?;
        self.buckets[first as usize].iter().find(|entry| input.starts_with(entry.text.as_bytes()))
    }

    pub fn len(&self) -> usize { self.buckets.iter().map(Vec::len).sum() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Default for PunctuationTable {
    fn default() -> Self { Self::new(DEFAULT_PUNCTUATIONS) }
}
