use std::collections::HashMap;
use std::sync::Arc;
use bitflags::bitflags;
use chrono::{Datelike, Local};
use log::debug;
use vfs::MemoryFS;
use super::check_token_length;
use crate::{PrecompError, PrecompOptions, PrecompResult, Punct, Source, Token, TokenKind};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MacroFlags: u32 {
        /// Can be neither redefined nor undefined.
        const FIXED  = 0x0001;
        /// Installed into every source a precompiler opens.
        const GLOBAL = 0x0002;
    }
}

/// Macros whose replacement is computed at each use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Line,
    File,
    Date,
    Time
}

pub const BUILTINS: [(&str, Builtin); 4] = [
    ("__LINE__", Builtin::Line),
    ("__FILE__", Builtin::File),
    ("__DATE__", Builtin::Date),
    ("__TIME__", Builtin::Time),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name:          String,
    pub flags:         MacroFlags,
    pub builtin:       Option<Builtin>,
    pub params:        Vec<String>,
    /// Declared with a parameter list, possibly empty. Such a macro is only expanded with `(..)`.
    pub function_like: bool,
    pub tokens:        Vec<Token>,
}

impl Macro {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            flags: MacroFlags::empty(),
            builtin: None,
            params: Vec::new(),
            function_like: false,
            tokens: Vec::new(),
        }
    }

    pub fn builtin<S: Into<String>>(name: S, builtin: Builtin) -> Self {
        Self { flags: MacroFlags::FIXED, builtin: Some(builtin), ..Self::new(name) }
    }

    #[inline]
    pub fn param_index(&self, name: &str) -> Option<usize> { self.params.iter().position(|param| param == name) }

    /// Fixed and global macros may not be replaced from inside a source.
    #[inline]
    pub fn is_protected(&self) -> bool { self.flags.intersects(MacroFlags::FIXED | MacroFlags::GLOBAL) }
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>
}

impl MacroTable {
    pub fn new() -> Self { Self::default() }

    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (name, builtin) in BUILTINS {
            table.define(Macro::builtin(name, builtin));
        }
        table
    }

    /// Inserts `definition`, returning the macro it replaced.
    pub fn define(&mut self, definition: Macro) -> Option<Macro> {
        self.macros.insert(definition.name.clone(), definition)
    }

    pub fn undef(&mut self, name: &str) -> Option<Macro> { self.macros.remove(name) }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Macro> { self.macros.get(name) }

    #[inline]
    pub fn contains(&self, name: &str) -> bool { self.macros.contains_key(name) }

    #[inline]
    pub fn len(&self) -> usize { self.macros.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.macros.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> { self.macros.values() }

    pub fn clear(&mut self) { self.macros.clear() }
}

impl Source {
    /// Parses `text` as the body of a `#define` line, e.g. `"NAME(a, b) a + b"`.
    pub fn define_from_string(text: &str, options: &PrecompOptions) -> PrecompResult<Macro> {
        let mut source = Source::load_memory("*extern", text, Arc::new(MemoryFS::new()), options.clone());
        source.read_define()
    }

    /// Defines a macro in this source from the text of a `#define` line.
    pub fn add_define(&mut self, text: &str) -> PrecompResult<()> {
        let definition = Source::define_from_string(text, &self.options)?;
        self.insert_define(definition)
    }

    /// Installs the macros of `globals`, marked global. Builtins are never replaced.
    pub fn add_globals(&mut self, globals: &MacroTable) {
        for global in globals.iter() {
            if self.macros.get(&global.name).is_some_and(|existing| existing.builtin.is_some()) {
                continue
            }
            let mut definition = global.clone();
            definition.flags |= MacroFlags::GLOBAL;
            self.macros.define(definition);
        }
    }

    pub(crate) fn define_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        let definition = self.read_define()?;
        self.insert_define(definition)
    }

    pub(crate) fn undef_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        let name = self.read_macro_name("undef")?;
        match self.macros.get(&name).map(Macro::is_protected) {
            Some(true) => self.warning(format!("can't undef {name}")),
            Some(false) => {
                self.macros.undef(&name);
                debug!("undefined {}", name);
            }
            None => {}
        }
        Ok(())
    }

    fn insert_define(&mut self, definition: Macro) -> PrecompResult<()> {
        match self.macros.get(&definition.name).map(Macro::is_protected) {
            Some(true) => return Err(PrecompError::RedefineFixed(definition.name)),
            Some(false) => self.warning(format!("redefinition of {}", definition.name)),
            None => {}
        }
        debug!("defined {} with {} parameters", definition.name, definition.params.len());
        self.macros.define(definition);
        Ok(())
    }

    fn read_macro_name(&mut self, directive: &'static str) -> PrecompResult<String> {
        let Some(token) = self.read_line()? else {
            return Err(PrecompError::MissingName(directive))
        };
        if token.kind != TokenKind::Name {
            let found = token.text.clone();
            self.unread_source_token(token)?;
            return Err(PrecompError::Expected { expected: format!("name after #{directive}"), found })
        }
        Ok(token.text)
    }

    /// Reads the rest of a `#define` line into a macro without installing it.
    pub(crate) fn read_define(&mut self) -> PrecompResult<Macro> {
        let mut definition = Macro::new(self.read_macro_name("define")?);
        let Some(mut token) = self.read_line()? else {
            return Ok(definition)
        };

        if !token.whitespace_before && token.is_punct(Punct::ParenOpen) {
            definition.function_like = true;
            self.read_define_params(&mut definition)?;
            token = match self.read_line()? {
                Some(token) => token,
                None => return Ok(definition),
            };
        }

        loop {
            if token.is_name(&definition.name) {
                self.report(&PrecompError::RecursiveDefine(definition.name.clone()));
            } else {
                token.lines_crossed = 0;
                token.line_start = false;
                definition.tokens.push(token);
            }
            match self.read_line()? {
                Some(next) => token = next,
                None => break,
            }
        }

        let is_paste = |token: Option<&Token>| token.is_some_and(|token| token.is_punct(Punct::Paste));
        if is_paste(definition.tokens.first()) || is_paste(definition.tokens.last()) {
            return Err(PrecompError::MisplacedPaste)
        }
        Ok(definition)
    }

    fn read_define_params(&mut self, definition: &mut Macro) -> PrecompResult<()> {
        match self.read_line()? {
            Some(token) if token.is_punct(Punct::ParenClose) => return Ok(()),
            Some(token) => self.unread_source_token(token)?,
            None => return Err(PrecompError::ExpectedParameter),
        }
        loop {
            let param = self.read_line()?.ok_or(PrecompError::ExpectedParameter)?;
            if param.kind != TokenKind::Name {
                return Err(PrecompError::InvalidParameter(param.text))
            }
            if definition.param_index(&param.text).is_some() {
                return Err(PrecompError::DuplicateParameter(param.text))
            }
            if definition.params.len() >= self.options.max_define_parms {
                return Err(PrecompError::TooManyParameters(self.options.max_define_parms))
            }
            definition.params.push(param.text);

            let separator = self.read_line()?.ok_or(PrecompError::UnterminatedParameters)?;
            if separator.is_punct(Punct::ParenClose) {
                return Ok(())
            }
            if !separator.is_punct(Punct::Comma) {
                return Err(PrecompError::Expected { expected: "',' or ')'".to_string(), found: separator.text })
            }
        }
    }

    /// Replaces the macro named by `invocation` with its expansion at the front of the stream.
    pub(crate) fn expand_into_source(&mut self, invocation: &Token) -> PrecompResult<()> {
        let depth = invocation.depth + 1;
        if depth > self.options.max_expansion_depth {
            return Err(PrecompError::MacroRecursion {
                name: invocation.text.clone(),
                limit: self.options.max_expansion_depth,
            })
        }
        let Some(definition) = self.macros.get(&invocation.text).cloned() else {
            return self.unread_source_token(invocation.clone())
        };

        let mut tokens = match definition.builtin {
            Some(builtin) => vec![self.expand_builtin(builtin, invocation)],
            None => {
                let arguments = match definition.function_like {
                    true => self.read_macro_arguments(&definition)?,
                    false => Vec::new(),
                };
                let substituted = self.substitute(&definition, &arguments)?;
                merge_pasted(substituted, self.options.max_token_length)?
            }
        };

        for (index, token) in tokens.iter_mut().enumerate() {
            token.line = invocation.line;
            token.depth = token.depth.max(depth);
            match index {
                0 => {
                    token.lines_crossed = invocation.lines_crossed;
                    token.whitespace_before = invocation.whitespace_before;
                    token.line_start = invocation.line_start;
                }
                _ => {
                    token.lines_crossed = 0;
                    token.line_start = false;
                }
            }
        }
        self.push_tokens(tokens)
    }

    fn expand_builtin(&self, builtin: Builtin, invocation: &Token) -> Token {
        let line = invocation.line;
        match builtin {
            Builtin::Line => Token::integer(line as u64, line),
            Builtin::File => Token::string(self.current_filename(), line),
            Builtin::Date => {
                let now = Local::now();
                Token::string(&format!("{} {:2} {}", now.format("%b"), now.day(), now.year()), line)
            }
            Builtin::Time => Token::string(&Local::now().format("%H:%M:%S").to_string(), line),
        }
    }

    /// Reads `( arg, .. )` after a function-like macro name. Macros inside arguments are expanded
    /// before they are substituted.
    fn read_macro_arguments(&mut self, definition: &Macro) -> PrecompResult<Vec<Vec<Token>>> {
        let name = &definition.name;
        match self.read_source_token()? {
            Some(token) if token.is_punct(Punct::ParenOpen) => {}
            Some(token) => {
                self.unread_source_token(token)?;
                return Err(PrecompError::MissingArguments(name.clone()))
            }
            None => return Err(PrecompError::MissingArguments(name.clone())),
        }

        let count = definition.params.len();
        let mut arguments = vec![Vec::new(); count];
        if count == 0 {
            return match self.read_source_token()? {
                Some(token) if token.is_punct(Punct::ParenClose) => Ok(arguments),
                Some(_) => Err(PrecompError::TooManyArguments { name: name.clone(), expected: 0 }),
                None => Err(PrecompError::UnterminatedArguments(name.clone())),
            }
        }

        let (mut index, mut nesting, mut after_comma) = (0, 1, true);
        loop {
            let Some(token) = self.read_source_token()? else {
                return Err(PrecompError::UnterminatedArguments(name.clone()))
            };
            if nesting == 1 && token.is_punct(Punct::Comma) {
                if after_comma {
                    self.warning("too many comma's");
                }
                index += 1;
                if index >= count {
                    return Err(PrecompError::TooManyArguments { name: name.clone(), expected: count })
                }
                after_comma = true;
                continue
            }
            after_comma = false;

            if token.is_punct(Punct::ParenOpen) {
                nesting += 1;
            } else if token.is_punct(Punct::ParenClose) {
                nesting -= 1;
                if nesting == 0 {
                    if arguments[count - 1].is_empty() {
                        self.warning("too few define parms");
                    }
                    return Ok(arguments)
                }
            } else if token.kind == TokenKind::Name && self.macros.contains(&token.text) {
                self.expand_into_source(&token)?;
                continue
            }
            arguments[index].push(token);
        }
    }

    /// Body of `definition` with parameters replaced and `#param` stringized.
    fn substitute(&mut self, definition: &Macro, arguments: &[Vec<Token>]) -> PrecompResult<Vec<Token>> {
        let mut output = Vec::with_capacity(definition.tokens.len());
        let mut body = definition.tokens.iter().peekable();
        while let Some(token) = body.next() {
            if token.kind == TokenKind::Name {
                if let Some(index) = definition.param_index(&token.text) {
                    output.extend(arguments[index].iter().cloned());
                    continue
                }
            }
            if token.is_punct(Punct::Hash) {
                let param = body.peek()
                    .filter(|next| next.kind == TokenKind::Name)
                    .and_then(|next| definition.param_index(&next.text));
                match param {
                    Some(index) => {
                        body.next();
                        output.push(stringize(&arguments[index], token.line, self.options.max_token_length)?);
                    }
                    None => self.warning("stringizing operator without define parameter"),
                }
                continue
            }
            output.push(token.clone());
        }
        Ok(output)
    }
}

/// A string token spelling out `tokens`, with a single space wherever whitespace separated them.
/// Fails if the result would not be shorter than `max` bytes.
pub fn stringize(tokens: &[Token], line: u32, max: usize) -> PrecompResult<Token> {
    let mut text = String::new();
    for (index, token) in tokens.iter().enumerate() {
        if index > 0 && token.whitespace_before {
            text.push(' ');
        }
        text.push_str(&token.text);
    }
    let token = Token::string(&text, line);
    check_token_length(&token, max)?;
    Ok(token)
}

/// Resolves every `a ## b` in `tokens`. Pasted tokens must stay shorter than `max` bytes.
pub fn merge_pasted(tokens: Vec<Token>, max: usize) -> PrecompResult<Vec<Token>> {
    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut input = tokens.into_iter().peekable();
    while let Some(token) = input.next() {
        if token.is_punct(Punct::Paste) && input.peek().is_some() {
            if let Some(left) = output.last_mut() {
                if let Some(right) = input.next() {
                    merge_tokens(left, &right)?;
                    check_token_length(left, max)?;
                }
                continue
            }
        }
        output.push(token);
    }
    Ok(output)
}

fn merge_tokens(left: &mut Token, right: &Token) -> PrecompResult<()> {
    match (left.kind, right.kind) {
        (TokenKind::Name, TokenKind::Name | TokenKind::Number) => left.text.push_str(&right.text),
        (TokenKind::String, TokenKind::String) => {
            left.text.pop();
            left.text.push_str(&right.text[1..]);
        }
        _ => return Err(PrecompError::InvalidPaste { left: left.text.clone(), right: right.text.clone() }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use crate::{ScriptError, Tokenizer};
    use super::*;

    fn expand(text: &str) -> Vec<String> {
        let mut source = Source::from_memory("define.txt", text);
        source.tokenize_until_end().unwrap().into_iter().map(|token| token.text).collect()
    }

    #[test]
    fn parses_parameters_and_body() {
        let definition = Source::define_from_string("MAX(a, b) ((a) > (b) ? (a) : (b))", &PrecompOptions::default()).unwrap();
        assert_eq!(definition.name, "MAX");
        assert_eq!(definition.params, ["a", "b"]);
        assert!(definition.function_like);
        assert_eq!(definition.tokens.len(), 17);

        let spaced = Source::define_from_string("GROUP (x)", &PrecompOptions::default()).unwrap();
        assert!(!spaced.function_like);
        assert_eq!(spaced.tokens.len(), 3);
    }

    #[test]
    fn rejects_bad_parameter_lists() {
        let options = PrecompOptions::default();
        assert!(matches!(Source::define_from_string("F(a, a) a", &options), Err(PrecompError::DuplicateParameter(_))));
        assert!(matches!(Source::define_from_string("F(1) 1", &options), Err(PrecompError::InvalidParameter(_))));
        assert!(matches!(Source::define_from_string("F(a b) a", &options), Err(PrecompError::Expected { .. })));
        assert!(matches!(Source::define_from_string("F(a,", &options), Err(PrecompError::ExpectedParameter)));
        assert!(matches!(Source::define_from_string("F ## x", &options), Err(PrecompError::MisplacedPaste)));
    }

    #[test]
    fn drops_self_reference_from_body() {
        let definition = Source::define_from_string("LOOP 1 + LOOP", &PrecompOptions::default()).unwrap();
        let body: Vec<_> = definition.tokens.iter().map(|token| token.text.as_str()).collect();
        assert_eq!(body, ["1", "+"]);
    }

    #[test]
    fn substitutes_arguments() {
        assert_eq!(expand("#define ADD(a, b) a + b\nADD(1, (2, 3))"), ["1", "+", "(", "2", ",", "3", ")"]);
        assert_eq!(expand("#define ONE 1\n#define ID(x) x\nID(ONE)"), ["1"]);
        assert_eq!(expand("#define NONE() 0\nNONE()"), ["0"]);
    }

    #[test]
    fn stringizes_and_pastes() {
        assert_eq!(expand("#define STR(x) #x\nSTR(a  +b)"), ["\"a +b\""]);
        assert_eq!(expand("#define CAT(a, b) a ## b\nCAT(var, 12)"), ["var12"]);
        assert_eq!(expand("#define JOIN(a, b) a ## b\nJOIN(\"x\", \"y\")"), ["\"xy\""]);
    }

    #[test]
    fn argument_count_warnings() {
        let text = "#define F(a, b, c) a b c\nF(1,,3)\n#define ADD(a, b) a + b\nADD(1)";
        let mut source = Source::from_memory("args.txt", text);
        let tokens: Vec<_> = source.tokenize_until_end().unwrap().into_iter().map(|token| token.text).collect();
        assert_eq!(tokens, ["1", "3", "1", "+"]);
        let messages: Vec<_> = source.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["too many comma's", "too few define parms"]);
    }

    #[test]
    fn argument_list_errors() {
        let mut source = Source::from_memory("args.txt", "#define ADD(a, b) a + b\nADD(1, 2, 3)");
        assert!(matches!(source.read_token(), Err(PrecompError::TooManyArguments { expected: 2, .. })));

        let mut source = Source::from_memory("args.txt", "#define F(x) x\nF + 1");
        assert!(matches!(source.read_token(), Err(PrecompError::MissingArguments(name)) if name == "F"));
        assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("+".to_string()));
    }

    fn expand_bounded(text: &str, max: usize) -> PrecompResult<Vec<String>> {
        let options = PrecompOptions::default().with_max_token_length(max);
        let mut source = Source::load_memory("bounded.txt", text, Arc::new(MemoryFS::new()), options);
        Ok(source.tokenize_until_end()?.into_iter().map(|token| token.text).collect())
    }

    #[test]
    fn built_tokens_stay_bounded() {
        let too_long = |result: PrecompResult<Vec<String>>| {
            matches!(result, Err(PrecompError::Script(ScriptError::TokenTooLong { max: 16, .. })))
        };
        assert!(too_long(expand_bounded("#define CAT(a, b) a ## b\nCAT(abcdefghij, klmnopqrst)", 16)));
        assert!(too_long(expand_bounded("#define STR(x) #x\nSTR(a b c d e f g h)", 16)));
        assert_eq!(expand_bounded("#define CAT(a, b) a ## b\nCAT(abc, def)", 16).unwrap(), ["abcdef"]);
    }

    #[test]
    fn builtins_expand_in_place() {
        let mut source = Source::from_memory("built.txt", "\n__LINE__ __FILE__ __DATE__ __TIME__");
        let tokens = source.tokenize_until_end().unwrap();
        assert_eq!(tokens[0].int_value, 2);
        assert_eq!(tokens[1].text, "\"built.txt\"");
        assert_eq!(tokens[2].unquoted().len(), 11);
        assert_eq!(tokens[3].unquoted().len(), 8);
    }

    #[test]
    fn stringize_joins_with_single_spaces() {
        let mut a = Token::name("a", 1);
        a.whitespace_before = true;
        let mut plus = Token::punctuation(Punct::Add, 1);
        plus.whitespace_before = true;
        let b = Token::name("b", 1);
        assert_eq!(stringize(&[a, plus, b], 1, 1024).unwrap().text, "\"a +b\"");
    }

    #[test]
    fn pasting_punctuation_fails() {
        let tokens = vec![Token::name("a", 1), Token::punctuation(Punct::Paste, 1), Token::punctuation(Punct::Add, 1)];
        assert!(matches!(merge_pasted(tokens, 1024), Err(PrecompError::InvalidPaste { .. })));
    }
}
