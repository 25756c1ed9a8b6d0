use log::debug;
use crate::{evaluate, EvalError, EvalLimits, EvalValue, NumberFlags, PrecompError, PrecompResult, Punct, Source, Token,
            TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    If,
    IfDef,
    IfNDef,
    Elif,
    Else,
    EndIf,
    Include,
    Define,
    Undef,
    Line,
    Error,
    Pragma,
    Eval,
    EvalFloat
}

const DIRECTIVES: [(Directive, &str); 14] = [
    (Directive::If, "if"),
    (Directive::IfDef, "ifdef"),
    (Directive::IfNDef, "ifndef"),
    (Directive::Elif, "elif"),
    (Directive::Else, "else"),
    (Directive::EndIf, "endif"),
    (Directive::Include, "include"),
    (Directive::Define, "define"),
    (Directive::Undef, "undef"),
    (Directive::Line, "line"),
    (Directive::Error, "error"),
    (Directive::Pragma, "pragma"),
    (Directive::Eval, "eval"),
    (Directive::EvalFloat, "evalfloat"),
];

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        DIRECTIVES.iter().find(|(_, text)| *text == name).map(|&(directive, _)| directive)
    }

    pub fn name(self) -> &'static str {
        DIRECTIVES.iter().find(|(directive, _)| *directive == self).map_or("", |&(_, text)| text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndentKind {
    If,
    IfDef,
    IfNDef,
    Elif,
    Else
}

/// One open conditional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indent {
    pub kind:   IndentKind,
    /// Tokens of this branch are dropped.
    pub skip:   bool,
    /// Some branch of the chain has already been taken.
    pub taken:  bool,
    /// Depth of the script the block was opened in.
    pub script: usize,
}

impl Source {
    /// Runs the directive introduced by `hash`. When it fails, the rest of its line is dropped.
    pub(crate) fn read_directive(&mut self, hash: &Token) -> PrecompResult<()> {
        let result = self.dispatch_directive(hash);
        if result.is_err() {
            if let Err(error) = self.skip_line() {
                self.report(&error);
            }
        }
        result
    }

    fn dispatch_directive(&mut self, hash: &Token) -> PrecompResult<()> {
        let Some(token) = self.read_source_token()? else {
            return Err(PrecompError::DirectiveWithoutName("#"))
        };
        if token.lines_crossed > 0 {
            self.unread_source_token(token)?;
            return match self.skip > 0 {
                true => Ok(()),
                false => Err(PrecompError::DirectiveAtEndOfLine("#")),
            }
        }
        let directive = match token.kind {
            TokenKind::Name => Directive::from_name(&token.text),
            _ => None,
        };
        let Some(directive) = directive else {
            return match self.skip > 0 {
                true => Ok(()),
                false => Err(PrecompError::UnknownDirective(token.text)),
            }
        };
        match directive {
            Directive::If => self.if_directive(),
            Directive::IfDef => self.ifdef_directive(IndentKind::IfDef),
            Directive::IfNDef => self.ifdef_directive(IndentKind::IfNDef),
            Directive::Elif => self.elif_directive(),
            Directive::Else => self.else_directive(),
            Directive::EndIf => self.endif_directive(),
            Directive::Include => self.include_directive(),
            Directive::Define => self.define_directive(),
            Directive::Undef => self.undef_directive(),
            Directive::Line if self.skip > 0 => Ok(()),
            Directive::Line => Err(PrecompError::LineNotSupported),
            Directive::Error => self.error_directive(),
            Directive::Pragma => self.pragma_directive(),
            Directive::Eval => self.eval_directive(hash, true),
            Directive::EvalFloat => self.eval_directive(hash, false),
        }
    }

    fn push_indent(&mut self, kind: IndentKind, skip: bool, taken: bool) {
        let script = self.scripts.len().saturating_sub(1);
        if skip {
            self.skip += 1;
        }
        self.indents.push(Indent { kind, skip, taken, script });
    }

    fn pop_indent(&mut self) -> Option<Indent> {
        let indent = self.indents.pop()?;
        if indent.skip {
            self.skip -= 1;
        }
        Some(indent)
    }

    /// The innermost block, which must have been opened in the current script.
    fn current_indent(&self, directive: &'static str) -> PrecompResult<Indent> {
        let script = self.scripts.len().saturating_sub(1);
        match self.indents.last() {
            None => Err(PrecompError::Misplaced(directive)),
            Some(indent) if indent.script != script => Err(PrecompError::IndentMismatch { directive }),
            Some(indent) => Ok(*indent),
        }
    }

    /// Closes the blocks the innermost script left open.
    pub(crate) fn close_script_indents(&mut self) {
        let script = self.scripts.len().saturating_sub(1);
        while self.indents.last().is_some_and(|indent| indent.script == script) {
            self.warning("missing #endif");
            self.pop_indent();
        }
    }

    fn if_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            self.push_indent(IndentKind::If, true, true);
            return Ok(())
        }
        let value = self.evaluate_line(true)?;
        self.push_indent(IndentKind::If, value.int == 0, value.int != 0);
        Ok(())
    }

    fn ifdef_directive(&mut self, kind: IndentKind) -> PrecompResult<()> {
        if self.skip > 0 {
            self.push_indent(kind, true, true);
            return Ok(())
        }
        let name = match kind {
            IndentKind::IfNDef => "ifndef",
            _ => "ifdef",
        };
        let Some(token) = self.read_line()? else {
            return Err(PrecompError::MissingName(name))
        };
        if token.kind != TokenKind::Name {
            let found = token.text.clone();
            self.unread_source_token(token)?;
            return Err(PrecompError::Expected { expected: format!("name after #{name}"), found })
        }
        let skip = (kind == IndentKind::IfDef) != self.macros.contains(&token.text);
        self.push_indent(kind, skip, !skip);
        Ok(())
    }

    fn elif_directive(&mut self) -> PrecompResult<()> {
        let top = self.current_indent("elif")?;
        if top.kind == IndentKind::Else {
            return Err(PrecompError::AfterElse("elif"))
        }
        let outer_skip = self.skip - u32::from(top.skip) > 0;
        let skip = match outer_skip || top.taken {
            true => true,
            false => self.evaluate_line(true)?.int == 0,
        };
        self.pop_indent();
        self.push_indent(IndentKind::Elif, skip, top.taken || !skip);
        Ok(())
    }

    fn else_directive(&mut self) -> PrecompResult<()> {
        let top = self.current_indent("else")?;
        if top.kind == IndentKind::Else {
            return Err(PrecompError::AfterElse("else"))
        }
        self.pop_indent();
        self.push_indent(IndentKind::Else, top.taken, true);
        Ok(())
    }

    fn endif_directive(&mut self) -> PrecompResult<()> {
        self.current_indent("endif")?;
        self.pop_indent();
        Ok(())
    }

    fn error_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        let mut parts = Vec::new();
        while let Some(token) = self.read_line()? {
            parts.push(match token.kind {
                TokenKind::String | TokenKind::Literal => token.unquoted().to_string(),
                _ => token.text,
            });
        }
        Err(PrecompError::UserError(parts.join(" ")))
    }

    fn pragma_directive(&mut self) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        self.warning("#pragma directive not supported");
        self.skip_line()
    }

    fn eval_directive(&mut self, hash: &Token, integer: bool) -> PrecompResult<()> {
        if self.skip > 0 {
            return Ok(())
        }
        let value = self.evaluate_line(integer)?;
        self.push_value(value, integer, hash)
    }

    /// Handles `$evalint(..)` and `$evalfloat(..)`.
    pub(crate) fn read_dollar_directive(&mut self, dollar: &Token) -> PrecompResult<()> {
        let Some(token) = self.read_source_token()? else {
            return Err(PrecompError::DirectiveWithoutName("$"))
        };
        if token.lines_crossed > 0 {
            self.unread_source_token(token)?;
            return Err(PrecompError::DirectiveAtEndOfLine("$"))
        }
        let integer = match (token.kind, token.text.as_str()) {
            (TokenKind::Name, "evalint") => true,
            (TokenKind::Name, "evalfloat") => false,
            _ => {
                let name = format!("${}", token.text);
                self.unread_source_token(token)?;
                return Err(PrecompError::UnknownDirective(name))
            }
        };

        match self.read_source_token()? {
            Some(open) if open.is_punct(Punct::ParenOpen) => {}
            Some(open) => {
                let found = open.text.clone();
                self.unread_source_token(open)?;
                return Err(PrecompError::Expected { expected: "'('".to_string(), found })
            }
            None => return Err(PrecompError::UnexpectedEnd("'('".to_string())),
        }

        let mut tokens = Vec::new();
        let mut after_defined = false;
        let mut nesting = 1;
        loop {
            let Some(token) = self.read_source_token()? else {
                return Err(PrecompError::UnexpectedEnd("')'".to_string()))
            };
            if token.is_punct(Punct::ParenOpen) {
                nesting += 1;
            } else if token.is_punct(Punct::ParenClose) {
                nesting -= 1;
                if nesting == 0 {
                    break
                }
            }
            self.collect_expression_token(token, &mut tokens, &mut after_defined)?;
        }
        let value = self.evaluate_tokens(&tokens, integer)?;
        self.push_value(value, integer, dollar)
    }

    /// Evaluates the rest of the directive line.
    fn evaluate_line(&mut self, integer: bool) -> PrecompResult<EvalValue> {
        let mut tokens = Vec::new();
        let mut after_defined = false;
        while let Some(token) = self.read_line()? {
            self.collect_expression_token(token, &mut tokens, &mut after_defined)?;
        }
        self.evaluate_tokens(&tokens, integer)
    }

    /// Adds `token` to an expression, expanding macros in place. The name following `defined`
    /// is kept as written.
    fn collect_expression_token(&mut self, token: Token, tokens: &mut Vec<Token>, after_defined: &mut bool) -> PrecompResult<()> {
        match token.kind {
            TokenKind::Name if *after_defined => {
                *after_defined = false;
                tokens.push(token);
            }
            TokenKind::Name if token.text == "defined" => {
                *after_defined = true;
                tokens.push(token);
            }
            TokenKind::Name if self.macros.contains(&token.text) => self.expand_into_source(&token)?,
            TokenKind::Name => return Err(EvalError::Undefined(token.text).into()),
            TokenKind::Number | TokenKind::Punctuation => tokens.push(token),
            TokenKind::String | TokenKind::Literal => return Err(EvalError::Unsupported(token.text).into()),
        }
        Ok(())
    }

    fn evaluate_tokens(&self, tokens: &[Token], integer: bool) -> PrecompResult<EvalValue> {
        let limits = EvalLimits {
            max_values: self.options.max_eval_values,
            max_operators: self.options.max_eval_operators,
        };
        Ok(evaluate(tokens, integer, limits, |name| self.macros.contains(name))?)
    }

    /// Queues the result of an evaluation where `origin` stood: a number, preceded by `-` when
    /// negative.
    fn push_value(&mut self, value: EvalValue, integer: bool, origin: &Token) -> PrecompResult<()> {
        let line = origin.line;
        let (negative, number) = match integer {
            true => (value.int < 0, Token {
                flags: NumberFlags::INTEGER | NumberFlags::LONG | NumberFlags::DECIMAL,
                ..Token::integer(value.int.unsigned_abs(), line)
            }),
            false => (value.float < 0.0, Token {
                flags: NumberFlags::FLOAT | NumberFlags::LONG | NumberFlags::DECIMAL,
                ..Token::float(value.float.abs(), line)
            }),
        };
        debug!("evaluated to {}{}", if negative { "-" } else { "" }, number.text);

        let mut tokens = Vec::with_capacity(2);
        if negative {
            tokens.push(Token::punctuation(Punct::Sub, line));
        }
        tokens.push(number);
        for (index, token) in tokens.iter_mut().enumerate() {
            token.depth = origin.depth;
            if index == 0 {
                token.lines_crossed = origin.lines_crossed;
                token.whitespace_before = origin.whitespace_before;
                token.line_start = origin.line_start;
            }
        }
        self.push_tokens(tokens)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use crate::{Tokenizer, Severity};
    use super::*;

    fn run(text: &str) -> (Vec<String>, Source) {
        let mut source = Source::from_memory("directive.txt", text);
        let tokens = source.tokenize_until_end().unwrap().into_iter().map(|token| token.text).collect();
        (tokens, source)
    }

    #[test]
    fn looks_up_directive_names() {
        assert_eq!(Directive::from_name("ifndef"), Some(Directive::IfNDef));
        assert_eq!(Directive::from_name("import"), None);
        assert_eq!(Directive::EvalFloat.name(), "evalfloat");
    }

    #[test]
    fn takes_first_true_branch() {
        let text = "#define B 2\n#if B == 1\none\n#elif B == 2\ntwo\n#elif 1\nthree\n#else\nfour\n#endif\nend";
        let (tokens, source) = run(text);
        assert_eq!(tokens, ["two", "end"]);
        assert_eq!(source.skip_depth(), 0);
    }

    #[test]
    fn nested_blocks_inside_skipped_ones_stay_skipped() {
        let text = "#ifdef MISSING\n#if 1\na\n#else\nb\n#endif\n#else\nc\n#endif";
        assert_eq!(run(text).0, ["c"]);
    }

    #[test]
    fn ifndef_guards() {
        let text = "#ifndef GUARD\n#define GUARD\nx\n#endif\n#ifndef GUARD\ny\n#endif";
        assert_eq!(run(text).0, ["x"]);
    }

    #[test]
    fn undefined_names_fail_in_conditions() {
        let mut source = Source::from_memory("cond.txt", "#if UNKNOWN\na\n#endif\nb");
        assert!(matches!(source.read_token(), Err(PrecompError::Eval(EvalError::Undefined(_)))));
    }

    #[test]
    fn else_ends_the_chain() {
        let (tokens, source) = run("#if 0\na\n#else\nb\n#else\nc\n#endif");
        assert_eq!(tokens, ["b", "c"]);
        assert_eq!(source.diagnostics()[0].message, "#else after #else");

        let (tokens, source) = run("#if 1\na\n#else\nb\n#elif 1\nc\n#endif");
        assert_eq!(tokens, ["a"]);
        assert_eq!(source.diagnostics()[0].message, "#elif after #else");
    }

    #[test]
    fn misplaced_else_is_reported_and_skipped() {
        let (tokens, source) = run("a\n#else\nb\n#endif\nc");
        assert_eq!(tokens, ["a", "b", "c"]);
        assert_eq!(source.diagnostics().iter().filter(|d| d.severity == Severity::Error).count(), 2);
    }

    #[test]
    fn unterminated_block_is_closed_at_end() {
        let (tokens, source) = run("#if 0\na\n");
        assert!(tokens.is_empty());
        assert_eq!(source.diagnostics()[0].message, "missing #endif");
        assert_eq!(source.skip_depth(), 0);
    }

    #[test]
    fn hash_at_end_of_line_fails() {
        let mut source = Source::from_memory("hash.txt", "#\nx");
        assert!(matches!(source.read_token(), Err(PrecompError::DirectiveAtEndOfLine("#"))));
        assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("x".to_string()));
    }

    #[test]
    fn unknown_directive_fails_outside_skipped_blocks() {
        let mut source = Source::from_memory("unknown.txt", "#import x\ny");
        assert!(matches!(source.read_token(), Err(PrecompError::UnknownDirective(_))));
        assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("y".to_string()));

        assert_eq!(run("#if 0\n#import x\n#endif\nz").0, ["z"]);
    }

    #[test]
    fn error_directive_carries_its_text() {
        let mut source = Source::from_memory("error.txt", "#error \"bad\" config\nnext");
        match source.read_token() {
            Err(PrecompError::UserError(text)) => assert_eq!(text, "bad config"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(source.read_token(), Ok(Some(_))));
    }

    #[test]
    fn line_directive_is_rejected() {
        let mut source = Source::from_memory("line.txt", "#line 10\na");
        assert!(matches!(source.read_token(), Err(PrecompError::LineNotSupported)));
    }

    #[test]
    fn pragma_is_ignored_with_warning() {
        let (tokens, source) = run("#pragma once\na");
        assert_eq!(tokens, ["a"]);
        assert_eq!(source.diagnostics()[0].severity, Severity::Warning);
    }

    #[test]
    fn eval_directives_splice_numbers() {
        assert_eq!(run("#define N 4\nx =\n#eval N * 3 - 20").0, ["x", "=", "-", "8"]);
        assert_eq!(run("#evalfloat 1 / 4").0, ["0.25"]);
    }

    #[test]
    fn dollar_eval_uses_balanced_parens() {
        let (tokens, _) = run("#define W 3\nsize = $evalint((W + 1) * 2);");
        assert_eq!(tokens, ["size", "=", "8", ";"]);
        assert_eq!(run("$evalfloat(3 / 2)").0, ["1.50"]);
    }

    #[test]
    fn evaluated_tokens_keep_number_flags() {
        let mut source = Source::from_memory("flags.txt", "$evalint(6 * 7)");
        let token = source.read_token().unwrap().unwrap();
        assert_eq!(token.int_value, 42);
        assert_eq!(token.flags, NumberFlags::INTEGER | NumberFlags::LONG | NumberFlags::DECIMAL);
    }

    #[test]
    fn unknown_dollar_directive_fails() {
        let mut source = Source::from_memory("dollar.txt", "$other");
        assert!(matches!(source.read_token(), Err(PrecompError::UnknownDirective(name)) if name == "$other"));
    }
}
