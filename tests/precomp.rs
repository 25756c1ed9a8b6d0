mod common;

use pretty_assertions::assert_eq;
use precomp::{ArenaError, EvalError, PrecompError, PrecompOptions, ScriptError, ScriptFlags, Severity, Source,
              TokenKind, Tokenizer};
use common::{kinds, shared_fs, source, texts};

#[test]
fn object_macro_expands_the_same_every_time() {
    let mut source = source("#define A 5\nA A\nA");
    let tokens = source.tokenize_until_end().unwrap();
    assert_eq!(kinds(&tokens), vec![(TokenKind::Number, "5".to_string()); 3]);
    assert!(tokens.iter().all(|token| token.int_value == 5));
}

#[test]
fn function_macro_substitutes_arguments() {
    assert_eq!(texts(&mut source("#define ADD(a,b) a+b\nADD(1,2)")).unwrap(), ["1", "+", "2"]);
}

#[test]
fn stringize_makes_one_string() {
    let tokens = source("#define STR(x) #x\nSTR(foo)").tokenize_until_end().unwrap();
    assert_eq!(kinds(&tokens), [(TokenKind::String, "\"foo\"".to_string())]);
    assert_eq!(tokens[0].unquoted(), "foo");
}

#[test]
fn paste_makes_one_name() {
    let tokens = source("#define CAT(a,b) a##b\nCAT(fo,o)").tokenize_until_end().unwrap();
    assert_eq!(kinds(&tokens), [(TokenKind::Name, "foo".to_string())]);
}

#[test]
fn ifdef_picks_one_branch() {
    let block = "#ifdef X\nA\n#else\nB\n#endif";
    assert_eq!(texts(&mut source(block)).unwrap(), ["B"]);
    assert_eq!(texts(&mut source(&format!("#define X\n{block}"))).unwrap(), ["A"]);
}

#[test]
fn expressions_follow_c_precedence() {
    assert_eq!(texts(&mut source("#if 2 + 3 * 4 == 14\nyes\n#else\nno\n#endif")).unwrap(), ["yes"]);
    assert_eq!(texts(&mut source("#eval 1 ? 2 : 3")).unwrap(), ["2"]);

    let mut failing = source("#if 1/0\nA\n#endif\nB");
    assert!(matches!(failing.read_token(), Err(PrecompError::Eval(EvalError::DivideByZero))));
    assert!(failing.diagnostics().iter().any(|d| d.severity == Severity::Error));
}

#[test]
fn indirect_include_cycle_is_diagnosed() {
    let fs = shared_fs(&[("/a.h", "#include \"b.h\"\na"), ("/b.h", "#include \"a.h\"\nb")]);
    let mut source = Source::load_file("a.h", fs, PrecompOptions::default()).unwrap();
    assert_eq!(texts(&mut source).unwrap(), ["b", "a"]);
    assert_eq!(source.diagnostics().len(), 1);
    assert_eq!(source.diagnostics()[0].file, "b.h");
}

#[test]
fn fixed_macros_survive_redefinition() {
    let mut source = source("#define __LINE__ 3\n#undef __FILE__\n__LINE__");
    let tokens = source.tokenize_until_end().unwrap();
    assert_eq!(tokens[0].int_value, 3);
    assert_eq!(tokens[0].line, 3);
    let severities: Vec<_> = source.diagnostics().iter().map(|d| d.severity).collect();
    assert_eq!(severities, [Severity::Error, Severity::Warning]);
}

#[test]
fn mutual_recursion_stops_at_depth_limit() {
    let mut source = source("#define A B\n#define B A\nA");
    assert!(matches!(source.read_token(), Err(PrecompError::MacroRecursion { limit: 64, .. })));
}

#[test]
fn pending_arena_bounds_expansion() {
    let options = PrecompOptions::default().with_max_pending_tokens(4);
    let mut source = Source::load_memory("big.txt", "#define BIG 1 2 3 4 5\nBIG", shared_fs(&[]), options);
    assert!(matches!(source.read_token(), Err(PrecompError::Arena(ArenaError::Exhausted { capacity: 4, .. }))));
}

#[test]
fn strings_from_one_expansion_are_merged() {
    let tokens = source("#define PAIR(x, y) x y\nPAIR(\"a\", \"b\")").tokenize_until_end().unwrap();
    assert_eq!(kinds(&tokens), [(TokenKind::String, "\"ab\"".to_string())]);
}

#[test]
fn dollar_eval_inside_expressions() {
    let text = "#define W 10\nwidth = $evalint(W * 2) + $evalfloat(W / 4);";
    assert_eq!(texts(&mut source(text)).unwrap(), ["width", "=", "20", "+", "2.50", ";"]);
}

#[test]
fn scanner_errors_reach_the_caller() {
    let mut source = source("a /* never closed");
    assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("a".to_string()));
    assert!(matches!(source.read_token(), Err(PrecompError::Script(ScriptError::UnterminatedComment { .. }))));
}

#[test]
fn silenced_errors_still_fail() {
    let options = PrecompOptions::default().with_script_flags(ScriptFlags::NO_ERRORS);
    let mut source = Source::load_memory("quiet.txt", "#error stop", shared_fs(&[]), options);
    assert!(matches!(source.read_token(), Err(PrecompError::UserError(_))));
    assert!(source.diagnostics().is_empty());
}

#[test]
fn location_tracks_included_files() {
    let fs = shared_fs(&[("/inc/part.h", "\n\npart")]);
    let options = PrecompOptions::default().with_include_path("inc");
    let mut source = Source::load_memory("main.txt", "#include <part.h>\nmain", fs, options);
    assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("part".to_string()));
    let location = source.location();
    assert_eq!((location.filename.as_str(), location.line), ("inc/part.h", 3));
    assert_eq!(source.read_token().unwrap().map(|t| t.text), Some("main".to_string()));
    assert_eq!(source.location().filename, "main.txt");
}

#[test]
fn custom_punctuation_sets_apply_to_new_scripts() {
    let fs = shared_fs(&[("/ops.h", "a := b")]);
    let mut source = Source::load_memory("main.txt", "#include \"ops.h\"", fs, PrecompOptions::default());
    source.set_punctuations(precomp::PunctuationTable::from_codes(&[(":", 42), ("=", 31)]).unwrap());
    assert_eq!(texts(&mut source).unwrap(), ["a", ":", "=", "b"]);
}
