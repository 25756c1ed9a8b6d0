use thiserror::Error;
use crate::{ArenaError, CappedVec, Punct, Token, TokenKind};

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Capacity(#[from] ArenaError),
    #[error("Empty expression in #if/#elif")]
    Empty,
    #[error("Syntax error in #if/#elif")]
    Syntax,
    #[error("Can't evaluate {0}, not defined")]
    Undefined(String),
    #[error("Can't evaluate {0}")]
    Unsupported(String),
    #[error("defined without name in #if/#elif")]
    DefinedWithoutName,
    #[error("defined without ) in #if/#elif")]
    DefinedWithoutParen,
    #[error("Misplaced minus sign in #if/#elif")]
    MisplacedMinus,
    #[error("Too many ) in #if/#elif")]
    TooManyCloseParens,
    #[error("Too many ( in #if/#elif")]
    TooManyOpenParens,
    #[error("{0} after value in #if/#elif")]
    UnaryAfterValue(Punct),
    #[error("Operator {0} after operator in #if/#elif")]
    OperatorAfterOperator(Punct),
    #[error("Illegal operator {0} on floating point operands")]
    IllegalFloatOperator(Punct),
    #[error("++ or -- used in #if/#elif")]
    IncrementDecrement,
    #[error("Invalid operator {0} in #if/#elif")]
    InvalidOperator(String),
    #[error("Trailing operator in #if/#elif")]
    TrailingOperator,
    #[error("Missing values in #if/#elif")]
    MissingValues,
    #[error("Divide by zero in #if/#elif")]
    DivideByZero,
    #[error("Mod by zero in #if/#elif")]
    ModByZero,
    #[error("? after ? in #if/#elif")]
    QuestionAfterQuestion,
    #[error(": without ? in #if/#elif")]
    ColonWithoutQuestion,
}

/// Result of an evaluation. Both fields are always computed; integer mode reads `int`, float
/// mode reads `float`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EvalValue {
    pub int:   i64,
    pub float: f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    pub max_values:    usize,
    pub max_operators: usize
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self { max_values: 64, max_operators: 64 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Operand {
    int:   i64,
    float: f64
}

#[derive(Debug, Clone, Copy)]
struct Operator {
    punct:    Punct,
    priority: u8,
    parens:   i32
}

const FLOAT_EPSILON: f64 = 0.0001;

fn priority(punct: Punct) -> Option<u8> {
    Some(match punct {
        Punct::LogicNot | Punct::BitNot => 16,
        Punct::Mul | Punct::Div | Punct::Mod => 15,
        Punct::Add | Punct::Sub => 14,
        Punct::Shl | Punct::Shr => 13,
        Punct::Less | Punct::Greater | Punct::LessEq | Punct::GreaterEq => 12,
        Punct::Eq | Punct::NotEq => 11,
        Punct::BitAnd => 10,
        Punct::BitXor => 9,
        Punct::BitOr => 8,
        Punct::LogicAnd => 7,
        Punct::LogicOr => 6,
        Punct::Question | Punct::Colon => 5,
        _ => return None
    })
}

#[inline]
fn is_unary(punct: Punct) -> bool { matches!(punct, Punct::LogicNot | Punct::BitNot) }

#[inline]
fn integer_only(punct: Punct) -> bool {
    matches!(punct, Punct::BitNot | Punct::Mod | Punct::Shr | Punct::Shl | Punct::BitAnd | Punct::BitOr | Punct::BitXor)
}

#[inline]
fn truth(value: bool) -> (i64, f64) { (value as i64, value as i64 as f64) }

/// Evaluates an already macro-expanded expression. `defined NAME` and `defined(NAME)` are
/// answered through `is_defined`; any other name is an error.
pub fn evaluate<F: Fn(&str) -> bool>(
    tokens: &[Token],
    integer: bool,
    limits: EvalLimits,
    is_defined: F
) -> EvalResult<EvalValue> {
    if tokens.is_empty() {
        return Err(EvalError::Empty)
    }
    let mut values = CappedVec::new("#if value pool", limits.max_values);
    let mut operators = CappedVec::new("#if operator pool", limits.max_operators);
    let mut parens = 0;
    let mut last_was_value = false;
    let mut negative = false;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Name => {
                if last_was_value || negative {
                    return Err(EvalError::Syntax)
                }
                if token.text != "defined" {
                    return Err(EvalError::Undefined(token.text.clone()))
                }
                let mut name = iter.next().ok_or(EvalError::DefinedWithoutName)?;
                let braced = name.is_punct(Punct::ParenOpen);
                if braced {
                    name = iter.next().ok_or(EvalError::DefinedWithoutName)?;
                }
                if name.kind != TokenKind::Name {
                    return Err(EvalError::DefinedWithoutName)
                }
                let (int, float) = truth(is_defined(&name.text));
                values.push(Operand { int, float })?;
                if braced && !matches!(iter.next(), Some(close) if close.is_punct(Punct::ParenClose)) {
                    return Err(EvalError::DefinedWithoutParen)
                }
                last_was_value = true;
            }
            TokenKind::Number => {
                if last_was_value {
                    return Err(EvalError::Syntax)
                }
                let (mut int, mut float) = (token.int_value as i64, token.float_value);
                if negative {
                    int = int.wrapping_neg();
                    float = -float;
                    negative = false;
                }
                values.push(Operand { int, float })?;
                last_was_value = true;
            }
            TokenKind::Punctuation => {
                if negative {
                    return Err(EvalError::MisplacedMinus)
                }
                let punct = token.punct.ok_or_else(|| EvalError::InvalidOperator(token.text.clone()))?;
                match punct {
                    Punct::ParenOpen => {
                        if last_was_value {
                            return Err(EvalError::Syntax)
                        }
                        parens += 1;
                        continue
                    }
                    Punct::ParenClose => {
                        parens -= 1;
                        if parens < 0 {
                            return Err(EvalError::TooManyCloseParens)
                        }
                        continue
                    }
                    Punct::Sub if !last_was_value => {
                        negative = true;
                        continue
                    }
                    Punct::Inc | Punct::Dec => return Err(EvalError::IncrementDecrement),
                    _ => {}
                }
                let priority = priority(punct).ok_or_else(|| EvalError::InvalidOperator(token.text.clone()))?;
                match (is_unary(punct), last_was_value) {
                    (true, true) => return Err(EvalError::UnaryAfterValue(punct)),
                    (false, false) => return Err(EvalError::OperatorAfterOperator(punct)),
                    _ => {}
                }
                if !integer && integer_only(punct) {
                    return Err(EvalError::IllegalFloatOperator(punct))
                }
                operators.push(Operator { punct, priority, parens })?;
                last_was_value = false;
            }
            TokenKind::String | TokenKind::Literal => return Err(EvalError::Unsupported(token.text.clone())),
        }
    }
    if !last_was_value {
        return Err(EvalError::TrailingOperator)
    }
    if parens > 0 {
        return Err(EvalError::TooManyOpenParens)
    }
    reduce(values, operators, integer)
}

/// Applies operators until one value is left: deeper parentheses first, then higher priority,
/// left to right among equals.
fn reduce(mut values: CappedVec<Operand>, mut operators: CappedVec<Operator>, integer: bool) -> EvalResult<EvalValue> {
    let mut condition: Option<Operand> = None;

    while !operators.is_empty() {
        let (mut o, mut v) = (0, 0);
        while o + 1 < operators.len() {
            let (current, next) = (operators[o], operators[o + 1]);
            if current.parens > next.parens {
                break
            }
            // stacked unary operators apply left to right, so ~!0 is 0
            if current.parens == next.parens && current.priority >= next.priority {
                break
            }
            if !is_unary(current.punct) {
                v += 1;
            }
            o += 1;
        }

        let operator = operators[o];
        let binary = !is_unary(operator.punct);
        let right = match binary {
            true => Some(*values.get(v + 1).ok_or(EvalError::MissingValues)?),
            false => None,
        };
        let left = values.get_mut(v).ok_or(EvalError::MissingValues)?;
        apply(operator.punct, left, right, integer, &mut condition)?;

        if binary {
            // `?` drops its condition, everything else folds into the left operand
            match operator.punct {
                Punct::Question => values.remove(v),
                _ => values.remove(v + 1),
            };
        }
        operators.remove(o);
    }

    let result = values.first().ok_or(EvalError::MissingValues)?;
    Ok(EvalValue { int: result.int, float: result.float })
}

fn apply(
    punct: Punct,
    left: &mut Operand,
    right: Option<Operand>,
    integer: bool,
    condition: &mut Option<Operand>
) -> EvalResult<()> {
    let right = match right {
        Some(right) => right,
        None => {
            match punct {
                Punct::LogicNot => (left.int, left.float) = (truth(left.int == 0).0, truth(left.float == 0.0).1),
                _ => left.int = !left.int,
            }
            return Ok(())
        }
    };

    match punct {
        Punct::Mul => {
            left.int = left.int.wrapping_mul(right.int);
            left.float *= right.float;
        }
        Punct::Div => {
            if (integer && right.int == 0) || (!integer && right.float == 0.0) {
                return Err(EvalError::DivideByZero)
            }
            left.int = match right.int {
                0 => 0,
                divisor => left.int.wrapping_div(divisor),
            };
            left.float /= right.float;
        }
        Punct::Mod => {
            if right.int == 0 {
                return Err(EvalError::ModByZero)
            }
            left.int = left.int.wrapping_rem(right.int);
        }
        Punct::Add => {
            left.int = left.int.wrapping_add(right.int);
            left.float += right.float;
        }
        Punct::Sub => {
            left.int = left.int.wrapping_sub(right.int);
            left.float -= right.float;
        }
        Punct::Shl => left.int = left.int.wrapping_shl(right.int as u32),
        Punct::Shr => left.int = left.int.wrapping_shr(right.int as u32),
        Punct::BitAnd => left.int &= right.int,
        Punct::BitOr => left.int |= right.int,
        Punct::BitXor => left.int ^= right.int,
        Punct::Less => (left.int, left.float) = (truth(left.int < right.int).0, truth(left.float < right.float).1),
        Punct::Greater => (left.int, left.float) = (truth(left.int > right.int).0, truth(left.float > right.float).1),
        Punct::LessEq => (left.int, left.float) = (truth(left.int <= right.int).0, truth(left.float <= right.float).1),
        Punct::GreaterEq => (left.int, left.float) = (truth(left.int >= right.int).0, truth(left.float >= right.float).1),
        Punct::Eq => {
            (left.int, left.float) = (truth(left.int == right.int).0, truth((left.float - right.float).abs() < FLOAT_EPSILON).1)
        }
        Punct::NotEq => {
            (left.int, left.float) = (truth(left.int != right.int).0, truth((left.float - right.float).abs() >= FLOAT_EPSILON).1)
        }
        Punct::LogicAnd => {
            (left.int, left.float) = (truth(left.int != 0 && right.int != 0).0, truth(left.float != 0.0 && right.float != 0.0).1)
        }
        Punct::LogicOr => {
            (left.int, left.float) = (truth(left.int != 0 || right.int != 0).0, truth(left.float != 0.0 || right.float != 0.0).1)
        }
        Punct::Question => {
            if condition.is_some() {
                return Err(EvalError::QuestionAfterQuestion)
            }
            *condition = Some(*left);
        }
        Punct::Colon => {
            let taken = condition.take().ok_or(EvalError::ColonWithoutQuestion)?;
            let false_branch = match integer {
                true => taken.int == 0,
                false => taken.float == 0.0,
            };
            if false_branch {
                (left.int, left.float) = (right.int, right.float);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Script, Tokenizer};

    fn eval_with(text: &str, integer: bool) -> EvalResult<EvalValue> {
        let tokens = Script::new("expr", text).tokenize_until_end().unwrap();
        evaluate(&tokens, integer, EvalLimits::default(), |name| name == "ON")
    }

    fn int(text: &str) -> EvalResult<i64> { eval_with(text, true).map(|value| value.int) }

    #[test]
    fn honours_precedence() {
        assert_eq!(int("2 + 3 * 4 == 14"), Ok(1));
        assert_eq!(int("2 + 3 * 4"), Ok(14));
        assert_eq!(int("(2 + 3) * 4"), Ok(20));
        assert_eq!(int("1 << 2 + 1"), Ok(8));
        assert_eq!(int("10 - 4 - 3"), Ok(3));
        assert_eq!(int("7 % 4 | 8 & 12 ^ 1"), Ok(11));
        assert_eq!(int("1 < 2 && 3 >= 3 || 0"), Ok(1));
    }

    #[test]
    fn unary_operators_and_minus() {
        assert_eq!(int("!0 + ~0"), Ok(0));
        assert_eq!(int("-3 * -2"), Ok(6));
        assert_eq!(int("1 + !2"), Ok(1));
        assert_eq!(int("5 !"), Err(EvalError::UnaryAfterValue(Punct::LogicNot)));
        assert_eq!(int("- (1)"), Err(EvalError::MisplacedMinus));
        assert_eq!(int("~!0"), Ok(0));
    }

    #[test]
    fn ternary() {
        assert_eq!(int("1 ? 2 : 3"), Ok(2));
        assert_eq!(int("0 ? 2 : 3"), Ok(3));
        assert_eq!(int("1 : 3"), Err(EvalError::ColonWithoutQuestion));
    }

    #[test]
    fn defined_queries() {
        assert_eq!(int("defined ON"), Ok(1));
        assert_eq!(int("defined(OFF)"), Ok(0));
        assert_eq!(int("!defined(OFF) && defined ON"), Ok(1));
        assert_eq!(int("defined(ON"), Err(EvalError::DefinedWithoutParen));
        assert_eq!(int("defined 3"), Err(EvalError::DefinedWithoutName));
        assert_eq!(int("OFF + 1"), Err(EvalError::Undefined("OFF".into())));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(int("1 / 0"), Err(EvalError::DivideByZero));
        assert_eq!(int("1 % 0"), Err(EvalError::ModByZero));
        assert_eq!(eval_with("1.0 / 0.0", false), Err(EvalError::DivideByZero));
    }

    #[test]
    fn float_mode() {
        let value = eval_with("1.5 * 3 - 0.25", false).unwrap();
        assert!((value.float - 4.25).abs() < 1e-9);
        assert_eq!(eval_with("0.10001 == 0.1", false).map(|v| v.float), Ok(1.0));
        assert_eq!(eval_with("1 << 2", false), Err(EvalError::IllegalFloatOperator(Punct::Shl)));
    }

    #[test]
    fn malformed_expressions() {
        assert_eq!(int(""), Err(EvalError::Empty));
        assert_eq!(int("1 +"), Err(EvalError::TrailingOperator));
        assert_eq!(int("(1"), Err(EvalError::TooManyOpenParens));
        assert_eq!(int("1)"), Err(EvalError::TooManyCloseParens));
        assert_eq!(int("1 2"), Err(EvalError::Syntax));
        assert_eq!(int("1 * * 2"), Err(EvalError::OperatorAfterOperator(Punct::Mul)));
        assert_eq!(int("a++"), Err(EvalError::Undefined("a".into())));
        assert_eq!(int("1 ++ 2"), Err(EvalError::IncrementDecrement));
        assert_eq!(int("1 = 2"), Err(EvalError::InvalidOperator("=".into())));
        assert_eq!(int("\"s\""), Err(EvalError::Unsupported("\"s\"".into())));
    }

    #[test]
    fn pools_are_bounded() {
        let tokens = Script::new("expr", "1 + 2 + 3").tokenize_until_end().unwrap();
        let limits = EvalLimits { max_values: 2, max_operators: 8 };
        assert!(matches!(evaluate(&tokens, true, limits, |_| false), Err(EvalError::Capacity(_))));
    }
}
