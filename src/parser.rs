use chumsky::error::SimpleReason;
use chumsky::prelude::*;

use crate::ast::{Assignment, BinOp, Definition, Expr, ParsedLine};
use crate::errors::ParseError;

fn expression() -> impl Parser<char, Expr, Error = Simple<char>> + Clone {
    recursive(|expr| {
        let digits = filter(|c: &char| c.is_ascii_digit())
            .repeated()
            .at_least(1)
            .collect::<String>();

        let mantissa = digits
            .clone()
            .then(
                just('.')
                    .ignore_then(filter(|c: &char| c.is_ascii_digit()).repeated().collect::<String>())
                    .or_not(),
            )
            .map(|(int, frac)| match frac {
                Some(frac) => format!("{int}.{frac}"),
                None => int,
            })
            .or(just('.').ignore_then(digits.clone()).map(|frac| format!("0.{frac}")));

        let exponent = one_of("eE")
            .ignore_then(one_of("+-").or_not())
            .then(digits)
            .map(|(sign, digits)| match sign {
                Some(sign) => format!("e{sign}{digits}"),
                None => format!("e{digits}"),
            });

        let number = mantissa
            .then(exponent.or_not())
            .try_map(|(mantissa, exponent), span| {
                let text = format!("{mantissa}{}", exponent.unwrap_or_default());
                match text.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(Expr::Number(value)),
                    Ok(_) => Err(Simple::custom(span, format!("number '{text}' is out of range"))),
                    Err(e) => Err(Simple::custom(span, format!("invalid number '{text}': {e}"))),
                }
            })
            .padded();

        let ident = text::ident().padded();

        let args = expr
            .clone()
            .separated_by(just(',').padded())
            .allow_trailing()
            .delimited_by(just('(').padded(), just(')').padded());

        let call = ident
            .clone()
            .then(args)
            .map(|(name, args)| Expr::Call { name, args });

        let atom = number
            .or(call)
            .or(ident.map(Expr::Name))
            .or(expr.delimited_by(just('(').padded(), just(')').padded()));

        let pow_op = just("**").or(just("^")).padded();

        // `-a^2` is `-(a^2)` and `a^b^c` is `a^(b^c)`.
        let factor = recursive(|factor| {
            let power = atom
                .then(pow_op.ignore_then(factor.clone()).or_not())
                .map(|(base, exponent)| match exponent {
                    Some(exponent) => Expr::binary(BinOp::Pow, base, exponent),
                    None => base,
                });

            just('-')
                .padded()
                .ignore_then(factor.clone())
                .map(Expr::neg)
                .or(just('+').padded().ignore_then(factor))
                .or(power)
        });

        let op = |c: char| just(c).padded();

        let product = factor
            .clone()
            .then(
                op('*')
                    .to(BinOp::Mul)
                    .or(op('/').to(BinOp::Div))
                    .then(factor)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs));

        product
            .clone()
            .then(
                op('+')
                    .to(BinOp::Add)
                    .or(op('-').to(BinOp::Sub))
                    .then(product)
                    .repeated(),
            )
            .foldl(|lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
    })
}

fn line() -> impl Parser<char, ParsedLine, Error = Simple<char>> {
    let assignment = text::ident()
        .padded()
        .then_ignore(just(":="))
        .then(expression())
        .map(|(target, value)| ParsedLine::Assignment(Assignment { target, value }));

    let equation = expression()
        .then_ignore(just("==").or(just("=")))
        .then(expression())
        .map(|(lhs, rhs)| ParsedLine::Equation(Expr::compare(lhs, rhs)));

    assignment.or(equation).then_ignore(end())
}

fn definition() -> impl Parser<char, Definition, Error = Simple<char>> {
    let params = text::ident()
        .padded()
        .separated_by(just(','))
        .allow_trailing()
        .delimited_by(just('(').padded(), just(')').padded());

    text::ident()
        .padded()
        .then(params.or_not())
        .then_ignore(just('='))
        .then(expression())
        .then_ignore(end())
        .map(|((name, params), body)| match params {
            Some(params) => Definition::Function { name, params, body },
            None => Definition::Constant { name, value: body },
        })
}

/// Everything before the first `#`.
pub fn strip_comment(text: &str) -> &str {
    text.split('#').next().unwrap_or_default()
}

fn to_parse_error(line: usize, source: &str, errors: Vec<Simple<char>>) -> ParseError {
    let Some(error) = errors.into_iter().next() else {
        return ParseError::new(line, "invalid syntax", source, (0, source.len()));
    };
    let message = match error.reason() {
        SimpleReason::Custom(message) => message.clone(),
        SimpleReason::Unclosed { delimiter, .. } => format!("unclosed delimiter '{delimiter}'"),
        SimpleReason::Unexpected => {
            let mut expected: Vec<String> = error
                .expected()
                .filter_map(|c| c.as_ref().map(|c| format!("'{c}'")))
                .collect();
            expected.sort();
            expected.dedup();
            let found = match error.found() {
                Some(c) => format!("unexpected '{c}'"),
                None => "unexpected end of line".to_string(),
            };
            if expected.is_empty() {
                found
            } else {
                format!("{found}, expected one of {}", expected.join(", "))
            }
        }
    };
    let span = error.span();
    ParseError::new(line, message, source, (span.start, span.end.saturating_sub(span.start)))
}

/// Parses one line of the equation document. `line` is 1-based and only
/// used for diagnostics.
pub fn parse_line(text: &str, line: usize) -> Result<ParsedLine, ParseError> {
    let code = strip_comment(text);
    if code.trim().is_empty() {
        return Ok(ParsedLine::Empty);
    }
    self::line()
        .parse(code)
        .map_err(|errors| to_parse_error(line, code, errors))
}

pub fn parse_expression(text: &str) -> Result<Expr, ParseError> {
    expression()
        .then_ignore(end())
        .parse(text)
        .map_err(|errors| to_parse_error(1, text, errors))
}

/// Parses a `name = expr` or `name(params) = expr` script statement.
pub fn parse_definition(text: &str, line: usize) -> Result<Definition, ParseError> {
    let code = strip_comment(text);
    definition()
        .parse(code)
        .map_err(|errors| to_parse_error(line, code, errors))
}

/// Splits a document into per-line parse results, skipping blank and
/// comment-only lines.
pub fn parse_document(text: &str) -> Vec<Result<ParsedLine, ParseError>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| parse_line(line, i + 1))
        .filter(|parsed| !matches!(parsed, Ok(ParsedLine::Empty)))
        .collect()
}
