use std::{collections::HashSet, fmt};

use crate::{
    ast::{BinaryOperator, CONSTANTS, Direction, SumProdKind},
    function::Function,
    lexer::{Delimiter, RelationKind, Token, TokenKind, greek_letter},
    syntax::{Adjacency, Syntax},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {}, found {} at position {}",
            self.expected, self.found, self.position
        )
    }
}

/// Names declared as parameters. A declared name is never parsed as a
/// function name, so `x(x+1)` multiplies when `x` is declared.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub variables: HashSet<String>,
}

impl ParseOptions {
    pub fn with_variables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: names.into_iter().map(Into::into).collect(),
        }
    }

    fn is_callable(&self, name: &str) -> bool {
        !self.variables.contains(name) && !CONSTANTS.contains(&name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mode {
    /// Parsing `x` in `\sin x`; stops at an operator, a group, another
    /// function or whitespace.
    bare_argument: bool,
    /// Between `|` bars, where the next `|` closes rather than opens.
    inside_bars: bool,
    /// Parsing `a` in `\lim_{x \to a^+}`; leaves a direction suffix alone.
    limit_approach: bool,
}

impl Mode {
    fn bars() -> Self {
        Mode {
            inside_bars: true,
            ..Mode::default()
        }
    }
}

enum Exponent {
    Value(Syntax),
    Dagger,
    Prime,
}

struct Tokens<'a> {
    tokens: Vec<Token>,
    index: usize,
    end: usize,
    options: &'a ParseOptions,
}

impl<'a> Tokens<'a> {
    fn new(tokens: Vec<Token>, end: usize, options: &'a ParseOptions) -> Self {
        Self {
            tokens,
            index: 0,
            end,
            options,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek_nth_kind(0)
    }

    fn peek_nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.index + n).map(|t| t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: impl Into<String>) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError {
                position: token.span.start,
                expected: expected.into(),
                found: token.to_small_string(),
            },
            None => SyntaxError {
                position: self.end,
                expected: expected.into(),
                found: "end of input".into(),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.index += 1;
                Ok(token)
            }
            _ => Err(self.error(expected)),
        }
    }

    /// Takes the first digit of the number at the cursor and leaves the
    /// rest in place, so `\frac12` reads as `\frac{1}{2}`.
    fn take_digit(&mut self) -> Option<String> {
        let token = self.tokens.get_mut(self.index)?;
        if token.kind != TokenKind::Number {
            return None;
        }
        let first = token.text.chars().next().filter(char::is_ascii_digit)?;
        if token.text.len() == 1 {
            self.index += 1;
        } else {
            token.text.remove(0);
            token.span.start += 1;
        }
        Some(first.to_string())
    }

    fn starts_factor(&self, mode: Mode) -> bool {
        use TokenKind as Tk;
        match self.peek_kind() {
            Some(Tk::Pipe) => !mode.inside_bars,
            Some(
                Tk::Number
                | Tk::Symbol
                | Tk::Function(_)
                | Tk::Differential
                | Tk::Partial
                | Tk::Open(_)
                | Tk::Frac
                | Tk::Binom
                | Tk::Sqrt
                | Tk::Sum
                | Tk::Prod
                | Tk::Int
                | Tk::Lim
                | Tk::Infinity,
            ) => true,
            _ => false,
        }
    }

    fn starts_function_application(&self, mode: Mode) -> bool {
        use TokenKind as Tk;
        match self.peek_kind() {
            Some(Tk::Function(_) | Tk::Sqrt | Tk::Open(Delimiter::Floor | Delimiter::Ceil | Delimiter::Angle)) => true,
            Some(Tk::Pipe) => !mode.inside_bars,
            Some(Tk::Symbol) => {
                let name = &self.tokens[self.index].text;
                self.peek_nth_kind(1) == Some(Tk::Open(Delimiter::Round))
                    && self.options.is_callable(name)
            }
            _ => false,
        }
    }

    /// Whether the token at the cursor starts where the previous one ends.
    fn touches_previous(&self) -> bool {
        let Some(previous) = self.index.checked_sub(1).and_then(|i| self.tokens.get(i)) else {
            return false;
        };
        self.peek().is_some_and(|token| token.span.start == previous.span.end)
    }

    /// Decides whether `last` followed by the token at the cursor is an
    /// implicit multiplication, trying each shape in order.
    fn adjacency(&self, last: &Syntax, mode: Mode) -> Option<Adjacency> {
        use TokenKind as Tk;
        if !self.starts_factor(mode) {
            return None;
        }
        let next = self.peek_kind()?;
        if matches!(next, Tk::Differential | Tk::Partial) {
            return (!mode.bare_argument).then_some(Adjacency::Differential);
        }
        let next_is_function = self.starts_function_application(mode);
        if mode.bare_argument {
            // `\sin 2x` takes `2x`, while `\sin x y` and `\sin x (y)` end at `x`.
            let continues = matches!(last, Syntax::Number(_) | Syntax::Symbol(_) | Syntax::Infinity)
                && matches!(next, Tk::Number | Tk::Symbol | Tk::Infinity)
                && !next_is_function
                && self.touches_previous();
            if !continues {
                return None;
            }
        }
        let next_is_group = matches!(next, Tk::Open(Delimiter::Round | Delimiter::Square | Delimiter::Curly));

        match last {
            Syntax::Number(_) | Syntax::Symbol(_) | Syntax::Infinity => {
                Some(Adjacency::NumberOrSymbol)
            }
            Syntax::Group(_) if next_is_group || (next == Tk::Symbol && !next_is_function) => {
                Some(Adjacency::Groups)
            }
            _ if is_function_application(last) && next_is_function => Some(Adjacency::Functions),
            Syntax::Fraction { .. } | Syntax::Binomial { .. } => Some(Adjacency::Fraction),
            Syntax::Power { .. } => Some(Adjacency::Power),
            Syntax::Group(_)
                if next_is_function
                    || matches!(next, Tk::Frac | Tk::Binom | Tk::Sum | Tk::Prod | Tk::Int | Tk::Lim) =>
            {
                Some(Adjacency::GroupFunction)
            }
            _ if is_delimited_application(last) => Some(Adjacency::DelimitedFunction),
            _ if is_function_application(last) => Some(Adjacency::BareFunction),
            _ => None,
        }
    }

    /// `^+`, `^-`, `^{+}` or `^{-}` closing a limit's approach.
    fn direction_follows(&self) -> bool {
        use TokenKind as Tk;
        let sign = |k: Option<TokenKind>| matches!(k, Some(Tk::Plus | Tk::Minus));
        let close = |k: Option<TokenKind>| k == Some(Tk::Close(Delimiter::Curly));
        self.peek_kind() == Some(Tk::Caret)
            && ((sign(self.peek_nth_kind(1)) && close(self.peek_nth_kind(2)))
                || (self.peek_nth_kind(1) == Some(Tk::Open(Delimiter::Curly))
                    && sign(self.peek_nth_kind(2))
                    && close(self.peek_nth_kind(3))))
    }
}

fn is_function_application(syntax: &Syntax) -> bool {
    matches!(
        syntax,
        Syntax::Apply { .. }
            | Syntax::ApplyUser { .. }
            | Syntax::PowerOfFunction { .. }
            | Syntax::Root { .. }
    )
}

fn is_delimited_application(syntax: &Syntax) -> bool {
    matches!(
        syntax,
        Syntax::Apply {
            delimited: true,
            ..
        } | Syntax::ApplyUser { .. }
            | Syntax::Root { .. }
    )
}

fn closing(delimiter: Delimiter) -> &'static str {
    match delimiter {
        Delimiter::Round => "')'",
        Delimiter::Square => "']'",
        Delimiter::Curly => "'}'",
        Delimiter::LiteralBrace => "'\\}'",
        Delimiter::Floor => "'\\rfloor'",
        Delimiter::Ceil => "'\\rceil'",
        Delimiter::Angle => "'\\rangle'",
    }
}

fn is_minus_one(syntax: &Syntax) -> bool {
    matches!(syntax, Syntax::Neg(x) if matches!(x.as_ref(), Syntax::Number(n) if n == "1"))
}

fn parse_relation(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    let left = parse_additive(tokens, Mode::default())?;
    let Some(TokenKind::Relation(kind)) = tokens.peek_kind() else {
        return Ok(left);
    };
    tokens.next();
    let right = parse_additive(tokens, Mode::default())?;
    if let Some(TokenKind::Relation(_)) = tokens.peek_kind() {
        return Err(tokens.error("end of expression (chained relations are not supported)"));
    }
    Ok(Syntax::Relation {
        kind,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn parse_additive(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    let mut left = parse_signed_term(tokens, mode)?;
    loop {
        let operation = match tokens.peek_kind() {
            Some(TokenKind::Plus) => BinaryOperator::Add,
            Some(TokenKind::Minus) => BinaryOperator::Sub,
            _ => break,
        };
        if mode.limit_approach
            && tokens.peek_nth_kind(1) == Some(TokenKind::Close(Delimiter::Curly))
        {
            break;
        }
        tokens.next();
        let right = parse_signed_term(tokens, mode)?;
        left = Syntax::BinaryOperation {
            operation,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_signed_term(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    match tokens.peek_kind() {
        Some(TokenKind::Minus) => {
            tokens.next();
            Ok(Syntax::Neg(Box::new(parse_signed_term(tokens, mode)?)))
        }
        Some(TokenKind::Plus) => {
            tokens.next();
            parse_signed_term(tokens, mode)
        }
        _ => parse_term(tokens, mode),
    }
}

fn parse_term(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    let mut left = parse_factor(tokens, mode)?;
    loop {
        if left.last_factor().is_differential() {
            break;
        }
        let operation = match tokens.peek_kind() {
            Some(TokenKind::Star) => Some(BinaryOperator::Mul),
            Some(TokenKind::Slash) => Some(BinaryOperator::Div),
            _ => None,
        };
        if let Some(operation) = operation {
            if mode.bare_argument {
                break;
            }
            tokens.next();
            let right = parse_signed_factor(tokens, mode)?;
            left = Syntax::BinaryOperation {
                operation,
                left: Box::new(left),
                right: Box::new(right),
            };
            continue;
        }
        let Some(adjacency) = tokens.adjacency(left.last_factor(), mode) else {
            break;
        };
        let right = parse_factor(tokens, mode)?;
        left = Syntax::Juxtaposition {
            adjacency,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_signed_factor(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    match tokens.peek_kind() {
        Some(TokenKind::Minus) => {
            tokens.next();
            Ok(Syntax::Neg(Box::new(parse_signed_factor(tokens, mode)?)))
        }
        Some(TokenKind::Plus) => {
            tokens.next();
            parse_signed_factor(tokens, mode)
        }
        _ => parse_factor(tokens, mode),
    }
}

fn parse_factor(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    let mut base = parse_atom(tokens, mode)?;
    loop {
        match tokens.peek_kind() {
            Some(TokenKind::Caret) => {
                if mode.limit_approach && tokens.direction_follows() {
                    break;
                }
                tokens.next();
                base = match parse_exponent(tokens)? {
                    Exponent::Value(exponent) => Syntax::Power {
                        base: Box::new(base),
                        exponent: Box::new(exponent),
                    },
                    Exponent::Dagger => Syntax::Dagger(Box::new(base)),
                    Exponent::Prime => Syntax::Prime(Box::new(base)),
                };
            }
            Some(TokenKind::Bang) => {
                tokens.next();
                base = Syntax::Factorial(Box::new(base));
            }
            Some(TokenKind::Prime) => {
                tokens.next();
                base = Syntax::Prime(Box::new(base));
            }
            _ => break,
        }
    }
    Ok(base)
}

fn parse_exponent(tokens: &mut Tokens) -> Result<Exponent, SyntaxError> {
    use TokenKind as Tk;
    match tokens.peek_kind() {
        Some(Tk::Open(Delimiter::Curly)) => {
            if tokens.peek_nth_kind(2) == Some(Tk::Close(Delimiter::Curly)) {
                let marker = match tokens.peek_nth_kind(1) {
                    Some(Tk::Dagger | Tk::Star) => Some(Exponent::Dagger),
                    Some(Tk::Prime) => Some(Exponent::Prime),
                    _ => None,
                };
                if let Some(marker) = marker {
                    tokens.index += 3;
                    return Ok(marker);
                }
            }
            tokens.next();
            let exponent = parse_additive(tokens, Mode::default())?;
            tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
            Ok(Exponent::Value(exponent))
        }
        Some(Tk::Dagger | Tk::Star) => {
            tokens.next();
            Ok(Exponent::Dagger)
        }
        Some(Tk::Prime) => {
            tokens.next();
            Ok(Exponent::Prime)
        }
        Some(Tk::Minus) => {
            tokens.next();
            match parse_exponent(tokens)? {
                Exponent::Value(exponent) => Ok(Exponent::Value(Syntax::Neg(Box::new(exponent)))),
                _ => Err(tokens.error("exponent")),
            }
        }
        Some(Tk::Number) => match tokens.take_digit() {
            Some(digit) => Ok(Exponent::Value(Syntax::Number(digit))),
            None => Err(tokens.error("exponent")),
        },
        Some(Tk::Symbol) => {
            let token = tokens.next().ok_or_else(|| tokens.error("exponent"))?;
            Ok(Exponent::Value(Syntax::Symbol(token.text)))
        }
        Some(Tk::Infinity) => {
            tokens.next();
            Ok(Exponent::Value(Syntax::Infinity))
        }
        Some(Tk::Open(Delimiter::Round)) => Ok(Exponent::Value(parse_group(tokens)?)),
        Some(Tk::Frac | Tk::Binom | Tk::Sqrt) => {
            Ok(Exponent::Value(parse_atom(tokens, Mode::default())?))
        }
        _ => Err(tokens.error("exponent")),
    }
}

fn parse_atom(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    let Some(kind) = tokens.peek_kind() else {
        return Err(tokens.error("expression"));
    };
    match kind {
        Tk::Number => {
            let token = tokens.next().ok_or_else(|| tokens.error("number"))?;
            Ok(Syntax::Number(token.text))
        }
        Tk::Symbol => parse_symbol_or_call(tokens),
        Tk::Infinity => {
            tokens.next();
            Ok(Syntax::Infinity)
        }
        Tk::Open(Delimiter::Round | Delimiter::Square | Delimiter::Curly | Delimiter::LiteralBrace) => {
            parse_group(tokens)
        }
        Tk::Open(delimiter @ (Delimiter::Floor | Delimiter::Ceil)) => {
            tokens.next();
            let inner = parse_additive(tokens, Mode::default())?;
            tokens.expect(Tk::Close(delimiter), closing(delimiter))?;
            let function = if delimiter == Delimiter::Floor {
                Function::Floor
            } else {
                Function::Ceil
            };
            Ok(Syntax::Apply {
                function,
                args: vec![inner],
                delimited: true,
            })
        }
        Tk::Open(Delimiter::Angle) => parse_angle(tokens),
        Tk::Pipe if !mode.inside_bars => parse_bars(tokens),
        Tk::Function(function) => parse_function(tokens, function, mode),
        Tk::Sqrt => parse_root(tokens),
        Tk::Frac | Tk::Binom => {
            tokens.next();
            let top = parse_script_argument(tokens, false)?;
            let bottom = parse_script_argument(tokens, true)?;
            Ok(if kind == Tk::Frac {
                Syntax::Fraction {
                    numerator: Box::new(top),
                    denominator: Box::new(bottom),
                }
            } else {
                Syntax::Binomial {
                    top: Box::new(top),
                    bottom: Box::new(bottom),
                }
            })
        }
        Tk::Sum | Tk::Prod => parse_sum_prod(tokens, mode),
        Tk::Int => parse_integral(tokens, mode),
        Tk::Lim => parse_limit(tokens, mode),
        Tk::Differential | Tk::Partial => parse_differential(tokens),
        _ => Err(tokens.error("expression")),
    }
}

fn parse_group(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    let Some(TokenKind::Open(delimiter)) = tokens.peek_kind() else {
        return Err(tokens.error("'('"));
    };
    tokens.next();
    let inner = parse_additive(tokens, Mode::default())?;
    tokens.expect(TokenKind::Close(delimiter), closing(delimiter))?;
    Ok(Syntax::Group(Box::new(inner)))
}

/// A subscript name: one digit or letter, or a braced run of them.
fn parse_subscript(tokens: &mut Tokens) -> Result<String, SyntaxError> {
    use TokenKind as Tk;
    if tokens.eat(Tk::Open(Delimiter::Curly)) {
        let mut subscript = String::new();
        while let Some(token) = tokens.peek() {
            match token.kind {
                Tk::Number | Tk::Symbol => {
                    subscript.push_str(&token.text);
                    tokens.next();
                }
                _ => break,
            }
        }
        if subscript.is_empty() {
            return Err(tokens.error("subscript"));
        }
        tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
        return Ok(subscript);
    }
    if let Some(digit) = tokens.take_digit() {
        return Ok(digit);
    }
    match tokens.peek_kind() {
        Some(Tk::Symbol) => tokens
            .next()
            .map(|token| token.text)
            .ok_or_else(|| tokens.error("subscript")),
        _ => Err(tokens.error("subscript")),
    }
}

fn parse_symbol_name(tokens: &mut Tokens) -> Result<String, SyntaxError> {
    let token = tokens.expect(TokenKind::Symbol, "symbol")?;
    if tokens.eat(TokenKind::Underscore) {
        Ok(format!("{}_{}", token.text, parse_subscript(tokens)?))
    } else {
        Ok(token.text)
    }
}

fn parse_symbol_or_call(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    let name = parse_symbol_name(tokens)?;
    if tokens.peek_kind() == Some(TokenKind::Open(Delimiter::Round))
        && tokens.options.is_callable(&name)
    {
        let args = parse_arguments(tokens, Delimiter::Round)?;
        return Ok(Syntax::ApplyUser { name, args });
    }
    Ok(Syntax::Symbol(name))
}

fn parse_arguments(tokens: &mut Tokens, delimiter: Delimiter) -> Result<Vec<Syntax>, SyntaxError> {
    tokens.expect(TokenKind::Open(delimiter), "'('")?;
    let mut args = vec![];
    loop {
        args.push(parse_additive(tokens, Mode::default())?);
        match tokens.peek_kind() {
            Some(TokenKind::Comma) => {
                tokens.next();
            }
            Some(TokenKind::Close(d)) if d == delimiter => {
                tokens.next();
                return Ok(args);
            }
            _ => return Err(tokens.error(format!("',' or {}", closing(delimiter)))),
        }
    }
}

/// The argument of `\frac`, `\binom`, `\sqrt`, `_` and `^`: a braced
/// expression, a single digit, or (where allowed) a single symbol.
fn parse_script_argument(tokens: &mut Tokens, allow_symbol: bool) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    match tokens.peek_kind() {
        Some(Tk::Open(Delimiter::Curly)) => {
            tokens.next();
            let inner = parse_additive(tokens, Mode::default())?;
            tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
            Ok(inner)
        }
        Some(Tk::Number) => tokens
            .take_digit()
            .map(Syntax::Number)
            .ok_or_else(|| tokens.error("digit or '{'")),
        Some(Tk::Symbol) if allow_symbol => {
            let token = tokens.next().ok_or_else(|| tokens.error("symbol"))?;
            Ok(Syntax::Symbol(token.text))
        }
        Some(Tk::Infinity) if allow_symbol => {
            tokens.next();
            Ok(Syntax::Infinity)
        }
        _ => Err(tokens.error("'{'")),
    }
}

fn parse_function(tokens: &mut Tokens, function: Function, mode: Mode) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    tokens.next();
    let mut function = function;

    let base = if function == Function::Log && tokens.eat(Tk::Underscore) {
        Some(parse_script_argument(tokens, true)?)
    } else {
        None
    };

    let mut power = None;
    if tokens.eat(Tk::Caret) {
        match parse_exponent(tokens)? {
            Exponent::Value(exponent) => match function.inverse() {
                Some(inverse) if is_minus_one(&exponent) => function = inverse,
                _ => power = Some(exponent),
            },
            _ => return Err(tokens.error("function exponent")),
        }
    }

    let (mut args, delimited) = match tokens.peek_kind() {
        _ if function == Function::InnerProduct => {
            let bra = parse_script_argument(tokens, true)?;
            let ket = parse_script_argument(tokens, true)?;
            (vec![bra, ket], true)
        }
        Some(Tk::Open(delimiter @ (Delimiter::Round | Delimiter::Square | Delimiter::Curly))) => {
            (parse_arguments(tokens, delimiter)?, true)
        }
        _ if function.allows_bare_argument() => {
            let argument_mode = Mode {
                bare_argument: true,
                inside_bars: mode.inside_bars,
                limit_approach: false,
            };
            (vec![parse_signed_term(tokens, argument_mode)?], false)
        }
        _ => return Err(tokens.error("'('")),
    };
    args.extend(base);

    Ok(match power {
        Some(exponent) => Syntax::PowerOfFunction {
            function,
            exponent: Box::new(exponent),
            args,
        },
        None => Syntax::Apply {
            function,
            args,
            delimited,
        },
    })
}

fn parse_root(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    tokens.next();
    let index = if tokens.eat(Tk::Open(Delimiter::Square)) {
        let index = parse_additive(tokens, Mode::default())?;
        tokens.expect(Tk::Close(Delimiter::Square), "']'")?;
        Some(Box::new(index))
    } else {
        None
    };
    let radicand = parse_script_argument(tokens, true)?;
    Ok(Syntax::Root {
        index,
        radicand: Box::new(radicand),
    })
}

fn parse_bars(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    tokens.next();
    let inner = parse_additive(tokens, Mode::bars())?;
    let function = match tokens.peek_kind() {
        Some(TokenKind::Pipe) => Function::Abs,
        Some(TokenKind::Close(Delimiter::Angle)) => Function::Ket,
        _ => return Err(tokens.error("'|'")),
    };
    tokens.next();
    Ok(Syntax::Apply {
        function,
        args: vec![inner],
        delimited: true,
    })
}

/// `\langle a|`, or `\langle a|b\rangle`.
fn parse_angle(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    tokens.next();
    let bra = parse_additive(tokens, Mode::bars())?;
    tokens.expect(TokenKind::Pipe, "'|'")?;
    if !tokens.starts_factor(Mode::bars()) {
        return Ok(Syntax::Apply {
            function: Function::Bra,
            args: vec![bra],
            delimited: true,
        });
    }
    let ket = parse_additive(tokens, Mode::bars())?;
    tokens.expect(TokenKind::Close(Delimiter::Angle), "'\\rangle'")?;
    Ok(Syntax::Apply {
        function: Function::InnerProduct,
        args: vec![bra, ket],
        delimited: true,
    })
}

fn parse_differential(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    let marker = tokens.next().ok_or_else(|| tokens.error("differential"))?;
    let variable = if tokens.peek_kind() == Some(TokenKind::Symbol) {
        Some(parse_symbol_name(tokens)?)
    } else {
        None
    };
    Ok(Syntax::Differential {
        variable,
        partial: marker.kind == TokenKind::Partial,
    })
}

/// `{k = lower}` under a sum or product.
fn parse_index_binding(tokens: &mut Tokens) -> Result<(String, Syntax), SyntaxError> {
    use TokenKind as Tk;
    tokens.expect(Tk::Open(Delimiter::Curly), "'{'")?;
    let variable = parse_symbol_name(tokens)?;
    tokens.expect(Tk::Relation(RelationKind::Equal), "'='")?;
    let lower = parse_additive(tokens, Mode::default())?;
    tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
    Ok((variable, lower))
}

fn parse_sum_prod(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    let kind = match tokens.next().map(|t| t.kind) {
        Some(Tk::Prod) => SumProdKind::Prod,
        _ => SumProdKind::Sum,
    };
    let mut lower = None;
    let mut upper = None;
    for _ in 0..2 {
        match tokens.peek_kind() {
            Some(Tk::Underscore) if lower.is_none() => {
                tokens.next();
                lower = Some(parse_index_binding(tokens)?);
            }
            Some(Tk::Caret) if upper.is_none() => {
                tokens.next();
                upper = Some(parse_script_argument(tokens, true)?);
            }
            _ => break,
        }
    }
    let Some((variable, lower_bound)) = lower else {
        return Err(tokens.error("'_{' with an index variable"));
    };
    let Some(upper_bound) = upper else {
        return Err(tokens.error("'^' with an upper bound"));
    };
    let body = parse_signed_term(tokens, Mode { bare_argument: false, ..mode })?;
    Ok(Syntax::SumProd {
        kind,
        variable,
        lower_bound: Box::new(lower_bound),
        upper_bound: Box::new(upper_bound),
        body: Box::new(body),
    })
}

fn parse_integral(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    tokens.next();
    let mut lower_bound = None;
    let mut upper_bound = None;
    for _ in 0..2 {
        match tokens.peek_kind() {
            Some(Tk::Underscore) if lower_bound.is_none() => {
                tokens.next();
                lower_bound = Some(Box::new(parse_bound(tokens)?));
            }
            Some(Tk::Caret) if upper_bound.is_none() => {
                tokens.next();
                upper_bound = Some(Box::new(parse_bound(tokens)?));
            }
            _ => break,
        }
    }

    let mode = Mode {
        bare_argument: false,
        ..mode
    };
    let body = if matches!(tokens.peek_kind(), Some(Tk::Differential | Tk::Partial)) {
        let differential = parse_differential(tokens)?;
        if tokens.starts_factor(mode) {
            Syntax::Juxtaposition {
                adjacency: Adjacency::Differential,
                left: Box::new(differential),
                right: Box::new(parse_signed_term(tokens, mode)?),
            }
        } else {
            differential
        }
    } else {
        parse_signed_term(tokens, mode)?
    };

    Ok(Syntax::Integral {
        lower_bound,
        upper_bound,
        body: Box::new(body),
    })
}

/// An integral bound, which may carry a sign outside braces (`_-1`).
fn parse_bound(tokens: &mut Tokens) -> Result<Syntax, SyntaxError> {
    if tokens.eat(TokenKind::Minus) {
        return Ok(Syntax::Neg(Box::new(parse_script_argument(tokens, true)?)));
    }
    parse_script_argument(tokens, true)
}

fn parse_limit(tokens: &mut Tokens, mode: Mode) -> Result<Syntax, SyntaxError> {
    use TokenKind as Tk;
    tokens.next();
    tokens.expect(Tk::Underscore, "'_'")?;
    tokens.expect(Tk::Open(Delimiter::Curly), "'{'")?;
    let variable = parse_symbol_name(tokens)?;
    tokens.expect(Tk::To, "'\\to'")?;
    let approach = parse_additive(
        tokens,
        Mode {
            limit_approach: true,
            ..Mode::default()
        },
    )?;
    let direction = parse_direction(tokens)?;
    tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
    let body = parse_signed_term(tokens, Mode { bare_argument: false, ..mode })?;
    Ok(Syntax::Limit {
        variable,
        approach: Box::new(approach),
        direction,
        body: Box::new(body),
    })
}

fn parse_direction(tokens: &mut Tokens) -> Result<Option<Direction>, SyntaxError> {
    use TokenKind as Tk;
    let braced = if tokens.eat(Tk::Caret) {
        tokens.eat(Tk::Open(Delimiter::Curly))
    } else if tokens.peek_nth_kind(1) == Some(Tk::Close(Delimiter::Curly)) {
        false
    } else {
        return Ok(None);
    };
    let direction = match tokens.peek_kind() {
        Some(Tk::Plus) => Direction::FromAbove,
        Some(Tk::Minus) => Direction::FromBelow,
        _ if braced => return Err(tokens.error("'+' or '-'")),
        _ => return Ok(None),
    };
    tokens.next();
    if braced {
        tokens.expect(Tk::Close(Delimiter::Curly), "'}'")?;
    }
    Ok(Some(direction))
}

/// Parses one member of an answer: a relation or a bare expression.
/// `end` is the position reported when input runs out.
pub fn parse_member(tokens: Vec<Token>, end: usize, options: &ParseOptions) -> Result<Syntax, SyntaxError> {
    let mut tokens = Tokens::new(tokens, end, options);
    let syntax = parse_relation(&mut tokens)?;
    if tokens.peek().is_some() {
        return Err(tokens.error("operator or end of expression"));
    }
    Ok(syntax)
}

/// Parses a parameter declaration such as `a, b_1, \theta`. Duplicate names
/// keep their first position.
pub fn parse_parameter_names(
    tokens: Vec<Token>,
    end: usize,
    options: &ParseOptions,
) -> Result<Vec<String>, SyntaxError> {
    let mut tokens = Tokens::new(tokens, end, options);
    let mut names: Vec<String> = vec![];
    while tokens.peek().is_some() {
        let valid = tokens
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Symbol && (t.text.len() == 1 || greek_letter(&t.text).is_some()));
        if !valid {
            return Err(tokens.error("parameter name"));
        }
        let name = parse_symbol_name(&mut tokens)?;
        if !names.contains(&name) {
            names.push(name);
        }
        if tokens.peek().is_some()
            && !tokens.eat(TokenKind::Comma)
            && !tokens.eat(TokenKind::Semicolon)
        {
            return Err(tokens.error("','"));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn parse_with(source: &str, variables: &[&str]) -> Result<Syntax, SyntaxError> {
        let options = ParseOptions::with_variables(variables.iter().copied());
        parse_member(tokenize(source).unwrap(), source.len(), &options)
    }

    fn parse(source: &str) -> Syntax {
        parse_with(source, &["x", "y", "a", "b"]).unwrap()
    }

    fn num(text: &str) -> Box<Syntax> {
        Box::new(Syntax::Number(text.into()))
    }

    fn sym(name: &str) -> Box<Syntax> {
        Box::new(Syntax::Symbol(name.into()))
    }

    fn juxt(adjacency: Adjacency, left: Box<Syntax>, right: Box<Syntax>) -> Box<Syntax> {
        Box::new(Syntax::Juxtaposition {
            adjacency,
            left,
            right,
        })
    }

    fn bin(operation: BinaryOperator, left: Box<Syntax>, right: Box<Syntax>) -> Box<Syntax> {
        Box::new(Syntax::BinaryOperation {
            operation,
            left,
            right,
        })
    }

    fn apply(function: Function, arg: Box<Syntax>, delimited: bool) -> Box<Syntax> {
        Box::new(Syntax::Apply {
            function,
            args: vec![*arg],
            delimited,
        })
    }

    #[test]
    fn number_symbol_adjacency() {
        assert_eq!(
            parse("2xy"),
            *juxt(
                Adjacency::NumberOrSymbol,
                juxt(Adjacency::NumberOrSymbol, num("2"), sym("x")),
                sym("y")
            )
        );
    }

    #[test]
    fn explicit_product_then_adjacency() {
        assert_eq!(
            parse("2/3x"),
            *juxt(
                Adjacency::NumberOrSymbol,
                bin(BinaryOperator::Div, num("2"), num("3")),
                sym("x")
            )
        );
    }

    #[test]
    fn group_adjacency() {
        let group = |inner| Box::new(Syntax::Group(inner));
        assert_eq!(
            parse("(x)(y)"),
            *juxt(Adjacency::Groups, group(sym("x")), group(sym("y")))
        );
        assert_eq!(
            parse("(x+1)y"),
            *juxt(
                Adjacency::Groups,
                group(bin(BinaryOperator::Add, sym("x"), num("1"))),
                sym("y")
            )
        );
        assert_matches!(
            parse_with("(x+1)2", &["x"]),
            Err(SyntaxError { position: 5, .. })
        );
    }

    #[test]
    fn function_adjacency() {
        assert_eq!(
            parse(r"\sin x \cos x"),
            *juxt(
                Adjacency::Functions,
                apply(Function::Sin, sym("x"), false),
                apply(Function::Cos, sym("x"), false)
            )
        );
        assert_eq!(
            parse(r"\sin 2x"),
            *apply(
                Function::Sin,
                juxt(Adjacency::NumberOrSymbol, num("2"), sym("x")),
                false
            )
        );
    }

    #[test]
    fn bare_argument_ends_at_first_factor() {
        let group = |inner| Box::new(Syntax::Group(inner));
        assert_eq!(
            parse(r"\cos x (a+b)"),
            *juxt(
                Adjacency::BareFunction,
                apply(Function::Cos, sym("x"), false),
                group(bin(BinaryOperator::Add, sym("a"), sym("b")))
            )
        );
        assert_eq!(
            parse(r"\ln x \cdot a"),
            *bin(BinaryOperator::Mul, apply(Function::Ln, sym("x"), false), sym("a"))
        );
        assert_eq!(
            parse(r"\sin x / 2"),
            *bin(BinaryOperator::Div, apply(Function::Sin, sym("x"), false), num("2"))
        );
        assert_eq!(
            parse(r"\sin x y"),
            *juxt(Adjacency::BareFunction, apply(Function::Sin, sym("x"), false), sym("y"))
        );
    }

    #[test]
    fn fraction_and_power_adjacency() {
        let fraction = Box::new(Syntax::Fraction {
            numerator: num("1"),
            denominator: num("2"),
        });
        assert_eq!(
            parse(r"\frac12 x"),
            *juxt(Adjacency::Fraction, fraction, sym("x"))
        );
        let power = Box::new(Syntax::Power {
            base: sym("x"),
            exponent: num("2"),
        });
        assert_eq!(parse("x^23"), *juxt(Adjacency::Power, power, num("3")));
    }

    #[test]
    fn delimited_function_adjacency() {
        let root = Box::new(Syntax::Root {
            index: Some(num("3")),
            radicand: num("3"),
        });
        assert_eq!(
            parse(r"\sqrt[3]{3} x"),
            *juxt(Adjacency::DelimitedFunction, root, sym("x"))
        );
    }

    #[test]
    fn fraction_shapes() {
        let frac = |numerator, denominator| Syntax::Fraction {
            numerator,
            denominator,
        };
        assert_eq!(parse(r"\frac12"), frac(num("1"), num("2")));
        assert_eq!(parse(r"\frac1x"), frac(num("1"), sym("x")));
        assert_eq!(
            parse(r"\frac1{x+1}"),
            frac(num("1"), bin(BinaryOperator::Add, sym("x"), num("1")))
        );
        assert_eq!(parse(r"\frac{x}2"), frac(sym("x"), num("2")));
        assert_eq!(parse(r"\frac{1}{2}"), frac(num("1"), num("2")));
        assert_matches!(parse_with(r"\frac x2", &["x"]), Err(_));
    }

    #[test]
    fn declared_parameters_are_not_callable() {
        assert_eq!(
            parse("y(x)"),
            *juxt(Adjacency::NumberOrSymbol, sym("y"), Box::new(Syntax::Group(sym("x"))))
        );
        assert_eq!(
            parse_with("f(x)", &["x"]).unwrap(),
            Syntax::ApplyUser {
                name: "f".into(),
                args: vec![Syntax::Symbol("x".into())],
            }
        );
        assert_matches!(parse_with("e(x)", &["x"]), Ok(Syntax::Juxtaposition { .. }));
    }

    #[test]
    fn inverse_and_powered_functions() {
        assert_eq!(
            parse(r"\sin^{-1}(x)"),
            *apply(Function::Asin, sym("x"), true)
        );
        assert_eq!(
            parse(r"\cos^2 x"),
            Syntax::PowerOfFunction {
                function: Function::Cos,
                exponent: num("2"),
                args: vec![Syntax::Symbol("x".into())],
            }
        );
        assert_eq!(
            parse(r"\log_2 x"),
            Syntax::Apply {
                function: Function::Log,
                args: vec![Syntax::Symbol("x".into()), Syntax::Number("2".into())],
                delimited: false,
            }
        );
    }

    #[test]
    fn subscripts() {
        assert_eq!(parse("a_1"), Syntax::Symbol("a_1".into()));
        assert_eq!(parse(r"\theta_{12}"), Syntax::Symbol("theta_12".into()));
    }

    #[test]
    fn unary_minus_binds_below_power() {
        assert_eq!(
            parse("-x^2"),
            Syntax::Neg(Box::new(Syntax::Power {
                base: sym("x"),
                exponent: num("2"),
            }))
        );
    }

    #[test]
    fn relations() {
        assert_matches!(
            parse("y = 2x"),
            Syntax::Relation {
                kind: RelationKind::Equal,
                ..
            }
        );
        assert_matches!(parse_with("a < b < 1", &["a", "b"]), Err(_));
    }

    #[test]
    fn integral_ends_at_differential() {
        assert_eq!(
            parse(r"\int_0^1 x^2 dx + 1"),
            *bin(
                BinaryOperator::Add,
                Box::new(Syntax::Integral {
                    lower_bound: Some(num("0")),
                    upper_bound: Some(num("1")),
                    body: juxt(
                        Adjacency::Differential,
                        Box::new(Syntax::Power {
                            base: sym("x"),
                            exponent: num("2"),
                        }),
                        Box::new(Syntax::Differential {
                            variable: Some("x".into()),
                            partial: false,
                        })
                    ),
                }),
                num("1")
            )
        );
    }

    #[test]
    fn bare_function_argument_leaves_the_differential() {
        let Syntax::Integral { body, .. } = parse(r"\int \sin x \, dx") else {
            panic!("expected integral");
        };
        assert_matches!(
            *body,
            Syntax::Juxtaposition {
                adjacency: Adjacency::Differential,
                ..
            }
        );
    }

    #[test]
    fn sum_bounds_in_either_order() {
        assert_eq!(parse(r"\sum_{k=1}^{3} k"), parse(r"\sum^{3}_{k=1} k"));
        assert_matches!(parse_with(r"\sum^{3} k", &[]), Err(_));
    }

    #[test]
    fn limit_directions() {
        for (source, direction) in [
            (r"\lim_{x \to 0^+} x", Some(Direction::FromAbove)),
            (r"\lim_{x \to 0^{-}} x", Some(Direction::FromBelow)),
            (r"\lim_{x \to 0+} x", Some(Direction::FromAbove)),
            (r"\lim_{x \to 0} x", None),
        ] {
            assert_matches!(
                parse_with(source, &[]),
                Ok(Syntax::Limit { direction: d, .. }) if d == direction,
                "{source}"
            );
        }
    }

    #[test]
    fn bars_and_brackets() {
        assert_eq!(parse("|x|"), *apply(Function::Abs, sym("x"), true));
        assert_eq!(
            parse(r"\lfloor x \rfloor"),
            *apply(Function::Floor, sym("x"), true)
        );
        assert_eq!(
            parse(r"\langle a|b\rangle"),
            Syntax::Apply {
                function: Function::InnerProduct,
                args: vec![Syntax::Symbol("a".into()), Syntax::Symbol("b".into())],
                delimited: true,
            }
        );
    }

    #[test]
    fn dagger_superscript() {
        assert_eq!(parse(r"a^\dagger"), Syntax::Dagger(sym("a")));
        assert_eq!(parse(r"a^{*}"), Syntax::Dagger(sym("a")));
    }

    #[test]
    fn error_reports_position_and_found() {
        assert_eq!(
            parse_with("x^", &["x"]),
            Err(SyntaxError {
                position: 2,
                expected: "exponent".into(),
                found: "end of input".into(),
            })
        );
        assert_eq!(
            parse_with("2+)", &[]),
            Err(SyntaxError {
                position: 2,
                expected: "expression".into(),
                found: "')'".into(),
            })
        );
    }

    #[test]
    fn parameter_names() {
        let names = |source: &str| {
            parse_parameter_names(tokenize(source).unwrap(), source.len(), &ParseOptions::default())
        };
        assert_eq!(
            names(r"$m, r, \theta, a_1; \varepsilon, m$").unwrap(),
            ["m", "r", "theta", "a_1", "epsilon"]
        );
        assert_eq!(names("").unwrap(), Vec::<String>::new());
        assert_matches!(names("d"), Err(_));
        assert_matches!(names("x y"), Err(_));
        assert_matches!(names(r"\mathit{ab}"), Err(_));
    }
}
