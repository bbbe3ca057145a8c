// Command line parser.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_till, take_until, take_while},
    character::complete::{char, digit0, digit1, satisfy, space0, space1},
    combinator::{eof, map, map_res, opt, peek, recognize, value},
    multi::{many0, many1_count, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
};

use super::{Arg, Command, MatchExpr, MatchItem, Matcher};
use crate::error::{Error, Result};

/// Parse one command line.
pub fn parse(input: &str) -> Result<Command> {
    match command(input) {
        Ok((_, command)) => Ok(command),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(parse_error(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(parse_error(input, "")),
    }
}

fn parse_error(input: &str, rest: &str) -> Error {
    let pos = input.len() - rest.len();
    let message = match rest.split_whitespace().next() {
        Some(token) => format!("unexpected {token:?}"),
        None => "unexpected end of input".to_string(),
    };
    Error::Parse { pos, message }
}

fn command(input: &str) -> IResult<&str, Command> {
    map(
        delimited(
            space0,
            pair(identifier, many0(preceded(space1, argument))),
            pair(space0, eof),
        ),
        |(name, args)| Command {
            name: name.to_string(),
            args,
        },
    )(input)
}

/// Letters or `_`, then letters, digits, `_`, `.` or `-` (`env.decay`,
/// `lame-bass`, `kick.wav`).
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '-')),
    ))(input)
}

fn argument(input: &str) -> IResult<&str, Arg> {
    alt((
        map(preceded(char('\''), match_expr), Arg::Match),
        map(string, |s: &str| Arg::Str(s.to_string())),
        terminated(number, word_end),
        map(terminated(identifier, word_end), |s: &str| Arg::Ident(s.to_string())),
        map(word, |s: &str| Arg::Str(s.to_string())),
    ))(input)
}

fn word_end(input: &str) -> IResult<&str, &str> {
    peek(alt((space1, eof)))(input)
}

/// Any other run of non-blank characters, read as a string: paths such as
/// `samples/kick.wav`, `./kick.wav` or `808.wav`.
fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| !c.is_whitespace() && c != '\'' && c != '"'),
        take_till(|c: char| c.is_whitespace()),
    ))(input)
}

fn string(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_until("\""), char('"'))(input)
}

/// `12`, `-3`, `1.5`, `.25`, `-.5`
fn number(input: &str) -> IResult<&str, Arg> {
    let (rest, text) = recognize(pair(
        opt(char('-')),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;

    let arg = if text.contains('.') {
        text.parse().map(Arg::Float).ok()
    } else {
        text.parse().map(Arg::Int).ok()
    };
    match arg {
        Some(arg) => Ok((rest, arg)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn int(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i64>())(input)
}

fn matcher(input: &str) -> IResult<&str, Matcher> {
    alt((
        value(Matcher::All, char('*')),
        map(
            separated_pair(int, delimited(space0, char(':'), space0), int),
            |(start, end)| Matcher::Range { start, end },
        ),
        map(
            separated_list1(delimited(space0, char(','), space0), int),
            Matcher::List,
        ),
    ))(input)
}

/// Matchers separated by one or more `/`; every `/` is one level finer.
fn match_expr(input: &str) -> IResult<&str, MatchExpr> {
    let slashes = delimited(space0, many1_count(char('/')), space0);

    map(
        pair(matcher, many0(tuple((slashes, matcher)))),
        |(first, rest)| {
            let mut level = 0;
            let mut items = vec![MatchItem {
                level,
                matcher: first,
            }];
            for (depth, matcher) in rest {
                level += depth as u32;
                items.push(MatchItem { level, matcher });
            }
            MatchExpr { items }
        },
    )(input)
}
