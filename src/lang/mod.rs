// src/lang/mod.rs
//
// The live-coding command language: one command per line, a name followed
// by space-separated arguments.
//
//     bpm 96
//     a '*/2,4
//     note riff 1.5 62 .5

mod matcher;
mod parse;

pub use matcher::*;
pub use parse::parse;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Match(MatchExpr),
}

impl Arg {
    /// Short description used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Ident(_) => "identifier",
            Arg::Int(_) => "int",
            Arg::Float(_) => "float",
            Arg::Str(_) => "string",
            Arg::Match(_) => "match expression",
        }
    }
}
