//! Tokenizer for CMake-style descriptor files.
//!
//! CMake's surface syntax is a flat stream of `command(arguments...)`
//! invocations with `#` line comments. The lexer turns a source string
//! into a list of [`Command`] values; all higher-level interpretation
//! (which commands matter, variable expansion) happens in the parser.
//!
//! Parentheses inside an argument list (as used by `if()` conditions) are
//! tracked for balance but not emitted as arguments.

use camino::Utf8Path;
use smallvec::SmallVec;

use crate::error::ParseError;

/// A single command invocation from a descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased command name (CMake commands are case-insensitive).
    pub name: String,
    /// Arguments, quoted arguments already unescaped.
    pub args: SmallVec<[String; 4]>,
    /// 1-based source line of the command name.
    pub line: usize,
}

impl Command {
    /// Returns the first argument, if present.
    #[inline]
    #[must_use]
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    path: &'a Utf8Path,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, path: &'a Utf8Path) -> Self {
        Self {
            chars: source.chars().peekable(),
            path,
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    /// Skips whitespace and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        ident
    }

    fn read_quoted(&mut self) -> Result<String, ParseError> {
        let start_line = self.line;
        let mut arg = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(arg),
                Some('\\') => match self.bump() {
                    Some('n') => arg.push('\n'),
                    Some('t') => arg.push('\t'),
                    Some(c) => arg.push(c),
                    None => {
                        return Err(ParseError::syntax(
                            self.path,
                            start_line,
                            "unterminated quoted argument",
                        ));
                    }
                },
                Some(c) => arg.push(c),
                None => {
                    return Err(ParseError::syntax(
                        self.path,
                        start_line,
                        "unterminated quoted argument",
                    ));
                }
            }
        }
    }

    fn read_unquoted(&mut self) -> String {
        let mut arg = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '#') {
                break;
            }
            arg.push(c);
            self.bump();
        }
        arg
    }

    fn read_arguments(&mut self, command_line: usize) -> Result<SmallVec<[String; 4]>, ParseError> {
        let mut args = SmallVec::new();
        let mut depth = 1usize;
        loop {
            self.skip_trivia();
            match self.chars.peek() {
                Some('(') => {
                    depth += 1;
                    self.bump();
                }
                Some(')') => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Ok(args);
                    }
                }
                Some('"') => {
                    self.bump();
                    args.push(self.read_quoted()?);
                }
                Some(_) => args.push(self.read_unquoted()),
                None => {
                    return Err(ParseError::syntax(
                        self.path,
                        command_line,
                        "unbalanced parenthesis in argument list",
                    ));
                }
            }
        }
    }

    fn run(mut self) -> Result<Vec<Command>, ParseError> {
        let mut commands = Vec::new();
        loop {
            self.skip_trivia();
            if self.chars.peek().is_none() {
                return Ok(commands);
            }

            let line = self.line;
            let name = self.read_identifier();
            if name.is_empty() {
                return Err(ParseError::syntax(
                    self.path,
                    line,
                    "expected command name",
                ));
            }

            self.skip_trivia();
            if self.bump() != Some('(') {
                return Err(ParseError::syntax(
                    self.path,
                    line,
                    format!("expected '(' after command '{name}'"),
                ));
            }

            let args = self.read_arguments(line)?;
            commands.push(Command {
                name: name.to_ascii_lowercase(),
                args,
                line,
            });
        }
    }
}

/// Tokenizes a descriptor source into commands.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] on malformed input: stray characters
/// outside a command, a missing `(`, an unterminated quoted argument, or
/// unbalanced parentheses.
pub fn lex(source: &str, path: &Utf8Path) -> Result<Vec<Command>, ParseError> {
    Lexer::new(source, path).run()
}
