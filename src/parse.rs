//! S-expression reader for atoms and programs.
//!
//! The surface syntax is the canonical [`Atom`] rendering: bare tokens are
//! symbols, `$name` is a variable, parentheses build expressions, and `;`
//! starts a line comment. A program is a sequence of top-level atoms where a
//! leading `!` marks an atom for execution rather than assertion.

use crate::atom::{Atom, MAX_NESTING};
use crate::error::ParseError;
use crate::unify::RENAME_SEPARATOR;

/// A top-level item of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Add to the knowledge base (rules have the form `(= pattern body)`).
    Assert(Atom),
    /// Execute and report the result (`!atom`).
    Execute(Atom),
}

/// Parse exactly one atom.
pub fn parse_atom(src: &str) -> Result<Atom, ParseError> {
    let mut reader = Reader::new(src);
    reader.skip_trivia();
    if reader.at_end() {
        return Err(ParseError::Empty);
    }
    let atom = reader.atom()?;
    reader.skip_trivia();
    if !reader.at_end() {
        return Err(ParseError::Trailing { offset: reader.pos });
    }
    Ok(atom)
}

/// Parse a whole program into statements.
pub fn parse_program(src: &str) -> Result<Vec<Statement>, ParseError> {
    let mut reader = Reader::new(src);
    let mut statements = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.at_end() {
            return Ok(statements);
        }
        if reader.peek() == Some('!') {
            let bang = reader.pos;
            reader.bump();
            reader.skip_trivia();
            if reader.at_end() || reader.peek() == Some(')') {
                return Err(ParseError::DanglingBang { offset: bang });
            }
            statements.push(Statement::Execute(reader.atom()?));
        } else {
            statements.push(Statement::Assert(reader.atom()?));
        }
    }
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace and `;` comments.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn atom(&mut self) -> Result<Atom, ParseError> {
        match self.peek() {
            Some('(') => self.expression(),
            Some(')') => Err(ParseError::Unbalanced { offset: self.pos }),
            Some('"') => self.string(),
            Some(_) => self.token(),
            None => Err(ParseError::Empty),
        }
    }

    fn expression(&mut self) -> Result<Atom, ParseError> {
        let open = self.pos;
        if self.depth == MAX_NESTING {
            return Err(ParseError::TooDeep { offset: open });
        }
        self.depth += 1;
        self.bump();
        let mut children = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ParseError::Unclosed { offset: open }),
                Some(')') => {
                    self.bump();
                    self.depth -= 1;
                    return Ok(Atom::expr(children));
                }
                Some(_) => children.push(self.atom()?),
            }
        }
    }

    /// Quoted tokens keep their quotes so they render back unchanged.
    fn string(&mut self) -> Result<Atom, ParseError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { offset: start }),
                Some('\\') => {
                    self.bump();
                }
                Some('"') => return Ok(Atom::sym(&self.src[start..self.pos])),
                Some(_) => {}
            }
        }
    }

    fn token(&mut self) -> Result<Atom, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | ';' | '"') {
                break;
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        match text.strip_prefix('$') {
            Some("") => Err(ParseError::EmptyVariable { offset: start }),
            Some(name) if name.contains(RENAME_SEPARATOR) => {
                Err(ParseError::ReservedVariable { offset: start })
            }
            Some(name) => Ok(Atom::var(name)),
            None => Ok(Atom::sym(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_variables_and_expressions() {
        let atom = parse_atom("(= (priority $data) (FundingPriority $data))").unwrap();
        let expected = Atom::expr(vec![
            Atom::sym("="),
            Atom::expr(vec![Atom::sym("priority"), Atom::var("data")]),
            Atom::expr(vec![Atom::sym("FundingPriority"), Atom::var("data")]),
        ]);
        assert_eq!(atom, expected);
    }

    #[test]
    fn empty_expression_is_distinct() {
        assert_eq!(parse_atom("()").unwrap(), Atom::empty_expr());
        assert_eq!(parse_atom("( )").unwrap(), Atom::empty_expr());
    }

    #[test]
    fn rendering_round_trips() {
        let sources = [
            "RegionA",
            "$x",
            "()",
            "(+ 1 2)",
            "((PovertyRate 60) (LiteracyRate 45))",
            "(chain (eval (+ 1 2)) $x (eval (+ $x 3)))",
            "(label \"two words\" 0.70)",
        ];
        for src in sources {
            let atom = parse_atom(src).unwrap();
            let rendered = atom.to_string();
            assert_eq!(rendered, src);
            assert_eq!(parse_atom(&rendered).unwrap(), atom);
        }
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let atom = parse_atom("  ; leading comment\n (a ; inline\n b)  ").unwrap();
        assert_eq!(atom, Atom::expr(vec![Atom::sym("a"), Atom::sym("b")]));
    }

    #[test]
    fn reports_structural_errors_with_offsets() {
        assert_eq!(parse_atom(""), Err(ParseError::Empty));
        assert_eq!(parse_atom("  ; only a comment"), Err(ParseError::Empty));
        assert_eq!(parse_atom("(a (b c)"), Err(ParseError::Unclosed { offset: 0 }));
        assert_eq!(parse_atom(")"), Err(ParseError::Unbalanced { offset: 0 }));
        assert_eq!(parse_atom("a b"), Err(ParseError::Trailing { offset: 2 }));
        assert_eq!(parse_atom("(f $)"), Err(ParseError::EmptyVariable { offset: 3 }));
        assert_eq!(
            parse_atom("\"open"),
            Err(ParseError::UnterminatedString { offset: 0 })
        );
    }

    #[test]
    fn program_distinguishes_assertions_from_executions() {
        let program = parse_program(
            "(= (RegionData RegionA) ((PovertyRate 60)))\n\
             !(eval (RegionData RegionA))\n\
             ! (eval (+ 1 2))",
        )
        .unwrap();
        assert_eq!(program.len(), 3);
        assert!(matches!(program[0], Statement::Assert(_)));
        assert_eq!(
            program[1],
            Statement::Execute(parse_atom("(eval (RegionData RegionA))").unwrap())
        );
        assert!(matches!(program[2], Statement::Execute(_)));
    }

    #[test]
    fn renamed_variable_names_are_reserved() {
        assert_eq!(parse_atom("(f $x#0)"), Err(ParseError::ReservedVariable { offset: 3 }));
        assert_eq!(
            parse_program("!(eval (f $x#0))"),
            Err(ParseError::ReservedVariable { offset: 10 })
        );
        // Only variables are affected.
        assert_eq!(parse_atom("tag#1").unwrap(), Atom::sym("tag#1"));
    }

    #[test]
    fn nesting_depth_is_limited() {
        let deep = format!("{}{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(
            parse_atom(&deep),
            Err(ParseError::TooDeep { offset: MAX_NESTING })
        );
        let program = format!("!{deep}");
        assert_eq!(
            parse_program(&program),
            Err(ParseError::TooDeep { offset: MAX_NESTING + 1 })
        );

        let limit = format!("{}{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        let atom = parse_atom(&limit).unwrap();
        assert!(!atom.exceeds_nesting(MAX_NESTING));
        // Siblings do not accumulate depth.
        let wide = "(a) ".repeat(2 * MAX_NESTING);
        assert!(parse_atom(&format!("({wide})")).is_ok());
    }

    #[test]
    fn dangling_bang_is_rejected() {
        assert_eq!(parse_program("(a) !"), Err(ParseError::DanglingBang { offset: 4 }));
    }
}
