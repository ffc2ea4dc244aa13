//! Parser for the grammar text format.
//!
//! ```bnf
//! # a comment
//! <start> ::= <f> "(" <n> ")"
//! <f> ::= "sqrt" | "cos"
//! <n> ::= "-1" | "2"
//! ```
//!
//! The first rule defines the start symbol. Terminals are double-quoted with
//! `\\`, `\"`, `\n` and `\t` escapes. Whitespace and line breaks are free.

use crate::common::*;
use crate::gram::{GramItem, Grammar, SymInfo};

/// Generates a parse error at the given position of some text.
pub fn err_at<S: Into<String>>(text: &str, char_pos: usize, msg: S) -> ErrorKind {
    let mut char_pos = char_pos;
    let msg = msg.into();
    let mut line_count = 0;

    let mut pref = "".to_string();
    let mut token = "<eof>".to_string();
    let mut suff = "".to_string();

    for line in text.lines() {
        line_count += 1;
        if char_pos < line.len() {
            pref = line[0..char_pos].to_string();
            token = line[char_pos..=char_pos].to_string();
            suff = line[(char_pos + 1)..line.len()].to_string();
            break;
        } else if char_pos == line.len() {
            pref = line.into();
            token = "\\n".into();
            suff = "".into();
            break;
        } else {
            char_pos -= line.len() + 1
        }
    }
    ErrorKind::ParseError(ParseErrorData {
        msg,
        pref,
        token,
        suff,
        line: Some(line_count),
    })
}

/// A token of the grammar text format.
enum Token {
    /// A `<name>`, brackets stripped.
    Name(String),
    /// A quoted terminal, unescaped.
    Term(String),
    /// The `::=` definition marker.
    Def,
    /// An `|` alternative separator.
    Pipe,
}

/// Tokenizer state.
struct Lexer<'s> {
    /// Text being read.
    text: &'s str,
    /// Current position in the text.
    cursor: usize,
}

impl<'s> Lexer<'s> {
    fn new(text: &'s str) -> Self {
        Lexer { text, cursor: 0 }
    }

    /// Parse error at the current position.
    fn error_here<S: Into<String>>(&self, msg: S) -> Error {
        err_at(self.text, self.cursor, msg).into()
    }

    /// The current character, if any.
    fn peek(&self) -> Option<char> {
        self.text[self.cursor..].chars().next()
    }

    /// Skips whitespace and `#` comments.
    fn skip(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.cursor += c.len_utf8()
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    self.cursor += c.len_utf8();
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Next token, with its start position. `None` at end of input.
    fn next(&mut self) -> Res<Option<(usize, Token)>> {
        self.skip();
        let start = self.cursor;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '<' => {
                self.cursor += 1;
                let name_start = self.cursor;
                while let Some(c) = self.peek() {
                    if c == '>' {
                        break;
                    }
                    self.cursor += c.len_utf8()
                }
                if self.peek() != Some('>') {
                    bail!(err_at(self.text, start, "unclosed symbol name"))
                }
                let name = self.text[name_start..self.cursor].to_string();
                self.cursor += 1;
                if name.is_empty() {
                    bail!(err_at(self.text, start, "empty symbol name"))
                }
                Token::Name(name)
            }

            '"' => {
                self.cursor += 1;
                let mut term = String::new();
                loop {
                    let c = match self.peek() {
                        Some(c) => c,
                        None => bail!(err_at(self.text, start, "unclosed terminal")),
                    };
                    self.cursor += c.len_utf8();
                    match c {
                        '"' => break,
                        '\\' => {
                            let e = match self.peek() {
                                Some(e) => e,
                                None => bail!(err_at(self.text, start, "unclosed terminal")),
                            };
                            self.cursor += e.len_utf8();
                            match e {
                                '\\' => term.push('\\'),
                                '"' => term.push('"'),
                                'n' => term.push('\n'),
                                't' => term.push('\t'),
                                _ => bail!(self.error_here(format!("unknown escape `\\{}`", e))),
                            }
                        }
                        _ => term.push(c),
                    }
                }
                Token::Term(term)
            }

            ':' => {
                if self.text[self.cursor..].starts_with("::=") {
                    self.cursor += 3;
                    Token::Def
                } else {
                    bail!(self.error_here("expected `::=`"))
                }
            }

            '|' => {
                self.cursor += 1;
                Token::Pipe
            }

            _ => bail!(self.error_here("expected `<symbol>`, terminal, `::=` or `|`")),
        };
        Ok(Some((start, token)))
    }
}

/// Raw right-hand-side item, before name resolution.
enum RawItem {
    /// Symbol reference, with its position for undefined-symbol errors.
    Sym(usize, String),
    /// Literal terminal.
    Term(String),
}

/// A rule, before name resolution.
struct RawRule {
    /// Name of the defined symbol.
    name: String,
    /// Alternatives.
    alts: Vec<Vec<RawItem>>,
}

/// Parses the text format into a grammar.
pub fn grammar(text: &str) -> Res<Grammar> {
    let mut lexer = Lexer::new(text);
    let mut rules: Vec<RawRule> = Vec::new();

    // Tokens come as `Name Def (item* Pipe)* item*` repeated; a `Name` is an
    // item unless followed by `Def`, so we hold it until the next token.
    let mut pending: Option<(usize, String)> = None;

    macro_rules! last_rule {
        ($pos:expr) => {
            match rules.last_mut() {
                Some(rule) => rule,
                None => bail!(err_at(text, $pos, "expected `<symbol> ::=`")),
            }
        };
    }

    while let Some((pos, token)) = lexer.next()? {
        match token {
            Token::Def => {
                if let Some((pos, name)) = pending.take() {
                    if rules.iter().any(|r| r.name == name) {
                        bail!(err_at(
                            text,
                            pos,
                            format!("symbol `{}` is defined twice", name)
                        ))
                    }
                    rules.push(RawRule {
                        name,
                        alts: vec![vec![]],
                    })
                } else {
                    bail!(err_at(text, pos, "`::=` without a symbol to define"))
                }
            }
            token => {
                if let Some((pos, name)) = pending.take() {
                    let rule = last_rule!(pos);
                    let alt = rule.alts.last_mut().expect("rules always have an alt");
                    alt.push(RawItem::Sym(pos, name))
                }
                match token {
                    Token::Name(name) => pending = Some((pos, name)),
                    Token::Term(term) => {
                        let rule = last_rule!(pos);
                        let alt = rule.alts.last_mut().expect("rules always have an alt");
                        alt.push(RawItem::Term(term))
                    }
                    Token::Pipe => {
                        let rule = last_rule!(pos);
                        rule.alts.push(vec![])
                    }
                    Token::Def => unreachable!("handled above"),
                }
            }
        }
    }
    if let Some((pos, name)) = pending.take() {
        let rule = last_rule!(pos);
        let alt = rule.alts.last_mut().expect("rules always have an alt");
        alt.push(RawItem::Sym(pos, name))
    }

    if rules.is_empty() {
        bail!(err_at(text, 0, "empty grammar"))
    }

    // Name resolution.
    let mut ids = HashMap::new();
    for (idx, rule) in rules.iter().enumerate() {
        let prev = ids.insert(rule.name.clone(), SymIdx::from(idx));
        debug_assert!(prev.is_none())
    }
    let mut syms = SymMap::with_capacity(rules.len());
    for rule in &rules {
        let mut alts = Vec::with_capacity(rule.alts.len());
        for raw_alt in &rule.alts {
            let mut alt = Vec::with_capacity(raw_alt.len());
            for item in raw_alt {
                match item {
                    RawItem::Term(term) => alt.push(GramItem::Term(term.clone())),
                    RawItem::Sym(pos, name) => {
                        if let Some(&sym) = ids.get(name) {
                            alt.push(GramItem::Sym(sym))
                        } else {
                            bail!(err_at(
                                text,
                                *pos,
                                format!("undefined symbol `{}`", name)
                            ))
                        }
                    }
                }
            }
            alts.push(alt)
        }
        syms.push(SymInfo {
            name: rule.name.clone(),
            alts,
        });
    }

    Grammar::new(syms, ids)
}
