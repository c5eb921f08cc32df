//! Tokenizer and postfix parser: source text to opcode streams.

use std::f64::consts::PI;
use std::sync::Arc;

use crate::compile::{BindTarget, Binding, Compiler};
use crate::error::{Error, Result};
use crate::fun::{Fun, FunDef};
use crate::opcode::{Code, Opcode};
use crate::symbol::getsym;
use crate::value::V;
use crate::vm::Thread;

/// Compile one source unit into an anonymous top-level closure running in
/// the thread's workspace.
pub fn compile(th: &Thread, source: &str) -> Result<Arc<Fun>> {
    let workspace = th.current_workspace();
    let mut parser = Parser {
        src: source.as_bytes(),
        pos: 0,
        comp: Compiler::new(workspace.clone()),
    };
    let mut em = Emitter::new();
    parser.parse_seq(&mut em, None)?;
    let def = FunDef::new(Code::new(em.ops), 0, 0, Vec::new(), Vec::new(), 1);
    Ok(Arc::new(Fun {
        def,
        vars: Vec::new(),
        workspace,
    }))
}

/// Opcode accumulator with static stack-effect tracking. The depth goes
/// unknown as soon as an effect cannot be predicted (dynamic applies,
/// workspace words); it is used to size literals and infer lambda leaves.
struct Emitter {
    ops: Vec<Opcode>,
    depth: Option<i64>,
    gathers: Vec<Option<i64>>,
}

impl Emitter {
    fn new() -> Emitter {
        Emitter {
            ops: Vec::new(),
            depth: Some(0),
            gathers: Vec::new(),
        }
    }

    fn op(&mut self, op: Opcode, takes: usize, leaves: usize) {
        self.ops.push(op);
        if let Some(d) = self.depth {
            let after = d - takes as i64;
            if after < 0 {
                // reaches below this unit's frame; effect is the caller's
                self.depth = None;
            } else {
                self.depth = Some(after + leaves as i64);
            }
        }
    }

    fn op_unknown(&mut self, op: Opcode) {
        self.ops.push(op);
        self.depth = None;
    }

    fn begin_gather(&mut self) {
        self.gathers.push(self.depth);
        self.ops.push(Opcode::BeginGather);
    }

    fn end_gather(&mut self, op: Opcode) {
        self.ops.push(op);
        self.depth = match self.gathers.pop() {
            Some(Some(d)) => Some(d + 1),
            _ => None,
        };
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    comp: Compiler,
}

fn is_word_char(c: u8) -> bool {
    !c.is_ascii_whitespace()
        && !matches!(
            c,
            b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'"' | b'\'' | b';' | b',' | b'.' | b'\\'
                | b'@' | b':' | b'|'
        )
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_space(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_word(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(Error::Syntax("expected a word".to_string()));
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn expect_word(&mut self) -> Result<String> {
        self.skip_space();
        self.read_word()
    }

    /// Parse tokens into `em` until the terminator (or end of input for
    /// the top level).
    fn parse_seq(&mut self, em: &mut Emitter, term: Option<u8>) -> Result<()> {
        loop {
            self.skip_space();
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    return match term {
                        None => Ok(()),
                        Some(t) => Err(Error::Syntax(format!(
                            "expected '{}' before end of input",
                            t as char
                        ))),
                    }
                }
            };
            if matches!(c, b']' | b'}' | b')') {
                if Some(c) == term {
                    self.pos += 1;
                    return Ok(());
                }
                return Err(Error::Syntax(format!("unmatched '{}'", c as char)));
            }
            self.parse_one(em)?;
        }
    }

    /// Parse and emit exactly one syntactic unit.
    fn parse_one(&mut self, em: &mut Emitter) -> Result<()> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Err(Error::Syntax("unexpected end of input".to_string())),
        };
        match c {
            b'[' => {
                self.pos += 1;
                em.begin_gather();
                self.parse_seq(em, Some(b']'))?;
                em.end_gather(Opcode::EndVList);
                Ok(())
            }
            b'#' if self.peek2() == Some(b'[') => {
                self.pos += 2;
                em.begin_gather();
                self.parse_seq(em, Some(b']'))?;
                em.end_gather(Opcode::EndZList);
                Ok(())
            }
            b'{' => self.parse_lambda(em),
            b'(' => {
                self.pos += 1;
                em.op(Opcode::BeginParen, 0, 0);
                self.parse_seq(em, Some(b')'))?;
                em.op(Opcode::EndParen, 0, 0);
                Ok(())
            }
            b'"' => {
                let s = self.parse_string()?;
                em.op(
                    Opcode::PushImm(V::Str(Arc::new(crate::symbol::Str::from_string(s)))),
                    0,
                    1,
                );
                Ok(())
            }
            b'\'' => {
                self.pos += 1;
                if self.peek() == Some(b'{') {
                    self.pos += 1;
                    self.parse_form_literal(em)
                } else {
                    let word = self.read_word()?;
                    em.op(Opcode::PushImm(V::Str(getsym(&word))), 0, 1);
                    Ok(())
                }
            }
            b';' => {
                self.pos += 1;
                em.op(Opcode::Drop, 1, 0);
                Ok(())
            }
            b',' => {
                self.pos += 1;
                let word = self.read_word()?;
                em.op(Opcode::Comma(getsym(&word)), 1, 1);
                Ok(())
            }
            b'.' => {
                if self.peek2().map(|d| d.is_ascii_digit()).unwrap_or(false) {
                    return self.parse_number_like(em);
                }
                self.pos += 1;
                let word = self.read_word()?;
                em.op(Opcode::Dot(getsym(&word)), 1, 1);
                Ok(())
            }
            b'\\' => {
                self.pos += 1;
                let word = self.expect_word()?;
                self.emit_quoted(em, &word)
            }
            b'@' => {
                let mut depth = 0u32;
                while self.peek() == Some(b'@') {
                    self.pos += 1;
                    depth += 1;
                }
                em.op(Opcode::Each(depth), 1, 1);
                Ok(())
            }
            b':' => Err(Error::Syntax("':' outside a form literal".to_string())),
            b'|' => Err(Error::Syntax("'|' outside a lambda header".to_string())),
            _ => self.parse_number_like(em),
        }
    }

    /// A word or a numeric literal: words are maximal runs of word
    /// characters; a run that parses fully as a number (with an optional
    /// `pi` suffix) is a literal, anything else resolves as a name.
    fn parse_number_like(&mut self, em: &mut Emitter) -> Result<()> {
        let start = self.pos;
        // numeric prefix: sign, digits, point, exponent
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek2().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let numeric_end = self.pos;
        // trailing word characters: a suffix or a plain word
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let whole = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        let numeric = String::from_utf8_lossy(&self.src[start..numeric_end]).into_owned();
        let suffix = &whole[numeric.len()..];

        if !numeric.is_empty() && numeric != "-" {
            if suffix.is_empty() {
                if let Ok(f) = numeric.parse::<f64>() {
                    em.op(Opcode::PushImm(V::Real(f)), 0, 1);
                    return Ok(());
                }
            } else if suffix == "pi" {
                if let Ok(f) = numeric.parse::<f64>() {
                    em.op(Opcode::PushImm(V::Real(f * PI)), 0, 1);
                    return Ok(());
                }
            }
        }
        match whole.as_str() {
            "pi" => {
                em.op(Opcode::PushImm(V::Real(PI)), 0, 1);
                Ok(())
            }
            "-pi" => {
                em.op(Opcode::PushImm(V::Real(-PI)), 0, 1);
                Ok(())
            }
            "inf" => {
                em.op(Opcode::PushImm(V::Real(f64::INFINITY)), 0, 1);
                Ok(())
            }
            "=" => {
                let name = self.expect_word()?;
                match self.comp.bind(getsym(&name)) {
                    BindTarget::Local(i) => em.op(Opcode::BindLocal(i), 1, 0),
                    BindTarget::Workspace(sym) => em.op(Opcode::BindWorkspace(sym), 1, 0),
                }
                Ok(())
            }
            "!" => {
                em.op_unknown(Opcode::Apply);
                Ok(())
            }
            "" => Err(Error::Syntax("stray character".to_string())),
            word => self.emit_word(em, word),
        }
    }

    fn emit_word(&mut self, em: &mut Emitter, word: &str) -> Result<()> {
        let sym = getsym(word);
        match self.comp.resolve(&sym) {
            Binding::Local(i) => {
                em.op_unknown(Opcode::CallLocal(i));
                Ok(())
            }
            Binding::Var(i) => {
                em.op_unknown(Opcode::CallVar(i));
                Ok(())
            }
            Binding::Workspace(name) => {
                em.op_unknown(Opcode::CallWorkspace(name));
                Ok(())
            }
            Binding::Builtin(v) => {
                let takes = v.takes();
                let leaves = v.leaves();
                em.op(Opcode::CallImm(v), takes, leaves);
                Ok(())
            }
            Binding::Undefined => Err(Error::NotFound(word.to_string())),
        }
    }

    fn emit_quoted(&mut self, em: &mut Emitter, word: &str) -> Result<()> {
        let sym = getsym(word);
        match self.comp.resolve(&sym) {
            Binding::Local(i) => {
                em.op(Opcode::PushLocal(i), 0, 1);
                Ok(())
            }
            Binding::Var(i) => {
                em.op(Opcode::PushVar(i), 0, 1);
                Ok(())
            }
            Binding::Workspace(name) => {
                em.op(Opcode::PushWorkspace(name), 0, 1);
                Ok(())
            }
            Binding::Builtin(v) => {
                em.op(Opcode::PushImm(v), 0, 1);
                Ok(())
            }
            Binding::Undefined => Err(Error::NotFound(word.to_string())),
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::Syntax("unterminated string".to_string())),
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(c) => out.push(c as char),
                    None => return Err(Error::Syntax("unterminated string".to_string())),
                },
                Some(c) => out.push(c as char),
            }
        }
    }

    /// `{ |args| body }`
    fn parse_lambda(&mut self, em: &mut Emitter) -> Result<()> {
        self.pos += 1; // '{'
        self.skip_space();
        let mut arg_names = Vec::new();
        if self.peek() == Some(b'|') {
            self.pos += 1;
            loop {
                self.skip_space();
                match self.peek() {
                    Some(b'|') => {
                        self.pos += 1;
                        break;
                    }
                    Some(_) => arg_names.push(getsym(&self.read_word()?)),
                    None => {
                        return Err(Error::Syntax("unterminated argument list".to_string()))
                    }
                }
            }
        }
        let num_args = arg_names.len();
        self.comp.push_inner(arg_names.clone());
        let mut body = Emitter::new();
        self.parse_seq(&mut body, Some(b'}'))?;
        let scope = self.comp.pop_inner();
        let leaves = match body.depth {
            Some(d) if d > 0 => d as usize,
            _ => 1,
        };
        let caps = scope.vars.iter().map(|(_, cap)| *cap).collect();
        let def = FunDef::new(
            Code::new(body.ops),
            num_args,
            scope.locals.len(),
            arg_names,
            caps,
            leaves,
        );
        em.op(Opcode::MakeFun(def), 0, 1);
        Ok(())
    }

    /// `'{ key: expr ... }`
    fn parse_form_literal(&mut self, em: &mut Emitter) -> Result<()> {
        em.begin_gather();
        let mut keys = Vec::new();
        loop {
            self.skip_space();
            match self.peek() {
                None => return Err(Error::Syntax("unterminated form literal".to_string())),
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }
            let key = self.read_word()?;
            self.skip_space();
            if self.peek() != Some(b':') {
                return Err(Error::Syntax(format!("expected ':' after key {key}")));
            }
            self.pos += 1;
            keys.push(getsym(&key));
            // the value expression: tokens up to the next key or the end
            loop {
                self.skip_space();
                match self.peek() {
                    None => {
                        return Err(Error::Syntax("unterminated form literal".to_string()))
                    }
                    Some(b'}') => break,
                    Some(_) => {}
                }
                if self.at_form_key() {
                    break;
                }
                self.parse_one(em)?;
            }
        }
        em.end_gather(Opcode::MakeForm(Arc::new(keys)));
        Ok(())
    }

    /// Lookahead: does a `word :` pair start here?
    fn at_form_key(&mut self) -> bool {
        let save = self.pos;
        let looks = match self.read_word() {
            Ok(_) => {
                self.skip_space();
                self.peek() == Some(b':')
            }
            Err(_) => false,
        };
        self.pos = save;
        looks
    }
}
