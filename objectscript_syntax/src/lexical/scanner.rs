//! Re-entrant scanner
//!
//! `scan` reads exactly one token starting at `offset` given the mode the
//! previous token left behind. It never fails: anything it cannot classify
//! becomes a one-character `Error` token, and every call consumes at least
//! one byte unless the input is exhausted.

use crate::config::compile_time::lexical::{MAX_IDENTIFIER_LENGTH, MAX_STRING_SIZE};
use crate::lexical::keywords;
use crate::lexical::mode::{
    AwaitingValue, BodyKind, Fence, FenceKind, Layer, LexMode, LinePosition,
};
use crate::tokens::{Token, TokenKind};
use crate::utils::SourceMap;

/// Result of one scan step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    pub kind: TokenKind,
    pub end: usize,
    /// Mode for the token that follows
    pub next: LexMode,
}

/// Scan one token. Returns `None` at end of input.
pub fn scan(source: &str, offset: usize, mode: LexMode) -> Option<Scan> {
    if offset >= source.len() || !source.is_char_boundary(offset) {
        return None;
    }
    let mut cursor = Cursor::new(source, offset, mode);
    let kind = match mode.layer {
        Layer::Raw => cursor.raw_region(),
        Layer::Udl => cursor.udl_token(),
        Layer::Core | Layer::Expr => cursor.code_token(),
    };
    Some(cursor.finish(kind))
}

/// Scan one token and attach its span and starting mode
pub fn scan_token(map: &SourceMap, offset: usize, mode: LexMode) -> Option<(Token, LexMode)> {
    scan(map.source(), offset, mode).map(|s| {
        (
            Token::new(s.kind, map.span(offset, s.end), mode),
            s.next,
        )
    })
}

fn is_ident_start(c: char) -> bool {
    c == '%' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric())
}

fn is_line_end(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn is_pattern_code(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'E' | 'L' | 'N' | 'P' | 'U')
}

struct Cursor<'a> {
    src: &'a str,
    start: usize,
    pos: usize,
    /// Mode the token started in
    entry: LexMode,
    /// Mode being built for the next token
    next: LexMode,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, offset: usize, mode: LexMode) -> Self {
        Self {
            src,
            start: offset,
            pos: offset,
            entry: mode,
            next: mode,
        }
    }

    // === PRIMITIVES ===

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn starts_with_ci(&self, s: &str) -> bool {
        self.rest()
            .get(..s.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(s))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_str(&mut self, s: &str) {
        self.pos += s.len();
    }

    fn eat_while(&mut self, f: impl Fn(char) -> bool) -> usize {
        let from = self.pos;
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos - from
    }

    fn text(&self) -> &'a str {
        &self.src[self.start..self.pos]
    }

    fn finish(mut self, mut kind: TokenKind) -> Scan {
        // Every scan consumes input
        if self.pos == self.start {
            self.bump();
            kind = TokenKind::Error;
        }
        if !kind.is_trivia() && kind != TokenKind::Command {
            self.next.block_command = false;
        }
        Scan {
            kind,
            end: self.pos,
            next: self.next,
        }
    }

    fn set_position(&mut self, position: LinePosition) {
        self.next.position = position;
    }

    fn operand_done(&mut self) {
        self.set_position(LinePosition::AfterOperand);
    }

    fn after_operand(&self) -> bool {
        matches!(
            self.entry.position,
            LinePosition::AfterOperand | LinePosition::AfterOperandSpace
        )
    }

    // === SHARED LEXEMES ===

    fn newline(&mut self) {
        if self.starts_with("\r\n") {
            self.pos += 2;
        } else {
            self.bump();
        }
    }

    fn line_comment(&mut self) -> TokenKind {
        self.eat_while(|c| !is_line_end(c));
        TokenKind::LineComment
    }

    fn block_comment(&mut self) -> TokenKind {
        self.bump_str("/*");
        match self.rest().find("*/") {
            Some(i) => {
                self.pos += i + 2;
                TokenKind::BlockComment
            }
            None => {
                self.pos = self.src.len();
                TokenKind::Error
            }
        }
    }

    /// `"..."` with `""` escapes, never crossing a line end
    fn string(&mut self) -> TokenKind {
        self.bump();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    if self.peek() == Some('"') {
                        self.bump();
                    } else {
                        break;
                    }
                }
                Some(c) if !is_line_end(c) => {
                    self.bump();
                }
                _ => return TokenKind::Error,
            }
        }
        if self.pos - self.start > MAX_STRING_SIZE {
            return TokenKind::Error;
        }
        TokenKind::String
    }

    fn number(&mut self) -> TokenKind {
        self.eat_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let digit_at = match self.peek_nth(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }
        TokenKind::Number
    }

    fn identifier_run(&mut self) -> usize {
        let from = self.pos;
        if self.peek().is_some_and(is_ident_start) {
            self.bump();
            self.eat_while(is_ident_continue);
        }
        self.pos - from
    }

    fn checked_identifier(&self, kind: TokenKind) -> TokenKind {
        if self.text().chars().count() > MAX_IDENTIFIER_LENGTH {
            TokenKind::Error
        } else {
            kind
        }
    }

    // === RAW REGIONS ===

    fn raw_region(&mut self) -> TokenKind {
        let Some(fence) = self.entry.fence else {
            // Raw layer without a fence cannot close; pass the rest through
            self.pos = self.src.len();
            return TokenKind::RawText;
        };
        let close = fence.kind.close_char();
        if self.peek() == Some(close) {
            self.bump();
            self.close_fence(fence);
            return TokenKind::Punctuation;
        }

        let open = fence.kind.open_char();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            if c == close && depth == 0 {
                return TokenKind::RawText;
            }
            match c {
                '"' => self.skip_quoted('"'),
                '\'' if fence.kind == FenceKind::Paren => self.skip_quoted('\''),
                _ => {
                    if c == open {
                        depth += 1;
                    } else if c == close {
                        depth -= 1;
                    }
                    self.bump();
                }
            }
        }
        TokenKind::Error
    }

    fn skip_quoted(&mut self, quote: char) {
        self.bump();
        while let Some(c) = self.bump() {
            if c == quote {
                break;
            }
        }
    }

    fn close_fence(&mut self, fence: Fence) {
        self.next.fence = None;
        self.next.layer = fence.resume;
        match fence.resume {
            Layer::Udl => self.return_to_class_layer(),
            _ => self.operand_done(),
        }
    }

    fn open_fence(&mut self, kind: FenceKind) {
        self.next.fence = Some(Fence {
            kind,
            resume: self.entry.layer,
        });
        self.next.layer = Layer::Raw;
    }

    fn return_to_class_layer(&mut self) {
        self.next.layer = Layer::Udl;
        self.next.position = LinePosition::CommandStart;
        self.next.postcond = false;
        self.next.brace_depth = 0;
        self.next.json = Default::default();
        self.next.udl.pending = BodyKind::None;
        self.next.udl.awaiting = AwaitingValue::None;
        self.next.udl.member_start = true;
    }

    // === CORE AND EXPRESSION LAYERS ===

    fn code_token(&mut self) -> TokenKind {
        let Some(c) = self.peek() else {
            return TokenKind::Error;
        };

        if is_line_end(c) {
            if self.entry.newline_is_significant() {
                self.newline();
                self.next.position = LinePosition::ColumnZero;
                self.next.postcond = false;
                return TokenKind::Newline;
            }
            return self.whitespace();
        }
        if c == ' ' || c == '\t' {
            return self.whitespace();
        }

        let core = self.entry.layer == Layer::Core;
        if (core && c == ';') || self.starts_with("//") {
            return self.line_comment();
        }
        if self.starts_with("/*") {
            return self.block_comment();
        }
        if core && (self.starts_with("#;") || self.starts_with("##;")) {
            return self.line_comment();
        }

        match self.entry.position {
            LinePosition::ColumnZero if core => self.column_zero(c),
            LinePosition::MacroName => self.macro_name(),
            LinePosition::MacroParams => self.macro_params(c),
            LinePosition::MacroValue => self.macro_value(),
            LinePosition::Pattern => self.pattern(),
            _ => self.general(c),
        }
    }

    fn whitespace(&mut self) -> TokenKind {
        let cross_lines = !self.entry.newline_is_significant();
        self.eat_while(|c| c == ' ' || c == '\t' || (cross_lines && is_line_end(c)));
        let single_space = self.text() == " ";

        match self.entry.position {
            LinePosition::ColumnZero => self.set_position(LinePosition::CommandStart),
            LinePosition::AfterCommand => self.after_command_space(single_space),
            LinePosition::Operand | LinePosition::AfterOperand if self.entry.postcond => {
                self.next.postcond = false;
                self.after_command_space(single_space);
            }
            LinePosition::AfterOperand => self.set_position(LinePosition::AfterOperandSpace),
            _ => {}
        }
        TokenKind::Whitespace
    }

    /// One space then anything but a terminator starts the arguments
    fn after_command_space(&mut self, single_space: bool) {
        if single_space && !self.at_argument_terminator() {
            self.set_position(LinePosition::Operand);
        } else {
            self.set_position(LinePosition::CommandStart);
        }
    }

    fn at_argument_terminator(&self) -> bool {
        match self.peek() {
            None => true,
            Some(' ' | '\t' | '\n' | '\r' | ';' | '}') => true,
            Some(_) => {
                self.starts_with("//") || self.starts_with("/*") || self.starts_with("#;")
            }
        }
    }

    fn column_zero(&mut self, c: char) -> TokenKind {
        if is_ident_start(c) || c.is_ascii_digit() {
            self.bump();
            self.eat_while(is_ident_continue);
            self.operand_done();
            return self.checked_identifier(TokenKind::Label);
        }
        self.general(c)
    }

    fn general(&mut self, c: char) -> TokenKind {
        match c {
            c if is_ident_start(c) => self.word(),
            c if c.is_ascii_digit() => {
                self.operand_done();
                self.number()
            }
            '.' => self.dot(),
            '"' => {
                self.operand_done();
                self.string()
            }
            '$' => self.dollar(),
            '^' => {
                if self.starts_with("^$") {
                    self.bump_str("^$");
                } else {
                    self.bump();
                }
                self.set_position(LinePosition::Operand);
                TokenKind::Punctuation
            }
            '#' => self.hash(),
            '&' => self.ampersand(),
            '{' => self.open_brace(),
            '}' => self.close_brace(),
            '[' => {
                self.bump();
                if self.entry.position == LinePosition::Operand {
                    if !self.next.json.push(true) {
                        return TokenKind::Error;
                    }
                    self.set_position(LinePosition::Operand);
                    return TokenKind::Punctuation;
                }
                self.set_position(LinePosition::Operand);
                TokenKind::Operator
            }
            ']' => {
                if self.entry.json.top_is_array() {
                    self.bump();
                    self.next.json.pop();
                    self.operand_done();
                    return TokenKind::Punctuation;
                }
                if self.starts_with("]]") {
                    self.bump_str("]]");
                } else {
                    self.bump();
                }
                self.set_position(LinePosition::Operand);
                TokenKind::Operator
            }
            '(' | ',' | '@' => {
                self.bump();
                self.set_position(LinePosition::Operand);
                TokenKind::Punctuation
            }
            ')' => {
                self.bump();
                self.operand_done();
                TokenKind::Punctuation
            }
            ':' => {
                self.bump();
                if self.entry.position == LinePosition::AfterCommand {
                    self.next.postcond = true;
                }
                self.set_position(LinePosition::Operand);
                TokenKind::Punctuation
            }
            '\'' => self.apostrophe(),
            '?' => {
                self.bump();
                if self.after_operand() {
                    self.set_position(LinePosition::Pattern);
                } else {
                    self.set_position(LinePosition::Operand);
                }
                TokenKind::Operator
            }
            '*' | '|' | '<' | '>' => {
                let pair = match c {
                    '*' => "**",
                    '|' => "||",
                    '<' => "<=",
                    _ => ">=",
                };
                if self.starts_with(pair) {
                    self.bump_str(pair);
                } else if c == '|' {
                    self.bump();
                    return TokenKind::Error;
                } else {
                    self.bump();
                }
                self.set_position(LinePosition::Operand);
                TokenKind::Operator
            }
            '=' | '+' | '-' | '/' | '\\' | '_' | '!' => {
                self.bump();
                self.set_position(LinePosition::Operand);
                TokenKind::Operator
            }
            _ => {
                self.bump();
                TokenKind::Error
            }
        }
    }

    fn word(&mut self) -> TokenKind {
        self.identifier_run();
        let text = self.text();

        if text.eq_ignore_ascii_case("i")
            && self.peek() == Some('%')
            && self.peek_nth(1).is_some_and(is_ident_start)
        {
            self.bump();
            self.identifier_run();
            self.operand_done();
            return self.checked_identifier(TokenKind::InstanceVariable);
        }

        if self.entry.layer == Layer::Core
            && matches!(
                self.entry.position,
                LinePosition::CommandStart | LinePosition::AfterOperandSpace
            )
            && self.entry.json.is_empty()
        {
            let lower = text.to_ascii_lowercase();
            if keywords::is_command_word(&lower) {
                self.next.position = LinePosition::AfterCommand;
                self.next.postcond = false;
                self.next.block_command = keywords::is_block_command(&lower);
                return TokenKind::Command;
            }
        }

        self.operand_done();
        self.checked_identifier(TokenKind::Identifier)
    }

    fn dot(&mut self) -> TokenKind {
        if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) && !self.after_operand() {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
            self.operand_done();
            return TokenKind::Number;
        }
        if self.starts_with("...") {
            self.bump_str("...");
            self.operand_done();
        } else if self.starts_with("..") {
            self.bump_str("..");
            self.set_position(LinePosition::Operand);
        } else {
            self.bump();
            // `. . set x=1` keeps command position
            if self.entry.position != LinePosition::CommandStart {
                self.set_position(LinePosition::Operand);
            }
        }
        TokenKind::Punctuation
    }

    fn dollar(&mut self) -> TokenKind {
        if self.starts_with("$$$") {
            self.bump_str("$$$");
            if self.eat_while(|c| c == '%' || is_ident_continue(c)) == 0 {
                return TokenKind::Error;
            }
            self.operand_done();
            return self.checked_identifier(TokenKind::Macro);
        }
        if self.starts_with("$$") {
            self.bump_str("$$");
            self.set_position(LinePosition::Operand);
            return TokenKind::Punctuation;
        }

        self.bump();
        if self.identifier_run() == 0 {
            return TokenKind::Error;
        }
        self.operand_done();
        let lower = self.text()[1..].to_ascii_lowercase();
        if self.peek() == Some('(') && keywords::is_system_function(&lower) {
            return TokenKind::SystemFunction;
        }
        if keywords::is_system_variable(&lower) {
            return TokenKind::SystemVariable;
        }
        self.checked_identifier(TokenKind::Identifier)
    }

    fn hash(&mut self) -> TokenKind {
        if self.starts_with_ci("##class") || self.starts_with_ci("##super") {
            self.pos += "##class".len();
            self.set_position(LinePosition::Operand);
            return TokenKind::Punctuation;
        }
        if self.starts_with_ci("##sql(") {
            self.pos += "##sql(".len();
            self.open_fence(FenceKind::Paren);
            return TokenKind::EmbedOpen;
        }

        let at_statement = matches!(
            self.entry.position,
            LinePosition::ColumnZero | LinePosition::CommandStart
        );
        if at_statement && self.peek_nth(1).is_some_and(|c| c.is_ascii_alphabetic()) {
            let word_len = self.rest()[1..]
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(self.rest().len() - 1);
            let word = self.rest()[1..1 + word_len].to_ascii_lowercase();
            if keywords::is_directive(&word) {
                self.pos += 1 + word_len;
                let position = if keywords::directive_takes_macro_name(&word) {
                    LinePosition::MacroName
                } else if keywords::directive_is_bare(&word) {
                    LinePosition::AfterOperand
                } else {
                    LinePosition::Operand
                };
                self.set_position(position);
                return TokenKind::Directive;
            }
        }

        self.bump();
        self.set_position(LinePosition::Operand);
        TokenKind::Operator
    }

    fn ampersand(&mut self) -> TokenKind {
        for (opener, fence) in [
            ("&sql(", FenceKind::Paren),
            ("&html<", FenceKind::Angle),
            ("&js<", FenceKind::Angle),
            ("&xml<", FenceKind::Angle),
        ] {
            if self.starts_with_ci(opener) {
                self.pos += opener.len();
                self.open_fence(fence);
                return TokenKind::EmbedOpen;
            }
        }
        if self.starts_with("&&") {
            self.bump_str("&&");
        } else {
            self.bump();
        }
        self.set_position(LinePosition::Operand);
        TokenKind::Operator
    }

    fn opens_block(&self) -> bool {
        if self.entry.layer != Layer::Core || !self.entry.json.is_empty() {
            return false;
        }
        match self.entry.position {
            LinePosition::Operand => self.entry.block_command,
            LinePosition::CommandStart
            | LinePosition::AfterCommand
            | LinePosition::AfterOperand
            | LinePosition::AfterOperandSpace
            | LinePosition::ColumnZero => true,
            _ => false,
        }
    }

    fn open_brace(&mut self) -> TokenKind {
        if self.opens_block() {
            self.bump();
            self.next.brace_depth = self.entry.brace_depth.saturating_add(1);
            self.next.postcond = false;
            self.set_position(LinePosition::CommandStart);
            return TokenKind::Punctuation;
        }

        if self.entry.position == LinePosition::Operand {
            if let Some(len) = self.sql_field_reference_len() {
                self.pos += len;
                self.operand_done();
                return TokenKind::SqlFieldReference;
            }
            self.bump();
            if !self.next.json.push(false) {
                return TokenKind::Error;
            }
            self.set_position(LinePosition::Operand);
            return TokenKind::Punctuation;
        }

        self.bump();
        TokenKind::Punctuation
    }

    /// Length of `{name}` at the cursor, if present
    fn sql_field_reference_len(&self) -> Option<usize> {
        let rest = self.rest();
        if rest.starts_with("{*}") {
            return Some(3);
        }
        let mut chars = rest.char_indices().skip(1);
        let (_, first) = chars.next()?;
        if !is_ident_start(first) {
            return None;
        }
        for (i, c) in chars {
            if c == '}' {
                return Some(i + 1);
            }
            if !(is_ident_continue(c) || c == '%' || c == '*' || c == '_') {
                return None;
            }
        }
        None
    }

    fn close_brace(&mut self) -> TokenKind {
        self.bump();
        if self.entry.json.top_is_object() {
            self.next.json.pop();
            self.operand_done();
        } else if self.entry.layer == Layer::Core && self.entry.brace_depth > 0 {
            self.next.brace_depth -= 1;
            self.next.postcond = false;
            self.operand_done();
        } else if self.entry.udl.in_value {
            self.leave_value();
        } else if self.entry.in_member_body() {
            self.return_to_class_layer();
        } else {
            self.operand_done();
        }
        TokenKind::Punctuation
    }

    fn apostrophe(&mut self) -> TokenKind {
        self.bump();
        if self.after_operand() {
            if self.starts_with("]]") {
                self.bump_str("]]");
                self.set_position(LinePosition::Operand);
                return TokenKind::Operator;
            }
            if let Some(c @ ('=' | '<' | '>' | '[' | ']' | '&' | '!' | '?')) = self.peek() {
                self.bump();
                let position = if c == '?' {
                    LinePosition::Pattern
                } else {
                    LinePosition::Operand
                };
                self.set_position(position);
                return TokenKind::Operator;
            }
        }
        self.set_position(LinePosition::Operand);
        TokenKind::Operator
    }

    /// Pattern-match operand: counts, codes, literals and alternations
    fn pattern(&mut self) -> TokenKind {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                c if c.is_ascii_digit() || c == '.' => {
                    self.bump();
                }
                c if is_pattern_code(c) => {
                    self.bump();
                }
                '"' => {
                    if self.string() == TokenKind::Error {
                        return TokenKind::Error;
                    }
                }
                '(' => {
                    depth += 1;
                    self.bump();
                }
                ',' if depth > 0 => {
                    self.bump();
                }
                ')' if depth > 0 => {
                    depth -= 1;
                    self.bump();
                }
                _ => break,
            }
        }

        if self.pos == self.start {
            // `x?@pat` and anything else falls back to an operand
            self.next.position = LinePosition::Operand;
            self.entry.position = LinePosition::Operand;
            let Some(c) = self.peek() else {
                return TokenKind::Error;
            };
            return self.general(c);
        }
        self.operand_done();
        if depth > 0 {
            TokenKind::Error
        } else {
            TokenKind::Pattern
        }
    }

    // === MACRO DEFINITIONS ===

    fn macro_name(&mut self) -> TokenKind {
        if self.eat_while(|c| c == '%' || is_ident_continue(c)) == 0 {
            self.bump();
            self.set_position(LinePosition::MacroValue);
            return TokenKind::Error;
        }
        if self.peek() == Some('(') {
            self.set_position(LinePosition::MacroParams);
        } else {
            self.set_position(LinePosition::MacroValue);
        }
        self.checked_identifier(TokenKind::Identifier)
    }

    fn macro_params(&mut self, c: char) -> TokenKind {
        match c {
            '(' | ',' => {
                self.bump();
                TokenKind::Punctuation
            }
            ')' => {
                self.bump();
                self.set_position(LinePosition::MacroValue);
                TokenKind::Punctuation
            }
            c if is_ident_start(c) => {
                self.identifier_run();
                self.checked_identifier(TokenKind::Identifier)
            }
            _ => {
                self.bump();
                TokenKind::Error
            }
        }
    }

    /// Rest of the line, continued across lines ending in `##continue`
    fn macro_value(&mut self) -> TokenKind {
        loop {
            self.eat_while(|c| !is_line_end(c));
            let line = self.text().trim_end();
            let continued = line
                .len()
                .checked_sub("##continue".len())
                .and_then(|at| line.get(at..))
                .is_some_and(|tail| tail.eq_ignore_ascii_case("##continue"));
            if continued && self.peek().is_some() {
                self.newline();
            } else {
                break;
            }
        }
        TokenKind::RawText
    }

    // === CLASS LAYER ===

    fn udl_token(&mut self) -> TokenKind {
        let Some(c) = self.peek() else {
            return TokenKind::Error;
        };
        if c.is_whitespace() {
            self.eat_while(char::is_whitespace);
            return TokenKind::Whitespace;
        }
        if self.starts_with("///") {
            self.eat_while(|c| !is_line_end(c));
            return TokenKind::DocComment;
        }
        if self.starts_with("//") {
            return self.line_comment();
        }
        if self.starts_with("/*") {
            return self.block_comment();
        }

        match c {
            c if is_ident_start(c) => self.udl_word(),
            c if c.is_ascii_digit() => self.number(),
            '"' => self.string(),
            '{' => {
                self.bump();
                self.udl_open_brace();
                TokenKind::Punctuation
            }
            '}' => {
                self.bump();
                self.next.udl.member_start = true;
                TokenKind::Punctuation
            }
            '[' => {
                self.bump();
                self.next.udl.brackets = self.entry.udl.brackets.saturating_add(1);
                TokenKind::Punctuation
            }
            ']' => {
                self.bump();
                self.next.udl.brackets = self.entry.udl.brackets.saturating_sub(1);
                self.clear_value_awaiting();
                TokenKind::Punctuation
            }
            '(' => {
                self.bump();
                self.next.udl.parens = self.entry.udl.parens.saturating_add(1);
                TokenKind::Punctuation
            }
            ')' => {
                self.bump();
                self.next.udl.parens = self.entry.udl.parens.saturating_sub(1);
                self.clear_value_awaiting();
                TokenKind::Punctuation
            }
            ';' => {
                self.bump();
                self.clear_value_awaiting();
                if self.entry.udl.brackets == 0 && self.entry.udl.parens == 0 {
                    self.next.udl.member_start = true;
                    self.next.udl.pending = BodyKind::None;
                }
                TokenKind::Punctuation
            }
            '.' => {
                if self.starts_with("...") {
                    self.bump_str("...");
                } else {
                    self.bump();
                }
                TokenKind::Punctuation
            }
            '=' => {
                self.bump();
                // Argument defaults may be braced expressions
                if self.entry.udl.parens > 0 && self.entry.udl.brackets == 0 {
                    self.next.udl.awaiting = AwaitingValue::Expression;
                }
                TokenKind::Punctuation
            }
            ',' => {
                self.bump();
                self.clear_value_awaiting();
                TokenKind::Punctuation
            }
            ':' => {
                self.bump();
                TokenKind::Punctuation
            }
            '-' | '+' | '*' => {
                self.bump();
                TokenKind::Operator
            }
            _ => {
                self.bump();
                TokenKind::Error
            }
        }
    }

    fn udl_word(&mut self) -> TokenKind {
        self.identifier_run();
        // Dotted class names are one identifier
        while self.peek() == Some('.')
            && self
                .peek_nth(1)
                .is_some_and(|c| c == '%' || is_ident_continue(c))
        {
            self.bump();
            self.eat_while(|c| c == '%' || is_ident_continue(c));
        }
        let lower = self.text().to_ascii_lowercase();
        let udl = self.entry.udl;

        match udl.awaiting {
            AwaitingValue::Language if udl.pending != BodyKind::None => {
                self.next.udl.pending = if keywords::is_objectscript_language(&lower) {
                    BodyKind::Code
                } else {
                    BodyKind::Raw
                };
                self.next.udl.awaiting = AwaitingValue::None;
            }
            AwaitingValue::CodeMode if udl.pending == BodyKind::Code || udl.pending == BodyKind::Expr => {
                self.next.udl.pending = if lower == "expression" {
                    BodyKind::Expr
                } else {
                    BodyKind::Code
                };
                self.next.udl.awaiting = AwaitingValue::None;
            }
            _ => {}
        }

        if udl.member_start {
            if let Some(body) = keywords::member_body(&lower) {
                self.next.udl.pending = body;
            }
            self.next.udl.member_start = false;
        }

        if udl.brackets > 0 && udl.pending != BodyKind::None {
            match lower.as_str() {
                "language" => self.next.udl.awaiting = AwaitingValue::Language,
                "codemode" => self.next.udl.awaiting = AwaitingValue::CodeMode,
                _ => {}
            }
        }
        if udl.brackets > 0 {
            match keywords::keyword_value_body(&lower) {
                Some(BodyKind::Expr) => self.next.udl.awaiting = AwaitingValue::Expression,
                Some(BodyKind::Code) => self.next.udl.awaiting = AwaitingValue::Code,
                _ => {}
            }
        }

        self.checked_identifier(TokenKind::Identifier)
    }

    fn clear_value_awaiting(&mut self) {
        if matches!(
            self.entry.udl.awaiting,
            AwaitingValue::Expression | AwaitingValue::Code
        ) {
            self.next.udl.awaiting = AwaitingValue::None;
        }
    }

    fn udl_open_brace(&mut self) {
        let udl = self.entry.udl;
        let at_top = udl.brackets == 0 && udl.parens == 0;
        if !at_top {
            match udl.awaiting {
                AwaitingValue::Expression => {
                    self.enter_value(Layer::Expr);
                    return;
                }
                AwaitingValue::Code => {
                    self.enter_value(Layer::Core);
                    return;
                }
                _ => {}
            }
        }
        match udl.pending {
            BodyKind::Code if at_top => {
                self.next.layer = Layer::Core;
                self.next.position = LinePosition::CommandStart;
                self.next.brace_depth = 0;
                self.next.postcond = false;
                self.next.block_command = false;
                self.next.json = Default::default();
            }
            BodyKind::Expr if at_top => {
                self.next.layer = Layer::Expr;
                self.next.position = LinePosition::Operand;
                self.next.json = Default::default();
            }
            BodyKind::Raw if at_top => {
                self.next.layer = Layer::Raw;
                self.next.fence = Some(Fence {
                    kind: FenceKind::Brace,
                    resume: Layer::Udl,
                });
            }
            _ => {
                self.next.udl.member_start = true;
            }
        }
    }

    /// Braced keyword value or argument default; the class layer resumes
    /// at the matching `}` with its bracket counts intact
    fn enter_value(&mut self, layer: Layer) {
        self.next.layer = layer;
        self.next.position = match layer {
            Layer::Core => LinePosition::CommandStart,
            _ => LinePosition::Operand,
        };
        self.next.brace_depth = 0;
        self.next.postcond = false;
        self.next.block_command = false;
        self.next.json = Default::default();
        self.next.udl.awaiting = AwaitingValue::None;
        self.next.udl.in_value = true;
    }

    fn leave_value(&mut self) {
        self.next.layer = Layer::Udl;
        self.next.position = LinePosition::CommandStart;
        self.next.postcond = false;
        self.next.brace_depth = 0;
        self.next.json = Default::default();
        self.next.udl.in_value = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str, mode: LexMode) -> Vec<(TokenKind, std::string::String)> {
        let mut out = Vec::new();
        let mut offset = 0;
        let mut mode = mode;
        while let Some(s) = scan(source, offset, mode) {
            assert!(s.end > offset, "scan must consume input");
            out.push((s.kind, source[offset..s.end].to_string()));
            offset = s.end;
            mode = s.next;
        }
        out
    }

    fn significant(source: &str, mode: LexMode) -> Vec<(TokenKind, std::string::String)> {
        lex(source, mode)
            .into_iter()
            .filter(|(k, _)| !k.is_trivia())
            .collect()
    }

    fn kinds(source: &str, mode: LexMode) -> Vec<TokenKind> {
        significant(source, mode).into_iter().map(|(k, _)| k).collect()
    }

    use TokenKind::*;

    #[test]
    fn test_command_versus_label_at_column_zero() {
        let toks = significant("set x=1\n s y=2\n", LexMode::core());
        assert_eq!(toks[0], (Label, "set".to_string()));
        // a label followed by a command word: `x` is xecute here
        assert_eq!(toks[1], (Command, "x".to_string()));
        assert_eq!(toks[4].0, Newline);
        assert_eq!(toks[5], (Command, "s".to_string()));
        assert_eq!(toks[6], (Identifier, "y".to_string()));
    }

    #[test]
    fn test_argumentless_command_then_command() {
        let toks = significant(" quit  set x=1", LexMode::core());
        assert_eq!(toks[0], (Command, "quit".to_string()));
        assert_eq!(toks[1], (Command, "set".to_string()));
    }

    #[test]
    fn test_command_word_as_argument_is_identifier() {
        let toks = significant(" set s=1", LexMode::core());
        assert_eq!(toks[0].0, Command);
        assert_eq!(toks[1], (Identifier, "s".to_string()));
    }

    #[test]
    fn test_old_style_if_followed_by_command() {
        assert_eq!(
            kinds(" if x write y", LexMode::core()),
            vec![Command, Identifier, Command, Identifier]
        );
    }

    #[test]
    fn test_postconditional_without_spaces() {
        assert_eq!(
            kinds(" quit:x>1 y", LexMode::core()),
            vec![Command, Punctuation, Identifier, Operator, Number, Identifier]
        );
    }

    #[test]
    fn test_dollar_names() {
        let toks = significant(" set x=$piece(y,\",\",1)+$h+$$$Max+$$lab^rtn+$zzz", LexMode::core());
        let kinds: Vec<_> = toks.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&SystemFunction));
        assert!(toks.contains(&(SystemVariable, "$h".to_string())));
        assert!(toks.contains(&(Macro, "$$$Max".to_string())));
        assert!(toks.contains(&(Punctuation, "$$".to_string())));
        assert!(toks.contains(&(Identifier, "$zzz".to_string())));
    }

    #[test]
    fn test_system_variable_without_paren_is_not_function() {
        let toks = significant("$p", LexMode::expr());
        assert_eq!(toks, vec![(SystemVariable, "$p".to_string())]);
        let toks = significant("$p(x)", LexMode::expr());
        assert_eq!(toks[0], (SystemFunction, "$p".to_string()));
    }

    #[test]
    fn test_unterminated_string_stops_at_line_end() {
        let toks = lex(" write \"abc\n set x=1", LexMode::core());
        assert_eq!(toks[3], (Error, "\"abc".to_string()));
        assert_eq!(toks[4].0, Newline);
        assert_eq!(toks[6], (Command, "set".to_string()));
    }

    #[test]
    fn test_doubled_quote_escape() {
        let toks = significant("\"a\"\"b\"", LexMode::expr());
        assert_eq!(toks, vec![(String, "\"a\"\"b\"".to_string())]);
    }

    #[test]
    fn test_negated_operators_and_pattern() {
        let toks = significant("a'=b&(c'?1N.A)", LexMode::expr());
        assert!(toks.contains(&(Operator, "'=".to_string())));
        assert!(toks.contains(&(Operator, "'?".to_string())));
        assert!(toks.contains(&(Pattern, "1N.A".to_string())));
    }

    #[test]
    fn test_unary_not_is_single_apostrophe() {
        let toks = significant("'a", LexMode::expr());
        assert_eq!(toks[0], (Operator, "'".to_string()));
    }

    #[test]
    fn test_json_array_never_merges_brackets() {
        let toks = significant("[[1]]", LexMode::expr());
        assert_eq!(
            toks.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>(),
            vec!["[", "[", "1", "]", "]"]
        );
        let toks = significant("a]]b", LexMode::expr());
        assert_eq!(toks[1], (Operator, "]]".to_string()));
    }

    #[test]
    fn test_block_braces_and_json() {
        let toks = significant(" if x { set y={\"a\":1} }", LexMode::core());
        let texts: Vec<_> = toks.iter().map(|(k, t)| (*k, t.as_str())).collect();
        assert_eq!(texts[2], (Punctuation, "{"));
        assert_eq!(texts[3], (Command, "set"));
        assert_eq!(texts.last().copied(), Some((Punctuation, "}")));
    }

    #[test]
    fn test_else_after_closing_brace() {
        assert_eq!(
            kinds(" if x {\n } else {\n }", LexMode::core()),
            vec![
                Command, Identifier, Punctuation, Newline, Punctuation, Command, Punctuation,
                Newline, Punctuation
            ]
        );
    }

    #[test]
    fn test_try_block_after_one_space() {
        assert_eq!(
            kinds(" try {\n } catch ex {\n }", LexMode::core()),
            vec![
                Command, Punctuation, Newline, Punctuation, Command, Identifier, Punctuation,
                Newline, Punctuation
            ]
        );
    }

    #[test]
    fn test_instance_variable_and_sql_field() {
        let toks = significant(" set i%Name={Name}", LexMode::core());
        assert_eq!(toks[1], (InstanceVariable, "i%Name".to_string()));
        assert_eq!(toks[3], (SqlFieldReference, "{Name}".to_string()));
    }

    #[test]
    fn test_embedded_sql_region() {
        let toks = lex(" &sql(SELECT a INTO :b FROM t WHERE c = (1))\n", LexMode::core());
        assert_eq!(toks[1], (EmbedOpen, "&sql(".to_string()));
        assert_eq!(toks[2], (RawText, "SELECT a INTO :b FROM t WHERE c = (1)".to_string()));
        assert_eq!(toks[3], (Punctuation, ")".to_string()));
        assert_eq!(toks[4].0, Newline);
    }

    #[test]
    fn test_empty_embedded_region_has_no_raw_token() {
        assert_eq!(
            kinds(" &html<>", LexMode::core()),
            vec![EmbedOpen, Punctuation]
        );
    }

    #[test]
    fn test_unterminated_embedded_region_is_error() {
        assert_eq!(kinds(" &sql(SELECT", LexMode::core()), vec![EmbedOpen, Error]);
    }

    #[test]
    fn test_define_directive() {
        let toks = significant("#define Max(%a,%b) $s(%a>%b:%a,1:%b)\n", LexMode::core());
        assert_eq!(toks[0], (Directive, "#define".to_string()));
        assert_eq!(toks[1], (Identifier, "Max".to_string()));
        assert_eq!(toks[2].1, "(");
        assert_eq!(toks[6].1, ")");
        assert_eq!(toks[7], (RawText, "$s(%a>%b:%a,1:%b)".to_string()));
        assert_eq!(toks[8].0, Newline);
    }

    #[test]
    fn test_define_continuation() {
        let toks = significant("#define X 1 ##continue\n +2\n", LexMode::core());
        assert_eq!(toks[2], (RawText, "1 ##continue\n +2".to_string()));
    }

    #[test]
    fn test_comments_are_trivia() {
        let toks = lex(" set x=1 ; note\n // other\n #; third\n", LexMode::core());
        let comments = toks.iter().filter(|(k, _)| *k == LineComment).count();
        assert_eq!(comments, 3);
    }

    #[test]
    fn test_unknown_character_is_single_error() {
        let toks = lex("a ` b", LexMode::expr());
        assert_eq!(toks[2], (Error, "`".to_string()));
    }

    #[test]
    fn test_expression_newlines_are_whitespace() {
        assert_eq!(kinds("1 +\n 2", LexMode::expr()), vec![Number, Operator, Number]);
    }

    #[test]
    fn test_class_method_body_switches_layers() {
        let src = "Class A.B\n{\nMethod M() As %String\n{\n set x = 1\n}\n}\n";
        let toks = significant(src, LexMode::udl());
        assert_eq!(toks[1], (Identifier, "A.B".to_string()));
        assert!(toks.contains(&(Command, "set".to_string())));
        assert_eq!(toks.last().map(|(k, t)| (*k, t.as_str())), Some((Punctuation, "}")));
    }

    #[test]
    fn test_expression_method_body() {
        let src = "Method M() [ CodeMode = expression ]\n{\n1 + 2\n}";
        let toks = significant(src, LexMode::udl());
        assert!(toks.contains(&(Operator, "+".to_string())));
        assert!(!toks.iter().any(|(k, _)| *k == Newline));
    }

    #[test]
    fn test_raw_bodies() {
        let src = "XData Def\n{\n<a>{b}</a>\n}\nMethod P() [ Language = python ]\n{\nif x: {}\n}\n";
        let toks = significant(src, LexMode::udl());
        let raws: Vec<_> = toks.iter().filter(|(k, _)| *k == RawText).collect();
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].1, "\n<a>{b}</a>\n");
    }

    #[test]
    fn test_property_named_like_member_keyword() {
        let src = "{\nProperty Method As %String;\nMethod M()\n{\n quit\n}\n}";
        let toks = significant(src, LexMode::udl());
        assert_eq!(
            toks.iter().filter(|(k, _)| *k == Command).count(),
            1,
            "only the method body is code"
        );
    }

    #[test]
    fn test_braced_keyword_values() {
        let toks = significant(
            "{\nProperty P As %String [ InitialExpression = {$h} ];\n}",
            LexMode::udl(),
        );
        assert!(toks.contains(&(SystemVariable, "$h".to_string())));
        assert_eq!(toks[toks.len() - 2], (Punctuation, ";".to_string()));

        let toks = significant(
            "{\nProperty Q [ SqlComputed, SqlComputeCode = { set {*} = {Name}_\"x\" } ];\n}",
            LexMode::udl(),
        );
        assert!(toks.contains(&(Command, "set".to_string())));
        assert!(toks.contains(&(SqlFieldReference, "{*}".to_string())));
        assert!(toks.contains(&(SqlFieldReference, "{Name}".to_string())));
        assert_eq!(toks[toks.len() - 2], (Punctuation, ";".to_string()));

        // A plain bracketed keyword value is not a value
        let toks = significant("{\nProperty R [ Required ];\n}", LexMode::udl());
        assert!(!toks.iter().any(|(k, _)| *k == Command || *k == SystemVariable));
    }

    #[test]
    fn test_braced_argument_default() {
        let src = "{\nMethod M(a As %String = {$h}, b = 1)\n{\n quit\n}\n}";
        let toks = significant(src, LexMode::udl());
        assert!(toks.contains(&(SystemVariable, "$h".to_string())));
        assert_eq!(
            toks.iter().filter(|(k, _)| *k == Command).count(),
            1,
            "only the method body is code"
        );
    }

    #[test]
    fn test_resume_from_recorded_mode() {
        let source = " if x { set y=1 }\n write y";
        let mut offset = 0;
        let mut mode = LexMode::core();
        let mut recorded = Vec::new();
        while let Some(s) = scan(source, offset, mode) {
            recorded.push((offset, mode, s));
            offset = s.end;
            mode = s.next;
        }
        for (offset, mode, expected) in recorded {
            assert_eq!(scan(source, offset, mode), Some(expected));
        }
    }
}
