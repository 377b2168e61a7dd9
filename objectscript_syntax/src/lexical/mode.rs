//! Lexer modes
//!
//! `LexMode` is everything the scanner needs to resume at a token boundary.
//! It is small and `Copy` so every token can carry the mode it was scanned
//! in, which is what makes incremental relexing possible.

use serde::{Deserialize, Serialize};

/// Which sub-language the scanner is reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layer {
    /// Class definition layout
    Udl,
    /// Commands and statements
    #[default]
    Core,
    /// Standalone expressions, expression-mode method bodies
    Expr,
    /// Raw passthrough up to a fence closer
    Raw,
}

/// Where the scanner is within a core line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinePosition {
    /// First character of a line: words are labels
    #[default]
    ColumnZero,
    /// Words that are command forms are commands
    CommandStart,
    /// Right after a command word
    AfterCommand,
    /// Expecting an operand
    Operand,
    /// Right after an operand
    AfterOperand,
    /// After an operand and whitespace: a command word starts a new command
    AfterOperandSpace,
    /// After `?` in operator position: a pattern follows
    Pattern,
    /// After `#define`: the macro name
    MacroName,
    /// Inside a `#define` parameter list
    MacroParams,
    /// After the macro name: the rest of the line is the value
    MacroValue,
}

/// Closer that ends a raw region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FenceKind {
    /// `&sql(` ... `)`
    Paren,
    /// `&html<` ... `>`
    Angle,
    /// class member body `{` ... `}`
    Brace,
}

impl FenceKind {
    pub fn open_char(&self) -> char {
        match self {
            FenceKind::Paren => '(',
            FenceKind::Angle => '<',
            FenceKind::Brace => '{',
        }
    }

    pub fn close_char(&self) -> char {
        match self {
            FenceKind::Paren => ')',
            FenceKind::Angle => '>',
            FenceKind::Brace => '}',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fence {
    pub kind: FenceKind,
    /// Layer to return to after the closer
    pub resume: Layer,
}

/// Body kind armed by a class member declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyKind {
    #[default]
    None,
    Code,
    Expr,
    Raw,
}

/// Keyword whose value changes the pending body kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AwaitingValue {
    #[default]
    None,
    Language,
    CodeMode,
    /// A `{` opens an expression value
    Expression,
    /// A `{` opens a code snippet
    Code,
}

/// Class layer bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UdlContext {
    pub pending: BodyKind,
    pub brackets: u8,
    pub parens: u8,
    pub awaiting: AwaitingValue,
    /// Next identifier is a member keyword
    pub member_start: bool,
    /// Inside a braced keyword value or argument default
    pub in_value: bool,
}

/// Nesting of JSON literals: depth plus one bit per level set for arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JsonNesting {
    depth: u8,
    arrays: u32,
}

impl JsonNesting {
    pub const MAX_DEPTH: u8 = 32;

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn top_is_array(&self) -> bool {
        self.depth > 0 && self.arrays & (1 << (self.depth - 1)) != 0
    }

    pub fn top_is_object(&self) -> bool {
        self.depth > 0 && !self.top_is_array()
    }

    /// Returns false when nesting is too deep to track
    pub fn push(&mut self, array: bool) -> bool {
        if self.depth >= Self::MAX_DEPTH {
            return false;
        }
        let bit = 1u32 << self.depth;
        if array {
            self.arrays |= bit;
        } else {
            self.arrays &= !bit;
        }
        self.depth += 1;
        true
    }

    pub fn pop(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
            self.arrays &= !(1u32 << self.depth);
        }
    }
}

/// Complete scanner state at a token boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LexMode {
    pub layer: Layer,
    pub position: LinePosition,
    /// Inside a `:condition` after a command
    pub postcond: bool,
    /// The last command accepts a `{` block after one space
    pub block_command: bool,
    /// Core block nesting within the current body
    pub brace_depth: u16,
    pub json: JsonNesting,
    pub fence: Option<Fence>,
    pub udl: UdlContext,
}

impl LexMode {
    /// Initial mode for routine-style core source
    pub fn core() -> Self {
        Self::default()
    }

    /// Initial mode for a standalone expression
    pub fn expr() -> Self {
        Self {
            layer: Layer::Expr,
            position: LinePosition::Operand,
            ..Self::default()
        }
    }

    /// Initial mode for a class definition document
    pub fn udl() -> Self {
        Self {
            layer: Layer::Udl,
            position: LinePosition::CommandStart,
            udl: UdlContext {
                member_start: true,
                ..UdlContext::default()
            },
            ..Self::default()
        }
    }

    /// Newlines are tokens only in the core layer outside JSON literals
    pub fn newline_is_significant(&self) -> bool {
        self.layer == Layer::Core && self.json.is_empty()
    }

    /// Inside a member body that was entered from the class layer
    pub fn in_member_body(&self) -> bool {
        self.udl.pending != BodyKind::None && self.layer != Layer::Udl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_nesting_tracks_arrays_per_level() {
        let mut json = JsonNesting::default();
        assert!(json.push(false));
        assert!(json.push(true));
        assert!(json.top_is_array());
        json.pop();
        assert!(json.top_is_object());
        json.pop();
        assert!(json.is_empty());
        json.pop();
        assert_eq!(json.depth(), 0);
    }

    #[test]
    fn test_json_nesting_limit() {
        let mut json = JsonNesting::default();
        for _ in 0..JsonNesting::MAX_DEPTH {
            assert!(json.push(true));
        }
        assert!(!json.push(true));
    }

    #[test]
    fn test_initial_modes() {
        assert_eq!(LexMode::core().position, LinePosition::ColumnZero);
        assert_eq!(LexMode::expr().layer, Layer::Expr);
        assert!(LexMode::core().newline_is_significant());
        assert!(!LexMode::udl().newline_is_significant());
        assert!(!LexMode::udl().in_member_body());
    }
}
