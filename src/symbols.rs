//! Per-function symbol table.
//!
//! The table is flat: a declaration stays visible until the end of the
//! function, whatever block it was made in. Every local owns a fixed slot in
//! the area reserved by the prologue, so a declaration inside a loop body or
//! a skipped block never moves the others.
//!
//! The table also owns the stack-top counter, the number of bytes between
//! rbp and rsp. It starts at the reserved area and follows every temporary
//! push and pop the generator emits.
//!
//! The runtime stack grows towards lower addresses, so a variable with
//! offset 8 lives at `[rbp - 8]`.

pub const WORD_SIZE: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// line of declaration
    pub line: u32,
    /// relative to the frame pointer
    pub offset: i64,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    stack_top: i64,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for `slots` locals reserved below rbp; returns their size in bytes.
    pub fn reserve(&mut self, slots: usize) -> i64 {
        let bytes = slots as i64 * WORD_SIZE;
        self.stack_top += bytes;
        bytes
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|sym| sym.name == name)
    }

    /// Hands out the next reserved slot to `name` and returns its offset.
    /// Callers check for an earlier declaration first.
    pub fn insert(&mut self, name: &str, line: u32) -> i64 {
        let offset = (self.symbols.len() as i64 + 1) * WORD_SIZE;
        self.symbols.push(Symbol {
            name: name.to_string(),
            line,
            offset,
        });
        offset
    }

    pub fn push(&mut self) {
        self.stack_top += WORD_SIZE;
    }

    pub fn pop(&mut self) {
        self.stack_top -= WORD_SIZE;
    }

    // `push rbp` in the prologue leaves rsp aligned at stack_top == 0
    pub fn is_aligned(&self, align: i64) -> bool {
        self.stack_top % align == 0
    }

    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}
