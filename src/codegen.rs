use tracing::{debug, trace, warn};

use crate::error::{
    DuplicateDeclarationSnafu, EmptyProgramSnafu, ExpectedBlockSnafu, GenError,
    MalformedFunctionSnafu, NotInLoopSnafu, UndefinedReferenceSnafu, UnexpectedElseSnafu,
    UnterminatedBlockSnafu,
};
use crate::{BinaryOp, Expr, Program, StmtKind, StmtNode, SymbolTable, UnaryOp};

/// Shared by every `return` and by the end-of-function fallthrough.
const EPILOGUE: &str = ".func_epilogue";
/// Format string used by `print`.
const FORMAT_LABEL: &str = "fmt";
const CALL_ALIGNMENT: i64 = 16;

macro_rules! emit {
    ($gen:expr, $($arg:tt)*) => {{
        $gen.asm.push_str(&format!($($arg)*));
        $gen.asm.push('\n');
    }};
}

/// Lowers a parsed program to Intel-syntax x86-64 assembly.
///
/// Every call builds its own generator context, so generating twice from the
/// same program yields the same text and shares no counters.
pub fn generate(program: &Program) -> Result<String, GenError> {
    Codegen::new(program).program()
}

/// Walks the flat statement list with a single cursor. Nested blocks are
/// handled by re-entering [`Codegen::block`], which advances the same cursor.
pub struct Codegen<'a> {
    stmts: &'a [StmtNode],
    cursor: usize,
    table: SymbolTable,
    // next free label id
    label: u32,
    // label id of the innermost enclosing loop, 0 outside any loop
    loop_label: u32,
    asm: String,
}

impl<'a> Codegen<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            stmts: &program.stmts,
            cursor: 0,
            table: SymbolTable::new(),
            label: 1,
            loop_label: 0,
            asm: String::new(),
        }
    }

    pub fn program(mut self) -> Result<String, GenError> {
        self.preamble();
        self.function()?;
        debug!(
            labels = self.label - 1,
            locals = self.table.count(),
            "generated function"
        );
        Ok(self.asm)
    }

    fn preamble(&mut self) {
        emit!(self, "  .data");
        emit!(self, "{FORMAT_LABEL}: .asciz \"%ld\\n\"");
        emit!(self, "  .intel_syntax noprefix");
        emit!(self, "  .align 4");
        emit!(self, "  .text");
        emit!(self, "{EPILOGUE}:");
        emit!(self, "  mov rsp, rbp");
        emit!(self, "  pop rbp");
        emit!(self, "  ret");
    }

    fn function(&mut self) -> Result<(), GenError> {
        let Some(node) = self.peek() else {
            return EmptyProgramSnafu.fail();
        };
        let StmtKind::FunctionDecl { name } = &node.kind else {
            return MalformedFunctionSnafu { line: node.line }.fail();
        };

        emit!(self, "  .globl {name}");
        emit!(self, "{name}:");
        emit!(self, "  push rbp");
        emit!(self, "  mov rbp, rsp");

        // every local gets its slot up front, whatever block declares it
        let slots = self
            .stmts
            .iter()
            .filter(|stmt| matches!(stmt.kind, StmtKind::Declaration { .. }))
            .count();
        if slots > 0 {
            let frame = self.table.reserve(slots);
            emit!(self, "  sub rsp, {frame}");
        }
        self.next();

        while self.peek().is_some() {
            self.stmt()?;
        }

        // default return value
        emit!(self, "  xor eax, eax");
        emit!(self, "  jmp {EPILOGUE}");
        Ok(())
    }

    /// Lowers the statement under the cursor and leaves the cursor on the
    /// statement after it.
    fn stmt(&mut self) -> Result<(), GenError> {
        let Some(node) = self.peek() else {
            return Ok(());
        };
        let line = node.line;
        trace!(line, kind = ?node.kind, "lowering statement");

        match &node.kind {
            StmtKind::Return(expr) => {
                self.expr(expr, line)?;
                emit!(self, "  jmp {EPILOGUE}");
            }
            StmtKind::Break => {
                let label = self.enclosing_loop(line, "break")?;
                emit!(self, "  jmp .after_loop_{label}");
            }
            StmtKind::Continue => {
                let label = self.enclosing_loop(line, "continue")?;
                emit!(self, "  jmp .loop_cond_{label}");
            }
            StmtKind::Print(expr) => self.print(expr, line)?,
            StmtKind::Declaration { name, init, .. } => self.declaration(name, init.as_ref(), line)?,
            StmtKind::Expr(expr) => self.expr(expr, line)?,
            StmtKind::If(cond) => self.if_stmt(cond, line)?,
            StmtKind::While(cond) => self.while_stmt(cond, line)?,
            // every valid else is consumed by its if
            StmtKind::Else => return UnexpectedElseSnafu { line }.fail(),
            StmtKind::FunctionDecl { .. } => return MalformedFunctionSnafu { line }.fail(),
            // a bare block opens no scope; just walk through it
            StmtKind::BlockStart => self.block(line)?,
            StmtKind::BlockEnd => {}
        }

        self.next();
        Ok(())
    }

    /// Consumes `{ ... }` starting at the cursor and leaves the cursor on the
    /// matching `BlockEnd`.
    fn block(&mut self, line: u32) -> Result<(), GenError> {
        match self.peek() {
            Some(node) if node.kind == StmtKind::BlockStart => self.next(),
            Some(node) => return ExpectedBlockSnafu { line: node.line }.fail(),
            None => return ExpectedBlockSnafu { line }.fail(),
        }

        loop {
            match self.peek() {
                Some(node) if node.kind == StmtKind::BlockEnd => return Ok(()),
                Some(_) => self.stmt()?,
                None => return UnterminatedBlockSnafu { line }.fail(),
            }
        }
    }

    fn if_stmt(&mut self, cond: &Expr, line: u32) -> Result<(), GenError> {
        let label = self.next_label();

        self.expr(cond, line)?;
        emit!(self, "  cmp rax, 0");
        // false: skip to the else block, or past the if altogether
        emit!(self, "  je .after_if_{label}");
        self.next();
        self.block(line)?;

        self.next();
        match self.peek() {
            Some(node) if node.kind == StmtKind::Else => {
                emit!(self, "  jmp .after_else_{label}");
                emit!(self, ".after_if_{label}:");
                self.next();
                self.block(node.line)?;
                emit!(self, ".after_else_{label}:");
            }
            _ => {
                emit!(self, ".after_if_{label}:");
                // the caller advances onto this statement again
                self.prev();
            }
        }
        Ok(())
    }

    fn while_stmt(&mut self, cond: &Expr, line: u32) -> Result<(), GenError> {
        let label = self.next_label();
        let outer = self.loop_label;

        emit!(self, ".loop_cond_{label}:");
        self.expr(cond, line)?;
        emit!(self, "  cmp rax, 0");
        emit!(self, "  je .after_loop_{label}");

        self.loop_label = label;
        self.next();
        self.block(line)?;

        emit!(self, "  jmp .loop_cond_{label}");
        emit!(self, ".after_loop_{label}:");
        self.loop_label = outer;
        Ok(())
    }

    fn print(&mut self, expr: &Expr, line: u32) -> Result<(), GenError> {
        self.expr(expr, line)?;

        // rsp must be 16-byte aligned at the call; any register will do as padding
        let padded = !self.table.is_aligned(CALL_ALIGNMENT);
        if padded {
            emit!(self, "  push rbx");
            self.table.push();
        }
        emit!(self, "  lea rdi, {FORMAT_LABEL}[rip]");
        emit!(self, "  mov rsi, rax");
        // no vector registers used by the variadic call
        emit!(self, "  xor eax, eax");
        emit!(self, "  call printf");
        if padded {
            emit!(self, "  pop rcx");
            self.table.pop();
        }
        Ok(())
    }

    fn declaration(&mut self, name: &str, init: Option<&Expr>, line: u32) -> Result<(), GenError> {
        if let Some(sym) = self.table.lookup(name) {
            return DuplicateDeclarationSnafu {
                line,
                name,
                first_line: sym.line,
            }
            .fail();
        }

        // visible to its own initializer, which then fills the slot
        let offset = self.table.insert(name, line);
        match init {
            Some(init) => self.expr(init, line)?,
            None => emit!(self, "  xor rax, rax"),
        }
        emit!(self, "  mov [rbp - {offset}], rax");
        Ok(())
    }

    fn expr(&mut self, expr: &Expr, line: u32) -> Result<(), GenError> {
        match expr {
            Expr::IntLiteral(val) => emit!(self, "  mov rax, {val}"),
            Expr::Identifier(name) => {
                let offset = self.offset_of(name, line)?;
                emit!(self, "  mov rax, [rbp - {offset}]");
            }
            Expr::Assign { name, rvalue } => {
                self.expr(rvalue, line)?;
                let offset = self.offset_of(name, line)?;
                emit!(self, "  mov [rbp - {offset}], rax");
            }
            Expr::Unary { op, operand } => {
                self.expr(operand, line)?;
                match op {
                    UnaryOp::Neg => emit!(self, "  neg rax"),
                    UnaryOp::Not => emit!(self, "  not rax"),
                    UnaryOp::LogicalNot => {
                        emit!(self, "  cmp rax, 0");
                        // mov keeps the flags that xor would clobber
                        emit!(self, "  mov rax, 0");
                        emit!(self, "  sete al");
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                self.expr(left, line)?;
                self.push();
                self.expr(right, line)?;
                // left operand in rcx, right operand in rax
                self.pop("rcx");
                self.binary(*op, line);
            }
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, line: u32) {
        match op {
            BinaryOp::Add => emit!(self, "  add rax, rcx"),
            BinaryOp::Sub => {
                emit!(self, "  sub rcx, rax");
                emit!(self, "  mov rax, rcx");
            }
            BinaryOp::Mul => self.multiply(),
            BinaryOp::Div | BinaryOp::Mod => {
                emit!(self, "  mov r8, rax");
                emit!(self, "  mov rax, rcx");
                emit!(self, "  cqo");
                emit!(self, "  idiv r8");
                if op == BinaryOp::Mod {
                    emit!(self, "  mov rax, rdx");
                }
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                emit!(self, "  cmp rcx, 0");
                emit!(self, "  setne dl");
                emit!(self, "  cmp rax, 0");
                emit!(self, "  mov rax, 0");
                emit!(self, "  setne al");
                if op == BinaryOp::LogicalAnd {
                    emit!(self, "  and al, dl");
                } else {
                    emit!(self, "  or al, dl");
                }
            }
            BinaryOp::BitAnd | BinaryOp::BitOr => {
                warn!(line, ?op, "bitwise operators are not lowered, keeping the right operand");
            }
            BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte
            | BinaryOp::Eq
            | BinaryOp::Ne => {
                let cc = match op {
                    BinaryOp::Lt => "l",
                    BinaryOp::Lte => "le",
                    BinaryOp::Gt => "g",
                    BinaryOp::Gte => "ge",
                    BinaryOp::Eq => "e",
                    _ => "ne",
                };
                emit!(self, "  cmp rcx, rax");
                emit!(self, "  mov rax, 0");
                emit!(self, "  set{cc} al");
            }
        }
    }

    /// `rcx * rax` into rax. Negative operands go through `imul`; otherwise
    /// the product is built by shift-and-add, starting from the least
    /// significant bit of the multiplier.
    fn multiply(&mut self) {
        let label = self.next_label();

        emit!(self, "  test rax, rax");
        emit!(self, "  js .signed_mult_{label}");
        emit!(self, "  test rcx, rcx");
        emit!(self, "  js .signed_mult_{label}");

        emit!(self, ".unsigned_mult_{label}:");
        // rdx: multiplier, r8: multiplicand, rax: accumulator
        emit!(self, "  mov rdx, rax");
        emit!(self, "  xor rax, rax");
        emit!(self, "  mov r8, rcx");
        emit!(self, ".mult_loop_{label}:");
        emit!(self, "  cmp rdx, 0");
        emit!(self, "  je .after_mult_{label}");
        emit!(self, "  mov r11, rdx");
        emit!(self, "  and r11, 1");
        emit!(self, "  cmp r11, 0");
        emit!(self, "  je .loop_end_{label}");
        emit!(self, "  add rax, r8");
        emit!(self, ".loop_end_{label}:");
        emit!(self, "  shl r8, 1");
        emit!(self, "  shr rdx, 1");
        emit!(self, "  jmp .mult_loop_{label}");

        emit!(self, ".signed_mult_{label}:");
        emit!(self, "  imul rax, rcx");
        emit!(self, ".after_mult_{label}:");
    }

    fn push(&mut self) {
        emit!(self, "  push rax");
        self.table.push();
    }

    fn pop(&mut self, reg: &str) {
        emit!(self, "  pop {reg}");
        self.table.pop();
    }

    fn offset_of(&self, name: &str, line: u32) -> Result<i64, GenError> {
        match self.table.lookup(name) {
            Some(sym) => Ok(sym.offset),
            None => UndefinedReferenceSnafu { line, name }.fail(),
        }
    }

    fn enclosing_loop(&self, line: u32, keyword: &'static str) -> Result<u32, GenError> {
        if self.loop_label == 0 {
            return NotInLoopSnafu { line, keyword }.fail();
        }
        Ok(self.loop_label)
    }

    fn next_label(&mut self) -> u32 {
        let label = self.label;
        self.label += 1;
        trace!(label, "allocated label");
        label
    }

    fn peek(&self) -> Option<&'a StmtNode> {
        self.stmts.get(self.cursor)
    }

    fn next(&mut self) {
        self.cursor += 1;
    }

    fn prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }
}
