//! A single-pass compiler for a small C-like language, straight from source
//! text to x86-64 assembly.
//!
//! - `tokenizer` turns source text into tokens, checking bracket balance and
//!   comments on the way.
//! - `parser` builds the flat statement list and its expression trees.
//! - `codegen` walks the statement list with a cursor and emits assembly,
//!   keeping locals in the `symbols` table.

use std::path::{Path, PathBuf};

type P<T> = Box<T>;

pub mod codegen;
pub mod error;
pub mod parser;
pub mod pretty;
pub mod symbols;
pub mod tokenizer;

pub use codegen::*;
pub use error::*;
pub use parser::*;
pub use symbols::*;
pub use tokenizer::*;

/// Runs the whole pipeline over one compilation unit.
pub fn compile(source: &str) -> CompileResult<String> {
    let tokens = tokenize(source)?;
    let program = parse(tokens)?;
    Ok(generate(&program)?)
}

/// `prog.c` -> `prog.s`: the last character of the input path becomes `s`.
pub fn output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_string_lossy().into_owned();
    name.pop();
    name.push('s');
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_replaces_last_char() {
        assert_eq!(output_path(Path::new("prog.c")), PathBuf::from("prog.s"));
        assert_eq!(
            output_path(Path::new("dir/test.c")),
            PathBuf::from("dir/test.s")
        );
    }

    #[test]
    fn errors_keep_their_stage_and_line() {
        let err = compile("int main() {\n  int x = 1 @ 2;\n}").unwrap_err();
        assert!(matches!(err, CompileError::Lex { .. }));
        assert_eq!(err.line(), Some(2));

        let err = compile("int main() {\n  int x = 1\n}").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
        assert_eq!(err.line(), Some(3));

        let err = compile("int main() {\n  int x;\n  break;\n}").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Gen {
                source: GenError::NotInLoop { line: 3, .. }
            }
        ));
        assert_eq!(
            err.to_string(),
            "Line 3: Invalid break statement - not inside loop"
        );
    }

    #[cfg(all(target_arch = "x86_64", target_os = "linux"))]
    mod run {
        use super::*;
        use std::fs;
        use std::process::Command;

        fn have_cc() -> bool {
            Command::new("cc")
                .arg("--version")
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        }

        /// Assembles, links and runs `source`; `None` when no C toolchain is around.
        fn run(name: &str, source: &str) -> Option<(String, i32)> {
            if !have_cc() {
                return None;
            }
            let asm = compile(source).unwrap();
            let dir = std::env::temp_dir().join(format!("smallcc-{}-{name}", std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            let asm_path = dir.join(format!("{name}.s"));
            let exe = dir.join(name);
            fs::write(&asm_path, asm).unwrap();

            let status = Command::new("cc")
                .arg("-no-pie")
                .arg("-o")
                .arg(&exe)
                .arg(&asm_path)
                .status()
                .unwrap();
            assert!(status.success(), "failed to assemble {}", asm_path.display());

            let out = Command::new(&exe).output().unwrap();
            let _ = fs::remove_dir_all(&dir);
            Some((
                String::from_utf8_lossy(&out.stdout).into_owned(),
                out.status.code().unwrap_or(-1),
            ))
        }

        #[test]
        fn prints_product() {
            if let Some((stdout, code)) = run("product", "int main() {\n  int n = 9;\n  print n * 2;\n}") {
                assert_eq!(stdout, "18\n");
                assert_eq!(code, 0);
            }
        }

        #[test]
        fn multiplication_both_paths() {
            let source = "int main() {
                print 6 * 7;
                print -6 * 7;
                print 6 * -7;
                print -6 * -7;
                print 0 * 5;
                print 123 * 0;
                print 1000 * 1000;
                return 0;
            }";
            if let Some((stdout, _)) = run("multiply", source) {
                assert_eq!(stdout, "42\n-42\n-42\n42\n0\n0\n1000000\n");
            }
        }

        #[test]
        fn exit_code_is_return_value() {
            if let Some((_, code)) = run("exit_code", "int main() { int a = 5; return a * 8 + 2; }") {
                assert_eq!(code, 42);
            }
        }

        #[test]
        fn signed_division() {
            let source = "int main() {
                print -7 / 2;
                print -7 % 2;
                print 17 / 5;
                print 17 % 5;
            }";
            if let Some((stdout, _)) = run("division", source) {
                assert_eq!(stdout, "-3\n-1\n3\n2\n");
            }
        }

        #[test]
        fn conditions_and_logic() {
            let source = "int main() {
                int a = 3;
                int b = 0;
                print a > 2 && !b;
                print b || a == 4;
                print ~a;
                if (a != 3) {
                    print 1;
                } else {
                    print 2;
                }
                return 0;
            }";
            if let Some((stdout, _)) = run("logic", source) {
                assert_eq!(stdout, "1\n0\n-4\n2\n");
            }
        }

        #[test]
        fn declaration_inside_loop_body() {
            let source = "int main() {
                int i = 0;
                while (i < 3) {
                    int a = 5;
                    i = i + 1;
                }
                int b = 7;
                print b;
                print i;
                return 0;
            }";
            if let Some((stdout, _)) = run("loop_decl", source) {
                assert_eq!(stdout, "7\n3\n");
            }
        }

        #[test]
        fn declaration_inside_skipped_block() {
            let source = "int main() {
                if (0) {
                    int a = 1;
                }
                int b = 2;
                print 1 + 2;
                print b;
                return 0;
            }";
            if let Some((stdout, _)) = run("skipped_decl", source) {
                assert_eq!(stdout, "3\n2\n");
            }
        }

        #[test]
        fn prints_full_width_values() {
            let source = "int main() {
                print 1000000 * 1000000;
                print -5000000000;
                return 0;
            }";
            if let Some((stdout, _)) = run("wide", source) {
                assert_eq!(stdout, "1000000000000\n-5000000000\n");
            }
        }

        #[test]
        fn sum_of_primes() {
            let source = include_str!("../demos/sum_of_primes.c");
            if let Some((stdout, code)) = run("primes", source) {
                assert_eq!(stdout, "328\n");
                assert_eq!(code, 0);
            }
        }
    }
}
