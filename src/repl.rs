//! Interactive read-eval-print loop with rustyline.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::interpreter::Interpreter;
use crate::value::Value;
use crate::{Error, ParseErrorKind};

const HISTORY_FILE: &str = "schemexp_history.txt";

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("schemexp - a minimal Scheme core interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for commands, :quit or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut interp = Interpreter::new();

    // Load history if it exists.
    let _ = rl.load_history(HISTORY_FILE);

    // Accumulates continuation lines while the input is a well-formed
    // prefix (unclosed parens, unterminated string).
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "schemexp> "
        } else {
            "     ...> "
        };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if pending.is_empty() {
                    match line {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&interp);
                            continue;
                        }
                        ":gc" => {
                            interp.collect_garbage(&[]);
                            let stats = interp.heap().stats();
                            println!(
                                "collected; live: {} pairs, {} frames, {} procedures",
                                stats.live_pairs, stats.live_frames, stats.live_lambdas
                            );
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                rl.add_history_entry(line)?;

                pending.push_str(line);
                pending.push('\n');

                match interp.eval_str(&pending) {
                    Ok(result) => {
                        pending.clear();
                        println!("{}", interp.render(&result));
                    }
                    Err(Error::ParseError(e)) if e.kind == ParseErrorKind::Incomplete => {
                        // Keep reading; the expression continues on the
                        // next line.
                    }
                    Err(e) => {
                        pending.clear();
                        println!("Error: {e}");
                    }
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    // Save history.
    let _ = rl.save_history(HISTORY_FILE);

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :gc        - Collect garbage and show heap statistics");
    println!("  :quit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms: quote set! define if lambda begin");
    println!("Examples:");
    println!("  (define (fib n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))");
    println!("  (fib 10)");
    println!("  (car (cons 1 '(2 3)))");
    println!();
}

fn print_environment(interp: &Interpreter) {
    let bindings = interp
        .global_environment()
        .visible_bindings(interp.heap());

    let mut primitives = Vec::new();
    let mut user_defined = Vec::new();
    for (name, value) in bindings {
        match value {
            Value::Primitive(_) => primitives.push(name),
            other => user_defined.push((name, other)),
        }
    }

    if !primitives.is_empty() {
        println!("Primitives ({}):", primitives.len());
        let mut col = 0;
        for name in primitives {
            print!("  {name:<12}");
            col += 1;
            if col % 5 == 0 {
                println!();
            }
        }
        if col % 5 != 0 {
            println!();
        }
        println!();
    }

    if user_defined.is_empty() {
        println!("No user-defined bindings.");
    } else {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {}", interp.render(&value));
        }
    }
}
