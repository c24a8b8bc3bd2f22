use std::{env, fs, process};

use schemexp::{repl, Interpreter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        return repl::run();
    }

    let mut interp = Interpreter::new();
    for path in &paths {
        let source = fs::read_to_string(path)?;
        match interp.run_program(&source) {
            Ok(value) => println!("{}", interp.render(&value)),
            Err(e) => {
                eprintln!("{path}: {e}");
                process::exit(1);
            }
        }
    }
    Ok(())
}
