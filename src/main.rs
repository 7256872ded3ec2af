//! Interactive REPL: one parse-read-evaluate-print cycle per input line.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;

use qlisp::eval_source;
use qlisp::evaluator::Session;

fn main() {
    println!("qlisp {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+C to quit");
    println!();

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Could not initialize line editor: {err}");
            process::exit(1);
        }
    };

    let session = Session::new();

    loop {
        match editor.readline("qlisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                if line == "exit" {
                    break;
                }

                // Exactly one result or one parse error per input line;
                // evaluation errors arrive as printable Error values
                match eval_source(&session, line) {
                    Ok(result) => println!("{result}"),
                    Err(parse_error) => println!("{parse_error}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }
}
