use std::{env, fs, process::ExitCode, time::Instant};

use skink::{Context, JsValue};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    // `skink -e 'code'` evaluates inline; `skink file.js` runs a file.
    let (code, source_name) = if args.len() > 2 && args[1] == "-e" {
        (args[2].clone(), "<eval>".to_owned())
    } else if args.len() > 1 {
        match fs::read_to_string(&args[1]) {
            Ok(code) => (code, args[1].clone()),
            Err(err) => {
                eprintln!("error: cannot read {}: {err}", args[1]);
                return ExitCode::FAILURE;
            }
        }
    } else {
        eprintln!("usage: skink <file.js> | skink -e <code>");
        return ExitCode::FAILURE;
    };

    let mut cx = Context::enter();
    let scope = cx.init_standard_objects();

    let start = Instant::now();
    match cx.evaluate_string(&scope, &code, &source_name, 1) {
        Ok(value) => {
            let elapsed = start.elapsed();
            if !matches!(value, JsValue::Undefined) {
                println!("{value}");
            }
            eprintln!("done in {elapsed:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            let stack = err.render_stack(None, None);
            if !stack.is_empty() {
                eprint!("{stack}");
            }
            ExitCode::FAILURE
        }
    }
}
