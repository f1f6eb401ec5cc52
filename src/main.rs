use std::path::PathBuf;

use linkseek::RunOptions;

fn main() {
    let options = match handle_cli_flags() {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = linkseek::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Returns `None` when a flag was handled and the program should exit.
fn handle_cli_flags() -> Result<Option<RunOptions>, String> {
    let mut options = RunOptions::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("linkseek {}", linkseek::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!(
                    "Linkseek - search shared links from the terminal.\n\n  --config <path>      Read configuration from <path>\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                return Ok(None);
            }
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config needs a path".to_string())?;
                options.config_file = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Some(options))
}
