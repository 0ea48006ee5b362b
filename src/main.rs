use std::io::{self, BufRead, BufReader, Write};
use std::panic;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{error, info, Level};

use climact::config::AppConfig;
use climact::session::Session;

struct Args {
    config: Option<PathBuf>,
    log_level: Option<Level>,
    script: Option<PathBuf>,
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        log_level: None,
        script: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --config requires an argument");
                    std::process::exit(1);
                }
            }
            "-l" | "--log-level" => {
                if i + 1 < args.len() {
                    parsed.log_level = Some(parse_level(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --log-level requires an argument");
                    std::process::exit(1);
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') && arg != "-" => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
            _ => {
                if args[i] != "-" {
                    parsed.script = Some(PathBuf::from(&args[i]));
                }
                i += 1;
            }
        }
    }

    parsed
}

fn parse_level(s: &str) -> Level {
    match Level::from_str(s) {
        Ok(level) => level,
        Err(_) => {
            eprintln!("Invalid log level: '{}'. Use error, warn, info, debug or trace.", s);
            std::process::exit(1);
        }
    }
}

/// Log panics before the default hook prints them
fn install_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        if let Some(location) = info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                "panic occured"
            );
        } else {
            error!("panic occured");
        }

        if let Some(s) = info.payload().downcast_ref::<&str>() {
            error!(message = %s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            error!(message = %s);
        }

        default_hook(info);
    }));
}

fn print_help() {
    eprintln!("climact - Undo/redo engine for process-flow schematics, driven by scripts");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    climact [OPTIONS] [SCRIPT]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config <FILE>       Read settings from FILE instead of ~/.config/climact/config.toml");
    eprintln!("    -l, --log-level <LEVEL>   Override the configured log level (error, warn, info, debug, trace)");
    eprintln!("    -h, --help                Print this help message");
    eprintln!();
    eprintln!("Commands are read from SCRIPT, or from stdin when no script is given:");
    eprintln!("    vertex <name>               stream <name> <inp|out>");
    eprintln!("    handle <vertex> <inp|out>   connect <handle> <handle>");
    eprintln!("    disconnect <symbol>         delete <target>...");
    eprintln!("    purge <target>              undo | redo | wipe | clear");
    eprintln!("    list | status");
}

fn main() -> io::Result<()> {
    let args = parse_args();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let level = args
        .log_level
        .or_else(|| config.log_level().ok())
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
    info!(max_undo = config.history.max_undo, "Climact started");

    install_panic_hook();

    let mut session = Session::new(&config.history).map_err(|e| {
        error!(error = %e, "Failed to start session");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let input: Box<dyn BufRead> = match &args.script {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|e| {
                error!(error = %e, path = %path.display(), "Failed to open script");
                e
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut stdout = io::stdout().lock();
    for line in input.lines() {
        session.run_line(&line?);
        if session.take_bell() && config.history.bell {
            write!(stdout, "\x07")?;
        }
        if let Some(msg) = session.take_message() {
            writeln!(stdout, "{}", msg)?;
        }
        stdout.flush()?;
    }

    session.close();
    info!("Climact finished");
    Ok(())
}
