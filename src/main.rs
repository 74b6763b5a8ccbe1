use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

use anyhow::Context;
use tracing::info;

use moboggle::app::{self, AppContext};
use moboggle::network::identity::default_name;
use moboggle::network::DeviceIdentity;
use moboggle::{config, debug};

/// Parsed command line
struct Args {
    debug: bool,
    name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args);

    debug::init(options.debug).context("failed to start debug log")?;
    info!("MoBoggle starting");

    let config_path = config::get_config_path();
    let config = config::load_config().context("failed to load config")?;
    let name = options
        .name
        .or_else(|| Some(config.player.name.clone()).filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(default_name);
    let identity = DeviceIdentity::detect(name);
    info!("Playing as {} ({})", identity.name, identity.id);

    let ctx = AppContext::new(config, Some(config_path), identity)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app::run(&mut terminal, &ctx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result.context("terminal error")
}

/// Parse command line flags
fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args {
        debug: false,
        name: None,
    };
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--debug" | "-d" => parsed.debug = true,
            "--name" | "-n" => match rest.next() {
                Some(name) if !name.trim().is_empty() => parsed.name = Some(name.clone()),
                _ => {
                    eprintln!("Error: --name requires a value");
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }
    parsed
}

fn print_usage(program: &str) {
    println!("MoBoggle - word game for one or two players in the terminal");
    println!();
    println!("Usage:");
    println!("  {} [--debug] [--name <NAME>]", program);
    println!();
    println!("Options:");
    println!("  -d, --debug         Log to {}", debug::LOG_FILE_PATH);
    println!("  -n, --name <NAME>   Player name for this run");
    println!("  -h, --help          Show this help");
    println!();
    println!("Settings live in {}", config::get_config_path().display());
}
