//! Command-line argument parsing for nextprayer

/// Parsed command line flags
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub once: bool,
    pub validate: bool,
    pub json: bool,
    pub alarms: bool,
    pub help: bool,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse flags from an argv-style slice (first element is the program name)
pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--once" => result.once = true,
            "--validate" => result.validate = true,
            "--json" => result.json = true,
            "--alarms" => result.alarms = true,
            "--help" | "-h" => result.help = true,
            _ => {}
        }
    }

    result
}

pub fn print_help() {
    println!("nextprayer - Next prayer countdown\n");
    println!("USAGE:");
    println!("    nextprayer [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once          Show the current prayer state and exit");
    println!("    --alarms        List upcoming prayer notifications and exit");
    println!("    --json          Print JSON instead of text");
    println!("    --validate      Validate configuration and exit");
    println!("    --help, -h      Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    PRAYER_TABLE_PATHS, SETTINGS_PATH, SELECTED_LOCATION, TIME_FORMAT,");
    println!("    USE_AR_NUMS, DARK_MODE, TIMEZONE, FALLBACK_REFRESH_MINS,");
    println!("    FALLBACK_TOLERANCE_MINS (a .env file is read if present)");
}
