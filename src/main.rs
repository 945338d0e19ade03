fn main() {
    if handle_cli_flags() {
        return;
    }

    if let Err(err) = redinsight::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("RedInsight {}", redinsight::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "RedInsight - Browse Reddit through a local JSON proxy.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n\nEnvironment:\n  PORT                 Listen port (default 3000)\n  REDINSIGHT_CONFIG    Path to a YAML config file\n  REDINSIGHT_LOG       Log filter directives (falls back to RUST_LOG)"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
