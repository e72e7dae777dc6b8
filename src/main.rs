use clap::Parser;

fn main() {
    let cli = boardlabel::Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = boardlabel::run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
