use colored::Colorize;
use tracing_subscriber::EnvFilter;

use typed_node::cli::CommandLineInterface;

fn main() {
    let command_line_interface = CommandLineInterface::load();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(command_line_interface.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
