use colored::Colorize;

fn main() {
    if let Err(e) = contextnet::run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
