fn main() {
    if let Err(err) = tally_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
