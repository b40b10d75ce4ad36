fn main() {
    if let Err(err) = tabpipe::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
