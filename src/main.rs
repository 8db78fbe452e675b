fn main() {
    if let Err(err) = card_import::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
