fn main() {
    if let Err(e) = molt::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
