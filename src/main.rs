fn main() {
    if let Err(e) = uasmc::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
