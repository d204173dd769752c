fn main() {
    if let Err(err) = colscan::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
