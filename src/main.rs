fn main() {
    if let Err(err) = bluechat::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
