fn main() {
    println!("cargo:rerun-if-changed=src/logger.c");

    // Stable Rust cannot define C-variadic functions, so the FMI 1.0 and 2.0 logger callbacks are
    // implemented in C and forward the formatted message back into Rust.
    cc::Build::new()
        .file("src/logger.c")
        .warnings(true)
        .compile("fmilogger");
}
