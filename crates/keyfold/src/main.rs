fn main() {
    keyfold_cli::run_main();
}
