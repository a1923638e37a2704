fn main() {
    fire_reduction::cli::run();
}
