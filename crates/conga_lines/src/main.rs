fn main() {
    conga_lines::run();
}
