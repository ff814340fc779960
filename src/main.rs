fn main() {
    trace_lib::run()
}
