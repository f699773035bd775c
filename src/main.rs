fn main() -> std::process::ExitCode {
    dealscope_lib::run()
}
