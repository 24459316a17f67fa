fn main() -> anyhow::Result<()> {
    formflow_cli::cli::main()
}
