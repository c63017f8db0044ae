use anyhow::Result;

fn main() -> Result<()> {
    guidfix_cli::main_entry()
}
