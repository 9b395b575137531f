//! Build script rendering man pages for the demo binary and each of its
//! subcommands.

use std::{fs, path::Path};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn render(cmd: Command, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf: Vec<u8> = Vec::new();
    Man::new(cmd).render(&mut buf)?;
    fs::write(path, buf)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let out_dir = Path::new("target/generated-man");
    fs::create_dir_all(out_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let page = out_dir.join(format!("streamwire-{}.1", sub.get_name()));
        render(sub.clone(), &page)?;
    }
    render(cmd, &out_dir.join("streamwire.1"))
}
