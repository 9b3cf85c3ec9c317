use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    // Document the library crates only. xtask is tooling; the firmware
    // crate's hardware modules need the thumbv7em target, but its
    // host-visible modules (player, stations) come in via --workspace.
    let mut cmd = Command::new("cargo");
    cmd.args([
        "doc",
        "--workspace",
        "--exclude",
        "xtask",
        "--no-deps",
        "--document-private-items",
    ]);

    if open {
        cmd.arg("--open");
    }

    let output = cmd.output().context("Failed to build documentation")?;

    if !output.status.success() {
        eprintln!("{}", "✗ Documentation build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Documentation build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Documentation built in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
    );

    if !open {
        println!();
        println!(
            "   {}",
            "Pipeline overview: target/doc/stream/index.html and target/doc/playback/index.html"
                .dimmed()
        );
        println!(
            "   {}",
            "Or run 'cargo run -p xtask -- doc --open'".dimmed()
        );
    }

    println!();

    Ok(())
}
