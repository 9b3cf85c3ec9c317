use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let run_unit = !integration_only;
    let run_integration = !unit_only;

    // Unit tests: #[cfg(test)] modules across the workspace, on the host.
    if run_unit {
        println!("{}", "  Running unit tests...".cyan());
        let unit_start = Instant::now();

        let unit_output = Command::new("cargo")
            .args(["test", "--lib", "--workspace"])
            .output()
            .context("Failed to run unit tests")?;

        if !unit_output.status.success() {
            eprintln!("{}", "  ✗ Unit tests failed".red().bold());
            eprintln!();
            let output_str = String::from_utf8_lossy(&unit_output.stdout);
            for line in output_str.lines() {
                eprintln!("  {}", line);
            }
            anyhow::bail!("Unit tests failed");
        }

        let output_str = String::from_utf8_lossy(&unit_output.stdout);
        let summary = extract_test_summary(&output_str);

        println!(
            "{}",
            format!(
                "  ✓ Unit tests passed {} in {:.2}s",
                summary,
                unit_start.elapsed().as_secs_f64()
            )
            .green()
        );
        println!();
    }

    // Integration tests: the tests/ directories (Icecast session against a
    // scripted socket, FIFO property tests, underrun stress, player flow).
    if run_integration {
        println!("{}", "  Running integration tests...".cyan());
        let int_start = Instant::now();

        let int_output = Command::new("cargo")
            .args(["test", "--workspace", "--tests"])
            .output()
            .context("Failed to run integration tests")?;

        if !int_output.status.success() {
            eprintln!("{}", "  ✗ Integration tests failed".red().bold());
            eprintln!();
            let output_str = String::from_utf8_lossy(&int_output.stdout);
            for line in output_str.lines() {
                eprintln!("  {}", line);
            }
            anyhow::bail!("Integration tests failed");
        }

        let output_str = String::from_utf8_lossy(&int_output.stdout);
        let summary = extract_test_summary(&output_str);

        println!(
            "{}",
            format!(
                "  ✓ Integration tests passed {} in {:.2}s",
                summary,
                int_start.elapsed().as_secs_f64()
            )
            .green()
        );
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn extract_test_summary(output: &str) -> String {
    // Look for lines like "test result: ok. 5 passed; 0 failed; ..."
    for line in output.lines() {
        if line.contains("test result:") {
            if let Some(summary) = line.split("test result:").nth(1) {
                return summary.trim().to_string();
            }
        }
    }
    "(summary not available)".to_string()
}
