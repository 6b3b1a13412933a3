use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drivesweep::{
    BatchConfig, BatchOrchestrator, BatchReport, DeviceId, DeviceInventory, DeviceOutcome,
    TaskKind,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "drivesweep")]
#[command(about = "Batch secure wiping and bad-block scanning for block devices")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory that receives the per-device log files
    #[arg(
        long,
        global = true,
        default_value = "log-files",
        env = "DRIVESWEEP_LOG_DIR"
    )]
    log_dir: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Answer every confirmation prompt affirmatively
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Skip the root and mounted-device safety checks (DANGEROUS!)
    #[arg(long, global = true)]
    force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate disks with size, serial and mountpoint
    List,

    /// Overwrite the given devices, all in parallel, logging each run
    Wipe {
        /// Device names (e.g. sda or /dev/sda)
        devices: Vec<DeviceId>,

        /// Overwrite passes handed to the wipe tool
        #[arg(long, default_value_t = 10)]
        passes: u32,
    },

    /// Check the given devices for bad blocks, all in parallel
    Scan {
        /// Device names (e.g. sda or /dev/sda)
        devices: Vec<DeviceId>,
    },

    /// Wipe every device, then scan every device
    WipeScan {
        /// Device names (e.g. sda or /dev/sda)
        devices: Vec<DeviceId>,

        /// Overwrite passes handed to the wipe tool
        #[arg(long, default_value_t = 10)]
        passes: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug);

    match &cli.command {
        Commands::List => list_devices()?,
        Commands::Wipe { devices, passes } => {
            run_single_batch(&cli, devices, TaskKind::Wipe, *passes).await?;
        }
        Commands::Scan { devices } => {
            run_single_batch(&cli, devices, TaskKind::Scan, 10).await?;
        }
        Commands::WipeScan { devices, passes } => {
            run_wipe_then_scan(&cli, devices, *passes).await?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn list_devices() -> Result<()> {
    println!("Detecting disks...");
    let devices = DeviceInventory::detect()?;

    if devices.is_empty() {
        println!("No disks detected.");
        return Ok(());
    }

    println!();
    println!(
        "{:<12} {:<10} {:<24} {:<12}",
        "Device", "Size", "Serial", "Mounted"
    );
    println!("{}", "-".repeat(60));

    for device in devices {
        let size_gb = device.size_bytes / (1024 * 1024 * 1024);
        println!(
            "{:<12} {:<10} {:<24} {:<12}",
            device.name,
            format!("{} GB", size_gb),
            device.serial.as_deref().unwrap_or("-"),
            device.mountpoint.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

async fn run_single_batch(
    cli: &Cli,
    devices: &[DeviceId],
    kind: TaskKind,
    passes: u32,
) -> Result<()> {
    if devices.is_empty() {
        println!("No devices selected.");
        return Ok(());
    }

    check_safety(cli, devices, kind.is_destructive())?;
    if !confirm(cli, devices, kind.label(), kind.is_destructive())? {
        println!("Operation cancelled.");
        return Ok(());
    }

    let orchestrator = prepare_orchestrator(cli, passes)?;
    let report = orchestrator.run(devices, kind).await;
    print_summary(&report);

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_wipe_then_scan(cli: &Cli, devices: &[DeviceId], passes: u32) -> Result<()> {
    if devices.is_empty() {
        println!("No devices selected.");
        return Ok(());
    }

    check_safety(cli, devices, true)?;
    if !confirm(cli, devices, "wipe and then scan", true)? {
        println!("Operation cancelled.");
        return Ok(());
    }

    let orchestrator = prepare_orchestrator(cli, passes)?;
    let (wipe, scan) = orchestrator.run_wipe_then_scan(devices).await;
    print_summary(&wipe);
    print_summary(&scan);

    if !wipe.all_succeeded() || !scan.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn prepare_orchestrator(cli: &Cli, passes: u32) -> Result<BatchOrchestrator> {
    let config = BatchConfig {
        log_dir: cli.log_dir.clone(),
        wipe_passes: passes,
        ..BatchConfig::default()
    };

    // The log directory must exist before the first commit.
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;

    Ok(BatchOrchestrator::new(config))
}

fn check_safety(cli: &Cli, devices: &[DeviceId], destructive: bool) -> Result<()> {
    if cli.force {
        return Ok(());
    }

    if !is_root() {
        eprintln!("Error: this program requires root privileges to open block devices.");
        eprintln!("Run with sudo, or pass --force to override.");
        std::process::exit(1);
    }

    if destructive {
        for device in devices {
            if DeviceInventory::is_mounted(device)? {
                eprintln!("Error: /dev/{} is currently mounted.", device);
                eprintln!("Unmount it before wiping, or pass --force to override.");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Show the target list and ask for explicit confirmation. Nothing runs
/// unless the answer is affirmative; `--yes` stands in for it.
fn confirm(cli: &Cli, devices: &[DeviceId], action: &str, destructive: bool) -> Result<bool> {
    if cli.yes {
        return Ok(true);
    }

    let inventory = match DeviceInventory::detect() {
        Ok(list) => list,
        Err(err) => {
            log::warn!("device inventory unavailable: {}", err);
            Vec::new()
        }
    };

    println!("\nThis will {} the following devices:", action);
    for device in devices {
        match inventory.iter().find(|d| d.name == device.as_str()) {
            Some(info) => {
                let size_gb = info.size_bytes / (1024 * 1024 * 1024);
                println!(
                    "  - /dev/{} ({} GB, serial {})",
                    device,
                    size_gb,
                    info.serial.as_deref().unwrap_or("unknown")
                );
            }
            None => println!("  - /dev/{} (not in the current inventory)", device),
        }
    }

    if destructive {
        println!("\n⚠️  WARNING: This action is IRREVERSIBLE!");
        print!("Type 'YES' to confirm: ");
    } else {
        print!("Continue? [y/N]: ");
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(confirmation_accepted(&input, destructive))
}

/// Decide whether typed input authorizes the action. Destructive actions
/// demand the exact token `YES`; scans accept `y`/`yes` in any case.
/// Anything else is a refusal.
fn confirmation_accepted(input: &str, destructive: bool) -> bool {
    let answer = input.trim();
    if destructive {
        answer == "YES"
    } else {
        let lower = answer.to_lowercase();
        lower == "y" || lower == "yes"
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n{}", "=".repeat(60));
    println!(
        "{} SUMMARY (batch {})",
        report.kind.label().to_uppercase(),
        report.batch_id
    );
    println!("{}", "=".repeat(60));
    println!(
        "Started:  {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Duration: {}", human(report.duration));

    for entry in &report.reports {
        match &entry.outcome {
            DeviceOutcome::Success { log_path, .. } => {
                println!(
                    "  ✓ /dev/{:<10} completed in {} -> {}",
                    entry.device.to_string(),
                    human(entry.duration),
                    log_path.display()
                );
            }
            DeviceOutcome::RuntimeFailure { status, log_path } => {
                println!(
                    "  ✗ /dev/{:<10} tool failed ({}) -> {}",
                    entry.device.to_string(),
                    status,
                    log_path.display()
                );
            }
            DeviceOutcome::LaunchError(err) => {
                println!(
                    "  ✗ /dev/{:<10} could not start: {}",
                    entry.device.to_string(),
                    err
                );
            }
            DeviceOutcome::CommitError {
                error,
                scratch_path,
                ..
            } => {
                println!(
                    "  ✗ /dev/{:<10} log not persisted: {}",
                    entry.device.to_string(),
                    error
                );
                if let Some(path) = scratch_path {
                    println!("      captured output preserved at {}", path.display());
                }
            }
        }
    }

    println!(
        "Total: {}   Succeeded: {}   Failed: {}",
        report.reports.len(),
        report.successes(),
        report.failures()
    );
}

fn human(duration: Duration) -> String {
    // Trim to milliseconds; nanosecond noise helps nobody here.
    humantime::format_duration(Duration::from_millis(duration.as_millis() as u64)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== CONFIRMATION GATING ====================

    #[test]
    fn test_destructive_confirmation_requires_exact_yes() {
        assert!(confirmation_accepted("YES\n", true));
        assert!(confirmation_accepted("  YES  \n", true));

        assert!(!confirmation_accepted("yes\n", true));
        assert!(!confirmation_accepted("y\n", true));
        assert!(!confirmation_accepted("Y\n", true));
        assert!(!confirmation_accepted("YES!\n", true));
        assert!(!confirmation_accepted("\n", true));
        assert!(!confirmation_accepted("", true));
        assert!(!confirmation_accepted("n\n", true));
    }

    #[test]
    fn test_scan_confirmation_accepts_y_and_yes_any_case() {
        assert!(confirmation_accepted("y\n", false));
        assert!(confirmation_accepted("Y\n", false));
        assert!(confirmation_accepted("yes\n", false));
        assert!(confirmation_accepted("YES\n", false));
        assert!(confirmation_accepted("  yes  \n", false));

        assert!(!confirmation_accepted("\n", false));
        assert!(!confirmation_accepted("", false));
        assert!(!confirmation_accepted("n\n", false));
        assert!(!confirmation_accepted("no\n", false));
        assert!(!confirmation_accepted("yeah\n", false));
    }
}
