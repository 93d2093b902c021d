use anyhow::{Result, anyhow};
use burnr_core::{Device, ImageFile, ImageOptions, OsKind, WriteSession, platform};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "burnr")]
#[command(about = "A safe, interactive raw-image flashing tool", version)]
struct Cli {
    /// Act as this OS instead of probing the host (linux, windows, macos)
    #[arg(long, global = true, value_parser = parse_os)]
    os: Option<OsKind>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_os(s: &str) -> std::result::Result<OsKind, String> {
    s.parse().map_err(|e: burnr_core::Error| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Write an image to a device interactively
    Write {
        /// Image file to write (.iso or .img)
        #[arg(required = true)]
        image: PathBuf,

        /// Write to this device instead of asking
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Accept any file extension, not just .iso/.img
        #[arg(long)]
        any_extension: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// List available removable devices
    List {
        /// Include fixed (non-removable) drives
        #[arg(short, long)]
        all: bool,
    },
}

/// Presents an interactive menu for the user to select a device.
fn select_device(devices: &[Device], prompt: &str) -> Result<Device> {
    if devices.is_empty() {
        return Err(anyhow!("No removable devices found."));
    }

    let items: Vec<String> = devices.iter().map(|d| d.to_string()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;

    Ok(devices[selection].clone())
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let os = OsKind::resolve(cli.os)?;
    debug!("operating as {os}");

    match cli.command {
        Commands::Write {
            image,
            device,
            any_extension,
            yes,
        } => {
            let options = ImageOptions {
                check_extension: !any_extension,
                ..ImageOptions::default()
            };

            // Validate the image before touching any device.
            ImageFile::open_with(&image, options.clone())?;

            let device = match device {
                Some(path) => path,
                None => {
                    let devices = platform::list_devices(os, false)?;
                    select_device(&devices, "Select the target device to WRITE to")?.path
                }
            };

            println!(
                "{} This will erase all data on '{}'.",
                style("WARNING:").red().bold(),
                device.display(),
            );
            println!("  Device: {}", style(device.display()).cyan());
            println!("  Image:  {}", style(image.display()).cyan());
            println!();

            if !yes && !confirm_operation("Are you sure you want to proceed?")? {
                println!("Write operation cancelled.");
                return Ok(());
            }

            println!();

            let session =
                WriteSession::with_os(&device, &image, os).with_image_options(options);
            let progress = session.progress_handle();

            let pb = ProgressBar::new(100);
            pb.set_prefix("Writing");
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {pos:>3}% ({eta})",
                    )
                    .unwrap()
                    .progress_chars("■ "),
            );

            // The session reports progress by being polled, so the write
            // runs on a worker thread while this one drives the bar.
            let writer = thread::spawn(move || {
                let mut session = session;
                session.write_image()
            });
            while !writer.is_finished() {
                pb.set_position(u64::from(progress.percent()));
                thread::sleep(Duration::from_millis(100));
            }
            let result = writer
                .join()
                .map_err(|_| anyhow!("writer thread panicked"))?;

            match result {
                Ok(()) => {
                    pb.set_position(100);
                    pb.finish_with_message("Write complete.");
                    println!(
                        "\n✨ Successfully flashed {} with {}.",
                        style(device.display()).cyan(),
                        style(image.display()).cyan()
                    );
                }
                Err(e) => {
                    // Unblock the terminal before surfacing the error.
                    pb.finish_and_clear();
                    return Err(e.into());
                }
            }
        }
        Commands::List { all } => {
            let devices = platform::list_devices(os, all)?;
            if devices.is_empty() {
                println!("No removable devices found.");
                return Ok(());
            }

            println!("Found {} devices:", devices.len());
            println!(
                "\n  {:<15} {:<20} {:<10} {}",
                "DEVICE", "NAME", "SIZE", "LOCATION"
            );
            println!("  {:-<15} {:-<20} {:-<10} {:-<20}", "", "", "", "");
            for device in devices {
                let name = device
                    .display_name
                    .unwrap_or_else(|| "unknown".to_string());
                let size = device
                    .size_gb
                    .map_or_else(|| "?".to_string(), |gb| format!("{gb:.1} GB"));
                let location = if device.mount_point.is_empty() {
                    "(Not mounted)".to_string()
                } else {
                    device.mount_point
                };
                let kind = if device.removable { "" } else { "  [fixed]" };
                println!(
                    "  {:<15} {:<20} {:>9}  {}{}",
                    device.path.display(),
                    name,
                    size,
                    location,
                    kind
                );
            }
        }
    }

    Ok(())
}
