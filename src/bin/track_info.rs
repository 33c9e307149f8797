use anyhow::{Context, Result};
use std::path::PathBuf;
use vnect_pose::cache;
use vnect_pose::export::{default_output_dir, TrackExporter, TrackSummary};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(
        args.next()
            .context("usage: track_info <file.cache> [--export [<dir>]]")?,
    );
    let export = args.next().as_deref() == Some("--export");
    let export_dir = args.next().map(PathBuf::from).unwrap_or_else(default_output_dir);

    println!("Reading track {}...\n", path.display());
    let track = cache::load_raw(&path).with_context(|| format!("cannot read {}", path.display()))?;
    let summary = TrackSummary::from_track(&track);

    println!(
        "✓ {} snapshots over {:.2}s ({:.1} fps)",
        summary.frames, summary.duration, summary.rate
    );
    println!("\nMean confidence per joint:");
    for (joint, confidence) in &summary.mean_confidence {
        println!("  {:<20} {:.3}", joint.name(), confidence);
    }

    if export {
        let exporter = TrackExporter::new(&export_dir, None);
        let csv_path = exporter.export_csv(&track)?;
        println!("\n✓ Exported to {}", csv_path.display());
    }
    Ok(())
}
