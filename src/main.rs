use anyhow::Result;
use divenet::cli::{parse_args, setup_logging, Cli};
use divenet::pipeline::Pipeline;
use divenet::TrainBackend;
use tracing::{error, info, warn};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", divenet::info());

    if let Err(e) = run(cli) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    config.log();

    let report = Pipeline::<TrainBackend>::new(config, Default::default()).run()?;

    info!("\n=== Cross-validation Results ===");
    for window in &report.windows {
        let summary = &window.summary;
        info!(
            "Window {:>4}: accuracy {:.4}, AUC {:.4}, sensitivity {:.4}, specificity {:.4}",
            summary.window, summary.means[0], summary.means[1], summary.means[3], summary.means[4]
        );
        if !window.failed_subjects.is_empty() {
            warn!(
                "Window {}: {} fold(s) left out: {:?}",
                summary.window,
                window.failed_subjects.len(),
                window.failed_subjects
            );
        }
    }
    info!("Summary saved to: {:?}", report.summary_path);

    Ok(())
}
