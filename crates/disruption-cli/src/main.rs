use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use disruption_classifiers::config::PipelineConfig;
use disruption_classifiers::error::PipelineError;
use disruption_cli::train::input::TrainConfig;
use disruption_cli::train::output::write_summary;
use disruption_cli::train::run_training;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("DISRUPT_LOG", "error,disrupt=info"))
        .init();

    let matches = Command::new("disrupt")
        .version(clap::crate_version!())
        .about("Plasma disruption classifier: train, evaluate and explain")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a boosted-tree disruption classifier on a labeled CSV/TSV dataset")
                .arg(
                    Arg::new("data")
                        .help("Path to the labeled dataset (*.csv or *.tsv)")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to the pipeline JSON configuration file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path of the JSON run report. Defaults to disruption_report.json.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Override the random seed from the configuration file.")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("folds")
                        .long("folds")
                        .help("Override the number of cross-validation folds.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("model_type")
                        .long("model-type")
                        .help("Override the model type from the JSON config.")
                        .value_parser(["boosted_trees", "gbdt"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("label_column")
                        .long("label-column")
                        .help("Name of the 0/1 label column in the dataset.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("no_explain")
                        .long("no-explain")
                        .help("Skip per-sample feature attributions.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("config").about("Print the default pipeline configuration as JSON"))
        .get_matches();

    match matches.subcommand() {
        Some(("train", train_matches)) => handle_train(train_matches),
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let params = TrainConfig::from_arguments(matches)?;
    log::info!("[Disruption::Train] Training on {:?}", params.data);

    match run_training(&params) {
        Ok(report) => {
            write_summary(&report, &mut std::io::stdout())?;
            Ok(())
        }
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline_error) => log::error!(
                    "Training failed in {}: {:#}",
                    pipeline_error.component(),
                    e
                ),
                None => log::error!("Training failed: {:#}", e),
            }
            std::process::exit(1)
        }
    }
}
