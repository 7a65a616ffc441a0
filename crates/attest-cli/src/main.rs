use attest_cli::input::Input;
use attest_cli::runner::Runner;
use clap::{value_parser, Arg, Command, ValueHint};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("ATTEST_LOG", "error,attest=info"))
        .init();

    let matches = Command::new("attest")
        .version(clap::crate_version!())
        .about("Aggregate protein/peptide/PSM evidence for one assay and persist it idempotently")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to job parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("restore")
                .long("restore")
                .action(clap::ArgAction::SetTrue)
                .help(
                    "Replay backup files into the document store instead of \
                     running the analysis. Scope narrows with --project/--assay.",
                ),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Restrict --restore to one project's backup directory"),
        )
        .arg(
            Arg::new("assay")
                .long("assay")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .requires("project")
                .help("Restrict --restore to one assay's backup files"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_parser(value_parser!(u16).range(1..))
                .help("Size of the worker pool for spectrum resolution (default = # of CPUs)"),
        )
        .get_matches();

    let threads = matches
        .get_one::<u16>("threads")
        .copied()
        .unwrap_or_else(|| num_cpus::get() as u16) as usize;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .expect("configure rayon pool");

    let parameters = matches
        .get_one::<String>("parameters")
        .expect("required argument");
    let runner = Input::load(parameters).and_then(Input::build).map(Runner::new)?;

    if matches.get_flag("restore") {
        runner.run_restore(
            matches.get_one::<String>("project").map(String::as_str),
            matches.get_one::<String>("assay").map(String::as_str),
        )
    } else {
        runner.run_analysis()
    }
}
