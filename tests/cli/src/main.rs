use std::env;
use std::process::ExitCode;

use monomerge::{merge, read, write, MergeConfig};

/// Split `path:index` into its parts. Paths without a numeric suffix are
/// the first font of a file.
fn parse_font(arg: &str) -> (&str, u32) {
    match arg.rsplit_once(':') {
        Some((path, index)) if !path.is_empty() => match index.parse() {
            Ok(index) => (path, index),
            Err(_) => (arg, 0),
        },
        _ => (arg, 0),
    }
}

// Note that this is more of an experimental CLI used for testing.
fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().filter_or(
        env_logger::DEFAULT_FILTER_ENV,
        "info",
    ));

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((output, inputs)) = args.split_last().filter(|(_, inputs)| !inputs.is_empty())
    else {
        eprintln!("usage: cli <anchor> <donor>[:index] ... <output>");
        return ExitCode::FAILURE;
    };

    let run = || -> monomerge::Result<()> {
        let mut fonts = vec![];
        for arg in inputs {
            let (path, index) = parse_font(arg);
            fonts.push(read(path, index)?);
        }

        let mut config = MergeConfig::default();
        config.metadata.family = env::var("MONOMERGE_FAMILY").ok();
        config.metadata.version = env::var("MONOMERGE_VERSION").ok();

        let merged = merge(&config, fonts)?;
        write(&merged.font, output)
    };

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
