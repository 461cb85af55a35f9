use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use serde_json::json;
use std::{io::Write, path::Path, sync::Arc};

use tsloader::cli::{self, BuildArgs};
use tsloader::helpers;
use tsloader::resolver::{ResolverSettings, RootLocator};
use tsloader::{Loader, LoaderOptions, ProcessAnalyzerFactory};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}:\n{}", record.level(), record.args()))
        .filter_level(cli.verbose.log_level_filter())
        .target(env_logger::fmt::Target::Stdout)
        .init();

    match cli.command {
        cli::Command::Build(build_args) => {
            let has_errors = build(build_args)?;
            std::process::exit(if has_errors { 1 } else { 0 });
        }
        cli::Command::Config {
            file,
            context,
            config_file_name,
        } => {
            let settings = ResolverSettings {
                config_file_name,
                ..ResolverSettings::default()
            };
            let locator = RootLocator::new(&context.context, settings);
            let root = locator.root_for(&file);
            let options = locator.options_for(&root)?;
            let described = json!({
                "root": root.directory(),
                "descriptor": root.descriptor(),
                "compilerOptions": options,
            });
            println!("{}", serde_json::to_string_pretty(&described)?);
            Ok(())
        }
    }
}

fn build(args: BuildArgs) -> Result<bool> {
    let jobs = args.jobs.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .context("Could not start the compile thread pool")?;

    let options = LoaderOptions {
        warn_only: args.warn_only,
        config_file_name: args.config_file_name,
        config_lookup: !args.no_config_lookup,
        ..LoaderOptions::default()
    };
    let factory = Arc::new(ProcessAnalyzerFactory::new(args.service, args.service_args));
    let loader = Loader::new(Path::new(&args.context.context), options, factory);

    let report = loader.compile_all(&args.files)?;

    if args.emit {
        for file in &report.files {
            if let Ok(output) = &file.output {
                println!(
                    "// {}\n{}",
                    helpers::relative_path(loader.build_context(), &file.file),
                    output.code
                );
            }
        }
    }
    for warning in report.warnings() {
        eprintln!("{}", style(warning).yellow());
    }
    for error in report.errors() {
        eprintln!("{}", style(error).red());
    }

    loader.finish(args.files.iter().cloned());
    Ok(report.has_errors())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<cli::Cli, clap::Error> {
        cli::Cli::try_parse_from(args)
    }

    #[test]
    fn build_collects_files_and_service_args() {
        let cli = parse(&[
            "tsloader",
            "build",
            "a.ts",
            "b.tsx",
            "--service",
            "node",
            "--service-arg",
            "service.js",
            "--service-arg",
            "--stdio",
            "--warn-only",
        ])
        .expect("expected build command");

        match cli.command {
            cli::Command::Build(args) => {
                assert_eq!(args.files.len(), 2);
                assert_eq!(args.service, "node");
                assert_eq!(args.service_args, vec!["service.js", "--stdio"]);
                assert!(args.warn_only);
                assert_eq!(args.config_file_name, "tsconfig.json");
                assert_eq!(args.context.context, Path::new("."));
            }
            other => panic!("expected build command, got {other:?}"),
        }
    }

    #[test]
    fn build_requires_a_service() {
        assert!(parse(&["tsloader", "build", "a.ts"]).is_err());
    }

    #[test]
    fn config_takes_a_file_and_context() {
        let cli = parse(&["tsloader", "-v", "config", "src/a.ts", "--context", "app"]).expect("expected config command");

        match cli.command {
            cli::Command::Config { file, context, .. } => {
                assert_eq!(file, Path::new("src/a.ts"));
                assert_eq!(context.context, Path::new("app"));
            }
            other => panic!("expected config command, got {other:?}"),
        }
    }
}
