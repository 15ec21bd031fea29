/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};

const ARGS_VERSION: &str = "version";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_CONFIG_FILE: &str = "config-file";
const ARGS_TEST_CONFIG: &str = "test-config";

#[derive(Debug, Default)]
pub struct ProcArgs {
    pub verbose_level: u8,
    pub config_file: PathBuf,
    pub test_config: bool,
}

fn build_cli_args() -> Command {
    Command::new(crate::build::PKG_NAME)
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_TEST_CONFIG)
                .help("Load the config file and build all ssl contexts, then exit")
                .action(ArgAction::SetTrue)
                .short('t')
                .long("test-config"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .required_unless_present_any([ARGS_VERSION])
                .short('c')
                .long("config-file"),
        )
}

fn parse_matches(args: &ArgMatches) -> anyhow::Result<Option<ProcArgs>> {
    let mut proc_args = ProcArgs::default();

    if let Some(verbose_level) = args.get_one::<u8>(ARGS_VERBOSE) {
        proc_args.verbose_level = *verbose_level;
    }

    if args.get_flag(ARGS_VERSION) {
        crate::build::print_version(proc_args.verbose_level);
        return Ok(None);
    }
    proc_args.test_config = args.get_flag(ARGS_TEST_CONFIG);

    let Some(config_file) = args.get_one::<PathBuf>(ARGS_CONFIG_FILE) else {
        return Err(anyhow!("no config file given"));
    };
    if !config_file.is_file() {
        return Err(anyhow!(
            "config file {} is not an existing regular file",
            config_file.display()
        ));
    }
    proc_args.config_file = config_file
        .canonicalize()
        .context(format!("invalid config file path {}", config_file.display()))?;

    Ok(Some(proc_args))
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args = build_cli_args().get_matches();
    parse_matches(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        build_cli_args().debug_assert();
    }

    #[test]
    fn config_file_required() {
        assert!(build_cli_args().try_get_matches_from(["tlsterm"]).is_err());
        assert!(
            build_cli_args()
                .try_get_matches_from(["tlsterm", "-V"])
                .is_ok()
        );
    }

    #[test]
    fn parse_args() {
        let path = std::env::temp_dir().join(format!("tlsterm_opts_{}.yaml", std::process::id()));
        std::fs::write(&path, "listeners: []\n").unwrap();

        let path_s = path.display().to_string();
        let m = build_cli_args()
            .try_get_matches_from(["tlsterm", "-vv", "-t", "-c", path_s.as_str()])
            .unwrap();
        let args = parse_matches(&m).unwrap().unwrap();
        assert_eq!(args.verbose_level, 2);
        assert!(args.test_config);
        assert!(args.config_file.is_absolute());

        let m = build_cli_args()
            .try_get_matches_from(["tlsterm", "-c", "/no/such/tlsterm.yaml"])
            .unwrap();
        assert!(parse_matches(&m).is_err());

        let _ = std::fs::remove_file(&path);
    }
}
