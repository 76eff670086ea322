//! CLI probe for `scm_core`.
//!
//! Prints linkage and schema metadata. An optional first argument names a
//! JSON config file whose database is opened and migrated.

use scm_core::config::CoreConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("scm_core ping={}", scm_core::ping());
    println!("scm_core version={}", scm_core::core_version());
    println!(
        "scm_core schema_version={}",
        scm_core::db::migrations::latest_version()
    );

    let Some(config_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let opened = std::fs::read_to_string(&config_path)
        .map_err(|err| format!("cannot read `{config_path}`: {err}"))
        .and_then(|raw| CoreConfig::from_json_str(&raw).map_err(|err| err.to_string()))
        .and_then(|config| {
            config.init_logging().map_err(|err| err.to_string())?;
            config.open_database().map_err(|err| err.to_string())?;
            Ok(config)
        });

    match opened {
        Ok(config) => {
            println!("scm_core pipe_guard={:?}", config.pipe_guard);
            println!("scm_core database=ready");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("scm_core config error: {err}");
            ExitCode::FAILURE
        }
    }
}
