//! `wattwatch config`: print the effective configuration.

use std::path::Path;

use super::{EXIT_FAILURE, EXIT_OK, Overrides, resolve_config};

pub fn run(config_path: Option<&Path>) -> i32 {
    let config = match resolve_config(config_path, Overrides::default()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("{json}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    }
}
