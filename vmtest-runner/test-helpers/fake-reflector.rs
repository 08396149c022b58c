// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for the reflection helper, used by the integration tests.
//!
//! For a binary at `dir/Name.dll`, prints the contents of `dir/Name.metadata.json`. If that file
//! doesn't exist, prints an error to stderr and exits with code 1.

use std::{env, fs, path::Path, process::exit};

fn main() {
    let args: Vec<String> = env::args().collect();
    let Some(binary) = args.last().filter(|_| args.len() > 1) else {
        eprintln!("[fake-reflector] usage: fake-reflector [ARGS...] <BINARY>");
        exit(2);
    };

    let metadata_path = Path::new(binary).with_extension("metadata.json");
    match fs::read_to_string(&metadata_path) {
        Ok(contents) => print!("{contents}"),
        Err(err) => {
            eprintln!(
                "[fake-reflector] cannot read {}: {err}",
                metadata_path.display()
            );
            exit(1);
        }
    }
}
