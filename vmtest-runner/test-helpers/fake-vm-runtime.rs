// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for the VM runtime, used by the integration tests.
//!
//! It records its arguments to `vm-args.txt` and its process ID to `vm-pid.txt` in the working
//! directory, then follows the script in `vm-script.txt`. Each script line is one of:
//!
//! * `out <text>`: print a line to stdout
//! * `err <text>`: print a line to stderr
//! * `sleep <millis>`
//! * `hang`: sleep forever
//! * `ignore-term`: ignore SIGTERM (Unix only)
//! * `exit <code>`

use std::{
    env, fs,
    io::{self, Write},
    process::exit,
    thread,
    time::Duration,
};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    fs::write("vm-args.txt", args.join("\n")).expect("[fake-vm-runtime] writing vm-args.txt");
    fs::write("vm-pid.txt", std::process::id().to_string())
        .expect("[fake-vm-runtime] writing vm-pid.txt");

    let script = match fs::read_to_string("vm-script.txt") {
        Ok(script) => script,
        Err(err) => {
            eprintln!("[fake-vm-runtime] failed to read vm-script.txt: {err}");
            exit(2);
        }
    };

    let mut stdout = io::stdout().lock();
    for line in script.lines() {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "out" => {
                writeln!(stdout, "{rest}").unwrap();
                stdout.flush().unwrap();
            }
            "err" => eprintln!("{rest}"),
            "sleep" => thread::sleep(Duration::from_millis(rest.parse().unwrap())),
            "hang" => loop {
                thread::sleep(Duration::from_secs(60));
            },
            "ignore-term" => ignore_term(),
            "exit" => exit(rest.parse().unwrap()),
            "" => {}
            other => {
                eprintln!("[fake-vm-runtime] unknown script command `{other}`");
                exit(3);
            }
        }
    }
}

#[cfg(unix)]
fn ignore_term() {
    // SAFETY: SIG_IGN is a valid disposition for SIGTERM.
    unsafe {
        libc::signal(libc::SIGTERM, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_term() {}
