/*
 * SPDX-FileCopyrightText: 2024 Tommaso Fontana
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use clap::Parser;
use graphclust::cli::{self, Cli};

pub fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli::init_env_logger(cli.verbose) {
        eprintln!("could not initialize the logger: {e:#}");
        std::process::exit(-1);
    }
    if let Err(e) = cli::main(cli) {
        log::error!("{e:#}");
        std::process::exit(-1);
    }
}
