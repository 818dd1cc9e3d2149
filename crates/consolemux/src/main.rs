// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use consolemux::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    consolemux::init_tracing(&config);

    if let Err(e) = consolemux::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
