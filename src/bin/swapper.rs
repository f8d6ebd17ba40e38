//! `handoff-swapper`: replaces an installed application after it exits.
//!
//! Usage: `handoff-swapper <install_dir> <stage_dir>`
//!
//! Exit codes: `0` swapped, `1` fatal error (see `<stage_dir>/update_log.txt`),
//! `2` usage error. Diagnostics go to stderr only.

use handoff::layout::InstallLayout;
use handoff::logging::{self, LogOptions};
use handoff::swapper::launch::DetachedLauncher;

fn main() {
    let _guard = logging::init(&LogOptions::default());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "handoff-swapper starting");

    let code = handoff::swapper::run_from_args(
        std::env::args_os().skip(1),
        InstallLayout::default(),
        &DetachedLauncher::default(),
    );
    std::process::exit(code);
}
