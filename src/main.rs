// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! `detect`: print the labels of objects found in one image.

use std::process;

fn main() {
    process::exit(detect_invoker::cli::run());
}
