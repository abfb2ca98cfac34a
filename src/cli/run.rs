// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::ffi::OsString;
use std::io::{self, Write};

use clap::{CommandFactory, Parser};

use crate::cli::args::Cli;
use crate::cli::logging;
use crate::error::DetectError;
use crate::invoke::{EXIT_FAILURE, EXIT_SUCCESS, Outcome, ResultSink, invoke};
use crate::model::YoloDetector;
use crate::{VERSION, error, section, verbose, warn};

/// Run the invoker on the process arguments and return the exit code.
#[must_use]
pub fn run() -> i32 {
    run_from(std::env::args_os())
}

/// Run the invoker on explicit arguments, printing the result line.
pub fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => return usage_error(&err),
    };
    logging::set_verbose(cli.verbose);

    let outcome = run_detection(&cli);
    if let Outcome::Failed(err) = &outcome
        && logging::is_verbose()
    {
        error!("{err}");
    }

    println!("{}", outcome.line());
    outcome.exit_code()
}

/// `--help` and `--version` print and succeed; anything else is a usage error.
fn usage_error(err: &clap::Error) -> i32 {
    if !err.use_stderr() {
        return print_info(err, &mut io::stdout().lock());
    }

    let usage = Cli::command().render_usage().to_string();
    let reason = err.kind().as_str().unwrap_or("invalid arguments");
    let outcome = Outcome::Failed(DetectError::InvalidArgument(format!("{reason}. {usage}")));

    eprint!("{err}");
    println!("{}", outcome.line());
    outcome.exit_code()
}

/// Write help or version text; a failed write is a failure.
fn print_info(err: &clap::Error, out: &mut impl Write) -> i32 {
    match write!(out, "{}", err.render()).and_then(|()| out.flush()) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("failed to print {}: {e}", err.kind());
            EXIT_FAILURE
        }
    }
}

/// Load the model and process the one image.
fn run_detection(cli: &Cli) -> Outcome {
    section!("detect-invoker {VERSION}");

    let mut detector = match YoloDetector::load_with_config(&cli.model, cli.inference_config()) {
        Ok(detector) => detector,
        Err(err) => return Outcome::Failed(err),
    };
    let metadata = detector.metadata();
    verbose!(
        "Loaded {} ({} classes, imgsz {:?}, stride {})",
        cli.model.display(),
        metadata.num_classes(),
        detector.imgsz(),
        metadata.stride
    );
    if !metadata.description.is_empty() {
        verbose!("{} (exported with Ultralytics {})", metadata.description, metadata.version);
    }

    #[cfg(feature = "annotate")]
    let saver = cli
        .save
        .then(|| crate::io::ResultSaver::new(&cli.save_dir, cli.save_naming()));
    #[cfg(feature = "annotate")]
    let sink = saver.as_ref().map(|saver| saver as &dyn ResultSink);

    #[cfg(not(feature = "annotate"))]
    let sink: Option<&dyn ResultSink> = None;
    #[cfg(not(feature = "annotate"))]
    {
        if cli.save && logging::is_verbose() {
            warn!("--save ignored: built without the 'annotate' feature");
        }
    }

    let report = match invoke(&mut detector, &cli.image, sink) {
        Ok(report) => report,
        Err(err) => return Outcome::Failed(err),
    };

    let (h, w) = report.detections.orig_shape;
    let speed = report.detections.speed;
    verbose!(
        "{} {h}x{w} {}, {:.1}ms",
        cli.image.display(),
        report.detections.summary(),
        speed.total()
    );
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess",
        speed.preprocess,
        speed.inference,
        speed.postprocess
    );

    match report.persisted {
        Some(Ok(path)) => verbose!("Results saved to {}", path.display()),
        Some(Err(err)) if logging::is_verbose() => {
            warn!("{err}");
        }
        _ => {}
    }

    Outcome::Labels(report.labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stdout whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn help_error() -> clap::Error {
        Cli::try_parse_from(["detect", "--help"]).unwrap_err()
    }

    #[test]
    fn test_missing_image_argument() {
        assert_eq!(run_from(["detect"]), EXIT_FAILURE);
    }

    #[test]
    fn test_help_succeeds() {
        assert_eq!(run_from(["detect", "--help"]), EXIT_SUCCESS);
        assert_eq!(run_from(["detect", "--version"]), EXIT_SUCCESS);
    }

    #[test]
    fn test_help_rendered_to_writer() {
        let mut out = Vec::new();
        assert_eq!(print_info(&help_error(), &mut out), EXIT_SUCCESS);
        assert!(String::from_utf8(out).unwrap().contains("Usage"));
    }

    #[test]
    fn test_unwritable_help_fails() {
        assert_eq!(print_info(&help_error(), &mut ClosedPipe), EXIT_FAILURE);
    }

    #[test]
    fn test_huge_imgsz_fails_cleanly() {
        assert_eq!(run_from(["detect", "frame.jpg", "--imgsz", "100000"]), EXIT_FAILURE);
    }

    #[test]
    fn test_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("best.onnx");
        let code = run_from([
            "detect".into(),
            "--model".into(),
            model.into_os_string(),
            "frame.jpg".into(),
        ]);
        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn test_out_of_range_threshold_fails() {
        assert_eq!(run_from(["detect", "frame.jpg", "--conf", "1.5"]), EXIT_FAILURE);
    }
}
