use tracing_subscriber::EnvFilter;

use super::args::Args;

/// Install the tracing subscriber.
///
/// With `--log-level OFF` (the default) no sink is installed at all, so
/// disabled call sites pay nothing beyond a branch. When enabled, output
/// goes to stderr; stdout belongs to the CSV/report emitter.
pub fn init_logging(args: &Args) {
    let Some(directive) = args.log_level.directive() else {
        return;
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse().expect("static log directive"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
