use valkey_bench::app;
use valkey_bench::config::RunConfig;
use valkey_bench::errors::exit;
use valkey_bench::orchestrator;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    let args = app::parse();
    app::init_logging(&args);

    let config = match RunConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(exit::CONFIG_OR_CONNECT);
        }
    };

    std::process::exit(orchestrator::run(config));
}
