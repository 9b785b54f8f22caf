use std::{
    fs,
    io::{self, Read},
    num::NonZeroUsize,
    path::Path,
    process::ExitCode,
};

use mermaid_cache::{
    application::{
        error::AppError,
        render::{MermaidCliRenderer, render_cached},
    },
    cache::{CacheConfig, DiagramCache},
    config::{self, Command},
    infra::{error::InfraError, storage::FileStorage, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if error.is_reportable() {
                report_application_error(&error);
            }
            ExitCode::from(error.exit_status())
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let storage = FileStorage::open(
        &settings.storage.session_file,
        settings.storage.max_bytes.map(NonZeroUsize::get),
    )
    .map_err(InfraError::from)?;
    let cache = DiagramCache::new(storage, CacheConfig::from(&settings.cache));

    match cli_args.command {
        Command::Render(args) => {
            let source = read_source(&args.file)?;
            let renderer = MermaidCliRenderer::new(settings.render.mermaid_cli_path.clone());
            let rendered = render_cached(&cache, &renderer, &source).await?;
            info!(
                target = "mermaid_cache::render",
                from_cache = rendered.from_cache,
                svg_bytes = rendered.svg.len(),
                "Diagram ready"
            );
            println!("{}", rendered.svg);
            Ok(())
        }
        Command::Get(args) => {
            let source = read_source(&args.file)?;
            let svg = cache.get(&source).ok_or(AppError::NotFound)?;
            println!("{svg}");
            Ok(())
        }
        Command::Key(args) => {
            let source = read_source(&args.file)?;
            println!("{}", cache.key_for(&source));
            Ok(())
        }
        Command::Clear(_) => {
            cache.clear_all();
            info!(
                target = "mermaid_cache::clear",
                session_file = %settings.storage.session_file.display(),
                "Diagram cache cleared"
            );
            Ok(())
        }
        Command::Prune(_) => {
            let removed = cache.purge_expired();
            info!(
                target = "mermaid_cache::prune",
                removed,
                session_file = %settings.storage.session_file.display(),
                "Stale diagram cache entries pruned"
            );
            println!("{removed}");
            Ok(())
        }
    }
}

/// Read diagram source from `path`, or from standard input when `path` is `-`.
fn read_source(path: &Path) -> Result<String, InfraError> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        return Ok(source);
    }
    Ok(fs::read_to_string(path)?)
}
