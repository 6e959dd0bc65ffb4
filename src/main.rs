use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use daoctl::{
    cache::{CacheConfig, CacheLoader, DocumentCache, RebuildError, ResolveError},
    config::{
        self, CacheCommand, Command, DocumentArgs, DocumentsArgs, EdgesArgs, GetCommand, LoadError,
        Settings,
    },
    graph::{Navigator, PageBuilder, PageError},
    infra::{chain::ChainSource, error::InfraError, telemetry},
    prompt::{self, Selection},
    remote::{RemoteError, RemoteSource},
    render,
    types::DocumentHash,
};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("cache rebuild failed: {0}")]
    Rebuild(#[from] RebuildError),
    #[error("cannot get last document: {0}")]
    LastDocument(#[source] RemoteError),
    #[error("cannot load edges of {hash}: {source}")]
    Edges {
        hash: DocumentHash,
        #[source]
        source: RemoteError,
    },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

struct Context {
    settings: Settings,
    remote: Arc<dyn RemoteSource>,
    loader: Arc<CacheLoader>,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &CliError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "command failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "command failed");
    });
}

async fn run() -> Result<(), CliError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let remote: Arc<dyn RemoteSource> = Arc::new(ChainSource::new(&settings.chain)?);
    let loader = Arc::new(CacheLoader::new(
        Arc::clone(&remote),
        CacheConfig::from(&settings.cache),
    ));
    let ctx = Context {
        settings,
        remote,
        loader,
    };

    match cli_args.command {
        Command::Get(args) => match args.command {
            GetCommand::Document(args) => run_get_document(&ctx, args).await,
            GetCommand::Documents(args) => run_get_documents(&ctx, args).await,
            GetCommand::Edges(args) => run_get_edges(&ctx, args).await,
        },
        Command::Cache(args) => match args.command {
            CacheCommand::Rebuild => run_cache_rebuild(&ctx).await,
            CacheCommand::Status => run_cache_status(&ctx),
        },
    }
}

async fn run_get_document(ctx: &Context, args: DocumentArgs) -> Result<(), CliError> {
    let key = match args.hash {
        Some(hash) => hash,
        None => ctx
            .remote
            .fetch_last_document()
            .await
            .map_err(CliError::LastDocument)?
            .hash
            .to_string(),
    };

    if args.json {
        let document = ctx.loader.resolve(&key).await?;
        render::write_json(&mut io::stdout().lock(), &document)?;
        return Ok(());
    }

    let builder = Arc::new(PageBuilder::new(Arc::clone(&ctx.loader)));
    let navigator = Navigator::new(builder, &ctx.settings.prefetch);
    let result = navigate(&navigator, key, !args.no_navigate).await;
    navigator.shutdown();
    result
}

async fn navigate(navigator: &Navigator, mut key: String, interactive: bool) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let page = navigator.step(&key).await?;
        render::write_document(&mut io::stdout().lock(), &page.primary)?;

        let mut filter: Option<String> = None;
        let next = loop {
            let visible = prompt::matching(&page.choices, filter.as_deref());
            {
                let mut out = io::stdout().lock();
                render::write_choices(&mut out, &page, &visible)?;
                if !interactive {
                    return Ok(());
                }
                write!(out, "Select an edge (number, text to filter, q to quit): ")?;
                out.flush()?;
            }

            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            match Selection::parse(&line, page.choices.len()) {
                Selection::Quit => return Ok(()),
                Selection::Pick(index) => break page.choices[index].neighbor.to_string(),
                Selection::OutOfRange(number) => {
                    writeln!(io::stdout().lock(), "no edge numbered {number}")?;
                }
                Selection::Filter(text) => filter = Some(text),
            }
        };

        render::write_separator(&mut io::stdout().lock())?;
        key = next;
    }
}

async fn run_get_documents(ctx: &Context, args: DocumentsArgs) -> Result<(), CliError> {
    let documents = ctx.loader.documents_of_type(&args.document_type).await?;
    render::write_documents(
        &mut io::stdout().lock(),
        &documents,
        ctx.settings.cache.short_hash_len,
    )?;
    Ok(())
}

async fn run_get_edges(ctx: &Context, args: EdgesArgs) -> Result<(), CliError> {
    let document = ctx.loader.resolve(&args.hash).await?;
    let hash = document.hash;
    let edges_error = |source: RemoteError| CliError::Edges {
        hash: hash.clone(),
        source,
    };

    let (outbound, inbound) = tokio::try_join!(
        async { ctx.remote.fetch_edges_from(&hash).await.map_err(edges_error) },
        async { ctx.remote.fetch_edges_to(&hash).await.map_err(edges_error) },
    )?;

    render::write_edges(
        &mut io::stdout().lock(),
        &hash,
        &outbound,
        &inbound,
        ctx.settings.cache.short_hash_len,
    )?;
    Ok(())
}

async fn run_cache_rebuild(ctx: &Context) -> Result<(), CliError> {
    let cache = ctx.loader.rebuild().await?;
    let stats = cache.stats();
    info!(
        documents = stats.documents,
        edges = stats.edges,
        types = stats.types,
        "cache rebuilt"
    );
    render::write_cache_stats(&mut io::stdout().lock(), ctx.loader.store().path(), &stats)?;
    Ok(())
}

fn run_cache_status(ctx: &Context) -> Result<(), CliError> {
    let store = ctx.loader.store();
    let mut out = io::stdout().lock();
    match DocumentCache::restore(store, ctx.loader.config().clone()) {
        Ok(cache) => render::write_cache_stats(&mut out, store.path(), &cache.stats())?,
        Err(reason) => render::write_cache_unusable(&mut out, store.path(), &reason)?,
    }
    Ok(())
}
