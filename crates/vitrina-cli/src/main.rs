mod writer;

use std::fs::{self, File};
use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use tokio::runtime;
use vitrina_crawler::{
    Catalog, CatalogParser, CategoryStore, CrawlerConfig, HttpFetcher, MemoryCategoryStore,
    MemoryProductStore, OnError, Product, ProductStore, SqliteStore, Url,
};
use vitrina_extract::VtexParser;

use crate::writer::CsvWriter;

const DEFAULT_LOG_FILTER: &str = "vitrina=info,vitrina_crawler=info,vitrina_extract=warn";

/// Storefront catalog crawler
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "search")]
    Search(SearchArgs),
    #[command(name = "search-deep")]
    SearchDeep(SearchArgs),
    #[command(name = "parse")]
    Parse(ParseArgs),
    #[command(hide = true)]
    Completion,
}

/// Options shared by every command hitting the store front
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Optional default crawler yaml configuration file
    #[arg(env = "VITRINA_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override the store front base URL
    #[arg(long)]
    pub base_url: Option<String>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's maximum concurrent detail page downloads
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,
    /// Override search window size
    #[arg(long)]
    pub window_size: Option<NonZeroUsize>,
    /// Path to the output CSV file, stdout when missing
    #[arg(long, short)]
    pub output_file: Option<PathBuf>,
    /// SQLite database merging the catalog across runs, in memory when missing
    #[arg(env = "VITRINA_DATABASE", long)]
    pub database: Option<PathBuf>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CommonArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CommonArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(path) = &args.crawler_config {
            let file = File::open(path)
                .with_context(|| format!("Couldn't open crawler config {}", path.display()))?;
            serde_yaml::from_reader(file)
                .with_context(|| format!("Invalid crawler config {}", path.display()))?
        } else {
            CrawlerConfig::default()
        };
        if let Some(base_url) = &args.base_url {
            conf.base_url = base_url.to_string();
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(concurrency) = args.concurrency {
            conf.concurrency = concurrency;
        }
        if let Some(window_size) = args.window_size {
            conf.search.window_size = window_size;
        }
        conf.validate()?;
        Ok(conf)
    }
}

/// Paginate listings, enrich them and export the catalog
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Override the listing path, with a `{page}` placeholder or a `page=` parameter
    #[arg(long)]
    pub listing_path: Option<String>,
    /// Stop after this many listing pages
    #[arg(long)]
    pub max_pages: Option<usize>,
    /// Skip detail pages
    #[arg(long)]
    pub no_enrich: bool,
}

/// Query the catalog search endpoint and export the results
#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Extra search parameter, e.g. `--param ft=arroz`
    #[arg(long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,
    /// Override what a failing category shard does (search-deep only)
    #[arg(value_enum, long)]
    pub on_shard_error: Option<OnError>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid KEY=value: no `=` found in `{s}`")),
    }
}

fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    Ok(rt.block_on(future))
}

#[derive(Debug)]
enum Job {
    Listing,
    Search(Vec<(String, String)>),
    SearchDeep(Vec<(String, String)>),
}

impl Job {
    async fn run(&self, catalog: &Catalog<'_>) -> anyhow::Result<Vec<Product>> {
        match self {
            Self::Listing => catalog.scrape_listing().await,
            Self::Search(params) => catalog.scrape_search(&catalog.search_query(params)).await,
            Self::SearchDeep(params) => {
                catalog
                    .scrape_search_deep(&catalog.search_query(params))
                    .await
            }
        }
    }
}

async fn scrape(
    conf: &CrawlerConfig,
    fetcher: &HttpFetcher,
    parser: &VtexParser,
    products: &dyn ProductStore,
    categories: &dyn CategoryStore,
    job: &Job,
) -> anyhow::Result<Vec<Product>> {
    let catalog = Catalog::new(conf, fetcher, parser, products, categories);
    let done = tokio::select! {
        res = job.run(&catalog) => res,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted, nothing exported"),
    };
    let scraped = done?;
    log::info!("Scraped {} products", scraped.len());
    products.list().await
}

async fn run_job(
    conf: &CrawlerConfig,
    database: Option<&Path>,
    job: &Job,
) -> anyhow::Result<Vec<Product>> {
    let fetcher = HttpFetcher::new(conf)?;
    let parser = VtexParser::new(conf.base()?);

    match database {
        Some(path) => {
            let store = SqliteStore::open(path).await?;
            log::info!("Storing catalog into {}", path.display());
            let stored = scrape(conf, &fetcher, &parser, &store, &store, job).await;
            store.close().await;
            stored
        }
        None => {
            let products = MemoryProductStore::new();
            let categories = MemoryCategoryStore::new();
            scrape(conf, &fetcher, &parser, &products, &categories, job).await
        }
    }
}

/// Runs `job` against the selected stores, then exports everything they hold.
fn run_catalog(conf: CrawlerConfig, common: CommonArgs, job: Job) -> anyhow::Result<()> {
    let stored = block_on(run_job(&conf, common.database.as_deref(), &job))??;

    let mut wtr = CsvWriter::create(common.output_file.as_deref())?;
    wtr.write_products(&stored)
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let mut conf = CrawlerConfig::try_from(&args.common)?;
    if let Some(listing_path) = args.listing_path {
        conf.listing_path = listing_path;
    }
    if args.max_pages.is_some() {
        conf.max_pages = args.max_pages;
    }
    if args.no_enrich {
        conf.enrich = false;
    }
    conf.validate()?;

    run_catalog(conf, args.common, Job::Listing)
}

pub fn search(args: SearchArgs, deep: bool) -> anyhow::Result<()> {
    let mut conf = CrawlerConfig::try_from(&args.common)?;
    if let Some(on_shard_error) = args.on_shard_error {
        conf.search.on_shard_error = on_shard_error;
    }
    let job = if deep {
        Job::SearchDeep(args.params)
    } else {
        Job::Search(args.params)
    };
    run_catalog(conf, args.common, job)
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PageKind {
    Listing,
    Detail,
}

/// Run the extractors on a single page and print the result to stdout
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ParseArgs {
    /// Which extractor to run
    #[arg(value_enum, long, default_value = "listing")]
    pub kind: PageKind,
    /// A local html page to parse
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page to parse
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// Base URL used to resolve relative links
    #[arg(long)]
    pub base_url: Option<String>,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with = "file")]
    pub ua: Option<String>,
}

pub fn parse(args: ParseArgs) -> anyhow::Result<()> {
    let page = if let Some(url) = &args.url {
        let mut builder = reqwest::blocking::ClientBuilder::new().gzip(true);
        if let Some(ua) = &args.ua {
            builder = builder.user_agent(ua);
        }
        let client = builder.build()?;
        let resp = client.get(url).send()?;
        if !resp.status().is_success() {
            bail!("Couldn't download {url} got status: {}", resp.status());
        }
        resp.text()?
    } else if let Some(path) = &args.file {
        fs::read_to_string(path)
            .with_context(|| format!("Couldn't read {}", path.display()))?
    } else {
        bail!("Missing `url` or `file`");
    };

    let base = match (&args.base_url, &args.url) {
        (Some(base), _) => Url::parse(base)?,
        (None, Some(url)) => Url::parse(url)?.join("/")?,
        (None, None) => CrawlerConfig::default().base()?,
    };
    let parser = VtexParser::new(base.clone());

    let out = match args.kind {
        PageKind::Listing => {
            let products = parser
                .listing_items(&page)
                .into_iter()
                .filter_map(|record| Product::from_listing(record, &base))
                .collect::<Vec<_>>();
            serde_json::to_value(products)?
        }
        PageKind::Detail => serde_json::json!({
            "detail": parser.detail(&page),
            "breadcrumbs": parser.breadcrumbs(&page),
        }),
    };
    serde_json::to_writer_pretty(io::stdout(), &out)?;
    println!();
    Ok(())
}

fn init_logger(quiet: bool) {
    if !quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            init_logger(args.common.quiet);
            crawl(args)
        }
        SubCommand::Search(args) => {
            init_logger(args.common.quiet);
            search(args, false)
        }
        SubCommand::SearchDeep(args) => {
            init_logger(args.common.quiet);
            search(args, true)
        }
        SubCommand::Parse(args) => {
            init_logger(false);
            parse(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "vitrina", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn common(args: &[&str]) -> CommonArgs {
        let mut argv = vec!["vitrina", "crawl"];
        argv.extend_from_slice(args);
        match Args::try_parse_from(argv).unwrap().cmd {
            SubCommand::Crawl(crawl) => crawl.common,
            cmd => panic!("unexpected {cmd:?}"),
        }
    }

    #[test]
    fn flags_override_the_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "baseUrl: https://shop.test\nconcurrency: 3\nsearch:\n  windowSize: 20\n  resultCap: 1000"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let conf = CrawlerConfig::try_from(&common(&[
            "--crawler-config",
            &path,
            "--concurrency",
            "7",
        ]))
        .unwrap();

        assert_eq!(conf.base_url, "https://shop.test");
        assert_eq!(conf.concurrency.get(), 7);
        assert_eq!(conf.search.window_size.get(), 20);
        assert_eq!(conf.search.result_cap, 1000);
    }

    #[test]
    fn database_is_optional() {
        assert!(common(&[]).database.is_none());
        let args = common(&["--database", "data/catalog.db"]);
        assert_eq!(args.database, Some(PathBuf::from("data/catalog.db")));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let res = CrawlerConfig::try_from(&common(&["--base-url", "not a url"]));
        assert!(res.is_err());
    }

    #[test]
    fn search_params() {
        let args = Args::try_parse_from([
            "vitrina",
            "search-deep",
            "--param",
            "ft=arroz",
            "--param",
            "O=OrderByPriceASC",
            "--on-shard-error",
            "skip-and-log",
        ])
        .unwrap();
        let SubCommand::SearchDeep(search) = args.cmd else {
            panic!("expected search-deep");
        };
        assert_eq!(
            search.params,
            vec![
                ("ft".to_string(), "arroz".to_string()),
                ("O".to_string(), "OrderByPriceASC".to_string())
            ]
        );
        assert!(matches!(search.on_shard_error, Some(OnError::SkipAndLog)));
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn parse_needs_a_page() {
        assert!(Args::try_parse_from(["vitrina", "parse"]).is_err());
    }
}
