use anyhow::{Result, bail};
use clap::Args;
use serde_json::json;
use tracing::warn;

use cukeprobe::config::{AiSettings, BrowserSettings, CacheSettings};
use cukeprobe::{
    Browser, ElementCache, ElementDetector, OutputFormat, PageDriver, SelectorResolver,
};

use super::print_json;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Page to open
    pub url: String,

    /// Plain-language element description, e.g. "Login button"
    pub description: String,

    #[command(flatten)]
    pub browser: BrowserSettings,

    #[command(flatten)]
    pub ai: AiSettings,

    #[command(flatten)]
    pub cache: CacheSettings,

    /// Resolve with the cache and heuristics only
    #[arg(long)]
    pub no_ai: bool,

    /// Output format
    #[arg(short, long, default_value = "json")]
    pub format: OutputFormat,
}

pub async fn handle_resolve(args: ResolveArgs) -> Result<()> {
    let detector = if args.no_ai {
        None
    } else {
        Some(ElementDetector::from_settings(&args.ai)?)
    };
    let viewport = args.browser.viewport()?;
    let mut resolver =
        SelectorResolver::new(ElementCache::load(&args.cache.cache_file), detector);

    let browser = Browser::new(
        args.browser.browser,
        viewport,
        args.browser.is_headless(),
        args.browser.timeout(),
    )
    .await?;

    let outcome = match browser.navigate(&args.url).await {
        Ok(()) => resolver.resolve(&browser, &args.description).await,
        Err(e) => Err(e),
    };
    if let Err(e) = browser.close().await {
        warn!("Error closing browser: {:#}", e);
    }

    let Some(resolution) = outcome? else {
        bail!("Could not find element: {}", args.description);
    };

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "description": args.description,
            "url": args.url,
            "selector": resolution.selector.expression,
            "selector_type": resolution.selector.kind,
            "source": resolution.source,
            "stats": resolver.stats(),
        })),
        OutputFormat::Simple => {
            println!("{} ({})", resolution.selector, resolution.source);
            Ok(())
        }
    }
}
