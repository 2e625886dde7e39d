//! hbrowser - load a URL headlessly and print what came back

use anyhow::Context;
use clap::{Parser, ValueEnum};

use hbrowser::{BrowserVersion, Page, WebClient, WebClientOptions};

#[derive(Parser)]
#[command(name = "hbrowser", about = "Headless web client: fetch a page and print it", version)]
struct Cli {
    /// URL to load (http, https, file, data or about).
    url: String,

    /// Do not run scripts.
    #[arg(long)]
    no_js: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Browser to present as (chrome, firefox, firefox-esr, edge).
    #[arg(long)]
    browser: Option<String>,

    /// JSON file with client options.
    #[arg(long)]
    config: Option<String>,

    /// Print the page even when the server answers with an error status.
    #[arg(long)]
    no_fail_on_status: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Rendered text of the page
    Text,
    /// Markup of the parsed document
    Xml,
    /// Page type, status and title
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut options = match &cli.config {
        Some(path) => WebClientOptions::from_json_file(path)
            .with_context(|| format!("reading options from {path}"))?,
        None => WebClientOptions::default(),
    };
    if cli.no_js {
        options.javascript_enabled = false;
    }
    if cli.no_fail_on_status {
        options.throw_exception_on_failing_status_code = false;
    }
    if let Some(browser) = &cli.browser {
        options.browser_version = browser.parse::<BrowserVersion>()?;
    }

    let client = WebClient::new(options)?;
    let page = client
        .get_page(&cli.url)
        .await
        .with_context(|| format!("loading {}", cli.url))?;

    match cli.format {
        Format::Summary => print_summary(&page),
        Format::Xml => match &page {
            Page::Html(html) => println!("{}", html.as_xml()),
            other => println!("{}", other.web_response().content_as_string()),
        },
        Format::Text => match &page {
            Page::Html(html) => println!("{}", html.as_text()),
            Page::Unexpected(binary) => {
                println!("<{} bytes of {}>", binary.input_bytes().len(), page.web_response().content_type())
            }
            other => println!("{}", other.web_response().content_as_string()),
        },
    }

    client.close_all_windows().await;
    Ok(())
}

fn print_summary(page: &Page) {
    let response = page.web_response();
    println!("url:          {}", page.url());
    println!("status:       {} {}", response.status_code, response.status_message);
    println!("type:         {:?}", page.page_type());
    println!("content-type: {}", response.content_type());
    println!("bytes:        {}", response.body.len());
    println!("load time:    {:?}", response.load_time);
    match page {
        Page::Html(html) => {
            println!("title:        {}", html.title_text());
            println!("links:        {}", html.anchors().len());
            println!("forms:        {}", html.forms().len());
            println!("frames:       {}", html.frame_elements().len());
        }
        Page::Xml(xml) => {
            println!("root:         {}", xml.root_element_name().unwrap_or("-"));
            println!("well formed:  {}", xml.is_well_formed());
        }
        _ => {}
    }
}
