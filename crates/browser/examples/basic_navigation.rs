//! Basic navigation example - loading pages, following a link, submitting a form
//!
//! Runs offline against a mock connection.

use hbrowser::{MockWebConnection, WebClient, WebClientOptions};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let connection = Arc::new(MockWebConnection::new());
    connection.set_response_as_html(
        "http://example.com/",
        r#"<html><head><title>Home</title></head><body>
           <a href="/about">About us</a>
           <form name="search" action="/search"><input name="q"></form>
           </body></html>"#,
    );
    connection.set_response_as_html("http://example.com/about", "<title>About</title><p>We make things.</p>");
    connection.set_response_as_text("http://example.com/search", "3 results");

    let client = WebClient::with_connection(WebClientOptions::default(), connection.clone())?;

    // Subscribe to window events
    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("Event: {:?}", event);
        }
    });

    let page = client.get_page("http://example.com/").await?;
    let home = page.as_html().ok_or("expected an HTML page")?;
    println!("Loaded {:?} from {}", home.title_text(), home.url());

    let link = home.anchor_by_text("About us")?;
    let about = client.click(home, link).await?;
    println!("Clicked through to {}", about.url());
    if let Some(about) = about.as_html() {
        println!("{}", about.as_text());
    }

    let home = client
        .go_back(page.enclosing_window())
        .await?
        .and_then(|p| p.into_html())
        .ok_or("history should hold the home page")?;
    let form = home.form_by_name("search")?;
    let input = home.input_by_name(form, "q")?;
    client.type_into(&home, input, "rust").await?;
    let results = client.submit_form(&home, form, None).await?;
    println!("Search {} answered {:?}", results.url(), results.web_response().content_as_string());

    println!("Requests made: {:?}", connection.requested_urls());
    client.close_all_windows().await;
    Ok(())
}
