//! Server-rendered HTML views over the product file.

use crate::api::AppState;
use crate::models::Product;
use crate::store::StoreError;
use actix_web::{get, web, HttpResponse, Responder};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use tracing::{error, info};

const ALL: &str = "All";
const DEFAULT_KEYWORD: &str = "spa";
const SAMPLE_LINKS: usize = 3;
const COLUMNS: usize = 3;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; background: #fafafa; color: #222; }
nav { background: #1976d2; padding: 10px 20px; }
nav a { color: #fff; margin-right: 16px; text-decoration: none; font-weight: 600; }
.layout { display: flex; gap: 24px; max-width: 80vw; margin: 20px auto; }
.sidebar { width: 240px; flex-shrink: 0; }
.sidebar select, .sidebar button, .sidebar input { width: 100%; margin-bottom: 8px; }
main { flex: 1; }
.grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 18px; }
.ecom-card { border: 1px solid #e0e0e0; border-radius: 12px; padding: 18px 12px 12px 12px;
  background: #fff; box-shadow: 0 2px 8px rgba(0,0,0,0.04); text-align: center; }
.ecom-title { font-size: 1.15rem; font-weight: 700; margin: 10px 0 4px 0; }
.ecom-price { color: #2e7d32; font-size: 1.1rem; font-weight: bold; margin-bottom: 6px; }
.ecom-badge { display: inline-block; background: #1976d2; color: #fff; border-radius: 8px;
  font-size: 0.85rem; padding: 2px 10px; margin-bottom: 8px; }
.ecom-fields { font-size: 0.95rem; margin-top: 8px; text-align: left; word-break: break-all; }
.info { background: #e3f2fd; padding: 12px; border-radius: 8px; }
.debug { font-family: monospace; font-size: 0.9rem; border-bottom: 1px solid #ddd; padding: 6px 0; }
"#;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub category: Option<String>,
    pub supplier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub keyword: Option<String>,
    pub debug: Option<String>,
    pub run: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value
        .as_deref()
        .is_some_and(|v| !matches!(v, "" | "0" | "false" | "off"))
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Distinct category labels longer than one character, sorted
pub fn category_options(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .flat_map(|p| p.category.labels())
        .map(str::trim)
        .filter(|label| label.chars().count() > 1)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn supplier_options(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|p| p.supplier.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Exact-match filters; `None` or `All` leaves that dimension open
pub fn browse_filter<'a>(
    products: &'a [Product],
    category: Option<&str>,
    supplier: Option<&str>,
) -> Vec<&'a Product> {
    let category = category.filter(|c| *c != ALL);
    let supplier = supplier.filter(|s| *s != ALL);
    products
        .iter()
        .filter(|p| category.map_or(true, |c| p.category.labels().any(|label| label == c)))
        .filter(|p| supplier.map_or(true, |s| p.supplier == s))
        .collect()
}

fn card(product: &Product) -> String {
    let mut html = String::from(r#"<div class="ecom-card">"#);
    if let Some(image) = product.image_url.as_deref().filter(|i| !i.is_empty()) {
        let _ = write!(
            html,
            r#"<img src="{}" width="180" style="margin-bottom:8px;"/>"#,
            escape(image)
        );
    }
    let _ = write!(html, r#"<div class="ecom-title">{}</div>"#, escape(&product.name));
    if let Some(price) = product.price.as_deref().filter(|p| !p.is_empty()) {
        let _ = write!(html, r#"<div class="ecom-price">{}</div>"#, escape(price));
    }
    if !product.supplier.is_empty() {
        let _ = write!(html, r#"<span class="ecom-badge">{}</span>"#, escape(&product.supplier));
    }

    let fields = product.detail_fields();
    if !fields.is_empty() {
        html.push_str(r#"<div class="ecom-fields">"#);
        for (key, value) in fields {
            let _ = write!(html, "<div><strong>{key}:</strong> {}</div>", escape(&value));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

fn grid<'a>(products: impl IntoIterator<Item = &'a Product>) -> String {
    let cards: String = products.into_iter().map(card).collect();
    format!(r#"<div class="grid">{cards}</div>"#)
}

fn select(name: &str, options: &[String], selected: &str) -> String {
    let mut html = format!(r#"<label>{}</label><select name="{}">"#, escape(name), escape(name));
    for option in std::iter::once(ALL).chain(options.iter().map(String::as_str)) {
        let marker = if option == selected { " selected" } else { "" };
        let _ = write!(html, r#"<option value="{0}"{marker}>{0}</option>"#, escape(option));
    }
    html.push_str("</select>");
    html
}

fn page(title: &str, sidebar: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
  <nav><a href="/dashboard">Browse</a><a href="/dashboard/compare">Compare Prices</a></nav>
  <div class="layout">
    <aside class="sidebar">{sidebar}</aside>
    <main><h1>{title}</h1>{body}</main>
  </div>
</body>
</html>"#,
        title = escape(title),
    )
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .body(body)
}

fn load_failure(e: &StoreError) -> HttpResponse {
    let message = match e {
        StoreError::NotFound(_) => "materials.json not found. Run a scrape first.".to_string(),
        other => {
            error!("Dashboard could not read product data: {}", other);
            other.to_string()
        }
    };
    let notice = format!(r#"<p class="info">{}</p>"#, escape(&message));
    let body = page("Materials Explorer", "", &notice);
    let mut response = html(body);
    if matches!(e, StoreError::NotFound(_)) {
        *response.status_mut() = actix_web::http::StatusCode::NOT_FOUND;
    }
    response
}

/// `/materials/{category}` with the label percent-encoded as one path segment
fn api_link(category: &str) -> String {
    format!("/materials/{}", urlencoding::encode(category))
}

/// API links for up to three random categories
fn sample_links(categories: &[String]) -> String {
    let mut html = String::from("<hr/><p><strong>Sample API Links:</strong></p>");
    let mut rng = rand::thread_rng();
    for category in categories.choose_multiple(&mut rng, SAMPLE_LINKS) {
        let href = api_link(category);
        let _ = write!(
            html,
            r#"<a href="{}" target="_blank"><button>{} (View as API)</button></a>"#,
            escape(&href),
            escape(category)
        );
    }
    html
}

#[get("/dashboard")]
pub async fn browse(state: web::Data<AppState>, query: web::Query<BrowseQuery>) -> impl Responder {
    let products = match state.store.load() {
        Ok(products) => products,
        Err(e) => return load_failure(&e),
    };

    let category = query.category.as_deref().unwrap_or(ALL);
    let supplier = query.supplier.as_deref().unwrap_or(ALL);
    let categories = category_options(&products);
    let suppliers = supplier_options(&products);
    let filtered = browse_filter(&products, Some(category), Some(supplier));

    let sidebar = format!(
        r#"<form method="get" action="/dashboard">{}{}<button type="submit">Filter</button></form>{}"#,
        select("category", &categories, category),
        select("supplier", &suppliers, supplier),
        sample_links(&categories),
    );
    let body = format!(
        "<p>Showing {} products in category: {}, supplier: {}</p>{}",
        filtered.len(),
        escape(category),
        escape(supplier),
        grid(filtered.iter().copied()),
    );
    html(page("Materials Explorer", &sidebar, &body))
}

#[get("/dashboard/compare")]
pub async fn compare(
    state: web::Data<AppState>,
    query: web::Query<CompareQuery>,
) -> impl Responder {
    let keyword = query.keyword.as_deref().unwrap_or(DEFAULT_KEYWORD);
    let debug = flag(&query.debug);
    let run = flag(&query.run);

    let mut body = String::from(
        "<p>Products available from multiple suppliers, matched on their normalized name \
         and category fields, are shown below.</p>",
    );
    let _ = write!(
        body,
        r#"<form method="get" action="/dashboard/compare">
<label>Keyword to filter products for debug (e.g., 'spa', 'piscine', 'bain'):</label>
<input type="text" name="keyword" value="{}"/>
<label><input type="checkbox" name="debug" value="1"{}/> Show debug info</label>
<button type="submit" name="run" value="1">Compare</button>
</form>"#,
        escape(keyword),
        if debug { " checked" } else { "" },
    );

    if run {
        let products = match state.store.load() {
            Ok(products) => products,
            Err(e) => return load_failure(&e),
        };

        if debug {
            let _ = write!(
                body,
                "<h3>Debug: Normalized names and categories for products containing '{}':</h3>",
                escape(keyword)
            );
            for entry in state.matcher.debug_matches(&products, keyword) {
                let _ = write!(
                    body,
                    concat!(
                        r#"<div class="debug">Supplier: {}<br/>Original Name: {}<br/>"#,
                        "Normalized Name: {}<br/>All Categories: {}<br/>",
                        "Normalized Categories: {}</div>",
                    ),
                    escape(&entry.product.supplier),
                    escape(&entry.product.name),
                    escape(&entry.name),
                    escape(&entry.raw_categories),
                    escape(&entry.category),
                );
            }
        }

        let groups = state.matcher.group(&products);
        info!("Compare view: {} groups from {} products", groups.len(), products.len());
        if groups.is_empty() {
            body.push_str(r#"<p class="info">No matching products found across suppliers.</p>"#);
        }
        for group in &groups {
            let _ = write!(body, "<h2>{}</h2>", escape(group.title()));
            for row in group.members.chunks(COLUMNS) {
                body.push_str(&grid(row.iter().copied()));
            }
            body.push_str("<hr/>");
        }
    }

    html(page("Compare Prices Across Suppliers", "", &body))
}
