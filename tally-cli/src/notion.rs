//! Publishes categorized transactions to a Notion database, skipping ones
//! already uploaded (matched on the `ID` property).

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tally_core::Transaction;
use tracing::{error, info, warn};

use crate::config::NotionSection;

pub struct NotionPublisher {
    base_url: String,
    database_id: String,
    http: reqwest::Client,
}

impl NotionPublisher {
    pub fn from_config(cfg: &NotionSection) -> Result<Self> {
        let api_key = cfg
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .context("missing Notion API key; set NOTION_API_KEY or [notion].api_key")?;
        let database_id = cfg
            .database_id
            .as_deref()
            .filter(|d| !d.is_empty())
            .context("missing Notion database id; set NOTION_DATABASE_ID or [notion].database_id")?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {api_key}"))?);
        headers.insert("Notion-Version", HeaderValue::from_str(&cfg.notion_version)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
            http,
        })
    }

    /// Fetch the database and return its title.
    pub async fn test_connection(&self) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/databases/{}", self.base_url, self.database_id))
            .send()
            .await
            .context("notion request")?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("notion error: {status} {txt}");
        }
        let db: Value = resp.json().await.context("parse notion database")?;
        Ok(database_title(&db))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let body = json!({
            "filter": { "property": "ID", "rich_text": { "equals": id } }
        });
        let resp = self
            .http
            .post(format!("{}/databases/{}/query", self.base_url, self.database_id))
            .json(&body)
            .send()
            .await
            .context("notion query")?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("notion query error: {status} {txt}");
        }
        let out: Value = resp.json().await.context("parse notion query")?;
        Ok(out["results"].as_array().is_some_and(|r| !r.is_empty()))
    }

    /// Create the page unless a page with the same ID exists. Ok(false) on
    /// a rejected upload; the failure is logged.
    pub async fn upload_transaction(&self, tx: &Transaction, category: &str) -> Result<bool> {
        // a failed lookup counts as "not there yet"
        match self.exists(&tx.id).await {
            Ok(true) => {
                info!(id = %tx.id, "transaction already in notion; skipping");
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => warn!(id = %tx.id, error = %format!("{e:#}"), "could not check for existing page"),
        }

        let mut page = page_properties(tx, category, Local::now().date_naive());
        page["parent"] = json!({ "database_id": self.database_id });

        let resp = self
            .http
            .post(format!("{}/pages", self.base_url))
            .json(&page)
            .send()
            .await
            .context("notion create page")?;
        let status = resp.status();
        if status.is_success() {
            info!(id = %tx.id, title = %tx.title, amount = tx.amount, "uploaded transaction");
            Ok(true)
        } else {
            let txt = resp.text().await.unwrap_or_default();
            error!(id = %tx.id, %status, body = %txt, "notion rejected transaction");
            Ok(false)
        }
    }

    /// Upload each transaction with its category. Returns the number that
    /// made it; one failure never stops the rest.
    pub async fn upload_transactions(&self, txs: &[Transaction], categories: &[String]) -> Result<usize> {
        if txs.len() != categories.len() {
            bail!(
                "got {} categories for {} transactions",
                categories.len(),
                txs.len()
            );
        }
        let mut ok = 0;
        for (tx, category) in txs.iter().zip(categories) {
            match self.upload_transaction(tx, category).await {
                Ok(true) => ok += 1,
                Ok(false) => {}
                Err(e) => error!(id = %tx.id, error = %format!("{e:#}"), "upload failed"),
            }
        }
        info!(uploaded = ok, total = txs.len(), "upload summary");
        Ok(ok)
    }
}

fn database_title(db: &Value) -> String {
    db["title"][0]["plain_text"]
        .as_str()
        .unwrap_or("Unknown")
        .to_string()
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [ { "text": { "content": content } } ] })
}

/// Page properties for one transaction. Purchases are always negative;
/// undated transactions are filed under `today`.
pub fn page_properties(tx: &Transaction, category: &str, today: NaiveDate) -> Value {
    let date = tx.date.unwrap_or(today);
    // some banks export charges as positive amounts
    let amount = if tx.is_debit() { tx.amount } else { -tx.amount };
    json!({
        "properties": {
            "ID": rich_text(&tx.id),
            "Transaction Title": { "title": [ { "text": { "content": tx.title } } ] },
            "Location": rich_text(&tx.location),
            "Date": { "date": { "start": date.format("%Y-%m-%d").to_string() } },
            "Amount": { "number": amount },
            "Transaction Category": { "select": { "name": category } }
        }
    })
}
