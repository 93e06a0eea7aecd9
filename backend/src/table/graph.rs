//! Excel tables in a SharePoint document library, over Microsoft Graph.
//!
//! The client resolves the site and drive item once, on connect, and then
//! talks to `/workbook/tables/{name}/...` of that item. The bearer token is
//! taken as given; acquiring or refreshing it happens elsewhere.
//!
//! Every call is a single round trip bounded by the configured timeout.
//! Failures are returned as they come, with the response body attached.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::TableStore;
use crate::config::GraphSettings;
use crate::error::{TransportError, TransportResult};
use crate::models::Cell;

/// Graph API base URL.
const GRAPH_API_URL: &str = "https://graph.microsoft.com/v1.0";

const USER_AGENT_VALUE: &str = concat!("peitrack/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct DriveObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ColumnList {
    #[serde(default)]
    value: Vec<TableColumn>,
}

#[derive(Debug, Deserialize)]
struct TableColumn {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RowPage {
    #[serde(default)]
    value: Vec<TableRow>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    index: Option<usize>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Client bound to one workbook.
#[derive(Debug, Clone)]
pub struct GraphTableClient {
    client: reqwest::Client,
    workbook_url: String,
}

impl GraphTableClient {
    /// Resolve the site and the workbook item, then bind to it.
    pub async fn connect(settings: &GraphSettings) -> TransportResult<Self> {
        let client = build_http_client(settings)?;

        let site_url = format!(
            "{}/sites/{}:{}",
            GRAPH_API_URL, settings.site_hostname, settings.site_path
        );
        let site: DriveObject = get_json(&client, &site_url).await?;
        debug!(site_id = %site.id, "resolved site");

        let item_url = format!("{}/sites/{}/drive/root:{}", GRAPH_API_URL, site.id, settings.file_path);
        let item: DriveObject = get_json(&client, &item_url).await?;
        info!(site_id = %site.id, item_id = %item.id, file = %settings.file_path, "connected to workbook");

        Ok(Self::for_workbook(client, &site.id, &item.id))
    }

    /// Bind to a workbook whose ids are already known.
    pub fn for_workbook(client: reqwest::Client, site_id: &str, item_id: &str) -> Self {
        Self {
            client,
            workbook_url: workbook_url(site_id, item_id),
        }
    }

    fn table_url(&self, table: &str, suffix: &str) -> String {
        format!("{}/tables/{}/{}", self.workbook_url, table, suffix)
    }

    async fn send_values(&self, method: Method, url: &str, row: &[Cell]) -> TransportResult<()> {
        let response = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .json(&row_body(row))
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        check_status(url, response).await?;
        Ok(())
    }
}

impl TableStore for GraphTableClient {
    async fn list_columns(&self, table: &str) -> TransportResult<Vec<String>> {
        let url = self.table_url(table, "columns");
        let columns: ColumnList = get_json(&self.client, &url).await?;
        debug!(table, columns = columns.value.len(), "listed columns");
        Ok(column_names(columns))
    }

    async fn read_all_rows(&self, table: &str) -> TransportResult<Vec<Vec<Cell>>> {
        let mut url = self.table_url(table, "rows");
        let mut pages = Vec::new();
        loop {
            let page: RowPage = get_json(&self.client, &url).await?;
            let next = page.next_link.clone();
            pages.push(page);
            match next {
                Some(link) => url = link,
                None => break,
            }
        }
        let rows = rows_from_pages(pages);
        debug!(table, rows = rows.len(), "read rows");
        Ok(rows)
    }

    async fn append_row(&self, table: &str, row: &[Cell]) -> TransportResult<()> {
        let url = self.table_url(table, "rows/add");
        self.send_values(Method::POST, &url, row).await?;
        info!(table, width = row.len(), "appended row");
        Ok(())
    }

    async fn replace_row(&self, table: &str, index: usize, row: &[Cell]) -> TransportResult<()> {
        let url = self.table_url(table, &format!("rows/itemAt(index={index})/range"));
        self.send_values(Method::PATCH, &url, row).await?;
        info!(table, index, width = row.len(), "replaced row");
        Ok(())
    }
}

fn build_http_client(settings: &GraphSettings) -> TransportResult<reqwest::Client> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", settings.access_token)).map_err(|e| {
        TransportError::Request {
            url: GRAPH_API_URL.to_string(),
            message: format!("access token is not a valid header value: {e}"),
        }
    })?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(settings.timeout)
        .build()
        .map_err(|e| request_error(GRAPH_API_URL, e))
}

fn workbook_url(site_id: &str, item_id: &str) -> String {
    format!("{}/sites/{}/drive/items/{}/workbook", GRAPH_API_URL, site_id, item_id)
}

/// `{"values": [[...]]}`, the shape both `rows/add` and range PATCH take.
fn row_body(row: &[Cell]) -> Value {
    let values: Vec<Value> = row.iter().map(Cell::to_wire).collect();
    json!({ "values": [values] })
}

/// Header labels exactly as the workbook spells them.
fn column_names(columns: ColumnList) -> Vec<String> {
    columns.value.into_iter().map(|c| c.name).collect()
}

/// Flatten row pages into a matrix ordered by row index.
fn rows_from_pages(pages: Vec<RowPage>) -> Vec<Vec<Cell>> {
    let mut items: Vec<(usize, Vec<Cell>)> = pages
        .into_iter()
        .flat_map(|page| page.value)
        .enumerate()
        .map(|(position, row)| {
            let cells = row
                .values
                .into_iter()
                .next()
                .unwrap_or_default()
                .iter()
                .map(Cell::from_wire)
                .collect();
            (row.index.unwrap_or(position), cells)
        })
        .collect();
    items.sort_by_key(|(index, _)| *index);
    items.into_iter().map(|(_, cells)| cells).collect()
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> TransportResult<T> {
    let response = client.get(url).send().await.map_err(|e| request_error(url, e))?;
    let body = check_status(url, response).await?;
    serde_json::from_str(&body).map_err(|e| TransportError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

async fn check_status(url: &str, response: reqwest::Response) -> TransportResult<String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| request_error(url, e))?;

    if !status.is_success() {
        return Err(TransportError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

fn request_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_body_shape() {
        let body = row_body(&[Cell::text("123"), Cell::Empty, Cell::Number(2.0)]);
        assert_eq!(body, json!({ "values": [["123", "", 2.0]] }));
    }

    #[test]
    fn test_rows_follow_index_across_pages() {
        let first: RowPage = serde_json::from_value(json!({
            "value": [
                { "index": 1, "values": [["b", 2]] },
                { "index": 0, "values": [["a", 1]] }
            ],
            "@odata.nextLink": "https://graph.microsoft.com/next"
        }))
        .unwrap();
        let second: RowPage = serde_json::from_value(json!({
            "value": [{ "index": 2, "values": [["c", null]] }]
        }))
        .unwrap();

        let rows = rows_from_pages(vec![first, second]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Cell::text("a"), Cell::Number(1.0)]);
        assert_eq!(rows[1][0], Cell::text("b"));
        assert_eq!(rows[2], vec![Cell::text("c"), Cell::Empty]);
    }

    #[test]
    fn test_column_names_keep_workbook_spelling() {
        let columns: ColumnList = serde_json::from_value(json!({
            "value": [{ "name": "Id_UE" }, { "name": "Periodo PEI " }, { "name": " Estado" }]
        }))
        .unwrap();
        assert_eq!(column_names(columns), vec!["Id_UE", "Periodo PEI ", " Estado"]);
    }

    #[test]
    fn test_table_urls() {
        let client = GraphTableClient::for_workbook(reqwest::Client::new(), "site-1", "item-9");
        assert_eq!(
            client.table_url("table_name_hist", "rows/itemAt(index=4)/range"),
            "https://graph.microsoft.com/v1.0/sites/site-1/drive/items/item-9/workbook/tables/table_name_hist/rows/itemAt(index=4)/range"
        );
    }
}
