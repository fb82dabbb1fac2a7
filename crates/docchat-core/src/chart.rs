//! Chart payloads and renderer configuration.
//!
//! The assistant sends charts as `{chartType, labels, datasets, title}`.
//! Anything it leaves out is filled in here before the payload reaches the
//! renderer: bar charts by default, a rotating five-colour palette, and a
//! legend only when there is more than one dataset.

use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_CHART_TYPE: &str = "bar";
const DEFAULT_BORDER_WIDTH: u64 = 1;

/// `(background, border)` colour pairs, applied by dataset index.
pub const PALETTE: [(&str, &str); 5] = [
    ("rgba(54, 162, 235, 0.5)", "rgba(54, 162, 235, 1)"),  // blue
    ("rgba(255, 99, 132, 0.5)", "rgba(255, 99, 132, 1)"),  // red
    ("rgba(75, 192, 192, 0.5)", "rgba(75, 192, 192, 1)"),  // green
    ("rgba(255, 206, 86, 0.5)", "rgba(255, 206, 86, 1)"),  // yellow
    ("rgba(153, 102, 255, 0.5)", "rgba(153, 102, 255, 1)"), // purple
];

/// Fully-resolved configuration handed to a [`ChartRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: String,
    pub data: ChartData,
    pub options: ChartOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<Value>,
    pub datasets: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
    pub plugins: ChartPlugins,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPlugins {
    pub title: TitleOptions,
    pub legend: LegendOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleOptions {
    pub display: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendOptions {
    pub display: bool,
}

impl ChartConfig {
    /// Build a renderer configuration from a `chart` event payload.
    pub fn from_payload(payload: &Value) -> Self {
        let chart_type = payload
            .get("chartType")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHART_TYPE)
            .to_string();

        let labels = payload
            .get("labels")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let raw_datasets = payload
            .get("datasets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let legend_display = raw_datasets.len() > 1;

        let datasets = raw_datasets
            .into_iter()
            .enumerate()
            .filter_map(|(index, dataset)| match dataset {
                Value::Object(map) => Some(with_defaults(map, index)),
                other => {
                    log::warn!("Ignoring chart dataset that is not an object: {}", other);
                    None
                }
            })
            .collect();

        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        ChartConfig {
            chart_type,
            data: ChartData { labels, datasets },
            options: ChartOptions {
                responsive: true,
                maintain_aspect_ratio: false,
                plugins: ChartPlugins {
                    title: TitleOptions {
                        display: title.is_some(),
                        text: title,
                    },
                    legend: LegendOptions {
                        display: legend_display,
                    },
                },
            },
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.options.plugins.title.text.as_deref()
    }
}

fn with_defaults(mut dataset: Map<String, Value>, index: usize) -> Map<String, Value> {
    let (background, border) = PALETTE[index % PALETTE.len()];
    if is_unset(dataset.get("backgroundColor")) {
        dataset.insert("backgroundColor".to_string(), Value::from(background));
    }
    if is_unset(dataset.get("borderColor")) {
        dataset.insert("borderColor".to_string(), Value::from(border));
    }
    if is_unset(dataset.get("borderWidth")) {
        dataset.insert("borderWidth".to_string(), Value::from(DEFAULT_BORDER_WIDTH));
    }
    dataset
}

/// Missing, null, false, zero and empty strings all count as "not provided".
fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

/// Surface that draws charts. Implemented by front ends.
pub trait ChartRenderer {
    /// Draw `config`, replacing any chart currently shown.
    fn render(&mut self, config: &ChartConfig);

    /// Remove the current chart.
    fn clear(&mut self) {}
}

/// Renderer for headless use; discards everything.
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl ChartRenderer for NoopRenderer {
    fn render(&mut self, _config: &ChartConfig) {}
}
