//! Visualization Selector
//!
//! Decides whether a question asks for a chart, and turns a result set into a
//! bar chart (column 0 = category axis, column 1 = value axis). Charts are
//! emitted as Vega-Lite specs so any front end can draw them.

use crate::dataset::TabularDataset;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Substrings that signal a chart request. Matched loosely, not as whole words.
pub const CHART_KEYWORDS: [&str; 6] = ["plot", "chart", "graph", "visualize", "bar", "line"];

const LABEL_ANGLE: i32 = -45;
const NOT_ENOUGH_NUMERIC: &str = "Not enough numeric columns to plot.";

pub fn wants_chart(question: &str) -> bool {
    let lowered = question.to_lowercase();
    CHART_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub category_field: String,
    pub value_field: String,
    /// Rotation of category labels, in degrees
    pub label_angle: i32,
    pub bars: Vec<Bar>,
}

impl Chart {
    /// Field names used in the Vega-Lite data. A value column that shares the
    /// category column's name gets a `_1` suffix so neither overwrites the other.
    pub fn data_fields(&self) -> (String, String) {
        let category = self.category_field.clone();
        let mut value = self.value_field.clone();
        let mut n = 1;
        while value == category {
            value = format!("{}_{}", self.value_field, n);
            n += 1;
        }
        (category, value)
    }

    pub fn to_vega_lite(&self) -> serde_json::Value {
        let (category_field, value_field) = self.data_fields();
        let values: Vec<serde_json::Value> = self
            .bars
            .iter()
            .map(|bar| {
                let mut point = serde_json::Map::new();
                point.insert(category_field.clone(), serde_json::json!(bar.category));
                point.insert(value_field.clone(), serde_json::json!(bar.value));
                serde_json::Value::Object(point)
            })
            .collect();

        serde_json::json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
            "title": self.title,
            "width": 600,
            "height": 400,
            "data": {"values": values},
            "mark": "bar",
            "encoding": {
                "x": {
                    "field": category_field,
                    "title": self.category_field,
                    "type": "nominal",
                    "sort": null,
                    "axis": {"labelAngle": self.label_angle}
                },
                "y": {"field": value_field, "title": self.value_field, "type": "quantitative"}
            }
        })
    }
}

/// Build a bar chart, or explain why the result cannot be charted.
///
/// Any result with at least two columns is drawn; rows whose value is null
/// are left out, so an empty or all-null result gives a chart with no bars.
/// A value column holding only non-numeric text cannot be drawn.
pub fn try_render(result: &TabularDataset) -> std::result::Result<Chart, String> {
    if result.column_count() < 2 {
        return Err(NOT_ENOUGH_NUMERIC.to_string());
    }

    let mut has_text = false;
    let mut bars = Vec::new();
    for row in result.rows() {
        match row[1].as_f64() {
            Some(value) => bars.push(Bar {
                category: row[0].to_string(),
                value,
            }),
            None if !row[1].is_null() => has_text = true,
            None => {}
        }
    }

    if bars.is_empty() && has_text {
        return Err(NOT_ENOUGH_NUMERIC.to_string());
    }

    let category_field = result.columns()[0].clone();
    let value_field = result.columns()[1].clone();
    Ok(Chart {
        title: format!("{} by {}", value_field, category_field),
        category_field,
        value_field,
        label_angle: LABEL_ANGLE,
        bars,
    })
}

/// Bar chart for `result`, or `None` when it cannot be drawn.
pub fn render(result: &TabularDataset) -> Option<Chart> {
    match try_render(result) {
        Ok(chart) => Some(chart),
        Err(reason) => {
            debug!("No chart: {}", reason);
            None
        }
    }
}
