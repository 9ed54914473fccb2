//! Simulated weather lookup

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use super::Tool;
use crate::request::ToolSpec;
use crate::{Error, Result};

/// Reports today's (simulated) weather for a city
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherTool;

impl WeatherTool {
    /// Forecast text for `location` on `date`
    #[must_use]
    pub fn report(location: &str, date: NaiveDate) -> String {
        format!(
            "The weather in {location} on {} is sunny, 24°C.",
            date.format("%B %d")
        )
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "getWeather".to_string(),
            description: "Get the current weather forecast for a specific location".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city name, e.g., London, New York, Tokyo"
                    }
                },
                "required": ["location"]
            }),
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String> {
        let location = arguments
            .get("location")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::Tool("missing required parameter (location)".to_string()))?;

        Ok(Self::report(location, chrono::Local::now().date_naive()))
    }
}

/// Expand a bare city name into a weather question
///
/// `"Tokyo"` becomes `"What's the weather in Tokyo?"`; anything with more
/// than one word is returned unchanged.
#[must_use]
pub fn expand_city_query(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.split_whitespace().count() == 1 {
        format!("What's the weather in {trimmed}?")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            WeatherTool::report("London", date),
            "The weather in London on March 07 is sunny, 24°C."
        );
    }

    #[tokio::test]
    async fn test_missing_location() {
        let err = WeatherTool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[test]
    fn test_expand_city_query() {
        assert_eq!(expand_city_query("Tokyo"), "What's the weather in Tokyo?");
        assert_eq!(
            expand_city_query("Is it raining in London?"),
            "Is it raining in London?"
        );
    }

    #[test]
    fn test_spec_requires_location() {
        let spec = WeatherTool.spec();
        assert_eq!(spec.name, "getWeather");
        assert_eq!(spec.parameters["required"][0], "location");
    }
}
