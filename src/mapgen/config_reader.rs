use std::collections::BTreeMap;

use field_routes::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::mapgen::*;

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    pub provider: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "dateFormat")]
    pub date_format: Option<String>,
    /// 0 lifts the limit.
    #[serde(rename = "maxRows")]
    pub max_rows: Option<usize>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    pub palette: Option<Vec<String>>,
    #[serde(rename = "lineWeight")]
    pub line_weight: Option<u32>,
    #[serde(rename = "lineOpacity")]
    pub line_opacity: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(rename = "employeeName")]
    pub employee_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapgenConfig {
    #[serde(rename = "inputSettings", default)]
    pub input_settings: InputSettings,
    /// Extra keywords, by role name.
    #[serde(rename = "columnKeywords", default)]
    pub column_keywords: BTreeMap<String, Vec<String>>,
    #[serde(rename = "renderSettings", default)]
    pub render_settings: RenderSettings,
    #[serde(default)]
    pub filters: FilterSettings,
}

impl MapgenConfig {
    pub fn ingest_rules(&self, date_format: Option<&str>) -> IngestRules {
        let date_format = date_format
            .or(self.input_settings.date_format.as_deref())
            .map(DateFormat::parse)
            .unwrap_or(DateFormat::DayFirst);
        let max_rows = match self.input_settings.max_rows {
            Some(0) => None,
            Some(x) => Some(x),
            None => IngestRules::DEFAULT_RULES.max_rows,
        };
        IngestRules {
            date_format,
            max_rows,
        }
    }

    pub fn resolver(&self) -> MapgenResult<ColumnResolver> {
        let mut resolver = ColumnResolver::default();
        for (role_name, keywords) in self.column_keywords.iter() {
            let role = match Role::from_name(role_name) {
                Some(r) => r,
                None => whatever!(
                    "Unknown column role {:?} in columnKeywords. Known roles: {:?}",
                    role_name,
                    Role::ALL.iter().map(|r| r.name()).collect::<Vec<&str>>()
                ),
            };
            debug!("resolver: extra keywords for {}: {:?}", role, keywords);
            resolver = resolver.with_keywords(role, keywords);
        }
        Ok(resolver)
    }

    pub fn render_rules(&self) -> MapgenResult<RenderRules> {
        let defaults = RenderRules::default();
        let rs = &self.render_settings;
        let palette = match &rs.palette {
            Some(p) if p.len() < MIN_PALETTE_SIZE => whatever!(
                "The palette must have at least {} colours, found {}",
                MIN_PALETTE_SIZE,
                p.len()
            ),
            Some(p) => p.clone(),
            None => defaults.palette,
        };
        let line_opacity = rs.line_opacity.unwrap_or(defaults.line_opacity);
        if !(0.0..=1.0).contains(&line_opacity) {
            whatever!("The line opacity must be between 0 and 1, found {}", line_opacity);
        }
        Ok(RenderRules {
            palette,
            line_weight: rs.line_weight.unwrap_or(defaults.line_weight),
            line_opacity,
        })
    }
}

pub fn read_config(path: &str) -> MapgenResult<MapgenConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: MapgenConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    info!("config: {:?}", config);
    Ok(config)
}

/// Reads a reference output. It is parsed and printed again so that only
/// the content is compared, not the layout.
pub fn read_reference(path: &str) -> MapgenResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
