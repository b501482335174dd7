//! Catalog presentation.

use super::shared::{format_section_heading, new_table, to_json};
use crate::catalog::{SlotCatalog, SlotStatus};
use crate::error::ApiError;
use crate::types::day_name;
use serde_json::json;

pub fn format_catalog_text(catalog: &SlotCatalog, program: Option<&str>) -> String {
    let title = match program {
        Some(code) => format!("Slot catalog for {}", code),
        None => "Slot catalog".to_string(),
    };
    let mut out = format_section_heading(&title);
    out.push('\n');

    let days: Vec<String> = catalog.days().map(day_name).collect();
    out.push_str(&format!("Teaching days: {}\n", days.join(", ")));

    let mut table = new_table(vec!["Slot", "Time", "Kind"]);
    for period in catalog.periods() {
        let kind = if period.is_break {
            "break".to_string()
        } else if let Some(code) = program {
            let open: Vec<String> = catalog
                .days()
                .filter(|d| catalog.status(code, *d, period.index) == SlotStatus::Assignable)
                .map(day_name)
                .collect();
            if open.is_empty() {
                "not used".to_string()
            } else if open.len() == days.len() {
                "class".to_string()
            } else {
                format!("class ({})", open.join(", "))
            }
        } else {
            "class".to_string()
        };
        table.add_row(vec![period.index.to_string(), period.label.clone(), kind]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_catalog_json(catalog: &SlotCatalog, program: Option<&str>) -> Result<String, ApiError> {
    let periods: Vec<_> = catalog
        .periods()
        .map(|p| {
            let mut value = json!({
                "index": p.index,
                "label": p.label,
                "is_break": p.is_break,
            });
            if let Some(code) = program {
                let open: Vec<_> = catalog
                    .days()
                    .filter(|d| catalog.status(code, *d, p.index).is_assignable())
                    .collect();
                value["assignable_days"] = json!(open);
            }
            value
        })
        .collect();
    let days: Vec<_> = catalog.days().collect();
    to_json(&json!({
        "program": program,
        "days": days,
        "periods": periods,
    }))
}
