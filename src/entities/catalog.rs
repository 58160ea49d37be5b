// Coverage catalog, keyed by line of business

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub code: String,
    pub name: String,
}

impl Coverage {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCatalog {
    lines: BTreeMap<String, Vec<Coverage>>,
}

impl Default for CoverageCatalog {
    fn default() -> Self {
        let mut lines = BTreeMap::new();
        lines.insert(
            "autos".to_string(),
            vec![
                Coverage::new("rc", "Responsabilidad civil"),
                Coverage::new("danos_materiales", "Daños materiales"),
                Coverage::new("robo_total", "Robo total"),
                Coverage::new("gastos_medicos_ocupantes", "Gastos médicos ocupantes"),
            ],
        );
        lines.insert(
            "gastos_medicos".to_string(),
            vec![
                Coverage::new("hospitalizacion", "Hospitalización"),
                Coverage::new("maternidad", "Maternidad"),
                Coverage::new("emergencia_extranjero", "Emergencia en el extranjero"),
            ],
        );
        lines.insert(
            "hogar".to_string(),
            vec![
                Coverage::new("incendio", "Incendio"),
                Coverage::new("robo_contenidos", "Robo de contenidos"),
                Coverage::new("fenomenos_hidro", "Fenómenos hidrometeorológicos"),
            ],
        );
        lines.insert(
            "vida".to_string(),
            vec![
                Coverage::new("fallecimiento", "Fallecimiento"),
                Coverage::new("invalidez", "Invalidez total y permanente"),
            ],
        );
        Self { lines }
    }
}

impl CoverageCatalog {
    pub fn new(lines: BTreeMap<String, Vec<Coverage>>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|(line, coverages)| (line.trim().to_lowercase(), coverages))
                .collect(),
        }
    }

    pub fn coverages_for(&self, line_of_business: &str) -> &[Coverage] {
        self.lines
            .get(&line_of_business.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Codes in `selected` that are not offered for `line_of_business`
    pub fn unknown_codes<'a>(&self, line_of_business: &str, selected: &'a [String]) -> Vec<&'a str> {
        let offered = self.coverages_for(line_of_business);
        selected
            .iter()
            .map(String::as_str)
            .filter(|code| !offered.iter().any(|c| c.code == *code))
            .collect()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<Coverage>> {
        &self.lines
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverages_are_scoped_by_line() {
        let catalog = CoverageCatalog::default();
        let selected = vec!["rc".to_string(), "maternidad".to_string()];
        assert_eq!(catalog.unknown_codes("Autos", &selected), vec!["maternidad"]);
        assert!(catalog.coverages_for("marino").is_empty());
    }
}
