//! Deterministic names for output directories and artifacts.
//!
//! Everything here is pure: the same titles always map to the same path, so a
//! re-run finds (and skips) what a previous run already saved.

use std::path::{Path, PathBuf};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Longest file or directory name produced, in characters.
pub const MAX_NAME_LEN: usize = 80;

pub const ARTIFACT_EXTENSION: &str = "pdf";

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip accents (NFKD, then drop combining marks).
pub fn strip_accents(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-free, lower-cased text with single spaces, for keyword matching.
pub fn fold_text(text: &str) -> String {
    strip_accents(text)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a UI title into a portable file-system name.
///
/// Accents are removed, reserved characters and whitespace become `_`, runs
/// of `_` collapse, and the result is capped at [`MAX_NAME_LEN`] characters.
/// An input with nothing usable left yields `fallback`.
pub fn normalize_name(text: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in strip_accents(text.trim()).chars() {
        let mapped = if FORBIDDEN.contains(&c) || c.is_whitespace() || c.is_control() {
            '_'
        } else {
            c
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let truncated: String = out.chars().take(MAX_NAME_LEN).collect();
    let cleaned = truncated.trim_matches(|c| c == '_' || c == '.');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Title used for a panel without a heading: its 1-based position.
pub fn positional_title(index: usize) -> String {
    format!("tabla_{}", index + 1)
}

/// Directory holding everything saved for one taxpayer in one fiscal year.
pub fn taxpayer_dir(results_root: &Path, year: &str, taxpayer_name: &str) -> PathBuf {
    results_root
        .join(normalize_name(year, "sin_periodo"))
        .join(normalize_name(taxpayer_name, "contribuyente"))
}

/// Target file for one table, `<taxpayer dir>/<section>/<table>.pdf`. The
/// icon the table was reached through is not part of the name.
pub fn artifact_path(taxpayer_dir: &Path, section_title: &str, table_title: &str) -> PathBuf {
    taxpayer_dir
        .join(normalize_name(section_title, "seccion"))
        .join(format!(
            "{}.{}",
            normalize_name(table_title, "tabla"),
            ARTIFACT_EXTENSION
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accents_and_reserved_characters_are_replaced() {
        assert_eq!(
            normalize_name("Retenciones / Percepciones: Año 2023", "x"),
            "Retenciones_Percepciones_Ano_2023"
        );
        assert_eq!(normalize_name("  Débitos   y créditos ", "x"), "Debitos_y_creditos");
        assert_eq!(normalize_name("a<b>c|d?e*f\"g", "x"), "a_b_c_d_e_f_g");
    }

    #[test]
    fn empty_or_symbol_only_input_uses_fallback() {
        assert_eq!(normalize_name("", "tabla"), "tabla");
        assert_eq!(normalize_name(" /// ", "tabla"), "tabla");
    }

    #[test]
    fn long_names_are_capped() {
        let long = "x".repeat(200);
        assert_eq!(normalize_name(&long, "f").chars().count(), MAX_NAME_LEN);
        let cut_on_separator = format!("{} tail", "y".repeat(MAX_NAME_LEN - 1));
        assert!(!normalize_name(&cut_on_separator, "f").ends_with('_'));
    }

    #[test]
    fn derivation_is_deterministic() {
        let dir = Path::new("Resultados/2023/ACME");
        let a = artifact_path(dir, "Bienes Personales", "Detalle de Inmuebles");
        let b = artifact_path(dir, "Bienes Personales", "Detalle de Inmuebles");
        assert_eq!(a, b);
        assert_eq!(
            a,
            Path::new("Resultados/2023/ACME/Bienes_Personales/Detalle_de_Inmuebles.pdf")
        );
    }

    #[test]
    fn folding_ignores_case_accents_and_spacing() {
        assert_eq!(fold_text("  Períodos   ANTERIORES "), "periodos anteriores");
    }

    #[test]
    fn taxpayer_dir_layout() {
        assert_eq!(
            taxpayer_dir(Path::new("out"), "2023", "Pérez, Juan"),
            Path::new("out/2023/Perez,_Juan")
        );
        assert_eq!(positional_title(0), "tabla_1");
    }
}
