use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Banner prepended to every captured page.
pub const BANNER_STYLE: BannerStyle = BannerStyle {
    padding: "10px",
    background_color: "#f2f2f2",
    font_size: "12px",
    font_family: "monospace",
    border_bottom: "1px solid #ccc",
};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerStyle {
    pub padding: &'static str,
    pub background_color: &'static str,
    pub font_size: &'static str,
    pub font_family: &'static str,
    pub border_bottom: &'static str,
}

/// Page setup handed to the browser's print-to-PDF call. A4 portrait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfPageSetup {
    pub landscape: bool,
    pub display_header_footer: bool,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub paper_width_in: f64,
    pub paper_height_in: f64,
}

impl Default for PdfPageSetup {
    fn default() -> Self {
        Self {
            landscape: false,
            display_header_footer: false,
            print_background: true,
            prefer_css_page_size: true,
            paper_width_in: 8.27,
            paper_height_in: 11.69,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCapture {
    pub url: String,
    /// Address after redirects, as reported by the browser.
    pub final_url: String,
    pub title: String,
    pub path: PathBuf,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCapture {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureReport {
    pub output_dir: PathBuf,
    pub saved: Vec<SavedCapture>,
    pub failed: Vec<FailedCapture>,
}

/// Splits the URL box into trimmed, non-empty lines.
pub fn parse_url_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// File stem for a captured URL: everything after the last `//` up to the
/// next `/`.
pub fn capture_file_stem(url: &str) -> String {
    let after_scheme = url.rsplit("//").next().unwrap_or(url);
    after_scheme
        .split('/')
        .next()
        .unwrap_or(after_scheme)
        .to_string()
}
