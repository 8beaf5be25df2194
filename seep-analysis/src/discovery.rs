//! Source and sink discovery.

use seep_core::constants::EXTERNAL_SOURCE_WINDOW;
use seep_core::errors::StoreError;

use crate::index::TaintIndex;
use crate::types::{PatternMap, SinkOccurrence, SourceOccurrence};

/// Enumerate concrete source occurrences, ordered by `(file, line)` so every
/// downstream stage — dedup in particular — iterates deterministically.
pub fn find_sources<I: TaintIndex + ?Sized>(
    index: &I,
    patterns: &PatternMap,
) -> Result<Vec<SourceOccurrence>, StoreError> {
    let mut sources = index.find_sources(patterns)?;
    sources.sort_by(|a, b| {
        (&a.file, a.line, a.column, &a.pattern).cmp(&(&b.file, b.line, b.column, &b.pattern))
    });
    Ok(sources)
}

/// Enumerate concrete sink occurrences, ordered by `(file, line)`.
pub fn find_sinks<I: TaintIndex + ?Sized>(
    index: &I,
    patterns: &PatternMap,
) -> Result<Vec<SinkOccurrence>, StoreError> {
    let mut sinks = index.find_sinks(patterns)?;
    sinks.sort_by(|a, b| {
        (&a.file, a.line, a.column, &a.pattern).cmp(&(&b.file, b.line, b.column, &b.pattern))
    });
    Ok(sinks)
}

/// Web-scraping and response-body accessors: external by definition.
const WEB_SCRAPING_PATTERNS: &[&str] = &[
    "requests.get",
    "requests.post",
    "requests.put",
    "requests.patch",
    "requests.delete",
    "response.text",
    "response.content",
    "response.json",
    "BeautifulSoup",
    "soup.find",
    "soup.find_all",
    "soup.select",
    "page.content",
    "page.inner_text",
    "page.inner_html",
    "driver.page_source",
    "element.text",
    "element.get_attribute",
    "urlopen",
    "urllib.request.urlopen",
];

/// Web framework request accessors: external by definition.
const WEB_INPUT_PATTERNS: &[&str] = &[
    "req.body",
    "req.query",
    "req.params",
    "req.headers",
    "request.args",
    "request.form",
    "request.json",
    "request.data",
    "request.GET",
    "request.POST",
    "request.FILES",
];

/// Environment and CLI inputs: external by definition.
const ENV_CLI_PATTERNS: &[&str] = &[
    "os.getenv",
    "os.environ.get",
    "sys.argv",
    "input",
    "click.argument",
];

/// File-I/O readers: external only when the surrounding code talks to the
/// network.
const FILE_IO_PATTERNS: &[&str] = &[
    "open",
    "json.load",
    "json.loads",
    "pd.read_csv",
    "pd.read_json",
    "pd.read_excel",
];

/// Validate that a source actually carries untrusted external data.
///
/// File-I/O sources qualify only when a network/download/scraping call sits
/// within ±50 lines in the same file. When unsure, the source is not
/// external and is skipped — the engine over-reports on flows, not on
/// sources.
pub fn is_external_source<I: TaintIndex + ?Sized>(
    index: &I,
    source: &SourceOccurrence,
) -> Result<bool, StoreError> {
    let pattern = source.pattern.as_str();

    if WEB_SCRAPING_PATTERNS.contains(&pattern)
        || WEB_INPUT_PATTERNS.contains(&pattern)
        || ENV_CLI_PATTERNS.contains(&pattern)
    {
        return Ok(true);
    }

    if FILE_IO_PATTERNS.contains(&pattern) {
        let nearby =
            index.network_indicators_near(&source.file, source.line, EXTERNAL_SOURCE_WINDOW)?;
        return Ok(nearby > 0);
    }

    Ok(false)
}
