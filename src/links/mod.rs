// Link checker for markdown and HTML documentation
// Finds internal file references and external URLs, reports broken ones and
// optionally rewrites internal links that only need a path fix

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;
use walkdir::WalkDir;

const CHECKED_EXTENSIONS: &[&str] = &["md", "html", "htm"];
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];
const DEFAULT_SKIPPED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "example.com"];
const RENDERER_MARKER: &str = "markdown_renderer.html#";

static MARKDOWN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // [text](url)
        Regex::new(r"(?<!!)\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"),
        // ![alt](url)
        Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid regex"),
        // [ref]: url
        Regex::new(r"^[ ]*\[([^\]]+)\]:\s*(.+)$").expect("valid regex"),
    ]
});

/// Each pattern captures the URL first and, for anchors, the link text second
static HTML_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"(?i)<a[^>]+href=["']([^"']+)["'][^>]*>([^<]*)</a>"#).expect("valid regex"),
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).expect("valid regex"),
        Regex::new(r#"(?i)<link[^>]+href=["']([^"']+)["'][^>]*>"#).expect("valid regex"),
        Regex::new(r#"(?i)<script[^>]+src=["']([^"']+)["'][^>]*>"#).expect("valid regex"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Internal,
    External,
}

impl fmt::Display for LinkKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Internal => write!(f, "internal"),
            LinkKind::External => write!(f, "external"),
        }
    }
}

/// A link found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: String,
    pub line: usize,
    pub text: String,
}

/// A broken link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssue {
    /// Path relative to the scanned root, `/`-separated
    pub file: String,
    pub line: usize,
    pub url: String,
    pub text: String,
    pub error: String,
    pub kind: LinkKind,
}

/// Result of checking one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub ok: bool,
    pub message: String,
}

impl LinkStatus {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn broken(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

pub struct LinkChecker {
    root: PathBuf,
    agent: ureq::Agent,
    max_retries: u32,
    retry_delay: Duration,
    skipped_hosts: Vec<String>,
    url_cache: HashMap<String, bool>,
}

impl LinkChecker {
    #[inline]
    pub fn new(root: &Path, timeout: Duration, max_retries: u32) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Cannot scan {}", root.display()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            root,
            agent,
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_secs(1),
            skipped_hosts: DEFAULT_SKIPPED_HOSTS.iter().map(|h| (*h).to_string()).collect(),
            url_cache: HashMap::new(),
        })
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Hosts that are reported as fine without being requested
    #[inline]
    pub fn with_skipped_hosts(mut self, hosts: Vec<String>) -> Self {
        self.skipped_hosts = hosts;
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Markdown and HTML files under the root, sorted
    #[inline]
    pub fn find_files_to_check(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| CHECKED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        files.sort();
        files
    }

    /// Existence check for a local reference, resolved against the
    /// directory of `relative_to`. A leading `/` is resolved against the root.
    #[inline]
    pub fn check_file_exists(&self, target: &str, relative_to: &Path) -> LinkStatus {
        let base_dir = relative_to.parent().unwrap_or(&self.root);
        self.check_local(target, base_dir)
    }

    /// HEAD request following redirects; any status below 400 is fine
    #[inline]
    pub fn check_url(&mut self, url: &str) -> LinkStatus {
        if let Some(&ok) = self.url_cache.get(url) {
            return LinkStatus {
                ok,
                message: "cached".to_string(),
            };
        }

        if self.is_skipped_host(url) {
            return LinkStatus::ok("skipped (local/development URL)");
        }

        for attempt in 1..=self.max_retries {
            debug!("HEAD {} (attempt {}/{})", url, attempt, self.max_retries);
            match self.agent.head(url).call() {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let ok = status < 400;
                    self.url_cache.insert(url.to_string(), ok);
                    return LinkStatus {
                        ok,
                        message: format!("HTTP {}", status),
                    };
                }
                Err(e) if attempt == self.max_retries => {
                    self.url_cache.insert(url.to_string(), false);
                    return LinkStatus::broken(format!("Request failed: {}", e));
                }
                Err(e) => {
                    warn!("Request to {} failed ({}), retrying", url, e);
                    std::thread::sleep(self.retry_delay);
                }
            }
        }

        LinkStatus::broken("Max retries exceeded")
    }

    /// Check any link found in `file`
    #[inline]
    pub fn check_link(&mut self, url: &str, file: &Path) -> LinkStatus {
        if is_external_url(url) {
            return self.check_url(url);
        }

        if let Some((base, target)) = url.split_once(RENDERER_MARKER) {
            let renderer = format!("{}markdown_renderer.html", base);
            let base_check = self.check_file_exists(&renderer, file);
            if !base_check.ok {
                return base_check;
            }

            if target.contains('.') {
                if !self.check_local(target, &self.root).ok {
                    return LinkStatus::broken(format!(
                        "Markdown renderer exists but referenced file not found: {}",
                        target
                    ));
                }
                return LinkStatus::ok(format!("Valid markdown renderer link to {}", target));
            }
            return LinkStatus::ok("Valid markdown renderer link");
        }

        self.check_file_exists(url, file)
    }

    /// Check every link in one file
    #[inline]
    pub fn scan_file(&mut self, file: &Path) -> Result<Vec<LinkIssue>> {
        let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let content = String::from_utf8_lossy(&bytes);

        let links = match extension_of(file).as_str() {
            "md" => extract_links_from_markdown(&content),
            "html" | "htm" => extract_links_from_html(&content),
            _ => Vec::new(),
        };

        let label = self.label_for(file);
        let mut issues = Vec::new();
        for link in links {
            if should_skip(&link.url) {
                continue;
            }

            let status = self.check_link(&link.url, file);
            if !status.ok {
                let kind = if is_external_url(&link.url) {
                    LinkKind::External
                } else {
                    LinkKind::Internal
                };
                issues.push(LinkIssue {
                    file: label.clone(),
                    line: link.line,
                    url: link.url,
                    text: link.text,
                    error: status.message,
                    kind,
                });
            }
        }

        Ok(issues)
    }

    /// Check every markdown and HTML file under the root
    #[inline]
    pub fn scan_project(&mut self) -> Vec<LinkIssue> {
        info!("Scanning project: {}", self.root.display());
        let files = self.find_files_to_check();
        info!("Found {} files to check", files.len());

        let mut all_issues = Vec::new();
        for (i, file) in files.iter().enumerate() {
            info!("Checking {}/{}: {}", i + 1, files.len(), self.label_for(file));
            match self.scan_file(file) {
                Ok(issues) => all_issues.extend(issues),
                Err(e) => error!("Error scanning {}: {:#}", file.display(), e),
            }
        }

        all_issues
    }

    /// Rewrite an internal link if a path variant of it resolves.
    ///
    /// Returns whether the file was changed.
    #[inline]
    pub fn fix_internal_link(&self, issue: &LinkIssue) -> Result<bool> {
        if issue.kind != LinkKind::Internal {
            return Ok(false);
        }

        let file = self.root.join(&issue.file);
        let candidates = [
            issue.url.trim_start_matches("./").to_string(),
            format!("./{}", issue.url),
            issue.url.replace('\\', "/"),
        ];

        for candidate in candidates {
            if candidate == issue.url {
                continue;
            }
            if self.check_file_exists(&candidate, &file).ok {
                info!("Found working alternative: {}", candidate);
                return replace_link_in_file(&file, issue.line, &issue.url, &candidate);
            }
        }

        Ok(false)
    }

    fn check_local(&self, target: &str, base_dir: &Path) -> LinkStatus {
        let path_part = target
            .split(['#', '?'])
            .next()
            .unwrap_or_default()
            .trim();
        if path_part.is_empty() {
            return LinkStatus::ok("same document");
        }

        let resolved = match path_part.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => base_dir.join(path_part),
        };

        if resolved.exists() {
            LinkStatus::ok(resolved.display().to_string())
        } else {
            LinkStatus::broken(format!("File not found: {}", resolved.display()))
        }
    }

    fn is_skipped_host(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return false;
        };
        self.skipped_hosts
            .iter()
            .any(|skipped| host == *skipped || host.ends_with(&format!(".{}", skipped)))
    }

    fn label_for(&self, file: &Path) -> String {
        file.strip_prefix(&self.root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Whether a URL points off-site, i.e. has both a scheme and a host
#[inline]
pub fn is_external_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| parsed.has_host() && !parsed.scheme().is_empty())
}

/// Links in markdown, skipping code and template-looking targets
#[inline]
pub fn extract_links_from_markdown(content: &str) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();
    let mut in_fence = false;

    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || (trimmed.len() > 1 && trimmed.starts_with('`') && trimmed.ends_with('`')) {
            continue;
        }

        for pattern in MARKDOWN_PATTERNS.iter() {
            for captures in pattern.captures_iter(line).filter_map(|c| c.ok()) {
                let (Some(text), Some(target)) = (captures.get(1), captures.get(2)) else {
                    continue;
                };
                let url = clean_markdown_target(target.as_str());
                if url.is_empty() || url.contains("${") || url.contains("{{") {
                    continue;
                }
                if seen.insert((url.clone(), index + 1)) {
                    links.push(ExtractedLink {
                        url,
                        line: index + 1,
                        text: text.as_str().to_string(),
                    });
                }
            }
        }
    }

    links
}

/// Links in HTML attributes, skipping template placeholders
#[inline]
pub fn extract_links_from_html(content: &str) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for (index, line) in content.lines().enumerate() {
        for pattern in HTML_PATTERNS.iter() {
            for captures in pattern.captures_iter(line).filter_map(|c| c.ok()) {
                let Some(target) = captures.get(1) else {
                    continue;
                };
                let url = target.as_str().trim().to_string();
                if url.contains("${") || url.contains('}') || url.to_uppercase().contains("_HERE") {
                    continue;
                }
                let text = captures
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                if seen.insert((url.clone(), index + 1)) {
                    links.push(ExtractedLink {
                        url,
                        line: index + 1,
                        text,
                    });
                }
            }
        }
    }

    links
}

/// Replace `old_url` with `new_url` on one line (1-based) of a file
#[inline]
pub fn replace_link_in_file(file: &Path, line: usize, old_url: &str, new_url: &str) -> Result<bool> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();

    let Some(slot) = line.checked_sub(1).and_then(|i| lines.get_mut(i)) else {
        return Ok(false);
    };
    let original = slot.clone();

    let replaced = if extension_of(file) == "md" {
        let inline = original.replace(&format!("]({})", old_url), &format!("]({})", new_url));
        if inline == original {
            original.replace(&format!("]: {}", old_url), &format!("]: {}", new_url))
        } else {
            inline
        }
    } else {
        original.replace(old_url, new_url)
    };

    if replaced == original {
        return Ok(false);
    }

    *slot = replaced;
    fs::write(file, lines.concat())
        .with_context(|| format!("Failed to write {}", file.display()))?;
    info!("Fixed link in {}:{}", file.display(), line);
    Ok(true)
}

/// Markdown report of the issues, grouped by file
#[inline]
pub fn generate_report(issues: &[LinkIssue]) -> String {
    let mut report = vec![
        "# Link Check Report".to_string(),
        format!("**Total issues found:** {}", issues.len()),
        String::new(),
    ];

    if issues.is_empty() {
        report.push("✅ No broken links found!".to_string());
        return report.join("\n");
    }

    let sorted: Vec<&LinkIssue> = issues.iter().sorted_by(|a, b| a.file.cmp(&b.file)).collect();
    let grouped = sorted.into_iter().chunk_by(|issue| issue.file.clone());
    for (file, group) in &grouped {
        let file_issues: Vec<&LinkIssue> = group.collect();
        report.push(format!("## {}", file));
        report.push(format!("**Issues:** {}", file_issues.len()));
        report.push(String::new());

        for issue in file_issues {
            let status = match issue.kind {
                LinkKind::External => "❌",
                LinkKind::Internal => "📁",
            };
            report.push(format!("- **Line {}:** {} `{}`", issue.line, status, issue.url));
            report.push(format!("  - Error: {}", issue.error));
            if !issue.text.is_empty() {
                report.push(format!("  - Text: {}", issue.text));
            }
            report.push(String::new());
        }
    }

    report.join("\n")
}

fn clean_markdown_target(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix('<').and_then(|rest| rest.split_once('>')) {
        return inner.0.trim().to_string();
    }
    trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Anchors, and schemes that are not fetched or resolved on disk
fn should_skip(url: &str) -> bool {
    if url.is_empty() || url.starts_with('#') {
        return true;
    }
    ["mailto:", "tel:", "javascript:", "data:"]
        .iter()
        .any(|scheme| url.to_lowercase().starts_with(scheme))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}
