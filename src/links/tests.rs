use super::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checker_for(root: &Path) -> LinkChecker {
    LinkChecker::new(root, Duration::from_secs(5), 2)
        .expect("should create checker")
        .with_retry_delay(Duration::from_millis(1))
        .with_skipped_hosts(Vec::new())
}

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&path, content).expect("write file");
    path
}

#[test]
fn markdown_extraction() {
    let content = "\
# Title
See [the guide](docs/guide.md \"Guide\") and ![logo](img/logo.png).
[ref]: https://example.org/page
```
[not a link](ignored.md)
```
`[inline](code.md)`
Template [x](${base}/a.md) and [y](<spaced path.md>)
";
    let links = extract_links_from_markdown(content);
    let urls: Vec<(&str, usize)> = links.iter().map(|l| (l.url.as_str(), l.line)).collect();

    assert_eq!(
        urls,
        vec![
            ("docs/guide.md", 2),
            ("img/logo.png", 2),
            ("https://example.org/page", 3),
            ("spaced path.md", 8),
        ]
    );
    assert_eq!(links[0].text, "the guide");
    assert_eq!(links[1].text, "logo");
}

#[test]
fn markdown_extraction_deduplicates_per_line() {
    let links = extract_links_from_markdown("[a](x.md) and [b](x.md)\n[c](x.md)");
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].line, 1);
    assert_eq!(links[1].line, 2);
}

#[test]
fn html_extraction() {
    let content = r#"<html>
<A HREF="page.html">Page</A>
<img src='logo.png' alt="x">
<link rel="stylesheet" href="style.css">
<script src="app.js"></script>
<a href="${url}">dynamic</a>
<a href="PATH_HERE">placeholder</a>
</html>"#;
    let links = extract_links_from_html(content);
    let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();

    assert_eq!(urls, vec!["page.html", "logo.png", "style.css", "app.js"]);
    assert_eq!(links[0].text, "Page");
    assert_eq!(links[0].line, 2);
    assert!(links[1].text.is_empty());
}

#[test]
fn external_url_detection() {
    assert!(is_external_url("https://example.org"));
    assert!(is_external_url("http://localhost:8080/x"));
    assert!(!is_external_url("docs/guide.md"));
    assert!(!is_external_url("../README.md"));
    assert!(!is_external_url("mailto:someone@example.org"));
}

#[test]
fn file_existence_is_relative_to_the_containing_file() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    let readme = write(root, "docs/README.md", "");
    write(root, "docs/guide.md", "");
    write(root, "assets/logo.png", "");

    let checker = checker_for(root);
    let readme = readme.canonicalize().expect("canonicalize");

    assert!(checker.check_file_exists("guide.md", &readme).ok);
    assert!(checker.check_file_exists("./guide.md#section", &readme).ok);
    assert!(checker.check_file_exists("../assets/logo.png?v=2", &readme).ok);
    assert!(checker.check_file_exists("/assets/logo.png", &readme).ok);

    let missing = checker.check_file_exists("missing.md", &readme);
    assert!(!missing.ok);
    assert!(missing.message.starts_with("File not found"));
}

#[test]
fn renderer_links_check_both_halves() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    let index = write(root, "index.html", "");
    write(root, "markdown_renderer.html", "");
    write(root, "docs/setup.md", "");

    let mut checker = checker_for(root);
    let index = index.canonicalize().expect("canonicalize");

    assert!(checker.check_link("markdown_renderer.html#docs/setup.md", &index).ok);
    assert!(checker.check_link("markdown_renderer.html#intro", &index).ok);

    let missing = checker.check_link("markdown_renderer.html#docs/missing.md", &index);
    assert!(!missing.ok);
    assert!(missing.message.contains("referenced file not found"));

    assert!(!checker.check_link("sub/markdown_renderer.html#docs/setup.md", &index).ok);
}

#[tokio::test]
async fn url_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut checker = checker_for(temp.path());

    let ok = checker.check_url(&format!("{}/ok", server.uri()));
    assert!(ok.ok);
    assert_eq!(ok.message, "HTTP 200");

    let gone_url = format!("{}/gone", server.uri());
    let gone = checker.check_url(&gone_url);
    assert!(!gone.ok);
    assert_eq!(gone.message, "HTTP 404");

    // Served from the cache, so the mock sees a single request
    let cached = checker.check_url(&gone_url);
    assert!(!cached.ok);
    assert_eq!(cached.message, "cached");
}

#[test]
fn local_hosts_are_skipped_by_default() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut checker = LinkChecker::new(temp.path(), Duration::from_secs(1), 1)
        .expect("should create checker");

    let status = checker.check_url("http://localhost:1/never");
    assert!(status.ok);
    assert!(status.message.starts_with("skipped"));
    assert!(checker.check_url("https://docs.example.com/x").ok);
}

#[test]
fn unreachable_urls_fail_after_retries() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut checker = checker_for(temp.path());

    let status = checker.check_url("http://127.0.0.1:9/unreachable");
    assert!(!status.ok);
    assert!(status.message.starts_with("Request failed"));
}

#[test]
fn scan_project_reports_broken_internal_links() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    write(
        root,
        "README.md",
        "[ok](docs/guide.md)\n[broken](docs/missing.md)\n[anchor](#top)\n[mail](mailto:a@b.c)\n",
    );
    write(root, "docs/guide.md", "[back](../README.md)\n");
    write(root, "site/index.html", "<a href=\"nope.html\">Nope</a>\n");
    write(root, "notes.txt", "[ignored](missing.md)\n");
    write(root, "node_modules/pkg/README.md", "[broken](missing.md)\n");

    let mut checker = checker_for(root);
    let issues = checker.scan_project();

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].file, "README.md");
    assert_eq!(issues[0].line, 2);
    assert_eq!(issues[0].url, "docs/missing.md");
    assert_eq!(issues[0].text, "broken");
    assert_eq!(issues[0].kind, LinkKind::Internal);
    assert_eq!(issues[1].file, "site/index.html");
    assert_eq!(issues[1].text, "Nope");
}

#[test]
fn fix_rewrites_link_that_needs_a_path_variant() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    let readme = write(root, "README.md", "Intro\nSee [setup](setup\\install.md) now\n");
    write(root, "setup/install.md", "");

    let mut checker = checker_for(root);
    let issues = checker.scan_project();
    assert_eq!(issues.len(), 1);

    let fixed = checker
        .fix_internal_link(&issues[0])
        .expect("fix should not error");
    assert!(fixed);
    assert_eq!(
        fs::read_to_string(readme).expect("read readme"),
        "Intro\nSee [setup](setup/install.md) now\n"
    );
}

#[test]
fn fix_leaves_unresolvable_links() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    write(root, "README.md", "[gone](really/missing.md)\n");

    let mut checker = checker_for(root);
    let issues = checker.scan_project();
    assert_eq!(issues.len(), 1);
    assert!(!checker.fix_internal_link(&issues[0]).expect("fix should not error"));
}

#[test]
fn replace_link_in_html_line() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let page = write(
        temp.path(),
        "page.html",
        "<p>\n<a href=\"./a.html\">A</a>\n</p>\n",
    );

    assert!(replace_link_in_file(&page, 2, "./a.html", "a.html").expect("replace"));
    assert_eq!(
        fs::read_to_string(&page).expect("read page"),
        "<p>\n<a href=\"a.html\">A</a>\n</p>\n"
    );
    assert!(!replace_link_in_file(&page, 10, "a.html", "b.html").expect("replace"));
}

#[test]
fn report_groups_issues_by_file() {
    let issue = |file: &str, line: usize, kind: LinkKind| LinkIssue {
        file: file.to_string(),
        line,
        url: "missing.md".to_string(),
        text: "text".to_string(),
        error: "File not found: missing.md".to_string(),
        kind,
    };
    let report = generate_report(&[
        issue("b.md", 3, LinkKind::External),
        issue("a.md", 1, LinkKind::Internal),
        issue("b.md", 7, LinkKind::Internal),
    ]);

    assert!(report.starts_with("# Link Check Report\n**Total issues found:** 3"));
    let a = report.find("## a.md").expect("a.md section");
    let b = report.find("## b.md").expect("b.md section");
    assert!(a < b);
    assert!(report.contains("**Issues:** 2"));
    assert!(report.contains("- **Line 3:** ❌ `missing.md`"));
    assert!(report.contains("- **Line 1:** 📁 `missing.md`"));
    assert!(report.contains("  - Text: text"));
}

#[test]
fn report_without_issues() {
    let report = generate_report(&[]);
    assert!(report.contains("**Total issues found:** 0"));
    assert!(report.ends_with("✅ No broken links found!"));
}
