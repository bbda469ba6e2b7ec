//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use url::Url;
    use webscrap::{
        capture_with_session, CaptureSession, ContainerKind, HtmlParser, ResourceRole,
    };

    use crate::common::{absolute, entry_for, index, options, run, text, MockTransport, TIME_ID};

    fn site() -> MockTransport {
        MockTransport::new()
            .page(
                "index.html",
                r##"<title> Home  page </title><a href="b#top">B</a> <a href="c">C</a> <a href="#local">here</a>"##,
            )
            .page("b", r#"<a href="c">C</a> <a href="index.html">home</a> <a href="d">D</a>"#)
            .page("c", r#"<a href="b">B</a>"#)
            .page("d", r#"<p>deep</p>"#)
    }

    fn documents(output: &webscrap::CaptureOutput) -> usize {
        output
            .manifest
            .files
            .iter()
            .filter(|entry| entry.role == Some(ResourceRole::Document))
            .count()
    }

    #[test]
    fn depth_zero_absolutizes_links() {
        let transport = site();

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert_eq!(output.title.as_deref(), Some("Home page"));
        assert_eq!(documents(&output), 1);
        assert!(html.contains(r#"href="https://example.com/b#top""#));
        assert!(html.contains(r##"href="#local""##));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn depth_one_rewrites_links_to_local_copies() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(1);

        let output = run(&transport, options).unwrap();
        let html = index(&output);
        let b = text(&output, "b.html");

        assert_eq!(documents(&output), 3);
        assert!(html.contains(r#"href="b.html#top""#));
        assert!(html.contains(r#"href="c.html""#));
        assert!(b.contains(r#"href="index.html""#));
        assert!(b.contains(r#"href="c.html""#));
        assert!(b.contains(r#"href="https://example.com/d""#));
        assert_eq!(transport.requests_for("d"), 0);
    }

    #[test]
    fn every_document_is_captured_once() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(3);

        let output = run(&transport, options).unwrap();

        assert_eq!(documents(&output), 4);
        for page in ["index.html", "b", "c", "d"] {
            assert_eq!(transport.requests_for(page), 1, "{page}");
        }
        assert_eq!(entry_for(&output, "d").path, "d.html");
        assert_eq!(output.manifest.index_pages, vec!["index.html".to_string()]);
    }

    #[test]
    fn redirected_links_share_the_target_copy() {
        let transport = MockTransport::new()
            .page("index.html", r#"<a href="old">old</a> <a href="new">new</a>"#)
            .page("new", r#"<p>new</p>"#)
            .redirect("old", "new");
        let mut options = options();
        options.max_depth = Some(1);

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert_eq!(documents(&output), 2);
        assert_eq!(html.matches(r#"href="new.html""#).count(), 2);
    }

    #[test]
    fn document_filter_limits_the_crawl() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(1);
        options.crawl.document_filter = Some("/example\\.com/b/".to_string());

        let output = run(&transport, options).unwrap();

        assert_eq!(documents(&output), 2);
        assert_eq!(transport.requests_for("c"), 0);
        assert!(index(&output).contains(r#"href="https://example.com/c""#));
    }

    #[test]
    fn exclude_filter_wins_over_document_filter() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(1);
        options.crawl.exclude_filter = Some("example.com/c".to_string());

        let output = run(&transport, options).unwrap();

        assert_eq!(documents(&output), 2);
        assert_eq!(transport.requests_for("c"), 0);
    }

    #[test]
    fn linked_files_are_downloaded_by_extension() {
        let transport = MockTransport::new()
            .page("index.html", r#"<a href="report.pdf">report</a> <a href="photo.jpg">photo</a>"#)
            .serve("report.pdf", b"%PDF-1.4", "application/pdf")
            .serve("photo.jpg", b"\xFF\xD8\xFF", "image/jpeg");
        let mut options = options();
        options.max_depth = Some(1);
        options.crawl.file_extensions = vec!["pdf".to_string()];

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert!(output.files.contains_key("report.pdf"));
        assert!(html.contains(r#"href="report.pdf""#));
        assert!(html.contains(r#"href="https://example.com/photo.jpg""#));
        assert_eq!(transport.requests_for("photo.jpg"), 0);
    }

    #[test]
    fn extra_urls_are_captured_at_depth_one() {
        let transport = site().page("extra.html", r#"<a href="d">D</a>"#);
        let mut options = options();
        options.crawl.extra_urls = vec!["extra.html".to_string()];

        let output = run(&transport, options).unwrap();

        assert!(output.files.contains_key("extra.html"));
        assert_eq!(transport.requests_for("d"), 0);
        assert!(text(&output, "extra.html").contains(r#"href="https://example.com/d""#));
    }

    #[test]
    fn single_html_captures_the_root_only() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(2);
        options.container = ContainerKind::SingleHtml;

        let output = run(&transport, options).unwrap();

        assert_eq!(output.files.len(), 1);
        assert_eq!(transport.request_count(), 1);
        assert!(index(&output).contains(r#"href="https://example.com/c""#));
    }

    #[test]
    fn non_html_root_gets_an_index_page() {
        let transport = MockTransport::new().png("photo.png");
        let session = CaptureSession::with_time_id(options(), TIME_ID).unwrap();
        let target = Url::parse(&absolute("photo.png")).unwrap();

        let output =
            capture_with_session(session, &target, &transport, &HtmlParser::new()).unwrap();

        assert_eq!(output.index_path, "index.html");
        assert!(output.files.contains_key("photo.png"));
        assert!(index(&output).contains("url=photo.png"));
        assert_eq!(output.manifest.index_pages, vec!["index.html".to_string()]);
    }

    #[test]
    fn xhtml_root_is_saved_as_xhtml() {
        let transport = MockTransport::new().serve(
            "index.html",
            br#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>x</p></body></html>"#,
            "application/xhtml+xml",
        );

        let output = run(&transport, options()).unwrap();

        assert_eq!(output.index_path, "index.xhtml");
        assert!(output.files.contains_key("index.xhtml"));
        assert!(!output.files.contains_key("index.html"));
    }

    #[test]
    fn cancelled_session_captures_the_root_only() {
        let transport = site();
        let mut options = options();
        options.max_depth = Some(2);
        let session = CaptureSession::with_time_id(options, TIME_ID).unwrap();
        session.cancel();

        let output = capture_with_session(
            session,
            &Url::parse(&absolute("index.html")).unwrap(),
            &transport,
            &HtmlParser::new(),
        )
        .unwrap();

        assert_eq!(documents(&output), 1);
        assert!(index(&output).contains(r#"href="https://example.com/b#top""#));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use webscrap::CaptureError;

    use crate::common::{index, options, run, MockTransport};

    #[test]
    fn unavailable_root_aborts() {
        let transport = MockTransport::new().fail("index.html", 503);

        let result = run(&transport, options());

        assert!(matches!(result, Err(CaptureError::TransportFailure(_))));
    }

    #[test]
    fn failed_links_stay_remote() {
        let transport = MockTransport::new()
            .page("index.html", r#"<a href="gone">gone</a>"#)
            .fail("gone", 404);
        let mut options = options();
        options.max_depth = Some(1);

        let output = run(&transport, options).unwrap();

        assert!(index(&output).contains(r#"href="https://example.com/gone""#));
    }

    #[test]
    fn invalid_filter_is_a_config_error() {
        let transport = MockTransport::new().page("index.html", "<p>x</p>");
        let mut options = options();
        options.crawl.document_filter = Some("/([/".to_string());

        let result = run(&transport, options);

        assert!(matches!(result, Err(CaptureError::Config(_))));
    }
}
