//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use crate::common::{entry_for, index, options, root, run, MockTransport, PNG, TIME_ID};
    use webscrap::{
        capture_with_session, CaptureOptions, CaptureOutput, CaptureSession, ContainerKind,
        HtmlParser, Policy, ResourceCategory, ResourceRole,
    };

    #[test]
    fn image_is_saved_next_to_the_document() {
        let transport = MockTransport::new()
            .page("index.html", r#"<html><body><img src="images/photo.png"></body></html>"#)
            .png("images/photo.png");

        let output = run(&transport, options()).unwrap();

        assert_eq!(output.index_path, "index.html");
        assert_eq!(output.files.get("photo.png").map(Vec::as_slice), Some(PNG));
        assert!(index(&output).contains(r#"<img src="photo.png">"#));

        let entry = entry_for(&output, "images/photo.png");
        assert_eq!(entry.path, "photo.png");
        assert_eq!(entry.role, Some(ResourceRole::Image));
        assert!(entry.token.is_some());
    }

    #[test]
    fn fragments_share_one_fetch_and_one_file() {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<img src="sprite.png#a"><img src="sprite.png#b"><img src="./sprite.png">"#,
            )
            .png("sprite.png");

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert_eq!(transport.requests_for("sprite.png"), 1);
        assert_eq!(
            output
                .manifest
                .files
                .iter()
                .filter(|entry| entry.role == Some(ResourceRole::Image))
                .count(),
            1
        );
        assert!(html.contains(r#"src="sprite.png#a""#));
        assert!(html.contains(r#"src="sprite.png#b""#));
        assert!(html.contains(r#"src="sprite.png""#));
    }

    #[test]
    fn percent_encoding_variants_are_one_resource() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="a%2db.png"><img src="a-b.png">"#)
            .png("a-b.png");

        let output = run(&transport, options()).unwrap();

        assert_eq!(transport.requests_for("a-b.png"), 1);
        assert_eq!(index(&output).matches(r#"src="a-b.png""#).count(), 2);
    }

    #[test]
    fn identical_bytes_are_stored_once() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="one.png"><img src="two.png">"#)
            .png("one.png")
            .png("two.png");

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert!(output.files.contains_key("one.png"));
        assert!(!output.files.contains_key("two.png"));
        assert_eq!(html.matches(r#"src="one.png""#).count(), 2);
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="a/logo.png"><img src="b/logo.png">"#)
            .serve("a/logo.png", b"\x89PNG\x0D\x0A\x1A\x0Afirst", "image/png")
            .serve("b/logo.png", b"\x89PNG\x0D\x0A\x1A\x0Asecond", "image/png");

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert!(html.contains(r#"src="logo.png""#));
        assert!(html.contains(r#"src="logo-1.png""#));
        assert_eq!(entry_for(&output, "b/logo.png").path, "logo-1.png");
    }

    #[test]
    fn device_names_are_escaped() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="con.png"><img src="AUX">"#)
            .png("con.png")
            .serve("AUX", b"GIF89a....", "image/gif");

        let output = run(&transport, options()).unwrap();

        assert!(output.files.contains_key("con_.png"));
        assert!(output.files.contains_key("AUX_.gif"));
    }

    #[test]
    fn content_disposition_names_the_file() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="download?id=3">"#)
            .png("download?id=3")
            .header("download?id=3", "Content-Disposition", "inline; filename=\"chart.png\"");

        let output = run(&transport, options()).unwrap();

        assert!(output.files.contains_key("chart.png"));
    }

    #[test]
    fn scripts_are_blanked_by_default() {
        let transport = MockTransport::new().page(
            "index.html",
            r#"<script src="app.js"></script><script>document.title = "x";</script>"#,
        );

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert_eq!(transport.requests_for("app.js"), 0);
        assert!(html.contains(r#"<script src="about:blank"></script>"#));
        assert!(!html.contains("document.title"));
    }

    #[test]
    fn remove_policy_drops_elements() {
        let transport = MockTransport::new()
            .page("index.html", r#"<p>text</p><img src="a.png"><div background="b.png"></div>"#)
            .png("a.png")
            .png("b.png");

        let mut options = options();
        options.policies.set(ResourceCategory::Image, Policy::Remove);
        options.policies.set(ResourceCategory::ImageBackground, Policy::Remove);

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert_eq!(transport.request_count(), 1);
        assert!(!html.contains("<img"));
        assert!(html.contains("<div></div>"));
        assert!(html.contains("<p>text</p>"));
    }

    #[test]
    fn link_policy_keeps_remote_addresses() {
        let transport = MockTransport::new().page("index.html", r#"<img src="/a.png">"#);

        let mut options = options();
        options.policies.set(ResourceCategory::Image, Policy::Link);

        let output = run(&transport, options).unwrap();

        assert_eq!(transport.requests_for("a.png"), 0);
        assert!(index(&output).contains(r#"src="https://example.com/a.png""#));
    }

    #[test]
    fn inline_policy_embeds_data_urls() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="a.png">"#)
            .png("a.png");

        let mut options = options();
        options.policies.set(ResourceCategory::Image, Policy::Inline);

        let output = run(&transport, options).unwrap();

        assert!(!output.files.contains_key("a.png"));
        assert!(index(&output).contains(r#"src="data:image/png;filename=a.png;base64,"#));
    }

    #[test]
    fn unused_picture_sources_are_blanked() {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<picture>
                    <source srcset="wide.png 2x">
                    <source srcset="narrow.png">
                    <img src="fallback.png">
                </picture>"#,
            )
            .png("wide.png")
            .serve("narrow.png", b"GIF89a-narrow", "image/gif")
            .serve("fallback.png", b"\xFF\xD8\xFF-fallback", "image/jpeg");

        let mut options = options();
        options.policies.set(ResourceCategory::Image, Policy::SaveUsed);

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert_eq!(transport.requests_for("wide.png"), 1);
        assert_eq!(transport.requests_for("narrow.png"), 0);
        assert!(html.contains(r#"srcset="wide.png 2x""#));
    }

    #[test]
    fn audit_attributes_keep_original_values() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="images/a.png">"#)
            .png("images/a.png");

        let mut options = options();
        options.record_rewrites = true;

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert!(html.contains(&format!(r#"data-sb{TIME_ID}-src="images/a.png""#)));
        assert!(html.contains(r#"src="a.png""#));
    }

    #[test]
    fn data_uri_saved_as_file() {
        let transport = MockTransport::new().page(
            "index.html",
            r#"<img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">"#,
        );

        let mut options = options();
        options.save_data_uri_as_file = true;

        let output = run(&transport, options).unwrap();

        assert!(output.files.contains_key("data.gif"));
        assert!(index(&output).contains(r#"src="data.gif""#));
    }

    #[test]
    fn single_html_inlines_everything() {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<link rel="stylesheet" href="site.css"><img src="a.png">"#,
            )
            .css("site.css", "body { background: url(bg.png) }")
            .png("a.png")
            .png("bg.png");

        let mut options = options();
        options.container = ContainerKind::SingleHtml;

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert_eq!(output.files.len(), 1);
        assert!(html.contains(r#"href="data:text/css;charset=utf-8;filename=site.css,"#));
        assert!(html.contains(r#"src="data:image/png;filename=a.png;base64,"#));
    }

    #[test]
    fn frames_are_captured_as_documents() {
        let transport = MockTransport::new()
            .page("index.html", r#"<iframe src="frame.html"></iframe>"#)
            .page("frame.html", r#"<img src="inner.png"><a href="elsewhere">x</a>"#)
            .png("inner.png");

        let output = run(&transport, options()).unwrap();
        let frame = crate::common::text(&output, "frame.html");

        assert!(index(&output).contains(r#"<iframe src="frame.html">"#));
        assert_eq!(entry_for(&output, "frame.html").role, Some(ResourceRole::Frame));
        assert!(frame.contains(r#"src="inner.png""#));
        assert!(frame.contains(r#"href="https://example.com/elsewhere""#));
    }

    #[test]
    fn frames_become_srcdoc_in_single_html() {
        let transport = MockTransport::new()
            .page("index.html", r#"<iframe src="frame.html"></iframe>"#)
            .page("frame.html", r#"<p>inside</p>"#);

        let mut options = options();
        options.container = ContainerKind::SingleHtml;

        let output = run(&transport, options).unwrap();
        let html = index(&output);

        assert!(html.contains("srcdoc="));
        assert!(html.contains("inside"));
        assert!(!html.contains(r#"src="frame.html""#));
    }

    #[test]
    fn base_and_csp_are_dropped() {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<head><base href="https://cdn.example.com/">
                <meta http-equiv="Content-Security-Policy" content="default-src 'none'">
                <meta charset="iso-8859-1"></head><body><img src="a.png"></body>"#,
            )
            .png("https://cdn.example.com/a.png");

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert_eq!(transport.requests_for("https://cdn.example.com/a.png"), 1);
        assert!(!html.contains("<base"));
        assert!(!html.contains("Content-Security-Policy"));
        assert!(html.contains(r#"<meta charset="UTF-8">"#));
    }

    #[test]
    fn identical_frames_share_one_file() {
        let transport = MockTransport::new()
            .page(
                "index.html",
                r#"<iframe src="one.html"></iframe><iframe src="two.html"></iframe>"#,
            )
            .page("one.html", "<p>same</p>")
            .page("two.html", "<p>same</p>");

        let output = run(&transport, options()).unwrap();
        let frames = output
            .manifest
            .files
            .iter()
            .filter(|entry| entry.role == Some(ResourceRole::Frame))
            .count();

        assert_eq!(frames, 1);
        assert!(!output.files.contains_key("two.html"));
        assert_eq!(index(&output).matches(r#"<iframe src="one.html">"#).count(), 2);
    }

    fn capture_with_blob(transport: &MockTransport, options: CaptureOptions) -> CaptureOutput {
        let mut parser = HtmlParser::new();
        parser.register_blob("blob:https://example.com/5f1c", PNG.to_vec(), "image/png");
        let session = CaptureSession::with_time_id(options, TIME_ID).unwrap();
        capture_with_session(session, &root(), transport, &parser).unwrap()
    }

    #[test]
    fn blobs_are_saved_from_memory_regardless_of_size_limit() {
        let transport =
            MockTransport::new().page("index.html", r#"<img src="blob:https://example.com/5f1c">"#);
        let mut options = options();
        options.max_resource_size = Some(4);

        let output = capture_with_blob(&transport, options);

        assert_eq!(output.files.get("blob.png").map(Vec::as_slice), Some(PNG));
        assert!(index(&output).contains(r#"<img src="blob.png">"#));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn blobs_are_inlined_in_single_html() {
        let transport =
            MockTransport::new().page("index.html", r#"<img src="blob:https://example.com/5f1c">"#);
        let mut options = options();
        options.container = ContainerKind::SingleHtml;

        let output = capture_with_blob(&transport, options);

        assert_eq!(output.files.len(), 1);
        assert!(index(&output).contains(r#"src="data:image/png;filename=blob.png;base64,"#));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use crate::common::{index, options, run, MockTransport};

    #[test]
    fn missing_resource_becomes_error_sentinel() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="missing.png"><img src="ok.png">"#)
            .fail("missing.png", 404)
            .png("ok.png");

        let output = run(&transport, options()).unwrap();
        let html = index(&output);

        assert!(html.contains(r#"src="urn:webscrap:error:https://example.com/missing.png""#));
        assert!(html.contains(r#"src="ok.png""#));
    }

    #[test]
    fn oversized_resource_becomes_oversized_sentinel() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="big.png">"#)
            .png("big.png");

        let mut options = options();
        options.max_resource_size = Some(4);

        let output = run(&transport, options).unwrap();

        assert!(!output.files.contains_key("big.png"));
        assert!(index(&output).contains(r#"src="urn:webscrap:oversized:https://example.com/big.png""#));
    }

    #[test]
    fn oversized_resource_linked_when_allowed() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="big.png#frag">"#)
            .png("big.png");

        let mut options = options();
        options.max_resource_size = Some(4);
        options.link_unsaved = true;

        let output = run(&transport, options).unwrap();

        assert!(!output.files.contains_key("big.png"));
        assert!(index(&output).contains(r#"src="https://example.com/big.png#frag""#));
    }

    #[test]
    fn failed_resource_linked_when_allowed() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="gone.png">"#)
            .fail("gone.png", 500);

        let mut options = options();
        options.link_unsaved = true;

        let output = run(&transport, options).unwrap();

        assert!(index(&output).contains(r#"src="https://example.com/gone.png""#));
    }

    #[test]
    fn failure_is_not_retried_within_a_session() {
        let transport = MockTransport::new()
            .page("index.html", r#"<img src="gone.png"><img src="gone.png#x">"#)
            .fail("gone.png", 500);

        run(&transport, options()).unwrap();

        assert_eq!(transport.requests_for("gone.png"), 1);
    }

    #[test]
    fn unknown_blob_becomes_error_sentinel() {
        let transport =
            MockTransport::new().page("index.html", r#"<img src="blob:https://example.com/gone">"#);

        let output = run(&transport, options()).unwrap();

        assert!(index(&output).contains(r#"src="urn:webscrap:error:blob:https://example.com/gone""#));
        assert_eq!(transport.request_count(), 1);
    }
}
